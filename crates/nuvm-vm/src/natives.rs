//! Table des primitives natives, liées par nom dans les globales d'un module.
//!
//! Une primitive reçoit les arguments du `call` dans l'ordre et rend une valeur
//! (ou une erreur, qui arrête l'évaluateur). Les natives par défaut vérifient
//! elles-mêmes leur arité : une `Value::primitive` ne transporte que la fonction.

use nuvm_core::{unknown_value, Error, NameRegistry, PrimitiveFn, Result, Value};

/// One registered native.
#[derive(Debug, Clone)]
pub struct NativeEntry {
    /// Nom complet (`module.nom`).
    pub name: String,
    /// Arité attendue ; `None` = variadique.
    pub arity: Option<usize>,
    /// Fonction appelée.
    pub func: PrimitiveFn,
}

/// Registry of natives, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Natives {
    registry: NameRegistry<NativeEntry>,
}

impl Natives {
    /// Table vide.
    pub fn new() -> Self { Self::default() }

    /// Register `func` under `name` (`InvalidName`, `RepeatedName`).
    pub fn register(&mut self, name: &str, arity: Option<usize>, func: PrimitiveFn) -> Result<()> {
        self.registry.register(name, NativeEntry { name: name.to_owned(), arity, func })
    }

    /// Enregistre un lot sous le préfixe `module`.
    pub fn register_all(&mut self, module: &str, entries: &[(&str, Option<usize>, PrimitiveFn)]) -> Result<()> {
        for (name, arity, func) in entries {
            self.register(&format!("{module}.{name}"), *arity, *func)?;
        }
        Ok(())
    }

    /// Entrée enregistrée.
    pub fn entry(&self, name: &str) -> Option<NativeEntry> { self.registry.lookup(name) }

    /// Fresh primitive value for `name`, ready to store in a global.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.entry(name)
            .map(|e| make_primitive(e.func))
            .ok_or_else(|| Error::new(nuvm_core::ErrorKind::UnknownType, format!("no native named `{name}`")))
    }

    /// Appel direct, arité vérifiée.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let entry = self
            .entry(name)
            .ok_or_else(|| Error::new(nuvm_core::ErrorKind::UnknownType, format!("no native named `{name}`")))?;
        if let Some(expected) = entry.arity {
            check_arity(name, expected, args)?;
        }
        (entry.func)(args)
    }

    /// Noms enregistrés.
    pub fn names(&self) -> impl Iterator<Item = &str> { self.registry.names() }

    /// Nombre de natives.
    pub fn len(&self) -> usize { self.registry.len() }

    /// Vrai si vide.
    pub fn is_empty(&self) -> bool { self.registry.is_empty() }

    /// Table préchargée : `fixnum.*` et `value.print`.
    pub fn with_defaults() -> Self {
        let mut natives = Self::new();
        let defaults: [(&str, &[(&str, Option<usize>, PrimitiveFn)]); 2] = [
            ("fixnum", &[
                ("add", Some(2), native_fixnum_add as PrimitiveFn),
                ("sub", Some(2), native_fixnum_sub as PrimitiveFn),
                ("mul", Some(2), native_fixnum_mul as PrimitiveFn),
                ("lt",  Some(2), native_fixnum_lt as PrimitiveFn),
                ("eq",  Some(2), native_fixnum_eq as PrimitiveFn),
            ]),
            ("value", &[
                ("print", None, native_value_print as PrimitiveFn),
            ]),
        ];
        for (module, entries) in defaults {
            // noms statiques valides et distincts : l'enregistrement ne peut pas échouer
            let _ = natives.register_all(module, entries);
        }
        natives
    }
}

/// Wrap a native function in a primitive value.
pub fn make_primitive(func: PrimitiveFn) -> Value { Value::primitive(func) }

fn check_arity(name: &str, expected: usize, args: &[Value]) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(Error::illegal_argument(format!("{name} expects {expected} arguments, got {}", args.len())))
    }
}

fn fixnum_pair(name: &str, args: &[Value]) -> Result<(i32, i32)> {
    check_arity(name, 2, args)?;
    let a = args[0].unwrap_fixnum().map_err(|e| e.with_context(name))?;
    let b = args[1].unwrap_fixnum().map_err(|e| e.with_context(name))?;
    Ok((a, b))
}

/* ─────────────────────────── Natives par défaut ─────────────────────────── */

fn native_fixnum_add(args: &[Value]) -> Result<Value> {
    let (a, b) = fixnum_pair("fixnum.add", args)?;
    a.checked_add(b).map(Value::Fixnum).ok_or_else(|| Error::overflow(format!("{a} + {b} overflows a fixnum")))
}

fn native_fixnum_sub(args: &[Value]) -> Result<Value> {
    let (a, b) = fixnum_pair("fixnum.sub", args)?;
    a.checked_sub(b).map(Value::Fixnum).ok_or_else(|| Error::overflow(format!("{a} - {b} overflows a fixnum")))
}

fn native_fixnum_mul(args: &[Value]) -> Result<Value> {
    let (a, b) = fixnum_pair("fixnum.mul", args)?;
    a.checked_mul(b).map(Value::Fixnum).ok_or_else(|| Error::overflow(format!("{a} * {b} overflows a fixnum")))
}

fn native_fixnum_lt(args: &[Value]) -> Result<Value> {
    let (a, b) = fixnum_pair("fixnum.lt", args)?;
    Ok(Value::boolean(a < b))
}

fn native_fixnum_eq(args: &[Value]) -> Result<Value> {
    let (a, b) = fixnum_pair("fixnum.eq", args)?;
    Ok(Value::boolean(a == b))
}

/// Affiche ses arguments séparés par un espace ; rend le premier, ou `Unknown`.
fn native_value_print(args: &[Value]) -> Result<Value> {
    let line = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
    println!("{line}");
    Ok(args.first().cloned().unwrap_or_else(unknown_value))
}
