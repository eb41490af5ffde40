//! Descripteurs de types d'exécution et registre global des types.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::error::{Error, ErrorKind, Result};
use crate::registry::NameRegistry;

/// Nom du type synthétique des fixnums.
pub const FIXNUM_TYPE_NAME: &str = "nuvm.Fixnum";
/// Nom du type des singletons booléens.
pub const BOOLEAN_TYPE_NAME: &str = "nuvm.Boolean";
/// Nom du type du singleton `Unknown`.
pub const UNKNOWN_TYPE_NAME: &str = "nuvm.Unknown";
/// Nom du type des primitives natives.
pub const PRIMITIVE_TYPE_NAME: &str = "nuvm.PrimitiveProcedure";
/// Nom du type des procédures utilisateur.
pub const PROCEDURE_TYPE_NAME: &str = "nuvm.UserProcedure";

/// Descripteur de type. L'égalité est l'identité du descripteur.
#[derive(Clone)]
pub struct Type(Arc<str>);

impl Type {
    fn new(name: &str) -> Self { Self(Arc::from(name)) }

    /// Nom enregistré.
    pub fn name(&self) -> &str { &self.0 }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl Eq for Type {}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Type({})", self.name()) }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/* ─────────────────────────── Types intégrés ─────────────────────────── */

/// Types intégrés, créés une seule fois par processus.
#[derive(Debug)]
pub struct Builtins {
    /// `nuvm.Fixnum`
    pub fixnum: Type,
    /// `nuvm.Boolean`
    pub boolean: Type,
    /// `nuvm.Unknown`
    pub unknown: Type,
    /// `nuvm.PrimitiveProcedure`
    pub primitive: Type,
    /// `nuvm.UserProcedure`
    pub procedure: Type,
}

impl Builtins {
    fn all(&self) -> [&Type; 5] {
        [&self.fixnum, &self.boolean, &self.unknown, &self.primitive, &self.procedure]
    }
}

/// Types intégrés (initialisés paresseusement).
pub fn builtins() -> &'static Builtins {
    static BUILTINS: OnceLock<Builtins> = OnceLock::new();
    BUILTINS.get_or_init(|| Builtins {
        fixnum: Type::new(FIXNUM_TYPE_NAME),
        boolean: Type::new(BOOLEAN_TYPE_NAME),
        unknown: Type::new(UNKNOWN_TYPE_NAME),
        primitive: Type::new(PRIMITIVE_TYPE_NAME),
        procedure: Type::new(PROCEDURE_TYPE_NAME),
    })
}

/* ─────────────────────────── Registre ─────────────────────────── */

/// Registre nom → type.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: NameRegistry<Type>,
}

impl TypeRegistry {
    /// Registre vide (sans les intégrés).
    pub fn new() -> Self { Self::default() }

    /// Registre contenant les types intégrés.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        for ty in builtins().all() {
            // noms intégrés : valides et distincts
            let _ = reg.types.register(ty.name(), ty.clone());
        }
        reg
    }

    /// Crée et enregistre un type nommé `name`.
    pub fn register(&mut self, name: &str) -> Result<Type> {
        let ty = Type::new(name);
        self.types.register(name, ty.clone())?;
        Ok(ty)
    }

    /// Type enregistré sous `name`, ou `UnknownType`.
    pub fn lookup(&self, name: &str) -> Result<Type> {
        self.types
            .lookup(name)
            .ok_or_else(|| Error::new(ErrorKind::UnknownType, format!("no type named `{name}`")))
    }

    /// Nombre de types enregistrés.
    pub fn len(&self) -> usize { self.types.len() }

    /// Vrai si aucun type n'est enregistré.
    pub fn is_empty(&self) -> bool { self.types.is_empty() }
}

/// Registre global du processus, préchargé avec les types intégrés.
pub fn registry() -> &'static Mutex<TypeRegistry> {
    static REGISTRY: OnceLock<Mutex<TypeRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(TypeRegistry::with_builtins()))
}

/// Enregistre un type dans le registre global.
pub fn register_type(name: &str) -> Result<Type> { registry().lock().register(name) }

/// Retrouve un type dans le registre global.
pub fn lookup_type(name: &str) -> Result<Type> { registry().lock().lookup(name) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_globally() -> Result<()> {
        assert_eq!(lookup_type(BOOLEAN_TYPE_NAME)?, builtins().boolean);
        assert_eq!(lookup_type(PROCEDURE_TYPE_NAME)?, builtins().procedure);
        assert_eq!(lookup_type(FIXNUM_TYPE_NAME)?, builtins().fixnum);
        Ok(())
    }

    #[test]
    fn builtin_names_cannot_be_reused() {
        let err = register_type(PRIMITIVE_TYPE_NAME).unwrap_err();
        assert!(err.is(&ErrorKind::RepeatedName));
    }

    #[test]
    fn types_compare_by_identity() -> Result<()> {
        let mut a = TypeRegistry::new();
        let mut b = TypeRegistry::new();
        let ta = a.register("demo.Point")?;
        let tb = b.register("demo.Point")?;
        assert_eq!(ta.name(), tb.name());
        assert_ne!(ta, tb);
        assert_eq!(a.lookup("demo.Point")?, ta);
        Ok(())
    }

    #[test]
    fn unknown_and_invalid_names() {
        let mut reg = TypeRegistry::new();
        assert!(reg.lookup("demo.Nope").unwrap_err().is(&ErrorKind::UnknownType));
        assert!(reg.register("demo Nope").unwrap_err().is(&ErrorKind::InvalidName));
        assert!(reg.register("").unwrap_err().is(&ErrorKind::InvalidName));
        assert!(reg.is_empty());
    }
}
