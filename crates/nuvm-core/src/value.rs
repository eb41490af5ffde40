//! Représentation des valeurs : fixnum immédiat ou référence d'objet.
//!
//! L'égalité est l'identité : deux fixnums de même valeur sont égaux, deux
//! objets ne le sont que s'ils désignent la même allocation. Deux primitives
//! enveloppant la même fonction native restent donc distinctes.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::types::{builtins, Type};

/// Signature d'une fonction native appelable par `call`.
pub type PrimitiveFn = fn(&[Value]) -> Result<Value>;

/// Métadonnées d'une procédure utilisateur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Procedure {
    /// Offset d'entrée dans le code du module.
    pub entry: u32,
    /// Nombre de locaux garantis.
    pub num_locals: u8,
    /// Borne haute locaux + arguments.
    pub max_locals: u8,
    /// Taille de la région de code (octets).
    pub size: u16,
}

/// Contenu spécifique d'un objet.
#[derive(Clone, Copy)]
pub enum ObjectKind {
    /// Singleton `True` ou `False`.
    Boolean(bool),
    /// Singleton `Unknown`.
    Unknown,
    /// Fonction native.
    Primitive(PrimitiveFn),
    /// Procédure en bytecode.
    Procedure(Procedure),
}

impl fmt::Debug for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Boolean(b) => write!(f, "Boolean({b})"),
            ObjectKind::Unknown => f.write_str("Unknown"),
            ObjectKind::Primitive(func) => write!(f, "Primitive({:p})", *func as *const ()),
            ObjectKind::Procedure(p) => write!(f, "{p:?}"),
        }
    }
}

/// Objet : un type + un contenu.
#[derive(Debug)]
pub struct Object {
    ty: Type,
    kind: ObjectKind,
}

impl Object {
    /// Type porté par l'en-tête de l'objet.
    pub fn ty(&self) -> &Type { &self.ty }

    /// Contenu de l'objet.
    pub fn kind(&self) -> &ObjectKind { &self.kind }
}

/* ─────────────────────────── Value ─────────────────────────── */

/// Valeur nuvm.
#[derive(Clone)]
pub enum Value {
    /// Entier signé immédiat.
    Fixnum(i32),
    /// Référence partagée vers un objet.
    Object(Arc<Object>),
}

impl Value {
    /// Enveloppe un entier.
    pub const fn wrap_fixnum(v: i32) -> Self { Value::Fixnum(v) }

    /// Enveloppe une référence d'objet.
    pub fn wrap_object(obj: Arc<Object>) -> Self { Value::Object(obj) }

    /// Vrai pour un fixnum.
    pub const fn is_fixnum(&self) -> bool { matches!(self, Value::Fixnum(_)) }

    /// Entier porté, ou `None` pour un objet.
    pub const fn as_fixnum(&self) -> Option<i32> {
        match self {
            Value::Fixnum(v) => Some(*v),
            Value::Object(_) => None,
        }
    }

    /// Entier porté, ou `IllegalArgument`.
    pub fn unwrap_fixnum(&self) -> Result<i32> {
        self.as_fixnum()
            .ok_or_else(|| Error::illegal_argument(format!("expected a fixnum, found {self}")))
    }

    /// Objet référencé, ou `IllegalArgument`.
    pub fn unwrap_object(&self) -> Result<&Arc<Object>> {
        match self {
            Value::Object(obj) => Ok(obj),
            Value::Fixnum(v) => Err(Error::illegal_argument(format!("expected an object, found fixnum {v}"))),
        }
    }

    /// Type de la valeur ; les fixnums rapportent le type `Fixnum` mémoïsé.
    pub fn type_of(&self) -> Type {
        match self {
            Value::Fixnum(_) => builtins().fixnum.clone(),
            Value::Object(obj) => obj.ty.clone(),
        }
    }

    fn object_kind(&self) -> Option<&ObjectKind> {
        match self {
            Value::Object(obj) => Some(&obj.kind),
            Value::Fixnum(_) => None,
        }
    }

    /* ────────── Booléens / Unknown ────────── */

    /// Singleton booléen correspondant à `b`.
    pub fn boolean(b: bool) -> Self { if b { true_value() } else { false_value() } }

    /// Vrai si la valeur est le singleton `True`.
    pub fn is_true(&self) -> bool { *self == singletons().t }

    /// Vrai si la valeur est le singleton `False`.
    pub fn is_false(&self) -> bool { *self == singletons().f }

    /// Vrai pour l'un des deux singletons booléens.
    pub fn is_boolean(&self) -> bool { self.is_true() || self.is_false() }

    /// Vrai si la valeur est le singleton `Unknown`.
    pub fn is_unknown(&self) -> bool { *self == singletons().unknown }

    /* ────────── Primitives ────────── */

    /// Nouvelle primitive ; chaque appel crée un objet distinct.
    pub fn primitive(func: PrimitiveFn) -> Self {
        Value::Object(Arc::new(Object { ty: builtins().primitive.clone(), kind: ObjectKind::Primitive(func) }))
    }

    /// Vrai pour une primitive.
    pub fn is_primitive(&self) -> bool { self.as_primitive().is_some() }

    /// Fonction native portée.
    pub fn as_primitive(&self) -> Option<PrimitiveFn> {
        match self.object_kind() {
            Some(ObjectKind::Primitive(func)) => Some(*func),
            _ => None,
        }
    }

    /// Invoque la primitive avec `args`.
    pub fn call_primitive(&self, args: &[Value]) -> Result<Value> {
        let func = self
            .as_primitive()
            .ok_or_else(|| Error::illegal_argument(format!("{self} is not a primitive")))?;
        func(args)
    }

    /* ────────── Procédures ────────── */

    /// Nouvelle procédure utilisateur.
    pub fn procedure(proc: Procedure) -> Self {
        Value::Object(Arc::new(Object { ty: builtins().procedure.clone(), kind: ObjectKind::Procedure(proc) }))
    }

    /// Vrai pour une procédure utilisateur.
    pub fn is_procedure(&self) -> bool { self.as_procedure().is_some() }

    /// Métadonnées de la procédure.
    pub fn as_procedure(&self) -> Option<Procedure> {
        match self.object_kind() {
            Some(ObjectKind::Procedure(p)) => Some(*p),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self { Value::Fixnum(0) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Fixnum(v) }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::boolean(b) }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Fixnum(a), Value::Fixnum(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Fixnum(v) => write!(f, "Fixnum({v})"),
            Value::Object(obj) => write!(f, "{:?}", obj.kind),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Fixnum(v) => write!(f, "{v}"),
            Value::Object(obj) => match obj.kind {
                ObjectKind::Boolean(true) => f.write_str("#true"),
                ObjectKind::Boolean(false) => f.write_str("#false"),
                ObjectKind::Unknown => f.write_str("#unknown"),
                ObjectKind::Primitive(_) => f.write_str("#<primitive>"),
                ObjectKind::Procedure(p) => write!(
                    f,
                    "#<procedure entry={} locals={} max={} size={}>",
                    p.entry, p.num_locals, p.max_locals, p.size
                ),
            },
        }
    }
}

/* ─────────────────────────── Singletons ─────────────────────────── */

struct Singletons {
    t: Value,
    f: Value,
    unknown: Value,
}

fn singletons() -> &'static Singletons {
    static SINGLETONS: OnceLock<Singletons> = OnceLock::new();
    SINGLETONS.get_or_init(|| {
        let b = builtins();
        let make = |ty: &Type, kind| Value::Object(Arc::new(Object { ty: ty.clone(), kind }));
        Singletons {
            t: make(&b.boolean, ObjectKind::Boolean(true)),
            f: make(&b.boolean, ObjectKind::Boolean(false)),
            unknown: make(&b.unknown, ObjectKind::Unknown),
        }
    })
}

/// Singleton `True`.
pub fn true_value() -> Value { singletons().t.clone() }

/// Singleton `False`.
pub fn false_value() -> Value { singletons().f.clone() }

/// Singleton `Unknown`.
pub fn unknown_value() -> Value { singletons().unknown.clone() }

/* ─────────────────────────── Tests ─────────────────────────── */
