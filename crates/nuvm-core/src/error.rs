//! Erreurs nommées de nuvm.
//!
//! Chaque erreur porte un [`ErrorKind`] dont le nom (`nuvm.IllegalArgument`,
//! `nuvm.UnexpectedEoF`, …) est un contrat stable, plus un message libre.
//! Les noms sont inscrits dans un registre global ; des types d'erreur
//! supplémentaires peuvent y être déclarés (utile aux natives).

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use thiserror::Error;

use crate::registry::NameRegistry;

/* ─────────────────────────── Résultat commun ─────────────────────────── */

/// Alias résultat commun à tous les crates nuvm.
pub type Result<T> = core::result::Result<T, Error>;

/* ─────────────────────────── Genres d'erreur ─────────────────────────── */

/// Type d'erreur déclaré à l'exécution (hors noms intégrés).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorType(Arc<str>);

impl ErrorType {
    /// Nom complet, tel qu'enregistré.
    pub fn name(&self) -> &str { &self.0 }
}

/// Genre d'erreur ; le nom retourné par [`ErrorKind::name`] est stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Allocation impossible.
    BadAllocation,
    /// Argument ou usage invalide (anchors, cible d'appel, condition…).
    IllegalArgument,
    /// Fin de flux avant la quantité attendue.
    UnexpectedEof,
    /// Octets de module mal formés.
    InvalidModuleFormat,
    /// Valeur hors de la plage d'un champ.
    Overflow,
    /// Erreur d'E/S hôte.
    IoError,
    /// Jeton inattendu dans une source assembleur.
    UnexpectedToken,
    /// Index hors bornes (global, local, pc).
    IndexOutOfBounds,
    /// Opcode non attribué.
    UnknownOpcode,
    /// Nom de registre mal formé.
    InvalidName,
    /// Nom déjà enregistré.
    RepeatedName,
    /// Type inconnu du registre de types.
    UnknownType,
    /// Type d'erreur inconnu du registre d'erreurs.
    UnknownErrorType,
    /// Type d'erreur déclaré via [`register_error_type`].
    Custom(ErrorType),
}

impl ErrorKind {
    /// Genres intégrés, préenregistrés au démarrage.
    pub const BUILTIN: [ErrorKind; 13] = [
        ErrorKind::BadAllocation,
        ErrorKind::IllegalArgument,
        ErrorKind::UnexpectedEof,
        ErrorKind::InvalidModuleFormat,
        ErrorKind::Overflow,
        ErrorKind::IoError,
        ErrorKind::UnexpectedToken,
        ErrorKind::IndexOutOfBounds,
        ErrorKind::UnknownOpcode,
        ErrorKind::InvalidName,
        ErrorKind::RepeatedName,
        ErrorKind::UnknownType,
        ErrorKind::UnknownErrorType,
    ];

    /// Nom stable (`nuvm.<Nom>`).
    pub fn name(&self) -> &str {
        match self {
            ErrorKind::BadAllocation => "nuvm.BadAllocation",
            ErrorKind::IllegalArgument => "nuvm.IllegalArgument",
            ErrorKind::UnexpectedEof => "nuvm.UnexpectedEoF",
            ErrorKind::InvalidModuleFormat => "nuvm.InvalidModuleFormat",
            ErrorKind::Overflow => "nuvm.Overflow",
            ErrorKind::IoError => "nuvm.IoError",
            ErrorKind::UnexpectedToken => "nuvm.UnexpectedToken",
            ErrorKind::IndexOutOfBounds => "nuvm.IndexOutOfBounds",
            ErrorKind::UnknownOpcode => "nuvm.UnknownOpcode",
            ErrorKind::InvalidName => "nuvm.InvalidName",
            ErrorKind::RepeatedName => "nuvm.RepeatedName",
            ErrorKind::UnknownType => "nuvm.UnknownType",
            ErrorKind::UnknownErrorType => "nuvm.UnknownErrorType",
            ErrorKind::Custom(ty) => ty.name(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/* ─────────────────────────── Erreur ─────────────────────────── */

/// Erreur nuvm : un genre nommé + un message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
}

impl Error {
    /// Construit une erreur.
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Genre de l'erreur.
    pub fn kind(&self) -> &ErrorKind { &self.kind }

    /// Message libre.
    pub fn message(&self) -> &str { &self.message }

    /// Vrai si l'erreur est du genre donné.
    pub fn is(&self, kind: &ErrorKind) -> bool { &self.kind == kind }

    /// Préfixe le message (ex : position `ligne:colonne`).
    #[must_use]
    pub fn with_context(self, prefix: impl fmt::Display) -> Self {
        Self { kind: self.kind, message: Cow::Owned(format!("{prefix}: {}", self.message)) }
    }

    /// `nuvm.IllegalArgument`
    pub fn illegal_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::IllegalArgument, message)
    }

    /// `nuvm.UnexpectedEoF`
    pub fn unexpected_eof(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::UnexpectedEof, message)
    }

    /// `nuvm.InvalidModuleFormat`
    pub fn invalid_module_format(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidModuleFormat, message)
    }

    /// `nuvm.Overflow`
    pub fn overflow(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Overflow, message)
    }

    /// `nuvm.UnexpectedToken`
    pub fn unexpected_token(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::UnexpectedToken, message)
    }

    /// `nuvm.IndexOutOfBounds`
    pub fn index_out_of_bounds(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::IndexOutOfBounds, message)
    }

    /// `nuvm.UnknownOpcode`
    pub fn unknown_opcode(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::UnknownOpcode, message)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Self::unexpected_eof(e.to_string()),
            io::ErrorKind::OutOfMemory => Self::new(ErrorKind::BadAllocation, e.to_string()),
            _ => Self::new(ErrorKind::IoError, e.to_string()),
        }
    }
}

/* ─────────────────────────── Registre des types d'erreur ─────────────────────────── */

fn error_registry() -> &'static Mutex<NameRegistry<ErrorKind>> {
    static REGISTRY: OnceLock<Mutex<NameRegistry<ErrorKind>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut reg = NameRegistry::new();
        for kind in ErrorKind::BUILTIN {
            // noms intégrés : valides et distincts
            let name = kind.name().to_owned();
            let _ = reg.register(&name, kind);
        }
        Mutex::new(reg)
    })
}

/// Déclare un nouveau type d'erreur.
///
/// Échoue avec `InvalidName` si le nom est mal formé, `RepeatedName` s'il existe déjà.
pub fn register_error_type(name: &str) -> Result<ErrorKind> {
    let kind = ErrorKind::Custom(ErrorType(Arc::from(name)));
    error_registry().lock().register(name, kind.clone())?;
    Ok(kind)
}

/// Retrouve un type d'erreur par nom (intégré ou déclaré).
pub fn error_type(name: &str) -> Result<ErrorKind> {
    error_registry().lock().lookup(name).ok_or_else(|| {
        Error::new(ErrorKind::UnknownErrorType, format!("no error type named `{name}`"))
    })
}

/* ─────────────────────────── Tests ─────────────────────────── */
