//! nuvm-core : primitives partagées de la VM nuvm
//!
//! Fournit :
//! - `Value` : fixnum immédiat ou référence d'objet (booléens, `Unknown`, primitives, procédures)
//! - `Type` + registre global des types, `NameRegistry` générique
//! - Erreurs nommées `Error` / `ErrorKind` + alias `Result<T>` + registre des types d'erreur
//! - IO little-endian : `ByteReader` (sur `BufRead`), `ByteWriter` (sur `Write`)
//! - Constantes du format de module (`format`)
//! - Table des opcodes, `Instruction` (encodage/décodage à l'octet près), désassembleur
//! - `Pos`, `Span`, `Spanned<T>` pour les diagnostics de l'assembleur

#![deny(missing_docs)]

/* ─────────────────────────── Modules publics ─────────────────────────── */

pub mod bytes;
pub mod disasm;
pub mod error;
pub mod format;
pub mod instruction;
pub mod opcode;
pub mod registry;
pub mod types;
pub mod value;

pub use bytes::{ByteReader, ByteWriter};
pub use error::{error_type, register_error_type, Error, ErrorKind, ErrorType, Result};
pub use instruction::{CallArgs, Instruction};
pub use opcode::Opcode;
pub use registry::{is_valid_name, NameRegistry};
pub use types::{builtins, lookup_type, register_type, Type, TypeRegistry};
pub use value::{false_value, true_value, unknown_value, Object, ObjectKind, PrimitiveFn, Procedure, Value};

/* ─────────────────────────── Spans / Positions ─────────────────────────── */

/// Position (offset byte) depuis le début de la source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pos(pub u32);

/// Plage (demi-ouverte) `[start, end)` dans une source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Début inclus.
    pub start: Pos,
    /// Fin exclue.
    pub end: Pos,
}

impl Span {
    /// Crée un span.
    pub const fn new(start: Pos, end: Pos) -> Self { Self { start, end } }
    /// Longueur en bytes.
    pub const fn len(&self) -> u32 { self.end.0.saturating_sub(self.start.0) }
    /// Vrai si le span est vide.
    pub const fn is_empty(&self) -> bool { self.start.0 >= self.end.0 }
}

/// Wrapper utilitaire « valeur + span ».
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    /// La valeur.
    pub value: T,
    /// La localisation.
    pub span: Span,
}

impl<T> Spanned<T> {
    /// Construit un `Spanned<T>`.
    pub const fn new(value: T, span: Span) -> Self { Self { value, span } }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_len() {
        let sp = Span::new(Pos(3), Pos(10));
        assert_eq!(sp.len(), 7);
        assert!(!sp.is_empty());
        assert!(Span::new(Pos(4), Pos(4)).is_empty());
    }
}
