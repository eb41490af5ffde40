//! Constantes du format binaire de module.
//!
//! ```text
//! u16 num_globals
//! u32 code_size
//! global[num_globals]: u8 kind, puis
//!   0x00 fixnum32  : i32 value
//!   0x01 procedure : u32 entry, u8 num_locals, u8 max_locals, u16 size
//! u8 code[code_size]
//! ```

/// Descripteur de global : fixnum 32 bits.
pub const GLOBAL_FIXNUM32: u8 = 0x00;

/// Descripteur de global : procédure utilisateur.
pub const GLOBAL_PROCEDURE: u8 = 0x01;

/// Taille de l'en-tête (`num_globals` + `code_size`).
pub const HEADER_SIZE: usize = 6;

/// Taille d'une déclaration fixnum32, descripteur compris.
pub const FIXNUM32_DECL_SIZE: usize = 5;

/// Taille d'une déclaration de procédure, descripteur compris.
pub const PROCEDURE_DECL_SIZE: usize = 9;
