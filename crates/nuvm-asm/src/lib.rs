//! nuvm-asm : assembleur nuvm
//!
//! Pipeline : texte → [`lexer`] → [`parser`] → [`ProtoModule`] (ancres résolues) → octets.
//!
//! - [`proto`] : proto-instructions + table d'ancres
//! - [`value`] : `ProtoProcedure` / `ProtoValue`
//! - [`module`] : `ProtoModule`, émission en-tête + déclarations + code
//!
//! ```
//! let bytes = nuvm_asm::assemble(".fixnum32 42").unwrap();
//! assert_eq!(bytes, [1, 0, 0, 0, 0, 0, 0x00, 42, 0, 0, 0]);
//! ```

#![deny(missing_docs)]

pub mod lexer;
pub mod module;
pub mod parser;
pub mod proto;
pub mod value;

pub use lexer::{Keyword, LineMap, Lexer, Token, TokenKind};
pub use module::ProtoModule;
pub use parser::{parse_module, Parser};
pub use proto::{AnchorId, Anchors, ProtoInstruction};
pub use value::{ProtoProcedure, ProtoValue};

use nuvm_core::Result;
use tracing::debug;

/// Parse, resolve and emit `source` as a binary module.
pub fn assemble(source: &str) -> Result<Vec<u8>> {
    let module = parse_module(source)?;
    let bytes = module.to_bytes()?;
    debug!(bytes = bytes.len(), "module assemblé");
    Ok(bytes)
}
