//! Proto-module: ordered proto-values, emitted as a complete binary module.

use std::io::Write;

use nuvm_core::format::HEADER_SIZE;
use nuvm_core::{ByteWriter, Error, Result};
use tracing::debug;

use crate::value::ProtoValue;

/// Module under construction. Value `i` becomes global `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoModule {
    values: Vec<ProtoValue>,
}

impl ProtoModule {
    /// Empty module.
    pub fn new() -> Self { Self::default() }

    /// Append a value; returns its global index.
    pub fn add_value(&mut self, value: impl Into<ProtoValue>) -> usize {
        self.values.push(value.into());
        self.values.len() - 1
    }

    /// Values in global order.
    pub fn values(&self) -> &[ProtoValue] { &self.values }

    /// Resolve anchors of every value.
    pub fn resolve_anchors(&mut self) -> Result<()> {
        for (index, value) in self.values.iter_mut().enumerate() {
            value.resolve_anchors().map_err(|e| e.with_context(format_args!("global {index}")))?;
        }
        Ok(())
    }

    /// Total code section size.
    pub fn code_size(&self) -> usize { self.values.iter().map(ProtoValue::code_size).sum() }

    /// Size of the emitted module in bytes.
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.values.iter().map(|v| v.declaration_size() + v.code_size()).sum::<usize>()
    }

    /// Header, declarations with cumulative code offsets, then code.
    pub fn emit<W: Write>(&self, w: &mut ByteWriter<W>) -> Result<()> {
        let num_globals = u16::try_from(self.values.len())
            .map_err(|_| Error::overflow(format!("{} globals exceed the 65535 limit", self.values.len())))?;
        let code_size = u32::try_from(self.code_size())
            .map_err(|_| Error::overflow("code section exceeds the 32-bit size limit"))?;
        debug!(num_globals, code_size, "émission du module");

        w.write_u16(num_globals)?;
        w.write_u32(code_size)?;

        let mut offset = 0u32;
        for value in &self.values {
            value.emit_declaration(w, offset)?;
            // code_size a déjà été borné en u32
            offset += value.code_size() as u32;
        }
        for value in &self.values {
            value.emit_code(w)?;
        }
        w.flush()
    }

    /// `emit` into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new(Vec::with_capacity(self.size()));
        self.emit(&mut w)?;
        Ok(w.into_inner())
    }
}
