//! Proto-values: the globals of a module under construction.
//!
//! Un `ProtoValue` est soit un fixnum 32 bits (déclaration seule, pas de code),
//! soit une procédure (déclaration + code, avec ses propres ancres).

use std::io::Write;

use nuvm_core::format::{FIXNUM32_DECL_SIZE, GLOBAL_FIXNUM32, GLOBAL_PROCEDURE, PROCEDURE_DECL_SIZE};
use nuvm_core::{ByteWriter, Error, Result};
use tracing::trace;

use crate::proto::{AnchorId, Anchors, ProtoInstruction};

/* ─────────────────────────── Procédures ─────────────────────────── */

/// Procedure builder: locals metadata, instruction list, anchor table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoProcedure {
    min_locals: u8,
    max_locals: u8,
    instructions: Vec<ProtoInstruction>,
    anchors: Anchors,
    code_size: usize,
}

impl ProtoProcedure {
    /// Empty procedure with the given locals bounds.
    pub fn new(min_locals: u8, max_locals: u8) -> Self {
        Self { min_locals, max_locals, ..Self::default() }
    }

    /// Declared `num_locals`.
    pub const fn min_locals(&self) -> u8 { self.min_locals }

    /// Declared `max_locals`.
    pub const fn max_locals(&self) -> u8 { self.max_locals }

    /// Instructions in program order.
    pub fn instructions(&self) -> &[ProtoInstruction] { &self.instructions }

    /// Anchor table.
    pub const fn anchors(&self) -> &Anchors { &self.anchors }

    /// Code size in bytes, the sum of the instruction sizes.
    pub const fn code_size(&self) -> usize { self.code_size }

    /// Append any proto-instruction.
    pub fn push(&mut self, instr: ProtoInstruction) {
        self.code_size += instr.size();
        self.instructions.push(instr);
    }

    /// Append `nop`.
    pub fn add_nop(&mut self) { self.push(ProtoInstruction::nop()) }

    /// Append `halt`.
    pub fn add_halt(&mut self) { self.push(ProtoInstruction::halt()) }

    /// Append `load-i16 dest value`.
    pub fn add_load_i16(&mut self, dest: u8, value: i16) { self.push(ProtoInstruction::load_i16(dest, value)) }

    /// Append `jump @anchor`. The anchor may be bound later.
    pub fn add_jump(&mut self, anchor: AnchorId) { self.push(ProtoInstruction::jump(anchor)) }

    /// Append `jump-unless cond @anchor`.
    pub fn add_jump_unless(&mut self, cond: u8, anchor: AnchorId) {
        self.push(ProtoInstruction::jump_unless(cond, anchor))
    }

    /// Append `call dest target args...`.
    pub fn add_call(&mut self, dest: u8, target: u8, args: &[u8]) -> Result<()> {
        self.push(ProtoInstruction::call(dest, target, args)?);
        Ok(())
    }

    /// Append `return source`.
    pub fn add_return(&mut self, source: u8) { self.push(ProtoInstruction::ret(source)) }

    /// Append `global-ref dest source`.
    pub fn add_global_ref(&mut self, dest: u8, source: u16) { self.push(ProtoInstruction::global_ref(dest, source)) }

    /// Append `global-set dest source`.
    pub fn add_global_set(&mut self, dest: u16, source: u8) { self.push(ProtoInstruction::global_set(dest, source)) }

    /// Allocate a fresh anchor id.
    pub fn create_anchor(&mut self) -> Result<AnchorId> { self.anchors.create() }

    /// Bind `anchor` to the offset of the next instruction.
    pub fn add_anchor(&mut self, anchor: AnchorId) -> Result<()> {
        let offset = u16::try_from(self.code_size)
            .map_err(|_| Error::overflow(format!("anchor {anchor} lies past the 16-bit code limit")))?;
        self.anchors.bind(anchor, offset)
    }

    /// Fix the offset of every jump.
    pub fn resolve_anchors(&mut self) -> Result<()> {
        let mut offset = 0usize;
        for instr in &mut self.instructions {
            instr.resolve(offset, &self.anchors)?;
            offset += instr.size();
        }
        trace!(anchors = self.anchors.len(), code_size = self.code_size, "procédure résolue");
        Ok(())
    }

    /// `01 u32 entry u8 min u8 max u16 size`
    pub fn emit_declaration<W: Write>(&self, w: &mut ByteWriter<W>, code_offset: u32) -> Result<()> {
        let size = u16::try_from(self.code_size)
            .map_err(|_| Error::overflow(format!("procedure code of {} bytes exceeds 65535", self.code_size)))?;
        w.write_byte(GLOBAL_PROCEDURE)?;
        w.write_u32(code_offset)?;
        w.write_byte(self.min_locals)?;
        w.write_byte(self.max_locals)?;
        w.write_u16(size)
    }

    /// Emit every instruction in order.
    pub fn emit_code<W: Write>(&self, w: &mut ByteWriter<W>) -> Result<()> {
        self.instructions.iter().try_for_each(|instr| instr.emit(w))
    }
}

/* ─────────────────────────── Valeurs ─────────────────────────── */

/// A global under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoValue {
    /// `.fixnum32 value`
    Fixnum32(i32),
    /// `.procedure min max { ... }`
    Procedure(ProtoProcedure),
}

impl ProtoValue {
    /// Bytes this value contributes to the code section.
    pub const fn code_size(&self) -> usize {
        match self {
            ProtoValue::Fixnum32(_) => 0,
            ProtoValue::Procedure(p) => p.code_size(),
        }
    }

    /// Bytes of the global declaration, descriptor included.
    pub const fn declaration_size(&self) -> usize {
        match self {
            ProtoValue::Fixnum32(_) => FIXNUM32_DECL_SIZE,
            ProtoValue::Procedure(_) => PROCEDURE_DECL_SIZE,
        }
    }

    /// Resolve jumps. No-op for fixnums.
    pub fn resolve_anchors(&mut self) -> Result<()> {
        match self {
            ProtoValue::Fixnum32(_) => Ok(()),
            ProtoValue::Procedure(p) => p.resolve_anchors(),
        }
    }

    /// Write the global declaration; `code_offset` is where this value's code starts.
    pub fn emit_declaration<W: Write>(&self, w: &mut ByteWriter<W>, code_offset: u32) -> Result<()> {
        match self {
            ProtoValue::Fixnum32(v) => {
                w.write_byte(GLOBAL_FIXNUM32)?;
                w.write_i32(*v)
            }
            ProtoValue::Procedure(p) => p.emit_declaration(w, code_offset),
        }
    }

    /// Write the code. No-op for fixnums.
    pub fn emit_code<W: Write>(&self, w: &mut ByteWriter<W>) -> Result<()> {
        match self {
            ProtoValue::Fixnum32(_) => Ok(()),
            ProtoValue::Procedure(p) => p.emit_code(w),
        }
    }
}

impl From<ProtoProcedure> for ProtoValue {
    fn from(p: ProtoProcedure) -> Self { ProtoValue::Procedure(p) }
}

impl From<i32> for ProtoValue {
    fn from(v: i32) -> Self { ProtoValue::Fixnum32(v) }
}

/* ─────────────────────────── Tests ─────────────────────────── */
