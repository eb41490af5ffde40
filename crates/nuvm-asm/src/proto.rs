//! Proto-instructions: builder-side instructions whose jumps reference
//! anchors by id until [`ProtoInstruction::resolve`] fixes their offsets.

use std::io::Write;

use nuvm_core::{ByteWriter, Error, Instruction, Opcode, Result};

/// Anchor handle, local to one procedure.
pub type AnchorId = u16;

/* ─────────────────────────── Anchor table ─────────────────────────── */

/// Anchor id → bound code offset. Unbound anchors hold `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchors {
    offsets: Vec<Option<u16>>,
}

impl Anchors {
    /// Empty table.
    pub fn new() -> Self { Self::default() }

    /// Allocate a fresh, unbound anchor.
    pub fn create(&mut self) -> Result<AnchorId> {
        let id = AnchorId::try_from(self.offsets.len())
            .map_err(|_| Error::overflow("too many anchors in one procedure"))?;
        self.offsets.push(None);
        Ok(id)
    }

    /// Bind `id` to `offset`. Each anchor is bound exactly once.
    pub fn bind(&mut self, id: AnchorId, offset: u16) -> Result<()> {
        let slot = self
            .offsets
            .get_mut(usize::from(id))
            .ok_or_else(|| Error::illegal_argument(format!("anchor {id} was never created")))?;
        if let Some(prev) = slot {
            return Err(Error::illegal_argument(format!("anchor {id} is already bound to offset {prev}")));
        }
        *slot = Some(offset);
        Ok(())
    }

    /// Offset bound to `id`.
    pub fn offset_of(&self, id: AnchorId) -> Result<u16> {
        match self.offsets.get(usize::from(id)) {
            Some(Some(offset)) => Ok(*offset),
            Some(None) => Err(Error::illegal_argument(format!("anchor {id} is referenced but never bound"))),
            None => Err(Error::illegal_argument(format!("anchor {id} was never created"))),
        }
    }

    /// True if `id` exists and is bound.
    pub fn is_bound(&self, id: AnchorId) -> bool { matches!(self.offsets.get(usize::from(id)), Some(Some(_))) }

    /// Number of created anchors.
    pub fn len(&self) -> usize { self.offsets.len() }

    /// True if no anchor was created.
    pub fn is_empty(&self) -> bool { self.offsets.is_empty() }
}

/* ─────────────────────────── Proto-instructions ─────────────────────────── */

/// An instruction as held by a procedure under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoInstruction {
    /// Anything that needs no resolution.
    Plain(Instruction),
    /// `jump @anchor`; `offset` is `None` until resolved.
    Jump {
        /// Target anchor.
        anchor: AnchorId,
        /// Resolved relative offset.
        offset: Option<i16>,
    },
    /// `jump-unless cond @anchor`; `offset` is `None` until resolved.
    JumpUnless {
        /// Condition local.
        cond: u8,
        /// Target anchor.
        anchor: AnchorId,
        /// Resolved relative offset.
        offset: Option<i16>,
    },
}

impl ProtoInstruction {
    /// `nop`
    pub const fn nop() -> Self { Self::Plain(Instruction::Nop) }

    /// `halt`
    pub const fn halt() -> Self { Self::Plain(Instruction::Halt) }

    /// `load-i16 dest value`
    pub const fn load_i16(dest: u8, value: i16) -> Self { Self::Plain(Instruction::LoadI16 { dest, value }) }

    /// `jump @anchor`, unresolved.
    pub const fn jump(anchor: AnchorId) -> Self { Self::Jump { anchor, offset: None } }

    /// `jump-unless cond @anchor`, unresolved.
    pub const fn jump_unless(cond: u8, anchor: AnchorId) -> Self { Self::JumpUnless { cond, anchor, offset: None } }

    /// `call dest target args...`
    pub fn call(dest: u8, target: u8, args: &[u8]) -> Result<Self> { Ok(Self::Plain(Instruction::call(dest, target, args)?)) }

    /// `return source`
    pub const fn ret(source: u8) -> Self { Self::Plain(Instruction::Return { source }) }

    /// `global-ref dest source`
    pub const fn global_ref(dest: u8, source: u16) -> Self { Self::Plain(Instruction::GlobalRef { dest, source }) }

    /// `global-set dest source`
    pub const fn global_set(dest: u16, source: u8) -> Self { Self::Plain(Instruction::GlobalSet { dest, source }) }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Plain(instr) => instr.size(),
            Self::Jump { .. } => Opcode::Jump.size(),
            Self::JumpUnless { .. } => Opcode::JumpUnless.size(),
        }
    }

    /// True while a jump still waits for its offset.
    pub const fn is_unresolved(&self) -> bool {
        matches!(self, Self::Jump { offset: None, .. } | Self::JumpUnless { offset: None, .. })
    }

    /// Compute the relative offset of a jump placed at `own_offset`.
    ///
    /// The offset is `anchor_target - own_offset`; a value outside `i16` is an `Overflow`.
    pub fn resolve(&mut self, own_offset: usize, anchors: &Anchors) -> Result<()> {
        let (anchor, slot) = match self {
            Self::Plain(_) => return Ok(()),
            Self::Jump { anchor, offset } | Self::JumpUnless { anchor, offset, .. } => (*anchor, offset),
        };
        let target = i64::from(anchors.offset_of(anchor)?);
        let own = i64::try_from(own_offset).map_err(|_| Error::overflow("instruction offset out of range"))?;
        let relative = i16::try_from(target - own).map_err(|_| {
            Error::overflow(format!("jump from {own} to {target} does not fit a 16-bit offset"))
        })?;
        *slot = Some(relative);
        Ok(())
    }

    /// Final instruction, or `IllegalArgument` if a jump is still unresolved.
    pub fn to_instruction(&self) -> Result<Instruction> {
        match self {
            Self::Plain(instr) => Ok(instr.clone()),
            Self::Jump { offset: Some(offset), .. } => Ok(Instruction::Jump { offset: *offset }),
            Self::JumpUnless { cond, offset: Some(offset), .. } => Ok(Instruction::JumpUnless { cond: *cond, offset: *offset }),
            Self::Jump { anchor, offset: None } | Self::JumpUnless { anchor, offset: None, .. } => {
                Err(Error::illegal_argument(format!("cannot emit a jump to unresolved anchor {anchor}")))
            }
        }
    }

    /// Write the byte encoding.
    pub fn emit<W: Write>(&self, w: &mut ByteWriter<W>) -> Result<()> { self.to_instruction()?.encode(w) }
}

/* ─────────────────────────── Tests ─────────────────────────── */
