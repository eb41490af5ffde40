//! Decoded instruction form plus its byte-exact encoder/decoder.

use std::io::Write;

use smallvec::SmallVec;

use crate::bytes::{ByteReader, ByteWriter};
use crate::error::{Error, Result};
use crate::opcode::Opcode;

/// Argument-index list of a `call`.
pub type CallArgs = SmallVec<[u8; 8]>;

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// No operation.
    Nop,
    /// Stop the evaluator.
    Halt,
    /// `locals[dest] = value`
    LoadI16 {
        /// Destination local.
        dest: u8,
        /// Immediate value.
        value: i16,
    },
    /// Relative jump when `locals[cond]` is `True`, fall through on `False`.
    JumpUnless {
        /// Condition local.
        cond: u8,
        /// Offset from the start of this instruction.
        offset: i16,
    },
    /// Unconditional relative jump.
    Jump {
        /// Offset from the start of this instruction.
        offset: i16,
    },
    /// Call `locals[target]` with the listed locals as arguments.
    Call {
        /// Local receiving the result.
        dest: u8,
        /// Local holding the callee.
        target: u8,
        /// Argument locals.
        args: CallArgs,
    },
    /// Return `locals[source]` to the caller.
    Return {
        /// Returned local.
        source: u8,
    },
    /// `locals[dest] = globals[source]`
    GlobalRef {
        /// Destination local.
        dest: u8,
        /// Source global.
        source: u16,
    },
    /// `globals[dest] = locals[source]`
    GlobalSet {
        /// Destination global.
        dest: u16,
        /// Source local.
        source: u8,
    },
}

impl Instruction {
    /// Build a `call`, rejecting argument lists that do not fit the `n_args` byte.
    pub fn call(dest: u8, target: u8, args: &[u8]) -> Result<Self> {
        if args.len() > usize::from(u8::MAX) {
            return Err(Error::overflow(format!("call takes at most 255 arguments, got {}", args.len())));
        }
        Ok(Instruction::Call { dest, target, args: SmallVec::from_slice(args) })
    }

    /// Opcode tag.
    pub const fn opcode(&self) -> Opcode {
        match self {
            Instruction::Nop => Opcode::Nop,
            Instruction::Halt => Opcode::Halt,
            Instruction::LoadI16 { .. } => Opcode::LoadI16,
            Instruction::JumpUnless { .. } => Opcode::JumpUnless,
            Instruction::Jump { .. } => Opcode::Jump,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Return { .. } => Opcode::Return,
            Instruction::GlobalRef { .. } => Opcode::GlobalRef,
            Instruction::GlobalSet { .. } => Opcode::GlobalSet,
        }
    }

    /// Encoded size in bytes, argument bytes included.
    pub fn size(&self) -> usize {
        match self {
            Instruction::Call { args, .. } => Opcode::Call.size() + args.len(),
            other => other.opcode().size(),
        }
    }

    /// Decode the instruction starting at `code[pc]`.
    ///
    /// Fails with `IndexOutOfBounds` when `pc` is past the end, `UnknownOpcode`
    /// for an unassigned byte and `UnexpectedEoF` for truncated operands.
    pub fn decode(code: &[u8], pc: usize) -> Result<Self> {
        let bytes = code
            .get(pc..)
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| Error::index_out_of_bounds(format!("pc {pc} is outside code of {} bytes", code.len())))?;
        let op = Opcode::try_from(bytes[0])?;
        let mut r = ByteReader::from_slice(&bytes[1..]);
        let instr = match op {
            Opcode::Nop => Instruction::Nop,
            Opcode::Halt => Instruction::Halt,
            Opcode::LoadI16 => Instruction::LoadI16 { dest: r.read_byte()?, value: r.read_i16()? },
            Opcode::JumpUnless => Instruction::JumpUnless { cond: r.read_byte()?, offset: r.read_i16()? },
            Opcode::Jump => Instruction::Jump { offset: r.read_i16()? },
            Opcode::Call => {
                let dest = r.read_byte()?;
                let target = r.read_byte()?;
                let n_args = usize::from(r.read_byte()?);
                let mut args: CallArgs = SmallVec::from_elem(0, n_args);
                if r.read_bytes(&mut args)? != n_args {
                    return Err(Error::unexpected_eof(format!(
                        "call at {pc} declares {n_args} arguments past the end of code"
                    )));
                }
                Instruction::Call { dest, target, args }
            }
            Opcode::Return => Instruction::Return { source: r.read_byte()? },
            Opcode::GlobalRef => Instruction::GlobalRef { dest: r.read_byte()?, source: r.read_u16()? },
            Opcode::GlobalSet => Instruction::GlobalSet { dest: r.read_u16()?, source: r.read_byte()? },
        };
        Ok(instr)
    }

    /// Write the byte encoding.
    pub fn encode<W: Write>(&self, w: &mut ByteWriter<W>) -> Result<()> {
        w.write_byte(self.opcode().byte())?;
        match self {
            Instruction::Nop | Instruction::Halt => {}
            Instruction::LoadI16 { dest, value } => {
                w.write_byte(*dest)?;
                w.write_i16(*value)?;
            }
            Instruction::JumpUnless { cond, offset } => {
                w.write_byte(*cond)?;
                w.write_i16(*offset)?;
            }
            Instruction::Jump { offset } => w.write_i16(*offset)?,
            Instruction::Call { dest, target, args } => {
                let n_args = u8::try_from(args.len())
                    .map_err(|_| Error::overflow(format!("call takes at most 255 arguments, got {}", args.len())))?;
                w.write_byte(*dest)?;
                w.write_byte(*target)?;
                w.write_byte(n_args)?;
                w.write_bytes(args)?;
            }
            Instruction::Return { source } => w.write_byte(*source)?,
            Instruction::GlobalRef { dest, source } => {
                w.write_byte(*dest)?;
                w.write_u16(*source)?;
            }
            Instruction::GlobalSet { dest, source } => {
                w.write_u16(*dest)?;
                w.write_byte(*source)?;
            }
        }
        Ok(())
    }

    /// Relative offset of a jump, if any.
    pub const fn jump_offset(&self) -> Option<i16> {
        match self {
            Instruction::Jump { offset } | Instruction::JumpUnless { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn encode(instr: &Instruction) -> Vec<u8> {
        let mut w = ByteWriter::in_memory();
        instr.encode(&mut w).unwrap();
        w.into_inner()
    }

    #[test]
    fn byte_layouts() {
        assert_eq!(encode(&Instruction::Nop), [0x00]);
        assert_eq!(encode(&Instruction::Halt), [0x01]);
        assert_eq!(encode(&Instruction::LoadI16 { dest: 3, value: -2 }), [0x02, 3, 0xFE, 0xFF]);
        assert_eq!(encode(&Instruction::JumpUnless { cond: 17, offset: 34 }), [0x03, 17, 34, 0]);
        assert_eq!(encode(&Instruction::Jump { offset: -21 }), [0x04, 0xEB, 0xFF]);
        assert_eq!(encode(&Instruction::call(7, 1, &[8, 13, 21]).unwrap()), [0x05, 7, 1, 3, 8, 13, 21]);
        assert_eq!(encode(&Instruction::Return { source: 42 }), [0x06, 42]);
        assert_eq!(encode(&Instruction::GlobalRef { dest: 127, source: 32767 }), [0x07, 127, 0xFF, 0x7F]);
        assert_eq!(encode(&Instruction::GlobalSet { dest: 12345, source: 29 }), [0x08, 0x39, 0x30, 29]);
    }

    #[test]
    fn sizes_follow_the_table() {
        assert_eq!(Instruction::Nop.size(), 1);
        assert_eq!(Instruction::Jump { offset: 0 }.size(), 3);
        assert_eq!(Instruction::Return { source: 0 }.size(), 2);
        assert_eq!(Instruction::call(0, 0, &[4, 5, 6]).unwrap().size(), 7);
    }

    #[test]
    fn decode_at_offset() -> Result<()> {
        let code = [0x00, 0x00, 0x05, 9, 2, 2, 0, 1, 0x01];
        assert_eq!(Instruction::decode(&code, 1)?, Instruction::Nop);
        assert_eq!(Instruction::decode(&code, 2)?, Instruction::call(9, 2, &[0, 1])?);
        assert_eq!(Instruction::decode(&code, 8)?, Instruction::Halt);
        Ok(())
    }

    #[test]
    fn decode_failures() {
        assert!(Instruction::decode(&[0x42], 0).unwrap_err().is(&ErrorKind::UnknownOpcode));
        assert!(Instruction::decode(&[0x02, 1], 0).unwrap_err().is(&ErrorKind::UnexpectedEof));
        assert!(Instruction::decode(&[0x05, 0, 0, 3, 1], 0).unwrap_err().is(&ErrorKind::UnexpectedEof));
        assert!(Instruction::decode(&[0x00], 1).unwrap_err().is(&ErrorKind::IndexOutOfBounds));
    }

    #[test]
    fn call_rejects_too_many_arguments() {
        let args = [0u8; 256];
        assert!(Instruction::call(0, 0, &args).unwrap_err().is(&ErrorKind::Overflow));
    }

    fn round_trip(instr: &Instruction) -> Instruction {
        let bytes = encode(instr);
        assert_eq!(bytes.len(), instr.size());
        Instruction::decode(&bytes, 0).unwrap()
    }

    #[test]
    fn operand_bounds_survive_a_round_trip() {
        let cases = [
            Instruction::Nop,
            Instruction::Halt,
            Instruction::LoadI16 { dest: u8::MAX, value: i16::MIN },
            Instruction::Jump { offset: i16::MIN },
            Instruction::Jump { offset: i16::MAX },
            Instruction::JumpUnless { cond: u8::MAX, offset: i16::MIN },
            Instruction::JumpUnless { cond: 0, offset: i16::MAX },
            Instruction::Return { source: u8::MAX },
            Instruction::GlobalRef { dest: u8::MAX, source: u16::MAX },
            Instruction::GlobalSet { dest: u16::MAX, source: u8::MAX },
            Instruction::call(u8::MAX, u8::MAX, &[u8::MAX; 255]).unwrap(),
        ];
        for instr in cases {
            assert_eq!(round_trip(&instr), instr);
        }
    }

    proptest! {
        #[test]
        fn jump_decodes_what_it_encodes(offset in any::<i16>()) {
            let instr = Instruction::Jump { offset };
            prop_assert_eq!(round_trip(&instr), instr);
        }

        #[test]
        fn jump_unless_decodes_what_it_encodes(cond in any::<u8>(), offset in any::<i16>()) {
            let instr = Instruction::JumpUnless { cond, offset };
            prop_assert_eq!(round_trip(&instr), instr);
        }

        #[test]
        fn return_decodes_what_it_encodes(source in any::<u8>()) {
            let instr = Instruction::Return { source };
            prop_assert_eq!(round_trip(&instr), instr);
        }

        #[test]
        fn global_ref_decodes_what_it_encodes(dest in any::<u8>(), source in any::<u16>()) {
            let instr = Instruction::GlobalRef { dest, source };
            prop_assert_eq!(round_trip(&instr), instr);
        }

        #[test]
        fn global_set_decodes_what_it_encodes(dest in any::<u16>(), source in any::<u8>()) {
            let instr = Instruction::GlobalSet { dest, source };
            prop_assert_eq!(round_trip(&instr), instr);
        }

        #[test]
        fn load_i16_decodes_what_it_encodes(dest in any::<u8>(), value in any::<i16>()) {
            let instr = Instruction::LoadI16 { dest, value };
            let bytes = encode(&instr);
            prop_assert_eq!(bytes.len(), instr.size());
            prop_assert_eq!(Instruction::decode(&bytes, 0).unwrap(), instr);
        }

        #[test]
        fn call_decodes_what_it_encodes(dest in any::<u8>(), target in any::<u8>(), args in proptest::collection::vec(any::<u8>(), 0..16)) {
            let instr = Instruction::call(dest, target, &args).unwrap();
            let bytes = encode(&instr);
            prop_assert_eq!(bytes.len(), 4 + args.len());
            prop_assert_eq!(Instruction::decode(&bytes, 0).unwrap(), instr);
        }
    }
}
