//! Opcode table: byte values, encoded sizes, mnemonics.

use core::fmt;

use crate::error::{Error, Result};

/// One-byte opcode tag.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// `nop`
    Nop = 0x00,
    /// `halt`
    Halt = 0x01,
    /// `load-i16 dest:u8 value:i16`
    LoadI16 = 0x02,
    /// `jump-unless cond:u8 offset:i16`
    JumpUnless = 0x03,
    /// `jump offset:i16`
    Jump = 0x04,
    /// `call dest:u8 target:u8 n_args:u8 args:u8*`
    Call = 0x05,
    /// `return source:u8`
    Return = 0x06,
    /// `global-ref dest:u8 source:u16`
    GlobalRef = 0x07,
    /// `global-set dest:u16 source:u8`
    GlobalSet = 0x08,
}

impl Opcode {
    /// Every assigned opcode, in byte order.
    pub const ALL: [Opcode; 9] = [
        Opcode::Nop,
        Opcode::Halt,
        Opcode::LoadI16,
        Opcode::JumpUnless,
        Opcode::Jump,
        Opcode::Call,
        Opcode::Return,
        Opcode::GlobalRef,
        Opcode::GlobalSet,
    ];

    /// Decode an opcode byte.
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Opcode::Nop),
            0x01 => Some(Opcode::Halt),
            0x02 => Some(Opcode::LoadI16),
            0x03 => Some(Opcode::JumpUnless),
            0x04 => Some(Opcode::Jump),
            0x05 => Some(Opcode::Call),
            0x06 => Some(Opcode::Return),
            0x07 => Some(Opcode::GlobalRef),
            0x08 => Some(Opcode::GlobalSet),
            _ => None,
        }
    }

    /// Raw byte value.
    pub const fn byte(self) -> u8 { self as u8 }

    /// Fixed encoded size. For `call` this excludes the trailing argument bytes.
    pub const fn size(self) -> usize {
        match self {
            Opcode::Nop | Opcode::Halt => 1,
            Opcode::Return => 2,
            Opcode::Jump => 3,
            Opcode::LoadI16 | Opcode::JumpUnless | Opcode::Call | Opcode::GlobalRef | Opcode::GlobalSet => 4,
        }
    }

    /// Assembler mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Halt => "halt",
            Opcode::LoadI16 => "load-i16",
            Opcode::JumpUnless => "jump-unless",
            Opcode::Jump => "jump",
            Opcode::Call => "call",
            Opcode::Return => "return",
            Opcode::GlobalRef => "global-ref",
            Opcode::GlobalSet => "global-set",
        }
    }

    /// Look an opcode up by mnemonic.
    pub fn from_mnemonic(s: &str) -> Option<Self> { Self::ALL.into_iter().find(|op| op.mnemonic() == s) }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(b: u8) -> Result<Self> {
        Self::from_byte(b).ok_or_else(|| Error::unknown_opcode(format!("unknown opcode 0x{b:02X}")))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.mnemonic()) }
}
