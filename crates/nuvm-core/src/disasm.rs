//! Minimal textual disassembly of a code buffer.

use core::fmt::Write;

use crate::instruction::Instruction;

/// Disassemble the whole buffer, one instruction per line.
pub fn disassemble_code(code: &[u8]) -> String {
    let mut out = String::new();
    disassemble_range(code, 0, code.len(), &mut out);
    out
}

/// Disassemble `code[start..end]` into `out`. Offsets stay absolute.
///
/// Bytes that do not decode are listed as `.byte 0xNN` and skipped one at a time.
pub fn disassemble_range(code: &[u8], start: usize, end: usize, out: &mut String) {
    let end = end.min(code.len());
    let mut pc = start;
    while pc < end {
        match Instruction::decode(&code[..end], pc) {
            Ok(instr) => {
                let _ = writeln!(out, "{pc:04}: {}", render(&instr, pc));
                pc += instr.size();
            }
            Err(_) => {
                let _ = writeln!(out, "{pc:04}: .byte 0x{:02X}", code[pc]);
                pc += 1;
            }
        }
    }
}

/// Render one instruction in assembler syntax. Jumps also show their absolute target.
pub fn render(instr: &Instruction, pc: usize) -> String {
    let op = instr.opcode();
    match instr {
        Instruction::Nop | Instruction::Halt => op.to_string(),
        Instruction::LoadI16 { dest, value } => format!("{op} {dest} {value}"),
        Instruction::JumpUnless { cond, offset } => format!("{op} {cond} {offset} ; -> {}", target(pc, *offset)),
        Instruction::Jump { offset } => format!("{op} {offset} ; -> {}", target(pc, *offset)),
        Instruction::Call { dest, target, args } => {
            let mut s = format!("{op} {dest} {target} {}", args.len());
            for a in args {
                let _ = write!(s, " {a}");
            }
            s
        }
        Instruction::Return { source } => format!("{op} {source}"),
        Instruction::GlobalRef { dest, source } => format!("{op} {dest} {source}"),
        Instruction::GlobalSet { dest, source } => format!("{op} {dest} {source}"),
    }
}

fn target(pc: usize, offset: i16) -> String {
    i64::try_from(pc).map_or_else(|_| "?".to_owned(), |pc| format!("{:04}", pc + i64::from(offset)))
}
