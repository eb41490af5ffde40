//! Chargeur du format binaire de module (little-endian).
//!
//! En cas d'échec, rien de partiel n'est rendu : le `Module` n'est construit
//! qu'une fois globales et code entièrement lus.

use std::io::BufRead;

use nuvm_core::format::{GLOBAL_FIXNUM32, GLOBAL_PROCEDURE};
use nuvm_core::{ByteReader, Error, Procedure, Result, Value};
use tracing::{debug, trace};

use crate::module::Module;

const CHUNK: usize = 4096;

/// Read a whole module: header, globals, code.
pub fn read_module<R: BufRead>(r: &mut ByteReader<R>) -> Result<Module> {
    let num_globals = r.read_u16()?;
    let code_size = r.read_u32()?;
    debug!(num_globals, code_size, "lecture du module");

    let mut globals = Vec::with_capacity(usize::from(num_globals));
    for index in 0..num_globals {
        let global = read_global(r)?;
        trace!(index, global = %global, "globale");
        globals.push(global);
    }

    let code = read_code(r, code_size)?;
    Ok(Module::new(globals, code))
}

/// `read_module` over an in-memory buffer.
pub fn load_module(bytes: &[u8]) -> Result<Module> { read_module(&mut ByteReader::from_slice(bytes)) }

/// One declaration: a kind byte, then its payload.
pub fn read_global<R: BufRead>(r: &mut ByteReader<R>) -> Result<Value> {
    let at = r.position();
    match r.read_byte()? {
        GLOBAL_FIXNUM32 => read_fixnum32_global(r),
        GLOBAL_PROCEDURE => read_procedure_global(r),
        other => Err(Error::invalid_module_format(format!("unrecognized global descriptor 0x{other:02X} at offset {at}"))),
    }
}

/// `i32 value`
pub fn read_fixnum32_global<R: BufRead>(r: &mut ByteReader<R>) -> Result<Value> {
    Ok(Value::wrap_fixnum(r.read_i32()?))
}

/// `u32 entry, u8 num_locals, u8 max_locals, u16 size`
pub fn read_procedure_global<R: BufRead>(r: &mut ByteReader<R>) -> Result<Value> {
    let entry = r.read_u32()?;
    let num_locals = r.read_byte()?;
    let max_locals = r.read_byte()?;
    let size = r.read_u16()?;
    Ok(Value::procedure(Procedure { entry, num_locals, max_locals, size }))
}

/// Le code est lu par blocs : un `code_size` mensonger n'alloue pas d'avance.
fn read_code<R: BufRead>(r: &mut ByteReader<R>, code_size: u32) -> Result<Vec<u8>> {
    let total = code_size as usize;
    let mut code = Vec::with_capacity(total.min(CHUNK));
    let mut buf = [0u8; CHUNK];
    while code.len() < total {
        let want = (total - code.len()).min(CHUNK);
        let got = r.read_bytes(&mut buf[..want])?;
        code.extend_from_slice(&buf[..got]);
        if got < want {
            return Err(Error::unexpected_eof(format!(
                "not enough bytes for the module code: expected {total}, got {}",
                code.len()
            )));
        }
    }
    Ok(code)
}
