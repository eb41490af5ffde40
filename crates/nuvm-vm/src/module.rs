//! Module chargé : table des globales + code.

use nuvm_core::{Error, Opcode, Result, Value};

/// Loaded module. The globals table has a fixed size once built.
#[derive(Debug, Clone)]
pub struct Module {
    globals: Vec<Value>,
    code: Vec<u8>,
    entry_point: u16,
}

impl Module {
    /// Module from its parts; entry point 0.
    pub fn new(globals: Vec<Value>, code: Vec<u8>) -> Self { Self { globals, code, entry_point: 0 } }

    /// `num_globals` fixnum zeros and `code_size` bytes of `nop`.
    pub fn with_sizes(num_globals: usize, code_size: usize) -> Self {
        Self::new(vec![Value::Fixnum(0); num_globals], vec![Opcode::Nop.byte(); code_size])
    }

    /// Number of globals.
    pub fn num_globals(&self) -> usize { self.globals.len() }

    /// All globals.
    pub fn globals(&self) -> &[Value] { &self.globals }

    /// Code buffer.
    pub fn code(&self) -> &[u8] { &self.code }

    /// Code buffer, writable (hosts patching code before a run).
    pub fn code_mut(&mut self) -> &mut [u8] { &mut self.code }

    /// Global `i`.
    pub fn get_global(&self, i: usize) -> Result<&Value> {
        self.globals.get(i).ok_or_else(|| self.out_of_range(i))
    }

    /// Replace global `i`.
    pub fn set_global(&mut self, i: usize, value: Value) -> Result<()> {
        let err = self.out_of_range(i);
        *self.globals.get_mut(i).ok_or(err)? = value;
        Ok(())
    }

    /// Index of the global run by `prepare`.
    pub const fn entry_point(&self) -> u16 { self.entry_point }

    /// Change the entry global.
    pub fn set_entry_point(&mut self, i: u16) -> Result<()> {
        if usize::from(i) >= self.globals.len() {
            return Err(self.out_of_range(usize::from(i)));
        }
        self.entry_point = i;
        Ok(())
    }

    fn out_of_range(&self, i: usize) -> Error {
        Error::index_out_of_bounds(format!("global {i} is out of range for a module with {} globals", self.globals.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuvm_core::{true_value, ErrorKind};

    #[test]
    fn globals_are_bounded() {
        let mut m = Module::with_sizes(2, 4);
        assert_eq!(m.code(), [0, 0, 0, 0]);
        m.set_global(1, true_value()).unwrap();
        assert!(m.get_global(1).unwrap().is_true());
        assert!(m.get_global(2).unwrap_err().is(&ErrorKind::IndexOutOfBounds));
        assert!(m.set_global(2, true_value()).unwrap_err().is(&ErrorKind::IndexOutOfBounds));
    }

    #[test]
    fn entry_point_defaults_to_zero() {
        let mut m = Module::with_sizes(16, 0);
        assert_eq!(m.entry_point(), 0);
        m.set_entry_point(15).unwrap();
        assert_eq!(m.entry_point(), 15);
        assert!(m.set_entry_point(16).unwrap_err().is(&ErrorKind::IndexOutOfBounds));
    }
}
