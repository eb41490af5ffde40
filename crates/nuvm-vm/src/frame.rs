//! Frame layout over the flat value stack.
//!
//! ```text
//! stack[fp + 0]  caller fp   (-1 dans la frame factice)
//! stack[fp + 1]  local de destination du retour
//! stack[fp + 2]  pc de retour
//! stack[fp + 3…] locaux, puis arguments
//! ```

use nuvm_core::{Error, Result, Value};

/// Marker stored in slot 0 of the outermost frame.
pub const DUMMY_FP: i32 = -1;

/// Bookkeeping slots before the locals.
pub const HEADER_SLOTS: usize = 3;

/// View of the frame starting at `fp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    fp: usize,
}

impl Frame {
    /// Frame whose header sits at `stack[fp]`.
    pub const fn at(fp: usize) -> Self { Self { fp } }

    /// Frame pointer.
    pub const fn fp(self) -> usize { self.fp }

    /// Index of local 0.
    pub const fn locals_base(self) -> usize { self.fp + HEADER_SLOTS }

    /// Caller frame pointer; `None` for the dummy frame.
    pub fn caller_fp(self, stack: &[Value]) -> Result<Option<usize>> {
        let raw = self.slot(stack, 0)?;
        if raw == DUMMY_FP {
            return Ok(None);
        }
        usize::try_from(raw).map(Some).map_err(|_| corrupt(self.fp, "caller fp", raw))
    }

    /// Local of the caller receiving the returned value.
    pub fn return_dest(self, stack: &[Value]) -> Result<u8> {
        let raw = self.slot(stack, 1)?;
        u8::try_from(raw).map_err(|_| corrupt(self.fp, "return destination", raw))
    }

    /// Address execution resumes at after `return`.
    pub fn return_pc(self, stack: &[Value]) -> Result<usize> {
        let raw = self.slot(stack, 2)?;
        usize::try_from(raw).map_err(|_| corrupt(self.fp, "return pc", raw))
    }

    /// Write the three header slots. `caller_fp = None` writes the dummy marker.
    pub fn write_header(self, stack: &mut [Value], caller_fp: Option<usize>, dest: u8, return_pc: usize) -> Result<()> {
        let caller = match caller_fp {
            None => DUMMY_FP,
            Some(fp) => i32::try_from(fp).map_err(|_| Error::overflow(format!("frame pointer {fp} does not fit a slot")))?,
        };
        let pc = i32::try_from(return_pc)
            .map_err(|_| Error::overflow(format!("return address {return_pc} does not fit a slot")))?;
        let header = stack
            .get_mut(self.fp..self.locals_base())
            .ok_or_else(|| Error::overflow(format!("frame at {} does not fit the stack", self.fp)))?;
        header[0] = Value::Fixnum(caller);
        header[1] = Value::Fixnum(i32::from(dest));
        header[2] = Value::Fixnum(pc);
        Ok(())
    }

    fn slot(self, stack: &[Value], i: usize) -> Result<i32> {
        let idx = self.fp + i;
        let v = stack
            .get(idx)
            .ok_or_else(|| Error::index_out_of_bounds(format!("frame slot {idx} is outside the stack")))?;
        v.as_fixnum().ok_or_else(|| Error::illegal_argument(format!("frame slot {idx} holds {v}, not a fixnum")))
    }
}

fn corrupt(fp: usize, what: &str, raw: i32) -> Error {
    Error::illegal_argument(format!("frame at {fp} has an invalid {what}: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuvm_core::ErrorKind;

    #[test]
    fn header_round_trip() -> Result<()> {
        let mut stack = vec![Value::Fixnum(0); 8];
        Frame::at(0).write_header(&mut stack, None, 0, 0)?;
        Frame::at(4).write_header(&mut stack, Some(0), 9, 21)?;
        assert_eq!(stack[0].as_fixnum(), Some(-1));
        assert_eq!(Frame::at(0).caller_fp(&stack)?, None);

        let f = Frame::at(4);
        assert_eq!(f.locals_base(), 7);
        assert_eq!(f.caller_fp(&stack)?, Some(0));
        assert_eq!(f.return_dest(&stack)?, 9);
        assert_eq!(f.return_pc(&stack)?, 21);
        Ok(())
    }

    #[test]
    fn header_past_the_stack_overflows() {
        let mut stack = vec![Value::Fixnum(0); 4];
        let err = Frame::at(2).write_header(&mut stack, Some(0), 0, 0).unwrap_err();
        assert!(err.is(&ErrorKind::Overflow));
    }

    #[test]
    fn corrupt_slots_are_reported() {
        let stack = vec![Value::Fixnum(-7), Value::Fixnum(300), Value::Fixnum(-2)];
        let f = Frame::at(0);
        assert!(f.caller_fp(&stack).unwrap_err().is(&ErrorKind::IllegalArgument));
        assert!(f.return_dest(&stack).unwrap_err().is(&ErrorKind::IllegalArgument));
        assert!(f.return_pc(&stack).unwrap_err().is(&ErrorKind::IllegalArgument));
        assert!(Frame::at(1).return_pc(&stack).unwrap_err().is(&ErrorKind::IndexOutOfBounds));
    }
}
