//! Évaluateur : boucle fetch/decode/execute sur un module emprunté.
//!
//! Pile plate de `Value` ; chaque frame a un en-tête de trois slots (voir
//! [`crate::frame`]) suivi de ses locaux. `prepare` pousse la frame factice
//! `[-1, 0, 0]` ; un `return` exécuté dans cette frame arrête la machine.
//! Toute erreur remontée par `step` arrête l'évaluateur.

use nuvm_core::{unknown_value, Error, Instruction, Result, Value};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::frame::{Frame, HEADER_SLOTS};
use crate::module::Module;

/* ─────────────────────────── Options ─────────────────────────── */

/// Réglages de l'évaluateur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorOptions {
    /// Nombre de slots de la pile.
    pub stack_size: usize,
    /// Nombre maximal d'arguments d'un `call`.
    pub max_arguments: usize,
    /// `run` s'arrête avec `Overflow` après ce nombre de pas.
    pub step_limit: Option<u64>,
}

impl Default for EvaluatorOptions {
    fn default() -> Self { Self { stack_size: 16_384, max_arguments: 64, step_limit: None } }
}

/* ─────────────────────────── Évaluateur ─────────────────────────── */

/// Machine state over one borrowed module.
#[derive(Debug)]
pub struct Evaluator<'m> {
    module: Option<&'m mut Module>,
    options: EvaluatorOptions,
    stack: Vec<Value>,
    arguments: SmallVec<[Value; 8]>,
    pc: usize,
    sp: usize,
    fp: usize,
    halted: bool,
    steps: u64,
    result: Option<Value>,
}

impl Default for Evaluator<'_> {
    fn default() -> Self { Self::new() }
}

impl<'m> Evaluator<'m> {
    /// Halted evaluator with default options and no module.
    pub fn new() -> Self { Self::with_options(EvaluatorOptions::default()) }

    /// Halted evaluator with explicit options.
    pub fn with_options(options: EvaluatorOptions) -> Self {
        Self {
            module: None,
            options,
            stack: vec![Value::Fixnum(0); options.stack_size.max(HEADER_SLOTS)],
            arguments: SmallVec::new(),
            pc: 0,
            sp: 0,
            fp: 0,
            halted: true,
            steps: 0,
            result: None,
        }
    }

    /// Options in effect.
    pub const fn options(&self) -> &EvaluatorOptions { &self.options }

    /// Bind `module` and set up the dummy frame for its entry procedure.
    pub fn prepare(&mut self, module: &'m mut Module) -> Result<()> {
        let entry = usize::from(module.entry_point());
        let global = module.get_global(entry)?;
        let proc = global.as_procedure().ok_or_else(|| {
            Error::illegal_argument(format!("entry point global {entry} must be a procedure, found {global}"))
        })?;

        let sp = HEADER_SLOTS + usize::from(proc.num_locals);
        if sp > self.stack.len() {
            return Err(Error::overflow(format!("entry frame needs {sp} slots, the stack has {}", self.stack.len())));
        }
        Frame::at(0).write_header(&mut self.stack, None, 0, 0)?;
        self.fp = 0;
        self.sp = sp;
        self.pc = proc.entry as usize;
        self.halted = false;
        self.steps = 0;
        self.result = None;
        self.module = Some(module);
        debug!(entry, pc = self.pc, sp = self.sp, "évaluateur prêt");
        Ok(())
    }

    /// Execute one instruction. Any error halts the evaluator.
    pub fn step(&mut self) -> Result<()> {
        let outcome = self.execute();
        match outcome {
            Ok(()) => self.steps += 1,
            Err(ref e) => {
                self.halted = true;
                debug!(pc = self.pc, error = %e, "arrêt sur erreur");
            }
        }
        outcome
    }

    /// Step until halted; honours `step_limit`.
    pub fn run(&mut self) -> Result<()> {
        while !self.halted {
            if let Some(limit) = self.options.step_limit {
                if self.steps >= limit {
                    self.halted = true;
                    return Err(Error::overflow(format!("step limit of {limit} reached at pc {}", self.pc)));
                }
            }
            self.step()?;
        }
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let instr = Instruction::decode(self.module_ref()?.code(), self.pc)?;
        let size = instr.size();
        trace!(pc = self.pc, sp = self.sp, fp = self.fp, op = %instr.opcode(), "step");

        match instr {
            Instruction::Nop => self.pc += size,
            Instruction::Halt => {
                self.halted = true;
                debug!(pc = self.pc, steps = self.steps, "halt");
            }
            Instruction::LoadI16 { dest, value } => {
                self.set_local(dest, Value::wrap_fixnum(i32::from(value)))?;
                self.pc += size;
            }
            Instruction::Jump { offset } => self.pc = offset_pc(self.pc, offset)?,
            Instruction::JumpUnless { cond, offset } => {
                let c = self.get_local(cond)?;
                if c.is_true() {
                    self.pc = offset_pc(self.pc, offset)?;
                } else if c.is_false() {
                    self.pc += size;
                } else {
                    return Err(Error::illegal_argument(format!(
                        "jump-unless condition in local {cond} must be a boolean, found {c}"
                    )));
                }
            }
            Instruction::Call { dest, target, args } => self.pc = self.call(dest, target, &args, self.pc + size)?,
            Instruction::Return { source } => self.ret(source)?,
            Instruction::GlobalRef { dest, source } => {
                let v = self.get_global(usize::from(source))?;
                self.set_local(dest, v)?;
                self.pc += size;
            }
            Instruction::GlobalSet { dest, source } => {
                let v = self.get_local(source)?;
                self.module_mut()?.set_global(usize::from(dest), v)?;
                self.pc += size;
            }
        }
        Ok(())
    }

    /// Renvoie le nouveau pc.
    fn call(&mut self, dest: u8, target: u8, args: &[u8], next_pc: usize) -> Result<usize> {
        let callable = self.get_local(target)?;
        if callable.as_primitive().is_none() && callable.as_procedure().is_none() {
            return Err(Error::illegal_argument(format!("call target in local {target} is not callable: {callable}")));
        }
        if args.len() > self.options.max_arguments {
            return Err(Error::overflow(format!(
                "call passes {} arguments, the limit is {}",
                args.len(),
                self.options.max_arguments
            )));
        }

        if let Some(func) = callable.as_primitive() {
            self.gather(args)?;
            let result = func(&self.arguments)?;
            self.set_local(dest, result)?;
            trace!(dest, n_args = args.len(), "primitive appelée");
            return Ok(next_pc);
        }

        if let Some(proc) = callable.as_procedure() {
            let frame = Frame::at(self.sp);
            let params = frame.locals_base() + usize::from(proc.num_locals);
            let new_sp = params + args.len();
            if new_sp > self.stack.len() {
                return Err(Error::overflow(format!(
                    "stack overflow: frame at {} needs {new_sp} slots, the stack has {}",
                    self.sp,
                    self.stack.len()
                )));
            }
            self.gather(args)?;
            frame.write_header(&mut self.stack, Some(self.fp), dest, next_pc)?;
            self.stack[params..new_sp].clone_from_slice(&self.arguments);
            self.fp = frame.fp();
            self.sp = new_sp;
            debug!(entry = proc.entry, fp = self.fp, sp = self.sp, "appel de procédure");
            return Ok(proc.entry as usize);
        }

        Err(Error::illegal_argument(format!("call target in local {target} is not callable: {callable}")))
    }

    fn ret(&mut self, source: u8) -> Result<()> {
        let frame = Frame::at(self.fp);
        let Some(caller_fp) = frame.caller_fp(&self.stack)? else {
            self.result = Some(self.get_local(source)?);
            self.halted = true;
            debug!(pc = self.pc, steps = self.steps, "retour de la frame factice");
            return Ok(());
        };
        let return_pc = frame.return_pc(&self.stack)?;
        let dest = frame.return_dest(&self.stack)?;
        let value = self.get_local(source)?;
        let slot = local_index(&self.stack, caller_fp, dest)?;

        self.sp = self.fp;
        self.fp = caller_fp;
        self.stack[slot] = value;
        self.pc = return_pc;
        debug!(pc = self.pc, fp = self.fp, "retour");
        Ok(())
    }

    /// Copie les locaux `args` dans le tampon d'arguments.
    fn gather(&mut self, args: &[u8]) -> Result<()> {
        self.arguments.clear();
        for &a in args {
            let v = self.get_local(a)?;
            self.arguments.push(v);
        }
        Ok(())
    }

    /* ───────────── accès ───────────── */

    /// Global `i` of the bound module.
    pub fn get_global(&self, i: usize) -> Result<Value> { self.module_ref()?.get_global(i).cloned() }

    /// Local `i` of the active frame.
    pub fn get_local(&self, i: u8) -> Result<Value> {
        let slot = local_index(&self.stack, self.fp, i)?;
        Ok(self.stack[slot].clone())
    }

    /// Overwrite local `i` of the active frame.
    pub fn set_local(&mut self, i: u8, value: Value) -> Result<()> {
        let slot = local_index(&self.stack, self.fp, i)?;
        self.stack[slot] = value;
        Ok(())
    }

    /// Value returned by the entry procedure, `unknown` until it returns.
    pub fn return_value(&self) -> Value { self.result.clone().unwrap_or_else(unknown_value) }

    /// Program counter.
    pub const fn pc(&self) -> usize { self.pc }

    /// Stack pointer.
    pub const fn sp(&self) -> usize { self.sp }

    /// Frame pointer.
    pub const fn fp(&self) -> usize { self.fp }

    /// True when stopped.
    pub const fn halted(&self) -> bool { self.halted }

    /// Instructions executed since `prepare`.
    pub const fn steps(&self) -> u64 { self.steps }

    /// Raw stack slot.
    pub fn stack_slot(&self, i: usize) -> Option<&Value> { self.stack.get(i) }

    /// Bound module, if prepared.
    pub fn module(&self) -> Option<&Module> { self.module.as_deref() }

    fn module_ref(&self) -> Result<&Module> {
        self.module.as_deref().ok_or_else(|| Error::illegal_argument("evaluator has no prepared module"))
    }

    fn module_mut(&mut self) -> Result<&mut Module> {
        self.module.as_deref_mut().ok_or_else(|| Error::illegal_argument("evaluator has no prepared module"))
    }
}

fn local_index(stack: &[Value], fp: usize, i: u8) -> Result<usize> {
    let slot = Frame::at(fp).locals_base() + usize::from(i);
    if slot < stack.len() {
        Ok(slot)
    } else {
        Err(Error::index_out_of_bounds(format!("local {i} of frame {fp} is outside the stack")))
    }
}

fn offset_pc(pc: usize, offset: i16) -> Result<usize> {
    pc.checked_add_signed(isize::from(offset))
        .ok_or_else(|| Error::index_out_of_bounds(format!("jump from {pc} by {offset} leaves the code")))
}

/* ─────────────────────────── Tests ─────────────────────────── */
