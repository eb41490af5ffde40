//! Parser : texte d'assemblage → `ProtoModule`.
//!
//! ```text
//! module      := value*
//! value       := ".fixnum32" int32
//!              | ".procedure" u8 u8 "{" item* "}"
//! item        := label ":" | instruction
//! ```
//!
//! Les labels sont locaux à leur procédure ; les ancres sont résolues à la `}`.

use indexmap::IndexMap;
use nuvm_core::{Error, Opcode, Result, Span};
use tracing::debug;

use crate::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::module::ProtoModule;
use crate::proto::AnchorId;
use crate::value::ProtoProcedure;

/// Parse a whole source into a proto-module. Anchors are already resolved.
pub fn parse_module(src: &str) -> Result<ProtoModule> { Parser::new(src).parse_module() }

/// Parser récursif descendant sur un [`Lexer`].
#[derive(Debug)]
pub struct Parser<'a> {
    lx: Lexer<'a>,
}

/// Label → (anchor, span de la première mention).
type Labels<'a> = IndexMap<&'a str, (AnchorId, Span)>;

impl<'a> Parser<'a> {
    /// Parser sur `src`.
    pub fn new(src: &'a str) -> Self { Self { lx: Lexer::new(src) } }

    /// `module := value*`
    pub fn parse_module(mut self) -> Result<ProtoModule> {
        let mut module = ProtoModule::new();
        loop {
            let tok = self.lx.next_token()?;
            match tok.value {
                TokenKind::Eof => break,
                TokenKind::Kw(Keyword::Fixnum32) => {
                    let v: i32 = self.integer("fixnum32 value")?;
                    module.add_value(v);
                }
                TokenKind::Kw(Keyword::Procedure) => {
                    let proc = self.procedure()?;
                    module.add_value(proc);
                }
                other => return Err(self.unexpected(&tok, other, "'.fixnum32' or '.procedure'")),
            }
        }
        debug!(globals = module.values().len(), code_size = module.code_size(), "module analysé");
        Ok(module)
    }

    /// `".procedure" u8 u8 "{" item* "}"`, mot-clé déjà consommé.
    fn procedure(&mut self) -> Result<ProtoProcedure> {
        let min: u8 = self.integer("num_locals")?;
        let max: u8 = self.integer("max_locals")?;
        self.expect_lbrace()?;

        let mut proc = ProtoProcedure::new(min, max);
        let mut labels = Labels::new();
        let close = loop {
            let tok = self.lx.next_token()?;
            match tok.value {
                TokenKind::RBrace => break tok,
                TokenKind::Label(name) => {
                    let anchor = anchor_for(&mut proc, &mut labels, name, tok.span)?;
                    let at = self.lx.describe(tok.span.start);
                    if proc.anchors().is_bound(anchor) {
                        return Err(Error::illegal_argument(format!("label '{name}' is defined twice")).with_context(at));
                    }
                    proc.add_anchor(anchor).map_err(|e| e.with_context(at))?;
                }
                TokenKind::Op(op) => self.instruction(op, &mut proc, &mut labels)?,
                TokenKind::Eof => return Err(self.eof("'}' closing the procedure")),
                other => return Err(self.unexpected(&tok, other, "an instruction, a label or '}'")),
            }
        };

        if let Some((name, (_, span))) = labels.iter().find(|(_, (id, _))| !proc.anchors().is_bound(*id)) {
            return Err(Error::illegal_argument(format!("label '{name}' is referenced but never defined"))
                .with_context(self.lx.describe(span.start)));
        }
        proc.resolve_anchors().map_err(|e| e.with_context(self.lx.describe(close.span.start)))?;
        Ok(proc)
    }

    /// Opérandes d'une instruction, mnémonique déjà consommée.
    fn instruction(&mut self, op: Opcode, proc: &mut ProtoProcedure, labels: &mut Labels<'a>) -> Result<()> {
        match op {
            Opcode::Nop => proc.add_nop(),
            Opcode::Halt => proc.add_halt(),
            Opcode::LoadI16 => {
                let dest = self.integer("destination local")?;
                let value = self.integer("16-bit immediate")?;
                proc.add_load_i16(dest, value);
            }
            Opcode::Jump => {
                let anchor = self.anchor_ref(proc, labels)?;
                proc.add_jump(anchor);
            }
            Opcode::JumpUnless => {
                let cond = self.integer("condition local")?;
                let anchor = self.anchor_ref(proc, labels)?;
                proc.add_jump_unless(cond, anchor);
            }
            Opcode::Call => {
                let dest = self.integer("destination local")?;
                let target = self.integer("target local")?;
                let n_args: u8 = self.integer("argument count")?;
                let args = (0..n_args).map(|_| self.integer("argument local")).collect::<Result<Vec<u8>>>()?;
                proc.add_call(dest, target, &args)?;
            }
            Opcode::Return => {
                let source = self.integer("source local")?;
                proc.add_return(source);
            }
            Opcode::GlobalRef => {
                let dest = self.integer("destination local")?;
                let source = self.integer("source global")?;
                proc.add_global_ref(dest, source);
            }
            Opcode::GlobalSet => {
                let dest = self.integer("destination global")?;
                let source = self.integer("source local")?;
                proc.add_global_set(dest, source);
            }
        }
        Ok(())
    }

    /* ───────────── terminaux ───────────── */

    /// Entier borné au type cible ; hors bornes → `UnexpectedToken`.
    fn integer<T: TryFrom<i64>>(&mut self, what: &str) -> Result<T> {
        let tok = self.lx.next_token()?;
        match tok.value {
            TokenKind::Integer(text) => text.parse::<i64>().ok().and_then(|v| T::try_from(v).ok()).ok_or_else(|| {
                Error::unexpected_token(format!("{text} is out of range for {what}"))
                    .with_context(self.lx.describe(tok.span.start))
            }),
            TokenKind::Eof => Err(self.eof(what)),
            other => Err(self.unexpected(&tok, other, what)),
        }
    }

    fn anchor_ref(&mut self, proc: &mut ProtoProcedure, labels: &mut Labels<'a>) -> Result<AnchorId> {
        let tok = self.lx.next_token()?;
        match tok.value {
            TokenKind::AnchorRef(name) => anchor_for(proc, labels, name, tok.span),
            TokenKind::Eof => Err(self.eof("a label reference")),
            other => Err(self.unexpected(&tok, other, "a label reference '@name'")),
        }
    }

    fn expect_lbrace(&mut self) -> Result<()> {
        let tok = self.lx.next_token()?;
        match tok.value {
            TokenKind::LBrace => Ok(()),
            TokenKind::Eof => Err(self.eof("'{'")),
            other => Err(self.unexpected(&tok, other, "'{'")),
        }
    }

    fn unexpected(&self, tok: &Token<'_>, found: TokenKind<'_>, expected: &str) -> Error {
        Error::unexpected_token(format!("expected {expected}, found {found}")).with_context(self.lx.describe(tok.span.start))
    }

    fn eof(&self, expected: &str) -> Error {
        Error::unexpected_eof(format!("expected {expected}, found end of input"))
            .with_context(self.lx.describe(self.lx.last_span().start))
    }
}

/// Ancre associée à `name`, créée à la première mention.
fn anchor_for<'a>(proc: &mut ProtoProcedure, labels: &mut Labels<'a>, name: &'a str, span: Span) -> Result<AnchorId> {
    if let Some((id, _)) = labels.get(name) {
        return Ok(*id);
    }
    let id = proc.create_anchor()?;
    labels.insert(name, (id, span));
    Ok(id)
}

/* ─────────────────────────── Tests ─────────────────────────── */
