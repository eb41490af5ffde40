//! Tokenizer du langage d'assemblage nuvm.
//!
//! - blancs ignorés, `;` commente jusqu'à la fin de ligne
//! - `{` `}`, entiers `-?[0-9]+`, mots-clés `.fixnum32` / `.procedure`
//! - mnémoniques d'opcode, labels `name:` et références `@name`
//! - `LineMap` pour rapporter `ligne:colonne`

use core::fmt;

use nuvm_core::{Error, Opcode, Pos, Result, Span, Spanned};

/* ─────────────────────────── LineMap ─────────────────────────── */

/// Table des débuts de lignes, pour (byte offset) → (ligne, colonne).
#[derive(Debug, Clone)]
pub struct LineMap {
    line_starts: Vec<u32>,
}

impl LineMap {
    /// Construit la table à partir d'un `&str`.
    pub fn new(src: &str) -> Self {
        let mut starts = vec![0];
        // au-delà de u32::MAX, `Lexer` refuse les positions : ces lignes ne sont jamais interrogées
        starts.extend(src.bytes().enumerate().filter(|(_, b)| *b == b'\n').map_while(|(i, _)| u32::try_from(i + 1).ok()));
        Self { line_starts: starts }
    }

    /// Convertit un `Pos` en (ligne, colonne), 1-based.
    pub fn line_col(&self, pos: Pos) -> (u32, u32) {
        let idx = match self.line_starts.binary_search(&pos.0) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let col = pos.0.saturating_sub(self.line_starts[idx]) + 1;
        (u32::try_from(idx).map_or(u32::MAX, |i| i.saturating_add(1)), col)
    }
}

/* ─────────────────────────── Tokens ─────────────────────────── */

/// Mots-clés de déclaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `.fixnum32`
    Fixnum32,
    /// `.procedure`
    Procedure,
}

/// Genre de jeton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'a> {
    /// Fin de source.
    Eof,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// Littéral entier, texte brut (signe compris).
    Integer(&'a str),
    /// `.fixnum32` / `.procedure`
    Kw(Keyword),
    /// Mnémonique d'instruction.
    Op(Opcode),
    /// Définition `name:` (sans le `:`).
    Label(&'a str),
    /// Référence `@name` (sans le `@`).
    AnchorRef(&'a str),
}

impl TokenKind<'_> {
    /// Nom lisible, pour les diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            TokenKind::Eof => "end of input",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Integer(_) => "integer",
            TokenKind::Kw(Keyword::Fixnum32) => "'.fixnum32'",
            TokenKind::Kw(Keyword::Procedure) => "'.procedure'",
            TokenKind::Op(_) => "instruction",
            TokenKind::Label(_) => "label",
            TokenKind::AnchorRef(_) => "label reference",
        }
    }
}

impl fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(s) => write!(f, "integer {s}"),
            TokenKind::Op(op) => write!(f, "instruction '{op}'"),
            TokenKind::Label(s) => write!(f, "label '{s}:'"),
            TokenKind::AnchorRef(s) => write!(f, "label reference '@{s}'"),
            other => f.write_str(other.name()),
        }
    }
}

/// Jeton avec span.
pub type Token<'a> = Spanned<TokenKind<'a>>;

/* ─────────────────────────── Lexer ─────────────────────────── */

fn pos(off: usize) -> Result<Pos> {
    u32::try_from(off).map(Pos).map_err(|_| Error::overflow(format!("source offset {off} exceeds the 32-bit position limit")))
}

/// Analyseur lexical (itératif).
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    off: usize,
    last: Span,
    /// Table des lignes (exposée pour diagnostics).
    pub lines: LineMap,
}

impl<'a> Lexer<'a> {
    /// Crée un lexer sur `src`.
    pub fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), off: 0, last: Span::default(), lines: LineMap::new(src) }
    }

    /// Prochain jeton ; `Eof` indéfiniment une fois la source épuisée.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        self.skip_ws_and_comments();
        let start = self.off;
        let kind = match self.bytes.get(start) {
            None => TokenKind::Eof,
            Some(b'{') => {
                self.off += 1;
                TokenKind::LBrace
            }
            Some(b'}') => {
                self.off += 1;
                TokenKind::RBrace
            }
            Some(_) => {
                while self.off < self.bytes.len() && !is_delimiter(self.bytes[self.off]) {
                    self.off += 1;
                }
                self.classify(start)?
            }
        };
        self.last = Span::new(pos(start)?, pos(self.off)?);
        Ok(Spanned::new(kind, self.last))
    }

    /// Vrai s'il reste un jeton autre que `Eof`.
    pub fn has_more_tokens(&mut self) -> bool {
        self.skip_ws_and_comments();
        self.off < self.bytes.len()
    }

    /// Texte source du dernier jeton lu.
    pub fn last_token_text(&self) -> &'a str { &self.src[self.last.start.0 as usize..self.last.end.0 as usize] }

    /// Span du dernier jeton lu.
    pub const fn last_span(&self) -> Span { self.last }

    /// Tokenise toute l'entrée (inclut `Eof` final).
    pub fn tokenize(mut self) -> Result<Vec<Token<'a>>> {
        let mut out = Vec::new();
        loop {
            let t = self.next_token()?;
            let eof = t.value == TokenKind::Eof;
            out.push(t);
            if eof {
                break;
            }
        }
        Ok(out)
    }

    /// `ligne:colonne` d'une position.
    pub fn describe(&self, pos: Pos) -> String {
        let (line, col) = self.lines.line_col(pos);
        format!("{line}:{col}")
    }

    /* ───────────── helpers ───────────── */

    fn skip_ws_and_comments(&mut self) {
        while let Some(&b) = self.bytes.get(self.off) {
            if b.is_ascii_whitespace() {
                self.off += 1;
            } else if b == b';' {
                while self.off < self.bytes.len() && self.bytes[self.off] != b'\n' {
                    self.off += 1;
                }
            } else {
                break;
            }
        }
    }

    fn classify(&self, start: usize) -> Result<TokenKind<'a>> {
        let word = &self.src[start..self.off];
        let kind = if is_integer(word) {
            Some(TokenKind::Integer(word))
        } else if let Some(name) = word.strip_prefix('@') {
            is_label_name(name).then_some(TokenKind::AnchorRef(name))
        } else if let Some(name) = word.strip_suffix(':') {
            is_label_name(name).then_some(TokenKind::Label(name))
        } else {
            match word {
                ".fixnum32" => Some(TokenKind::Kw(Keyword::Fixnum32)),
                ".procedure" => Some(TokenKind::Kw(Keyword::Procedure)),
                _ => Opcode::from_mnemonic(word).map(TokenKind::Op),
            }
        };
        kind.ok_or_else(|| {
            Error::unexpected_token(format!("unrecognized token '{word}'")).with_context(self.describe(Pos(start as u32)))
        })
    }
}

const fn is_delimiter(b: u8) -> bool { b.is_ascii_whitespace() || matches!(b, b'{' | b'}' | b';') }

fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_label_name(s: &str) -> bool {
    let mut bytes = s.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use nuvm_core::ErrorKind;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind<'_>> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn empty_and_blank_sources_are_eof() {
        assert_eq!(kinds(""), [TokenKind::Eof]);
        assert_eq!(kinds("  \n \t \n \n \t  "), [TokenKind::Eof]);
        assert!(!Lexer::new(" \n ").has_more_tokens());
        assert!(Lexer::new("{").has_more_tokens());
    }

    #[test]
    fn ignores_spaces() {
        assert_eq!(kinds(" \n\t { \t\n "), [TokenKind::LBrace, TokenKind::Eof]);
    }

    #[test]
    fn integers_keep_their_text() {
        for text in ["0", "01234", "10588", "-123456789"] {
            let mut lx = Lexer::new(text);
            assert_eq!(lx.next_token().unwrap().value, TokenKind::Integer(text));
            assert_eq!(lx.last_token_text(), text);
            assert_eq!(lx.next_token().unwrap().value, TokenKind::Eof);
        }
    }

    #[test]
    fn punctuation_keywords_and_mnemonics() {
        assert_eq!(
            kinds("{ } .fixnum32 .procedure"),
            [
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Kw(Keyword::Fixnum32),
                TokenKind::Kw(Keyword::Procedure),
                TokenKind::Eof
            ]
        );
        for op in Opcode::ALL {
            assert_eq!(kinds(op.mnemonic()), [TokenKind::Op(op), TokenKind::Eof]);
        }
    }

    #[test]
    fn braces_need_no_spacing() {
        assert_eq!(
            kinds("{nop}"),
            [TokenKind::LBrace, TokenKind::Op(Opcode::Nop), TokenKind::RBrace, TokenKind::Eof]
        );
    }

    #[test]
    fn labels_and_references() {
        assert_eq!(
            kinds("loop: jump @loop"),
            [TokenKind::Label("loop"), TokenKind::Op(Opcode::Jump), TokenKind::AnchorRef("loop"), TokenKind::Eof]
        );
        assert_eq!(kinds("_a.b-1:"), [TokenKind::Label("_a.b-1"), TokenKind::Eof]);
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("nop ; halt {\n; }\nreturn 0;trailing"),
            [TokenKind::Op(Opcode::Nop), TokenKind::Op(Opcode::Return), TokenKind::Integer("0"), TokenKind::Eof]
        );
    }

    #[test]
    fn reads_sequence_of_tokens() {
        assert_eq!(
            kinds("  123 halt .procedure  "),
            [TokenKind::Integer("123"), TokenKind::Op(Opcode::Halt), TokenKind::Kw(Keyword::Procedure), TokenKind::Eof]
        );
    }

    #[test]
    fn spans_and_positions() {
        let mut lx = Lexer::new("nop\n  halt");
        lx.next_token().unwrap();
        let t = lx.next_token().unwrap();
        assert_eq!(t.span, Span::new(Pos(6), Pos(10)));
        assert_eq!(lx.lines.line_col(t.span.start), (2, 3));
        assert_eq!(lx.last_token_text(), "halt");
    }

    #[test]
    fn rejects_unknown_words() {
        for bad in ["jmp", "12a", "-", "@", "@1x", ":", ".fixnum", "1:"] {
            let err = Lexer::new(bad).next_token().unwrap_err();
            assert!(err.is(&ErrorKind::UnexpectedToken), "{bad}: {err}");
        }
        let err = Lexer::new("nop\n  bogus").tokenize().unwrap_err();
        assert!(err.message().starts_with("2:3: "), "{}", err.message());
    }

    #[test]
    fn positions_past_u32_overflow() {
        assert_eq!(pos(7).unwrap(), Pos(7));
        assert_eq!(pos(u32::MAX as usize).unwrap(), Pos(u32::MAX));
        if let Ok(past) = usize::try_from(u64::from(u32::MAX) + 1) {
            assert!(pos(past).unwrap_err().is(&ErrorKind::Overflow));
        }
    }
}
