//! Syntax nodes handed from the parser to the assembler passes.

use std::fmt;
use std::str::FromStr;

use crate::isa::Register;
use crate::span::{Loc, Span};

/// Assembler directives.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DirKind {
    Orig,
    Fill,
    Stringz,
    Blkw,
    End,
}

impl FromStr for DirKind {
    type Err = ();

    /// Parse a directive name, without its leading `.`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "orig" => Ok(DirKind::Orig),
            "fill" => Ok(DirKind::Fill),
            "stringz" => Ok(DirKind::Stringz),
            "blkw" => Ok(DirKind::Blkw),
            "end" => Ok(DirKind::End),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DirKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DirKind::Orig => ".ORIG",
            DirKind::Fill => ".FILL",
            DirKind::Stringz => ".STRINGZ",
            DirKind::Blkw => ".BLKW",
            DirKind::End => ".END",
        })
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Label or mnemonic.
    Ident,
    Reg(Register),
    /// Hex or decimal literal.
    Num(i32),
    /// String literal, escapes already resolved.
    Str(String),
    Dir(DirKind),
    /// Optional terminator of a label definition.
    Colon,
}

impl TokenKind {
    /// Short description for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::Reg(_) => "register",
            TokenKind::Num(_) => "numeric literal",
            TokenKind::Str(_) => "string literal",
            TokenKind::Dir(_) => "directive",
            TokenKind::Colon => "`:`",
        }
    }
}

/// A lexical token, with its text and where it came from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
    pub loc: Loc,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span, loc: Loc) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            span,
            loc,
        }
    }

    /// Token built outside of source text.
    pub fn synthetic(kind: TokenKind, lexeme: impl Into<String>) -> Self {
        Token::new(kind, lexeme, Span::dummy(), Loc::default())
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Directive {
    pub kind: DirKind,
    /// The directive itself, eg. `.FILL`.
    pub token: Token,
    pub operand: Option<Token>,
}

impl Directive {
    /// Number of words the directive places in the image.
    ///
    /// Only meaningful for directives the parser accepted.
    pub fn word_len(&self) -> u16 {
        match (self.kind, self.operand.as_ref().map(|tok| &tok.kind)) {
            (DirKind::Orig | DirKind::End, _) => 0,
            (DirKind::Fill, _) => 1,
            (DirKind::Stringz, Some(TokenKind::Str(s))) => s.encode_utf16().count() as u16 + 1,
            (DirKind::Blkw, Some(TokenKind::Num(n))) => *n as u16,
            _ => 0,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Instruction {
    /// Mnemonic as written; resolved against the instruction set by the encoder.
    pub mnemonic: Token,
    pub operands: Vec<Token>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Node {
    Label(Token),
    Directive(Directive),
    Instruction(Instruction),
}

impl Node {
    /// Number of words the node places in the image.
    pub fn word_len(&self) -> u16 {
        match self {
            Node::Label(_) => 0,
            Node::Directive(dir) => dir.word_len(),
            Node::Instruction(_) => 1,
        }
    }
}
