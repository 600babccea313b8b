use std::borrow::Cow;

use crate::ast::{DirKind, Token, TokenKind};
use crate::error::AsmError;
use crate::isa::Register;
use crate::lexer::cursor::Cursor;
use crate::span::{Idx, Loc, Span};

pub mod cursor;

/// A 'light' token that only carries basic and easily derivable info
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LToken {
    pub kind: LTokenKind,
    pub len: usize,
}

impl LToken {
    pub fn new(kind: LTokenKind, len: usize) -> Self {
        LToken { kind, len }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LiteralKind {
    Dec,
    Str { terminated: bool },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LTokenKind {
    /// Identifiers, registers, and unprefixed or `x`-prefixed numbers.
    Ident,
    Lit(LiteralKind),
    Comment,
    Direc,
    Colon,
    /// Also includes commas
    Whitespace,
    Unknown,
    Eof,
}

/// Test if a character is considered to be whitespace.
pub(crate) fn is_whitespace(c: char) -> bool {
    // Commas are essentially whitespace in LC3
    matches!(c, ' ' | '\n' | '\t' | '\r' | ',')
}

/// Test if a character is considered an LC3 identifier character.
pub(crate) fn is_id(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> LToken {
        let first_char = match self.bump() {
            Some(c) => c,
            None => return LToken::new(LTokenKind::Eof, 0),
        };
        let token_kind = match first_char {
            ';' => {
                self.take_while(|c| c != '\n');
                LTokenKind::Comment
            }
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                LTokenKind::Whitespace
            }
            ':' => LTokenKind::Colon,
            // Numbers are told apart from identifiers once the whole word is known.
            c if is_id(c) => {
                self.take_while(is_id);
                LTokenKind::Ident
            }
            // Decimal literal
            '#' => {
                if matches!(self.first(), '-' | '+') {
                    self.bump();
                }
                self.take_while(is_id);
                LTokenKind::Lit(LiteralKind::Dec)
            }
            // Directive
            '.' => {
                self.take_while(is_id);
                LTokenKind::Direc
            }
            '"' => self.string(),
            _ => LTokenKind::Unknown,
        };
        let res = LToken::new(token_kind, self.pos_in_token());
        self.reset_pos();
        res
    }

    fn string(&mut self) -> LTokenKind {
        loop {
            match self.first() {
                '"' => {
                    self.bump();
                    return LTokenKind::Lit(LiteralKind::Str { terminated: true });
                }
                '\\' if !matches!(self.second(), '\n' | cursor::EOF_CHAR) => {
                    self.bump();
                    self.bump();
                }
                // Strings end on the line they start
                '\n' => break,
                _ if self.is_eof() => break,
                _ => {
                    self.bump();
                }
            }
        }
        LTokenKind::Lit(LiteralKind::Str { terminated: false })
    }
}

/// Resolve escape sequences in the body of a string literal.
///
/// Returns the offending character of the first unknown escape.
pub fn unescape(s: &str) -> Result<Cow<str>, char> {
    if !s.contains('\\') {
        return Ok(Cow::Borrowed(s));
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some('b') => '\x08',
            Some('f') => '\x0C',
            Some('v') => '\x0B',
            Some('e') => '\x1B',
            Some(c @ ('\\' | '"' | '\'')) => c,
            Some(c) => return Err(c),
            None => return Err('\\'),
        };
        out.push(escaped);
    }
    Ok(Cow::Owned(out))
}

/// Turns source text into tokens, skipping whitespace and comments.
pub struct Lexer<'a> {
    src: &'a str,
    cursor: Cursor<'a>,
    /// Byte offset of the next token
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            cursor: Cursor::new(src),
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn loc_at(&self, offs: usize) -> Loc {
        let col = self.src[self.line_start..offs].chars().count() + 1;
        Loc::new(self.line, col)
    }

    /// Move past `len` bytes, keeping track of lines.
    fn advance(&mut self, len: usize) {
        let text = &self.src[self.pos..self.pos + len];
        for (i, _) in text.match_indices('\n') {
            self.line += 1;
            self.line_start = self.pos + i + 1;
        }
        self.pos += len;
    }

    fn cook(&self, kind: LTokenKind, text: &str, span: Span, loc: Loc) -> Result<Token, AsmError> {
        let lex_err = |msg: String| AsmError::Lexical {
            msg,
            loc,
            span: span.into(),
        };
        let kind = match kind {
            LTokenKind::Ident => {
                if let Ok(reg) = text.parse::<Register>() {
                    TokenKind::Reg(reg)
                } else if let Some(digits) = hex_digits(text) {
                    match u32::from_str_radix(digits, 16) {
                        Ok(val) if val <= u16::MAX as u32 => TokenKind::Num(val as i32),
                        _ => return Err(lex_err(format!("hex literal `{text}` is out of range"))),
                    }
                } else if text.starts_with(|c: char| c.is_ascii_digit()) {
                    TokenKind::Num(decimal(text).map_err(lex_err)?)
                } else {
                    TokenKind::Ident
                }
            }
            LTokenKind::Lit(LiteralKind::Dec) => TokenKind::Num(decimal(&text[1..]).map_err(lex_err)?),
            LTokenKind::Lit(LiteralKind::Str { terminated: false }) => {
                return Err(lex_err("unterminated string literal".into()))
            }
            LTokenKind::Lit(LiteralKind::Str { terminated: true }) => {
                let body = &text[1..text.len() - 1];
                match unescape(body) {
                    Ok(s) => TokenKind::Str(s.into_owned()),
                    Err(c) => {
                        return Err(lex_err(format!("unknown escape sequence `\\{c}` in string")))
                    }
                }
            }
            LTokenKind::Direc => match text[1..].parse::<DirKind>() {
                Ok(dir) => TokenKind::Dir(dir),
                Err(()) => return Err(lex_err(format!("unknown directive `{text}`"))),
            },
            LTokenKind::Colon => TokenKind::Colon,
            LTokenKind::Unknown => {
                return Err(lex_err(format!("unexpected character `{text}`")));
            }
            LTokenKind::Whitespace | LTokenKind::Comment | LTokenKind::Eof => {
                unreachable!("skipped by the lexer")
            }
        };
        Ok(Token::new(kind, text, span, loc))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, AsmError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let ltoken = self.cursor.advance_token();
            if ltoken.kind == LTokenKind::Eof {
                return None;
            }
            let start = self.pos;
            let loc = self.loc_at(start);
            self.advance(ltoken.len);
            if matches!(ltoken.kind, LTokenKind::Whitespace | LTokenKind::Comment) {
                continue;
            }
            let text = &self.src[start..start + ltoken.len];
            let span = Span::new(Idx(start), ltoken.len);
            return Some(self.cook(ltoken.kind, text, span, loc));
        }
    }
}

/// Digits of an `x1F` or `0x1F` style literal.
fn hex_digits(text: &str) -> Option<&str> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix(['x', 'X']))?;
    (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())).then_some(digits)
}

/// Parse a signed decimal that must fit in a word, either as signed or unsigned.
fn decimal(text: &str) -> Result<i32, String> {
    let val: i32 = text
        .parse()
        .map_err(|_| format!("malformed decimal literal `{text}`"))?;
    if !(i16::MIN as i32..=u16::MAX as i32).contains(&val) {
        return Err(format!(
            "decimal literal `{text}` is out of range, expected -32768 to 65535"
        ));
    }
    Ok(val)
}

/// Tokenize a whole source, stopping at the first error.
pub fn tokenize(src: &str) -> Result<Vec<Token>, AsmError> {
    Lexer::new(src).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|tok| tok.kind)
            .collect()
    }

    #[test]
    fn instruction_line() {
        assert_eq!(
            kinds("LOOP: add R1, r1, #-1 ; decrement\n"),
            vec![
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::Reg(Register::R1),
                TokenKind::Reg(Register::R1),
                TokenKind::Num(-1),
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            kinds("x3000 X1f 0xFFFF #10 #+3 25"),
            vec![
                TokenKind::Num(0x3000),
                TokenKind::Num(0x1F),
                TokenKind::Num(0xFFFF),
                TokenKind::Num(10),
                TokenKind::Num(3),
                TokenKind::Num(25),
            ]
        );
        // Not hex, so a label
        assert_eq!(kinds("xloop"), vec![TokenKind::Ident]);
    }

    #[test]
    fn directives_and_strings() {
        assert_eq!(
            kinds(".orig x3000\n.STRINGZ \"a\\tb\\\"\"\n.end"),
            vec![
                TokenKind::Dir(DirKind::Orig),
                TokenKind::Num(0x3000),
                TokenKind::Dir(DirKind::Stringz),
                TokenKind::Str("a\tb\"".into()),
                TokenKind::Dir(DirKind::End),
            ]
        );
    }

    #[test]
    fn locations() {
        let toks = tokenize("  .ORIG x3000\n\tHALT").unwrap();
        assert_eq!(toks[0].loc, Loc::new(1, 3));
        assert_eq!(toks[1].loc, Loc::new(1, 9));
        assert_eq!(toks[2].loc, Loc::new(2, 2));
        assert_eq!(toks[2].lexeme, "HALT");
        assert_eq!(toks[2].span.as_range(), 15..19);
    }

    #[test]
    fn unescape_sequences() {
        assert_eq!(unescape("plain").unwrap(), "plain");
        assert_eq!(unescape(r"\n\0\e\\").unwrap(), "\n\0\x1B\\");
        assert_eq!(unescape(r"bad\q"), Err('q'));
    }

    #[test]
    fn lexical_errors() {
        for src in [
            "\"open",
            "\"open\nHALT",
            ".include",
            "#12a",
            "#",
            "x10000",
            "#70000",
            "\"bad \\q\"",
            "ADD R0, R0, $1",
            "12ab",
        ] {
            let err = tokenize(src).unwrap_err();
            assert!(matches!(err, AsmError::Lexical { .. }), "{src:?}: {err:?}");
        }
    }
}
