use std::iter::Peekable;
use std::vec::IntoIter;

use crate::ast::{DirKind, Directive, Instruction, Node, Token, TokenKind};
use crate::error::AsmError;
use crate::isa::{Mnemonic, OperandClass};
use crate::lexer::tokenize;
use crate::span::{Idx, Loc, Span};

/// Parse a whole source into syntax nodes.
pub fn parse(src: &str) -> Result<Vec<Node>, AsmError> {
    AsmParser::new(src)?.parse()
}

/// Transforms a token stream into a flat list of syntax nodes.
///
/// Line breaks carry no meaning: each mnemonic or directive consumes exactly the operands it
/// expects, so a statement may span lines and several may share one.
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    /// Peekable iterator over tokens, without whitespace or comments
    toks: Peekable<IntoIter<Token>>,
    nodes: Vec<Node>,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Result<Self, AsmError> {
        let toks = tokenize(src)?;
        Ok(AsmParser {
            src,
            toks: toks.into_iter().peekable(),
            nodes: Vec::new(),
        })
    }

    /// Create syntax nodes out of the token stream
    pub fn parse(mut self) -> Result<Vec<Node>, AsmError> {
        while let Some(tok) = self.toks.next() {
            match tok.kind {
                TokenKind::Ident if is_mnemonic(&tok) => self.parse_instr(tok)?,
                TokenKind::Ident => self.parse_label(tok)?,
                TokenKind::Dir(kind) => self.parse_dir(kind, tok)?,
                // Lines should not start with these tokens
                TokenKind::Reg(_) | TokenKind::Num(_) | TokenKind::Str(_) | TokenKind::Colon => {
                    return Err(AsmError::Syntax {
                        expected: "label, instruction or directive".into(),
                        found: tok.kind.describe().into(),
                        loc: tok.loc,
                        span: tok.span.into(),
                    })
                }
            }
        }
        log::debug!("parsed {} nodes", self.nodes.len());
        Ok(self.nodes)
    }

    fn parse_label(&mut self, label: Token) -> Result<(), AsmError> {
        match self.toks.peek().map(|tok| &tok.kind) {
            Some(TokenKind::Colon) => {
                self.toks.next();
            }
            // A label cannot take operands, so this was meant to be an instruction
            Some(TokenKind::Reg(_) | TokenKind::Num(_) | TokenKind::Str(_)) => {
                return Err(AsmError::UnknownMnemonic {
                    name: label.lexeme,
                    loc: label.loc,
                    span: label.span.into(),
                })
            }
            _ => {}
        }
        self.nodes.push(Node::Label(label));
        Ok(())
    }

    /// Process the operands of an instruction according to its mnemonic
    fn parse_instr(&mut self, mnemonic: Token) -> Result<(), AsmError> {
        let shape = mnemonic
            .lexeme
            .parse::<Mnemonic>()
            .map(Mnemonic::operands)
            .unwrap_or_default();

        let mut operands = Vec::with_capacity(shape.len());
        for (i, &class) in shape.iter().enumerate() {
            let check = |kind: &TokenKind, tok: &Token| match class {
                OperandClass::Reg => matches!(kind, TokenKind::Reg(_)),
                OperandClass::RegOrImm => matches!(kind, TokenKind::Reg(_) | TokenKind::Num(_)),
                OperandClass::Imm => matches!(kind, TokenKind::Num(_)),
                OperandClass::Target => match kind {
                    TokenKind::Num(_) => true,
                    TokenKind::Ident => !is_mnemonic(tok),
                    _ => false,
                },
            };
            let expected = format!(
                "`{}` expects {class} as operand {}",
                mnemonic.lexeme.to_ascii_uppercase(),
                i + 1
            );
            operands.push(self.expect_where(check, expected)?);
        }

        // Operands left over
        if let Some(tok) = self.toks.peek() {
            if matches!(
                tok.kind,
                TokenKind::Reg(_) | TokenKind::Num(_) | TokenKind::Str(_)
            ) {
                return Err(AsmError::MalformedOperand {
                    msg: format!(
                        "`{}` takes {} operand(s)",
                        mnemonic.lexeme.to_ascii_uppercase(),
                        shape.len()
                    ),
                    loc: tok.loc,
                    span: tok.span.into(),
                });
            }
        }

        self.nodes.push(Node::Instruction(Instruction {
            mnemonic,
            operands,
        }));
        Ok(())
    }

    fn parse_dir(&mut self, kind: DirKind, token: Token) -> Result<(), AsmError> {
        let operand = match kind {
            DirKind::Orig | DirKind::Blkw => {
                let expected = match kind {
                    DirKind::Orig => format!("`{kind}` expects an address"),
                    _ => format!("`{kind}` expects a non-negative word count"),
                };
                let check = |kind: &TokenKind, _: &Token| {
                    matches!(kind, TokenKind::Num(n) if (0..=u16::MAX as i32).contains(n))
                };
                Some(self.expect_where(check, expected)?)
            }
            DirKind::Fill => {
                let check = |kind: &TokenKind, tok: &Token| match kind {
                    TokenKind::Num(_) => true,
                    TokenKind::Ident => !is_mnemonic(tok),
                    _ => false,
                };
                Some(self.expect_where(check, format!("`{kind}` expects a value or label"))?)
            }
            DirKind::Stringz => {
                let check = |kind: &TokenKind, _: &Token| matches!(kind, TokenKind::Str(_));
                Some(self.expect_where(check, format!("`{kind}` expects a string literal"))?)
            }
            DirKind::End => None,
        };
        self.nodes.push(Node::Directive(Directive {
            kind,
            token,
            operand,
        }));
        Ok(())
    }

    /// Take the next token if it passes `check`, otherwise fail with `expected` as the message.
    fn expect_where(
        &mut self,
        check: impl Fn(&TokenKind, &Token) -> bool,
        expected: String,
    ) -> Result<Token, AsmError> {
        match self.toks.next_if(|tok| check(&tok.kind, tok)) {
            Some(tok) => Ok(tok),
            None => {
                let (msg, loc, span) = match self.toks.peek() {
                    Some(tok) => (
                        format!("{expected}, found {}", tok.kind.describe()),
                        tok.loc,
                        tok.span,
                    ),
                    None => (
                        format!("{expected}, found end of file"),
                        self.eof_loc(),
                        Span::new(Idx(self.src.len()), 0),
                    ),
                };
                Err(AsmError::MalformedOperand {
                    msg,
                    loc,
                    span: span.into(),
                })
            }
        }
    }

    fn eof_loc(&self) -> Loc {
        let line = self.src.matches('\n').count() + 1;
        let last = self.src.rsplit('\n').next().unwrap_or_default();
        Loc::new(line, last.chars().count() + 1)
    }
}

fn is_mnemonic(tok: &Token) -> bool {
    tok.kind == TokenKind::Ident && tok.lexeme.parse::<Mnemonic>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Register;

    fn instr(node: &Node) -> (&str, Vec<&TokenKind>) {
        match node {
            Node::Instruction(ins) => (
                ins.mnemonic.lexeme.as_str(),
                ins.operands.iter().map(|tok| &tok.kind).collect(),
            ),
            other => panic!("expected instruction, found {other:?}"),
        }
    }

    #[test]
    fn parse_add_basic() {
        let nodes = parse("add r0 r1 r2").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(
            instr(&nodes[0]),
            (
                "add",
                vec![
                    &TokenKind::Reg(Register::R0),
                    &TokenKind::Reg(Register::R1),
                    &TokenKind::Reg(Register::R2)
                ]
            )
        );
    }

    #[test]
    fn parse_add_imm() {
        let nodes = parse(
            r#"
        ADD R0, R1, #15
        ADD R0, R1, #-16
        "#,
        )
        .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(instr(&nodes[1]).1[2], &TokenKind::Num(-16));
    }

    #[test]
    fn parse_label() {
        let nodes = parse(
            r#"
        label: add r0 r0 r0
        other
              br label
        "#,
        )
        .unwrap();
        assert!(matches!(&nodes[0], Node::Label(tok) if tok.lexeme == "label"));
        assert!(matches!(&nodes[2], Node::Label(tok) if tok.lexeme == "other"));
        assert_eq!(instr(&nodes[3]), ("br", vec![&TokenKind::Ident]));
    }

    #[test]
    fn parse_directives() {
        let nodes = parse(
            r#"
        .ORIG x3000
        MSG .STRINGZ "Hi"
        PTR .FILL MSG
        BUF .BLKW #4
        .END
        "#,
        )
        .unwrap();
        let dirs: Vec<_> = nodes
            .iter()
            .filter_map(|node| match node {
                Node::Directive(dir) => Some(dir.kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            dirs,
            [
                DirKind::Orig,
                DirKind::Stringz,
                DirKind::Fill,
                DirKind::Blkw,
                DirKind::End
            ]
        );
        assert_eq!(nodes.iter().map(Node::word_len).sum::<u16>(), 3 + 1 + 4);
    }

    #[test]
    fn parse_numeric_offset_and_traps() {
        let nodes = parse("LD R0, #3\nTRAP x25\nHALT\nRET").unwrap();
        assert_eq!(instr(&nodes[0]).1[1], &TokenKind::Num(3));
        assert_eq!(instr(&nodes[1]).1, vec![&TokenKind::Num(0x25)]);
        assert_eq!(instr(&nodes[2]), ("HALT", vec![]));
        assert_eq!(instr(&nodes[3]), ("RET", vec![]));
    }

    #[test]
    fn unknown_mnemonic() {
        let err = parse("MUL R0, R1, R2").unwrap_err();
        assert!(matches!(err, AsmError::UnknownMnemonic { ref name, .. } if name == "MUL"));
    }

    #[test]
    fn malformed_operands() {
        for src in [
            "ADD R0, R1",
            "ADD R0, R1, LABEL",
            "NOT R0, #1",
            "LDR R0, R1, LABEL",
            "BR R0",
            "LD R0, HALT",
            "HALT R0",
            "ADD R0, R1, R2, R3",
            ".ORIG",
            ".ORIG #-1",
            ".BLKW #-2",
            ".STRINGZ x20",
            ".FILL \"a\"",
        ] {
            let err = parse(src).unwrap_err();
            assert!(
                matches!(err, AsmError::MalformedOperand { .. }),
                "{src:?}: {err:?}"
            );
        }
    }

    #[test]
    fn unexpected_start_of_line() {
        let err = parse("R0, R1").unwrap_err();
        assert!(matches!(err, AsmError::Syntax { .. }));
        let err = parse(": HALT").unwrap_err();
        assert!(matches!(err, AsmError::Syntax { .. }));
    }

    #[test]
    fn eof_location() {
        let err = parse("HALT\nADD R0,").unwrap_err();
        match err {
            AsmError::MalformedOperand { loc, .. } => assert_eq!(loc, Loc::new(2, 8)),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
