//! Second assembler pass: turning syntax nodes into a program image.

use crate::ast::{DirKind, Directive, Instruction, Node, Token, TokenKind};
use crate::error::AsmError;
use crate::image::{Image, DEFAULT_ORIG};
use crate::isa::{field, Field, ImmOrReg, Instr, Mnemonic, Register};
use crate::parser;
use crate::symbol::SymbolTable;

/// How label operands are turned into offset fields.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum OffsetMode {
    /// Distance from the incremented PC to the label.
    #[default]
    Relative,
    /// The label's word offset from the origin, stored as is.
    Absolute,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct AsmOptions {
    pub offsets: OffsetMode,
    /// Reject values that do not fit their field instead of truncating them.
    pub strict: bool,
}

/// Assemble source text in one go.
pub fn assemble_source(src: &str, opts: AsmOptions) -> Result<Image, AsmError> {
    let nodes = parser::parse(src)?;
    assemble(&nodes, opts)
}

/// Resolve all labels, then encode every node in order.
pub fn assemble(nodes: &[Node], opts: AsmOptions) -> Result<Image, AsmError> {
    let symbols = SymbolTable::resolve(nodes)?;
    encode(nodes, &symbols, opts)
}

/// Encode nodes against an already resolved symbol table.
pub fn encode(nodes: &[Node], symbols: &SymbolTable, opts: AsmOptions) -> Result<Image, AsmError> {
    let mut encoder = Encoder {
        symbols,
        opts,
        orig: None,
        words: Vec::new(),
    };
    for node in nodes {
        match node {
            Node::Label(_) => {}
            Node::Directive(dir) => encoder.directive(dir)?,
            Node::Instruction(ins) => {
                let word = encoder.instruction(ins)?.encode();
                encoder.words.push(word);
            }
        }
    }
    let orig = encoder.orig.unwrap_or(DEFAULT_ORIG);
    log::debug!("emitted {} words at x{orig:04X}", encoder.words.len());
    Ok(Image::new(orig, encoder.words))
}

struct Encoder<'a> {
    symbols: &'a SymbolTable,
    opts: AsmOptions,
    orig: Option<u16>,
    words: Vec<u16>,
}

impl Encoder<'_> {
    fn directive(&mut self, dir: &Directive) -> Result<(), AsmError> {
        match dir.kind {
            DirKind::Orig => {
                if self.orig.is_some() || !self.words.is_empty() {
                    return Err(AsmError::MisplacedOrigin {
                        loc: dir.token.loc,
                        span: dir.token.span.into(),
                    });
                }
                let tok = operand(dir)?;
                self.orig = Some(self.value(tok)?);
            }
            DirKind::Fill => {
                let tok = operand(dir)?;
                let word = match tok.kind {
                    TokenKind::Ident => {
                        let offset = self.label(tok)?;
                        match self.opts.offsets {
                            OffsetMode::Relative => {
                                self.orig.unwrap_or(DEFAULT_ORIG).wrapping_add(offset)
                            }
                            OffsetMode::Absolute => offset,
                        }
                    }
                    _ => self.value(tok)?,
                };
                self.words.push(word);
            }
            DirKind::Stringz => match &operand(dir)?.kind {
                TokenKind::Str(s) => {
                    self.words.extend(s.encode_utf16());
                    self.words.push(0);
                }
                _ => return Err(malformed(&dir.token, format!("`{}` expects a string", dir.kind))),
            },
            DirKind::Blkw => {
                let count = self.value(operand(dir)?)?;
                self.words.extend(std::iter::repeat(0).take(count as usize));
            }
            DirKind::End => {}
        }
        Ok(())
    }

    fn instruction(&self, ins: &Instruction) -> Result<Instr, AsmError> {
        use field::*;

        let tok = &ins.mnemonic;
        let mnemonic = tok
            .lexeme
            .parse::<Mnemonic>()
            .map_err(|()| AsmError::UnknownMnemonic {
                name: tok.lexeme.clone(),
                loc: tok.loc,
                span: tok.span.into(),
            })?;
        let arity = mnemonic.operands().len();
        if ins.operands.len() != arity {
            return Err(malformed(
                tok,
                format!("`{mnemonic}` takes {arity} operand(s), found {}", ins.operands.len()),
            ));
        }
        let ops = &ins.operands;

        let instr = match mnemonic {
            Mnemonic::Add => Instr::Add {
                dr: reg(&ops[0])?,
                sr1: reg(&ops[1])?,
                src: self.imm_or_reg(&ops[2])?,
            },
            Mnemonic::And => Instr::And {
                dr: reg(&ops[0])?,
                sr1: reg(&ops[1])?,
                src: self.imm_or_reg(&ops[2])?,
            },
            Mnemonic::Br(nzp) => Instr::Br {
                nzp,
                offset: self.target(&ops[0], PC_OFFSET9)?,
            },
            Mnemonic::Jmp => Instr::Jmp { base: reg(&ops[0])? },
            Mnemonic::Ret => Instr::Jmp { base: Register::R7 },
            Mnemonic::Jsr => Instr::Jsr {
                offset: self.target(&ops[0], PC_OFFSET11)?,
            },
            Mnemonic::Jsrr => Instr::Jsrr { base: reg(&ops[0])? },
            Mnemonic::Ld => Instr::Ld {
                dr: reg(&ops[0])?,
                offset: self.target(&ops[1], PC_OFFSET9)?,
            },
            Mnemonic::Ldi => Instr::Ldi {
                dr: reg(&ops[0])?,
                offset: self.target(&ops[1], PC_OFFSET9)?,
            },
            Mnemonic::Lea => Instr::Lea {
                dr: reg(&ops[0])?,
                offset: self.target(&ops[1], PC_OFFSET9)?,
            },
            Mnemonic::St => Instr::St {
                sr: reg(&ops[0])?,
                offset: self.target(&ops[1], PC_OFFSET9)?,
            },
            Mnemonic::Sti => Instr::Sti {
                sr: reg(&ops[0])?,
                offset: self.target(&ops[1], PC_OFFSET9)?,
            },
            Mnemonic::Ldr => Instr::Ldr {
                dr: reg(&ops[0])?,
                base: reg(&ops[1])?,
                offset: self.signed(&ops[2], OFFSET6)?,
            },
            Mnemonic::Str => Instr::Str {
                sr: reg(&ops[0])?,
                base: reg(&ops[1])?,
                offset: self.signed(&ops[2], OFFSET6)?,
            },
            Mnemonic::Not => Instr::Not {
                dr: reg(&ops[0])?,
                sr: reg(&ops[1])?,
            },
            Mnemonic::Trap => Instr::Trap {
                vect: self.unsigned(&ops[0], TRAPVECT8)? as u8,
            },
            Mnemonic::Alias(trap) => Instr::Trap { vect: trap.vect() },
        };
        Ok(instr)
    }

    fn imm_or_reg(&self, tok: &Token) -> Result<ImmOrReg, AsmError> {
        match tok.kind {
            TokenKind::Reg(reg) => Ok(ImmOrReg::Reg(reg)),
            _ => Ok(ImmOrReg::Imm(self.signed(tok, field::IMM5)?)),
        }
    }

    /// Label or literal offset for a PC-relative field.
    fn target(&self, tok: &Token, field: Field) -> Result<i16, AsmError> {
        let val = match tok.kind {
            TokenKind::Ident => {
                let offset = self.label(tok)? as i32;
                match self.opts.offsets {
                    // The PC has moved past this instruction when the offset is applied
                    OffsetMode::Relative => offset - (self.words.len() as i32 + 1),
                    OffsetMode::Absolute => offset,
                }
            }
            _ => number(tok)?,
        };
        if self.opts.strict && !field.fits_signed(val) {
            return Err(malformed(
                tok,
                format!("offset {val} does not fit in {} bits", field.width()),
            ));
        }
        Ok(field.truncate_signed(val))
    }

    fn signed(&self, tok: &Token, field: Field) -> Result<i16, AsmError> {
        let val = number(tok)?;
        if self.opts.strict && !field.fits_signed(val) {
            return Err(malformed(
                tok,
                format!("immediate {val} does not fit in {} signed bits", field.width()),
            ));
        }
        Ok(field.truncate_signed(val))
    }

    fn unsigned(&self, tok: &Token, field: Field) -> Result<u16, AsmError> {
        let val = number(tok)?;
        if self.opts.strict && !field.fits_unsigned(val) {
            return Err(malformed(
                tok,
                format!("value {val} does not fit in {} unsigned bits", field.width()),
            ));
        }
        Ok(val as u16 & field.mask())
    }

    /// A full word, from a literal that may be written signed or unsigned.
    fn value(&self, tok: &Token) -> Result<u16, AsmError> {
        let val = number(tok)?;
        if self.opts.strict && !(i16::MIN as i32..=u16::MAX as i32).contains(&val) {
            return Err(malformed(tok, format!("value {val} does not fit in a word")));
        }
        Ok(val as u16)
    }

    fn label(&self, tok: &Token) -> Result<u16, AsmError> {
        self.symbols
            .offset(&tok.lexeme)
            .ok_or_else(|| AsmError::UndefinedLabel {
                name: tok.lexeme.clone(),
                loc: tok.loc,
                span: tok.span.into(),
            })
    }
}

fn operand(dir: &Directive) -> Result<&Token, AsmError> {
    dir.operand
        .as_ref()
        .ok_or_else(|| malformed(&dir.token, format!("`{}` is missing its operand", dir.kind)))
}

fn reg(tok: &Token) -> Result<Register, AsmError> {
    match tok.kind {
        TokenKind::Reg(reg) => Ok(reg),
        _ => Err(malformed(
            tok,
            format!("expected register, found {}", tok.kind.describe()),
        )),
    }
}

fn number(tok: &Token) -> Result<i32, AsmError> {
    match tok.kind {
        TokenKind::Num(val) => Ok(val),
        _ => Err(malformed(
            tok,
            format!("expected numeric literal, found {}", tok.kind.describe()),
        )),
    }
}

fn malformed(tok: &Token, msg: String) -> AsmError {
    AsmError::MalformedOperand {
        msg,
        loc: tok.loc,
        span: tok.span.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::RET_WORD;

    fn words(src: &str) -> Vec<u16> {
        assemble_source(src, AsmOptions::default())
            .unwrap()
            .words()
            .to_vec()
    }

    fn words_with(src: &str, opts: AsmOptions) -> Result<Vec<u16>, AsmError> {
        assemble_source(src, opts).map(|image| image.words().to_vec())
    }

    #[test]
    fn add_immediate() {
        assert_eq!(words("ADD R1, R1, #-1"), [0b0001_001_001_1_11111]);
    }

    #[test]
    fn stringz_words() {
        let image = assemble_source(".ORIG x3000\n.STRINGZ \"HI\"\n.END", AsmOptions::default())
            .unwrap();
        assert_eq!(image.orig(), 0x3000);
        assert_eq!(image.words(), [0x0048, 0x0049, 0x0000]);
    }

    #[test]
    fn stringz_stores_utf16_units() {
        // Label after the string must account for the surrogate pair
        let words = words("LEA R0, END\n.STRINGZ \"€🦀\"\nEND HALT");
        assert_eq!(words[1..5], [0x20AC, 0xD83E, 0xDD80, 0x0000]);
        assert_eq!(words[0], 0b1110_000_000000100);
        assert_eq!(words[5], 0xF025);
    }

    #[test]
    fn default_origin() {
        let image = assemble_source("HALT", AsmOptions::default()).unwrap();
        assert_eq!(image.orig(), DEFAULT_ORIG);
        assert_eq!(image.words(), [0xF025]);
    }

    #[test]
    fn fixed_encodings() {
        assert_eq!(
            words("RET\nNOT R1, R0\nHALT\nPUTS\nGETC\nOUT\nPUTC\nIN\nPUTSP\nTRAP x26"),
            [RET_WORD, 0x923F, 0xF025, 0xF022, 0xF020, 0xF021, 0xF021, 0xF023, 0xF024, 0xF026]
        );
    }

    #[test]
    fn relative_offsets() {
        let src = r#"
            .ORIG x3000
        LOOP    ADD R0, R0, #-1
                BRp LOOP
                LEA R1, DATA
                JSR SUB
                LD R2, DATA
                ST R2, DATA
        SUB     RET
        DATA    .FILL DATA
            .END
        "#;
        assert_eq!(
            words(src),
            [
                0x103F,
                // -2 back to LOOP
                0b0000_001_111111110,
                // DATA at 7, PC after LEA is 3
                0b1110_001_000000100,
                0b0100_1_00000000010,
                0b0010_010_000000010,
                0b0011_010_000000001,
                RET_WORD,
                0x3007,
            ]
        );
    }

    #[test]
    fn absolute_offsets() {
        let opts = AsmOptions {
            offsets: OffsetMode::Absolute,
            strict: false,
        };
        let src = "LOOP ADD R0, R0, #-1\nBRp LOOP\nLEA R1, DATA\nDATA .FILL DATA";
        assert_eq!(
            words_with(src, opts).unwrap(),
            [0x103F, 0b0000_001_000000000, 0b1110_001_000000011, 3]
        );
    }

    #[test]
    fn numeric_offsets_and_registers() {
        assert_eq!(
            words("LD R0, #3\nBRnzp #-1\nJMP R3\nJSRR R4\nLDR R1, R6, #-2\nSTR R0, R6, x1F"),
            [
                0b0010_000_000000011,
                0b0000_111_111111111,
                0b1100_000_011_000000,
                0b0100_0_00_100_000000,
                0b0110_001_110_111110,
                0b0111_000_110_011111,
            ]
        );
    }

    #[test]
    fn out_of_range_values_truncate() {
        // 16 keeps its low 5 bits
        assert_eq!(words("ADD R0, R0, #16"), [0b0001_000_000_1_10000]);
        assert_eq!(words("TRAP x125"), [0xF025]);
    }

    #[test]
    fn strict_mode_rejects_overflow() {
        let strict = AsmOptions {
            strict: true,
            ..AsmOptions::default()
        };
        for src in [
            "ADD R0, R0, #16",
            "AND R0, R0, #-17",
            "LDR R0, R1, #32",
            "TRAP x100",
            "BR #256",
            "far .BLKW #300\nLD R0, far",
        ] {
            assert!(
                matches!(words_with(src, strict), Err(AsmError::MalformedOperand { .. })),
                "{src}"
            );
        }
        assert_eq!(words_with("ADD R0, R0, #15", strict).unwrap(), [0x102F]);
    }

    #[test]
    fn blkw_reserves_zeroes() {
        assert_eq!(words(".BLKW 3\n.FILL #-1"), [0, 0, 0, 0xFFFF]);
    }

    #[test]
    fn undefined_label() {
        for src in ["BR NOWHERE", ".FILL NOWHERE", "LD R0, NOWHERE"] {
            let err = assemble_source(src, AsmOptions::default()).unwrap_err();
            assert!(
                matches!(err, AsmError::UndefinedLabel { ref name, .. } if name == "NOWHERE"),
                "{src}: {err:?}"
            );
        }
    }

    #[test]
    fn misplaced_origin() {
        for src in [".ORIG x3000\n.ORIG x4000", "HALT\n.ORIG x3000"] {
            let err = assemble_source(src, AsmOptions::default()).unwrap_err();
            assert!(matches!(err, AsmError::MisplacedOrigin { .. }), "{src}");
        }
        // Labels before the origin are fine
        let image = assemble_source("START .ORIG x4000\nHALT", AsmOptions::default()).unwrap();
        assert_eq!(image.orig(), 0x4000);
    }

    #[test]
    fn end_does_not_stop_assembly() {
        assert_eq!(words("HALT\n.END\nRET"), [0xF025, RET_WORD]);
    }

    #[test]
    fn nodes_built_by_hand() {
        let mnemonic = Token::synthetic(TokenKind::Ident, "FROB");
        let nodes = [Node::Instruction(Instruction {
            mnemonic,
            operands: vec![],
        })];
        let err = assemble(&nodes, AsmOptions::default()).unwrap_err();
        assert!(matches!(err, AsmError::UnknownMnemonic { .. }));

        let nodes = [Node::Instruction(Instruction {
            mnemonic: Token::synthetic(TokenKind::Ident, "NOT"),
            operands: vec![Token::synthetic(TokenKind::Reg(Register::R0), "R0")],
        })];
        let err = assemble(&nodes, AsmOptions::default()).unwrap_err();
        assert!(matches!(err, AsmError::MalformedOperand { .. }));

        let nodes = [Node::Directive(Directive {
            kind: DirKind::Fill,
            token: Token::synthetic(TokenKind::Dir(DirKind::Fill), ".FILL"),
            operand: Some(Token::synthetic(TokenKind::Num(7), "#7")),
        })];
        assert_eq!(assemble(&nodes, AsmOptions::default()).unwrap().words(), [7]);
    }
}
