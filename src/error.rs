use std::io;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::span::Loc;

/// Failure while turning source text into a program image.
///
/// Every variant carries the location of the offending token, and a span so the source line can
/// be rendered around it once the report has source code attached.
#[derive(Error, Diagnostic, Clone, PartialEq, Eq, Debug)]
pub enum AsmError {
    #[error("{loc}: {msg}")]
    #[diagnostic(
        code(lex::bad_token),
        help("hex literals start with x, decimal literals with #, and strings must close on the line they open")
    )]
    Lexical {
        msg: String,
        loc: Loc,
        #[label("invalid token")]
        span: SourceSpan,
    },

    #[error("{loc}: expected {expected}, found {found}")]
    #[diagnostic(
        code(parse::unexpected_token),
        help("lines hold an optional label followed by one instruction or directive")
    )]
    Syntax {
        expected: String,
        found: String,
        loc: Loc,
        #[label("unexpected token")]
        span: SourceSpan,
    },

    #[error("{loc}: label `{name}` is already defined")]
    #[diagnostic(
        code(asm::duplicate_label),
        help("labels are only allowed once per file")
    )]
    DuplicateLabel {
        name: String,
        loc: Loc,
        #[label("duplicate label")]
        span: SourceSpan,
        #[label("first defined here")]
        first: SourceSpan,
    },

    #[error("{loc}: label `{name}` is not defined")]
    #[diagnostic(
        code(asm::undefined_label),
        help("check the label is spelled the same way as its definition, labels are case-sensitive")
    )]
    UndefinedLabel {
        name: String,
        loc: Loc,
        #[label("unknown label")]
        span: SourceSpan,
    },

    #[error("{loc}: `{name}` is not an instruction")]
    #[diagnostic(
        code(asm::unknown_mnemonic),
        help("a label cannot be followed directly by operands")
    )]
    UnknownMnemonic {
        name: String,
        loc: Loc,
        #[label("unknown mnemonic")]
        span: SourceSpan,
    },

    #[error("{loc}: {msg}")]
    #[diagnostic(
        code(asm::bad_operand),
        help("check the operands for this instruction")
    )]
    MalformedOperand {
        msg: String,
        loc: Loc,
        #[label("bad operand")]
        span: SourceSpan,
    },

    #[error("{loc}: origin set after program start")]
    #[diagnostic(
        code(asm::misplaced_orig),
        help(".orig may appear once, before any instruction or data")
    )]
    MisplacedOrigin {
        loc: Loc,
        #[label("misplaced .orig")]
        span: SourceSpan,
    },
}

/// An instruction word whose opcode has no handler.
#[derive(Error, Clone, Copy, PartialEq, Eq, Debug)]
#[error("word x{word:04X} has reserved opcode {:#06b}", .word >> 12)]
pub struct UnknownOpcode {
    pub word: u16,
}

#[derive(Error, Diagnostic, Clone, PartialEq, Eq, Debug)]
pub enum DisasmError {
    #[error("unknown opcode in word x{word:04X} at address x{addr:04X}")]
    #[diagnostic(
        code(disas::unknown_opcode),
        help("data words can be shown as .FILL with --lenient")
    )]
    UnknownOpcode { addr: u16, word: u16 },
}

#[derive(Error, Diagnostic, Debug)]
pub enum RunError {
    #[error("unknown opcode in word x{word:04X} at address x{addr:04X}")]
    #[diagnostic(
        code(run::unknown_opcode),
        help("RTI and the reserved opcode are not supported, check the program did not run into data")
    )]
    UnknownOpcode { addr: u16, word: u16 },

    #[error("unsupported trap vector x{vect:02X} at address x{addr:04X}")]
    #[diagnostic(
        code(run::unsupported_trap),
        help("supported traps are GETC, OUT, PUTS, IN, PUTSP and HALT")
    )]
    UnsupportedTrap { addr: u16, vect: u8 },

    #[error("console i/o failed")]
    #[diagnostic(code(run::io))]
    Io(#[from] io::Error),
}

#[derive(Error, Diagnostic, Clone, PartialEq, Eq, Debug)]
pub enum ImageError {
    #[error("image is empty")]
    #[diagnostic(
        code(image::empty),
        help("an image holds at least its origin word")
    )]
    Empty,

    #[error("image has odd length of {len} bytes")]
    #[diagnostic(code(image::misaligned), help("images are made of 16-bit words"))]
    Misaligned { len: usize },

    #[error("image holds {words} words, more than fit in memory")]
    #[diagnostic(code(image::too_large))]
    TooLarge { words: usize },
}
