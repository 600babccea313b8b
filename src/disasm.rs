//! Turning program images back into readable assembly.

use std::fmt::{self, Write};

use crate::error::DisasmError;
use crate::image::Image;
use crate::isa::Instr;

/// What a word was decoded as.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Decoded {
    Instr(Instr),
    /// A word with no instruction, shown as `.FILL`.
    Data,
}

/// One disassembled word.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Line {
    pub addr: u16,
    /// Position of the word from the origin.
    pub offset: u16,
    pub word: u16,
    pub decoded: Decoded,
}

impl Line {
    /// Address a PC-relative instruction refers to.
    pub fn target(&self) -> Option<u16> {
        match self.decoded {
            Decoded::Instr(instr) => instr
                .pc_offset()
                .map(|offset| self.addr.wrapping_add(1).wrapping_add(offset as u16)),
            Decoded::Data => None,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x{:04X} (+{:<4}) x{:04X}  ",
            self.addr, self.offset, self.word
        )?;
        match self.decoded {
            Decoded::Instr(instr) => {
                let text = instr.to_string();
                match self.target() {
                    Some(target) => write!(f, "{text:<20} ; -> x{target:04X}"),
                    None => f.write_str(&text),
                }
            }
            Decoded::Data => write!(f, ".FILL x{:04X}", self.word),
        }
    }
}

/// Decode every word of the image as an instruction.
pub fn disassemble(image: &Image) -> Result<Vec<Line>, DisasmError> {
    image
        .iter()
        .enumerate()
        .map(|(offset, (addr, word))| {
            let instr = Instr::decode(word).map_err(|_| DisasmError::UnknownOpcode { addr, word })?;
            Ok(Line {
                addr,
                offset: offset as u16,
                word,
                decoded: Decoded::Instr(instr),
            })
        })
        .collect()
}

/// Like [`disassemble`], but words that are not instructions become data.
pub fn disassemble_lenient(image: &Image) -> Vec<Line> {
    image
        .iter()
        .enumerate()
        .map(|(offset, (addr, word))| Line {
            addr,
            offset: offset as u16,
            word,
            decoded: Instr::decode(word).map_or(Decoded::Data, Decoded::Instr),
        })
        .collect()
}

/// Full listing: origin header, one line per word, then `.END`.
pub fn render(image: &Image, lines: &[Line]) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, ".ORIG x{:04X}", image.orig());
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
    out.push_str(".END\n");
    out
}
