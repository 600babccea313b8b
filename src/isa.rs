//! Instruction set model shared by the assembler, the disassembler and the runtime.
//!
//! Everything that ties a mnemonic to a bit pattern lives here: opcode nibbles, the operand
//! field layouts, register and condition encodings, trap vectors and the mnemonic name table.
//! [`Instr::encode`] and [`Instr::decode`] are the only two places where instruction words are
//! built or taken apart.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownOpcode;

/// Top 4 bits of an instruction word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    Br = 0x0,
    Add,
    Ld,
    St,
    Jsr,
    And,
    Ldr,
    Str,
    /// Not supported by this machine.
    Rti,
    Not,
    Ldi,
    Sti,
    Jmp,
    /// Reserved.
    Res,
    Lea,
    Trap,
}

impl Opcode {
    const ALL: [Opcode; 16] = [
        Opcode::Br,
        Opcode::Add,
        Opcode::Ld,
        Opcode::St,
        Opcode::Jsr,
        Opcode::And,
        Opcode::Ldr,
        Opcode::Str,
        Opcode::Rti,
        Opcode::Not,
        Opcode::Ldi,
        Opcode::Sti,
        Opcode::Jmp,
        Opcode::Res,
        Opcode::Lea,
        Opcode::Trap,
    ];

    /// Opcode of an instruction word.
    pub fn of(word: u16) -> Opcode {
        Self::ALL[(word >> 12) as usize]
    }

    /// Opcode shifted into place.
    pub fn bits(self) -> u16 {
        (self as u16) << 12
    }
}

/// A bit field inside an instruction word.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Field {
    shift: u32,
    width: u32,
}

impl Field {
    pub const fn new(shift: u32, width: u32) -> Self {
        Field { shift, width }
    }

    pub fn width(self) -> u32 {
        self.width
    }

    pub fn mask(self) -> u16 {
        ((1u32 << self.width) - 1) as u16
    }

    /// Place the low bits of `val` into the field. Higher bits are dropped.
    pub fn pack(self, val: u16) -> u16 {
        (val & self.mask()) << self.shift
    }

    pub fn get(self, word: u16) -> u16 {
        (word >> self.shift) & self.mask()
    }

    pub fn get_signed(self, word: u16) -> i16 {
        s_ext(self.get(word), self.width) as i16
    }

    /// Value as it reads back from the field once stored: low bits kept, then sign-extended.
    pub fn truncate_signed(self, val: i32) -> i16 {
        s_ext(val as u16 & self.mask(), self.width) as i16
    }

    pub fn fits_signed(self, val: i32) -> bool {
        let range = 1i32 << (self.width - 1);
        (-range..range).contains(&val)
    }

    pub fn fits_unsigned(self, val: i32) -> bool {
        (0..1i32 << self.width).contains(&val)
    }
}

/// Operand field layouts, MSB first.
pub mod field {
    use super::Field;

    pub const DR: Field = Field::new(9, 3);
    pub const SR: Field = Field::new(9, 3);
    pub const SR1: Field = Field::new(6, 3);
    pub const BASE: Field = Field::new(6, 3);
    pub const SR2: Field = Field::new(0, 3);
    pub const NZP: Field = Field::new(9, 3);
    pub const MODE: Field = Field::new(5, 1);
    pub const LONG: Field = Field::new(11, 1);
    pub const IMM5: Field = Field::new(0, 5);
    pub const OFFSET6: Field = Field::new(0, 6);
    pub const PC_OFFSET9: Field = Field::new(0, 9);
    pub const PC_OFFSET11: Field = Field::new(0, 11);
    pub const TRAPVECT8: Field = Field::new(0, 8);
    /// Low bits of `NOT`, always set.
    pub const NOT_ONES: Field = Field::new(0, 6);
}

/// Sign-extend the low `bits` bits of `val` to 16 bits.
#[inline]
pub fn s_ext(val: u16, bits: u32) -> u16 {
    debug_assert!(bits > 0 && bits < 16);
    // Sign bit
    let sign = val & (1u16 << (bits - 1));
    // Bits lower than sign bit
    let magnitude = val & ((1u16 << bits) - 1);
    // Positive input: all bits unset; 0x0000
    // Negative input: sign bit and above will be set, lower bits will be reset
    //      Eg. bits=14 -> 0xE000
    let sign_extension = (!sign).wrapping_add(1); // sign * -1
    magnitude | sign_extension
}

/// Represents the CPU registers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    /// Return address for `JSR`/`JSRR`, jumped to by `RET`.
    R7,
}

impl Register {
    pub const ALL: [Register; 8] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
    ];

    /// Register named by the low 3 bits.
    pub fn from_bits(bits: u16) -> Register {
        Self::ALL[(bits & 0b111) as usize]
    }

    pub fn bits(self) -> u16 {
        self as u16
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [b'r' | b'R', n @ b'0'..=b'7'] => Ok(Register::from_bits((n - b'0') as u16)),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", *self as u8)
    }
}

/// Condition mask of a branch, or the condition code register of the machine.
///
/// Bits are negative (4), zero (2) and positive (1).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct Nzp(u8);

impl Nzp {
    pub const NONE: Nzp = Nzp(0);
    pub const N: Nzp = Nzp(0b100);
    pub const Z: Nzp = Nzp(0b010);
    pub const P: Nzp = Nzp(0b001);
    pub const NZP: Nzp = Nzp(0b111);

    pub fn from_bits(bits: u16) -> Nzp {
        Nzp((bits & 0b111) as u8)
    }

    pub fn bits(self) -> u16 {
        self.0 as u16
    }

    /// Condition code set by writing `val` to a register.
    pub fn from_value(val: u16) -> Nzp {
        match (val as i16).cmp(&0) {
            Ordering::Less => Nzp::N,
            Ordering::Equal => Nzp::Z,
            Ordering::Greater => Nzp::P,
        }
    }

    pub fn intersects(self, other: Nzp) -> bool {
        self.0 & other.0 != 0
    }

    /// Parse the suffix of a branch mnemonic, eg. `nz` in `BRnz`.
    ///
    /// Letters must appear in `n`, `z`, `p` order and at most once each.
    pub fn from_suffix(suffix: &str) -> Option<Nzp> {
        let mut bits = 0u8;
        let mut last = 0b1000u8;
        for ch in suffix.chars() {
            let bit = match ch.to_ascii_lowercase() {
                'n' => 0b100,
                'z' => 0b010,
                'p' => 0b001,
                _ => return None,
            };
            if bit >= last {
                return None;
            }
            bits |= bit;
            last = bit;
        }
        Some(Nzp(bits))
    }
}

impl fmt::Display for Nzp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bit, ch) in [(0b100, 'n'), (0b010, 'z'), (0b001, 'p')] {
            if self.0 & bit != 0 {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

/// Named system calls.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TrapVect {
    /// Read a character, no echo.
    Getc = 0x20,
    /// Write the character in R0.
    Out = 0x21,
    /// Write a string of one character per word.
    Puts = 0x22,
    /// Prompt for and read a character, with echo.
    In = 0x23,
    /// Write a string of two characters per word.
    Putsp = 0x24,
    Halt = 0x25,
}

impl TrapVect {
    const ALL: [TrapVect; 6] = [
        TrapVect::Getc,
        TrapVect::Out,
        TrapVect::Puts,
        TrapVect::In,
        TrapVect::Putsp,
        TrapVect::Halt,
    ];

    pub fn vect(self) -> u8 {
        self as u8
    }

    pub fn from_vect(vect: u8) -> Option<TrapVect> {
        Self::ALL.into_iter().find(|trap| trap.vect() == vect)
    }
}

/// Assembly mnemonics, including branch variants and aliases.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Mnemonic {
    Add,
    And,
    Br(Nzp),
    Jmp,
    Jsr,
    Jsrr,
    Ld,
    Ldi,
    Ldr,
    Lea,
    Not,
    /// `JMP R7`
    Ret,
    St,
    Sti,
    Str,
    Trap,
    /// `TRAP` with a fixed vector.
    Alias(TrapVect),
}

/// Mnemonic names. Branches are handled separately, by prefix.
///
/// When two names map to the same mnemonic the first one is used for display.
const MNEMONIC_TABLE: &[(&str, Mnemonic)] = &[
    ("ADD", Mnemonic::Add),
    ("AND", Mnemonic::And),
    ("JMP", Mnemonic::Jmp),
    ("JSR", Mnemonic::Jsr),
    ("JSRR", Mnemonic::Jsrr),
    ("LD", Mnemonic::Ld),
    ("LDI", Mnemonic::Ldi),
    ("LDR", Mnemonic::Ldr),
    ("LEA", Mnemonic::Lea),
    ("NOT", Mnemonic::Not),
    ("RET", Mnemonic::Ret),
    ("ST", Mnemonic::St),
    ("STI", Mnemonic::Sti),
    ("STR", Mnemonic::Str),
    ("TRAP", Mnemonic::Trap),
    ("GETC", Mnemonic::Alias(TrapVect::Getc)),
    ("OUT", Mnemonic::Alias(TrapVect::Out)),
    ("PUTC", Mnemonic::Alias(TrapVect::Out)),
    ("PUTS", Mnemonic::Alias(TrapVect::Puts)),
    ("IN", Mnemonic::Alias(TrapVect::In)),
    ("PUTSP", Mnemonic::Alias(TrapVect::Putsp)),
    ("HALT", Mnemonic::Alias(TrapVect::Halt)),
];

/// Kind of operand a mnemonic expects in a given position.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperandClass {
    Reg,
    RegOrImm,
    /// Numeric literal.
    Imm,
    /// Label, or numeric PC offset.
    Target,
}

impl fmt::Display for OperandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperandClass::Reg => "register",
            OperandClass::RegOrImm => "register or numeric literal",
            OperandClass::Imm => "numeric literal",
            OperandClass::Target => "label or numeric offset",
        })
    }
}

impl Mnemonic {
    /// Operands expected by the mnemonic, in source order.
    pub fn operands(self) -> &'static [OperandClass] {
        use OperandClass::*;
        match self {
            Mnemonic::Add | Mnemonic::And => &[Reg, Reg, RegOrImm],
            Mnemonic::Br(_) | Mnemonic::Jsr => &[Target],
            Mnemonic::Jmp | Mnemonic::Jsrr => &[Reg],
            Mnemonic::Ld | Mnemonic::Ldi | Mnemonic::Lea => &[Reg, Target],
            Mnemonic::St | Mnemonic::Sti => &[Reg, Target],
            Mnemonic::Ldr | Mnemonic::Str => &[Reg, Reg, Imm],
            Mnemonic::Not => &[Reg, Reg],
            Mnemonic::Trap => &[Imm],
            Mnemonic::Ret | Mnemonic::Alias(_) => &[],
        }
    }
}

impl FromStr for Mnemonic {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if let Some(suffix) = upper.strip_prefix("BR") {
            return Nzp::from_suffix(suffix).map(Mnemonic::Br).ok_or(());
        }
        MNEMONIC_TABLE
            .iter()
            .find(|(name, _)| *name == upper)
            .map(|(_, mnemonic)| *mnemonic)
            .ok_or(())
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Mnemonic::Br(nzp) = self {
            return write!(f, "BR{nzp}");
        }
        let (name, _) = MNEMONIC_TABLE
            .iter()
            .find(|(_, mnemonic)| mnemonic == self)
            .ok_or(fmt::Error)?;
        f.write_str(name)
    }
}

/// Second operand of `ADD`/`AND`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ImmOrReg {
    /// Sign-extended `imm5`.
    Imm(i16),
    Reg(Register),
}

/// A decoded machine instruction.
///
/// Offsets and immediates hold the value as the machine reads it: sign-extended from their field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Instr {
    Br { nzp: Nzp, offset: i16 },
    Add { dr: Register, sr1: Register, src: ImmOrReg },
    Ld { dr: Register, offset: i16 },
    St { sr: Register, offset: i16 },
    Jsr { offset: i16 },
    Jsrr { base: Register },
    And { dr: Register, sr1: Register, src: ImmOrReg },
    Ldr { dr: Register, base: Register, offset: i16 },
    Str { sr: Register, base: Register, offset: i16 },
    Not { dr: Register, sr: Register },
    Ldi { dr: Register, offset: i16 },
    Sti { sr: Register, offset: i16 },
    /// `RET` when `base` is R7.
    Jmp { base: Register },
    Lea { dr: Register, offset: i16 },
    Trap { vect: u8 },
}

/// `RET`, encoded as `JMP R7`.
pub const RET_WORD: u16 = 0b1100_000_111_000000;

impl Instr {
    pub fn encode(&self) -> u16 {
        use field::*;
        match *self {
            Instr::Br { nzp, offset } => {
                Opcode::Br.bits() | NZP.pack(nzp.bits()) | PC_OFFSET9.pack(offset as u16)
            }
            Instr::Add { dr, sr1, src } => Opcode::Add.bits() | encode_alu(dr, sr1, src),
            Instr::Ld { dr, offset } => {
                Opcode::Ld.bits() | DR.pack(dr.bits()) | PC_OFFSET9.pack(offset as u16)
            }
            Instr::St { sr, offset } => {
                Opcode::St.bits() | SR.pack(sr.bits()) | PC_OFFSET9.pack(offset as u16)
            }
            Instr::Jsr { offset } => {
                Opcode::Jsr.bits() | LONG.pack(1) | PC_OFFSET11.pack(offset as u16)
            }
            Instr::Jsrr { base } => Opcode::Jsr.bits() | BASE.pack(base.bits()),
            Instr::And { dr, sr1, src } => Opcode::And.bits() | encode_alu(dr, sr1, src),
            Instr::Ldr { dr, base, offset } => {
                Opcode::Ldr.bits()
                    | DR.pack(dr.bits())
                    | BASE.pack(base.bits())
                    | OFFSET6.pack(offset as u16)
            }
            Instr::Str { sr, base, offset } => {
                Opcode::Str.bits()
                    | SR.pack(sr.bits())
                    | BASE.pack(base.bits())
                    | OFFSET6.pack(offset as u16)
            }
            Instr::Not { dr, sr } => {
                Opcode::Not.bits() | DR.pack(dr.bits()) | SR1.pack(sr.bits()) | NOT_ONES.mask()
            }
            Instr::Ldi { dr, offset } => {
                Opcode::Ldi.bits() | DR.pack(dr.bits()) | PC_OFFSET9.pack(offset as u16)
            }
            Instr::Sti { sr, offset } => {
                Opcode::Sti.bits() | SR.pack(sr.bits()) | PC_OFFSET9.pack(offset as u16)
            }
            Instr::Jmp { base } => Opcode::Jmp.bits() | BASE.pack(base.bits()),
            Instr::Lea { dr, offset } => {
                Opcode::Lea.bits() | DR.pack(dr.bits()) | PC_OFFSET9.pack(offset as u16)
            }
            Instr::Trap { vect } => Opcode::Trap.bits() | TRAPVECT8.pack(vect as u16),
        }
    }

    /// Inverse of [`Instr::encode`]. Unused bits of a word are ignored.
    pub fn decode(word: u16) -> Result<Instr, UnknownOpcode> {
        use field::*;
        let dr = Register::from_bits(DR.get(word));
        let base = Register::from_bits(BASE.get(word));
        let offset9 = PC_OFFSET9.get_signed(word);
        let instr = match Opcode::of(word) {
            Opcode::Br => Instr::Br {
                nzp: Nzp::from_bits(NZP.get(word)),
                offset: offset9,
            },
            Opcode::Add => Instr::Add {
                dr,
                sr1: base,
                src: decode_alu_src(word),
            },
            Opcode::Ld => Instr::Ld { dr, offset: offset9 },
            Opcode::St => Instr::St { sr: dr, offset: offset9 },
            Opcode::Jsr => match LONG.get(word) {
                1 => Instr::Jsr {
                    offset: PC_OFFSET11.get_signed(word),
                },
                _ => Instr::Jsrr { base },
            },
            Opcode::And => Instr::And {
                dr,
                sr1: base,
                src: decode_alu_src(word),
            },
            Opcode::Ldr => Instr::Ldr {
                dr,
                base,
                offset: OFFSET6.get_signed(word),
            },
            Opcode::Str => Instr::Str {
                sr: dr,
                base,
                offset: OFFSET6.get_signed(word),
            },
            Opcode::Not => Instr::Not { dr, sr: base },
            Opcode::Ldi => Instr::Ldi { dr, offset: offset9 },
            Opcode::Sti => Instr::Sti { sr: dr, offset: offset9 },
            Opcode::Jmp => Instr::Jmp { base },
            Opcode::Lea => Instr::Lea { dr, offset: offset9 },
            Opcode::Trap => Instr::Trap {
                vect: TRAPVECT8.get(word) as u8,
            },
            Opcode::Rti | Opcode::Res => return Err(UnknownOpcode { word }),
        };
        Ok(instr)
    }

    /// Mnemonic this instruction is written with.
    pub fn mnemonic(&self) -> Mnemonic {
        match *self {
            Instr::Br { nzp, .. } => Mnemonic::Br(nzp),
            Instr::Add { .. } => Mnemonic::Add,
            Instr::Ld { .. } => Mnemonic::Ld,
            Instr::St { .. } => Mnemonic::St,
            Instr::Jsr { .. } => Mnemonic::Jsr,
            Instr::Jsrr { .. } => Mnemonic::Jsrr,
            Instr::And { .. } => Mnemonic::And,
            Instr::Ldr { .. } => Mnemonic::Ldr,
            Instr::Str { .. } => Mnemonic::Str,
            Instr::Not { .. } => Mnemonic::Not,
            Instr::Ldi { .. } => Mnemonic::Ldi,
            Instr::Sti { .. } => Mnemonic::Sti,
            Instr::Jmp { base: Register::R7 } => Mnemonic::Ret,
            Instr::Jmp { .. } => Mnemonic::Jmp,
            Instr::Lea { .. } => Mnemonic::Lea,
            Instr::Trap { vect } => match TrapVect::from_vect(vect) {
                Some(trap) => Mnemonic::Alias(trap),
                None => Mnemonic::Trap,
            },
        }
    }

    /// Offset added to the incremented PC, for PC-relative instructions.
    pub fn pc_offset(&self) -> Option<i16> {
        match *self {
            Instr::Br { offset, .. }
            | Instr::Ld { offset, .. }
            | Instr::St { offset, .. }
            | Instr::Jsr { offset }
            | Instr::Ldi { offset, .. }
            | Instr::Sti { offset, .. }
            | Instr::Lea { offset, .. } => Some(offset),
            _ => None,
        }
    }
}

fn encode_alu(dr: Register, sr1: Register, src: ImmOrReg) -> u16 {
    use field::*;
    let regs = DR.pack(dr.bits()) | SR1.pack(sr1.bits());
    match src {
        ImmOrReg::Reg(sr2) => regs | SR2.pack(sr2.bits()),
        ImmOrReg::Imm(imm) => regs | MODE.pack(1) | IMM5.pack(imm as u16),
    }
}

fn decode_alu_src(word: u16) -> ImmOrReg {
    use field::*;
    match MODE.get(word) {
        1 => ImmOrReg::Imm(IMM5.get_signed(word)),
        _ => ImmOrReg::Reg(Register::from_bits(SR2.get(word))),
    }
}

impl fmt::Display for ImmOrReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImmOrReg::Imm(imm) => write!(f, "#{imm}"),
            ImmOrReg::Reg(reg) => write!(f, "{reg}"),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.mnemonic();
        match *self {
            Instr::Add { dr, sr1, src } | Instr::And { dr, sr1, src } => {
                write!(f, "{mnemonic} {dr}, {sr1}, {src}")
            }
            Instr::Br { offset, .. } | Instr::Jsr { offset } => write!(f, "{mnemonic} #{offset}"),
            Instr::Ld { dr: reg, offset }
            | Instr::Ldi { dr: reg, offset }
            | Instr::Lea { dr: reg, offset }
            | Instr::St { sr: reg, offset }
            | Instr::Sti { sr: reg, offset } => write!(f, "{mnemonic} {reg}, #{offset}"),
            Instr::Ldr { dr: reg, base, offset } | Instr::Str { sr: reg, base, offset } => {
                write!(f, "{mnemonic} {reg}, {base}, #{offset}")
            }
            Instr::Not { dr, sr } => write!(f, "{mnemonic} {dr}, {sr}"),
            Instr::Jmp { base: Register::R7 } => write!(f, "{mnemonic}"),
            Instr::Jmp { base } | Instr::Jsrr { base } => write!(f, "{mnemonic} {base}"),
            Instr::Trap { vect } => match mnemonic {
                Mnemonic::Alias(_) => write!(f, "{mnemonic}"),
                _ => write!(f, "{mnemonic} x{vect:02X}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s_ext() {
        #[rustfmt::skip]
        let cases: &[(_, &[_])] = &[
            // (input, [bits...])
            //           15      14      13      12      11      10      9       8       7       6       5       4       3       2       1
            (0x0000, &[0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000]),
            (0x0001, &[0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0xffff]),
            (0x00ff, &[0x00ff, 0x00ff, 0x00ff, 0x00ff, 0x00ff, 0x00ff, 0x00ff, 0xffff, 0xffff]),
            (0x0100, &[0x0100, 0x0100, 0x0100, 0x0100, 0x0100, 0x0100, 0xff00, 0x0000, 0x0000]),
            (0x01ff, &[0x01ff, 0x01ff, 0x01ff, 0x01ff, 0x01ff, 0x01ff, 0xffff, 0xffff, 0xffff]),
            (0x0400, &[0x0400, 0x0400, 0x0400, 0x0400, 0xfc00, 0x0000, 0x0000, 0x0000, 0x0000]),
            (0x07ff, &[0x07ff, 0x07ff, 0x07ff, 0x07ff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff]),
            (0x1000, &[0x1000, 0x1000, 0xf000, 0x0000, 0x0000]),
            (0x7fff, &[0xffff, 0xffff, 0xffff, 0xffff, 0xffff]),
            (0xfffe, &[0xfffe, 0xfffe, 0xfffe, 0xfffe, 0xfffe, 0xfffe, 0xfffe, 0xfffe, 0xfffe, 0xfffe, 0xfffe, 0xfffe, 0xfffe, 0xfffe, 0x0000]),
            (0xffff, &[0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff]),
        ];

        for (input, expecteds) in cases {
            for (i, expected) in expecteds.iter().enumerate() {
                let bits = 15 - i as u32;
                let actual = super::s_ext(*input, bits);
                assert_eq!(
                    actual, *expected,
                    "s_ext(0x{input:04x}, {bits}) == 0x{actual:04x}"
                );
            }
        }
    }

    #[test]
    fn add_immediate_word() {
        let instr = Instr::Add {
            dr: Register::R1,
            sr1: Register::R1,
            src: ImmOrReg::Imm(-1),
        };
        assert_eq!(instr.encode(), 0b0001_001_001_1_11111);
    }

    #[test]
    fn ret_is_jmp_r7() {
        let ret = Instr::Jmp { base: Register::R7 };
        assert_eq!(ret.encode(), RET_WORD);
        assert_eq!(ret.to_string(), "RET");
        assert_eq!(Instr::decode(RET_WORD), Ok(ret));
    }

    #[test]
    fn decode_reverses_encode() {
        use Register::*;
        let instrs = [
            Instr::Add { dr: R0, sr1: R1, src: ImmOrReg::Reg(R2) },
            Instr::Add { dr: R7, sr1: R6, src: ImmOrReg::Imm(-16) },
            Instr::And { dr: R2, sr1: R2, src: ImmOrReg::Imm(15) },
            Instr::And { dr: R3, sr1: R4, src: ImmOrReg::Reg(R5) },
            Instr::Br { nzp: Nzp::NONE, offset: 4 },
            Instr::Br { nzp: Nzp::N, offset: -256 },
            Instr::Br { nzp: Nzp::NZP, offset: 255 },
            Instr::Ld { dr: R3, offset: -1 },
            Instr::Ldi { dr: R4, offset: 100 },
            Instr::Lea { dr: R0, offset: 2 },
            Instr::St { sr: R5, offset: -100 },
            Instr::Sti { sr: R6, offset: 7 },
            Instr::Ldr { dr: R1, base: R6, offset: -32 },
            Instr::Str { sr: R0, base: R6, offset: 31 },
            Instr::Jsr { offset: -1024 },
            Instr::Jsrr { base: R3 },
            Instr::Jmp { base: R2 },
            Instr::Jmp { base: R7 },
            Instr::Not { dr: R1, sr: R0 },
            Instr::Trap { vect: 0x22 },
            Instr::Trap { vect: 0x25 },
            Instr::Trap { vect: 0x99 },
        ];
        for instr in instrs {
            assert_eq!(Instr::decode(instr.encode()), Ok(instr), "{instr}");
        }
    }

    #[test]
    fn reserved_opcodes_do_not_decode() {
        assert_eq!(Instr::decode(0x8000), Err(UnknownOpcode { word: 0x8000 }));
        assert_eq!(Instr::decode(0xD123), Err(UnknownOpcode { word: 0xD123 }));
    }

    #[test]
    fn not_sets_low_bits() {
        let instr = Instr::Not { dr: Register::R1, sr: Register::R0 };
        assert_eq!(instr.encode(), 0b1001_001_000_111111);
    }

    #[test]
    fn branch_masks() {
        assert_eq!("BR".parse(), Ok(Mnemonic::Br(Nzp::NONE)));
        assert_eq!("BRn".parse(), Ok(Mnemonic::Br(Nzp::N)));
        assert_eq!("brzp".parse::<Mnemonic>().map(|m| m.to_string()), Ok("BRzp".into()));
        assert_eq!("BRNZP".parse(), Ok(Mnemonic::Br(Nzp::NZP)));
        assert_eq!("BRpn".parse::<Mnemonic>(), Err(()));
        assert_eq!("BRnn".parse::<Mnemonic>(), Err(()));
        assert_eq!("BRx".parse::<Mnemonic>(), Err(()));
    }

    #[test]
    fn mnemonic_names() {
        assert_eq!("puts".parse(), Ok(Mnemonic::Alias(TrapVect::Puts)));
        assert_eq!("PUTs".parse(), Ok(Mnemonic::Alias(TrapVect::Puts)));
        assert_eq!("PUTC".parse(), Ok(Mnemonic::Alias(TrapVect::Out)));
        assert_eq!(Mnemonic::Alias(TrapVect::Out).to_string(), "OUT");
        assert_eq!("MUL".parse::<Mnemonic>(), Err(()));
        assert_eq!(
            Instr::Trap { vect: 0x26 }.to_string(),
            "TRAP x26"
        );
    }

    #[test]
    fn condition_from_value() {
        assert_eq!(Nzp::from_value(0), Nzp::Z);
        assert_eq!(Nzp::from_value(1), Nzp::P);
        assert_eq!(Nzp::from_value(0x7FFF), Nzp::P);
        assert_eq!(Nzp::from_value(0x8000), Nzp::N);
        assert_eq!(Nzp::from_value(0xFFFF), Nzp::N);
    }

    #[test]
    fn field_truncation() {
        use field::*;
        assert_eq!(IMM5.truncate_signed(-1), -1);
        assert_eq!(IMM5.truncate_signed(16), -16);
        assert_eq!(IMM5.truncate_signed(40), 8);
        assert!(IMM5.fits_signed(-16) && IMM5.fits_signed(15));
        assert!(!IMM5.fits_signed(16) && !IMM5.fits_signed(-17));
        assert!(TRAPVECT8.fits_unsigned(0xFF) && !TRAPVECT8.fits_unsigned(0x100));
    }

    #[test]
    fn register_names() {
        assert_eq!("r3".parse(), Ok(Register::R3));
        assert_eq!("R7".parse(), Ok(Register::R7));
        assert_eq!("R8".parse::<Register>(), Err(()));
        assert_eq!(Register::R5.to_string(), "R5");
    }
}
