use std::io::{self, Read, Write};

use crate::asm::OffsetMode;
use crate::error::RunError;
use crate::image::Image;
use crate::isa::{ImmOrReg, Instr, Nzp, Register, TrapVect};

/// LC3 can address 128KB of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Program counter at boot.
pub const START_PC: u16 = 0x3000;

/// Printed by the `IN` trap before reading.
const IN_PROMPT: &str = "Input a character> ";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Running,
    /// Terminal: stepping a halted machine does nothing.
    Halted,
}

/// Represents complete program state during runtime.
pub struct RunState {
    /// System memory - 128KB in size.
    mem: Box<[u16]>,
    /// Program counter
    pc: u16,
    /// 8x 16-bit registers
    reg: [u16; 8],
    /// Condition code
    flag: Nzp,
    status: Status,
    /// Instructions executed so far
    steps: u64,
    /// How label offsets in the loaded program were encoded
    offsets: OffsetMode,
    orig: u16,
}

impl RunState {
    /// Load an image at its origin and reset the machine.
    pub fn boot(image: &Image) -> RunState {
        RunState::boot_with(image, OffsetMode::Relative)
    }

    /// Like [`RunState::boot`], for an image assembled with the given offset mode.
    ///
    /// With [`OffsetMode::Absolute`] the offset fields of BR, JSR, LD, LDI, LEA, ST and STI count
    /// from the image origin instead of the incremented PC.
    pub fn boot_with(image: &Image, offsets: OffsetMode) -> RunState {
        let mut mem = vec![0; MEMORY_MAX].into_boxed_slice();
        for (addr, word) in image.iter() {
            mem[addr as usize] = word;
        }
        log::debug!(
            "loaded {} words at x{:04X} with {offsets:?} offsets, starting at x{START_PC:04X}",
            image.len(),
            image.orig()
        );
        RunState {
            mem,
            pc: START_PC,
            reg: [0; 8],
            flag: Nzp::NONE,
            status: Status::Running,
            steps: 0,
            offsets,
            orig: image.orig(),
        }
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn reg(&self, reg: Register) -> u16 {
        self.reg[reg as usize]
    }

    /// Overwrite a register without touching the condition code.
    pub fn set_reg(&mut self, reg: Register, val: u16) {
        self.reg[reg as usize] = val;
    }

    pub fn flag(&self) -> Nzp {
        self.flag
    }

    pub fn mem(&self, addr: u16) -> u16 {
        self.mem[addr as usize]
    }

    pub fn write_mem(&mut self, addr: u16, val: u16) {
        self.mem[addr as usize] = val;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_halted(&self) -> bool {
        self.status == Status::Halted
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Run until the machine halts. Returns the number of instructions executed.
    pub fn run(&mut self, input: &mut impl Read, output: &mut impl Write) -> Result<u64, RunError> {
        while self.step(input, output)? == Status::Running {}
        Ok(self.steps)
    }

    /// Run for at most `limit` instructions.
    pub fn run_with_limit(
        &mut self,
        input: &mut impl Read,
        output: &mut impl Write,
        limit: u64,
    ) -> Result<Status, RunError> {
        for _ in 0..limit {
            if self.step(input, output)? == Status::Halted {
                break;
            }
        }
        Ok(self.status)
    }

    /// Fetch, decode and execute one instruction.
    pub fn step(
        &mut self,
        input: &mut impl Read,
        output: &mut impl Write,
    ) -> Result<Status, RunError> {
        if self.is_halted() {
            return Ok(Status::Halted);
        }
        let addr = self.pc;
        let word = self.mem(addr);
        // PC incremented before instruction is performed
        self.pc = self.pc.wrapping_add(1);
        let instr = Instr::decode(word).map_err(|_| RunError::UnknownOpcode { addr, word })?;
        log::trace!("x{addr:04X}  x{word:04X}  {instr}");
        self.steps += 1;

        match instr {
            Instr::Add { dr, sr1, src } => {
                let val = self.reg(sr1).wrapping_add(self.alu_src(src));
                self.write_reg(dr, val);
            }
            Instr::And { dr, sr1, src } => {
                let val = self.reg(sr1) & self.alu_src(src);
                self.write_reg(dr, val);
            }
            Instr::Not { dr, sr } => {
                let val = !self.reg(sr);
                self.write_reg(dr, val);
            }
            Instr::Br { nzp, offset } => {
                if nzp.intersects(self.flag) {
                    self.pc = self.rel(offset);
                }
            }
            Instr::Jmp { base } => self.pc = self.reg(base),
            Instr::Jsr { offset } => {
                let ret = self.pc;
                self.pc = self.rel(offset);
                self.set_reg(Register::R7, ret);
            }
            Instr::Jsrr { base } => {
                // Read base first, it may be R7
                let ret = self.pc;
                self.pc = self.reg(base);
                self.set_reg(Register::R7, ret);
            }
            Instr::Ld { dr, offset } => {
                let val = self.mem(self.rel(offset));
                self.write_reg(dr, val);
            }
            Instr::Ldi { dr, offset } => {
                let ptr = self.mem(self.rel(offset));
                let val = self.mem(ptr);
                self.write_reg(dr, val);
            }
            Instr::Ldr { dr, base, offset } => {
                let val = self.mem(self.reg(base).wrapping_add(offset as u16));
                self.write_reg(dr, val);
            }
            Instr::Lea { dr, offset } => {
                let val = self.rel(offset);
                self.write_reg(dr, val);
            }
            Instr::St { sr, offset } => {
                let addr = self.rel(offset);
                self.write_mem(addr, self.reg(sr));
            }
            Instr::Sti { sr, offset } => {
                let ptr = self.mem(self.rel(offset));
                self.write_mem(ptr, self.reg(sr));
            }
            Instr::Str { sr, base, offset } => {
                let addr = self.reg(base).wrapping_add(offset as u16);
                self.write_mem(addr, self.reg(sr));
            }
            Instr::Trap { vect } => self.trap(addr, vect, input, output)?,
        }
        Ok(self.status)
    }

    /// Address an offset field points at.
    #[inline]
    fn rel(&self, offset: i16) -> u16 {
        match self.offsets {
            OffsetMode::Relative => self.pc.wrapping_add(offset as u16),
            OffsetMode::Absolute => self.orig.wrapping_add(offset as u16),
        }
    }

    #[inline]
    fn alu_src(&self, src: ImmOrReg) -> u16 {
        match src {
            ImmOrReg::Imm(imm) => imm as u16,
            ImmOrReg::Reg(reg) => self.reg(reg),
        }
    }

    /// Register write from an instruction, which also sets the condition code.
    #[inline]
    fn write_reg(&mut self, reg: Register, val: u16) {
        self.set_reg(reg, val);
        self.flag = Nzp::from_value(val);
    }

    fn trap(
        &mut self,
        addr: u16,
        vect: u8,
        input: &mut impl Read,
        output: &mut impl Write,
    ) -> Result<(), RunError> {
        let trap = TrapVect::from_vect(vect).ok_or(RunError::UnsupportedTrap { addr, vect })?;
        match trap {
            TrapVect::Getc => {
                let ch = read_byte(input)?;
                self.write_reg(Register::R0, ch as u16);
            }
            TrapVect::Out => write!(output, "{}", to_char(self.reg(Register::R0)))?,
            TrapVect::Puts => {
                let mut addr = self.reg(Register::R0);
                loop {
                    let word = self.mem(addr);
                    if word == 0 {
                        break;
                    }
                    write!(output, "{}", to_char(word))?;
                    addr = addr.wrapping_add(1);
                }
                writeln!(output)?;
            }
            TrapVect::In => {
                write!(output, "{IN_PROMPT}")?;
                output.flush()?;
                let ch = read_byte(input)?;
                write!(output, "{}", ch as char)?;
                self.write_reg(Register::R0, ch as u16);
            }
            TrapVect::Putsp => {
                let mut addr = self.reg(Register::R0);
                'string: loop {
                    let word = self.mem(addr);
                    // Low byte first
                    for chr in [word & 0xFF, word >> 8] {
                        if chr == 0 {
                            break 'string;
                        }
                        write!(output, "{}", chr as u8 as char)?;
                    }
                    addr = addr.wrapping_add(1);
                }
            }
            TrapVect::Halt => {
                log::debug!("halted at x{addr:04X} after {} steps", self.steps);
                self.status = Status::Halted;
            }
        }
        output.flush()?;
        Ok(())
    }
}

/// Character for a whole word. Lone surrogates print as U+FFFD.
fn to_char(word: u16) -> char {
    char::from_u32(word as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Read one byte, or 0 at the end of input.
fn read_byte(input: &mut impl Read) -> io::Result<u8> {
    let mut buf = [0; 1];
    match input.read(&mut buf)? {
        0 => Ok(0),
        _ => Ok(buf[0]),
    }
}
