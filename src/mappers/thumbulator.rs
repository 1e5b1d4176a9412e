/*!
Thumb (ARMv4T / Cortex-M0 subset) interpreter for the DPC+ co-processor.

Memory map
- 0x0000_0000: cartridge image, read-only (the whole 32K DPC+ image)
- 0x4000_0000: cartridge RAM (8K, mirrored by `addr & 0x1FFF`)
- 0xE000_0000: peripheral space; only the MAM control register at
  0xE01F_C000 holds a value, other reads yield 0 and writes are dropped

Run model
- `run` resets the register file to the driver entry state (SP 0x4000_1FB4,
  LR 0x0C00, first instruction at 0x0C08) and executes until control is
  transferred to an even (ARM state) address, which is how the driver
  returns to the 6507 side.
- R15 holds the address of the next instruction plus 2 between
  instructions, so an instruction reading PC sees its own address plus 4.
- More than `MAX_INSTRUCTIONS` in one run is reported as a runaway driver.
*/

use thiserror::Error;

const ROM_BASE: u32 = 0x0000_0000;
const RAM_BASE: u32 = 0x4000_0000;
const RAM_MASK: u32 = 0x1FFF;
const PERIPHERAL_BASE: u32 = 0xE000_0000;
const MAMCR: u32 = 0xE01F_C000;

const ENTRY_SP: u32 = 0x4000_1FB4;
const ENTRY_LR: u32 = 0x0000_0C00;
const ENTRY_PC: u32 = 0x0000_0C08;

pub const MAX_INSTRUCTIONS: u64 = 500_000;

const SP: usize = 13;
const LR: usize = 14;
const PC: usize = 15;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThumbError {
    #[error("{op}: invalid address 0x{addr:08X}")]
    InvalidAddress { op: &'static str, addr: u32 },

    #[error("{op}: misaligned address 0x{addr:08X}")]
    Misaligned { op: &'static str, addr: u32 },

    #[error("undefined instruction 0x{inst:04X} at 0x{addr:08X}")]
    UndefinedInstruction { addr: u32, inst: u16 },

    #[error("unsupported {what} at 0x{addr:08X}")]
    Unsupported { what: &'static str, addr: u32 },

    #[error("runaway ARM code: more than {instructions} instructions")]
    Runaway { instructions: u64 },
}

struct Memory<'a> {
    rom: &'a [u8],
    ram: &'a mut [u8],
    mamcr: u32,
}

impl Memory<'_> {
    fn read(&self, op: &'static str, addr: u32, width: u32) -> Result<u32, ThumbError> {
        if addr & (width - 1) != 0 {
            return Err(ThumbError::Misaligned { op, addr });
        }
        let bytes: &[u8] = match addr & 0xF000_0000 {
            ROM_BASE => {
                let start = (addr - ROM_BASE) as usize;
                self.rom
                    .get(start..start + width as usize)
                    .ok_or(ThumbError::InvalidAddress { op, addr })?
            }
            RAM_BASE => {
                let start = (addr & RAM_MASK) as usize;
                self.ram
                    .get(start..start + width as usize)
                    .ok_or(ThumbError::InvalidAddress { op, addr })?
            }
            PERIPHERAL_BASE => {
                return Ok(if addr == MAMCR { self.mamcr } else { 0 });
            }
            _ => return Err(ThumbError::InvalidAddress { op, addr }),
        };
        Ok(bytes
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32))
    }

    fn write(&mut self, op: &'static str, addr: u32, width: u32, value: u32) -> Result<(), ThumbError> {
        if addr & (width - 1) != 0 {
            return Err(ThumbError::Misaligned { op, addr });
        }
        match addr & 0xF000_0000 {
            RAM_BASE => {
                let start = (addr & RAM_MASK) as usize;
                let slot = self
                    .ram
                    .get_mut(start..start + width as usize)
                    .ok_or(ThumbError::InvalidAddress { op, addr })?;
                for (i, b) in slot.iter_mut().enumerate() {
                    *b = (value >> (8 * i)) as u8;
                }
                Ok(())
            }
            PERIPHERAL_BASE => {
                if addr == MAMCR {
                    self.mamcr = value;
                }
                Ok(())
            }
            _ => Err(ThumbError::InvalidAddress { op, addr }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Thumbulator {
    reg: [u32; 16],
    n: bool,
    z: bool,
    c: bool,
    v: bool,
    mamcr: u32,
    instructions: u64,
}

impl Thumbulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions executed by the last `run`.
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn register(&self, index: usize) -> u32 {
        self.reg[index & 0xF]
    }

    fn reset(&mut self) {
        self.reg = [0; 16];
        self.reg[SP] = ENTRY_SP;
        self.reg[LR] = ENTRY_LR;
        self.reg[PC] = ENTRY_PC + 2;
        self.n = false;
        self.z = false;
        self.c = false;
        self.v = false;
        self.instructions = 0;
    }

    /// Run the driver at the entry point until it returns to ARM state.
    /// `cycles` is the 6507 time elapsed since the previous call.
    pub fn run(&mut self, rom: &[u8], ram: &mut [u8], cycles: u64) -> Result<u64, ThumbError> {
        self.reset();
        let mut mem = Memory {
            rom,
            ram,
            mamcr: self.mamcr,
        };

        let result = loop {
            match self.execute(&mut mem) {
                Ok(true) => break Ok(self.instructions),
                Ok(false) => {}
                Err(e) => break Err(e),
            }
            if self.instructions > MAX_INSTRUCTIONS {
                break Err(ThumbError::Runaway {
                    instructions: MAX_INSTRUCTIONS,
                });
            }
        };

        self.mamcr = mem.mamcr;
        log::trace!(
            "thumb: {} instructions after {cycles} 6507 cycles",
            self.instructions
        );
        result
    }

    // ---------------------------------------------------------------------
    // Flag helpers
    // ---------------------------------------------------------------------

    #[inline]
    fn set_nz(&mut self, r: u32) {
        self.n = r & 0x8000_0000 != 0;
        self.z = r == 0;
    }

    fn add_flags(&mut self, a: u32, b: u32, carry: bool) -> u32 {
        let (r1, c1) = a.overflowing_add(b);
        let (r, c2) = r1.overflowing_add(carry as u32);
        self.c = c1 || c2;
        self.v = (a ^ r) & (b ^ r) & 0x8000_0000 != 0;
        self.set_nz(r);
        r
    }

    #[inline]
    fn sub_flags(&mut self, a: u32, b: u32, carry: bool) -> u32 {
        self.add_flags(a, !b, carry)
    }

    fn condition(&self, cond: u16) -> bool {
        match cond {
            0x0 => self.z,
            0x1 => !self.z,
            0x2 => self.c,
            0x3 => !self.c,
            0x4 => self.n,
            0x5 => !self.n,
            0x6 => self.v,
            0x7 => !self.v,
            0x8 => self.c && !self.z,
            0x9 => !self.c || self.z,
            0xA => self.n == self.v,
            0xB => self.n != self.v,
            0xC => !self.z && self.n == self.v,
            _ => self.z || self.n != self.v,
        }
    }

    #[inline]
    fn branch(&mut self, target: u32) {
        self.reg[PC] = (target & !1).wrapping_add(2);
    }

    /// Interworking branch; `true` when the target is ARM state.
    fn branch_exchange(&mut self, target: u32) -> bool {
        if target & 1 == 0 {
            return true;
        }
        self.branch(target);
        false
    }

    // ---------------------------------------------------------------------
    // Decode / execute
    // ---------------------------------------------------------------------

    /// One instruction. `Ok(true)` ends the run.
    fn execute(&mut self, mem: &mut Memory) -> Result<bool, ThumbError> {
        let addr = self.reg[PC].wrapping_sub(2);
        let inst = mem.read("fetch", addr, 2)? as u16;
        let pc = addr.wrapping_add(4);
        self.reg[PC] = pc;
        self.instructions += 1;

        let rd = (inst & 7) as usize;
        let rn = ((inst >> 3) & 7) as usize;
        let rm = ((inst >> 6) & 7) as usize;

        match inst >> 11 {
            // Shift by immediate.
            0b00000..=0b00010 => {
                let imm = ((inst >> 6) & 0x1F) as u32;
                let value = self.reg[rn];
                let r = match inst >> 11 {
                    0 => {
                        if imm != 0 {
                            self.c = value & (1 << (32 - imm)) != 0;
                        }
                        value.checked_shl(imm).unwrap_or(0)
                    }
                    1 => {
                        let shift = if imm == 0 { 32 } else { imm };
                        self.c = value & (1 << (shift - 1)) != 0;
                        value.checked_shr(shift).unwrap_or(0)
                    }
                    _ => {
                        let shift = if imm == 0 { 32 } else { imm };
                        self.c = value & (1 << (shift - 1)) != 0;
                        ((value as i32) >> shift.min(31)) as u32
                    }
                };
                self.reg[rd] = r;
                self.set_nz(r);
            }

            // ADD/SUB register or 3-bit immediate.
            0b00011 => {
                let operand = if inst & 0x0400 != 0 {
                    rm as u32
                } else {
                    self.reg[rm]
                };
                let a = self.reg[rn];
                self.reg[rd] = if inst & 0x0200 != 0 {
                    self.sub_flags(a, operand, true)
                } else {
                    self.add_flags(a, operand, false)
                };
            }

            // MOV/CMP/ADD/SUB 8-bit immediate.
            0b00100..=0b00111 => {
                let rd = ((inst >> 8) & 7) as usize;
                let imm = (inst & 0xFF) as u32;
                match (inst >> 11) & 3 {
                    0 => {
                        self.reg[rd] = imm;
                        self.set_nz(imm);
                    }
                    1 => {
                        self.sub_flags(self.reg[rd], imm, true);
                    }
                    2 => self.reg[rd] = self.add_flags(self.reg[rd], imm, false),
                    _ => self.reg[rd] = self.sub_flags(self.reg[rd], imm, true),
                }
            }

            0b01000 => {
                if inst & 0x0400 == 0 {
                    self.alu(inst);
                } else {
                    return self.hi_register(inst, addr);
                }
            }

            // LDR Rd, [PC, #imm8 * 4]
            0b01001 => {
                let rd = ((inst >> 8) & 7) as usize;
                let target = (pc & !3).wrapping_add(((inst & 0xFF) as u32) << 2);
                self.reg[rd] = mem.read("ldr", target, 4)?;
            }

            // Load/store with register offset.
            0b01010 | 0b01011 => {
                let target = self.reg[rn].wrapping_add(self.reg[rm]);
                match (inst >> 9) & 7 {
                    0 => mem.write("str", target, 4, self.reg[rd])?,
                    1 => mem.write("strh", target, 2, self.reg[rd])?,
                    2 => mem.write("strb", target, 1, self.reg[rd])?,
                    3 => self.reg[rd] = mem.read("ldrsb", target, 1)? as u8 as i8 as i32 as u32,
                    4 => self.reg[rd] = mem.read("ldr", target, 4)?,
                    5 => self.reg[rd] = mem.read("ldrh", target, 2)?,
                    6 => self.reg[rd] = mem.read("ldrb", target, 1)?,
                    _ => self.reg[rd] = mem.read("ldrsh", target, 2)? as u16 as i16 as i32 as u32,
                }
            }

            // Load/store word or byte with 5-bit immediate.
            0b01100..=0b01111 => {
                let imm = ((inst >> 6) & 0x1F) as u32;
                let byte = inst & 0x1000 != 0;
                let target = self.reg[rn].wrapping_add(if byte { imm } else { imm << 2 });
                let width = if byte { 1 } else { 4 };
                if inst & 0x0800 != 0 {
                    self.reg[rd] = mem.read("ldr", target, width)?;
                } else {
                    mem.write("str", target, width, self.reg[rd])?;
                }
            }

            // Load/store halfword with 5-bit immediate.
            0b10000 | 0b10001 => {
                let target = self.reg[rn].wrapping_add((((inst >> 6) & 0x1F) as u32) << 1);
                if inst & 0x0800 != 0 {
                    self.reg[rd] = mem.read("ldrh", target, 2)?;
                } else {
                    mem.write("strh", target, 2, self.reg[rd])?;
                }
            }

            // SP-relative load/store.
            0b10010 | 0b10011 => {
                let rd = ((inst >> 8) & 7) as usize;
                let target = self.reg[SP].wrapping_add(((inst & 0xFF) as u32) << 2);
                if inst & 0x0800 != 0 {
                    self.reg[rd] = mem.read("ldr", target, 4)?;
                } else {
                    mem.write("str", target, 4, self.reg[rd])?;
                }
            }

            // ADD Rd, PC/SP, #imm8 * 4
            0b10100 | 0b10101 => {
                let rd = ((inst >> 8) & 7) as usize;
                let base = if inst & 0x0800 != 0 {
                    self.reg[SP]
                } else {
                    pc & !3
                };
                self.reg[rd] = base.wrapping_add(((inst & 0xFF) as u32) << 2);
            }

            0b10110 | 0b10111 => return self.miscellaneous(inst, addr, mem),

            // STMIA / LDMIA
            0b11000 | 0b11001 => {
                let rn = ((inst >> 8) & 7) as usize;
                let mut target = self.reg[rn];
                let load = inst & 0x0800 != 0;
                for r in 0..8 {
                    if inst & (1 << r) == 0 {
                        continue;
                    }
                    if load {
                        self.reg[r] = mem.read("ldmia", target, 4)?;
                    } else {
                        mem.write("stmia", target, 4, self.reg[r])?;
                    }
                    target = target.wrapping_add(4);
                }
                if !(load && inst & (1 << rn) != 0) {
                    self.reg[rn] = target;
                }
            }

            // Conditional branch / SWI
            0b11010 | 0b11011 => {
                let cond = (inst >> 8) & 0xF;
                match cond {
                    0xE => return Err(ThumbError::UndefinedInstruction { addr, inst }),
                    0xF => {
                        return Err(ThumbError::Unsupported {
                            what: "SWI",
                            addr,
                        });
                    }
                    _ => {
                        if self.condition(cond) {
                            let offset = ((inst & 0xFF) as i8 as i32) << 1;
                            self.branch(pc.wrapping_add(offset as u32));
                        }
                    }
                }
            }

            // B
            0b11100 => {
                let offset = (((inst & 0x7FF) as i32) << 21) >> 20;
                self.branch(pc.wrapping_add(offset as u32));
            }

            // BLX suffix: ARM state target
            0b11101 => {
                if inst & 1 != 0 {
                    return Err(ThumbError::UndefinedInstruction { addr, inst });
                }
                let target = self.reg[LR].wrapping_add(((inst & 0x7FF) as u32) << 1) & !3;
                self.reg[LR] = addr.wrapping_add(2) | 1;
                log::trace!("thumb: BLX to ARM state 0x{target:08X}");
                return Ok(true);
            }

            // BL prefix
            0b11110 => {
                let offset = (((inst & 0x7FF) as i32) << 21) >> 9;
                self.reg[LR] = pc.wrapping_add(offset as u32);
            }

            // BL suffix
            _ => {
                let target = self.reg[LR].wrapping_add(((inst & 0x7FF) as u32) << 1);
                self.reg[LR] = addr.wrapping_add(2) | 1;
                self.branch(target);
            }
        }
        Ok(false)
    }

    /// Data-processing format (010000 oooo).
    fn alu(&mut self, inst: u16) {
        let rd = (inst & 7) as usize;
        let rs = ((inst >> 3) & 7) as usize;
        let a = self.reg[rd];
        let b = self.reg[rs];

        let result = match (inst >> 6) & 0xF {
            0x0 => Some(a & b),
            0x1 => Some(a ^ b),
            0x2 => Some(self.shift_left(a, b & 0xFF)),
            0x3 => Some(self.shift_right(a, b & 0xFF)),
            0x4 => Some(self.shift_arithmetic(a, b & 0xFF)),
            0x5 => {
                let c = self.c;
                self.reg[rd] = self.add_flags(a, b, c);
                return;
            }
            0x6 => {
                let c = self.c;
                self.reg[rd] = self.sub_flags(a, b, c);
                return;
            }
            0x7 => Some(self.rotate_right(a, b & 0xFF)),
            0x8 => {
                self.set_nz(a & b);
                None
            }
            0x9 => {
                self.reg[rd] = self.sub_flags(0, b, true);
                return;
            }
            0xA => {
                self.sub_flags(a, b, true);
                None
            }
            0xB => {
                self.add_flags(a, b, false);
                None
            }
            0xC => Some(a | b),
            0xD => Some(a.wrapping_mul(b)),
            0xE => Some(a & !b),
            _ => Some(!b),
        };

        if let Some(r) = result {
            self.reg[rd] = r;
            self.set_nz(r);
        }
    }

    fn shift_left(&mut self, value: u32, shift: u32) -> u32 {
        match shift {
            0 => value,
            1..=31 => {
                self.c = value & (1 << (32 - shift)) != 0;
                value << shift
            }
            32 => {
                self.c = value & 1 != 0;
                0
            }
            _ => {
                self.c = false;
                0
            }
        }
    }

    fn shift_right(&mut self, value: u32, shift: u32) -> u32 {
        match shift {
            0 => value,
            1..=31 => {
                self.c = value & (1 << (shift - 1)) != 0;
                value >> shift
            }
            32 => {
                self.c = value & 0x8000_0000 != 0;
                0
            }
            _ => {
                self.c = false;
                0
            }
        }
    }

    fn shift_arithmetic(&mut self, value: u32, shift: u32) -> u32 {
        match shift {
            0 => value,
            1..=31 => {
                self.c = value & (1 << (shift - 1)) != 0;
                ((value as i32) >> shift) as u32
            }
            _ => {
                self.c = value & 0x8000_0000 != 0;
                ((value as i32) >> 31) as u32
            }
        }
    }

    fn rotate_right(&mut self, value: u32, shift: u32) -> u32 {
        if shift == 0 {
            return value;
        }
        let r = value.rotate_right(shift & 31);
        self.c = r & 0x8000_0000 != 0;
        r
    }

    /// High register operations and BX/BLX (010001 oo).
    fn hi_register(&mut self, inst: u16, addr: u32) -> Result<bool, ThumbError> {
        let rd = ((inst & 7) | ((inst >> 4) & 8)) as usize;
        let rm = ((inst >> 3) & 0xF) as usize;
        let value = self.reg[rm];

        match (inst >> 8) & 3 {
            0 => {
                let r = self.reg[rd].wrapping_add(value);
                if rd == PC {
                    self.branch(r);
                } else {
                    self.reg[rd] = r;
                }
            }
            1 => {
                self.sub_flags(self.reg[rd], value, true);
            }
            2 => {
                if rd == PC {
                    self.branch(value);
                } else {
                    self.reg[rd] = value;
                }
            }
            _ => {
                if inst & 0x0080 != 0 {
                    self.reg[LR] = addr.wrapping_add(2) | 1;
                }
                return Ok(self.branch_exchange(value));
            }
        }
        Ok(false)
    }

    /// 1011 xxxx: SP adjust, extend, PUSH/POP, REV and hints.
    fn miscellaneous(&mut self, inst: u16, addr: u32, mem: &mut Memory) -> Result<bool, ThumbError> {
        let rd = (inst & 7) as usize;
        let rm = ((inst >> 3) & 7) as usize;

        match (inst >> 8) & 0xF {
            0x0 => {
                let imm = ((inst & 0x7F) as u32) << 2;
                self.reg[SP] = if inst & 0x80 != 0 {
                    self.reg[SP].wrapping_sub(imm)
                } else {
                    self.reg[SP].wrapping_add(imm)
                };
            }
            0x2 => {
                let v = self.reg[rm];
                self.reg[rd] = match (inst >> 6) & 3 {
                    0 => v as u16 as i16 as i32 as u32,
                    1 => v as u8 as i8 as i32 as u32,
                    2 => v & 0xFFFF,
                    _ => v & 0xFF,
                };
            }
            0x4 | 0x5 => {
                let count = (inst & 0xFF).count_ones() + ((inst >> 8) & 1) as u32;
                let mut target = self.reg[SP].wrapping_sub(4 * count);
                self.reg[SP] = target;
                for r in 0..8 {
                    if inst & (1 << r) != 0 {
                        mem.write("push", target, 4, self.reg[r])?;
                        target = target.wrapping_add(4);
                    }
                }
                if inst & 0x0100 != 0 {
                    mem.write("push", target, 4, self.reg[LR])?;
                }
            }
            0x6 if inst & 0xFFE8 == 0xB660 => {
                // CPS: interrupts are not modeled.
            }
            0xA => {
                let v = self.reg[rm];
                self.reg[rd] = match (inst >> 6) & 3 {
                    0 => v.swap_bytes(),
                    1 => ((v & 0x00FF_00FF) << 8) | ((v >> 8) & 0x00FF_00FF),
                    3 => (v as u16).swap_bytes() as i16 as i32 as u32,
                    _ => return Err(ThumbError::UndefinedInstruction { addr, inst }),
                };
            }
            0xC | 0xD => {
                let mut target = self.reg[SP];
                for r in 0..8 {
                    if inst & (1 << r) != 0 {
                        self.reg[r] = mem.read("pop", target, 4)?;
                        target = target.wrapping_add(4);
                    }
                }
                let mut done = false;
                if inst & 0x0100 != 0 {
                    let value = mem.read("pop", target, 4)?;
                    target = target.wrapping_add(4);
                    done = self.branch_exchange(value);
                }
                self.reg[SP] = target;
                return Ok(done);
            }
            0xE => {
                return Err(ThumbError::Unsupported {
                    what: "BKPT",
                    addr,
                });
            }
            0xF if inst & 0x000F == 0 => {
                // NOP / YIELD / WFE / WFI / SEV hints.
            }
            _ => return Err(ThumbError::UndefinedInstruction { addr, inst }),
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 32K image with `code` placed at the entry point.
    fn image(code: &[u16], literals: &[(usize, u32)]) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        for (i, op) in code.iter().enumerate() {
            let at = ENTRY_PC as usize + 2 * i;
            rom[at..at + 2].copy_from_slice(&op.to_le_bytes());
        }
        for &(at, value) in literals {
            rom[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
        rom
    }

    fn run(code: &[u16], literals: &[(usize, u32)]) -> (Thumbulator, Vec<u8>, Result<u64, ThumbError>) {
        let rom = image(code, literals);
        let mut ram = vec![0u8; 0x2000];
        let mut thumb = Thumbulator::new();
        let result = thumb.run(&rom, &mut ram, 0);
        (thumb, ram, result)
    }

    #[test]
    fn bx_lr_returns_immediately() {
        let (thumb, _ram, result) = run(&[0x4770], &[]);
        assert_eq!(result, Ok(1));
        assert_eq!(thumb.register(SP), ENTRY_SP);
    }

    #[test]
    fn literal_load_and_byte_store() {
        // MOVS r0,#0x42; LDR r1,[pc,#4]; STRB r0,[r1]; BX LR; .word 0x40000C00
        let (thumb, ram, result) = run(
            &[0x2042, 0x4901, 0x7008, 0x4770],
            &[(0xC10, 0x4000_0C00)],
        );
        assert!(result.is_ok());
        assert_eq!(thumb.register(1), 0x4000_0C00);
        assert_eq!(ram[0xC00], 0x42);
    }

    #[test]
    fn counted_loop_with_conditional_branch() {
        // MOVS r0,#0; MOVS r1,#5; loop: ADDS r0,#3; SUBS r1,#1; BNE loop; BX LR
        let (thumb, _ram, result) = run(&[0x2000, 0x2105, 0x3003, 0x3901, 0xD1FC, 0x4770], &[]);
        assert!(result.is_ok());
        assert_eq!(thumb.register(0), 15);
        assert!(thumb.z);
    }

    #[test]
    fn bl_and_push_pop_return() {
        // 0xC08: PUSH {LR}; BL 0xC14; POP {PC}; NOP; NOP
        // 0xC14: MOVS r2,#7; BX LR
        let (thumb, _ram, result) = run(
            &[0xB500, 0xF000, 0xF803, 0xBD00, 0xBF00, 0xBF00, 0x2207, 0x4770],
            &[],
        );
        assert!(result.is_ok());
        assert_eq!(thumb.register(2), 7);
        assert_eq!(thumb.register(SP), ENTRY_SP);
    }

    #[test]
    fn flags_from_subtraction() {
        // MOVS r0,#1; CMP r0,#2; BX LR
        let (thumb, _ram, _) = run(&[0x2001, 0x2802, 0x4770], &[]);
        assert!(thumb.n);
        assert!(!thumb.c);
        assert!(!thumb.z);
    }

    #[test]
    fn sign_extension_and_reverse() {
        // MOVS r0,#0x80; SXTB r1,r0; REV r2,r0; BX LR
        let (thumb, _ram, _) = run(&[0x2080, 0xB241, 0xBA02, 0x4770], &[]);
        assert_eq!(thumb.register(1), 0xFFFF_FF80);
        assert_eq!(thumb.register(2), 0x8000_0000);
    }

    #[test]
    fn stmia_ldmia_through_ram() {
        // LDR r3,[pc,#12]; MOVS r0,#1; MOVS r1,#2; STMIA r3!,{r0,r1}; SUBS r3,#8; LDMIA r3!,{r4,r5}; BX LR
        let (thumb, ram, result) = run(
            &[0x4B03, 0x2001, 0x2102, 0xC303, 0x3B08, 0xCB30, 0x4770],
            &[(0xC18, 0x4000_0100)],
        );
        assert!(result.is_ok());
        assert_eq!(ram[0x100], 1);
        assert_eq!(ram[0x104], 2);
        assert_eq!((thumb.register(4), thumb.register(5)), (1, 2));
        assert_eq!(thumb.register(3), 0x4000_0108);
    }

    #[test]
    fn writes_to_rom_fail() {
        // MOVS r0,#0; STR r0,[r0]; BX LR
        let (_thumb, _ram, result) = run(&[0x2000, 0x6000, 0x4770], &[]);
        assert_eq!(
            result,
            Err(ThumbError::InvalidAddress { op: "str", addr: 0 })
        );
    }

    #[test]
    fn misaligned_word_access_fails() {
        // MOVS r0,#1; LDR r1,[r0]; BX LR
        let (_thumb, _ram, result) = run(&[0x2001, 0x6801, 0x4770], &[]);
        assert_eq!(result, Err(ThumbError::Misaligned { op: "ldr", addr: 1 }));
    }

    #[test]
    fn undefined_instruction_is_reported() {
        let (_thumb, _ram, result) = run(&[0xDE00], &[]);
        assert_eq!(
            result,
            Err(ThumbError::UndefinedInstruction {
                addr: ENTRY_PC,
                inst: 0xDE00
            })
        );
    }

    #[test]
    fn endless_loop_is_runaway() {
        // B .
        let (_thumb, _ram, result) = run(&[0xE7FE], &[]);
        assert!(matches!(result, Err(ThumbError::Runaway { .. })));
    }

    #[test]
    fn mam_register_keeps_value() {
        // LDR r0,[pc,#8]; MOVS r1,#2; STR r1,[r0]; LDR r2,[r0]; BX LR; .word MAMCR
        let (thumb, _ram, result) = run(
            &[0x4802, 0x2102, 0x6001, 0x6802, 0x4770],
            &[(0xC14, MAMCR)],
        );
        assert!(result.is_ok());
        assert_eq!(thumb.register(2), 2);
    }
}
