/*!
addressing.rs - 6507 addressing modes and cycle-exact operand resolution

Overview
========
Every helper here performs the exact sequence of bus accesses the NMOS 6502
performs for the mode, dummy reads and dummy writes included. Since each
`Cpu::peek` / `Cpu::poke` is one cycle, instruction timing is the length of
that sequence and no cycle table is needed.

Access classification
=====================
- opcode fetch:       `access_flags::CODE` (done by the dispatcher)
- operand bytes:      `access_flags::OPERAND`
- data / pointer:     `access_flags::DATA`
- dummy accesses:     `access_flags::NONE` (ghost reads for the debugger)

Indexed modes
=============
Reads through abs,X / abs,Y / (ind),Y perform the extra read at the
unfixed address only when the index crosses a page. Writes and RMW always
perform it.

Caller Assumptions
==================
- PC points at the first operand byte when a resolver is invoked.
- Resolvers advance PC past the operand bytes they consume.
*/

use crate::bus::{Bus, access_flags};
use crate::cpu::core::Cpu;

/// Operand addressing of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    IndirectX,
    IndirectY,
    Relative,
    Indirect,
}

impl AddrMode {
    /// Number of operand bytes following the opcode.
    pub fn operand_len(self) -> u16 {
        match self {
            AddrMode::Implied | AddrMode::Accumulator => 0,
            AddrMode::Immediate
            | AddrMode::ZeroPage
            | AddrMode::ZeroPageX
            | AddrMode::ZeroPageY
            | AddrMode::IndirectX
            | AddrMode::IndirectY
            | AddrMode::Relative => 1,
            AddrMode::Absolute | AddrMode::AbsoluteX | AddrMode::AbsoluteY | AddrMode::Indirect => {
                2
            }
        }
    }
}

/// Purpose of an effective-address computation; decides the indexed
/// dummy read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
    Modify,
}

// -------------------------
// Instruction stream
// -------------------------

pub(crate) fn fetch_operand(cpu: &mut Cpu, bus: &mut Bus) -> u8 {
    let pc = cpu.state().pc;
    let v = cpu.peek(bus, pc, access_flags::OPERAND);
    cpu.state_mut().advance_pc(1);
    v
}

pub(crate) fn fetch_operand_word(cpu: &mut Cpu, bus: &mut Bus) -> u16 {
    let lo = fetch_operand(cpu, bus) as u16;
    let hi = fetch_operand(cpu, bus) as u16;
    (hi << 8) | lo
}

/// The second cycle of every one-byte instruction: read the next byte and
/// discard it.
#[inline]
pub(crate) fn dummy_read_pc(cpu: &mut Cpu, bus: &mut Bus) {
    let pc = cpu.state().pc;
    cpu.peek(bus, pc, access_flags::NONE);
}

// -------------------------
// Effective address
// -------------------------

/// Resolve the effective address for a memory mode. Register and immediate
/// modes have no address and return 0 without touching the bus.
pub(crate) fn effective_address(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode, access: Access) -> u16 {
    match mode {
        AddrMode::ZeroPage => fetch_operand(cpu, bus) as u16,
        AddrMode::ZeroPageX | AddrMode::ZeroPageY => {
            let base = fetch_operand(cpu, bus);
            cpu.peek(bus, base as u16, access_flags::NONE);
            let index = if mode == AddrMode::ZeroPageX {
                cpu.state().x
            } else {
                cpu.state().y
            };
            base.wrapping_add(index) as u16
        }
        AddrMode::Absolute => fetch_operand_word(cpu, bus),
        AddrMode::AbsoluteX => {
            let base = fetch_operand_word(cpu, bus);
            let x = cpu.state().x;
            indexed(cpu, bus, base, x, access)
        }
        AddrMode::AbsoluteY => {
            let base = fetch_operand_word(cpu, bus);
            let y = cpu.state().y;
            indexed(cpu, bus, base, y, access)
        }
        AddrMode::IndirectX => {
            let pointer = fetch_operand(cpu, bus);
            cpu.peek(bus, pointer as u16, access_flags::NONE);
            let pointer = pointer.wrapping_add(cpu.state().x);
            read_zero_page_word(cpu, bus, pointer)
        }
        AddrMode::IndirectY => {
            let pointer = fetch_operand(cpu, bus);
            let base = read_zero_page_word(cpu, bus, pointer);
            let y = cpu.state().y;
            indexed(cpu, bus, base, y, access)
        }
        AddrMode::Indirect => {
            let pointer = fetch_operand_word(cpu, bus);
            read_word_page_wrapped(cpu, bus, pointer)
        }
        AddrMode::Implied | AddrMode::Accumulator | AddrMode::Immediate | AddrMode::Relative => 0,
    }
}

fn indexed(cpu: &mut Cpu, bus: &mut Bus, base: u16, index: u8, access: Access) -> u16 {
    let addr = base.wrapping_add(index as u16);
    let crossed = (base & 0xFF00) != (addr & 0xFF00);
    if crossed || access != Access::Read {
        let unfixed = (base & 0xFF00) | (addr & 0x00FF);
        cpu.peek(bus, unfixed, access_flags::NONE);
    }
    addr
}

/// Little-endian pointer in zero page; the high byte wraps within page 0.
fn read_zero_page_word(cpu: &mut Cpu, bus: &mut Bus, pointer: u8) -> u16 {
    let lo = cpu.peek(bus, pointer as u16, access_flags::DATA) as u16;
    let hi = cpu.peek(bus, pointer.wrapping_add(1) as u16, access_flags::DATA) as u16;
    (hi << 8) | lo
}

/// JMP (ind): the high byte is fetched from the same page as the low byte.
fn read_word_page_wrapped(cpu: &mut Cpu, bus: &mut Bus, pointer: u16) -> u16 {
    let lo = cpu.peek(bus, pointer, access_flags::DATA) as u16;
    let hi_addr = (pointer & 0xFF00) | (pointer.wrapping_add(1) & 0x00FF);
    let hi = cpu.peek(bus, hi_addr, access_flags::DATA) as u16;
    (hi << 8) | lo
}

// -------------------------
// Operand access
// -------------------------

/// Fetch the value an instruction reads: immediate byte, accumulator, or
/// the byte at the effective address.
pub(crate) fn read_operand(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) -> u8 {
    match mode {
        AddrMode::Immediate => fetch_operand(cpu, bus),
        AddrMode::Accumulator => {
            dummy_read_pc(cpu, bus);
            cpu.state().a
        }
        _ => {
            let addr = effective_address(cpu, bus, mode, Access::Read);
            cpu.peek(bus, addr, access_flags::DATA)
        }
    }
}

/// Resolve the address (write timing) and store `value` there.
pub(crate) fn write_operand(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode, value: u8) {
    let addr = effective_address(cpu, bus, mode, Access::Write);
    cpu.poke(bus, addr, value);
}

/// Read-modify-write. Memory modes read, write the old value back, then
/// write the result; accumulator mode spends its second cycle on a dummy
/// read. Returns the value written.
pub(crate) fn modify_operand(
    cpu: &mut Cpu,
    bus: &mut Bus,
    mode: AddrMode,
    op: impl FnOnce(&mut Cpu, u8) -> u8,
) -> u8 {
    if mode == AddrMode::Accumulator {
        dummy_read_pc(cpu, bus);
        let a = cpu.state().a;
        let result = op(cpu, a);
        cpu.state_mut().a = result;
        return result;
    }

    let addr = effective_address(cpu, bus, mode, Access::Modify);
    let old = cpu.peek(bus, addr, access_flags::DATA);
    cpu.poke(bus, addr, old);
    let result = op(cpu, old);
    cpu.poke(bus, addr, result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::bus_with_program;

    fn setup(program: &[u8]) -> (Cpu, Bus) {
        let mut bus = bus_with_program(program);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        (cpu, bus)
    }

    #[test]
    fn absolute_x_read_pays_only_on_page_cross() {
        let (mut cpu, mut bus) = setup(&[0xF0, 0x00, 0xFF, 0x00]);
        cpu.state_mut().x = 0x0F;
        let start = bus.system.cycles();
        let addr = effective_address(&mut cpu, &mut bus, AddrMode::AbsoluteX, Access::Read);
        assert_eq!(addr, 0x00FF);
        assert_eq!(bus.system.cycles() - start, 2);

        cpu.state_mut().x = 0x01;
        let start = bus.system.cycles();
        let addr = effective_address(&mut cpu, &mut bus, AddrMode::AbsoluteX, Access::Read);
        assert_eq!(addr, 0x0100);
        assert_eq!(bus.system.cycles() - start, 3);
    }

    #[test]
    fn absolute_x_write_always_pays() {
        let (mut cpu, mut bus) = setup(&[0x80, 0x00]);
        cpu.state_mut().x = 0x01;
        let start = bus.system.cycles();
        let addr = effective_address(&mut cpu, &mut bus, AddrMode::AbsoluteX, Access::Write);
        assert_eq!(addr, 0x0081);
        assert_eq!(bus.system.cycles() - start, 3);
    }

    #[test]
    fn zero_page_x_wraps_within_page_zero() {
        let (mut cpu, mut bus) = setup(&[0xF0]);
        cpu.state_mut().x = 0x20;
        let addr = effective_address(&mut cpu, &mut bus, AddrMode::ZeroPageX, Access::Read);
        assert_eq!(addr, 0x0010);
    }

    #[test]
    fn indirect_jump_pointer_stays_in_page() {
        // Pointer at $00FF: low byte from $FF, high byte from $00 (TIA space
        // reads back the data bus here, so only check the low byte).
        let (mut cpu, mut bus) = setup(&[0xFF, 0x00]);
        bus.write(0x00FF, 0x34);
        let addr = effective_address(&mut cpu, &mut bus, AddrMode::Indirect, Access::Read);
        assert_eq!(addr & 0x00FF, 0x34);
        assert_eq!(cpu.state().last_peek_address, 0x0000);
    }

    #[test]
    fn modify_writes_old_value_then_result() {
        let (mut cpu, mut bus) = setup(&[0x80]);
        bus.write(0x0080, 0x41);
        let start = bus.system.cycles();
        let r = modify_operand(&mut cpu, &mut bus, AddrMode::ZeroPage, |_, v| v << 1);
        assert_eq!(r, 0x82);
        assert_eq!(bus.peek_debug(0x0080), 0x82);
        assert_eq!(bus.system.cycles() - start, 4);
    }

    #[test]
    fn operand_lengths() {
        assert_eq!(AddrMode::Implied.operand_len(), 0);
        assert_eq!(AddrMode::Relative.operand_len(), 1);
        assert_eq!(AddrMode::Indirect.operand_len(), 2);
    }
}
