/*!
execute.rs - 6507 instruction semantic helpers (ALU, flags, stack)

Purpose
=======
Centralize the side-effect logic of instructions so the dispatch families
stay small. Register and flag helpers are generic over `CpuRegs` and never
touch the bus; stack helpers go through `Cpu` because every stack access is
a timed bus cycle.

Scope (crate-visible)
---------------------
Register / flag (generic):
    load (A, X, Y with Z/N), compare, bit
    and / ora / eor, adc / sbc (binary + NMOS decimal)
    asl / lsr / rol / ror value helpers
    increment / decrement with Z/N

Stack (Cpu):
    push, pull, dummy_stack_read

Decimal mode
============
ADC and SBC follow the NMOS 6502: in decimal mode ADC computes N and V from
the intermediate high nibble before the final adjustment, and SBC sets all
flags from the binary difference while A receives the BCD result.
*/

use crate::bus::{Bus, access_flags};
use crate::cpu::core::Cpu;
use crate::cpu::regs::CpuRegs;
use crate::cpu::state::{CARRY, DECIMAL, NEGATIVE, OVERFLOW, ZERO};

pub(crate) const STACK_PAGE: u16 = 0x0100;

// ---------------------------------------------------------------------
// Loads / logic
// ---------------------------------------------------------------------

#[inline]
pub(crate) fn lda<C: CpuRegs>(cpu: &mut C, v: u8) {
    cpu.set_a(v);
    cpu.update_zn(v);
}

#[inline]
pub(crate) fn ldx<C: CpuRegs>(cpu: &mut C, v: u8) {
    cpu.set_x(v);
    cpu.update_zn(v);
}

#[inline]
pub(crate) fn ldy<C: CpuRegs>(cpu: &mut C, v: u8) {
    cpu.set_y(v);
    cpu.update_zn(v);
}

#[inline]
pub(crate) fn and<C: CpuRegs>(cpu: &mut C, v: u8) {
    let r = cpu.a() & v;
    lda(cpu, r);
}

#[inline]
pub(crate) fn ora<C: CpuRegs>(cpu: &mut C, v: u8) {
    let r = cpu.a() | v;
    lda(cpu, r);
}

#[inline]
pub(crate) fn eor<C: CpuRegs>(cpu: &mut C, v: u8) {
    let r = cpu.a() ^ v;
    lda(cpu, r);
}

/// BIT: Z from A & v, N and V copied from the operand.
pub(crate) fn bit<C: CpuRegs>(cpu: &mut C, v: u8) {
    cpu.assign_flag(ZERO, cpu.a() & v == 0);
    cpu.assign_flag(NEGATIVE, v & 0x80 != 0);
    cpu.assign_flag(OVERFLOW, v & 0x40 != 0);
}

/// CMP / CPX / CPY against `reg`.
pub(crate) fn compare<C: CpuRegs>(cpu: &mut C, reg: u8, v: u8) {
    let r = reg.wrapping_sub(v);
    cpu.update_carry(reg >= v);
    cpu.update_zn(r);
}

// ---------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------

pub(crate) fn adc<C: CpuRegs>(cpu: &mut C, v: u8) {
    let a = cpu.a() as u16;
    let operand = v as u16;
    let carry_in = cpu.is_flag_set(CARRY) as u16;

    if !cpu.is_flag_set(DECIMAL) {
        let sum = a + operand + carry_in;
        cpu.update_overflow(!(a ^ operand) & (a ^ sum) & 0x80 != 0);
        cpu.update_carry(sum > 0xFF);
        lda(cpu, sum as u8);
        return;
    }

    let mut lo = (a & 0x0F) + (operand & 0x0F) + carry_in;
    let mut hi = (a & 0xF0) + (operand & 0xF0);
    cpu.assign_flag(ZERO, (lo + hi) & 0xFF == 0);
    if lo > 0x09 {
        hi += 0x10;
        lo += 0x06;
    }
    cpu.assign_flag(NEGATIVE, hi & 0x80 != 0);
    cpu.update_overflow(!(a ^ operand) & (a ^ hi) & 0x80 != 0);
    if hi > 0x90 {
        hi += 0x60;
    }
    cpu.update_carry(hi & 0xFF00 != 0);
    cpu.set_a(((lo & 0x0F) | (hi & 0xF0)) as u8);
}

pub(crate) fn sbc<C: CpuRegs>(cpu: &mut C, v: u8) {
    let a = cpu.a();
    let borrow = !cpu.is_flag_set(CARRY) as i16;

    let inverted = !v as u16;
    let difference = a as u16 + inverted + cpu.is_flag_set(CARRY) as u16;
    cpu.update_overflow(!(a as u16 ^ inverted) & (a as u16 ^ difference) & 0x80 != 0);
    cpu.update_carry(difference > 0xFF);
    cpu.update_zn(difference as u8);

    if !cpu.is_flag_set(DECIMAL) {
        cpu.set_a(difference as u8);
        return;
    }

    let mut lo = (a & 0x0F) as i16 - (v & 0x0F) as i16 - borrow;
    let mut hi = (a & 0xF0) as i16 - (v & 0xF0) as i16;
    if lo & 0x10 != 0 {
        lo -= 6;
        hi -= 1;
    }
    if hi & 0x0100 != 0 {
        hi -= 0x60;
    }
    cpu.set_a(((lo & 0x0F) | (hi & 0xF0)) as u8);
}

// ---------------------------------------------------------------------
// Shifts / rotates / inc / dec (value in, value out)
// ---------------------------------------------------------------------

pub(crate) fn asl<C: CpuRegs>(cpu: &mut C, v: u8) -> u8 {
    cpu.update_carry(v & 0x80 != 0);
    let r = v << 1;
    cpu.update_zn(r);
    r
}

pub(crate) fn lsr<C: CpuRegs>(cpu: &mut C, v: u8) -> u8 {
    cpu.update_carry(v & 0x01 != 0);
    let r = v >> 1;
    cpu.update_zn(r);
    r
}

pub(crate) fn rol<C: CpuRegs>(cpu: &mut C, v: u8) -> u8 {
    let carry_in = cpu.is_flag_set(CARRY) as u8;
    cpu.update_carry(v & 0x80 != 0);
    let r = (v << 1) | carry_in;
    cpu.update_zn(r);
    r
}

pub(crate) fn ror<C: CpuRegs>(cpu: &mut C, v: u8) -> u8 {
    let carry_in = if cpu.is_flag_set(CARRY) { 0x80 } else { 0 };
    cpu.update_carry(v & 0x01 != 0);
    let r = (v >> 1) | carry_in;
    cpu.update_zn(r);
    r
}

#[inline]
pub(crate) fn increment<C: CpuRegs>(cpu: &mut C, v: u8) -> u8 {
    let r = v.wrapping_add(1);
    cpu.update_zn(r);
    r
}

#[inline]
pub(crate) fn decrement<C: CpuRegs>(cpu: &mut C, v: u8) -> u8 {
    let r = v.wrapping_sub(1);
    cpu.update_zn(r);
    r
}

// ---------------------------------------------------------------------
// Stack (timed)
// ---------------------------------------------------------------------

pub(crate) fn push(cpu: &mut Cpu, bus: &mut Bus, v: u8) {
    let sp = cpu.state().sp;
    cpu.poke(bus, STACK_PAGE | sp as u16, v);
    cpu.state_mut().sp = sp.wrapping_sub(1);
}

/// Pre-increment SP and read the stack.
pub(crate) fn pull(cpu: &mut Cpu, bus: &mut Bus) -> u8 {
    let sp = cpu.state().sp.wrapping_add(1);
    cpu.state_mut().sp = sp;
    cpu.peek(bus, STACK_PAGE | sp as u16, access_flags::DATA)
}

/// The internal cycle of pulls and JSR: read the current stack slot.
#[inline]
pub(crate) fn dummy_stack_read(cpu: &mut Cpu, bus: &mut Bus) {
    let sp = cpu.state().sp;
    cpu.peek(bus, STACK_PAGE | sp as u16, access_flags::NONE);
}
