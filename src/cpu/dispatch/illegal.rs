/*!
illegal.rs - Undocumented NMOS 6502 opcodes (JAM excluded)

Combined read-modify-write:
    SLO (ASL + ORA)  RLA (ROL + AND)  SRE (LSR + EOR)  RRA (ROR + ADC)
    DCP (DEC + CMP)  ISB (INC + SBC)
Load / store:
    LAX (A = X = M)  SAX (M = A & X)  LAS (A = X = SP = SP & M)
Immediate:
    ANC  ASR  ARR  ANE  LXA  SBX
Unstable high-byte stores (value AND-ed with target high byte + 1):
    SHA  SHX  SHY  SHS

ANE and LXA use the 0xEE "magic" constant.
*/

use crate::bus::Bus;
use crate::cpu::addressing::{
    AddrMode, Access, effective_address, modify_operand, read_operand, write_operand,
};
use crate::cpu::core::Cpu;
use crate::cpu::execute;
use crate::cpu::regs::CpuRegs;
use crate::cpu::state::{CARRY, DECIMAL, NEGATIVE, OVERFLOW, ZERO};

const MAGIC: u8 = 0xEE;

// ---------------- Combined RMW ----------------

pub(crate) fn slo(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let r = modify_operand(cpu, bus, mode, execute::asl::<Cpu>);
    execute::ora(cpu, r);
}

pub(crate) fn rla(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let r = modify_operand(cpu, bus, mode, execute::rol::<Cpu>);
    execute::and(cpu, r);
}

pub(crate) fn sre(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let r = modify_operand(cpu, bus, mode, execute::lsr::<Cpu>);
    execute::eor(cpu, r);
}

pub(crate) fn rra(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let r = modify_operand(cpu, bus, mode, execute::ror::<Cpu>);
    execute::adc(cpu, r);
}

pub(crate) fn dcp(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let r = modify_operand(cpu, bus, mode, |_, v| v.wrapping_sub(1));
    let a = cpu.a();
    execute::compare(cpu, a, r);
}

pub(crate) fn isb(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let r = modify_operand(cpu, bus, mode, |_, v| v.wrapping_add(1));
    execute::sbc(cpu, r);
}

// ---------------- Load / store ----------------

pub(crate) fn lax(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    cpu.set_x(v);
    execute::lda(cpu, v);
}

pub(crate) fn sax(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = cpu.a() & cpu.x();
    write_operand(cpu, bus, mode, v);
}

pub(crate) fn las(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode) & cpu.sp();
    cpu.set_sp(v);
    cpu.set_x(v);
    execute::lda(cpu, v);
}

// ---------------- Immediate ----------------

pub(crate) fn anc(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    execute::and(cpu, v);
    let n = cpu.is_flag_set(NEGATIVE);
    cpu.update_carry(n);
}

pub(crate) fn asr(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode) & cpu.a();
    let r = execute::lsr(cpu, v);
    cpu.set_a(r);
}

pub(crate) fn arr(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let value = read_operand(cpu, bus, mode) & cpu.a();
    let carry_in = if cpu.is_flag_set(CARRY) { 0x80 } else { 0 };
    let mut a = (value >> 1) | carry_in;

    if !cpu.is_flag_set(DECIMAL) {
        cpu.update_zn(a);
        cpu.update_carry(a & 0x40 != 0);
        cpu.update_overflow(((a & 0x40) ^ ((a & 0x20) << 1)) != 0);
        cpu.set_a(a);
        return;
    }

    cpu.assign_flag(NEGATIVE, carry_in != 0);
    cpu.assign_flag(ZERO, a == 0);
    cpu.assign_flag(OVERFLOW, (value ^ a) & 0x40 != 0);
    if (value & 0x0F) + (value & 0x01) > 0x05 {
        a = (a & 0xF0) | (a.wrapping_add(0x06) & 0x0F);
    }
    if (value as u16 & 0xF0) + (value as u16 & 0x10) > 0x50 {
        a = a.wrapping_add(0x60);
        cpu.update_carry(true);
    } else {
        cpu.update_carry(false);
    }
    cpu.set_a(a);
}

pub(crate) fn ane(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    let r = (cpu.a() | MAGIC) & cpu.x() & v;
    execute::lda(cpu, r);
}

pub(crate) fn lxa(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    let r = (cpu.a() | MAGIC) & v;
    cpu.set_x(r);
    execute::lda(cpu, r);
}

pub(crate) fn sbx(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    let ax = cpu.a() & cpu.x();
    cpu.update_carry(ax >= v);
    execute::ldx(cpu, ax.wrapping_sub(v));
}

// ---------------- Unstable stores ----------------

fn store_high_masked(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode, value: u8) {
    let addr = effective_address(cpu, bus, mode, Access::Write);
    let mask = ((addr >> 8) as u8).wrapping_add(1);
    cpu.poke(bus, addr, value & mask);
}

pub(crate) fn sha(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = cpu.a() & cpu.x();
    store_high_masked(cpu, bus, mode, v);
}

pub(crate) fn shx(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = cpu.x();
    store_high_masked(cpu, bus, mode, v);
}

pub(crate) fn shy(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = cpu.y();
    store_high_masked(cpu, bus, mode, v);
}

pub(crate) fn shs(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = cpu.a() & cpu.x();
    cpu.set_sp(v);
    store_high_masked(cpu, bus, mode, v);
}
