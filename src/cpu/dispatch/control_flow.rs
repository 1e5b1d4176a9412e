/*!
control_flow.rs - JMP / JSR / RTS / RTI / BRK

Bus sequences (after the opcode fetch):
    JMP abs   lo, hi                                        3 cycles
    JMP ind   lo, hi, ptr lo, ptr hi (same page)            5 cycles
    JSR       lo, stack dummy, push PCH, push PCL, hi       6 cycles
    RTS       dummy, stack dummy, pull PCL, pull PCH, dummy 6 cycles
    RTI       dummy, stack dummy, pull P, pull PCL, PCH     6 cycles
    BRK       padding, push PCH, PCL, P|B, vector lo, hi    7 cycles

JSR pushes the address of its last operand byte; RTS adds one.
*/

use crate::bus::{Bus, access_flags};
use crate::cpu::addressing::{AddrMode, Access, dummy_read_pc, effective_address, fetch_operand};
use crate::cpu::core::Cpu;
use crate::cpu::dispatch::IRQ_VECTOR;
use crate::cpu::execute::{dummy_stack_read, pull, push};
use crate::cpu::regs::CpuRegs;
use crate::cpu::state::IRQ_DISABLE;

pub(crate) fn jmp(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let target = effective_address(cpu, bus, mode, Access::Read);
    cpu.set_pc(target);
}

pub(crate) fn jsr(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    let lo = fetch_operand(cpu, bus) as u16;
    dummy_stack_read(cpu, bus);
    let ret = cpu.pc();
    push(cpu, bus, (ret >> 8) as u8);
    push(cpu, bus, ret as u8);
    let hi = cpu.peek(bus, ret, access_flags::OPERAND) as u16;
    cpu.set_pc((hi << 8) | lo);
}

pub(crate) fn rts(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    dummy_stack_read(cpu, bus);
    let lo = pull(cpu, bus) as u16;
    let hi = pull(cpu, bus) as u16;
    let ret = (hi << 8) | lo;
    cpu.peek(bus, ret, access_flags::NONE);
    cpu.set_pc(ret.wrapping_add(1));
}

pub(crate) fn rti(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    dummy_stack_read(cpu, bus);
    let status = pull(cpu, bus);
    cpu.set_status(status);
    let lo = pull(cpu, bus) as u16;
    let hi = pull(cpu, bus) as u16;
    cpu.set_pc((hi << 8) | lo);
}

pub(crate) fn brk(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    fetch_operand(cpu, bus);
    let pc = cpu.pc();
    push(cpu, bus, (pc >> 8) as u8);
    push(cpu, bus, pc as u8);
    let status = cpu.compose_status_for_push(true);
    push(cpu, bus, status);
    cpu.assign_flag(IRQ_DISABLE, true);
    let lo = cpu.peek(bus, IRQ_VECTOR, access_flags::DATA) as u16;
    let hi = cpu.peek(bus, IRQ_VECTOR + 1, access_flags::DATA) as u16;
    cpu.set_pc((hi << 8) | lo);
}
