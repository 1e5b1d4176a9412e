/*!
misc.rs - Transfers, stack operations, flag operations and NOP

Transfers (Z/N updated except TXS):
    TAX AA, TAY A8, TXA 8A, TYA 98, TSX BA, TXS 9A
Stack:
    PHA 48 (3), PHP 08 (3, B set), PLA 68 (4), PLP 28 (4)
Flags:
    CLC 18, SEC 38, CLI 58, SEI 78, CLV B8, CLD D8, SED F8
NOP:
    EA and the undocumented implied / immediate / zp / abs forms. The
    operand forms perform their read like any load.
*/

use crate::bus::Bus;
use crate::cpu::addressing::{AddrMode, dummy_read_pc, read_operand};
use crate::cpu::core::Cpu;
use crate::cpu::execute::{self, dummy_stack_read, pull, push};
use crate::cpu::regs::CpuRegs;
use crate::cpu::state::{CARRY, DECIMAL, IRQ_DISABLE, OVERFLOW};

// ---------------- Transfers ----------------

pub(crate) fn tax(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let v = cpu.a();
    execute::ldx(cpu, v);
}

pub(crate) fn tay(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let v = cpu.a();
    execute::ldy(cpu, v);
}

pub(crate) fn txa(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let v = cpu.x();
    execute::lda(cpu, v);
}

pub(crate) fn tya(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let v = cpu.y();
    execute::lda(cpu, v);
}

pub(crate) fn tsx(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let v = cpu.sp();
    execute::ldx(cpu, v);
}

pub(crate) fn txs(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let v = cpu.x();
    cpu.set_sp(v);
}

// ---------------- Stack ----------------

pub(crate) fn pha(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let v = cpu.a();
    push(cpu, bus, v);
}

pub(crate) fn php(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let v = cpu.compose_status_for_push(true);
    push(cpu, bus, v);
}

pub(crate) fn pla(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    dummy_stack_read(cpu, bus);
    let v = pull(cpu, bus);
    execute::lda(cpu, v);
}

pub(crate) fn plp(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    dummy_stack_read(cpu, bus);
    let v = pull(cpu, bus);
    cpu.set_status(v);
}

// ---------------- Flags ----------------

fn flag_op(cpu: &mut Cpu, bus: &mut Bus, mask: u8, value: bool) {
    dummy_read_pc(cpu, bus);
    cpu.assign_flag(mask, value);
}

pub(crate) fn clc(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    flag_op(cpu, bus, CARRY, false);
}

pub(crate) fn sec(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    flag_op(cpu, bus, CARRY, true);
}

pub(crate) fn cli(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    flag_op(cpu, bus, IRQ_DISABLE, false);
}

pub(crate) fn sei(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    flag_op(cpu, bus, IRQ_DISABLE, true);
}

pub(crate) fn clv(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    flag_op(cpu, bus, OVERFLOW, false);
}

pub(crate) fn cld(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    flag_op(cpu, bus, DECIMAL, false);
}

pub(crate) fn sed(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    flag_op(cpu, bus, DECIMAL, true);
}

// ---------------- NOP ----------------

pub(crate) fn nop(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    if mode == AddrMode::Implied {
        dummy_read_pc(cpu, bus);
    } else {
        read_operand(cpu, bus, mode);
    }
}

#[cfg(test)]
mod tests {
    use crate::cpu::core::tests::{run_program, setup};
    use crate::cpu::state::{BREAK, CARRY, DECIMAL};

    #[test]
    fn stack_timing_and_values() {
        // LDA #$5A; PHA; LDA #$00; PLA
        let (mut cpu, mut bus) = setup(&[0xA9, 0x5A, 0x48, 0xA9, 0x00, 0x68]);
        cpu.execute(&mut bus, 1);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 3);
        cpu.execute(&mut bus, 1);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 4);
        assert_eq!(cpu.a(), 0x5A);
        assert_eq!(cpu.sp(), 0xFD);
    }

    #[test]
    fn php_sets_break_in_pushed_copy() {
        let (_, bus) = run_program(&[0x08], 1);
        assert_ne!(bus.peek_debug(0x01FD) & BREAK, 0);
    }

    #[test]
    fn flag_ops_and_transfers() {
        // SEC; SED; LDX #$33; TXA; TAY; TSX
        let (cpu, _) = run_program(&[0x38, 0xF8, 0xA2, 0x33, 0x8A, 0xA8, 0xBA], 6);
        assert!(cpu.state().is_flag_set(CARRY));
        assert!(cpu.state().is_flag_set(DECIMAL));
        assert_eq!(cpu.a(), 0x33);
        assert_eq!(cpu.y(), 0x33);
        assert_eq!(cpu.x(), 0xFD);
    }

    #[test]
    fn undocumented_nops_consume_operands() {
        // NOP $80 (3); NOP $0080,X (4); NOP #$00 (2); NOP (2)
        let (mut cpu, mut bus) = setup(&[0x04, 0x80, 0x1C, 0x80, 0x00, 0x80, 0x00, 0x1A]);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 3);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 4);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 2);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 2);
        assert_eq!(cpu.pc(), 0x1008);
    }
}
