/*!
load_store.rs - Load / Store opcode family

Loads (set Z/N flags; indexed reads pay the extra cycle on a page cross):
    LDA: A9, A5, B5, AD, BD*, B9*, A1, B1*
    LDX: A2, A6, B6, AE, BE*
    LDY: A0, A4, B4, AC, BC*

Stores (no flags changed; indexed stores always perform the dummy read):
    STA: 85, 95, 8D, 9D, 99, 81, 91
    STX: 86, 96, 8E
    STY: 84, 94, 8C
*/

use crate::bus::Bus;
use crate::cpu::addressing::{AddrMode, read_operand, write_operand};
use crate::cpu::core::Cpu;
use crate::cpu::execute;

pub(crate) fn lda(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    execute::lda(cpu, v);
}

pub(crate) fn ldx(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    execute::ldx(cpu, v);
}

pub(crate) fn ldy(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    execute::ldy(cpu, v);
}

pub(crate) fn sta(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = cpu.state().a;
    write_operand(cpu, bus, mode, v);
}

pub(crate) fn stx(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = cpu.state().x;
    write_operand(cpu, bus, mode, v);
}

pub(crate) fn sty(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = cpu.state().y;
    write_operand(cpu, bus, mode, v);
}

#[cfg(test)]
mod tests {
    use crate::cpu::core::tests::{run_program, setup};

    #[test]
    fn lda_immediate_sets_flags() {
        let (cpu, _) = run_program(&[0xA9, 0x00], 1);
        assert_eq!(cpu.a(), 0);
        assert!(cpu.state().is_flag_set(crate::cpu::state::ZERO));

        let (cpu, _) = run_program(&[0xA9, 0x80], 1);
        assert!(cpu.state().is_flag_set(crate::cpu::state::NEGATIVE));
    }

    #[test]
    fn store_and_reload_through_riot_ram() {
        // LDX #$42; STX $80; LDY $80
        let (cpu, bus) = run_program(&[0xA2, 0x42, 0x86, 0x80, 0xA4, 0x80], 3);
        assert_eq!(bus.peek_debug(0x0080), 0x42);
        assert_eq!(cpu.y(), 0x42);
    }

    #[test]
    fn indexed_load_page_cross_costs_a_cycle() {
        // LDA $10F0,Y with Y=0x20 crosses into $1110.
        let (mut cpu, mut bus) = setup(&[0xA0, 0x20, 0xB9, 0xF0, 0x10]);
        cpu.execute(&mut bus, 2);
        let result = cpu.execute(&mut bus, 1);
        assert_eq!(result.cycles, 5);
        assert_eq!(cpu.a(), 0xEA);
    }

    #[test]
    fn indexed_store_always_five_cycles() {
        // LDX #$01; STA $80,X ; STA $0080,X
        let (mut cpu, mut bus) = setup(&[0xA2, 0x01, 0x95, 0x80, 0x9D, 0x80, 0x00]);
        cpu.execute(&mut bus, 2);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 4);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 5);
    }
}
