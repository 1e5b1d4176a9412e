//! CMP / CPX / CPY. C set when register >= operand; Z/N from the difference.

use crate::bus::Bus;
use crate::cpu::addressing::{AddrMode, read_operand};
use crate::cpu::core::Cpu;
use crate::cpu::execute;

pub(crate) fn cmp(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    let a = cpu.state().a;
    execute::compare(cpu, a, v);
}

pub(crate) fn cpx(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    let x = cpu.state().x;
    execute::compare(cpu, x, v);
}

pub(crate) fn cpy(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    let y = cpu.state().y;
    execute::compare(cpu, y, v);
}

#[cfg(test)]
mod tests {
    use crate::cpu::core::tests::run_program;
    use crate::cpu::state::{CARRY, NEGATIVE, ZERO};

    #[test]
    fn compare_flags() {
        // LDA #$40; CMP #$40
        let (cpu, _) = run_program(&[0xA9, 0x40, 0xC9, 0x40], 2);
        assert!(cpu.state().is_flag_set(ZERO) && cpu.state().is_flag_set(CARRY));

        // LDX #$10; CPX #$11
        let (cpu, _) = run_program(&[0xA2, 0x10, 0xE0, 0x11], 2);
        assert!(!cpu.state().is_flag_set(CARRY));
        assert!(cpu.state().is_flag_set(NEGATIVE));

        // LDY #$20; CPY #$01
        let (cpu, _) = run_program(&[0xA0, 0x20, 0xC0, 0x01], 2);
        assert!(cpu.state().is_flag_set(CARRY) && !cpu.state().is_flag_set(ZERO));
    }
}
