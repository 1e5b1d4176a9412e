/*!
logical.rs - AND / ORA / EOR / BIT

```text
    AND: 29, 25, 35, 2D, 3D, 39, 21, 31
    ORA: 09, 05, 15, 0D, 1D, 19, 01, 11
    EOR: 49, 45, 55, 4D, 5D, 59, 41, 51
    BIT: 24, 2C
```
*/

use crate::bus::Bus;
use crate::cpu::addressing::{AddrMode, read_operand};
use crate::cpu::core::Cpu;
use crate::cpu::execute;

pub(crate) fn and(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    execute::and(cpu, v);
}

pub(crate) fn ora(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    execute::ora(cpu, v);
}

pub(crate) fn eor(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    execute::eor(cpu, v);
}

pub(crate) fn bit(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    execute::bit(cpu, v);
}

#[cfg(test)]
mod tests {
    use crate::cpu::core::tests::run_program;
    use crate::cpu::state::{NEGATIVE, OVERFLOW, ZERO};

    #[test]
    fn logic_chain() {
        // LDA #$F0; AND #$3C; ORA #$01; EOR #$FF
        let (cpu, _) = run_program(&[0xA9, 0xF0, 0x29, 0x3C, 0x09, 0x01, 0x49, 0xFF], 4);
        assert_eq!(cpu.a(), !0x31);
    }

    #[test]
    fn bit_copies_operand_bits() {
        // LDA #$C0; STA $81; LDA #$01; BIT $81
        let (cpu, _) = run_program(&[0xA9, 0xC0, 0x85, 0x81, 0xA9, 0x01, 0x24, 0x81], 4);
        assert!(cpu.state().is_flag_set(ZERO));
        assert!(cpu.state().is_flag_set(NEGATIVE));
        assert!(cpu.state().is_flag_set(OVERFLOW));
        assert_eq!(cpu.a(), 0x01);
    }
}
