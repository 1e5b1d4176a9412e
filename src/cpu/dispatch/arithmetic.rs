/*!
arithmetic.rs - ADC / SBC and register increment / decrement

```text
    ADC: 69, 65, 75, 6D, 7D, 79, 61, 71
    SBC: E9, E5, F5, ED, FD, F9, E1, F1 (+ EB undocumented alias)
    INX E8, INY C8, DEX CA, DEY 88
```
*/

use crate::bus::Bus;
use crate::cpu::addressing::{AddrMode, dummy_read_pc, read_operand};
use crate::cpu::core::Cpu;
use crate::cpu::execute;
use crate::cpu::regs::CpuRegs;

pub(crate) fn adc(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    execute::adc(cpu, v);
}

pub(crate) fn sbc(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    let v = read_operand(cpu, bus, mode);
    execute::sbc(cpu, v);
}

pub(crate) fn inx(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let x = cpu.state().x;
    let v = execute::increment(cpu, x);
    cpu.set_x(v);
}

pub(crate) fn iny(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let y = cpu.state().y;
    let v = execute::increment(cpu, y);
    cpu.set_y(v);
}

pub(crate) fn dex(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let x = cpu.state().x;
    let v = execute::decrement(cpu, x);
    cpu.set_x(v);
}

pub(crate) fn dey(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    dummy_read_pc(cpu, bus);
    let y = cpu.state().y;
    let v = execute::decrement(cpu, y);
    cpu.set_y(v);
}

#[cfg(test)]
mod tests {
    use crate::cpu::core::tests::run_program;
    use crate::cpu::state::{CARRY, NEGATIVE, OVERFLOW, ZERO};

    #[test]
    fn adc_then_sbc_round_trip() {
        // CLC; LDA #$50; ADC #$50; SEC; SBC #$50
        let (cpu, _) = run_program(&[0x18, 0xA9, 0x50, 0x69, 0x50, 0x38, 0xE9, 0x50], 5);
        assert_eq!(cpu.a(), 0x50);
        assert!(cpu.state().is_flag_set(CARRY));
        assert!(cpu.state().is_flag_set(OVERFLOW));
    }

    #[test]
    fn decimal_add_via_sed() {
        // SED; CLC; LDA #$19; ADC #$28
        let (cpu, _) = run_program(&[0xF8, 0x18, 0xA9, 0x19, 0x69, 0x28], 4);
        assert_eq!(cpu.a(), 0x47);
    }

    #[test]
    fn register_steps_wrap() {
        // LDX #$FF; INX; DEY
        let (cpu, _) = run_program(&[0xA2, 0xFF, 0xE8, 0x88], 3);
        assert_eq!(cpu.x(), 0x00);
        assert_eq!(cpu.y(), 0xFF);
        assert!(cpu.state().is_flag_set(NEGATIVE));
        assert!(!cpu.state().is_flag_set(ZERO));
    }

    #[test]
    fn undocumented_sbc_alias_matches() {
        let (a, _) = run_program(&[0x38, 0xA9, 0x10, 0xE9, 0x03], 3);
        let (b, _) = run_program(&[0x38, 0xA9, 0x10, 0xEB, 0x03], 3);
        assert_eq!(a.a(), b.a());
        assert_eq!(a.status(), b.status());
    }
}
