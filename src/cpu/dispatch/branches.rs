/*!
branches.rs - Conditional relative branches

```text
    BPL 10  BMI 30  BVC 50  BVS 70  BCC 90  BCS B0  BNE D0  BEQ F0
```

Timing: 2 cycles not taken, 3 taken, 4 when the target is on another page.
The extra cycles are dummy reads (next opcode, then the unfixed target).
*/

use crate::bus::{Bus, access_flags};
use crate::cpu::addressing::{AddrMode, dummy_read_pc, fetch_operand};
use crate::cpu::core::Cpu;
use crate::cpu::regs::CpuRegs;
use crate::cpu::state::{CARRY, NEGATIVE, OVERFLOW, ZERO};

fn branch(cpu: &mut Cpu, bus: &mut Bus, taken: bool) {
    let offset = fetch_operand(cpu, bus) as i8;
    if !taken {
        return;
    }
    dummy_read_pc(cpu, bus);
    let pc = cpu.pc();
    let target = pc.wrapping_add(offset as i16 as u16);
    if (pc & 0xFF00) != (target & 0xFF00) {
        cpu.peek(bus, (pc & 0xFF00) | (target & 0x00FF), access_flags::NONE);
    }
    cpu.set_pc(target);
}

pub(crate) fn bpl(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    let taken = !cpu.is_flag_set(NEGATIVE);
    branch(cpu, bus, taken);
}

pub(crate) fn bmi(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    let taken = cpu.is_flag_set(NEGATIVE);
    branch(cpu, bus, taken);
}

pub(crate) fn bvc(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    let taken = !cpu.is_flag_set(OVERFLOW);
    branch(cpu, bus, taken);
}

pub(crate) fn bvs(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    let taken = cpu.is_flag_set(OVERFLOW);
    branch(cpu, bus, taken);
}

pub(crate) fn bcc(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    let taken = !cpu.is_flag_set(CARRY);
    branch(cpu, bus, taken);
}

pub(crate) fn bcs(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    let taken = cpu.is_flag_set(CARRY);
    branch(cpu, bus, taken);
}

pub(crate) fn bne(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    let taken = !cpu.is_flag_set(ZERO);
    branch(cpu, bus, taken);
}

pub(crate) fn beq(cpu: &mut Cpu, bus: &mut Bus, _mode: AddrMode) {
    let taken = cpu.is_flag_set(ZERO);
    branch(cpu, bus, taken);
}

#[cfg(test)]
mod tests {
    use crate::cpu::core::tests::setup;

    #[test]
    fn branch_timing() {
        // LDA #$01 (Z clear); BEQ +2 (not taken); BNE +2 (taken)
        let (mut cpu, mut bus) = setup(&[0xA9, 0x01, 0xF0, 0x02, 0xD0, 0x02]);
        cpu.execute(&mut bus, 1);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 2);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 3);
        assert_eq!(cpu.pc(), 0x1008);
    }

    #[test]
    fn backward_branch_across_page() {
        // At $1000: BNE -4 targets $0FFE, a different page.
        let (mut cpu, mut bus) = setup(&[0xD0, 0xFC]);
        cpu.state_mut().assign_flag(crate::cpu::state::ZERO, false);
        assert_eq!(cpu.execute(&mut bus, 1).cycles, 4);
        assert_eq!(cpu.pc(), 0x0FFE);
    }
}
