/*!
dispatch - Orchestrator for a single 6507 instruction (interrupts / table dispatch)

Overview
========
1. `service_interrupt`: latched NMI or unmasked IRQ entry (7 cycles).
2. `step`: fetch the opcode (CODE-classified read), look up `OPCODES`,
   advance PC and run the handler with the entry's addressing mode.

Families
========
Handlers are grouped by instruction family; the table in `cpu::table`
references them directly:

```text
    load_store    LDA LDX LDY STA STX STY
    arithmetic    ADC SBC INX INY DEX DEY
    logical       AND ORA EOR BIT
    compare       CMP CPX CPY
    rmw           ASL LSR ROL ROR INC DEC
    branches      BPL BMI BVC BVS BCC BCS BNE BEQ
    control_flow  JMP JSR RTS RTI BRK
    misc          transfers, stack, flag ops, NOP
    illegal       undocumented opcodes (JAM excluded)
```

Cycle Ticking
=============
Handlers tick through `Cpu::peek` / `Cpu::poke`. Interrupt entry is the
only place that advances the clock as a lump.
*/

pub(crate) mod arithmetic;
pub(crate) mod branches;
pub(crate) mod compare;
pub(crate) mod control_flow;
pub(crate) mod illegal;
pub(crate) mod load_store;
pub(crate) mod logical;
pub(crate) mod misc;
pub(crate) mod rmw;

use crate::bus::{Bus, access_flags};
use crate::cpu::core::Cpu;
use crate::cpu::execute::STACK_PAGE;
use crate::cpu::regs::CpuRegs;
use crate::cpu::state::{DECIMAL, IRQ_DISABLE, pending};
use crate::cpu::table::lookup;

pub(crate) const NMI_VECTOR: u16 = 0xFFFA;
pub(crate) const IRQ_VECTOR: u16 = 0xFFFE;

/// Execute one instruction. Returns false (PC left on the opcode) for JAM.
pub(crate) fn step(cpu: &mut Cpu, bus: &mut Bus) -> bool {
    let pc = cpu.state().pc;
    let opcode = cpu.peek(bus, pc, access_flags::CODE);
    cpu.state_mut().ir = opcode;

    let entry = lookup(opcode);
    match entry.handler {
        Some(handler) => {
            cpu.state_mut().advance_pc(1);
            handler(cpu, bus, entry.mode);
            true
        }
        None => false,
    }
}

/// Interrupt entry at an instruction boundary. NMI wins over IRQ; an IRQ
/// latched while I is set is dropped.
pub(crate) fn service_interrupt(cpu: &mut Cpu, bus: &mut Bus) {
    let vector = if cpu.state_mut().take_pending(pending::NMI) {
        NMI_VECTOR
    } else if cpu.state_mut().take_pending(pending::IRQ) && !cpu.is_flag_set(IRQ_DISABLE) {
        IRQ_VECTOR
    } else {
        return;
    };

    bus.system.increment_cycles(7);

    let pc = cpu.pc();
    let status = cpu.compose_status_for_push(false);
    for byte in [(pc >> 8) as u8, pc as u8, status] {
        let sp = cpu.sp();
        bus.write(STACK_PAGE | sp as u16, byte);
        cpu.set_sp(sp.wrapping_sub(1));
    }

    cpu.assign_flag(DECIMAL, false);
    if vector == IRQ_VECTOR {
        cpu.assign_flag(IRQ_DISABLE, true);
    }
    let lo = bus.read(vector) as u16;
    let hi = bus.read(vector.wrapping_add(1)) as u16;
    cpu.set_pc((hi << 8) | lo);
    log::trace!("cpu: interrupt via ${vector:04X} -> ${:04X}", cpu.pc());
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
    fn nop_takes_two_cycles() {
        let (mut cpu, mut bus) = setup(&[0xEA]);
        let start = bus.system.cycles();
        assert!(step(&mut cpu, &mut bus));
        assert_eq!(bus.system.cycles() - start, 2);
        assert_eq!(cpu.pc(), 0x1001);
    }

    #[test]
    fn jam_leaves_pc_on_opcode() {
        let (mut cpu, mut bus) = setup(&[0x02]);
        assert!(!step(&mut cpu, &mut bus));
        assert_eq!(cpu.pc(), 0x1000);
        assert_eq!(cpu.state().ir, 0x02);
    }

    #[test]
    fn masked_irq_is_dropped() {
        let (mut cpu, mut bus) = setup(&[0xEA]);
        cpu.irq();
        let start = bus.system.cycles();
        service_interrupt(&mut cpu, &mut bus);
        assert_eq!(bus.system.cycles(), start);
        assert!(!cpu.state().is_pending(pending::IRQ));
        assert_eq!(cpu.pc(), 0x1000);
    }

    #[test]
    fn nmi_pushes_pc_and_status() {
        let (mut cpu, mut bus) = setup(&[0xEA]);
        cpu.state_mut().assign_flag(DECIMAL, true);
        cpu.nmi();
        let start = bus.system.cycles();
        service_interrupt(&mut cpu, &mut bus);
        assert_eq!(bus.system.cycles() - start, 7);
        assert_eq!(cpu.sp(), 0xFA);
        assert_eq!(bus.peek_debug(0x01FD), 0x10);
        assert_eq!(bus.peek_debug(0x01FC), 0x00);
        let pushed = bus.peek_debug(0x01FB);
        assert_eq!(pushed & 0x10, 0, "B clear for hardware interrupts");
        assert_ne!(pushed & DECIMAL, 0);
        assert!(!cpu.is_flag_set(DECIMAL));
        assert_eq!(cpu.pc(), 0x1000);
    }
}
