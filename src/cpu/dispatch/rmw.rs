/*!
rmw.rs - Read-modify-write family (shifts, rotates, INC / DEC)

```text
    ASL: 0A, 06, 16, 0E, 1E      LSR: 4A, 46, 56, 4E, 5E
    ROL: 2A, 26, 36, 2E, 3E      ROR: 6A, 66, 76, 6E, 7E
    INC: E6, F6, EE, FE          DEC: C6, D6, CE, DE
```

Memory forms write the unmodified value back before the result (two
writes); this is visible to hotspots and write traps.
*/

use crate::bus::Bus;
use crate::cpu::addressing::{AddrMode, modify_operand};
use crate::cpu::core::Cpu;
use crate::cpu::execute;

pub(crate) fn asl(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    modify_operand(cpu, bus, mode, execute::asl::<Cpu>);
}

pub(crate) fn lsr(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    modify_operand(cpu, bus, mode, execute::lsr::<Cpu>);
}

pub(crate) fn rol(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    modify_operand(cpu, bus, mode, execute::rol::<Cpu>);
}

pub(crate) fn ror(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    modify_operand(cpu, bus, mode, execute::ror::<Cpu>);
}

pub(crate) fn inc(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    modify_operand(cpu, bus, mode, execute::increment::<Cpu>);
}

pub(crate) fn dec(cpu: &mut Cpu, bus: &mut Bus, mode: AddrMode) {
    modify_operand(cpu, bus, mode, execute::decrement::<Cpu>);
}
