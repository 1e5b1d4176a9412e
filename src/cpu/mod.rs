/*!
cpu::mod - Public façade for the 6507 CPU core.

Layout:

```text
    state.rs        - Architectural state (registers, flags, latched requests).
    regs.rs         - `CpuRegs` trait shared by `CpuState` and `Cpu`.
    addressing.rs   - Addressing modes and cycle-exact operand resolution.
    execute.rs      - Instruction semantic helpers (ALU, stack).
    table.rs        - 256-entry opcode table (mnemonic, mode, handler).
    dispatch/       - Instruction step, interrupt entry and opcode families.
    debugger.rs     - Optional breakpoints, traps and conditional breaks.
    result.rs       - `DispatchResult` returned by `Cpu::execute`.
    core/           - The `Cpu` facade.
```

Usage:
```ignore
use vcs_core::{Bus, Cpu, Settings};

let mut bus = Bus::new(&Settings::default());
let mut cpu = Cpu::new();
cpu.reset(&mut bus);
let result = cpu.execute(&mut bus, 76);
```
*/

pub mod addressing;
pub mod core;
pub mod debugger;
pub mod dispatch;
pub mod execute;
pub mod regs;
pub mod result;
pub mod state;
pub mod table;

pub use crate::cpu::core::{Cpu, HaltHandler};
pub use crate::cpu::debugger::{Condition, DebugHooks, TrapKind};
pub use crate::cpu::regs::CpuRegs;
pub use crate::cpu::result::{DispatchResult, DispatchStatus};
pub use crate::cpu::state::{
    BREAK, CARRY, CpuState, DECIMAL, IRQ_DISABLE, NEGATIVE, OVERFLOW, UNUSED, ZERO,
};
