/*!
core::Cpu - Canonical 6507 CPU facade wrapping `CpuState`.

Design
======
- `Cpu` owns the architectural state, the optional debugger hooks and the
  halt handler.
- Every memory access goes through `peek`/`poke` here: the bus clock is
  advanced by one cycle before the access, dummy accesses included, so
  instruction timing falls out of the access sequence.
- `execute` runs whole instructions until the cycle budget is used or a
  stopping condition occurs, then flushes the TIA and the RIOT.

Halt handshake
==============
A device (the TIA on WSYNC) calls `System::request_halt`. The request is
served before the next read: the installed handler runs, then the request
is acknowledged. The handler is also run at the end of `execute` so that a
stepped `STA WSYNC` ends at the start of the next line.

Stopping conditions (checked at instruction boundaries)
=======================================================
- budget used, `stop()`, or a device stop request: `Ok`
- debugger match: `Debugger`
- JAM opcode or a fatal fault on the bus fault line: `Fatal`
- warning fault: `Warning`
*/

use crate::bus::{Bus, EmulationFault, access_flags};
use crate::cpu::debugger::{DebugHooks, TrapHit};
use crate::cpu::dispatch;
use crate::cpu::result::DispatchResult;
use crate::cpu::state::{CpuState, pending};
use crate::error::{CoreError, StateError};
use crate::serializer::{Serializable, Serializer};

/// Called when a halt request is served.
pub type HaltHandler = Box<dyn FnMut(&mut Bus)>;

pub struct Cpu {
    state: CpuState,
    hooks: Option<DebugHooks>,
    halt_handler: Option<HaltHandler>,
    trap_hit: Option<TrapHit>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("hooks", &self.hooks.is_some())
            .field("halt_handler", &self.halt_handler.is_some())
            .finish()
    }
}

impl Cpu {
    /// Construct a new CPU with power-up defaults.
    pub fn new() -> Self {
        Self {
            state: CpuState::new(),
            hooks: None,
            halt_handler: None,
            trap_hit: None,
        }
    }

    pub fn state(&self) -> &CpuState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut CpuState {
        &mut self.state
    }

    /// SP 0xFD, A=X=Y=0, I set, PC from the reset vector.
    pub fn reset(&mut self, bus: &mut Bus) {
        self.state = CpuState::new();
        let lo = bus.read(0xFFFC) as u16;
        let hi = bus.read(0xFFFD) as u16;
        self.state.pc = (hi << 8) | lo;
        self.trap_hit = None;
        bus.system.acknowledge_halt();
        log::debug!("cpu: reset, PC=${:04X}", self.state.pc);
    }

    // ---------------------------------------------------------------------
    // Register accessors
    // ---------------------------------------------------------------------
    pub fn a(&self) -> u8 {
        self.state.a
    }
    pub fn x(&self) -> u8 {
        self.state.x
    }
    pub fn y(&self) -> u8 {
        self.state.y
    }
    pub fn sp(&self) -> u8 {
        self.state.sp
    }
    pub fn pc(&self) -> u16 {
        self.state.pc
    }
    pub fn status(&self) -> u8 {
        self.state.status()
    }

    // ---------------------------------------------------------------------
    // Interrupts, stop, halt
    // ---------------------------------------------------------------------

    /// Latch a maskable interrupt; dropped at the boundary if I is set.
    pub fn irq(&mut self) {
        self.state.latch(pending::IRQ);
    }

    pub fn nmi(&mut self) {
        self.state.latch(pending::NMI);
    }

    /// End the current (or next) `execute` at an instruction boundary.
    pub fn stop(&mut self) {
        self.state.latch(pending::STOP);
    }

    pub fn install_halt_handler(&mut self, bus: &mut Bus, handler: HaltHandler) {
        self.halt_handler = Some(handler);
        bus.system.install_halt_line();
    }

    pub fn request_halt(&mut self, bus: &mut Bus) -> Result<(), CoreError> {
        bus.system.request_halt()
    }

    fn handle_halt(&mut self, bus: &mut Bus) {
        if bus.system.halt_requested() {
            if let Some(handler) = self.halt_handler.as_mut() {
                handler(bus);
            }
            bus.system.acknowledge_halt();
        }
    }

    // ---------------------------------------------------------------------
    // Debugger
    // ---------------------------------------------------------------------

    pub fn attach_debugger(&mut self, hooks: DebugHooks) {
        self.hooks = Some(hooks);
    }

    pub fn detach_debugger(&mut self) -> Option<DebugHooks> {
        self.hooks.take()
    }

    pub fn debugger(&self) -> Option<&DebugHooks> {
        self.hooks.as_ref()
    }

    pub fn debugger_mut(&mut self) -> Option<&mut DebugHooks> {
        self.hooks.as_mut()
    }

    // ---------------------------------------------------------------------
    // Bus access (one cycle each)
    // ---------------------------------------------------------------------

    pub(crate) fn peek(&mut self, bus: &mut Bus, addr: u16, flags: u8) -> u8 {
        self.handle_halt(bus);

        bus.system.increment_cycles(1);
        let value = bus.read_flags(addr, flags);
        self.state.last_peek_address = addr;

        if let Some(hooks) = self.hooks.as_ref() {
            if self.trap_hit.is_none() {
                let ghost = flags == access_flags::NONE;
                self.trap_hit = hooks.check_trap(addr, true, ghost, &self.state, bus);
            }
        }
        value
    }

    pub(crate) fn poke(&mut self, bus: &mut Bus, addr: u16, value: u8) {
        bus.system.increment_cycles(1);
        bus.write(addr, value);
        self.state.last_poke_address = addr;

        if let Some(hooks) = self.hooks.as_ref() {
            if self.trap_hit.is_none() {
                self.trap_hit = hooks.check_trap(addr, false, false, &self.state, bus);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    /// Run for up to `cycle_budget` CPU cycles.
    pub fn execute(&mut self, bus: &mut Bus, cycle_budget: u64) -> DispatchResult {
        let result = self.run(bus, cycle_budget);

        self.handle_halt(bus);
        bus.synchronize();
        result
    }

    fn run(&mut self, bus: &mut Bus, cycle_budget: u64) -> DispatchResult {
        let start = bus.system.cycles();

        loop {
            let elapsed = bus.system.cycles() - start;

            if self.state.take_pending(pending::STOP) | bus.system.take_stop_request() {
                return DispatchResult::ok(elapsed);
            }
            if elapsed >= cycle_budget {
                return DispatchResult::ok(elapsed);
            }
            if let Some(result) = self.check_debugger(bus, elapsed) {
                return result;
            }

            if self.state.is_pending(pending::IRQ | pending::NMI) {
                dispatch::service_interrupt(self, bus);
                continue;
            }

            let pc = self.state.pc;
            self.state.last_peek_address = 0;
            self.state.last_poke_address = 0;

            if !dispatch::step(self, bus) {
                let elapsed = bus.system.cycles() - start;
                log::warn!("cpu: invalid instruction ${:02X} at ${pc:04X}", self.state.ir);
                return DispatchResult::fatal(elapsed, "invalid instruction", pc);
            }

            if let Some(fault) = bus.system.take_fault() {
                let elapsed = bus.system.cycles() - start;
                return match fault {
                    EmulationFault::Fatal(msg) => DispatchResult::fatal(elapsed, msg, pc),
                    EmulationFault::Warning(msg) => {
                        DispatchResult::warning(elapsed, msg, self.state.pc)
                    }
                };
            }
        }
    }

    fn check_debugger(&mut self, bus: &mut Bus, elapsed: u64) -> Option<DispatchResult> {
        let hooks = self.hooks.as_mut()?;
        let now = bus.system.cycles();
        if self.state.last_break_cycle == Some(now) {
            return None;
        }

        if let Some(hit) = self.trap_hit.take() {
            self.state.last_break_cycle = Some(now);
            return Some(DispatchResult::debugger(elapsed, hit.message, hit.address, hit.read));
        }

        let pc = self.state.pc;
        let bank = bus.cartridge_bank(pc);
        if let Some(one_shot) = hooks.take_breakpoint(pc, bank) {
            self.state.last_break_cycle = Some(now);
            return Some(if one_shot {
                DispatchResult::ok(elapsed)
            } else {
                DispatchResult::debugger(elapsed, format!("BP: ${pc:04X}, bank #{bank}"), pc, false)
            });
        }

        if let Some(message) = hooks.eval_cond_breaks(&self.state, bus) {
            self.state.last_break_cycle = Some(now);
            return Some(DispatchResult::debugger(elapsed, message, pc, false));
        }
        None
    }

    // ---------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------

    pub fn save_state(&self, out: &mut Serializer, bus: &Bus) -> Result<(), StateError> {
        self.state.save_state(out)?;
        out.put_bool(bus.system.halt_requested());
        Ok(())
    }

    pub fn load_state(&mut self, input: &mut Serializer, bus: &mut Bus) -> Result<(), StateError> {
        let mut state = CpuState::new();
        state.load_state(input)?;
        let halt = input.get_bool()?;

        if halt {
            bus.system.request_halt().map_err(|_| StateError::InvalidValue {
                field: "halt request without handler",
                value: 1,
            })?;
        } else {
            bus.system.acknowledge_halt();
        }
        self.state = state;
        self.trap_hit = None;
        Ok(())
    }
}
