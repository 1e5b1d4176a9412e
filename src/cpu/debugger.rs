/*!
debugger.rs - Optional debugger hook surface for the CPU.

Overview
========
`DebugHooks` is attached to a `Cpu` after construction. Without it the CPU
never evaluates any of the tables below.

- Breakpoints keyed by (address, bank), optionally one-shot. A one-shot
  breakpoint is removed when reached and stops execution silently.
- Read/write traps keyed by address, each with an optional condition.
- Conditional breaks evaluated at every instruction boundary.

Conditions are plain closures over the CPU registers and the bus; parsing
an expression language is left to the front end.

Messages
========
  BP: $XXXX, bank #N        breakpoint
  RTrap[NN]:                read trap (RTrapG for ghost reads)
  WTrap[NN]:                write trap
  CBP[NN]: name             conditional break
Traps with a named condition print `If: {name} ` instead of `: `.
*/

use std::collections::HashMap;

use crate::bus::{ADDRESS_MASK, Bus};
use crate::cpu::state::CpuState;

/// Boolean expression evaluated against the machine state.
pub trait Condition {
    fn evaluate(&self, cpu: &CpuState, bus: &Bus) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&CpuState, &Bus) -> bool,
{
    fn evaluate(&self, cpu: &CpuState, bus: &Bus) -> bool {
        self(cpu, bus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    Read,
    Write,
    ReadWrite,
}

impl TrapKind {
    fn covers(self, read: bool) -> bool {
        match self {
            TrapKind::Read => read,
            TrapKind::Write => !read,
            TrapKind::ReadWrite => true,
        }
    }
}

struct Trap {
    kind: TrapKind,
    address: u16,
    name: String,
    condition: Option<Box<dyn Condition>>,
}

struct CondBreak {
    name: String,
    condition: Box<dyn Condition>,
}

/// A trap that fired during the last instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapHit {
    pub message: String,
    pub address: u16,
    pub read: bool,
}

#[derive(Default)]
pub struct DebugHooks {
    /// Value: one-shot flag.
    breakpoints: HashMap<(u16, u16), bool>,
    traps: Vec<Trap>,
    cond_breaks: Vec<CondBreak>,
    ghost_reads_trap: bool,
}

impl DebugHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dummy reads (no access classification) also hit read traps.
    pub fn set_ghost_reads_trap(&mut self, on: bool) {
        self.ghost_reads_trap = on;
    }

    // ---------------------------------------------------------------------
    // Breakpoints
    // ---------------------------------------------------------------------

    pub fn add_breakpoint(&mut self, address: u16, bank: u16, one_shot: bool) {
        self.breakpoints.insert((address & ADDRESS_MASK, bank), one_shot);
    }

    pub fn remove_breakpoint(&mut self, address: u16, bank: u16) -> bool {
        self.breakpoints.remove(&(address & ADDRESS_MASK, bank)).is_some()
    }

    pub fn has_breakpoint(&self, address: u16, bank: u16) -> bool {
        self.breakpoints.contains_key(&(address & ADDRESS_MASK, bank))
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// `Some(one_shot)` when a breakpoint is set at `(address, bank)`. One-shot
    /// entries are removed by the lookup.
    pub(crate) fn take_breakpoint(&mut self, address: u16, bank: u16) -> Option<bool> {
        let key = (address & ADDRESS_MASK, bank);
        let one_shot = *self.breakpoints.get(&key)?;
        if one_shot {
            self.breakpoints.remove(&key);
        }
        Some(one_shot)
    }

    // ---------------------------------------------------------------------
    // Traps
    // ---------------------------------------------------------------------

    /// Register a trap and return its index (the `NN` in trap messages).
    pub fn add_trap(
        &mut self,
        kind: TrapKind,
        address: u16,
        name: impl Into<String>,
        condition: Option<Box<dyn Condition>>,
    ) -> usize {
        self.traps.push(Trap {
            kind,
            address: address & ADDRESS_MASK,
            name: name.into(),
            condition,
        });
        self.traps.len() - 1
    }

    pub fn remove_trap(&mut self, index: usize) -> bool {
        if index < self.traps.len() {
            self.traps.remove(index);
            true
        } else {
            false
        }
    }

    pub fn clear_traps(&mut self) {
        self.traps.clear();
    }

    pub fn trap_count(&self) -> usize {
        self.traps.len()
    }

    /// Check an access against the trap table. `ghost` marks a dummy read.
    pub(crate) fn check_trap(
        &self,
        address: u16,
        read: bool,
        ghost: bool,
        cpu: &CpuState,
        bus: &Bus,
    ) -> Option<TrapHit> {
        if read && ghost && !self.ghost_reads_trap {
            return None;
        }
        let address = address & ADDRESS_MASK;
        let (index, trap) = self.traps.iter().enumerate().find(|(_, t)| {
            t.address == address
                && t.kind.covers(read)
                && t.condition.as_ref().is_none_or(|c| c.evaluate(cpu, bus))
        })?;

        let prefix = match (read, ghost) {
            (true, true) => "RTrapG",
            (true, false) => "RTrap",
            (false, _) => "WTrap",
        };
        let suffix = if trap.name.is_empty() {
            ": ".to_string()
        } else {
            format!("If: {{{}}} ", trap.name)
        };
        Some(TrapHit {
            message: format!("{prefix}[{index:02X}]{suffix}"),
            address,
            read,
        })
    }

    // ---------------------------------------------------------------------
    // Conditional breaks
    // ---------------------------------------------------------------------

    pub fn add_cond_break(&mut self, name: impl Into<String>, condition: Box<dyn Condition>) -> usize {
        self.cond_breaks.push(CondBreak {
            name: name.into(),
            condition,
        });
        self.cond_breaks.len() - 1
    }

    pub fn remove_cond_break(&mut self, index: usize) -> bool {
        if index < self.cond_breaks.len() {
            self.cond_breaks.remove(index);
            true
        } else {
            false
        }
    }

    pub fn clear_cond_breaks(&mut self) {
        self.cond_breaks.clear();
    }

    pub fn cond_break_names(&self) -> Vec<&str> {
        self.cond_breaks.iter().map(|c| c.name.as_str()).collect()
    }

    /// Index and message of the first conditional break that holds.
    pub(crate) fn eval_cond_breaks(&self, cpu: &CpuState, bus: &Bus) -> Option<String> {
        self.cond_breaks
            .iter()
            .enumerate()
            .find(|(_, c)| c.condition.evaluate(cpu, bus))
            .map(|(index, c)| format!("CBP[{index:02X}]: {}", c.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::bus_with_program;

    #[test]
    fn one_shot_breakpoint_is_removed_on_hit() {
        let mut hooks = DebugHooks::new();
        hooks.add_breakpoint(0xF010, 0, true);
        assert!(hooks.has_breakpoint(0x1010, 0));
        assert_eq!(hooks.take_breakpoint(0x1010, 0), Some(true));
        assert!(!hooks.has_breakpoint(0x1010, 0));

        hooks.add_breakpoint(0x1020, 2, false);
        assert_eq!(hooks.take_breakpoint(0x1020, 1), None);
        assert_eq!(hooks.take_breakpoint(0x1020, 2), Some(false));
        assert!(hooks.has_breakpoint(0x1020, 2));
    }

    #[test]
    fn trap_messages() {
        let bus = bus_with_program(&[0xEA]);
        let cpu = CpuState::new();
        let mut hooks = DebugHooks::new();
        hooks.add_trap(TrapKind::Write, 0x0081, "", None);
        hooks.add_trap(
            TrapKind::Read,
            0x0282,
            "A>0",
            Some(Box::new(|cpu: &CpuState, _: &Bus| cpu.a > 0)),
        );

        let hit = hooks.check_trap(0x0081, false, false, &cpu, &bus).expect("write trap");
        assert_eq!(hit.message, "WTrap[00]: ");
        assert!(!hit.read);
        assert!(hooks.check_trap(0x0081, true, false, &cpu, &bus).is_none());

        assert!(hooks.check_trap(0x0282, true, false, &cpu, &bus).is_none());
        let busy = CpuState { a: 1, ..CpuState::new() };
        let hit = hooks.check_trap(0x0282, true, false, &busy, &bus).expect("read trap");
        assert_eq!(hit.message, "RTrap[01]If: {A>0} ");
    }

    #[test]
    fn ghost_reads_only_trap_when_enabled() {
        let bus = bus_with_program(&[0xEA]);
        let cpu = CpuState::new();
        let mut hooks = DebugHooks::new();
        hooks.add_trap(TrapKind::Read, 0x1000, "", None);
        assert!(hooks.check_trap(0x1000, true, true, &cpu, &bus).is_none());
        hooks.set_ghost_reads_trap(true);
        let hit = hooks.check_trap(0x1000, true, true, &cpu, &bus).expect("ghost");
        assert_eq!(hit.message, "RTrapG[00]: ");
    }

    #[test]
    fn conditional_breaks_report_first_match() {
        let bus = bus_with_program(&[0xEA]);
        let mut hooks = DebugHooks::new();
        hooks.add_cond_break("never", Box::new(|_: &CpuState, _: &Bus| false));
        hooks.add_cond_break("x==3", Box::new(|cpu: &CpuState, _: &Bus| cpu.x == 3));
        let cpu = CpuState { x: 3, ..CpuState::new() };
        assert_eq!(hooks.eval_cond_breaks(&cpu, &bus).as_deref(), Some("CBP[01]: x==3"));
        assert_eq!(hooks.cond_break_names(), vec!["never", "x==3"]);
        assert!(hooks.remove_cond_break(0));
        assert!(!hooks.remove_cond_break(5));
    }
}
