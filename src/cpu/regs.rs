/*!
regs.rs - CpuRegs trait providing a minimal, generic register + flag
manipulation interface for 6507 execution helpers.

The trait does NOT include:
  - Stack push/pop
  - Instruction fetch helpers
  - Bus access of any kind

Memory, stack and fetch operations go through `Cpu` because every access
advances the bus clock, runs the halt handshake and checks debugger traps.
The ALU helpers in `execute.rs` only need registers and flags, so they are
written against this trait and work on both `CpuState` and `Cpu`.

Implementations Provided:
=========================
- `CpuState` (the canonical state owner)
- `Cpu` (delegates to its state)
*/

use crate::cpu::core::Cpu;
use crate::cpu::state::{BREAK, CARRY, CpuState, NEGATIVE, OVERFLOW, UNUSED, ZERO};

/// Minimal register + flag API needed by instruction semantic code.
///
/// ALL mutating methods take &mut self, enabling generic call sites:
///   fn op<T: CpuRegs>(cpu: &mut T) { ... }
pub trait CpuRegs {
    // ---------------------------------------------------------------------
    // Read accessors
    // ---------------------------------------------------------------------
    fn a(&self) -> u8;
    fn x(&self) -> u8;
    fn y(&self) -> u8;
    fn sp(&self) -> u8;
    fn pc(&self) -> u16;
    fn status(&self) -> u8;

    // ---------------------------------------------------------------------
    // Mutators
    // ---------------------------------------------------------------------
    fn set_a(&mut self, v: u8);
    fn set_x(&mut self, v: u8);
    fn set_y(&mut self, v: u8);
    fn set_sp(&mut self, v: u8);
    fn set_pc(&mut self, v: u16);
    fn set_status(&mut self, v: u8);

    /// Advance PC by `delta` (wrapping at 16 bits).
    fn advance_pc(&mut self, delta: u16);

    // ---------------------------------------------------------------------
    // Flag operations
    // ---------------------------------------------------------------------

    fn is_flag_set(&self, mask: u8) -> bool;
    fn assign_flag(&mut self, mask: u8, value: bool);

    /// Composite: update ZERO and NEGATIVE based on result.
    #[inline]
    fn update_zn(&mut self, result: u8) {
        self.assign_flag(ZERO, result == 0);
        self.assign_flag(NEGATIVE, (result & 0x80) != 0);
    }

    #[inline]
    fn update_carry(&mut self, carry: bool) {
        self.assign_flag(CARRY, carry);
    }

    #[inline]
    fn update_overflow(&mut self, overflow: bool) {
        self.assign_flag(OVERFLOW, overflow);
    }

    /// Status byte for a stack push: UNUSED forced, BREAK only for BRK/PHP.
    /// The live B flag is unaffected.
    #[inline]
    fn compose_status_for_push(&self, set_break: bool) -> u8 {
        let v = self.status() | UNUSED;
        if set_break { v | BREAK } else { v & !BREAK }
    }
}

impl CpuRegs for CpuState {
    #[inline]
    fn a(&self) -> u8 {
        self.a
    }
    #[inline]
    fn x(&self) -> u8 {
        self.x
    }
    #[inline]
    fn y(&self) -> u8 {
        self.y
    }
    #[inline]
    fn sp(&self) -> u8 {
        self.sp
    }
    #[inline]
    fn pc(&self) -> u16 {
        self.pc
    }
    #[inline]
    fn status(&self) -> u8 {
        CpuState::status(self)
    }

    #[inline]
    fn set_a(&mut self, v: u8) {
        self.a = v;
    }
    #[inline]
    fn set_x(&mut self, v: u8) {
        self.x = v;
    }
    #[inline]
    fn set_y(&mut self, v: u8) {
        self.y = v;
    }
    #[inline]
    fn set_sp(&mut self, v: u8) {
        self.sp = v;
    }
    #[inline]
    fn set_pc(&mut self, v: u16) {
        self.pc = v;
    }
    #[inline]
    fn set_status(&mut self, v: u8) {
        CpuState::set_status(self, v);
    }

    #[inline]
    fn advance_pc(&mut self, delta: u16) {
        CpuState::advance_pc(self, delta);
    }

    #[inline]
    fn is_flag_set(&self, mask: u8) -> bool {
        CpuState::is_flag_set(self, mask)
    }

    #[inline]
    fn assign_flag(&mut self, mask: u8, value: bool) {
        CpuState::assign_flag(self, mask, value);
    }
}

impl CpuRegs for Cpu {
    #[inline]
    fn a(&self) -> u8 {
        self.state().a
    }
    #[inline]
    fn x(&self) -> u8 {
        self.state().x
    }
    #[inline]
    fn y(&self) -> u8 {
        self.state().y
    }
    #[inline]
    fn sp(&self) -> u8 {
        self.state().sp
    }
    #[inline]
    fn pc(&self) -> u16 {
        self.state().pc
    }
    #[inline]
    fn status(&self) -> u8 {
        self.state().status()
    }

    #[inline]
    fn set_a(&mut self, v: u8) {
        self.state_mut().a = v;
    }
    #[inline]
    fn set_x(&mut self, v: u8) {
        self.state_mut().x = v;
    }
    #[inline]
    fn set_y(&mut self, v: u8) {
        self.state_mut().y = v;
    }
    #[inline]
    fn set_sp(&mut self, v: u8) {
        self.state_mut().sp = v;
    }
    #[inline]
    fn set_pc(&mut self, v: u16) {
        self.state_mut().pc = v;
    }
    #[inline]
    fn set_status(&mut self, v: u8) {
        self.state_mut().set_status(v);
    }

    #[inline]
    fn advance_pc(&mut self, delta: u16) {
        self.state_mut().advance_pc(delta);
    }

    #[inline]
    fn is_flag_set(&self, mask: u8) -> bool {
        self.state().is_flag_set(mask)
    }

    #[inline]
    fn assign_flag(&mut self, mask: u8, value: bool) {
        self.state_mut().assign_flag(mask, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump<C: CpuRegs>(cpu: &mut C) {
        let v = cpu.a().wrapping_add(1);
        cpu.set_a(v);
        cpu.update_zn(v);
    }

    #[test]
    fn generic_helpers_work_on_both_implementors() {
        let mut state = CpuState::new();
        state.a = 0xFF;
        bump(&mut state);
        assert!(CpuRegs::is_flag_set(&state, ZERO));

        let mut cpu = Cpu::new();
        cpu.state_mut().a = 0x7F;
        bump(&mut cpu);
        assert!(CpuRegs::is_flag_set(&cpu, NEGATIVE));
        assert_eq!(CpuRegs::a(&cpu), 0x80);
    }

    #[test]
    fn pushed_status_break_handling() {
        let s = CpuState::new();
        assert_ne!(s.compose_status_for_push(true) & BREAK, 0);
        assert_eq!(s.compose_status_for_push(false) & BREAK, 0);
        assert_ne!(s.compose_status_for_push(false) & UNUSED, 0);
    }
}
