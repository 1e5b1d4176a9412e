/*!
state.rs - Canonical 6507 CPU architectural state (registers + flags) and
inline-friendly helpers.

Overview
========
`CpuState` owns every architecturally visible register plus the small amount
of execution bookkeeping that has to survive a snapshot (latched interrupts,
the stop request, the last break cycle). It excludes:
  - Bus / memory logic
  - Instruction decode / dispatch logic
  - Debugger tables and the halt handler (owned by `Cpu`)

6502 Status Register Bit Layout (for reference)
===============================================
Bit: 7 6 5 4 3 2 1 0
     N V 1 B D I Z C
Where:
  N = NEGATIVE
  V = OVERFLOW
  1 = UNUSED (always reads as 1)
  B = BREAK (always reads set on the 6507; IRQ/NMI push it clear)
  D = DECIMAL (BCD arithmetic for ADC/SBC)
  I = IRQ_DISABLE
  Z = ZERO
  C = CARRY
*/

use crate::error::StateError;
use crate::serializer::{Serializable, Serializer};

/// Processor status flag bit masks (canonical definitions).
pub const CARRY: u8 = 0b0000_0001;
pub const ZERO: u8 = 0b0000_0010;
pub const IRQ_DISABLE: u8 = 0b0000_0100;
pub const DECIMAL: u8 = 0b0000_1000;
pub const BREAK: u8 = 0b0001_0000;
pub const UNUSED: u8 = 0b0010_0000; // Always set when read.
pub const OVERFLOW: u8 = 0b0100_0000;
pub const NEGATIVE: u8 = 0b1000_0000;

/// Latched execution requests, checked at instruction boundaries.
pub mod pending {
    pub const IRQ: u8 = 0x01;
    pub const NMI: u8 = 0x02;
    pub const STOP: u8 = 0x04;
}

/// Pure architectural register / flag container for the 6507.
///
/// Prefer method access over direct field mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub n: bool,
    pub v: bool,
    pub b: bool,
    pub d: bool,
    pub i: bool,
    /// Zero flag complement.
    pub not_z: bool,
    pub c: bool,
    /// Instruction register (last fetched opcode).
    pub ir: u8,
    /// Bit set of `pending::*`.
    pub pending: u8,
    pub last_peek_address: u16,
    pub last_poke_address: u16,
    /// Cycle of the last debugger stop; the same cycle never breaks twice.
    pub last_break_cycle: Option<u64>,
}

impl Default for CpuState {
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0x0000,
            n: false,
            v: false,
            b: true,
            d: false,
            i: true,
            not_z: true,
            c: false,
            ir: 0,
            pending: 0,
            last_peek_address: 0,
            last_poke_address: 0,
            last_break_cycle: None,
        }
    }
}

impl CpuState {
    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    /// Create a new CPU state using power-up defaults.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Basic Accessors (Read)
    // ---------------------------------------------------------------------
    #[inline]
    pub fn a(&self) -> u8 {
        self.a
    }
    #[inline]
    pub fn x(&self) -> u8 {
        self.x
    }
    #[inline]
    pub fn y(&self) -> u8 {
        self.y
    }
    #[inline]
    pub fn sp(&self) -> u8 {
        self.sp
    }
    #[inline]
    pub fn pc(&self) -> u16 {
        self.pc
    }
    /// Packed status byte built from the individual flags.
    #[inline]
    pub fn status(&self) -> u8 {
        let mut ps = UNUSED;
        for (set, mask) in [
            (self.n, NEGATIVE),
            (self.v, OVERFLOW),
            (self.b, BREAK),
            (self.d, DECIMAL),
            (self.i, IRQ_DISABLE),
            (!self.not_z, ZERO),
            (self.c, CARRY),
        ] {
            if set {
                ps |= mask;
            }
        }
        ps
    }

    // ---------------------------------------------------------------------
    // Mutators (Write)
    // ---------------------------------------------------------------------
    #[inline]
    pub fn set_a(&mut self, v: u8) {
        self.a = v;
    }
    #[inline]
    pub fn set_x(&mut self, v: u8) {
        self.x = v;
    }
    #[inline]
    pub fn set_y(&mut self, v: u8) {
        self.y = v;
    }
    #[inline]
    pub fn set_sp(&mut self, v: u8) {
        self.sp = v;
    }
    #[inline]
    pub fn set_pc(&mut self, v: u16) {
        self.pc = v;
    }
    /// Unpack `ps` into the flags. B stays set whatever was pulled.
    #[inline]
    pub fn set_status(&mut self, ps: u8) {
        self.n = ps & NEGATIVE != 0;
        self.v = ps & OVERFLOW != 0;
        self.b = true;
        self.d = ps & DECIMAL != 0;
        self.i = ps & IRQ_DISABLE != 0;
        self.not_z = ps & ZERO == 0;
        self.c = ps & CARRY != 0;
    }

    /// Advance PC by `delta` (wrapping at 16 bits).
    #[inline]
    pub fn advance_pc(&mut self, delta: u16) {
        self.pc = self.pc.wrapping_add(delta);
    }

    // ---------------------------------------------------------------------
    // Flag Operations
    // ---------------------------------------------------------------------

    #[inline]
    pub fn is_flag_set(&self, mask: u8) -> bool {
        (self.status() & mask) != 0
    }

    /// BREAK and UNUSED are fixed and ignored here.
    #[inline]
    pub fn assign_flag(&mut self, mask: u8, value: bool) {
        if mask & NEGATIVE != 0 {
            self.n = value;
        }
        if mask & OVERFLOW != 0 {
            self.v = value;
        }
        if mask & DECIMAL != 0 {
            self.d = value;
        }
        if mask & IRQ_DISABLE != 0 {
            self.i = value;
        }
        if mask & ZERO != 0 {
            self.not_z = !value;
        }
        if mask & CARRY != 0 {
            self.c = value;
        }
    }

    #[inline]
    pub fn update_zn(&mut self, result: u8) {
        self.not_z = result != 0;
        self.n = (result & 0x80) != 0;
    }

    // ---------------------------------------------------------------------
    // Pending requests
    // ---------------------------------------------------------------------

    #[inline]
    pub fn latch(&mut self, bits: u8) {
        self.pending |= bits;
    }

    #[inline]
    pub fn is_pending(&self, bits: u8) -> bool {
        self.pending & bits != 0
    }

    /// Clear `bits` and report whether any of them was set.
    #[inline]
    pub fn take_pending(&mut self, bits: u8) -> bool {
        let was = self.is_pending(bits);
        self.pending &= !bits;
        was
    }
}

impl Serializable for CpuState {
    fn name(&self) -> &'static str {
        "M6502"
    }

    fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
        out.put_string(self.name());
        out.put_byte(self.a);
        out.put_byte(self.x);
        out.put_byte(self.y);
        out.put_byte(self.sp);
        out.put_byte(self.ir);
        out.put_short(self.pc);
        for flag in [self.n, self.v, self.b, self.d, self.i, self.not_z, self.c] {
            out.put_bool(flag);
        }
        out.put_byte(self.pending);
        out.put_short(self.last_peek_address);
        out.put_short(self.last_poke_address);
        out.put_long(self.last_break_cycle.unwrap_or(u64::MAX));
        Ok(())
    }

    fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        input.expect_tag(self.name())?;
        let a = input.get_byte()?;
        let x = input.get_byte()?;
        let y = input.get_byte()?;
        let sp = input.get_byte()?;
        let ir = input.get_byte()?;
        let pc = input.get_short()?;
        let n = input.get_bool()?;
        let v = input.get_bool()?;
        let b = input.get_bool()?;
        let d = input.get_bool()?;
        let i = input.get_bool()?;
        let not_z = input.get_bool()?;
        let c = input.get_bool()?;
        let pending = input.get_byte()?;
        let last_peek_address = input.get_short()?;
        let last_poke_address = input.get_short()?;
        let last_break = input.get_long()?;

        *self = Self {
            a,
            x,
            y,
            sp,
            pc,
            n,
            v,
            b,
            d,
            i,
            not_z,
            c,
            ir,
            pending,
            last_peek_address,
            last_poke_address,
            last_break_cycle: (last_break != u64::MAX).then_some(last_break),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_power_up() {
        let s = CpuState::new();
        assert_eq!(s.a(), 0);
        assert_eq!(s.x(), 0);
        assert_eq!(s.y(), 0);
        assert_eq!(s.sp(), 0xFD);
        assert!(s.is_flag_set(IRQ_DISABLE));
        assert!(s.is_flag_set(UNUSED));
        assert_eq!(s.pending, 0);
    }

    #[test]
    fn flag_assignment() {
        let mut s = CpuState::new();
        s.assign_flag(IRQ_DISABLE, false);
        assert!(!s.is_flag_set(IRQ_DISABLE));
        s.assign_flag(DECIMAL, true);
        assert!(s.is_flag_set(DECIMAL));
        s.set_status(0x00);
        assert_eq!(s.status(), UNUSED | BREAK);
    }

    #[test]
    fn status_byte_is_derived_from_flags() {
        let mut s = CpuState::new();
        assert_eq!(s.status(), 0x34);
        s.set_status(0xC3);
        assert!(s.n && s.v && s.c && !s.not_z);
        assert!(!s.d && !s.i);
        // B cannot be cleared by a pulled byte.
        assert!(s.b);
        assert_eq!(s.status(), 0xF3);
        s.update_zn(0x01);
        assert!(s.not_z && !s.n);
        assert_eq!(s.status(), 0x71);
    }

    #[test]
    fn snapshot_stores_flags_individually() {
        let s = CpuState::new();
        let mut out = Serializer::new();
        s.save_state(&mut out).expect("save");
        let mut packed = CpuState::new();
        packed.n = true;
        let mut other = Serializer::new();
        packed.save_state(&mut other).expect("save");
        // Only the N byte differs between the two snapshots.
        let diffs = out
            .as_bytes()
            .iter()
            .zip(other.as_bytes())
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(diffs, 1);
    }

    #[test]
    fn update_zn_behavior() {
        let mut s = CpuState::new();
        s.update_zn(0x00);
        assert!(s.is_flag_set(ZERO));
        assert!(!s.is_flag_set(NEGATIVE));
        s.update_zn(0x80);
        assert!(!s.is_flag_set(ZERO));
        assert!(s.is_flag_set(NEGATIVE));
    }

    #[test]
    fn pc_advance_wraps() {
        let mut s = CpuState::new();
        s.set_pc(0xFFFF);
        s.advance_pc(1);
        assert_eq!(s.pc(), 0x0000);
    }

    #[test]
    fn pending_bits_are_taken_once() {
        let mut s = CpuState::new();
        s.latch(pending::NMI | pending::IRQ);
        assert!(s.take_pending(pending::NMI));
        assert!(!s.take_pending(pending::NMI));
        assert!(s.is_pending(pending::IRQ));
    }

    #[test]
    fn snapshot_restores_registers() {
        let mut s = CpuState::new();
        s.a = 0x12;
        s.pc = 0x1234;
        s.set_status(0xE5);
        s.last_break_cycle = Some(99);
        let mut out = Serializer::new();
        s.save_state(&mut out).expect("save");

        let mut restored = CpuState::new();
        out.rewind();
        restored.load_state(&mut out).expect("load");
        assert_eq!(restored, s);
    }
}
