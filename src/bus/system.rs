/*!
system.rs - Page table, arena and shared bus state.

Overview
========
`System` is the part of the address bus that every device may touch while
it is servicing an access. It owns:

- the page table: 128 descriptors of 64 bytes each covering the 13-bit
  address space of the 6507;
- the buffer arena that direct-access spans point into (RIOT RAM, cartridge
  ROM/RAM and code-access flag tables);
- the CPU cycle counter, the last value seen on the data bus and the
  injected pseudo-random source;
- the halt handshake, the stop request and the fault line used by the TIA
  and the cartridge to talk back to the CPU.

Design
======
Direct spans are `(BufferId, offset)` pairs instead of pointers. The page
offset (`addr & PAGE_MASK`) is added at access time and bounds-checked, so a
mapping that points past the end of a buffer degrades to a data-bus read
instead of undefined behavior.

A `PageAccess` carries an `AccessType`, but dispatch does not consult it: a
page with a direct span is served from the arena, everything else goes to
the owning `Device`. The type is informational (debugger views, tests).
*/

use crate::error::{CoreError, StateError};
use crate::random::Random;
use crate::serializer::{Serializable, Serializer};

/// Address lines visible to the 6507 (A0..A12).
pub const ADDRESS_MASK: u16 = 0x1FFF;
pub const PAGE_SHIFT: u16 = 6;
pub const PAGE_SIZE: u16 = 1 << PAGE_SHIFT;
pub const PAGE_MASK: u16 = PAGE_SIZE - 1;
pub const NUM_PAGES: usize = (ADDRESS_MASK as usize + 1) >> PAGE_SHIFT;

/// Handle into the arena owned by `System`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

/// A window into an arena buffer. The page offset of the accessed address is
/// added to `offset` when the span is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub buffer: BufferId,
    pub offset: usize,
}

impl Span {
    #[inline]
    pub fn new(buffer: BufferId, offset: usize) -> Self {
        Self { buffer, offset }
    }
}

/// Which chip services accesses that are not served directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Tia,
    Riot,
    Cartridge,
    Unmapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageAccess {
    pub direct_peek: Option<Span>,
    pub direct_poke: Option<Span>,
    pub code_access: Option<Span>,
    pub device: Device,
    pub access_type: AccessType,
}

impl PageAccess {
    /// A page whose every access is routed to `device`.
    pub fn routed(device: Device, access_type: AccessType) -> Self {
        Self {
            direct_peek: None,
            direct_poke: None,
            code_access: None,
            device,
            access_type,
        }
    }

    pub fn with_peek(mut self, span: Span) -> Self {
        self.direct_peek = Some(span);
        self
    }

    pub fn with_poke(mut self, span: Span) -> Self {
        self.direct_poke = Some(span);
        self
    }

    pub fn with_code(mut self, span: Span) -> Self {
        self.code_access = Some(span);
        self
    }
}

impl Default for PageAccess {
    fn default() -> Self {
        Self::routed(Device::Unmapped, AccessType::Read)
    }
}

/// Access classification bits OR-ed into code-access tables.
pub mod access_flags {
    pub const NONE: u8 = 0x00;
    /// Opcode fetch.
    pub const CODE: u8 = 0x80;
    /// Operand fetch.
    pub const OPERAND: u8 = 0x40;
    /// Data read by an instruction.
    pub const DATA: u8 = 0x20;
}

/// Something went wrong inside emulated hardware. Raised on the fault line
/// and reported by the CPU at the next instruction boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulationFault {
    Fatal(String),
    Warning(String),
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

pub struct System {
    pages: Vec<PageAccess>,
    dirty: Vec<bool>,
    arena: Vec<Vec<u8>>,

    cycles: u64,
    data_bus: u8,
    rng: Random,

    halt_line: bool,
    halt_requested: bool,
    stop_requested: bool,
    fault: Option<EmulationFault>,
}

impl System {
    pub fn new(rng: Random) -> Self {
        Self {
            pages: vec![PageAccess::default(); NUM_PAGES],
            dirty: vec![false; NUM_PAGES],
            arena: Vec::new(),
            cycles: 0,
            data_bus: 0,
            rng,
            halt_line: false,
            halt_requested: false,
            stop_requested: false,
            fault: None,
        }
    }

    #[inline]
    pub fn page_index(addr: u16) -> usize {
        ((addr & ADDRESS_MASK) >> PAGE_SHIFT) as usize
    }

    // ---------------------------------------------------------------------
    // Page table
    // ---------------------------------------------------------------------

    /// Replace the descriptor for the page containing `addr`.
    #[inline]
    pub fn set_page_access(&mut self, addr: u16, access: PageAccess) {
        self.pages[Self::page_index(addr)] = access;
    }

    #[inline]
    pub fn page_access(&self, addr: u16) -> &PageAccess {
        &self.pages[Self::page_index(addr)]
    }

    /// Map every page in `start..=end` (page granular) with `f(page_base)`.
    pub fn map_range(&mut self, start: u16, end: u16, mut f: impl FnMut(u16) -> PageAccess) {
        let mut addr = start & !PAGE_MASK;
        while addr <= end {
            self.set_page_access(addr, f(addr));
            addr += PAGE_SIZE;
        }
    }

    // ---------------------------------------------------------------------
    // Arena
    // ---------------------------------------------------------------------

    pub fn allocate(&mut self, bytes: usize) -> BufferId {
        self.arena.push(vec![0; bytes]);
        BufferId(self.arena.len() - 1)
    }

    /// Allocate a buffer initialised from `data`.
    pub fn allocate_from(&mut self, data: &[u8]) -> BufferId {
        self.arena.push(data.to_vec());
        BufferId(self.arena.len() - 1)
    }

    #[inline]
    pub fn buffer(&self, id: BufferId) -> &[u8] {
        &self.arena[id.0]
    }

    #[inline]
    pub fn buffer_mut(&mut self, id: BufferId) -> &mut [u8] {
        &mut self.arena[id.0]
    }

    #[inline]
    pub(crate) fn span_read(&self, span: Span, addr: u16) -> Option<u8> {
        let idx = span.offset + (addr & PAGE_MASK) as usize;
        self.arena[span.buffer.0].get(idx).copied()
    }

    #[inline]
    pub(crate) fn span_write(&mut self, span: Span, addr: u16, value: u8) -> bool {
        let idx = span.offset + (addr & PAGE_MASK) as usize;
        match self.arena[span.buffer.0].get_mut(idx) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn span_or(&mut self, span: Span, addr: u16, flags: u8) {
        let idx = span.offset + (addr & PAGE_MASK) as usize;
        if let Some(slot) = self.arena[span.buffer.0].get_mut(idx) {
            *slot |= flags;
        }
    }

    /// Side-effect free read through a direct-peek span. Routed pages yield `None`.
    pub fn peek_direct(&self, addr: u16) -> Option<u8> {
        let page = self.page_access(addr);
        page.direct_peek.and_then(|span| self.span_read(span, addr))
    }

    // ---------------------------------------------------------------------
    // Clock, data bus, randomness
    // ---------------------------------------------------------------------

    #[inline]
    pub fn increment_cycles(&mut self, n: u64) {
        self.cycles += n;
    }

    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn reset_cycles(&mut self) {
        self.cycles = 0;
    }

    #[inline]
    pub fn data_bus_state(&self) -> u8 {
        self.data_bus
    }

    #[inline]
    pub fn set_data_bus_state(&mut self, v: u8) {
        self.data_bus = v;
    }

    #[inline]
    pub fn rng(&mut self) -> &mut Random {
        &mut self.rng
    }

    // ---------------------------------------------------------------------
    // Dirty pages
    // ---------------------------------------------------------------------

    #[inline]
    pub(crate) fn mark_dirty(&mut self, addr: u16) {
        self.dirty[Self::page_index(addr)] = true;
    }

    /// True if any page overlapping `start..=end` was written since the last clear.
    pub fn is_page_dirty(&self, start: u16, end: u16) -> bool {
        let first = Self::page_index(start);
        let last = Self::page_index(end);
        (first..=last).any(|p| self.dirty[p])
    }

    pub fn clear_dirty_pages(&mut self) {
        self.dirty.fill(false);
    }

    // ---------------------------------------------------------------------
    // Halt handshake / stop / faults
    // ---------------------------------------------------------------------

    /// Armed by the CPU once it has a handler for halt requests.
    pub fn install_halt_line(&mut self) {
        self.halt_line = true;
    }

    pub fn request_halt(&mut self) -> Result<(), CoreError> {
        if !self.halt_line {
            return Err(CoreError::HaltWithoutHandler);
        }
        self.halt_requested = true;
        Ok(())
    }

    #[inline]
    pub fn halt_requested(&self) -> bool {
        self.halt_requested
    }

    #[inline]
    pub fn acknowledge_halt(&mut self) {
        self.halt_requested = false;
    }

    /// A new scanline releases any halt that was not serviced yet.
    #[inline]
    pub fn clear_halt_request(&mut self) {
        self.halt_requested = false;
    }

    /// Ask the CPU to leave `execute` at the next instruction boundary.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn take_stop_request(&mut self) -> bool {
        std::mem::take(&mut self.stop_requested)
    }

    /// Only the first fault per instruction is kept.
    pub fn raise_fault(&mut self, fault: EmulationFault) {
        if self.fault.is_none() {
            self.fault = Some(fault);
        }
    }

    pub fn take_fault(&mut self) -> Option<EmulationFault> {
        self.fault.take()
    }
}

impl Serializable for System {
    fn name(&self) -> &'static str {
        "System"
    }

    fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
        out.put_string(self.name());
        out.put_long(self.cycles);
        out.put_byte(self.data_bus);
        self.rng.save_state(out)
    }

    fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        input.expect_tag(self.name())?;
        self.cycles = input.get_long()?;
        self.data_bus = input.get_byte()?;
        self.rng.load_state(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> System {
        System::new(Random::new(Some(1)))
    }

    #[test]
    fn page_geometry() {
        assert_eq!(NUM_PAGES, 128);
        assert_eq!(System::page_index(0x1FFF), 127);
        // A13-A15 are not wired.
        assert_eq!(System::page_index(0xF000), System::page_index(0x1000));
    }

    #[test]
    fn span_bounds_are_checked() {
        let mut sys = setup();
        let buf = sys.allocate(64);
        sys.buffer_mut(buf)[5] = 0xAB;
        sys.set_page_access(
            0x1000,
            PageAccess::routed(Device::Cartridge, AccessType::Read).with_peek(Span::new(buf, 0)),
        );
        sys.set_page_access(
            0x1040,
            PageAccess::routed(Device::Cartridge, AccessType::Read).with_peek(Span::new(buf, 32)),
        );
        assert_eq!(sys.peek_direct(0x1005), Some(0xAB));
        assert_eq!(sys.peek_direct(0x1040 + 40), None);
        assert_eq!(sys.peek_direct(0x0000), None);
    }

    #[test]
    fn halt_needs_line() {
        let mut sys = setup();
        assert_eq!(sys.request_halt(), Err(CoreError::HaltWithoutHandler));
        sys.install_halt_line();
        assert!(sys.request_halt().is_ok());
        assert!(sys.halt_requested());
        sys.acknowledge_halt();
        assert!(!sys.halt_requested());
    }

    #[test]
    fn dirty_tracking() {
        let mut sys = setup();
        sys.mark_dirty(0x1085);
        assert!(sys.is_page_dirty(0x1000, 0x10FF));
        assert!(!sys.is_page_dirty(0x1100, 0x1FFF));
        sys.clear_dirty_pages();
        assert!(!sys.is_page_dirty(0x0000, 0x1FFF));
    }

    #[test]
    fn first_fault_wins() {
        let mut sys = setup();
        sys.raise_fault(EmulationFault::Warning("a".into()));
        sys.raise_fault(EmulationFault::Fatal("b".into()));
        assert_eq!(sys.take_fault(), Some(EmulationFault::Warning("a".into())));
        assert_eq!(sys.take_fault(), None);
    }

    #[test]
    fn state_round_trip_keeps_rng_position() {
        let mut sys = setup();
        sys.increment_cycles(1234);
        sys.set_data_bus_state(0x5A);
        sys.rng().next();
        let mut s = Serializer::new();
        assert!(sys.save(&mut s));
        let expect = sys.rng().next();

        let mut other = System::new(Random::new(Some(77)));
        assert!(other.load(&mut s));
        assert_eq!(other.cycles(), 1234);
        assert_eq!(other.data_bus_state(), 0x5A);
        assert_eq!(other.rng().next(), expect);
    }
}
