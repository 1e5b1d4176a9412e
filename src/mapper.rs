/*!
Mapper subsystem: the trait every bank-switching scheme implements, plus the
plumbing shared by all schemes.

Purpose:
- Decouple the address bus from the scheme details so new schemes only have
  to describe their hotspots and page layout.
- Keep ROM, cartridge RAM and code-access flags in the `System` arena so the
  bus can serve most reads through direct spans.

Borrowing:
- Every bus-facing operation receives a `CartBus`, which borrows the `System`
  and the `Tia` disjointly from `Bus`. Schemes remap pages through
  `bus.system` and forward TIA-space accesses they claimed through `bus.tia`.

Lock:
- While `CartBase::locked` is set (debugger views) hotspots do not switch
  banks and reads of RAM write ports do not disturb RAM.
*/

use crate::bus::{AccessType, BufferId, Device, PAGE_SIZE, PageAccess, Span, System};
use crate::error::StateError;
use crate::serializer::Serializer;
use crate::settings::Settings;
use crate::tia::Tia;

/// Bus view handed to cartridge code.
pub struct CartBus<'a> {
    pub system: &'a mut System,
    pub tia: &'a mut Tia,
}

/// Common interface all bank-switching schemes implement.
///
/// Semantics:
/// - Addresses are 13-bit bus addresses (A12 selects the cartridge).
/// - `install` claims pages and maps the start bank; `reset` re-initializes
///   cartridge RAM and maps the start bank again.
/// - `bank` switches the primary segment and returns `false` when the switch
///   was refused (locked, or no such bank).
/// - `load_state` re-derives the page mappings from the restored bank state.
pub trait Mapper {
    /// Scheme name, e.g. "E7".
    fn scheme(&self) -> &'static str;

    fn base(&self) -> &CartBase;
    fn base_mut(&mut self) -> &mut CartBase;

    fn install(&mut self, bus: &mut CartBus);
    fn reset(&mut self, bus: &mut CartBus);

    fn peek(&mut self, bus: &mut CartBus, addr: u16) -> u8;
    fn poke(&mut self, bus: &mut CartBus, addr: u16, value: u8) -> bool;

    fn bank(&mut self, bus: &mut CartBus, bank: u16) -> bool;
    fn current_bank(&self, addr: u16) -> u16;
    fn bank_count(&self) -> u16;

    /// Hot-edit the byte visible at `addr`. Schemes that forbid it return `false`.
    fn patch(&mut self, _system: &mut System, _addr: u16, _value: u8) -> bool {
        false
    }

    fn save_state(&self, out: &mut Serializer, system: &System) -> Result<(), StateError>;
    fn load_state(&mut self, input: &mut Serializer, bus: &mut CartBus)
    -> Result<(), StateError>;
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Arena buffers owned by an installed scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Storage {
    pub rom: BufferId,
    pub ram: BufferId,
    /// One flag byte per ROM byte followed by one per RAM byte.
    pub code: BufferId,
}

/// Settings-derived state and arena handles every scheme carries.
#[derive(Debug, Clone)]
pub struct CartBase {
    image: Vec<u8>,
    ram_size: usize,
    storage: Option<Storage>,
    pub locked: bool,
    randomize_ram: bool,
    random_start_bank: bool,
    start_bank: u16,
}

impl CartBase {
    pub fn new(image: Vec<u8>, ram_size: usize, settings: &Settings) -> Self {
        Self {
            image,
            ram_size,
            storage: None,
            locked: false,
            randomize_ram: settings.randomize_ram,
            random_start_bank: settings.random_start_bank,
            start_bank: 0,
        }
    }

    /// ROM image as loaded.
    #[inline]
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    #[inline]
    pub fn ram_size(&self) -> usize {
        self.ram_size
    }

    /// Arena buffers, allocated on first use.
    pub fn storage(&mut self, system: &mut System) -> Storage {
        if let Some(storage) = self.storage {
            return storage;
        }
        let storage = Storage {
            rom: system.allocate_from(&self.image),
            ram: system.allocate(self.ram_size),
            code: system.allocate(self.image.len() + self.ram_size),
        };
        self.storage = Some(storage);
        storage
    }

    /// Arena buffers of an installed scheme (state saving happens after install).
    pub fn installed(&self) -> Result<Storage, StateError> {
        self.storage.ok_or(StateError::InvalidValue {
            field: "cartridge not installed",
            value: 0,
        })
    }

    /// Fill cartridge RAM with random bytes or zeros.
    pub fn initialize_ram(&mut self, system: &mut System) {
        let storage = self.storage(system);
        if self.randomize_ram {
            let mut bytes = vec![0u8; self.ram_size];
            system.rng().fill(&mut bytes);
            system.buffer_mut(storage.ram).copy_from_slice(&bytes);
        } else {
            system.buffer_mut(storage.ram).fill(0);
        }
    }

    /// Pick the start bank: `default`, or random when configured.
    pub fn initialize_start_bank(&mut self, system: &mut System, default: u16, count: u16) -> u16 {
        self.start_bank = if self.random_start_bank && count > 0 {
            (system.rng().next() % count as u32) as u16
        } else {
            default
        };
        self.start_bank
    }

    #[inline]
    pub fn start_bank(&self) -> u16 {
        self.start_bank
    }

    #[inline]
    pub fn random_start_bank(&self) -> bool {
        self.random_start_bank
    }

    /// Read of a RAM write port: the bus floats, so a random byte is returned
    /// and also written to RAM unless the bank is locked.
    pub fn peek_ram(&mut self, system: &mut System, ram_offset: usize) -> u8 {
        let value = system.rng().next_byte();
        if !self.locked {
            let storage = self.storage(system);
            if let Some(slot) = system.buffer_mut(storage.ram).get_mut(ram_offset) {
                *slot = value;
            }
        }
        value
    }

    pub fn poke_ram(&mut self, system: &mut System, ram_offset: usize, value: u8) {
        let storage = self.storage(system);
        if let Some(slot) = system.buffer_mut(storage.ram).get_mut(ram_offset) {
            *slot = value;
        }
    }

    pub fn rom_byte(&mut self, system: &mut System, offset: usize) -> u8 {
        let storage = self.storage(system);
        system
            .buffer(storage.rom)
            .get(offset)
            .copied()
            .unwrap_or_else(|| system.data_bus_state())
    }

    /// Map `start..=end` with ROM from `rom_offset` (offset of `start`).
    pub fn map_rom(&mut self, system: &mut System, start: u16, end: u16, rom_offset: usize) {
        let storage = self.storage(system);
        let mut addr = start;
        while addr <= end {
            let offset = rom_offset + (addr - start) as usize;
            let access = PageAccess::routed(Device::Cartridge, AccessType::Read)
                .with_peek(Span::new(storage.rom, offset))
                .with_code(Span::new(storage.code, offset));
            system.set_page_access(addr, access);
            addr += PAGE_SIZE;
        }
    }

    /// Map `start..=end` as a RAM read port (direct peek) onto `ram_offset`.
    pub fn map_ram_read(&mut self, system: &mut System, start: u16, end: u16, ram_offset: usize) {
        let storage = self.storage(system);
        let code_base = self.image.len();
        let mut addr = start;
        while addr <= end {
            let offset = ram_offset + (addr - start) as usize;
            let access = PageAccess::routed(Device::Cartridge, AccessType::Read)
                .with_peek(Span::new(storage.ram, offset))
                .with_code(Span::new(storage.code, code_base + offset));
            system.set_page_access(addr, access);
            addr += PAGE_SIZE;
        }
    }

    /// Map `start..=end` as a RAM write port: every access goes through the
    /// scheme's `peek`/`poke`.
    pub fn map_ram_write(&mut self, system: &mut System, start: u16, end: u16, ram_offset: usize) {
        let storage = self.storage(system);
        let code_base = self.image.len();
        let mut addr = start;
        while addr <= end {
            let offset = ram_offset + (addr - start) as usize;
            let access = PageAccess::routed(Device::Cartridge, AccessType::Write)
                .with_code(Span::new(storage.code, code_base + offset));
            system.set_page_access(addr, access);
            addr += PAGE_SIZE;
        }
    }

    /// Route `start..=end` to the scheme, with code flags at `code_offset`.
    pub fn map_routed(&mut self, system: &mut System, start: u16, end: u16, code_offset: Option<usize>) {
        let storage = self.storage(system);
        let mut addr = start;
        while addr <= end {
            let mut access =
                PageAccess::routed(Device::Cartridge, AccessType::ReadWrite);
            if let Some(base) = code_offset {
                access = access.with_code(Span::new(storage.code, base + (addr - start) as usize));
            }
            system.set_page_access(addr, access);
            addr += PAGE_SIZE;
        }
    }

    /// Code/data access flags recorded for ROM offset `offset`.
    pub fn access_flags(&self, system: &System, offset: usize) -> u8 {
        self.storage
            .and_then(|s| system.buffer(s.code).get(offset).copied())
            .unwrap_or(0)
    }

    pub fn write_rom(&mut self, system: &mut System, offset: usize, value: u8) -> bool {
        let storage = self.storage(system);
        match system.buffer_mut(storage.rom).get_mut(offset) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn save_ram(&self, out: &mut Serializer, system: &System) -> Result<(), StateError> {
        let storage = self.installed()?;
        out.put_byte_array(system.buffer(storage.ram));
        Ok(())
    }

    pub fn load_ram(&mut self, input: &mut Serializer, system: &mut System) -> Result<(), StateError> {
        let storage = self.storage(system);
        let mut ram = vec![0u8; self.ram_size];
        input.get_byte_array(&mut ram)?;
        system.buffer_mut(storage.ram).copy_from_slice(&ram);
        Ok(())
    }
}
