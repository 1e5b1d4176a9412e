#![doc = r#"
Bus module: the 6507 address bus.

Overview
- `system`: page table, buffer arena, cycle counter, data bus latch, RNG,
  halt handshake, stop request and fault line (`System`).
- This file: the `Bus` facade. It owns the `System` plus the three chips and
  routes every CPU access either through a direct span or to the owning
  device.

Address decode (A13-A15 are not connected)
- A12 set: cartridge (0x1000-0x1FFF)
- (addr & 0x1080) == 0x0000: TIA
- (addr & 0x1280) == 0x0080: RIOT RAM (128 bytes, mirrored, direct)
- (addr & 0x1280) == 0x0280: RIOT I/O and timer

Cartridges may take over any page when installed (3E+ claims 0x00-0x3F to
watch its hotspots), so `attach_cartridge` installs the cartridge after the
chips.

Borrowing
- Devices receive `&mut System` only; the cartridge gets a `CartBus` that
  borrows the `System` and the `Tia` disjointly from this struct, so a
  hotspot can both remap pages and forward TIA-space accesses.
"#]

pub mod system;

pub use system::{
    ADDRESS_MASK, AccessType, BufferId, Device, EmulationFault, NUM_PAGES, PAGE_MASK, PAGE_SHIFT,
    PAGE_SIZE, PageAccess, Span, System, access_flags,
};

use crate::cartridge::Cartridge;
use crate::error::StateError;
use crate::mapper::CartBus;
use crate::random::Random;
use crate::riot::Riot;
use crate::serializer::{Serializable, Serializer};
use crate::settings::Settings;
use crate::tia::Tia;

pub struct Bus {
    pub system: System,
    pub tia: Tia,
    pub riot: Riot,
    cartridge: Option<Cartridge>,
}

impl Bus {
    pub fn new(settings: &Settings) -> Self {
        let mut system = System::new(Random::new(settings.random_seed));
        let mut riot = Riot::new(&mut system, settings);
        let mut tia = Tia::new(settings);

        riot.install(&mut system);
        tia.install(&mut system);

        Self {
            system,
            tia,
            riot,
            cartridge: None,
        }
    }

    /// Attach and install a cartridge, replacing any previous one.
    pub fn attach_cartridge(&mut self, mut cart: Cartridge) {
        let mut cb = CartBus {
            system: &mut self.system,
            tia: &mut self.tia,
        };
        cart.install(&mut cb);
        self.cartridge = Some(cart);
    }

    #[inline]
    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    #[inline]
    pub fn cartridge_mut(&mut self) -> Option<&mut Cartridge> {
        self.cartridge.as_mut()
    }

    /// Power-on reset of every chip on the bus (the CPU is reset separately).
    pub fn reset(&mut self) {
        self.system.reset_cycles();
        self.system.clear_dirty_pages();
        self.system.acknowledge_halt();
        self.system.take_stop_request();
        self.system.take_fault();

        self.riot.reset(&mut self.system);
        self.tia.reset(&mut self.system);
        if let Some(cart) = self.cartridge.as_mut() {
            let mut cb = CartBus {
                system: &mut self.system,
                tia: &mut self.tia,
            };
            cart.reset(&mut cb);
        }
    }

    // ---------------------------------------------------------------------
    // CPU-visible access
    // ---------------------------------------------------------------------

    #[inline]
    pub fn read(&mut self, addr: u16) -> u8 {
        self.read_flags(addr, access_flags::NONE)
    }

    /// Read with access classification; non-zero `flags` are OR-ed into the
    /// page's code-access table when it has one.
    pub fn read_flags(&mut self, addr: u16, flags: u8) -> u8 {
        let addr = addr & ADDRESS_MASK;
        let page = *self.system.page_access(addr);

        if flags != access_flags::NONE {
            if let Some(span) = page.code_access {
                self.system.span_or(span, addr, flags);
            }
        }

        let value = match page.direct_peek {
            Some(span) => self
                .system
                .span_read(span, addr)
                .unwrap_or_else(|| self.system.data_bus_state()),
            None => self.route_peek(page.device, addr),
        };
        self.system.set_data_bus_state(value);
        value
    }

    /// Write a byte. Returns true when the write changed emulated state that
    /// tooling may want to refresh.
    pub fn write(&mut self, addr: u16, value: u8) -> bool {
        let addr = addr & ADDRESS_MASK;
        let page = *self.system.page_access(addr);

        self.system.mark_dirty(addr);
        self.system.set_data_bus_state(value);

        match page.direct_poke {
            Some(span) => self.system.span_write(span, addr, value),
            None => self.route_poke(page.device, addr, value),
        }
    }

    /// Side-effect free view used by debugger conditions and tests.
    pub fn peek_debug(&self, addr: u16) -> u8 {
        self.system
            .peek_direct(addr & ADDRESS_MASK)
            .unwrap_or_else(|| self.system.data_bus_state())
    }

    fn route_peek(&mut self, device: Device, addr: u16) -> u8 {
        match device {
            Device::Tia => self.tia.peek(&mut self.system, addr),
            Device::Riot => self.riot.peek(&mut self.system, addr),
            Device::Cartridge => match self.cartridge.as_mut() {
                Some(cart) => {
                    let mut cb = CartBus {
                        system: &mut self.system,
                        tia: &mut self.tia,
                    };
                    cart.peek(&mut cb, addr)
                }
                None => self.system.data_bus_state(),
            },
            Device::Unmapped => self.system.data_bus_state(),
        }
    }

    fn route_poke(&mut self, device: Device, addr: u16, value: u8) -> bool {
        match device {
            Device::Tia => self.tia.poke(&mut self.system, addr, value),
            Device::Riot => self.riot.poke(&mut self.system, addr, value),
            Device::Cartridge => match self.cartridge.as_mut() {
                Some(cart) => {
                    let mut cb = CartBus {
                        system: &mut self.system,
                        tia: &mut self.tia,
                    };
                    cart.poke(&mut cb, addr, value)
                }
                None => false,
            },
            Device::Unmapped => false,
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    /// Current bank mapped at `addr` (0 without a cartridge).
    pub fn cartridge_bank(&self, addr: u16) -> u16 {
        self.cartridge
            .as_ref()
            .map_or(0, |c| c.current_bank(addr & ADDRESS_MASK))
    }

    /// Bring the TIA and the RIOT up to the current CPU cycle.
    pub fn synchronize(&mut self) {
        self.tia.update_emulation(&mut self.system);
        self.riot.update_emulation(&mut self.system);
    }

    pub fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
        self.system.save_state(out)?;
        self.riot.save_with(out, &self.system)?;
        self.tia.save_state(out)?;
        match self.cartridge.as_ref() {
            Some(cart) => {
                out.put_bool(true);
                cart.save_state(out, &self.system)
            }
            None => {
                out.put_bool(false);
                Ok(())
            }
        }
    }

    pub fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        self.system.load_state(input)?;
        self.riot.load_with(input, &mut self.system)?;
        self.tia.load_state(input)?;
        let has_cart = input.get_bool()?;
        match (has_cart, self.cartridge.as_mut()) {
            (true, Some(cart)) => {
                let mut cb = CartBus {
                    system: &mut self.system,
                    tia: &mut self.tia,
                };
                cart.load_state(input, &mut cb)
            }
            (false, None) => Ok(()),
            (expected, _) => Err(StateError::InvalidValue {
                field: "cartridge present",
                value: expected as u64,
            }),
        }
    }
}
