/*
E7 (M-Network) bank switching.

Characteristics:
- 8K, 12K or 16K of ROM in 2K slices; the last slice is fixed at
  $1A00-$1FFF.
- 2K of RAM: a 1K slice that can replace the switchable ROM segment and
  four 256-byte banks at $1800-$19FF.

Hotspots (read or write):
- $1FE0-$1FE6: ROM slice n into $1000-$17FF (only slices below the fixed one).
- $1FE7: the 1K RAM slice into $1000-$17FF (write port $1000-$13FF, read
  port $1400-$17FF).
- $1FE8-$1FEB: 256-byte RAM bank n (write port $1800-$18FF, read port
  $1900-$19FF).

ROM slice and RAM bank selection are independent.
*/

use crate::bus::System;
use crate::error::{CoreError, StateError};
use crate::mapper::{CartBase, CartBus, Mapper};
use crate::serializer::Serializer;
use crate::settings::Settings;

const BANK_SIZE: usize = 0x800;
const RAM_SIZE: usize = 0x800;
const RAM_BANK_OFFSET: usize = 0x400;

#[derive(Debug, Clone)]
pub struct E7 {
    base: CartBase,
    /// Slice shown in each 2K segment; `ram_slice` in segment 0 means RAM.
    slices: [u16; 2],
    current_ram: u16,
    bank_count: u16,
    ram_slice: u16,
}

impl E7 {
    pub fn new(image: &[u8], settings: &Settings) -> Result<Self, CoreError> {
        let size = image.len();
        if !matches!(size, 0x2000 | 0x3000 | 0x4000) {
            return Err(CoreError::ImageSize { scheme: "E7", size });
        }
        let bank_count = (size / BANK_SIZE) as u16;
        Ok(Self {
            base: CartBase::new(image.to_vec(), RAM_SIZE, settings),
            slices: [0, bank_count - 1],
            current_ram: 0,
            bank_count,
            ram_slice: bank_count - 1,
        })
    }

    /// Select the 256-byte RAM bank at $1800-$19FF.
    pub fn bank_ram(&mut self, system: &mut System, bank: u16) -> bool {
        if self.base.locked || bank > 3 {
            return false;
        }
        self.current_ram = bank;
        let offset = RAM_BANK_OFFSET + ((bank as usize) << 8);
        self.base.map_ram_write(system, 0x1800, 0x18FF, offset);
        self.base.map_ram_read(system, 0x1900, 0x19FF, offset);
        true
    }

    fn map_slice(&mut self, system: &mut System, slice: u16) {
        if slice == self.ram_slice {
            self.base.map_ram_write(system, 0x1000, 0x13FF, 0);
            self.base.map_ram_read(system, 0x1400, 0x17FF, 0);
        } else {
            self.base
                .map_rom(system, 0x1000, 0x17FF, (slice as usize) * BANK_SIZE);
        }
    }

    fn check_switch(&mut self, system: &mut System, offset: u16) {
        match offset {
            0x0FE0..=0x0FE7 => {
                let n = offset & 0x07;
                if n == 7 {
                    self.switch(system, self.ram_slice);
                } else if n < self.ram_slice {
                    self.switch(system, n);
                }
            }
            0x0FE8..=0x0FEB => {
                self.bank_ram(system, offset & 0x03);
            }
            _ => {}
        }
    }

    fn switch(&mut self, system: &mut System, slice: u16) -> bool {
        if self.base.locked || slice > self.ram_slice {
            return false;
        }
        self.slices[0] = slice;
        self.map_slice(system, slice);
        log::trace!("E7: slice {slice} -> $1000");
        true
    }

    fn ram_selected(&self) -> bool {
        self.slices[0] == self.ram_slice
    }

    fn rom_offset(&self, offset: u16) -> usize {
        ((self.slices[(offset >> 11) as usize & 1] as usize) << 11) + (offset & 0x07FF) as usize
    }

    fn ram_bank_offset(&self, offset: u16) -> usize {
        RAM_BANK_OFFSET + ((self.current_ram as usize) << 8) + (offset & 0xFF) as usize
    }

    fn map_fixed(&mut self, system: &mut System) {
        let last = (self.ram_slice as usize) * BANK_SIZE;
        self.base.map_rom(system, 0x1A00, 0x1FBF, last + 0x200);
        self.base.map_routed(system, 0x1FC0, 0x1FFF, Some(last + 0x7C0));
    }
}

impl Mapper for E7 {
    fn scheme(&self) -> &'static str {
        "E7"
    }

    fn base(&self) -> &CartBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CartBase {
        &mut self.base
    }

    fn install(&mut self, bus: &mut CartBus) {
        self.map_fixed(bus.system);
        self.slices[1] = self.ram_slice;
        self.bank_ram(bus.system, 0);
        let start = self.base.start_bank();
        self.bank(bus, start);
    }

    fn reset(&mut self, bus: &mut CartBus) {
        self.base.initialize_ram(bus.system);
        let start = self.base.initialize_start_bank(bus.system, 0, self.ram_slice);
        let ram_bank = if self.base.random_start_bank() {
            (bus.system.rng().next() % 4) as u16
        } else {
            0
        };
        self.bank_ram(bus.system, ram_bank);
        self.bank(bus, start);
    }

    fn peek(&mut self, bus: &mut CartBus, addr: u16) -> u8 {
        let offset = addr & 0x0FFF;
        self.check_switch(bus.system, offset);

        let storage = self.base.storage(bus.system);
        match offset {
            0x000..=0x3FF if self.ram_selected() => self.base.peek_ram(bus.system, offset as usize),
            0x400..=0x7FF if self.ram_selected() => {
                bus.system.buffer(storage.ram)[(offset & 0x3FF) as usize]
            }
            0x800..=0x8FF => {
                let ram_offset = self.ram_bank_offset(offset);
                self.base.peek_ram(bus.system, ram_offset)
            }
            0x900..=0x9FF => bus.system.buffer(storage.ram)[self.ram_bank_offset(offset)],
            _ => {
                let rom_offset = self.rom_offset(offset);
                self.base.rom_byte(bus.system, rom_offset)
            }
        }
    }

    fn poke(&mut self, bus: &mut CartBus, addr: u16, value: u8) -> bool {
        let offset = addr & 0x0FFF;
        self.check_switch(bus.system, offset);

        match offset {
            0x000..=0x3FF if self.ram_selected() => {
                self.base.poke_ram(bus.system, offset as usize, value);
                true
            }
            0x800..=0x8FF => {
                let ram_offset = self.ram_bank_offset(offset);
                self.base.poke_ram(bus.system, ram_offset, value);
                true
            }
            _ => false,
        }
    }

    fn bank(&mut self, bus: &mut CartBus, bank: u16) -> bool {
        self.switch(bus.system, bank)
    }

    fn current_bank(&self, addr: u16) -> u16 {
        self.slices[((addr & 0x0FFF) >> 11) as usize]
    }

    fn bank_count(&self) -> u16 {
        self.bank_count
    }

    fn patch(&mut self, system: &mut System, addr: u16, value: u8) -> bool {
        let offset = addr & 0x0FFF;
        match offset {
            0x000..=0x7FF if self.ram_selected() => {
                self.base.poke_ram(system, (offset & 0x3FF) as usize, value);
                true
            }
            0x800..=0x9FF => {
                let ram_offset = self.ram_bank_offset(offset);
                self.base.poke_ram(system, ram_offset, value);
                true
            }
            _ => {
                let rom_offset = self.rom_offset(offset);
                self.base.write_rom(system, rom_offset, value)
            }
        }
    }

    fn save_state(&self, out: &mut Serializer, system: &System) -> Result<(), StateError> {
        out.put_string(self.scheme());
        out.put_short_array(&self.slices);
        out.put_short(self.current_ram);
        self.base.save_ram(out, system)
    }

    fn load_state(&mut self, input: &mut Serializer, bus: &mut CartBus) -> Result<(), StateError> {
        input.expect_tag(self.scheme())?;
        let mut slices = [0u16; 2];
        input.get_short_array(&mut slices)?;
        if slices[0] > self.ram_slice || slices[1] != self.ram_slice {
            return Err(StateError::InvalidValue {
                field: "E7 slice",
                value: slices[0] as u64,
            });
        }
        let ram_bank = input.get_short()?;
        if ram_bank > 3 {
            return Err(StateError::InvalidValue {
                field: "E7 RAM bank",
                value: ram_bank as u64,
            });
        }
        self.base.load_ram(input, bus.system)?;

        let locked = std::mem::replace(&mut self.base.locked, false);
        self.switch(bus.system, slices[0]);
        self.bank_ram(bus.system, ram_bank);
        self.base.locked = locked;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{banked_image, cart_env};
    use crate::tia::Tia;

    fn setup(slices: usize) -> (System, Tia, E7) {
        let image = banked_image(slices, BANK_SIZE);
        let mut cart = E7::new(&image, &Settings::default()).expect("E7 image");
        let (mut system, mut tia) = cart_env();
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.install(&mut bus);
        cart.reset(&mut bus);
        (system, tia, cart)
    }

    #[test]
    fn last_slice_is_fixed() {
        let (mut system, mut tia, mut cart) = setup(8);
        assert_eq!(system.peek_direct(0x1A00), Some(7));
        assert_eq!(system.peek_direct(0x1FC0), None);
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        assert_eq!(cart.peek(&mut bus, 0x1FFC), 7);
        assert_eq!(cart.current_bank(0x1FFC), 7);
        assert_eq!(cart.bank_count(), 8);
    }

    #[test]
    fn hotspot_selects_rom_slice() {
        let (mut system, mut tia, mut cart) = setup(8);
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1FE2);
        assert_eq!(system.peek_direct(0x1000), Some(2));
        assert_eq!(cart.current_bank(0x1000), 2);
    }

    #[test]
    fn ram_slice_ports() {
        let (mut system, mut tia, mut cart) = setup(8);
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1FE7);
        assert!(cart.poke(&mut bus, 0x1005, 0x55));
        assert_eq!(system.peek_direct(0x1405), Some(0x55));
        assert_eq!(system.peek_direct(0x1005), None);
    }

    #[test]
    fn ram_banks_are_independent_of_slice() {
        let (mut system, mut tia, mut cart) = setup(8);
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1FE9);
        cart.poke(&mut bus, 0x1810, 0x66);
        cart.peek(&mut bus, 0x1FE3);
        assert_eq!(system.peek_direct(0x1910), Some(0x66));
        assert_eq!(system.peek_direct(0x1000), Some(3));

        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1FE8);
        assert_eq!(system.peek_direct(0x1910), Some(0));
    }

    #[test]
    fn reading_write_port_stores_random_byte() {
        let (mut system, mut tia, mut cart) = setup(8);
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        let value = cart.peek(&mut bus, 0x1820);
        assert_eq!(system.peek_direct(0x1920), Some(value));
    }

    #[test]
    fn small_images_only_select_their_slices() {
        let (mut system, mut tia, mut cart) = setup(4);
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1FE3);
        assert_eq!(cart.current_bank(0x1000), 0);
        cart.peek(&mut bus, 0x1FE2);
        assert_eq!(cart.current_bank(0x1000), 2);
        cart.peek(&mut bus, 0x1FE7);
        assert_eq!(cart.current_bank(0x1000), 3);
        assert_eq!(system.peek_direct(0x1A00), Some(3));
    }

    #[test]
    fn state_restores_slice_and_ram_bank() {
        let (mut system, mut tia, mut cart) = setup(6);
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1FE4);
        cart.peek(&mut bus, 0x1FEA);
        cart.poke(&mut bus, 0x1801, 0xAB);
        let mut out = Serializer::new();
        cart.save_state(&mut out, &system).expect("save");

        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.reset(&mut bus);
        out.rewind();
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.load_state(&mut out, &mut bus).expect("load");
        assert_eq!(system.peek_direct(0x1000), Some(4));
        assert_eq!(system.peek_direct(0x1901), Some(0xAB));
    }

    #[test]
    fn rejects_odd_sizes() {
        assert!(E7::new(&[0; 0x2800], &Settings::default()).is_err());
    }
}
