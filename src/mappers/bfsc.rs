/*
BFSC bank switching (256K, SuperChip RAM).

Characteristics:
- 64 banks of 4K, switched as a whole (the RAM ports stay put).
- 128 bytes of RAM: write port $1000-$107F, read port $1080-$10FF.
- Hotspots $1F80-$1FBF select bank `addr - $1F80` on read or write.
- Start bank 15.
*/

use crate::bus::System;
use crate::error::{CoreError, StateError};
use crate::mapper::{CartBase, CartBus, Mapper};
use crate::serializer::Serializer;
use crate::settings::Settings;

const IMAGE_SIZE: usize = 256 * 1024;
const BANK_SIZE: usize = 4096;
const BANKS: u16 = 64;
const RAM_SIZE: usize = 128;
const START_BANK: u16 = 15;

#[derive(Debug, Clone)]
pub struct Bfsc {
    base: CartBase,
    bank_offset: usize,
}

impl Bfsc {
    pub fn new(image: &[u8], settings: &Settings) -> Result<Self, CoreError> {
        if image.len() != IMAGE_SIZE {
            return Err(CoreError::ImageSize {
                scheme: "BFSC",
                size: image.len(),
            });
        }
        Ok(Self {
            base: CartBase::new(image.to_vec(), RAM_SIZE, settings),
            bank_offset: START_BANK as usize * BANK_SIZE,
        })
    }

    fn map_bank(&mut self, system: &mut System) {
        let offset = self.bank_offset;
        self.base.map_rom(system, 0x1100, 0x1F7F, offset + 0x100);
        self.base.map_routed(system, 0x1F80, 0x1FFF, Some(offset + 0xF80));
    }

    fn check_switch(&mut self, system: &mut System, offset: u16) {
        if (0x0F80..=0x0FBF).contains(&offset) {
            self.switch(system, offset - 0x0F80);
        }
    }

    fn switch(&mut self, system: &mut System, bank: u16) -> bool {
        if self.base.locked || bank >= BANKS {
            return false;
        }
        self.bank_offset = bank as usize * BANK_SIZE;
        self.map_bank(system);
        log::trace!("BFSC: bank {bank}");
        true
    }
}

impl Mapper for Bfsc {
    fn scheme(&self) -> &'static str {
        "BFSC"
    }

    fn base(&self) -> &CartBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CartBase {
        &mut self.base
    }

    fn install(&mut self, bus: &mut CartBus) {
        self.base.map_ram_write(bus.system, 0x1000, 0x107F, 0);
        self.base.map_ram_read(bus.system, 0x1080, 0x10FF, 0);
        self.bank(bus, START_BANK);
    }

    fn reset(&mut self, bus: &mut CartBus) {
        self.base.initialize_ram(bus.system);
        let start = self.base.initialize_start_bank(bus.system, START_BANK, BANKS);
        self.bank(bus, start);
    }

    fn peek(&mut self, bus: &mut CartBus, addr: u16) -> u8 {
        let offset = addr & 0x0FFF;
        self.check_switch(bus.system, offset);

        match offset {
            0x000..=0x07F => self.base.peek_ram(bus.system, offset as usize),
            0x080..=0x0FF => {
                let storage = self.base.storage(bus.system);
                bus.system.buffer(storage.ram)[(offset & 0x7F) as usize]
            }
            _ => {
                let rom_offset = self.bank_offset + offset as usize;
                self.base.rom_byte(bus.system, rom_offset)
            }
        }
    }

    fn poke(&mut self, bus: &mut CartBus, addr: u16, value: u8) -> bool {
        let offset = addr & 0x0FFF;
        self.check_switch(bus.system, offset);

        if offset < 0x80 {
            self.base.poke_ram(bus.system, offset as usize, value);
            return true;
        }
        false
    }

    fn bank(&mut self, bus: &mut CartBus, bank: u16) -> bool {
        self.switch(bus.system, bank)
    }

    fn current_bank(&self, _addr: u16) -> u16 {
        (self.bank_offset / BANK_SIZE) as u16
    }

    fn bank_count(&self) -> u16 {
        BANKS
    }

    fn patch(&mut self, system: &mut System, addr: u16, value: u8) -> bool {
        let offset = addr & 0x0FFF;
        if offset < 0x100 {
            self.base.poke_ram(system, (offset & 0x7F) as usize, value);
            true
        } else {
            self.base.write_rom(system, self.bank_offset + offset as usize, value)
        }
    }

    fn save_state(&self, out: &mut Serializer, system: &System) -> Result<(), StateError> {
        out.put_string(self.scheme());
        out.put_int(self.bank_offset as u32);
        self.base.save_ram(out, system)
    }

    fn load_state(&mut self, input: &mut Serializer, bus: &mut CartBus) -> Result<(), StateError> {
        input.expect_tag(self.scheme())?;
        let offset = input.get_int()? as usize;
        if offset % BANK_SIZE != 0 || offset >= IMAGE_SIZE {
            return Err(StateError::InvalidValue {
                field: "BFSC bank offset",
                value: offset as u64,
            });
        }
        self.base.load_ram(input, bus.system)?;
        self.bank_offset = offset;
        self.map_bank(bus.system);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{banked_image, cart_env};
    use crate::tia::Tia;

    fn setup() -> (System, Tia, Bfsc) {
        let image = banked_image(BANKS as usize, BANK_SIZE);
        let mut cart = Bfsc::new(&image, &Settings::default()).expect("BFSC image");
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
    fn starts_in_bank_fifteen() {
        let (system, _tia, cart) = setup();
        assert_eq!(cart.current_bank(0x1000), 15);
        assert_eq!(system.peek_direct(0x1100), Some(15));
    }

    #[test]
    fn hotspot_read_and_write_switch() {
        let (mut system, mut tia, mut cart) = setup();
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1F80 + 40);
        assert_eq!(cart.current_bank(0x1000), 40);
        cart.poke(&mut bus, 0x1F81, 0);
        assert_eq!(system.peek_direct(0x1200), Some(1));
    }

    #[test]
    fn superchip_ram_ports() {
        let (mut system, mut tia, mut cart) = setup();
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        assert!(cart.poke(&mut bus, 0x1010, 0x3C));
        assert!(!cart.poke(&mut bus, 0x1090, 0x11));
        assert_eq!(system.peek_direct(0x1090), Some(0x3C));
    }

    #[test]
    fn state_restores_bank() {
        let (mut system, mut tia, mut cart) = setup();
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1F80 + 63);
        let mut out = Serializer::new();
        cart.save_state(&mut out, &system).expect("save");

        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.bank(&mut bus, 2);
        out.rewind();
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.load_state(&mut out, &mut bus).expect("load");
        assert_eq!(cart.current_bank(0x1000), 63);
        assert_eq!(system.peek_direct(0x1100), Some(63));
    }
}
