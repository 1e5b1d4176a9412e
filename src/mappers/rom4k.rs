/*
Plain 2K / 4K cartridges.

Characteristics:
- No bank switching; the whole image is visible at 0x1000-0x1FFF.
- 2K images are mirrored into both halves of the cartridge window. Smaller
  images are repeated until they fill 2K.
- Every page is served by a direct span; peek/poke only see accesses when
  a debugger goes through the cartridge explicitly.

Patching rewrites the arena copy, so the change is visible immediately.
*/

use crate::bus::System;
use crate::error::{CoreError, StateError};
use crate::mapper::{CartBase, CartBus, Mapper};
use crate::serializer::Serializer;
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct Rom4K {
    base: CartBase,
    mask: u16,
    name: &'static str,
}

impl Rom4K {
    pub fn new_2k(image: &[u8], settings: &Settings) -> Result<Self, CoreError> {
        if image.is_empty() || image.len() > 2048 {
            return Err(CoreError::ImageSize {
                scheme: "2K",
                size: image.len(),
            });
        }
        let rom: Vec<u8> = image.iter().copied().cycle().take(2048).collect();
        Ok(Self {
            base: CartBase::new(rom, 0, settings),
            mask: 0x07FF,
            name: "2K",
        })
    }

    pub fn new_4k(image: &[u8], settings: &Settings) -> Result<Self, CoreError> {
        if image.len() != 4096 {
            return Err(CoreError::ImageSize {
                scheme: "4K",
                size: image.len(),
            });
        }
        Ok(Self {
            base: CartBase::new(image.to_vec(), 0, settings),
            mask: 0x0FFF,
            name: "4K",
        })
    }

    fn map(&mut self, system: &mut System) {
        let window = self.mask + 1;
        let mut start = 0x1000;
        while start < 0x2000 {
            self.base.map_rom(system, start, start + window - 1, 0);
            start += window;
        }
    }
}

impl Mapper for Rom4K {
    fn scheme(&self) -> &'static str {
        self.name
    }

    fn base(&self) -> &CartBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CartBase {
        &mut self.base
    }

    fn install(&mut self, bus: &mut CartBus) {
        self.map(bus.system);
    }

    fn reset(&mut self, bus: &mut CartBus) {
        self.map(bus.system);
    }

    fn peek(&mut self, bus: &mut CartBus, addr: u16) -> u8 {
        self.base.rom_byte(bus.system, (addr & self.mask) as usize)
    }

    fn poke(&mut self, _bus: &mut CartBus, _addr: u16, _value: u8) -> bool {
        false
    }

    fn bank(&mut self, _bus: &mut CartBus, _bank: u16) -> bool {
        false
    }

    fn current_bank(&self, _addr: u16) -> u16 {
        0
    }

    fn bank_count(&self) -> u16 {
        1
    }

    fn patch(&mut self, system: &mut System, addr: u16, value: u8) -> bool {
        self.base.write_rom(system, (addr & self.mask) as usize, value)
    }

    fn save_state(&self, out: &mut Serializer, _system: &System) -> Result<(), StateError> {
        out.put_string(self.name);
        Ok(())
    }

    fn load_state(&mut self, input: &mut Serializer, _bus: &mut CartBus) -> Result<(), StateError> {
        input.expect_tag(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cart_env;

    #[test]
    fn two_k_is_mirrored() {
        let image: Vec<u8> = (0..2048u32).map(|i| (i & 0xFF) as u8).collect();
        let mut cart = Rom4K::new_2k(&image, &Settings::default()).expect("2K");
        let (mut system, mut tia) = cart_env();
        cart.install(&mut CartBus {
            system: &mut system,
            tia: &mut tia,
        });
        assert_eq!(system.peek_direct(0x1005), Some(5));
        assert_eq!(system.peek_direct(0x1805), Some(5));
        assert_eq!(system.peek_direct(0x1FFF), Some(0xFF));
    }

    #[test]
    fn short_image_is_repeated() {
        let mut cart = Rom4K::new_2k(&[0xEA, 0x60], &Settings::default()).expect("2K");
        let (mut system, mut tia) = cart_env();
        cart.install(&mut CartBus {
            system: &mut system,
            tia: &mut tia,
        });
        assert_eq!(system.peek_direct(0x1000), Some(0xEA));
        assert_eq!(system.peek_direct(0x1003), Some(0x60));
    }

    #[test]
    fn four_k_size_is_checked() {
        assert!(matches!(
            Rom4K::new_4k(&[0; 4000], &Settings::default()),
            Err(CoreError::ImageSize { scheme: "4K", size: 4000 })
        ));
    }

    #[test]
    fn patch_is_visible() {
        let mut cart = Rom4K::new_4k(&[0; 4096], &Settings::default()).expect("4K");
        let (mut system, mut tia) = cart_env();
        cart.install(&mut CartBus {
            system: &mut system,
            tia: &mut tia,
        });
        assert!(cart.patch(&mut system, 0x1234, 0x42));
        assert_eq!(system.peek_direct(0x1234), Some(0x42));
        assert!(!cart.bank(
            &mut CartBus {
                system: &mut system,
                tia: &mut tia
            },
            1
        ));
    }
}
