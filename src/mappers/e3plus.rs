/*
3E+ bank switching.

Characteristics:
- Up to 64 ROM banks of 1K and 32 RAM banks of 512 bytes (16K RAM).
- The cartridge window is split into four 1K segments. Each segment holds
  either a ROM bank (both 512-byte halves) or a RAM bank (lower half is the
  read port, upper half the write port).

Hotspots (TIA space, the write still reaches the TIA):
- $3F: map ROM bank `value & 0x3F` into segment `value >> 6`.
- $3E: map RAM bank `value & 0x3F` into segment `value >> 6`.

Slot table:
- `bank_in_use[half]` records, per 512-byte half, the bank number plus
  `ROM_RAM` (RAM bank) and `LOWER_UPPER` (upper half). Halves that were never
  mapped hold `BANK_UNDEFINED` and read as random bytes.

Reset:
- All halves undefined, then ROM bank 0 in segment 0 and in segment 3.
*/

use crate::bus::System;
use crate::error::{CoreError, StateError};
use crate::mapper::{CartBase, CartBus, Mapper};
use crate::serializer::Serializer;
use crate::settings::Settings;

const ROM_BANK_SIZE: usize = 1 << 10;
const RAM_BANK_SIZE: usize = 1 << 9;
const RAM_BANKS: usize = 32;

const BANK_BITS: u16 = 6;
const BANK_MASK: u16 = (1 << BANK_BITS) - 1;
const LOWER_UPPER: u16 = 0x100;
const ROM_RAM: u16 = 0x200;
const BANK_UNDEFINED: u16 = 0x8000;

const HOTSPOT_RAM: u16 = 0x3E;
const HOTSPOT_ROM: u16 = 0x3F;

const HALVES: usize = 8;

#[derive(Debug, Clone)]
pub struct E3Plus {
    base: CartBase,
    bank_in_use: [u16; HALVES],
    rom_banks: u16,
}

impl E3Plus {
    pub fn new(image: &[u8], settings: &Settings) -> Result<Self, CoreError> {
        let size = image.len();
        if size == 0 || size % ROM_BANK_SIZE != 0 || size > 64 * ROM_BANK_SIZE {
            return Err(CoreError::ImageSize { scheme: "3E+", size });
        }
        Ok(Self {
            base: CartBase::new(image.to_vec(), RAM_BANKS * RAM_BANK_SIZE, settings),
            bank_in_use: [BANK_UNDEFINED; HALVES],
            rom_banks: (size / ROM_BANK_SIZE) as u16,
        })
    }

    /// Map ROM bank `value & 0x3F` into segment `value >> 6`.
    pub fn bank_rom(&mut self, system: &mut System, value: u8) -> bool {
        let bank = value as u16 & BANK_MASK;
        if self.base.locked || bank >= self.rom_banks {
            return false;
        }
        let half = ((value as u16 >> BANK_BITS) & 3) as usize * 2;
        self.bank_in_use[half] = bank;
        self.bank_in_use[half + 1] = bank | LOWER_UPPER;
        self.map_half(system, half);
        self.map_half(system, half + 1);
        log::trace!("3E+: ROM bank {bank} -> segment {}", half / 2);
        true
    }

    /// Map RAM bank `value & 0x3F` into segment `value >> 6`.
    pub fn bank_ram(&mut self, system: &mut System, value: u8) -> bool {
        let bank = value as u16 & BANK_MASK;
        if self.base.locked || bank as usize >= RAM_BANKS {
            return false;
        }
        let half = ((value as u16 >> BANK_BITS) & 3) as usize * 2;
        self.bank_in_use[half] = bank | ROM_RAM;
        self.bank_in_use[half + 1] = bank | ROM_RAM | LOWER_UPPER;
        self.map_half(system, half);
        self.map_half(system, half + 1);
        log::trace!("3E+: RAM bank {bank} -> segment {}", half / 2);
        true
    }

    fn map_half(&mut self, system: &mut System, half: usize) {
        let start = 0x1000 + (half as u16) * RAM_BANK_SIZE as u16;
        let end = start + RAM_BANK_SIZE as u16 - 1;
        let entry = self.bank_in_use[half];
        let bank = (entry & BANK_MASK) as usize;

        if entry == BANK_UNDEFINED {
            self.base.map_routed(system, start, end, None);
        } else if entry & ROM_RAM != 0 {
            let ram_offset = bank * RAM_BANK_SIZE;
            if entry & LOWER_UPPER != 0 {
                self.base.map_ram_write(system, start, end, ram_offset);
            } else {
                self.base.map_ram_read(system, start, end, ram_offset);
            }
        } else {
            let upper = if entry & LOWER_UPPER != 0 { RAM_BANK_SIZE } else { 0 };
            self.base.map_rom(system, start, end, bank * ROM_BANK_SIZE + upper);
        }
    }

    fn map_all(&mut self, system: &mut System) {
        for half in 0..HALVES {
            self.map_half(system, half);
        }
    }

    fn initialize_banks(&mut self, system: &mut System) {
        self.bank_in_use = [BANK_UNDEFINED; HALVES];
        self.map_all(system);
        let locked = std::mem::replace(&mut self.base.locked, false);
        self.bank_rom(system, 0);
        self.bank_rom(system, 3 << BANK_BITS);
        self.base.locked = locked;
    }
}

impl Mapper for E3Plus {
    fn scheme(&self) -> &'static str {
        "3E+"
    }

    fn base(&self) -> &CartBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CartBase {
        &mut self.base
    }

    fn install(&mut self, bus: &mut CartBus) {
        // Watch the hotspots; everything in this page is passed on to the TIA.
        self.base.map_routed(bus.system, 0x0000, 0x003F, None);
        self.initialize_banks(bus.system);
    }

    fn reset(&mut self, bus: &mut CartBus) {
        self.base.initialize_ram(bus.system);
        self.base.initialize_start_bank(bus.system, 0, 0);
        self.initialize_banks(bus.system);
    }

    fn peek(&mut self, bus: &mut CartBus, addr: u16) -> u8 {
        if addr & 0x1000 == 0 {
            return bus.tia.peek(bus.system, addr);
        }

        let offset = (addr & 0x0FFF) as usize;
        let entry = self.bank_in_use[offset >> 9];
        if entry == BANK_UNDEFINED {
            return bus.system.rng().next_byte();
        }

        let bank = (entry & BANK_MASK) as usize;
        if entry & ROM_RAM != 0 {
            let ram_offset = bank * RAM_BANK_SIZE + (offset & (RAM_BANK_SIZE - 1));
            if entry & LOWER_UPPER != 0 {
                return self.base.peek_ram(bus.system, ram_offset);
            }
            let storage = self.base.storage(bus.system);
            return bus.system.buffer(storage.ram)[ram_offset];
        }
        self.base
            .rom_byte(bus.system, bank * ROM_BANK_SIZE + (offset & (ROM_BANK_SIZE - 1)))
    }

    fn poke(&mut self, bus: &mut CartBus, addr: u16, value: u8) -> bool {
        if addr & 0x1000 == 0 {
            match addr & 0x3F {
                HOTSPOT_ROM => {
                    self.bank_rom(bus.system, value);
                }
                HOTSPOT_RAM => {
                    self.bank_ram(bus.system, value);
                }
                _ => {}
            }
            bus.tia.poke(bus.system, addr, value);
            return false;
        }

        let offset = (addr & 0x0FFF) as usize;
        let entry = self.bank_in_use[offset >> 9];
        if entry != BANK_UNDEFINED && entry & ROM_RAM != 0 && entry & LOWER_UPPER != 0 {
            let bank = (entry & BANK_MASK) as usize;
            let ram_offset = bank * RAM_BANK_SIZE + (offset & (RAM_BANK_SIZE - 1));
            self.base.poke_ram(bus.system, ram_offset, value);
            return true;
        }
        false
    }

    fn bank(&mut self, bus: &mut CartBus, bank: u16) -> bool {
        match u8::try_from(bank) {
            Ok(value) => self.bank_rom(bus.system, value),
            Err(_) => false,
        }
    }

    /// Bank number in bits 0-5, `0x200` set for RAM banks.
    fn current_bank(&self, addr: u16) -> u16 {
        let entry = self.bank_in_use[((addr & 0x0FFF) >> 9) as usize];
        if entry == BANK_UNDEFINED {
            entry
        } else {
            entry & (BANK_MASK | ROM_RAM)
        }
    }

    fn bank_count(&self) -> u16 {
        self.rom_banks
    }

    fn save_state(&self, out: &mut Serializer, system: &System) -> Result<(), StateError> {
        out.put_string(self.scheme());
        out.put_short_array(&self.bank_in_use);
        self.base.save_ram(out, system)
    }

    fn load_state(&mut self, input: &mut Serializer, bus: &mut CartBus) -> Result<(), StateError> {
        input.expect_tag(self.scheme())?;
        let mut banks = [0u16; HALVES];
        input.get_short_array(&mut banks)?;
        for &entry in &banks {
            let valid = entry == BANK_UNDEFINED
                || (entry & !(BANK_MASK | ROM_RAM | LOWER_UPPER) == 0
                    && if entry & ROM_RAM != 0 {
                        ((entry & BANK_MASK) as usize) < RAM_BANKS
                    } else {
                        entry & BANK_MASK < self.rom_banks
                    });
            if !valid {
                return Err(StateError::InvalidValue {
                    field: "3E+ bank slot",
                    value: entry as u64,
                });
            }
        }
        self.base.load_ram(input, bus.system)?;
        self.bank_in_use = banks;
        self.map_all(bus.system);
        Ok(())
    }
}
