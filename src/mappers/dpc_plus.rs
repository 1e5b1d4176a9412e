/*
DPC+ (Harmony/Melody) bank switching with ARM co-processor.

Layout:
- 32K image: 3K ARM driver, 24K program (six 4K banks at $0C00), 4K display
  data, 1K frequency table. Shorter images are placed at the end of the 32K
  buffer.
- 8K RAM: the driver area, display RAM at $0C00 (4K), frequency RAM after it.
  Display and frequency RAM are loaded from the image on reset.

Registers ($1000-$107F, every cartridge page is routed):
- Reads $00-$27: random number, data fetchers (plain, windowed, fractional),
  window flags and the music amplitude.
- Writes $28-$7F: fetcher pointers, windows and increments, fast fetch,
  CALLFUNCTION parameters, waveforms, notes, random number writes, push and
  write into display RAM.

Hotspots $1FF6-$1FFB select banks 0-5; start bank 5.

Fast fetch: with fast fetch on, the operand of an `LDA #imm` whose value is
below $28 is treated as a register read.
*/

use crate::bus::{EmulationFault, System};
use crate::error::{CoreError, StateError};
use crate::mapper::{CartBase, CartBus, Mapper};
use crate::serializer::Serializer;
use crate::settings::Settings;

use super::thumbulator::Thumbulator;

const IMAGE_SIZE: usize = 32 * 1024;
const MIN_IMAGE_SIZE: usize = 4 * 1024;
const PROGRAM: usize = 0x0C00;
const BANK_SIZE: usize = 0x1000;
const BANKS: u16 = 6;
const START_BANK: u16 = 5;

const RAM_SIZE: usize = 8 * 1024;
const DISPLAY: usize = 0x0C00;
const FREQUENCY: usize = DISPLAY + 0x1000;
/// Display data and frequency table as stored in the program area.
const DISPLAY_IMAGE: usize = 0x6000;
const DISPLAY_IMAGE_LEN: usize = 0x1400;

const RANDOM_RESET: u32 = 0x2B43_5044;
const RANDOM_TAP: u32 = 0x10AD_AB1E;

const FRACTIONAL_LOW_MASK: u32 = 0x0F_00FF;
/// One known driver expects DFxFRACLOW to clear the low byte as well.
const FRACTIONAL_LOW_MASK_LEGACY: u32 = 0x0F_0000;
const LEGACY_DRIVER_MD5: &str = "8dd73b44fd11c488326ce507cbeb19d1";

const MUSIC_CLOCK: f64 = 20_000.0;
const CPU_CLOCK: f64 = 1_193_191.666_666_67;

pub(crate) fn clock_random(r: u32) -> u32 {
    (if r & (1 << 10) != 0 { RANDOM_TAP } else { 0 }) ^ ((r >> 11) | (r << 21))
}

pub(crate) fn prior_random(r: u32) -> u32 {
    if r & (1 << 31) != 0 {
        let x = RANDOM_TAP ^ r;
        (x << 11) | (x >> 21)
    } else {
        (r << 11) | (r >> 21)
    }
}

#[derive(Debug, Clone)]
pub struct DpcPlus {
    base: CartBase,
    image: Vec<u8>,
    ram: Vec<u8>,
    bank_offset: usize,

    tops: [u8; 8],
    bottoms: [u8; 8],
    counters: [u16; 8],
    fractional_counters: [u32; 8],
    fractional_increments: [u8; 8],
    fractional_low_mask: u32,

    fast_fetch: bool,
    lda_immediate: bool,

    parameters: [u8; 8],
    parameter_pointer: usize,

    music_counters: [u32; 3],
    music_frequencies: [u32; 3],
    music_waveforms: [u16; 3],

    random: u32,
    audio_cycles: u64,
    fractional_clocks: f64,
    arm_cycles: u64,

    thumb: Thumbulator,
    trap_fatal: bool,
}

impl DpcPlus {
    pub fn new(image: &[u8], settings: &Settings) -> Result<Self, CoreError> {
        let size = image.len();
        if !(MIN_IMAGE_SIZE..=IMAGE_SIZE).contains(&size) {
            return Err(CoreError::ImageSize {
                scheme: "DPC+",
                size,
            });
        }

        let mut full = vec![0u8; IMAGE_SIZE];
        full[IMAGE_SIZE - size..].copy_from_slice(image);

        let driver_hash = format!("{:x}", md5::compute(&image[..3 * 1024]));
        let fractional_low_mask = if driver_hash == LEGACY_DRIVER_MD5 {
            FRACTIONAL_LOW_MASK_LEGACY
        } else {
            FRACTIONAL_LOW_MASK
        };

        let mut cart = Self {
            base: CartBase::new(full.clone(), 0, settings),
            image: full,
            ram: vec![0; RAM_SIZE],
            bank_offset: START_BANK as usize * BANK_SIZE,
            tops: [0; 8],
            bottoms: [0; 8],
            counters: [0; 8],
            fractional_counters: [0; 8],
            fractional_increments: [0; 8],
            fractional_low_mask,
            fast_fetch: false,
            lda_immediate: false,
            parameters: [0; 8],
            parameter_pointer: 0,
            music_counters: [0; 3],
            music_frequencies: [0; 3],
            music_waveforms: [0; 3],
            random: RANDOM_RESET,
            audio_cycles: 0,
            fractional_clocks: 0.0,
            arm_cycles: 0,
            thumb: Thumbulator::new(),
            trap_fatal: settings.thumb_trap_fatal,
        };
        cart.set_initial_state();
        Ok(cart)
    }

    fn set_initial_state(&mut self) {
        self.ram.fill(0);
        let src = PROGRAM + DISPLAY_IMAGE;
        self.ram[DISPLAY..DISPLAY + DISPLAY_IMAGE_LEN]
            .copy_from_slice(&self.image[src..src + DISPLAY_IMAGE_LEN]);

        self.tops = [0; 8];
        self.bottoms = [0; 8];
        self.counters = [0; 8];
        self.fractional_counters = [0; 8];
        self.fractional_increments = [0; 8];
        self.music_waveforms = [0; 3];
        self.random = RANDOM_RESET;
        self.fast_fetch = false;
        self.lda_immediate = false;
        self.audio_cycles = 0;
        self.arm_cycles = 0;
        self.fractional_clocks = 0.0;
    }

    #[inline]
    fn program(&self, offset: usize) -> u8 {
        self.image.get(PROGRAM + offset).copied().unwrap_or(0)
    }

    #[inline]
    fn display(&self, offset: usize) -> u8 {
        self.ram.get(DISPLAY + offset).copied().unwrap_or(0)
    }

    #[inline]
    fn set_display(&mut self, offset: usize, value: u8) {
        if let Some(slot) = self.ram.get_mut(DISPLAY + offset) {
            *slot = value;
        }
    }

    fn map_bank(&mut self, system: &mut System) {
        let code = PROGRAM + self.bank_offset + 0x080;
        self.base.map_routed(system, 0x1080, 0x1FFF, Some(code));
    }

    fn switch(&mut self, system: &mut System, bank: u16) -> bool {
        if self.base.locked || bank >= BANKS {
            return false;
        }
        self.bank_offset = bank as usize * BANK_SIZE;
        self.map_bank(system);
        true
    }

    fn check_switch(&mut self, system: &mut System, offset: u16) {
        if (0x0FF6..=0x0FFB).contains(&offset) {
            self.switch(system, offset - 0x0FF6);
        }
    }

    /// Window flag of data fetcher `index`.
    fn flag(&self, index: usize) -> u8 {
        let top = self.tops[index];
        let inside = top.wrapping_sub(self.counters[index] as u8) > top.wrapping_sub(self.bottoms[index]);
        if inside { 0xFF } else { 0x00 }
    }

    fn update_music(&mut self, system: &System) {
        let cycles = system.cycles().wrapping_sub(self.audio_cycles) as u32;
        self.audio_cycles = system.cycles();

        let clocks = MUSIC_CLOCK * cycles as f64 / CPU_CLOCK + self.fractional_clocks;
        let whole = clocks as u32;
        self.fractional_clocks = clocks - whole as f64;

        if whole > 0 {
            for (counter, &freq) in self.music_counters.iter_mut().zip(&self.music_frequencies) {
                *counter = counter.wrapping_add(freq.wrapping_mul(whole));
            }
        }
    }

    fn amplitude(&self) -> u8 {
        (0..3)
            .map(|v| {
                let index = ((self.music_waveforms[v] as usize) << 5)
                    + (self.music_counters[v] >> 27) as usize;
                self.display(index) as u32
            })
            .sum::<u32>() as u8
    }

    fn read_register(&mut self, system: &System, addr: u16) -> u8 {
        let index = (addr & 0x07) as usize;
        let flag = self.flag(index);

        match (addr >> 3) & 0x07 {
            0 => match index {
                0 => {
                    self.random = clock_random(self.random);
                    self.random as u8
                }
                1 => {
                    self.random = prior_random(self.random);
                    self.random as u8
                }
                2 => (self.random >> 8) as u8,
                3 => (self.random >> 16) as u8,
                4 => (self.random >> 24) as u8,
                5 => {
                    self.update_music(system);
                    self.amplitude()
                }
                _ => 0,
            },
            1 => {
                let value = self.display(self.counters[index] as usize);
                self.counters[index] = (self.counters[index] + 1) & 0x0FFF;
                value
            }
            2 => {
                let value = self.display(self.counters[index] as usize) & flag;
                self.counters[index] = (self.counters[index] + 1) & 0x0FFF;
                value
            }
            3 => {
                let value = self.display((self.fractional_counters[index] >> 8) as usize);
                self.fractional_counters[index] = (self.fractional_counters[index]
                    + self.fractional_increments[index] as u32)
                    & 0x0F_FFFF;
                value
            }
            4 if index < 4 => flag,
            _ => 0,
        }
    }

    fn write_register(&mut self, system: &mut System, addr: u16, value: u8) {
        let index = (addr & 0x07) as usize;
        let v = value as u32;

        match ((addr - 0x28) >> 3) & 0x0F {
            0x0 => {
                self.fractional_counters[index] =
                    (self.fractional_counters[index] & self.fractional_low_mask) | (v << 8);
            }
            0x1 => {
                self.fractional_counters[index] =
                    ((v & 0x0F) << 16) | (self.fractional_counters[index] & 0x00_FFFF);
            }
            0x2 => {
                self.fractional_increments[index] = value;
                self.fractional_counters[index] &= 0x0F_FF00;
            }
            0x3 => self.tops[index] = value,
            0x4 => self.bottoms[index] = value,
            0x5 => self.counters[index] = (self.counters[index] & 0x0F00) | value as u16,
            0x6 => match index {
                0 => self.fast_fetch = value == 0,
                1 => {
                    if self.parameter_pointer < self.parameters.len() {
                        self.parameters[self.parameter_pointer] = value;
                        self.parameter_pointer += 1;
                    }
                }
                2 => self.call_function(system, value),
                5..=7 => self.music_waveforms[index - 5] = (value & 0x7F) as u16,
                _ => {}
            },
            0x7 => {
                self.counters[index] = self.counters[index].wrapping_sub(1) & 0x0FFF;
                self.set_display(self.counters[index] as usize, value);
            }
            0x8 => {
                self.counters[index] = ((value as u16 & 0x0F) << 8) | (self.counters[index] & 0x00FF);
            }
            0x9 => match index {
                0 => self.random = RANDOM_RESET,
                1..=4 => {
                    let shift = 8 * (index - 1);
                    self.random = (self.random & !(0xFF << shift)) | (v << shift);
                }
                _ => {
                    let at = FREQUENCY + ((value as usize) << 2);
                    let bytes = [self.ram[at], self.ram[at + 1], self.ram[at + 2], self.ram[at + 3]];
                    self.music_frequencies[index - 5] = u32::from_le_bytes(bytes);
                }
            },
            0xA => {
                self.set_display(self.counters[index] as usize, value);
                self.counters[index] = (self.counters[index] + 1) & 0x0FFF;
            }
            _ => {}
        }
    }

    fn call_function(&mut self, system: &mut System, value: u8) {
        let [p0, p1, p2, p3, ..] = self.parameters;
        match value {
            0 => self.parameter_pointer = 0,
            1 => {
                let source = ((p1 as usize) << 8) + p0 as usize;
                let target = self.counters[(p2 & 0x07) as usize] as usize;
                for i in 0..p3 as usize {
                    let byte = self.program(source + i);
                    self.set_display(target + i, byte);
                }
                self.parameter_pointer = 0;
            }
            2 => {
                let target = self.counters[(p2 & 0x07) as usize] as usize;
                for i in 0..p3 as usize {
                    self.set_display(target + i, p0);
                }
                self.parameter_pointer = 0;
            }
            254 | 255 => {
                let now = system.cycles();
                let cycles = now.wrapping_sub(self.arm_cycles);
                self.arm_cycles = now;

                if let Err(e) = self.thumb.run(&self.image, &mut self.ram, cycles) {
                    let message = format!("DPC+ ARM: {e}");
                    log::warn!("{message}");
                    system.raise_fault(if self.trap_fatal {
                        EmulationFault::Fatal(message)
                    } else {
                        EmulationFault::Warning(message)
                    });
                }
            }
            _ => {}
        }
    }
}

impl Mapper for DpcPlus {
    fn scheme(&self) -> &'static str {
        "DPC+"
    }

    fn base(&self) -> &CartBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CartBase {
        &mut self.base
    }

    fn install(&mut self, bus: &mut CartBus) {
        self.base.map_routed(bus.system, 0x1000, 0x107F, None);
        self.switch(bus.system, START_BANK);
    }

    fn reset(&mut self, bus: &mut CartBus) {
        self.set_initial_state();
        let start = self.base.initialize_start_bank(bus.system, START_BANK, BANKS);
        self.switch(bus.system, start);
    }

    fn peek(&mut self, bus: &mut CartBus, addr: u16) -> u8 {
        let mut offset = addr & 0x0FFF;
        let value = self.program(self.bank_offset + offset as usize);

        if self.base.locked {
            return value;
        }

        if self.fast_fetch && self.lda_immediate && value < 0x28 {
            offset = value as u16;
        }
        self.lda_immediate = false;

        if offset < 0x28 {
            return self.read_register(bus.system, offset);
        }

        self.check_switch(bus.system, offset);
        if self.fast_fetch {
            self.lda_immediate = value == 0xA9;
        }
        value
    }

    fn poke(&mut self, bus: &mut CartBus, addr: u16, value: u8) -> bool {
        let offset = addr & 0x0FFF;
        if (0x28..0x80).contains(&offset) {
            self.write_register(bus.system, offset, value);
        } else {
            self.check_switch(bus.system, offset);
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

    fn patch(&mut self, _system: &mut System, addr: u16, value: u8) -> bool {
        let offset = (addr & 0x0FFF) as usize;
        if offset < 0x80 {
            return false;
        }
        match self.image.get_mut(PROGRAM + self.bank_offset + offset) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn save_state(&self, out: &mut Serializer, _system: &System) -> Result<(), StateError> {
        out.put_string(self.scheme());
        out.put_short(self.bank_offset as u16);
        out.put_byte_array(&self.ram);
        out.put_byte_array(&self.tops);
        out.put_byte_array(&self.bottoms);
        out.put_short_array(&self.counters);
        out.put_int_array(&self.fractional_counters);
        out.put_byte_array(&self.fractional_increments);
        out.put_bool(self.fast_fetch);
        out.put_bool(self.lda_immediate);
        out.put_byte_array(&self.parameters);
        out.put_byte(self.parameter_pointer as u8);
        out.put_int_array(&self.music_counters);
        out.put_int_array(&self.music_frequencies);
        out.put_short_array(&self.music_waveforms);
        out.put_int(self.random);
        out.put_long(self.audio_cycles);
        out.put_double(self.fractional_clocks);
        out.put_long(self.arm_cycles);
        Ok(())
    }

    fn load_state(&mut self, input: &mut Serializer, bus: &mut CartBus) -> Result<(), StateError> {
        input.expect_tag(self.scheme())?;
        let bank_offset = input.get_short()? as usize;
        if bank_offset % BANK_SIZE != 0 || bank_offset >= BANKS as usize * BANK_SIZE {
            return Err(StateError::InvalidValue {
                field: "DPC+ bank offset",
                value: bank_offset as u64,
            });
        }

        let mut ram = vec![0u8; RAM_SIZE];
        input.get_byte_array(&mut ram)?;
        let mut tops = [0u8; 8];
        input.get_byte_array(&mut tops)?;
        let mut bottoms = [0u8; 8];
        input.get_byte_array(&mut bottoms)?;
        let mut counters = [0u16; 8];
        input.get_short_array(&mut counters)?;
        let mut fractional_counters = [0u32; 8];
        input.get_int_array(&mut fractional_counters)?;
        let mut fractional_increments = [0u8; 8];
        input.get_byte_array(&mut fractional_increments)?;
        let fast_fetch = input.get_bool()?;
        let lda_immediate = input.get_bool()?;
        let mut parameters = [0u8; 8];
        input.get_byte_array(&mut parameters)?;
        let parameter_pointer = input.get_byte()? as usize;
        let mut music_counters = [0u32; 3];
        input.get_int_array(&mut music_counters)?;
        let mut music_frequencies = [0u32; 3];
        input.get_int_array(&mut music_frequencies)?;
        let mut music_waveforms = [0u16; 3];
        input.get_short_array(&mut music_waveforms)?;
        let random = input.get_int()?;
        let audio_cycles = input.get_long()?;
        let fractional_clocks = input.get_double()?;
        let arm_cycles = input.get_long()?;

        self.ram = ram;
        self.tops = tops;
        self.bottoms = bottoms;
        self.counters = counters.map(|c| c & 0x0FFF);
        self.fractional_counters = fractional_counters.map(|c| c & 0x0F_FFFF);
        self.fractional_increments = fractional_increments;
        self.fast_fetch = fast_fetch;
        self.lda_immediate = lda_immediate;
        self.parameters = parameters;
        self.parameter_pointer = parameter_pointer.min(parameters.len());
        self.music_counters = music_counters;
        self.music_frequencies = music_frequencies;
        self.music_waveforms = music_waveforms.map(|w| w & 0x7F);
        self.random = random;
        self.audio_cycles = audio_cycles;
        self.fractional_clocks = fractional_clocks;
        self.arm_cycles = arm_cycles;

        self.bank_offset = bank_offset;
        self.map_bank(bus.system);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tia::Tia;
    use crate::test_utils::cart_env;
    use proptest::prelude::*;

    const DF0DATA: u16 = 0x1008;
    const DF0FRACDATA: u16 = 0x1018;
    const DF0FRACLOW: u16 = 0x1028;
    const DF0FRACINC: u16 = 0x1038;
    const DF0LOW: u16 = 0x1050;
    const FASTFETCH: u16 = 0x1058;
    const PARAMETER: u16 = 0x1059;
    const CALLFUNCTION: u16 = 0x105A;
    const DF0PUSH: u16 = 0x1060;
    const NOTE0: u16 = 0x1075;
    const DF0WRITE: u16 = 0x1078;

    /// 32K image; `patch` receives (image offset, bytes).
    fn image(patches: &[(usize, &[u8])]) -> Vec<u8> {
        let mut image = vec![0u8; IMAGE_SIZE];
        for &(at, bytes) in patches {
            image[at..at + bytes.len()].copy_from_slice(bytes);
        }
        image
    }

    fn setup_with(image: &[u8], settings: &Settings) -> (System, Tia, DpcPlus) {
        let mut cart = DpcPlus::new(image, settings).expect("DPC+ image");
        let (mut system, mut tia) = cart_env();
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.install(&mut bus);
        cart.reset(&mut bus);
        (system, tia, cart)
    }

    fn setup(image: &[u8]) -> (System, Tia, DpcPlus) {
        setup_with(image, &Settings::default())
    }

    #[test]
    fn random_register_steps_forward_and_back() {
        let (mut system, mut tia, mut cart) = setup(&image(&[]));
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        assert_eq!(cart.peek(&mut bus, 0x1004), 0x2B);
        let next = cart.peek(&mut bus, 0x1000);
        assert_eq!(next, clock_random(RANDOM_RESET) as u8);
        assert_eq!(cart.peek(&mut bus, 0x1001), RANDOM_RESET as u8);
        assert_eq!(prior_random(clock_random(0xDEAD_BEEF)), 0xDEAD_BEEF);
    }

    proptest! {
        #[test]
        fn random_steps_back_to_any_seed(seed in 1u32..=u32::MAX, steps in 1usize..64) {
            let mut r = seed;
            for _ in 0..steps {
                r = clock_random(r);
            }
            for _ in 0..steps {
                r = prior_random(r);
            }
            prop_assert_eq!(r, seed);
        }
    }

    #[test]
    fn starts_in_bank_five_and_switches() {
        let (mut system, mut tia, mut cart) = setup(&image(&[]));
        assert_eq!(cart.current_bank(0x1000), 5);
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1FF7);
        assert_eq!(cart.current_bank(0x1000), 1);
        cart.poke(&mut bus, 0x1FFA, 0);
        assert_eq!(cart.current_bank(0x1000), 4);
    }

    #[test]
    fn write_then_read_through_fetcher() {
        let (mut system, mut tia, mut cart) = setup(&image(&[]));
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.poke(&mut bus, DF0LOW, 0x10);
        cart.poke(&mut bus, DF0WRITE, 0xAA);
        cart.poke(&mut bus, DF0WRITE, 0xBB);
        cart.poke(&mut bus, DF0LOW, 0x10);
        assert_eq!(cart.peek(&mut bus, DF0DATA), 0xAA);
        assert_eq!(cart.peek(&mut bus, DF0DATA), 0xBB);

        cart.poke(&mut bus, DF0PUSH, 0xCC);
        assert_eq!(cart.peek(&mut bus, DF0DATA), 0xCC);
    }

    #[test]
    fn windowed_read_masks_with_flag() {
        let (mut system, mut tia, mut cart) = setup(&image(&[]));
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.poke(&mut bus, DF0LOW, 0x00);
        cart.poke(&mut bus, DF0WRITE, 0x55);
        cart.poke(&mut bus, DF0LOW, 0x08);
        cart.poke(&mut bus, DF0WRITE, 0x66);
        // top 0x10, bottom 0x05
        cart.poke(&mut bus, 0x1040, 0x10);
        cart.poke(&mut bus, 0x1048, 0x05);

        cart.poke(&mut bus, DF0LOW, 0x00);
        assert_eq!(cart.peek(&mut bus, 0x1020), 0xFF);
        assert_eq!(cart.peek(&mut bus, 0x1010), 0x55);

        cart.poke(&mut bus, DF0LOW, 0x08);
        assert_eq!(cart.peek(&mut bus, 0x1020), 0x00);
        assert_eq!(cart.peek(&mut bus, 0x1010), 0x00);
    }

    #[test]
    fn fractional_fetcher_advances_by_increment() {
        let mut display = [0u8; 0x30];
        display[0x20] = 0x11;
        display[0x21] = 0x22;
        let (mut system, mut tia, mut cart) =
            setup(&image(&[(PROGRAM + DISPLAY_IMAGE, &display)]));
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.poke(&mut bus, DF0FRACINC, 0x80);
        cart.poke(&mut bus, DF0FRACLOW, 0x20);
        assert_eq!(cart.peek(&mut bus, DF0FRACDATA), 0x11);
        assert_eq!(cart.peek(&mut bus, DF0FRACDATA), 0x11);
        assert_eq!(cart.peek(&mut bus, DF0FRACDATA), 0x22);
    }

    #[test]
    fn fast_fetch_turns_lda_operand_into_register_read() {
        // Bank 5 offset 0x100: LDA #<DF0DATA
        let program = PROGRAM + 5 * BANK_SIZE + 0x100;
        let (mut system, mut tia, mut cart) = setup(&image(&[(program, &[0xA9, 0x08])]));
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.poke(&mut bus, DF0LOW, 0x00);
        cart.poke(&mut bus, DF0WRITE, 0x77);
        cart.poke(&mut bus, DF0LOW, 0x00);

        cart.poke(&mut bus, FASTFETCH, 0);
        assert_eq!(cart.peek(&mut bus, 0x1100), 0xA9);
        assert_eq!(cart.peek(&mut bus, 0x1101), 0x77);

        cart.poke(&mut bus, FASTFETCH, 1);
        assert_eq!(cart.peek(&mut bus, 0x1100), 0xA9);
        assert_eq!(cart.peek(&mut bus, 0x1101), 0x08);
    }

    #[test]
    fn call_function_fills_and_copies() {
        let rom_data = [1u8, 2, 3];
        let (mut system, mut tia, mut cart) = setup(&image(&[(PROGRAM + 0x0200, &rom_data)]));
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.poke(&mut bus, DF0LOW, 0x40);
        for p in [0x5A, 0x00, 0x00, 0x04] {
            cart.poke(&mut bus, PARAMETER, p);
        }
        cart.poke(&mut bus, CALLFUNCTION, 2);
        let filled: Vec<u8> = (0..5).map(|_| cart.peek(&mut bus, DF0DATA)).collect();
        assert_eq!(filled, vec![0x5A, 0x5A, 0x5A, 0x5A, 0x00]);

        cart.poke(&mut bus, DF0LOW, 0x80);
        for p in [0x00, 0x02, 0x00, 0x03] {
            cart.poke(&mut bus, PARAMETER, p);
        }
        cart.poke(&mut bus, CALLFUNCTION, 1);
        cart.poke(&mut bus, DF0LOW, 0x80);
        let copied: Vec<u8> = (0..3).map(|_| cart.peek(&mut bus, DF0DATA)).collect();
        assert_eq!(copied, rom_data.to_vec());
    }

    #[test]
    fn amplitude_sums_waveform_samples() {
        let mut tables = vec![0u8; DISPLAY_IMAGE_LEN];
        tables[0] = 5;
        // Frequency entry 1 = 0x0800_0000: one waveform step per music clock.
        tables[0x1000 + 4..0x1000 + 8].copy_from_slice(&0x0800_0000u32.to_le_bytes());
        tables[1] = 9;
        let (mut system, mut tia, mut cart) =
            setup(&image(&[(PROGRAM + DISPLAY_IMAGE, &tables)]));
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        assert_eq!(cart.peek(&mut bus, 0x1005), 15);

        cart.poke(&mut bus, NOTE0, 1);
        // 60 cycles are one music clock (20 kHz against the CPU clock).
        bus.system.increment_cycles(60);
        assert_eq!(cart.peek(&mut bus, 0x1005), 9 + 5 + 5);
    }

    #[test]
    fn arm_driver_writes_display_ram() {
        // MOVS r0,#0x42; LDR r1,[pc,#4]; STRB r0,[r1]; BX LR; .word 0x40000C00
        let code = [0x42, 0x20, 0x01, 0x49, 0x08, 0x70, 0x70, 0x47, 0x00, 0x0C, 0x00, 0x40];
        let (mut system, mut tia, mut cart) = setup(&image(&[(0xC08, &code)]));
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.poke(&mut bus, CALLFUNCTION, 255);
        assert_eq!(system.take_fault(), None);

        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.poke(&mut bus, DF0LOW, 0x00);
        assert_eq!(cart.peek(&mut bus, DF0DATA), 0x42);
    }

    #[test]
    fn arm_fault_severity_follows_settings() {
        let bad = image(&[(0xC08, &[0x00, 0xDE])]);
        let (mut system, mut tia, mut cart) = setup(&bad);
        cart.poke(
            &mut CartBus {
                system: &mut system,
                tia: &mut tia,
            },
            CALLFUNCTION,
            255,
        );
        assert!(matches!(system.take_fault(), Some(EmulationFault::Fatal(_))));

        let settings = Settings {
            thumb_trap_fatal: false,
            ..Settings::default()
        };
        let (mut system, mut tia, mut cart) = setup_with(&bad, &settings);
        cart.poke(
            &mut CartBus {
                system: &mut system,
                tia: &mut tia,
            },
            CALLFUNCTION,
            254,
        );
        assert!(matches!(system.take_fault(), Some(EmulationFault::Warning(_))));
    }

    #[test]
    fn locked_peek_has_no_side_effects() {
        let (mut system, mut tia, mut cart) = setup(&image(&[]));
        cart.base_mut().locked = true;
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1000);
        cart.peek(&mut bus, 0x1FF6);
        cart.base_mut().locked = false;
        assert_eq!(cart.current_bank(0x1000), 5);
        assert_eq!(cart.peek(&mut bus, 0x1004), 0x2B);
    }

    #[test]
    fn state_round_trip_keeps_fractional_clock_bits() {
        let (mut system, mut tia, mut cart) = setup(&image(&[]));
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.peek(&mut bus, 0x1FF8);
        cart.poke(&mut bus, DF0LOW, 0x33);
        bus.system.increment_cycles(7);
        cart.peek(&mut bus, 0x1005);
        let fraction = cart.fractional_clocks;

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
        assert_eq!(cart.current_bank(0x1000), 2);
        assert_eq!(cart.counters[0], 0x33);
        assert_eq!(cart.fractional_clocks.to_bits(), fraction.to_bits());
    }

    #[test]
    fn short_images_are_rejected() {
        assert!(matches!(
            DpcPlus::new(&[0; 1024], &Settings::default()),
            Err(CoreError::ImageSize { scheme: "DPC+", .. })
        ));
    }
}
