//! Shared test utilities for building cartridge images and small test rigs.
//!
//! These helpers de-duplicate setup across the mapper, cartridge, bus and CPU
//! tests. They support just what the test suite needs.
//!
//! Layout of the 4K images produced by `build_4k_with_program`:
//! - program bytes at image offset 0 (CPU address 0x1000)
//! - RESET vector at offset 0xFFC, IRQ/BRK vector at 0xFFE
//! - everything else NOP (0xEA)
//!
//! A fixed seed keeps the "random" RAM contents reproducible.

#![allow(dead_code)]

use crate::bus::{Bus, System};
use crate::cartridge::Cartridge;
use crate::random::Random;
use crate::settings::Settings;
use crate::tia::Tia;

pub const TEST_SEED: u64 = 0x2600;

/// Settings with a fixed RNG seed.
pub fn test_settings() -> Settings {
    Settings {
        random_seed: Some(TEST_SEED),
        ..Settings::default()
    }
}

/// A `System` with the TIA installed and reset, ready for a mapper to be
/// installed on top.
pub fn cart_env() -> (System, Tia) {
    let settings = test_settings();
    let mut system = System::new(Random::new(settings.random_seed));
    let mut tia = Tia::new(&settings);
    tia.install(&mut system);
    tia.reset(&mut system);
    (system, tia)
}

/// Image of `banks` banks of `bank_size` bytes where every byte holds its
/// bank index.
pub fn banked_image(banks: usize, bank_size: usize) -> Vec<u8> {
    (0..banks)
        .flat_map(|bank| std::iter::repeat(bank as u8).take(bank_size))
        .collect()
}

/// 4K image with `program` at 0x1000 and the vectors set.
///
/// - `reset`: RESET vector (defaults to 0x1000)
/// - `irq`: IRQ/BRK vector (defaults to 0x1000)
pub fn build_4k_with_program(program: &[u8], reset: Option<u16>, irq: Option<u16>) -> Vec<u8> {
    assert!(program.len() <= 0xFFA, "program must leave room for the vectors");

    let mut image = vec![0xEA; 4096];
    image[..program.len()].copy_from_slice(program);
    set_vectors(&mut image, reset.unwrap_or(0x1000), irq.unwrap_or(0x1000));
    image
}

/// Write NMI, RESET and IRQ vectors into the last six bytes of a 4K bank.
pub fn set_vectors(bank: &mut [u8], reset: u16, irq: u16) {
    assert_eq!(bank.len(), 4096, "vectors are placed at the end of a 4K bank");
    write_le_u16(bank, 0xFFA, reset);
    write_le_u16(bank, 0xFFC, reset);
    write_le_u16(bank, 0xFFE, irq);
}

#[inline]
fn write_le_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset] = (value & 0x00FF) as u8;
    buf[offset + 1] = (value >> 8) as u8;
}

/// A powered-on bus with a 4K cartridge holding `program`.
pub fn bus_with_program(program: &[u8]) -> Bus {
    let settings = test_settings();
    let image = build_4k_with_program(program, None, None);
    let cart = Cartridge::new(&image, None, &settings).expect("4K test cartridge");
    let mut bus = Bus::new(&settings);
    bus.attach_cartridge(cart);
    bus.reset();
    bus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banked_image_marks_banks() {
        let image = banked_image(3, 16);
        assert_eq!(image.len(), 48);
        assert_eq!(image[0], 0);
        assert_eq!(image[16], 1);
        assert_eq!(image[47], 2);
    }

    #[test]
    fn program_image_has_vectors() {
        let image = build_4k_with_program(&[0xA9, 0x01], Some(0x1234), Some(0x1F00));
        assert_eq!(&image[..3], &[0xA9, 0x01, 0xEA]);
        assert_eq!(image[0xFFC], 0x34);
        assert_eq!(image[0xFFD], 0x12);
        assert_eq!(image[0xFFE], 0x00);
        assert_eq!(image[0xFFF], 0x1F);
    }

    #[test]
    fn bus_with_program_maps_cartridge() {
        let bus = bus_with_program(&[0xA2, 0x7F]);
        assert_eq!(bus.peek_debug(0x1000), 0xA2);
        assert_eq!(bus.peek_debug(0xF001), 0x7F);
    }
}
