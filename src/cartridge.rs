/*!
Cartridge: ROM image ingestion, scheme detection and the `Mapper` wrapper.

Features:
- Pick a bank-switching scheme from an explicit `SchemeKind` or detect it
  from the image size and signature bytes.
- Keep the content hash (md5, hex) and the image size for front ends.
- Bank lock for debugger views.
- Persistence boundary: `save`/`load` return `bool`, log failures and leave
  the stream (save) or the cartridge (load) as they were.

Detection order:
- empty image: `CoreError::EmptyImage`
- up to 2K: "2K"; exactly 4K: "4K"
- "DPC+" marker present at least twice: DPC+
- "TJ3E" marker: 3E+
- 8K/12K/16K with an M-Network hotspot access pattern: E7
- 256K: BFSC
- anything else: `CoreError::UnknownScheme`
*/

use std::fmt;
use std::str::FromStr;

use crate::bus::System;
use crate::error::{CoreError, StateError};
use crate::mapper::{CartBus, Mapper};
use crate::mappers::{Bfsc, DpcPlus, E3Plus, E7, Rom4K};
use crate::serializer::Serializer;
use crate::settings::Settings;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SchemeKind {
    Rom2K,
    Rom4K,
    E3Plus,
    E7,
    Bfsc,
    DpcPlus,
}

impl SchemeKind {
    pub const ALL: [SchemeKind; 6] = [
        SchemeKind::Rom2K,
        SchemeKind::Rom4K,
        SchemeKind::E3Plus,
        SchemeKind::E7,
        SchemeKind::Bfsc,
        SchemeKind::DpcPlus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SchemeKind::Rom2K => "2K",
            SchemeKind::Rom4K => "4K",
            SchemeKind::E3Plus => "3E+",
            SchemeKind::E7 => "E7",
            SchemeKind::Bfsc => "BFSC",
            SchemeKind::DpcPlus => "DPC+",
        }
    }

    /// Guess the scheme of `image`.
    pub fn detect(image: &[u8]) -> Result<Self, CoreError> {
        let size = image.len();
        if size == 0 {
            return Err(CoreError::EmptyImage);
        }
        if size <= 2048 {
            return Ok(SchemeKind::Rom2K);
        }
        if size == 4096 {
            return Ok(SchemeKind::Rom4K);
        }
        if count_occurrences(image, b"DPC+") >= 2 {
            return Ok(SchemeKind::DpcPlus);
        }
        if count_occurrences(image, b"TJ3E") >= 1 {
            return Ok(SchemeKind::E3Plus);
        }
        if matches!(size, 0x2000 | 0x3000 | 0x4000) && is_probably_e7(image) {
            return Ok(SchemeKind::E7);
        }
        if size == 256 * 1024 {
            return Ok(SchemeKind::Bfsc);
        }
        Err(CoreError::UnknownScheme(format!("{size} byte image")))
    }
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchemeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SchemeKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::UnknownScheme(wanted.to_string()))
    }
}

fn count_occurrences(image: &[u8], pattern: &[u8]) -> usize {
    image.windows(pattern.len()).filter(|w| *w == pattern).count()
}

/// Instructions that touch the M-Network hotspots (LDA/STA/NOP abs).
const E7_SIGNATURES: [[u8; 3]; 7] = [
    [0xAD, 0xE2, 0xFF],
    [0xAD, 0xE5, 0xFF],
    [0xAD, 0xE5, 0x1F],
    [0xAD, 0xE7, 0x1F],
    [0x0C, 0xE7, 0x1F],
    [0x8D, 0xE7, 0xFF],
    [0x8D, 0xE7, 0x1F],
];

fn is_probably_e7(image: &[u8]) -> bool {
    E7_SIGNATURES
        .iter()
        .any(|sig| count_occurrences(image, sig) >= 1)
}

pub struct Cartridge {
    mapper: Box<dyn Mapper>,
    kind: SchemeKind,
    md5: String,
    size: usize,
}

impl fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cartridge")
            .field("kind", &self.kind)
            .field("md5", &self.md5)
            .field("size", &self.size)
            .field("bank_count", &self.mapper.bank_count())
            .finish()
    }
}

impl Cartridge {
    // -------------- Construction --------------

    /// Build a cartridge, detecting the scheme from the image.
    ///
    /// `md5` is the caller's content hash; it is computed when absent.
    pub fn new(image: &[u8], md5: Option<&str>, settings: &Settings) -> Result<Self, CoreError> {
        let kind = SchemeKind::detect(image)?;
        Self::with_scheme(image, md5, kind, settings)
    }

    /// Build a cartridge with an explicit scheme.
    pub fn with_scheme(
        image: &[u8],
        md5: Option<&str>,
        kind: SchemeKind,
        settings: &Settings,
    ) -> Result<Self, CoreError> {
        if image.is_empty() {
            return Err(CoreError::EmptyImage);
        }

        let mapper: Box<dyn Mapper> = match kind {
            SchemeKind::Rom2K => Box::new(Rom4K::new_2k(image, settings)?),
            SchemeKind::Rom4K => Box::new(Rom4K::new_4k(image, settings)?),
            SchemeKind::E3Plus => Box::new(E3Plus::new(image, settings)?),
            SchemeKind::E7 => Box::new(E7::new(image, settings)?),
            SchemeKind::Bfsc => Box::new(Bfsc::new(image, settings)?),
            SchemeKind::DpcPlus => Box::new(DpcPlus::new(image, settings)?),
        };

        let md5 = match md5 {
            Some(hash) => hash.to_ascii_lowercase(),
            None => Self::content_hash(image),
        };
        log::debug!(
            "cartridge: {} bytes, scheme {}, {} bank(s), md5 {}",
            image.len(),
            kind,
            mapper.bank_count(),
            md5
        );

        Ok(Self {
            mapper,
            kind,
            md5,
            size: image.len(),
        })
    }

    /// Hex md5 of a ROM image.
    pub fn content_hash(image: &[u8]) -> String {
        format!("{:x}", md5::compute(image))
    }

    // -------------- Bus-facing --------------

    pub fn install(&mut self, bus: &mut CartBus) {
        self.mapper.install(bus);
    }

    pub fn reset(&mut self, bus: &mut CartBus) {
        self.mapper.reset(bus);
        log::debug!("{}: reset, bank {}", self.kind, self.mapper.current_bank(0x1000));
    }

    #[inline]
    pub fn peek(&mut self, bus: &mut CartBus, addr: u16) -> u8 {
        self.mapper.peek(bus, addr)
    }

    #[inline]
    pub fn poke(&mut self, bus: &mut CartBus, addr: u16, value: u8) -> bool {
        self.mapper.poke(bus, addr, value)
    }

    pub fn bank(&mut self, bus: &mut CartBus, bank: u16) -> bool {
        let switched = self.mapper.bank(bus, bank);
        if switched {
            log::debug!("{}: switched to bank {bank}", self.kind);
        }
        switched
    }

    pub fn current_bank(&self, addr: u16) -> u16 {
        self.mapper.current_bank(addr)
    }

    pub fn bank_count(&self) -> u16 {
        self.mapper.bank_count()
    }

    pub fn patch(&mut self, system: &mut System, addr: u16, value: u8) -> bool {
        self.mapper.patch(system, addr, value)
    }

    /// Freeze bank switching and RAM side effects (debugger views).
    pub fn lock_bank(&mut self) {
        self.mapper.base_mut().locked = true;
    }

    pub fn unlock_bank(&mut self) {
        self.mapper.base_mut().locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.mapper.base().locked
    }

    /// Code/data classification byte recorded for image offset `offset`.
    pub fn access_flags(&self, system: &System, offset: usize) -> u8 {
        self.mapper.base().access_flags(system, offset)
    }

    // -------------- Accessors --------------

    pub fn kind(&self) -> SchemeKind {
        self.kind
    }

    pub fn md5(&self) -> &str {
        &self.md5
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }

    pub fn mapper_mut(&mut self) -> &mut dyn Mapper {
        self.mapper.as_mut()
    }

    // -------------- Persistence --------------

    pub fn save_state(&self, out: &mut Serializer, system: &System) -> Result<(), StateError> {
        self.mapper.save_state(out, system)
    }

    pub fn load_state(&mut self, input: &mut Serializer, bus: &mut CartBus) -> Result<(), StateError> {
        self.mapper.load_state(input, bus)
    }

    /// Append the cartridge state to `out`. On failure the stream is cut back
    /// to where it started.
    pub fn save(&self, out: &mut Serializer, system: &System) -> bool {
        let start = out.len();
        match self.save_state(out, system) {
            Ok(()) => true,
            Err(e) => {
                out.truncate(start);
                log::error!("{}: save failed: {e}", self.kind);
                false
            }
        }
    }

    /// Restore the cartridge state from `input`. On failure the reader is
    /// rewound and the previous state is put back.
    pub fn load(&mut self, input: &mut Serializer, bus: &mut CartBus) -> bool {
        let start = input.position();
        let mut backup = Serializer::new();
        let have_backup = self.save_state(&mut backup, bus.system).is_ok();

        match self.load_state(input, bus) {
            Ok(()) => true,
            Err(e) => {
                log::error!("{}: load failed: {e}", self.kind);
                input.seek(start);
                if have_backup {
                    backup.rewind();
                    if let Err(e) = self.load_state(&mut backup, bus) {
                        log::error!("{}: could not restore previous state: {e}", self.kind);
                    }
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{banked_image, cart_env};

    fn installed(image: &[u8], kind: Option<SchemeKind>) -> (System, crate::tia::Tia, Cartridge) {
        let settings = Settings::default();
        let mut cart = match kind {
            Some(kind) => Cartridge::with_scheme(image, None, kind, &settings),
            None => Cartridge::new(image, None, &settings),
        }
        .expect("cartridge");
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
    fn detects_by_size() {
        assert_eq!(SchemeKind::detect(&[0; 2048]), Ok(SchemeKind::Rom2K));
        assert_eq!(SchemeKind::detect(&[0; 512]), Ok(SchemeKind::Rom2K));
        assert_eq!(SchemeKind::detect(&[0; 4096]), Ok(SchemeKind::Rom4K));
        assert_eq!(SchemeKind::detect(&vec![0; 256 * 1024]), Ok(SchemeKind::Bfsc));
        assert_eq!(SchemeKind::detect(&[]), Err(CoreError::EmptyImage));
        assert!(matches!(
            SchemeKind::detect(&[0; 3000]),
            Err(CoreError::UnknownScheme(_))
        ));
    }

    #[test]
    fn detects_by_signature() {
        let mut dpc = vec![0u8; 32 * 1024];
        dpc[0x20..0x24].copy_from_slice(b"DPC+");
        dpc[0x7000..0x7004].copy_from_slice(b"DPC+");
        assert_eq!(SchemeKind::detect(&dpc), Ok(SchemeKind::DpcPlus));

        let mut tj = vec![0u8; 8 * 1024];
        tj[0x100..0x104].copy_from_slice(b"TJ3E");
        assert_eq!(SchemeKind::detect(&tj), Ok(SchemeKind::E3Plus));

        let mut mnet = vec![0u8; 16 * 1024];
        mnet[0x200..0x203].copy_from_slice(&[0x8D, 0xE7, 0x1F]);
        assert_eq!(SchemeKind::detect(&mnet), Ok(SchemeKind::E7));
    }

    #[test]
    fn scheme_names_parse() {
        for kind in SchemeKind::ALL {
            assert_eq!(kind.name().parse::<SchemeKind>(), Ok(kind));
        }
        assert_eq!("dpc+".parse::<SchemeKind>(), Ok(SchemeKind::DpcPlus));
        assert!(matches!(
            "F8".parse::<SchemeKind>(),
            Err(CoreError::UnknownScheme(name)) if name == "F8"
        ));
    }

    #[test]
    fn content_hash_is_lowercase_hex() {
        assert_eq!(Cartridge::content_hash(b""), "d41d8cd98f00b204e9800998ecf8427e");
        let cart = Cartridge::new(&[0; 4096], Some("ABCDEF"), &Settings::default()).expect("4K");
        assert_eq!(cart.md5(), "abcdef");
        assert_eq!(cart.size(), 4096);
    }

    #[test]
    fn explicit_scheme_checks_size() {
        assert!(matches!(
            Cartridge::with_scheme(&[0; 4096], None, SchemeKind::Bfsc, &Settings::default()),
            Err(CoreError::ImageSize { scheme: "BFSC", size: 4096 })
        ));
    }

    #[test]
    fn lock_refuses_bank_switch() {
        let image = banked_image(8, 2048);
        let (mut system, mut tia, mut cart) = installed(&image, Some(SchemeKind::E7));
        cart.lock_bank();
        assert!(cart.is_locked());
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        assert!(!cart.bank(&mut bus, 3));
        cart.unlock_bank();
        assert!(cart.bank(&mut bus, 3));
        assert_eq!(cart.current_bank(0x1000), 3);
    }

    #[test]
    fn failed_load_restores_previous_state() {
        let image = banked_image(64, 4096);
        let (mut system, mut tia, mut cart) = installed(&image, None);
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.bank(&mut bus, 7);

        let mut bogus = Serializer::new();
        bogus.put_string("BFSC");
        bogus.put_int(4096 * 99);
        bogus.rewind();
        assert!(!cart.load(&mut bogus, &mut bus));
        assert_eq!(bogus.position(), 0);
        assert_eq!(cart.current_bank(0x1000), 7);
        assert_eq!(system.peek_direct(0x1100), Some(7));
    }

    #[test]
    fn save_and_load_round_trip() {
        let image = banked_image(64, 4096);
        let (mut system, mut tia, mut cart) = installed(&image, None);
        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.bank(&mut bus, 33);

        let mut out = Serializer::new();
        out.put_byte(0xAB);
        assert!(cart.save(&mut out, &system));
        assert!(out.len() > 1);

        let mut bus = CartBus {
            system: &mut system,
            tia: &mut tia,
        };
        cart.bank(&mut bus, 1);
        out.seek(1);
        assert!(cart.load(&mut out, &mut bus));
        assert_eq!(cart.current_bank(0x1000), 33);
    }
}
