#![doc = r#"
vcs-core library crate.

Cycle-accurate emulation core for the Atari 2600 (VCS). The crate exposes the
emulator modules for use by the binary, by tests and by external front ends.

Modules:
- audio_queue: fixed-capacity ring of audio fragments shared with an output thread
- bus: `System` page table / cycle counter / RNG and the `Bus` facade routing accesses
- cartridge: ROM image ingestion, scheme detection and the `Cartridge` wrapper
- console: wiring of CPU + bus, power-on reset, frame stepping and full snapshots
- cpu: 6507 core (facade + state + addressing + dispatch table + debugger hooks)
- error: crate error types
- mapper: the `Mapper` trait every bank-switching scheme implements
- mappers: concrete schemes (plain 2K/4K, 3E+, E7, BFSC, DPC+)
- random: seedable, persistable pseudo-random source injected into the bus
- riot: 6532 RAM / I/O / timer
- serializer: typed little-endian state stream and the `Serializable` trait
- settings: serde-backed configuration
- tia: video/audio chip (objects, delay queue, frame detection, audio)

In tests, shared ROM builders are available under `crate::test_utils`.
"#]

// Core emulator modules
pub mod audio_queue;
pub mod bus;
pub mod cartridge;
pub mod console;
pub mod cpu;
pub mod error;
pub mod mapper;
pub mod mappers;
pub mod random;
pub mod riot;
pub mod serializer;
pub mod settings;
pub mod tia;

// Re-export commonly used types at the crate root for convenience.
pub use audio_queue::AudioQueue;
pub use bus::Bus;
pub use cartridge::Cartridge;
pub use console::Console;
pub use cpu::core::Cpu;
pub use error::{CoreError, StateError};
pub use serializer::{Serializable, Serializer};
pub use settings::Settings;

// Shared test utilities (only compiled for tests)
#[cfg(test)]
pub mod test_utils;
