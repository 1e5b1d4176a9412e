/*
Module: mappers

Dispatcher module: declares the bank-switching schemes and re-exports their
public types. Each scheme lives in its own file; `crate::cartridge` picks one
from the image.

Implemented:
- 2K / 4K (no bank switching)
- 3E+ (eight 512-byte segments, ROM or RAM)
- E7 / M-Network (2K slices, 1K + 4x256 bytes RAM)
- BFSC (64 x 4K, SuperChip RAM)
- DPC+ (data fetchers, music, ARM driver through `thumbulator`)
*/

pub mod bfsc;
pub mod dpc_plus;
pub mod e3plus;
pub mod e7;
pub mod rom4k;
pub mod thumbulator;

pub use bfsc::Bfsc;
pub use dpc_plus::DpcPlus;
pub use e3plus::E3Plus;
pub use e7::E7;
pub use rom4k::Rom4K;
pub use thumbulator::{ThumbError, Thumbulator};
