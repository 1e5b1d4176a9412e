/*!
Error types shared across the core.

Two families:
- `CoreError`: caller-contract violations and construction failures. These are
  programming or configuration errors and are returned immediately.
- `StateError`: failures while reading or writing a state stream. Components
  convert them into a `false` return plus a log line at their own boundary.

Emulation faults raised while running (invalid opcode, co-processor trouble)
are not errors in this sense; they travel through the bus fault line and
surface as a `DispatchResult` status (see `cpu::result`).
*/

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("halt requested without an installed resume handler")]
    HaltWithoutHandler,

    #[error("{side} bootstrap fragment already handed out")]
    BootstrapSpent { side: &'static str },

    #[error("fragment has {actual} samples, queue expects {expected}")]
    FragmentSize { expected: usize, actual: usize },

    #[error("ROM image is empty")]
    EmptyImage,

    #[error("ROM image of {size} bytes is not valid for scheme {scheme}")]
    ImageSize { scheme: &'static str, size: usize },

    #[error("unknown bank-switching scheme '{0}'")]
    UnknownScheme(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("unexpected end of state stream at offset {offset} (wanted {wanted} bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },

    #[error("corrupt boolean 0x{value:02X} at offset {offset}")]
    CorruptBool { offset: usize, value: u8 },

    #[error("state tag mismatch: expected '{expected}', found '{found}'")]
    TagMismatch { expected: String, found: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: u64 },

    #[error("state stream is not valid UTF-8 at offset {offset}")]
    Utf8 { offset: usize },

    #[error("snapshot header invalid: {0}")]
    Header(String),
}
