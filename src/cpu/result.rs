//! Outcome of one `Cpu::execute` call.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Budget used up, or stopped on request.
    Ok,
    /// A breakpoint, trap or conditional break matched.
    Debugger,
    /// Unrecoverable; the caller must not resume.
    Fatal,
    /// Recoverable anomaly; execution may be resumed.
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub status: DispatchStatus,
    /// CPU cycles consumed by the call.
    pub cycles: u64,
    pub message: String,
    pub address: u16,
    pub was_read_trap: bool,
}

impl DispatchResult {
    pub fn ok(cycles: u64) -> Self {
        Self {
            status: DispatchStatus::Ok,
            cycles,
            message: String::new(),
            address: 0,
            was_read_trap: false,
        }
    }

    pub fn debugger(cycles: u64, message: impl Into<String>, address: u16, was_read_trap: bool) -> Self {
        Self {
            status: DispatchStatus::Debugger,
            cycles,
            message: message.into(),
            address,
            was_read_trap,
        }
    }

    pub fn fatal(cycles: u64, message: impl Into<String>, address: u16) -> Self {
        Self {
            status: DispatchStatus::Fatal,
            cycles,
            message: message.into(),
            address,
            was_read_trap: false,
        }
    }

    pub fn warning(cycles: u64, message: impl Into<String>, address: u16) -> Self {
        Self {
            status: DispatchStatus::Warning,
            cycles,
            message: message.into(),
            address,
            was_read_trap: false,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self.status, DispatchStatus::Ok | DispatchStatus::Debugger)
    }
}

impl fmt::Display for DispatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            DispatchStatus::Ok => write!(f, "ok ({} cycles)", self.cycles),
            DispatchStatus::Debugger => write!(
                f,
                "debugger stop at ${:04X} after {} cycles: {}",
                self.address, self.cycles, self.message
            ),
            DispatchStatus::Fatal => write!(
                f,
                "fatal error at ${:04X} after {} cycles: {}",
                self.address, self.cycles, self.message
            ),
            DispatchStatus::Warning => write!(
                f,
                "warning at ${:04X} after {} cycles: {}",
                self.address, self.cycles, self.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_covers_ok_and_debugger() {
        assert!(DispatchResult::ok(10).is_success());
        assert!(DispatchResult::debugger(3, "BP: $1000, bank #0", 0x1000, false).is_success());
        assert!(!DispatchResult::fatal(1, "invalid instruction", 0x1000).is_success());
        assert!(!DispatchResult::warning(1, "odd", 0x1000).is_success());
    }

    #[test]
    fn display_mentions_address() {
        let r = DispatchResult::fatal(2, "invalid instruction", 0x10AB);
        assert_eq!(r.to_string(), "fatal error at $10AB after 2 cycles: invalid instruction");
    }
}
