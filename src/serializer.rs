/*!
serializer.rs - Typed binary state stream.

Overview
========
`Serializer` is an in-memory byte stream with a write end (append) and a
read cursor. All multi-byte values are little-endian.

Encoding
--------
- byte: 1 byte
- short: u16, 2 bytes
- int: u32, 4 bytes
- long: u64, 8 bytes
- double: f64 stored through `to_bits`, 8 bytes (bit-exact)
- bool: one byte, 0xFE for true and 0x01 for false; any other value is
  reported as corruption
- string: int length followed by UTF-8 bytes
- arrays: fixed length, no prefix; the reader supplies the length

Component boundary
------------------
Components implement `Serializable::save_state` / `load_state` with `?`
propagation. The provided `save` / `load` wrappers turn failures into a
`false` return plus a `log::error!` line, truncate a half-written save, and
rewind and restore the component on a failed load so the caller never sees a
partially applied state.
*/

use crate::error::StateError;

const TRUE_FLAG: u8 = 0xFE;
const FALSE_FLAG: u8 = 0x01;

#[derive(Debug, Clone, Default)]
pub struct Serializer {
    data: Vec<u8>,
    pos: usize,
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing bytes for reading.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current read offset.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the read cursor. Clamped to the written length.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Drop everything written after `len` (used to undo a failed save).
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        self.pos = self.pos.min(self.data.len());
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    // ---------------------------------------------------------------------
    // Writers
    // ---------------------------------------------------------------------

    pub fn put_byte(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn put_short(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_int(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_long(&mut self, v: u64) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_double(&mut self, v: f64) {
        self.put_long(v.to_bits());
    }

    pub fn put_bool(&mut self, v: bool) {
        self.put_byte(if v { TRUE_FLAG } else { FALSE_FLAG });
    }

    pub fn put_string(&mut self, s: &str) {
        self.put_int(s.len() as u32);
        self.data.extend_from_slice(s.as_bytes());
    }

    pub fn put_byte_array(&mut self, values: &[u8]) {
        self.data.extend_from_slice(values);
    }

    pub fn put_short_array(&mut self, values: &[u16]) {
        for &v in values {
            self.put_short(v);
        }
    }

    pub fn put_int_array(&mut self, values: &[u32]) {
        for &v in values {
            self.put_int(v);
        }
    }

    // ---------------------------------------------------------------------
    // Readers
    // ---------------------------------------------------------------------

    fn take(&mut self, n: usize) -> Result<&[u8], StateError> {
        if self.remaining() < n {
            return Err(StateError::UnexpectedEof {
                offset: self.pos,
                wanted: n,
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..start + n])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], StateError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn get_byte(&mut self) -> Result<u8, StateError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_short(&mut self) -> Result<u16, StateError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn get_int(&mut self) -> Result<u32, StateError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn get_long(&mut self) -> Result<u64, StateError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn get_double(&mut self) -> Result<f64, StateError> {
        Ok(f64::from_bits(self.get_long()?))
    }

    pub fn get_bool(&mut self) -> Result<bool, StateError> {
        let offset = self.pos;
        match self.get_byte()? {
            TRUE_FLAG => Ok(true),
            FALSE_FLAG => Ok(false),
            value => Err(StateError::CorruptBool { offset, value }),
        }
    }

    pub fn get_string(&mut self) -> Result<String, StateError> {
        let len = self.get_int()? as usize;
        let offset = self.pos;
        let bytes = self.take(len)?.to_vec();
        String::from_utf8(bytes).map_err(|_| StateError::Utf8 { offset })
    }

    pub fn get_byte_array(&mut self, out: &mut [u8]) -> Result<(), StateError> {
        let n = out.len();
        out.copy_from_slice(self.take(n)?);
        Ok(())
    }

    pub fn get_short_array(&mut self, out: &mut [u16]) -> Result<(), StateError> {
        for v in out.iter_mut() {
            *v = self.get_short()?;
        }
        Ok(())
    }

    pub fn get_int_array(&mut self, out: &mut [u32]) -> Result<(), StateError> {
        for v in out.iter_mut() {
            *v = self.get_int()?;
        }
        Ok(())
    }

    /// Read a string and require it to equal `expected`.
    pub fn expect_tag(&mut self, expected: &str) -> Result<(), StateError> {
        let found = self.get_string()?;
        if found != expected {
            return Err(StateError::TagMismatch {
                expected: expected.to_string(),
                found,
            });
        }
        Ok(())
    }
}

/// A component whose state can be written to and restored from a `Serializer`.
pub trait Serializable {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    fn save_state(&self, out: &mut Serializer) -> Result<(), StateError>;

    fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError>;

    /// Boundary wrapper: never leaves a half-written component record behind.
    fn save(&self, out: &mut Serializer) -> bool {
        let mark = out.len();
        match self.save_state(out) {
            Ok(()) => true,
            Err(e) => {
                out.truncate(mark);
                log::error!("{}::save: {e}", self.name());
                false
            }
        }
    }

    /// Boundary wrapper: on failure the reader is rewound and the previous
    /// state is put back.
    fn load(&mut self, input: &mut Serializer) -> bool {
        let mark = input.position();
        let mut backup = Serializer::new();
        if let Err(e) = self.save_state(&mut backup) {
            log::error!("{}::load: cannot snapshot current state: {e}", self.name());
            return false;
        }
        match self.load_state(input) {
            Ok(()) => true,
            Err(e) => {
                input.seek(mark);
                if let Err(restore) = self.load_state(&mut backup) {
                    log::error!("{}::load: restore failed: {restore}", self.name());
                }
                log::error!("{}::load: {e}", self.name());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_little_endian() {
        let mut s = Serializer::new();
        s.put_short(0x1234);
        s.put_int(0xAABBCCDD);
        assert_eq!(s.as_bytes(), &[0x34, 0x12, 0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn bool_flags_and_corruption() {
        let mut s = Serializer::new();
        s.put_bool(true);
        s.put_bool(false);
        s.put_byte(0x00);
        assert_eq!(s.as_bytes()[..2], [0xFE, 0x01]);
        assert_eq!(s.get_bool(), Ok(true));
        assert_eq!(s.get_bool(), Ok(false));
        assert_eq!(
            s.get_bool(),
            Err(StateError::CorruptBool {
                offset: 2,
                value: 0
            })
        );
    }

    #[test]
    fn double_is_bit_exact() {
        let v = 0.1f64 + 0.2f64;
        let mut s = Serializer::new();
        s.put_double(v);
        assert_eq!(s.get_double().expect("double").to_bits(), v.to_bits());
    }

    #[test]
    fn short_read_reports_eof() {
        let mut s = Serializer::from_bytes(vec![1, 2, 3]);
        assert!(matches!(
            s.get_int(),
            Err(StateError::UnexpectedEof { offset: 0, wanted: 4 })
        ));
    }

    #[test]
    fn tag_mismatch() {
        let mut s = Serializer::new();
        s.put_string("TIA");
        assert!(matches!(
            s.expect_tag("RIOT"),
            Err(StateError::TagMismatch { .. })
        ));
    }

    #[derive(Debug, Default)]
    struct Pair {
        a: u8,
        b: u16,
    }

    impl Serializable for Pair {
        fn name(&self) -> &'static str {
            "Pair"
        }
        fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
            out.put_byte(self.a);
            out.put_short(self.b);
            Ok(())
        }
        fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
            self.a = input.get_byte()?;
            self.b = input.get_short()?;
            Ok(())
        }
    }

    #[test]
    fn failed_load_restores_and_rewinds() {
        let mut p = Pair { a: 7, b: 9 };
        // Only the first field present: `a` would be overwritten before the error.
        let mut input = Serializer::from_bytes(vec![0x55]);
        assert!(!p.load(&mut input));
        assert_eq!((p.a, p.b), (7, 9));
        assert_eq!(input.position(), 0);
    }
}
