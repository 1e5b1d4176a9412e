//! Draw-counter decode tables shared by players and missiles.
//!
//! A non-zero entry at counter position `n` starts a copy of the object; the
//! value is the copy number. Every pattern starts its first copy at 156. NUSIZ
//! settings 5 (double) and 7 (quad) use the single-copy table.

use super::registers::H_PIXEL;

const fn table(extra: &[(usize, u8)]) -> [u8; H_PIXEL as usize] {
    let mut t = [0u8; H_PIXEL as usize];
    t[156] = 1;
    let mut i = 0;
    while i < extra.len() {
        t[extra[i].0] = extra[i].1;
        i += 1;
    }
    t
}

static DECODES: [[u8; H_PIXEL as usize]; 7] = [
    table(&[]),
    table(&[(12, 2)]),
    table(&[(28, 2)]),
    table(&[(12, 2), (28, 3)]),
    table(&[(60, 2)]),
    // Unused slot: NUSIZ 5 maps to table 0.
    table(&[]),
    table(&[(28, 2), (60, 3)]),
];

/// Table id for a NUSIZ value; equal ids mean the same decode pattern.
#[inline]
pub const fn decode_id(nusiz: u8) -> usize {
    match nusiz & 0x07 {
        5 | 7 => 0,
        n => n as usize,
    }
}

#[inline]
pub fn decodes(id: usize) -> &'static [u8; H_PIXEL as usize] {
    &DECODES[id]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_by_nusiz() {
        let starts = |n: u8| -> Vec<usize> {
            decodes(decode_id(n))
                .iter()
                .enumerate()
                .filter(|(_, v)| **v != 0)
                .map(|(i, _)| i)
                .collect()
        };
        assert_eq!(starts(0), vec![156]);
        assert_eq!(starts(3), vec![12, 28, 156]);
        assert_eq!(starts(6), vec![28, 60, 156]);
        assert_eq!(decode_id(5), decode_id(7));
    }
}
