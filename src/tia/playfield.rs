//! Playfield: 20 bits from PF0/PF1/PF2, each bit covering 4 pixels, repeated
//! or mirrored on the right half. In score mode the halves take the player
//! colors.

use super::registers::{H_PIXEL, collision};
use crate::error::StateError;
use crate::serializer::Serializer;

#[derive(Debug, Clone)]
pub struct Playfield {
    pub collision: u16,
    mask_disabled: u16,

    pattern: u32,
    reflected: bool,
    refp: bool,
    pf0: u8,
    pf1: u8,
    pf2: u8,
    x: u32,

    object_color: u8,
    color_p0: u8,
    color_p1: u8,
    score_mode: bool,
    color_left: u8,
    color_right: u8,
}

impl Playfield {
    pub fn new() -> Self {
        let mask_disabled = collision::disabled(collision::PLAYFIELD);
        Self {
            collision: mask_disabled,
            mask_disabled,
            pattern: 0,
            reflected: false,
            refp: false,
            pf0: 0,
            pf1: 0,
            pf2: 0,
            x: 0,
            object_color: 0,
            color_p0: 0,
            color_p1: 0,
            score_mode: false,
            color_left: 0,
            color_right: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn pf0(&mut self, value: u8) {
        self.pattern = (self.pattern & 0x000F_FFF0) | (value >> 4) as u32;
        self.pf0 = value;
    }

    pub fn pf1(&mut self, value: u8) {
        // PF1 is drawn MSB first.
        self.pattern = (self.pattern & 0x000F_F00F) | ((value.reverse_bits() as u32) << 4);
        self.pf1 = value;
    }

    pub fn pf2(&mut self, value: u8) {
        self.pattern = (self.pattern & 0x0000_0FFF) | ((value as u32) << 12);
        self.pf2 = value;
    }

    pub fn ctrlpf(&mut self, value: u8) {
        self.reflected = value & 0x01 != 0;
        self.score_mode = value & 0x06 == 0x02;
        self.apply_colors();
    }

    pub fn set_color(&mut self, color: u8) {
        self.object_color = color;
        self.apply_colors();
    }

    pub fn set_color_p0(&mut self, color: u8) {
        self.color_p0 = color;
        self.apply_colors();
    }

    pub fn set_color_p1(&mut self, color: u8) {
        self.color_p1 = color;
        self.apply_colors();
    }

    /// `x` is the visible pixel column (may run ahead of 0 during extended hblank).
    pub fn tick(&mut self, x: u32) {
        self.x = x;

        // Reflection is latched only at the start of each half.
        if x == H_PIXEL / 2 - 1 || x == 0 {
            self.refp = self.reflected;
        }

        if x & 0x03 != 0 {
            return;
        }

        let bit = if self.pattern == 0 {
            None
        } else if x < H_PIXEL / 2 - 1 {
            Some(x >> 2)
        } else if self.refp {
            39u32.checked_sub(x >> 2)
        } else {
            (x >> 2).checked_sub(20)
        };

        let on = bit.is_some_and(|b| b < 20 && self.pattern & (1 << b) != 0);
        self.collision = if on {
            collision::ENABLED
        } else {
            self.mask_disabled
        };
    }

    pub fn next_line(&mut self) {
        self.collision = self.mask_disabled;
        self.x = 0;
    }

    fn apply_colors(&mut self) {
        if self.score_mode {
            self.color_left = self.color_p0;
            self.color_right = self.color_p1;
        } else {
            self.color_left = self.object_color;
            self.color_right = self.object_color;
        }
    }

    #[inline]
    pub fn color(&self) -> u8 {
        if self.x < H_PIXEL / 2 {
            self.color_left
        } else {
            self.color_right
        }
    }

    #[inline]
    pub fn get_pixel(&self, color_in: u8) -> u8 {
        if collision::is_on(self.collision) {
            self.color()
        } else {
            color_in
        }
    }

    pub fn registers(&self) -> (u8, u8, u8) {
        (self.pf0, self.pf1, self.pf2)
    }

    pub fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
        out.put_short(self.collision);
        out.put_bool(self.reflected);
        out.put_bool(self.refp);
        out.put_byte(self.pf0);
        out.put_byte(self.pf1);
        out.put_byte(self.pf2);
        out.put_int(self.x);
        out.put_byte(self.object_color);
        out.put_byte(self.color_p0);
        out.put_byte(self.color_p1);
        out.put_bool(self.score_mode);
        Ok(())
    }

    pub fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        self.collision = input.get_short()?;
        self.reflected = input.get_bool()?;
        self.refp = input.get_bool()?;
        let (pf0, pf1, pf2) = (input.get_byte()?, input.get_byte()?, input.get_byte()?);
        self.pf0(pf0);
        self.pf1(pf1);
        self.pf2(pf2);
        self.x = input.get_int()?;
        self.object_color = input.get_byte()?;
        self.color_p0 = input.get_byte()?;
        self.color_p1 = input.get_byte()?;
        self.score_mode = input.get_bool()?;
        self.apply_colors();
        Ok(())
    }
}

impl Default for Playfield {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(pf: &mut Playfield) -> Vec<bool> {
        (0..H_PIXEL)
            .map(|x| {
                pf.tick(x);
                collision::is_on(pf.collision)
            })
            .collect()
    }

    #[test]
    fn pf0_low_nibble_is_ignored() {
        let mut pf = Playfield::new();
        pf.pf0(0x0F);
        assert!(line(&mut pf).iter().all(|on| !on));
    }

    #[test]
    fn pf0_bit4_is_leftmost_block() {
        let mut pf = Playfield::new();
        pf.pf0(0x10);
        let l = line(&mut pf);
        assert!(l[0..4].iter().all(|&on| on));
        assert!(!l[4]);
        // Repeated on the right half.
        assert!(l[80..84].iter().all(|&on| on));
    }

    #[test]
    fn reflection_mirrors_right_half() {
        let mut pf = Playfield::new();
        pf.pf0(0x10);
        pf.ctrlpf(0x01);
        let l = line(&mut pf);
        assert!(l[156..160].iter().all(|&on| on));
        assert!(!l[80]);
    }

    #[test]
    fn score_mode_colors_halves() {
        let mut pf = Playfield::new();
        pf.set_color_p0(0x40);
        pf.set_color_p1(0x80);
        pf.ctrlpf(0x02);
        pf.tick(10);
        assert_eq!(pf.color(), 0x40);
        pf.tick(100);
        assert_eq!(pf.color(), 0x80);
    }
}
