/*!
Player graphics object (GRP0 / GRP1).

The position counter runs 0..160 and is clocked once per visible pixel (and
by HMOVE pulses during hblank). When it hits a decode position the object
starts rendering its 8-bit pattern, stretched by the NUSIZ divider (1, 2 or
4 clocks per bit).

Setters that change what is currently being drawn return `true` to ask the
TIA for a collision update on the next clock.
*/

use super::draw_counter::{decode_id, decodes};
use super::registers::{H_PIXEL, collision};
use crate::error::StateError;
use crate::serializer::Serializer;

const RENDER_COUNTER_OFFSET: i8 = -5;

#[derive(Debug, Clone)]
pub struct Player {
    pub collision: u16,
    mask_disabled: u16,

    color: u8,
    decodes: usize,
    hmm_clocks: u8,
    counter: u8,
    is_moving: bool,
    is_rendering: bool,
    render_counter: i8,
    render_counter_trip_point: i8,
    divider: u8,
    divider_pending: u8,
    divider_change_counter: i8,
    sample_counter: u8,

    pattern_new: u8,
    pattern_old: u8,
    pattern: u8,
    is_reflected: bool,
    is_delaying: bool,
}

impl Player {
    pub fn new(mask: u16) -> Self {
        let mut p = Self {
            collision: 0,
            mask_disabled: collision::disabled(mask),
            color: 0,
            decodes: 0,
            hmm_clocks: 0,
            counter: 0,
            is_moving: false,
            is_rendering: false,
            render_counter: 0,
            render_counter_trip_point: 0,
            divider: 1,
            divider_pending: 0,
            divider_change_counter: -1,
            sample_counter: 0,
            pattern_new: 0,
            pattern_old: 0,
            pattern: 0,
            is_reflected: false,
            is_delaying: false,
        };
        p.reset();
        p
    }

    pub fn reset(&mut self) {
        self.decodes = 0;
        self.hmm_clocks = 0;
        self.counter = 0;
        self.is_moving = false;
        self.is_rendering = false;
        self.render_counter = 0;
        self.pattern_old = 0;
        self.pattern_new = 0;
        self.is_reflected = false;
        self.is_delaying = false;
        self.color = 0;
        self.collision = self.mask_disabled;
        self.sample_counter = 0;
        self.divider_pending = 0;
        self.divider_change_counter = -1;
        self.set_divider(1);
        self.update_pattern();
    }

    pub fn grp(&mut self, pattern: u8) -> bool {
        let old = self.pattern_new;
        self.pattern_new = pattern;
        !self.is_delaying && pattern != old && self.update_pattern()
    }

    pub fn hmp(&mut self, value: u8) {
        self.hmm_clocks = (value >> 4) ^ 0x08;
    }

    pub fn nusiz(&mut self, value: u8, hblank: bool) {
        let offset = value & 0x07;
        self.divider_pending = match offset {
            5 => 2,
            7 => 4,
            _ => 1,
        };

        let old_decodes = self.decodes;
        self.decodes = decode_id(offset);

        if self.decodes != old_decodes
            && self.is_rendering
            && (self.render_counter - RENDER_COUNTER_OFFSET) < 2
        {
            let pos = (self.counter as i32 - self.render_counter as i32
                + RENDER_COUNTER_OFFSET as i32
                + H_PIXEL as i32
                - 1)
                .rem_euclid(H_PIXEL as i32) as usize;
            if decodes(self.decodes)[pos] == 0 {
                self.is_rendering = false;
            }
        }

        if self.divider_pending == self.divider {
            return;
        }

        if !self.is_rendering {
            self.set_divider(self.divider_pending);
            return;
        }

        let delta = self.render_counter - RENDER_COUNTER_OFFSET;
        match (self.divider, self.divider_pending) {
            (1, 2) | (1, 4) => {
                if hblank {
                    if delta < 4 {
                        self.set_divider(self.divider_pending);
                    } else {
                        self.divider_change_counter = if delta < 5 { 1 } else { 0 };
                    }
                } else if delta < 3 {
                    self.set_divider(self.divider_pending);
                } else {
                    self.divider_change_counter = 1;
                }
            }
            (2, 1) | (4, 1) => {
                if delta < if hblank { 4 } else { 3 } {
                    self.set_divider(self.divider_pending);
                } else if delta < if hblank { 6 } else { 5 } {
                    self.set_divider(self.divider_pending);
                    self.render_counter -= 1;
                } else {
                    self.divider_change_counter = if hblank { 0 } else { 1 };
                }
            }
            _ => {
                // 2 <-> 4
                let divider = self.divider as i8;
                if self.render_counter < 1
                    || (hblank && self.render_counter.rem_euclid(divider) == 1)
                {
                    self.set_divider(self.divider_pending);
                } else {
                    self.divider_change_counter =
                        divider - (self.render_counter - 1).rem_euclid(divider);
                }
            }
        }
    }

    pub fn resp(&mut self, counter: u8) {
        self.counter = counter;
        if self.is_rendering && (self.render_counter - RENDER_COUNTER_OFFSET) < 4 {
            self.render_counter = RENDER_COUNTER_OFFSET + (counter as i16 - 157) as i8;
        }
    }

    pub fn refp(&mut self, value: u8) -> bool {
        let old = self.is_reflected;
        self.is_reflected = value & 0x08 != 0;
        old != self.is_reflected && self.update_pattern()
    }

    pub fn vdelp(&mut self, value: u8) -> bool {
        let old = self.is_delaying;
        self.is_delaying = value & 0x01 != 0;
        old != self.is_delaying && self.update_pattern()
    }

    #[inline]
    pub fn set_color(&mut self, color: u8) {
        self.color = color;
    }

    #[inline]
    pub fn start_movement(&mut self) {
        self.is_moving = true;
    }

    /// HMOVE pulse. Returns whether the object is still moving.
    pub fn movement_tick(&mut self, clock: u8, hblank: bool) -> bool {
        if clock == self.hmm_clocks {
            self.is_moving = false;
        }
        if self.is_moving && hblank {
            self.tick();
        }
        self.is_moving
    }

    fn sample_collision(&mut self) {
        self.collision = if !self.is_rendering
            || self.render_counter < self.render_counter_trip_point
            || self.pattern & (1 << self.sample_counter) == 0
        {
            self.mask_disabled
        } else {
            collision::ENABLED
        };
    }

    pub fn tick(&mut self) {
        self.sample_collision();

        if decodes(self.decodes)[self.counter as usize] != 0 {
            self.is_rendering = true;
            self.sample_counter = 0;
            self.render_counter = RENDER_COUNTER_OFFSET;
        } else if self.is_rendering {
            self.render_counter += 1;

            if self.divider == 1 {
                if self.render_counter > 0 {
                    self.sample_counter += 1;
                }
                if self.render_counter >= 0 && self.take_divider_change() {
                    self.set_divider(self.divider_pending);
                }
            } else {
                if self.render_counter > 1
                    && (self.render_counter - 1).rem_euclid(self.divider as i8) == 0
                {
                    self.sample_counter += 1;
                }
                if self.render_counter > 0 && self.take_divider_change() {
                    self.set_divider(self.divider_pending);
                }
            }

            if self.sample_counter > 7 {
                self.is_rendering = false;
            }
        }

        self.counter += 1;
        if self.counter as u32 >= H_PIXEL {
            self.counter = 0;
        }
    }

    /// Counts a pending divider change down; true when it is due now.
    fn take_divider_change(&mut self) -> bool {
        if self.divider_change_counter < 0 {
            return false;
        }
        let due = self.divider_change_counter == 0;
        self.divider_change_counter -= 1;
        due
    }

    pub fn next_line(&mut self) {
        self.sample_collision();
    }

    pub fn shuffle_patterns(&mut self) -> bool {
        let old = self.pattern_old;
        self.pattern_old = self.pattern_new;
        self.is_delaying && old != self.pattern_old && self.update_pattern()
    }

    /// Position a RESMP-locked missile is released at.
    pub fn resp_clock(&self) -> u8 {
        let back = match self.divider {
            1 => 5,
            2 => 9,
            _ => 12,
        };
        ((self.counter as u32 + H_PIXEL - back) % H_PIXEL) as u8
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    #[inline]
    pub fn get_pixel(&self, color_in: u8) -> u8 {
        if collision::is_on(self.collision) {
            self.color
        } else {
            color_in
        }
    }

    #[inline]
    pub fn color(&self) -> u8 {
        self.color
    }

    /// Returns true if the current collision state changed and needs to be
    /// folded into the latch.
    fn update_pattern(&mut self) -> bool {
        let raw = if self.is_delaying {
            self.pattern_old
        } else {
            self.pattern_new
        };
        // Bit 0 is drawn first, so unreflected graphics are bit-reversed.
        self.pattern = if self.is_reflected {
            raw
        } else {
            raw.reverse_bits()
        };

        if self.is_rendering && self.render_counter >= self.render_counter_trip_point {
            self.collision = if self.pattern & (1 << self.sample_counter) != 0 {
                collision::ENABLED
            } else {
                self.mask_disabled
            };
            return true;
        }
        false
    }

    fn set_divider(&mut self, divider: u8) {
        self.divider = divider;
        self.render_counter_trip_point = if divider == 1 { 0 } else { 1 };
    }

    pub fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
        out.put_short(self.collision);
        out.put_byte(self.color);
        out.put_byte(self.decodes as u8);
        out.put_byte(self.hmm_clocks);
        out.put_byte(self.counter);
        out.put_bool(self.is_moving);
        out.put_bool(self.is_rendering);
        out.put_byte(self.render_counter as u8);
        out.put_byte(self.divider);
        out.put_byte(self.divider_pending);
        out.put_byte(self.divider_change_counter as u8);
        out.put_byte(self.sample_counter);
        out.put_byte(self.pattern_new);
        out.put_byte(self.pattern_old);
        out.put_bool(self.is_reflected);
        out.put_bool(self.is_delaying);
        Ok(())
    }

    pub fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        self.collision = input.get_short()?;
        self.color = input.get_byte()?;
        let decodes = input.get_byte()? as usize;
        if decodes > 6 {
            return Err(StateError::InvalidValue {
                field: "player decodes",
                value: decodes as u64,
            });
        }
        self.decodes = decodes;
        self.hmm_clocks = input.get_byte()?;
        self.counter = input.get_byte()? % H_PIXEL as u8;
        self.is_moving = input.get_bool()?;
        self.is_rendering = input.get_bool()?;
        self.render_counter = input.get_byte()? as i8;
        let divider = input.get_byte()?;
        if !matches!(divider, 1 | 2 | 4) {
            return Err(StateError::InvalidValue {
                field: "player divider",
                value: divider as u64,
            });
        }
        self.set_divider(divider);
        self.divider_pending = input.get_byte()?;
        self.divider_change_counter = input.get_byte()? as i8;
        self.sample_counter = input.get_byte()?;
        self.pattern_new = input.get_byte()?;
        self.pattern_old = input.get_byte()?;
        self.is_reflected = input.get_bool()?;
        self.is_delaying = input.get_bool()?;
        let collision = self.collision;
        self.update_pattern();
        self.collision = collision;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock the player through one visible line and record which counter
    /// positions had the object on.
    fn scan(p: &mut Player) -> Vec<usize> {
        let mut on = Vec::new();
        for x in 0..H_PIXEL as usize {
            p.tick();
            if collision::is_on(p.collision) {
                on.push(x);
            }
        }
        on
    }

    #[test]
    fn single_copy_draws_eight_pixels() {
        let mut p = Player::new(collision::PLAYER0);
        p.grp(0xFF);
        p.resp(157);
        // First line primes the decode; second line is steady state.
        scan(&mut p);
        let on = scan(&mut p);
        assert_eq!(on.len(), 8);
        assert!(on.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn double_width_draws_sixteen_pixels() {
        let mut p = Player::new(collision::PLAYER0);
        p.grp(0xFF);
        p.nusiz(0x05, true);
        scan(&mut p);
        assert_eq!(scan(&mut p).len(), 16);
    }

    #[test]
    fn three_copies_close() {
        let mut p = Player::new(collision::PLAYER1);
        p.grp(0x80);
        p.nusiz(0x03, true);
        scan(&mut p);
        assert_eq!(scan(&mut p).len(), 3);
    }

    #[test]
    fn vdel_shows_old_pattern_until_shuffle() {
        let mut p = Player::new(collision::PLAYER0);
        p.vdelp(1);
        p.grp(0xFF);
        scan(&mut p);
        assert!(scan(&mut p).is_empty());
        p.shuffle_patterns();
        assert_eq!(scan(&mut p).len(), 8);
    }
}
