//! Missile object (ENAM0 / ENAM1).
//!
//! Shares the player's decode tables. Width comes from NUSIZ bits 4-5. While
//! RESMP is set the missile is hidden and locked to its player; clearing it
//! drops the missile at the player's center.

use super::draw_counter::{decode_id, decodes};
use super::player::Player;
use super::registers::{H_PIXEL, collision};
use crate::error::StateError;
use crate::serializer::Serializer;

const RENDER_COUNTER_OFFSET: i8 = -4;
const WIDTHS: [u8; 4] = [1, 2, 4, 8];

#[derive(Debug, Clone)]
pub struct Missile {
    pub collision: u16,
    mask_disabled: u16,

    color: u8,
    decodes: usize,
    is_enabled: bool,
    enam: bool,
    resmp: bool,
    hmm_clocks: u8,
    counter: u8,
    is_moving: bool,
    width: u8,
    effective_width: u8,
    is_visible: bool,
    is_rendering: bool,
    render_counter: i8,
}

impl Missile {
    pub fn new(mask: u16) -> Self {
        let mut m = Self {
            collision: 0,
            mask_disabled: collision::disabled(mask),
            color: 0,
            decodes: 0,
            is_enabled: false,
            enam: false,
            resmp: false,
            hmm_clocks: 0,
            counter: 0,
            is_moving: false,
            width: 1,
            effective_width: 1,
            is_visible: false,
            is_rendering: false,
            render_counter: 0,
        };
        m.reset();
        m
    }

    pub fn reset(&mut self) {
        self.decodes = 0;
        self.is_enabled = false;
        self.enam = false;
        self.resmp = false;
        self.hmm_clocks = 0;
        self.counter = 0;
        self.is_moving = false;
        self.width = 1;
        self.effective_width = 1;
        self.is_visible = false;
        self.is_rendering = false;
        self.render_counter = 0;
        self.color = 0;
        self.collision = self.mask_disabled;
    }

    pub fn enam(&mut self, value: u8) -> bool {
        let old = self.enam;
        self.enam = value & 0x02 != 0;
        old != self.enam && self.update_enabled()
    }

    pub fn hmm(&mut self, value: u8) {
        self.hmm_clocks = (value >> 4) ^ 0x08;
    }

    pub fn resm(&mut self, counter: u8, hblank: bool) {
        self.counter = counter;
        if !self.is_rendering {
            return;
        }
        let rel = (counter as i16 - 157) as i8;
        if self.render_counter < 0 {
            self.render_counter = RENDER_COUNTER_OFFSET + rel;
            return;
        }
        match self.width {
            8 => {
                self.render_counter = rel + if self.render_counter >= 4 { 4 } else { 0 };
            }
            4 => self.render_counter = rel,
            2 => {
                if hblank {
                    self.is_rendering = self.render_counter > 1;
                } else if self.render_counter == 0 {
                    self.render_counter += 1;
                }
            }
            _ => {
                if hblank {
                    self.is_rendering = self.render_counter > 0;
                }
            }
        }
    }

    pub fn resmp(&mut self, value: u8, player: &Player) -> bool {
        let resmp = value & 0x02 != 0;
        if resmp == self.resmp {
            return false;
        }
        self.resmp = resmp;
        if !resmp {
            self.counter = player.resp_clock();
        }
        self.update_enabled()
    }

    pub fn nusiz(&mut self, value: u8) {
        self.width = WIDTHS[((value & 0x30) >> 4) as usize];
        self.decodes = decode_id(value);
        if self.is_rendering && self.render_counter >= self.width as i8 {
            self.is_rendering = false;
        }
    }

    #[inline]
    pub fn set_color(&mut self, color: u8) {
        self.color = color;
    }

    #[inline]
    pub fn start_movement(&mut self) {
        self.is_moving = true;
    }

    pub fn movement_tick(&mut self, clock: u8, hclock: u32, hblank: bool) -> bool {
        if clock == self.hmm_clocks {
            self.is_moving = false;
        }
        if self.is_moving && hblank {
            self.tick_with(hclock, false);
        }
        self.is_moving
    }

    #[inline]
    pub fn tick(&mut self, hclock: u32) {
        self.tick_with(hclock, true);
    }

    fn tick_with(&mut self, hclock: u32, receiving_mclock: bool) {
        let starfield = self.is_moving && receiving_mclock;

        self.is_visible = self.is_rendering
            && (self.render_counter >= 0
                || (starfield
                    && self.render_counter == -1
                    && self.width < 4
                    && (hclock + 1) % 4 == 3));
        self.refresh_collision();

        if decodes(self.decodes)[self.counter as usize] != 0 && !self.resmp {
            self.is_rendering = true;
            self.render_counter = RENDER_COUNTER_OFFSET;
        } else if self.is_rendering {
            if self.render_counter == -1 {
                if starfield {
                    match (hclock + 1) % 4 {
                        3 => {
                            self.effective_width =
                                if self.width == 1 { 2 } else { self.width };
                            if self.width == 2 {
                                self.render_counter += 1;
                            }
                        }
                        2 => self.effective_width = 0,
                        _ => self.effective_width = self.width,
                    }
                } else {
                    self.effective_width = self.width;
                }
            }

            self.render_counter += 1;
            let limit = if self.is_moving {
                self.effective_width
            } else {
                self.width
            };
            if self.render_counter >= limit as i8 {
                self.is_rendering = false;
            }
        }

        self.counter += 1;
        if self.counter as u32 >= H_PIXEL {
            self.counter = 0;
        }
    }

    pub fn next_line(&mut self) {
        self.is_visible = self.is_rendering && self.render_counter >= 0;
        self.refresh_collision();
    }

    fn refresh_collision(&mut self) {
        self.collision = if self.is_visible && self.is_enabled {
            collision::ENABLED
        } else {
            self.mask_disabled
        };
    }

    fn update_enabled(&mut self) -> bool {
        self.is_enabled = self.enam && !self.resmp;
        self.refresh_collision();
        true
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

    pub fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
        out.put_short(self.collision);
        out.put_byte(self.color);
        out.put_byte(self.decodes as u8);
        out.put_bool(self.is_enabled);
        out.put_bool(self.enam);
        out.put_bool(self.resmp);
        out.put_byte(self.hmm_clocks);
        out.put_byte(self.counter);
        out.put_bool(self.is_moving);
        out.put_byte(self.width);
        out.put_byte(self.effective_width);
        out.put_bool(self.is_visible);
        out.put_bool(self.is_rendering);
        out.put_byte(self.render_counter as u8);
        Ok(())
    }

    pub fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        self.collision = input.get_short()?;
        self.color = input.get_byte()?;
        self.decodes = (input.get_byte()? as usize).min(6);
        self.is_enabled = input.get_bool()?;
        self.enam = input.get_bool()?;
        self.resmp = input.get_bool()?;
        self.hmm_clocks = input.get_byte()?;
        self.counter = input.get_byte()? % H_PIXEL as u8;
        self.is_moving = input.get_bool()?;
        self.width = input.get_byte()?;
        self.effective_width = input.get_byte()?;
        self.is_visible = input.get_bool()?;
        self.is_rendering = input.get_bool()?;
        self.render_counter = input.get_byte()? as i8;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(m: &mut Missile) -> usize {
        (0..H_PIXEL)
            .filter(|&x| {
                m.tick(x + 68);
                collision::is_on(m.collision)
            })
            .count()
    }

    #[test]
    fn width_follows_nusiz() {
        for (nusiz, width) in [(0x00, 1), (0x10, 2), (0x20, 4), (0x30, 8)] {
            let mut m = Missile::new(collision::MISSILE0);
            m.enam(0x02);
            m.nusiz(nusiz);
            scan(&mut m);
            assert_eq!(scan(&mut m), width, "nusiz {nusiz:#04x}");
        }
    }

    #[test]
    fn resmp_hides_missile() {
        let player = Player::new(collision::PLAYER0);
        let mut m = Missile::new(collision::MISSILE0);
        m.enam(0x02);
        m.resmp(0x02, &player);
        scan(&mut m);
        assert_eq!(scan(&mut m), 0);
    }
}
