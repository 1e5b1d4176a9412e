//! Ball object (ENABL). One copy per line, width from CTRLPF bits 4-5,
//! optionally delayed through VDELBL (the old enable bit is shuffled on GRP1).

use super::registers::{H_PIXEL, collision};
use crate::error::StateError;
use crate::serializer::Serializer;

const RENDER_COUNTER_OFFSET: i8 = -4;
const WIDTHS: [u8; 4] = [1, 2, 4, 8];

#[derive(Debug, Clone)]
pub struct Ball {
    pub collision: u16,
    mask_disabled: u16,

    color: u8,
    enabled_old: bool,
    enabled_new: bool,
    is_enabled: bool,
    is_delaying: bool,
    is_visible: bool,
    hmm_clocks: u8,
    counter: u8,
    is_moving: bool,
    width: u8,
    effective_width: u8,
    last_movement_tick: u8,
    is_rendering: bool,
    render_counter: i8,
}

impl Ball {
    pub fn new() -> Self {
        let mask_disabled = collision::disabled(collision::BALL);
        Self {
            collision: mask_disabled,
            mask_disabled,
            color: 0,
            enabled_old: false,
            enabled_new: false,
            is_enabled: false,
            is_delaying: false,
            is_visible: false,
            hmm_clocks: 0,
            counter: 0,
            is_moving: false,
            width: 1,
            effective_width: 1,
            last_movement_tick: 0,
            is_rendering: false,
            render_counter: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn enabl(&mut self, value: u8) -> bool {
        let old = self.enabled_new;
        self.enabled_new = value & 0x02 != 0;
        self.enabled_new != old && !self.is_delaying && self.update_enabled()
    }

    pub fn hmbl(&mut self, value: u8) {
        self.hmm_clocks = (value >> 4) ^ 0x08;
    }

    pub fn resbl(&mut self, counter: u8) {
        self.counter = counter;
        self.is_rendering = true;
        self.render_counter = RENDER_COUNTER_OFFSET + (counter as i16 - 157) as i8;
    }

    pub fn ctrlpf(&mut self, value: u8) {
        self.width = WIDTHS[((value & 0x30) >> 4) as usize];
    }

    pub fn vdelbl(&mut self, value: u8) -> bool {
        let old = self.is_delaying;
        self.is_delaying = value & 0x01 != 0;
        old != self.is_delaying && self.update_enabled()
    }

    pub fn shuffle_status(&mut self) -> bool {
        let old = self.enabled_old;
        self.enabled_old = self.enabled_new;
        self.enabled_old != old && self.is_delaying && self.update_enabled()
    }

    #[inline]
    pub fn set_color(&mut self, color: u8) {
        self.color = color;
    }

    #[inline]
    pub fn start_movement(&mut self) {
        self.is_moving = true;
    }

    pub fn movement_tick(&mut self, clock: u8, hblank: bool) -> bool {
        self.last_movement_tick = self.counter;
        if clock == self.hmm_clocks {
            self.is_moving = false;
        }
        if self.is_moving && hblank {
            self.tick_with(false);
        }
        self.is_moving
    }

    #[inline]
    pub fn tick(&mut self) {
        self.tick_with(true);
    }

    fn tick_with(&mut self, receiving_mclock: bool) {
        self.is_visible = self.is_rendering && self.render_counter >= 0;
        self.refresh_collision();

        let starfield = self.is_moving && receiving_mclock;

        if self.counter == 156 {
            self.is_rendering = true;
            self.render_counter = RENDER_COUNTER_OFFSET;

            let delta = (self.counter as u32 + H_PIXEL - self.last_movement_tick as u32) % 4;
            if starfield && delta == 3 && self.width < 4 {
                self.render_counter += 1;
            }
            self.effective_width = match delta {
                3 => {
                    if self.width == 1 {
                        2
                    } else {
                        self.width
                    }
                }
                2 => 0,
                _ => self.width,
            };
        } else if self.is_rendering {
            self.render_counter += 1;
            let limit = if starfield {
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
        self.is_enabled = if self.is_delaying {
            self.enabled_old
        } else {
            self.enabled_new
        };
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
        out.put_bool(self.enabled_old);
        out.put_bool(self.enabled_new);
        out.put_bool(self.is_enabled);
        out.put_bool(self.is_delaying);
        out.put_bool(self.is_visible);
        out.put_byte(self.hmm_clocks);
        out.put_byte(self.counter);
        out.put_bool(self.is_moving);
        out.put_byte(self.width);
        out.put_byte(self.effective_width);
        out.put_byte(self.last_movement_tick);
        out.put_bool(self.is_rendering);
        out.put_byte(self.render_counter as u8);
        Ok(())
    }

    pub fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        self.collision = input.get_short()?;
        self.color = input.get_byte()?;
        self.enabled_old = input.get_bool()?;
        self.enabled_new = input.get_bool()?;
        self.is_enabled = input.get_bool()?;
        self.is_delaying = input.get_bool()?;
        self.is_visible = input.get_bool()?;
        self.hmm_clocks = input.get_byte()?;
        self.counter = input.get_byte()? % H_PIXEL as u8;
        self.is_moving = input.get_bool()?;
        self.width = input.get_byte()?;
        self.effective_width = input.get_byte()?;
        self.last_movement_tick = input.get_byte()?;
        self.is_rendering = input.get_bool()?;
        self.render_counter = input.get_byte()? as i8;
        Ok(())
    }
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}
