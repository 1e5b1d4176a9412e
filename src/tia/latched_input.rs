//! Fire-button inputs INPT4/INPT5. With VBLANK bit 6 set the input latches:
//! once the button has been pressed the register stays low until the latch
//! is released.

#[derive(Debug, Clone, Default)]
pub struct LatchedInput {
    latched: bool,
    value: u8,
}

impl LatchedInput {
    pub fn reset(&mut self) {
        self.latched = false;
        self.value = 0;
    }

    pub fn vblank(&mut self, value: u8) {
        if value & 0x40 != 0 {
            self.latched = true;
        } else {
            self.latched = false;
            self.value = 0x80;
        }
    }

    /// `pressed` = pin pulled low.
    pub fn inpt(&mut self, pressed: bool) -> u8 {
        let mut value = if pressed { 0x00 } else { 0x80 };
        if self.latched {
            self.value &= value;
            value = self.value;
        }
        value
    }

    pub(crate) fn state(&self) -> (bool, u8) {
        (self.latched, self.value)
    }

    pub(crate) fn set_state(&mut self, latched: bool, value: u8) {
        self.latched = latched;
        self.value = value;
    }
}
