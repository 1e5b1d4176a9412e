/*!
riot.rs - 6532 RIOT: 128 bytes of RAM, two I/O ports and the interval timer.

Overview
========
- RAM lives in the bus arena and is mapped directly into every page with
  `(addr & 0x1280) == 0x0080`; the device path below only sees RAM accesses
  if something routes them explicitly.
- Port A (SWCHA) carries both joysticks, port B (SWCHB) the console switches.
  Each port has a data direction register; bits configured as outputs read
  back the output latch.
- The timer counts down once every `divider` CPU cycles (1, 8, 64 or 1024).
  After reaching zero it raises the timer flag and keeps counting at one tick
  per cycle from 0xFF. Reading INTIM clears the flag, except on the very cycle
  the timer wrapped.

Timing
======
The RIOT is lazy: `update_emulation` catches up with `System::cycles()` on
every access and at the end of each CPU `execute` call.

Notes
=====
- INSTAT returns the flag register and clears the PA7 edge flag.
- PA7 edges are detected whenever the effective SWCHA value changes (input
  lines, output latch or direction register).
*/

use crate::bus::{AccessType, BufferId, Device, PageAccess, Span, System};
use crate::error::StateError;
use crate::serializer::Serializer;
use crate::settings::Settings;

pub const RAM_SIZE: usize = 128;

const TIMER_BIT: u8 = 0x80;
const PA7_BIT: u8 = 0x40;
const DIVIDERS: [u32; 4] = [1, 8, 64, 1024];

/// Console front-panel switches on port B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleSwitch {
    Reset,
    Select,
    /// Set = color, clear = black & white.
    Color,
    /// Set = difficulty A (pro).
    LeftDifficulty,
    RightDifficulty,
}

impl ConsoleSwitch {
    fn bit(self) -> u8 {
        match self {
            ConsoleSwitch::Reset => 0x01,
            ConsoleSwitch::Select => 0x02,
            ConsoleSwitch::Color => 0x08,
            ConsoleSwitch::LeftDifficulty => 0x40,
            ConsoleSwitch::RightDifficulty => 0x80,
        }
    }
}

/// Joystick directions; `true` means pushed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Joystick {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Joystick {
    /// Active-low nibble: bit 3 right, bit 2 left, bit 1 down, bit 0 up.
    fn nibble(self) -> u8 {
        let mut n = 0x0F;
        if self.up {
            n &= !0x01;
        }
        if self.down {
            n &= !0x02;
        }
        if self.left {
            n &= !0x04;
        }
        if self.right {
            n &= !0x08;
        }
        n
    }
}

pub struct Riot {
    ram: BufferId,
    randomize_ram: bool,

    timer: u32,
    sub_timer: u32,
    divider: u32,
    wrapped_this_cycle: bool,
    last_cycle: u64,

    ddr_a: u8,
    ddr_b: u8,
    out_a: u8,
    out_b: u8,
    interrupt_flag: u8,
    edge_detect_positive: bool,

    // Inputs driven by the front end.
    joystick_lines: u8,
    switches: u8,
}

impl Riot {
    pub fn new(system: &mut System, settings: &Settings) -> Self {
        Self {
            ram: system.allocate(RAM_SIZE),
            randomize_ram: settings.randomize_ram,
            timer: 0,
            sub_timer: 0,
            divider: 1024,
            wrapped_this_cycle: false,
            last_cycle: 0,
            ddr_a: 0,
            ddr_b: 0,
            out_a: 0,
            out_b: 0,
            interrupt_flag: 0,
            edge_detect_positive: false,
            joystick_lines: 0xFF,
            // Color, both difficulties B, nothing pressed, unused bits high.
            switches: 0x3F,
        }
    }

    pub fn install(&self, system: &mut System) {
        let ram = self.ram;
        let mut base = 0u16;
        while base < 0x2000 {
            match base & 0x1280 {
                0x0080 => {
                    let span = Span::new(ram, (base & 0x7F) as usize);
                    system.set_page_access(
                        base,
                        PageAccess::routed(Device::Riot, AccessType::ReadWrite)
                            .with_peek(span)
                            .with_poke(span),
                    );
                }
                0x0280 => system.set_page_access(
                    base,
                    PageAccess::routed(Device::Riot, AccessType::ReadWrite),
                ),
                _ => {}
            }
            base += crate::bus::PAGE_SIZE;
        }
    }

    pub fn reset(&mut self, system: &mut System) {
        if self.randomize_ram {
            let mut bytes = [0u8; RAM_SIZE];
            system.rng().fill(&mut bytes);
            system.buffer_mut(self.ram).copy_from_slice(&bytes);
        } else {
            system.buffer_mut(self.ram).fill(0);
        }

        // A zero timer hangs some titles at power-on.
        self.timer = 0xFF - (system.rng().next() % 0xFE);
        self.divider = 1024;
        self.sub_timer = 0;
        self.wrapped_this_cycle = false;
        self.last_cycle = system.cycles();

        self.ddr_a = 0;
        self.ddr_b = 0;
        self.out_a = 0;
        self.out_b = 0;
        self.interrupt_flag = 0;
        self.edge_detect_positive = false;
    }

    // ---------------------------------------------------------------------
    // Inputs
    // ---------------------------------------------------------------------

    /// Update one joystick. Player 0 drives the high nibble of SWCHA.
    pub fn set_joystick(&mut self, player: usize, stick: Joystick) {
        let before = self.swcha();
        self.joystick_lines = match player {
            0 => (self.joystick_lines & 0x0F) | (stick.nibble() << 4),
            _ => (self.joystick_lines & 0xF0) | stick.nibble(),
        };
        self.detect_pa7_edge(before);
    }

    /// `on` = pressed for Reset/Select, color mode for Color, A for the difficulties.
    pub fn set_switch(&mut self, switch: ConsoleSwitch, on: bool) {
        let bit = switch.bit();
        let active_low = matches!(switch, ConsoleSwitch::Reset | ConsoleSwitch::Select);
        if on != active_low {
            self.switches |= bit;
        } else {
            self.switches &= !bit;
        }
    }

    // ---------------------------------------------------------------------
    // Bus interface
    // ---------------------------------------------------------------------

    pub fn update_emulation(&mut self, system: &System) {
        let now = system.cycles();
        let mut cycles = now.saturating_sub(self.last_cycle);
        if cycles == 0 {
            return;
        }
        let sub_timer = self.sub_timer as u64;
        let divider = self.divider as u64;

        self.wrapped_this_cycle = false;
        self.sub_timer = ((cycles + sub_timer) % divider) as u32;

        if self.interrupt_flag & TIMER_BIT == 0 {
            let ticks = (cycles + sub_timer) / divider;
            let timer = self.timer as u64;
            if ticks > timer {
                cycles -= (timer + 1) * divider - sub_timer;
                self.wrapped_this_cycle = cycles == 0;
                self.timer = 0xFF;
                self.interrupt_flag |= TIMER_BIT;
            } else {
                self.timer = (timer - ticks) as u32;
                cycles = 0;
            }
        }

        if cycles > 0 {
            self.wrapped_this_cycle = cycles % 0x100 == 0;
            self.timer = ((self.timer as u64).wrapping_sub(cycles) & 0xFF) as u32;
        }

        self.last_cycle = now;
    }

    pub fn peek(&mut self, system: &mut System, addr: u16) -> u8 {
        self.update_emulation(system);

        if addr & 0x0200 == 0 {
            return system.buffer(self.ram)[(addr & 0x7F) as usize];
        }

        match addr & 0x07 {
            0x00 => self.swcha(),
            0x01 => self.ddr_a,
            0x02 => (self.out_b & self.ddr_b) | (self.switches & !self.ddr_b),
            0x03 => self.ddr_b,
            0x04 | 0x06 => {
                if !self.wrapped_this_cycle {
                    self.interrupt_flag &= !TIMER_BIT;
                }
                self.timer as u8
            }
            _ => {
                let result = self.interrupt_flag;
                self.interrupt_flag &= !PA7_BIT;
                result
            }
        }
    }

    pub fn poke(&mut self, system: &mut System, addr: u16, value: u8) -> bool {
        self.update_emulation(system);

        if addr & 0x0200 == 0 {
            system.buffer_mut(self.ram)[(addr & 0x7F) as usize] = value;
            return true;
        }

        if addr & 0x04 != 0 {
            if addr & 0x10 != 0 {
                self.interrupt_flag &= !TIMER_BIT;
                self.set_timer(value, (addr & 0x03) as usize);
            } else {
                self.edge_detect_positive = addr & 0x01 != 0;
            }
        } else {
            let before = self.swcha();
            match addr & 0x03 {
                0x00 => self.out_a = value,
                0x01 => self.ddr_a = value,
                0x02 => self.out_b = value,
                _ => self.ddr_b = value,
            }
            self.detect_pa7_edge(before);
        }
        true
    }

    fn set_timer(&mut self, value: u8, interval: usize) {
        self.divider = DIVIDERS[interval];
        self.timer = value as u32;
        self.sub_timer = self.divider - 1;
        self.wrapped_this_cycle = false;
    }

    #[inline]
    fn swcha(&self) -> u8 {
        (self.out_a | !self.ddr_a) & self.joystick_lines
    }

    fn detect_pa7_edge(&mut self, before: u8) {
        let was = before & 0x80 != 0;
        let now = self.swcha() & 0x80 != 0;
        if (self.edge_detect_positive && !was && now) || (!self.edge_detect_positive && was && !now)
        {
            self.interrupt_flag |= PA7_BIT;
        }
    }

    /// Timer value as the CPU would read it, without side effects.
    pub fn intim(&self) -> u8 {
        self.timer as u8
    }

    pub fn timer_flag(&self) -> bool {
        self.interrupt_flag & TIMER_BIT != 0
    }

    // ---------------------------------------------------------------------
    // State
    // ---------------------------------------------------------------------

    pub fn save_with(&self, out: &mut Serializer, system: &System) -> Result<(), StateError> {
        out.put_string("M6532");
        out.put_byte_array(system.buffer(self.ram));
        out.put_int(self.timer);
        out.put_int(self.sub_timer);
        out.put_int(self.divider);
        out.put_bool(self.wrapped_this_cycle);
        out.put_long(self.last_cycle);
        out.put_byte(self.ddr_a);
        out.put_byte(self.ddr_b);
        out.put_byte(self.out_a);
        out.put_byte(self.out_b);
        out.put_byte(self.interrupt_flag);
        out.put_bool(self.edge_detect_positive);
        Ok(())
    }

    pub fn load_with(
        &mut self,
        input: &mut Serializer,
        system: &mut System,
    ) -> Result<(), StateError> {
        input.expect_tag("M6532")?;
        let mut ram = [0u8; RAM_SIZE];
        input.get_byte_array(&mut ram)?;
        let timer = input.get_int()?;
        let sub_timer = input.get_int()?;
        let divider = input.get_int()?;
        if !DIVIDERS.contains(&divider) {
            return Err(StateError::InvalidValue {
                field: "riot divider",
                value: divider as u64,
            });
        }
        system.buffer_mut(self.ram).copy_from_slice(&ram);
        self.timer = timer;
        self.sub_timer = sub_timer;
        self.divider = divider;
        self.wrapped_this_cycle = input.get_bool()?;
        self.last_cycle = input.get_long()?;
        self.ddr_a = input.get_byte()?;
        self.ddr_b = input.get_byte()?;
        self.out_a = input.get_byte()?;
        self.out_b = input.get_byte()?;
        self.interrupt_flag = input.get_byte()?;
        self.edge_detect_positive = input.get_bool()?;
        Ok(())
    }
}
