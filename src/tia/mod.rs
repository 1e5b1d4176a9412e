/*!
TIA - video and audio chip.

Overview
========
The TIA is clocked three times per CPU cycle. It does not run on its own:
every access from the CPU (and the end of each `Cpu::execute`) calls
`update_emulation`, which catches up by `3 * elapsed cycles` color clocks.

Per color clock (`cycle`):
  1. apply writes that became due in the delay queue
  2. promote a scheduled collision update
  3. HMOVE movement pulses (every fourth clock while in progress)
  4. horizontal blank or visible frame tick (objects, playfield, pixel)
  5. latch collisions when required and not in VBLANK
  6. advance the horizontal counter; 228 starts a new line
  7. audio

Modules
=======
- registers: addresses, delays, collision masks, timing constants
- delay_queue: deferred register writes
- draw_counter: NUSIZ copy decode tables
- player / missile / ball / playfield: the six graphics objects
- frame_manager: `FrameDetector` trait and the default VSYNC tracker
- latched_input: INPT4/INPT5 fire latches
- audio: two channels plus mixing/resampling into `AudioQueue`
- palette: color index to RGB

Halt
====
A write to WSYNC raises the bus halt line. The CPU runs the installed handler
(`on_halt`) before its next read, which advances the clock to the end of the
line. The next line always releases the request.
*/

pub mod audio;
pub mod ball;
pub mod delay_queue;
pub mod draw_counter;
pub mod frame_manager;
pub mod latched_input;
pub mod missile;
pub mod palette;
pub mod player;
pub mod playfield;
pub mod registers;

use std::sync::Arc;

use crate::audio_queue::AudioQueue;
use crate::bus::{AccessType, Device, EmulationFault, PAGE_SIZE, PageAccess, System};
use crate::error::{CoreError, StateError};
use crate::serializer::{Serializable, Serializer};
use crate::settings::{ConsoleTiming, Settings};

use audio::Audio;
use ball::Ball;
use delay_queue::DelayQueue;
use frame_manager::{FrameDetector, FrameEvent, FrameManager};
use latched_input::LatchedInput;
use missile::Missile;
use player::Player;
use playfield::Playfield;
use registers::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HState {
    Blank,
    Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Priority {
    Normal,
    Score,
    Playfield,
}

impl Priority {
    fn from_ctrlpf(value: u8) -> Self {
        if value & 0x04 != 0 {
            Priority::Playfield
        } else if value & 0x02 != 0 {
            Priority::Score
        } else {
            Priority::Normal
        }
    }
}

const BUFFER_LEN: usize = (H_PIXEL * FRAME_BUFFER_HEIGHT) as usize;

pub struct Tia {
    timing: ConsoleTiming,
    pins_driven: bool,

    frame_manager: Box<dyn FrameDetector>,
    delay_queue: DelayQueue,

    player0: Player,
    player1: Player,
    missile0: Missile,
    missile1: Missile,
    ball: Ball,
    playfield: Playfield,
    audio: Audio,

    input0: LatchedInput,
    input1: LatchedInput,
    fire: [bool; 2],

    hstate: HState,
    hctr: u32,
    hctr_delta: u32,
    priority: Priority,
    color_bk: u8,

    collision_update_required: bool,
    collision_update_scheduled: bool,
    collision_mask: u16,

    movement_clock: u32,
    movement_in_progress: bool,
    extended_hblank: bool,

    last_cycle: u64,
    sub_clock: u32,
    timestamp: u64,

    shadow: [u8; SHADOW_COUNT],
    back_buffer: Vec<u8>,
    front_buffer: Vec<u8>,
}

impl Tia {
    pub fn new(settings: &Settings) -> Self {
        Self {
            timing: settings.timing,
            pins_driven: settings.tia_pins_driven,
            frame_manager: Box::new(FrameManager::new(settings.timing, settings.ystart)),
            delay_queue: DelayQueue::new(),
            player0: Player::new(collision::PLAYER0),
            player1: Player::new(collision::PLAYER1),
            missile0: Missile::new(collision::MISSILE0),
            missile1: Missile::new(collision::MISSILE1),
            ball: Ball::new(),
            playfield: Playfield::new(),
            audio: Audio::new(settings.timing.native_audio_rate()),
            input0: LatchedInput::default(),
            input1: LatchedInput::default(),
            fire: [false; 2],
            hstate: HState::Blank,
            hctr: 0,
            hctr_delta: 0,
            priority: Priority::Normal,
            color_bk: 0,
            collision_update_required: false,
            collision_update_scheduled: false,
            collision_mask: 0,
            movement_clock: 0,
            movement_in_progress: false,
            extended_hblank: false,
            last_cycle: 0,
            sub_clock: 0,
            timestamp: 0,
            shadow: [0; SHADOW_COUNT],
            back_buffer: vec![0; BUFFER_LEN],
            front_buffer: vec![0; BUFFER_LEN],
        }
    }

    /// Claim every page where `(addr & 0x1080) == 0`.
    pub fn install(&self, system: &mut System) {
        let mut base = 0u16;
        while base < 0x2000 {
            if base & 0x1080 == 0 {
                system.set_page_access(
                    base,
                    PageAccess::routed(Device::Tia, AccessType::ReadWrite),
                );
            }
            base += PAGE_SIZE;
        }
    }

    pub fn reset(&mut self, system: &mut System) {
        self.hctr = 0;
        self.hctr_delta = 0;
        self.hstate = HState::Blank;
        self.priority = Priority::Normal;
        self.color_bk = 0;
        self.collision_update_required = false;
        self.collision_update_scheduled = false;
        self.collision_mask = 0;
        self.movement_clock = 0;
        self.movement_in_progress = false;
        self.extended_hblank = false;
        self.last_cycle = system.cycles();
        self.sub_clock = 0;
        self.timestamp = 0;
        self.shadow = [0; SHADOW_COUNT];

        self.delay_queue.reset();
        self.frame_manager.reset();
        self.player0.reset();
        self.player1.reset();
        self.missile0.reset();
        self.missile1.reset();
        self.ball.reset();
        self.playfield.reset();
        self.audio.reset();
        self.input0.reset();
        self.input1.reset();

        self.back_buffer.fill(0);
        self.front_buffer.fill(0);
    }

    // ---------------------------------------------------------------------
    // Front-end surface
    // ---------------------------------------------------------------------

    #[inline]
    pub fn timing(&self) -> ConsoleTiming {
        self.timing
    }

    /// Last completed frame: `160 x height()` color indices.
    pub fn front_buffer(&self) -> &[u8] {
        let len = (H_PIXEL * self.height()) as usize;
        &self.front_buffer[..len]
    }

    pub fn height(&self) -> u32 {
        self.frame_manager.height().min(FRAME_BUFFER_HEIGHT)
    }

    /// Values last written to each write register (debugger view).
    #[inline]
    pub fn registers(&self) -> &[u8; SHADOW_COUNT] {
        &self.shadow
    }

    #[inline]
    pub fn collision_mask(&self) -> u16 {
        self.collision_mask
    }

    #[inline]
    pub fn scanline(&self) -> u32 {
        self.frame_manager.scanlines()
    }

    #[inline]
    pub fn hpos(&self) -> u32 {
        self.hctr
    }

    pub fn frame_detector(&self) -> &dyn FrameDetector {
        self.frame_manager.as_ref()
    }

    pub fn set_frame_detector(&mut self, detector: Box<dyn FrameDetector>) {
        self.frame_manager = detector;
    }

    /// Fire button for joystick `player` (0 drives INPT4, 1 drives INPT5).
    pub fn set_fire(&mut self, player: usize, pressed: bool) {
        if let Some(f) = self.fire.get_mut(player) {
            *f = pressed;
        }
    }

    pub fn set_audio_queue(&mut self, queue: Option<Arc<AudioQueue>>) -> Result<(), CoreError> {
        self.audio.set_queue(queue)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    // ---------------------------------------------------------------------
    // Bus interface
    // ---------------------------------------------------------------------

    /// Run the color clocks owed since the last call.
    pub fn update_emulation(&mut self, system: &mut System) {
        let now = system.cycles();
        let clocks =
            CYCLE_CLOCKS * now.saturating_sub(self.last_cycle) as u32 + self.sub_clock;
        self.sub_clock = 0;
        self.last_cycle = now;
        self.cycle(system, clocks);
    }

    /// Halt handler for WSYNC: stall the CPU until the line wraps.
    pub fn on_halt(&mut self, system: &mut System) {
        self.sub_clock += (H_CLOCKS - self.hctr) % H_CLOCKS;
        system.increment_cycles((self.sub_clock / CYCLE_CLOCKS) as u64);
        self.sub_clock %= CYCLE_CLOCKS;
    }

    pub fn peek(&mut self, system: &mut System, addr: u16) -> u8 {
        self.update_emulation(system);

        let mut bus = system.data_bus_state();
        if self.pins_driven {
            bus = (bus & 0xC0) | (system.rng().next_byte() & 0x3F);
        }

        let mask = self.collision_mask;
        let hit = |a: u16, b: u16, bit: u8| if mask & a & b != 0 { bit } else { 0 };

        let result = match (addr & READ_MASK) as u8 {
            CXM0P => {
                hit(collision::MISSILE0, collision::PLAYER1, 0x80)
                    | hit(collision::MISSILE0, collision::PLAYER0, 0x40)
            }
            CXM1P => {
                hit(collision::MISSILE1, collision::PLAYER0, 0x80)
                    | hit(collision::MISSILE1, collision::PLAYER1, 0x40)
            }
            CXP0FB => {
                hit(collision::PLAYER0, collision::PLAYFIELD, 0x80)
                    | hit(collision::PLAYER0, collision::BALL, 0x40)
            }
            CXP1FB => {
                hit(collision::PLAYER1, collision::PLAYFIELD, 0x80)
                    | hit(collision::PLAYER1, collision::BALL, 0x40)
            }
            CXM0FB => {
                hit(collision::MISSILE0, collision::PLAYFIELD, 0x80)
                    | hit(collision::MISSILE0, collision::BALL, 0x40)
            }
            CXM1FB => {
                hit(collision::MISSILE1, collision::PLAYFIELD, 0x80)
                    | hit(collision::MISSILE1, collision::BALL, 0x40)
            }
            CXBLPF => hit(collision::BALL, collision::PLAYFIELD, 0x80),
            CXPPMM => {
                hit(collision::PLAYER0, collision::PLAYER1, 0x80)
                    | hit(collision::MISSILE0, collision::MISSILE1, 0x40)
            }
            // No paddles: the dump capacitors never charge.
            INPT0 | INPT1 | INPT2 | INPT3 => bus & 0x40,
            INPT4 => self.input0.inpt(self.fire[0]) | (bus & 0x40),
            INPT5 => self.input1.inpt(self.fire[1]) | (bus & 0x40),
            _ => 0,
        };

        (result & 0xC0) | (bus & 0x3F)
    }

    pub fn poke(&mut self, system: &mut System, addr: u16, value: u8) -> bool {
        let address = (addr & WRITE_MASK) as u8;
        self.update_emulation(system);
        self.shadow[address as usize] = value;

        let hblank = self.hstate == HState::Blank;
        let mut schedule = false;

        match address {
            WSYNC => {
                if let Err(e) = system.request_halt() {
                    system.raise_fault(EmulationFault::Fatal(format!("WSYNC: {e}")));
                }
            }
            RSYNC => self.apply_rsync(),
            VSYNC => {
                let event = self.frame_manager.set_vsync(value & 0x02 != 0);
                self.handle_frame_event(system, event);
            }
            VBLANK => {
                self.input0.vblank(value);
                self.input1.vblank(value);
                self.delay_queue.push(VBLANK, value, delay::VBLANK);
            }

            AUDC0 => self.audio.channel0.audc(value),
            AUDC1 => self.audio.channel1.audc(value),
            AUDF0 => self.audio.channel0.audf(value),
            AUDF1 => self.audio.channel1.audf(value),
            AUDV0 => self.audio.channel0.audv(value),
            AUDV1 => self.audio.channel1.audv(value),

            COLUBK => self.color_bk = value & 0xFE,
            COLUP0 => {
                let c = value & 0xFE;
                self.playfield.set_color_p0(c);
                self.missile0.set_color(c);
                self.player0.set_color(c);
            }
            COLUP1 => {
                let c = value & 0xFE;
                self.playfield.set_color_p1(c);
                self.missile1.set_color(c);
                self.player1.set_color(c);
            }
            COLUPF => {
                let c = value & 0xFE;
                self.playfield.set_color(c);
                self.ball.set_color(c);
            }
            CTRLPF => {
                self.priority = Priority::from_ctrlpf(value);
                self.playfield.ctrlpf(value);
                self.ball.ctrlpf(value);
            }

            PF0 | PF1 | PF2 => self.delay_queue.push(address, value, delay::PF),
            ENAM0 | ENAM1 => self.delay_queue.push(address, value, delay::ENAM),
            ENABL => self.delay_queue.push(address, value, delay::ENABL),
            REFP0 | REFP1 => self.delay_queue.push(address, value, delay::REFP),
            HMOVE => self.delay_queue.push(address, value, delay::HMOVE),
            HMP0 | HMP1 => self.delay_queue.push(address, value, delay::HMP),
            HMM0 | HMM1 => self.delay_queue.push(address, value, delay::HMM),
            HMBL => self.delay_queue.push(address, value, delay::HMBL),
            HMCLR => self.delay_queue.push(address, value, delay::HMCLR),
            GRP0 => {
                self.delay_queue.push(GRP0, value, delay::GRP);
                self.delay_queue.push(SHUFFLE_P1, 0, delay::SHUFFLE_PLAYER);
            }
            GRP1 => {
                self.delay_queue.push(GRP1, value, delay::GRP);
                self.delay_queue.push(SHUFFLE_P0, 0, delay::SHUFFLE_PLAYER);
                self.delay_queue.push(SHUFFLE_BL, 0, delay::SHUFFLE_BALL);
            }

            RESP0 => self.player0.resp(self.resx_counter()),
            RESP1 => self.player1.resp(self.resx_counter()),
            RESM0 => self.missile0.resm(self.resx_counter(), hblank),
            RESM1 => self.missile1.resm(self.resx_counter(), hblank),
            RESBL => self.ball.resbl(self.resx_counter()),

            NUSIZ0 => {
                self.missile0.nusiz(value);
                self.player0.nusiz(value, hblank);
            }
            NUSIZ1 => {
                self.missile1.nusiz(value);
                self.player1.nusiz(value, hblank);
            }

            VDELP0 => schedule = self.player0.vdelp(value),
            VDELP1 => schedule = self.player1.vdelp(value),
            VDELBL => schedule = self.ball.vdelbl(value),
            RESMP0 => schedule = self.missile0.resmp(value, &self.player0),
            RESMP1 => schedule = self.missile1.resmp(value, &self.player1),
            CXCLR => self.collision_mask = 0,

            _ => {}
        }

        self.collision_update_scheduled |= schedule;
        true
    }

    // ---------------------------------------------------------------------
    // Clocking
    // ---------------------------------------------------------------------

    pub(crate) fn cycle(&mut self, system: &mut System, clocks: u32) {
        for _ in 0..clocks {
            for (address, value) in self.delay_queue.execute() {
                self.delayed_write(address, value);
            }

            self.collision_update_required = self.collision_update_scheduled;
            self.collision_update_scheduled = false;

            self.tick_movement();

            match self.hstate {
                HState::Blank => self.tick_hblank(),
                HState::Frame => self.tick_hframe(),
            }

            if self.collision_update_required && !self.frame_manager.vblank() {
                self.update_collision();
            }

            self.hctr += 1;
            if self.hctr >= H_CLOCKS {
                self.next_line(system);
            }

            self.audio.tick();
            self.timestamp += 1;
        }
    }

    fn delayed_write(&mut self, address: u8, value: u8) {
        let changed = match address {
            VBLANK => {
                self.frame_manager.set_vblank(value & 0x02 != 0);
                false
            }
            HMOVE => {
                self.movement_clock = 0;
                self.movement_in_progress = true;
                if !self.extended_hblank {
                    self.clear_hmove_comb();
                    self.extended_hblank = true;
                }
                self.missile0.start_movement();
                self.missile1.start_movement();
                self.player0.start_movement();
                self.player1.start_movement();
                self.ball.start_movement();
                false
            }
            PF0 => {
                self.playfield.pf0(value);
                false
            }
            PF1 => {
                self.playfield.pf1(value);
                false
            }
            PF2 => {
                self.playfield.pf2(value);
                false
            }
            HMM0 => {
                self.missile0.hmm(value);
                false
            }
            HMM1 => {
                self.missile1.hmm(value);
                false
            }
            HMP0 => {
                self.player0.hmp(value);
                false
            }
            HMP1 => {
                self.player1.hmp(value);
                false
            }
            HMBL => {
                self.ball.hmbl(value);
                false
            }
            HMCLR => {
                self.missile0.hmm(0);
                self.missile1.hmm(0);
                self.player0.hmp(0);
                self.player1.hmp(0);
                self.ball.hmbl(0);
                false
            }
            GRP0 => self.player0.grp(value),
            GRP1 => self.player1.grp(value),
            SHUFFLE_P0 => self.player0.shuffle_patterns(),
            SHUFFLE_P1 => self.player1.shuffle_patterns(),
            SHUFFLE_BL => self.ball.shuffle_status(),
            REFP0 => self.player0.refp(value),
            REFP1 => self.player1.refp(value),
            ENAM0 => self.missile0.enam(value),
            ENAM1 => self.missile1.enam(value),
            ENABL => self.ball.enabl(value),
            _ => false,
        };
        self.collision_update_scheduled |= changed;
    }

    fn tick_movement(&mut self) {
        if !self.movement_in_progress || self.hctr & 0x03 != 0 {
            return;
        }

        let hblank = self.hstate == HState::Blank;
        let counter = if self.movement_clock > 15 {
            0
        } else {
            self.movement_clock as u8
        };

        let m0 = self.missile0.movement_tick(counter, self.hctr, hblank);
        let m1 = self.missile1.movement_tick(counter, self.hctr, hblank);
        let p0 = self.player0.movement_tick(counter, hblank);
        let p1 = self.player1.movement_tick(counter, hblank);
        let bl = self.ball.movement_tick(counter, hblank);

        self.movement_in_progress = m0 || m1 || p0 || p1 || bl;
        self.collision_update_required |= self.movement_in_progress;
        self.movement_clock += 1;
    }

    fn tick_hblank(&mut self) {
        match self.hctr {
            0 => self.extended_hblank = false,
            h if h == H_BLANK_CLOCKS - 1 && !self.extended_hblank => {
                self.hstate = HState::Frame;
            }
            h if h == H_BLANK_CLOCKS + 7 && self.extended_hblank => {
                self.hstate = HState::Frame;
            }
            _ => {}
        }

        if self.extended_hblank && self.hctr > H_BLANK_CLOCKS - 1 {
            self.playfield.tick(self.visible_x());
        }
    }

    fn tick_hframe(&mut self) {
        let x = self.visible_x();
        self.collision_update_required = true;

        self.playfield.tick(x);
        self.missile0.tick(self.hctr);
        self.missile1.tick(self.hctr);
        self.player0.tick();
        self.player1.tick();
        self.ball.tick();

        if self.frame_manager.is_rendering() {
            self.render_pixel(x, self.frame_manager.y());
        }
    }

    #[inline]
    fn visible_x(&self) -> u32 {
        self.hctr
            .wrapping_sub(H_BLANK_CLOCKS)
            .wrapping_sub(self.hctr_delta)
    }

    fn render_pixel(&mut self, x: u32, y: u32) {
        if x >= H_PIXEL || y >= FRAME_BUFFER_HEIGHT {
            return;
        }

        let color = if self.frame_manager.vblank() {
            0
        } else {
            let bk = self.color_bk;
            match self.priority {
                Priority::Playfield => {
                    let c = self.missile1.get_pixel(bk);
                    let c = self.player1.get_pixel(c);
                    let c = self.missile0.get_pixel(c);
                    let c = self.player0.get_pixel(c);
                    let c = self.playfield.get_pixel(c);
                    self.ball.get_pixel(c)
                }
                Priority::Score => {
                    let c = self.ball.get_pixel(bk);
                    let c = self.missile1.get_pixel(c);
                    let c = self.player1.get_pixel(c);
                    let c = self.playfield.get_pixel(c);
                    let c = self.missile0.get_pixel(c);
                    self.player0.get_pixel(c)
                }
                Priority::Normal => {
                    let c = self.playfield.get_pixel(bk);
                    let c = self.ball.get_pixel(c);
                    let c = self.missile1.get_pixel(c);
                    let c = self.player1.get_pixel(c);
                    let c = self.missile0.get_pixel(c);
                    self.player0.get_pixel(c)
                }
            }
        };

        self.back_buffer[(y * H_PIXEL + x) as usize] = color;
    }

    fn update_collision(&mut self) {
        self.collision_mask |= self.player0.collision
            & self.player1.collision
            & self.missile0.collision
            & self.missile1.collision
            & self.ball.collision
            & self.playfield.collision;
    }

    fn next_line(&mut self, system: &mut System) {
        self.hctr = 0;
        self.hstate = HState::Blank;
        self.hctr_delta = 0;

        let event = self.frame_manager.next_line();
        self.handle_frame_event(system, event);

        self.missile0.next_line();
        self.missile1.next_line();
        self.player0.next_line();
        self.player1.next_line();
        self.ball.next_line();
        self.playfield.next_line();

        system.clear_halt_request();
    }

    fn handle_frame_event(&mut self, system: &mut System, event: FrameEvent) {
        match event {
            FrameEvent::Complete => self.on_frame_complete(system),
            FrameEvent::RenderingStart => log::trace!("rendering starts at scanline {}", self.scanline()),
            FrameEvent::None => {}
        }
    }

    fn on_frame_complete(&mut self, system: &mut System) {
        system.request_stop();

        let missing = self.frame_manager.missing_scanlines();
        if missing > 0 {
            let start = (H_PIXEL * self.frame_manager.y()) as usize;
            let end = (start + (H_PIXEL * missing) as usize).min(BUFFER_LEN);
            if start < end {
                self.back_buffer[start..end].fill(0);
            }
        }

        self.front_buffer.copy_from_slice(&self.back_buffer);
        log::debug!(
            "frame {} complete, {} scanlines",
            self.frame_manager.frame_count(),
            self.frame_manager.scanlines_last_frame()
        );
    }

    fn apply_rsync(&mut self) {
        let x = self.hctr.saturating_sub(H_BLANK_CLOCKS);
        self.hctr_delta = (H_CLOCKS - 3).wrapping_sub(self.hctr);

        let y = self.frame_manager.y();
        if self.frame_manager.is_rendering() && x < H_PIXEL && y < FRAME_BUFFER_HEIGHT {
            let row = (y * H_PIXEL) as usize;
            self.back_buffer[row + x as usize..row + H_PIXEL as usize].fill(0);
        }
        self.hctr = H_CLOCKS - 3;
    }

    /// HMOVE blanks the first 8 pixels of the line.
    fn clear_hmove_comb(&mut self) {
        let y = self.frame_manager.y();
        if self.frame_manager.is_rendering()
            && self.hstate == HState::Blank
            && y < FRAME_BUFFER_HEIGHT
        {
            let row = (y * H_PIXEL) as usize;
            self.back_buffer[row..row + 8].fill(0);
        }
    }

    fn resx_counter(&self) -> u8 {
        match self.hstate {
            HState::Blank if self.hctr >= resx::LATE_HBLANK_THRESHOLD => resx::LATE_HBLANK,
            HState::Blank => resx::HBLANK,
            HState::Frame => resx::FRAME,
        }
    }
}

impl Serializable for Tia {
    fn name(&self) -> &'static str {
        "TIA"
    }

    fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
        out.put_string(self.name());

        out.put_bool(self.hstate == HState::Frame);
        out.put_int(self.hctr);
        out.put_int(self.hctr_delta);
        out.put_byte(match self.priority {
            Priority::Normal => 0,
            Priority::Score => 1,
            Priority::Playfield => 2,
        });
        out.put_byte(self.color_bk);
        out.put_bool(self.collision_update_required);
        out.put_bool(self.collision_update_scheduled);
        out.put_short(self.collision_mask);
        out.put_int(self.movement_clock);
        out.put_bool(self.movement_in_progress);
        out.put_bool(self.extended_hblank);
        out.put_long(self.last_cycle);
        out.put_int(self.sub_clock);
        out.put_long(self.timestamp);
        out.put_byte_array(&self.shadow);

        let (latched0, value0) = self.input0.state();
        let (latched1, value1) = self.input1.state();
        out.put_bool(latched0);
        out.put_byte(value0);
        out.put_bool(latched1);
        out.put_byte(value1);

        self.delay_queue.save_state(out)?;
        self.frame_manager.save_state(out)?;
        self.player0.save_state(out)?;
        self.player1.save_state(out)?;
        self.missile0.save_state(out)?;
        self.missile1.save_state(out)?;
        self.ball.save_state(out)?;
        self.playfield.save_state(out)?;
        self.audio.save_state(out)?;

        out.put_byte_array(&self.back_buffer);
        Ok(())
    }

    fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        input.expect_tag(self.name())?;

        self.hstate = if input.get_bool()? {
            HState::Frame
        } else {
            HState::Blank
        };
        self.hctr = input.get_int()? % H_CLOCKS;
        self.hctr_delta = input.get_int()?;
        self.priority = match input.get_byte()? {
            0 => Priority::Normal,
            1 => Priority::Score,
            2 => Priority::Playfield,
            other => {
                return Err(StateError::InvalidValue {
                    field: "TIA priority",
                    value: other as u64,
                });
            }
        };
        self.color_bk = input.get_byte()?;
        self.collision_update_required = input.get_bool()?;
        self.collision_update_scheduled = input.get_bool()?;
        self.collision_mask = input.get_short()?;
        self.movement_clock = input.get_int()?;
        self.movement_in_progress = input.get_bool()?;
        self.extended_hblank = input.get_bool()?;
        self.last_cycle = input.get_long()?;
        self.sub_clock = input.get_int()? % CYCLE_CLOCKS;
        self.timestamp = input.get_long()?;
        input.get_byte_array(&mut self.shadow)?;

        let (latched0, value0) = (input.get_bool()?, input.get_byte()?);
        let (latched1, value1) = (input.get_bool()?, input.get_byte()?);
        self.input0.set_state(latched0, value0);
        self.input1.set_state(latched1, value1);

        self.delay_queue.load_state(input)?;
        self.frame_manager.load_state(input)?;
        self.player0.load_state(input)?;
        self.player1.load_state(input)?;
        self.missile0.load_state(input)?;
        self.missile1.load_state(input)?;
        self.ball.load_state(input)?;
        self.playfield.load_state(input)?;
        self.audio.load_state(input)?;

        input.get_byte_array(&mut self.back_buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
