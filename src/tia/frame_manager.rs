/*!
frame_manager.rs - Frame boundary detection.

Overview
========
The TIA has no notion of a frame; the kernel running on the CPU produces
one by toggling VSYNC. A `FrameDetector` watches VSYNC, VBLANK and the line
clock and tells the TIA when a frame is complete and when the visible window
starts. `FrameManager` is the default implementation, driven by a fixed
NTSC or PAL layout.

States
------
  WaitForVsyncStart --vsync on--> WaitForVsyncEnd --vsync off--> WaitForFrameStart
  WaitForFrameStart --ystart lines--> Frame --height lines--> WaitForVsyncStart

Entering WaitForFrameStart completes the frame. A kernel that never toggles
VSYNC still produces frames: after `MAX_LINES_VSYNC` extra lines the manager
gives up waiting.
*/

use crate::error::StateError;
use crate::serializer::Serializer;
use crate::settings::ConsoleTiming;

const VSYNC_LINES: u32 = 3;
const MAX_LINES_VSYNC: u32 = 50;
const VISIBLE_OVERSCAN: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    None,
    /// The frame just finished; the back buffer is ready.
    Complete,
    /// The visible window starts with the next line.
    RenderingStart,
}

/// Frame boundary detection used by the TIA.
pub trait FrameDetector {
    fn reset(&mut self);
    /// Called once per scanline, after the horizontal counter wrapped.
    fn next_line(&mut self) -> FrameEvent;
    fn set_vsync(&mut self, vsync: bool) -> FrameEvent;
    fn set_vblank(&mut self, vblank: bool);

    fn vblank(&self) -> bool;
    fn vsync(&self) -> bool;
    fn is_rendering(&self) -> bool;
    /// Current line inside the visible window.
    fn y(&self) -> u32;
    /// Height of the visible window in lines.
    fn height(&self) -> u32;
    fn ystart(&self) -> u32;
    fn missing_scanlines(&self) -> u32;
    /// Lines seen so far in the current frame.
    fn scanlines(&self) -> u32;
    fn scanlines_last_frame(&self) -> u32;
    fn frame_count(&self) -> u64;

    fn save_state(&self, out: &mut Serializer) -> Result<(), StateError>;
    fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitForVsyncStart,
    WaitForVsyncEnd,
    WaitForFrameStart,
    Frame,
}

impl State {
    fn to_byte(self) -> u8 {
        match self {
            State::WaitForVsyncStart => 0,
            State::WaitForVsyncEnd => 1,
            State::WaitForFrameStart => 2,
            State::Frame => 3,
        }
    }

    fn from_byte(b: u8) -> Result<Self, StateError> {
        Ok(match b {
            0 => State::WaitForVsyncStart,
            1 => State::WaitForVsyncEnd,
            2 => State::WaitForFrameStart,
            3 => State::Frame,
            other => {
                return Err(StateError::InvalidValue {
                    field: "frame manager state",
                    value: other as u64,
                });
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct FrameManager {
    frame_lines: u32,
    height: u32,
    ystart: u32,

    state: State,
    line_in_state: u32,
    vsync_lines: u32,
    y: u32,
    last_y: u32,
    vsync: bool,
    vblank: bool,

    current_frame_total_lines: u32,
    current_frame_final_lines: u32,
    total_frames: u64,
}

impl FrameManager {
    pub fn new(timing: ConsoleTiming, ystart: Option<u32>) -> Self {
        let (vblank, kernel, overscan) = match timing {
            ConsoleTiming::Ntsc => (37, 192, 30),
            ConsoleTiming::Pal => (45, 228, 36),
        };
        let mut fm = Self {
            frame_lines: VSYNC_LINES + vblank + kernel + overscan,
            height: kernel + VISIBLE_OVERSCAN,
            ystart: ystart.unwrap_or(vblank),
            state: State::WaitForVsyncStart,
            line_in_state: 0,
            vsync_lines: 0,
            y: 0,
            last_y: 0,
            vsync: false,
            vblank: false,
            current_frame_total_lines: 0,
            current_frame_final_lines: 0,
            total_frames: 0,
        };
        fm.reset();
        fm
    }

    /// Lines per frame of the configured layout.
    pub fn frame_lines(&self) -> u32 {
        self.frame_lines
    }

    fn set_state(&mut self, state: State) -> FrameEvent {
        if self.state == state {
            return FrameEvent::None;
        }
        self.state = state;
        self.line_in_state = 0;

        match state {
            State::WaitForFrameStart => {
                self.current_frame_final_lines = self.current_frame_total_lines;
                self.current_frame_total_lines = 0;
                self.total_frames += 1;
                self.vsync_lines = 0;
                log::trace!(
                    "frame {} complete ({} lines)",
                    self.total_frames,
                    self.current_frame_final_lines
                );
                FrameEvent::Complete
            }
            State::Frame => {
                self.y = 0;
                FrameEvent::RenderingStart
            }
            _ => FrameEvent::None,
        }
    }
}

impl FrameDetector for FrameManager {
    fn reset(&mut self) {
        self.state = State::WaitForVsyncStart;
        self.line_in_state = 0;
        self.vsync_lines = 0;
        self.y = 0;
        self.last_y = 0;
        self.vsync = false;
        self.vblank = false;
        self.current_frame_total_lines = 0;
        self.current_frame_final_lines = 0;
        self.total_frames = 0;
    }

    fn next_line(&mut self) -> FrameEvent {
        self.current_frame_total_lines += 1;
        let previous = self.state;
        self.line_in_state += 1;

        let event = match self.state {
            State::WaitForVsyncStart => {
                if self.current_frame_total_lines > self.frame_lines - 3 || self.total_frames == 0
                {
                    self.vsync_lines += 1;
                }
                if self.vsync_lines > MAX_LINES_VSYNC {
                    self.set_state(State::WaitForFrameStart)
                } else {
                    FrameEvent::None
                }
            }
            State::WaitForVsyncEnd => {
                self.vsync_lines += 1;
                if self.vsync_lines > MAX_LINES_VSYNC {
                    self.set_state(State::WaitForFrameStart)
                } else {
                    FrameEvent::None
                }
            }
            State::WaitForFrameStart => {
                if self.line_in_state >= self.ystart {
                    self.set_state(State::Frame)
                } else {
                    FrameEvent::None
                }
            }
            State::Frame => {
                if self.line_in_state >= self.height {
                    self.last_y = self.ystart + self.y;
                    self.set_state(State::WaitForVsyncStart)
                } else {
                    FrameEvent::None
                }
            }
        };

        if self.state == State::Frame && previous == State::Frame {
            self.y += 1;
        }
        event
    }

    fn set_vsync(&mut self, vsync: bool) -> FrameEvent {
        if vsync == self.vsync {
            return FrameEvent::None;
        }
        self.vsync = vsync;

        match self.state {
            State::WaitForVsyncStart | State::WaitForFrameStart => {
                if self.state == State::WaitForVsyncStart {
                    self.vsync_lines = 0;
                }
                if vsync {
                    self.set_state(State::WaitForVsyncEnd)
                } else {
                    FrameEvent::None
                }
            }
            State::WaitForVsyncEnd => {
                if vsync {
                    FrameEvent::None
                } else {
                    self.set_state(State::WaitForFrameStart)
                }
            }
            State::Frame => {
                if vsync {
                    self.set_state(State::WaitForVsyncEnd)
                } else {
                    FrameEvent::None
                }
            }
        }
    }

    fn set_vblank(&mut self, vblank: bool) {
        self.vblank = vblank;
    }

    fn vblank(&self) -> bool {
        self.vblank
    }

    fn vsync(&self) -> bool {
        self.vsync
    }

    fn is_rendering(&self) -> bool {
        self.state == State::Frame
    }

    fn y(&self) -> u32 {
        self.y
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn ystart(&self) -> u32 {
        self.ystart
    }

    fn missing_scanlines(&self) -> u32 {
        if self.last_y == self.ystart + self.y {
            0
        } else {
            self.height.saturating_sub(self.y)
        }
    }

    fn scanlines(&self) -> u32 {
        self.current_frame_total_lines
    }

    fn scanlines_last_frame(&self) -> u32 {
        self.current_frame_final_lines
    }

    fn frame_count(&self) -> u64 {
        self.total_frames
    }

    fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
        out.put_byte(self.state.to_byte());
        out.put_int(self.line_in_state);
        out.put_int(self.vsync_lines);
        out.put_int(self.y);
        out.put_int(self.last_y);
        out.put_bool(self.vsync);
        out.put_bool(self.vblank);
        out.put_int(self.current_frame_total_lines);
        out.put_int(self.current_frame_final_lines);
        out.put_long(self.total_frames);
        Ok(())
    }

    fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        self.state = State::from_byte(input.get_byte()?)?;
        self.line_in_state = input.get_int()?;
        self.vsync_lines = input.get_int()?;
        self.y = input.get_int()?;
        self.last_y = input.get_int()?;
        self.vsync = input.get_bool()?;
        self.vblank = input.get_bool()?;
        self.current_frame_total_lines = input.get_int()?;
        self.current_frame_final_lines = input.get_int()?;
        self.total_frames = input.get_long()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive one kernel frame: 3 lines of VSYNC then `lines - 3` more.
    fn frame(fm: &mut FrameManager, lines: u32) -> Vec<FrameEvent> {
        let mut events = vec![fm.set_vsync(true)];
        for _ in 0..3 {
            events.push(fm.next_line());
        }
        events.push(fm.set_vsync(false));
        for _ in 3..lines {
            events.push(fm.next_line());
        }
        events.retain(|e| *e != FrameEvent::None);
        events
    }

    #[test]
    fn ntsc_frame_cycle() {
        let mut fm = FrameManager::new(ConsoleTiming::Ntsc, None);
        assert_eq!(
            frame(&mut fm, 262),
            vec![FrameEvent::Complete, FrameEvent::RenderingStart]
        );
        frame(&mut fm, 262);
        assert_eq!(fm.frame_count(), 2);
        assert_eq!(fm.scanlines_last_frame(), 262);
        assert_eq!(fm.height(), 212);
    }

    #[test]
    fn missing_vsync_times_out() {
        let mut fm = FrameManager::new(ConsoleTiming::Pal, None);
        frame(&mut fm, 312);
        let before = fm.frame_count();
        let mut completed = false;
        for _ in 0..(312 + MAX_LINES_VSYNC + 5) {
            completed |= fm.next_line() == FrameEvent::Complete;
        }
        assert!(completed);
        assert_eq!(fm.frame_count(), before + 1);
    }

    #[test]
    fn rendering_window() {
        let mut fm = FrameManager::new(ConsoleTiming::Ntsc, Some(10));
        fm.set_vsync(true);
        fm.next_line();
        fm.set_vsync(false);
        for _ in 0..9 {
            fm.next_line();
            assert!(!fm.is_rendering());
        }
        assert_eq!(fm.next_line(), FrameEvent::RenderingStart);
        assert!(fm.is_rendering());
        assert_eq!(fm.y(), 0);
        fm.next_line();
        assert_eq!(fm.y(), 1);
    }
}
