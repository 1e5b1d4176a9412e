/*!
console.rs - A complete machine: 6507 + bus + cartridge.

`Console` owns the CPU and the bus, installs the WSYNC resume handler,
wires the optional audio queue into the TIA and offers frame stepping,
input and whole-machine snapshots to front ends.

Snapshot layout
===============
```text
    string  "VCS-CORE-STATE"
    int     format version
    string  cartridge md5
    ...     bus (system, riot, tia, cartridge)
    ...     cpu (registers, latched requests, halt flag)
```

The bus is restored before the CPU so the CPU can re-assert a pending halt
on the freshly loaded `System`.
*/

use std::sync::Arc;

use log::{debug, error, info};

use crate::audio_queue::AudioQueue;
use crate::bus::Bus;
use crate::cartridge::{Cartridge, SchemeKind};
use crate::cpu::{Cpu, DebugHooks, DispatchResult};
use crate::error::{CoreError, StateError};
use crate::riot::{ConsoleSwitch, Joystick};
use crate::serializer::Serializer;
use crate::settings::Settings;
use crate::tia::palette;

const STATE_MAGIC: &str = "VCS-CORE-STATE";
const STATE_VERSION: u32 = 1;

/// Upper bound for one `run_frame` call. A well-behaved kernel stops far
/// earlier when the TIA reports the frame complete.
pub const FRAME_CYCLE_LIMIT: u64 = 76 * 1024;

pub struct Console {
    cpu: Cpu,
    bus: Bus,
    settings: Settings,
    audio_queue: Option<Arc<AudioQueue>>,
}

impl Console {
    /// Build a console around `image`, detecting the bank-switching scheme.
    pub fn new(image: &[u8], md5: Option<&str>, settings: Settings) -> Result<Self, CoreError> {
        settings.validate()?;
        let cart = Cartridge::new(image, md5, &settings)?;
        Self::from_cartridge(cart, settings)
    }

    /// Build a console with an explicit scheme, bypassing detection.
    pub fn with_scheme(
        image: &[u8],
        md5: Option<&str>,
        kind: SchemeKind,
        settings: Settings,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        let cart = Cartridge::with_scheme(image, md5, kind, &settings)?;
        Self::from_cartridge(cart, settings)
    }

    pub fn from_cartridge(cart: Cartridge, settings: Settings) -> Result<Self, CoreError> {
        let mut bus = Bus::new(&settings);
        bus.attach_cartridge(cart);

        let mut cpu = Cpu::new();
        cpu.install_halt_handler(
            &mut bus,
            Box::new(|bus: &mut Bus| bus.tia.on_halt(&mut bus.system)),
        );

        let audio_queue = if settings.audio.enabled {
            let a = &settings.audio;
            let queue = Arc::new(AudioQueue::new(
                a.fragment_size,
                a.capacity,
                a.stereo,
                a.sample_rate,
            )?);
            bus.tia.set_audio_queue(Some(Arc::clone(&queue)))?;
            Some(queue)
        } else {
            None
        };

        let mut console = Self {
            cpu,
            bus,
            settings,
            audio_queue,
        };
        console.reset();
        info!(
            "console: {:?} timing, cartridge {}",
            console.settings.timing,
            console.bus.cartridge().map_or("-", |c| c.md5())
        );
        Ok(console)
    }

    /// Power-on reset: chips and cartridge first, then the CPU fetches the
    /// reset vector through the freshly mapped banks.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        debug!("console: reset, pc=${:04X}", self.cpu.pc());
    }

    #[inline]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    #[inline]
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    #[inline]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    #[inline]
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.bus.cartridge()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Consumer side of the audio ring, when audio is enabled.
    pub fn audio_queue(&self) -> Option<Arc<AudioQueue>> {
        self.audio_queue.clone()
    }

    // ---------------------------------------------------------------------
    // Running
    // ---------------------------------------------------------------------

    pub fn execute(&mut self, cycles: u64) -> DispatchResult {
        self.cpu.execute(&mut self.bus, cycles)
    }

    /// Run until the TIA completes a frame (or `FRAME_CYCLE_LIMIT` elapses).
    pub fn run_frame(&mut self) -> DispatchResult {
        let before = self.frame_count();
        let result = self.cpu.execute(&mut self.bus, FRAME_CYCLE_LIMIT);
        if self.frame_count() == before && result.is_success() {
            debug!(
                "console: no frame after {} cycles (scanline {})",
                result.cycles,
                self.bus.tia.scanline()
            );
        }
        result
    }

    pub fn frame_count(&self) -> u64 {
        self.bus.tia.frame_detector().frame_count()
    }

    // ---------------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------------

    pub fn set_joystick(&mut self, player: usize, stick: Joystick) {
        self.bus.riot.set_joystick(player, stick);
    }

    pub fn set_fire(&mut self, player: usize, pressed: bool) {
        self.bus.tia.set_fire(player, pressed);
    }

    pub fn set_switch(&mut self, switch: ConsoleSwitch, on: bool) {
        self.bus.riot.set_switch(switch, on);
    }

    // ---------------------------------------------------------------------
    // Video
    // ---------------------------------------------------------------------

    /// Palette indices of the last completed frame, 160 per line.
    pub fn front_buffer(&self) -> &[u8] {
        self.bus.tia.front_buffer()
    }

    pub fn height(&self) -> u32 {
        self.bus.tia.height()
    }

    /// Convert the front buffer to RGBA8 into `out` (4 bytes per pixel).
    pub fn frame_rgba(&self, out: &mut [u8]) {
        palette::to_rgba(self.settings.timing, self.front_buffer(), out);
    }

    // ---------------------------------------------------------------------
    // Debugging
    // ---------------------------------------------------------------------

    pub fn attach_debugger(&mut self, mut hooks: DebugHooks) {
        hooks.set_ghost_reads_trap(self.settings.ghost_reads_trap);
        self.cpu.attach_debugger(hooks);
    }

    pub fn detach_debugger(&mut self) -> Option<DebugHooks> {
        self.cpu.detach_debugger()
    }

    // ---------------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------------

    pub fn save_state(&self) -> Result<Vec<u8>, StateError> {
        let mut out = Serializer::new();
        out.put_string(STATE_MAGIC);
        out.put_int(STATE_VERSION);
        out.put_string(self.cartridge_md5());
        self.bus.save_state(&mut out)?;
        self.cpu.save_state(&mut out, &self.bus)?;
        Ok(out.into_bytes())
    }

    /// Restore a snapshot taken by `save_state` for the same cartridge.
    /// On any failure the machine is left as it was before the call.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let mut input = Serializer::from_bytes(data.to_vec());
        self.check_header(&mut input)?;

        let backup = self.save_state()?;
        if let Err(e) = self.restore_body(&mut input) {
            error!("console: snapshot load failed: {e}");
            let mut rollback = Serializer::from_bytes(backup);
            self.check_header(&mut rollback)?;
            self.restore_body(&mut rollback)?;
            return Err(e);
        }
        debug!("console: snapshot loaded ({} bytes)", data.len());
        Ok(())
    }

    fn cartridge_md5(&self) -> &str {
        self.bus.cartridge().map_or("", |c| c.md5())
    }

    fn check_header(&self, input: &mut Serializer) -> Result<(), StateError> {
        let magic = input.get_string()?;
        if magic != STATE_MAGIC {
            return Err(StateError::Header(format!("bad magic '{magic}'")));
        }
        let version = input.get_int()?;
        if version != STATE_VERSION {
            return Err(StateError::Header(format!("unsupported version {version}")));
        }
        let md5 = input.get_string()?;
        if md5 != self.cartridge_md5() {
            return Err(StateError::Header(format!(
                "snapshot is for cartridge {md5}, loaded cartridge is {}",
                self.cartridge_md5()
            )));
        }
        Ok(())
    }

    fn restore_body(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        self.bus.load_state(input)?;
        self.cpu.load_state(input, &mut self.bus)
    }
}
