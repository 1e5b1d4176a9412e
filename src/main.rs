//! vcs-core binary.
//!
//! Runs a cartridge headless for a number of frames (optionally saving a
//! PNG of the last one), or in a winit + pixels window when built with the
//! `display` feature.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::{info, warn};
use vcs_core::cartridge::SchemeKind;
use vcs_core::cpu::DispatchStatus;
use vcs_core::{Console, Settings};

/// Width of the TIA front buffer in pixels.
#[cfg(any(feature = "display", feature = "screenshot"))]
const FB_WIDTH: u32 = 160;

#[derive(Parser, Debug)]
#[command(name = "vcs-core")]
#[command(about = "Atari 2600 emulator core", long_about = None)]
struct Args {
    /// Cartridge image
    rom: PathBuf,

    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames to run in headless mode
    #[arg(short, long, default_value = "60")]
    frames: u32,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Save the last frame as PNG (headless, needs the `screenshot` feature)
    #[arg(short, long)]
    screenshot: Option<PathBuf>,

    /// Force a bank-switching scheme instead of detecting one
    #[arg(long)]
    scheme: Option<SchemeKind>,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn load_settings(path: Option<&Path>) -> Settings {
    let Some(path) = path else {
        return Settings::default();
    };
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to read config {}: {e}", path.display());
            process::exit(1);
        }
    };
    match Settings::from_json_str(&text) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn make_console(args: &Args) -> Console {
    let image = match std::fs::read(&args.rom) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to read ROM file {}: {e}", args.rom.display());
            process::exit(1);
        }
    };

    let settings = load_settings(args.config.as_deref());
    let console = match args.scheme {
        Some(kind) => Console::with_scheme(&image, None, kind, settings),
        None => Console::new(&image, None, settings),
    };
    match console {
        Ok(c) => {
            if let Some(cart) = c.cartridge() {
                info!("loaded {} ({}, md5 {})", args.rom.display(), cart.kind(), cart.md5());
            }
            c
        }
        Err(e) => {
            eprintln!("Failed to load cartridge: {e}");
            process::exit(1);
        }
    }
}

/// Run one frame; stop the process on a fatal result.
fn step_frame(console: &mut Console) {
    let result = console.run_frame();
    match result.status {
        DispatchStatus::Ok => {}
        DispatchStatus::Warning | DispatchStatus::Debugger => warn!("{result}"),
        DispatchStatus::Fatal => {
            eprintln!("Emulation stopped: {result}");
            process::exit(2);
        }
    }
}

// ---------------------------------------------------------------------------
// Headless mode
// ---------------------------------------------------------------------------

fn run_headless(args: &Args) {
    let mut console = make_console(args);
    for _ in 0..args.frames {
        step_frame(&mut console);
    }
    println!(
        "{} frames, {} cycles, pc=${:04X}",
        console.frame_count(),
        console.bus().system.cycles(),
        console.cpu().pc()
    );

    if let Some(ref path) = args.screenshot {
        if let Err(e) = save_screenshot(&console, path) {
            eprintln!("Screenshot error: {e}");
            process::exit(1);
        }
        eprintln!("Screenshot saved to {}", path.display());
    }
}

#[cfg(feature = "screenshot")]
fn save_screenshot(console: &Console, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let height = console.height();
    let mut rgba = vec![0u8; (FB_WIDTH * height * 4) as usize];
    console.frame_rgba(&mut rgba);
    let img = image::RgbaImage::from_raw(FB_WIDTH, height, rgba)
        .ok_or("front buffer does not match frame size")?;
    img.save(path)?;
    Ok(())
}

#[cfg(not(feature = "screenshot"))]
fn save_screenshot(_console: &Console, _path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the `screenshot` feature".into())
}

// ---------------------------------------------------------------------------
// Windowed mode (winit + pixels)
// ---------------------------------------------------------------------------

#[cfg(feature = "display")]
mod window {
    use std::process;
    use std::time::{Duration, Instant};

    use pixels::{Pixels, SurfaceTexture};
    use vcs_core::Console;
    use vcs_core::riot::{ConsoleSwitch, Joystick};
    use winit::application::ApplicationHandler;
    use winit::event::{ElementState, WindowEvent};
    use winit::event_loop::{ActiveEventLoop, EventLoop};
    use winit::keyboard::{KeyCode, PhysicalKey};
    use winit::window::{Window, WindowAttributes, WindowId};

    use super::{FB_WIDTH, step_frame};

    const SCALE: u32 = 4;
    /// ~60 Hz NTSC frame pacing.
    const FRAME_DURATION: Duration = Duration::from_micros(16_639);

    struct App {
        console: Console,
        stick: Joystick,
        window: Option<&'static Window>,
        pixels: Option<Pixels<'static>>,
        last_frame_time: Instant,
    }

    impl App {
        fn new(console: Console) -> Self {
            Self {
                console,
                stick: Joystick::default(),
                window: None,
                pixels: None,
                last_frame_time: Instant::now(),
            }
        }

        fn handle_key(&mut self, keycode: KeyCode, pressed: bool) {
            match keycode {
                KeyCode::ArrowUp => self.stick.up = pressed,
                KeyCode::ArrowDown => self.stick.down = pressed,
                KeyCode::ArrowLeft => self.stick.left = pressed,
                KeyCode::ArrowRight => self.stick.right = pressed,
                KeyCode::Space => {
                    self.console.set_fire(0, pressed);
                    return;
                }
                KeyCode::F1 => {
                    self.console.set_switch(ConsoleSwitch::Select, pressed);
                    return;
                }
                KeyCode::F2 => {
                    self.console.set_switch(ConsoleSwitch::Reset, pressed);
                    return;
                }
                KeyCode::F3 => {
                    // Held = black & white.
                    self.console.set_switch(ConsoleSwitch::Color, !pressed);
                    return;
                }
                _ => return,
            }
            self.console.set_joystick(0, self.stick);
        }

        fn update_pixels(&mut self) {
            let Some(pixels) = self.pixels.as_mut() else {
                return;
            };
            let frame = pixels.frame_mut();
            self.console.frame_rgba(frame);
        }
    }

    impl ApplicationHandler for App {
        fn resumed(&mut self, event_loop: &ActiveEventLoop) {
            if self.window.is_some() {
                return;
            }

            let height = self.console.height();
            // TIA pixels are roughly twice as wide as they are tall.
            let window_size = winit::dpi::LogicalSize::new(FB_WIDTH * SCALE * 2, height * SCALE);
            let attrs = WindowAttributes::default()
                .with_title("vcs-core")
                .with_inner_size(window_size)
                .with_resizable(false);

            match event_loop.create_window(attrs) {
                Ok(window) => {
                    let window: &'static Window = Box::leak(Box::new(window));
                    let inner = window.inner_size();
                    let surface = SurfaceTexture::new(inner.width, inner.height, window);
                    match Pixels::new(FB_WIDTH, height, surface) {
                        Ok(pixels) => self.pixels = Some(pixels),
                        Err(e) => {
                            eprintln!("Failed to create pixels: {e}");
                            event_loop.exit();
                            return;
                        }
                    }
                    self.window = Some(window);
                }
                Err(e) => {
                    eprintln!("Failed to create window: {e}");
                    event_loop.exit();
                }
            }
        }

        fn window_event(
            &mut self,
            event_loop: &ActiveEventLoop,
            _window_id: WindowId,
            event: WindowEvent,
        ) {
            match event {
                WindowEvent::CloseRequested => event_loop.exit(),
                WindowEvent::KeyboardInput { event, .. } => {
                    if let PhysicalKey::Code(keycode) = event.physical_key {
                        let pressed = event.state == ElementState::Pressed;
                        if keycode == KeyCode::Escape && pressed {
                            event_loop.exit();
                            return;
                        }
                        self.handle_key(keycode, pressed);
                    }
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    if now.duration_since(self.last_frame_time) >= FRAME_DURATION {
                        step_frame(&mut self.console);
                        self.update_pixels();
                        self.last_frame_time = now;
                    }

                    if let Some(pixels) = self.pixels.as_ref() {
                        if let Err(e) = pixels.render() {
                            eprintln!("Render error: {e}");
                            event_loop.exit();
                        }
                    }
                }
                _ => {}
            }
        }

        fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
            if let Some(window) = self.window {
                window.request_redraw();
            }
        }
    }

    pub(super) fn run(console: Console) {
        let mut app = App::new(console);
        let event_loop = match EventLoop::new() {
            Ok(el) => el,
            Err(e) => {
                eprintln!("Failed to create event loop: {e}");
                process::exit(1);
            }
        };
        if let Err(e) = event_loop.run_app(&mut app) {
            eprintln!("Event loop error: {e}");
            process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.headless || !cfg!(feature = "display") {
        run_headless(&args);
        return;
    }

    #[cfg(feature = "display")]
    window::run(make_console(&args));
}
