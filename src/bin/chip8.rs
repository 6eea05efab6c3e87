use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use clap::Parser;
use pixels::{Pixels, SurfaceTexture};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey},
    window::{Window, WindowId},
};

use chip8_vm::{
    Chip8Runner, DEFAULT_CPU_HZ, DEFAULT_SCALE, DISPLAY_X, DISPLAY_Y, EmulatorConfig, u4,
};

const TITLE: &str = "chip8";

/// Mapping from physical keyboard keys to CHIP-8 hex keypad (0x0-0xF).
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::KeyX,   // 0x00
    KeyCode::Digit1, // 0x01
    KeyCode::Digit2, // 0x02
    KeyCode::Digit3, // 0x03
    KeyCode::KeyQ,   // 0x04
    KeyCode::KeyW,   // 0x05
    KeyCode::KeyE,   // 0x06
    KeyCode::KeyA,   // 0x07
    KeyCode::KeyS,   // 0x08
    KeyCode::KeyD,   // 0x09
    KeyCode::KeyZ,   // 0x0A
    KeyCode::KeyC,   // 0x0B
    KeyCode::Digit4, // 0x0C
    KeyCode::KeyR,   // 0x0D
    KeyCode::KeyF,   // 0x0E
    KeyCode::KeyV,   // 0x0F
];

struct App {
    pixels: Option<Pixels<'static>>,
    window: Option<Arc<Window>>,
    scale: u32,

    runner: Chip8Runner,
    /// Used for delta time calculation.
    last_frame_instant: Instant,
    /// Last beep state shown in the window title.
    beeping: bool,

    /// Stores the result of the application to be returned from main.
    exit_result: anyhow::Result<()>,
}

impl App {
    fn new(rom: &[u8], config: &EmulatorConfig) -> anyhow::Result<Self> {
        let mut interpreter = config.interpreter();
        interpreter
            .load_program(rom)
            .context("Failed to load ROM into CHIP-8 memory")?;
        let runner = Chip8Runner::new(interpreter, config).context("Invalid configuration")?;

        Ok(Self {
            pixels: None,
            window: None,
            scale: config.scale,
            runner,
            last_frame_instant: Instant::now(),
            beeping: false,
            exit_result: Ok(()),
        })
    }

    /// Copies the packed framebuffer into the RGBA surface.
    fn process_display(&mut self) -> anyhow::Result<()> {
        let buff = self
            .pixels
            .as_mut()
            .context("Pixels surface not initialized")?
            .frame_mut();

        for (pxl, &packed) in buff.chunks_exact_mut(4).zip(self.runner.framebuffer()) {
            pxl.copy_from_slice(&packed.to_be_bytes());
        }
        Ok(())
    }

    fn update_beep_indicator(&mut self) {
        let beeping = self.runner.should_beep();
        if beeping == self.beeping {
            return;
        }
        self.beeping = beeping;

        if let Some(window) = &self.window {
            if beeping {
                window.set_title(&format!("{TITLE} [beep]"));
            } else {
                window.set_title(TITLE);
            }
        }
    }

    fn try_resumed(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = {
            let size = LogicalSize::new(
                DISPLAY_X as u32 * self.scale,
                DISPLAY_Y as u32 * self.scale,
            );
            let min_size = LogicalSize::new(DISPLAY_X as u32, DISPLAY_Y as u32);

            Arc::new(
                event_loop
                    .create_window(
                        Window::default_attributes()
                            .with_title(TITLE)
                            .with_inner_size(size)
                            .with_min_inner_size(min_size),
                    )
                    .context("Failed to create window")?,
            )
        };

        self.window = Some(window.clone());
        self.pixels = {
            let window_size = window.inner_size();
            let surface_texture =
                SurfaceTexture::new(window_size.width, window_size.height, window.clone());

            let pixels = Pixels::new(DISPLAY_X as u32, DISPLAY_Y as u32, surface_texture)
                .context("Failed to create pixels surface")?;

            window.request_redraw();
            Some(pixels)
        };

        // Avoid large dt on first frame
        self.last_frame_instant = Instant::now();
        Ok(())
    }

    fn try_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(pixels) = self.pixels.as_mut() {
                    pixels
                        .resize_surface(size.width, size.height)
                        .context("Failed to resize pixels surface")?;
                }
            }

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame_instant).as_secs_f32();
                self.last_frame_instant = now;

                self.runner.update(dt).context("Chip8 Execution error")?;
                self.update_beep_indicator();
                self.process_display()?;

                if let Some(pixels) = self.pixels.as_ref() {
                    pixels.render().context("Pixels render error")?;
                }
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(key) = KEY_MAP.iter().position(|&k| k == event.physical_key) {
                    let pressed = event.state == ElementState::Pressed;
                    self.runner.set_key(u4::new(key as u8), pressed);
                }
            }

            _ => (),
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.try_resumed(event_loop) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Err(e) = self.try_window_event(event_loop, event) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }
}

/// CHIP-8 emulator.
///
/// Keys 1-4, Q-R, A-F, Z-V map to CHIP-8 keys.
/// Escape is used to exit the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// Instructions executed per second
    #[arg(long, default_value_t = DEFAULT_CPU_HZ)]
    cpu_hz: f32,

    /// Seed for the random number instruction (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Window pixels per CHIP-8 pixel
    #[arg(long, default_value_t = DEFAULT_SCALE)]
    scale: u32,
}

impl Args {
    fn config(&self) -> EmulatorConfig {
        EmulatorConfig {
            cpu_hz: self.cpu_hz,
            seed: self.seed,
            scale: self.scale,
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = args.config();
    config.validate().context("Invalid command line options")?;

    let rom = std::fs::read(&args.rom_path)
        .with_context(|| format!("Failed to read ROM file {}", args.rom_path.display()))?;
    log::info!("Loaded {} ({} bytes)", args.rom_path.display(), rom.len());

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&rom, &config).context("Failed to initialize application")?;
    event_loop
        .run_app(&mut app)
        .context("Error occurred during event loop execution")?;

    // Return the result captured during the event loop
    app.exit_result
}
