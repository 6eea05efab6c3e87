use crate::{Chip8Error, Interpreter};

pub const DEFAULT_CPU_HZ: f32 = 700.0;
pub const DEFAULT_TIMER_HZ: f32 = 60.0;
pub const DEFAULT_SCALE: u32 = 10;

/// Host-side settings for running a program.
#[derive(Debug, Clone, PartialEq)]
pub struct EmulatorConfig {
    /// Instructions executed per second
    pub cpu_hz: f32,
    /// Timer decrements per second
    pub timer_hz: f32,
    /// Seed for `Cxkk`; `None` draws one from the OS
    pub seed: Option<u64>,
    /// Window pixels per CHIP-8 pixel
    pub scale: u32,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            cpu_hz: DEFAULT_CPU_HZ,
            timer_hz: DEFAULT_TIMER_HZ,
            seed: None,
            scale: DEFAULT_SCALE,
        }
    }
}

impl EmulatorConfig {
    pub fn validate(&self) -> Result<(), Chip8Error> {
        if !(self.cpu_hz.is_finite() && self.cpu_hz > 0.0) {
            return Err(Chip8Error::InvalidConfig(format!(
                "cpu rate must be positive, got {}",
                self.cpu_hz
            )));
        }
        if !(self.timer_hz.is_finite() && self.timer_hz > 0.0) {
            return Err(Chip8Error::InvalidConfig(format!(
                "timer rate must be positive, got {}",
                self.timer_hz
            )));
        }
        if self.scale == 0 {
            return Err(Chip8Error::InvalidConfig("scale must be at least 1".into()));
        }
        Ok(())
    }

    /// Builds an interpreter seeded according to this configuration.
    pub fn interpreter(&self) -> Interpreter {
        match self.seed {
            Some(seed) => Interpreter::with_seed(seed),
            None => Interpreter::new(),
        }
    }
}
