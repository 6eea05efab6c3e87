use rand::{RngCore, rngs::StdRng};

use crate::{Chip8Error, EmulatorConfig, Framebuffer, Interpreter, StepOutcome, u4};

/// High-level emulator runner that manages timing internally.
pub struct Chip8Runner<R: RngCore = StdRng> {
    interpreter: Interpreter<R>,
    cpu_time_step: f32,
    timer_time_step: f32,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
}

impl<R: RngCore> Chip8Runner<R> {
    pub fn new(interpreter: Interpreter<R>, config: &EmulatorConfig) -> Result<Self, Chip8Error> {
        config.validate()?;

        Ok(Self {
            interpreter,
            cpu_time_step: 1.0 / config.cpu_hz,
            timer_time_step: 1.0 / config.timer_hz,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
        })
    }

    /// Update emulator by delta time, handles both CPU and timer cycles.
    ///
    /// Runs as many CPU cycles and timer updates as needed based on the elapsed time `dt`.
    /// Returns early if a frame has to be rendered before the next CPU cycle.
    pub fn update(&mut self, dt: f32) -> Result<StepOutcome, Chip8Error> {
        self.cpu_dt_accumulator += dt;
        self.timer_dt_accumulator += dt;

        while self.timer_dt_accumulator >= self.timer_time_step {
            self.timer_dt_accumulator -= self.timer_time_step;
            self.interpreter.tick_timers();
        }

        while self.cpu_dt_accumulator >= self.cpu_time_step {
            self.cpu_dt_accumulator -= self.cpu_time_step;

            let outcome = self.interpreter.step().inspect_err(|e| {
                let machine = self.interpreter.machine();
                log::warn!(
                    "Interpreter halted at {:#06X} (opcode {:04X}): {e}",
                    machine.pc(),
                    machine.current_opcode()
                );
            })?;

            if outcome == StepOutcome::WaitForNextFrame {
                // Drop the backlog so the next frame does not try to catch up.
                self.cpu_dt_accumulator = 0.0;
                return Ok(StepOutcome::WaitForNextFrame);
            }
        }

        Ok(StepOutcome::Continue)
    }

    /// Returns true if the sound timer is active, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.interpreter.machine().should_beep()
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.interpreter.set_key(key, pressed)
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        self.interpreter.framebuffer()
    }

    pub fn interpreter(&self) -> &Interpreter<R> {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter<R> {
        &mut self.interpreter
    }
}
