use std::ops::Range;

use crate::font::{FONT_SET, FONT_SET_END_ADDRESS, FONT_SET_START_ADDRESS};
use crate::{Chip8Error, DISPLAY_X, DISPLAY_Y, Framebuffer, PIXEL_OFF, PIXEL_ON, u4};

// Fixed by the CHIP-8 memory map
pub const START_ADDRESS: usize = 0x200;
pub const MEMORY_SIZE: usize = 4096;
pub const STACK_SIZE: usize = 16;
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - START_ADDRESS;

/// CHIP-8 machine state
#[derive(Clone)]
pub struct Machine {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 pixels, `PIXEL_ON` or `PIXEL_OFF`
    pub(crate) framebuffer: Framebuffer,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Return addresses; only `stack[..sp]` is live
    pub(crate) stack: [u16; STACK_SIZE],
    /// Number of stack slots in use
    pub(crate) sp: u8,

    /// Delay timer: decrements at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements at 60Hz, beeps while non-zero
    pub(crate) sound_timer: u8,

    /// Keypad state: 16 keys mapped as booleans (true = pressed)
    pub(crate) keypad: [bool; 16],
    /// Most recently fetched instruction word
    pub(crate) opcode: u16,
}

impl Machine {
    pub fn new() -> Self {
        let mut memory = [0; MEMORY_SIZE];
        memory[FONT_SET_START_ADDRESS..FONT_SET_END_ADDRESS].copy_from_slice(&FONT_SET);

        Machine {
            memory,
            framebuffer: [PIXEL_OFF; DISPLAY_X * DISPLAY_Y],
            pc: START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: [0; STACK_SIZE],
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; 16],
            opcode: 0,
        }
    }

    /// Returns the machine to its power-on state, program memory included.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Copies a raw program image into memory at 0x200.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        let program_end = START_ADDRESS + program.len();
        self.memory
            .get_mut(START_ADDRESS..program_end)
            .ok_or(Chip8Error::ProgramTooLarge {
                size: program.len(),
                max_size: MAX_PROGRAM_SIZE,
            })?
            .copy_from_slice(program);

        self.pc = START_ADDRESS as u16;
        log::debug!("Loaded {} byte program at {:#06X}", program.len(), START_ADDRESS);

        Ok(())
    }

    /// Returns true if the sound timer is greater than zero, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad[key] = pressed;
    }

    pub fn is_key_pressed(&self, key: u4) -> bool {
        self.keypad[key]
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Whether the pixel at column `x`, row `y` is lit.
    ///
    /// Panics if `x >= DISPLAY_X` or `y >= DISPLAY_Y`.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        assert!(
            x < DISPLAY_X && y < DISPLAY_Y,
            "pixel ({x}, {y}) outside the {DISPLAY_X}x{DISPLAY_Y} display"
        );
        self.framebuffer[y * DISPLAY_X + x] == PIXEL_ON
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn v(&self, reg: u4) -> u8 {
        self.v[reg]
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    /// Live return addresses, oldest first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.sp as usize]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn current_opcode(&self) -> u16 {
        self.opcode
    }

    /// Memory indices for `len` bytes starting at `addr`.
    ///
    /// Fails with the first address past the end of memory, so callers can
    /// check a whole access before touching any state.
    pub(crate) fn mem_range(addr: u16, len: usize) -> Result<Range<usize>, Chip8Error> {
        let start = addr as usize;
        let end = start + len;
        if end > MEMORY_SIZE {
            return Err(Chip8Error::MemoryOutOfBounds {
                address: start.max(MEMORY_SIZE) as u16,
            });
        }
        Ok(start..end)
    }

    pub(crate) fn mem_read(&self, addr: u16) -> Result<u8, Chip8Error> {
        self.memory
            .get(addr as usize)
            .copied()
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
