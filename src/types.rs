/// Result of a single interpreter step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Continue executing instructions in the current frame.
    Continue,
    /// Wait for the next frame before continuing
    /// (after a draw, or while blocked on a key press).
    WaitForNextFrame,
}

/// Error types that halt CHIP-8 emulation
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Chip8Error {
    #[error("Program is too large ({size} bytes), max size is {max_size} bytes")]
    ProgramTooLarge { size: usize, max_size: usize },

    #[error("Memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: u16 },

    #[error("Stack overflow: call to {target:#06X} with all 16 stack slots in use")]
    StackOverflow { target: u16 },

    #[error("Stack underflow: attempted to return from a subroutine with empty call stack")]
    StackUnderflow,

    #[error("Unknown opcode {opcode:#06X} at address {address:#06X}")]
    UnknownOpcode { opcode: u16, address: u16 },

    #[error("Key index {key:#04X} out of range (opcode {opcode:#06X})")]
    KeyOutOfRange { key: u8, opcode: u16 },

    #[error("Font digit {digit:#04X} out of range (opcode {opcode:#06X})")]
    FontDigitOutOfRange { digit: u8, opcode: u16 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;

/// Packed pixel value for a lit pixel, blittable as-is.
pub const PIXEL_ON: u32 = 0xFFFF_FFFF;
pub const PIXEL_OFF: u32 = 0;

/// Row-major 64x32 framebuffer, one packed 32-bit color per pixel
pub type Framebuffer = [u32; DISPLAY_X * DISPLAY_Y];
