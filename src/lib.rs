//! CHIP-8 virtual machine: machine state, a fetch-decode-execute
//! interpreter for the 35 standard instructions, and a fixed-timestep
//! runner for hosts that drive it from a frame loop.

mod config;
mod execute;
pub mod font;
mod interpreter;
pub mod machine;
mod nibble;
mod opcode;
mod runner;
mod types;

pub use config::*;
pub use interpreter::*;
pub use machine::Machine;
pub use nibble::u4;
pub use opcode::*;
pub use runner::*;
pub use types::*;
