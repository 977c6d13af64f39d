mod control;
mod cpu;
mod display;
mod errors;
mod font;
pub mod globals;
mod keypad;
mod machine;
mod quirks;
mod utils;

pub use control::Control;
pub use cpu::Cpu;
pub use display::{Frame, FrameBuffer};
pub use errors::ChipError;
pub use keypad::{Keypad, Keys};
pub use machine::{Machine, Snapshot, State};
pub use quirks::{Config, Quirks};
