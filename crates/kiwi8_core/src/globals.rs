pub const RAM_SIZE: usize = 4096;
pub const STACK_SIZE: usize = 16;
pub const REG_COUNT: usize = 16;
pub const KEY_COUNT: usize = 16;

pub const FONT_ADDR: u16 = 0x050;
pub const PROGRAM_ADDR: u16 = 0x200;
pub const MAX_ROM_SIZE: usize = RAM_SIZE - PROGRAM_ADDR as usize;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;
pub const SCREEN_BUFFER_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// Timer cadence, also the rate at which instruction batches are run
pub const TICK_RATE_HZ: u64 = 60;
/// ~600 instructions per second at 60Hz
pub const DEFAULT_STEPS_PER_TICK: usize = 10;
