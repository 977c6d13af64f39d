use std::io;

use thiserror::Error;

use crate::globals::MAX_ROM_SIZE;

#[derive(Debug, Error)]
pub enum ChipError {
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
    #[error("rom is {0} bytes, at most {max} fit in memory", max = MAX_ROM_SIZE)]
    RomTooLarge(usize),
    #[error("illegal memory access at {0:#06x}")]
    IllegalAddr(u16),
    #[error("call stack overflow")]
    StackOverflow,
    #[error("return with an empty call stack")]
    StackUnderflow,
    #[error("machine state lock poisoned")]
    Poisoned,
}

impl PartialEq for ChipError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ChipError::Io(a), ChipError::Io(b)) => a.kind() == b.kind(),
            (ChipError::RomTooLarge(a), ChipError::RomTooLarge(b)) => a == b,
            (ChipError::IllegalAddr(a), ChipError::IllegalAddr(b)) => a == b,
            (ChipError::StackOverflow, ChipError::StackOverflow) => true,
            (ChipError::StackUnderflow, ChipError::StackUnderflow) => true,
            (ChipError::Poisoned, ChipError::Poisoned) => true,
            _ => false,
        }
    }
}
