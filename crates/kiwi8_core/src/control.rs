use std::ops::{BitOr, BitOrAssign};

/// Requests the input side raises alongside the keypad on each poll.
/// Each request has its own bit so several can arrive in one poll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Control(u8);

impl Control {
    pub const CONTINUE: Control = Control(0);
    pub const USER_QUIT: Control = Control(1);
    pub const SOFT_RESET: Control = Control(2);
    pub const LOAD_ROM: Control = Control(4);

    pub fn bits(self) -> u8 {
        self.0
    }
    pub fn contains(self, other: Control) -> bool {
        self.0 & other.0 == other.0
    }
    pub fn is_continue(self) -> bool {
        self == Control::CONTINUE
    }
}
impl BitOr for Control {
    type Output = Control;
    fn bitor(self, rhs: Control) -> Control {
        Control(self.0 | rhs.0)
    }
}
impl BitOrAssign for Control {
    fn bitor_assign(&mut self, rhs: Control) {
        self.0 |= rhs.0;
    }
}
