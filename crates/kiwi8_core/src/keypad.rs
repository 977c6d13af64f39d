use crate::globals::KEY_COUNT;

pub type Keys = [bool; KEY_COUNT];

/// Hex keypad state as last reported by the input side
#[derive(Clone, Default)]
pub struct Keypad {
    keys: Keys,
    // most recent released -> pressed transition
    pressed: Option<u8>
}
impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn update(&mut self, keys: Keys) {
        if let Some(k) = (0..KEY_COUNT).find(|&k| keys[k] && !self.keys[k]) {
            self.pressed = Some(k as u8);
        }
        self.keys = keys;
    }
    pub fn is_pressed(&self, key: u8) -> bool {
        self.keys.get(key as usize).copied().unwrap_or(false)
    }
    /// Forgets any press seen so far, so only newer ones are reported
    pub fn clear_press(&mut self) {
        self.pressed = None;
    }
    /// Checks and clears the latest key press
    pub fn take_press(&mut self) -> Option<u8> {
        self.pressed.take()
    }
}
