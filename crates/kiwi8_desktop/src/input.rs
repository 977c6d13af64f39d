use std::path::PathBuf;

use kiwi8_core::{globals::KEY_COUNT, Control, Keys};
use winit::keyboard::KeyCode;

/// Left-hand side of a qwerty keyboard, indexed by hex key
const KEYMAP: [KeyCode; KEY_COUNT] = [
    KeyCode::KeyX,   // 0
    KeyCode::Digit1, // 1
    KeyCode::Digit2, // 2
    KeyCode::Digit3, // 3
    KeyCode::KeyQ,   // 4
    KeyCode::KeyW,   // 5
    KeyCode::KeyE,   // 6
    KeyCode::KeyA,   // 7
    KeyCode::KeyS,   // 8
    KeyCode::KeyD,   // 9
    KeyCode::KeyZ,   // A
    KeyCode::KeyC,   // B
    KeyCode::Digit4, // C
    KeyCode::KeyR,   // D
    KeyCode::KeyF,   // E
    KeyCode::KeyV,   // F
];

/// Frontend toggles that never reach the machine as control flags
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    TogglePause,
    ToggleMute,
    ToggleWrap,
    ToggleFullscreen
}

#[derive(Default)]
pub struct Input {
    keys: Keys,
    control: Control,
    rom: Option<PathBuf>
}
impl Input {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn handle_key(&mut self, code: KeyCode, pressed: bool) -> Option<Action> {
        if let Some(idx) = KEYMAP.iter().position(|&k| k == code) {
            self.keys[idx] = pressed;
            return None;
        }
        if !pressed { return None }
        match code {
            KeyCode::Escape => self.control |= Control::USER_QUIT,
            KeyCode::F5 => self.control |= Control::SOFT_RESET,
            KeyCode::KeyP => return Some(Action::TogglePause),
            KeyCode::KeyM => return Some(Action::ToggleMute),
            KeyCode::KeyO => return Some(Action::ToggleWrap),
            KeyCode::F11 => return Some(Action::ToggleFullscreen),
            _ => ()
        }
        None
    }
    pub fn handle_drop(&mut self, path: PathBuf) {
        self.rom = Some(path);
        self.control |= Control::LOAD_ROM;
    }
    /// Released when the window loses focus, so nothing stays held
    pub fn release_all(&mut self) {
        self.keys = [false; KEY_COUNT];
    }
    /// Current keypad and the control flags raised since the last poll
    pub fn poll(&mut self) -> (Keys, Control) {
        (self.keys, std::mem::take(&mut self.control))
    }
    pub fn take_rom(&mut self) -> Option<PathBuf> {
        self.rom.take()
    }
}
