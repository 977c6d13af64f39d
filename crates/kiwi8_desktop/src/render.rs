use kiwi8_core::{
    Frame,
    globals::{SCREEN_WIDTH, SCREEN_HEIGHT}
};

pub const BACKGROUND: u32 = 0x00_00_00;

/// Draws frames scaled by the largest whole factor that fits the window, centred
pub struct Renderer {
    color: u32
}
impl Renderer {
    /// `color` is 0x00RRGGBB
    pub fn new(color: u32) -> Self {
        Renderer { color }
    }
    pub fn draw(&self, frame: &Frame, buffer: &mut [u32], width: usize, height: usize) {
        buffer.fill(BACKGROUND);
        let scale = (width / SCREEN_WIDTH).min(height / SCREEN_HEIGHT);
        if scale == 0 { return }
        let offset_x = (width - SCREEN_WIDTH * scale) / 2;
        let offset_y = (height - SCREEN_HEIGHT * scale) / 2;

        for y in 0..SCREEN_HEIGHT {
            for x in 0..SCREEN_WIDTH {
                if frame[y * SCREEN_WIDTH + x] == 0 { continue }
                for sy in 0..scale {
                    let start = (offset_y + y * scale + sy) * width + offset_x + x * scale;
                    buffer[start..start + scale].fill(self.color);
                }
            }
        }
    }
}

pub fn parse_color(s: &str) -> Result<u32, String> {
    let hex = s.trim_start_matches('#');
    if hex.len() != 6 {
        return Err(format!("expected RRGGBB, got {s}"));
    }
    u32::from_str_radix(hex, 16).map_err(|e| e.to_string())
}
