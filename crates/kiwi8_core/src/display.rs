use crate::globals::{SCREEN_WIDTH, SCREEN_HEIGHT, SCREEN_BUFFER_SIZE};

/// One byte per pixel, 0 or 1, addressed as `y * SCREEN_WIDTH + x`
pub type Frame = [u8; SCREEN_BUFFER_SIZE];

#[derive(Clone)]
pub struct FrameBuffer {
    pixels: Frame
}
impl FrameBuffer {
    pub fn new() -> Self {
        FrameBuffer {
            pixels: [0; SCREEN_BUFFER_SIZE]
        }
    }
    pub fn clear(&mut self) {
        self.pixels = [0; SCREEN_BUFFER_SIZE];
    }
    pub fn get_buffer(&self) -> &Frame {
        &self.pixels
    }
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * SCREEN_WIDTH + x]
    }
    /// XORs an 8 pixel wide sprite into the buffer, one byte per row.
    /// The origin always wraps; pixels past the edges wrap around when `wrap`
    /// is set and are clipped otherwise.
    /// Returns true if any lit pixel got switched off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: &[u8], wrap: bool) -> bool {
        let x = x % SCREEN_WIDTH;
        let y = y % SCREEN_HEIGHT;
        let mut collision = false;
        for (dy, row) in rows.iter().enumerate() {
            let mut py = y + dy;
            if py >= SCREEN_HEIGHT {
                if !wrap { break }
                py %= SCREEN_HEIGHT;
            }
            for dx in 0..8 {
                if row & (0x80 >> dx) == 0 { continue }
                let mut px = x + dx;
                if px >= SCREEN_WIDTH {
                    if !wrap { break }
                    px %= SCREEN_WIDTH;
                }
                collision |= self.flip(px, py);
            }
        }
        collision
    }
    /// returns true if the pixel was lit before
    fn flip(&mut self, x: usize, y: usize) -> bool {
        let px = &mut self.pixels[y * SCREEN_WIDTH + x];
        *px ^= 1;
        *px == 0
    }
}
impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    fn lit(fb: &FrameBuffer) -> usize {
        fb.get_buffer().iter().filter(|&&p| p == 1).count()
    }
    #[test]
    fn draw_row() {
        let mut fb = FrameBuffer::new();
        let flag = fb.draw_sprite(8, 0, &[0b10101011], false);
        assert!(!flag);
        assert!(fb.pixel(8, 0) == 1);
        assert!(fb.pixel(9, 0) == 0);
        assert!(fb.pixel(10, 0) == 1);
        assert!(fb.pixel(14, 0) == 1);
        assert!(fb.pixel(15, 0) == 1);
        assert!(lit(&fb) == 5);
    }
    #[test]
    fn draw_with_y() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(2, 2, &[0b10000001], false);
        assert!(fb.get_buffer()[2 + 2 * SCREEN_WIDTH] == 1);
        assert!(fb.get_buffer()[9 + 2 * SCREEN_WIDTH] == 1);
        assert!(lit(&fb) == 2);
    }
    #[test]
    fn draw_collision_clears_pixels() {
        let mut fb = FrameBuffer::new();
        assert!(!fb.draw_sprite(0, 0, &[0b11110000], false));
        assert!(fb.draw_sprite(2, 0, &[0b11000000], false));
        assert!(fb.pixel(0, 0) == 1);
        assert!(fb.pixel(1, 0) == 1);
        assert!(fb.pixel(2, 0) == 0);
        assert!(fb.pixel(3, 0) == 0);
    }
    #[test]
    fn draw_without_overlap_has_no_collision() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(0, 0, &[0b11110000], false);
        assert!(!fb.draw_sprite(4, 0, &[0b11110000], false));
        assert!(lit(&fb) == 8);
    }
    #[test]
    fn draw_twice_erases() {
        let mut fb = FrameBuffer::new();
        let sprite = [0xF0, 0x90, 0x90, 0x90, 0xF0];
        fb.draw_sprite(10, 10, &sprite, false);
        assert!(fb.draw_sprite(10, 10, &sprite, false));
        assert!(lit(&fb) == 0);
    }
    #[test]
    fn draw_clips_at_right_edge() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(60, 0, &[0xFF], false);
        assert!(lit(&fb) == 4);
        assert!(fb.pixel(0, 0) == 0);
    }
    #[test]
    fn draw_wraps_at_right_edge() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(60, 0, &[0xFF], true);
        assert!(lit(&fb) == 8);
        assert!(fb.pixel(63, 0) == 1);
        assert!(fb.pixel(0, 0) == 1);
        assert!(fb.pixel(3, 0) == 1);
        assert!(fb.pixel(4, 0) == 0);
    }
    #[test]
    fn draw_clips_at_bottom_edge() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(0, 30, &[0x80, 0x80, 0x80, 0x80], false);
        assert!(lit(&fb) == 2);
        assert!(fb.pixel(0, 0) == 0);
    }
    #[test]
    fn draw_wraps_at_bottom_edge() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(0, 30, &[0x80, 0x80, 0x80, 0x80], true);
        assert!(lit(&fb) == 4);
        assert!(fb.pixel(0, 0) == 1);
        assert!(fb.pixel(0, 1) == 1);
    }
    #[test]
    fn draw_origin_always_wraps() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(SCREEN_WIDTH + 1, SCREEN_HEIGHT + 2, &[0x80], false);
        assert!(fb.pixel(1, 2) == 1);
    }
    #[test]
    fn clear() {
        let mut fb = FrameBuffer::new();
        fb.draw_sprite(0, 0, &[0xFF; 15], false);
        fb.clear();
        assert!(fb.get_buffer() == &[0u8; SCREEN_BUFFER_SIZE]);
    }
}
