use std::{fs, ops::Range, path::Path};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    display::{Frame, FrameBuffer},
    errors::ChipError,
    font::{glyph_addr, FONT_SET},
    globals::{FONT_ADDR, MAX_ROM_SIZE, PROGRAM_ADDR, RAM_SIZE, REG_COUNT, STACK_SIZE},
    keypad::{Keypad, Keys},
    quirks::Quirks,
    utils::{bcd, u16_from_three, u16_from_two, u8_from_two}
};

const VF: usize = 0xF;

pub struct Cpu {
    memory: [u8; RAM_SIZE],
    display: FrameBuffer,
    v: [u8; REG_COUNT],
    pc: u16,
    i: u16,
    sp: usize,
    stack: [u16; STACK_SIZE],
    delay_timer: u8,
    sound_timer: u8,
    keypad: Keypad,
    // destination register of a pending FX0A
    awaiting_key: Option<u8>,
    quirks: Quirks,
    vwrap: bool,
    // kept for soft resets
    rom: Vec<u8>,
    rng: StdRng
}
impl Cpu {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
    /// Deterministic CXNN results, for tests and replays
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
    fn with_rng(rng: StdRng) -> Self {
        let mut cpu = Cpu {
            memory: [0; RAM_SIZE],
            display: FrameBuffer::new(),
            v: [0; REG_COUNT],
            pc: PROGRAM_ADDR,
            i: 0,
            sp: 0,
            stack: [0; STACK_SIZE],
            delay_timer: 0,
            sound_timer: 0,
            keypad: Keypad::new(),
            awaiting_key: None,
            quirks: Quirks::default(),
            vwrap: false,
            rom: Vec::new(),
            rng
        };
        cpu.load_font();
        cpu
    }
    /// Reads a rom file and restarts the machine with it.
    /// Nothing changes if the file can't be used.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), ChipError> {
        let data = fs::read(path.as_ref())?;
        self.load_rom(&data)?;
        log::info!("loaded {} ({} bytes)", path.as_ref().display(), data.len());
        Ok(())
    }
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), ChipError> {
        if data.len() > MAX_ROM_SIZE {
            return Err(ChipError::RomTooLarge(data.len()));
        }
        self.rom = data.to_vec();
        self.soft_reset();
        Ok(())
    }
    /// Restarts the currently loaded rom from its in-memory copy
    pub fn soft_reset(&mut self) {
        self.memory = [0; RAM_SIZE];
        self.load_font();
        let start = PROGRAM_ADDR as usize;
        self.memory[start..start + self.rom.len()].copy_from_slice(&self.rom);
        self.display.clear();
        self.v = [0; REG_COUNT];
        self.pc = PROGRAM_ADDR;
        self.i = 0;
        self.sp = 0;
        self.stack = [0; STACK_SIZE];
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.awaiting_key = None;
        self.keypad.clear_press();
        log::debug!("soft reset");
    }
    fn load_font(&mut self) {
        let start = FONT_ADDR as usize;
        self.memory[start..start + FONT_SET.len()].copy_from_slice(&FONT_SET);
    }
    pub fn get_display_buffer(&self) -> &Frame {
        self.display.get_buffer()
    }
    pub fn set_keys(&mut self, keys: Keys) {
        self.keypad.update(keys);
    }
    pub fn set_quirks(&mut self, quirks: Quirks) {
        self.quirks = quirks;
    }
    pub fn set_vwrap(&mut self, vwrap: bool) {
        self.vwrap = vwrap;
    }
    pub fn is_awaiting_key(&self) -> bool {
        self.awaiting_key.is_some()
    }
    pub fn sound_active(&self) -> bool {
        self.sound_timer > 0
    }
    pub fn pc(&self) -> u16 {
        self.pc
    }
    pub fn i(&self) -> u16 {
        self.i
    }
    pub fn v(&self) -> &[u8; REG_COUNT] {
        &self.v
    }
    pub fn stack_depth(&self) -> usize {
        self.sp
    }
    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }
    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }
    pub fn memory(&self) -> &[u8; RAM_SIZE] {
        &self.memory
    }
    /// Runs once per 60Hz tick, regardless of how many instructions ran
    pub fn update_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }
    /// Executes a single instruction, or polls the keypad while an FX0A is pending
    pub fn step(&mut self) -> Result<(), ChipError> {
        if let Some(x) = self.awaiting_key {
            if let Some(key) = self.keypad.take_press() {
                log::debug!("key {:X} pressed, resuming", key);
                self.v[x as usize] = key;
                self.awaiting_key = None;
            }
            return Ok(());
        }
        let op = self.get_current_opcode()?;
        log::trace!("{:#06x}: {:X}{:X}{:X}{:X}", self.pc, op.0, op.1, op.2, op.3);
        self.pc += 2;
        match op {
            (0, 0, 0xE, 0) => self.display.clear(),
            (0, 0, 0xE, 0xE) => self.pc = self.pop_stack()?,
            // machine subroutine -> ignored
            (0, _, _, _) => (),
            (1, n0, n1, n2) => self.pc = u16_from_three(n0, n1, n2),
            (2, n0, n1, n2) => {
                self.push_stack(self.pc)?;
                self.pc = u16_from_three(n0, n1, n2);
            },
            (3, x, n0, n1) => self.skip_if(self.v[x as usize] == u8_from_two(n0, n1)),
            (4, x, n0, n1) => self.skip_if(self.v[x as usize] != u8_from_two(n0, n1)),
            (5, x, y, 0) => self.skip_if(self.v[x as usize] == self.v[y as usize]),
            (6, x, n0, n1) => self.v[x as usize] = u8_from_two(n0, n1),
            (7, x, n0, n1) => {
                self.v[x as usize] = self.v[x as usize].wrapping_add(u8_from_two(n0, n1));
            },
            (8, x, y, 0) => self.v[x as usize] = self.v[y as usize],
            (8, x, y, 1) => self.v[x as usize] |= self.v[y as usize],
            (8, x, y, 2) => self.v[x as usize] &= self.v[y as usize],
            (8, x, y, 3) => self.v[x as usize] ^= self.v[y as usize],
            (8, x, y, 4) => {
                let (val, carry) = self.v[x as usize].overflowing_add(self.v[y as usize]);
                self.set_with_flag(x, val, carry);
            },
            (8, x, y, 5) => {
                let (val, borrow) = self.v[x as usize].overflowing_sub(self.v[y as usize]);
                self.set_with_flag(x, val, !borrow);
            },
            (8, x, y, 6) => {
                let src = self.shift_source(x, y);
                self.set_with_flag(x, src >> 1, src & 0x01 != 0);
            },
            (8, x, y, 7) => {
                let (val, borrow) = self.v[y as usize].overflowing_sub(self.v[x as usize]);
                self.set_with_flag(x, val, !borrow);
            },
            (8, x, y, 0xE) => {
                let src = self.shift_source(x, y);
                self.set_with_flag(x, src << 1, src & 0x80 != 0);
            },
            (9, x, y, 0) => self.skip_if(self.v[x as usize] != self.v[y as usize]),
            (0xA, n0, n1, n2) => self.i = u16_from_three(n0, n1, n2),
            (0xB, n0, n1, n2) => self.pc = u16_from_three(n0, n1, n2) + self.v[0] as u16,
            (0xC, x, n0, n1) => {
                self.v[x as usize] = self.rng.gen::<u8>() & u8_from_two(n0, n1);
            },
            (0xD, x, y, n) => {
                let range = self.mem_range(self.i, n as usize)?;
                let collision = self.display.draw_sprite(
                    self.v[x as usize] as usize,
                    self.v[y as usize] as usize,
                    &self.memory[range],
                    self.vwrap
                );
                self.v[VF] = collision as u8;
            },
            (0xE, x, 9, 0xE) => self.skip_if(self.keypad.is_pressed(self.v[x as usize])),
            (0xE, x, 0xA, 1) => self.skip_if(!self.keypad.is_pressed(self.v[x as usize])),
            (0xF, x, 0, 7) => self.v[x as usize] = self.delay_timer,
            (0xF, x, 0, 0xA) => {
                log::debug!("waiting for a key press into V{:X}", x);
                self.keypad.clear_press();
                self.awaiting_key = Some(x);
            },
            (0xF, x, 1, 5) => self.delay_timer = self.v[x as usize],
            (0xF, x, 1, 8) => self.sound_timer = self.v[x as usize],
            (0xF, x, 1, 0xE) => self.i = self.i.wrapping_add(self.v[x as usize] as u16),
            (0xF, x, 2, 9) => self.i = glyph_addr(self.v[x as usize]),
            (0xF, x, 3, 3) => {
                let range = self.mem_range(self.i, 3)?;
                self.memory[range].copy_from_slice(&bcd(self.v[x as usize]));
            },
            (0xF, x, 5, 5) => {
                let count = x as usize + 1;
                let range = self.mem_range(self.i, count)?;
                self.memory[range].copy_from_slice(&self.v[..count]);
                self.advance_index(count);
            },
            (0xF, x, 6, 5) => {
                let count = x as usize + 1;
                let range = self.mem_range(self.i, count)?;
                self.v[..count].copy_from_slice(&self.memory[range]);
                self.advance_index(count);
            },
            (a, b, c, d) => log::warn!(
                "unknown opcode {:04X} at {:#06x}, skipping",
                u16_from_two(u8_from_two(a, b), u8_from_two(c, d)),
                self.pc - 2
            ),
        };
        Ok(())
    }
    fn get_current_opcode(&self) -> Result<(u8, u8, u8, u8), ChipError> {
        let addr = self.pc as usize;
        if addr > RAM_SIZE - 2 {
            return Err(ChipError::IllegalAddr(self.pc))
        }
        Ok((
            self.memory[addr] >> 4,
            self.memory[addr] & 0x0F,
            self.memory[addr + 1] >> 4,
            self.memory[addr + 1] & 0x0F,
        ))
    }
    fn mem_range(&self, addr: u16, len: usize) -> Result<Range<usize>, ChipError> {
        let start = addr as usize;
        if start + len > RAM_SIZE {
            return Err(ChipError::IllegalAddr(addr));
        }
        Ok(start..start + len)
    }
    fn skip_if(&mut self, cond: bool) {
        if cond { self.pc += 2 }
    }
    /// VF goes last, so the flag wins when x is F
    fn set_with_flag(&mut self, x: u8, val: u8, flag: bool) {
        self.v[x as usize] = val;
        self.v[VF] = flag as u8;
    }
    fn shift_source(&self, x: u8, y: u8) -> u8 {
        if self.quirks.shift { self.v[x as usize] } else { self.v[y as usize] }
    }
    fn advance_index(&mut self, count: usize) {
        if !self.quirks.load_store {
            self.i += count as u16;
        }
    }
    fn push_stack(&mut self, val: u16) -> Result<(), ChipError> {
        if self.sp >= STACK_SIZE { return Err(ChipError::StackOverflow) };
        self.stack[self.sp] = val;
        self.sp += 1;
        Ok(())
    }
    fn pop_stack(&mut self) -> Result<u16, ChipError> {
        if self.sp == 0 { return Err(ChipError::StackUnderflow) }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }
}
impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
