//! Runs the cpu on its own thread, at a fixed 60Hz tick.
//!
//! Everything the execution thread touches lives behind a single mutex. A lock
//! is held for a whole instruction batch on the execution side and for a whole
//! snapshot on the presentation side, so neither ever sees the other half done.

use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant}
};

use crate::{
    cpu::Cpu,
    display::Frame,
    errors::ChipError,
    globals::TICK_RATE_HZ,
    keypad::Keys,
    quirks::{Config, Quirks}
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Running,
    Paused,
    AwaitingKey,
    Terminated
}

/// What the presentation side needs for one displayed frame
#[derive(Clone)]
pub struct Snapshot {
    pub frame: Frame,
    /// the sound timer is running and audio is not muted
    pub sound: bool,
    pub state: State
}

struct Shared {
    cpu: Cpu,
    config: Config,
    paused: bool,
    fault: Option<ChipError>
}
impl Shared {
    fn tick(&mut self) -> Result<(), ChipError> {
        if !self.paused {
            self.cpu.set_quirks(self.config.quirks);
            self.cpu.set_vwrap(self.config.vwrap);
            for _ in 0..self.config.steps {
                self.cpu.step()?;
            }
        }
        self.cpu.update_timers();
        Ok(())
    }
    fn state(&self) -> State {
        if self.fault.is_some() {
            State::Terminated
        } else if self.paused {
            State::Paused
        } else if self.cpu.is_awaiting_key() {
            State::AwaitingKey
        } else {
            State::Running
        }
    }
}

pub struct Machine {
    shared: Arc<Mutex<Shared>>,
    terminate: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    tick: Duration
}
impl Machine {
    pub fn start(cpu: Cpu, config: Config) -> Result<Self, ChipError> {
        Self::with_tick(cpu, config, Duration::from_micros(1_000_000 / TICK_RATE_HZ))
    }
    /// Same as `start`, with a custom tick length
    pub fn with_tick(cpu: Cpu, config: Config, tick: Duration) -> Result<Self, ChipError> {
        let shared = Shared {
            cpu,
            config,
            paused: false,
            fault: None
        };
        let mut machine = Machine {
            shared: Arc::new(Mutex::new(shared)),
            terminate: Arc::new(AtomicBool::new(false)),
            handle: None,
            tick
        };
        machine.spawn()?;
        Ok(machine)
    }
    fn spawn(&mut self) -> Result<(), ChipError> {
        let shared = Arc::clone(&self.shared);
        let terminate = Arc::clone(&self.terminate);
        let tick = self.tick;
        let handle = thread::Builder::new()
            .name("kiwi8-cpu".into())
            .spawn(move || run(shared, terminate, tick))?;
        self.handle = Some(handle);
        log::debug!("execution thread started");
        Ok(())
    }
    /// A poisoned lock means the execution thread died mid batch;
    /// the machine is treated as terminated from then on.
    fn lock(&self) -> Option<MutexGuard<'_, Shared>> {
        self.shared.lock().ok()
    }
    pub fn state(&self) -> State {
        if self.terminate.load(Ordering::Acquire) {
            return State::Terminated;
        }
        self.lock().map_or(State::Terminated, |shared| shared.state())
    }
    pub fn snapshot(&self) -> Option<Snapshot> {
        let shared = self.lock()?;
        Some(self.snapshot_of(&shared))
    }
    /// Hands the latest keypad to the cpu and takes a snapshot, under one lock
    pub fn sync(&self, keys: Keys) -> Option<Snapshot> {
        let mut shared = self.lock()?;
        shared.cpu.set_keys(keys);
        Some(self.snapshot_of(&shared))
    }
    fn snapshot_of(&self, shared: &Shared) -> Snapshot {
        let terminated = self.terminate.load(Ordering::Acquire);
        Snapshot {
            frame: *shared.cpu.get_display_buffer(),
            sound: shared.cpu.sound_active() && !shared.config.muted,
            state: if terminated { State::Terminated } else { shared.state() }
        }
    }
    /// Read access to the cpu, between two batches
    pub fn inspect<R>(&self, f: impl FnOnce(&Cpu) -> R) -> Option<R> {
        self.lock().map(|shared| f(&shared.cpu))
    }
    /// The fatal fault that stopped execution, if any
    pub fn fault(&self) -> Option<String> {
        self.lock()?.fault.as_ref().map(|e| e.to_string())
    }
    pub fn config(&self) -> Option<Config> {
        self.lock().map(|shared| shared.config)
    }
    pub fn set_keys(&self, keys: Keys) {
        if let Some(mut shared) = self.lock() {
            shared.cpu.set_keys(keys);
        }
    }
    pub fn set_paused(&self, paused: bool) {
        if let Some(mut shared) = self.lock() {
            log::debug!("paused: {}", paused);
            shared.paused = paused;
        }
    }
    pub fn toggle_pause(&self) {
        if let Some(mut shared) = self.lock() {
            shared.paused = !shared.paused;
            log::debug!("paused: {}", shared.paused);
        }
    }
    pub fn set_quirks(&self, quirks: Quirks) {
        if let Some(mut shared) = self.lock() {
            shared.config.quirks = quirks;
        }
    }
    pub fn set_vwrap(&self, vwrap: bool) {
        if let Some(mut shared) = self.lock() {
            shared.config.vwrap = vwrap;
        }
    }
    pub fn set_muted(&self, muted: bool) {
        if let Some(mut shared) = self.lock() {
            shared.config.muted = muted;
        }
    }
    pub fn toggle_mute(&self) {
        if let Some(mut shared) = self.lock() {
            shared.config.muted = !shared.config.muted;
        }
    }
    /// Instructions per tick
    pub fn set_steps(&self, steps: usize) {
        if let Some(mut shared) = self.lock() {
            shared.config.steps = steps;
        }
    }
    /// Restarts the current rom. Brings the execution thread back if a fault stopped it.
    pub fn soft_reset(&mut self) -> Result<(), ChipError> {
        self.lock().ok_or(ChipError::Poisoned)?.cpu.soft_reset();
        self.revive()
    }
    /// Swaps in a rom file. On failure the running program is left alone.
    /// The file is read before the lock is taken.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), ChipError> {
        let data = fs::read(path.as_ref())?;
        self.load_rom(&data)?;
        log::info!("loaded {} ({} bytes)", path.as_ref().display(), data.len());
        Ok(())
    }
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), ChipError> {
        self.lock().ok_or(ChipError::Poisoned)?.cpu.load_rom(data)?;
        self.revive()
    }
    fn revive(&mut self) -> Result<(), ChipError> {
        let faulted = self.lock().map_or(false, |mut shared| shared.fault.take().is_some());
        if faulted {
            self.join();
            self.terminate.store(false, Ordering::Release);
            self.spawn()?;
        }
        Ok(())
    }
    /// Stops the execution thread and waits for it
    pub fn terminate(&mut self) {
        self.terminate.store(true, Ordering::Release);
        self.join();
    }
    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("execution thread panicked");
            }
        }
    }
}
impl Drop for Machine {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn run(shared: Arc<Mutex<Shared>>, terminate: Arc<AtomicBool>, tick: Duration) {
    while !terminate.load(Ordering::Acquire) {
        let start = Instant::now();
        {
            let Ok(mut guard) = shared.lock() else {
                log::error!("state lock poisoned, stopping");
                terminate.store(true, Ordering::Release);
                break;
            };
            if let Err(e) = guard.tick() {
                log::error!("execution stopped: {}", e);
                guard.fault = Some(e);
                terminate.store(true, Ordering::Release);
                break;
            }
        }
        thread::sleep(tick.saturating_sub(start.elapsed()));
    }
    log::debug!("execution thread finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::KEY_COUNT;

    const TICK: Duration = Duration::from_millis(1);

    fn machine_with(program: &[u8]) -> Machine {
        let mut cpu = Cpu::with_seed(0);
        cpu.load_rom(program).unwrap();
        Machine::with_tick(cpu, Config::default(), TICK).unwrap()
    }
    fn wait_for(machine: &Machine, cond: impl Fn(&Machine) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond(machine) { return true }
            thread::sleep(TICK);
        }
        false
    }

    #[test]
    fn runs_program() {
        // V0 += 1 forever
        let machine = machine_with(&[0x70, 0x01, 0x12, 0x00]);
        assert!(wait_for(&machine, |m| m.inspect(|cpu| cpu.v()[0] > 10).unwrap()));
        assert!(machine.state() == State::Running);
    }
    #[test]
    fn pause_stops_execution_but_not_timers() {
        // delay = 0xFF, then V1 += 1 forever
        let machine = machine_with(&[0x60, 0xFF, 0xF0, 0x15, 0x71, 0x01, 0x12, 0x04]);
        assert!(wait_for(&machine, |m| m.inspect(|cpu| cpu.v()[1] > 0).unwrap()));
        machine.set_paused(true);
        assert!(machine.state() == State::Paused);
        let delay = machine.inspect(|cpu| cpu.delay_timer()).unwrap();
        let counter = machine.inspect(|cpu| cpu.v()[1]).unwrap();
        assert!(wait_for(&machine, |m| m.inspect(|cpu| cpu.delay_timer() < delay).unwrap()));
        assert!(machine.inspect(|cpu| cpu.v()[1]).unwrap() == counter);
        machine.toggle_pause();
        assert!(machine.state() == State::Running);
    }
    #[test]
    fn key_wait_resumes_on_press() {
        let machine = machine_with(&[0xF3, 0x0A, 0x12, 0x02]);
        assert!(wait_for(&machine, |m| m.state() == State::AwaitingKey));
        assert!(machine.inspect(|cpu| cpu.pc()).unwrap() == 0x202);
        let mut keys = [false; KEY_COUNT];
        keys[5] = true;
        machine.set_keys(keys);
        assert!(wait_for(&machine, |m| m.state() == State::Running));
        assert!(machine.inspect(|cpu| cpu.v()[3]).unwrap() == 5);
    }
    #[test]
    fn sync_delivers_keys() {
        // skip the jump back while key 2 is held
        let machine = machine_with(&[0x60, 0x02, 0xE0, 0x9E, 0x12, 0x02, 0x12, 0x06]);
        let mut keys = [false; KEY_COUNT];
        keys[2] = true;
        let snapshot = machine.sync(keys).unwrap();
        assert!(snapshot.state == State::Running);
        assert!(wait_for(&machine, |m| m.inspect(|cpu| cpu.pc() == 0x206).unwrap()));
    }
    #[test]
    fn underflow_terminates_thread() {
        let machine = machine_with(&[0x60, 0x0A, 0x61, 0x05, 0x80, 0x14, 0x00, 0xEE]);
        assert!(wait_for(&machine, |m| m.state() == State::Terminated));
        assert!(machine.fault() == Some(ChipError::StackUnderflow.to_string()));
        let v = machine.inspect(|cpu| *cpu.v()).unwrap();
        assert!(v[0] == 0x0F);
        assert!(v[0xF] == 0);
        // presentation keeps working after the fault
        let snapshot = machine.snapshot().unwrap();
        assert!(snapshot.state == State::Terminated);
        assert!(!snapshot.sound);
    }
    #[test]
    fn load_after_fault_restarts() {
        let mut machine = machine_with(&[0x00, 0xEE]);
        assert!(wait_for(&machine, |m| m.state() == State::Terminated));
        machine.load_rom(&[0x70, 0x01, 0x12, 0x00]).unwrap();
        assert!(machine.fault().is_none());
        assert!(wait_for(&machine, |m| m.inspect(|cpu| cpu.v()[0] > 3).unwrap()));
        assert!(machine.state() == State::Running);
    }
    #[test]
    fn failed_load_keeps_program() {
        let mut machine = machine_with(&[0x70, 0x01, 0x12, 0x00]);
        let path = std::env::temp_dir().join("kiwi8-machine-missing.ch8");
        let _ = std::fs::remove_file(&path);
        assert!(machine.load(&path).is_err());
        assert!(machine.inspect(|cpu| cpu.memory()[0x200..0x204] == [0x70, 0x01, 0x12, 0x00]).unwrap());
        assert!(wait_for(&machine, |m| m.inspect(|cpu| cpu.v()[0] > 3).unwrap()));
    }
    #[test]
    fn load_reads_rom_file() {
        let mut machine = machine_with(&[0x12, 0x00]);
        let path = std::env::temp_dir().join("kiwi8-machine-load.ch8");
        std::fs::write(&path, [0x70, 0x01, 0x12, 0x00]).unwrap();
        machine.load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(wait_for(&machine, |m| m.inspect(|cpu| cpu.v()[0] > 3).unwrap()));
    }
    #[test]
    fn poisoned_lock_rejects_loads() {
        let mut machine = machine_with(&[0x12, 0x00]);
        let shared = Arc::clone(&machine.shared);
        let _ = thread::spawn(move || {
            let _guard = shared.lock();
            panic!("poison the lock");
        }).join();
        assert!(machine.load_rom(&[0x70, 0x01, 0x12, 0x00]) == Err(ChipError::Poisoned));
        assert!(machine.soft_reset() == Err(ChipError::Poisoned));
        assert!(machine.state() == State::Terminated);
        assert!(machine.snapshot().is_none());
    }
    #[test]
    fn timers_drop_once_per_tick() {
        // delay = 10, then spin at 0x204
        let mut cpu = Cpu::with_seed(0);
        cpu.load_rom(&[0x60, 0x0A, 0xF0, 0x15, 0x12, 0x04]).unwrap();
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert!(cpu.delay_timer() == 10);
        let mut shared = Shared {
            cpu,
            config: Config { steps: 100, ..Config::default() },
            paused: false,
            fault: None
        };
        shared.tick().unwrap();
        assert!(shared.cpu.delay_timer() == 9);
        assert!(shared.cpu.pc() == 0x204);
        assert!(shared.cpu.stack_depth() == 0);
        shared.paused = true;
        shared.tick().unwrap();
        assert!(shared.cpu.delay_timer() == 8);
        assert!(shared.cpu.pc() == 0x204);
        assert!(shared.state() == State::Paused);
    }
    #[test]
    fn vwrap_applies_on_next_batch() {
        let mut machine = machine_with(&[0x12, 0x00]);
        machine.set_paused(true);
        // draw a full row at x = 60, then spin
        machine.load_rom(&[0x60, 0x3C, 0x61, 0x00, 0xA2, 0x0A, 0xD0, 0x11, 0x12, 0x08, 0xFF]).unwrap();
        machine.set_vwrap(true);
        assert!(machine.config().unwrap().vwrap);
        machine.set_paused(false);
        assert!(wait_for(&machine, |m| m.snapshot().unwrap().frame[0] == 1));
        assert!(machine.snapshot().unwrap().frame[3] == 1);
    }
    #[test]
    fn snapshot_reports_sound_unless_muted() {
        // sound = 0xFF, then spin
        let machine = machine_with(&[0x60, 0xFF, 0xF0, 0x18, 0x12, 0x04]);
        assert!(wait_for(&machine, |m| m.snapshot().unwrap().sound));
        machine.set_muted(true);
        assert!(!machine.snapshot().unwrap().sound);
        assert!(machine.config().unwrap().muted);
    }
    #[test]
    fn snapshot_copies_frame() {
        // draw glyph 0 at (0, 0), then spin
        let machine = machine_with(&[0xA0, 0x50, 0xD0, 0x05, 0x12, 0x04]);
        assert!(wait_for(&machine, |m| m.snapshot().unwrap().frame[0] == 1));
        let frame = machine.snapshot().unwrap().frame;
        assert!(frame[..4] == [1, 1, 1, 1]);
        assert!(frame[4] == 0);
    }
    #[test]
    fn quirks_apply_on_next_batch() {
        // V0 = 1, then I = 0x300 and store V0 forever
        let machine = machine_with(&[0x60, 0x01, 0xA3, 0x00, 0xF0, 0x55, 0x12, 0x02]);
        assert!(wait_for(&machine, |m| m.inspect(|cpu| cpu.memory()[0x300] == 1).unwrap()));
        machine.set_quirks(Quirks { load_store: true, shift: false });
        thread::sleep(TICK * 5);
        machine.set_paused(true);
        assert!(machine.inspect(|cpu| cpu.i()).unwrap() == 0x300);
    }
    #[test]
    fn soft_reset_restarts_program() {
        let mut machine = machine_with(&[0x70, 0x01, 0x12, 0x00]);
        machine.set_steps(1);
        assert!(wait_for(&machine, |m| m.inspect(|cpu| cpu.v()[0] > 5).unwrap()));
        machine.set_paused(true);
        machine.soft_reset().unwrap();
        assert!(machine.inspect(|cpu| cpu.v()[0] == 0 && cpu.pc() == 0x200).unwrap());
    }
    #[test]
    fn terminate_joins_thread() {
        let mut machine = machine_with(&[0x12, 0x00]);
        machine.terminate();
        assert!(machine.state() == State::Terminated);
        assert!(machine.handle.is_none());
        assert!(machine.snapshot().unwrap().state == State::Terminated);
    }
}
