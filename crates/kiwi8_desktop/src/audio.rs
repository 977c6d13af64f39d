use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc
};

use anyhow::{anyhow, Result};
use tinyaudio::prelude::*;

const TONE_HZ: f32 = 440.0;
const AMPLITUDE: f32 = 0.05;

/// Keeps an output device open and fills it with a sine tone or silence,
/// depending on what the last frame asked for.
pub struct Beeper {
    _device: Box<dyn BaseAudioOutputDevice>,
    active: Arc<AtomicBool>
}
impl Beeper {
    pub fn new(params: OutputDeviceParameters) -> Result<Self> {
        let active = Arc::new(AtomicBool::new(false));
        let device = run_output_device(
            params,
            {
                let active = Arc::clone(&active);
                let channels = params.channels_count;
                let step = TONE_HZ * 2.0 * std::f32::consts::PI / params.sample_rate as f32;
                let mut phase = 0f32;
                move |data| {
                    let on = active.load(Ordering::Relaxed);
                    for samples in data.chunks_mut(channels) {
                        // keep the phase running so the tone resumes without a click
                        phase = (phase + step) % (2.0 * std::f32::consts::PI);
                        let val = if on { AMPLITUDE * phase.sin() } else { 0.0 };
                        for sample in samples {
                            *sample = val;
                        }
                    }
                }
            }
        ).map_err(|e| anyhow!("unable to open audio device: {e}"))?;
        Ok(Self {
            _device: device,
            active
        })
    }
    /// Polled once per frame
    pub fn update(&mut self, sound: bool) {
        self.active.store(sound, Ordering::Relaxed);
    }
}

pub fn get_device() -> Result<Beeper> {
    let params = OutputDeviceParameters {
        channels_count: 2,
        sample_rate: 44100,
        channel_sample_count: 4410
    };
    Beeper::new(params)
}
