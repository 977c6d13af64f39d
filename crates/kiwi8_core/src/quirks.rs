use crate::globals::DEFAULT_STEPS_PER_TICK;

/// Deviations from the original interpreter some programs rely on.
///
/// `load_store`: FX55/FX65 leave I untouched instead of advancing it by X + 1.
/// `shift`: 8XY6/8XYE shift VX in place and ignore VY.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Quirks {
    pub load_store: bool,
    pub shift: bool,
}

/// Runtime settings the frontend may change between instruction batches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// instructions executed per 60Hz tick
    pub steps: usize,
    pub quirks: Quirks,
    /// sprites wrap around screen edges instead of being clipped
    pub vwrap: bool,
    pub muted: bool,
}
impl Default for Config {
    fn default() -> Self {
        Config {
            steps: DEFAULT_STEPS_PER_TICK,
            quirks: Quirks::default(),
            vwrap: false,
            muted: false,
        }
    }
}
