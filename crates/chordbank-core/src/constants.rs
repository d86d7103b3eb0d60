// Shared audio tuning constants used by both web and native frontends.

// Tempo
pub const DEFAULT_BPM: f32 = 90.0;
pub const BEATS_PER_BAR: u32 = 4;

// Filter bank
pub const FILTER_COUNT: usize = 4; // one band-pass per chord tone
pub const FREQ_RAMP_TAU_SEC: f64 = 0.01; // retarget smoothing, short enough to track subdivisions

// Resonance (slider range)
pub const Q_MIN: f32 = 1.0;
pub const Q_MAX: f32 = 700.0;
pub const DEFAULT_Q: f32 = 30.0;

// Auto-gain
pub const AUTO_GAIN_INTERVAL_MS: u64 = 100;
pub const TARGET_RMS: f32 = 0.08; // desired filter-bus loudness
pub const RMS_EPSILON: f32 = 1e-4; // guards silent input
pub const MAKEUP_MIN: f32 = 1.0;
pub const MAKEUP_MAX: f32 = 10.0;
pub const BASE_GAIN_K: f32 = 9.0; // base gain reaches 1 + k at Q_MAX
pub const GAIN_RAMP_TAU_SEC: f64 = 0.1;
