// Page wiring and WebAudio graph tuning for the browser player.

// DOM element ids, must match index.html
pub const PLAY_TOGGLE_ID: &str = "play-toggle";
pub const BYPASS_TOGGLE_ID: &str = "bypass-toggle";
pub const Q_SLIDER_ID: &str = "q-slider";
pub const Q_VALUE_ID: &str = "q-value";
pub const STATUS_ID: &str = "status";

// Sample asset, decoded once per play
pub const SAMPLE_URL: &str = "/sample.m4a";

// Analyser window used for RMS measurement (samples, power of two)
pub const ANALYSER_FFT_SIZE: u32 = 2048;

// Dry path level when the filter bank is bypassed
pub const BYPASS_DRY_GAIN: f32 = 1.0;
pub const BYPASS_RAMP_TAU_SEC: f64 = 0.05;

// Smoothing for slider-driven resonance changes
pub const Q_RAMP_TAU_SEC: f64 = 0.02;
