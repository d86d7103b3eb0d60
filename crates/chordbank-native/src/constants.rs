// Native front-end tuning.

pub const DEFAULT_SAMPLE_PATH: &str = "assets/sample.wav";

// Control loop: how often armed timers are pumped between commands
pub const CONTROL_TICK_MS: u64 = 5;

// DSP
pub const COEFF_UPDATE_FRAMES: usize = 32; // filter coefficients follow the smoothed params at this rate
pub const MIN_FILTER_HZ: f32 = 20.0; // below this a channel is treated as silent
pub const NYQUIST_MARGIN: f32 = 0.49; // fraction of the sample rate a centre frequency may reach
pub const RMS_WINDOW_FRAMES: usize = 2048; // matches the web analyser window
pub const Q_RAMP_TAU_SEC: f32 = 0.02;
pub const BYPASS_RAMP_TAU_SEC: f32 = 0.05;
