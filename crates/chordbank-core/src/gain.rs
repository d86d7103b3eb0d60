//! Resonance control and the RMS-driven makeup gain.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::*;

/// Live filter Q shared between the UI (single writer) and scheduler ticks (readers).
///
/// Values are clamped to `[Q_MIN, Q_MAX]` on write; readers always see the
/// latest value, so ticks re-sample it rather than caching it per bar.
#[derive(Clone, Debug)]
pub struct Resonance {
    bits: Arc<AtomicU32>,
}

impl Resonance {
    pub fn new(q: f32) -> Self {
        let r = Self {
            bits: Arc::new(AtomicU32::new(DEFAULT_Q.to_bits())),
        };
        r.set(q);
        r
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Store a new Q, returning the clamped value actually stored.
    pub fn set(&self, q: f32) -> f32 {
        let q = if q.is_finite() { q.clamp(Q_MIN, Q_MAX) } else { DEFAULT_Q };
        self.bits.store(q.to_bits(), Ordering::Relaxed);
        q
    }
}

impl Default for Resonance {
    fn default() -> Self {
        Self::new(DEFAULT_Q)
    }
}

/// Tuning for the makeup-gain loop.
///
/// - `target_rms`: loudness the filter bus is corrected towards
/// - `epsilon`: added to the measurement so silence does not divide by zero
/// - `makeup_min`/`makeup_max`: clamp on the correction factor
/// - `base_k`: scale of the log-Q base gain, `1 + k * ln(q) / ln(q_max)`
/// - `interval`: period of the measurement tick
/// - `enabled`: when false only the base gain is applied
#[derive(Clone, Debug, PartialEq)]
pub struct AutoGainParams {
    pub target_rms: f32,
    pub epsilon: f32,
    pub makeup_min: f32,
    pub makeup_max: f32,
    pub base_k: f32,
    pub q_max: f32,
    pub interval: Duration,
    pub ramp_tau_sec: f64,
    pub enabled: bool,
}

impl Default for AutoGainParams {
    fn default() -> Self {
        Self {
            target_rms: TARGET_RMS,
            epsilon: RMS_EPSILON,
            makeup_min: MAKEUP_MIN,
            makeup_max: MAKEUP_MAX,
            base_k: BASE_GAIN_K,
            q_max: Q_MAX,
            interval: Duration::from_millis(AUTO_GAIN_INTERVAL_MS),
            ramp_tau_sec: GAIN_RAMP_TAU_SEC,
            enabled: true,
        }
    }
}

impl AutoGainParams {
    /// Correction factor for a measured RMS level.
    pub fn makeup(&self, measured_rms: f32) -> f32 {
        let measured = if measured_rms.is_finite() { measured_rms.max(0.0) } else { 0.0 };
        (self.target_rms / (measured + self.epsilon)).clamp(self.makeup_min, self.makeup_max)
    }

    /// Resonance-derived base gain; grows logarithmically with Q.
    pub fn base_gain(&self, q: f32) -> f32 {
        let q = q.max(Q_MIN);
        1.0 + self.base_k * q.ln() / self.q_max.ln()
    }

    /// Gain the output stage should ramp towards.
    pub fn output_gain(&self, q: f32, measured_rms: f32) -> f32 {
        if self.enabled {
            self.base_gain(q) * self.makeup(measured_rms)
        } else {
            self.base_gain(q)
        }
    }
}

/// Root-mean-square level of a block of samples; 0.0 for an empty block.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}
