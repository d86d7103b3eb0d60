//! Sample-accurate rendition of the filter-bank chain for the cpal callback.
//!
//! Parameter changes arrive as targets and are approached with one-pole
//! smoothing, the same exponential glide `setTargetAtTime` performs in
//! WebAudio. Filter coefficients are recomputed from the smoothed values
//! every `COEFF_UPDATE_FRAMES` frames.

use crate::constants::*;
use crate::sample::SampleBuffer;
use biquad::{Biquad, Coefficients, DirectForm2Transposed, Hertz, Type};
use chordbank_core::{rms, FilterTargets, DEFAULT_Q, FILTER_COUNT};
use std::sync::Arc;

/// Exponential approach towards a target value.
#[derive(Clone, Copy, Debug)]
struct Smoothed {
    value: f32,
    target: f32,
    coeff: f32,
}

impl Smoothed {
    fn new(value: f32) -> Self {
        Self {
            value,
            target: value,
            coeff: 1.0,
        }
    }

    fn set_target(&mut self, target: f32, tau_sec: f32, sample_rate: f32) {
        self.target = target;
        self.coeff = if tau_sec <= 0.0 {
            1.0
        } else {
            1.0 - (-1.0 / (tau_sec * sample_rate)).exp()
        };
    }

    #[inline]
    fn next(&mut self) -> f32 {
        self.value += (self.target - self.value) * self.coeff;
        self.value
    }
}

struct Channel {
    freq: Smoothed,
    // one filter per output side
    filters: [DirectForm2Transposed<f32>; 2],
    silent: bool,
}

pub struct FilterBankDsp {
    sample: Arc<SampleBuffer>,
    sample_rate: f32,
    pos: f64,
    step: f64,
    looping: bool,
    finished: bool,
    channels: Vec<Channel>,
    q: Smoothed,
    gain: Smoothed,
    wet: Smoothed,
    dry: Smoothed,
    bus_history: Vec<f32>,
    history_pos: usize,
    frames_until_update: usize,
}

impl FilterBankDsp {
    pub fn new(sample: Arc<SampleBuffer>, sample_rate: f32, looping: bool) -> Self {
        let step = sample.sample_rate as f64 / sample_rate as f64;
        if sample.sample_rate as f32 != sample_rate {
            log::info!(
                "resampling {} Hz sample to {} Hz output",
                sample.sample_rate,
                sample_rate
            );
        }
        let silent = Coefficients {
            a1: 0.0,
            a2: 0.0,
            b0: 0.0,
            b1: 0.0,
            b2: 0.0,
        };
        let channels = (0..FILTER_COUNT)
            .map(|_| Channel {
                freq: Smoothed::new(0.0),
                filters: [
                    DirectForm2Transposed::<f32>::new(silent),
                    DirectForm2Transposed::<f32>::new(silent),
                ],
                silent: true,
            })
            .collect();
        Self {
            sample,
            sample_rate,
            pos: 0.0,
            step,
            looping,
            finished: false,
            channels,
            q: Smoothed::new(DEFAULT_Q),
            gain: Smoothed::new(1.0),
            wet: Smoothed::new(1.0),
            dry: Smoothed::new(0.0),
            bus_history: vec![0.0; RMS_WINDOW_FRAMES],
            history_pos: 0,
            frames_until_update: 0,
        }
    }

    pub fn retarget(&mut self, targets: &FilterTargets, tau_sec: f64) {
        for (ch, &hz) in self.channels.iter_mut().zip(targets.iter()) {
            ch.freq.set_target(hz.max(0.0), tau_sec as f32, self.sample_rate);
        }
    }

    pub fn set_q(&mut self, q: f32) {
        self.q.set_target(q, Q_RAMP_TAU_SEC, self.sample_rate);
    }

    pub fn set_gain(&mut self, gain: f32, tau_sec: f64) {
        self.gain.set_target(gain, tau_sec as f32, self.sample_rate);
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        let (wet, dry) = if bypass { (0.0, 1.0) } else { (1.0, 0.0) };
        self.wet.set_target(wet, BYPASS_RAMP_TAU_SEC, self.sample_rate);
        self.dry.set_target(dry, BYPASS_RAMP_TAU_SEC, self.sample_rate);
    }

    /// RMS of the filter bus over the last `RMS_WINDOW_FRAMES` frames.
    pub fn bus_rms(&self) -> f32 {
        rms(&self.bus_history)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn update_coefficients(&mut self) {
        let q = self.q.value.max(f32::EPSILON);
        let max_hz = self.sample_rate * NYQUIST_MARGIN;
        for ch in &mut self.channels {
            let hz = ch.freq.value;
            if hz < MIN_FILTER_HZ {
                ch.silent = true;
                continue;
            }
            let coeffs = Hertz::<f32>::from_hz(self.sample_rate)
                .and_then(|fs| Hertz::<f32>::from_hz(hz.min(max_hz)).map(|f0| (fs, f0)))
                .and_then(|(fs, f0)| Coefficients::<f32>::from_params(Type::BandPass, fs, f0, q));
            match coeffs {
                Ok(c) => {
                    for f in &mut ch.filters {
                        f.update_coefficients(c);
                    }
                    ch.silent = false;
                }
                Err(e) => {
                    log::debug!("band-pass coefficients for {} Hz rejected: {:?}", hz, e);
                    ch.silent = true;
                }
            }
        }
    }

    fn next_input(&mut self) -> (f32, f32) {
        if self.finished {
            return (0.0, 0.0);
        }
        let frames = self.sample.frames() as f64;
        if self.pos >= frames {
            if self.looping {
                self.pos %= frames;
            } else {
                self.finished = true;
                return (0.0, 0.0);
            }
        }
        let l = self.sample.sample_at(0, self.pos);
        let r = self.sample.sample_at(1, self.pos);
        self.pos += self.step;
        (l, r)
    }

    /// Render one stereo frame.
    pub fn next_frame(&mut self) -> (f32, f32) {
        for ch in &mut self.channels {
            ch.freq.next();
        }
        self.q.next();
        if self.frames_until_update == 0 {
            self.update_coefficients();
            self.frames_until_update = COEFF_UPDATE_FRAMES;
        }
        self.frames_until_update -= 1;

        let (l, r) = self.next_input();
        let mut bus_l = 0.0;
        let mut bus_r = 0.0;
        for ch in self.channels.iter_mut().filter(|ch| !ch.silent) {
            bus_l += ch.filters[0].run(l);
            bus_r += ch.filters[1].run(r);
        }

        self.bus_history[self.history_pos] = 0.5 * (bus_l + bus_r);
        self.history_pos = (self.history_pos + 1) % self.bus_history.len();

        let gain = self.gain.next();
        let wet = self.wet.next();
        let dry = self.dry.next();
        let out_l = bus_l * gain * wet + l * dry;
        let out_r = bus_r * gain * wet + r * dry;
        (out_l.tanh(), out_r.tanh())
    }
}
