use crate::dsp::FilterBankDsp;
use crate::sample::SampleBuffer;
use anyhow::{anyhow, Context};
use chordbank_core::{AudioGraph, FilterTargets};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type SharedDsp = Arc<Mutex<FilterBankDsp>>;

fn lock(dsp: &SharedDsp) -> MutexGuard<'_, FilterBankDsp> {
    // A panicking callback leaves the DSP state usable; keep going with it.
    dsp.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The filter bank running on the default cpal output device.
///
/// Owns the output stream, so it must stay on the thread that opened it.
pub struct NativeGraph {
    dsp: SharedDsp,
    stream: Option<cpal::Stream>,
}

impl NativeGraph {
    /// Open the default output device and start the sample playing through
    /// the bank. Filters start silent until the first retarget.
    pub fn open(sample: Arc<SampleBuffer>, looping: bool) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no default output device"))?;
        let config = device
            .default_output_config()
            .context("querying default output config")?;
        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        log::info!(
            "output device {:?}: {} Hz, {} channels, {:?}",
            device.name().unwrap_or_default(),
            sample_rate,
            channels,
            config.sample_format()
        );

        let dsp = Arc::new(Mutex::new(FilterBankDsp::new(sample, sample_rate, looping)));
        let err_fn = |err| log::error!("audio stream error: {err}");
        let stream_config: cpal::StreamConfig = config.clone().into();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_stream(
                &device,
                &stream_config,
                channels,
                Arc::clone(&dsp),
                |x| x,
                err_fn,
            )?,
            cpal::SampleFormat::I16 => build_stream(
                &device,
                &stream_config,
                channels,
                Arc::clone(&dsp),
                |x| (x * i16::MAX as f32) as i16,
                err_fn,
            )?,
            cpal::SampleFormat::U16 => build_stream(
                &device,
                &stream_config,
                channels,
                Arc::clone(&dsp),
                |x| (((x * 0.5 + 0.5).clamp(0.0, 1.0)) * u16::MAX as f32) as u16,
                err_fn,
            )?,
            other => return Err(anyhow!("unsupported output sample format {:?}", other)),
        };
        stream.play().context("starting output stream")?;

        Ok(Self {
            dsp,
            stream: Some(stream),
        })
    }
}

impl AudioGraph for NativeGraph {
    fn retarget(&mut self, targets: &FilterTargets, tau_sec: f64) {
        lock(&self.dsp).retarget(targets, tau_sec);
    }

    fn set_resonance(&mut self, q: f32) {
        lock(&self.dsp).set_q(q);
    }

    fn set_bypass(&mut self, bypass: bool) {
        lock(&self.dsp).set_bypass(bypass);
    }

    fn measure_rms(&mut self) -> f32 {
        let dsp = lock(&self.dsp);
        if dsp.is_finished() {
            log::debug!("sample finished; bus is silent");
        }
        dsp.bus_rms()
    }

    fn ramp_output_gain(&mut self, gain: f32, tau_sec: f64) {
        lock(&self.dsp).set_gain(gain, tau_sec);
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("pausing output stream: {}", e);
            }
            drop(stream);
            log::info!("output stream closed");
        }
    }
}

impl Drop for NativeGraph {
    fn drop(&mut self) {
        self.release();
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    dsp: SharedDsp,
    convert: fn(f32) -> T,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let silence = convert(0.0);
    device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let mut dsp = lock(&dsp);
            for frame in data.chunks_mut(channels.max(1)) {
                let (l, r) = dsp.next_frame();
                match frame {
                    [mono] => *mono = convert(0.5 * (l + r)),
                    [left, right, rest @ ..] => {
                        *left = convert(l);
                        *right = convert(r);
                        for s in rest {
                            *s = silence;
                        }
                    }
                    [] => {}
                }
            }
        },
        err_fn,
        None,
    )
}
