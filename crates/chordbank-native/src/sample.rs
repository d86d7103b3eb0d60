use anyhow::{anyhow, Context};
use std::path::Path;

/// A decoded sample held as one `Vec<f32>` per channel.
pub struct SampleBuffer {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Linearly interpolated sample at a fractional frame position.
    pub fn sample_at(&self, channel: usize, pos: f64) -> f32 {
        let data = &self.channels[channel.min(self.channels.len() - 1)];
        let i = pos.floor() as usize;
        let frac = (pos - pos.floor()) as f32;
        let a = data.get(i).copied().unwrap_or(0.0);
        let b = data.get(i + 1).copied().unwrap_or(0.0);
        a + (b - a) * frac
    }
}

/// Decode a WAV file (16/24/32-bit integer or float) into per-channel buffers.
pub fn load_wav(path: &Path) -> anyhow::Result<SampleBuffer> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channel_count = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
            .collect::<Result<_, _>>()?,
        (hound::SampleFormat::Int, 24) => reader
            .into_samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 8_388_608.0))
            .collect::<Result<_, _>>()?,
        (hound::SampleFormat::Int, 32) => reader
            .into_samples::<i32>()
            .map(|s| s.map(|s| s as f32 / i32::MAX as f32))
            .collect::<Result<_, _>>()?,
        (hound::SampleFormat::Float, _) => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        (fmt, bits) => return Err(anyhow!("unsupported WAV format: {:?} {}bit", fmt, bits)),
    };

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (ch, &s) in frame.iter().enumerate() {
            channels[ch].push(s);
        }
    }
    let buffer = SampleBuffer {
        channels,
        sample_rate: spec.sample_rate,
    };
    if buffer.frames() == 0 {
        return Err(anyhow!("{} contains no audio", path.display()));
    }
    Ok(buffer)
}
