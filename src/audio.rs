use crate::constants::{ANALYSER_FFT_SIZE, BYPASS_DRY_GAIN, BYPASS_RAMP_TAU_SEC, Q_RAMP_TAU_SEC};
use anyhow::anyhow;
use chordbank_core::{rms, AudioGraph, FilterTargets, FILTER_COUNT};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys as web;

fn js_err(label: &str, e: wasm_bindgen::JsValue) -> anyhow::Error {
    anyhow!("{} error: {:?}", label, e)
}

fn create_gain(audio_ctx: &web::AudioContext, value: f32, label: &str) -> anyhow::Result<web::GainNode> {
    let g = web::GainNode::new(audio_ctx).map_err(|e| js_err(label, e))?;
    g.gain().set_value(value);
    Ok(g)
}

/// Fetch and decode the sample asset on the given context.
pub async fn load_sample(audio_ctx: &web::AudioContext, url: &str) -> anyhow::Result<web::AudioBuffer> {
    let window = web::window().ok_or_else(|| anyhow!("no window"))?;
    let resp: web::Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| js_err("fetch", e))?
        .dyn_into()
        .map_err(|e| js_err("fetch response", e))?;
    if !resp.ok() {
        return Err(anyhow!("fetch {} failed with status {}", url, resp.status()));
    }
    let bytes = JsFuture::from(resp.array_buffer().map_err(|e| js_err("arrayBuffer", e))?)
        .await
        .map_err(|e| js_err("arrayBuffer", e))?;
    let bytes: js_sys::ArrayBuffer = bytes.dyn_into().map_err(|e| js_err("arrayBuffer", e))?;
    let decoded = JsFuture::from(
        audio_ctx
            .decode_audio_data(&bytes)
            .map_err(|e| js_err("decodeAudioData", e))?,
    )
    .await
    .map_err(|e| js_err("decodeAudioData", e))?;
    decoded.dyn_into().map_err(|e| js_err("AudioBuffer", e))
}

/// The WebAudio realisation of the filter-bank chain:
///
/// ```text
/// source -+-> band-pass x4 -> filter_bus -+-> analyser
///         |                               +-> makeup -> wet -+
///         +-> dry -------------------------------------------+-> destination
/// ```
pub struct WebAudioGraph {
    ctx: web::AudioContext,
    source: web::AudioBufferSourceNode,
    filters: Vec<web::BiquadFilterNode>,
    filter_bus: web::GainNode,
    analyser: web::AnalyserNode,
    analyser_buf: Vec<f32>,
    makeup: web::GainNode,
    wet: web::GainNode,
    dry: web::GainNode,
    released: bool,
}

impl WebAudioGraph {
    /// Wire the chain around an already decoded buffer and start the source.
    pub fn build(ctx: web::AudioContext, buffer: &web::AudioBuffer, looping: bool) -> anyhow::Result<Self> {
        let source = web::AudioBufferSourceNode::new(&ctx).map_err(|e| js_err("AudioBufferSourceNode", e))?;
        source.set_buffer(Some(buffer));
        source.set_loop(looping);

        let filter_bus = create_gain(&ctx, 1.0, "Filter bus")?;
        let makeup = create_gain(&ctx, 1.0, "Makeup")?;
        let wet = create_gain(&ctx, 1.0, "Wet")?;
        let dry = create_gain(&ctx, 0.0, "Dry")?;
        let analyser = web::AnalyserNode::new(&ctx).map_err(|e| js_err("AnalyserNode", e))?;
        analyser.set_fft_size(ANALYSER_FFT_SIZE);
        let analyser_buf = vec![0.0; analyser.fft_size() as usize];

        let mut filters = Vec::with_capacity(FILTER_COUNT);
        for _ in 0..FILTER_COUNT {
            let f = web::BiquadFilterNode::new(&ctx).map_err(|e| js_err("BiquadFilterNode", e))?;
            f.set_type(web::BiquadFilterType::Bandpass);
            source
                .connect_with_audio_node(&f)
                .map_err(|e| js_err("connect filter", e))?;
            f.connect_with_audio_node(&filter_bus)
                .map_err(|e| js_err("connect filter bus", e))?;
            filters.push(f);
        }

        let destination = ctx.destination();
        filter_bus
            .connect_with_audio_node(&analyser)
            .map_err(|e| js_err("connect analyser", e))?;
        filter_bus
            .connect_with_audio_node(&makeup)
            .map_err(|e| js_err("connect makeup", e))?;
        makeup
            .connect_with_audio_node(&wet)
            .map_err(|e| js_err("connect wet", e))?;
        wet.connect_with_audio_node(&destination)
            .map_err(|e| js_err("connect destination", e))?;
        source
            .connect_with_audio_node(&dry)
            .map_err(|e| js_err("connect dry", e))?;
        dry.connect_with_audio_node(&destination)
            .map_err(|e| js_err("connect dry destination", e))?;

        #[allow(deprecated)]
        let started = source.start();
        started.map_err(|e| js_err("source start", e))?;

        Ok(Self {
            ctx,
            source,
            filters,
            filter_bus,
            analyser,
            analyser_buf,
            makeup,
            wet,
            dry,
            released: false,
        })
    }

    fn now(&self) -> f64 {
        self.ctx.current_time()
    }
}

impl AudioGraph for WebAudioGraph {
    fn retarget(&mut self, targets: &FilterTargets, time_constant_sec: f64) {
        let now = self.now();
        for (filter, &hz) in self.filters.iter().zip(targets.iter()) {
            let _ = filter.frequency().set_target_at_time(hz, now, time_constant_sec);
        }
    }

    fn set_resonance(&mut self, q: f32) {
        let now = self.now();
        for filter in &self.filters {
            let _ = filter.q().set_target_at_time(q, now, Q_RAMP_TAU_SEC);
        }
    }

    fn set_bypass(&mut self, bypass: bool) {
        let now = self.now();
        let (wet, dry) = if bypass { (0.0, BYPASS_DRY_GAIN) } else { (1.0, 0.0) };
        let _ = self.wet.gain().set_target_at_time(wet, now, BYPASS_RAMP_TAU_SEC);
        let _ = self.dry.gain().set_target_at_time(dry, now, BYPASS_RAMP_TAU_SEC);
    }

    fn measure_rms(&mut self) -> f32 {
        self.analyser.get_float_time_domain_data(&mut self.analyser_buf);
        rms(&self.analyser_buf)
    }

    fn ramp_output_gain(&mut self, gain: f32, time_constant_sec: f64) {
        let now = self.now();
        let _ = self.makeup.gain().set_target_at_time(gain, now, time_constant_sec);
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        #[allow(deprecated)]
        let _ = self.source.stop();
        let _ = self.source.disconnect();
        for f in &self.filters {
            let _ = f.disconnect();
        }
        let _ = self.filter_bus.disconnect();
        let _ = self.analyser.disconnect();
        let _ = self.makeup.disconnect();
        let _ = self.wet.disconnect();
        let _ = self.dry.disconnect();
        if let Err(e) = self.ctx.close() {
            log::warn!("AudioContext close error: {:?}", e);
        }
    }
}
