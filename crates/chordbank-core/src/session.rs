//! Chord-driven bar scheduler.
//!
//! A [`Session`] owns everything that only exists while audio plays: the
//! audio graph handed to it by a front-end, the bar counter and the set of
//! armed timers. It walks the progression one bar at a time, retargeting the
//! four band-pass filters, and runs the makeup-gain loop alongside.
//!
//! State machine: `Idle -> Playing -> Stopped`. A stopped session may be
//! started again; each start is a fresh run from bar 0.

use std::time::Duration;

use fnv::FnvHashMap;

use crate::chords::ChordTable;
use crate::constants::*;
use crate::error::{SessionError, TimerError};
use crate::gain::{AutoGainParams, Resonance};
use crate::progression::{
    bar_duration_secs, expand_with, subdivision_offsets, BarEntry, Expansion, FilterTargets,
    Progression, SubChordVoicing,
};
use crate::timers::{TimerHost, TimerId, VirtualTimers};

/// The live signal chain a session drives: source -> 4 band-passes -> bus -> makeup gain.
///
/// Implementations must apply every change through the platform's smoothing
/// or ramping primitives, never as an instantaneous jump.
pub trait AudioGraph {
    /// Glide each filter channel towards its target centre frequency.
    fn retarget(&mut self, targets: &FilterTargets, time_constant_sec: f64);
    /// Set the shared Q of all filter channels.
    fn set_resonance(&mut self, q: f32);
    /// Route the unfiltered source to the output instead of the filter bank.
    fn set_bypass(&mut self, bypass: bool);
    /// RMS of the filter bus (before makeup gain) over the recent analysis window.
    fn measure_rms(&mut self) -> f32;
    fn ramp_output_gain(&mut self, gain: f32, time_constant_sec: f64);
    /// Stop the source and disconnect every node. Called exactly once.
    fn release(&mut self);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Wrap around the progression until stopped.
    #[default]
    Loop,
    /// Play the progression once, then stop.
    Once,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Stopped,
}

/// Static parameters of a session, injected at construction.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub bpm: f32,
    pub beats_per_bar: u32,
    pub progression: Progression,
    pub chords: ChordTable,
    pub voicing: SubChordVoicing,
    pub mode: PlaybackMode,
    pub freq_ramp_tau_sec: f64,
    pub auto_gain: AutoGainParams,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            beats_per_bar: BEATS_PER_BAR,
            progression: Progression::default(),
            chords: ChordTable::default(),
            voicing: SubChordVoicing::default(),
            mode: PlaybackMode::default(),
            freq_ramp_tau_sec: FREQ_RAMP_TAU_SEC,
            auto_gain: AutoGainParams::default(),
        }
    }
}

impl SessionConfig {
    pub fn bar_secs(&self) -> f64 {
        bar_duration_secs(self.bpm, self.beats_per_bar)
    }

    /// Replace a tempo or meter that cannot produce a finite, positive bar length.
    pub fn sanitized(mut self) -> Self {
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            log::warn!("invalid bpm {}; using {}", self.bpm, DEFAULT_BPM);
            self.bpm = DEFAULT_BPM;
        }
        if self.beats_per_bar == 0 {
            log::warn!("zero beats per bar; using {}", BEATS_PER_BAR);
            self.beats_per_bar = BEATS_PER_BAR;
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
enum TimerEvent {
    NextBar,
    Subdivision {
        bar: usize,
        index: usize,
        count: usize,
        chord: &'static str,
        targets: FilterTargets,
    },
    GainTick,
}

pub struct Session<G: AudioGraph, T: TimerHost> {
    config: SessionConfig,
    resonance: Resonance,
    timers: T,
    graph: Option<G>,
    state: PlaybackState,
    bar_index: usize,
    armed: FnvHashMap<TimerId, TimerEvent>,
    next_timer: u64,
    bypass: bool,
}

impl<G: AudioGraph, T: TimerHost> Session<G, T> {
    pub fn new(config: SessionConfig, resonance: Resonance, timers: T) -> Self {
        Self {
            config: config.sanitized(),
            resonance,
            timers,
            graph: None,
            state: PlaybackState::Idle,
            bar_index: 0,
            armed: FnvHashMap::default(),
            next_timer: 0,
            bypass: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Number of bars started so far in this run (monotonic, not wrapped).
    pub fn bar_index(&self) -> usize {
        self.bar_index
    }

    pub fn armed_timers(&self) -> usize {
        self.armed.len()
    }

    pub fn resonance(&self) -> &Resonance {
        &self.resonance
    }

    pub fn bypass(&self) -> bool {
        self.bypass
    }

    pub fn graph(&self) -> Option<&G> {
        self.graph.as_ref()
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    /// Take ownership of a fully wired graph and begin scheduling from bar 0.
    ///
    /// On failure the graph is released and the session is left `Idle`.
    pub fn start(&mut self, mut graph: G) -> Result<(), SessionError> {
        if self.is_playing() {
            graph.release();
            return Err(SessionError::AlreadyPlaying);
        }

        let q = self.resonance.get();
        graph.set_resonance(q);
        graph.set_bypass(self.bypass);
        graph.ramp_output_gain(
            self.config.auto_gain.base_gain(q),
            self.config.auto_gain.ramp_tau_sec,
        );

        self.armed.clear();
        self.bar_index = 0;
        self.graph = Some(graph);
        self.state = PlaybackState::Playing;
        log::info!(
            "playing {:?}: {} bars at {} bpm, bar = {:.3}s",
            self.config.progression.name(),
            self.config.progression.len(),
            self.config.bpm,
            self.config.bar_secs()
        );

        let armed = self.run_bar().and_then(|_| {
            if self.config.auto_gain.enabled {
                self.arm(self.config.auto_gain.interval, TimerEvent::GainTick)
            } else {
                Ok(())
            }
        });
        if let Err(e) = armed {
            self.teardown();
            self.state = PlaybackState::Idle;
            return Err(e.into());
        }
        Ok(())
    }

    /// Cancel every armed timer, then release the graph. No-op unless playing.
    pub fn stop(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.teardown();
        self.state = PlaybackState::Stopped;
        log::info!("stopped after {} bars", self.bar_index);
    }

    fn teardown(&mut self) {
        for (id, _) in self.armed.drain() {
            self.timers.cancel(id);
        }
        if let Some(mut graph) = self.graph.take() {
            graph.release();
        }
    }

    /// Store a new Q and push it to the filters right away. Returns the clamped value.
    pub fn set_resonance(&mut self, q: f32) -> f32 {
        let q = self.resonance.set(q);
        self.apply_resonance();
        q
    }

    /// Re-apply the shared Q, e.g. after another writer changed it.
    pub fn apply_resonance(&mut self) {
        let q = self.resonance.get();
        let params = &self.config.auto_gain;
        if let Some(graph) = self.graph.as_mut() {
            graph.set_resonance(q);
            if !params.enabled {
                graph.ramp_output_gain(params.base_gain(q), params.ramp_tau_sec);
            }
        }
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
        if let Some(graph) = self.graph.as_mut() {
            graph.set_bypass(bypass);
        }
    }

    /// Deliver a fired timer. Ids that are no longer armed are ignored.
    ///
    /// Returns true when the timer changed the playback state, i.e. the
    /// session stopped itself at the end of a one-shot run or on a timer failure.
    pub fn on_timer(&mut self, id: TimerId) -> bool {
        self.timers.acknowledge(id);
        let Some(event) = self.armed.remove(&id) else {
            log::debug!("ignoring stale timer {}", id.raw());
            return false;
        };
        if !self.is_playing() {
            return false;
        }

        let result = match event {
            TimerEvent::NextBar => self.run_bar(),
            TimerEvent::Subdivision {
                bar,
                index,
                count,
                chord,
                targets,
            } => {
                self.apply_targets(&targets);
                log::info!(
                    "Bar {} - Subdivision {}/{}: {} {:?}",
                    bar + 1,
                    index + 1,
                    count,
                    chord,
                    targets
                );
                Ok(())
            }
            TimerEvent::GainTick => self.correct_gain(),
        };
        if let Err(e) = result {
            log::error!("scheduling failed, stopping playback: {}", e);
            self.stop();
        }
        !self.is_playing()
    }

    fn run_bar(&mut self) -> Result<(), TimerError> {
        if self.config.mode == PlaybackMode::Once && self.bar_index >= self.config.progression.len()
        {
            log::info!("progression {:?} finished", self.config.progression.name());
            self.stop();
            return Ok(());
        }

        let bar = self.bar_index;
        let entry = *self.config.progression.bar_at(bar);
        let bar_secs = self.config.bar_secs();

        match expand_with(&entry, &self.config.chords, self.config.voicing) {
            Expansion::Whole(targets) => {
                self.apply_targets(&targets);
                log::info!("Bar {}: {} {:?}", bar + 1, entry.label(), targets);
            }
            Expansion::Subdivided(parts) => {
                let names: &'static [&'static str] = match entry {
                    BarEntry::Split(names) => names,
                    BarEntry::Chord(_) => &[],
                };
                let count = parts.len();
                let offsets = subdivision_offsets(bar_secs, count);
                for ((index, targets), offset) in parts.into_iter().enumerate().zip(offsets) {
                    let event = TimerEvent::Subdivision {
                        bar,
                        index,
                        count,
                        chord: names.get(index).copied().unwrap_or("?"),
                        targets,
                    };
                    self.arm(Duration::from_secs_f64(offset), event)?;
                }
            }
        }

        self.bar_index += 1;
        self.arm(Duration::from_secs_f64(bar_secs), TimerEvent::NextBar)
    }

    fn apply_targets(&mut self, targets: &FilterTargets) {
        let q = self.resonance.get();
        let tau = self.config.freq_ramp_tau_sec;
        if let Some(graph) = self.graph.as_mut() {
            graph.set_resonance(q);
            graph.retarget(targets, tau);
        }
    }

    fn correct_gain(&mut self) -> Result<(), TimerError> {
        let q = self.resonance.get();
        let params = &self.config.auto_gain;
        if let Some(graph) = self.graph.as_mut() {
            let level = graph.measure_rms();
            let gain = params.output_gain(q, level);
            log::trace!("auto-gain: rms={:.5} q={} gain={:.3}", level, q, gain);
            graph.ramp_output_gain(gain, params.ramp_tau_sec);
        }
        self.arm(self.config.auto_gain.interval, TimerEvent::GainTick)
    }

    fn arm(&mut self, delay: Duration, event: TimerEvent) -> Result<(), TimerError> {
        self.next_timer += 1;
        let id = TimerId::from_raw(self.next_timer);
        self.timers.arm(id, delay)?;
        self.armed.insert(id, event);
        Ok(())
    }
}

impl<G: AudioGraph> Session<G, VirtualTimers> {
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Start with the clock moved to `now` first, so the first bar lines up
    /// with audio that only became ready at that instant.
    pub fn start_at(&mut self, graph: G, now: Duration) -> Result<(), SessionError> {
        self.timers.set_now(now);
        self.start(graph)
    }

    /// Fire every timer due up to `until` in due-time order, then move the clock there.
    /// Returns true if any timer changed the playback state.
    pub fn advance_to(&mut self, until: Duration) -> bool {
        let mut changed = false;
        while let Some(id) = self.timers.pop_due(until) {
            changed |= self.on_timer(id);
        }
        self.timers.set_now(until);
        changed
    }

    pub fn advance_by(&mut self, dt: Duration) -> bool {
        let until = self.timers.now() + dt;
        self.advance_to(until)
    }
}

impl<G: AudioGraph, T: TimerHost> Drop for Session<G, T> {
    fn drop(&mut self) {
        self.stop();
    }
}
