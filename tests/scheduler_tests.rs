// Host-side tests for the bar scheduler, driven by a virtual clock and a
// recording stand-in for the audio graph.

use chordbank_core::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
enum Call {
    Retarget(FilterTargets),
    Resonance(f32),
    Bypass(bool),
    Measure,
    Gain(f32),
    Release,
}

#[derive(Clone, Default)]
struct Recorder {
    calls: Rc<RefCell<Vec<Call>>>,
    rms: Rc<Cell<f32>>,
}

impl Recorder {
    fn graph(&self) -> MockGraph {
        MockGraph {
            rec: self.clone(),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    fn retargets(&self) -> Vec<FilterTargets> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Retarget(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }
}

struct MockGraph {
    rec: Recorder,
}

impl MockGraph {
    fn push(&self, call: Call) {
        self.rec.calls.borrow_mut().push(call);
    }
}

impl AudioGraph for MockGraph {
    fn retarget(&mut self, targets: &FilterTargets, _tau: f64) {
        self.push(Call::Retarget(*targets));
    }
    fn set_resonance(&mut self, q: f32) {
        self.push(Call::Resonance(q));
    }
    fn set_bypass(&mut self, bypass: bool) {
        self.push(Call::Bypass(bypass));
    }
    fn measure_rms(&mut self) -> f32 {
        self.push(Call::Measure);
        self.rec.rms.get()
    }
    fn ramp_output_gain(&mut self, gain: f32, _tau: f64) {
        self.push(Call::Gain(gain));
    }
    fn release(&mut self) {
        self.push(Call::Release);
    }
}

fn session_with(config: SessionConfig) -> Session<MockGraph, VirtualTimers> {
    Session::new(config, Resonance::default(), VirtualTimers::new())
}

fn no_auto_gain() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.auto_gain.enabled = false;
    config
}

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn whole(chord: &str) -> FilterTargets {
    chord_targets(chord, &ChordTable::default())
}

#[test]
fn first_bar_applies_immediately_on_start() {
    let rec = Recorder::default();
    let mut session = session_with(no_auto_gain());
    assert_eq!(session.state(), PlaybackState::Idle);

    session.start(rec.graph()).unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(rec.retargets(), vec![whole("Cm")]);
    assert_eq!(session.bar_index(), 1);
    // only the next-bar timer is armed
    assert_eq!(session.armed_timers(), 1);
}

#[test]
fn start_pushes_resonance_bypass_and_base_gain() {
    let rec = Recorder::default();
    let mut session = session_with(SessionConfig::default());
    session.set_bypass(true);
    session.set_resonance(700.0);
    session.start(rec.graph()).unwrap();

    let calls = rec.calls();
    assert_eq!(calls[0], Call::Resonance(700.0));
    assert_eq!(calls[1], Call::Bypass(true));
    let Call::Gain(g) = calls[2] else {
        panic!("expected base gain, got {:?}", calls[2]);
    };
    assert!((g - (1.0 + BASE_GAIN_K)).abs() < 1e-4, "base gain {}", g);
}

#[test]
fn bars_advance_every_bar_duration() {
    let rec = Recorder::default();
    let mut session = session_with(no_auto_gain());
    let bar = session.config().bar_secs();
    session.start(rec.graph()).unwrap();

    session.advance_to(secs(bar - 0.01));
    assert_eq!(rec.retargets().len(), 1);
    session.advance_to(secs(bar + 0.001));
    assert_eq!(rec.retargets(), vec![whole("Cm"), whole("Cm")]);
    assert_eq!(session.bar_index(), 2);
}

#[test]
fn split_bar_fires_subdivisions_on_time() {
    let rec = Recorder::default();
    let mut session = session_with(no_auto_gain());
    let bar = session.config().bar_secs();
    session.start(rec.graph()).unwrap();

    // step the clock one millisecond at a time through bar 3 (index 2)
    let mut fired: Vec<(f64, FilterTargets)> = Vec::new();
    let mut seen = rec.retargets().len();
    let end_ms = (3.0 * bar * 1000.0) as u64 - 5;
    for ms in 1..=end_ms {
        session.advance_to(Duration::from_millis(ms));
        let targets = rec.retargets();
        for t in &targets[seen..] {
            fired.push((ms as f64 / 1000.0, *t));
        }
        seen = targets.len();
    }

    // bar 1 at t=0 is not in `fired`; bar 2 whole, then four sub-events
    assert_eq!(fired.len(), 5, "{:?}", fired);
    assert!((fired[0].0 - bar).abs() < 0.002);
    let expected = [
        (2.0 * bar, "C3"),
        (2.0 * bar + bar / 4.0, "Eb3"),
        (2.0 * bar + bar / 2.0, "G3"),
        (2.0 * bar + 3.0 * bar / 4.0, "B3"),
    ];
    for ((at, targets), (want_at, pitch)) in fired[1..].iter().zip(expected) {
        assert!((at - want_at).abs() < 0.002, "{} vs {}", at, want_at);
        assert_eq!(*targets, [resolve(pitch); 4]);
    }
}

#[test]
fn progression_loops_back_to_first_bar() {
    let rec = Recorder::default();
    let mut config = no_auto_gain();
    config.progression = Progression::builtin("marching_orig").unwrap();
    let mut session = session_with(config);
    let bar = session.config().bar_secs();
    session.start(rec.graph()).unwrap();

    session.advance_to(secs(32.0 * bar + 0.001));
    assert_eq!(session.bar_index(), 33);
    let retargets = rec.retargets();
    assert_eq!(retargets.len(), 33);
    assert_eq!(retargets[32], retargets[0]);
    assert_eq!(retargets[32], whole("Am"));
    assert!(session.is_playing());
}

#[test]
fn once_mode_stops_after_last_bar() {
    let rec = Recorder::default();
    let mut config = no_auto_gain();
    config.mode = PlaybackMode::Once;
    config.progression = Progression::builtin("marching_orig").unwrap();
    let mut session = session_with(config);
    let bar = session.config().bar_secs();
    session.start(rec.graph()).unwrap();

    session.advance_to(secs(31.5 * bar));
    assert!(session.is_playing());
    session.advance_to(secs(32.0 * bar + 0.001));
    assert_eq!(session.state(), PlaybackState::Stopped);
    assert_eq!(rec.retargets().len(), 32);
    assert_eq!(rec.count(|c| *c == Call::Release), 1);
    assert_eq!(session.armed_timers(), 0);
}

#[test]
fn stop_cancels_everything() {
    let rec = Recorder::default();
    let mut session = session_with(SessionConfig::default());
    let bar = session.config().bar_secs();
    session.start(rec.graph()).unwrap();

    // stop midway through the split bar, with sub-events still pending
    session.advance_to(secs(2.0 * bar + 0.1));
    assert!(session.armed_timers() > 1);
    session.stop();
    assert_eq!(session.state(), PlaybackState::Stopped);
    assert_eq!(session.armed_timers(), 0);
    assert_eq!(session.timers().pending(), 0);
    assert!(session.graph().is_none());

    let after_stop = rec.len();
    assert_eq!(rec.calls().last(), Some(&Call::Release));
    session.advance_to(secs(10.0 * bar));
    assert_eq!(rec.len(), after_stop, "no graph effects after stop");
}

#[test]
fn stop_is_idempotent() {
    let rec = Recorder::default();
    let mut session = session_with(no_auto_gain());
    session.stop();
    assert_eq!(session.state(), PlaybackState::Idle);

    session.start(rec.graph()).unwrap();
    session.stop();
    session.stop();
    assert_eq!(session.state(), PlaybackState::Stopped);
    assert_eq!(rec.count(|c| *c == Call::Release), 1);
}

#[test]
fn starting_twice_is_rejected() {
    let first = Recorder::default();
    let second = Recorder::default();
    let mut session = session_with(no_auto_gain());
    session.start(first.graph()).unwrap();

    assert_eq!(session.start(second.graph()), Err(SessionError::AlreadyPlaying));
    // the rejected graph is released untouched; the running one is kept
    assert_eq!(second.calls(), vec![Call::Release]);
    assert!(session.is_playing());
    assert_eq!(first.count(|c| *c == Call::Release), 0);
}

#[test]
fn restart_begins_at_bar_zero_and_ignores_stale_timers() {
    let rec = Recorder::default();
    let mut session = session_with(no_auto_gain());
    let bar = session.config().bar_secs();
    session.start(rec.graph()).unwrap();
    session.advance_to(secs(1.5 * bar));
    session.stop();

    let rec2 = Recorder::default();
    session.start(rec2.graph()).unwrap();
    assert_eq!(session.bar_index(), 1);
    assert_eq!(rec2.retargets(), vec![whole("Cm")]);
    assert_eq!(session.armed_timers(), session.timers().pending());

    // the first run's next-bar deadline passes without a second advance
    session.advance_to(secs(2.0 * bar));
    assert_eq!(session.bar_index(), 1);
    assert!(rec.retargets().len() == 2, "first graph untouched after stop");
}

#[test]
fn resonance_is_resampled_on_every_tick() {
    let rec = Recorder::default();
    let resonance = Resonance::default();
    let mut session: Session<MockGraph, VirtualTimers> =
        Session::new(no_auto_gain(), resonance.clone(), VirtualTimers::new());
    let bar = session.config().bar_secs();
    session.start(rec.graph()).unwrap();

    // written from elsewhere, picked up at the next bar
    resonance.set(250.0);
    session.advance_to(secs(bar + 0.001));
    let calls = rec.calls();
    let retarget_at = calls.iter().rposition(|c| matches!(c, Call::Retarget(_))).unwrap();
    assert_eq!(calls[retarget_at - 1], Call::Resonance(250.0));
}

#[test]
fn set_resonance_clamps_and_applies_at_once() {
    let rec = Recorder::default();
    let mut session = session_with(no_auto_gain());
    assert_eq!(session.set_resonance(5000.0), Q_MAX);
    session.start(rec.graph()).unwrap();

    assert_eq!(session.set_resonance(0.0), Q_MIN);
    let calls = rec.calls();
    let n = calls.len();
    assert_eq!(calls[n - 2], Call::Resonance(Q_MIN));
    // with auto-gain off the base gain follows Q
    assert_eq!(calls[n - 1], Call::Gain(1.0));
}

#[test]
fn gain_tick_measures_and_corrects() {
    let rec = Recorder::default();
    rec.rms.set(0.0);
    let mut session = session_with(SessionConfig::default());
    session.start(rec.graph()).unwrap();

    session.advance_to(Duration::from_millis(350));
    assert_eq!(rec.count(|c| *c == Call::Measure), 3);
    let base = AutoGainParams::default().base_gain(DEFAULT_Q);
    let last_gain = rec
        .calls()
        .into_iter()
        .rev()
        .find_map(|c| match c {
            Call::Gain(g) => Some(g),
            _ => None,
        })
        .unwrap();
    // silence pins makeup at its ceiling
    assert!((last_gain - base * MAKEUP_MAX).abs() < 1e-3, "gain {}", last_gain);

    rec.rms.set(1.0);
    session.advance_to(Duration::from_millis(450));
    assert_eq!(rec.calls().last(), Some(&Call::Gain(base)));
}

#[test]
fn bypass_is_remembered_across_sessions() {
    let rec = Recorder::default();
    let mut session = session_with(no_auto_gain());
    session.start(rec.graph()).unwrap();
    session.set_bypass(true);
    assert_eq!(rec.calls().last(), Some(&Call::Bypass(true)));
    session.stop();

    let rec2 = Recorder::default();
    session.start(rec2.graph()).unwrap();
    assert!(rec2.calls().contains(&Call::Bypass(true)));
}

struct FailingTimers {
    allowed: usize,
    inner: VirtualTimers,
}

impl TimerHost for FailingTimers {
    fn arm(&mut self, id: TimerId, delay: Duration) -> Result<(), TimerError> {
        if self.allowed == 0 {
            return Err(TimerError::Arm("host refused".into()));
        }
        self.allowed -= 1;
        self.inner.arm(id, delay)
    }

    fn cancel(&mut self, id: TimerId) {
        self.inner.cancel(id);
    }
}

#[test]
fn failure_to_arm_leaves_session_idle() {
    let rec = Recorder::default();
    let timers = FailingTimers {
        allowed: 0,
        inner: VirtualTimers::new(),
    };
    let mut session = Session::new(no_auto_gain(), Resonance::default(), timers);
    let err = session.start(rec.graph()).unwrap_err();
    assert!(matches!(err, SessionError::Timer(_)));
    assert_eq!(session.state(), PlaybackState::Idle);
    assert_eq!(rec.calls().last(), Some(&Call::Release));
    assert_eq!(session.armed_timers(), 0);
}

#[test]
fn dropping_a_playing_session_releases_the_graph() {
    let rec = Recorder::default();
    {
        let mut session = session_with(no_auto_gain());
        session.start(rec.graph()).unwrap();
    }
    assert_eq!(rec.calls().last(), Some(&Call::Release));
}

#[test]
fn late_start_aligns_first_bar_with_audio() {
    let rec = Recorder::default();
    let mut session = session_with(no_auto_gain());
    let bar = session.config().bar_secs();

    // the control loop was last pumped at 10 s; loading the audio took 3 s more
    session.advance_to(secs(10.0));
    session.start_at(rec.graph(), secs(13.0)).unwrap();
    assert_eq!(session.now(), secs(13.0));
    assert_eq!(rec.retargets().len(), 1);

    session.advance_to(secs(13.005));
    assert_eq!(rec.retargets().len(), 1, "second bar must wait a full bar");
    session.advance_to(secs(13.0 + bar - 0.01));
    assert_eq!(rec.retargets().len(), 1);
    session.advance_to(secs(13.0 + bar + 0.001));
    assert_eq!(rec.retargets().len(), 2);
}

#[test]
fn self_stop_is_reported_to_the_caller() {
    let rec = Recorder::default();
    let mut config = no_auto_gain();
    config.mode = PlaybackMode::Once;
    config.progression = Progression::builtin("marching_orig").unwrap();
    let mut session = session_with(config);
    let bar = session.config().bar_secs();
    session.start(rec.graph()).unwrap();

    assert!(!session.advance_to(secs(31.5 * bar)));
    assert!(session.advance_to(secs(32.0 * bar + 0.001)));
    assert_eq!(session.state(), PlaybackState::Stopped);
    assert!(!session.advance_to(secs(40.0 * bar)));
}

#[test]
fn arm_failure_mid_play_stops_and_reports() {
    let rec = Recorder::default();
    let timers = FailingTimers {
        allowed: 1,
        inner: VirtualTimers::new(),
    };
    let mut session = Session::new(no_auto_gain(), Resonance::default(), timers);
    let bar = session.config().bar_secs();
    session.start(rec.graph()).unwrap();

    let until = secs(bar + 0.001);
    let mut changed = Vec::new();
    while let Some(id) = session.timers_mut().inner.pop_due(until) {
        changed.push(session.on_timer(id));
    }
    assert_eq!(changed, vec![true]);
    assert_eq!(session.state(), PlaybackState::Stopped);
    assert_eq!(rec.calls().last(), Some(&Call::Release));
}

#[test]
fn unusable_tempo_falls_back_to_default() {
    for bpm in [0.0, -90.0, f32::NAN, f32::INFINITY] {
        let rec = Recorder::default();
        let mut config = no_auto_gain();
        config.bpm = bpm;
        config.beats_per_bar = 0;
        let mut session = session_with(config);
        assert_eq!(session.config().bpm, DEFAULT_BPM);
        assert_eq!(session.config().beats_per_bar, BEATS_PER_BAR);

        session.start(rec.graph()).unwrap();
        session.advance_to(secs(3.0));
        assert_eq!(rec.retargets().len(), 2);
    }
}
