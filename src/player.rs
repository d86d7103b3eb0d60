use crate::audio::{self, WebAudioGraph};
use crate::constants::*;
use crate::dom;
use crate::timers::BrowserTimers;
use anyhow::anyhow;
use chordbank_core::{PlaybackMode, PlaybackState, Resonance, Session, SessionConfig};
use instant::Instant;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys as web;

pub type WebSession = Session<WebAudioGraph, BrowserTimers>;

/// Page-lifetime handle to the scheduler session and its controls.
#[derive(Clone)]
pub struct Player {
    session: Rc<RefCell<WebSession>>,
    starting: Rc<Cell<bool>>,
    document: web::Document,
}

impl Player {
    pub fn new(window: web::Window, document: web::Document, config: SessionConfig, resonance: Resonance) -> Self {
        let starting = Rc::new(Cell::new(false));
        let session = Rc::new_cyclic(|weak: &Weak<RefCell<WebSession>>| {
            let weak = weak.clone();
            let starting = starting.clone();
            let document = document.clone();
            let timers = BrowserTimers::new(window, move |id| {
                let Some(session) = weak.upgrade() else {
                    return;
                };
                let changed = match session.try_borrow_mut() {
                    Ok(mut s) => s.on_timer(id),
                    Err(_) => {
                        log::warn!("session busy; dropping timer {}", id.raw());
                        false
                    }
                };
                // A one-shot run ending or a timer failure stops the session on its own
                if changed {
                    sync_controls(&session.borrow(), starting.get(), &document);
                }
            });
            RefCell::new(Session::new(config, resonance, timers))
        });
        Self {
            session,
            starting,
            document,
        }
    }

    /// Play/stop toggle. Starting is asynchronous (sample fetch + decode).
    pub fn toggle(&self) {
        if self.session.borrow().is_playing() {
            self.stop();
            return;
        }
        if self.starting.replace(true) {
            log::warn!("[play] already starting; ignoring extra click");
            return;
        }
        self.sync_controls();

        let player = self.clone();
        spawn_local(async move {
            let looping = player.session.borrow().config().mode == PlaybackMode::Loop;
            match acquire_graph(looping).await {
                Ok(graph) => {
                    if let Err(e) = player.session.borrow_mut().start(graph) {
                        log::error!("[play] start failed: {}", e);
                    }
                }
                Err(e) => log::error!("[play] audio acquisition failed: {:?}", e),
            }
            player.starting.set(false);
            player.sync_controls();
        });
    }

    pub fn stop(&self) {
        self.session.borrow_mut().stop();
        self.sync_controls();
    }

    pub fn set_resonance(&self, q: f32) {
        let q = self.session.borrow_mut().set_resonance(q);
        dom::set_text(&self.document, Q_VALUE_ID, &format!("{}", q.round()));
    }

    pub fn toggle_bypass(&self) {
        let mut session = self.session.borrow_mut();
        let bypass = !session.bypass();
        session.set_bypass(bypass);
        drop(session);
        log::info!("filter bank {}", if bypass { "bypassed" } else { "active" });
        self.sync_controls();
    }

    fn sync_controls(&self) {
        sync_controls(&self.session.borrow(), self.starting.get(), &self.document);
    }
}

/// Reflect the session state in the play button, bypass button and status line.
fn sync_controls(session: &WebSession, starting: bool, document: &web::Document) {
    let play_label = if session.is_playing() { "Stop" } else { "Play" };
    let status = if starting {
        "loading sample…".to_string()
    } else {
        match session.state() {
            PlaybackState::Playing => format!(
                "playing {} at {} bpm ({:.2}s per bar)",
                session.config().progression.name(),
                session.config().bpm,
                session.config().bar_secs()
            ),
            PlaybackState::Idle => "idle".to_string(),
            PlaybackState::Stopped => "stopped".to_string(),
        }
    };
    let bypass_label = if session.bypass() { "Filters: off" } else { "Filters: on" };
    dom::set_text(document, PLAY_TOGGLE_ID, play_label);
    dom::set_text(document, STATUS_ID, &status);
    dom::set_text(document, BYPASS_TOGGLE_ID, bypass_label);
}

/// Open an output context, decode the sample and wire the filter bank.
async fn acquire_graph(looping: bool) -> anyhow::Result<WebAudioGraph> {
    let t0 = Instant::now();
    let ctx = web::AudioContext::new().map_err(|e| anyhow!("AudioContext error: {:?}", e))?;
    if ctx.state() == web::AudioContextState::Suspended {
        if let Ok(resumed) = ctx.resume() {
            let _ = JsFuture::from(resumed).await;
        }
    }
    let wired = match audio::load_sample(&ctx, SAMPLE_URL).await {
        Ok(buffer) => {
            log::info!(
                "[play] sample decoded in {:?}: {:.1}s, {} ch",
                t0.elapsed(),
                buffer.duration(),
                buffer.number_of_channels()
            );
            WebAudioGraph::build(ctx.clone(), &buffer, looping)
        }
        Err(e) => Err(e),
    };
    if wired.is_err() {
        let _ = ctx.close();
    }
    wired
}
