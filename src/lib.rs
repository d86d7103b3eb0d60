#![cfg(target_arch = "wasm32")]
mod audio;
mod constants;
mod dom;
mod player;
mod query;
mod timers;

use anyhow::anyhow;
use chordbank_core::{Resonance, DEFAULT_Q};
use constants::*;
use player::Player;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys as web;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("chordbank-web starting");

    if let Err(e) = init() {
        log::error!("init error: {:?}", e);
    }
    Ok(())
}

fn init() -> anyhow::Result<()> {
    let window = web::window().ok_or_else(|| anyhow!("no window"))?;
    let document = dom::window_document().ok_or_else(|| anyhow!("no document"))?;

    let search = window.location().search().unwrap_or_default();
    let config = query::config_from_query(&search);

    let initial_q = dom::input_value(&document, Q_SLIDER_ID)
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(DEFAULT_Q);
    let resonance = Resonance::new(initial_q);
    dom::set_text(&document, Q_VALUE_ID, &format!("{}", resonance.get().round()));

    log::info!(
        "progression {:?} ({} bars), {} bpm, mode {:?}, voicing {:?}, auto-gain {}",
        config.progression.name(),
        config.progression.len(),
        config.bpm,
        config.mode,
        config.voicing,
        if config.auto_gain.enabled { "on" } else { "off" }
    );

    let player = Player::new(window.clone(), document.clone(), config, resonance);

    {
        let player = player.clone();
        dom::add_click_listener(&document, PLAY_TOGGLE_ID, move || player.toggle());
    }
    {
        let player = player.clone();
        dom::add_click_listener(&document, BYPASS_TOGGLE_ID, move || player.toggle_bypass());
    }
    {
        let player = player.clone();
        dom::add_input_listener(&document, Q_SLIDER_ID, move |value| match value.parse::<f32>() {
            Ok(q) => player.set_resonance(q),
            Err(_) => log::warn!("ignoring non-numeric Q {:?}", value),
        });
    }

    // Tear the session down with the page so no timer outlives its audio nodes
    {
        let player = player.clone();
        let closure = Closure::wrap(Box::new(move || player.stop()) as Box<dyn FnMut()>);
        window
            .add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref())
            .ok();
        closure.forget();
    }

    Ok(())
}
