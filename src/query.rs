// Session configuration overrides read from the page query string,
// e.g. `?progression=marching_orig&mode=once&voicing=full&bpm=80&autogain=off`.

use chordbank_core::{PlaybackMode, Progression, SessionConfig, SubChordVoicing};

pub fn config_from_query(search: &str) -> SessionConfig {
    let mut config = SessionConfig::default();
    let pairs = search
        .trim_start_matches('?')
        .split('&')
        .filter(|p| !p.is_empty());
    for pair in pairs {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "progression" => match Progression::builtin(value) {
                Some(p) => config.progression = p,
                None => log::warn!(
                    "unknown progression {:?} (known: {:?}); keeping {:?}",
                    value,
                    Progression::BUILTIN_NAMES,
                    config.progression.name()
                ),
            },
            "mode" => match value {
                "loop" => config.mode = PlaybackMode::Loop,
                "once" => config.mode = PlaybackMode::Once,
                _ => log::warn!("unknown playback mode {:?}", value),
            },
            "voicing" => match value {
                "indexed" => config.voicing = SubChordVoicing::IndexedPitch,
                "full" => config.voicing = SubChordVoicing::FullChord,
                _ => log::warn!("unknown sub-chord voicing {:?}", value),
            },
            "bpm" => match value.parse::<f32>() {
                Ok(bpm) if bpm.is_finite() && bpm > 0.0 => config.bpm = bpm,
                _ => log::warn!("invalid bpm {:?}", value),
            },
            "autogain" => config.auto_gain.enabled = !matches!(value, "0" | "off" | "false"),
            _ => log::debug!("ignoring query key {:?}", key),
        }
    }
    config
}
