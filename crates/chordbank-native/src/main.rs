mod constants;
mod dsp;
mod graph;
mod sample;

use anyhow::Context;
use chordbank_core::{PlaybackMode, Progression, Resonance, Session, SessionConfig, VirtualTimers};
use constants::*;
use graph::NativeGraph;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type NativeSession = Session<NativeGraph, VirtualTimers>;

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Play,
    Stop,
    Resonance(f32),
    Bypass,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let cmd = match words.next()? {
        "play" | "p" => Command::Play,
        "stop" | "s" => Command::Stop,
        "bypass" | "b" => Command::Bypass,
        "quit" | "exit" => Command::Quit,
        "q" => match words.next().map(str::parse::<f32>) {
            Some(Ok(q)) => Command::Resonance(q),
            _ => {
                log::warn!("usage: q <1..700>");
                return None;
            }
        },
        other => {
            log::warn!("unknown command {:?}", other);
            return None;
        }
    };
    Some(cmd)
}

fn acquire_graph(path: &Path, looping: bool) -> anyhow::Result<NativeGraph> {
    let started = Instant::now();
    let sample = sample::load_wav(path)?;
    log::info!(
        "decoded {} ({:.2}s, {} channels) in {:?}",
        path.display(),
        sample.duration_secs(),
        sample.channels.len(),
        started.elapsed()
    );
    NativeGraph::open(Arc::new(sample), looping)
}

/// Apply one command. Returns false once the loop should end.
fn handle(session: &mut NativeSession, cmd: Command, sample_path: &Path, origin: Instant) -> bool {
    match cmd {
        Command::Play => {
            if session.is_playing() {
                log::info!("already playing");
                return true;
            }
            let looping = session.config().mode == PlaybackMode::Loop;
            match acquire_graph(sample_path, looping) {
                Ok(graph) => {
                    // Loading took a while; the first bar starts now, with the audio
                    if let Err(e) = session.start_at(graph, origin.elapsed()) {
                        log::error!("start failed: {}", e);
                    }
                }
                Err(e) => log::error!("audio unavailable: {:#}", e),
            }
        }
        Command::Stop => session.stop(),
        Command::Resonance(q) => {
            let applied = session.set_resonance(q);
            log::info!("Q = {}", applied);
        }
        Command::Bypass => {
            let bypass = !session.bypass();
            session.set_bypass(bypass);
            log::info!("filters {}", if bypass { "bypassed" } else { "engaged" });
        }
        Command::Quit => return false,
    }
    true
}

fn spawn_stdin_reader(tx: mpsc::Sender<Command>) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if let Some(cmd) = parse_command(&line) {
                    let quit = cmd == Command::Quit;
                    if tx.send(cmd).is_err() || quit {
                        break;
                    }
                }
            }
        })
        .context("spawning stdin reader")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let sample_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SAMPLE_PATH));
    let mut config = SessionConfig::default();
    if let Some(name) = args.next() {
        match Progression::builtin(&name) {
            Some(p) => config.progression = p,
            None => log::warn!(
                "unknown progression {:?}; known: {:?}",
                name,
                Progression::BUILTIN_NAMES
            ),
        }
    }

    let mut session: NativeSession = Session::new(config, Resonance::default(), VirtualTimers::new());
    let (tx, rx) = mpsc::channel();
    spawn_stdin_reader(tx)?;

    println!("commands: play | stop | q <1..700> | bypass | quit");
    let origin = Instant::now();
    let tick = Duration::from_millis(CONTROL_TICK_MS);
    loop {
        match rx.recv_timeout(tick) {
            Ok(cmd) => {
                // Bring the schedule up to date before acting on the command
                session.advance_to(origin.elapsed());
                if !handle(&mut session, cmd, &sample_path, origin) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            // stdin closed: keep playing until the session ends on its own
            Err(RecvTimeoutError::Disconnected) if session.is_playing() => thread::sleep(tick),
            Err(RecvTimeoutError::Disconnected) => break,
        }
        session.advance_to(origin.elapsed());
    }

    session.stop();
    Ok(())
}
