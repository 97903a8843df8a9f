use std::env;
use std::path::PathBuf;
use std::sync::mpsc;

use tracing::{info, warn};

use crate::audio::{EngineSelector, PlaybackState, StateListener, WorkerTuning};
use crate::library::{LibraryIndex, carry_over, scan};
use crate::player::Player;
use crate::store::JsonStore;

mod event_loop;
mod input;
mod logging;
mod settings;
mod startup;

use input::ControlCmd;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (settings, config_problem) = settings::load_settings();
    logging::init(&settings.logging.filter);
    if let Some(msg) = config_problem {
        warn!("{msg}");
    }

    let mut dir_arg: Option<String> = None;
    for arg in env::args().skip(1) {
        if arg == "--print-config" {
            print!("{}", toml::to_string_pretty(&settings)?);
            return Ok(());
        }
        if dir_arg.is_none() {
            dir_arg = Some(arg);
        }
    }
    let dir = dir_arg
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let store = JsonStore::open(settings.data_dir())?;
    let known = store.load_tracks().unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable track list");
        Vec::new()
    });
    let tracks = carry_over(scan(&dir, &settings.library), &known);
    store.save_tracks(&tracks)?;
    store.save_index(&LibraryIndex::build(&tracks))?;
    info!(dir = %dir.display(), tracks = tracks.len(), "library ready");

    let selector = EngineSelector::new(WorkerTuning::from(&settings.audio));
    let sequencer = startup::sequencer_for(&settings);
    let mut player = Player::new(selector, sequencer, tracks, store.clone(), &settings)?;
    startup::resume_session(&mut player, &store, &settings);

    if player.sequencer().is_empty() {
        println!("no playable files under {}", dir.display());
    }
    for (i, track) in player.sequencer().tracks().iter().enumerate() {
        let secs = track.duration_secs() as u64;
        println!("{i:>4}  {:>2}:{:02}  {}", secs / 60, secs % 60, track.display);
    }
    println!("{}", input::HELP);

    let watcher = player.subscribe(now_playing_printer());
    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let _reader = input::spawn_reader(control_tx)?;

    event_loop::run(&mut player, &control_rx);
    player.unsubscribe(watcher);
    player.quit();
    Ok(())
}

/// Print a line whenever the loaded track or the play/pause state changes.
fn now_playing_printer() -> StateListener {
    let mut last: Option<(Option<uuid::Uuid>, bool)> = None;
    Box::new(move |state: &PlaybackState| {
        let key = (state.current_track.as_ref().map(|t| t.id), state.playing);
        if last == Some(key) {
            return;
        }
        last = Some(key);
        match &state.current_track {
            Some(t) if state.playing => println!("> {} [{}]", t.display, state.driver.name()),
            Some(t) => println!("|| {}", t.display),
            None => {}
        }
    })
}
