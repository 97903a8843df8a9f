use tracing::warn;

use crate::config;
use crate::player::Player;
use crate::playlist::{RepeatMode, Sequencer};
use crate::store::JsonStore;

/// Sequencer configured with the playback defaults.
pub fn sequencer_for(settings: &config::Settings) -> Sequencer {
    let mut sequencer = Sequencer::new();
    sequencer.set_repeat(RepeatMode::from(settings.playback.repeat_mode));
    if settings.playback.shuffle {
        sequencer.set_shuffle(true);
    }
    sequencer
}

/// Pick the last session back up when enabled.
pub fn resume_session(player: &mut Player, store: &JsonStore, settings: &config::Settings) {
    if !settings.playback.resume_on_startup {
        return;
    }
    match store.load_session() {
        Ok(session) => {
            player.resume(&session);
        }
        Err(e) => warn!(error = %e, "cannot read session, starting fresh"),
    }
}
