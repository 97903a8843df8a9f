//! Play order and saved playlists.

mod collection;
mod history;
mod sequencer;

pub use collection::{Playlist, PlaylistCollection};
pub use sequencer::{RepeatMode, Sequencer};
