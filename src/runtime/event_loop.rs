use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::{info, warn};

use crate::library::Track;
use crate::player::Player;

use super::input::ControlCmd;

const TICK: Duration = Duration::from_millis(50);

/// Control loop: apply commands as they arrive and tick the player between
/// them. Returns when `Quit` is received or every sender is gone.
pub fn run(player: &mut Player, control_rx: &Receiver<ControlCmd>) {
    loop {
        match control_rx.recv_timeout(TICK) {
            Ok(ControlCmd::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(cmd) => handle(player, cmd),
            Err(RecvTimeoutError::Timeout) => {}
        }
        player.tick();
    }
    info!("shutting down");
}

fn print_tracks<'a>(empty: &str, tracks: impl Iterator<Item = &'a Track>) {
    let mut any = false;
    for (i, t) in tracks.enumerate() {
        println!("{i:>4}  {}", t.display);
        any = true;
    }
    if !any {
        println!("{empty}");
    }
}

fn handle(player: &mut Player, cmd: ControlCmd) {
    match cmd {
        ControlCmd::PlayPause => player.toggle_play(),
        ControlCmd::Stop => player.stop(),
        ControlCmd::Next => {
            if !player.next() {
                println!("nothing to play next");
            }
        }
        ControlCmd::Prev => {
            if !player.previous() {
                println!("nothing to go back to");
            }
        }
        ControlCmd::Scrub(dir) => {
            let step = player.scrub_seconds() as i64;
            player.seek_by(step * i64::from(dir));
        }
        ControlCmd::SeekTo(secs) => player.seek_to(secs),
        ControlCmd::Volume(v) => player.set_volume(v),
        ControlCmd::Shuffle => {
            let on = player.toggle_shuffle();
            println!("shuffle {}", if on { "on" } else { "off" });
        }
        ControlCmd::Repeat => println!("repeat {}", player.cycle_repeat().label()),
        ControlCmd::Queue(i) => match player.queue_index(i) {
            Some(track) => println!("queued {}", track.display),
            None => println!("no track {i}"),
        },
        ControlCmd::ShowQueue => print_tracks("queue empty", player.sequencer().queue()),
        ControlCmd::ClearQueue => {
            player.clear_queue();
            println!("queue cleared");
        }
        ControlCmd::ShowHistory => {
            let history = player.sequencer().history();
            if history.is_empty() {
                println!("no history yet");
            } else {
                println!("{} recent", history.len());
                print_tracks("", history.iter());
            }
        }
        ControlCmd::Insert { track, at } => match player.insert_track(track, at) {
            Some(t) => println!("inserted {}", t.display),
            None => println!("no library track {track}"),
        },
        ControlCmd::Remove(i) => match player.remove_index(i) {
            Some(t) => println!("removed {}", t.display),
            None => println!("no track {i}"),
        },
        ControlCmd::Favorite => match player.toggle_favorite() {
            Ok(Some(on)) => println!("favourite {}", if on { "on" } else { "off" }),
            Ok(None) => println!("nothing loaded"),
            Err(e) => warn!(error = %e, "saving the library failed"),
        },
        ControlCmd::Rate(stars) => match player.rate_current(stars) {
            Ok(Some(r)) => println!("rated {r}/5"),
            Ok(None) => println!("nothing loaded"),
            Err(e) => warn!(error = %e, "saving the library failed"),
        },
        ControlCmd::Album(name) => match player.load_album(&name) {
            Some(n) => println!("album {name}: {n} tracks"),
            None => println!("no album {name}"),
        },
        ControlCmd::Artist(name) => match player.load_artist(&name) {
            Some(n) => println!("artist {name}: {n} tracks"),
            None => println!("no artist {name}"),
        },
        ControlCmd::PlayIndex(i) => {
            if !player.play_index(i) {
                println!("cannot play track {i}");
            }
        }
        ControlCmd::Status => println!("{}", player.status()),
        ControlCmd::ListPlaylists => {
            for (i, p) in player.playlists().playlists().iter().enumerate() {
                println!("{i}: {} ({} tracks)", p.name, p.tracks.len());
            }
        }
        ControlCmd::AddToPlaylist(name) => match player.add_current_to_playlist(&name) {
            Ok(true) => println!("added to {name}"),
            Ok(false) => println!("nothing added to {name}"),
            Err(e) => warn!(error = %e, "playlist update failed"),
        },
        ControlCmd::OpenPlaylist(i) => match player.open_saved_playlist(i) {
            Some(name) => println!("opened {name}"),
            None => println!("no playlist {i}"),
        },
        ControlCmd::RenamePlaylist(i, name) => match player.rename_playlist(i, &name) {
            Ok(true) => println!("renamed to {name}"),
            Ok(false) => println!("no playlist {i}"),
            Err(e) => warn!(error = %e, "playlist update failed"),
        },
        ControlCmd::DeletePlaylist(i) => match player.delete_playlist(i) {
            Ok(Some(name)) => println!("deleted {name}"),
            Ok(None) => println!("no playlist {i}"),
            Err(e) => warn!(error = %e, "playlist update failed"),
        },
        ControlCmd::RemoveFromPlaylist(i, entry) => match player.remove_from_playlist(i, entry) {
            Ok(Some(t)) => println!("removed {}", t.display),
            Ok(None) => println!("no playlist {i}"),
            Err(e) => warn!(error = %e, "playlist update failed"),
        },
        ControlCmd::Quit => {}
    }
}
