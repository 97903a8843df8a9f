use std::path::Path;
use std::sync::{Arc, Mutex};

use super::*;
use crate::audio::PlaybackState;
use crate::audio::tests::{DriverEvent, FakeBackend, Platform, fake_selector, touch_track};

struct Fixture {
    player: Player,
    rodio: FakeBackend,
    store: JsonStore,
    tracks: Vec<Track>,
    _dir: tempfile::TempDir,
}

fn settings() -> Settings {
    let mut s = Settings::default();
    s.audio.quit_fade_out_ms = 0;
    s
}

fn fixture(names: &[&str]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let tracks: Vec<Track> = names.iter().map(|n| touch_track(dir.path(), n)).collect();
    let store = JsonStore::open(dir.path().join("data")).unwrap();
    store.save_tracks(&tracks).unwrap();
    store.save_index(&LibraryIndex::build(&tracks)).unwrap();

    let (selector, rodio, _symphonia) = fake_selector(Platform::Linux, 100.0);
    let player = Player::new(
        selector,
        Sequencer::with_seed(3),
        tracks.clone(),
        store.clone(),
        &settings(),
    )
    .unwrap();

    Fixture {
        player,
        rodio,
        store,
        tracks,
        _dir: dir,
    }
}

/// Let the fake backend answer and feed the replies back through `tick`.
fn settle(f: &mut Fixture) {
    f.rodio.serve();
    f.player.tick();
}

fn loaded_path(player: &Player) -> Option<&Path> {
    player.selector.current_track().map(|t| t.path.as_path())
}

#[test]
fn play_index_loads_and_starts_the_track() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    assert!(f.player.play_index(1));
    settle(&mut f);

    assert_eq!(loaded_path(&f.player), Some(f.tracks[1].path.as_path()));
    assert!(f.player.selector.is_playing());
    assert_eq!(f.player.selector.duration(), 100.0);
    assert_eq!(f.player.sequencer().current_index(), Some(1));
}

#[test]
fn play_index_out_of_range_does_nothing() {
    let mut f = fixture(&["a.mp3"]);
    assert!(!f.player.play_index(5));
    assert!(f.player.selector.current_track().is_none());
}

#[test]
fn song_end_records_play_and_advances() {
    let mut f = fixture(&["a.mp3", "b.mp3", "c.mp3"]);
    f.player.play_index(0);
    settle(&mut f);

    f.rodio.emit(DriverEvent::EndOfMedia);
    f.player.tick();
    settle(&mut f);

    assert_eq!(loaded_path(&f.player), Some(f.tracks[1].path.as_path()));
    assert!(f.player.selector.is_playing());

    let first = &f.player.library[0];
    assert_eq!(first.play_count, 1);
    assert!(first.last_played.is_some());

    let saved = f.store.load_tracks().unwrap();
    assert_eq!(saved[0].id, f.tracks[0].id);
    assert_eq!(saved[0].play_count, 1);
    assert_eq!(saved[1].play_count, 0);
}

#[test]
fn end_of_playlist_stops() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    f.player.play_index(1);
    settle(&mut f);

    f.rodio.emit(DriverEvent::EndOfMedia);
    f.player.tick();
    settle(&mut f);

    assert!(!f.player.selector.is_playing());
    assert_eq!(f.player.sequencer().current_index(), Some(1));
    assert_eq!(f.player.library[1].play_count, 1);
}

#[test]
fn repeat_one_replays_the_finished_track() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    assert_eq!(f.player.cycle_repeat(), RepeatMode::All);
    assert_eq!(f.player.cycle_repeat(), RepeatMode::One);
    f.player.play_index(0);
    settle(&mut f);

    f.rodio.emit(DriverEvent::EndOfMedia);
    f.player.tick();
    settle(&mut f);

    assert_eq!(loaded_path(&f.player), Some(f.tracks[0].path.as_path()));
    assert!(f.player.selector.is_playing());
    assert_eq!(f.player.library[0].play_count, 1);
}

#[test]
fn queued_track_plays_next() {
    let mut f = fixture(&["a.mp3", "b.mp3", "c.mp3"]);
    f.player.play_index(0);
    settle(&mut f);

    let queued = f.player.queue_index(2).unwrap();
    assert_eq!(queued, f.tracks[2]);
    assert!(f.player.queue_index(9).is_none());

    assert!(f.player.next());
    settle(&mut f);
    assert_eq!(loaded_path(&f.player), Some(f.tracks[2].path.as_path()));
    assert_eq!(f.player.sequencer().queue_len(), 0);
}

#[test]
fn toggle_play_from_idle_starts_the_sequence() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    f.player.toggle_play();
    settle(&mut f);
    assert_eq!(loaded_path(&f.player), Some(f.tracks[0].path.as_path()));
    assert!(f.player.selector.is_playing());

    f.player.toggle_play();
    settle(&mut f);
    assert!(!f.player.selector.is_playing());

    f.player.toggle_play();
    settle(&mut f);
    assert!(f.player.selector.is_playing());
}

#[test]
fn seek_by_clamps_to_track_bounds() {
    let mut f = fixture(&["a.mp3"]);
    f.player.play_index(0);
    settle(&mut f);

    f.player.seek_by(-5);
    assert_eq!(f.player.selector.position(), 0.0);

    f.player.seek_by(30);
    settle(&mut f);
    assert_eq!(f.player.selector.position(), 30.0);

    f.player.seek_by(500);
    settle(&mut f);
    assert_eq!(f.player.selector.position(), 100.0);
}

#[test]
fn backend_error_keeps_the_sequence_in_place() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    f.player.play_index(0);
    settle(&mut f);

    f.rodio.emit(DriverEvent::Error("decode failed".into()));
    f.player.tick();

    assert!(!f.player.selector.is_playing());
    assert_eq!(loaded_path(&f.player), Some(f.tracks[0].path.as_path()));
    assert_eq!(f.player.sequencer().current_index(), Some(0));
    assert_eq!(f.player.library[0].play_count, 0);
}

#[test]
fn missing_file_is_reported_without_advancing() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    std::fs::remove_file(&f.tracks[1].path).unwrap();

    assert!(!f.player.play_index(1));
    f.player.tick();
    assert!(f.player.selector.current_track().is_none());
    assert_eq!(f.player.sequencer().current_index(), Some(1));
}

#[test]
fn resume_restores_track_volume_and_position() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    let session = Session {
        last_track_id: Some(f.tracks[1].id),
        last_position: 30.0,
        last_volume: 0.4,
    };

    assert!(f.player.resume(&session));
    assert_eq!(f.player.selector.volume(), 0.4);
    assert_eq!(f.player.sequencer().current_index(), Some(1));
    assert!(!f.player.selector.is_playing());

    settle(&mut f);
    assert_eq!(f.player.selector.position(), 30.0);
    assert_eq!(loaded_path(&f.player), Some(f.tracks[1].path.as_path()));
}

#[test]
fn resume_with_unknown_track_only_restores_volume() {
    let mut f = fixture(&["a.mp3"]);
    let session = Session {
        last_track_id: Some(uuid::Uuid::new_v4()),
        last_position: 12.0,
        last_volume: 0.25,
    };

    assert!(!f.player.resume(&session));
    assert_eq!(f.player.selector.volume(), 0.25);
    assert!(f.player.selector.current_track().is_none());
}

#[test]
fn failed_resume_leaves_the_sequence_alone() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    std::fs::remove_file(&f.tracks[1].path).unwrap();
    let session = Session {
        last_track_id: Some(f.tracks[1].id),
        last_position: 30.0,
        last_volume: 0.5,
    };

    assert!(!f.player.resume(&session));
    assert_eq!(f.player.sequencer().current_index(), None);
    assert!(f.player.sequencer().history().is_empty());
    assert!(f.player.selector.current_track().is_none());

    settle(&mut f);
    assert_eq!(f.player.selector.position(), 0.0);
}

#[test]
fn quit_saves_the_session() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    f.player.play_index(1);
    settle(&mut f);
    f.player.seek_to(12.0);
    settle(&mut f);

    f.player.quit();

    let session = f.store.load_session().unwrap();
    assert_eq!(session.last_track_id, Some(f.tracks[1].id));
    assert_eq!(session.last_position, 12.0);
    assert_eq!(session.last_volume, 0.8);
    assert!(f.player.selector.current_track().is_none());
}

#[test]
fn current_track_is_added_to_a_named_playlist() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    assert!(!f.player.add_current_to_playlist("mix").unwrap());

    f.player.play_index(1);
    assert!(f.player.add_current_to_playlist("mix").unwrap());
    assert!(!f.player.add_current_to_playlist("mix").unwrap());
    assert_eq!(f.player.playlists().playlists().len(), 1);

    let saved = f.store.load_playlists().unwrap();
    assert_eq!(saved[0].name, "mix");
    assert_eq!(saved[0].tracks, vec![f.tracks[1].clone()]);

    assert_eq!(f.player.open_saved_playlist(0).as_deref(), Some("mix"));
    assert_eq!(f.player.sequencer().tracks(), &[f.tracks[1].clone()][..]);
    assert!(f.player.open_saved_playlist(3).is_none());
}

#[test]
fn status_describes_the_loaded_track() {
    let mut f = fixture(&["a.mp3"]);
    assert!(f.player.status().contains("nothing loaded"));

    f.player.play_index(0);
    settle(&mut f);
    let status = f.player.status();
    assert!(status.contains("a.mp3"));
    assert!(status.contains("[rodio]"));
    assert!(status.contains("#1/1"));
    assert!(status.contains("repeat off"));
}

#[test]
fn spectrum_bands_are_kept() {
    let mut f = fixture(&["a.mp3"]);
    assert!(f.player.spectrum().is_empty());
    f.player.play_index(0);
    settle(&mut f);

    f.rodio.emit(DriverEvent::Spectrum(vec![0.5, 0.25]));
    f.player.tick();
    assert_eq!(f.player.spectrum(), vec![0.5, 0.25]);
}

#[test]
fn status_draws_the_spectrum() {
    let mut f = fixture(&["a.mp3"]);
    f.player.play_index(0);
    settle(&mut f);
    f.rodio.emit(DriverEvent::Spectrum(vec![0.0, 1.0, 2.0]));
    f.player.tick();
    assert!(f.player.status().ends_with(" ▁██"));
}

#[test]
fn listeners_stop_hearing_after_unsubscribe() {
    let mut f = fixture(&["a.mp3"]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let id = f.player.subscribe(Box::new(move |state: &PlaybackState| {
        sink.lock().unwrap().push(state.playing);
    }));

    f.player.play_index(0);
    settle(&mut f);
    assert!(seen.lock().unwrap().contains(&true));

    assert!(f.player.unsubscribe(id));
    assert!(!f.player.unsubscribe(id));
    let heard = seen.lock().unwrap().len();
    f.player.toggle_play();
    settle(&mut f);
    assert_eq!(seen.lock().unwrap().len(), heard);
}

#[test]
fn insert_and_remove_edit_the_play_order() {
    let mut f = fixture(&["a.mp3", "b.mp3", "c.mp3"]);
    f.player.play_index(1);

    let inserted = f.player.insert_track(2, 0).unwrap();
    assert_eq!(inserted, f.tracks[2]);
    assert_eq!(f.player.sequencer().len(), 4);
    assert_eq!(f.player.sequencer().current_index(), Some(2));
    assert!(f.player.insert_track(9, 0).is_none());

    assert_eq!(f.player.remove_index(0), Some(f.tracks[2].clone()));
    assert_eq!(f.player.sequencer().current_index(), Some(1));
    assert!(f.player.remove_index(7).is_none());
}

#[test]
fn clear_queue_empties_only_the_queue() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    f.player.play_index(0);
    f.player.queue_index(1);
    f.player.clear_queue();
    assert_eq!(f.player.sequencer().queue().count(), 0);
    assert_eq!(f.player.sequencer().current_index(), Some(0));
}

#[test]
fn favourite_and_rating_are_saved() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    assert!(f.player.toggle_favorite().unwrap().is_none());

    f.player.play_index(1);
    assert_eq!(f.player.toggle_favorite().unwrap(), Some(true));
    assert_eq!(f.player.rate_current(9).unwrap(), Some(5));

    let saved = f.store.load_tracks().unwrap();
    assert!(saved[1].favorite);
    assert_eq!(saved[1].rating, 5);
    assert!(!saved[0].favorite);
}

#[test]
fn album_and_artist_replace_the_play_order() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    f.player.play_index(0);

    assert_eq!(f.player.load_album("Unknown Album"), Some(2));
    assert_eq!(f.player.sequencer().current_index(), None);
    assert_eq!(f.player.load_artist("Unknown Artist"), Some(2));
    assert!(f.player.load_album("Nope").is_none());
    assert!(f.player.load_artist("Nobody").is_none());
}

#[test]
fn saved_playlists_can_be_renamed_trimmed_and_deleted() {
    let mut f = fixture(&["a.mp3", "b.mp3"]);
    f.player.play_index(0);
    f.player.add_current_to_playlist("mix").unwrap();
    f.player.play_index(1);
    f.player.add_current_to_playlist("mix").unwrap();

    assert!(f.player.rename_playlist(0, "evening").unwrap());
    assert!(!f.player.rename_playlist(4, "nope").unwrap());

    let removed = f.player.remove_from_playlist(0, 0).unwrap();
    assert_eq!(removed, Some(f.tracks[0].clone()));
    assert!(f.player.remove_from_playlist(0, 5).is_err());
    assert!(f.player.remove_from_playlist(3, 0).unwrap().is_none());

    let saved = f.store.load_playlists().unwrap();
    assert_eq!(saved[0].name, "evening");
    assert_eq!(saved[0].tracks, vec![f.tracks[1].clone()]);

    assert_eq!(f.player.delete_playlist(0).unwrap().as_deref(), Some("evening"));
    assert!(f.player.delete_playlist(0).unwrap().is_none());
    assert!(f.store.load_playlists().unwrap().is_empty());
}
