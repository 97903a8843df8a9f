use super::*;
use crate::library::LibraryIndex;

fn sample_tracks() -> Vec<Track> {
    let mut a = Track::new("/music/a.mp3", "A");
    a.artist = Some("Band".into());
    a.album = Some("First".into());
    a.play_count = 3;
    let b = Track::new("/music/b.flac", "B");
    vec![a, b]
}

#[test]
fn missing_files_load_as_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(dir.path().join("nested/state")).unwrap();
    assert!(store.dir.is_dir());

    assert!(store.load_tracks().unwrap().is_empty());
    assert_eq!(store.load_index().unwrap(), LibraryIndex::default());
    assert!(store.load_playlists().unwrap().is_empty());
    assert_eq!(store.load_session().unwrap(), Session::default());
}

#[test]
fn tracks_keep_identity_and_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    let tracks = sample_tracks();
    store.save_tracks(&tracks).unwrap();

    let back = store.load_tracks().unwrap();
    assert_eq!(back, tracks);
    assert_eq!(back[0].id, tracks[0].id);
    assert_eq!(back[0].play_count, 3);
}

#[test]
fn index_and_session_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    let tracks = sample_tracks();
    let index = LibraryIndex::build(&tracks);
    store.save_index(&index).unwrap();
    assert_eq!(store.load_index().unwrap(), index);

    let session = Session {
        last_track_id: Some(tracks[1].id),
        last_position: 42.5,
        last_volume: 0.6,
    };
    store.save_session(&session).unwrap();
    assert_eq!(store.load_session().unwrap(), session);
}

#[test]
fn saving_leaves_no_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    store.save_tracks(&sample_tracks()).unwrap();
    store.save_tracks(&[]).unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec![TRACKS_FILE.to_string()]);
    assert!(store.load_tracks().unwrap().is_empty());
}

#[test]
fn corrupt_json_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    std::fs::write(dir.path().join(SESSION_FILE), "{ not json").unwrap();

    assert!(matches!(
        store.load_session(),
        Err(StoreError::Json { .. })
    ));
}
