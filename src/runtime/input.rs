//! Line-oriented control commands read from stdin.

use std::io::BufRead;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCmd {
    PlayPause,
    Stop,
    Next,
    Prev,
    /// Scrub forward (positive) or back by the configured step.
    Scrub(i8),
    Volume(f32),
    Shuffle,
    Repeat,
    /// Jump to an absolute position in seconds.
    SeekTo(f64),
    Queue(usize),
    ShowQueue,
    ClearQueue,
    ShowHistory,
    PlayIndex(usize),
    /// Put library track `track` into the play order at `at`.
    Insert { track: usize, at: usize },
    Remove(usize),
    Favorite,
    Rate(u8),
    Album(String),
    Artist(String),
    Status,
    ListPlaylists,
    AddToPlaylist(String),
    OpenPlaylist(usize),
    RenamePlaylist(usize, String),
    DeletePlaylist(usize),
    /// Remove entry `.1` from saved playlist `.0`.
    RemoveFromPlaylist(usize, usize),
    Quit,
}

pub const HELP: &str = "commands: p play/pause, s stop, n next, b previous, + / - scrub, \
j <secs> seek, v <0..1> volume, z shuffle, r repeat, i status, x quit
  order: g <n> play, t <lib> <at> insert, d <n> remove, al <album>, ar <artist>
  queue: q <n> queue, u show queue, c clear queue, h history
  track: f favourite, k <0..5> rate
  playlists: l list, a <name> add current, o <n> open, R <n> <name> rename, \
D <n> delete, E <n> <i> remove entry";

/// Parse one input line. Blank or unknown lines yield `None`.
pub fn parse_command(line: &str) -> Option<ControlCmd> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (line, ""),
    };

    let cmd = match (head, rest) {
        ("p", "") => ControlCmd::PlayPause,
        ("s", "") => ControlCmd::Stop,
        ("n", "") => ControlCmd::Next,
        ("b", "") => ControlCmd::Prev,
        ("+", "") => ControlCmd::Scrub(1),
        ("-", "") => ControlCmd::Scrub(-1),
        ("z", "") => ControlCmd::Shuffle,
        ("r", "") => ControlCmd::Repeat,
        ("i", "") => ControlCmd::Status,
        ("l", "") => ControlCmd::ListPlaylists,
        ("u", "") => ControlCmd::ShowQueue,
        ("c", "") => ControlCmd::ClearQueue,
        ("h", "") => ControlCmd::ShowHistory,
        ("f", "") => ControlCmd::Favorite,
        ("x", "") => ControlCmd::Quit,
        ("v", v) => ControlCmd::Volume(v.parse().ok()?),
        ("j", secs) => ControlCmd::SeekTo(secs.parse().ok()?),
        ("q", n) => ControlCmd::Queue(n.parse().ok()?),
        ("g", n) => ControlCmd::PlayIndex(n.parse().ok()?),
        ("d", n) => ControlCmd::Remove(n.parse().ok()?),
        ("t", args) => {
            let (track, at) = two_indices(args)?;
            ControlCmd::Insert { track, at }
        }
        ("k", n) => ControlCmd::Rate(n.parse::<u8>().ok().filter(|r| *r <= 5)?),
        ("al", name) if !name.is_empty() => ControlCmd::Album(name.to_string()),
        ("ar", name) if !name.is_empty() => ControlCmd::Artist(name.to_string()),
        ("o", n) => ControlCmd::OpenPlaylist(n.parse().ok()?),
        ("a", name) if !name.is_empty() => ControlCmd::AddToPlaylist(name.to_string()),
        ("R", args) => {
            let (n, name) = args.split_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            ControlCmd::RenamePlaylist(n.parse().ok()?, name.to_string())
        }
        ("D", n) => ControlCmd::DeletePlaylist(n.parse().ok()?),
        ("E", args) => {
            let (n, i) = two_indices(args)?;
            ControlCmd::RemoveFromPlaylist(n, i)
        }
        _ => return None,
    };
    Some(cmd)
}

fn two_indices(args: &str) -> Option<(usize, usize)> {
    let mut parts = args.split_whitespace();
    let first = parts.next()?.parse().ok()?;
    let second = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some((first, second))
}

/// Forward parsed stdin lines to `tx`. End of input sends `Quit`.
pub fn spawn_reader(tx: Sender<ControlCmd>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("cadence-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                match parse_command(&line) {
                    Some(cmd) => {
                        if tx.send(cmd).is_err() {
                            return;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => {
                        debug!(line = %line, "unknown command");
                        println!("{HELP}");
                    }
                }
            }
            let _ = tx.send(ControlCmd::Quit);
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_letter_commands() {
        assert_eq!(parse_command("p"), Some(ControlCmd::PlayPause));
        assert_eq!(parse_command(" n "), Some(ControlCmd::Next));
        assert_eq!(parse_command("b"), Some(ControlCmd::Prev));
        assert_eq!(parse_command("+"), Some(ControlCmd::Scrub(1)));
        assert_eq!(parse_command("-"), Some(ControlCmd::Scrub(-1)));
        assert_eq!(parse_command("x"), Some(ControlCmd::Quit));
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(parse_command("v 0.5"), Some(ControlCmd::Volume(0.5)));
        assert_eq!(parse_command("q 3"), Some(ControlCmd::Queue(3)));
        assert_eq!(parse_command("g  12"), Some(ControlCmd::PlayIndex(12)));
        assert_eq!(parse_command("o 0"), Some(ControlCmd::OpenPlaylist(0)));
        assert_eq!(
            parse_command("a road trip"),
            Some(ControlCmd::AddToPlaylist("road trip".to_string()))
        );
        assert_eq!(parse_command("j 42.5"), Some(ControlCmd::SeekTo(42.5)));
        assert_eq!(parse_command("k 4"), Some(ControlCmd::Rate(4)));
        assert_eq!(parse_command("d 2"), Some(ControlCmd::Remove(2)));
        assert_eq!(
            parse_command("t 7 0"),
            Some(ControlCmd::Insert { track: 7, at: 0 })
        );
    }

    #[test]
    fn queue_history_and_library_views() {
        assert_eq!(parse_command("u"), Some(ControlCmd::ShowQueue));
        assert_eq!(parse_command("c"), Some(ControlCmd::ClearQueue));
        assert_eq!(parse_command("h"), Some(ControlCmd::ShowHistory));
        assert_eq!(parse_command("f"), Some(ControlCmd::Favorite));
        assert_eq!(
            parse_command("al Kind of Blue"),
            Some(ControlCmd::Album("Kind of Blue".to_string()))
        );
        assert_eq!(
            parse_command("ar Miles Davis"),
            Some(ControlCmd::Artist("Miles Davis".to_string()))
        );
    }

    #[test]
    fn playlist_editing_commands() {
        assert_eq!(
            parse_command("R 1 late night"),
            Some(ControlCmd::RenamePlaylist(1, "late night".to_string()))
        );
        assert_eq!(parse_command("D 0"), Some(ControlCmd::DeletePlaylist(0)));
        assert_eq!(
            parse_command("E 2 5"),
            Some(ControlCmd::RemoveFromPlaylist(2, 5))
        );
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("v loud"), None);
        assert_eq!(parse_command("q"), None);
        assert_eq!(parse_command("q -1"), None);
        assert_eq!(parse_command("a"), None);
        assert_eq!(parse_command("p now"), None);
        assert_eq!(parse_command("play"), None);
        assert_eq!(parse_command("k 6"), None);
        assert_eq!(parse_command("t 3"), None);
        assert_eq!(parse_command("t 1 2 3"), None);
        assert_eq!(parse_command("R 1"), None);
        assert_eq!(parse_command("E x 1"), None);
        assert_eq!(parse_command("al"), None);
    }
}
