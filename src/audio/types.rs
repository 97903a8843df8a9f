//! Audio-related small types and handles.
//!
//! This module defines the driver discriminant, the worker protocol, the
//! observable playback snapshot and the callback slot types.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::library::Track;

/// Which backend a driver wraps.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum DriverKind {
    /// rodio decoder + sink. The default for unrecognized formats.
    #[default]
    Rodio,
    /// symphonia demux/decode feeding a cpal stream.
    Symphonia,
}

impl DriverKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rodio => "rodio",
            Self::Symphonia => "symphonia",
        }
    }
}

/// Notifications a backend reports about its current media.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// Media opened; total duration in seconds is known.
    Ready { duration: f64 },
    Playing,
    Paused,
    Stopped,
    /// Playback position in seconds.
    Position(f64),
    EndOfMedia,
    /// Band magnitudes in dB, one value per band.
    Spectrum(Vec<f32>),
    Error(String),
}

/// Commands sent from a `Driver` to its worker thread.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WorkerCmd {
    Load {
        generation: u64,
        path: PathBuf,
        /// Duration from the library scan, used if the decoder cannot tell.
        duration_hint: Option<Duration>,
    },
    Play,
    Pause,
    Stop,
    Seek(Duration),
    SetVolume(f32),
    Shutdown,
}

/// An event tagged with the load generation it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WorkerMsg {
    pub generation: u64,
    pub event: DriverEvent,
}

/// Control-thread ends of a worker's channels.
pub(crate) struct WorkerLink {
    pub tx: Sender<WorkerCmd>,
    pub rx: Receiver<WorkerMsg>,
    pub join: Option<JoinHandle<()>>,
}

/// Tuning shared by both worker implementations.
#[derive(Debug, Clone, Copy)]
pub struct WorkerTuning {
    pub position_interval: Duration,
    pub spectrum_bands: usize,
    pub spectrum_interval: Duration,
}

impl Default for WorkerTuning {
    fn default() -> Self {
        Self {
            position_interval: Duration::from_millis(200),
            spectrum_bands: 32,
            spectrum_interval: Duration::from_millis(100),
        }
    }
}

impl From<&crate::config::AudioSettings> for WorkerTuning {
    fn from(s: &crate::config::AudioSettings) -> Self {
        Self {
            position_interval: Duration::from_millis(s.position_interval_ms.max(1)),
            spectrum_bands: s.spectrum_bands.max(1),
            spectrum_interval: Duration::from_millis(s.spectrum_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Observable playback information, mirrored from the active driver.
pub struct PlaybackState {
    /// Track loaded in the active driver (if any).
    pub current_track: Option<Track>,
    /// Whether playback is currently active.
    pub playing: bool,
    /// Position in seconds.
    pub position: f64,
    /// Total duration in seconds, `0.0` until the driver reports it.
    pub duration: f64,
    /// Output volume, always within `0.0..=1.0`.
    pub volume: f32,
    /// Driver the state above is attributed to.
    pub driver: DriverKind,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_track: None,
            playing: false,
            position: 0.0,
            duration: 0.0,
            volume: 1.0,
            driver: DriverKind::default(),
        }
    }
}

pub type SongEndedCallback = Box<dyn FnMut() + Send>;
pub type ErrorCallback = Box<dyn FnMut(&str) + Send>;
pub type SpectrumCallback = Box<dyn FnMut(&[f32]) + Send>;
pub type StateListener = Box<dyn FnMut(&PlaybackState) + Send>;

/// Single-slot callbacks carried by whichever driver is active.
///
/// Registering a callback replaces the previous one.
#[derive(Default)]
pub struct DriverCallbacks {
    pub song_ended: Option<SongEndedCallback>,
    pub error: Option<ErrorCallback>,
    pub spectrum: Option<SpectrumCallback>,
}

impl DriverCallbacks {
    pub(crate) fn fire_song_ended(&mut self) {
        if let Some(cb) = self.song_ended.as_mut() {
            cb();
        }
    }

    pub(crate) fn fire_error(&mut self, message: &str) {
        if let Some(cb) = self.error.as_mut() {
            cb(message);
        }
    }

    pub(crate) fn fire_spectrum(&mut self, bands: &[f32]) {
        if let Some(cb) = self.spectrum.as_mut() {
            cb(bands);
        }
    }
}

/// Clamp a requested volume into `0.0..=1.0`. `NaN` maps to `None`.
pub fn clamp_volume(v: f32) -> Option<f32> {
    if v.is_nan() { None } else { Some(v.clamp(0.0, 1.0)) }
}
