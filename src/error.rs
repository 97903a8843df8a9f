//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Faults raised inside a playback worker.
///
/// These never leave the worker thread as values: they are rendered into
/// `DriverEvent::Error` and delivered through the error callback.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or corrupt media {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("audio output unavailable: {0}")]
    Output(String),

    #[error("seek failed: {0}")]
    Seek(String),
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no playlist with id {0}")]
    PlaylistNotFound(Uuid),

    #[error("track index {index} out of range for playlist {playlist}")]
    TrackOutOfRange { playlist: Uuid, index: usize },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
