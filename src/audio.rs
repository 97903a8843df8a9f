//! Audio subsystem: two playback backends behind one selector.
//!
//! Re-exports the engine selector and the types needed by the controller.

mod driver;
mod formats;
mod rodio_worker;
mod selector;
mod spectrum;
mod symphonia_worker;
mod types;

pub use formats::extension_of;
pub use selector::{EngineSelector, ListenerId};
pub use types::{PlaybackState, StateListener, WorkerTuning};
