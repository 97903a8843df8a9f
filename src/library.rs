//! Library module: the `Track` entity, filesystem scanning and indexes.
//!
//! Scanning walks a directory, reads tags with `lofty` and produces `Track`
//! values. The index groups tracks by album and artist.

mod display;
mod index;
mod model;
mod scan;

pub use index::{Album, Artist, LibraryIndex};
pub use model::Track;
pub use scan::{carry_over, probe_duration, scan};
