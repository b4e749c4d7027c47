//! Workspace facade crate.
//!
//! Re-exports the playback engine together with the host bridge traits and
//! runtime helpers it is configured with, so hosts can depend on a single
//! crate.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

pub use core_playback::{PlaybackEngine, PlaybackError};
pub use core_runtime::config::CoreConfig;
