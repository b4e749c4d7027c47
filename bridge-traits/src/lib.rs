//! # Host Bridge Traits
//!
//! Capabilities the playback core consumes but never implements itself.
//!
//! ## Overview
//!
//! The engine drives native media pipelines and a streaming client that
//! differ per platform. Each of them is reached through a narrow trait defined
//! here, so the queue, precache and state machine code is written once and
//! every host only supplies thin adapters.
//!
//! ## Traits
//!
//! ### Playback
//! - [`PlayerBackend`](playback::PlayerBackend) - Creates single-track players
//! - [`SingleTrackPlayer`](playback::SingleTrackPlayer) - Load/play/pause/seek one resolved URL
//! - [`PlayerEventSink`](playback::PlayerEventSink) - Channel for backend callbacks
//!
//! ### Streaming
//! - [`StreamResolver`](stream::StreamResolver) - Cached, probed and fresh URL lookup
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for expiry checks
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Backends
//!
//! | Backend      | Notes                                          |
//! |--------------|------------------------------------------------|
//! | GStreamer    | `playbin` per player, bus messages → events    |
//! | VLC          | one media player per track, native callbacks   |
//! | JavaFX-style | platform media player, status listeners        |
//!
//! None of them ships in this workspace; hosts register their adapter through
//! `core_runtime::config::CoreConfig::builder().player_backend(..)`.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Adapters should
//! convert native failures into it with a message that names the operation.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` (see [`platform`]). The core makes
//! every player call, including creating and loading precached players, from
//! its single controller task, so calls never overlap. That task may resume
//! on another runtime worker between calls.
//!
//! ## Example
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::error::Result;
//! use bridge_traits::playback::{PlayerBackend, PlayerEventSink, SingleTrackPlayer};
//!
//! struct GstBackend;
//!
//! #[async_trait]
//! impl PlayerBackend for GstBackend {
//!     fn name(&self) -> &str {
//!         "gstreamer"
//!     }
//!
//!     async fn create_player(&self, events: PlayerEventSink) -> Result<Box<dyn SingleTrackPlayer>> {
//!         Ok(Box::new(GstPlayer::new(events)?))
//!     }
//! }
//! ```

pub mod error;
pub mod platform;
pub mod playback;
pub mod stream;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use playback::{
    BackendEvent, PlayerBackend, PlayerEvent, PlayerEventSink, PlayerId, SingleTrackPlayer,
};
pub use stream::{CachedFormat, StreamResolver};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
