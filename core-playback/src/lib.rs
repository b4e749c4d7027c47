//! # Playback Queue & Precache Engine
//!
//! Gapless-feeling queue playback on top of a host-supplied single-track
//! player.
//!
//! ## Overview
//!
//! This crate handles:
//! - An ordered queue with a cursor that follows inserts, removals and moves
//! - Stream URL resolution with cached-format reuse and a liveness probe
//! - A bounded pool of pre-loaded players for the upcoming entries
//! - A controller task that owns exactly one current player at a time and
//!   advances according to the repeat mode when a track ends
//! - Listener notifications for every observable state change
//!
//! The host provides a [`PlayerBackend`](bridge_traits::PlayerBackend) and a
//! [`StreamResolver`](bridge_traits::StreamResolver) through
//! [`CoreConfig`](core_runtime::config::CoreConfig), then drives everything
//! through [`PlaybackEngine`].

pub mod config;
mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod listeners;
pub mod loader;
pub mod precache;
pub mod queue;
pub mod resolver;
pub mod slot;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::EngineSettings;
pub use controller::EngineSnapshot;
pub use engine::PlaybackEngine;
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use listeners::{ListenerId, ListenerRegistry, PlaybackListener};
pub use queue::{CursorEffect, PlaybackQueue};
pub use types::{
    MediaItem, MediaMetadata, PlaybackParameters, PlaybackState, PlayerError, RepeatMode,
    TransitionReason,
};
