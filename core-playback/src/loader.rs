//! Construction of loaded backend players.
//!
//! Both the controller (on a precache miss) and the precache warm tasks turn
//! a [`MediaItem`] into a loaded, paused player the same way: resolve the
//! stream URL, ask the backend for a new player wired to the shared event
//! channel, and load the URL. A player that fails to load is released before
//! the error is returned, so no failed pipeline outlives the attempt.

use std::sync::Arc;

use bridge_traits::{
    BackendEvent, PlayerBackend, PlayerEventSink, PlayerId, SingleTrackPlayer,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{PlaybackError, Result};
use crate::resolver::StreamUrlResolver;
use crate::types::MediaItem;

/// An owned backend player together with the track it was loaded for.
pub struct PlayerHandle {
    id: PlayerId,
    track_uri: String,
    player: Box<dyn SingleTrackPlayer>,
}

impl PlayerHandle {
    pub fn new(id: PlayerId, track_uri: impl Into<String>, player: Box<dyn SingleTrackPlayer>) -> Self {
        Self {
            id,
            track_uri: track_uri.into(),
            player,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Track identifier this player was loaded for.
    pub fn track_uri(&self) -> &str {
        &self.track_uri
    }

    pub fn player(&self) -> &dyn SingleTrackPlayer {
        self.player.as_ref()
    }

    /// Stop and release the native pipeline. Failures are logged; the handle
    /// is consumed either way.
    pub async fn dispose(self) {
        if let Err(err) = self.player.stop().await {
            debug!(player = %self.id, error = %err, "Stop before release failed");
        }
        if let Err(err) = self.player.release().await {
            warn!(player = %self.id, error = %err, "Player release failed");
        }
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("id", &self.id)
            .field("track_uri", &self.track_uri)
            .finish()
    }
}

/// Builds loaded players for queue entries.
#[derive(Clone)]
pub(crate) struct PlayerFactory {
    backend: Arc<dyn PlayerBackend>,
    resolver: StreamUrlResolver,
    events: mpsc::Sender<BackendEvent>,
}

impl PlayerFactory {
    pub(crate) fn new(
        backend: Arc<dyn PlayerBackend>,
        resolver: StreamUrlResolver,
        events: mpsc::Sender<BackendEvent>,
    ) -> Self {
        Self {
            backend,
            resolver,
            events,
        }
    }

    /// Resolve, create and load a player for `item`, leaving it paused.
    pub(crate) async fn open(&self, item: &MediaItem) -> Result<PlayerHandle> {
        let url = self.resolver.resolve(&item.uri).await?;

        let id = PlayerId::new();
        let sink = PlayerEventSink::new(id, self.events.clone());
        let player = self.backend.create_player(sink).await.map_err(|err| {
            PlaybackError::BackendLoadFailure {
                track_id: item.uri.clone(),
                reason: err.to_string(),
            }
        })?;

        if let Err(err) = player.load(&url).await {
            if let Err(release_err) = player.release().await {
                warn!(player = %id, error = %release_err, "Release after failed load failed");
            }
            return Err(PlaybackError::BackendLoadFailure {
                track_id: item.uri.clone(),
                reason: err.to_string(),
            });
        }

        debug!(
            player = %id,
            backend = self.backend.name(),
            track = %item.uri,
            "Player loaded"
        );
        Ok(PlayerHandle::new(id, item.uri.clone(), player))
    }
}
