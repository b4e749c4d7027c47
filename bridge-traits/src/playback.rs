//! Single-track player capability.
//!
//! A backend adapter (GStreamer, VLC, JavaFX-style media players, mobile
//! platform players) exposes exactly one primitive to the core: a player that
//! can load and play one resolved URL at a time. The queue, precache and state
//! machine logic lives in the core and is shared by every backend, so adapters
//! are expected to be thin translators from these calls to native pipeline
//! operations.
//!
//! Native pipelines usually report progress through callbacks fired on
//! backend-owned threads. Adapters forward those callbacks into the
//! [`PlayerEventSink`] they were created with; the core drains the resulting
//! channel from a single task.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    error::{BridgeError, Result},
    platform::PlatformSendSync,
};

/// Identifier the core assigns to every player instance it creates.
///
/// Events are tagged with this id so the controller can tell the current
/// player apart from warmed or already-released ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Generate a new player identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event reported by a backend player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PlayerEvent {
    /// Pipeline finished loading and can start playback.
    Ready,
    /// Audio output started.
    Playing,
    /// Audio output paused.
    Paused,
    /// End of stream reached.
    Ended,
    /// Runtime failure inside the native pipeline.
    Error { code: i32, message: String },
    /// Network buffering progress, `0..=100`.
    Buffering { percent: u8 },
}

/// A [`PlayerEvent`] tagged with the player that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEvent {
    pub player: PlayerId,
    pub event: PlayerEvent,
}

/// Sending half of the backend event channel handed to each new player.
///
/// The channel is bounded; [`try_emit`](PlayerEventSink::try_emit) is meant
/// for synchronous callbacks running on backend threads and drops the event
/// when the core is not keeping up.
#[derive(Debug, Clone)]
pub struct PlayerEventSink {
    player: PlayerId,
    tx: mpsc::Sender<BackendEvent>,
}

impl PlayerEventSink {
    pub fn new(player: PlayerId, tx: mpsc::Sender<BackendEvent>) -> Self {
        Self { player, tx }
    }

    /// Id of the player this sink reports for.
    pub fn player_id(&self) -> PlayerId {
        self.player
    }

    /// Deliver an event, waiting for channel capacity.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotAvailable`] once the engine has shut down.
    pub async fn emit(&self, event: PlayerEvent) -> Result<()> {
        self.tx
            .send(BackendEvent {
                player: self.player,
                event,
            })
            .await
            .map_err(|_| BridgeError::NotAvailable("player event channel closed".to_string()))
    }

    /// Deliver an event without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::OperationFailed`] when the channel is full and
    /// [`BridgeError::NotAvailable`] once the engine has shut down.
    pub fn try_emit(&self, event: PlayerEvent) -> Result<()> {
        self.tx
            .try_send(BackendEvent {
                player: self.player,
                event,
            })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => {
                    BridgeError::OperationFailed("player event channel full".to_string())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    BridgeError::NotAvailable("player event channel closed".to_string())
                }
            })
    }
}

/// One native media pipeline able to play a single resolved URL.
///
/// Positions are expressed in milliseconds. The engine drives every player,
/// current or precached, from its single controller task, so calls on the
/// players of one backend never overlap. That task may resume on a different
/// runtime worker between calls; adapters whose native library is bound to
/// one thread must forward calls to it. Implementations must not block the
/// calling task for long; slow native calls should be moved onto a blocking
/// pool by the adapter.
#[async_trait::async_trait]
pub trait SingleTrackPlayer: PlatformSendSync {
    /// Load `uri` and leave the pipeline paused and ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline cannot be constructed or the URI is
    /// rejected by the backend.
    async fn load(&self, uri: &str) -> Result<()>;

    /// Start or resume audio output.
    async fn play(&self) -> Result<()>;

    /// Pause audio output, keeping the pipeline loaded.
    async fn pause(&self) -> Result<()>;

    /// Stop audio output and rewind.
    async fn stop(&self) -> Result<()>;

    /// Seek to an absolute position. Returns `false` if the backend refused.
    async fn seek(&self, position_ms: i64) -> Result<bool>;

    /// Set output volume, normalized to `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Set playback rate, `1.0` being normal speed.
    async fn set_rate(&self, rate: f32) -> Result<()>;

    /// Current position, `None` when the backend cannot answer right now.
    async fn query_position(&self) -> Result<Option<i64>>;

    /// Stream duration, `None` when not yet known.
    async fn query_duration(&self) -> Result<Option<i64>>;

    /// Tear down the native pipeline. The player is unusable afterwards.
    async fn release(&self) -> Result<()>;
}

/// Factory for backend players.
#[async_trait::async_trait]
pub trait PlayerBackend: PlatformSendSync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Create an unloaded player that reports its events through `events`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot allocate a new pipeline.
    async fn create_player(&self, events: PlayerEventSink) -> Result<Box<dyn SingleTrackPlayer>>;
}
