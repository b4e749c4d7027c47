//! # Playback Error Types
//!
//! Errors raised while turning queue entries into audible playback.
//!
//! None of these terminate the engine: the controller converts every failure
//! it sees into a [`PlayerError`](crate::types::PlayerError) notification for
//! listeners. They are returned directly only from the engine handle (after
//! shutdown) and from internal helpers.

use bridge_traits::BridgeError;
use thiserror::Error;

use crate::types::PlayerError;

/// Error code reported for stream resolution failures.
pub const ERROR_CODE_RESOLUTION: i32 = 1001;
/// Error code reported when a backend cannot load a URL.
pub const ERROR_CODE_LOAD: i32 = 1002;
/// Error code reported for runtime failures inside a backend pipeline.
pub const ERROR_CODE_BACKEND: i32 = 1003;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// No playable URL could be found for a track.
    #[error("No playable stream for track {track_id}: {reason}")]
    ResolutionFailure { track_id: String, reason: String },

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The native pipeline failed to construct or load a URL.
    #[error("Backend failed to load track {track_id}: {reason}")]
    BackendLoadFailure { track_id: String, reason: String },

    /// The backend reported an error mid-playback.
    #[error("Backend runtime error {code}: {message}")]
    BackendRuntimeError { code: i32, message: String },

    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Queue index out of range. Never surfaced to listeners.
    #[error("Queue index {index} out of range (len {len})")]
    InvalidIndex { index: usize, len: usize },

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// Engine settings failed validation.
    #[error("Invalid engine settings: {0}")]
    InvalidSettings(String),

    /// The engine task has shut down.
    #[error("Playback engine stopped")]
    EngineStopped,

    /// Failure reported by a host bridge.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::ResolutionFailure { .. }
                | PlaybackError::BackendLoadFailure { .. }
                | PlaybackError::Bridge(BridgeError::Timeout(_))
        )
    }

    /// Numeric code reported to listeners.
    pub fn error_code(&self) -> i32 {
        match self {
            PlaybackError::ResolutionFailure { .. } => ERROR_CODE_RESOLUTION,
            PlaybackError::BackendLoadFailure { .. } => ERROR_CODE_LOAD,
            PlaybackError::BackendRuntimeError { code, .. } => *code,
            _ => ERROR_CODE_BACKEND,
        }
    }

    /// Symbolic name reported to listeners.
    pub fn code_name(&self) -> &'static str {
        match self {
            PlaybackError::ResolutionFailure { .. } => "RESOLUTION_FAILED",
            PlaybackError::BackendLoadFailure { .. } => "LOAD_FAILED",
            PlaybackError::BackendRuntimeError { .. } => "BACKEND_ERROR",
            PlaybackError::InvalidIndex { .. } => "INVALID_INDEX",
            PlaybackError::InvalidSettings(_) => "INVALID_SETTINGS",
            PlaybackError::EngineStopped => "ENGINE_STOPPED",
            PlaybackError::Bridge(_) => "BRIDGE_ERROR",
        }
    }

    /// Listener-facing description of this error.
    pub fn to_player_error(&self) -> PlayerError {
        PlayerError {
            code: self.error_code(),
            code_name: self.code_name().to_string(),
            message: self.to_string(),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
