//! Value types shared by the queue, controller and listeners.

use serde::{Deserialize, Serialize};

/// Display metadata attached to a queue entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork_uri: Option<String>,
}

/// Track reference held by the queue.
///
/// `uri` is the opaque identifier handed to the stream resolver; it is not a
/// playable URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub media_id: String,
    pub uri: String,
    #[serde(default)]
    pub metadata: MediaMetadata,
}

impl MediaItem {
    /// Item whose media id and resolver uri are the same identifier.
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            media_id: uri.clone(),
            uri,
            metadata: MediaMetadata::default(),
        }
    }

    pub fn with_media_id(mut self, media_id: impl Into<String>) -> Self {
        self.media_id = media_id.into();
        self
    }

    pub fn with_metadata(mut self, metadata: MediaMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Repeat policy applied to navigation and track end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

/// Engine-level playback state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No current player.
    #[default]
    Idle,
    /// URL resolution or backend load in flight.
    Loading,
    /// Player loaded, waiting for `play()`.
    ReadyPaused,
    Playing,
    /// Current track reached its end.
    Ended,
    /// The current track failed to resolve, load or play.
    Error,
}

impl PlaybackState {
    /// Whether a player is installed and usable.
    pub fn is_ready(&self) -> bool {
        matches!(self, PlaybackState::ReadyPaused | PlaybackState::Playing)
    }
}

/// Playback speed and pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackParameters {
    pub speed: f32,
    pub pitch: f32,
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
        }
    }
}

/// Listener-facing error description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerError {
    pub code: i32,
    pub code_name: String,
    pub message: String,
}

/// Why the current media item changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionReason {
    /// Advanced after the previous track ended.
    Auto,
    /// Explicit seek to another index.
    Seek,
    /// Same item restarted under repeat-one.
    Repeat,
    /// The queue was replaced or the current entry changed.
    PlaylistChanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_item_defaults_media_id_to_uri() {
        let item = MediaItem::new("dQw4w9WgXcQ");
        assert_eq!(item.media_id, "dQw4w9WgXcQ");
        assert_eq!(item.uri, "dQw4w9WgXcQ");

        let item = item.with_media_id("local-1");
        assert_eq!(item.media_id, "local-1");
    }

    #[test]
    fn media_item_deserializes_without_metadata() {
        let item: MediaItem =
            serde_json::from_str(r#"{"media_id": "m", "uri": "u"}"#).unwrap();
        assert_eq!(item.metadata, MediaMetadata::default());
    }

    #[test]
    fn ready_states() {
        assert!(PlaybackState::Playing.is_ready());
        assert!(PlaybackState::ReadyPaused.is_ready());
        assert!(!PlaybackState::Loading.is_ready());
        assert!(!PlaybackState::Idle.is_ready());
    }
}
