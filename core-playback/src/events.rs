//! Events published to playback listeners.

use serde::{Deserialize, Serialize};

use crate::types::{MediaItem, PlaybackState, PlayerError, TransitionReason};

/// Notification broadcast by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PlaybackEvent {
    /// Actual playing state changed.
    IsPlayingChanged { is_playing: bool },
    PlaybackStateChanged { state: PlaybackState },
    /// A new player became current. Always emitted after the previous player
    /// was released.
    MediaItemTransition {
        item: MediaItem,
        index: usize,
        reason: TransitionReason,
    },
    PlayerError { error: PlayerError },
    /// Loading or buffering started or finished.
    IsLoadingChanged { is_loading: bool },
    /// The host should open (`true`) or close an audio effect session.
    EqualizerIntent { open: bool },
    /// The last track ended with repeat off.
    PlaylistExhausted,
}

impl PlaybackEvent {
    /// Short human-readable summary for logs.
    pub fn description(&self) -> String {
        match self {
            PlaybackEvent::IsPlayingChanged { is_playing } => {
                format!("is playing: {}", is_playing)
            }
            PlaybackEvent::PlaybackStateChanged { state } => format!("state: {:?}", state),
            PlaybackEvent::MediaItemTransition { item, index, reason } => {
                format!("transition to #{} {} ({:?})", index, item.media_id, reason)
            }
            PlaybackEvent::PlayerError { error } => {
                format!("error {} {}: {}", error.code, error.code_name, error.message)
            }
            PlaybackEvent::IsLoadingChanged { is_loading } => {
                format!("is loading: {}", is_loading)
            }
            PlaybackEvent::EqualizerIntent { open } => format!("equalizer open: {}", open),
            PlaybackEvent::PlaylistExhausted => "playlist exhausted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = PlaybackEvent::MediaItemTransition {
            item: MediaItem::new("abc"),
            index: 2,
            reason: TransitionReason::Auto,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "MediaItemTransition");
        assert_eq!(json["payload"]["index"], 2);
        assert_eq!(json["payload"]["reason"], "Auto");

        let back: PlaybackEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn unit_variant_serializes_without_payload() {
        let json = serde_json::to_value(PlaybackEvent::PlaylistExhausted).unwrap();
        assert_eq!(json["type"], "PlaylistExhausted");
        assert_eq!(
            PlaybackEvent::PlaylistExhausted.description(),
            "playlist exhausted"
        );
    }
}
