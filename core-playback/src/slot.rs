//! Owned slot for the current player.
//!
//! The only way to make a player current is [`PlayerSlot::install`], which
//! stops and releases the previous occupant before storing the new one. The
//! caller publishes the transition after `install` returns, so listeners can
//! never observe two live "current" players.

use bridge_traits::PlayerId;
use tracing::debug;

use crate::loader::PlayerHandle;

#[derive(Debug, Default)]
pub struct PlayerSlot {
    current: Option<PlayerHandle>,
}

impl PlayerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&PlayerHandle> {
        self.current.as_ref()
    }

    pub fn current_id(&self) -> Option<PlayerId> {
        self.current.as_ref().map(PlayerHandle::id)
    }

    pub fn is_current(&self, id: PlayerId) -> bool {
        self.current_id() == Some(id)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Release the current player, then store `next`. Returns the id of the
    /// released player.
    pub async fn install(&mut self, next: PlayerHandle) -> Option<PlayerId> {
        let released = self.clear().await;
        debug!(player = %next.id(), track = next.track_uri(), "Player installed");
        self.current = Some(next);
        released
    }

    /// Release the current player, leaving the slot empty.
    pub async fn clear(&mut self) -> Option<PlayerId> {
        let previous = self.current.take()?;
        let id = previous.id();
        previous.dispose().await;
        Some(id)
    }
}
