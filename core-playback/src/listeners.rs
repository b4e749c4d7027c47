//! Listener registry.
//!
//! Observers are notified synchronously on the engine task, in registration
//! order. Dispatch iterates over a snapshot of the registered set, so a
//! listener may add or remove listeners (itself included) from inside its
//! callback; such changes take effect from the next event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::events::PlaybackEvent;

/// Receiver of playback events.
///
/// Callbacks run on the engine task and must return quickly; hand work off
/// to another task if it may block.
pub trait PlaybackListener: Send + Sync {
    fn on_event(&self, event: &PlaybackEvent);
}

impl<F> PlaybackListener for F
where
    F: Fn(&PlaybackEvent) + Send + Sync,
{
    fn on_event(&self, event: &PlaybackEvent) {
        self(event)
    }
}

/// Token returned by [`ListenerRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(u64);

type Entry = (ListenerId, Arc<dyn PlaybackListener>);

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn PlaybackListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    pub fn dispatch(&self, event: &PlaybackEvent) {
        let snapshot: Vec<Entry> = self.listeners.lock().clone();
        for (_, listener) in snapshot {
            listener.on_event(event);
        }
    }
}
