//! # Precache Pool
//!
//! Paused, fully loaded players for upcoming queue indices, so that a track
//! transition only has to swap players instead of resolving and loading on
//! the critical path.
//!
//! ## Concurrency
//!
//! Warm passes are suspended between loads while the controller mutates the
//! queue, and `ready_indices` is read from engine handles. The map is only touched through short per-key operations under a
//! `parking_lot::Mutex`:
//!
//! - [`reserve`](PrecachePool::reserve) inserts a `Warming` placeholder if the
//!   index is free, so two tasks never warm the same index;
//! - [`fulfil`](PrecachePool::fulfil) swaps the placeholder for the loaded
//!   player, but only if the placeholder still carries the caller's epoch;
//! - [`take`](PrecachePool::take) removes and returns a ready player.
//!
//! Invalidation bumps the epoch and drops placeholders, so a warm that
//! completes after its index was invalidated gets its player back from
//! `fulfil` and releases it instead of publishing a stale entry. Targets are
//! reserved before a warm pass starts; a pass skips every target whose
//! reservation was dropped while it waited.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::loader::{PlayerFactory, PlayerHandle};
use crate::types::MediaItem;

enum PoolEntry {
    Warming { epoch: u64 },
    Ready(PlayerHandle),
}

/// One reserved index a warm pass should fill.
#[derive(Debug, Clone)]
pub(crate) struct WarmTarget {
    pub(crate) index: usize,
    pub(crate) epoch: u64,
    pub(crate) item: MediaItem,
}

#[derive(Default)]
struct PoolState {
    epoch: u64,
    entries: HashMap<usize, PoolEntry>,
}

/// Bounded index → warmed player map.
pub struct PrecachePool {
    state: Mutex<PoolState>,
    enabled: AtomicBool,
    max_count: usize,
}

impl PrecachePool {
    pub fn new(max_count: usize, enabled: bool) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            enabled: AtomicBool::new(enabled),
            max_count,
        }
    }

    /// Maximum number of forward indices kept warm.
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Toggle precaching. Disabling releases every entry.
    pub async fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.invalidate_all().await;
        }
    }

    /// Indices holding a ready player, sorted.
    pub fn ready_indices(&self) -> Vec<usize> {
        let state = self.state.lock();
        let mut indices: Vec<usize> = state
            .entries
            .iter()
            .filter(|(_, entry)| matches!(entry, PoolEntry::Ready(_)))
            .map(|(index, _)| *index)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Whether `index` is warming or ready.
    pub fn contains(&self, index: usize) -> bool {
        self.state.lock().entries.contains_key(&index)
    }

    /// Claim `index` for warming. Returns the epoch to pass to
    /// [`fulfil`](Self::fulfil), or `None` if the index is already claimed or
    /// precaching is disabled.
    pub fn reserve(&self, index: usize) -> Option<u64> {
        if !self.is_enabled() {
            return None;
        }

        let mut state = self.state.lock();
        if state.entries.contains_key(&index) {
            return None;
        }
        let epoch = state.epoch;
        state.entries.insert(index, PoolEntry::Warming { epoch });
        Some(epoch)
    }

    /// Whether the reservation made at `epoch` for `index` is still pending.
    pub fn is_reserved(&self, index: usize, epoch: u64) -> bool {
        matches!(
            self.state.lock().entries.get(&index),
            Some(PoolEntry::Warming { epoch: reserved }) if *reserved == epoch
        )
    }

    /// Publish a warmed player for a reservation.
    ///
    /// # Errors
    ///
    /// Hands the player back when the reservation was invalidated in the
    /// meantime; the caller must release it.
    pub fn fulfil(
        &self,
        index: usize,
        epoch: u64,
        handle: PlayerHandle,
    ) -> Result<(), PlayerHandle> {
        let mut state = self.state.lock();
        let reserved = matches!(
            state.entries.get(&index),
            Some(PoolEntry::Warming { epoch: reserved }) if *reserved == epoch
        );
        if !reserved {
            return Err(handle);
        }
        state.entries.insert(index, PoolEntry::Ready(handle));
        Ok(())
    }

    /// Drop a reservation whose warm failed.
    pub fn abandon(&self, index: usize, epoch: u64) {
        let mut state = self.state.lock();
        if matches!(
            state.entries.get(&index),
            Some(PoolEntry::Warming { epoch: reserved }) if *reserved == epoch
        ) {
            state.entries.remove(&index);
        }
    }

    /// Remove and return the ready player at `index`. A pending reservation is
    /// cancelled and reported as a miss.
    pub fn take(&self, index: usize) -> Option<PlayerHandle> {
        match self.state.lock().entries.remove(&index)? {
            PoolEntry::Ready(handle) => Some(handle),
            PoolEntry::Warming { .. } => None,
        }
    }

    /// Release every entry except the one keyed at `keep`.
    pub async fn invalidate_except(&self, keep: Option<usize>) {
        self.release_where(|index| Some(index) != keep).await;
    }

    /// Release every entry.
    pub async fn invalidate_all(&self) {
        self.release_where(|_| true).await;
    }

    /// Release entries whose index is not in `wanted`.
    pub(crate) async fn retain_only(&self, wanted: &[usize]) {
        self.release_where(|index| !wanted.contains(&index)).await;
    }

    async fn release_where(&self, doomed: impl Fn(usize) -> bool) {
        let drained = {
            let mut state = self.state.lock();
            state.epoch += 1;
            let keys: Vec<usize> = state
                .entries
                .keys()
                .copied()
                .filter(|index| doomed(*index))
                .collect();
            keys.into_iter()
                .filter_map(|index| state.entries.remove(&index))
                .collect::<Vec<_>>()
        };
        release_entries(drained).await;
    }

    /// Warm each reserved target in order, waiting `stagger` between loads.
    /// Failures are logged per index and never stop the pass.
    #[instrument(skip(self, factory, targets), fields(count = targets.len()))]
    pub(crate) async fn warm_indices(
        self: Arc<Self>,
        factory: PlayerFactory,
        targets: Vec<WarmTarget>,
        stagger: Duration,
    ) {
        let mut opened = 0usize;
        for WarmTarget { index, epoch, item } in targets {
            if !self.is_reserved(index, epoch) {
                debug!(index, "Precache target cancelled before warm");
                continue;
            }
            if opened > 0 && !stagger.is_zero() {
                tokio::time::sleep(stagger).await;
                if !self.is_reserved(index, epoch) {
                    debug!(index, "Precache target cancelled during stagger");
                    continue;
                }
            }
            opened += 1;

            match factory.open(&item).await {
                Ok(handle) => {
                    let id = handle.id();
                    match self.fulfil(index, epoch, handle) {
                        Ok(()) => debug!(index, player = %id, "Precached track"),
                        Err(stale) => {
                            debug!(index, "Precache invalidated during warm");
                            stale.dispose().await;
                        }
                    }
                }
                Err(err) => {
                    warn!(index, track = %item.uri, error = %err, "Precache warm failed");
                    self.abandon(index, epoch);
                }
            }
        }
    }
}

async fn release_entries(entries: Vec<PoolEntry>) {
    for entry in entries {
        if let PoolEntry::Ready(handle) = entry {
            handle.dispose().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{recording_handle, CallLog};

    #[test]
    fn reserve_is_exclusive_per_index() {
        let pool = PrecachePool::new(2, true);
        assert!(pool.reserve(1).is_some());
        assert!(pool.reserve(1).is_none());
        assert!(pool.reserve(2).is_some());
        assert!(pool.contains(1));
        assert!(pool.ready_indices().is_empty());
    }

    #[test]
    fn disabled_pool_refuses_reservations() {
        let pool = PrecachePool::new(1, false);
        assert!(pool.reserve(0).is_none());
    }

    #[test]
    fn fulfil_then_take() {
        let log = CallLog::default();
        let pool = PrecachePool::new(1, true);

        let epoch = pool.reserve(3).unwrap();
        pool.fulfil(3, epoch, recording_handle("c", &log)).unwrap();
        assert_eq!(pool.ready_indices(), vec![3]);

        let handle = pool.take(3).unwrap();
        assert_eq!(handle.track_uri(), "c");
        assert!(pool.take(3).is_none());
        assert!(!pool.contains(3));
    }

    #[test]
    fn take_cancels_pending_reservation() {
        let log = CallLog::default();
        let pool = PrecachePool::new(1, true);

        let epoch = pool.reserve(1).unwrap();
        assert!(pool.take(1).is_none());
        assert!(pool.fulfil(1, epoch, recording_handle("late", &log)).is_err());
    }

    #[tokio::test]
    async fn invalidation_fences_in_flight_warms() {
        let log = CallLog::default();
        let pool = PrecachePool::new(2, true);

        let epoch = pool.reserve(1).unwrap();
        pool.invalidate_all().await;

        let returned = pool
            .fulfil(1, epoch, recording_handle("late", &log))
            .unwrap_err();
        assert_eq!(returned.track_uri(), "late");

        // a fresh reservation after invalidation works again
        let epoch = pool.reserve(1).unwrap();
        assert!(pool.fulfil(1, epoch, recording_handle("b", &log)).is_ok());
    }

    #[tokio::test]
    async fn invalidate_except_keeps_only_requested_key() {
        let log = CallLog::default();
        let pool = PrecachePool::new(3, true);

        for (index, name) in [(0, "a"), (1, "b"), (2, "c")] {
            let epoch = pool.reserve(index).unwrap();
            pool.fulfil(index, epoch, recording_handle(name, &log)).unwrap();
        }

        pool.invalidate_except(Some(1)).await;

        assert_eq!(pool.ready_indices(), vec![1]);
        let calls = log.lock().clone();
        assert!(calls.contains(&"a:release".to_string()));
        assert!(calls.contains(&"c:release".to_string()));
        assert!(!calls.contains(&"b:release".to_string()));
    }

    #[tokio::test]
    async fn disabling_releases_everything() {
        let log = CallLog::default();
        let pool = PrecachePool::new(1, true);
        let epoch = pool.reserve(4).unwrap();
        pool.fulfil(4, epoch, recording_handle("d", &log)).unwrap();

        pool.set_enabled(false).await;

        assert!(!pool.is_enabled());
        assert!(pool.ready_indices().is_empty());
        assert_eq!(*log.lock(), vec!["d:stop", "d:release"]);
    }

    #[tokio::test]
    async fn retain_only_prunes_unwanted_indices() {
        let log = CallLog::default();
        let pool = PrecachePool::new(2, true);
        for (index, name) in [(1, "b"), (2, "c"), (5, "f")] {
            let epoch = pool.reserve(index).unwrap();
            pool.fulfil(index, epoch, recording_handle(name, &log)).unwrap();
        }
        // a surviving in-flight reservation keeps its epoch
        let pending = pool.reserve(3).unwrap();

        pool.retain_only(&[2, 3]).await;

        assert_eq!(pool.ready_indices(), vec![2]);
        assert!(pool.fulfil(3, pending, recording_handle("d", &log)).is_ok());
        assert_eq!(pool.ready_indices(), vec![2, 3]);
    }

    #[tokio::test]
    async fn dropped_reservations_are_no_longer_pending() {
        let pool = PrecachePool::new(2, true);
        let first = pool.reserve(1).unwrap();
        let second = pool.reserve(2).unwrap();
        assert!(pool.is_reserved(1, first));

        assert!(pool.take(1).is_none());
        assert!(!pool.is_reserved(1, first));

        pool.invalidate_all().await;
        assert!(!pool.is_reserved(2, second));

        // a new reservation at the same key does not revive the old one
        let renewed = pool.reserve(2).unwrap();
        assert_ne!(renewed, second);
        assert!(!pool.is_reserved(2, second));
        assert!(pool.is_reserved(2, renewed));
    }

    #[test]
    fn abandon_only_drops_matching_reservation() {
        let log = CallLog::default();
        let pool = PrecachePool::new(1, true);

        let epoch = pool.reserve(0).unwrap();
        pool.fulfil(0, epoch, recording_handle("a", &log)).unwrap();
        pool.abandon(0, epoch);
        assert_eq!(pool.ready_indices(), vec![0]);
    }
}
