//! # Playback Engine
//!
//! Public handle over the controller task.
//!
//! Commands are fire-and-forget: they are queued in order and applied by the
//! controller one at a time, so a caller may issue `seek_to_index(3)` then
//! `play()` without waiting in between. Getters read the snapshot the
//! controller publishes after every message it handles; they reflect every
//! command applied so far. Call [`PlaybackEngine::flush`] to wait until all
//! previously issued commands have been applied.
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{EngineSettings, MediaItem, PlaybackEngine};
//!
//! let engine = PlaybackEngine::start(&config, EngineSettings::default())?;
//! engine.add_listener(Arc::new(|event: &PlaybackEvent| println!("{}", event.description())));
//! engine.set_media_item(MediaItem::new("dQw4w9WgXcQ"))?;
//! engine.add_media_item(MediaItem::new("9bZkp7q19f0"))?;
//! engine.play()?;
//! ```

use std::sync::Arc;

use bridge_traits::BackendEvent;
use core_runtime::config::CoreConfig;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, instrument};

use crate::config::EngineSettings;
use crate::controller::{Command, Controller, EngineSnapshot, Inbox};
use crate::error::{PlaybackError, Result};
use crate::listeners::{ListenerId, ListenerRegistry, PlaybackListener};
use crate::loader::PlayerFactory;
use crate::precache::PrecachePool;
use crate::resolver::StreamUrlResolver;
use crate::types::{MediaItem, PlaybackParameters, PlaybackState, RepeatMode};

/// Handle to a running playback engine.
///
/// Dropping every clone shuts the engine down; [`shutdown`](Self::shutdown)
/// does the same and waits for the release to finish.
#[derive(Clone)]
pub struct PlaybackEngine {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<EngineSnapshot>,
    listeners: Arc<ListenerRegistry>,
    pool: Arc<PrecachePool>,
}

impl PlaybackEngine {
    /// Spawn the controller task on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidSettings`] if `settings` fail
    /// validation.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[instrument(skip(config, settings), fields(backend = config.player_backend.name()))]
    pub fn start(config: &CoreConfig, settings: EngineSettings) -> Result<Self> {
        settings.validate().map_err(PlaybackError::InvalidSettings)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel::<BackendEvent>(settings.event_capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(EngineSnapshot::default());

        let resolver = StreamUrlResolver::new(
            Arc::clone(&config.stream_resolver),
            Arc::clone(&config.clock),
            settings.resolve_timeout(),
        );
        let factory = PlayerFactory::new(Arc::clone(&config.player_backend), resolver, event_tx);

        let precaching = settings.precache_enabled && config.features.enable_precaching;
        let pool = Arc::new(PrecachePool::new(settings.max_precache_count, precaching));
        let listeners = Arc::new(ListenerRegistry::new());

        info!(
            precaching,
            max_precache_count = settings.max_precache_count,
            equalizer_intents = config.features.enable_equalizer_intent,
            "Starting playback engine"
        );

        let controller = Controller::new(
            factory,
            Arc::clone(&pool),
            Arc::clone(&listeners),
            settings,
            config.features.enable_equalizer_intent,
            snapshot_tx,
        );
        tokio::spawn(controller.run(Inbox {
            commands: command_rx,
            backend_events: event_rx,
        }));

        Ok(Self {
            commands: command_tx,
            snapshot: snapshot_rx,
            listeners,
            pool,
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::EngineStopped)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx))?;
        reply_rx.await.map_err(|_| PlaybackError::EngineStopped)
    }

    // ========================================================================
    // Queue
    // ========================================================================

    /// Replace the queue with `item` and load it.
    pub fn set_media_item(&self, item: MediaItem) -> Result<()> {
        self.send(Command::SetMediaItem(item))
    }

    /// Append `item`. Loads it if the queue was empty.
    pub fn add_media_item(&self, item: MediaItem) -> Result<()> {
        self.send(Command::AddMediaItem(item))
    }

    /// Insert `item` before `index` (`index == len` appends). Out-of-range
    /// positions are ignored.
    pub fn add_media_item_at(&self, index: usize, item: MediaItem) -> Result<()> {
        self.send(Command::AddMediaItemAt { index, item })
    }

    pub fn remove_media_item(&self, index: usize) -> Result<()> {
        self.send(Command::RemoveMediaItem(index))
    }

    pub fn move_media_item(&self, from: usize, to: usize) -> Result<()> {
        self.send(Command::MoveMediaItem { from, to })
    }

    /// Swap the entry at `index`. Replacing the current entry reloads it.
    pub fn replace_media_item(&self, index: usize, item: MediaItem) -> Result<()> {
        self.send(Command::ReplaceMediaItem { index, item })
    }

    pub fn clear_media_items(&self) -> Result<()> {
        self.send(Command::ClearMediaItems)
    }

    pub async fn media_item_at(&self, index: usize) -> Result<Option<MediaItem>> {
        self.request(|reply| Command::MediaItemAt(index, reply)).await
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    /// Stop the current player but keep it; `play` restarts it.
    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Load the current entry without starting playback.
    pub fn prepare(&self) -> Result<()> {
        self.send(Command::Prepare)
    }

    pub fn seek_to(&self, position_ms: i64) -> Result<()> {
        self.send(Command::SeekTo(position_ms))
    }

    pub fn seek_to_index(&self, index: usize, position_ms: i64) -> Result<()> {
        self.send(Command::SeekToIndex { index, position_ms })
    }

    pub fn seek_back(&self) -> Result<()> {
        self.send(Command::SeekBack)
    }

    pub fn seek_forward(&self) -> Result<()> {
        self.send(Command::SeekForward)
    }

    pub fn seek_to_next(&self) -> Result<()> {
        self.send(Command::SeekToNext)
    }

    pub fn seek_to_previous(&self) -> Result<()> {
        self.send(Command::SeekToPrevious)
    }

    // ========================================================================
    // Modes & audio
    // ========================================================================

    pub fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.send(Command::SetRepeatMode(mode))
    }

    /// Stored and reported back; queue order is not permuted.
    pub fn set_shuffle_mode_enabled(&self, enabled: bool) -> Result<()> {
        self.send(Command::SetShuffleModeEnabled(enabled))
    }

    pub fn set_playback_parameters(&self, parameters: PlaybackParameters) -> Result<()> {
        self.send(Command::SetPlaybackParameters(parameters))
    }

    /// Clamped to `0.0..=1.0`.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(Command::SetVolume(volume))
    }

    pub fn set_precaching_enabled(&self, enabled: bool) -> Result<()> {
        self.send(Command::SetPrecachingEnabled(enabled))
    }

    /// Accepted for compatibility; the bound set at start stays in force.
    pub fn set_max_precache_count(&self, count: usize) -> Result<()> {
        self.send(Command::SetMaxPrecacheCount(count))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Position of the current player in milliseconds, falling back to the
    /// last known value when the backend does not answer in time.
    pub async fn current_position(&self) -> Result<i64> {
        self.request(Command::QueryPosition).await
    }

    /// Duration of the current track in milliseconds, or 0 if unknown.
    pub async fn duration(&self) -> Result<i64> {
        self.request(Command::QueryDuration).await
    }

    /// Wait until every previously issued command has been applied.
    pub async fn flush(&self) -> Result<()> {
        self.request(Command::Flush).await
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn watch(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.snapshot.borrow().is_playing
    }

    pub fn play_when_ready(&self) -> bool {
        self.snapshot.borrow().play_when_ready
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().is_loading
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.snapshot.borrow().state
    }

    pub fn current_media_item_index(&self) -> Option<usize> {
        self.snapshot.borrow().current_index
    }

    pub fn current_media_item(&self) -> Option<MediaItem> {
        self.snapshot.borrow().current_item.clone()
    }

    pub fn media_item_count(&self) -> usize {
        self.snapshot.borrow().item_count
    }

    pub fn has_next(&self) -> bool {
        self.snapshot.borrow().has_next
    }

    pub fn has_previous(&self) -> bool {
        self.snapshot.borrow().has_previous
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.snapshot.borrow().repeat_mode
    }

    pub fn shuffle_mode_enabled(&self) -> bool {
        self.snapshot.borrow().shuffle_enabled
    }

    pub fn volume(&self) -> f32 {
        self.snapshot.borrow().volume
    }

    pub fn playback_parameters(&self) -> PlaybackParameters {
        self.snapshot.borrow().parameters
    }

    /// 100 once a loaded track reports its duration, otherwise 0.
    pub fn buffered_percentage(&self) -> u8 {
        self.snapshot.borrow().buffered_percentage
    }

    /// Indices currently holding a warmed player.
    pub fn precached_indices(&self) -> Vec<usize> {
        self.pool.ready_indices()
    }

    // ========================================================================
    // Listeners & lifecycle
    // ========================================================================

    pub fn add_listener(&self, listener: Arc<dyn PlaybackListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Release every player and stop the controller. Further calls on any
    /// clone of this handle return [`PlaybackError::EngineStopped`].
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("snapshot", &*self.snapshot.borrow())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
