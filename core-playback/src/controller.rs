//! # Playback Controller
//!
//! The single task that owns the queue, the current player slot and the
//! session state. Every public engine operation arrives here as a
//! [`Command`] and backend notifications arrive on their own channel.
//! Because one task handles both, none of the state below is ever touched
//! concurrently, and a player handle can only become current through
//! [`PlayerSlot::install`].
//!
//! ## Backend work
//!
//! Native players are not thread-safe, so every backend call is made from
//! this task. Loads and precache warms are not spawned: they are queued in
//! `in_flight` and polled by the run loop alongside commands, which keeps
//! the controller responsive while a slow load is suspended.
//!
//! ## Loads
//!
//! Starting a load bumps a generation counter, records a [`PendingLoad`] and
//! queues the resolve/create/load work. Its [`LoadFinished`] result is
//! checked against the generation; if a newer load started in the meantime
//! the player is released and ignored, so rapid skipping can never install a
//! player for a track the user already left.
//!
//! ## Precaching
//!
//! After every successful install the controller reserves the upcoming
//! indices in the [`PrecachePool`] and queues one warm pass for them. Any
//! structural queue mutation invalidates the pool first, which also cancels
//! reservations the warm pass has not reached yet.

use std::ops::ControlFlow;
use std::sync::Arc;

use bridge_traits::{BackendEvent, PlayerEvent};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::EngineSettings;
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::listeners::ListenerRegistry;
use crate::loader::{PlayerFactory, PlayerHandle};
use crate::precache::{PrecachePool, WarmTarget};
use crate::queue::{CursorEffect, PlaybackQueue};
use crate::slot::PlayerSlot;
use crate::types::{
    MediaItem, PlaybackParameters, PlaybackState, RepeatMode, TransitionReason,
};

/// Requests sent from the engine handle to the controller task.
#[derive(Debug)]
pub(crate) enum Command {
    SetMediaItem(MediaItem),
    AddMediaItem(MediaItem),
    AddMediaItemAt { index: usize, item: MediaItem },
    RemoveMediaItem(usize),
    MoveMediaItem { from: usize, to: usize },
    ReplaceMediaItem { index: usize, item: MediaItem },
    ClearMediaItems,
    Play,
    Pause,
    Stop,
    Prepare,
    SeekTo(i64),
    SeekToIndex { index: usize, position_ms: i64 },
    SeekBack,
    SeekForward,
    SeekToNext,
    SeekToPrevious,
    SetRepeatMode(RepeatMode),
    SetShuffleModeEnabled(bool),
    SetPlaybackParameters(PlaybackParameters),
    SetVolume(f32),
    SetPrecachingEnabled(bool),
    SetMaxPrecacheCount(usize),
    MediaItemAt(usize, oneshot::Sender<Option<MediaItem>>),
    QueryPosition(oneshot::Sender<i64>),
    QueryDuration(oneshot::Sender<i64>),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Result of a queued load.
pub(crate) struct LoadFinished {
    generation: u64,
    index: usize,
    result: Result<PlayerHandle>,
}

/// The load the controller is currently waiting for.
#[derive(Debug, Clone)]
struct PendingLoad {
    generation: u64,
    index: usize,
    start_position_ms: i64,
    should_play: bool,
    reason: TransitionReason,
}

/// Point-in-time view of the engine, published after every message the
/// controller handles.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub state: PlaybackState,
    pub is_playing: bool,
    pub play_when_ready: bool,
    pub is_loading: bool,
    pub current_index: Option<usize>,
    pub current_item: Option<MediaItem>,
    pub item_count: usize,
    pub repeat_mode: RepeatMode,
    pub shuffle_enabled: bool,
    pub volume: f32,
    pub parameters: PlaybackParameters,
    pub position_ms: i64,
    pub duration_ms: i64,
    pub buffered_percentage: u8,
    pub has_next: bool,
    pub has_previous: bool,
    pub precaching_enabled: bool,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            is_playing: false,
            play_when_ready: true,
            is_loading: false,
            current_index: None,
            current_item: None,
            item_count: 0,
            repeat_mode: RepeatMode::Off,
            shuffle_enabled: false,
            volume: 1.0,
            parameters: PlaybackParameters::default(),
            position_ms: 0,
            duration_ms: 0,
            buffered_percentage: 0,
            has_next: false,
            has_previous: false,
            precaching_enabled: false,
        }
    }
}

struct Session {
    state: PlaybackState,
    is_playing: bool,
    play_when_ready: bool,
    is_loading: bool,
    volume: f32,
    repeat_mode: RepeatMode,
    shuffle_enabled: bool,
    parameters: PlaybackParameters,
    position_ms: i64,
    duration_ms: i64,
}

/// Backend work polled by the run loop. Warm passes finish with `None`.
type BackendWork = BoxFuture<'static, Option<LoadFinished>>;

/// Channels the controller reads from.
pub(crate) struct Inbox {
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,
    pub(crate) backend_events: mpsc::Receiver<BackendEvent>,
}

pub(crate) struct Controller {
    factory: PlayerFactory,
    pool: Arc<PrecachePool>,
    listeners: Arc<ListenerRegistry>,
    settings: EngineSettings,
    equalizer_intents: bool,
    queue: PlaybackQueue,
    slot: PlayerSlot,
    session: Session,
    pending: Option<PendingLoad>,
    generation: u64,
    in_flight: FuturesUnordered<BackendWork>,
    snapshot: watch::Sender<EngineSnapshot>,
}

impl Controller {
    pub(crate) fn new(
        factory: PlayerFactory,
        pool: Arc<PrecachePool>,
        listeners: Arc<ListenerRegistry>,
        settings: EngineSettings,
        equalizer_intents: bool,
        snapshot: watch::Sender<EngineSnapshot>,
    ) -> Self {
        let session = Session {
            state: PlaybackState::Idle,
            is_playing: false,
            play_when_ready: true,
            is_loading: false,
            volume: settings.initial_volume.clamp(0.0, 1.0),
            repeat_mode: RepeatMode::Off,
            shuffle_enabled: false,
            parameters: PlaybackParameters::default(),
            position_ms: 0,
            duration_ms: 0,
        };

        Self {
            factory,
            pool,
            listeners,
            settings,
            equalizer_intents,
            queue: PlaybackQueue::new(),
            slot: PlayerSlot::new(),
            session,
            pending: None,
            generation: 0,
            in_flight: FuturesUnordered::new(),
            snapshot,
        }
    }

    /// Process messages until shutdown or until every engine handle is gone.
    pub(crate) async fn run(mut self, mut inbox: Inbox) {
        info!("Playback controller started");
        self.publish_snapshot();

        loop {
            tokio::select! {
                biased;

                Some(work) = self.in_flight.next() => {
                    if let Some(done) = work {
                        self.on_load_finished(done).await;
                    }
                }
                command = inbox.commands.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(ack) = self.handle(command).await {
                            inbox.commands.close();
                            self.shutdown().await;
                            self.publish_snapshot();
                            let _ = ack.send(());
                            break;
                        }
                    }
                    None => {
                        debug!("All engine handles dropped");
                        self.shutdown().await;
                        self.publish_snapshot();
                        break;
                    }
                },
                Some(event) = inbox.backend_events.recv() => self.on_backend_event(event).await,
            }
            self.publish_snapshot();
        }

        info!("Playback controller stopped");
    }

    /// Apply one command. `Shutdown` breaks out with its acknowledgement so
    /// the run loop can stop taking commands before releasing players.
    async fn handle(&mut self, command: Command) -> ControlFlow<oneshot::Sender<()>> {
        trace!(?command, "Handling command");
        match command {
            Command::SetMediaItem(item) => self.set_media_item(item).await,
            Command::AddMediaItem(item) => self.add_media_item(item).await,
            Command::AddMediaItemAt { index, item } => self.add_media_item_at(index, item).await,
            Command::RemoveMediaItem(index) => self.remove_media_item(index).await,
            Command::MoveMediaItem { from, to } => self.move_media_item(from, to).await,
            Command::ReplaceMediaItem { index, item } => {
                self.replace_media_item(index, item).await
            }
            Command::ClearMediaItems => self.clear_media_items().await,
            Command::Play => self.play().await,
            Command::Pause => self.pause().await,
            Command::Stop => self.stop().await,
            Command::Prepare => self.prepare().await,
            Command::SeekTo(position_ms) => self.seek_to(position_ms).await,
            Command::SeekToIndex { index, position_ms } => {
                self.seek_to_index(index, position_ms).await
            }
            Command::SeekBack => {
                let target = self.current_position().await - self.settings.seek_increment_ms;
                self.seek_to(target.max(0)).await;
            }
            Command::SeekForward => {
                let duration = self.duration().await;
                let mut target = self.current_position().await + self.settings.seek_increment_ms;
                if duration > 0 {
                    target = target.min(duration);
                }
                self.seek_to(target).await;
            }
            Command::SeekToNext => {
                let mode = self.session.repeat_mode;
                if self.queue.has_next(mode) {
                    if let Some(next) = self.queue.next_index(mode) {
                        self.seek_to_index(next, 0).await;
                    }
                }
            }
            Command::SeekToPrevious => {
                let mode = self.session.repeat_mode;
                if self.queue.has_previous(mode) {
                    if let Some(previous) = self.queue.previous_index(mode) {
                        self.seek_to_index(previous, 0).await;
                    }
                }
            }
            Command::SetRepeatMode(mode) => {
                self.session.repeat_mode = mode;
                self.trigger_precaching().await;
            }
            Command::SetShuffleModeEnabled(enabled) => {
                // Stored for hosts; the queue order is not permuted.
                self.session.shuffle_enabled = enabled;
            }
            Command::SetPlaybackParameters(parameters) => {
                self.set_playback_parameters(parameters).await
            }
            Command::SetVolume(volume) => self.set_volume(volume).await,
            Command::SetPrecachingEnabled(enabled) => {
                self.pool.set_enabled(enabled).await;
                if enabled {
                    self.trigger_precaching().await;
                }
            }
            Command::SetMaxPrecacheCount(requested) => {
                info!(
                    requested,
                    fixed = self.pool.max_count(),
                    "Precache bound is fixed at construction, ignoring"
                );
            }
            Command::MediaItemAt(index, reply) => {
                let _ = reply.send(self.queue.get(index).cloned());
            }
            Command::QueryPosition(reply) => {
                let position = self.current_position().await;
                let _ = reply.send(position);
            }
            Command::QueryDuration(reply) => {
                let duration = self.duration().await;
                let _ = reply.send(duration);
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
            Command::Shutdown(ack) => return ControlFlow::Break(ack),
        }
        ControlFlow::Continue(())
    }

    // ------------------------------------------------------------------
    // Queue mutation
    // ------------------------------------------------------------------

    async fn set_media_item(&mut self, item: MediaItem) {
        self.queue.set_single(item);
        self.pool.invalidate_all().await;
        self.start_load(
            0,
            0,
            self.session.play_when_ready,
            TransitionReason::PlaylistChanged,
        )
        .await;
    }

    async fn add_media_item(&mut self, item: MediaItem) {
        match self.queue.append(item) {
            CursorEffect::Selected => {
                self.start_load(
                    0,
                    0,
                    self.session.play_when_ready,
                    TransitionReason::PlaylistChanged,
                )
                .await
            }
            _ => self.trigger_precaching().await,
        }
    }

    async fn add_media_item_at(&mut self, index: usize, item: MediaItem) {
        match self.queue.insert_at(index, item) {
            None => debug!(index, len = self.queue.len(), "Insert position out of range"),
            Some(CursorEffect::Selected) => {
                self.start_load(
                    0,
                    0,
                    self.session.play_when_ready,
                    TransitionReason::PlaylistChanged,
                )
                .await
            }
            Some(effect) => {
                self.follow_cursor(effect);
                self.refresh_pool().await;
            }
        }
    }

    async fn remove_media_item(&mut self, index: usize) {
        let Some((removed, effect)) = self.queue.remove_at(index) else {
            debug!(index, len = self.queue.len(), "Remove index out of range");
            return;
        };
        debug!(index, track = %removed.media_id, ?effect, "Removed media item");

        match effect {
            CursorEffect::CurrentRemoved {
                retargeted: Some(next),
            } => {
                self.pool.invalidate_all().await;
                self.start_load(
                    next,
                    0,
                    self.session.play_when_ready,
                    TransitionReason::PlaylistChanged,
                )
                .await;
            }
            CursorEffect::CurrentRemoved { retargeted: None } => self.halt().await,
            effect => {
                self.follow_cursor(effect);
                self.refresh_pool().await;
            }
        }
    }

    async fn move_media_item(&mut self, from: usize, to: usize) {
        match self.queue.move_item(from, to) {
            None => debug!(from, to, len = self.queue.len(), "Move out of range"),
            Some(effect) => {
                self.follow_cursor(effect);
                self.refresh_pool().await;
            }
        }
    }

    async fn replace_media_item(&mut self, index: usize, item: MediaItem) {
        if self.queue.replace_at(index, item).is_none() {
            debug!(index, len = self.queue.len(), "Replace index out of range");
            return;
        }

        if let Some(stale) = self.pool.take(index) {
            stale.dispose().await;
        }

        if self.queue.current_index() == Some(index) {
            let should_play = self.session.is_playing || self.session.play_when_ready;
            self.start_load(index, 0, should_play, TransitionReason::PlaylistChanged)
                .await;
        } else {
            self.trigger_precaching().await;
        }
    }

    async fn clear_media_items(&mut self) {
        self.queue.clear();
        self.halt().await;
    }

    /// Keep a pending load pointed at the item it was started for.
    fn follow_cursor(&mut self, effect: CursorEffect) {
        if let CursorEffect::Shifted { to, .. } = effect {
            if let Some(pending) = self.pending.as_mut() {
                pending.index = to;
            }
        }
    }

    /// Drop pool entries after indices moved, then warm again.
    async fn refresh_pool(&mut self) {
        let cursor = self.queue.current_index();
        self.pool.invalidate_except(cursor).await;
        // the entry at the cursor key belonged to another track before the shift
        if let Some(stale) = cursor.and_then(|index| self.pool.take(index)) {
            stale.dispose().await;
        }
        self.trigger_precaching().await;
    }

    /// Release everything and rest in `Idle`.
    async fn halt(&mut self) {
        self.cancel_pending();
        self.slot.clear().await;
        self.pool.invalidate_all().await;
        self.session.position_ms = 0;
        self.session.duration_ms = 0;
        self.set_loading(false);
        self.set_is_playing(false);
        self.set_state(PlaybackState::Idle);
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    async fn play(&mut self) {
        self.session.play_when_ready = true;
        if let Some(pending) = self.pending.as_mut() {
            pending.should_play = true;
            return;
        }

        let outcome = match self.slot.current() {
            Some(handle) => Some(handle.player().play().await),
            None => None,
        };
        match outcome {
            Some(Ok(())) => {
                self.set_state(PlaybackState::Playing);
                self.set_is_playing(true);
            }
            Some(Err(err)) => warn!(error = %err, "Backend refused play"),
            None => {
                if let Some(index) = self.queue.current_index() {
                    self.start_load(index, 0, true, TransitionReason::PlaylistChanged)
                        .await;
                }
            }
        }
    }

    async fn pause(&mut self) {
        self.session.play_when_ready = false;
        if let Some(pending) = self.pending.as_mut() {
            pending.should_play = false;
        } else if let Some(handle) = self.slot.current() {
            if let Err(err) = handle.player().pause().await {
                warn!(error = %err, "Backend refused pause");
            }
            if self.session.state == PlaybackState::Playing {
                self.set_state(PlaybackState::ReadyPaused);
            }
        }
        self.set_is_playing(false);
    }

    async fn stop(&mut self) {
        self.cancel_pending();
        if let Some(handle) = self.slot.current() {
            if let Err(err) = handle.player().stop().await {
                warn!(error = %err, "Backend refused stop");
            }
        }
        self.session.position_ms = 0;
        self.set_loading(false);
        self.set_is_playing(false);
        self.set_state(PlaybackState::Idle);
    }

    async fn prepare(&mut self) {
        if let Some(index) = self.queue.current_index() {
            self.start_load(index, 0, false, TransitionReason::PlaylistChanged)
                .await;
        }
    }

    async fn seek_to(&mut self, position_ms: i64) {
        let target = position_ms.max(0);
        if let Some(pending) = self.pending.as_mut() {
            pending.start_position_ms = target;
            return;
        }

        let Some(handle) = self.slot.current() else {
            debug!("Seek ignored without a current player");
            return;
        };
        match handle.player().seek(target).await {
            Ok(true) => self.session.position_ms = target,
            Ok(false) => warn!(position_ms = target, "Backend refused seek"),
            Err(err) => warn!(position_ms = target, error = %err, "Seek failed"),
        }
    }

    async fn seek_to_index(&mut self, index: usize, position_ms: i64) {
        if index >= self.queue.len() {
            debug!(index, len = self.queue.len(), "Seek index out of range");
            return;
        }
        let should_play = self.session.is_playing || self.session.play_when_ready;
        self.start_load(index, position_ms.max(0), should_play, TransitionReason::Seek)
            .await;
    }

    async fn set_playback_parameters(&mut self, parameters: PlaybackParameters) {
        self.session.parameters = parameters;
        if let Some(handle) = self.slot.current() {
            if let Err(err) = handle.player().set_rate(parameters.speed).await {
                warn!(speed = parameters.speed, error = %err, "Failed to apply playback rate");
            }
        }
    }

    async fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.session.volume = volume;
        if let Some(handle) = self.slot.current() {
            if let Err(err) = handle.player().set_volume(volume).await {
                warn!(volume, error = %err, "Failed to apply volume");
            }
        }
    }

    async fn current_position(&mut self) -> i64 {
        if let Some(handle) = self.slot.current() {
            let queried =
                tokio::time::timeout(self.settings.query_timeout(), handle.player().query_position())
                    .await;
            match queried {
                Ok(Ok(Some(position))) if position >= 0 => self.session.position_ms = position,
                Ok(Ok(_)) => {}
                Ok(Err(err)) => debug!(error = %err, "Position query failed"),
                Err(_) => debug!("Position query timed out"),
            }
        }
        self.session.position_ms
    }

    async fn duration(&mut self) -> i64 {
        if let Some(handle) = self.slot.current() {
            let queried =
                tokio::time::timeout(self.settings.query_timeout(), handle.player().query_duration())
                    .await;
            match queried {
                Ok(Ok(Some(duration))) if duration >= 0 => self.session.duration_ms = duration,
                Ok(Ok(_)) => {}
                Ok(Err(err)) => debug!(error = %err, "Duration query failed"),
                Err(_) => debug!("Duration query timed out"),
            }
        }
        self.session.duration_ms
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    #[instrument(skip(self), fields(generation = self.generation + 1))]
    async fn start_load(
        &mut self,
        index: usize,
        start_position_ms: i64,
        should_play: bool,
        reason: TransitionReason,
    ) {
        let Some(item) = self.queue.get(index).cloned() else {
            debug!(len = self.queue.len(), "Load index out of range");
            return;
        };
        self.queue.select(index);
        self.generation += 1;
        let generation = self.generation;

        // Silence the outgoing player so its end-of-stream cannot fire
        // mid-load. It is released when the replacement is installed.
        if let Some(current) = self.slot.current() {
            if let Err(err) = current.player().stop().await {
                debug!(error = %err, "Stopping outgoing player failed");
            }
        }

        let warmed = match self.pool.take(index) {
            Some(handle) if handle.track_uri() == item.uri => {
                debug!(player = %handle.id(), "Precache hit");
                Some(handle)
            }
            Some(stale) => {
                debug!(track = stale.track_uri(), "Discarding mismatched precache entry");
                stale.dispose().await;
                None
            }
            None => None,
        };

        self.pending = Some(PendingLoad {
            generation,
            index,
            start_position_ms,
            should_play,
            reason,
        });
        self.set_loading(true);
        self.set_state(PlaybackState::Loading);

        let factory = self.factory.clone();
        self.in_flight.push(
            async move {
                let result = match warmed {
                    Some(handle) => Ok(handle),
                    None => factory.open(&item).await,
                };
                Some(LoadFinished {
                    generation,
                    index,
                    result,
                })
            }
            .boxed(),
        );
    }

    async fn on_load_finished(&mut self, done: LoadFinished) {
        let live = matches!(
            &self.pending,
            Some(pending) if pending.generation == done.generation
        );
        if !live {
            debug!(
                generation = done.generation,
                index = done.index,
                current = self.generation,
                "Discarding stale load"
            );
            if let Ok(handle) = done.result {
                handle.dispose().await;
            }
            return;
        }

        let Some(pending) = self.pending.take() else {
            return;
        };

        if self.queue.current_index() != Some(pending.index) {
            // the queue moved under the load without a new one being issued
            if let Ok(handle) = done.result {
                handle.dispose().await;
            }
            if let Some(cursor) = self.queue.current_index() {
                self.start_load(
                    cursor,
                    pending.start_position_ms,
                    pending.should_play,
                    pending.reason,
                )
                .await;
            }
            return;
        }

        match done.result {
            Ok(handle) => self.activate(handle, pending).await,
            Err(err) => self.fail_load(err).await,
        }
    }

    async fn activate(&mut self, handle: PlayerHandle, pending: PendingLoad) {
        let player_id = handle.id();
        if let Some(released) = self.slot.install(handle).await {
            debug!(released = %released, installed = %player_id, "Swapped players");
        }

        if let Some(item) = self.queue.get(pending.index).cloned() {
            self.emit(PlaybackEvent::MediaItemTransition {
                item,
                index: pending.index,
                reason: pending.reason,
            });
        }

        self.session.position_ms = 0;
        self.session.duration_ms = 0;
        let play_result = {
            let Some(current) = self.slot.current() else {
                return;
            };
            let player = current.player();
            if let Err(err) = player.set_volume(self.session.volume).await {
                warn!(error = %err, "Failed to apply volume");
            }
            if let Err(err) = player.set_rate(self.session.parameters.speed).await {
                warn!(error = %err, "Failed to apply playback rate");
            }

            if pending.start_position_ms > 0 {
                let settle = self.settings.settle_delay();
                if !settle.is_zero() {
                    tokio::time::sleep(settle).await;
                }
                match player.seek(pending.start_position_ms).await {
                    Ok(true) => self.session.position_ms = pending.start_position_ms,
                    Ok(false) => warn!(position_ms = pending.start_position_ms, "Initial seek refused"),
                    Err(err) => warn!(error = %err, "Initial seek failed"),
                }
            }

            if let Ok(Ok(Some(duration))) =
                tokio::time::timeout(self.settings.query_timeout(), player.query_duration()).await
            {
                self.session.duration_ms = duration.max(0);
            }

            if pending.should_play {
                Some(player.play().await)
            } else {
                None
            }
        };

        self.set_loading(false);
        match play_result {
            Some(Ok(())) => {
                self.set_state(PlaybackState::Playing);
                self.set_is_playing(true);
            }
            Some(Err(err)) => {
                self.report_failure(PlaybackError::BackendRuntimeError {
                    code: crate::error::ERROR_CODE_BACKEND,
                    message: err.to_string(),
                });
                return;
            }
            None => {
                self.set_state(PlaybackState::ReadyPaused);
                self.set_is_playing(false);
            }
        }

        self.trigger_precaching().await;
    }

    async fn fail_load(&mut self, err: PlaybackError) {
        if err.is_transient() {
            warn!(error = %err, "Track could not be loaded");
        } else {
            error!(error = %err, "Failed to load track");
        }
        self.slot.clear().await;
        self.session.position_ms = 0;
        self.session.duration_ms = 0;
        self.set_loading(false);
        self.report_failure(err);
    }

    fn report_failure(&mut self, err: PlaybackError) {
        self.set_is_playing(false);
        self.set_state(PlaybackState::Error);
        self.emit(PlaybackEvent::PlayerError {
            error: err.to_player_error(),
        });
    }

    fn cancel_pending(&mut self) {
        if self.pending.take().is_some() {
            self.generation += 1;
        }
    }

    // ------------------------------------------------------------------
    // Precaching
    // ------------------------------------------------------------------

    /// Prune pool entries that are no longer upcoming and warm the rest.
    ///
    /// Targets are reserved here, before the warm pass is queued, so an
    /// invalidation or a `take` issued while the pass sleeps between loads
    /// cancels the targets it has not reached.
    async fn trigger_precaching(&mut self) {
        if !self.pool.is_enabled() {
            return;
        }

        let upcoming = self
            .queue
            .upcoming(self.session.repeat_mode, self.pool.max_count());
        self.pool.retain_only(&upcoming).await;

        let targets: Vec<WarmTarget> = upcoming
            .into_iter()
            .filter_map(|index| {
                let item = self.queue.get(index)?.clone();
                let epoch = self.pool.reserve(index)?;
                Some(WarmTarget { index, epoch, item })
            })
            .collect();
        if targets.is_empty() {
            return;
        }

        debug!(
            targets = ?targets.iter().map(|target| target.index).collect::<Vec<_>>(),
            "Scheduling precache"
        );
        let pass = Arc::clone(&self.pool).warm_indices(
            self.factory.clone(),
            targets,
            self.settings.precache_stagger(),
        );
        self.in_flight.push(pass.map(|()| None).boxed());
    }

    // ------------------------------------------------------------------
    // Backend events
    // ------------------------------------------------------------------

    async fn on_backend_event(&mut self, event: BackendEvent) {
        if !self.slot.is_current(event.player) {
            trace!(player = %event.player, event = ?event.event, "Ignoring event from non-current player");
            return;
        }

        match event.event {
            // The controller drives these transitions itself when it issues
            // play/pause; echoing them back would race queued commands.
            PlayerEvent::Ready | PlayerEvent::Playing | PlayerEvent::Paused => {
                trace!(event = ?event.event, "Backend state confirmation");
            }
            PlayerEvent::Buffering { percent } => self.set_loading(percent < 100),
            PlayerEvent::Ended => {
                if self.pending.is_some() {
                    debug!("Ignoring end of stream while a load is pending");
                    return;
                }
                self.on_track_ended().await;
            }
            PlayerEvent::Error { code, message } => {
                if self.pending.is_some() {
                    debug!(code, "Ignoring error from outgoing player");
                    return;
                }
                error!(code, %message, "Backend runtime error");
                self.report_failure(PlaybackError::BackendRuntimeError { code, message });
            }
        }
    }

    async fn on_track_ended(&mut self) {
        self.set_state(PlaybackState::Ended);
        let Some(cursor) = self.queue.current_index() else {
            return;
        };

        match self.session.repeat_mode {
            RepeatMode::One => {
                self.start_load(cursor, 0, true, TransitionReason::Repeat)
                    .await
            }
            mode if self.queue.has_next(mode) => {
                let next = self.queue.next_index(mode).unwrap_or(cursor);
                self.start_load(next, 0, true, TransitionReason::Auto).await
            }
            _ => self.exhaust().await,
        }
    }

    /// Last track ended with repeat off.
    async fn exhaust(&mut self) {
        info!("Playlist exhausted");
        self.emit(PlaybackEvent::PlaylistExhausted);
        if !self.set_is_playing(false) && self.equalizer_intents {
            self.emit(PlaybackEvent::EqualizerIntent { open: false });
        }
        self.slot.clear().await;
        self.pool.invalidate_all().await;
        self.set_state(PlaybackState::Idle);
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    fn emit(&self, event: PlaybackEvent) {
        debug!(event = %event.description(), "Dispatching playback event");
        self.listeners.dispatch(&event);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.session.state != state {
            self.session.state = state;
            self.emit(PlaybackEvent::PlaybackStateChanged { state });
        }
    }

    /// Returns whether the value changed.
    fn set_is_playing(&mut self, is_playing: bool) -> bool {
        if self.session.is_playing == is_playing {
            return false;
        }
        self.session.is_playing = is_playing;
        self.emit(PlaybackEvent::IsPlayingChanged { is_playing });
        if self.equalizer_intents {
            self.emit(PlaybackEvent::EqualizerIntent { open: is_playing });
        }
        true
    }

    fn set_loading(&mut self, is_loading: bool) {
        if self.session.is_loading != is_loading {
            self.session.is_loading = is_loading;
            self.emit(PlaybackEvent::IsLoadingChanged { is_loading });
        }
    }

    fn publish_snapshot(&self) {
        let mode = self.session.repeat_mode;
        let buffered_percentage = if !self.slot.is_empty() && self.session.duration_ms > 0 {
            100
        } else {
            0
        };
        let next = EngineSnapshot {
            state: self.session.state,
            is_playing: self.session.is_playing,
            play_when_ready: self.session.play_when_ready,
            is_loading: self.session.is_loading,
            current_index: self.queue.current_index(),
            current_item: self.queue.current().cloned(),
            item_count: self.queue.len(),
            repeat_mode: mode,
            shuffle_enabled: self.session.shuffle_enabled,
            volume: self.session.volume,
            parameters: self.session.parameters,
            position_ms: self.session.position_ms,
            duration_ms: self.session.duration_ms,
            buffered_percentage,
            has_next: self.queue.has_next(mode),
            has_previous: self.queue.has_previous(mode),
            precaching_enabled: self.pool.is_enabled(),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    async fn shutdown(&mut self) {
        info!("Shutting down playback controller");
        self.cancel_pending();
        self.pool.set_enabled(false).await;
        if !self.slot.is_empty() {
            self.set_is_playing(false);
            self.set_state(PlaybackState::Idle);
        }
        self.slot.clear().await;

        // Reservations are gone, so warm passes only finish the load they are
        // in; every player that still comes back is released.
        while let Some(work) = self.in_flight.next().await {
            if let Some(LoadFinished { result: Ok(handle), .. }) = work {
                handle.dispose().await;
            }
        }
        self.listeners.clear();
    }
}
