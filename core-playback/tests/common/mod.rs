//! Shared fakes for the engine integration tests.
//!
//! `FakeBackend`, its players and `RecordingListener` all write into one
//! `Journal`, so tests can assert on the relative order of backend calls and
//! listener notifications.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, CachedFormat, PlayerBackend, PlayerEvent, PlayerEventSink, SingleTrackPlayer,
    StreamResolver,
};
use core_playback::{
    EngineSettings, EngineSnapshot, PlaybackEngine, PlaybackEvent, PlaybackListener,
};
use core_runtime::config::CoreConfig;
use parking_lot::Mutex;

pub const WAIT: Duration = Duration::from_secs(3);
pub const TRACK_DURATION_MS: i64 = 180_000;

// ============================================================================
// Journal
// ============================================================================

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|existing| existing == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|existing| *existing == entry).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|existing| existing.starts_with(prefix))
            .count()
    }

    /// Index of the first occurrence of `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|existing| existing == entry)
    }

    /// Index of the last occurrence of `entry`.
    pub fn last_position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().rposition(|existing| existing == entry)
    }
}

// ============================================================================
// Fake Backend
// ============================================================================

#[derive(Default)]
struct Script {
    load_delays: HashMap<String, Duration>,
    failing_loads: HashSet<String>,
}

struct PlayerRecord {
    uri: String,
    sink: PlayerEventSink,
    released: bool,
}

/// Backend whose players only record what they are asked to do.
///
/// Each player is labelled by the URL it loaded; [`FakeResolver`] resolves a
/// track id to itself, so labels are track ids.
#[derive(Default)]
pub struct FakeBackend {
    journal: Journal,
    script: Arc<Mutex<Script>>,
    players: Arc<Mutex<Vec<PlayerRecord>>>,
}

impl FakeBackend {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    /// Make loads of `uri` take `delay`.
    pub fn delay_load(&self, uri: &str, delay: Duration) {
        self.script.lock().load_delays.insert(uri.to_string(), delay);
    }

    /// Make loads of `uri` fail.
    pub fn fail_load(&self, uri: &str) {
        self.script.lock().failing_loads.insert(uri.to_string());
    }

    /// Number of players created but not yet released.
    pub fn live_players(&self) -> usize {
        self.players.lock().iter().filter(|p| !p.released).count()
    }

    fn sink_for(&self, uri: &str) -> PlayerEventSink {
        self.players
            .lock()
            .iter()
            .rev()
            .find(|p| !p.released && p.uri == uri)
            .map(|p| p.sink.clone())
            .unwrap_or_else(|| panic!("no live player for {uri}"))
    }

    /// Report end of stream from the live player of `uri`.
    pub async fn finish(&self, uri: &str) {
        self.sink_for(uri).emit(PlayerEvent::Ended).await.unwrap();
    }

    /// Report a runtime pipeline error from the live player of `uri`.
    pub async fn break_player(&self, uri: &str, code: i32, message: &str) {
        self.sink_for(uri)
            .emit(PlayerEvent::Error {
                code,
                message: message.to_string(),
            })
            .await
            .unwrap();
    }

    pub async fn buffering(&self, uri: &str, percent: u8) {
        self.sink_for(uri)
            .emit(PlayerEvent::Buffering { percent })
            .await
            .unwrap();
    }
}

#[async_trait]
impl PlayerBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_player(
        &self,
        sink: PlayerEventSink,
    ) -> BridgeResult<Box<dyn SingleTrackPlayer>> {
        Ok(Box::new(FakePlayer {
            sink,
            journal: self.journal.clone(),
            script: Arc::clone(&self.script),
            players: Arc::clone(&self.players),
            uri: Mutex::new(String::new()),
            position_ms: AtomicI64::new(0),
        }))
    }
}

struct FakePlayer {
    sink: PlayerEventSink,
    journal: Journal,
    script: Arc<Mutex<Script>>,
    players: Arc<Mutex<Vec<PlayerRecord>>>,
    uri: Mutex<String>,
    position_ms: AtomicI64,
}

impl FakePlayer {
    fn record(&self, call: &str) {
        let uri = self.uri.lock().clone();
        self.journal.record(format!("{call}:{uri}"));
    }
}

#[async_trait]
impl SingleTrackPlayer for FakePlayer {
    async fn load(&self, uri: &str) -> BridgeResult<()> {
        *self.uri.lock() = uri.to_string();
        self.record("load");

        let (delay, fails) = {
            let script = self.script.lock();
            (
                script.load_delays.get(uri).copied(),
                script.failing_loads.contains(uri),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            return Err(BridgeError::OperationFailed(format!("cannot load {uri}")));
        }

        self.players.lock().push(PlayerRecord {
            uri: uri.to_string(),
            sink: self.sink.clone(),
            released: false,
        });
        let _ = self.sink.try_emit(PlayerEvent::Ready);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play");
        let _ = self.sink.try_emit(PlayerEvent::Playing);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause");
        let _ = self.sink.try_emit(PlayerEvent::Paused);
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record("stop");
        self.position_ms.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn seek(&self, position_ms: i64) -> BridgeResult<bool> {
        self.record(&format!("seek@{position_ms}"));
        self.position_ms.store(position_ms, Ordering::SeqCst);
        Ok(true)
    }

    async fn set_volume(&self, _volume: f32) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_rate(&self, _rate: f32) -> BridgeResult<()> {
        Ok(())
    }

    async fn query_position(&self) -> BridgeResult<Option<i64>> {
        Ok(Some(self.position_ms.load(Ordering::SeqCst)))
    }

    async fn query_duration(&self) -> BridgeResult<Option<i64>> {
        Ok(Some(TRACK_DURATION_MS))
    }

    async fn release(&self) -> BridgeResult<()> {
        self.record("release");
        let player = self.sink.player_id();
        for record in self.players.lock().iter_mut() {
            if record.sink.player_id() == player {
                record.released = true;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Fake Resolver
// ============================================================================

/// Resolves every track id to itself, except the ones marked unresolvable.
#[derive(Default)]
pub struct FakeResolver {
    unresolvable: Mutex<HashSet<String>>,
}

impl FakeResolver {
    pub fn refuse(&self, track_id: &str) {
        self.unresolvable.lock().insert(track_id.to_string());
    }
}

#[async_trait]
impl StreamResolver for FakeResolver {
    async fn resolve_cached_format(&self, _track_id: &str) -> BridgeResult<Option<CachedFormat>> {
        Ok(None)
    }

    async fn check_url_rejected(&self, _url: &str) -> BridgeResult<bool> {
        Ok(false)
    }

    async fn resolve_fresh(&self, track_id: &str) -> BridgeResult<Option<String>> {
        if self.unresolvable.lock().contains(track_id) {
            return Ok(None);
        }
        Ok(Some(track_id.to_string()))
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Keeps every event and journals transitions as `transition:<uri>@<index>`.
#[derive(Clone)]
pub struct RecordingListener {
    journal: Journal,
    events: Arc<Mutex<Vec<PlaybackEvent>>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &PlaybackEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn position(&self, event: &PlaybackEvent) -> Option<usize> {
        self.events.lock().iter().position(|e| e == event)
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl PlaybackListener for RecordingListener {
    fn on_event(&self, event: &PlaybackEvent) {
        if let PlaybackEvent::MediaItemTransition { item, index, .. } = event {
            self.journal.record(format!("transition:{}@{}", item.uri, index));
        }
        self.events.lock().push(event.clone());
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: PlaybackEngine,
    pub backend: Arc<FakeBackend>,
    pub resolver: Arc<FakeResolver>,
    pub journal: Journal,
    pub listener: RecordingListener,
}

pub fn settings(precaching: bool) -> EngineSettings {
    EngineSettings {
        max_precache_count: 1,
        precache_enabled: precaching,
        ..EngineSettings::low_latency()
    }
}

pub fn start(precaching: bool) -> Harness {
    start_with(settings(precaching))
}

pub fn start_with(settings: EngineSettings) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("core_playback=debug")
        .with_test_writer()
        .try_init();

    let journal = Journal::default();
    let backend = Arc::new(FakeBackend::new(journal.clone()));
    let resolver = Arc::new(FakeResolver::default());
    let config = CoreConfig::builder()
        .player_backend(backend.clone())
        .stream_resolver(resolver.clone())
        .build()
        .unwrap();

    let engine = PlaybackEngine::start(&config, settings).unwrap();
    let listener = RecordingListener {
        journal: journal.clone(),
        events: Arc::default(),
    };
    engine.add_listener(Arc::new(listener.clone()));

    Harness {
        engine,
        backend,
        resolver,
        journal,
        listener,
    }
}

impl Harness {
    /// Queue `ids` and wait until the first one is playing.
    pub async fn play_queue(&self, ids: &[&str]) {
        let (first, rest) = ids.split_first().expect("at least one track");
        self.engine
            .set_media_item(core_playback::MediaItem::new(*first))
            .unwrap();
        for id in rest {
            self.engine
                .add_media_item(core_playback::MediaItem::new(*id))
                .unwrap();
        }
        self.wait_playing_at(0).await;
    }

    pub async fn wait_playing_at(&self, index: usize) -> EngineSnapshot {
        wait_for(&self.engine, &format!("playing at {index}"), |s| {
            s.current_index == Some(index)
                && s.state == core_playback::PlaybackState::Playing
        })
        .await
    }
}

/// Wait for a published snapshot matching `predicate`.
pub async fn wait_for(
    engine: &PlaybackEngine,
    what: &str,
    mut predicate: impl FnMut(&EngineSnapshot) -> bool,
) -> EngineSnapshot {
    let mut rx = engine.watch();
    let waited = tokio::time::timeout(WAIT, rx.wait_for(|snapshot| predicate(snapshot))).await;
    match waited {
        Ok(Ok(snapshot)) => snapshot.clone(),
        Ok(Err(_)) => panic!("engine stopped while waiting for {what}"),
        Err(_) => panic!(
            "timed out waiting for {what}; last snapshot: {:?}",
            engine.snapshot()
        ),
    }
}

/// Poll `condition` until it holds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
