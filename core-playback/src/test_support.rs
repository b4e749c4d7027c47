//! Minimal player double for unit tests inside this crate.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{PlayerId, SingleTrackPlayer};
use parking_lot::Mutex;

use crate::loader::PlayerHandle;

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) struct RecordingPlayer {
    name: String,
    log: CallLog,
}

impl RecordingPlayer {
    fn record(&self, call: &str) {
        self.log.lock().push(format!("{}:{}", self.name, call));
    }
}

#[async_trait]
impl SingleTrackPlayer for RecordingPlayer {
    async fn load(&self, _uri: &str) -> BridgeResult<()> {
        self.record("load");
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play");
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause");
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record("stop");
        Ok(())
    }

    async fn seek(&self, _position_ms: i64) -> BridgeResult<bool> {
        self.record("seek");
        Ok(true)
    }

    async fn set_volume(&self, _volume: f32) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_rate(&self, _rate: f32) -> BridgeResult<()> {
        Ok(())
    }

    async fn query_position(&self) -> BridgeResult<Option<i64>> {
        Ok(None)
    }

    async fn query_duration(&self) -> BridgeResult<Option<i64>> {
        Ok(None)
    }

    async fn release(&self) -> BridgeResult<()> {
        self.record("release");
        Ok(())
    }
}

/// Handle whose player records `<name>:<call>` into `log`.
pub(crate) fn recording_handle(name: &str, log: &CallLog) -> PlayerHandle {
    PlayerHandle::new(
        PlayerId::new(),
        name,
        Box::new(RecordingPlayer {
            name: name.to_string(),
            log: Arc::clone(log),
        }),
    )
}
