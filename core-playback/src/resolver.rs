//! # Stream URL Resolution
//!
//! Wraps the host [`StreamResolver`] with the lookup order the engine relies
//! on:
//!
//! 1. A cached format, if it has not expired and a liveness probe does not
//!    report it as rejected.
//! 2. A fresh resolution.
//!
//! Every host call is bounded by the configured resolve timeout. A probe that
//! fails or times out counts as "rejected", because playing a revoked URL
//! fails later and more expensively than resolving again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{BridgeError, Clock, StreamResolver};
use core_runtime::logging::redact_if_sensitive;
use tracing::{debug, instrument, warn};

use crate::error::{PlaybackError, Result};

/// Resolver front-end shared by the controller and precache warm tasks.
#[derive(Clone)]
pub struct StreamUrlResolver {
    inner: Arc<dyn StreamResolver>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl StreamUrlResolver {
    pub fn new(inner: Arc<dyn StreamResolver>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            inner,
            clock,
            timeout,
        }
    }

    /// Resolve a playable URL for `track_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::ResolutionFailure`] when neither the cached
    /// format nor a fresh resolution yields a URL.
    #[instrument(skip(self))]
    pub async fn resolve(&self, track_id: &str) -> Result<String> {
        if let Some(url) = self.cached_url(track_id).await {
            debug!(url = %redact_if_sensitive("url", &url), "Using cached stream format");
            return Ok(url);
        }

        match self
            .bounded("resolve_fresh", self.inner.resolve_fresh(track_id))
            .await
        {
            Ok(Some(url)) => {
                debug!(url = %redact_if_sensitive("url", &url), "Resolved fresh stream");
                Ok(url)
            }
            Ok(None) => Err(PlaybackError::ResolutionFailure {
                track_id: track_id.to_string(),
                reason: "resolver returned no stream".to_string(),
            }),
            Err(err) => Err(PlaybackError::ResolutionFailure {
                track_id: track_id.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    async fn cached_url(&self, track_id: &str) -> Option<String> {
        let format = match self
            .bounded(
                "resolve_cached_format",
                self.inner.resolve_cached_format(track_id),
            )
            .await
        {
            Ok(Some(format)) => format,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "Cached format lookup failed");
                return None;
            }
        };

        if !format.is_live_at(self.clock.now()) {
            debug!(expires_at = %format.expires_at, "Cached stream format expired");
            return None;
        }

        match self
            .bounded("check_url_rejected", self.inner.check_url_rejected(&format.url))
            .await
        {
            Ok(false) => Some(format.url),
            Ok(true) => {
                debug!("Cached stream URL rejected by server");
                None
            }
            Err(err) => {
                warn!(error = %err, "Stream URL probe failed, treating as rejected");
                None
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = BridgeResult<T>>,
    ) -> BridgeResult<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| BridgeError::Timeout(operation.to_string()))?
    }
}
