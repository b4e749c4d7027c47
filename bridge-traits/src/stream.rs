//! Stream URL resolution capability.
//!
//! Track references carry an opaque identifier; turning that identifier into
//! a URL a backend can open is the job of the host's streaming client. Signed
//! stream URLs expire and can be revoked early, so the contract exposes the
//! three steps separately and lets the core decide the fallback order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::Result, platform::PlatformSendSync};

/// A previously fetched stream format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFormat {
    /// Playable URL.
    pub url: String,
    /// Instant after which the URL must not be used.
    pub expires_at: DateTime<Utc>,
}

impl CachedFormat {
    pub fn new(url: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            expires_at,
        }
    }

    /// Whether the format is still inside its validity window at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Maps a track identifier to a playable URL.
#[async_trait::async_trait]
pub trait StreamResolver: PlatformSendSync {
    /// Look up a stored format for `track_id`, whether or not it has expired.
    async fn resolve_cached_format(&self, track_id: &str) -> Result<Option<CachedFormat>>;

    /// Probe `url` and report whether the server rejects it (HTTP 403 class).
    async fn check_url_rejected(&self, url: &str) -> Result<bool>;

    /// Resolve a fresh URL for `track_id`.
    async fn resolve_fresh(&self, track_id: &str) -> Result<Option<String>>;
}
