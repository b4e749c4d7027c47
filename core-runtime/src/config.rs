//! # Core Configuration Module
//!
//! Collects the host capabilities the playback engine needs before it can
//! start.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every bridge implementation plus the feature switches. It fails
//! fast: a missing required capability is reported from `build()` with an
//! actionable message instead of surfacing later as a silent no-op.
//!
//! ## Required Dependencies
//!
//! - `PlayerBackend` - Creates native single-track players
//! - `StreamResolver` - Turns track identifiers into playable URLs
//!
//! ## Optional Dependencies
//!
//! - `Clock` - Time source for URL expiry checks (default: `SystemClock`)
//! - `LoggerSink` - Host logging pipeline, picked up by
//!   `LoggingConfig::with_core_config` before `logging::init_logging`
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .player_backend(Arc::new(GstBackend::new()))
//!     .stream_resolver(Arc::new(YtStreamResolver::new(client)))
//!     .enable_precaching(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics: no player backend or stream resolver was provided
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, LoggerSink, PlayerBackend, StreamResolver, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Host capabilities and feature switches for the playback engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Factory for native single-track players (required)
    pub player_backend: Arc<dyn PlayerBackend>,

    /// Stream URL lookup (required)
    pub stream_resolver: Arc<dyn StreamResolver>,

    /// Time source used to judge cached URL expiry
    pub clock: Arc<dyn Clock>,

    /// Host logging pipeline (optional)
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("player_backend", &self.player_backend.name())
            .field("stream_resolver", &"StreamResolver { ... }")
            .field("clock", &"Clock { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("features", &self.features)
            .finish()
    }
}

/// Feature switches for optional engine behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Keep upcoming tracks loaded in paused players.
    #[serde(default = "default_true")]
    pub enable_precaching: bool,

    /// Emit equalizer open/close intents so the host can manage an audio
    /// effect session.
    #[serde(default = "default_true")]
    pub enable_equalizer_intent: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_precaching: true,
            enable_equalizer_intent: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// The backend name is used as the log target for every player event, so
    /// an empty name is rejected.
    pub fn validate(&self) -> Result<()> {
        if self.player_backend.name().trim().is_empty() {
            return Err(Error::Config(
                "PlayerBackend::name() must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn player_backend_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PlayerBackend".to_string(),
        message: "A PlayerBackend implementation is required to create native players. \
                 Desktop: inject the GStreamer or VLC adapter. \
                 Mobile: inject the platform media player adapter."
            .to_string(),
    }
}

fn stream_resolver_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "StreamResolver".to_string(),
        message: "A StreamResolver implementation is required to turn track identifiers \
                 into playable URLs. Inject the streaming client adapter."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    player_backend: Option<Arc<dyn PlayerBackend>>,
    stream_resolver: Option<Arc<dyn StreamResolver>>,
    clock: Option<Arc<dyn Clock>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the player backend (required).
    pub fn player_backend(mut self, backend: Arc<dyn PlayerBackend>) -> Self {
        self.player_backend = Some(backend);
        self
    }

    /// Sets the stream resolver (required).
    pub fn stream_resolver(mut self, resolver: Arc<dyn StreamResolver>) -> Self {
        self.stream_resolver = Some(resolver);
        self
    }

    /// Sets the clock. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the host logger sink.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Enables or disables precaching.
    ///
    /// Default: true
    pub fn enable_precaching(mut self, enabled: bool) -> Self {
        self.features.enable_precaching = enabled;
        self
    }

    /// Enables or disables equalizer intents.
    ///
    /// Default: true
    pub fn enable_equalizer_intent(mut self, enabled: bool) -> Self {
        self.features.enable_equalizer_intent = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] when the player backend or stream
    /// resolver was not provided, and [`Error::Config`] when validation fails.
    pub fn build(self) -> Result<CoreConfig> {
        let player_backend = self
            .player_backend
            .ok_or_else(player_backend_missing_error)?;

        let stream_resolver = self
            .stream_resolver
            .ok_or_else(stream_resolver_missing_error)?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let config = CoreConfig {
            player_backend,
            stream_resolver,
            clock,
            logger_sink: self.logger_sink,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        CachedFormat, ConsoleLogger, FixedClock, LogLevel, PlayerEventSink, SingleTrackPlayer,
    };
    use crate::logging::LoggingConfig;
    use bridge_traits::BridgeError;

    struct NamedBackend(&'static str);

    #[async_trait]
    impl PlayerBackend for NamedBackend {
        fn name(&self) -> &str {
            self.0
        }

        async fn create_player(
            &self,
            _events: PlayerEventSink,
        ) -> BridgeResult<Box<dyn SingleTrackPlayer>> {
            Err(BridgeError::NotAvailable("test backend".to_string()))
        }
    }

    struct NullResolver;

    #[async_trait]
    impl StreamResolver for NullResolver {
        async fn resolve_cached_format(
            &self,
            _track_id: &str,
        ) -> BridgeResult<Option<CachedFormat>> {
            Ok(None)
        }

        async fn check_url_rejected(&self, _url: &str) -> BridgeResult<bool> {
            Ok(false)
        }

        async fn resolve_fresh(&self, _track_id: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .player_backend(Arc::new(NamedBackend("fake")))
            .stream_resolver(Arc::new(NullResolver))
    }

    #[test]
    fn test_builder_requires_player_backend() {
        let result = CoreConfig::builder()
            .stream_resolver(Arc::new(NullResolver))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "PlayerBackend")
            }
            other => panic!("expected missing backend, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_requires_stream_resolver() {
        let result = CoreConfig::builder()
            .player_backend(Arc::new(NamedBackend("fake")))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "StreamResolver")
            }
            other => panic!("expected missing resolver, got {:?}", other),
        }
    }

    #[test]
    fn test_logger_sink_reaches_logging_config() {
        let config = complete_builder()
            .logger_sink(Arc::new(ConsoleLogger {
                min_level: LogLevel::Trace,
            }))
            .build()
            .unwrap();

        let logging = LoggingConfig::default().with_core_config(&config);
        let sink = logging.logger_sink.expect("sink taken from core config");
        assert_eq!(sink.min_level(), LogLevel::Trace);

        let bare = complete_builder().build().unwrap();
        assert!(LoggingConfig::default()
            .with_core_config(&bare)
            .logger_sink
            .is_none());
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.player_backend.name(), "fake");
        assert!(config.logger_sink.is_none());
        assert_eq!(config.features, FeatureFlags::default());
    }

    #[test]
    fn test_builder_uses_injected_clock() {
        let instant = chrono::Utc::now() - chrono::Duration::days(1);
        let config = complete_builder()
            .clock(Arc::new(FixedClock(instant)))
            .build()
            .unwrap();

        assert_eq!(config.clock.now(), instant);
    }

    #[test]
    fn test_validate_rejects_unnamed_backend() {
        let result = CoreConfig::builder()
            .player_backend(Arc::new(NamedBackend("  ")))
            .stream_resolver(Arc::new(NullResolver))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_with_feature_flags() {
        let config = complete_builder()
            .enable_precaching(false)
            .enable_equalizer_intent(false)
            .build()
            .unwrap();

        assert!(!config.features.enable_precaching);
        assert!(!config.features.enable_equalizer_intent);
    }

    #[test]
    fn test_feature_flags_deserialize_with_defaults() {
        let flags: FeatureFlags = serde_json::from_str(r#"{"enable_precaching": false}"#).unwrap();

        assert!(!flags.enable_precaching);
        assert!(flags.enable_equalizer_intent);
    }

    #[test]
    fn test_debug_hides_capabilities() {
        let config = complete_builder().build().unwrap();
        let rendered = format!("{:?}", config);

        assert!(rendered.contains("\"fake\""));
        assert!(rendered.contains("StreamResolver { ... }"));
    }
}
