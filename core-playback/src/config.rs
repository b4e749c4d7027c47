//! # Engine Settings
//!
//! Tunables for the playback engine. Host capabilities live in
//! `core_runtime::config::CoreConfig`; this type only holds numbers and
//! switches, so it can be deserialized from a settings file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Number of upcoming indices kept warm in the precache pool.
    ///
    /// Fixed for the lifetime of an engine.
    ///
    /// Default: 1.
    #[serde(default = "default_max_precache_count")]
    pub max_precache_count: usize,

    /// Whether precaching starts enabled.
    ///
    /// Default: true.
    #[serde(default = "default_precache_enabled")]
    pub precache_enabled: bool,

    /// Pause between two warm loads, so warming never competes with the
    /// current track for bandwidth in bursts.
    ///
    /// Default: 100 ms.
    #[serde(default = "default_precache_stagger_ms")]
    pub precache_stagger_ms: u64,

    /// Wait after a player becomes current before issuing a start seek.
    ///
    /// Default: 100 ms.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Offset used by `seek_back` / `seek_forward`.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_seek_increment_ms")]
    pub seek_increment_ms: i64,

    /// Upper bound for a single backend position/duration query.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Upper bound for each stream resolver call.
    ///
    /// Default: 15 seconds.
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,

    /// Capacity of the backend event channel.
    ///
    /// Default: 256.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Volume applied before the first `set_volume` call.
    ///
    /// Default: 1.0.
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_precache_count: default_max_precache_count(),
            precache_enabled: default_precache_enabled(),
            precache_stagger_ms: default_precache_stagger_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            seek_increment_ms: default_seek_increment_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            event_capacity: default_event_capacity(),
            initial_volume: default_initial_volume(),
        }
    }
}

impl EngineSettings {
    /// Settings for hosts on fast local backends.
    ///
    /// - Two tracks warmed ahead
    /// - No stagger or settle delay
    /// - Short query timeout
    pub fn low_latency() -> Self {
        Self {
            max_precache_count: 2,
            precache_stagger_ms: 0,
            settle_delay_ms: 0,
            query_timeout_ms: 200,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.seek_increment_ms <= 0 {
            return Err("seek_increment_ms must be > 0".to_string());
        }

        if self.query_timeout_ms == 0 {
            return Err("query_timeout_ms must be > 0".to_string());
        }

        if self.resolve_timeout_ms == 0 {
            return Err("resolve_timeout_ms must be > 0".to_string());
        }

        if self.event_capacity == 0 {
            return Err("event_capacity must be > 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err("initial_volume must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }

    pub fn precache_stagger(&self) -> Duration {
        Duration::from_millis(self.precache_stagger_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_max_precache_count() -> usize {
    1
}

fn default_precache_enabled() -> bool {
    true
}

fn default_precache_stagger_ms() -> u64 {
    100
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_seek_increment_ms() -> i64 {
    10_000
}

fn default_query_timeout_ms() -> u64 {
    500
}

fn default_resolve_timeout_ms() -> u64 {
    15_000
}

fn default_event_capacity() -> usize {
    256
}

fn default_initial_volume() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.max_precache_count, 1);
        assert!(settings.precache_enabled);
        assert_eq!(settings.settle_delay(), Duration::from_millis(100));
        assert_eq!(settings.seek_increment_ms, 10_000);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(EngineSettings::low_latency().validate().is_ok());
        assert_eq!(EngineSettings::low_latency().max_precache_count, 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let settings = EngineSettings {
            initial_volume: 1.5,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = EngineSettings {
            event_capacity: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{"max_precache_count": 3, "settle_delay_ms": 0}"#).unwrap();

        assert_eq!(settings.max_precache_count, 3);
        assert_eq!(settings.settle_delay(), Duration::ZERO);
        assert_eq!(settings.resolve_timeout(), Duration::from_secs(15));
    }
}
