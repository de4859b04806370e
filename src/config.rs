//! Operational constants for the engine. Everything has a sensible default
//! and can be overridden by the embedding application, e.g. from a
//! deserialized config file section.

use serde::Deserialize;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Tunables for sessions, the registry sweep, and the resolution cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Maximum number of entries a guild's queue may hold.
    pub max_queue_len: usize,

    /// Volume assigned to a guild that has never stored one.
    pub default_volume: u8,

    /// How long a cached track resolution is trusted before the background
    /// refresher revalidates it.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Period of the inactivity sweep that tears down abandoned sessions.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Overall deadline for a voice connection attempt.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// How often the connection state is polled while connecting.
    #[serde(with = "humantime_serde")]
    pub connect_poll: Duration,

    /// Period of the cache refresh loop.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// Pause between successive refreshes so the provider isn't burst.
    #[serde(with = "humantime_serde")]
    pub refresh_pace: Duration,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            max_queue_len: 300,
            default_volume: 100,
            cache_ttl: 30 * DAY,
            sweep_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            connect_poll: Duration::from_millis(100),
            refresh_interval: Duration::from_secs(60 * 60),
            refresh_pace: Duration::from_millis(250),
        }
    }
}
