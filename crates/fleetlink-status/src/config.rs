//! Coordinator and heartbeat settings.

use fleetlink_core::constants::{
    DEFAULT_BATCH_CHUNK_SIZE, DEFAULT_HEARTBEAT_TIMEOUT_SECS, DEFAULT_STATUS_CACHE_TTL_SECS,
    DEFAULT_SWEEP_INTERVAL_SECS, STATUS_CACHE_PREFIX, STATUS_CHANGE_CHANNEL,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Device status coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Lifetime of cached status records.
    pub cache_ttl_secs: u64,
    /// Rows per `save_many` call in batch updates.
    pub batch_chunk_size: usize,
    pub cache_prefix: String,
    pub change_channel: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_STATUS_CACHE_TTL_SECS,
            batch_chunk_size: DEFAULT_BATCH_CHUNK_SIZE,
            cache_prefix: STATUS_CACHE_PREFIX.to_string(),
            change_channel: STATUS_CHANGE_CHANNEL.to_string(),
        }
    }
}

impl StatusConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Cache key for a device: `<prefix><device id>`.
    pub fn cache_key(&self, device_id: &str) -> String {
        format!("{}{}", self.cache_prefix, device_id)
    }
}

/// Heartbeat sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    /// Online devices silent for longer than this are marked offline.
    pub timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: DEFAULT_HEARTBEAT_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl HeartbeatConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StatusConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.batch_chunk_size, 100);
        assert_eq!(config.cache_key("CAM001"), "fleetlink:device:status:CAM001");
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = HeartbeatConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
