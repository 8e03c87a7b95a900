//! Node configuration
//!
//! Loaded from a JSON file. Durations are human-readable strings such as
//! `"10s"` or `"500ms"`.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vouch_cache::{CacheConfig, CachePolicy};
use vouch_core::{KeyMode, VouchError, VouchResult};
use vouch_time::TickSchedule;
use vouch_transport::DEFAULT_PORT;

use crate::EngineConfig;

/// Cache policy as written in configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicyKind {
    #[default]
    RoundRobin,
    Hashed,
}

/// Deduplication key as written in configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyModeKind {
    #[default]
    Fields,
    Payload,
}

impl From<KeyModeKind> for KeyMode {
    fn from(kind: KeyModeKind) -> Self {
        match kind {
            KeyModeKind::Fields => KeyMode::Fields,
            KeyModeKind::Payload => KeyMode::Payload,
        }
    }
}

/// Full node configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// This node's id; must be nonzero
    pub node_id: u16,
    /// UDP bind address
    pub bind: SocketAddr,
    /// Addresses every broadcast is sent to
    pub neighbors: Vec<SocketAddr>,
    pub cache_capacity: usize,
    pub cache_policy: CachePolicyKind,
    /// Bucket count for the hashed policy
    pub hash_buckets: usize,
    pub key_mode: KeyModeKind,
    /// Maximum accepted record age
    #[serde(with = "opt_duration_str")]
    pub grace_period: Option<Duration>,
    #[serde(with = "duration_str")]
    pub send_interval: Duration,
    /// Total jitter span around `send_interval`
    #[serde(with = "duration_str")]
    pub jitter_window: Duration,
    /// Quiet period before the first origin message
    #[serde(with = "duration_str")]
    pub startup_delay: Duration,
    pub store_limit: Option<usize>,
    pub quorum: Option<usize>,
    /// Depth of the node event channel
    pub event_buffer: usize,
    /// Emit logs as JSON lines
    pub json_logs: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let schedule = TickSchedule::default();
        NodeConfig {
            node_id: 0,
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            neighbors: Vec::new(),
            cache_capacity: 16,
            cache_policy: CachePolicyKind::RoundRobin,
            hash_buckets: 64,
            key_mode: KeyModeKind::Fields,
            grace_period: None,
            send_interval: schedule.interval,
            jitter_window: schedule.jitter,
            startup_delay: schedule.startup_delay,
            store_limit: None,
            quorum: None,
            event_buffer: 1024,
            json_logs: false,
        }
    }
}

impl NodeConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> VouchResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VouchError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> VouchResult<Self> {
        serde_json::from_str(text).map_err(|e| VouchError::InvalidConfig(e.to_string()))
    }

    /// Check for values the node cannot run with
    pub fn validate(&self) -> VouchResult<()> {
        if self.node_id == 0 {
            return Err(VouchError::InvalidConfig(
                "node_id must be nonzero".to_string(),
            ));
        }
        if self.cache_policy == CachePolicyKind::Hashed && self.hash_buckets == 0 {
            return Err(VouchError::InvalidConfig(
                "hash_buckets must be nonzero for the hashed policy".to_string(),
            ));
        }
        if self.send_interval.is_zero() {
            return Err(VouchError::InvalidConfig(
                "send_interval must be nonzero".to_string(),
            ));
        }
        let jitter_limit = self.send_interval.checked_mul(2).unwrap_or(Duration::MAX);
        if self.jitter_window > jitter_limit {
            return Err(VouchError::InvalidConfig(format!(
                "jitter_window {} exceeds twice send_interval {}",
                humantime::format_duration(self.jitter_window),
                humantime::format_duration(self.send_interval)
            )));
        }
        if self.event_buffer == 0 {
            return Err(VouchError::InvalidConfig(
                "event_buffer must be nonzero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        let grace = self.grace_period.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        let policy = match self.cache_policy {
            CachePolicyKind::RoundRobin => CachePolicy::RoundRobin,
            CachePolicyKind::Hashed => CachePolicy::Hashed {
                buckets: self.hash_buckets,
            },
        };

        EngineConfig {
            cache: CacheConfig {
                capacity: self.cache_capacity,
                policy,
                grace,
            },
            grace_period: grace,
            key_mode: self.key_mode.into(),
            store_limit: self.store_limit,
            quorum: self.quorum,
        }
    }

    pub fn tick_schedule(&self) -> TickSchedule {
        TickSchedule::new(self.send_interval, self.jitter_window)
            .with_startup_delay(self.startup_delay)
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

mod opt_duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.collect_str(&humantime::format_duration(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => humantime::parse_duration(&text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
