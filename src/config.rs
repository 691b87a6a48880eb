use std::fs;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "portmapper.toml";

/// Registry configuration. Read-only after startup; every client and
/// registry gets its own copy at construction instead of sharing process
/// globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key-space prefix under which all service keys live.
    pub registry_root: String,
    /// etcd endpoints.
    pub endpoints: Vec<String>,
    /// Maximum attempts per store operation.
    pub max_retries: u32,
    /// Per-attempt deadline in seconds.
    pub request_timeout: u64,
    /// Seconds between heartbeat cycles.
    pub heartbeat_interval: u64,
    /// Optional ceiling in milliseconds on the exponential inter-attempt
    /// sleep. Absent by default: the sleep grows as `2^attempt` ms,
    /// uncapped, which reaches seconds by the final attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_backoff: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_root: "/registry".to_string(),
            endpoints: vec!["http://127.0.0.1:2379".to_string()],
            max_retries: 11,
            request_timeout: 5,
            heartbeat_interval: 60,
            max_backoff: None,
        }
    }
}

impl Config {
    /// Load configuration: `portmapper.toml` when present, then
    /// `PORTMAPPER_*` environment overrides on top.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let config = if let Ok(config_str) = fs::read_to_string(CONFIG_FILE) {
            toml::from_str(&config_str)?
        } else {
            Config::default()
        };

        Ok(config.with_env_overrides()?)
    }

    /// Configuration from `PORTMAPPER_*` environment variables alone.
    pub fn from_env() -> Result<Self, envy::Error> {
        Config::default().with_env_overrides()
    }

    // envy 只提供显式设置的字段，其余回填已有值
    fn with_env_overrides(self) -> Result<Self, envy::Error> {
        #[derive(Deserialize)]
        struct Overrides {
            registry_root: Option<String>,
            endpoints: Option<Vec<String>>,
            max_retries: Option<u32>,
            request_timeout: Option<u64>,
            heartbeat_interval: Option<u64>,
            max_backoff: Option<u64>,
        }

        let env: Overrides = envy::prefixed("PORTMAPPER_").from_env()?;
        Ok(Self {
            registry_root: env.registry_root.unwrap_or(self.registry_root),
            endpoints: env.endpoints.unwrap_or(self.endpoints),
            max_retries: env.max_retries.unwrap_or(self.max_retries),
            request_timeout: env.request_timeout.unwrap_or(self.request_timeout),
            heartbeat_interval: env.heartbeat_interval.unwrap_or(self.heartbeat_interval),
            max_backoff: env.max_backoff.or(self.max_backoff),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    /// Inter-attempt sleep before retry `attempt` (zero-based):
    /// `2^attempt` milliseconds, clamped by `max_backoff` when set.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let millis = 1u64 << attempt.min(63);
        match self.max_backoff {
            Some(cap) => Duration::from_millis(millis.min(cap)),
            None => Duration::from_millis(millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = Config::default();
        assert_eq!(config.registry_root, "/registry");
        assert_eq!(config.max_retries, 11);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(60));
        assert_eq!(config.max_backoff, None);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = Config::default();
        assert_eq!(config.backoff(0), Duration::from_millis(1));
        assert_eq!(config.backoff(1), Duration::from_millis(2));
        assert_eq!(config.backoff(10), Duration::from_millis(1024));
    }

    #[test]
    fn backoff_respects_cap() {
        let config = Config {
            max_backoff: Some(100),
            ..Config::default()
        };
        assert_eq!(config.backoff(10), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(4));
    }

    #[test]
    fn toml_round_trip() {
        let config = Config::default();
        let s = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&s).unwrap();
        assert_eq!(parsed.max_retries, config.max_retries);
        assert_eq!(parsed.registry_root, config.registry_root);
    }
}
