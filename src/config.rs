// Environment configuration
//
// Both binaries load `.env` through dotenv and then read `OFFICE_*`
// variables, falling back to defaults for anything unset.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::animation::engine::DEFAULT_FRAME_RATE;
use crate::hub::{DEFAULT_HISTORY_CAPACITY, DEFAULT_SUBSCRIBER_BUFFER};
use crate::sync::SyncOptions;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Settings of the hub server
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    pub bind_addr: SocketAddr,
    pub history_capacity: usize,
    pub subscriber_buffer: usize,
    /// Run the office simulation in-process
    pub simulate: bool,
    /// How long a simulated agent works before completing
    pub work_duration: Duration,
    /// Postgres for the office snapshot; in-memory when unset
    pub database_url: Option<String>,
    /// Forward simulated transitions to a remote hub instead of this one
    pub publish_url: Option<String>,
}

impl HubConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: parse_or(&lookup, "OFFICE_BIND_ADDR", default_bind_addr())?,
            history_capacity: parse_or(
                &lookup,
                "OFFICE_HISTORY_CAPACITY",
                DEFAULT_HISTORY_CAPACITY,
            )?,
            subscriber_buffer: parse_or(
                &lookup,
                "OFFICE_SUBSCRIBER_BUFFER",
                DEFAULT_SUBSCRIBER_BUFFER,
            )?,
            simulate: flag(&lookup, "OFFICE_SIMULATE")?,
            work_duration: millis_or(&lookup, "OFFICE_WORK_DURATION_MS", 10_000)?,
            database_url: non_empty(&lookup, "DATABASE_URL"),
            publish_url: non_empty(&lookup, "OFFICE_PUBLISH_URL"),
        })
    }
}

/// Settings of the viewer
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub ws_url: String,
    /// Full URL of the agent status endpoint
    pub rest_url: String,
    pub frame_rate: u32,
    pub options: SyncOptions,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = SyncOptions::default();
        let probe_ms: u64 = parse_or(&lookup, "OFFICE_RECONNECT_PROBE_MS", 60_000)?;

        let options = SyncOptions {
            max_retries: parse_or(&lookup, "OFFICE_MAX_RETRIES", defaults.max_retries)?,
            retry_delay: millis_or(&lookup, "OFFICE_RETRY_DELAY_MS", 1000)?,
            poll_interval: millis_or(&lookup, "OFFICE_POLL_INTERVAL_MS", 1000)?,
            ping_interval: millis_or(&lookup, "OFFICE_PING_INTERVAL_MS", 30_000)?,
            reconnect_probe: (probe_ms > 0).then(|| Duration::from_millis(probe_ms)),
            ..defaults
        };

        let frame_rate: u32 = parse_or(&lookup, "OFFICE_FRAME_RATE", DEFAULT_FRAME_RATE)?;
        if frame_rate == 0 {
            return Err(ConfigError::Invalid {
                key: "OFFICE_FRAME_RATE",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            ws_url: non_empty(&lookup, "OFFICE_WS_URL")
                .unwrap_or_else(|| "ws://localhost:3000/ws".to_string()),
            rest_url: non_empty(&lookup, "OFFICE_REST_URL")
                .unwrap_or_else(|| "http://localhost:3000/api/agent-status".to_string()),
            frame_rate,
            options,
        })
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match non_empty(lookup, key) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// Milliseconds, at least 1
fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    let ms: u64 = parse_or(lookup, key, default_ms)?;
    if ms == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match non_empty(lookup, key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(value) => Err(ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn hub_defaults() {
        let config = HubConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.history_capacity, 100);
        assert!(!config.simulate);
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn hub_overrides() {
        let config = HubConfig::from_lookup(lookup(&[
            ("OFFICE_BIND_ADDR", "127.0.0.1:8080"),
            ("OFFICE_SIMULATE", "true"),
            ("DATABASE_URL", "postgres://localhost/office"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert!(config.simulate);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/office"));
    }

    #[test]
    fn sync_defaults_match_client_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.options, SyncOptions::default());
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.ws_url, "ws://localhost:3000/ws");
    }

    #[test]
    fn zero_probe_disables_reconnect_probe() {
        let config =
            SyncConfig::from_lookup(lookup(&[("OFFICE_RECONNECT_PROBE_MS", "0")])).unwrap();
        assert_eq!(config.options.reconnect_probe, None);
    }

    #[test]
    fn bad_values_are_reported() {
        let err = SyncConfig::from_lookup(lookup(&[("OFFICE_MAX_RETRIES", "many")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "OFFICE_MAX_RETRIES",
                value: "many".to_string()
            }
        );
        assert!(SyncConfig::from_lookup(lookup(&[("OFFICE_POLL_INTERVAL_MS", "0")])).is_err());
        assert!(HubConfig::from_lookup(lookup(&[("OFFICE_SIMULATE", "maybe")])).is_err());
    }
}
