//! Configuration module - environment variable parsing

use std::env;
use std::path::PathBuf;

use crate::util::time::Millis;

/// Default periodic probe interval (5 minutes)
const DEFAULT_PROBE_INTERVAL_MS: u64 = 300_000;
/// Default delay before periodic probing starts
const DEFAULT_PROBE_START_DELAY_MS: u64 = 10_000;
const DEFAULT_FRAME_RATE_HZ: u32 = 60;
/// Highest render rate accepted from the environment
const MAX_FRAME_RATE_HZ: u32 = 1000;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// WebSocket URL of the sea server
    pub server_url: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Terrain image whose alpha channel gives solidity; open water if unset
    pub density_map: Option<PathBuf>,
    /// Settings for the prediction session
    pub session: SessionConfig,
}

/// Settings the session needs at runtime
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Id of the locally controlled entity
    pub entity_id: String,
    /// Periodic echo probe interval; `None` disables periodic probing
    pub probe_interval: Option<Millis>,
    /// How long after start to turn periodic probing on
    pub probe_start_delay: Millis,
    /// Render frames per second
    pub frame_rate_hz: u32,
}

impl SessionConfig {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            probe_interval: Some(DEFAULT_PROBE_INTERVAL_MS as Millis),
            probe_start_delay: DEFAULT_PROBE_START_DELAY_MS as Millis,
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_url =
            env::var("SERVER_URL").map_err(|_| ConfigError::Missing("SERVER_URL"))?;
        let entity_id = env::var("ENTITY_ID").map_err(|_| ConfigError::Missing("ENTITY_ID"))?;

        let probe_interval_ms: u64 = parse_or("PROBE_INTERVAL_MS", DEFAULT_PROBE_INTERVAL_MS)?;
        let probe_start_delay_ms: u64 =
            parse_or("PROBE_START_DELAY_MS", DEFAULT_PROBE_START_DELAY_MS)?;
        let frame_rate_hz = check_frame_rate(parse_or("FRAME_RATE_HZ", DEFAULT_FRAME_RATE_HZ)?)?;

        Ok(Self {
            server_url,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            density_map: env::var("DENSITY_MAP").ok().map(PathBuf::from),
            session: SessionConfig {
                entity_id,
                // Zero turns periodic probing off
                probe_interval: (probe_interval_ms > 0).then_some(probe_interval_ms as Millis),
                probe_start_delay: probe_start_delay_ms as Millis,
                frame_rate_hz,
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn check_frame_rate(rate_hz: u32) -> Result<u32, ConfigError> {
    if (1..=MAX_FRAME_RATE_HZ).contains(&rate_hz) {
        Ok(rate_hz)
    } else {
        Err(ConfigError::Invalid("FRAME_RATE_HZ"))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_defaults() {
        let cfg = SessionConfig::new("ship-1");
        assert_eq!(cfg.entity_id, "ship-1");
        assert_eq!(cfg.probe_interval, Some(300_000.0));
        assert_eq!(cfg.probe_start_delay, 10_000.0);
        assert_eq!(cfg.frame_rate_hz, 60);
    }

    #[test]
    fn frame_rate_must_be_sensible() {
        assert!(matches!(check_frame_rate(0), Err(ConfigError::Invalid("FRAME_RATE_HZ"))));
        assert!(matches!(
            check_frame_rate(2_000_000),
            Err(ConfigError::Invalid("FRAME_RATE_HZ"))
        ));
        assert_eq!(check_frame_rate(1).ok(), Some(1));
        assert_eq!(check_frame_rate(MAX_FRAME_RATE_HZ).ok(), Some(MAX_FRAME_RATE_HZ));
    }
}
