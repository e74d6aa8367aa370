//! Signing and tunnel policy knobs.
//!
//! Defaults mirror the constraints of a free developer account: two
//! development certificates per machine name, a seven day certificate
//! lifetime, and a refresh pass every five days so the certificate is
//! renewed with two days of margin left.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SigningPolicy {
    /// Maximum certificates the account may hold for one machine class.
    pub certificate_quota: usize,
    /// How long a freshly issued certificate is considered valid.
    pub certificate_lifetime_days: i64,
    /// A certificate inside this margin of its expiration is due for
    /// renewal.
    pub refresh_margin_days: i64,
    /// Cadence of the background refresh scheduler.
    pub refresh_interval_days: i64,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        Self {
            certificate_quota: 2,
            certificate_lifetime_days: 7,
            refresh_margin_days: 2,
            refresh_interval_days: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TunnelPolicy {
    /// Loopback address the tunnel relay binds.
    pub bind_address: String,
    /// Budget for the post-start connectivity probe.
    pub test_timeout_ms: u64,
}

impl Default for TunnelPolicy {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:65399".to_string(),
            test_timeout_ms: 5000,
        }
    }
}

/// Everything config.toml can carry. Unknown keys are ignored so old
/// binaries tolerate configs written by newer ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub signing: SigningPolicy,
    pub tunnel: TunnelPolicy,
}

impl Config {
    /// Load from config.toml, falling back to defaults when the file
    /// is missing. A malformed file is an error rather than a silent
    /// fallback; an operator who edited it should hear about typos.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&crate::dirs::config_path())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(std::io::Error),
    #[error("config.toml is malformed: {0}")]
    Parse(String),
}
