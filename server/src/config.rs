//! Server configuration.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use url::Url;

use crate::{Error, Result};

/// Configuration for the relay server.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Settings for room presence.
    pub room: RoomConfig,

    /// Configuration for TLS encryption.
    pub tls: Option<TlsConfig>,

    /// Configuration for CORS.
    pub cors: CorsConfig,
}

/// Certificate and key for TLS.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to the certificate.
    pub cert: PathBuf,
    /// Path to the certificate key file.
    pub key: PathBuf,
}

/// Configuration for CORS.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins for browser clients.
    pub origins: Vec<Url>,
}

/// Configuration for room presence in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoomConfig {
    /// Time-to-live in seconds for a room's registry entry.
    ///
    /// An entry that is not refreshed within this window expires,
    /// releasing the room even when a node crashed without a
    /// graceful leave.
    ///
    /// Default is 30 seconds.
    pub ttl: u64,

    /// Interval in seconds between membership refreshes.
    ///
    /// Must be materially shorter than the TTL; the server
    /// refuses a configuration where `ttl < 2 * refresh-interval`.
    ///
    /// Default is 10 seconds.
    pub refresh_interval: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            ttl: 30,
            refresh_interval: 10,
        }
    }
}

impl ServerConfig {
    /// Load a server config from a file path.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !fs::try_exists(path.as_ref()).await? {
            return Err(Error::NotFile(path.as_ref().to_path_buf()));
        }

        let contents = fs::read_to_string(path.as_ref()).await?;
        let mut config: ServerConfig = toml::from_str(&contents)?;
        config.validate()?;

        let dir = Self::directory(path.as_ref())?;

        if let Some(tls) = config.tls.as_mut() {
            if tls.cert.is_relative() {
                tls.cert = dir.join(&tls.cert).canonicalize()?;
            }
            if tls.key.is_relative() {
                tls.key = dir.join(&tls.key).canonicalize()?;
            }
        }

        Ok(config)
    }

    /// Check the timing constraints on the room settings.
    pub fn validate(&self) -> Result<()> {
        if self.room.refresh_interval == 0
            || self.room.ttl < self.room.refresh_interval * 2
        {
            return Err(Error::RoomTtlConfig);
        }
        Ok(())
    }

    /// Parent directory of the configuration file.
    fn directory(file: impl AsRef<Path>) -> Result<PathBuf> {
        file.as_ref()
            .parent()
            .map(|p| p.to_path_buf())
            .ok_or(Error::NoParentDir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn ttl_must_cover_two_refresh_periods() {
        let mut config = ServerConfig::default();
        config.room.ttl = 15;
        config.room.refresh_interval = 10;
        assert!(matches!(
            config.validate(),
            Err(Error::RoomTtlConfig)
        ));
    }
}
