//! Player and host configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "AIRSTREAM_API_URL";

/// Environment variable overriding the persisted state file
pub const STATE_FILE_ENV: &str = "AIRSTREAM_STATE_FILE";

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Idle time before the controls hide (milliseconds)
    pub controls_hide_delay_ms: u64,
    /// Window in which a second activation becomes a seek (milliseconds)
    pub double_activation_window_ms: u64,
    /// Seek distance of a double activation (seconds)
    pub double_activation_seek: f64,
    /// Seek distance of the arrow keys (seconds)
    pub keyboard_seek: f64,
    /// Seek distance of the skip buttons (seconds)
    pub skip_seek: f64,
    /// Preview sprite sampling interval (seconds per frame)
    pub preview_interval: f64,
    /// Volume applied to a fresh player
    pub initial_volume: f64,
    /// Up-next countdown length (seconds)
    pub countdown_seconds: u32,
    /// Arm the up-next countdown at end of media
    pub continuation_enabled: bool,
    /// Bandwidth assumed before the first measurement (bps)
    pub default_bandwidth_estimate: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            controls_hide_delay_ms: 3000,
            double_activation_window_ms: 300,
            double_activation_seek: 10.0,
            keyboard_seek: 5.0,
            skip_seek: 10.0,
            preview_interval: 5.0,
            initial_volume: 0.8,
            countdown_seconds: 5,
            continuation_enabled: true,
            default_bandwidth_estimate: 1_000_000,
        }
    }
}

impl PlayerConfig {
    pub fn controls_hide_delay(&self) -> Duration {
        Duration::from_millis(self.controls_hide_delay_ms)
    }

    pub fn double_activation_window(&self) -> Duration {
        Duration::from_millis(self.double_activation_window_ms)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::InvalidConfig(format!(
                "initial_volume must be within [0, 1], got {}",
                self.initial_volume
            )));
        }
        if self.preview_interval <= 0.0 {
            return Err(Error::InvalidConfig("preview_interval must be positive".into()));
        }
        if self.countdown_seconds == 0 {
            return Err(Error::InvalidConfig("countdown_seconds must be at least 1".into()));
        }
        Ok(())
    }
}

/// Host configuration: where the library API lives and where state persists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Base URL of the library API
    pub api_base_url: Url,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Persisted state file (None keeps state in memory)
    pub state_file: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse("http://localhost:5000").expect("static URL"),
            request_timeout_ms: 10000,
            state_file: None,
        }
    }
}

impl HostConfig {
    /// Build a config from the environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(api) = std::env::var(API_URL_ENV) {
            config.api_base_url = Url::parse(&api)?;
        }
        if let Ok(path) = std::env::var(STATE_FILE_ENV) {
            config.state_file = Some(PathBuf::from(path));
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, api: Url) -> Self {
        self.api_base_url = api;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Resolve an endpoint path against the API base
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.api_base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_config_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.controls_hide_delay(), Duration::from_secs(3));
        assert_eq!(config.double_activation_window(), Duration::from_millis(300));
        assert_eq!(config.countdown_seconds, 5);
        assert_eq!(config.preview_interval, 5.0);
        assert!(config.continuation_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_player_config_rejects_bad_volume() {
        let config = PlayerConfig { initial_volume: 1.5, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_endpoint_join() {
        let config = HostConfig::default()
            .with_api_base(Url::parse("http://api.example.com:4000/v1").unwrap());
        assert_eq!(
            config.endpoint("/videos").unwrap().as_str(),
            "http://api.example.com:4000/v1/videos"
        );

        let root = HostConfig::default();
        assert_eq!(root.endpoint("upload").unwrap().as_str(), "http://localhost:5000/upload");
    }
}
