//! Configuration loading and saving

use anyhow::Result;
use kozy_capture::DEFAULT_MAX_DEPTH_MM;
use kozy_core::{StreamConfig, StreamConfigError, UsbIdentity};
use kozy_discovery::MicrocontrollerProfile;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub microcontroller: MicrocontrollerSettings,
    #[serde(default)]
    pub console: ConsoleSettings,
}

/// The persisted stream choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// "WIDTHxHEIGHT"
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            fps: default_fps(),
        }
    }
}

impl From<StreamConfig> for StreamSettings {
    fn from(config: StreamConfig) -> Self {
        Self {
            resolution: config.resolution(),
            fps: config.fps,
        }
    }
}

fn default_resolution() -> String {
    "1280x720".to_string()
}

fn default_fps() -> u32 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Depth values at or beyond this distance display as white
    #[serde(default = "default_max_depth_mm")]
    pub max_depth_mm: u16,
    /// Use the built-in simulated camera instead of an SDK driver
    #[serde(default)]
    pub simulated: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            max_depth_mm: default_max_depth_mm(),
            simulated: false,
        }
    }
}

fn default_max_depth_mm() -> u16 {
    DEFAULT_MAX_DEPTH_MM
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrocontrollerSettings {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "default_product_id")]
    pub product_id: u16,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Timeout for a single line read
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Overall time allowed for the handshake
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_request")]
    pub request: String,
    #[serde(default = "default_response_prefix")]
    pub response_prefix: String,
    /// Connect right after startup detection
    #[serde(default = "default_true")]
    pub auto_connect: bool,
}

impl Default for MicrocontrollerSettings {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            request: default_request(),
            response_prefix: default_response_prefix(),
            auto_connect: true,
        }
    }
}

fn default_vendor_id() -> u16 {
    UsbIdentity::PICO_MICROPYTHON.vendor_id
}

fn default_product_id() -> u16 {
    UsbIdentity::PICO_MICROPYTHON.product_id
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_handshake_timeout_ms() -> u64 {
    3000
}

fn default_request() -> String {
    kozy_serial::DEFAULT_REQUEST.to_string()
}

fn default_response_prefix() -> String {
    kozy_serial::DEFAULT_RESPONSE_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    /// Lines kept by the log console
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    1000
}

impl Config {
    /// Parse the persisted stream settings
    pub fn stream_config(&self) -> Result<StreamConfig, StreamConfigError> {
        StreamConfig::parse(&self.stream.resolution, self.stream.fps)
    }

    pub fn identity(&self) -> UsbIdentity {
        UsbIdentity::new(self.microcontroller.vendor_id, self.microcontroller.product_id)
    }

    /// Convert to a MicrocontrollerProfile
    pub fn microcontroller_profile(&self) -> MicrocontrollerProfile {
        let mcu = &self.microcontroller;
        MicrocontrollerProfile {
            identity: self.identity(),
            baud_rate: mcu.baud_rate,
            read_timeout: Duration::from_millis(mcu.read_timeout_ms),
            request: mcu.request.clone(),
            response_prefix: mcu.response_prefix.clone(),
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.microcontroller.handshake_timeout_ms)
    }
}

/// Load configuration from file, falling back to defaults on any failure
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        return Config::default();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|content| toml::from_str::<Config>(&content).map_err(anyhow::Error::from));

    match parsed {
        Ok(config) => {
            info!(path = %path.display(), "Loaded configuration");
            config
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable configuration, using defaults");
            Config::default()
        }
    }
}

/// Save configuration to file
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("kozy.toml"));
        assert_eq!(config, Config::default());
        assert_eq!(config.stream.resolution, "1280x720");
        assert_eq!(config.stream.fps, 30);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kozy.toml");
        std::fs::write(&path, "[stream\nfps = \"fast\"").unwrap();
        assert_eq!(load_config(&path), Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kozy.toml");
        std::fs::write(&path, "[stream]\nfps = 60\n\n[microcontroller]\nauto_connect = false\n")
            .unwrap();

        let config = load_config(&path);
        assert_eq!(config.stream.fps, 60);
        assert_eq!(config.stream.resolution, "1280x720");
        assert!(!config.microcontroller.auto_connect);
        assert_eq!(config.microcontroller.baud_rate, 115_200);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kozy.toml");
        let mut config = Config::default();
        config.stream = StreamSettings::from(StreamConfig::new(640, 480, 15).unwrap());
        config.camera.simulated = true;

        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path), config);
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("kozy.toml");
        assert!(save_config(&path, &Config::default()).is_err());
    }

    #[test]
    fn test_derived_settings() {
        let config = Config::default();
        assert_eq!(
            config.stream_config().unwrap(),
            StreamConfig::new(1280, 720, 30).unwrap()
        );
        assert_eq!(config.identity(), UsbIdentity::PICO_MICROPYTHON);
        assert_eq!(config.handshake_timeout(), Duration::from_secs(3));

        let profile = config.microcontroller_profile();
        assert_eq!(profile.baud_rate, 115_200);
        assert_eq!(profile.read_timeout, Duration::from_secs(1));
        assert_eq!(profile.request, "GET_CODE");
    }
}
