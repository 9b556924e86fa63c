//! Configuration management for channelsweep.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelList, DEFAULT_CHANNELS};
use crate::environment::ToolVersion;
use crate::error::{Error, Result};
use crate::radio::InterfaceId;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "channelsweep";

/// Default capture file name.
const CAPTURE_FILE_NAME: &str = "capture.pcapng";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CHANNELSWEEP_`, sections split on `__`)
/// 2. TOML config file at `~/.config/channelsweep/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Wireless interface selection.
    pub interface: InterfaceConfig,
    /// Channel sweep parameters.
    pub sweep: SweepConfig,
    /// Capture process parameters.
    pub capture: CaptureConfig,
    /// Host capability requirements.
    pub environment: EnvironmentConfig,
    /// External tool locations.
    pub tools: ToolsConfig,
    /// Logging output.
    pub logging: LoggingConfig,
}

/// Interface-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Interface name, e.g. `wlan1`.
    pub name: Option<String>,
    /// MAC address of a USB adapter; its predictable `wlx…` name is tried
    /// alongside `name`.
    pub mac_address: Option<String>,
    /// Stop network managers that fight over the interface before
    /// entering monitor mode (`airmon-ng check kill`).
    pub kill_conflicting: bool,
}

/// Sweep-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Channels to visit, in order.
    pub channels: Vec<u16>,
    /// Time spent on each channel in milliseconds.
    pub dwell_ms: u64,
    /// Number of times the whole channel list is swept.
    pub passes: u32,
}

/// How the capture process is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// Kill immediately (`SIGKILL`).
    #[default]
    Kill,
    /// Send `SIGINT` so the tool can finish the file, then kill after the
    /// grace period.
    Interrupt,
}

/// Capture-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Path of the capture file.
    /// Defaults to `~/.local/share/channelsweep/capture.pcapng`
    pub output_path: Option<PathBuf>,
    /// Longest wait for the capture tool to start recording, in milliseconds.
    pub warmup_ms: u64,
    /// Wait for the tool's own "capturing" acknowledgment instead of always
    /// sleeping for the full warm-up.
    pub wait_for_ready: bool,
    /// How to stop the capture process.
    pub stop_mode: StopMode,
    /// Grace period before an interrupted capture is killed, in milliseconds.
    pub stop_grace_ms: u64,
}

/// Environment check configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Run the environment check before a sweep.
    pub check: bool,
    /// Oldest acceptable capture tool version.
    pub min_tool_version: String,
}

/// Locations of the external tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// `airmon-ng` executable.
    pub airmon_ng: String,
    /// `iw` executable.
    pub iw: String,
    /// Capture executable (`tshark` or `dumpcap`).
    pub capture: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write log records to this file.
    pub file: Option<PathBuf>,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            name: Some("wlan1".to_string()),
            mac_address: None,
            kill_conflicting: true,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS.to_vec(),
            dwell_ms: 500,
            passes: 1,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_path: None, // Will be resolved to default at runtime
            warmup_ms: 5_000,
            wait_for_ready: true,
            stop_mode: StopMode::Kill,
            stop_grace_ms: 2_000,
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            check: true,
            min_tool_version: "3.0.0".to_string(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            airmon_ng: "airmon-ng".to_string(),
            iw: "iw".to_string(),
            capture: "tshark".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `CHANNELSWEEP_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CHANNELSWEEP_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.channel_list()
            .map_err(|e| Error::config_validation(format!("sweep.channels: {e}")))?;

        if self.sweep.passes == 0 {
            return Err(Error::config_validation("sweep.passes must be at least 1"));
        }

        self.min_tool_version()
            .map_err(|e| Error::config_validation(format!("environment.min_tool_version: {e}")))?;

        if self.capture.stop_mode == StopMode::Interrupt && self.capture.stop_grace_ms == 0 {
            return Err(Error::config_validation(
                "capture.stop_grace_ms must be greater than 0 when stop_mode is interrupt",
            ));
        }

        for (key, value) in [
            ("tools.airmon_ng", &self.tools.airmon_ng),
            ("tools.iw", &self.tools.iw),
            ("tools.capture", &self.tools.capture),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config_validation(format!("{key} must not be empty")));
            }
        }

        self.interface_candidates()
            .map_err(|e| Error::config_validation(format!("interface: {e}")))?;

        Ok(())
    }

    /// The configured channels as a validated list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or contains unknown channels.
    pub fn channel_list(&self) -> Result<ChannelList> {
        ChannelList::from_numbers(&self.sweep.channels)
    }

    /// The configured minimum capture tool version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version string is malformed.
    pub fn min_tool_version(&self) -> Result<ToolVersion> {
        self.environment.min_tool_version.parse()
    }

    /// Interface names to try, in order of preference.
    ///
    /// The MAC-derived `wlx…` name comes first because it is stable across
    /// reboots; `wlanN` numbering is not.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured name or MAC is malformed, or if
    /// neither is configured.
    pub fn interface_candidates(&self) -> Result<Vec<InterfaceId>> {
        let mut candidates = Vec::new();
        if let Some(mac) = &self.interface.mac_address {
            candidates.push(InterfaceId::from_mac(mac)?);
        }
        if let Some(name) = &self.interface.name {
            let id = InterfaceId::new(name.as_str())?;
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        }
        if candidates.is_empty() {
            return Err(Error::config_validation(
                "either interface.name or interface.mac_address must be set",
            ));
        }
        Ok(candidates)
    }

    /// Pick the first interface candidate for which `exists` returns true.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InterfaceNotFound`] listing every candidate if none
    /// exists, or a validation error if the candidates are malformed.
    pub fn resolve_interface(&self, exists: impl Fn(&str) -> bool) -> Result<InterfaceId> {
        let candidates = self.interface_candidates()?;
        match candidates.iter().find(|c| exists(c.as_str())) {
            Some(found) => Ok(found.clone()),
            None => Err(Error::InterfaceNotFound {
                candidates: candidates.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    /// Get the capture output path, resolving defaults if not set.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.capture
            .output_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(CAPTURE_FILE_NAME))
    }

    /// Get the dwell time as a Duration.
    #[must_use]
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.sweep.dwell_ms)
    }

    /// Get the warm-up time as a Duration.
    #[must_use]
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.capture.warmup_ms)
    }

    /// Get the stop grace period as a Duration.
    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.capture.stop_grace_ms)
    }
}
