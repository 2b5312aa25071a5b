//! Configuration types for the orchestration core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{KelpieError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    /// Discovery scan settings.
    pub scan: ScanConfig,
    /// Connection settings.
    pub connect: ConnectConfig,
    /// Audio capture settings.
    pub capture: CaptureConfig,
    /// Signal monitor settings.
    pub monitor: MonitorConfig,
    /// Situation report settings.
    pub report: ReportConfig,
}

/// Discovery scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Bounded scan duration in seconds.
    pub timeout_secs: u32,
    /// Number of sampling passes in a mobile deep scan.
    pub deep_passes: u32,
    /// Delay between deep-scan passes in seconds, letting the radio
    /// environment refresh between samples.
    pub pass_delay_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            deep_passes: 3,
            pass_delay_secs: 2,
        }
    }
}

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Pre-connect discovery duration in seconds, populating the adapter's
    /// device cache before the connect command is issued.
    pub timeout_secs: u32,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self { timeout_secs: 2 }
    }
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Recording limit in seconds for the mobile microphone recorder.
    pub mobile_limit_secs: u32,
    /// Cancellation poll interval for the capture child, milliseconds.
    pub poll_interval_ms: u64,
    /// Default playback sink when the caller does not name one.
    pub default_sink: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mobile_limit_secs: 10,
            poll_interval_ms: 100,
            default_sink: "alsa_output.pci-0000_00_05.0.analog-stereo".to_owned(),
        }
    }
}

/// Signal monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling interval in milliseconds.
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { interval_ms: 500 }
    }
}

/// Situation report configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory for report files; `None` uses the application data dir.
    pub dir: Option<PathBuf>,
}

impl ReportConfig {
    /// Resolve the report directory.
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(crate::paths::data_dir)
    }
}

impl OpsConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| KelpieError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| KelpieError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path under the app config dir.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_dir().join("config.toml")
    }
}
