//! # Host Configuration
//!
//! Settings are read once at startup and never written back.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [link]
//! port = "/dev/ttyUSB0"
//! baud = 115200
//! settle_ms = 100
//!
//! [scan]
//! points_x = 3
//! points_y = 2
//! dist_x = 100.0
//! dist_y = 50.0
//!
//! [output]
//! path = "measurements.csv"
//! ```
//!
//! Every key is optional and falls back to the defaults below. A file with a
//! `.json` extension is read as JSON instead; besides the layout above, the
//! flat `settings.json` layout (`port`, `baud`, `points_x`, `points_y`,
//! `dist_x`, `dist_y`, `output_file`) is accepted.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scan::MAX_GRID_POINTS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Serial link to the machine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Pause after opening the port before anything is sent.
    #[serde(default = "default_wake_delay_ms")]
    pub wake_delay_ms: u64,
    /// Pause between a position query and reading its reply.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Pause before dropping the replies to an ordinary command.
    #[serde(default = "default_drain_ms")]
    pub drain_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
            wake_delay_ms: default_wake_delay_ms(),
            settle_ms: default_settle_ms(),
            drain_ms: default_drain_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Rectangle scan layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    #[serde(default = "default_points")]
    pub points_x: usize,
    #[serde(default = "default_points")]
    pub points_y: usize,
    /// Distance covered along X, in mm. Negative scans towards -X.
    #[serde(default = "default_dist")]
    pub dist_x: f64,
    #[serde(default = "default_dist")]
    pub dist_y: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            points_x: default_points(),
            points_y: default_points(),
            dist_x: default_dist(),
            dist_y: default_dist(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

/// Flat layout of the original `settings.json`.
#[derive(Debug, Deserialize)]
struct LegacySettings {
    #[serde(default = "default_port")]
    port: String,
    #[serde(default = "default_baud")]
    baud: u32,
    #[serde(default = "default_points")]
    points_x: usize,
    #[serde(default = "default_points")]
    points_y: usize,
    #[serde(default = "default_dist")]
    dist_x: f64,
    #[serde(default = "default_dist")]
    dist_y: f64,
    #[serde(default = "default_output_path")]
    output_file: PathBuf,
}

impl From<LegacySettings> for Config {
    fn from(legacy: LegacySettings) -> Self {
        Self {
            link: LinkConfig {
                port: legacy.port,
                baud: legacy.baud,
                ..LinkConfig::default()
            },
            scan: ScanConfig {
                points_x: legacy.points_x,
                points_y: legacy.points_y,
                dist_x: legacy.dist_x,
                dist_y: legacy.dist_y,
            },
            output: OutputConfig {
                path: legacy.output_file,
            },
        }
    }
}

impl Config {
    /// Reject settings the scan or the link cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.points_x < 2 || self.scan.points_y < 2 {
            return Err(ConfigError::Invalid(format!(
                "scan needs at least 2 points per axis, got {} x {}",
                self.scan.points_x, self.scan.points_y
            )));
        }
        let too_many = self
            .scan
            .points_x
            .checked_mul(self.scan.points_y)
            .is_none_or(|total| total > MAX_GRID_POINTS);
        if too_many {
            return Err(ConfigError::Invalid(format!(
                "scan of {} x {} points exceeds the limit of {}",
                self.scan.points_x, self.scan.points_y, MAX_GRID_POINTS
            )));
        }
        if !self.scan.dist_x.is_finite() || !self.scan.dist_y.is_finite() {
            return Err(ConfigError::Invalid("scan distances must be finite".to_string()));
        }
        if self.link.baud == 0 {
            return Err(ConfigError::Invalid("baud must be > 0".to_string()));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output path is empty".to_string()));
        }
        Ok(())
    }
}

// Default value functions
fn default_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud() -> u32 { 115200 }
fn default_wake_delay_ms() -> u64 { 2000 }
fn default_settle_ms() -> u64 { 100 }
fn default_drain_ms() -> u64 { 10 }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_points() -> usize { 3 }
fn default_dist() -> f64 { 100.0 }
fn default_output_path() -> PathBuf { PathBuf::from("measurements.csv") }

fn parse_json(contents: &str) -> Result<Config, ConfigError> {
    let value: serde_json::Value = serde_json::from_str(contents)?;
    let sectioned = ["link", "scan", "output"]
        .iter()
        .any(|key| value.get(key).is_some());
    if sectioned {
        Ok(serde_json::from_value(value)?)
    } else {
        let legacy: LegacySettings = serde_json::from_value(value)?;
        Ok(legacy.into())
    }
}

/// Load configuration from a TOML (or `.json`) file at the given path.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path.display(), e);
        ConfigError::Io(e)
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        parse_json(&contents)
    } else {
        toml::from_str(&contents).map_err(ConfigError::from)
    };
    parsed.map_err(|e| {
        tracing::error!("Failed to parse config '{}': {}", path.display(), e);
        e
    })
}
