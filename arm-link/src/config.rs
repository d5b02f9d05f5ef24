//! Configuration for ArmLink
//!
//! Loads configuration from a TOML file. Every field has a default, so a
//! partial file (or none at all) is valid; command-line flags override
//! whatever the file sets.
//!
//! ```toml
//! [connection]
//! port = "/dev/ttyACM0"
//! baud_rate = 9600
//!
//! [trajectory]
//! duration_ms = 4000.0
//! rate_hz = 100
//!
//! [streaming]
//! wait_ack = false
//! ack_timeout_ms = 2000
//! ack_timeout_policy = "continue"
//!
//! [output]
//! csv_path = "paths/square_path.csv"
//! ```

use crate::error::Result;
use crate::stream::AckTimeoutPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArmConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub trajectory: TrajectoryConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link to the arm controller
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Serial port (e.g., "COM12" on Windows, "/dev/ttyACM0" on Linux)
    #[serde(default = "default_port")]
    pub port: String,

    /// Must match the firmware's `Serial.begin` rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Time for the board to reboot after the port opens (ms)
    #[serde(default = "default_reset_settle_ms")]
    pub reset_settle_ms: u64,
}

/// Path sampling parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrajectoryConfig {
    /// Total path duration (ms)
    #[serde(default = "default_duration_ms")]
    pub duration_ms: f64,

    /// Sampling rate (Hz)
    #[serde(default = "default_rate_hz")]
    pub rate_hz: u32,
}

/// Streaming behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Wait for the controller's response after each sample
    #[serde(default)]
    pub wait_ack: bool,

    /// Bound on each acknowledgment wait (ms)
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Delay before the first sample (ms)
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,

    /// Pause after each sample when not waiting for acks (ms)
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// `continue` (default) or `abort` on acknowledgment timeout
    #[serde(default)]
    pub ack_timeout_policy: AckTimeoutPolicy,
}

/// Output files
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Where generated samples are saved, if anywhere
    #[serde(default)]
    pub csv_path: Option<PathBuf>,

    /// Directory scanned by `list`
    #[serde(default = "default_paths_dir")]
    pub paths_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins if set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            reset_settle_ms: default_reset_settle_ms(),
        }
    }
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_duration_ms(),
            rate_hz: default_rate_hz(),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            wait_ack: false,
            ack_timeout_ms: default_ack_timeout_ms(),
            start_delay_ms: default_start_delay_ms(),
            pacing_delay_ms: default_pacing_delay_ms(),
            ack_timeout_policy: AckTimeoutPolicy::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            paths_dir: default_paths_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_port() -> String {
    "COM12".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_reset_settle_ms() -> u64 {
    2000
}
fn default_duration_ms() -> f64 {
    4000.0
}
fn default_rate_hz() -> u32 {
    100
}
fn default_ack_timeout_ms() -> u64 {
    2000
}
fn default_start_delay_ms() -> u64 {
    500
}
fn default_pacing_delay_ms() -> u64 {
    1
}
fn default_paths_dir() -> PathBuf {
    PathBuf::from("paths")
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Requested file did not exist
    Defaults(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults(path) => write!(f, "defaults ({} not found)", path.display()),
        }
    }
}

impl ArmConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use arm_link::config::ArmConfig;
    ///
    /// let config = ArmConfig::load("arm-link.toml")?;
    /// # Ok::<(), arm_link::Error>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ArmConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    ///
    /// Runs before logging is set up, so the source is returned for the
    /// caller to report.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigSource)> {
        let path = path.as_ref();
        if path.exists() {
            Ok((Self::load(path)?, ConfigSource::File(path.to_path_buf())))
        } else {
            Ok((Self::default(), ConfigSource::Defaults(path.to_path_buf())))
        }
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArmConfig::default();
        assert_eq!(config.connection.port, "COM12");
        assert_eq!(config.connection.baud_rate, 9600);
        assert_eq!(config.trajectory.duration_ms, 4000.0);
        assert_eq!(config.trajectory.rate_hz, 100);
        assert!(!config.streaming.wait_ack);
        assert_eq!(config.streaming.ack_timeout_ms, 2000);
        assert_eq!(config.streaming.ack_timeout_policy, AckTimeoutPolicy::Continue);
        assert!(config.output.csv_path.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_content = r#"
[connection]
port = "/dev/ttyACM0"

[streaming]
wait_ack = true
ack_timeout_policy = "abort"
"#;

        let config: ArmConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.connection.port, "/dev/ttyACM0");
        assert_eq!(config.connection.baud_rate, 9600);
        assert!(config.streaming.wait_ack);
        assert_eq!(config.streaming.ack_timeout_policy, AckTimeoutPolicy::Abort);
        assert_eq!(config.trajectory.rate_hz, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: ArmConfig = toml::from_str("").unwrap();
        assert_eq!(config.streaming.start_delay_ms, 500);
        assert_eq!(config.output.paths_dir, PathBuf::from("paths"));
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("arm-link.toml");

        let mut config = ArmConfig::default();
        config.trajectory.rate_hz = 250;
        config.output.csv_path = Some(PathBuf::from("out/square.csv"));
        config.to_file(&path).unwrap();

        let loaded = ArmConfig::load(&path).unwrap();
        assert_eq!(loaded.trajectory.rate_hz, 250);
        assert_eq!(loaded.output.csv_path, Some(PathBuf::from("out/square.csv")));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[connection]"));
        assert!(text.contains("[streaming]"));
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[trajectory]\nrate_hz = \"fast\"\n").unwrap();
        assert!(matches!(
            ArmConfig::load(&path),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let (config, source) = ArmConfig::load_or_default("/nonexistent/arm-link.toml").unwrap();
        assert_eq!(config.connection.port, "COM12");
        assert_eq!(config.output.paths_dir, PathBuf::from("paths"));
        assert_eq!(
            source,
            ConfigSource::Defaults(PathBuf::from("/nonexistent/arm-link.toml"))
        );
        assert!(source.to_string().starts_with("defaults"));
    }

    #[test]
    fn test_existing_file_reports_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("arm-link.toml");
        std::fs::write(&path, "[trajectory]\nrate_hz = 50\n").unwrap();

        let (config, source) = ArmConfig::load_or_default(&path).unwrap();
        assert_eq!(config.trajectory.rate_hz, 50);
        assert_eq!(source, ConfigSource::File(path));
    }

    #[test]
    fn test_output_section_without_paths_dir() {
        let config: ArmConfig = toml::from_str("[output]\ncsv_path = \"a.csv\"\n").unwrap();
        assert_eq!(config.output.paths_dir, PathBuf::from("paths"));
        assert_eq!(OutputConfig::default().paths_dir, PathBuf::from("paths"));
        assert!(OutputConfig::default().csv_path.is_none());
    }
}
