//! Capture configuration
//!
//! Gathers the named settings of a capture session once at startup, from the
//! command line and an optional TOML capture profile, and validates them
//! before any file or port is touched.

use crate::serial::port::{BaudRate, PortConfig, STANDARD_BAUD_RATES};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default serial device for the current platform
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM3";
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Read timeout used when the operator does not supply a positive `--timeout`
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration errors, raised before any resource is opened
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported baud rate {0} (expected one of {})", format_rates())]
    UnsupportedBaudRate(u32),

    #[error("{name} must be a non-negative number of seconds, got {value}")]
    InvalidSeconds { name: &'static str, value: f64 },

    #[error("{name} of {value} seconds is too large")]
    SecondsOutOfRange { name: &'static str, value: f64 },

    #[error("failed to read capture profile {}", path.display())]
    ReadProfile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse capture profile {}", path.display())]
    ParseProfile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

fn format_rates() -> String {
    STANDARD_BAUD_RATES
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// How long the acquisition window stays open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationBound {
    Bounded(Duration),
    Unbounded,
}

impl DurationBound {
    /// Build a bound from an optional number of seconds.
    ///
    /// `None` and positive infinity both mean unbounded, as does any window
    /// too long for a [`Duration`] to hold.
    pub fn from_secs(secs: Option<f64>) -> Result<Self, ConfigError> {
        let Some(secs) = secs else {
            return Ok(Self::Unbounded);
        };
        match to_duration("duration", secs) {
            Ok(limit) => Ok(Self::Bounded(limit)),
            Err(ConfigError::SecondsOutOfRange { .. }) => Ok(Self::Unbounded),
            Err(e) => Err(e),
        }
    }

    /// Whether `elapsed` has reached the end of the window
    pub fn is_exceeded(&self, elapsed: Duration) -> bool {
        match self {
            Self::Bounded(limit) => elapsed >= *limit,
            Self::Unbounded => false,
        }
    }
}

impl std::fmt::Display for DurationBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounded(limit) => write!(f, "{:.2} s", limit.as_secs_f64()),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

fn to_duration(name: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    if secs.is_nan() || secs < 0.0 {
        return Err(ConfigError::InvalidSeconds { name, value: secs });
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| ConfigError::SecondsOutOfRange { name, value: secs })
}

/// Partially specified settings, as found on the command line or in a profile.
///
/// Every field is optional so that sources can be layered.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureOptions {
    /// Serial port path
    pub port: Option<String>,
    /// Baud rate, validated against the standard set
    pub baud_rate: Option<u32>,
    /// Connection timeout in seconds
    pub timeout: Option<f64>,
    /// Acquisition window in seconds
    pub duration: Option<f64>,
}

impl CaptureOptions {
    /// Load a TOML capture profile
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadProfile {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::ParseProfile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fill unset fields from `fallback`
    pub fn or(self, fallback: CaptureOptions) -> Self {
        Self {
            port: self.port.or(fallback.port),
            baud_rate: self.baud_rate.or(fallback.baud_rate),
            timeout: self.timeout.or(fallback.timeout),
            duration: self.duration.or(fallback.duration),
        }
    }
}

/// Validated settings for one capture session
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Serial connection parameters
    pub port: PortConfig,
    /// Output file, created or truncated at startup
    pub output: PathBuf,
    /// Acquisition window
    pub duration: DurationBound,
    /// Timeout as given by the operator (zero when not given)
    pub user_timeout: Duration,
}

impl CaptureConfig {
    /// Resolve layered options into a validated configuration.
    ///
    /// Unset options take their built-in defaults. A positive timeout
    /// replaces [`DEFAULT_READ_TIMEOUT`] as the port's read timeout.
    pub fn resolve(output: impl Into<PathBuf>, options: CaptureOptions) -> Result<Self, ConfigError> {
        let baud_rate = match options.baud_rate {
            Some(rate) => BaudRate::try_from(rate)?,
            None => BaudRate::default(),
        };
        let user_timeout = to_duration("timeout", options.timeout.unwrap_or(0.0))?;
        let duration = DurationBound::from_secs(options.duration)?;

        let read_timeout = if user_timeout.is_zero() {
            DEFAULT_READ_TIMEOUT
        } else {
            user_timeout
        };

        let port_path = options.port.unwrap_or_else(|| DEFAULT_PORT.to_string());
        let port = PortConfig::new(&port_path)
            .with_baud_rate(baud_rate)
            .with_timeout(read_timeout);

        Ok(Self {
            port,
            output: output.into(),
            duration,
            user_timeout,
        })
    }
}
