//! Startup error types.
//!
//! The simulation itself has no recoverable runtime errors: a destroyed
//! entity is a game outcome, not a failure.  The only things that can go wrong
//! happen before the first frame, while configuration and layout files are
//! read and checked.  Those failures are fatal to the caller.

use std::fmt;
use std::path::PathBuf;

/// Everything that can go wrong while building a [`crate::config::GameConfig`]
/// or a [`crate::config::Layout`].
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The TOML was syntactically or structurally wrong.
    Parse(toml::de::Error),

    /// A value parsed fine but would break the simulation contract
    /// (empty random ranges, zero spawn rates, non-positive radii, ...).
    Invalid {
        /// Dotted key of the offending value, e.g. `other_car.min_speed_y`.
        field: &'static str,
        /// The rejected value, rendered for the message.
        value: String,
        /// Human-readable description of what was expected.
        reason: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read '{}': {}", path.display(), source)
            }
            ConfigError::Parse(err) => write!(f, "failed to parse TOML: {}", err),
            ConfigError::Invalid {
                field,
                value,
                reason,
            } => write!(f, "invalid value for '{}' ({}): {}", field, value, reason),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid { .. } => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err)
    }
}

/// Convenience alias: a `Result` using `ConfigError` as the error type.
pub type ConfigResult<T> = Result<T, ConfigError>;

// ── Validation helpers ────────────────────────────────────────────────────────

pub(crate) fn require_positive(field: &'static str, value: f64) -> ConfigResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            value: value.to_string(),
            reason: "must be a finite number greater than 0",
        })
    }
}

pub(crate) fn require_non_negative(field: &'static str, value: f64) -> ConfigResult<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            value: value.to_string(),
            reason: "must be a finite number of at least 0",
        })
    }
}

pub(crate) fn require_nonzero(field: &'static str, value: u32) -> ConfigResult<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            value: value.to_string(),
            reason: "must be at least 1",
        })
    }
}

pub(crate) fn require_range(field: &'static str, min: i32, max: i32) -> ConfigResult<()> {
    if min <= max {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            value: format!("{}..={}", min, max),
            reason: "minimum must not exceed maximum",
        })
    }
}
