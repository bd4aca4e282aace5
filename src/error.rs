//! Error kinds raised while configuring or running a trial.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field} — {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"water_heater.mass"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A random draw produced a value that is not physically meaningful.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingError {
    #[error("sampled {quantity} = {value} is outside the valid range {valid}")]
    OutOfRange {
        quantity: &'static str,
        value: f64,
        valid: &'static str,
    },
    #[error(
        "occupant schedule out of order after correction: \
         wake={wake} leave={leave} return={return_home} sleep={sleep}"
    )]
    ScheduleOrder {
        wake: i32,
        leave: i32,
        return_home: i32,
        sleep: i32,
    },
    #[error("draw of {drawn_l:.2} L in one step exceeds tank volume of {volume_l:.2} L")]
    DrawExceedsVolume { drawn_l: f64, volume_l: f64 },
    #[error("presence weights sum to {total} over the day; at least one occupied minute needs a positive weight")]
    DegeneratePresence { total: f64 },
}

/// The ambient-temperature feed has no sample for the requested hour.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no ambient temperature sample at {timestamp}")]
pub struct DataLookupError {
    pub timestamp: NaiveDateTime,
}

/// Any failure that aborts trial setup or a running trial.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sampling(#[from] SamplingError),
    #[error(transparent)]
    DataLookup(#[from] DataLookupError),
}
