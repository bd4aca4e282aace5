//! Ambient-temperature feeds queried once per simulated hour.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::warn;

use crate::error::{ConfigError, DataLookupError};

/// Column holding the hourly timestamp in ambient CSV files.
pub const DATETIME_COLUMN: &str = "datetime";

/// Default temperature column in ambient CSV files.
pub const DEFAULT_TEMPERATURE_COLUMN: &str = "temperature_2m (°C)";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// One timestamped ambient temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientSample {
    pub timestamp: NaiveDateTime,
    pub temp_c: f64,
}

/// Read-only, time-indexed source of ambient temperature.
///
/// Implementations are shared across parallel trials and must not mutate.
pub trait AmbientFeed: Send + Sync {
    /// The earliest sample; used to start a trial and as the fallback on a miss.
    fn first_sample(&self) -> AmbientSample;

    /// Temperature at exactly `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns `DataLookupError` if the feed has no sample at `timestamp`.
    fn temperature_at(&self, timestamp: NaiveDateTime) -> Result<f64, DataLookupError>;
}

/// The same temperature at every instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantAmbient {
    temp_c: f64,
}

impl ConstantAmbient {
    pub fn new(temp_c: f64) -> Self {
        Self { temp_c }
    }
}

impl AmbientFeed for ConstantAmbient {
    fn first_sample(&self) -> AmbientSample {
        AmbientSample {
            timestamp: NaiveDateTime::default(),
            temp_c: self.temp_c,
        }
    }

    fn temperature_at(&self, _timestamp: NaiveDateTime) -> Result<f64, DataLookupError> {
        Ok(self.temp_c)
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Hourly temperature series loaded from CSV.
///
/// # Examples
///
/// ```
/// use ewh_sim::ambient::{AmbientFeed, HourlyAmbientSeries};
///
/// let csv = "datetime,temperature_2m (°C)\n2019-01-01 00:00:00,4.5\n2019-01-01 01:00:00,4.1\n";
/// let series = HourlyAmbientSeries::from_reader(csv.as_bytes(), "temperature_2m (°C)").unwrap();
/// assert_eq!(series.len(), 2);
/// assert_eq!(series.first_sample().temp_c, 4.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyAmbientSeries {
    samples: BTreeMap<NaiveDateTime, f64>,
    first: AmbientSample,
}

impl HourlyAmbientSeries {
    /// Loads a series from a CSV file with a `datetime` column and `column`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be opened or parsed.
    pub fn from_csv_file(path: &Path, column: &str) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|e| {
            ConfigError::new("ambient.csv", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_reader(file, column)
    }

    /// Loads a series from any CSV source.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for a missing column, an unparseable row, or an empty series.
    pub fn from_reader(reader: impl Read, column: &str) -> Result<Self, ConfigError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| ConfigError::new("ambient.csv", e.to_string()))?
            .clone();
        let position = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                ConfigError::new("ambient.column", format!("CSV has no column \"{name}\""))
            })
        };
        let time_idx = position(DATETIME_COLUMN)?;
        let temp_idx = position(column)?;

        let mut samples = BTreeMap::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| ConfigError::new("ambient.csv", e.to_string()))?;
            let line = row + 2;
            let raw_time = record.get(time_idx).unwrap_or_default();
            let timestamp = parse_datetime(raw_time).ok_or_else(|| {
                ConfigError::new(
                    "ambient.csv",
                    format!("line {line}: cannot parse datetime \"{raw_time}\""),
                )
            })?;
            let raw_temp = record.get(temp_idx).unwrap_or_default();
            let temp_c = raw_temp.parse::<f64>().map_err(|e| {
                ConfigError::new(
                    "ambient.csv",
                    format!("line {line}: cannot parse temperature \"{raw_temp}\": {e}"),
                )
            })?;
            samples.insert(timestamp, temp_c);
        }

        let first = samples
            .first_key_value()
            .map(|(timestamp, temp_c)| AmbientSample {
                timestamp: *timestamp,
                temp_c: *temp_c,
            })
            .ok_or_else(|| ConfigError::new("ambient.csv", "series has no samples"))?;

        Ok(Self { samples, first })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl AmbientFeed for HourlyAmbientSeries {
    fn first_sample(&self) -> AmbientSample {
        self.first
    }

    fn temperature_at(&self, timestamp: NaiveDateTime) -> Result<f64, DataLookupError> {
        self.samples
            .get(&timestamp)
            .copied()
            .ok_or(DataLookupError { timestamp })
    }
}

/// Hour-by-hour walk over an [`AmbientFeed`].
///
/// Starts at the first sample. Each [`advance`](Self::advance) reads the next
/// hour; when that hour is missing the walk restarts from the first sample and
/// the miss is counted.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientCursor {
    next: NaiveDateTime,
    current_c: f64,
    fallbacks: usize,
}

impl AmbientCursor {
    pub fn new(feed: &dyn AmbientFeed) -> Self {
        let first = feed.first_sample();
        Self {
            next: first.timestamp + TimeDelta::hours(1),
            current_c: first.temp_c,
            fallbacks: 0,
        }
    }

    /// Temperature most recently read (°C).
    pub fn current(&self) -> f64 {
        self.current_c
    }

    /// Number of lookups that fell back to the first sample.
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    /// Reads the next hourly sample and returns it.
    pub fn advance(&mut self, feed: &dyn AmbientFeed) -> f64 {
        match feed.temperature_at(self.next) {
            Ok(temp_c) => {
                self.current_c = temp_c;
                self.next += TimeDelta::hours(1);
            }
            Err(e) => {
                let first = feed.first_sample();
                self.fallbacks += 1;
                warn!(error = %e, fallback_c = first.temp_c, "ambient lookup missed, restarting from first sample");
                self.current_c = first.temp_c;
                self.next = first.timestamp + TimeDelta::hours(1);
            }
        }
        self.current_c
    }
}
