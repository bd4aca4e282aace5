//! Core simulation types: occupant categories, trial timing, and step records.

use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ConfigError;

/// Occupant age category used to key the diurnal and draw statistics tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Age {
    Child,
    Teen,
    /// Adult without a job outside the home.
    HomeAd,
    /// Adult who leaves home to work.
    WorkAd,
    Senior,
}

impl Age {
    pub fn as_str(&self) -> &'static str {
        match self {
            Age::Child => "child",
            Age::Teen => "teen",
            Age::HomeAd => "home_ad",
            Age::WorkAd => "work_ad",
            Age::Senior => "senior",
        }
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many draw events are sampled per simulated day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawCountMode {
    /// Exactly one event per day.
    Single,
    /// Event count drawn from the frequency distribution each day.
    #[default]
    Sampled,
}

/// Timing and seeding of one trial.
///
/// # Examples
///
/// ```
/// use ewh_sim::sim::types::SimConfig;
///
/// let cfg = SimConfig::new(60, 2, 42).unwrap();
/// assert_eq!(cfg.periods_per_day(), 1440);
/// assert_eq!(cfg.total_periods(), 2880);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Step length in seconds; divides one hour exactly.
    pub time_step_s: u32,
    /// Number of simulated days.
    pub days: usize,
    /// Seed of the trial's random stream.
    pub seed: u64,
    /// Calendar date of day 0, used for weekday/weekend selection.
    pub start_date: NaiveDate,
    /// Width of the daily thermostat activation window (minutes).
    pub activation_window_min: u32,
    /// Per-day draw event count policy.
    pub draw_count: DrawCountMode,
}

impl SimConfig {
    /// Creates a trial configuration starting on 2024-01-01.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `time_step_s` does not divide 3600 or `days` is zero.
    pub fn new(time_step_s: u32, days: usize, seed: u64) -> Result<Self, ConfigError> {
        if time_step_s == 0 || 3600 % time_step_s != 0 {
            return Err(ConfigError::new(
                "simulation.time_step_s",
                format!("must be > 0 and divide 3600, got {time_step_s}"),
            ));
        }
        if days == 0 {
            return Err(ConfigError::new("simulation.days", "must be > 0"));
        }
        Ok(Self {
            time_step_s,
            days,
            seed,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            activation_window_min: 150,
            draw_count: DrawCountMode::default(),
        })
    }

    /// Step length in seconds as a float.
    pub fn dt(&self) -> f64 {
        f64::from(self.time_step_s)
    }

    pub fn periods_per_day(&self) -> usize {
        super::clock::periods_per_day(self.time_step_s)
    }

    pub fn total_periods(&self) -> usize {
        super::clock::total_periods(self.days, self.time_step_s)
    }
}

/// Complete record of one simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Absolute period index.
    pub period: usize,
    /// Simulation time in hours since the start of the trial.
    pub time_hr: f64,
    /// Ambient temperature applied in this step (°C).
    pub ambient_c: f64,
    /// Tank temperature at the end of the step (°C).
    pub temp_c: f64,
    /// Element power (W).
    pub power_w: f64,
    /// Hot water drawn during the step (L).
    pub draw_volume_l: f64,
    /// Whether the element heated in this step.
    pub element_on: bool,
    /// Whether thermostat control was enabled in this step.
    pub is_active: bool,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>6} ({:>7.2}h) | temp={:>6.2} C  ambient={:>5.1} C | power={:>6.0} W  \
             draw={:>5.2} L | on={} active={}",
            self.period,
            self.time_hr,
            self.temp_c,
            self.ambient_c,
            self.power_w,
            self.draw_volume_l,
            self.element_on,
            self.is_active,
        )
    }
}
