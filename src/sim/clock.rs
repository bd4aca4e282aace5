use std::ops::Range;

use rand::Rng;

pub const SECONDS_PER_DAY: u32 = 86_400;
pub const SECONDS_PER_HOUR: u32 = 3_600;
pub const MINUTES_PER_DAY: usize = 1_440;

/// Number of periods of `time_step_s` seconds in one day.
pub fn periods_per_day(time_step_s: u32) -> usize {
    (SECONDS_PER_DAY / time_step_s.max(1)) as usize
}

/// Number of periods covering `days` whole days.
pub fn total_periods(days: usize, time_step_s: u32) -> usize {
    days * periods_per_day(time_step_s)
}

/// Splits `0..total_periods` into consecutive ranges of at most `periods_per_day`.
///
/// The last chunk is shorter when `total_periods` is not a whole number of days.
pub fn chunk_into_days(total_periods: usize, periods_per_day: usize) -> Vec<Range<usize>> {
    if periods_per_day == 0 {
        return Vec::new();
    }
    (0..total_periods)
        .step_by(periods_per_day)
        .map(|start| start..(start + periods_per_day).min(total_periods))
        .collect()
}

/// Draws a thermostat activation delay in whole minutes from `[0, activation_window_min)`.
pub fn staggered_activation_time<R: Rng + ?Sized>(activation_window_min: u32, rng: &mut R) -> u32 {
    if activation_window_min == 0 {
        return 0;
    }
    rng.random_range(0..activation_window_min)
}

/// A simulation clock that maps a multi-day trial onto fixed-length periods.
///
/// # Examples
///
/// ```
/// use ewh_sim::sim::clock::SimulationClock;
///
/// let clock = SimulationClock::new(300, 2);
/// let days = clock.days();
/// assert_eq!(days.len(), 2);
/// assert_eq!(days[1], 288..576);
/// assert_eq!(clock.minute_to_period(90), 18);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationClock {
    /// Step length in seconds
    time_step_s: u32,
    /// Number of simulated days
    days: usize,
}

impl SimulationClock {
    /// Creates a clock for `days` days of `time_step_s`-second periods.
    ///
    /// # Arguments
    ///
    /// * `time_step_s` - Step length in seconds; expected to divide one hour
    /// * `days` - Number of simulated days
    pub fn new(time_step_s: u32, days: usize) -> Self {
        Self {
            time_step_s: time_step_s.max(1),
            days,
        }
    }

    pub fn periods_per_day(&self) -> usize {
        periods_per_day(self.time_step_s)
    }

    pub fn total_periods(&self) -> usize {
        total_periods(self.days, self.time_step_s)
    }

    /// Day-local period ranges covering the whole trial.
    pub fn days(&self) -> Vec<Range<usize>> {
        chunk_into_days(self.total_periods(), self.periods_per_day())
    }

    /// Whether `period` starts a new simulated hour.
    pub fn is_hour_boundary(&self, period: usize) -> bool {
        let periods_per_hour = (SECONDS_PER_HOUR / self.time_step_s).max(1) as usize;
        period % periods_per_hour == 0
    }

    /// Converts a minute offset into the first period that begins at or after it.
    pub fn minute_to_period(&self, minute: usize) -> usize {
        (minute * 60).div_ceil(self.time_step_s as usize)
    }

    /// Simulated minutes elapsed at the start of `period`.
    pub fn minutes_at(&self, period: usize) -> f64 {
        period as f64 * f64::from(self.time_step_s) / 60.0
    }

    /// Simulated hours elapsed at the start of `period`.
    pub fn hours_at(&self, period: usize) -> f64 {
        period as f64 * f64::from(self.time_step_s) / f64::from(SECONDS_PER_HOUR)
    }
}
