//! Per-minute presence probability derived from an occupant schedule.

use std::ops::Range;

use serde::Deserialize;

use super::clock::MINUTES_PER_DAY;
use super::schedule::OccupantSchedule;
use crate::error::{ConfigError, SamplingError};

/// Width of the transition band around each activity instant (minutes).
const TRANSITION_BAND_MIN: i32 = 30;

/// Activity label of one minute of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceLabel {
    /// Within 30 minutes of waking, leaving, returning or going to bed.
    Peak,
    /// At home and awake outside the transition bands.
    Normal,
    /// Out of the house, `[leave, return)`.
    Away,
    /// Asleep, `[sleep, wake)`.
    Night,
}

/// Relative weight of each presence label before normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresenceWeights {
    pub peak: f64,
    pub normal: f64,
    pub away: f64,
    pub night: f64,
}

impl Default for PresenceWeights {
    fn default() -> Self {
        Self {
            peak: 0.65,
            normal: 0.335,
            away: 0.0,
            night: 0.015,
        }
    }
}

impl PresenceWeights {
    pub fn weight(&self, label: PresenceLabel) -> f64 {
        match label {
            PresenceLabel::Peak => self.peak,
            PresenceLabel::Normal => self.normal,
            PresenceLabel::Away => self.away,
            PresenceLabel::Night => self.night,
        }
    }

    /// Returns every violation: weights must be finite, non-negative and not all zero.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let fields = [
            ("presence.peak", self.peak),
            ("presence.normal", self.normal),
            ("presence.away", self.away),
            ("presence.night", self.night),
        ];
        for (field, value) in fields {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(ConfigError::new(field, format!("must be >= 0, got {value}")));
            }
        }
        if fields.iter().all(|(_, v)| *v == 0.0) {
            errors.push(ConfigError::new("presence", "at least one weight must be > 0"));
        }
        errors
    }
}

fn minute_of_day(minute: i32) -> usize {
    minute.rem_euclid(MINUTES_PER_DAY as i32) as usize
}

/// Labels `[start, end)` on the 1440-minute circle, splitting at midnight.
///
/// An interval with `start == end` is empty.
fn label_interval(labels: &mut [PresenceLabel], start: usize, end: usize, label: PresenceLabel) {
    if start <= end {
        labels[start..end].fill(label);
    } else {
        labels[start..].fill(label);
        labels[..end].fill(label);
    }
}

/// Discrete distribution of hot-water use over the minutes of one day.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceDistribution {
    labels: Vec<PresenceLabel>,
    pdf: Vec<f64>,
    cdf: Vec<f64>,
}

impl PresenceDistribution {
    /// Labels every minute and normalises the label weights into a pdf.
    ///
    /// Every minute starts as `Normal`; later assignments overwrite earlier
    /// ones in the order peak bands, away interval, night interval.
    ///
    /// # Errors
    ///
    /// Returns `SamplingError::DegeneratePresence` when the weighted minutes sum to zero.
    pub fn from_schedule(
        schedule: &OccupantSchedule,
        weights: &PresenceWeights,
    ) -> Result<Self, SamplingError> {
        let wake = schedule.wake();
        let leave = schedule.leave();
        let return_home = schedule.return_home();
        let sleep = schedule.sleep();

        let bands = [
            (wake, wake + TRANSITION_BAND_MIN, PresenceLabel::Peak),
            (leave - TRANSITION_BAND_MIN, leave, PresenceLabel::Peak),
            (return_home, return_home + TRANSITION_BAND_MIN, PresenceLabel::Peak),
            (sleep - TRANSITION_BAND_MIN, sleep, PresenceLabel::Peak),
            (leave, return_home, PresenceLabel::Away),
            (sleep, wake, PresenceLabel::Night),
        ];

        let mut labels = vec![PresenceLabel::Normal; MINUTES_PER_DAY];
        for (start, end, label) in bands {
            // a zero-length interval stays empty even when its ends wrap to the same minute
            if start == end {
                continue;
            }
            label_interval(&mut labels, minute_of_day(start), minute_of_day(end), label);
        }

        Self::from_labels(labels, weights)
    }

    fn from_labels(
        labels: Vec<PresenceLabel>,
        weights: &PresenceWeights,
    ) -> Result<Self, SamplingError> {
        let raw: Vec<f64> = labels.iter().map(|l| weights.weight(*l)).collect();
        let total: f64 = raw.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(SamplingError::DegeneratePresence { total });
        }

        let pdf: Vec<f64> = raw.iter().map(|w| w / total).collect();
        let cdf = pdf
            .iter()
            .scan(0.0, |acc, p| {
                *acc += p;
                Some(*acc)
            })
            .collect();

        Ok(Self { labels, pdf, cdf })
    }

    pub fn labels(&self) -> &[PresenceLabel] {
        &self.labels
    }

    pub fn pdf(&self) -> &[f64] {
        &self.pdf
    }

    pub fn cdf(&self) -> &[f64] {
        &self.cdf
    }

    /// Minutes whose cdf value is nearest to `u`.
    ///
    /// Between the two cdf values that bracket `u`, the closer one wins and an
    /// exact tie goes to the smaller value. Returns the full run of minutes
    /// sharing that value (runs arise after zero-weight minutes).
    pub fn nearest_cdf_run(&self, u: f64) -> Range<usize> {
        let upper = self.cdf.partition_point(|&c| c < u);
        let chosen = match (upper.checked_sub(1), self.cdf.get(upper)) {
            (Some(lo), Some(&hi)) => {
                let below = self.cdf[lo];
                if u - below <= hi - u { below } else { hi }
            }
            (Some(lo), None) => self.cdf[lo],
            (None, Some(&hi)) => hi,
            (None, None) => return 0..0,
        };
        let start = self.cdf.partition_point(|&c| c < chosen);
        let end = self.cdf.partition_point(|&c| c <= chosen);
        start..end
    }
}
