//! Occupant daily-activity schedules sampled from diurnal distributions.

use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::Deserialize;
use tracing::debug;

use super::clock::MINUTES_PER_DAY;
use super::types::Age;
use crate::error::{ConfigError, SamplingError, SimError};

const DAY: i32 = MINUTES_PER_DAY as i32;

/// Shift applied by the ordering corrections (minutes).
const CORRECTION_SHIFT_MIN: i32 = 30;

/// Longest sleep that still leaves room for the return correction before bedtime.
const MAX_SLEEP_DURATION_MIN: i32 = DAY - CORRECTION_SHIFT_MIN;

/// A random variable over minutes, tagged by distribution kind.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "dist", rename_all = "snake_case")]
pub enum TimeDistribution {
    Normal { mean: f64, sd: f64 },
    Uniform { low: f64, high: f64 },
}

/// The four activity variables of one day type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiurnalPattern {
    /// Wake-up instant (minutes of day).
    pub wake: TimeDistribution,
    /// Leave-house instant (minutes of day).
    pub leave: TimeDistribution,
    /// Time spent away from home (minutes).
    pub away: TimeDistribution,
    /// Sleep duration (minutes).
    pub sleep: TimeDistribution,
}

/// Diurnal statistics keyed by age on weekdays, shared by all ages on weekends.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiurnalParameters {
    pub weekday: BTreeMap<Age, DiurnalPattern>,
    pub weekend: DiurnalPattern,
}

impl DiurnalParameters {
    /// Parses the table from TOML.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for malformed TOML or an unknown distribution kind.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("tables.diurnal", e.to_string()))
    }
}

/// Ordering corrections applied while sampling a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleCorrections {
    /// Leave was sampled before wake and moved to wake + 30.
    pub leave_after_wake: bool,
    /// Return was sampled before leave and set equal to leave.
    pub return_after_leave: bool,
    /// Return fell after bedtime and moved to sleep − 30.
    pub return_before_sleep: bool,
    /// The previous correction pushed return before leave; leave moved back to return.
    pub away_collapsed: bool,
}

impl ScheduleCorrections {
    pub fn any(&self) -> bool {
        self.leave_after_wake
            || self.return_after_leave
            || self.return_before_sleep
            || self.away_collapsed
    }
}

/// One day's sampled activity instants, in minutes from midnight.
///
/// `sleep` may exceed 1440 when bedtime falls after midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupantSchedule {
    wake: i32,
    leave: i32,
    return_home: i32,
    sleep: i32,
    corrections: ScheduleCorrections,
}

impl OccupantSchedule {
    /// Builds a schedule from explicit instants.
    ///
    /// # Errors
    ///
    /// Returns a `SamplingError` unless `0 <= wake < 1440`,
    /// `wake <= leave <= return_home <= sleep` and `sleep < wake + 1440`.
    pub fn new(wake: i32, leave: i32, return_home: i32, sleep: i32) -> Result<Self, SamplingError> {
        Self::checked(wake, leave, return_home, sleep, ScheduleCorrections::default())
    }

    fn checked(
        wake: i32,
        leave: i32,
        return_home: i32,
        sleep: i32,
        corrections: ScheduleCorrections,
    ) -> Result<Self, SamplingError> {
        if !(0..DAY).contains(&wake) {
            return Err(SamplingError::OutOfRange {
                quantity: "wake minute",
                value: f64::from(wake),
                valid: "[0, 1440)",
            });
        }
        let ordered = wake <= leave && leave <= return_home && return_home <= sleep;
        if !ordered || sleep >= wake + DAY {
            return Err(SamplingError::ScheduleOrder {
                wake,
                leave,
                return_home,
                sleep,
            });
        }
        Ok(Self {
            wake,
            leave,
            return_home,
            sleep,
            corrections,
        })
    }

    pub fn wake(&self) -> i32 {
        self.wake
    }

    pub fn leave(&self) -> i32 {
        self.leave
    }

    pub fn return_home(&self) -> i32 {
        self.return_home
    }

    pub fn sleep(&self) -> i32 {
        self.sleep
    }

    /// Whether bedtime falls after midnight.
    pub fn sleep_wraps(&self) -> bool {
        self.sleep >= DAY
    }

    pub fn corrections(&self) -> ScheduleCorrections {
        self.corrections
    }
}

#[derive(Debug, Clone)]
enum MinuteVariable {
    Normal(Normal<f64>),
    Uniform(Uniform<f64>),
}

impl MinuteVariable {
    fn build(field: &str, spec: &TimeDistribution) -> Result<Self, ConfigError> {
        match *spec {
            TimeDistribution::Normal { mean, sd } => Normal::new(mean, sd)
                .map(Self::Normal)
                .map_err(|e| ConfigError::new(field, format!("invalid normal(mean={mean}, sd={sd}): {e}"))),
            TimeDistribution::Uniform { low, high } => Uniform::new_inclusive(low, high)
                .map(Self::Uniform)
                .map_err(|e| ConfigError::new(field, format!("invalid uniform({low}, {high}): {e}"))),
        }
    }

    /// Draws one value rounded to the nearest whole minute.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        let x = match self {
            Self::Normal(d) => d.sample(rng),
            Self::Uniform(d) => d.sample(rng),
        };
        x.round() as i32
    }
}

#[derive(Debug, Clone)]
struct PatternVariables {
    wake: MinuteVariable,
    leave: MinuteVariable,
    away: MinuteVariable,
    sleep: MinuteVariable,
}

impl PatternVariables {
    fn build(prefix: &str, pattern: &DiurnalPattern) -> Result<Self, ConfigError> {
        Ok(Self {
            wake: MinuteVariable::build(&format!("{prefix}.wake"), &pattern.wake)?,
            leave: MinuteVariable::build(&format!("{prefix}.leave"), &pattern.leave)?,
            away: MinuteVariable::build(&format!("{prefix}.away"), &pattern.away)?,
            sleep: MinuteVariable::build(&format!("{prefix}.sleep"), &pattern.sleep)?,
        })
    }
}

/// Samples [`OccupantSchedule`]s from a validated diurnal table.
#[derive(Debug, Clone)]
pub struct OccupantScheduleModel {
    weekday: BTreeMap<Age, PatternVariables>,
    weekend: PatternVariables,
}

impl OccupantScheduleModel {
    /// Builds every random variable of the table up front.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first variable with invalid parameters.
    pub fn new(params: &DiurnalParameters) -> Result<Self, ConfigError> {
        let weekday = params
            .weekday
            .iter()
            .map(|(age, pattern)| {
                PatternVariables::build(&format!("diurnal.weekday.{age}"), pattern)
                    .map(|vars| (*age, vars))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        let weekend = PatternVariables::build("diurnal.weekend", &params.weekend)?;
        Ok(Self { weekday, weekend })
    }

    /// Fails with a `ConfigError` if the table has no weekday pattern for `age`.
    pub fn ensure_age(&self, age: Age) -> Result<(), ConfigError> {
        self.weekday_pattern(age).map(|_| ())
    }

    fn weekday_pattern(&self, age: Age) -> Result<&PatternVariables, ConfigError> {
        self.weekday.get(&age).ok_or_else(|| {
            ConfigError::new(
                "occupant.age",
                format!("no diurnal pattern for age category \"{age}\""),
            )
        })
    }

    /// Samples one day's schedule.
    ///
    /// Sleep is computed from the sampled wake instant and an independent
    /// sleep-duration draw as `wake − duration + 1440`. Ordering corrections:
    /// leave before wake moves leave to wake + 30; return before leave sets
    /// return to leave; return after bedtime moves return to sleep − 30, and
    /// if that lands before leave, leave moves back to return.
    ///
    /// # Errors
    ///
    /// `ConfigError` for an unknown age on a weekday; `SamplingError` if the
    /// wake instant falls outside the day or the sleep duration is not in (0, 1410].
    pub fn sample<R: Rng + ?Sized>(
        &self,
        age: Age,
        weekday: bool,
        rng: &mut R,
    ) -> Result<OccupantSchedule, SimError> {
        let vars = if weekday {
            self.weekday_pattern(age)?
        } else {
            &self.weekend
        };

        let wake = vars.wake.sample(rng);
        let sleep_duration = vars.sleep.sample(rng);
        if sleep_duration <= 0 || sleep_duration > MAX_SLEEP_DURATION_MIN {
            return Err(SamplingError::OutOfRange {
                quantity: "sleep duration (min)",
                value: f64::from(sleep_duration),
                valid: "(0, 1410]",
            }
            .into());
        }
        let sleep = wake - sleep_duration + DAY;

        let mut corrections = ScheduleCorrections::default();
        let mut leave = vars.leave.sample(rng);
        if leave < wake {
            leave = wake + CORRECTION_SHIFT_MIN;
            corrections.leave_after_wake = true;
        }

        let mut return_home = leave + vars.away.sample(rng);
        if return_home < leave {
            return_home = leave;
            corrections.return_after_leave = true;
        }
        if sleep < return_home {
            return_home = sleep - CORRECTION_SHIFT_MIN;
            corrections.return_before_sleep = true;
        }
        if return_home < leave {
            leave = return_home;
            corrections.away_collapsed = true;
        }

        let schedule = OccupantSchedule::checked(wake, leave, return_home, sleep, corrections)?;
        if corrections.any() {
            debug!(?corrections, wake, leave, return_home, sleep, "occupant schedule corrected");
        }
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_diurnal_parameters;
    use rand::{SeedableRng, rngs::StdRng};

    fn fixed(value: f64) -> TimeDistribution {
        TimeDistribution::Uniform {
            low: value,
            high: value,
        }
    }

    fn single_pattern_params(pattern: DiurnalPattern) -> DiurnalParameters {
        let mut weekday = BTreeMap::new();
        weekday.insert(Age::WorkAd, pattern.clone());
        DiurnalParameters {
            weekday,
            weekend: pattern,
        }
    }

    #[test]
    fn sampled_schedules_are_ordered() {
        let params = default_diurnal_parameters().expect("embedded table parses");
        let model = OccupantScheduleModel::new(&params).expect("valid table");
        let mut rng = StdRng::seed_from_u64(11);
        for age in [Age::Child, Age::Teen, Age::HomeAd, Age::WorkAd, Age::Senior] {
            for weekday in [true, false] {
                for _ in 0..2_000 {
                    let s = model.sample(age, weekday, &mut rng).expect("sample");
                    assert!(s.wake() <= s.leave());
                    assert!(s.leave() <= s.return_home());
                    assert!(s.return_home() <= s.sleep());
                    assert_eq!(s.sleep_wraps(), s.sleep() >= 1440);
                }
            }
        }
    }

    #[test]
    fn leave_before_wake_is_corrected() {
        let params = single_pattern_params(DiurnalPattern {
            wake: fixed(420.0),
            leave: fixed(400.0),
            away: fixed(480.0),
            sleep: fixed(480.0),
        });
        let model = OccupantScheduleModel::new(&params).expect("valid");
        let mut rng = StdRng::seed_from_u64(0);
        let s = model.sample(Age::WorkAd, true, &mut rng).expect("sample");
        assert_eq!(s.leave(), 450);
        assert_eq!(s.return_home(), 930);
        assert_eq!(s.sleep(), 420 - 480 + 1440);
        assert!(s.corrections().leave_after_wake);
        assert!(!s.sleep_wraps());
    }

    #[test]
    fn negative_away_means_no_leave() {
        let params = single_pattern_params(DiurnalPattern {
            wake: fixed(390.0),
            leave: fixed(480.0),
            away: fixed(-60.0),
            sleep: fixed(480.0),
        });
        let model = OccupantScheduleModel::new(&params).expect("valid");
        let s = model
            .sample(Age::WorkAd, true, &mut StdRng::seed_from_u64(0))
            .expect("sample");
        assert_eq!(s.return_home(), s.leave());
        assert!(s.corrections().return_after_leave);
    }

    #[test]
    fn late_return_is_pulled_before_bedtime() {
        let params = single_pattern_params(DiurnalPattern {
            wake: fixed(390.0),
            leave: fixed(1200.0),
            away: fixed(600.0),
            sleep: fixed(600.0),
        });
        let model = OccupantScheduleModel::new(&params).expect("valid");
        let s = model
            .sample(Age::WorkAd, true, &mut StdRng::seed_from_u64(0))
            .expect("sample");
        // sleep = 390 - 600 + 1440 = 1230, return = 1200 after pulling back
        assert_eq!(s.sleep(), 1230);
        assert_eq!(s.return_home(), 1200);
        assert!(s.corrections().return_before_sleep);
        assert!(!s.corrections().away_collapsed);
    }

    #[test]
    fn away_collapses_when_leave_is_after_bedtime_band() {
        let params = single_pattern_params(DiurnalPattern {
            wake: fixed(390.0),
            leave: fixed(1225.0),
            away: fixed(600.0),
            sleep: fixed(600.0),
        });
        let model = OccupantScheduleModel::new(&params).expect("valid");
        let s = model
            .sample(Age::WorkAd, true, &mut StdRng::seed_from_u64(0))
            .expect("sample");
        assert_eq!(s.leave(), 1200);
        assert_eq!(s.return_home(), 1200);
        assert!(s.corrections().away_collapsed);
    }

    #[test]
    fn bedtime_after_midnight_sets_wrap_flag() {
        let params = single_pattern_params(DiurnalPattern {
            wake: fixed(480.0),
            leave: fixed(540.0),
            away: fixed(480.0),
            sleep: fixed(420.0),
        });
        let model = OccupantScheduleModel::new(&params).expect("valid");
        let s = model
            .sample(Age::WorkAd, false, &mut StdRng::seed_from_u64(0))
            .expect("sample");
        assert_eq!(s.sleep(), 1500);
        assert!(s.sleep_wraps());
    }

    #[test]
    fn non_positive_sleep_duration_is_a_sampling_error() {
        let params = single_pattern_params(DiurnalPattern {
            wake: fixed(390.0),
            leave: fixed(480.0),
            away: fixed(480.0),
            sleep: fixed(0.0),
        });
        let model = OccupantScheduleModel::new(&params).expect("valid");
        let err = model.sample(Age::WorkAd, true, &mut StdRng::seed_from_u64(0));
        assert!(matches!(
            err,
            Err(SimError::Sampling(SamplingError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn unknown_age_is_a_config_error() {
        let params = single_pattern_params(DiurnalPattern {
            wake: fixed(390.0),
            leave: fixed(480.0),
            away: fixed(480.0),
            sleep: fixed(480.0),
        });
        let model = OccupantScheduleModel::new(&params).expect("valid");
        let err = model.sample(Age::Senior, true, &mut StdRng::seed_from_u64(0));
        assert!(matches!(err, Err(SimError::Config(_))));
        // weekends share one pattern for every age
        assert!(model.sample(Age::Senior, false, &mut StdRng::seed_from_u64(0)).is_ok());
    }

    #[test]
    fn negative_sd_is_rejected_at_construction() {
        let params = single_pattern_params(DiurnalPattern {
            wake: TimeDistribution::Normal { mean: 390.0, sd: -5.0 },
            leave: fixed(480.0),
            away: fixed(480.0),
            sleep: fixed(480.0),
        });
        let err = OccupantScheduleModel::new(&params).expect_err("must fail");
        assert_eq!(err.field, "diurnal.weekday.work_ad.wake");
    }

    #[test]
    fn unknown_distribution_kind_fails_to_parse() {
        let toml = r#"
[weekday.work_ad]
wake = { dist = "gamma", shape = 2.0 }
leave = { dist = "normal", mean = 480.0, sd = 60.0 }
away = { dist = "normal", mean = 540.0, sd = 60.0 }
sleep = { dist = "normal", mean = 480.0, sd = 60.0 }

[weekend]
wake = { dist = "normal", mean = 480.0, sd = 60.0 }
leave = { dist = "normal", mean = 660.0, sd = 60.0 }
away = { dist = "normal", mean = 240.0, sd = 60.0 }
sleep = { dist = "normal", mean = 480.0, sd = 60.0 }
"#;
        assert!(DiurnalParameters::from_toml_str(toml).is_err());
    }

    #[test]
    fn explicit_schedule_validates_order() {
        assert!(OccupantSchedule::new(390, 480, 1080, 1350).is_ok());
        assert!(OccupantSchedule::new(390, 380, 1080, 1350).is_err());
        assert!(OccupantSchedule::new(1500, 1500, 1500, 1600).is_err());
        assert!(OccupantSchedule::new(390, 480, 1080, 390 + 1440).is_err());
    }
}
