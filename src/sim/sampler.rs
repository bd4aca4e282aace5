//! Draw-event sampling: daily counts, durations, intensities and start times.

use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::{Binomial, ChiSquared, Distribution, Normal, Poisson};
use serde::Deserialize;

use super::event::DrawEvent;
use super::presence::PresenceDistribution;
use super::types::{Age, DrawCountMode};
use crate::error::{ConfigError, SamplingError, SimError};

/// Daily event-count distribution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "dist", rename_all = "snake_case")]
pub enum FrequencyDistribution {
    /// `n` trials with an age-specific success probability.
    Binomial { n: u64, p: BTreeMap<Age, f64> },
    /// Age-specific mean count per day.
    Poisson { lambda: BTreeMap<Age, f64> },
}

/// Event-duration distribution in minutes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "dist", rename_all = "snake_case")]
pub enum DurationDistribution {
    /// Age-specific degrees of freedom; the mean duration equals `df`.
    ChiSquared { df: BTreeMap<Age, f64> },
    Normal {
        mean: BTreeMap<Age, f64>,
        sd: BTreeMap<Age, f64>,
    },
}

/// A named draw kind, e.g. `NormalShower`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrawSubtype {
    /// Flow rate (L/min).
    pub intensity: f64,
}

/// Statistics table of one end use.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrawEventStats {
    pub frequency: FrequencyDistribution,
    pub duration: DurationDistribution,
    pub subtype: BTreeMap<String, DrawSubtype>,
}

impl DrawEventStats {
    /// Parses the table from TOML.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for malformed TOML or an unknown distribution kind.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("tables.draw_stats", e.to_string()))
    }
}

/// Where the flow rate of sampled events comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawIntensity {
    /// Looked up by subtype name in the statistics table.
    Subtype(String),
    /// A fixed rate (L/min), typically the heater's baseline draw rate.
    Fixed(f64),
}

#[derive(Debug, Clone)]
enum CountVariable {
    Binomial(Binomial),
    Poisson(Poisson<f64>),
}

impl CountVariable {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match self {
            Self::Binomial(d) => d.sample(rng) as u32,
            Self::Poisson(d) => d.sample(rng) as u32,
        }
    }
}

#[derive(Debug, Clone)]
enum DurationVariable {
    ChiSquared(ChiSquared<f64>),
    Normal(Normal<f64>),
}

impl DurationVariable {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::ChiSquared(d) => d.sample(rng),
            Self::Normal(d) => d.sample(rng),
        }
    }
}

fn build_frequency(dist: &FrequencyDistribution) -> Result<BTreeMap<Age, CountVariable>, ConfigError> {
    match dist {
        FrequencyDistribution::Binomial { n, p } => p
            .iter()
            .map(|(age, p)| {
                Binomial::new(*n, *p)
                    .map(|d| (*age, CountVariable::Binomial(d)))
                    .map_err(|e| {
                        ConfigError::new(
                            format!("draw_stats.frequency.p.{age}"),
                            format!("invalid binomial(n={n}, p={p}): {e}"),
                        )
                    })
            })
            .collect(),
        FrequencyDistribution::Poisson { lambda } => lambda
            .iter()
            .map(|(age, lambda)| {
                Poisson::new(*lambda)
                    .map(|d| (*age, CountVariable::Poisson(d)))
                    .map_err(|e| {
                        ConfigError::new(
                            format!("draw_stats.frequency.lambda.{age}"),
                            format!("invalid poisson(lambda={lambda}): {e}"),
                        )
                    })
            })
            .collect(),
    }
}

fn build_duration(dist: &DurationDistribution) -> Result<BTreeMap<Age, DurationVariable>, ConfigError> {
    match dist {
        DurationDistribution::ChiSquared { df } => df
            .iter()
            .map(|(age, df)| {
                ChiSquared::new(*df)
                    .map(|d| (*age, DurationVariable::ChiSquared(d)))
                    .map_err(|e| {
                        ConfigError::new(
                            format!("draw_stats.duration.df.{age}"),
                            format!("invalid chi_squared(df={df}): {e}"),
                        )
                    })
            })
            .collect(),
        DurationDistribution::Normal { mean, sd } => {
            if let Some(age) = sd.keys().find(|age| !mean.contains_key(*age)) {
                return Err(ConfigError::new(
                    format!("draw_stats.duration.mean.{age}"),
                    "sd given without a matching mean",
                ));
            }
            mean.iter()
                .map(|(age, mu)| {
                    let sigma = sd.get(age).copied().ok_or_else(|| {
                        ConfigError::new(
                            format!("draw_stats.duration.sd.{age}"),
                            "mean given without a matching sd",
                        )
                    })?;
                    Normal::new(*mu, sigma)
                        .map(|d| (*age, DurationVariable::Normal(d)))
                        .map_err(|e| {
                            ConfigError::new(
                                format!("draw_stats.duration.sd.{age}"),
                                format!("invalid normal(mean={mu}, sd={sigma}): {e}"),
                            )
                        })
                })
                .collect()
        }
    }
}

/// Samples draw events for one occupant.
///
/// All distributions are built when the sampler is constructed, so a bad
/// table fails trial setup instead of the first simulated day.
#[derive(Debug, Clone)]
pub struct DrawEventSampler {
    frequency: BTreeMap<Age, CountVariable>,
    duration: BTreeMap<Age, DurationVariable>,
    intensities: BTreeMap<String, f64>,
}

impl DrawEventSampler {
    /// # Errors
    ///
    /// Returns a `ConfigError` for invalid distribution parameters or a
    /// subtype whose intensity is not a positive finite number.
    pub fn new(stats: &DrawEventStats) -> Result<Self, ConfigError> {
        let frequency = build_frequency(&stats.frequency)?;
        let duration = build_duration(&stats.duration)?;
        let intensities = stats
            .subtype
            .iter()
            .map(|(name, subtype)| {
                if subtype.intensity.is_finite() && subtype.intensity > 0.0 {
                    Ok((name.clone(), subtype.intensity))
                } else {
                    Err(ConfigError::new(
                        format!("draw_stats.subtype.{name}.intensity"),
                        format!("must be > 0, got {}", subtype.intensity),
                    ))
                }
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(Self {
            frequency,
            duration,
            intensities,
        })
    }

    /// Fails unless both the frequency and duration tables cover `age`.
    pub fn ensure_age(&self, age: Age) -> Result<(), ConfigError> {
        self.frequency_for(age)?;
        self.duration_for(age)?;
        Ok(())
    }

    fn frequency_for(&self, age: Age) -> Result<&CountVariable, ConfigError> {
        self.frequency.get(&age).ok_or_else(|| {
            ConfigError::new(
                "occupant.age",
                format!("no draw frequency for age category \"{age}\""),
            )
        })
    }

    fn duration_for(&self, age: Age) -> Result<&DurationVariable, ConfigError> {
        self.duration.get(&age).ok_or_else(|| {
            ConfigError::new(
                "occupant.age",
                format!("no draw duration for age category \"{age}\""),
            )
        })
    }

    /// Looks up the fixed flow rate of a named subtype (L/min).
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `subtype` is not in the table.
    pub fn intensity(&self, subtype: &str) -> Result<f64, ConfigError> {
        self.intensities.get(subtype).copied().ok_or_else(|| {
            let known: Vec<&str> = self.intensities.keys().map(String::as_str).collect();
            ConfigError::new(
                "occupant.subtype",
                format!("unknown draw subtype \"{subtype}\" (known: {})", known.join(", ")),
            )
        })
    }

    /// Resolves a [`DrawIntensity`] to a flow rate.
    pub fn resolve_intensity(&self, source: &DrawIntensity) -> Result<f64, ConfigError> {
        match source {
            DrawIntensity::Subtype(name) => self.intensity(name),
            DrawIntensity::Fixed(rate) => Ok(*rate),
        }
    }

    /// Draws the number of events for one day.
    pub fn sample_frequency<R: Rng + ?Sized>(&self, age: Age, rng: &mut R) -> Result<u32, ConfigError> {
        Ok(self.frequency_for(age)?.sample(rng))
    }

    /// Draws a duration rounded to the nearest whole minute.
    ///
    /// # Errors
    ///
    /// `ConfigError` for an age missing from the table; `SamplingError` when
    /// the draw is negative or not finite.
    pub fn sample_duration<R: Rng + ?Sized>(&self, age: Age, rng: &mut R) -> Result<u32, SimError> {
        let minutes = self.duration_for(age)?.sample(rng).round();
        if !(minutes.is_finite() && minutes >= 0.0) {
            return Err(SamplingError::OutOfRange {
                quantity: "draw duration (min)",
                value: minutes,
                valid: "[0, inf)",
            }
            .into());
        }
        Ok(minutes as u32)
    }

    /// Draws a duration and resolves the intensity of `source`.
    ///
    /// # Errors
    ///
    /// `ConfigError` for an unknown subtype or age; `SamplingError` for a
    /// negative duration.
    pub fn sample_duration_intensity<R: Rng + ?Sized>(
        &self,
        age: Age,
        source: &DrawIntensity,
        rng: &mut R,
    ) -> Result<(u32, f64), SimError> {
        let intensity = self.resolve_intensity(source)?;
        let duration = self.sample_duration(age, rng)?;
        Ok((duration, intensity))
    }

    /// Draws a start minute by nearest-value inverse-cdf lookup.
    ///
    /// When several minutes share the nearest cdf value one of them is picked
    /// uniformly, which can place a start inside a zero-weight run.
    pub fn sample_start<R: Rng + ?Sized>(&self, presence: &PresenceDistribution, rng: &mut R) -> usize {
        let u: f64 = rng.random();
        let run = presence.nearest_cdf_run(u);
        if run.len() > 1 {
            rng.random_range(run)
        } else {
            run.start
        }
    }

    /// Samples one complete event: duration and intensity, then the start minute.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        age: Age,
        source: &DrawIntensity,
        presence: &PresenceDistribution,
        rng: &mut R,
    ) -> Result<DrawEvent, SimError> {
        let (duration, intensity) = self.sample_duration_intensity(age, source, rng)?;
        let start = self.sample_start(presence, rng);
        Ok(DrawEvent::new(start, duration, intensity))
    }

    /// Samples every event of one day, ordered by start minute.
    pub fn simulate_day<R: Rng + ?Sized>(
        &self,
        age: Age,
        source: &DrawIntensity,
        presence: &PresenceDistribution,
        mode: DrawCountMode,
        rng: &mut R,
    ) -> Result<Vec<DrawEvent>, SimError> {
        // an unknown subtype fails even on a day without draws
        self.resolve_intensity(source)?;
        let count = match mode {
            DrawCountMode::Single => 1,
            DrawCountMode::Sampled => self.sample_frequency(age, rng)?,
        };

        let mut events = (0..count)
            .map(|_| self.simulate(age, source, presence, rng))
            .collect::<Result<Vec<_>, SimError>>()?;
        events.sort_by_key(|e| e.start_minute);
        Ok(events)
    }
}
