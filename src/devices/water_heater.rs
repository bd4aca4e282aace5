//! Single-node thermal model of an electric storage water heater.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Deserialize;

use crate::error::{ConfigError, SamplingError};

/// Specific heat capacity of water in J/(kg·K).
pub const SPECIFIC_HEAT_CAPACITY: f64 = 4180.0;

/// Tank temperature used when the start state is not randomised (°C).
pub const DEFAULT_START_TEMP_C: f64 = 25.2;

/// Probability that a randomised start finds the element already heating.
const START_ELEMENT_ON_PROBABILITY: f64 = 0.04;

const RANDOMISED_ELEMENT_RATINGS_W: [f64; 3] = [2000.0, 3000.0, 4000.0];
const RANDOMISED_MASSES_KG: [f64; 4] = [100.0, 150.0, 200.0, 250.0];

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Physical and control parameters of one water heater.
///
/// Immutable for the duration of a trial. Construct a [`ThermalModel`] from
/// it to validate the invariants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaterHeaterConfig {
    /// Heating element rating (W).
    pub element_rating: f64,
    /// Mass of water in the tank (kg).
    pub mass: f64,
    /// Standing-loss time-constant coefficient; larger values lose heat more slowly.
    pub thermal_conduct: f64,
    /// Thermostat upper set point (°C).
    pub upper_temp_limit: f64,
    /// Thermostat lower set point (°C).
    pub lower_temp_limit: f64,
    /// Tank volume (L).
    pub volume: f64,
    /// Baseline draw rate (L/min).
    pub draw_rate: f64,
    /// Cold inlet water temperature (°C).
    pub inlet_temp: f64,
    /// Thermostat permanently enabled, or activated on a staggered daily cycle.
    pub always_on: bool,
}

impl Default for WaterHeaterConfig {
    fn default() -> Self {
        Self {
            element_rating: 3000.0,
            mass: 150.0,
            thermal_conduct: 0.341,
            upper_temp_limit: 60.0,
            lower_temp_limit: 50.0,
            volume: 150.0,
            draw_rate: 15.0,
            inlet_temp: 25.0,
            always_on: true,
        }
    }
}

impl WaterHeaterConfig {
    /// Checks the physical invariants and returns every violation.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let positive = [
            ("water_heater.element_rating", self.element_rating),
            ("water_heater.mass", self.mass),
            ("water_heater.volume", self.volume),
            ("water_heater.thermal_conduct", self.thermal_conduct),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                errors.push(ConfigError::new(field, format!("must be > 0, got {value}")));
            }
        }
        if !(self.draw_rate.is_finite() && self.draw_rate >= 0.0) {
            errors.push(ConfigError::new("water_heater.draw_rate", "must be >= 0"));
        }
        if self.upper_temp_limit <= self.lower_temp_limit {
            errors.push(ConfigError::new(
                "water_heater.upper_temp_limit",
                format!(
                    "must be > water_heater.lower_temp_limit ({} <= {})",
                    self.upper_temp_limit, self.lower_temp_limit
                ),
            ));
        }
        errors
    }

    /// Rejects a draw of `rate` L/min that would take more than the tank
    /// volume in one `dt`-second step.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` on `simulation.time_step_s`, the setting that
    /// has to shrink for the draw to fit.
    pub fn check_draw_fits(&self, rate: f64, dt: f64) -> Result<(), ConfigError> {
        let drawn = draw_volume_l(rate, dt);
        if drawn > self.volume {
            return Err(ConfigError::new(
                "simulation.time_step_s",
                format!(
                    "a {rate:.2} L/min draw takes {drawn:.2} L per {dt:.0} s step, more than the {:.2} L tank",
                    self.volume
                ),
            ));
        }
        Ok(())
    }

    /// Draws heater settings from the fixed pool of typical domestic units.
    ///
    /// Volume, inlet temperature, draw rate and the control mode are kept from `self`.
    pub fn randomised<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let element_rating = RANDOMISED_ELEMENT_RATINGS_W
            .choose(rng)
            .copied()
            .unwrap_or(self.element_rating);
        let mass = RANDOMISED_MASSES_KG.choose(rng).copied().unwrap_or(self.mass);
        let thermal_conduct = round_2dp(rng.random_range(0.30..=0.65));
        let upper_temp_limit = round_2dp(rng.random_range(56.0..=71.0));
        let lower_temp_limit = upper_temp_limit - round_2dp(rng.random_range(1.0..=5.0));

        Self {
            element_rating,
            mass,
            thermal_conduct,
            upper_temp_limit,
            lower_temp_limit,
            ..self.clone()
        }
    }
}

/// Two-state hysteresis thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Thermostat {
    #[default]
    Off,
    On,
}

/// Mutable per-trial state of the heater.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterHeaterState {
    /// Lumped tank temperature (°C).
    pub current_temp: f64,
    /// Whether the element heated during the last evaluated step.
    pub element_on: bool,
    /// Whether thermostat control is enabled; when false the element never heats.
    pub is_active: bool,
    /// Whether a draw was applied during the last step.
    pub draw_event_active: bool,
}

impl WaterHeaterState {
    /// State at a given temperature with the element off and control enabled.
    pub fn at_temperature(current_temp: f64) -> Self {
        Self {
            current_temp,
            element_on: false,
            is_active: true,
            draw_event_active: false,
        }
    }

    pub fn thermostat(&self) -> Thermostat {
        if self.element_on {
            Thermostat::On
        } else {
            Thermostat::Off
        }
    }
}

/// Outputs of one time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutput {
    /// Tank temperature at the end of the step (°C).
    pub temp_c: f64,
    /// Element power during the step (W): 0 or the element rating.
    pub power_w: f64,
    /// Hot water drawn during the step (L).
    pub draw_volume_l: f64,
    /// Thermostat state that governed this step.
    pub thermostat: Thermostat,
}

/// Lumped-capacitance heat transfer and thermostat logic for one heater.
///
/// # Examples
///
/// ```
/// use ewh_sim::devices::water_heater::{ThermalModel, WaterHeaterConfig, WaterHeaterState};
///
/// let model = ThermalModel::new(WaterHeaterConfig::default()).unwrap();
/// let mut state = WaterHeaterState::at_temperature(45.0);
/// let out = model.step(&mut state, 25.0, 60.0, None).unwrap();
/// assert_eq!(out.power_w, 3000.0);
/// ```
#[derive(Debug, Clone)]
pub struct ThermalModel {
    config: WaterHeaterConfig,
}

impl ThermalModel {
    /// Creates a thermal model, rejecting physically invalid settings.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` reported by [`WaterHeaterConfig::validate`].
    pub fn new(config: WaterHeaterConfig) -> Result<Self, ConfigError> {
        if let Some(err) = config.validate().into_iter().next() {
            return Err(err);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &WaterHeaterConfig {
        &self.config
    }

    /// Builds the start state of a trial.
    ///
    /// With `randomized`, the temperature is drawn uniformly between the
    /// thermostat limits (2 dp) and the element starts on with a 4% chance.
    /// Otherwise the tank starts at [`DEFAULT_START_TEMP_C`] with the element off.
    pub fn initialize<R: Rng + ?Sized>(&self, randomized: bool, rng: &mut R) -> WaterHeaterState {
        let mut state = WaterHeaterState {
            current_temp: DEFAULT_START_TEMP_C,
            element_on: false,
            is_active: self.config.always_on,
            draw_event_active: false,
        };
        if randomized {
            state.element_on = rng.random_bool(START_ELEMENT_ON_PROBABILITY);
            state.current_temp = round_2dp(
                rng.random_range(self.config.lower_temp_limit..=self.config.upper_temp_limit),
            );
        }
        state
    }

    /// Exponential relaxation of `temp` toward `ambient_temp` over `dt` seconds.
    pub fn apply_standing_loss(&self, temp: f64, ambient_temp: f64, dt: f64) -> f64 {
        debug_assert!(dt > 0.0);
        let alpha = -dt / (SPECIFIC_HEAT_CAPACITY * self.config.mass * self.config.thermal_conduct);
        ambient_temp + (temp - ambient_temp) * alpha.exp()
    }

    /// Volume-weighted mixing with inlet water for a draw of `draw_rate` L/min over `dt` seconds.
    pub fn apply_draw_loss(&self, temp: f64, draw_rate: f64, dt: f64) -> f64 {
        let drawn = draw_volume_l(draw_rate, dt);
        let sigma = (self.config.volume - drawn) / self.config.volume;
        sigma * (temp - self.config.inlet_temp) + self.config.inlet_temp
    }

    /// Runs the element for `dt` seconds and returns `(temp, power_w)`.
    pub fn apply_heating(&self, temp: f64, dt: f64) -> (f64, f64) {
        debug_assert!(dt > 0.0);
        let energy_j = self.config.element_rating * dt;
        let temp = temp + energy_j / (SPECIFIC_HEAT_CAPACITY * self.config.mass);
        (temp, self.config.element_rating)
    }

    /// Advances the heater by one step: standing loss, draw loss, then thermostat.
    ///
    /// # Arguments
    ///
    /// * `state` - Heater state, updated in place
    /// * `ambient_temp` - Ambient temperature for this step (°C)
    /// * `dt` - Step length (s), must be > 0
    /// * `draw_rate` - Active draw rate (L/min), or `None` when no draw is active
    ///
    /// # Errors
    ///
    /// Returns `SamplingError::DrawExceedsVolume` if the step would draw more
    /// water than the tank holds.
    pub fn step(
        &self,
        state: &mut WaterHeaterState,
        ambient_temp: f64,
        dt: f64,
        draw_rate: Option<f64>,
    ) -> Result<StepOutput, SamplingError> {
        state.current_temp = self.apply_standing_loss(state.current_temp, ambient_temp, dt);

        let mut draw_volume = 0.0;
        state.draw_event_active = draw_rate.is_some();
        if let Some(rate) = draw_rate {
            draw_volume = draw_volume_l(rate, dt);
            if draw_volume > self.config.volume {
                return Err(SamplingError::DrawExceedsVolume {
                    drawn_l: draw_volume,
                    volume_l: self.config.volume,
                });
            }
            state.current_temp = self.apply_draw_loss(state.current_temp, rate, dt);
        }

        let thermostat = self.evaluate_thermostat(state);
        let mut power_w = 0.0;
        if thermostat == Thermostat::On {
            let (temp, power) = self.apply_heating(state.current_temp, dt);
            state.current_temp = temp;
            power_w = power;
        }

        Ok(StepOutput {
            temp_c: state.current_temp,
            power_w,
            draw_volume_l: draw_volume,
            thermostat,
        })
    }

    /// Applies the hysteresis transition for the current temperature.
    fn evaluate_thermostat(&self, state: &mut WaterHeaterState) -> Thermostat {
        let next = if !state.is_active {
            Thermostat::Off
        } else {
            match state.thermostat() {
                Thermostat::On if state.current_temp >= self.config.upper_temp_limit => {
                    Thermostat::Off
                }
                Thermostat::Off if state.current_temp < self.config.lower_temp_limit => {
                    Thermostat::On
                }
                current => current,
            }
        };
        state.element_on = next == Thermostat::On;
        next
    }
}

/// Litres drawn in `dt` seconds at `rate` L/min.
pub fn draw_volume_l(rate: f64, dt: f64) -> f64 {
    rate * dt / 60.0
}
