//! TOML-based scenario configuration, preset definitions and built-in tables.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::ambient::DEFAULT_TEMPERATURE_COLUMN;
use crate::devices::WaterHeaterConfig;
use crate::devices::water_heater::DEFAULT_START_TEMP_C;
use crate::error::ConfigError;
use crate::sim::presence::PresenceWeights;
use crate::sim::sampler::{DrawEventStats, DrawIntensity};
use crate::sim::schedule::DiurnalParameters;
use crate::sim::types::{Age, DrawCountMode, SimConfig};

const DEFAULT_DIURNAL_TOML: &str = include_str!("../data/diurnal_distributions.toml");
const DEFAULT_SHOWER_TOML: &str = include_str!("../data/end_uses/shower.toml");

/// Parses the built-in diurnal statistics table.
pub fn default_diurnal_parameters() -> Result<DiurnalParameters, ConfigError> {
    DiurnalParameters::from_toml_str(DEFAULT_DIURNAL_TOML)
}

/// Parses the built-in shower statistics table.
pub fn default_draw_stats() -> Result<DrawEventStats, ConfigError> {
    DrawEventStats::from_toml_str(DEFAULT_SHOWER_TOML)
}

fn read_table(field: &str, path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path)
        .map_err(|e| ConfigError::new(field, format!("cannot read \"{}\": {e}", path.display())))
}

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Trial timing, seeding and batch size.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Heater parameters and start policy.
    #[serde(default)]
    pub water_heater: WaterHeaterSection,
    /// The occupant driving the draws.
    #[serde(default)]
    pub occupant: OccupantConfig,
    /// Presence label weights.
    #[serde(default)]
    pub presence: PresenceWeights,
    /// Ambient temperature source.
    #[serde(default)]
    pub ambient: AmbientConfig,
    /// Overrides for the built-in statistics tables.
    #[serde(default)]
    pub tables: TablesConfig,
}

/// Trial timing, seeding and batch size.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of days to simulate (must be > 0).
    pub days: usize,
    /// Step length in seconds (must divide 3600).
    pub time_step_s: u32,
    /// Master random seed.
    pub seed: u64,
    /// Number of independent trials (must be > 0).
    pub trials: usize,
    /// Calendar date of day 0 as `"YYYY-MM-DD"`.
    pub start_date: NaiveDate,
    /// Window for the staggered daily thermostat activation (minutes).
    pub activation_window_min: u32,
    /// `"single"` for one draw per day, `"sampled"` to draw the daily count.
    pub draw_count: DrawCountMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            days: 7,
            time_step_s: 60,
            seed: 42,
            trials: 1,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            activation_window_min: 150,
            draw_count: DrawCountMode::Sampled,
        }
    }
}

/// Heater parameters plus randomisation and start options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaterHeaterSection {
    /// Heating element rating (W).
    pub element_rating: f64,
    /// Baseline draw rate (L/min).
    pub draw_rate: f64,
    /// Cold inlet water temperature (°C).
    pub inlet_temp: f64,
    /// Mass of water in the tank (kg).
    pub mass: f64,
    /// Standing-loss coefficient.
    pub thermal_conduct: f64,
    /// Thermostat upper set point (°C).
    pub upper_temp_limit: f64,
    /// Thermostat lower set point (°C).
    pub lower_temp_limit: f64,
    /// Tank volume (L).
    pub volume: f64,
    /// Thermostat permanently enabled (otherwise staggered daily activation).
    pub always_on: bool,
    /// Draw heater settings from the typical-unit pool for each trial.
    pub randomised: bool,
    /// Draw the start temperature and element state for each trial.
    pub randomised_start: bool,
    /// Fixed start temperature (°C); overrides the default and the randomised start.
    pub initial_temp: Option<f64>,
}

impl Default for WaterHeaterSection {
    fn default() -> Self {
        let heater = WaterHeaterConfig::default();
        Self {
            element_rating: heater.element_rating,
            draw_rate: heater.draw_rate,
            inlet_temp: heater.inlet_temp,
            mass: heater.mass,
            thermal_conduct: heater.thermal_conduct,
            upper_temp_limit: heater.upper_temp_limit,
            lower_temp_limit: heater.lower_temp_limit,
            volume: heater.volume,
            always_on: heater.always_on,
            randomised: false,
            randomised_start: false,
            initial_temp: None,
        }
    }
}

impl WaterHeaterSection {
    /// The physical heater parameters of this section.
    pub fn heater(&self) -> WaterHeaterConfig {
        WaterHeaterConfig {
            element_rating: self.element_rating,
            mass: self.mass,
            thermal_conduct: self.thermal_conduct,
            upper_temp_limit: self.upper_temp_limit,
            lower_temp_limit: self.lower_temp_limit,
            volume: self.volume,
            draw_rate: self.draw_rate,
            inlet_temp: self.inlet_temp,
            always_on: self.always_on,
        }
    }
}

/// The occupant whose routine drives the draws.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OccupantConfig {
    /// Age category: `child`, `teen`, `home_ad`, `work_ad` or `senior`.
    pub age: Age,
    /// Draw subtype name in the statistics table; the heater's `draw_rate`
    /// is used as intensity when absent.
    pub subtype: Option<String>,
}

impl Default for OccupantConfig {
    fn default() -> Self {
        Self {
            age: Age::WorkAd,
            subtype: None,
        }
    }
}

impl OccupantConfig {
    /// Intensity source for the sampled draws.
    pub fn intensity(&self, baseline_draw_rate: f64) -> DrawIntensity {
        match &self.subtype {
            Some(name) => DrawIntensity::Subtype(name.clone()),
            None => DrawIntensity::Fixed(baseline_draw_rate),
        }
    }
}

/// Ambient temperature source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AmbientConfig {
    /// Constant ambient temperature used without a CSV (°C).
    pub temperature: f64,
    /// Hourly CSV with a `datetime` column.
    pub csv: Option<PathBuf>,
    /// Temperature column in the CSV.
    pub column: String,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_START_TEMP_C,
            csv: None,
            column: DEFAULT_TEMPERATURE_COLUMN.to_string(),
        }
    }
}

/// Overrides for the built-in statistics tables.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TablesConfig {
    /// Diurnal statistics TOML.
    pub diurnal: Option<PathBuf>,
    /// Draw statistics TOML.
    pub draw_stats: Option<PathBuf>,
}

impl TablesConfig {
    /// Loads the diurnal table from the override path or the built-in copy.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or parsed.
    pub fn diurnal_parameters(&self) -> Result<DiurnalParameters, ConfigError> {
        match &self.diurnal {
            Some(path) => DiurnalParameters::from_toml_str(&read_table("tables.diurnal", path)?),
            None => default_diurnal_parameters(),
        }
    }

    /// Loads the draw statistics from the override path or the built-in copy.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or parsed.
    pub fn draw_stats(&self) -> Result<DrawEventStats, ConfigError> {
        match &self.draw_stats {
            Some(path) => DrawEventStats::from_toml_str(&read_table("tables.draw_stats", path)?),
            None => default_draw_stats(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: one working adult taking normal showers,
    /// a fixed heater with its thermostat always enabled.
    pub fn baseline() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            water_heater: WaterHeaterSection::default(),
            occupant: OccupantConfig {
                subtype: Some("NormalShower".to_string()),
                ..OccupantConfig::default()
            },
            presence: PresenceWeights::default(),
            ambient: AmbientConfig::default(),
            tables: TablesConfig::default(),
        }
    }

    /// Returns the demand-response preset: thermostat enabled on a staggered
    /// daily cycle instead of continuously.
    pub fn demand_response() -> Self {
        Self {
            water_heater: WaterHeaterSection {
                always_on: false,
                ..WaterHeaterSection::default()
            },
            simulation: SimulationConfig {
                activation_window_min: 240,
                ..SimulationConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the randomised preset: heater settings and start state drawn
    /// per trial, a batch of trials.
    pub fn randomised() -> Self {
        Self {
            water_heater: WaterHeaterSection {
                randomised: true,
                randomised_start: true,
                ..WaterHeaterSection::default()
            },
            simulation: SimulationConfig {
                trials: 8,
                ..SimulationConfig::default()
            },
            occupant: OccupantConfig {
                age: Age::WorkAd,
                subtype: Some("FancyShower".to_string()),
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "demand_response", "randomised"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "demand_response" => Ok(Self::demand_response()),
            "randomised" => Ok(Self::randomised()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Trial timing for this scenario.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for an invalid step length or zero days.
    pub fn sim_config(&self) -> Result<SimConfig, ConfigError> {
        let s = &self.simulation;
        let mut config = SimConfig::new(s.time_step_s, s.days, s.seed)?;
        config.start_date = s.start_date;
        config.activation_window_min = s.activation_window_min;
        config.draw_count = s.draw_count;
        Ok(config)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        if s.days == 0 {
            errors.push(ConfigError::new("simulation.days", "must be > 0"));
        }
        if s.time_step_s == 0 || 3600 % s.time_step_s != 0 {
            errors.push(ConfigError::new(
                "simulation.time_step_s",
                format!("must be > 0 and divide 3600, got {}", s.time_step_s),
            ));
        }
        if s.trials == 0 {
            errors.push(ConfigError::new("simulation.trials", "must be > 0"));
        }
        if s.activation_window_min > 1440 {
            errors.push(ConfigError::new(
                "simulation.activation_window_min",
                "must be <= 1440",
            ));
        }

        let wh = &self.water_heater;
        errors.extend(wh.heater().validate());
        if let Some(temp) = wh.initial_temp {
            if !temp.is_finite() {
                errors.push(ConfigError::new("water_heater.initial_temp", "must be finite"));
            }
        }

        match &self.occupant.subtype {
            Some(subtype) if subtype.trim().is_empty() => {
                errors.push(ConfigError::new("occupant.subtype", "must not be empty"));
            }
            Some(_) => {}
            // subtype intensities are checked against the step once the table is loaded
            None if s.time_step_s > 0 => {
                if let Err(e) = wh.heater().check_draw_fits(wh.draw_rate, f64::from(s.time_step_s)) {
                    errors.push(e);
                }
            }
            None => {}
        }

        errors.extend(self.presence.validate());

        let amb = &self.ambient;
        if !amb.temperature.is_finite() {
            errors.push(ConfigError::new("ambient.temperature", "must be finite"));
        }
        if amb.csv.is_some() && amb.column.trim().is_empty() {
            errors.push(ConfigError::new("ambient.column", "must not be empty"));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = ScenarioConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let e = ScenarioConfig::from_preset("nonexistent").expect_err("unknown preset");
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn embedded_tables_parse() {
        let diurnal = default_diurnal_parameters().expect("diurnal table");
        assert_eq!(diurnal.weekday.len(), 5);
        assert!(default_draw_stats().is_ok());
    }

    #[test]
    fn work_adult_wakes_at_half_past_six_on_average() {
        let diurnal = default_diurnal_parameters().expect("diurnal table");
        let pattern = &diurnal.weekday[&Age::WorkAd];
        assert!(matches!(
            pattern.wake,
            crate::sim::schedule::TimeDistribution::Normal { mean, .. } if mean == 390.0
        ));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
days = 3
time_step_s = 300
seed = 99
trials = 4
start_date = "2024-03-02"
activation_window_min = 120
draw_count = "single"

[water_heater]
element_rating = 4000.0
draw_rate = 12.0
inlet_temp = 15.0
mass = 200.0
thermal_conduct = 0.45
upper_temp_limit = 65.0
lower_temp_limit = 55.0
volume = 200.0
always_on = false
randomised = false
randomised_start = true
initial_temp = 50.0

[occupant]
age = "teen"
subtype = "FancyShower"

[presence]
peak = 0.7
normal = 0.3
away = 0.0
night = 0.0

[ambient]
temperature = 18.0
column = "temperature_2m (°C)"
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert_eq!(cfg.simulation.days, 3);
        assert_eq!(cfg.simulation.draw_count, DrawCountMode::Single);
        assert_eq!(
            cfg.simulation.start_date,
            NaiveDate::from_ymd_opt(2024, 3, 2).expect("date")
        );
        assert_eq!(cfg.occupant.age, Age::Teen);
        assert_eq!(cfg.water_heater.initial_temp, Some(50.0));
        assert!(cfg.validate().is_empty());
        let sim = cfg.sim_config().expect("valid");
        assert_eq!(sim.periods_per_day(), 288);
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[water_heater]
mass = 150.0
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn unknown_age_fails_to_parse() {
        let toml = r#"
[occupant]
age = "toddler"
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_reports_every_violation() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.time_step_s = 7;
        cfg.simulation.trials = 0;
        cfg.water_heater.mass = 0.0;
        cfg.water_heater.upper_temp_limit = 40.0;
        cfg.presence.night = -0.1;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        for expected in [
            "simulation.time_step_s",
            "simulation.trials",
            "water_heater.mass",
            "water_heater.upper_temp_limit",
            "presence.night",
        ] {
            assert!(fields.iter().any(|f| f == expected), "missing {expected}: {fields:?}");
        }
    }

    #[test]
    fn baseline_draw_rate_must_fit_one_step() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.occupant.subtype = None;
        // 15 L/min for 10 minutes is exactly the 150 L tank
        cfg.simulation.time_step_s = 600;
        assert!(cfg.validate().is_empty());

        cfg.simulation.time_step_s = 900;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["simulation.time_step_s".to_string()]);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[simulation]
seed = 99
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("valid");
        assert_eq!(cfg.simulation.seed, 99);
        assert_eq!(cfg.simulation.time_step_s, 60);
        assert_eq!(cfg.water_heater.mass, 150.0);
        assert_eq!(cfg.presence, PresenceWeights::default());
        assert_eq!(cfg.occupant.intensity(15.0), DrawIntensity::Fixed(15.0));
    }

    #[test]
    fn demand_response_disables_always_on() {
        let dr = ScenarioConfig::demand_response();
        assert!(!dr.water_heater.always_on);
        assert!(ScenarioConfig::baseline().water_heater.always_on);
    }

    #[test]
    fn missing_table_override_is_reported() {
        let tables = TablesConfig {
            diurnal: Some(PathBuf::from("does/not/exist.toml")),
            draw_stats: None,
        };
        let err = tables.diurnal_parameters().expect_err("missing file");
        assert_eq!(err.field, "tables.diurnal");
    }
}
