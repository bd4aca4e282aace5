//! Trial construction from a scenario and Monte-Carlo batch execution.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;

use crate::ambient::{AmbientFeed, ConstantAmbient, HourlyAmbientSeries};
use crate::config::ScenarioConfig;
use crate::error::{ConfigError, SimError};
use crate::sim::engine::{Engine, HeaterSetup, Occupant, TrialOutcome};
use crate::sim::sampler::DrawEventSampler;
use crate::sim::schedule::OccupantScheduleModel;

/// Seed distance between consecutive trials of a batch.
pub const TRIAL_SEED_STRIDE: u64 = 1_000_003;

/// Seed of trial `index` in a batch started from `base_seed`.
pub fn trial_seed(base_seed: u64, index: usize) -> u64 {
    base_seed.wrapping_add((index as u64).wrapping_mul(TRIAL_SEED_STRIDE))
}

/// Builds the ambient feed named by the scenario.
///
/// # Errors
///
/// Returns a `ConfigError` if the CSV cannot be loaded.
pub fn build_ambient(cfg: &ScenarioConfig) -> Result<Arc<dyn AmbientFeed>, ConfigError> {
    match &cfg.ambient.csv {
        Some(path) => {
            let series = HourlyAmbientSeries::from_csv_file(path, &cfg.ambient.column)?;
            info!(path = %path.display(), samples = series.len(), "ambient series loaded");
            Ok(Arc::new(series))
        }
        None => Ok(Arc::new(ConstantAmbient::new(cfg.ambient.temperature))),
    }
}

/// Builds a validated engine for the scenario.
///
/// # Errors
///
/// Returns every validation error of the scenario, or the first error
/// raised while loading tables or constructing the samplers.
pub fn build_engine(cfg: &ScenarioConfig) -> Result<Engine, Vec<ConfigError>> {
    let errors = cfg.validate();
    if !errors.is_empty() {
        return Err(errors);
    }
    build_validated(cfg).map_err(|e| vec![e])
}

fn build_validated(cfg: &ScenarioConfig) -> Result<Engine, ConfigError> {
    let sim_config = cfg.sim_config()?;
    let schedules = OccupantScheduleModel::new(&cfg.tables.diurnal_parameters()?)?;
    let sampler = DrawEventSampler::new(&cfg.tables.draw_stats()?)?;
    let wh = &cfg.water_heater;
    let heater = HeaterSetup {
        config: wh.heater(),
        randomised: wh.randomised,
        randomised_start: wh.randomised_start,
        initial_temp: wh.initial_temp,
    };
    let occupant = Occupant {
        age: cfg.occupant.age,
        intensity: cfg.occupant.intensity(wh.draw_rate),
        weights: cfg.presence,
    };
    let ambient = build_ambient(cfg)?;
    Engine::new(sim_config, heater, occupant, schedules, sampler, ambient)
}

/// Runs `trials` independent trials in parallel.
///
/// Trial `i` uses seed [`trial_seed`]`(seed, i)`, so results do not depend
/// on thread scheduling. Outcomes are returned in trial order.
///
/// # Errors
///
/// Returns the error of the lowest-numbered failing trial.
pub fn run_batch(engine: &Engine, trials: usize) -> Result<Vec<TrialOutcome>, SimError> {
    let base_seed = engine.config().seed;
    (0..trials)
        .into_par_iter()
        .map(|i| engine.run_seeded(trial_seed(base_seed, i)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

/// Builds the engine and runs every trial the scenario asks for.
///
/// # Errors
///
/// Returns configuration errors as `SimError::Config` (first error only);
/// use [`build_engine`] to see all of them.
pub fn run_scenario(cfg: &ScenarioConfig) -> Result<Vec<TrialOutcome>, SimError> {
    let engine = build_engine(cfg).map_err(|mut errors| SimError::Config(errors.remove(0)))?;
    run_batch(&engine, cfg.simulation.trials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::export::write_steps_csv;
    use crate::sim::types::DrawCountMode;
    use rstest::rstest;

    fn small_scenario(trials: usize) -> ScenarioConfig {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.days = 2;
        cfg.simulation.trials = trials;
        cfg.simulation.seed = 777;
        cfg
    }

    #[test]
    fn same_scenario_and_seed_is_deterministic() {
        let run_a = run_scenario(&small_scenario(1)).expect("run");
        let run_b = run_scenario(&small_scenario(1)).expect("run");

        let mut out_a = Vec::new();
        write_steps_csv(&run_a[0].results, &mut out_a).expect("first export should succeed");

        let mut out_b = Vec::new();
        write_steps_csv(&run_b[0].results, &mut out_b).expect("second export should succeed");

        assert_eq!(out_a, out_b);
    }

    #[test]
    fn batch_matches_sequential_runs() {
        let cfg = small_scenario(4);
        let engine = build_engine(&cfg).expect("valid");
        let batch = run_batch(&engine, 4).expect("batch");
        for (i, outcome) in batch.iter().enumerate() {
            let seed = trial_seed(777, i);
            assert_eq!(outcome.seed, seed);
            let single = engine.run_seeded(seed).expect("trial");
            assert_eq!(outcome.results, single.results);
        }
    }

    #[test]
    fn trial_seeds_are_distinct() {
        assert_eq!(trial_seed(5, 0), 5);
        assert_ne!(trial_seed(5, 1), trial_seed(5, 2));
        assert_eq!(trial_seed(u64::MAX, 1), TRIAL_SEED_STRIDE - 1);
    }

    #[test]
    fn invalid_scenario_reports_all_errors() {
        let mut cfg = small_scenario(1);
        cfg.water_heater.mass = -1.0;
        cfg.simulation.days = 0;
        let errors = build_engine(&cfg).err().unwrap_or_default();
        assert_eq!(errors.len(), 2);
    }

    #[rstest]
    #[case(1200)]
    #[case(1800)]
    #[case(3600)]
    fn step_too_long_for_a_shower_is_rejected_before_running(#[case] time_step_s: u32) {
        let mut cfg = small_scenario(1);
        cfg.simulation.time_step_s = time_step_s;
        assert!(cfg.validate().is_empty());

        let errors = build_engine(&cfg).err().unwrap_or_default();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "simulation.time_step_s");
        assert!(matches!(run_scenario(&cfg), Err(SimError::Config(_))));
    }

    #[test]
    fn fifteen_minute_steps_run() {
        let mut cfg = small_scenario(1);
        cfg.simulation.time_step_s = 900;
        cfg.simulation.draw_count = DrawCountMode::Single;
        let outcome = run_scenario(&cfg).expect("8.5 L/min fits a 15-minute step");
        assert_eq!(outcome[0].results.len(), 2 * 96);
    }

    #[test]
    fn missing_ambient_csv_is_a_config_error() {
        let mut cfg = small_scenario(1);
        cfg.ambient.csv = Some("no/such/file.csv".into());
        let errors = build_engine(&cfg).err().unwrap_or_default();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "ambient.csv");
    }
}
