//! Integration tests for the default water heater scenario.

mod common;

use approx::assert_relative_eq;
use ewh_sim::devices::water_heater::{SPECIFIC_HEAT_CAPACITY, WaterHeaterState};
use ewh_sim::devices::Thermostat;

const AMBIENT_C: f64 = 25.0;
const DT_S: f64 = 60.0;

fn heating_increment() -> f64 {
    let cfg = common::reference_heater();
    cfg.element_rating * DT_S / (SPECIFIC_HEAT_CAPACITY * cfg.mass)
}

#[test]
fn cold_tank_heats_to_upper_limit_then_switches_off() {
    let model = common::reference_model();
    let mut state = WaterHeaterState::at_temperature(45.0);

    let first = model.step(&mut state, AMBIENT_C, DT_S, None).expect("step");
    assert_eq!(first.thermostat, Thermostat::On);
    assert_eq!(first.power_w, 3000.0);

    let mut prev_temp = first.temp_c;
    let mut off_at = None;
    for step in 2..=200 {
        let before = model.apply_standing_loss(prev_temp, AMBIENT_C, DT_S);
        let out = model.step(&mut state, AMBIENT_C, DT_S, None).expect("step");
        if out.thermostat == Thermostat::Off {
            assert!(before >= 60.0, "switched off at {before:.3} C");
            off_at = Some(step);
            break;
        }
        assert!(before < 60.0, "still heating at {before:.3} C");
        prev_temp = out.temp_c;
    }

    // 15 C at ~0.287 C per step
    let off_at = off_at.expect("element should switch off");
    assert!((50..=60).contains(&off_at), "switched off at step {off_at}");
    assert!(state.current_temp >= 60.0 - 0.05);
}

#[test]
fn element_stays_off_until_lower_limit() {
    let model = common::reference_model();
    let mut state = WaterHeaterState::at_temperature(60.5);

    let mut steps = 0;
    loop {
        let before = model.apply_standing_loss(state.current_temp, AMBIENT_C, DT_S);
        let out = model.step(&mut state, AMBIENT_C, DT_S, None).expect("step");
        steps += 1;
        if before < 50.0 {
            assert_eq!(out.thermostat, Thermostat::On);
            break;
        }
        assert_eq!(out.thermostat, Thermostat::Off, "heating at {before:.3} C");
        assert!(steps < 10_000, "tank never cooled below the lower limit");
    }
}

#[test]
fn full_run_follows_thermostat_hysteresis() {
    let engine = common::default_engine(3, 42);
    let outcome = engine.run().expect("trial");
    let model = common::reference_model();
    let cfg = common::reference_heater();
    let increment = heating_increment();

    let mut prev_temp = 25.2;
    let mut prev_on = false;
    for r in &outcome.results {
        assert!(
            r.temp_c <= cfg.upper_temp_limit + increment + 1e-9,
            "period {}: {:.3} C overshoots",
            r.period,
            r.temp_c
        );

        let mut before = model.apply_standing_loss(prev_temp, r.ambient_c, DT_S);
        if r.draw_volume_l > 0.0 {
            let rate = r.draw_volume_l * 60.0 / DT_S;
            before = model.apply_draw_loss(before, rate, DT_S);
        }

        if r.is_active {
            match (prev_on, r.element_on) {
                (true, true) => assert!(before < cfg.upper_temp_limit, "period {}", r.period),
                (true, false) => assert!(before >= cfg.upper_temp_limit, "period {}", r.period),
                (false, true) => assert!(before < cfg.lower_temp_limit, "period {}", r.period),
                (false, false) => assert!(before >= cfg.lower_temp_limit, "period {}", r.period),
            }
        } else {
            assert!(!r.element_on);
        }

        prev_temp = r.temp_c;
        prev_on = r.element_on;
    }
}

#[test]
fn full_run_is_reproducible() {
    let a = common::default_engine(2, 1234).run().expect("trial");
    let b = common::default_engine(2, 1234).run().expect("trial");
    assert_eq!(a.results, b.results);
    assert_eq!(a.draws, b.draws);
    assert_eq!(a.kpi, b.kpi);

    let c = common::default_engine(2, 4321).run().expect("trial");
    assert_ne!(a.draws, c.draws);
}

#[test]
fn kpi_energy_matches_heating_steps() {
    let outcome = common::default_engine(2, 42).run().expect("trial");
    let on_steps = outcome.results.iter().filter(|r| r.element_on).count();
    let expected_kwh = on_steps as f64 * 3000.0 * DT_S / 3.6e6;
    assert_relative_eq!(outcome.kpi.energy_kwh, expected_kwh, max_relative = 1e-9);
    assert_eq!(outcome.kpi.draw_event_count, outcome.draws.len());
}

#[test]
fn standing_loss_relaxes_toward_ambient() {
    let model = common::reference_model();
    let cfg = common::reference_heater();
    let mut state = WaterHeaterState::at_temperature(70.0);
    state.is_active = false;

    let steps = 600;
    let mut prev = state.current_temp;
    for _ in 0..steps {
        let out = model.step(&mut state, AMBIENT_C, DT_S, None).expect("step");
        assert!(out.temp_c < prev);
        assert!(out.temp_c > AMBIENT_C);
        assert_eq!(out.power_w, 0.0);
        prev = out.temp_c;
    }

    let tau = SPECIFIC_HEAT_CAPACITY * cfg.mass * cfg.thermal_conduct;
    let expected = AMBIENT_C + (70.0 - AMBIENT_C) * (-(steps as f64) * DT_S / tau).exp();
    assert_relative_eq!(state.current_temp, expected, max_relative = 1e-9);
}

#[test]
fn tank_at_ambient_does_not_drift() {
    let model = common::reference_model();
    let mut state = WaterHeaterState::at_temperature(AMBIENT_C);
    state.is_active = false;
    for _ in 0..100 {
        model.step(&mut state, AMBIENT_C, DT_S, None).expect("step");
    }
    assert_relative_eq!(state.current_temp, AMBIENT_C);
}
