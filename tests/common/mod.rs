//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ewh_sim::ambient::ConstantAmbient;
use ewh_sim::config::{default_diurnal_parameters, default_draw_stats};
use ewh_sim::devices::{ThermalModel, WaterHeaterConfig};
use ewh_sim::sim::engine::{Engine, HeaterSetup, Occupant};
use ewh_sim::sim::presence::{PresenceDistribution, PresenceWeights};
use ewh_sim::sim::sampler::{DrawEventSampler, DrawIntensity};
use ewh_sim::sim::schedule::{OccupantSchedule, OccupantScheduleModel};
use ewh_sim::sim::types::{Age, SimConfig};

/// Reference heater: 3 kW, 150 kg, limits 60/50 °C, thermostat always on.
pub fn reference_heater() -> WaterHeaterConfig {
    WaterHeaterConfig::default()
}

pub fn reference_model() -> ThermalModel {
    ThermalModel::new(reference_heater()).expect("reference heater is valid")
}

/// Wake 06:30, leave 08:00, return 18:00, sleep 22:30.
pub fn reference_schedule() -> OccupantSchedule {
    OccupantSchedule::new(390, 480, 1080, 1350).expect("ordered schedule")
}

pub fn reference_presence() -> PresenceDistribution {
    PresenceDistribution::from_schedule(&reference_schedule(), &PresenceWeights::default())
        .expect("non-degenerate presence")
}

pub fn default_sampler() -> DrawEventSampler {
    DrawEventSampler::new(&default_draw_stats().expect("embedded table")).expect("valid table")
}

pub fn default_schedule_model() -> OccupantScheduleModel {
    OccupantScheduleModel::new(&default_diurnal_parameters().expect("embedded table"))
        .expect("valid table")
}

/// Engine for one working adult taking normal showers at a constant 25.2 °C ambient.
pub fn default_engine(days: usize, seed: u64) -> Engine {
    let config = SimConfig::new(60, days, seed).expect("valid timing");
    let heater = HeaterSetup {
        config: reference_heater(),
        randomised: false,
        randomised_start: false,
        initial_temp: None,
    };
    let occupant = Occupant {
        age: Age::WorkAd,
        intensity: DrawIntensity::Subtype("NormalShower".to_string()),
        weights: PresenceWeights::default(),
    };
    Engine::new(
        config,
        heater,
        occupant,
        default_schedule_model(),
        default_sampler(),
        Arc::new(ConstantAmbient::new(25.2)),
    )
    .expect("valid engine")
}
