//! Device simulation components.

/// Electric storage water heater thermal model.
pub mod water_heater;

pub use water_heater::{
    StepOutput, ThermalModel, Thermostat, WaterHeaterConfig, WaterHeaterState,
};
