//! Electric storage water heater simulator driven by stochastic occupant hot-water draws.

pub mod ambient;
pub mod config;
pub mod devices;
pub mod error;
/// CSV output.
pub mod io;
pub mod runner;
/// Simulation engine, occupant schedules, draw sampling, and KPIs.
pub mod sim;
