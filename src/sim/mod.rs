/// Simulation clock for period and day management.
pub mod clock;
pub mod engine;
/// Draw events and their placement on the period axis.
pub mod event;
pub mod kpi;
/// Per-minute presence distribution.
pub mod presence;
pub mod sampler;
/// Occupant daily-activity schedules.
pub mod schedule;
pub mod types;
