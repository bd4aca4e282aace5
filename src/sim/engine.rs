//! Simulation engine that steps one water heater through a multi-day trial.

use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::ambient::{AmbientCursor, AmbientFeed};
use crate::devices::{ThermalModel, WaterHeaterConfig};
use crate::error::{ConfigError, SimError};

use super::clock::{MINUTES_PER_DAY, SimulationClock, staggered_activation_time};
use super::event::{DrawEvent, DrawWindow, combined_intensity};
use super::kpi::KpiReport;
use super::presence::{PresenceDistribution, PresenceWeights};
use super::sampler::{DrawEventSampler, DrawIntensity};
use super::schedule::{OccupantSchedule, OccupantScheduleModel};
use super::types::{Age, SimConfig, StepResult};

/// The single occupant whose routine drives the draws.
#[derive(Debug, Clone, PartialEq)]
pub struct Occupant {
    pub age: Age,
    /// Flow rate source for every sampled draw.
    pub intensity: DrawIntensity,
    /// Relative weights of the presence labels.
    pub weights: PresenceWeights,
}

/// Heater parameters and how the start of a trial is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaterSetup {
    pub config: WaterHeaterConfig,
    /// Draw rating, mass, loss coefficient and limits from the typical-unit pool.
    pub randomised: bool,
    /// Draw the start temperature and element state.
    pub randomised_start: bool,
    /// Fixed start temperature overriding the default (°C).
    pub initial_temp: Option<f64>,
}

/// A draw event tagged with the day it was sampled for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayDraw {
    pub day: usize,
    pub event: DrawEvent,
}

/// Everything one trial produced.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// Seed of the trial's random stream.
    pub seed: u64,
    /// Heater parameters actually simulated (after randomisation).
    pub heater: WaterHeaterConfig,
    pub results: Vec<StepResult>,
    pub schedules: Vec<OccupantSchedule>,
    pub draws: Vec<DayDraw>,
    /// Ambient lookups that fell back to the first sample.
    pub ambient_fallbacks: usize,
    pub kpi: KpiReport,
}

/// Simulation engine owning the heater, occupant model and ambient feed.
///
/// All components are validated on construction; [`Engine::run_seeded`]
/// only reads them, so one engine can run many trials concurrently.
pub struct Engine {
    config: SimConfig,
    heater: HeaterSetup,
    occupant: Occupant,
    schedules: OccupantScheduleModel,
    sampler: DrawEventSampler,
    ambient: Arc<dyn AmbientFeed>,
}

impl Engine {
    /// Creates a new simulation engine.
    ///
    /// # Arguments
    ///
    /// * `config` - Trial timing and seeding
    /// * `heater` - Heater parameters and start policy
    /// * `occupant` - Occupant age, draw intensity and presence weights
    /// * `schedules` - Diurnal schedule sampler
    /// * `sampler` - Draw-event sampler
    /// * `ambient` - Shared read-only ambient feed
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the heater settings are invalid, a table
    /// does not cover the occupant's age, the draw subtype is unknown, one
    /// step of a draw would empty the tank, or a presence weight is invalid.
    pub fn new(
        config: SimConfig,
        heater: HeaterSetup,
        occupant: Occupant,
        schedules: OccupantScheduleModel,
        sampler: DrawEventSampler,
        ambient: Arc<dyn AmbientFeed>,
    ) -> Result<Self, ConfigError> {
        ThermalModel::new(heater.config.clone())?;
        schedules.ensure_age(occupant.age)?;
        sampler.ensure_age(occupant.age)?;
        let intensity = sampler.resolve_intensity(&occupant.intensity)?;
        heater.config.check_draw_fits(intensity, config.dt())?;
        if let Some(err) = occupant.weights.validate().into_iter().next() {
            return Err(err);
        }
        Ok(Self {
            config,
            heater,
            occupant,
            schedules,
            sampler,
            ambient,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs one trial with the configured seed.
    pub fn run(&self) -> Result<TrialOutcome, SimError> {
        self.run_seeded(self.config.seed)
    }

    /// Runs one trial on its own random stream seeded with `seed`.
    ///
    /// Each day samples a schedule, its presence distribution and the day's
    /// draws, then steps the heater period by period. Ambient temperature is
    /// refreshed at every hour boundary.
    ///
    /// # Errors
    ///
    /// Returns the first `SimError` raised by sampling or stepping; the
    /// trial is abandoned at that point.
    pub fn run_seeded(&self, seed: u64) -> Result<TrialOutcome, SimError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let heater = if self.heater.randomised {
            self.heater.config.randomised(&mut rng)
        } else {
            self.heater.config.clone()
        };
        let model = ThermalModel::new(heater.clone())?;
        let mut state = model.initialize(self.heater.randomised_start, &mut rng);
        if let Some(temp) = self.heater.initial_temp {
            state.current_temp = temp;
        }

        info!(
            seed,
            days = self.config.days,
            element_rating_w = heater.element_rating,
            mass_kg = heater.mass,
            upper_c = heater.upper_temp_limit,
            lower_c = heater.lower_temp_limit,
            start_c = state.current_temp,
            "trial started"
        );

        let clock = SimulationClock::new(self.config.time_step_s, self.config.days);
        let dt = self.config.dt();
        let feed = self.ambient.as_ref();
        let mut ambient = AmbientCursor::new(feed);

        let mut results = Vec::with_capacity(clock.total_periods());
        let mut schedules = Vec::with_capacity(self.config.days);
        let mut draws = Vec::new();
        let mut windows: Vec<DrawWindow> = Vec::new();

        for (day, periods) in clock.days().into_iter().enumerate() {
            let weekday = is_weekday(self.config.start_date, day)?;
            let schedule = self.schedules.sample(self.occupant.age, weekday, &mut rng)?;
            let presence = PresenceDistribution::from_schedule(&schedule, &self.occupant.weights)?;
            let events = self.sampler.simulate_day(
                self.occupant.age,
                &self.occupant.intensity,
                &presence,
                self.config.draw_count,
                &mut rng,
            )?;

            let activation_period = if heater.always_on {
                periods.start
            } else {
                let delay = staggered_activation_time(self.config.activation_window_min, &mut rng);
                periods.start + clock.minute_to_period(delay as usize)
            };

            debug!(
                day,
                weekday,
                wake = schedule.wake(),
                leave = schedule.leave(),
                return_home = schedule.return_home(),
                sleep = schedule.sleep(),
                events = events.len(),
                activation_period,
                "day sampled"
            );

            windows.extend(events.iter().map(|e| DrawWindow::from_event(e, day)));
            draws.extend(events.into_iter().map(|event| DayDraw { day, event }));
            schedules.push(schedule);

            for t in periods.clone() {
                if clock.is_hour_boundary(t) {
                    ambient.advance(feed);
                }
                state.is_active = heater.always_on || t >= activation_period;
                let draw_rate = combined_intensity(&windows, t, &clock);
                let out = model.step(&mut state, ambient.current(), dt, draw_rate)?;

                results.push(StepResult {
                    period: t,
                    time_hr: clock.hours_at(t),
                    ambient_c: ambient.current(),
                    temp_c: out.temp_c,
                    power_w: out.power_w,
                    draw_volume_l: out.draw_volume_l,
                    element_on: state.element_on,
                    is_active: state.is_active,
                });
            }

            // keep only windows that spill into later days
            windows.retain(|w| w.end_minute > (day + 1) * MINUTES_PER_DAY);
        }

        let mut kpi = KpiReport::from_results(&results, dt, heater.lower_temp_limit);
        kpi.draw_event_count = draws.len();
        kpi.ambient_fallbacks = ambient.fallbacks();

        info!(
            seed,
            energy_kwh = kpi.energy_kwh,
            draws = kpi.draw_event_count,
            ambient_fallbacks = kpi.ambient_fallbacks,
            "trial finished"
        );

        Ok(TrialOutcome {
            seed,
            heater,
            results,
            schedules,
            draws,
            ambient_fallbacks: ambient.fallbacks(),
            kpi,
        })
    }
}

/// Whether day `day` of a trial starting on `start` falls Monday–Friday.
fn is_weekday(start: NaiveDate, day: usize) -> Result<bool, ConfigError> {
    let date = start.checked_add_days(Days::new(day as u64)).ok_or_else(|| {
        ConfigError::new("simulation.start_date", format!("day {day} is past the calendar range"))
    })?;
    Ok(date.weekday().num_days_from_monday() < 5)
}
