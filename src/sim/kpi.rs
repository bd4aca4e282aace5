//! Post-hoc KPI computation from simulation results.

use std::fmt;

use super::types::StepResult;

/// Aggregate indicators of one trial.
///
/// Computed post-hoc from `Vec<StepResult>` to ensure consistency between
/// step data and reported metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiReport {
    /// Electrical energy used by the element (kWh).
    pub energy_kwh: f64,
    /// Share of steps with the element heating (%).
    pub duty_cycle_pct: f64,
    /// Number of off→on element transitions.
    pub switch_on_count: usize,
    /// Lowest end-of-step tank temperature (°C).
    pub min_temp_c: f64,
    /// Mean end-of-step tank temperature (°C).
    pub mean_temp_c: f64,
    /// Highest end-of-step tank temperature (°C).
    pub max_temp_c: f64,
    /// Time the tank spent below the lower thermostat limit (min).
    pub minutes_below_lower: f64,
    /// Total hot water drawn (L).
    pub drawn_volume_l: f64,
    /// Number of sampled draw events.
    pub draw_event_count: usize,
    /// Ambient lookups that fell back to the first sample.
    pub ambient_fallbacks: usize,
}

impl KpiReport {
    /// Computes the step-derived KPIs.
    ///
    /// # Arguments
    ///
    /// * `results` - Complete simulation step results
    /// * `dt_s` - Step length in seconds
    /// * `lower_temp_limit` - Thermostat lower set point (°C)
    ///
    /// # Returns
    ///
    /// A `KpiReport` with `draw_event_count` and `ambient_fallbacks` set to zero;
    /// the caller fills them in from the trial.
    pub fn from_results(results: &[StepResult], dt_s: f64, lower_temp_limit: f64) -> Self {
        if results.is_empty() {
            return Self {
                energy_kwh: 0.0,
                duty_cycle_pct: 0.0,
                switch_on_count: 0,
                min_temp_c: 0.0,
                mean_temp_c: 0.0,
                max_temp_c: 0.0,
                minutes_below_lower: 0.0,
                drawn_volume_l: 0.0,
                draw_event_count: 0,
                ambient_fallbacks: 0,
            };
        }

        let n = results.len() as f64;
        let mut energy_j = 0.0;
        let mut on_steps = 0_usize;
        let mut switch_ons = 0_usize;
        let mut was_on = false;
        let mut min_temp = f64::INFINITY;
        let mut max_temp = f64::NEG_INFINITY;
        let mut temp_sum = 0.0;
        let mut below_steps = 0_usize;
        let mut drawn = 0.0;

        for r in results {
            energy_j += r.power_w * dt_s;
            if r.element_on {
                on_steps += 1;
                if !was_on {
                    switch_ons += 1;
                }
            }
            was_on = r.element_on;

            min_temp = min_temp.min(r.temp_c);
            max_temp = max_temp.max(r.temp_c);
            temp_sum += r.temp_c;
            if r.temp_c < lower_temp_limit {
                below_steps += 1;
            }
            drawn += r.draw_volume_l;
        }

        Self {
            energy_kwh: energy_j / 3.6e6,
            duty_cycle_pct: 100.0 * on_steps as f64 / n,
            switch_on_count: switch_ons,
            min_temp_c: min_temp,
            mean_temp_c: temp_sum / n,
            max_temp_c: max_temp,
            minutes_below_lower: below_steps as f64 * dt_s / 60.0,
            drawn_volume_l: drawn,
            draw_event_count: 0,
            ambient_fallbacks: 0,
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Heating energy:        {:.3} kWh", self.energy_kwh)?;
        writeln!(f, "Heating duty cycle:    {:.1}%", self.duty_cycle_pct)?;
        writeln!(f, "Element switch-ons:    {}", self.switch_on_count)?;
        writeln!(f, "Min tank temperature:  {:.2} C", self.min_temp_c)?;
        writeln!(f, "Mean tank temperature: {:.2} C", self.mean_temp_c)?;
        writeln!(f, "Max tank temperature:  {:.2} C", self.max_temp_c)?;
        writeln!(f, "Time below lower:      {:.0} min", self.minutes_below_lower)?;
        writeln!(f, "Hot water drawn:       {:.1} L", self.drawn_volume_l)?;
        writeln!(f, "Draw events:           {}", self.draw_event_count)?;
        write!(f, "Ambient fallbacks:     {}", self.ambient_fallbacks)
    }
}
