use super::clock::{MINUTES_PER_DAY, SimulationClock};

/// One hot-water draw sampled for a simulated day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawEvent {
    /// Start minute of the day (inclusive).
    pub start_minute: usize,
    /// End minute (exclusive); may exceed 1440 when the draw runs past midnight.
    pub end_minute: usize,
    /// Flow rate while the draw is running (L/min).
    pub intensity: f64,
}

impl DrawEvent {
    pub fn new(start_minute: usize, duration_min: u32, intensity: f64) -> Self {
        Self {
            start_minute,
            end_minute: start_minute + duration_min as usize,
            intensity,
        }
    }

    pub fn duration_min(&self) -> usize {
        self.end_minute - self.start_minute
    }
}

/// A draw event placed on the absolute minute axis of a trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawWindow {
    /// Start minute since the trial began (inclusive).
    pub start_minute: usize,
    /// End minute since the trial began (exclusive).
    pub end_minute: usize,
    /// Flow rate while active (L/min).
    pub intensity: f64,
}

impl DrawWindow {
    /// Places `event` on day `day` of the trial.
    pub fn from_event(event: &DrawEvent, day: usize) -> Self {
        let offset = day * MINUTES_PER_DAY;
        Self {
            start_minute: offset + event.start_minute,
            end_minute: offset + event.end_minute,
            intensity: event.intensity,
        }
    }

    /// Minutes of the window that fall inside `[from, to)`.
    pub fn overlap_minutes(&self, from: f64, to: f64) -> f64 {
        let start = (self.start_minute as f64).max(from);
        let end = (self.end_minute as f64).min(to);
        (end - start).max(0.0)
    }
}

/// Mean flow rate over `period`, or `None` when no draw overlaps it.
///
/// Each window contributes its intensity scaled by the share of the step it
/// covers, so the volume drawn over a step equals the volume of the draws
/// inside it whatever the step length. Overlapping windows add up.
pub fn combined_intensity(
    windows: &[DrawWindow],
    period: usize,
    clock: &SimulationClock,
) -> Option<f64> {
    let from = clock.minutes_at(period);
    let to = clock.minutes_at(period + 1);
    let step = to - from;
    windows
        .iter()
        .filter_map(|w| {
            let minutes = w.overlap_minutes(from, to);
            (minutes > 0.0).then(|| w.intensity * minutes / step)
        })
        .reduce(|a, b| a + b)
}
