//! CSV export for simulation step results and sampled draw events.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::sim::engine::DayDraw;
use crate::sim::types::StepResult;

/// Column header for step export.
const STEP_HEADER: &str =
    "period,time_hr,ambient_c,temp_c,power_w,draw_volume_l,element_on,is_active";

/// Column header for draw-event export.
const DRAW_HEADER: &str = "trial,day,start_minute,end_minute,intensity_lpm";

/// Exports step results to a CSV file at the given path.
///
/// Writes a header row followed by one data row per step. Produces
/// deterministic output for identical inputs.
///
/// # Arguments
///
/// * `results` - Complete simulation step results
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_steps_csv(results: &[StepResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_steps_csv(results, io::BufWriter::new(file))
}

/// Writes step results as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_steps_csv(results: &[StepResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(STEP_HEADER.split(','))?;

    for r in results {
        wtr.write_record(&[
            r.period.to_string(),
            format!("{:.4}", r.time_hr),
            format!("{:.2}", r.ambient_c),
            format!("{:.4}", r.temp_c),
            format!("{:.0}", r.power_w),
            format!("{:.4}", r.draw_volume_l),
            r.element_on.to_string(),
            r.is_active.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports the draw events of every trial to one CSV file.
///
/// # Arguments
///
/// * `trials` - Draw events per trial, in trial order
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_draws_csv(trials: &[&[DayDraw]], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_draws_csv(trials, io::BufWriter::new(file))
}

/// Writes draw events as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_draws_csv(trials: &[&[DayDraw]], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(DRAW_HEADER.split(','))?;

    for (trial, draws) in trials.iter().enumerate() {
        for d in draws.iter() {
            wtr.write_record(&[
                trial.to_string(),
                d.day.to_string(),
                d.event.start_minute.to_string(),
                d.event.end_minute.to_string(),
                format!("{:.3}", d.event.intensity),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Output path for trial `trial` of a batch: `out.csv` becomes `out_trial3.csv`.
pub fn trial_path(path: &Path, trial: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_trial{trial}.{}", ext.to_string_lossy()),
        None => format!("{stem}_trial{trial}"),
    };
    path.with_file_name(name)
}
