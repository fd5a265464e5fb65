use super::CliError;
use emcal_core::domain::{CalibErrorCategory, EventRecord, RunRange};
use emcal_core::modules::calibration::ScaleVector;
use emcal_core::modules::ingest::read_run_events;
use emcal_core::modules::store::load_scales;
use std::path::Path;
use tracing::warn;

pub(super) fn run_range(start: u32, end: u32) -> Result<RunRange, CliError> {
    RunRange::new(start, end).map_err(|_| {
        CliError::Usage(format!(
            "invalid run range: start {start} must not exceed end {end} (range is [start, end))"
        ))
    })
}

/// Chain every available run's events in range order, skipping runs whose
/// event file is missing. Per-run malformed data aborts the accumulation.
pub(super) fn accumulate_events(
    events_dir: &Path,
    range: RunRange,
) -> Result<Vec<EventRecord>, CliError> {
    let mut events = Vec::new();
    for run in range.iter() {
        match read_run_events(events_dir, run) {
            Ok(mut run_events) => events.append(&mut run_events),
            Err(error) if error.category() == CalibErrorCategory::MissingData => {
                warn!(run, %error, "skipping run without event file");
            }
            Err(error) => return Err(CliError::Compute(error)),
        }
    }
    Ok(events)
}

pub(super) fn load_scale_vector(path: &Path) -> Result<ScaleVector, CliError> {
    let values = load_scales(path).map_err(CliError::Compute)?;
    ScaleVector::from_list(&values).map_err(CliError::Compute)
}

pub(super) fn ensure_dir(path: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(path).map_err(|source| {
        CliError::Internal(anyhow::anyhow!(
            "failed to create directory '{}': {source}",
            path.display()
        ))
    })
}
