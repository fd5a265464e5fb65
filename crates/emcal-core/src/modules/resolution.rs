//! Resolution-versus-energy characterization.
//!
//! For every run in a range the calibrated-energy spectrum is fit inside the
//! catalog's validated window and the relative width sigma/mu is collected.
//! Runs with missing data or untuned configurations are skipped with a
//! logged reason; degenerate fits stay in the table flagged by status so a
//! single bad run never aborts a sweep.

use crate::common::catalog;
use crate::domain::{CalibError, CalibResult, RunRange};
use crate::modules::spectrum::{fit_spectrum, FitStatus, SpectrumFitConfig, SpectrumModel};
use crate::modules::store::ResolutionSummary;
use crate::numerics::histogram::Histogram1D;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionPoint {
    pub run: u32,
    pub energy_gev: f64,
    pub mu: f64,
    pub mu_error: f64,
    pub sigma_over_mu: f64,
    pub sigma_over_mu_error: f64,
    pub status: FitStatus,
}

/// Fit one run's calibrated spectrum inside its catalog window.
pub fn resolution_point(
    run: u32,
    histogram: &Histogram1D,
    model: SpectrumModel,
    linear_variant: bool,
) -> CalibResult<ResolutionPoint> {
    let config = catalog::lookup(run).ok_or_else(|| {
        CalibError::unknown_configuration(
            "CATALOG.RUN",
            format!("run {run} is not in the run catalog"),
        )
    })?;
    let window = catalog::fit_window(
        config.energy_gev(),
        config.has_attenuator,
        config.has_filter,
        linear_variant,
    )
    .ok_or_else(|| {
        CalibError::unknown_configuration(
            "CATALOG.FIT_WINDOW",
            format!(
                "no fit window for {} GeV, attenuator={}, filter={}",
                config.energy_gev(),
                config.has_attenuator,
                config.has_filter
            ),
        )
    })?;

    let fit = fit_spectrum(
        histogram,
        &SpectrumFitConfig {
            model,
            fit_min: window.fit_min,
            fit_max: window.fit_max,
            label: format!("resolution_run{run}"),
        },
    );

    Ok(ResolutionPoint {
        run,
        energy_gev: config.energy_gev(),
        mu: fit.location,
        mu_error: fit.location_error,
        sigma_over_mu: fit.width / fit.location,
        sigma_over_mu_error: fit.width_error / fit.location,
        status: fit.status,
    })
}

/// Sweep a run range, loading each run's spectrum through `load`. Per-run
/// failures are logged and skipped; the sweep always finishes.
pub fn scan_resolution<F>(
    runs: RunRange,
    model: SpectrumModel,
    linear_variant: bool,
    mut load: F,
) -> Vec<ResolutionPoint>
where
    F: FnMut(u32) -> CalibResult<Histogram1D>,
{
    let mut points = Vec::new();
    for run in runs.iter() {
        let histogram = match load(run) {
            Ok(histogram) => histogram,
            Err(error) => {
                warn!(run, %error, "skipping run in resolution sweep");
                continue;
            }
        };
        match resolution_point(run, &histogram, model, linear_variant) {
            Ok(point) => points.push(point),
            Err(error) => warn!(run, %error, "skipping run in resolution sweep"),
        }
    }
    points
}

/// Collect the sweep's points into the persisted summary table, keeping only
/// usable fits.
pub fn summarize(points: &[ResolutionPoint]) -> ResolutionSummary {
    let mut summary = ResolutionSummary::default();
    for point in points {
        if point.status == FitStatus::Degenerate || !point.mu.is_finite() {
            continue;
        }
        summary.runs.push(point.run);
        summary.energies_gev.push(point.energy_gev);
        summary.mus.push(point.mu);
        summary.mu_errors.push(point.mu_error);
        summary.resolutions.push(point.sigma_over_mu);
        summary.resolution_errors.push(point.sigma_over_mu_error);
    }
    summary
}
