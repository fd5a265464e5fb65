//! Parametric spectrum fitting over a restricted likelihood window.
//!
//! A spectrum histogram covers a wide data range that includes pedestal and
//! overflow structure; the fit only ever sees bins inside the narrower
//! `[fit_min, fit_max]` window looked up from the run catalog. Two signal
//! models are supported: a plain Gaussian, and a Crystal-Ball core with an
//! exponential background and floating mixture fraction.

mod model;

use crate::numerics::histogram::Histogram1D;

pub use model::fit_spectrum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectrumModel {
    Gaussian,
    CrystalBallExponential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFitConfig {
    pub model: SpectrumModel,
    pub fit_min: f64,
    pub fit_max: f64,
    /// Label carried onto diagnostic artifacts derived from this fit.
    pub label: String,
}

/// Terminal state of one fit invocation.
///
/// Non-convergence is data, not an error: calibration sweeps cover hundreds
/// of runs and a single empty or pathological window must not abort a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitStatus {
    Converged,
    IterationLimit,
    Degenerate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub location: f64,
    pub location_error: f64,
    pub width: f64,
    pub width_error: f64,
    pub status: FitStatus,
}

impl FitResult {
    pub fn degenerate() -> Self {
        Self {
            location: f64::NAN,
            location_error: f64::NAN,
            width: f64::NAN,
            width_error: f64::NAN,
            status: FitStatus::Degenerate,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status != FitStatus::Degenerate
            && self.location.is_finite()
            && self.width.is_finite()
            && self.width > 0.0
    }

    /// Relative width sigma/mu, the detector's figure of merit.
    pub fn resolution(&self) -> f64 {
        self.width / self.location
    }
}

/// Convenience wrapper building the spectrum histogram and fitting it in one
/// step, the shape every per-run sweep uses.
pub fn fit_values(
    values: &[f64],
    bin_count: usize,
    data_min: f64,
    data_max: f64,
    config: &SpectrumFitConfig,
) -> Result<FitResult, crate::numerics::histogram::HistogramError> {
    let mut histogram = Histogram1D::new(bin_count, data_min, data_max)?;
    histogram.fill_all(values.iter().copied());
    Ok(fit_spectrum(&histogram, config))
}
