//! The calibration engine: per-channel scale vectors mapping 16 raw ADC
//! values to one calibrated energy, produced either by robust L1 regression
//! with iterative outlier rejection or by MIP peak ratios.

mod matrix;
mod mip;
mod regression;
mod scales;

pub use matrix::EventMatrix;
pub use mip::{run_mip_calibration, MipOutcome};
pub use regression::{
    run_robust_regression, RegressionOutcome, RegressionRound, RobustRegressionConfig,
};
pub use scales::{ScaleVector, BIAS_BOUND, SCALE_VECTOR_LEN};
