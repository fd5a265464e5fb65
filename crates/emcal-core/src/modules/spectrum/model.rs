use super::{FitResult, FitStatus, SpectrumFitConfig, SpectrumModel};
use crate::numerics::histogram::Histogram1D;
use crate::numerics::linalg::lu_invert;
use crate::numerics::optimize::{
    minimize_bounded, numerical_hessian, BoundedProblem, SimplexConfig,
};
use crate::numerics::stats::normal_cdf;

const WIDTH_FLOOR: f64 = 0.1;
const SHAPE_BOUND: f64 = 10.0;
const SLOPE_BOUND: f64 = 0.1;
const HESSIAN_RELATIVE_STEP: f64 = 1.0e-4;
const SIMPSON_INTERVALS: usize = 200;

/// Fit the configured model to the window of `histogram` inside
/// `[fit_min, fit_max]` by binned maximum likelihood.
pub fn fit_spectrum(histogram: &Histogram1D, config: &SpectrumFitConfig) -> FitResult {
    let window = histogram.window(config.fit_min, config.fit_max);
    let window_counts: f64 = window.iter().map(|&(_, count)| count).sum();
    if window.is_empty() || window_counts <= 0.0 {
        return FitResult::degenerate();
    }

    let raw_mean = histogram.mean();
    let raw_rms = histogram.rms();
    if !raw_mean.is_finite() || !raw_rms.is_finite() || raw_rms <= 0.0 {
        return FitResult::degenerate();
    }

    match config.model {
        SpectrumModel::Gaussian => fit_gaussian(&window, config, raw_mean, raw_rms),
        SpectrumModel::CrystalBallExponential => {
            fit_crystal_ball_mixture(&window, config, raw_mean, raw_rms)
        }
    }
}

fn fit_gaussian(
    window: &[(f64, f64)],
    config: &SpectrumFitConfig,
    raw_mean: f64,
    raw_rms: f64,
) -> FitResult {
    let fit_min = config.fit_min;
    let fit_max = config.fit_max;
    let objective = |params: &[f64]| {
        let (mean, sigma) = (params[0], params[1]);
        let normalization = normal_cdf(fit_max, mean, sigma) - normal_cdf(fit_min, mean, sigma);
        if normalization <= 0.0 {
            return f64::INFINITY;
        }
        let log_norm = normalization.ln();
        let mut nll = 0.0;
        for &(center, count) in window {
            if count <= 0.0 {
                continue;
            }
            let z = (center - mean) / sigma;
            // log of the unnormalized Gaussian; constants drop out
            nll -= count * (-0.5 * z * z - sigma.ln() - log_norm);
        }
        nll
    };

    let initial = [raw_mean, raw_rms];
    let lower = [raw_mean - 2.0 * raw_rms, WIDTH_FLOOR];
    let upper = [raw_mean + 2.0 * raw_rms, 2.0 * raw_rms];
    finish_fit(objective, &initial, &lower, &upper, 0, 1, 2000)
}

fn fit_crystal_ball_mixture(
    window: &[(f64, f64)],
    config: &SpectrumFitConfig,
    raw_mean: f64,
    raw_rms: f64,
) -> FitResult {
    let fit_min = config.fit_min;
    let fit_max = config.fit_max;
    let objective = |params: &[f64]| {
        let (mean, sigma, alpha, power, slope, fraction) = (
            params[0], params[1], params[2], params[3], params[4], params[5],
        );
        let signal_norm = simpson(fit_min, fit_max, SIMPSON_INTERVALS, |x| {
            crystal_ball_shape(x, mean, sigma, alpha, power)
        });
        let background_norm = exponential_norm(slope, fit_max - fit_min);
        if !signal_norm.is_finite() || signal_norm <= 0.0 || background_norm <= 0.0 {
            return f64::INFINITY;
        }
        let mut nll = 0.0;
        for &(center, count) in window {
            if count <= 0.0 {
                continue;
            }
            let signal = crystal_ball_shape(center, mean, sigma, alpha, power) / signal_norm;
            let background = (-slope * (center - fit_min)).exp() / background_norm;
            let density = fraction * signal + (1.0 - fraction) * background;
            if !density.is_finite() || density <= 0.0 {
                return f64::INFINITY;
            }
            nll -= count * density.ln();
        }
        nll
    };

    let initial = [raw_mean, raw_rms, 1.0, 2.0, 1.0 / (fit_max - fit_min), 0.9];
    let lower = [raw_mean - 2.0 * raw_rms, WIDTH_FLOOR, 0.0, 0.0, 0.0, 0.0];
    let upper = [
        raw_mean + 2.0 * raw_rms,
        2.0 * raw_rms,
        SHAPE_BOUND,
        SHAPE_BOUND,
        SLOPE_BOUND,
        1.0,
    ];
    finish_fit(objective, &initial, &lower, &upper, 0, 1, 4000)
}

fn finish_fit<F>(
    mut objective: F,
    initial: &[f64],
    lower: &[f64],
    upper: &[f64],
    location_index: usize,
    width_index: usize,
    max_iterations: usize,
) -> FitResult
where
    F: FnMut(&[f64]) -> f64,
{
    let outcome = match minimize_bounded(
        &mut objective,
        BoundedProblem {
            initial,
            lower,
            upper,
        },
        SimplexConfig {
            max_iterations,
            ..SimplexConfig::default()
        },
    ) {
        Ok(outcome) => outcome,
        Err(_) => return FitResult::degenerate(),
    };

    let location = outcome.parameters[location_index];
    let width = outcome.parameters[width_index];
    if !outcome.objective.is_finite()
        || !location.is_finite()
        || !width.is_finite()
        || width < WIDTH_FLOOR
    {
        return FitResult::degenerate();
    }

    let (location_error, width_error, curvature_ok) = parameter_errors(
        &mut objective,
        &outcome.parameters,
        location_index,
        width_index,
    );

    let status = if !curvature_ok {
        FitStatus::Degenerate
    } else if outcome.converged {
        FitStatus::Converged
    } else {
        FitStatus::IterationLimit
    };

    FitResult {
        location,
        location_error,
        width,
        width_error,
        status,
    }
}

/// Parameter uncertainties from the inverse NLL curvature at the minimum,
/// taken over the (location, width) block so a flat tail or background
/// direction cannot poison the peak errors.
fn parameter_errors<F>(
    objective: &mut F,
    parameters: &[f64],
    location_index: usize,
    width_index: usize,
) -> (f64, f64, bool)
where
    F: FnMut(&[f64]) -> f64,
{
    let hessian = numerical_hessian(&mut *objective, parameters, HESSIAN_RELATIVE_STEP);
    let mut block = crate::numerics::DenseMatrix::zeros(2, 2);
    block[(0, 0)] = hessian[(location_index, location_index)];
    block[(0, 1)] = hessian[(location_index, width_index)];
    block[(1, 0)] = hessian[(width_index, location_index)];
    block[(1, 1)] = hessian[(width_index, width_index)];

    match lu_invert(&block) {
        Ok(covariance) => {
            let location_variance = covariance[(0, 0)];
            let width_variance = covariance[(1, 1)];
            if location_variance > 0.0 && width_variance > 0.0 {
                (location_variance.sqrt(), width_variance.sqrt(), true)
            } else {
                (f64::NAN, f64::NAN, false)
            }
        }
        Err(_) => (f64::NAN, f64::NAN, false),
    }
}

/// Unnormalized Crystal-Ball shape: Gaussian core with a power-law tail on
/// the low side of the peak.
fn crystal_ball_shape(x: f64, mean: f64, sigma: f64, alpha: f64, power: f64) -> f64 {
    if sigma <= 0.0 {
        return f64::NAN;
    }
    let t = (x - mean) / sigma;
    if t > -alpha {
        (-0.5 * t * t).exp()
    } else {
        let scale = (power / alpha).powf(power) * (-0.5 * alpha * alpha).exp();
        let offset = power / alpha - alpha;
        scale * (offset - t).powf(-power)
    }
}

fn exponential_norm(slope: f64, span: f64) -> f64 {
    if slope <= 0.0 {
        span
    } else {
        (1.0 - (-slope * span).exp()) / slope
    }
}

fn simpson<F: Fn(f64) -> f64>(low: f64, high: f64, intervals: usize, f: F) -> f64 {
    let n = if intervals % 2 == 0 { intervals } else { intervals + 1 };
    let step = (high - low) / n as f64;
    let mut total = f(low) + f(high);
    for index in 1..n {
        let x = low + step * index as f64;
        total += if index % 2 == 0 { 2.0 } else { 4.0 } * f(x);
    }
    total * step / 3.0
}
