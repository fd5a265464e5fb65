//! Scalar statistics helpers shared by the fitters and the selection loop.

use std::f64::consts::{PI, SQRT_2};

/// Maximum-likelihood Gaussian moments of a sample: `(mean, sigma)` with the
/// biased (1/n) width estimate. Returns `None` for an empty sample.
pub fn gaussian_moments(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| {
            let delta = value - mean;
            delta * delta
        })
        .sum::<f64>()
        / n;
    Some((mean, variance.sqrt()))
}

pub fn normal_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    let z = (x - mean) / sigma;
    (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt())
}

pub fn normal_cdf(x: f64, mean: f64, sigma: f64) -> f64 {
    0.5 * (1.0 + libm::erf((x - mean) / (sigma * SQRT_2)))
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
