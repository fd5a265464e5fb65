use super::{EventMatrix, ScaleVector, BIAS_BOUND, SCALE_VECTOR_LEN};
use crate::common::geometry::CHANNEL_COUNT;
use crate::domain::{CalibError, CalibResult};
use crate::modules::selection;
use crate::numerics::optimize::{minimize_bounded, BoundedProblem, SimplexConfig};
use tracing::{debug, warn};

/// Robust regression configuration.
///
/// The round budget is fixed, not a convergence criterion: downstream
/// resolution numbers were tuned against the result of the final round, so
/// the loop always runs the full budget unless the sample empties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustRegressionConfig {
    /// Energy (ADC counts) every prediction is driven toward.
    pub target: f64,
    pub rounds: usize,
    /// Selection window half-widths in units of the prediction sigma. The
    /// right tail is wider to tolerate the spectrum's upward skew.
    pub window_low_sigmas: f64,
    pub window_high_sigmas: f64,
    /// Optimizer iteration budget per round.
    pub max_iterations: usize,
}

impl RobustRegressionConfig {
    pub fn new(target: f64) -> Self {
        Self {
            target,
            rounds: 20,
            window_low_sigmas: 2.0,
            window_high_sigmas: 3.0,
            max_iterations: 4000,
        }
    }
}

/// Per-round diagnostic: the sample the fit ran on and the Gaussian moments
/// of its predictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionRound {
    pub sample_size: usize,
    pub mu: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone)]
pub struct RegressionOutcome {
    /// Reference-normalized vector for persistence and cross-run comparison.
    pub scales: ScaleVector,
    /// The vector exactly as minimized; the predictions below use this one,
    /// so they still target the regression goal.
    pub fitted: ScaleVector,
    pub rounds: Vec<RegressionRound>,
    /// Predictions on the never-filtered input matrix.
    pub predictions_full: Vec<f64>,
    /// Predictions on the final selected subset.
    pub predictions_selected: Vec<f64>,
}

/// Fit a [`ScaleVector`] by minimizing the summed absolute deviation of the
/// predictions from `config.target`, re-selecting the event sample inside
/// `[mu - k_low sigma, mu + k_high sigma]` after every round.
pub fn run_robust_regression(
    matrix: &EventMatrix,
    config: &RobustRegressionConfig,
) -> CalibResult<RegressionOutcome> {
    if matrix.is_empty() {
        return Err(CalibError::missing_data(
            "CALIB.EMPTY_SAMPLE",
            "robust regression needs at least one event",
        ));
    }
    if config.rounds == 0 {
        return Err(CalibError::internal(
            "CALIB.ROUND_BUDGET",
            "round budget must be positive",
        ));
    }

    let mut lower = [0.0; SCALE_VECTOR_LEN];
    let mut upper = [f64::INFINITY; SCALE_VECTOR_LEN];
    lower[CHANNEL_COUNT] = -BIAS_BOUND;
    upper[CHANNEL_COUNT] = BIAS_BOUND;

    let mut working = matrix.clone();
    let mut parameters = ScaleVector::unit().to_flat();
    let mut rounds = Vec::with_capacity(config.rounds);

    for round in 0..config.rounds {
        let outcome = minimize_bounded(
            |params: &[f64]| l1_deviation(&working, params, config.target),
            BoundedProblem {
                initial: &parameters,
                lower: &lower,
                upper: &upper,
            },
            SimplexConfig {
                max_iterations: config.max_iterations,
                ..SimplexConfig::default()
            },
        )
        .map_err(|source| {
            CalibError::computation(
                "CALIB.REGRESSION_SOLVE",
                format!("round {round} optimizer setup failed: {source}"),
            )
        })?;
        parameters = outcome.parameters;

        let fitted = ScaleVector::from_flat(&parameters)?;
        let predictions = working.predict(&fitted);
        let (mu, sigma) = crate::numerics::stats::gaussian_moments(&predictions)
            .expect("working sample is non-empty");
        rounds.push(RegressionRound {
            sample_size: working.n_events(),
            mu,
            sigma,
        });
        debug!(
            round,
            sample_size = working.n_events(),
            mu,
            sigma,
            "regression round complete"
        );

        let low = mu - config.window_low_sigmas * sigma;
        let high = mu + config.window_high_sigmas * sigma;
        let mask = selection::select(&predictions, low, high);
        let refined = working.select(&mask)?;
        if refined.is_empty() {
            warn!(
                round,
                "selection window emptied the sample; stopping refinement early"
            );
            break;
        }
        working = refined;
    }

    let fitted = ScaleVector::from_flat(&parameters)?;
    let scales = fitted.normalized_to_reference()?;
    let predictions_full = matrix.predict(&fitted);
    let predictions_selected = working.predict(&fitted);

    Ok(RegressionOutcome {
        scales,
        fitted,
        rounds,
        predictions_full,
        predictions_selected,
    })
}

fn l1_deviation(matrix: &EventMatrix, params: &[f64], target: f64) -> f64 {
    let bias = params[CHANNEL_COUNT];
    (0..matrix.n_events())
        .map(|event| {
            let row = matrix.row(event);
            let mut prediction = bias;
            for (value, weight) in row.iter().zip(params.iter()) {
                prediction += value * weight;
            }
            (prediction - target).abs()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{run_robust_regression, RobustRegressionConfig};
    use crate::common::geometry::REFERENCE_CHANNEL;
    use crate::modules::calibration::EventMatrix;

    // deterministic spread of row sums around `target`
    fn synthetic_matrix(events: usize, target: f64, spread: f64) -> EventMatrix {
        let rows: Vec<[f64; 16]> = (0..events)
            .map(|event| {
                let offset = ((event as f64 * 0.7297).sin()) * spread;
                [(target + offset) / 16.0; 16]
            })
            .collect();
        EventMatrix::from_rows(&rows)
    }

    #[test]
    fn empty_matrix_is_a_missing_data_error() {
        let matrix = EventMatrix::from_rows(&[]);
        let error = run_robust_regression(&matrix, &RobustRegressionConfig::new(3100.0))
            .expect_err("empty sample cannot be fit");
        assert_eq!(error.placeholder(), "CALIB.EMPTY_SAMPLE");
    }

    #[test]
    fn sample_size_never_grows_across_rounds() {
        let matrix = synthetic_matrix(200, 3100.0, 31.0);
        let mut config = RobustRegressionConfig::new(3100.0);
        config.rounds = 8;
        config.max_iterations = 400;
        let outcome = run_robust_regression(&matrix, &config).expect("regression runs");
        for pair in outcome.rounds.windows(2) {
            assert!(
                pair[1].sample_size <= pair[0].sample_size,
                "sample grew: {} -> {}",
                pair[0].sample_size,
                pair[1].sample_size
            );
        }
    }

    #[test]
    fn outcome_satisfies_the_shape_invariants() {
        let matrix = synthetic_matrix(150, 3100.0, 31.0);
        let mut config = RobustRegressionConfig::new(3100.0);
        config.rounds = 4;
        config.max_iterations = 400;
        let outcome = run_robust_regression(&matrix, &config).expect("regression runs");

        let flat = outcome.scales.to_flat();
        assert_eq!(flat.len(), 17);
        assert!(flat[..16].iter().all(|&weight| weight >= 0.0));
        assert_eq!(outcome.scales.weight(REFERENCE_CHANNEL), 1.0);
        assert_eq!(outcome.predictions_full.len(), matrix.n_events());
        assert!(!outcome.predictions_selected.is_empty());
    }

    #[test]
    fn predictions_stay_on_target_for_a_well_behaved_sample() {
        let matrix = synthetic_matrix(300, 3100.0, 31.0);
        let mut config = RobustRegressionConfig::new(3100.0);
        config.rounds = 6;
        config.max_iterations = 600;
        let outcome = run_robust_regression(&matrix, &config).expect("regression runs");

        let first = outcome.rounds.first().expect("at least one round");
        let last = outcome.rounds.last().expect("at least one round");
        assert!(
            (last.mu - 3100.0).abs() < 31.0,
            "final mu = {} drifted from target",
            last.mu
        );
        assert!(
            last.sigma <= first.sigma * 1.05,
            "sigma diverged: {} -> {}",
            first.sigma,
            last.sigma
        );
    }
}
