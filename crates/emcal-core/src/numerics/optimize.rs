//! Bounded derivative-free minimization.
//!
//! The calibration objectives (L1 regression loss, binned negative log
//! likelihoods) are cheap to evaluate, low-dimensional, and not smooth
//! everywhere, so the solver of choice is a Nelder-Mead simplex with every
//! candidate vertex clamped into the parameter box.

use super::DenseMatrix;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;
const INITIAL_STEP_FRACTION: f64 = 0.05;

/// Guard value substituted for non-finite objective evaluations so a NaN
/// region repels the simplex instead of poisoning the ordering.
const NON_FINITE_OBJECTIVE: f64 = 1.0e300;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedProblem<'a> {
    pub initial: &'a [f64],
    pub lower: &'a [f64],
    pub upper: &'a [f64],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1.0e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimplexOutcome {
    pub parameters: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimplexError {
    #[error("minimization requires at least 1 parameter")]
    EmptyProblem,
    #[error("bounds length mismatch: initial={initial}, lower={lower}, upper={upper}")]
    BoundsLengthMismatch {
        initial: usize,
        lower: usize,
        upper: usize,
    },
    #[error("lower bound exceeds upper bound at parameter {index}: {lower} > {upper}")]
    InvertedBounds {
        index: usize,
        lower: f64,
        upper: f64,
    },
    #[error("initial parameter {index} is not finite: {value}")]
    NonFiniteInitial { index: usize, value: f64 },
}

/// Minimize `objective` over the box `[lower, upper]` starting from
/// `initial`. Bounds may be infinite; the initial point is clamped into the
/// box before the simplex is built.
pub fn minimize_bounded<F>(
    mut objective: F,
    problem: BoundedProblem<'_>,
    config: SimplexConfig,
) -> Result<SimplexOutcome, SimplexError>
where
    F: FnMut(&[f64]) -> f64,
{
    validate(&problem)?;
    let dimension = problem.initial.len();

    let clamp = |index: usize, value: f64| -> f64 {
        value.clamp(problem.lower[index], problem.upper[index])
    };
    let mut guarded = |point: &[f64]| -> f64 {
        let value = objective(point);
        if value.is_finite() {
            value
        } else {
            NON_FINITE_OBJECTIVE
        }
    };

    let origin: Vec<f64> = problem
        .initial
        .iter()
        .enumerate()
        .map(|(index, &value)| clamp(index, value))
        .collect();

    // dimension + 1 vertices; each off-origin vertex perturbs one parameter
    let mut vertices: Vec<Vec<f64>> = Vec::with_capacity(dimension + 1);
    vertices.push(origin.clone());
    for index in 0..dimension {
        let mut vertex = origin.clone();
        let step = INITIAL_STEP_FRACTION * vertex[index].abs().max(1.0);
        vertex[index] = clamp(index, vertex[index] + step);
        if vertex[index] == origin[index] {
            vertex[index] = clamp(index, origin[index] - step);
        }
        vertices.push(vertex);
    }
    let mut values: Vec<f64> = vertices.iter().map(|vertex| guarded(vertex)).collect();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iterations {
        iterations += 1;

        let mut order: Vec<usize> = (0..vertices.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        let best = order[0];
        let worst = order[order.len() - 1];
        let second_worst = order[order.len() - 2];

        let spread = (values[worst] - values[best]).abs();
        if spread <= config.tolerance * (1.0 + values[best].abs()) {
            converged = true;
            break;
        }

        // centroid of every vertex except the worst
        let mut centroid = vec![0.0; dimension];
        for (index, vertex) in vertices.iter().enumerate() {
            if index == worst {
                continue;
            }
            for (component, value) in centroid.iter_mut().zip(vertex) {
                *component += value;
            }
        }
        for component in centroid.iter_mut() {
            *component /= dimension as f64;
        }

        let reflected = moved_point(&centroid, &vertices[worst], REFLECTION, &problem);
        let reflected_value = guarded(&reflected);

        if reflected_value < values[best] {
            let expanded = moved_point(&centroid, &vertices[worst], EXPANSION, &problem);
            let expanded_value = guarded(&expanded);
            if expanded_value < reflected_value {
                vertices[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                vertices[worst] = reflected;
                values[worst] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[second_worst] {
            vertices[worst] = reflected;
            values[worst] = reflected_value;
            continue;
        }

        let contracted = moved_point(&centroid, &vertices[worst], -CONTRACTION, &problem);
        let contracted_value = guarded(&contracted);
        if contracted_value < values[worst] {
            vertices[worst] = contracted;
            values[worst] = contracted_value;
            continue;
        }

        // shrink everything toward the best vertex
        let anchor = vertices[best].clone();
        for (index, vertex) in vertices.iter_mut().enumerate() {
            if index == best {
                continue;
            }
            for (component, anchor_value) in vertex.iter_mut().zip(anchor.iter()) {
                *component = anchor_value + SHRINK * (*component - anchor_value);
            }
            values[index] = guarded(vertex);
        }
    }

    let best = values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index)
        .expect("simplex always holds at least one vertex");

    Ok(SimplexOutcome {
        parameters: vertices.swap_remove(best),
        objective: values[best],
        iterations,
        converged,
    })
}

fn moved_point(
    centroid: &[f64],
    worst: &[f64],
    coefficient: f64,
    problem: &BoundedProblem<'_>,
) -> Vec<f64> {
    centroid
        .iter()
        .enumerate()
        .map(|(index, &center)| {
            let candidate = center + coefficient * (center - worst[index]);
            candidate.clamp(problem.lower[index], problem.upper[index])
        })
        .collect()
}

fn validate(problem: &BoundedProblem<'_>) -> Result<(), SimplexError> {
    if problem.initial.is_empty() {
        return Err(SimplexError::EmptyProblem);
    }
    if problem.initial.len() != problem.lower.len() || problem.initial.len() != problem.upper.len()
    {
        return Err(SimplexError::BoundsLengthMismatch {
            initial: problem.initial.len(),
            lower: problem.lower.len(),
            upper: problem.upper.len(),
        });
    }
    for index in 0..problem.initial.len() {
        if problem.lower[index] > problem.upper[index] {
            return Err(SimplexError::InvertedBounds {
                index,
                lower: problem.lower[index],
                upper: problem.upper[index],
            });
        }
        if !problem.initial[index].is_finite() {
            return Err(SimplexError::NonFiniteInitial {
                index,
                value: problem.initial[index],
            });
        }
    }
    Ok(())
}

/// Central-difference Hessian of `objective` at `point`. Used to estimate
/// parameter covariances at a likelihood minimum.
pub fn numerical_hessian<F>(mut objective: F, point: &[f64], relative_step: f64) -> DenseMatrix
where
    F: FnMut(&[f64]) -> f64,
{
    let dimension = point.len();
    let steps: Vec<f64> = point
        .iter()
        .map(|&value| relative_step * value.abs().max(1.0e-3))
        .collect();
    let center = objective(point);
    let mut hessian = DenseMatrix::zeros(dimension, dimension);
    let mut probe = point.to_vec();

    for i in 0..dimension {
        probe.copy_from_slice(point);
        probe[i] = point[i] + steps[i];
        let plus = objective(&probe);
        probe[i] = point[i] - steps[i];
        let minus = objective(&probe);
        hessian[(i, i)] = (plus - 2.0 * center + minus) / (steps[i] * steps[i]);

        for j in (i + 1)..dimension {
            probe.copy_from_slice(point);
            probe[i] = point[i] + steps[i];
            probe[j] = point[j] + steps[j];
            let pp = objective(&probe);
            probe[j] = point[j] - steps[j];
            let pm = objective(&probe);
            probe[i] = point[i] - steps[i];
            let mm = objective(&probe);
            probe[j] = point[j] + steps[j];
            let mp = objective(&probe);
            let mixed = (pp - pm - mp + mm) / (4.0 * steps[i] * steps[j]);
            hessian[(i, j)] = mixed;
            hessian[(j, i)] = mixed;
        }
    }
    hessian
}

#[cfg(test)]
mod tests {
    use super::{
        minimize_bounded, numerical_hessian, BoundedProblem, SimplexConfig, SimplexError,
    };

    #[test]
    fn quadratic_bowl_minimizes_to_its_center() {
        let objective =
            |p: &[f64]| (p[0] - 3.0) * (p[0] - 3.0) + 2.0 * (p[1] + 1.0) * (p[1] + 1.0);
        let outcome = minimize_bounded(
            objective,
            BoundedProblem {
                initial: &[0.0, 0.0],
                lower: &[-10.0, -10.0],
                upper: &[10.0, 10.0],
            },
            SimplexConfig::default(),
        )
        .expect("problem is well formed");

        assert!(outcome.converged);
        assert!((outcome.parameters[0] - 3.0).abs() < 1.0e-4);
        assert!((outcome.parameters[1] + 1.0).abs() < 1.0e-4);
    }

    #[test]
    fn bounds_pin_the_constrained_minimum_to_the_box_edge() {
        let objective = |p: &[f64]| (p[0] + 5.0) * (p[0] + 5.0);
        let outcome = minimize_bounded(
            objective,
            BoundedProblem {
                initial: &[1.0],
                lower: &[0.0],
                upper: &[10.0],
            },
            SimplexConfig::default(),
        )
        .expect("problem is well formed");
        assert!(outcome.parameters[0].abs() < 1.0e-6);
    }

    #[test]
    fn l1_objective_is_handled_without_derivatives() {
        let objective = |p: &[f64]| (p[0] - 2.0).abs() + (p[1] - 4.0).abs();
        let outcome = minimize_bounded(
            objective,
            BoundedProblem {
                initial: &[0.0, 0.0],
                lower: &[-100.0, -100.0],
                upper: &[100.0, 100.0],
            },
            SimplexConfig::default(),
        )
        .expect("problem is well formed");
        assert!((outcome.parameters[0] - 2.0).abs() < 1.0e-3);
        assert!((outcome.parameters[1] - 4.0).abs() < 1.0e-3);
    }

    #[test]
    fn validation_rejects_malformed_problems() {
        let objective = |_: &[f64]| 0.0;
        assert_eq!(
            minimize_bounded(
                objective,
                BoundedProblem {
                    initial: &[],
                    lower: &[],
                    upper: &[],
                },
                SimplexConfig::default(),
            ),
            Err(SimplexError::EmptyProblem)
        );
        assert!(matches!(
            minimize_bounded(
                objective,
                BoundedProblem {
                    initial: &[0.0],
                    lower: &[1.0],
                    upper: &[-1.0],
                },
                SimplexConfig::default(),
            ),
            Err(SimplexError::InvertedBounds { index: 0, .. })
        ));
    }

    #[test]
    fn non_finite_objective_regions_are_repelled_not_fatal() {
        let objective = |p: &[f64]| {
            if p[0] < 0.0 {
                f64::NAN
            } else {
                (p[0] - 1.0) * (p[0] - 1.0)
            }
        };
        let outcome = minimize_bounded(
            objective,
            BoundedProblem {
                initial: &[2.0],
                lower: &[-10.0],
                upper: &[10.0],
            },
            SimplexConfig::default(),
        )
        .expect("problem is well formed");
        assert!((outcome.parameters[0] - 1.0).abs() < 1.0e-4);
    }

    #[test]
    fn hessian_of_quadratic_matches_curvature() {
        let objective = |p: &[f64]| 2.0 * p[0] * p[0] + 3.0 * p[1] * p[1] + p[0] * p[1];
        let hessian = numerical_hessian(objective, &[0.5, -0.5], 1.0e-4);
        assert!((hessian[(0, 0)] - 4.0).abs() < 1.0e-3);
        assert!((hessian[(1, 1)] - 6.0).abs() < 1.0e-3);
        assert!((hessian[(0, 1)] - 1.0).abs() < 1.0e-3);
        assert!((hessian[(1, 0)] - 1.0).abs() < 1.0e-3);
    }
}
