//! Score-window event selection.
//!
//! The same predicate serves two policies: literal ADC-sum bounds from the
//! run catalog (building electron-dominated samples before calibration) and
//! moment-derived windows around a prediction distribution (refining the
//! regression sample between rounds).

use crate::numerics::stats::gaussian_moments;

/// Keep events whose score falls inside `[low, high]`.
pub fn select(scores: &[f64], low: f64, high: f64) -> Vec<bool> {
    scores
        .iter()
        .map(|&score| score >= low && score <= high)
        .collect()
}

/// Window `[mu - low_sigmas * sigma, mu + high_sigmas * sigma]` around the
/// Gaussian moments of `scores`. `None` for an empty sample.
pub fn moment_window(scores: &[f64], low_sigmas: f64, high_sigmas: f64) -> Option<(f64, f64)> {
    let (mean, sigma) = gaussian_moments(scores)?;
    Some((mean - low_sigmas * sigma, mean + high_sigmas * sigma))
}

pub fn selected_count(mask: &[bool]) -> usize {
    mask.iter().filter(|&&keep| keep).count()
}

#[cfg(test)]
mod tests {
    use super::{moment_window, select, selected_count};

    #[test]
    fn literal_window_is_inclusive_on_both_edges() {
        let mask = select(&[899.9, 900.0, 1000.0, 1200.0, 1200.1], 900.0, 1200.0);
        assert_eq!(mask, vec![false, true, true, true, false]);
        assert_eq!(selected_count(&mask), 3);
    }

    #[test]
    fn moment_window_excludes_a_gross_outlier() {
        // window derived from the first five scores excludes 100 for k >= 2
        let baseline = [1.0, 2.0, 3.0, 4.0, 5.0];
        let (low, high) = moment_window(&baseline, 2.0, 2.0).expect("sample is non-empty");
        let mask = select(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0], low, high);
        assert_eq!(mask, vec![true, true, true, true, true, false]);
    }

    #[test]
    fn moment_window_of_empty_sample_is_absent() {
        assert!(moment_window(&[], 2.0, 3.0).is_none());
    }

    #[test]
    fn asymmetric_window_widens_the_right_tail() {
        let scores = [10.0, 12.0, 14.0, 16.0, 18.0];
        let (low, high) = moment_window(&scores, 2.0, 3.0).expect("sample is non-empty");
        let (mean, _) = crate::numerics::stats::gaussian_moments(&scores).expect("moments");
        assert!(high - mean > mean - low);
    }
}
