//! Uniform-bin spectra and 4x4 grid maps.
//!
//! These are the data contracts behind the external histogram store: a 1-D
//! energy spectrum with under/overflow bookkeeping and a per-cell grid map
//! with content and error, both serializable as JSON documents.

use crate::common::geometry::GRID_SIZE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistogramError {
    #[error("histogram requires at least 1 bin, got {actual}")]
    NoBins { actual: usize },
    #[error("histogram range must satisfy min < max with finite bounds, got ({min}, {max})")]
    InvalidRange { min: f64, max: f64 },
    #[error("grid cell ({row}, {col}) is outside the {size}x{size} map")]
    CellOutOfRange { row: usize, col: usize, size: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    min: f64,
    max: f64,
    bins: Vec<f64>,
    underflow: f64,
    overflow: f64,
    entries: u64,
}

impl Histogram1D {
    pub fn new(bin_count: usize, min: f64, max: f64) -> Result<Self, HistogramError> {
        if bin_count == 0 {
            return Err(HistogramError::NoBins { actual: bin_count });
        }
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(HistogramError::InvalidRange { min, max });
        }
        Ok(Self {
            min,
            max,
            bins: vec![0.0; bin_count],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        })
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.bins.len() as f64
    }

    pub fn bin_center(&self, index: usize) -> f64 {
        self.min + (index as f64 + 0.5) * self.bin_width()
    }

    pub fn content(&self, index: usize) -> f64 {
        self.bins[index]
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn fill(&mut self, value: f64) {
        self.fill_weighted(value, 1.0);
    }

    pub fn fill_weighted(&mut self, value: f64, weight: f64) {
        self.entries += 1;
        if value < self.min {
            self.underflow += weight;
        } else if value >= self.max {
            self.overflow += weight;
        } else {
            let index = ((value - self.min) / self.bin_width()) as usize;
            // rounding at the upper edge can land exactly on bins.len()
            let index = index.min(self.bins.len() - 1);
            self.bins[index] += weight;
        }
    }

    pub fn fill_all<I: IntoIterator<Item = f64>>(&mut self, values: I) {
        for value in values {
            self.fill(value);
        }
    }

    /// Sum of all bin contents including underflow and overflow.
    pub fn integral_with_flows(&self) -> f64 {
        self.bins.iter().sum::<f64>() + self.underflow + self.overflow
    }

    /// In-range integral only.
    pub fn integral(&self) -> f64 {
        self.bins.iter().sum()
    }

    /// Mean of the in-range spectrum, computed from bin centers.
    pub fn mean(&self) -> f64 {
        let total = self.integral();
        if total <= 0.0 {
            return 0.0;
        }
        self.bins
            .iter()
            .enumerate()
            .map(|(index, content)| content * self.bin_center(index))
            .sum::<f64>()
            / total
    }

    /// RMS of the in-range spectrum around [`Self::mean`].
    pub fn rms(&self) -> f64 {
        let total = self.integral();
        if total <= 0.0 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .bins
            .iter()
            .enumerate()
            .map(|(index, content)| {
                let delta = self.bin_center(index) - mean;
                content * delta * delta
            })
            .sum::<f64>()
            / total;
        variance.sqrt()
    }

    /// Contents of bins whose centers fall inside `[low, high]`, with their
    /// centers. This is the restricted view the likelihood fit runs on.
    pub fn window(&self, low: f64, high: f64) -> Vec<(f64, f64)> {
        (0..self.bins.len())
            .filter_map(|index| {
                let center = self.bin_center(index);
                (center >= low && center <= high).then(|| (center, self.bins[index]))
            })
            .collect()
    }
}

/// Per-cell content and error over the 4x4 detector face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GridMap {
    pub content: [[f64; GRID_SIZE]; GRID_SIZE],
    pub error: [[f64; GRID_SIZE]; GRID_SIZE],
}

impl GridMap {
    pub fn set(&mut self, row: usize, col: usize, value: f64, error: f64) -> Result<(), HistogramError> {
        if row >= GRID_SIZE || col >= GRID_SIZE {
            return Err(HistogramError::CellOutOfRange {
                row,
                col,
                size: GRID_SIZE,
            });
        }
        self.content[row][col] = value;
        self.error[row][col] = error;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{GridMap, Histogram1D, HistogramError};

    #[test]
    fn construction_rejects_degenerate_ranges() {
        assert!(matches!(
            Histogram1D::new(0, 0.0, 1.0),
            Err(HistogramError::NoBins { .. })
        ));
        assert!(matches!(
            Histogram1D::new(10, 5.0, 5.0),
            Err(HistogramError::InvalidRange { .. })
        ));
        assert!(Histogram1D::new(10, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn fills_route_to_bins_and_flows() {
        let mut hist = Histogram1D::new(10, 0.0, 100.0).expect("valid histogram");
        hist.fill(-5.0);
        hist.fill(5.0);
        hist.fill(95.0);
        hist.fill(100.0);
        hist.fill(250.0);

        assert_eq!(hist.entries(), 5);
        assert_eq!(hist.content(0), 1.0);
        assert_eq!(hist.content(9), 1.0);
        assert_eq!(hist.integral(), 2.0);
        assert_eq!(hist.integral_with_flows(), 5.0);
    }

    #[test]
    fn moments_match_a_two_bin_spectrum() {
        let mut hist = Histogram1D::new(2, 0.0, 2.0).expect("valid histogram");
        hist.fill(0.3);
        hist.fill(1.7);
        // bin centers 0.5 and 1.5, equal weight
        assert!((hist.mean() - 1.0).abs() < 1.0e-12);
        assert!((hist.rms() - 0.5).abs() < 1.0e-12);
    }

    #[test]
    fn window_restricts_to_bin_centers() {
        let mut hist = Histogram1D::new(10, 0.0, 10.0).expect("valid histogram");
        hist.fill_all([0.2, 3.4, 4.6, 8.8]);
        let window = hist.window(3.0, 5.0);
        assert_eq!(window, vec![(3.5, 1.0), (4.5, 1.0)]);
    }

    #[test]
    fn empty_spectrum_has_zero_moments() {
        let hist = Histogram1D::new(10, 0.0, 10.0).expect("valid histogram");
        assert_eq!(hist.mean(), 0.0);
        assert_eq!(hist.rms(), 0.0);
    }

    #[test]
    fn grid_map_rejects_out_of_range_cells() {
        let mut map = GridMap::default();
        map.set(1, 2, 0.95, 0.02).expect("in-range cell");
        assert_eq!(map.content[1][2], 0.95);
        assert!(map.set(4, 0, 1.0, 0.0).is_err());
    }
}
