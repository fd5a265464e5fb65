//! Nonlinear per-event channel weighting.
//!
//! The learned model is captive: training happens outside this workspace and
//! only the inference contract matters here. A model maps a normalized 4x4
//! channel image to a scalar energy and a per-cell weight map, with every
//! weight confined to [`WEIGHT_FLOOR`], [`WEIGHT_CEILING`] by the
//! affine-of-sigmoid construction `0.4 * sigmoid(z) + 0.8` - the inductive
//! bias that keeps the correction close to unity and no channel zeroed out.

use crate::common::geometry::{position, CHANNEL_COUNT, GRID_SIZE};
use crate::domain::{CalibError, CalibResult};
use crate::modules::serialization::read_json_artifact;
use crate::numerics::histogram::GridMap;
use crate::numerics::stats::sigmoid;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const WEIGHT_FLOOR: f64 = 0.48;
pub const WEIGHT_CEILING: f64 = 1.2;

const IMAGE_NORM_EPSILON: f64 = 1.0e-6;

/// 4x4 channel image laid out through the canonical channel geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelImage(pub [[f64; GRID_SIZE]; GRID_SIZE]);

impl ChannelImage {
    pub fn from_channels(values: &[f64; CHANNEL_COUNT]) -> Self {
        let mut cells = [[0.0; GRID_SIZE]; GRID_SIZE];
        for (channel, &value) in values.iter().enumerate() {
            let cell = position(channel).expect("channel index is in range by construction");
            cells[cell.row][cell.col] = value;
        }
        Self(cells)
    }

    pub fn total(&self) -> f64 {
        self.0.iter().flatten().sum()
    }

    /// Image scaled to unit total, the normalization the model expects.
    pub fn normalized(&self) -> Self {
        let scale = self.total() + IMAGE_NORM_EPSILON;
        let mut cells = self.0;
        for cell in cells.iter_mut().flatten() {
            *cell /= scale;
        }
        Self(cells)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedPrediction {
    pub energy: f64,
    pub weights: [[f64; GRID_SIZE]; GRID_SIZE],
}

/// Inference contract of the captive learned model.
pub trait NonlinearWeightModel {
    fn infer(&self, image: &ChannelImage) -> WeightedPrediction;
}

/// Parameter-loaded inference: per-cell affine response pushed through the
/// bounded sigmoid weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmoidWeightModel {
    gain: [[f64; GRID_SIZE]; GRID_SIZE],
    bias: [[f64; GRID_SIZE]; GRID_SIZE],
}

impl SigmoidWeightModel {
    pub fn new(gain: [[f64; GRID_SIZE]; GRID_SIZE], bias: [[f64; GRID_SIZE]; GRID_SIZE]) -> Self {
        Self { gain, bias }
    }

    /// All-unity weights (`sigmoid(0) = 0.5` maps to exactly 1.0); the stub
    /// used when no trained parameters are available.
    pub fn uniform() -> Self {
        Self {
            gain: [[0.0; GRID_SIZE]; GRID_SIZE],
            bias: [[0.0; GRID_SIZE]; GRID_SIZE],
        }
    }

    pub fn load(path: &Path) -> CalibResult<Self> {
        read_json_artifact(path).map_err(|source| {
            CalibError::missing_data(
                "IO.WEIGHT_MODEL",
                format!("failed to load weight model '{}': {source}", path.display()),
            )
        })
    }
}

impl NonlinearWeightModel for SigmoidWeightModel {
    fn infer(&self, image: &ChannelImage) -> WeightedPrediction {
        let normalized = image.normalized();
        let mut weights = [[0.0; GRID_SIZE]; GRID_SIZE];
        let mut energy = 0.0;
        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                let response = self.gain[row][col] * normalized.0[row][col] + self.bias[row][col];
                let weight = 0.4 * sigmoid(response) + 0.8;
                weights[row][col] = weight;
                energy += image.0[row][col] * weight;
            }
        }
        WeightedPrediction { energy, weights }
    }
}

/// Per-cell mean and standard deviation of the weight maps of the events
/// where `mask` is true. `None` when nothing is selected.
pub fn aggregate_weight_maps(
    predictions: &[WeightedPrediction],
    mask: &[bool],
) -> Option<GridMap> {
    let selected: Vec<&WeightedPrediction> = predictions
        .iter()
        .zip(mask)
        .filter_map(|(prediction, &keep)| keep.then_some(prediction))
        .collect();
    if selected.is_empty() {
        return None;
    }

    let count = selected.len() as f64;
    let mut map = GridMap::default();
    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            let mean = selected
                .iter()
                .map(|prediction| prediction.weights[row][col])
                .sum::<f64>()
                / count;
            let variance = selected
                .iter()
                .map(|prediction| {
                    let delta = prediction.weights[row][col] - mean;
                    delta * delta
                })
                .sum::<f64>()
                / count;
            map.content[row][col] = mean;
            map.error[row][col] = variance.sqrt();
        }
    }
    Some(map)
}
