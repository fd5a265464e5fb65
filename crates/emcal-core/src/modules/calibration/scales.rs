use crate::common::geometry::{CHANNEL_COUNT, REFERENCE_CHANNEL};
use crate::domain::{CalibError, CalibResult};

/// 16 channel weights plus the trailing bias term.
pub const SCALE_VECTOR_LEN: usize = CHANNEL_COUNT + 1;

/// The regression bias is confined to this symmetric interval.
pub const BIAS_BOUND: f64 = 100.0;

const REFERENCE_WEIGHT_EPSILON: f64 = 1.0e-12;

/// Affine map from one event's 16 channel values to a calibrated energy.
///
/// Channel weights are non-negative (a physical channel cannot have negative
/// gain in this model); the bias may be negative within [`BIAS_BOUND`].
/// After [`Self::normalized_to_reference`] the bias is carried verbatim and
/// is a placeholder: the optimizer's scale gauge entangles it with the
/// weights, and downstream consumers must not reinterpret it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleVector {
    weights: [f64; CHANNEL_COUNT],
    bias: f64,
}

impl ScaleVector {
    pub fn new(weights: [f64; CHANNEL_COUNT], bias: f64) -> CalibResult<Self> {
        for (channel, &weight) in weights.iter().enumerate() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(CalibError::computation(
                    "CALIB.SCALE_WEIGHT",
                    format!("channel {channel} weight must be finite and non-negative, got {weight}"),
                ));
            }
        }
        if !bias.is_finite() || bias.abs() > BIAS_BOUND {
            return Err(CalibError::computation(
                "CALIB.SCALE_BIAS",
                format!("bias must be finite within +-{BIAS_BOUND}, got {bias}"),
            ));
        }
        Ok(Self { weights, bias })
    }

    /// Unit weights with zero bias: the uncalibrated channel sum used as the
    /// side-by-side comparison in every apply step.
    pub fn unit() -> Self {
        Self {
            weights: [1.0; CHANNEL_COUNT],
            bias: 0.0,
        }
    }

    pub fn weights(&self) -> &[f64; CHANNEL_COUNT] {
        &self.weights
    }

    pub fn weight(&self, channel: usize) -> f64 {
        self.weights[channel]
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn apply(&self, channels: &[f64; CHANNEL_COUNT]) -> f64 {
        let mut energy = self.bias;
        for (value, weight) in channels.iter().zip(self.weights.iter()) {
            energy += value * weight;
        }
        energy
    }

    /// Flat order-significant representation: 16 weights then the bias.
    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = self.weights.to_vec();
        flat.push(self.bias);
        flat
    }

    pub fn from_flat(flat: &[f64]) -> CalibResult<Self> {
        if flat.len() != SCALE_VECTOR_LEN {
            return Err(CalibError::computation(
                "CALIB.SCALE_LEN",
                format!(
                    "scale vector must hold {SCALE_VECTOR_LEN} values, got {}",
                    flat.len()
                ),
            ));
        }
        let mut weights = [0.0; CHANNEL_COUNT];
        weights.copy_from_slice(&flat[..CHANNEL_COUNT]);
        Self::new(weights, flat[CHANNEL_COUNT])
    }

    /// Accept both persisted forms: 17 values (weights + bias) from the
    /// regression path, or 16 weights with an implicit zero bias from the
    /// MIP ratio path.
    pub fn from_list(values: &[f64]) -> CalibResult<Self> {
        if values.len() == CHANNEL_COUNT {
            let mut weights = [0.0; CHANNEL_COUNT];
            weights.copy_from_slice(values);
            return Self::new(weights, 0.0);
        }
        Self::from_flat(values)
    }

    /// Rescale the weights so the reference channel carries weight exactly
    /// 1.0, making coefficients comparable across runs. The bias is not
    /// rescaled.
    pub fn normalized_to_reference(&self) -> CalibResult<Self> {
        let reference = self.weights[REFERENCE_CHANNEL];
        if reference.abs() <= REFERENCE_WEIGHT_EPSILON {
            return Err(CalibError::computation(
                "CALIB.SCALE_REFERENCE",
                format!(
                    "reference channel {REFERENCE_CHANNEL} weight {reference} is too small to normalize against"
                ),
            ));
        }
        let mut weights = self.weights;
        for weight in weights.iter_mut() {
            *weight /= reference;
        }
        Self::new(weights, self.bias)
    }
}
