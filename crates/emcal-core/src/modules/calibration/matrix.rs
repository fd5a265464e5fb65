use super::ScaleVector;
use crate::common::geometry::CHANNEL_COUNT;
use crate::domain::{CalibError, CalibResult, EventRecord};
use crate::numerics::DenseMatrix;

/// Immutable N x 16 matrix of low-gain ADC values for one event sample.
///
/// Selection never mutates in place: [`Self::select`] returns an independent
/// copy, so the unfiltered matrix stays valid for the final uncalibrated
/// comparison after the regression loop has shrunk its working sample.
#[derive(Debug, Clone)]
pub struct EventMatrix {
    data: DenseMatrix,
}

impl EventMatrix {
    pub fn from_rows(rows: &[[f64; CHANNEL_COUNT]]) -> Self {
        let mut data = DenseMatrix::zeros(rows.len(), CHANNEL_COUNT);
        for (event, row) in rows.iter().enumerate() {
            for (channel, &value) in row.iter().enumerate() {
                data[(event, channel)] = value;
            }
        }
        Self { data }
    }

    pub fn from_records(records: &[EventRecord]) -> Self {
        let mut data = DenseMatrix::zeros(records.len(), CHANNEL_COUNT);
        for (event, record) in records.iter().enumerate() {
            for (channel, &adc) in record.ch_lg.iter().enumerate() {
                data[(event, channel)] = f64::from(adc);
            }
        }
        Self { data }
    }

    pub fn n_events(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.n_events() == 0
    }

    pub fn row(&self, event: usize) -> [f64; CHANNEL_COUNT] {
        let mut row = [0.0; CHANNEL_COUNT];
        for (channel, value) in row.iter_mut().enumerate() {
            *value = self.data[(event, channel)];
        }
        row
    }

    /// All events' values for one channel, in event order.
    pub fn channel_values(&self, channel: usize) -> Vec<f64> {
        (0..self.n_events())
            .map(|event| self.data[(event, channel)])
            .collect()
    }

    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_events())
            .map(|event| {
                (0..CHANNEL_COUNT)
                    .map(|channel| self.data[(event, channel)])
                    .sum()
            })
            .collect()
    }

    /// Calibrated energy prediction for every event.
    pub fn predict(&self, scales: &ScaleVector) -> Vec<f64> {
        (0..self.n_events()).map(|event| scales.apply(&self.row(event))).collect()
    }

    /// Independent copy holding only the events where `mask` is true.
    pub fn select(&self, mask: &[bool]) -> CalibResult<Self> {
        if mask.len() != self.n_events() {
            return Err(CalibError::internal(
                "CALIB.SELECT_MASK",
                format!(
                    "selection mask length {} does not match event count {}",
                    mask.len(),
                    self.n_events()
                ),
            ));
        }
        let kept: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(event, &keep)| keep.then_some(event))
            .collect();
        let mut data = DenseMatrix::zeros(kept.len(), CHANNEL_COUNT);
        for (target, &source) in kept.iter().enumerate() {
            for channel in 0..CHANNEL_COUNT {
                data[(target, channel)] = self.data[(source, channel)];
            }
        }
        Ok(Self { data })
    }
}

#[cfg(test)]
mod tests {
    use super::EventMatrix;
    use crate::modules::calibration::ScaleVector;

    fn two_event_matrix() -> EventMatrix {
        let mut first = [1.0; 16];
        first[0] = 5.0;
        let second = [2.0; 16];
        EventMatrix::from_rows(&[first, second])
    }

    #[test]
    fn row_sums_and_channel_columns_agree_with_the_rows() {
        let matrix = two_event_matrix();
        assert_eq!(matrix.n_events(), 2);
        assert_eq!(matrix.row_sums(), vec![20.0, 32.0]);
        assert_eq!(matrix.channel_values(0), vec![5.0, 2.0]);
    }

    #[test]
    fn unit_prediction_equals_the_row_sum() {
        let matrix = two_event_matrix();
        assert_eq!(matrix.predict(&ScaleVector::unit()), matrix.row_sums());
    }

    #[test]
    fn selection_copies_and_leaves_the_source_intact() {
        let matrix = two_event_matrix();
        let subset = matrix.select(&[false, true]).expect("mask length matches");
        assert_eq!(subset.n_events(), 1);
        assert_eq!(subset.row_sums(), vec![32.0]);
        // original is untouched
        assert_eq!(matrix.n_events(), 2);
        assert_eq!(matrix.row_sums(), vec![20.0, 32.0]);
    }

    #[test]
    fn mask_length_mismatch_is_an_error() {
        let matrix = two_event_matrix();
        assert!(matrix.select(&[true]).is_err());
    }
}
