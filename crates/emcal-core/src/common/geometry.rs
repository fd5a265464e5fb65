//! Static mapping between readout channel indices and 4x4 grid positions.
//!
//! Two inconsistent mappings circulated during the test beam; the one pinned
//! here (channel 15 at the grid origin, channel 0 at the far corner) is the
//! single canonical convention for every consumer in this workspace.

pub const CHANNEL_COUNT: usize = 16;
pub const GRID_SIZE: usize = 4;

/// Channel whose weight is held at 1.0 after calibration normalization.
pub const REFERENCE_CHANNEL: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPosition {
    pub row: usize,
    pub col: usize,
}

/// Grid position of a readout channel.
///
/// Total over 0..16 and bijective with [`channel_at`].
pub const fn position(channel: usize) -> Option<GridPosition> {
    if channel >= CHANNEL_COUNT {
        return None;
    }
    Some(GridPosition {
        row: GRID_SIZE - 1 - channel / GRID_SIZE,
        col: GRID_SIZE - 1 - channel % GRID_SIZE,
    })
}

/// Readout channel occupying a grid cell.
pub const fn channel_at(row: usize, col: usize) -> Option<usize> {
    if row >= GRID_SIZE || col >= GRID_SIZE {
        return None;
    }
    Some((GRID_SIZE - 1 - row) * GRID_SIZE + (GRID_SIZE - 1 - col))
}
