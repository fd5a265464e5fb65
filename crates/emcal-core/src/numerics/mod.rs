pub mod histogram;
pub mod linalg;
pub mod optimize;
pub mod stats;

pub use histogram::{GridMap, Histogram1D, HistogramError};
pub use linalg::{lu_factorize, lu_invert, lu_solve, LuDecomposition, LuError};
pub use optimize::{
    minimize_bounded, numerical_hessian, BoundedProblem, SimplexConfig, SimplexError,
    SimplexOutcome,
};
pub use stats::{gaussian_moments, normal_cdf, normal_pdf, sigmoid};

use faer::Mat;

pub type DenseMatrix = Mat<f64>;
