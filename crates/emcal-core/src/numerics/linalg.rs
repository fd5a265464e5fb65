//! Small dense linear solves for likelihood-curvature matrices.
//!
//! The fitters only ever invert a handful-of-parameters Hessian, so a plain
//! partially-pivoted LU on [`DenseMatrix`] covers everything needed here.

use super::DenseMatrix;

const SINGULAR_PIVOT_EPSILON: f64 = 1.0e-14;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LuError {
    #[error("LU factorization requires a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("LU factorization requires a non-empty matrix")]
    EmptyMatrix,
    #[error("matrix is singular at pivot index {pivot_index}")]
    SingularMatrix { pivot_index: usize },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
pub struct LuDecomposition {
    lu: DenseMatrix,
    pivots: Vec<usize>,
}

impl LuDecomposition {
    pub fn dimension(&self) -> usize {
        self.lu.nrows()
    }

    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, LuError> {
        let dimension = self.dimension();
        if rhs.len() != dimension {
            return Err(LuError::RhsLengthMismatch {
                expected: dimension,
                actual: rhs.len(),
            });
        }

        let mut forward = vec![0.0; dimension];
        for row in 0..dimension {
            let mut value = rhs[self.pivots[row]];
            for col in 0..row {
                value -= self.lu[(row, col)] * forward[col];
            }
            forward[row] = value;
        }

        let mut solution = vec![0.0; dimension];
        for row in (0..dimension).rev() {
            let mut value = forward[row];
            for col in (row + 1)..dimension {
                value -= self.lu[(row, col)] * solution[col];
            }
            let diagonal = self.lu[(row, row)];
            if diagonal.abs() <= SINGULAR_PIVOT_EPSILON {
                return Err(LuError::SingularMatrix { pivot_index: row });
            }
            solution[row] = value / diagonal;
        }

        Ok(solution)
    }

    pub fn invert(&self) -> Result<DenseMatrix, LuError> {
        let dimension = self.dimension();
        let mut inverse = DenseMatrix::zeros(dimension, dimension);
        let mut basis = vec![0.0; dimension];

        for col in 0..dimension {
            basis.fill(0.0);
            basis[col] = 1.0;
            let solution = self.solve(&basis)?;
            for row in 0..dimension {
                inverse[(row, col)] = solution[row];
            }
        }
        Ok(inverse)
    }
}

pub fn lu_factorize(matrix: &DenseMatrix) -> Result<LuDecomposition, LuError> {
    if matrix.nrows() != matrix.ncols() {
        return Err(LuError::NonSquareMatrix {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
        });
    }
    let dimension = matrix.nrows();
    if dimension == 0 {
        return Err(LuError::EmptyMatrix);
    }

    let mut lu = matrix.clone();
    let mut pivots: Vec<usize> = (0..dimension).collect();

    for pivot_col in 0..dimension {
        let mut pivot_row = pivot_col;
        let mut pivot_magnitude = lu[(pivot_col, pivot_col)].abs();
        for row in (pivot_col + 1)..dimension {
            let magnitude = lu[(row, pivot_col)].abs();
            if magnitude > pivot_magnitude {
                pivot_row = row;
                pivot_magnitude = magnitude;
            }
        }
        if pivot_magnitude <= SINGULAR_PIVOT_EPSILON {
            return Err(LuError::SingularMatrix {
                pivot_index: pivot_col,
            });
        }

        if pivot_row != pivot_col {
            for col in 0..dimension {
                let swapped = lu[(pivot_col, col)];
                lu[(pivot_col, col)] = lu[(pivot_row, col)];
                lu[(pivot_row, col)] = swapped;
            }
            pivots.swap(pivot_col, pivot_row);
        }

        let pivot = lu[(pivot_col, pivot_col)];
        for row in (pivot_col + 1)..dimension {
            lu[(row, pivot_col)] /= pivot;
            let multiplier = lu[(row, pivot_col)];
            for col in (pivot_col + 1)..dimension {
                let updated = lu[(row, col)] - multiplier * lu[(pivot_col, col)];
                lu[(row, col)] = updated;
            }
        }
    }

    Ok(LuDecomposition { lu, pivots })
}

pub fn lu_solve(matrix: &DenseMatrix, rhs: &[f64]) -> Result<Vec<f64>, LuError> {
    lu_factorize(matrix)?.solve(rhs)
}

pub fn lu_invert(matrix: &DenseMatrix) -> Result<DenseMatrix, LuError> {
    lu_factorize(matrix)?.invert()
}

#[cfg(test)]
mod tests {
    use super::{lu_factorize, lu_invert, lu_solve, LuError};
    use crate::numerics::DenseMatrix;

    fn matrix_from_rows(rows: &[&[f64]]) -> DenseMatrix {
        let mut matrix = DenseMatrix::zeros(rows.len(), rows[0].len());
        for (i, row) in rows.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                matrix[(i, j)] = value;
            }
        }
        matrix
    }

    #[test]
    fn solve_recovers_a_known_solution() {
        let matrix = matrix_from_rows(&[&[4.0, 1.0], &[1.0, 3.0]]);
        let solution = lu_solve(&matrix, &[9.0, 7.0]).expect("matrix is invertible");
        assert!((solution[0] - 20.0 / 11.0).abs() < 1.0e-12);
        assert!((solution[1] - 19.0 / 11.0).abs() < 1.0e-12);
    }

    #[test]
    fn invert_times_original_is_identity() {
        let matrix = matrix_from_rows(&[&[2.0, 1.0, 0.0], &[1.0, 3.0, 1.0], &[0.0, 1.0, 4.0]]);
        let inverse = lu_invert(&matrix).expect("matrix is invertible");
        for i in 0..3 {
            for j in 0..3 {
                let mut product = 0.0;
                for k in 0..3 {
                    product += matrix[(i, k)] * inverse[(k, j)];
                }
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (product - expected).abs() < 1.0e-10,
                    "product[({i}, {j})] = {product}"
                );
            }
        }
    }

    #[test]
    fn pivoting_handles_a_zero_leading_entry() {
        let matrix = matrix_from_rows(&[&[0.0, 1.0], &[1.0, 0.0]]);
        let solution = lu_solve(&matrix, &[2.0, 3.0]).expect("permutation matrix is invertible");
        assert_eq!(solution, vec![3.0, 2.0]);
    }

    #[test]
    fn singular_matrix_is_reported() {
        let matrix = matrix_from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]);
        assert!(matches!(
            lu_factorize(&matrix),
            Err(LuError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn shape_errors_are_reported() {
        let rect = DenseMatrix::zeros(2, 3);
        assert!(matches!(
            lu_factorize(&rect),
            Err(LuError::NonSquareMatrix { rows: 2, cols: 3 })
        ));
        let empty = DenseMatrix::zeros(0, 0);
        assert!(matches!(lu_factorize(&empty), Err(LuError::EmptyMatrix)));
    }
}
