//! Dense square matrices of arc weights.
//!
//! Cost and duration inputs share the same shape: a row-major `n x n` matrix
//! where entry `(from, to)` is the weight of travelling directly from node
//! `from` to node `to`. Construction validates squareness; reads outside the
//! matrix log a warning and fall back to zero rather than panicking inside an
//! engine callback.

use thiserror::Error;

/// Dense, row-major square matrix of `i64` arc weights.
///
/// # Examples
///
/// ```
/// use fleetway_core::SquareMatrix;
///
/// # fn main() -> Result<(), fleetway_core::SquareMatrixError> {
/// let matrix = SquareMatrix::from_rows(vec![vec![0, 3], vec![4, 0]])?;
/// assert_eq!(matrix.dim(), 2);
/// assert_eq!(matrix.at(0, 1), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SquareMatrix {
    dim: usize,
    values: Vec<i64>,
}

/// Errors returned by [`SquareMatrix`] constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SquareMatrixError {
    /// A row's length did not match the number of rows.
    #[error("expected row {row} to have {dim} entries, found {len}")]
    RaggedRow {
        /// Index of the offending row.
        row: usize,
        /// Length of the offending row.
        len: usize,
        /// Expected dimension, i.e. the number of rows.
        dim: usize,
    },
    /// The flat value buffer did not hold `dim * dim` entries.
    #[error("expected {} values for a {dim}x{dim} matrix, found {len}", dim * dim)]
    WrongLength {
        /// Number of values supplied.
        len: usize,
        /// Requested dimension.
        dim: usize,
    },
}

impl SquareMatrix {
    /// Build a matrix from nested rows, validating that every row has as
    /// many entries as there are rows.
    pub fn from_rows(rows: Vec<Vec<i64>>) -> Result<Self, SquareMatrixError> {
        let dim = rows.len();
        for (row, entries) in rows.iter().enumerate() {
            if entries.len() != dim {
                return Err(SquareMatrixError::RaggedRow {
                    row,
                    len: entries.len(),
                    dim,
                });
            }
        }
        Ok(Self {
            dim,
            values: rows.into_iter().flatten().collect(),
        })
    }

    /// Build a matrix from a flat row-major buffer of `dim * dim` values.
    pub fn from_values(dim: usize, values: Vec<i64>) -> Result<Self, SquareMatrixError> {
        if values.len() != dim * dim {
            return Err(SquareMatrixError::WrongLength {
                len: values.len(),
                dim,
            });
        }
        Ok(Self { dim, values })
    }

    /// Build a matrix whose off-diagonal entries all equal `value` and whose
    /// diagonal is zero.
    pub fn uniform(dim: usize, value: i64) -> Self {
        let mut values = vec![value; dim * dim];
        for slot in values.iter_mut().step_by(dim + 1) {
            *slot = 0;
        }
        Self { dim, values }
    }

    /// Number of nodes covered by the matrix.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Weight of the arc from `from` to `to`.
    ///
    /// Out-of-range coordinates cannot occur for validated instances; if they
    /// do, the read logs a warning and yields zero so engine callbacks never
    /// panic mid-search.
    #[must_use]
    pub fn at(&self, from: usize, to: usize) -> i64 {
        self.values
            .get(from * self.dim + to)
            .copied()
            .unwrap_or_else(|| {
                log::warn!(
                    "matrix access ({from}, {to}) outside dimension {}; falling back to zero",
                    self.dim
                );
                debug_assert!(false, "matrix access ({from}, {to}) out of range");
                0
            })
    }
}
