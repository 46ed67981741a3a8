use crate::error::{ClaimError, ClaimResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense 2-D matrix of `f64`, the feature container passed to every model.
///
/// Stores data in a flat contiguous `Vec<f64>` with row-major (C-order) layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Create a matrix from raw row-major data.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> ClaimResult<Self> {
        if data.len() != rows * cols {
            return Err(ClaimError::ShapeMismatch {
                expected: vec![rows, cols],
                got: vec![data.len()],
            });
        }
        Ok(Matrix { data, rows, cols })
    }

    /// Create a matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create a matrix from a slice of rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> ClaimResult<Self> {
        if rows.is_empty() {
            return Ok(Matrix::zeros(0, 0));
        }
        let cols = rows[0].len();
        if rows.iter().any(|r| r.len() != cols) {
            return Err(ClaimError::InvalidOperation(
                "All rows must have the same number of columns".to_string(),
            ));
        }
        let data: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Matrix::new(data, rows.len(), cols)
    }

    /// Create a matrix from column vectors of equal length.
    pub fn from_columns(columns: &[Vec<f64>]) -> ClaimResult<Self> {
        if columns.is_empty() {
            return Ok(Matrix::zeros(0, 0));
        }
        let rows = columns[0].len();
        if columns.iter().any(|c| c.len() != rows) {
            return Err(ClaimError::InvalidOperation(
                "All columns must have the same number of rows".to_string(),
            ));
        }
        let cols = columns.len();
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for col in columns {
                data.push(col[i]);
            }
        }
        Matrix::new(data, rows, cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Bounds-checked element access.
    pub fn get(&self, i: usize, j: usize) -> ClaimResult<f64> {
        self.check(i, j)?;
        Ok(self.data[i * self.cols + j])
    }

    /// Bounds-checked element write.
    pub fn set(&mut self, i: usize, j: usize, value: f64) -> ClaimResult<()> {
        self.check(i, j)?;
        self.data[i * self.cols + j] = value;
        Ok(())
    }

    /// Unchecked-by-`Result` element access for inner loops; panics like slice indexing.
    #[inline]
    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    /// Borrow row `i` as a slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Copy out column `j`.
    pub fn column(&self, j: usize) -> ClaimResult<Vec<f64>> {
        if j >= self.cols {
            return Err(ClaimError::IndexOutOfBounds {
                index: j,
                axis: 1,
                size: self.cols,
            });
        }
        Ok((0..self.rows).map(|i| self.at(i, j)).collect())
    }

    fn check(&self, i: usize, j: usize) -> ClaimResult<()> {
        if i >= self.rows {
            return Err(ClaimError::IndexOutOfBounds {
                index: i,
                axis: 0,
                size: self.rows,
            });
        }
        if j >= self.cols {
            return Err(ClaimError::IndexOutOfBounds {
                index: j,
                axis: 1,
                size: self.cols,
            });
        }
        Ok(())
    }

    /// Gather the given rows (in order, repeats allowed) into a new matrix.
    pub fn select_rows(&self, indices: &[usize]) -> ClaimResult<Matrix> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            if i >= self.rows {
                return Err(ClaimError::IndexOutOfBounds {
                    index: i,
                    axis: 0,
                    size: self.rows,
                });
            }
            data.extend_from_slice(self.row(i));
        }
        Matrix::new(data, indices.len(), self.cols)
    }

    /// Gather the given columns (in order) into a new matrix.
    pub fn select_cols(&self, indices: &[usize]) -> ClaimResult<Matrix> {
        if let Some(&bad) = indices.iter().find(|&&j| j >= self.cols) {
            return Err(ClaimError::IndexOutOfBounds {
                index: bad,
                axis: 1,
                size: self.cols,
            });
        }
        let mut data = Vec::with_capacity(self.rows * indices.len());
        for i in 0..self.rows {
            let row = self.row(i);
            data.extend(indices.iter().map(|&j| row[j]));
        }
        Matrix::new(data, self.rows, indices.len())
    }

    /// Concatenate matrices side by side (axis 1).
    pub fn hstack(parts: &[&Matrix]) -> ClaimResult<Matrix> {
        let Some(first) = parts.first() else {
            return Ok(Matrix::zeros(0, 0));
        };
        let rows = first.rows;
        if let Some(bad) = parts.iter().find(|m| m.rows != rows) {
            return Err(ClaimError::ShapeMismatch {
                expected: vec![rows],
                got: vec![bad.rows],
            });
        }
        let cols: usize = parts.iter().map(|m| m.cols).sum();
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for m in parts {
                data.extend_from_slice(m.row(i));
            }
        }
        Matrix::new(data, rows, cols)
    }

    /// Mean of every element; `None` when empty.
    pub fn mean_all(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f64>() / self.data.len() as f64)
    }

    /// Population variance of every element; `None` when empty.
    pub fn var_all(&self) -> Option<f64> {
        let mean = self.mean_all()?;
        let ss: f64 = self.data.iter().map(|v| (v - mean) * (v - mean)).sum();
        Some(ss / self.data.len() as f64)
    }

    /// Apply `f` to every element in place.
    pub fn apply_mut<F: Fn(f64) -> f64>(&mut self, f: F) {
        for v in self.data.iter_mut() {
            *v = f(*v);
        }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix({}x{})", self.rows, self.cols)?;
        for i in 0..self.rows.min(10) {
            let cells: Vec<String> = self.row(i).iter().map(|v| format!("{:.4}", v)).collect();
            writeln!(f, "  [{}]", cells.join(", "))?;
        }
        if self.rows > 10 {
            writeln!(f, "  ... ({} more rows)", self.rows - 10)?;
        }
        Ok(())
    }
}
