//! Dense row-major matrix used for gain tables and decode matrices.

use crate::parameter::{Parameter, ParameterConfig, ParameterType};

/// Dense row-major `f32` matrix.
///
/// Used as the gain-matrix parameter type (rows = outputs, columns = inputs
/// for mixing matrices) and as the numeric container for panning and
/// decoding tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    rows: usize,
    columns: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Creates a zero-filled matrix.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            data: vec![0.0; rows * columns],
        }
    }

    /// Creates a matrix from row slices.
    ///
    /// Returns `None` if the rows have different lengths.
    pub fn from_rows(rows: &[&[f32]]) -> Option<Self> {
        let columns = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != columns) {
            return None;
        }
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Some(Self {
            rows: rows.len(),
            columns,
            data,
        })
    }

    /// Creates a matrix from a row-major data vector.
    ///
    /// Returns `None` if `data.len() != rows * columns`.
    pub fn from_vec(rows: usize, columns: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == rows * columns).then_some(Self {
            rows,
            columns,
            data,
        })
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Element at `(row, column)`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[inline]
    pub fn get(&self, row: usize, column: usize) -> f32 {
        assert!(column < self.columns, "column {column} out of range");
        self.data[row * self.columns + column]
    }

    /// Sets the element at `(row, column)`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[inline]
    pub fn set(&mut self, row: usize, column: usize, value: f32) {
        assert!(column < self.columns, "column {column} out of range");
        self.data[row * self.columns + column] = value;
    }

    /// Row as a slice.
    #[inline]
    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.columns..(row + 1) * self.columns]
    }

    /// Row as a mutable slice.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        &mut self.data[row * self.columns..(row + 1) * self.columns]
    }

    /// Copies column `column` into `out`.
    pub fn column_into(&self, column: usize, out: &mut [f32]) {
        for (row, value) in out.iter_mut().enumerate().take(self.rows) {
            *value = self.get(row, column);
        }
    }

    /// Writes `values` into column `column`.
    pub fn set_column(&mut self, column: usize, values: &[f32]) {
        for (row, &value) in values.iter().enumerate().take(self.rows) {
            self.set(row, column, value);
        }
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Row-major element storage.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable row-major element storage.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Copies all elements from a matrix of identical shape.
    ///
    /// Returns `false` (and leaves `self` untouched) if the shapes differ.
    pub fn copy_from(&mut self, other: &Matrix) -> bool {
        if self.rows != other.rows || self.columns != other.columns {
            return false;
        }
        self.data.copy_from_slice(&other.data);
        true
    }

    /// Returns the transposed matrix.
    pub fn transposed(&self) -> Matrix {
        let mut out = Matrix::new(self.columns, self.rows);
        for r in 0..self.rows {
            for c in 0..self.columns {
                out.set(c, r, self.get(r, c));
            }
        }
        out
    }

    /// Matrix product `self * rhs`.
    ///
    /// Returns `None` if the inner dimensions differ.
    pub fn multiply(&self, rhs: &Matrix) -> Option<Matrix> {
        if self.columns != rhs.rows {
            return None;
        }
        let mut out = Matrix::new(self.rows, rhs.columns);
        for r in 0..self.rows {
            for k in 0..self.columns {
                let a = self.get(r, k);
                if a == 0.0 {
                    continue;
                }
                for (dst, &b) in out.row_mut(r).iter_mut().zip(rhs.row(k)) {
                    *dst += a * b;
                }
            }
        }
        Some(out)
    }
}

impl Parameter for Matrix {
    const TYPE: ParameterType = ParameterType::new("Matrix");
}

pub(crate) fn create_matrix(config: &ParameterConfig) -> Matrix {
    match *config {
        ParameterConfig::Matrix { rows, columns } => Matrix::new(rows, columns),
        _ => Matrix::default(),
    }
}
