//! Stage inputs and outputs
//!
//! A `Frame` is a small named-column table that feeds the first stage of a
//! pipeline. Every later stage works on a dense row-major `Matrix`.

use super::StageError;

/// Typed value of one feature
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl FeatureValue {
    /// Numeric view; text is parsed when it holds a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Text view used for categorical matching
    pub fn to_text(&self) -> String {
        match self {
            FeatureValue::Number(v) => format_number(*v),
            FeatureValue::Text(s) => s.clone(),
        }
    }
}

/// Integral floats print without a fractional part (`1`, not `1.0`)
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Named columns of feature values
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<FeatureValue>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<FeatureValue>>) -> Result<Self, StageError> {
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(StageError::DimensionMismatch {
                expected: columns.len(),
                actual: bad.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FeatureValue>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All columns as numbers, in column order
    pub fn to_matrix(&self) -> Result<Matrix, StageError> {
        let mut data = Vec::with_capacity(self.rows.len() * self.columns.len());
        for row in &self.rows {
            for (col, value) in row.iter().enumerate() {
                let v = value.as_f64().ok_or_else(|| StageError::NonNumeric {
                    column: self.columns[col].clone(),
                })?;
                data.push(v);
            }
        }
        Matrix::from_vec(self.rows.len(), self.columns.len(), data)
    }
}

/// Dense row-major matrix of f64
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn from_vec(n_rows: usize, n_cols: usize, data: Vec<f64>) -> Result<Self, StageError> {
        if data.len() != n_rows * n_cols {
            return Err(StageError::DimensionMismatch {
                expected: n_rows * n_cols,
                actual: data.len(),
            });
        }
        Ok(Self {
            n_rows,
            n_cols,
            data,
        })
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, StageError> {
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(StageError::DimensionMismatch {
                    expected: n_cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            n_rows: rows.len(),
            n_cols,
            data,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.n_cols;
        &self.data[start..start + self.n_cols]
    }

    pub fn row_iter(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.n_rows).map(move |i| self.row(i))
    }
}
