//! Minimal dense linear algebra for IRLS.
//!
//! The designs in this study are tiny (tens of rows, at most a couple of
//! dozen coefficients), so a flat row-major matrix and a textbook Cholesky
//! factorization cover everything the fitter needs.

use crate::error::ModelError;

/// A dense row-major f64 matrix.
#[derive(Debug, Clone)]
pub struct Matrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![0.0; nrows * ncols],
        }
    }

    /// Build from row slices; all rows must have equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(nrows * ncols);
        for row in rows {
            assert_eq!(row.len(), ncols, "ragged rows");
            data.extend_from_slice(row);
        }
        Self { nrows, ncols, data }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.ncols + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.ncols + j] = value;
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    /// self * v
    pub fn mat_vec(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.ncols);
        (0..self.nrows)
            .map(|i| dot(self.row(i), v))
            .collect()
    }

    /// X' * diag(w) * X, symmetric p x p.
    pub fn xtwx(&self, w: &[f64]) -> Matrix {
        assert_eq!(w.len(), self.nrows);
        let p = self.ncols;
        let mut out = Matrix::zeros(p, p);
        for j in 0..p {
            for k in j..p {
                let s: f64 = (0..self.nrows)
                    .map(|i| self.get(i, j) * w[i] * self.get(i, k))
                    .sum();
                out.set(j, k, s);
                out.set(k, j, s);
            }
        }
        out
    }

    /// X' * v, length p.
    pub fn xtv(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.nrows);
        let p = self.ncols;
        (0..p)
            .map(|j| (0..self.nrows).map(|i| self.get(i, j) * v[i]).sum())
            .collect()
    }

    /// x' * self * x for a square matrix; used for variances of linear
    /// combinations of coefficients.
    pub fn quad_form(&self, x: &[f64]) -> f64 {
        assert_eq!(self.nrows, self.ncols);
        assert_eq!(x.len(), self.ncols);
        let mut total = 0.0;
        for i in 0..self.nrows {
            total += x[i] * dot(self.row(i), x);
        }
        total
    }

    pub fn diag(&self) -> Vec<f64> {
        (0..self.nrows.min(self.ncols)).map(|i| self.get(i, i)).collect()
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cholesky factorization A = L L' of a symmetric positive definite matrix.
pub struct Cholesky {
    l: Matrix,
}

impl Cholesky {
    pub fn factor(a: &Matrix) -> Result<Self, ModelError> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                got: a.ncols(),
            });
        }
        let mut l = Matrix::zeros(n, n);
        for j in 0..n {
            let mut diag = a.get(j, j);
            for k in 0..j {
                diag -= l.get(j, k) * l.get(j, k);
            }
            if diag <= 0.0 {
                return Err(ModelError::Singular(format!(
                    "non-positive pivot at column {j}"
                )));
            }
            let ljj = diag.sqrt();
            l.set(j, j, ljj);
            for i in (j + 1)..n {
                let mut s = a.get(i, j);
                for k in 0..j {
                    s -= l.get(i, k) * l.get(j, k);
                }
                l.set(i, j, s / ljj);
            }
        }
        Ok(Self { l })
    }

    /// Solve A x = b by forward then backward substitution.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.l.nrows();
        assert_eq!(b.len(), n);

        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut s = b[i];
            for j in 0..i {
                s -= self.l.get(i, j) * y[j];
            }
            y[i] = s / self.l.get(i, i);
        }

        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut s = y[i];
            for j in (i + 1)..n {
                s -= self.l.get(j, i) * x[j];
            }
            x[i] = s / self.l.get(i, i);
        }
        x
    }

    /// A^{-1}, column by column.
    pub fn inverse(&self) -> Matrix {
        let n = self.l.nrows();
        let mut inv = Matrix::zeros(n, n);
        for j in 0..n {
            let mut e = vec![0.0; n];
            e[j] = 1.0;
            let col = self.solve(&e);
            for i in 0..n {
                inv.set(i, j, col[i]);
            }
        }
        inv
    }
}
