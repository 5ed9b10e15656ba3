//! Dense rational matrices.

use num::{BigRational, One, Zero};

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    cols: usize,
    rows: Vec<Vec<BigRational>>,
}

impl Matrix {
    pub fn new(cols: usize) -> Self {
        Self {
            cols,
            rows: Vec::new(),
        }
    }

    /// Returns `None` when the rows do not all have `cols` entries.
    pub fn from_rows(cols: usize, rows: Vec<Vec<BigRational>>) -> Option<Self> {
        if rows.iter().any(|r| r.len() != cols) {
            return None;
        }
        Some(Self { cols, rows })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> &BigRational {
        &self.rows[i][j]
    }

    pub fn row(&self, i: usize) -> &[BigRational] {
        &self.rows[i]
    }

    pub fn push_row(&mut self, row: Vec<BigRational>) -> bool {
        if row.len() != self.cols {
            return false;
        }
        self.rows.push(row);
        true
    }

    /// Reduced row echelon form and the pivot column of each non-zero row.
    pub fn rref(&self) -> (Matrix, Vec<usize>) {
        let mut m = self.rows.clone();
        let mut pivots = Vec::new();
        let mut r = 0;
        for c in 0..self.cols {
            if r == m.len() {
                break;
            }
            let Some(p) = (r..m.len()).find(|&i| !m[i][c].is_zero()) else {
                continue;
            };
            m.swap(r, p);
            let inv = m[r][c].recip();
            for v in m[r].iter_mut() {
                *v = &*v * &inv;
            }
            for i in 0..m.len() {
                if i == r || m[i][c].is_zero() {
                    continue;
                }
                let factor = m[i][c].clone();
                for j in 0..self.cols {
                    let delta = &factor * &m[r][j];
                    m[i][j] -= delta;
                }
            }
            pivots.push(c);
            r += 1;
        }
        m.retain(|row| row.iter().any(|v| !v.is_zero()));
        (Matrix { cols: self.cols, rows: m }, pivots)
    }

    pub fn rank(&self) -> usize {
        self.rref().1.len()
    }

    /// Basis of `{ w | M w = 0 }`, one vector per free column.
    pub fn null_space(&self) -> Vec<Vec<BigRational>> {
        let (reduced, pivots) = self.rref();
        let mut basis = Vec::new();
        for free in (0..self.cols).filter(|c| !pivots.contains(c)) {
            let mut w = vec![BigRational::zero(); self.cols];
            w[free] = BigRational::one();
            for (row, &p) in pivots.iter().enumerate() {
                w[p] = -reduced.get(row, free).clone();
            }
            basis.push(w);
        }
        basis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64) -> BigRational {
        BigRational::from_integer(n.into())
    }

    fn dot(a: &[BigRational], b: &[BigRational]) -> BigRational {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn rref_finds_pivots() {
        let m = Matrix::from_rows(3, vec![vec![q(2), q(4), q(2)], vec![q(1), q(2), q(3)]]).expect("rect");
        let (r, pivots) = m.rref();
        assert_eq!(pivots, vec![0, 2]);
        assert_eq!(r.num_rows(), 2);
        assert_eq!(r.get(0, 1), &q(2));
    }

    #[test]
    fn null_space_is_orthogonal_to_rows() {
        let m = Matrix::from_rows(3, vec![vec![q(1), q(1), q(0)], vec![q(2), q(2), q(0)]]).expect("rect");
        let ns = m.null_space();
        assert_eq!(ns.len(), 2);
        for w in &ns {
            for i in 0..m.num_rows() {
                assert_eq!(dot(m.row(i), w), q(0));
            }
        }
    }

    #[test]
    fn empty_matrix_has_full_null_space() {
        let m = Matrix::new(2);
        assert_eq!(m.rank(), 0);
        assert_eq!(m.null_space().len(), 2);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(Matrix::from_rows(2, vec![vec![q(1)]]).is_none());
    }
}
