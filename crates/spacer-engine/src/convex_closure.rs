//! Convex closure of a finite set of rational points.
//!
//! Each dimension is named by a term; the closure is a conjunction of linear
//! constraints over those terms. Points are first reduced to their affine
//! hull: the free columns of the difference matrix become equalities and
//! only the pivot columns stay as independent dimensions. In the reduced
//! space a single dimension gives a pair of bounds and a simplex gives its
//! facets, both exact. Any other set is encoded with one multiplier per
//! point, `x = Σ λᵢ pᵢ, λᵢ ≥ 0, Σ λᵢ = 1`; that closure is not exact and the
//! multipliers are reported through [`ConvexClosure::new_vars`] so that the
//! caller can project them away.

use num::{BigInt, BigRational, Integer, One, Zero};
use spacer_smt::linear::{LinearConstraint, LinearExpr, Rel};
use spacer_smt::sorts::SmtSort;
use spacer_smt::terms::{mk_and, SmtTerm};

use crate::error::ClosureError;
use crate::matrix::Matrix;

#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub constraints: Vec<SmtTerm>,
    /// True when no new variables were introduced.
    pub exact: bool,
}

impl Closure {
    pub fn formula(&self) -> SmtTerm {
        mk_and(self.constraints.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConvexClosure {
    dims: Vec<Option<SmtTerm>>,
    points: Vec<Vec<BigRational>>,
    new_vars: Vec<SmtTerm>,
    lattice_stride: bool,
}

impl ConvexClosure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lattice_stride(mut self, on: bool) -> Self {
        self.lattice_stride = on;
        self
    }

    /// Forget all points and start over with `n` unnamed dimensions.
    pub fn reset(&mut self, n: usize) {
        self.dims = vec![None; n];
        self.points.clear();
        self.new_vars.clear();
    }

    pub fn dimension(&self) -> usize {
        self.dims.len()
    }

    pub fn set_dimension(&mut self, index: usize, name: SmtTerm) -> Result<(), ClosureError> {
        let dims = self.dims.len();
        let slot = self
            .dims
            .get_mut(index)
            .ok_or(ClosureError::DimensionOutOfRange { index, dims })?;
        *slot = Some(name);
        Ok(())
    }

    pub fn push_back(&mut self, point: Vec<BigRational>) -> Result<(), ClosureError> {
        if point.len() != self.dims.len() {
            return Err(ClosureError::PointArity {
                expected: self.dims.len(),
                got: point.len(),
            });
        }
        if !self.points.contains(&point) {
            self.points.push(point);
        }
        Ok(())
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Variables introduced by the last inexact closure.
    pub fn new_vars(&self) -> &[SmtTerm] {
        &self.new_vars
    }

    pub fn closure(&mut self) -> Result<Closure, ClosureError> {
        self.new_vars.clear();
        if self.dims.is_empty() {
            return Err(ClosureError::ZeroDimension);
        }
        let mut names = Vec::with_capacity(self.dims.len());
        for (i, d) in self.dims.iter().enumerate() {
            names.push(d.clone().ok_or(ClosureError::UnnamedDimension(i))?);
        }
        let Some(origin) = self.points.first().cloned() else {
            return Err(ClosureError::NoPoints);
        };

        let n = names.len();
        let mut diffs = Matrix::new(n);
        for p in &self.points[1..] {
            diffs.push_row(p.iter().zip(&origin).map(|(a, b)| a - b).collect());
        }

        let mut constraints = Vec::new();
        for w in diffs.null_space() {
            let rhs: BigRational = w.iter().zip(&origin).map(|(a, b)| a * b).sum();
            let expr = weighted(&names, &w).sub(&LinearExpr::constant(rhs));
            constraints.push(LinearConstraint::new(expr, Rel::Eq).to_term());
        }

        let (_, pivots) = diffs.rref();
        let reduced: Vec<Vec<BigRational>> = self
            .points
            .iter()
            .map(|p| pivots.iter().map(|&c| p[c].clone()).collect())
            .collect();
        let pivot_names: Vec<SmtTerm> = pivots.iter().map(|&c| names[c].clone()).collect();
        tracing::trace!(dims = n, reduced = pivots.len(), points = self.points.len(), "convex closure");

        let exact = match pivots.len() {
            0 => true,
            1 => {
                self.bounds(&pivot_names[0], &reduced, &mut constraints);
                true
            }
            r if reduced.len() == r + 1 => {
                facets(&pivot_names, &reduced, &mut constraints);
                true
            }
            _ => {
                self.multipliers(&names, &pivot_names, &reduced, &mut constraints);
                false
            }
        };
        Ok(Closure { constraints, exact })
    }

    fn bounds(&self, name: &SmtTerm, reduced: &[Vec<BigRational>], out: &mut Vec<SmtTerm>) {
        let values: Vec<&BigRational> = reduced.iter().map(|p| &p[0]).collect();
        let (Some(lo), Some(hi)) = (values.iter().min(), values.iter().max()) else {
            return;
        };
        let (lo, hi) = ((*lo).clone(), (*hi).clone());
        let x = LinearExpr::atom(name.clone());
        out.push(LinearConstraint::new(LinearExpr::constant(lo.clone()).sub(&x), Rel::Le).to_term());
        out.push(LinearConstraint::new(x.sub(&LinearExpr::constant(hi)), Rel::Le).to_term());

        if self.lattice_stride && values.iter().all(|v| v.is_integer()) {
            let stride = values
                .iter()
                .fold(BigInt::zero(), |g, v| g.gcd(&(*v - &lo).to_integer()));
            if stride > BigInt::one() {
                let offset = x.sub(&LinearExpr::constant(lo)).to_term();
                out.push(offset.modulo(SmtTerm::int_big(stride)).eq(SmtTerm::int(0)));
            }
        }
    }

    fn multipliers(
        &mut self,
        names: &[SmtTerm],
        pivot_names: &[SmtTerm],
        reduced: &[Vec<BigRational>],
        out: &mut Vec<SmtTerm>,
    ) {
        let base = names
            .iter()
            .flat_map(|t| t.var_ids())
            .max()
            .map_or(0, |id| id + 1);
        let lambdas: Vec<SmtTerm> = (0..reduced.len() as u32)
            .map(|i| SmtTerm::var(base + i, SmtSort::Real))
            .collect();

        for (c, name) in pivot_names.iter().enumerate() {
            let mut expr = LinearExpr::atom(name.clone());
            for (lambda, p) in lambdas.iter().zip(reduced) {
                expr = expr.sub(&LinearExpr::atom(lambda.clone()).scale(&p[c]));
            }
            out.push(LinearConstraint::new(expr, Rel::Eq).to_term());
        }
        let mut total = LinearExpr::constant(-BigRational::one());
        for lambda in &lambdas {
            let l = LinearExpr::atom(lambda.clone());
            out.push(LinearConstraint::new(l.scale(&-BigRational::one()), Rel::Le).to_term());
            total = total.add(&l);
        }
        out.push(LinearConstraint::new(total, Rel::Eq).to_term());
        self.new_vars = lambdas;
    }
}

/// `Σ wᵢ · namesᵢ`.
fn weighted(names: &[SmtTerm], w: &[BigRational]) -> LinearExpr {
    names
        .iter()
        .zip(w)
        .filter(|(_, c)| !c.is_zero())
        .fold(LinearExpr::zero(), |acc, (t, c)| {
            acc.add(&LinearExpr::atom(t.clone()).scale(c))
        })
}

/// Facet inequalities of the simplex spanned by `reduced` (r + 1 affinely
/// independent points in r dimensions, r >= 2).
fn facets(names: &[SmtTerm], reduced: &[Vec<BigRational>], out: &mut Vec<SmtTerm>) {
    for (i, opposite) in reduced.iter().enumerate() {
        let others: Vec<&Vec<BigRational>> = reduced
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != i)
            .map(|(_, p)| p)
            .collect();
        let base = others[0];
        let rows = others[1..]
            .iter()
            .map(|p| p.iter().zip(base).map(|(a, b)| a - b).collect())
            .collect();
        let Some(m) = Matrix::from_rows(names.len(), rows) else {
            continue;
        };
        let Some(mut normal) = m.null_space().into_iter().next() else {
            continue;
        };
        let dot = |p: &[BigRational], w: &[BigRational]| -> BigRational {
            p.iter().zip(w).map(|(a, b)| a * b).sum()
        };
        let mut b = dot(base, &normal);
        if dot(opposite, &normal) < b {
            normal.iter_mut().for_each(|v| *v = -v.clone());
            b = -b;
        }
        // normal · x >= b
        let expr = LinearExpr::constant(b).sub(&weighted(names, &normal));
        out.push(LinearConstraint::new(expr, Rel::Le).to_term());
    }
}
