//! Linear arithmetic normal form.
//!
//! A [`LinearExpr`] is a map from non-arithmetic atoms (constants, pattern
//! variables, applications, selects, `mod` terms) to rational coefficients,
//! plus a constant. A [`LinearConstraint`] is `expr REL 0` with `REL` one of
//! `<=`, `<`, `=`.

use std::collections::BTreeMap;
use std::fmt;

use num::{BigInt, BigRational, Integer, One, Signed, Zero};

use crate::solver::Model;
use crate::sorts::SmtSort;
use crate::terms::{mk_not, SmtTerm};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LinearExpr {
    pub coeffs: BTreeMap<SmtTerm, BigRational>,
    pub constant: BigRational,
}

impl LinearExpr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(c: BigRational) -> Self {
        Self {
            coeffs: BTreeMap::new(),
            constant: c,
        }
    }

    pub fn atom(t: SmtTerm) -> Self {
        let mut coeffs = BTreeMap::new();
        coeffs.insert(t, BigRational::one());
        Self {
            coeffs,
            constant: BigRational::zero(),
        }
    }

    /// Linearize an arithmetic term. Returns `None` for non-arithmetic terms
    /// and for products of two non-constant factors.
    pub fn from_term(term: &SmtTerm) -> Option<Self> {
        match term {
            SmtTerm::IntLit(_) | SmtTerm::RealLit(_) => term.as_numeral().map(Self::constant),
            SmtTerm::Const(_, sort) | SmtTerm::Var(_, sort) | SmtTerm::App(_, _, sort) => {
                sort.is_arith().then(|| Self::atom(term.clone()))
            }
            SmtTerm::Select(..) | SmtTerm::Mod(..) | SmtTerm::Ite(..) => {
                term.sort().is_arith().then(|| Self::atom(term.clone()))
            }
            SmtTerm::Add(args) => {
                let mut acc = Self::zero();
                for a in args {
                    acc = acc.add(&Self::from_term(a)?);
                }
                Some(acc)
            }
            SmtTerm::Sub(a, b) => Some(Self::from_term(a)?.sub(&Self::from_term(b)?)),
            SmtTerm::Neg(a) => Some(Self::from_term(a)?.scale(&-BigRational::one())),
            SmtTerm::ToReal(a) => Self::from_term(a),
            SmtTerm::Mul(a, b) => {
                let (la, lb) = (Self::from_term(a)?, Self::from_term(b)?);
                if la.is_constant() {
                    Some(lb.scale(&la.constant))
                } else if lb.is_constant() {
                    Some(la.scale(&lb.constant))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn coeff(&self, atom: &SmtTerm) -> BigRational {
        self.coeffs.get(atom).cloned().unwrap_or_else(BigRational::zero)
    }

    pub fn atoms(&self) -> impl Iterator<Item = &SmtTerm> {
        self.coeffs.keys()
    }

    pub fn add(&self, other: &LinearExpr) -> LinearExpr {
        let mut out = self.clone();
        for (t, c) in &other.coeffs {
            let entry = out.coeffs.entry(t.clone()).or_insert_with(BigRational::zero);
            *entry += c;
            if entry.is_zero() {
                out.coeffs.remove(t);
            }
        }
        out.constant += &other.constant;
        out
    }

    pub fn sub(&self, other: &LinearExpr) -> LinearExpr {
        self.add(&other.scale(&-BigRational::one()))
    }

    pub fn scale(&self, k: &BigRational) -> LinearExpr {
        if k.is_zero() {
            return LinearExpr::zero();
        }
        LinearExpr {
            coeffs: self
                .coeffs
                .iter()
                .map(|(t, c)| (t.clone(), c * k))
                .collect(),
            constant: &self.constant * k,
        }
    }

    /// Replace `atom` by `by`.
    pub fn substitute(&self, atom: &SmtTerm, by: &LinearExpr) -> LinearExpr {
        let c = self.coeff(atom);
        if c.is_zero() {
            return self.clone();
        }
        let mut rest = self.clone();
        rest.coeffs.remove(atom);
        rest.add(&by.scale(&c))
    }

    pub fn eval(&self, model: &Model) -> Option<BigRational> {
        self.eval_with(|t| model.eval_rational(t))
    }

    /// Evaluate with atom values supplied by `value`.
    pub fn eval_with(&self, value: impl Fn(&SmtTerm) -> Option<BigRational>) -> Option<BigRational> {
        let mut acc = self.constant.clone();
        for (t, c) in &self.coeffs {
            acc += value(t)? * c;
        }
        Some(acc)
    }

    /// All atoms have integer sort and all coefficients are integral.
    pub fn is_integral(&self) -> bool {
        self.constant.is_integer()
            && self
                .coeffs
                .iter()
                .all(|(t, c)| c.is_integer() && t.sort() == SmtSort::Int)
    }

    /// Positive factor that makes every coefficient and the constant
    /// integral and coprime.
    pub fn integral_factor(&self) -> BigRational {
        let mut denom_lcm = BigInt::one();
        for c in self.coeffs.values().chain(std::iter::once(&self.constant)) {
            denom_lcm = denom_lcm.lcm(c.denom());
        }
        let mut num_gcd = BigInt::zero();
        for c in self.coeffs.values().chain(std::iter::once(&self.constant)) {
            let n = (c * BigRational::from_integer(denom_lcm.clone())).to_integer();
            num_gcd = num_gcd.gcd(&n);
        }
        if num_gcd.is_zero() {
            num_gcd = BigInt::one();
        }
        BigRational::new(denom_lcm, num_gcd)
    }

    fn is_real(&self) -> bool {
        self.coeffs.keys().any(|t| t.sort() == SmtSort::Real)
    }

    /// Sum of monomials without the constant, with integer coefficients when
    /// the caller pre-scaled.
    fn monomials_term(&self) -> SmtTerm {
        let real = self.is_real();
        let mut parts = Vec::with_capacity(self.coeffs.len());
        for (t, c) in &self.coeffs {
            let atom = if real && t.sort() == SmtSort::Int {
                t.clone().to_real()
            } else {
                t.clone()
            };
            parts.push(if c.is_one() {
                atom
            } else {
                let sort = if real { SmtSort::Real } else { t.sort() };
                SmtTerm::numeral(c.clone(), &sort).mul(atom)
            });
        }
        SmtTerm::sum(parts)
    }

    /// Term denoting this expression.
    pub fn to_term(&self) -> SmtTerm {
        let sort = if self.is_real() { SmtSort::Real } else { SmtSort::Int };
        if self.coeffs.is_empty() {
            return SmtTerm::numeral(self.constant.clone(), &sort);
        }
        let body = self.monomials_term();
        if self.constant.is_zero() {
            body
        } else {
            match body {
                SmtTerm::Add(mut parts) => {
                    parts.push(SmtTerm::numeral(self.constant.clone(), &sort));
                    SmtTerm::Add(parts)
                }
                single => single.add(SmtTerm::numeral(self.constant.clone(), &sort)),
            }
        }
    }
}

impl fmt::Display for LinearExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_term())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rel {
    Le,
    Lt,
    Eq,
}

/// `expr REL 0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinearConstraint {
    pub expr: LinearExpr,
    pub rel: Rel,
}

impl LinearConstraint {
    pub fn new(expr: LinearExpr, rel: Rel) -> Self {
        Self { expr, rel }
    }

    /// Read an arithmetic literal. Disequalities and non-arithmetic
    /// literals yield `None`.
    pub fn from_literal(lit: &SmtTerm) -> Option<Self> {
        let diff = |a: &SmtTerm, b: &SmtTerm| -> Option<LinearExpr> {
            if !a.sort().is_arith() {
                return None;
            }
            Some(LinearExpr::from_term(a)?.sub(&LinearExpr::from_term(b)?))
        };
        let c = match lit {
            SmtTerm::Le(a, b) => Self::new(diff(a, b)?, Rel::Le),
            SmtTerm::Lt(a, b) => Self::new(diff(a, b)?, Rel::Lt),
            SmtTerm::Ge(a, b) => Self::new(diff(b, a)?, Rel::Le),
            SmtTerm::Gt(a, b) => Self::new(diff(b, a)?, Rel::Lt),
            SmtTerm::Eq(a, b) => Self::new(diff(a, b)?, Rel::Eq),
            SmtTerm::Not(inner) => match inner.as_ref() {
                SmtTerm::Le(a, b) => Self::new(diff(b, a)?, Rel::Lt),
                SmtTerm::Lt(a, b) => Self::new(diff(b, a)?, Rel::Le),
                SmtTerm::Ge(a, b) => Self::new(diff(a, b)?, Rel::Lt),
                SmtTerm::Gt(a, b) => Self::new(diff(a, b)?, Rel::Le),
                _ => return None,
            },
            _ => return None,
        };
        Some(c)
    }

    /// Over the integers `e < 0` is `e + 1 <= 0`.
    pub fn tighten_integral(self) -> Self {
        if self.rel == Rel::Lt && self.expr.is_integral() {
            let expr = self
                .expr
                .add(&LinearExpr::constant(BigRational::one()));
            Self::new(expr, Rel::Le)
        } else {
            self
        }
    }

    /// Trivially true or false when the expression is constant.
    pub fn constant_truth(&self) -> Option<bool> {
        if !self.expr.is_constant() {
            return None;
        }
        let c = &self.expr.constant;
        Some(match self.rel {
            Rel::Le => !c.is_positive(),
            Rel::Lt => c.is_negative(),
            Rel::Eq => c.is_zero(),
        })
    }

    pub fn holds(&self, model: &Model) -> Option<bool> {
        let v = self.expr.eval(model)?;
        Some(match self.rel {
            Rel::Le => !v.is_positive(),
            Rel::Lt => v.is_negative(),
            Rel::Eq => v.is_zero(),
        })
    }

    /// Literal with integer coefficients, `sum REL -constant`.
    pub fn to_term(&self) -> SmtTerm {
        if let Some(b) = self.constant_truth() {
            return SmtTerm::bool(b);
        }
        let scaled = self.expr.scale(&self.expr.integral_factor());
        let sort = if scaled.is_real() { SmtSort::Real } else { SmtSort::Int };
        let lhs = scaled.monomials_term();
        let rhs = SmtTerm::numeral(-scaled.constant.clone(), &sort);
        match self.rel {
            Rel::Le => lhs.le(rhs),
            Rel::Lt => lhs.lt(rhs),
            Rel::Eq => lhs.eq(rhs),
        }
    }

    /// Negation as a literal (for `Eq` this is a disequality term).
    pub fn negated_term(&self) -> SmtTerm {
        match self.rel {
            Rel::Le => LinearConstraint::new(self.expr.scale(&-BigRational::one()), Rel::Lt).to_term(),
            Rel::Lt => LinearConstraint::new(self.expr.scale(&-BigRational::one()), Rel::Le).to_term(),
            Rel::Eq => mk_not(self.to_term()),
        }
    }
}

impl fmt::Display for LinearConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_term())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::ModelValue;

    fn x() -> SmtTerm {
        SmtTerm::int_const("x")
    }
    fn y() -> SmtTerm {
        SmtTerm::int_const("y")
    }
    fn q(n: i64, d: i64) -> BigRational {
        BigRational::new(n.into(), d.into())
    }

    #[test]
    fn linearizes_nested_sums() {
        // 2*(x - y) + 3 - x  ==  x - 2y + 3
        let t = SmtTerm::int(2)
            .mul(x().sub(y()))
            .add(SmtTerm::int(3))
            .sub(x());
        let e = LinearExpr::from_term(&t).expect("linear");
        assert_eq!(e.coeff(&x()), q(1, 1));
        assert_eq!(e.coeff(&y()), q(-2, 1));
        assert_eq!(e.constant, q(3, 1));
    }

    #[test]
    fn nonlinear_products_are_rejected() {
        assert!(LinearExpr::from_term(&x().mul(y())).is_none());
    }

    #[test]
    fn literal_orientation() {
        let c = LinearConstraint::from_literal(&x().ge(SmtTerm::int(4))).expect("linear");
        // 4 - x <= 0
        assert_eq!(c.rel, Rel::Le);
        assert_eq!(c.expr.coeff(&x()), q(-1, 1));
        let n = LinearConstraint::from_literal(&x().le(SmtTerm::int(4)).not()).expect("linear");
        assert_eq!(n.rel, Rel::Lt);
        assert!(LinearConstraint::from_literal(&x().eq(SmtTerm::int(1)).not()).is_none());
    }

    #[test]
    fn to_term_scales_to_integers() {
        let e = LinearExpr::atom(x())
            .scale(&q(1, 2))
            .add(&LinearExpr::constant(q(-3, 2)));
        let c = LinearConstraint::new(e, Rel::Le);
        assert_eq!(c.to_term(), x().le(SmtTerm::int(3)));
    }

    #[test]
    fn strict_integer_bounds_tighten() {
        let c = LinearConstraint::from_literal(&x().lt(SmtTerm::int(3)))
            .expect("linear")
            .tighten_integral();
        assert_eq!(c.to_term(), x().le(SmtTerm::int(2)));
    }

    #[test]
    fn holds_in_model() {
        let m = Model::new()
            .with("x", ModelValue::Int(3.into()))
            .with("y", ModelValue::Int(4.into()));
        let c = LinearConstraint::from_literal(&x().sub(y()).le(SmtTerm::int(-1))).expect("linear");
        assert_eq!(c.holds(&m), Some(true));
    }
}
