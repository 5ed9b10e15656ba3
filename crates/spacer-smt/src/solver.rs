use std::collections::HashMap;

use num::{BigInt, BigRational, Integer, Signed, Zero};

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// A model (constant assignments) extracted from a SAT result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValue {
    Int(BigInt),
    Real(BigRational),
    Bool(bool),
}

impl ModelValue {
    pub fn as_rational(&self) -> Option<BigRational> {
        match self {
            ModelValue::Int(n) => Some(BigRational::from_integer(n.clone())),
            ModelValue::Real(q) => Some(q.clone()),
            ModelValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ModelValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeral or Boolean literal denoting this value.
    pub fn to_term(&self) -> SmtTerm {
        match self {
            ModelValue::Int(n) => SmtTerm::int_big(n.clone()),
            ModelValue::Real(q) => SmtTerm::real(q.clone()),
            ModelValue::Bool(b) => SmtTerm::bool(*b),
        }
    }
}

/// Outcome of evaluating a term in a model.
///
/// Evaluation does not complete the model: a constant without an assignment,
/// an uninterpreted function, or an array operation leaves the term
/// unevaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Evaluated(ModelValue),
    Unevaluable(String),
}

impl Evaluation {
    pub fn value(self) -> Option<ModelValue> {
        match self {
            Evaluation::Evaluated(v) => Some(v),
            Evaluation::Unevaluable(_) => None,
        }
    }
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ModelValue) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: ModelValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get_int(&self, name: &str) -> Option<BigInt> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(n.clone()),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_rational(&self, name: &str) -> Option<BigRational> {
        self.values.get(name).and_then(ModelValue::as_rational)
    }

    /// Evaluate `term` under this model.
    pub fn eval(&self, term: &SmtTerm) -> Evaluation {
        match self.eval_value(term) {
            Ok(v) => Evaluation::Evaluated(v),
            Err(reason) => Evaluation::Unevaluable(reason),
        }
    }

    /// True when `term` evaluates to `true`.
    pub fn is_true(&self, term: &SmtTerm) -> bool {
        matches!(self.eval(term), Evaluation::Evaluated(ModelValue::Bool(true)))
    }

    /// True when `term` evaluates to `false`.
    pub fn is_false(&self, term: &SmtTerm) -> bool {
        matches!(self.eval(term), Evaluation::Evaluated(ModelValue::Bool(false)))
    }

    /// Numeric value of an arithmetic term.
    pub fn eval_rational(&self, term: &SmtTerm) -> Option<BigRational> {
        self.eval(term).value().and_then(|v| v.as_rational())
    }

    fn eval_value(&self, term: &SmtTerm) -> Result<ModelValue, String> {
        match term {
            SmtTerm::Const(name, _) => self
                .values
                .get(name)
                .cloned()
                .ok_or_else(|| format!("no value for `{name}`")),
            SmtTerm::Var(id, _) => Err(format!("free variable ?{id}")),
            SmtTerm::IntLit(n) => Ok(ModelValue::Int(n.clone())),
            SmtTerm::RealLit(q) => Ok(ModelValue::Real(q.clone())),
            SmtTerm::BoolLit(b) => Ok(ModelValue::Bool(*b)),
            SmtTerm::App(name, ..) => Err(format!("uninterpreted function `{name}`")),
            SmtTerm::Add(args) => {
                let mut acc = BigRational::zero();
                for a in args {
                    acc += self.eval_num(a)?;
                }
                Ok(numeric(acc, &term.sort()))
            }
            SmtTerm::Sub(a, b) => Ok(numeric(self.eval_num(a)? - self.eval_num(b)?, &term.sort())),
            SmtTerm::Mul(a, b) => Ok(numeric(self.eval_num(a)? * self.eval_num(b)?, &term.sort())),
            SmtTerm::Neg(a) => Ok(numeric(-self.eval_num(a)?, &term.sort())),
            SmtTerm::Mod(a, b) => {
                let (x, m) = (self.eval_num(a)?, self.eval_num(b)?);
                if !x.is_integer() || !m.is_integer() || m.is_zero() {
                    return Err("mod requires integral operands and non-zero divisor".into());
                }
                // Euclidean remainder: always in [0, |m|).
                let r = x.to_integer().mod_floor(&m.to_integer().abs());
                Ok(ModelValue::Int(r))
            }
            SmtTerm::ToReal(a) => Ok(ModelValue::Real(self.eval_num(a)?)),
            SmtTerm::Eq(a, b) => {
                let (x, y) = (self.eval_value(a)?, self.eval_value(b)?);
                match (x.as_rational(), y.as_rational()) {
                    (Some(p), Some(q)) => Ok(ModelValue::Bool(p == q)),
                    _ => Ok(ModelValue::Bool(x == y)),
                }
            }
            SmtTerm::Lt(a, b) => Ok(ModelValue::Bool(self.eval_num(a)? < self.eval_num(b)?)),
            SmtTerm::Le(a, b) => Ok(ModelValue::Bool(self.eval_num(a)? <= self.eval_num(b)?)),
            SmtTerm::Gt(a, b) => Ok(ModelValue::Bool(self.eval_num(a)? > self.eval_num(b)?)),
            SmtTerm::Ge(a, b) => Ok(ModelValue::Bool(self.eval_num(a)? >= self.eval_num(b)?)),
            SmtTerm::And(args) => {
                let mut pending = None;
                for a in args {
                    match self.eval_bool(a) {
                        Ok(false) => return Ok(ModelValue::Bool(false)),
                        Ok(true) => {}
                        Err(e) => pending = Some(e),
                    }
                }
                pending.map_or(Ok(ModelValue::Bool(true)), Err)
            }
            SmtTerm::Or(args) => {
                let mut pending = None;
                for a in args {
                    match self.eval_bool(a) {
                        Ok(true) => return Ok(ModelValue::Bool(true)),
                        Ok(false) => {}
                        Err(e) => pending = Some(e),
                    }
                }
                pending.map_or(Ok(ModelValue::Bool(false)), Err)
            }
            SmtTerm::Not(a) => Ok(ModelValue::Bool(!self.eval_bool(a)?)),
            SmtTerm::Implies(a, b) => {
                if !self.eval_bool(a)? {
                    return Ok(ModelValue::Bool(true));
                }
                Ok(ModelValue::Bool(self.eval_bool(b)?))
            }
            SmtTerm::Ite(c, t, e) => {
                if self.eval_bool(c)? {
                    self.eval_value(t)
                } else {
                    self.eval_value(e)
                }
            }
            SmtTerm::Select(..) | SmtTerm::Store(..) => Err("array terms are not evaluated".into()),
        }
    }

    fn eval_num(&self, term: &SmtTerm) -> Result<BigRational, String> {
        self.eval_value(term)?
            .as_rational()
            .ok_or_else(|| format!("`{term}` is not numeric"))
    }

    fn eval_bool(&self, term: &SmtTerm) -> Result<bool, String> {
        self.eval_value(term)?
            .as_bool()
            .ok_or_else(|| format!("`{term}` is not Boolean"))
    }
}

fn numeric(q: BigRational, sort: &SmtSort) -> ModelValue {
    if *sort == SmtSort::Int && q.is_integer() {
        ModelValue::Int(q.to_integer())
    } else {
        ModelValue::Real(q)
    }
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new constant.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop a scope.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Check satisfiability and extract a model if SAT.
    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;

    /// Reset the solver state.
    fn reset(&mut self) -> Result<(), Self::Error>;
}
