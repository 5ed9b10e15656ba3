use std::collections::HashMap;

use num::{BigInt, BigRational, ToPrimitive};
use thiserror::Error;
use z3::ast::{Array, Ast, Bool, Dynamic, Int, Real};
use z3::{FuncDecl, SatResult as Z3SatResult, Sort};

use crate::backends::process::parse_numeral;
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown constant: {0}")]
    UnknownConstant(String),
    #[error("Pattern variable ?{0} cannot be sent to the solver")]
    PatternVar(u32),
    #[error("Numeral {0} does not fit in 64 bits")]
    NumeralRange(BigInt),
}

/// In-process Z3 over the full term language: linear and modular integer
/// arithmetic, reals, arrays and uninterpreted functions.
pub struct Z3Solver {
    solver: z3::Solver,
    consts: HashMap<String, Z3Term>,
    _params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            consts: HashMap::new(),
            _params: None,
        }
    }

    pub fn with_timeout_ms(timeout_ms: u32) -> Self {
        if timeout_ms == 0 {
            return Self::new();
        }
        let solver = z3::Solver::new();
        let mut params = z3::Params::new();
        params.set_u32("timeout", timeout_ms);
        solver.set_params(&params);
        Self {
            solver,
            consts: HashMap::new(),
            _params: Some(params),
        }
    }

    fn translate_term(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Const(name, _) => self
                .consts
                .get(name)
                .cloned()
                .ok_or_else(|| Z3Error::UnknownConstant(name.clone())),
            SmtTerm::Var(id, _) => Err(Z3Error::PatternVar(*id)),
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(int_lit(n)?)),
            SmtTerm::RealLit(q) => {
                let n = Real::from_int(&int_lit(q.numer())?);
                let d = Real::from_int(&int_lit(q.denom())?);
                Ok(Z3Term::Real(&n / &d))
            }
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(Bool::from_bool(*b))),
            SmtTerm::App(name, args, sort) => {
                let domain: Vec<Sort> = args.iter().map(|a| z3_sort(&a.sort())).collect();
                let domain_refs: Vec<&Sort> = domain.iter().collect();
                let decl = FuncDecl::new(name.as_str(), &domain_refs, &z3_sort(sort));
                let actuals = args
                    .iter()
                    .map(|a| self.translate_term(a).map(Z3Term::into_dynamic))
                    .collect::<Result<Vec<_>, _>>()?;
                let actual_refs: Vec<&dyn Ast> = actuals.iter().map(|d| d as &dyn Ast).collect();
                Z3Term::from_dynamic(decl.apply(&actual_refs), sort)
            }
            SmtTerm::Add(args) => {
                let mut terms = args.iter().map(|a| self.translate_term(a));
                let Some(first) = terms.next() else {
                    return Ok(Z3Term::Int(Int::from_i64(0)));
                };
                terms.try_fold(first?, |acc, t| {
                    arith_op(acc, t?, |a, b| a + b, |a, b| a + b)
                })
            }
            SmtTerm::Sub(lhs, rhs) => arith_op(
                self.translate_term(lhs)?,
                self.translate_term(rhs)?,
                |a, b| a - b,
                |a, b| a - b,
            ),
            SmtTerm::Mul(lhs, rhs) => arith_op(
                self.translate_term(lhs)?,
                self.translate_term(rhs)?,
                |a, b| a * b,
                |a, b| a * b,
            ),
            SmtTerm::Neg(inner) => arith_op(
                Z3Term::Int(Int::from_i64(0)),
                self.translate_term(inner)?,
                |a, b| a - b,
                |a, b| a - b,
            ),
            SmtTerm::Mod(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_int()?;
                let r = self.translate_term(rhs)?.into_int()?;
                Ok(Z3Term::Int(l.modulo(&r)))
            }
            SmtTerm::ToReal(inner) => match self.translate_term(inner)? {
                Z3Term::Int(i) => Ok(Z3Term::Real(Real::from_int(&i))),
                Z3Term::Real(r) => Ok(Z3Term::Real(r)),
                _ => Err(Z3Error::Internal("Expected arithmetic operand of to_real".into())),
            },
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs)?;
                let r = self.translate_term(rhs)?;
                match (l, r) {
                    (Z3Term::Bool(lb), Z3Term::Bool(rb)) => Ok(Z3Term::Bool(lb.eq(&rb))),
                    (Z3Term::Array(la), Z3Term::Array(ra)) => Ok(Z3Term::Bool(la.eq(&ra))),
                    (l, r) => compare(l, r, |a, b| a.eq(b), |a, b| a.eq(b)),
                }
            }
            SmtTerm::Lt(lhs, rhs) => compare(
                self.translate_term(lhs)?,
                self.translate_term(rhs)?,
                |a, b| a.lt(b),
                |a, b| a.lt(b),
            ),
            SmtTerm::Le(lhs, rhs) => compare(
                self.translate_term(lhs)?,
                self.translate_term(rhs)?,
                |a, b| a.le(b),
                |a, b| a.le(b),
            ),
            SmtTerm::Gt(lhs, rhs) => compare(
                self.translate_term(lhs)?,
                self.translate_term(rhs)?,
                |a, b| a.gt(b),
                |a, b| a.gt(b),
            ),
            SmtTerm::Ge(lhs, rhs) => compare(
                self.translate_term(lhs)?,
                self.translate_term(rhs)?,
                |a, b| a.ge(b),
                |a, b| a.ge(b),
            ),
            SmtTerm::And(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_bool()?;
                let r = self.translate_term(rhs)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_term(cond)?.into_bool()?;
                let t = self.translate_term(then)?;
                let e = self.translate_term(els)?;
                match (t, e) {
                    (Z3Term::Bool(tb), Z3Term::Bool(eb)) => Ok(Z3Term::Bool(c.ite(&tb, &eb))),
                    (Z3Term::Array(ta), Z3Term::Array(ea)) => Ok(Z3Term::Array(c.ite(&ta, &ea))),
                    (t, e) => match promote(t, e)? {
                        (Z3Term::Int(ti), Z3Term::Int(ei)) => Ok(Z3Term::Int(c.ite(&ti, &ei))),
                        (Z3Term::Real(tr), Z3Term::Real(er)) => Ok(Z3Term::Real(c.ite(&tr, &er))),
                        _ => Err(Z3Error::Internal("Sort mismatch in ITE".into())),
                    },
                }
            }
            SmtTerm::Select(array, index) => {
                let a = self.translate_term(array)?.into_array()?;
                let i = self.translate_term(index)?.into_dynamic();
                Z3Term::from_dynamic(a.select(&i), &term.sort())
            }
            SmtTerm::Store(array, index, value) => {
                let a = self.translate_term(array)?.into_array()?;
                let i = self.translate_term(index)?.into_dynamic();
                let v = self.translate_term(value)?.into_dynamic();
                Ok(Z3Term::Array(a.store(&i, &v)))
            }
        }
    }

    fn translate_bools(&self, terms: &[SmtTerm]) -> Result<Vec<Bool>, Z3Error> {
        terms
            .iter()
            .map(|t| self.translate_term(t).and_then(Z3Term::into_bool))
            .collect()
    }

    fn model_value(&self, model: &z3::Model, name: &str) -> Result<Option<ModelValue>, Z3Error> {
        let Some(term) = self.consts.get(name) else {
            return Ok(None);
        };
        let value = match term {
            Z3Term::Bool(b) => model
                .eval::<Bool>(b, true)
                .and_then(|v| v.as_bool())
                .map(ModelValue::Bool),
            Z3Term::Int(i) => match model.eval::<Int>(i, true) {
                Some(v) => Some(ModelValue::Int(numeral(&v.to_string())?.to_integer())),
                None => None,
            },
            Z3Term::Real(r) => match model.eval::<Real>(r, true) {
                Some(v) => Some(ModelValue::Real(numeral(&v.to_string())?)),
                None => None,
            },
            Z3Term::Array(_) => None,
        };
        Ok(value)
    }
}

#[derive(Clone)]
enum Z3Term {
    Int(Int),
    Real(Real),
    Bool(Bool),
    Array(Array),
}

impl Z3Term {
    fn into_int(self) -> Result<Int, Z3Error> {
        match self {
            Z3Term::Int(i) => Ok(i),
            _ => Err(Z3Error::Internal("Expected Int".into())),
        }
    }

    fn into_bool(self) -> Result<Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            _ => Err(Z3Error::Internal("Expected Bool".into())),
        }
    }

    fn into_array(self) -> Result<Array, Z3Error> {
        match self {
            Z3Term::Array(a) => Ok(a),
            _ => Err(Z3Error::Internal("Expected Array".into())),
        }
    }

    fn into_dynamic(self) -> Dynamic {
        match self {
            Z3Term::Int(i) => Dynamic::from_ast(&i),
            Z3Term::Real(r) => Dynamic::from_ast(&r),
            Z3Term::Bool(b) => Dynamic::from_ast(&b),
            Z3Term::Array(a) => Dynamic::from_ast(&a),
        }
    }

    fn from_dynamic(d: Dynamic, sort: &SmtSort) -> Result<Self, Z3Error> {
        let term = match sort {
            SmtSort::Int => d.as_int().map(Z3Term::Int),
            SmtSort::Real => d.as_real().map(Z3Term::Real),
            SmtSort::Bool => d.as_bool().map(Z3Term::Bool),
            SmtSort::Array(..) => d.as_array().map(Z3Term::Array),
        };
        term.ok_or_else(|| Z3Error::Internal(format!("Expected {sort} application")))
    }
}

fn int_lit(n: &BigInt) -> Result<Int, Z3Error> {
    n.to_i64()
        .map(Int::from_i64)
        .ok_or_else(|| Z3Error::NumeralRange(n.clone()))
}

fn numeral(text: &str) -> Result<BigRational, Z3Error> {
    parse_numeral(text).ok_or_else(|| Z3Error::Internal(format!("Unreadable model value {text}")))
}

fn z3_sort(sort: &SmtSort) -> Sort {
    match sort {
        SmtSort::Bool => Sort::bool(),
        SmtSort::Int => Sort::int(),
        SmtSort::Real => Sort::real(),
        SmtSort::Array(index, element) => Sort::array(&z3_sort(index), &z3_sort(element)),
    }
}

/// Bring two arithmetic operands to a common sort; Int is promoted to Real.
fn promote(l: Z3Term, r: Z3Term) -> Result<(Z3Term, Z3Term), Z3Error> {
    match (l, r) {
        (Z3Term::Int(a), Z3Term::Real(b)) => Ok((Z3Term::Real(Real::from_int(&a)), Z3Term::Real(b))),
        (Z3Term::Real(a), Z3Term::Int(b)) => Ok((Z3Term::Real(a), Z3Term::Real(Real::from_int(&b)))),
        (l @ (Z3Term::Int(_) | Z3Term::Real(_)), r @ (Z3Term::Int(_) | Z3Term::Real(_))) => Ok((l, r)),
        _ => Err(Z3Error::Internal("Expected arithmetic operands".into())),
    }
}

fn arith_op(
    l: Z3Term,
    r: Z3Term,
    int_op: impl Fn(&Int, &Int) -> Int,
    real_op: impl Fn(&Real, &Real) -> Real,
) -> Result<Z3Term, Z3Error> {
    match promote(l, r)? {
        (Z3Term::Int(a), Z3Term::Int(b)) => Ok(Z3Term::Int(int_op(&a, &b))),
        (Z3Term::Real(a), Z3Term::Real(b)) => Ok(Z3Term::Real(real_op(&a, &b))),
        _ => Err(Z3Error::Internal("Sort mismatch in arithmetic".into())),
    }
}

fn compare(
    l: Z3Term,
    r: Z3Term,
    int_op: impl Fn(&Int, &Int) -> Bool,
    real_op: impl Fn(&Real, &Real) -> Bool,
) -> Result<Z3Term, Z3Error> {
    match promote(l, r)? {
        (Z3Term::Int(a), Z3Term::Int(b)) => Ok(Z3Term::Bool(int_op(&a, &b))),
        (Z3Term::Real(a), Z3Term::Real(b)) => Ok(Z3Term::Bool(real_op(&a, &b))),
        _ => Err(Z3Error::Internal("Sort mismatch in comparison".into())),
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        let term = match sort {
            SmtSort::Bool => Z3Term::Bool(Bool::new_const(name)),
            SmtSort::Int => Z3Term::Int(Int::new_const(name)),
            SmtSort::Real => Z3Term::Real(Real::new_const(name)),
            SmtSort::Array(index, element) => {
                Z3Term::Array(Array::new_const(name, &z3_sort(index), &z3_sort(element)))
            }
        };
        self.consts.insert(name.to_string(), term);
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => Ok(SatResult::Sat),
            Z3SatResult::Unsat => Ok(SatResult::Unsat),
            Z3SatResult::Unknown => Ok(SatResult::Unknown("Z3 returned unknown".into())),
        }
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => {
                let z3_model = self
                    .solver
                    .get_model()
                    .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
                let names: Vec<String> = if var_names.is_empty() {
                    self.consts.keys().cloned().collect()
                } else {
                    var_names.iter().map(|(n, _)| n.to_string()).collect()
                };
                let mut model = Model::new();
                for name in names {
                    if let Some(value) = self.model_value(&z3_model, &name)? {
                        model.insert(name, value);
                    }
                }
                Ok((SatResult::Sat, Some(model)))
            }
            Z3SatResult::Unsat => Ok((SatResult::Unsat, None)),
            Z3SatResult::Unknown => Ok((SatResult::Unknown("Z3 returned unknown".into()), None)),
        }
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Parameters do not survive a reset.
        if let Some(params) = &self._params {
            self.solver.set_params(params);
        }
        self.consts.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn x() -> SmtTerm {
        SmtTerm::int_const("x")
    }

    fn solver_with(consts: &[(&str, SmtSort)]) -> Result<Z3Solver, Z3Error> {
        let mut solver = Z3Solver::new();
        for (name, sort) in consts {
            solver.declare_var(name, sort)?;
        }
        Ok(solver)
    }

    #[test]
    fn integer_gap_is_unsat() -> TestResult {
        // 2x = 1 has a rational solution but no integral one.
        let mut solver = solver_with(&[("x", SmtSort::Int)])?;
        let two_x = SmtTerm::int(2).mul(x());
        solver.assert(&two_x.clone().ge(SmtTerm::int(1)))?;
        solver.assert(&two_x.le(SmtTerm::int(1)))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn mixed_sorts_are_promoted() -> TestResult {
        let r = SmtTerm::real_const("r");
        let mut solver = solver_with(&[("r", SmtSort::Real)])?;
        solver.assert(&SmtTerm::int(2).mul(r.clone()).eq(SmtTerm::int(3)))?;
        let (res, model) = solver.check_sat_with_model(&[("r", &SmtSort::Real)])?;
        assert_eq!(res, SatResult::Sat);
        let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
        assert_eq!(model.get_rational("r"), Some(BigRational::new(3.into(), 2.into())));
        Ok(())
    }

    #[test]
    fn negative_model_values() -> TestResult {
        let mut solver = solver_with(&[("x", SmtSort::Int)])?;
        solver.assert(&x().eq(SmtTerm::int(-17)))?;
        let (res, model) = solver.check_sat_with_model(&[])?;
        assert_eq!(res, SatResult::Sat);
        let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
        assert_eq!(model.get_int("x"), Some(BigInt::from(-17)));
        Ok(())
    }

    #[test]
    fn modular_constraints() -> TestResult {
        let mut solver = solver_with(&[("x", SmtSort::Int)])?;
        solver.assert(&x().modulo(SmtTerm::int(4)).eq(SmtTerm::int(1)))?;
        solver.push()?;
        solver.assert(&x().eq(SmtTerm::int(6)))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        solver.pop()?;
        solver.assert(&x().eq(SmtTerm::int(9)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        Ok(())
    }

    #[test]
    fn read_over_write() -> TestResult {
        let arr = SmtSort::array(SmtSort::Int, SmtSort::Int);
        let a = SmtTerm::constant("a", arr.clone());
        let mut solver = solver_with(&[("a", arr)])?;
        let stored = a.store(SmtTerm::int(0), SmtTerm::int(5));
        solver.assert(&stored.select(SmtTerm::int(0)).eq(SmtTerm::int(5)).not())?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn uninterpreted_functions_are_congruent() -> TestResult {
        let y = SmtTerm::int_const("y");
        let f = |t: SmtTerm| SmtTerm::app("f", vec![t], SmtSort::Int);
        let mut solver = solver_with(&[("x", SmtSort::Int), ("y", SmtSort::Int)])?;
        solver.assert(&f(x()).eq(SmtTerm::int(1)))?;
        solver.assert(&f(y.clone()).eq(SmtTerm::int(2)))?;
        solver.assert(&x().eq(y))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn pattern_variables_are_rejected() -> TestResult {
        let mut solver = solver_with(&[("x", SmtSort::Int)])?;
        let res = solver.assert(&x().le(SmtTerm::var(0, SmtSort::Int)));
        assert!(matches!(res, Err(Z3Error::PatternVar(0))));
        Ok(())
    }

    #[test]
    fn reset_forgets_constants_and_keeps_timeout() -> TestResult {
        let mut solver = Z3Solver::with_timeout_ms(2000);
        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&x().eq(SmtTerm::int(1)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        solver.reset()?;
        assert!(solver._params.is_some());
        assert!(matches!(
            solver.assert(&x().eq(SmtTerm::int(2))),
            Err(Z3Error::UnknownConstant(_))
        ));
        Ok(())
    }
}
