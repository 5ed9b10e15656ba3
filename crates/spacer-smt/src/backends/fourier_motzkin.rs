//! In-process decision procedure for quantifier-free linear arithmetic.
//!
//! Assertions are expanded into a bounded disjunctive normal form. Each cube
//! is decided by Fourier-Motzkin elimination over the rationals, with strict
//! integer bounds tightened and a divisibility test on integer equalities.
//! A cube is reported satisfiable only once a back-substituted model has
//! been checked against the original assertions; anything that cannot be
//! confirmed (uninterpreted atoms, arrays, integer gaps) is `Unknown`.

use std::collections::HashMap;

use indexmap::IndexMap;
use num::{BigRational, Integer, One, Signed, Zero};
use thiserror::Error;

use crate::linear::{LinearConstraint, LinearExpr, Rel};
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Default bound on the number of DNF cubes explored per query.
pub const DEFAULT_CUBE_LIMIT: usize = 4096;
/// Default bound on the number of constraints alive during elimination.
pub const DEFAULT_CONSTRAINT_LIMIT: usize = 20_000;

#[derive(Debug, Error)]
pub enum FmError {
    #[error("pop without matching push")]
    ScopeUnderflow,
}

/// Outcome of deciding a conjunction of linear constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum Feasibility {
    Infeasible,
    /// Values for every atom occurring in the input.
    Feasible(HashMap<SmtTerm, BigRational>),
    Unknown(String),
}

/// Drop trivially true constraints and detect trivially false ones.
/// Integer equalities whose coefficient gcd does not divide the constant are
/// false.
pub fn simplify(constraints: Vec<LinearConstraint>) -> Option<Vec<LinearConstraint>> {
    let mut out: Vec<LinearConstraint> = Vec::with_capacity(constraints.len());
    for c in constraints {
        let c = c.tighten_integral();
        match c.constant_truth() {
            Some(true) => continue,
            Some(false) => return None,
            None => {}
        }
        if c.rel == Rel::Eq && c.expr.is_integral() {
            let g = c
                .expr
                .coeffs
                .values()
                .fold(num::BigInt::zero(), |g, k| g.gcd(&k.to_integer()));
            if !g.is_zero() && !c.expr.constant.to_integer().is_multiple_of(&g) {
                return None;
            }
        }
        if !out.contains(&c) {
            out.push(c);
        }
    }
    Some(out)
}

/// Express `atom` from an equality that mentions it.
pub fn solve_for(c: &LinearConstraint, atom: &SmtTerm) -> Option<LinearExpr> {
    let a = c.expr.coeff(atom);
    if c.rel != Rel::Eq || a.is_zero() {
        return None;
    }
    let mut rest = c.expr.clone();
    rest.coeffs.remove(atom);
    Some(rest.scale(&-a.recip()))
}

/// Combine a lower bound (negative coefficient on `atom`) with an upper
/// bound (positive coefficient) so that `atom` cancels.
pub fn resolve(lower: &LinearConstraint, upper: &LinearConstraint, atom: &SmtTerm) -> LinearConstraint {
    let a = -lower.expr.coeff(atom);
    let b = upper.expr.coeff(atom);
    let expr = lower.expr.scale(&b).add(&upper.expr.scale(&a));
    let rel = if lower.rel == Rel::Lt || upper.rel == Rel::Lt {
        Rel::Lt
    } else {
        Rel::Le
    };
    LinearConstraint::new(expr, rel).tighten_integral()
}

/// One elimination step.
#[derive(Debug, Clone)]
pub struct Elimination {
    /// Constraints over the remaining atoms.
    pub remaining: Vec<LinearConstraint>,
    /// Constraints that mentioned the eliminated atom.
    pub involved: Vec<LinearConstraint>,
}

/// Eliminate `atom`, by substitution when an equality defines it and by
/// pairwise resolution otherwise. Returns `None` when more than
/// `pair_limit` resolvents would be produced.
pub fn eliminate(
    atom: &SmtTerm,
    constraints: Vec<LinearConstraint>,
    pair_limit: usize,
) -> Option<Elimination> {
    let (involved, untouched): (Vec<_>, Vec<_>) = constraints
        .into_iter()
        .partition(|c| !c.expr.coeff(atom).is_zero());

    if let Some(eq) = involved.iter().find(|c| c.rel == Rel::Eq) {
        let def = solve_for(eq, atom)?;
        let mut remaining = untouched;
        for c in &involved {
            if c == eq {
                continue;
            }
            remaining.push(LinearConstraint::new(c.expr.substitute(atom, &def), c.rel));
        }
        return Some(Elimination {
            remaining,
            involved: vec![eq.clone()],
        });
    }

    let (lowers, uppers): (Vec<_>, Vec<_>) = involved
        .iter()
        .partition(|c| c.expr.coeff(atom).is_negative());
    if lowers.len() * uppers.len() > pair_limit {
        return None;
    }
    let mut remaining = untouched;
    for l in &lowers {
        for u in &uppers {
            remaining.push(resolve(l, u, atom));
        }
    }
    Some(Elimination { remaining, involved })
}

/// Interval for `atom` implied by `involved` once every other atom has a
/// value.
fn bounds(
    atom: &SmtTerm,
    involved: &[LinearConstraint],
    value: &impl Fn(&SmtTerm) -> Option<BigRational>,
) -> Option<(Option<(BigRational, bool)>, Option<(BigRational, bool)>)> {
    let mut lo: Option<(BigRational, bool)> = None;
    let mut hi: Option<(BigRational, bool)> = None;
    for c in involved {
        let a = c.expr.coeff(atom);
        let mut rest = c.expr.clone();
        rest.coeffs.remove(atom);
        let r = rest.eval_with(value)?;
        let bound = -r / &a;
        let strict = c.rel == Rel::Lt;
        if a.is_positive() {
            let tighter = match &hi {
                None => true,
                Some((h, s)) => bound < *h || (bound == *h && strict && !*s),
            };
            if tighter {
                hi = Some((bound, strict));
            }
        } else {
            let tighter = match &lo {
                None => true,
                Some((l, s)) => bound > *l || (bound == *l && strict && !*s),
            };
            if tighter {
                lo = Some((bound, strict));
            }
        }
    }
    Some((lo, hi))
}

fn within(v: &BigRational, lo: &Option<(BigRational, bool)>, hi: &Option<(BigRational, bool)>) -> bool {
    let lo_ok = match lo {
        None => true,
        Some((l, true)) => v > l,
        Some((l, false)) => v >= l,
    };
    let hi_ok = match hi {
        None => true,
        Some((h, true)) => v < h,
        Some((h, false)) => v <= h,
    };
    lo_ok && hi_ok
}

/// Pick a value in the interval, preferring zero, then values on the bounds.
fn choose(
    lo: &Option<(BigRational, bool)>,
    hi: &Option<(BigRational, bool)>,
    integral: bool,
) -> Option<BigRational> {
    let one = BigRational::one();
    let mut candidates = vec![BigRational::zero()];
    if integral {
        if let Some((l, _)) = lo {
            let c = l.ceil();
            candidates.push(c.clone());
            candidates.push(c + &one);
        }
        if let Some((h, _)) = hi {
            let c = h.floor();
            candidates.push(c.clone());
            candidates.push(c - &one);
        }
    } else {
        match (lo, hi) {
            (Some((l, _)), Some((h, _))) => {
                candidates.push(l.clone());
                candidates.push(h.clone());
                candidates.push((l + h) / BigRational::from_integer(2.into()));
            }
            (Some((l, _)), None) => {
                candidates.push(l.clone());
                candidates.push(l + &one);
            }
            (None, Some((h, _))) => {
                candidates.push(h.clone());
                candidates.push(h - &one);
            }
            (None, None) => {}
        }
    }
    candidates.into_iter().find(|v| within(v, lo, hi))
}

fn is_int_atom(t: &SmtTerm) -> bool {
    t.sort() == SmtSort::Int
}

/// Decide a conjunction of linear constraints.
pub fn decide(constraints: Vec<LinearConstraint>, constraint_limit: usize) -> Feasibility {
    let Some(mut current) = simplify(constraints) else {
        return Feasibility::Infeasible;
    };
    let mut order: Vec<SmtTerm> = Vec::new();
    for c in &current {
        for a in c.expr.atoms() {
            if !order.contains(a) {
                order.push(a.clone());
            }
        }
    }

    let mut steps: Vec<(SmtTerm, Vec<LinearConstraint>)> = Vec::with_capacity(order.len());
    for atom in &order {
        let Some(step) = eliminate(atom, current, constraint_limit) else {
            return Feasibility::Unknown(format!("elimination of `{atom}` exceeds limits"));
        };
        let Some(rest) = simplify(step.remaining) else {
            return Feasibility::Infeasible;
        };
        if rest.len() > constraint_limit {
            return Feasibility::Unknown("too many constraints".into());
        }
        current = rest;
        steps.push((atom.clone(), step.involved));
    }

    let mut assignment: HashMap<SmtTerm, BigRational> = HashMap::new();
    for (atom, involved) in steps.iter().rev() {
        let lookup = |t: &SmtTerm| assignment.get(t).cloned();
        let value = if let Some(def) = involved.iter().find_map(|c| solve_for(c, atom)) {
            match def.eval_with(lookup) {
                Some(v) => v,
                None => return Feasibility::Unknown(format!("unassigned atom under `{atom}`")),
            }
        } else {
            let Some((lo, hi)) = bounds(atom, involved, &lookup) else {
                return Feasibility::Unknown(format!("unassigned atom under `{atom}`"));
            };
            match choose(&lo, &hi, is_int_atom(atom)) {
                Some(v) => v,
                None => return Feasibility::Unknown(format!("no integer value for `{atom}`")),
            }
        };
        if is_int_atom(atom) && !value.is_integer() {
            return Feasibility::Unknown(format!("non-integral value for `{atom}`"));
        }
        assignment.insert(atom.clone(), value);
    }
    Feasibility::Feasible(assignment)
}

#[derive(Debug, Clone, PartialEq)]
enum Lit {
    Arith(LinearConstraint),
    Atom(SmtTerm, bool),
}

type Dnf = Vec<Vec<Lit>>;

fn product(a: Dnf, b: Dnf, limit: usize) -> Result<Dnf, String> {
    if a.len().saturating_mul(b.len()) > limit {
        return Err("disjunctive normal form exceeds cube limit".into());
    }
    let mut out = Vec::with_capacity(a.len() * b.len());
    for x in &a {
        for y in &b {
            let mut cube = x.clone();
            cube.extend(y.iter().cloned());
            out.push(cube);
        }
    }
    Ok(out)
}

fn union(mut a: Dnf, b: Dnf, limit: usize) -> Result<Dnf, String> {
    a.extend(b);
    if a.len() > limit {
        return Err("disjunctive normal form exceeds cube limit".into());
    }
    Ok(a)
}

fn arith_lit(term: &SmtTerm, positive: bool) -> Option<Dnf> {
    let (a, b) = term.relation_args()?;
    if !a.sort().is_arith() {
        return None;
    }
    if !positive {
        if let SmtTerm::Eq(..) = term {
            let lt = LinearConstraint::from_literal(&a.clone().lt(b.clone()))?;
            let gt = LinearConstraint::from_literal(&a.clone().gt(b.clone()))?;
            return Some(vec![vec![Lit::Arith(lt)], vec![Lit::Arith(gt)]]);
        }
        let c = LinearConstraint::from_literal(&term.clone().not())?;
        return Some(vec![vec![Lit::Arith(c)]]);
    }
    let c = LinearConstraint::from_literal(term)?;
    Some(vec![vec![Lit::Arith(c)]])
}

fn dnf(term: &SmtTerm, positive: bool, limit: usize) -> Result<Dnf, String> {
    let conj = |args: &[SmtTerm], pos: bool| -> Result<Dnf, String> {
        let mut acc: Dnf = vec![Vec::new()];
        for a in args {
            acc = product(acc, dnf(a, pos, limit)?, limit)?;
        }
        Ok(acc)
    };
    let disj = |args: &[SmtTerm], pos: bool| -> Result<Dnf, String> {
        let mut acc: Dnf = Vec::new();
        for a in args {
            acc = union(acc, dnf(a, pos, limit)?, limit)?;
        }
        Ok(acc)
    };
    match term {
        SmtTerm::BoolLit(b) => Ok(if *b == positive { vec![Vec::new()] } else { Vec::new() }),
        SmtTerm::And(args) if positive => conj(args, true),
        SmtTerm::And(args) => disj(args, false),
        SmtTerm::Or(args) if positive => disj(args, true),
        SmtTerm::Or(args) => conj(args, false),
        SmtTerm::Not(inner) => dnf(inner, !positive, limit),
        SmtTerm::Implies(a, b) => {
            if positive {
                union(dnf(a, false, limit)?, dnf(b, true, limit)?, limit)
            } else {
                product(dnf(a, true, limit)?, dnf(b, false, limit)?, limit)
            }
        }
        SmtTerm::Ite(c, t, e) if term.sort() == SmtSort::Bool => {
            let then = product(dnf(c, true, limit)?, dnf(t, positive, limit)?, limit)?;
            let els = product(dnf(c, false, limit)?, dnf(e, positive, limit)?, limit)?;
            union(then, els, limit)
        }
        SmtTerm::Eq(a, b) if a.sort() == SmtSort::Bool => {
            let same = product(dnf(a, true, limit)?, dnf(b, true, limit)?, limit)?;
            let same = union(
                same,
                product(dnf(a, false, limit)?, dnf(b, false, limit)?, limit)?,
                limit,
            )?;
            if positive {
                Ok(same)
            } else {
                let differ = product(dnf(a, true, limit)?, dnf(b, false, limit)?, limit)?;
                union(
                    differ,
                    product(dnf(a, false, limit)?, dnf(b, true, limit)?, limit)?,
                    limit,
                )
            }
        }
        _ => Ok(arith_lit(term, positive).unwrap_or_else(|| vec![vec![Lit::Atom(term.clone(), positive)]])),
    }
}

/// Reference solver for linear real and integer arithmetic.
#[derive(Debug, Clone)]
pub struct FourierMotzkinSolver {
    decls: IndexMap<String, SmtSort>,
    assertions: Vec<SmtTerm>,
    frames: Vec<(usize, usize)>,
    cube_limit: usize,
    constraint_limit: usize,
}

impl Default for FourierMotzkinSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FourierMotzkinSolver {
    pub fn new() -> Self {
        Self {
            decls: IndexMap::new(),
            assertions: Vec::new(),
            frames: Vec::new(),
            cube_limit: DEFAULT_CUBE_LIMIT,
            constraint_limit: DEFAULT_CONSTRAINT_LIMIT,
        }
    }

    pub fn with_limits(mut self, cube_limit: usize, constraint_limit: usize) -> Self {
        self.cube_limit = cube_limit;
        self.constraint_limit = constraint_limit;
        self
    }

    pub fn assertions(&self) -> &[SmtTerm] {
        &self.assertions
    }

    fn build_model(&self, assignment: &HashMap<SmtTerm, BigRational>, atoms: &[(SmtTerm, bool)]) -> Model {
        let mut consts = self.decls.clone();
        for a in &self.assertions {
            a.collect_consts(&mut consts);
        }
        let mut model = Model::new();
        for (name, sort) in consts {
            let term = SmtTerm::Const(name.clone(), sort.clone());
            let value = match sort {
                SmtSort::Int => ModelValue::Int(
                    assignment
                        .get(&term)
                        .map(|q| q.to_integer())
                        .unwrap_or_default(),
                ),
                SmtSort::Real => ModelValue::Real(assignment.get(&term).cloned().unwrap_or_default()),
                SmtSort::Bool => ModelValue::Bool(
                    atoms
                        .iter()
                        .find(|(t, _)| *t == term)
                        .map(|(_, pos)| *pos)
                        .unwrap_or(false),
                ),
                SmtSort::Array(..) => continue,
            };
            model.insert(name, value);
        }
        model
    }

    fn decide_cube(&self, cube: &[Lit]) -> (SatResult, Option<Model>) {
        let mut arith = Vec::new();
        let mut atoms: Vec<(SmtTerm, bool)> = Vec::new();
        for lit in cube {
            match lit {
                Lit::Arith(c) => arith.push(c.clone()),
                Lit::Atom(t, pos) => {
                    if atoms.iter().any(|(u, p)| u == t && p != pos) {
                        return (SatResult::Unsat, None);
                    }
                    atoms.push((t.clone(), *pos));
                }
            }
        }
        match decide(arith, self.constraint_limit) {
            Feasibility::Infeasible => (SatResult::Unsat, None),
            Feasibility::Unknown(reason) => (SatResult::Unknown(reason), None),
            Feasibility::Feasible(assignment) => {
                let model = self.build_model(&assignment, &atoms);
                if self.assertions.iter().all(|a| model.is_true(a)) {
                    (SatResult::Sat, Some(model))
                } else {
                    (SatResult::Unknown("model could not be confirmed".into()), None)
                }
            }
        }
    }

    fn run(&self) -> (SatResult, Option<Model>) {
        let mut cubes: Dnf = vec![Vec::new()];
        for a in &self.assertions {
            cubes = match dnf(a, true, self.cube_limit).and_then(|d| product(cubes, d, self.cube_limit)) {
                Ok(c) => c,
                Err(reason) => return (SatResult::Unknown(reason), None),
            };
        }
        let mut unknown = None;
        for cube in &cubes {
            match self.decide_cube(cube) {
                (SatResult::Sat, model) => return (SatResult::Sat, model),
                (SatResult::Unsat, _) => {}
                (SatResult::Unknown(reason), _) => unknown = Some(reason),
            }
        }
        match unknown {
            Some(reason) => (SatResult::Unknown(reason), None),
            None => (SatResult::Unsat, None),
        }
    }
}

impl SmtSolver for FourierMotzkinSolver {
    type Error = FmError;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), FmError> {
        self.decls.insert(name.to_string(), sort.clone());
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), FmError> {
        self.assertions.push(term.clone());
        Ok(())
    }

    fn push(&mut self) -> Result<(), FmError> {
        self.frames.push((self.assertions.len(), self.decls.len()));
        Ok(())
    }

    fn pop(&mut self) -> Result<(), FmError> {
        let (assertions, decls) = self.frames.pop().ok_or(FmError::ScopeUnderflow)?;
        self.assertions.truncate(assertions);
        self.decls.truncate(decls);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, FmError> {
        Ok(self.run().0)
    }

    fn check_sat_with_model(
        &mut self,
        _var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), FmError> {
        Ok(self.run())
    }

    fn reset(&mut self) -> Result<(), FmError> {
        self.decls.clear();
        self.assertions.clear();
        self.frames.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::BigInt;

    fn x() -> SmtTerm {
        SmtTerm::int_const("x")
    }
    fn y() -> SmtTerm {
        SmtTerm::int_const("y")
    }

    fn check(terms: &[SmtTerm]) -> (SatResult, Option<Model>) {
        let mut s = FourierMotzkinSolver::new();
        for t in terms {
            s.assert(t).expect("assert");
        }
        s.check_sat_with_model(&[]).expect("check")
    }

    #[test]
    fn interval_is_satisfiable_with_model() {
        let (r, m) = check(&[x().ge(SmtTerm::int(2)), x().le(SmtTerm::int(5))]);
        assert_eq!(r, SatResult::Sat);
        let m = m.expect("model");
        let v = m.get_int("x").expect("x assigned");
        assert!(v >= BigInt::from(2) && v <= BigInt::from(5));
    }

    #[test]
    fn transitive_bounds_are_unsat() {
        let (r, _) = check(&[
            x().lt(y()),
            y().lt(SmtTerm::int(3)),
            x().ge(SmtTerm::int(2)),
        ]);
        assert_eq!(r, SatResult::Unsat);
    }

    #[test]
    fn integer_tightening_detects_gap() {
        // 2 < x < 3 has rational but no integer solutions
        let (r, _) = check(&[x().gt(SmtTerm::int(2)), x().lt(SmtTerm::int(3))]);
        assert_eq!(r, SatResult::Unsat);
    }

    #[test]
    fn divisibility_of_integer_equalities() {
        let (r, _) = check(&[SmtTerm::int(2).mul(x()).eq(SmtTerm::int(1))]);
        assert_eq!(r, SatResult::Unsat);
    }

    #[test]
    fn disjunctions_and_disequalities() {
        let (r, m) = check(&[
            SmtTerm::or(vec![x().le(SmtTerm::int(-5)), x().ge(SmtTerm::int(5))]),
            x().eq(SmtTerm::int(5)).not(),
        ]);
        assert_eq!(r, SatResult::Sat);
        let v = m.and_then(|m| m.get_int("x")).expect("x assigned");
        assert!(v <= BigInt::from(-5) || v > BigInt::from(5));
    }

    #[test]
    fn boolean_atoms_conflict() {
        let p = SmtTerm::bool_const("p");
        let (r, _) = check(&[p.clone(), p.not()]);
        assert_eq!(r, SatResult::Unsat);
    }

    #[test]
    fn uninterpreted_terms_are_unknown_when_sat() {
        let a = SmtTerm::constant("a", SmtSort::array(SmtSort::Int, SmtSort::Int));
        let (r, _) = check(&[a.select(SmtTerm::int(0)).ge(SmtTerm::int(1))]);
        assert!(matches!(r, SatResult::Unknown(_)));
    }

    #[test]
    fn push_pop_restores_assertions() {
        let mut s = FourierMotzkinSolver::new();
        s.assert(&x().ge(SmtTerm::int(0))).expect("assert");
        s.push().expect("push");
        s.assert(&x().lt(SmtTerm::int(0))).expect("assert");
        assert_eq!(s.check_sat().expect("check"), SatResult::Unsat);
        s.pop().expect("pop");
        assert_eq!(s.check_sat().expect("check"), SatResult::Sat);
        assert!(matches!(s.pop(), Err(FmError::ScopeUnderflow)));
    }

    #[test]
    fn rational_solutions() {
        let r = SmtTerm::real_const("r");
        let (res, m) = check(&[
            SmtTerm::int(3).mul(r.clone()).gt(SmtTerm::int(1)),
            SmtTerm::int(3).mul(r).lt(SmtTerm::int(2)),
        ]);
        assert_eq!(res, SatResult::Sat);
        let v = m.and_then(|m| m.get_rational("r")).expect("r assigned");
        assert!(v > BigRational::new(1.into(), 3.into()) && v < BigRational::new(2.into(), 3.into()));
    }
}
