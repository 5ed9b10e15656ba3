//! Solver-facing interfaces used by the generalizers.
//!
//! [`InductionOracle`] answers "is this cube blocked at that level" for a
//! predicate; [`SatOracle`] is a scoped satisfiability checker over
//! [`SmtTerm`]s. [`SolverOracle`] adapts any [`SmtSolver`] to [`SatOracle`],
//! and [`ReachabilityOracle`] is a reference induction oracle that blocks
//! exactly the cubes disjoint from a fixed reachable set.

use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use spacer_smt::solver::{Model, SatResult, SmtSolver};
use spacer_smt::sorts::SmtSort;
use spacer_smt::terms::SmtTerm;

use crate::error::{EngineError, Result};
use crate::lemma::Level;

/// Answer of an inductiveness query.
#[derive(Debug, Clone, PartialEq)]
pub struct InductiveCheck {
    pub inductive: bool,
    /// Level at which the cube was shown blocked.
    pub level: Level,
    /// Subset of the queried literals that suffices, when the oracle
    /// computes one.
    pub core: Option<Vec<SmtTerm>>,
}

impl InductiveCheck {
    pub fn failed(level: Level) -> Self {
        Self {
            inductive: false,
            level,
            core: None,
        }
    }
}

pub trait InductionOracle {
    /// Is `cube` blocked at `level`? `weakness` is a hint that bounds how
    /// hard the oracle should try.
    fn check_inductive(
        &mut self,
        level: Level,
        cube: &[SmtTerm],
        weakness: u32,
    ) -> Result<InductiveCheck>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SatAnswer {
    Sat(Model),
    Unsat,
    Unknown(String),
}

/// Scoped satisfiability checks.
pub trait SatOracle {
    fn push(&mut self) -> Result<()>;
    fn pop(&mut self) -> Result<()>;
    fn assert(&mut self, term: &SmtTerm) -> Result<()>;
    fn check(&mut self) -> Result<SatAnswer>;

    /// Check `assertions` in a fresh scope that is discarded afterwards.
    fn is_satisfiable(&mut self, assertions: &[SmtTerm]) -> Result<SatAnswer> {
        let mut scope = SolverScope::new(self)?;
        for a in assertions {
            scope.assert(a)?;
        }
        scope.check()
    }
}

/// Push on creation, pop on drop.
pub struct SolverScope<'a, O: SatOracle + ?Sized> {
    oracle: &'a mut O,
}

impl<'a, O: SatOracle + ?Sized> SolverScope<'a, O> {
    pub fn new(oracle: &'a mut O) -> Result<Self> {
        oracle.push()?;
        Ok(Self { oracle })
    }
}

impl<O: SatOracle + ?Sized> Deref for SolverScope<'_, O> {
    type Target = O;

    fn deref(&self) -> &O {
        self.oracle
    }
}

impl<O: SatOracle + ?Sized> DerefMut for SolverScope<'_, O> {
    fn deref_mut(&mut self) -> &mut O {
        self.oracle
    }
}

impl<O: SatOracle + ?Sized> Drop for SolverScope<'_, O> {
    fn drop(&mut self) {
        if let Err(e) = self.oracle.pop() {
            tracing::warn!(error = %e, "failed to pop solver scope");
        }
    }
}

/// [`SatOracle`] over an [`SmtSolver`], declaring constants on first use.
pub struct SolverOracle<S: SmtSolver> {
    solver: S,
    declared: Vec<IndexMap<String, SmtSort>>,
}

impl<S: SmtSolver> SolverOracle<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            declared: vec![IndexMap::new()],
        }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    fn is_declared(&self, name: &str) -> bool {
        self.declared.iter().any(|frame| frame.contains_key(name))
    }

    fn declare_consts(&mut self, term: &SmtTerm) -> Result<()> {
        for (name, sort) in term.free_consts() {
            if self.is_declared(&name) {
                continue;
            }
            self.solver
                .declare_var(&name, &sort)
                .map_err(|e| EngineError::Solver(e.to_string()))?;
            if let Some(frame) = self.declared.last_mut() {
                frame.insert(name, sort);
            }
        }
        Ok(())
    }
}

impl<S: SmtSolver> SatOracle for SolverOracle<S> {
    fn push(&mut self) -> Result<()> {
        self.solver
            .push()
            .map_err(|e| EngineError::Solver(e.to_string()))?;
        self.declared.push(IndexMap::new());
        Ok(())
    }

    fn pop(&mut self) -> Result<()> {
        if self.declared.len() <= 1 {
            return Err(EngineError::Solver("pop without matching push".into()));
        }
        self.solver
            .pop()
            .map_err(|e| EngineError::Solver(e.to_string()))?;
        self.declared.pop();
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<()> {
        self.declare_consts(term)?;
        self.solver
            .assert(term)
            .map_err(|e| EngineError::Solver(e.to_string()))
    }

    fn check(&mut self) -> Result<SatAnswer> {
        let decls: Vec<(String, SmtSort)> = self
            .declared
            .iter()
            .flat_map(|frame| frame.iter().map(|(n, s)| (n.clone(), s.clone())))
            .collect();
        let names: Vec<(&str, &SmtSort)> = decls.iter().map(|(n, s)| (n.as_str(), s)).collect();
        let (result, model) = self
            .solver
            .check_sat_with_model(&names)
            .map_err(|e| EngineError::Solver(e.to_string()))?;
        Ok(match result {
            SatResult::Sat => SatAnswer::Sat(model.unwrap_or_default()),
            SatResult::Unsat => SatAnswer::Unsat,
            SatResult::Unknown(reason) => SatAnswer::Unknown(reason),
        })
    }
}

/// Induction oracle for a system whose reachable states are described by a
/// fixed formula: a cube is blocked, at any level, iff it has no reachable
/// state. Blocked cubes come with a deletion-minimal core.
pub struct ReachabilityOracle<S: SmtSolver> {
    sat: SolverOracle<S>,
    reachable: SmtTerm,
    queries: usize,
}

impl<S: SmtSolver> ReachabilityOracle<S> {
    pub fn new(solver: S, reachable: SmtTerm) -> Self {
        Self {
            sat: SolverOracle::new(solver),
            reachable,
            queries: 0,
        }
    }

    /// Number of satisfiability checks issued so far.
    pub fn queries(&self) -> usize {
        self.queries
    }

    fn blocked(&mut self, cube: &[SmtTerm]) -> Result<bool> {
        self.queries += 1;
        let mut query = Vec::with_capacity(cube.len() + 1);
        query.push(self.reachable.clone());
        query.extend(cube.iter().cloned());
        // Unknown counts as reachable.
        Ok(matches!(self.sat.is_satisfiable(&query)?, SatAnswer::Unsat))
    }
}

impl<S: SmtSolver> InductionOracle for ReachabilityOracle<S> {
    fn check_inductive(
        &mut self,
        level: Level,
        cube: &[SmtTerm],
        _weakness: u32,
    ) -> Result<InductiveCheck> {
        if !self.blocked(cube)? {
            return Ok(InductiveCheck::failed(level));
        }
        let mut core: Vec<SmtTerm> = cube.iter().filter(|l| !l.is_true()).cloned().collect();
        let mut i = 0;
        while i < core.len() && core.len() > 1 {
            let mut candidate = core.clone();
            candidate.remove(i);
            if self.blocked(&candidate)? {
                core = candidate;
            } else {
                i += 1;
            }
        }
        Ok(InductiveCheck {
            inductive: true,
            level,
            core: Some(core),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacer_smt::backends::fourier_motzkin::FourierMotzkinSolver;

    fn x() -> SmtTerm {
        SmtTerm::int_const("x")
    }

    #[test]
    fn scope_pops_on_drop() {
        let mut sat = SolverOracle::new(FourierMotzkinSolver::new());
        {
            let mut scope = SolverScope::new(&mut sat).expect("push");
            scope.assert(&x().le(SmtTerm::int(0))).expect("assert");
            scope.assert(&x().ge(SmtTerm::int(1))).expect("assert");
            assert_eq!(scope.check().expect("check"), SatAnswer::Unsat);
        }
        assert!(matches!(
            sat.is_satisfiable(&[x().ge(SmtTerm::int(1))]).expect("check"),
            SatAnswer::Sat(_)
        ));
    }

    #[test]
    fn unbalanced_pop_is_an_error() {
        let mut sat = SolverOracle::new(FourierMotzkinSolver::new());
        assert!(matches!(sat.pop(), Err(EngineError::Solver(_))));
    }

    #[test]
    fn sat_answer_carries_model() {
        let mut sat = SolverOracle::new(FourierMotzkinSolver::new());
        let fml = SmtTerm::and(vec![x().ge(SmtTerm::int(2)), x().le(SmtTerm::int(2))]);
        match sat.is_satisfiable(&[fml.clone()]).expect("check") {
            SatAnswer::Sat(m) => assert!(m.is_true(&fml)),
            other => panic!("expected sat, got {other:?}"),
        }
    }

    #[test]
    fn reachability_oracle_minimizes_core() {
        // Reachable: 0 <= x <= 10.
        let reach = SmtTerm::and(vec![x().ge(SmtTerm::int(0)), x().le(SmtTerm::int(10))]);
        let mut oracle = ReachabilityOracle::new(FourierMotzkinSolver::new(), reach);
        let y = SmtTerm::int_const("y");
        let cube = vec![y.clone().ge(SmtTerm::int(3)), x().ge(SmtTerm::int(11))];
        let res = oracle.check_inductive(Level(1), &cube, 0).expect("check");
        assert!(res.inductive);
        assert_eq!(res.core, Some(vec![x().ge(SmtTerm::int(11))]));

        let res = oracle
            .check_inductive(Level(1), &[x().ge(SmtTerm::int(5))], 0)
            .expect("check");
        assert!(!res.inductive);
    }
}
