#![allow(dead_code)]

use spacer_engine::lemma::{Level, PobRef};
use spacer_engine::node::PredicateNode;
use spacer_engine::oracle::{ReachabilityOracle, SolverOracle};
use spacer_smt::backends::z3_backend::Z3Solver;
use spacer_smt::solver::{Model, ModelValue};
use spacer_smt::terms::SmtTerm;

pub fn x() -> SmtTerm {
    SmtTerm::int_const("x")
}

pub fn y() -> SmtTerm {
    SmtTerm::int_const("y")
}

pub fn int(n: i64) -> SmtTerm {
    SmtTerm::int(n)
}

/// `x <= a /\ y = b`.
pub fn step(a: i64, b: i64) -> Vec<SmtTerm> {
    vec![x().le(int(a)), y().eq(int(b))]
}

/// A node whose induction oracle blocks exactly the cubes disjoint from
/// `reach`.
pub fn node_with_reach(reach: SmtTerm) -> PredicateNode {
    PredicateNode::new(
        "inv",
        Box::new(ReachabilityOracle::new(Z3Solver::new(), reach)),
    )
}

pub fn sat_oracle() -> SolverOracle<Z3Solver> {
    SolverOracle::new(Z3Solver::new())
}

pub fn pob() -> PobRef {
    PobRef::new(SmtTerm::bool(true), Level(1))
}

pub fn point(vals: &[(&str, i64)]) -> Model {
    let mut m = Model::new();
    for (name, v) in vals {
        m.insert(*name, ModelValue::Int((*v).into()));
    }
    m
}
