//! Literal-order independent normal form for cubes.
//!
//! Arithmetic relations are rewritten to `sum REL numeral`, with the
//! monomials in term order and every numeric constant moved to the right.
//! Coefficients are not rescaled, so two lemmas that differ only in their
//! constants keep differing only in numerals. Conjuncts are then sorted by
//! their shape with numerals erased, which puts corresponding literals of
//! neighbouring lemmas at the same position.

use num::{BigInt, Zero};
use spacer_smt::linear::LinearExpr;
use spacer_smt::terms::{mk_and, mk_not, SmtTerm};

/// Normal form of one literal.
pub fn normalize_literal(lit: &SmtTerm) -> SmtTerm {
    match lit {
        SmtTerm::Not(inner) if inner.is_relation() => mk_not(normalize_relation(inner)),
        r if r.is_relation() => normalize_relation(r),
        other => other.clone(),
    }
}

fn normalize_relation(rel: &SmtTerm) -> SmtTerm {
    let Some((a, b)) = rel.relation_args() else {
        return rel.clone();
    };
    if !a.sort().is_arith() {
        if let SmtTerm::Eq(..) = rel {
            if b < a {
                return b.clone().eq(a.clone());
            }
        }
        return rel.clone();
    }
    let (Some(la), Some(lb)) = (LinearExpr::from_term(a), LinearExpr::from_term(b)) else {
        return rel.clone();
    };
    let diff = la.sub(&lb);
    if diff.is_constant() {
        return rel.clone();
    }
    let rhs_value = -diff.constant.clone();
    let lhs = LinearExpr {
        coeffs: diff.coeffs,
        constant: Zero::zero(),
    }
    .to_term();
    let rhs = SmtTerm::numeral(rhs_value, &lhs.sort());
    rel.with_relation_args(lhs, rhs).unwrap_or_else(|| rel.clone())
}

/// `t` with every numeral replaced by zero.
pub fn skeleton(t: &SmtTerm) -> SmtTerm {
    if t.is_numeral() {
        return SmtTerm::IntLit(BigInt::zero());
    }
    t.map_children(skeleton)
}

/// Normalized, sorted, duplicate-free conjuncts of `cube`.
pub fn normalize_literals(cube: &[SmtTerm]) -> Vec<SmtTerm> {
    let mut lits: Vec<(SmtTerm, SmtTerm)> = cube
        .iter()
        .flat_map(SmtTerm::flatten_and)
        .map(|l| {
            let n = normalize_literal(&l);
            (skeleton(&n), n)
        })
        .collect();
    lits.sort();
    lits.dedup_by(|a, b| a.1 == b.1);
    lits.into_iter().map(|(_, l)| l).collect()
}

/// Normalized cube as a single conjunction.
pub fn normalize_cube(cube: &[SmtTerm]) -> SmtTerm {
    mk_and(normalize_literals(cube))
}
