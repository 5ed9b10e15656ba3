//! Syntactic implication between literals and cubes.
//!
//! Two linear literals are compared only when their variable parts are the
//! same up to a positive factor (or any factor, for equalities); then the
//! constants decide. Everything else is compared for syntactic identity.
//! The check is sound and incomplete.

use num::{BigRational, One, Signed};
use spacer_smt::linear::{LinearConstraint, LinearExpr, Rel};
use spacer_smt::terms::SmtTerm;

/// `expr + constant REL 0` with the leading coefficient scaled to magnitude
/// one.
#[derive(Debug, Clone, PartialEq)]
struct Canonical {
    linear: LinearExpr,
    constant: BigRational,
    rel: Rel,
}

fn canonical(c: LinearConstraint) -> Option<Canonical> {
    let c = c.tighten_integral();
    let lead = c.expr.coeffs.values().next()?.abs();
    let scaled = c.expr.scale(&lead.recip());
    let constant = scaled.constant.clone();
    let mut linear = scaled;
    linear.constant = BigRational::from_integer(0.into());
    Some(Canonical {
        linear,
        constant,
        rel: c.rel,
    })
}

fn negate_eq(c: &Canonical) -> Canonical {
    let minus_one = -BigRational::one();
    Canonical {
        linear: c.linear.scale(&minus_one),
        constant: -c.constant.clone(),
        rel: c.rel,
    }
}

fn canonical_implies(a: &Canonical, b: &Canonical) -> bool {
    if a.linear != b.linear {
        return false;
    }
    let (ka, kb) = (&a.constant, &b.constant);
    match (a.rel, b.rel) {
        (_, Rel::Le) => ka >= kb,
        (Rel::Lt, Rel::Lt) => ka >= kb,
        (_, Rel::Lt) => ka > kb,
        (Rel::Eq, Rel::Eq) => ka == kb,
        (_, Rel::Eq) => false,
    }
}

/// Does literal `a` imply literal `b`?
pub fn lit_implies(a: &SmtTerm, b: &SmtTerm) -> bool {
    if a == b || a.is_false() || b.is_true() {
        return true;
    }
    let (Some(ca), Some(cb)) = (LinearConstraint::from_literal(a), LinearConstraint::from_literal(b)) else {
        return false;
    };
    if ca.constant_truth() == Some(false) || cb.constant_truth() == Some(true) {
        return true;
    }
    let (Some(ca), Some(cb)) = (canonical(ca), canonical(cb)) else {
        return false;
    };
    if canonical_implies(&ca, &cb) {
        return true;
    }
    ca.rel == Rel::Eq && canonical_implies(&negate_eq(&ca), &cb)
}

/// Does the conjunction `specific` imply the conjunction `general`?
pub fn cube_implies(specific: &[SmtTerm], general: &[SmtTerm]) -> bool {
    general
        .iter()
        .all(|g| specific.iter().any(|s| lit_implies(s, g)))
}

/// Indices of cubes made redundant by another cube of the set: cube `i` is
/// dropped when it implies some other cube `j`. Among equivalent cubes the
/// first one is kept. What remains is an antichain under [`cube_implies`].
pub fn subsumed_indices(cubes: &[Vec<SmtTerm>]) -> Vec<usize> {
    let mut removed = Vec::new();
    for (i, ci) in cubes.iter().enumerate() {
        let redundant = cubes.iter().enumerate().any(|(j, cj)| {
            j != i
                && !removed.contains(&j)
                && cube_implies(ci, cj)
                && (j < i || !cube_implies(cj, ci))
        });
        if redundant {
            removed.push(i);
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> SmtTerm {
        SmtTerm::int_const("x")
    }
    fn y() -> SmtTerm {
        SmtTerm::int_const("y")
    }

    #[test]
    fn tighter_bound_implies_looser() {
        assert!(lit_implies(&x().le(SmtTerm::int(1)), &x().le(SmtTerm::int(3))));
        assert!(!lit_implies(&x().le(SmtTerm::int(3)), &x().le(SmtTerm::int(1))));
        assert!(lit_implies(&x().ge(SmtTerm::int(4)), &x().gt(SmtTerm::int(2))));
        // Over the integers x < 3 is x <= 2.
        assert!(lit_implies(&x().lt(SmtTerm::int(3)), &x().le(SmtTerm::int(2))));
    }

    #[test]
    fn equality_implies_both_bounds() {
        let eq = x().eq(SmtTerm::int(2));
        assert!(lit_implies(&eq, &x().le(SmtTerm::int(2))));
        assert!(lit_implies(&eq, &x().ge(SmtTerm::int(1))));
        assert!(!lit_implies(&eq, &x().ge(SmtTerm::int(3))));
        assert!(!lit_implies(&eq, &x().eq(SmtTerm::int(3))));
    }

    #[test]
    fn scaled_forms_compare() {
        let a = SmtTerm::int(2).mul(x()).le(SmtTerm::int(2));
        assert!(lit_implies(&a, &x().le(SmtTerm::int(5))));
        assert!(!lit_implies(&x().le(SmtTerm::int(1)), &y().le(SmtTerm::int(1))));
    }

    #[test]
    fn antichain_keeps_most_general() {
        let cubes = vec![
            vec![x().le(SmtTerm::int(1)), y().le(SmtTerm::int(2))],
            vec![x().le(SmtTerm::int(3)), y().le(SmtTerm::int(4))],
            vec![x().le(SmtTerm::int(5)), y().ge(SmtTerm::int(0))],
        ];
        assert_eq!(subsumed_indices(&cubes), vec![0]);
    }

    #[test]
    fn equivalent_cubes_keep_first() {
        let a = vec![x().le(SmtTerm::int(1))];
        let b = vec![x().lt(SmtTerm::int(2))];
        assert_eq!(subsumed_indices(&[a, b]), vec![1]);
    }
}
