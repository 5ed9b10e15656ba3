//! Matching a pattern against a ground term.
//!
//! Matching is syntactic, with two arithmetic allowances: a pattern
//! `k * ?v` or `- ?v` matches a numeral by binding `?v` to the matching
//! value, and a top-level negation on exactly one side is stripped and
//! reported through [`Match::positive`].

use std::mem::discriminant;

use spacer_smt::sorts::SmtSort;
use spacer_smt::terms::SmtTerm;

use crate::anti_unify::Substitution;

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub sub: Substitution,
    /// False when the term matched the negation of the pattern.
    pub positive: bool,
}

pub fn sem_match(pattern: &SmtTerm, term: &SmtTerm) -> Option<Match> {
    let mut positive = true;
    let (p, t) = match (pattern, term) {
        (SmtTerm::Not(inner), t)
            if !matches!(t, SmtTerm::Not(_)) && discriminant(inner.as_ref()) == discriminant(t) =>
        {
            positive = false;
            (inner.as_ref(), t)
        }
        (p, SmtTerm::Not(inner))
            if !matches!(p, SmtTerm::Not(_)) && discriminant(p) == discriminant(inner.as_ref()) =>
        {
            positive = false;
            (p, inner.as_ref())
        }
        _ => (pattern, term),
    };
    let mut sub = Substitution::new();
    match_into(p, t, &mut sub).then_some(Match { sub, positive })
}

fn match_into(p: &SmtTerm, t: &SmtTerm, sub: &mut Substitution) -> bool {
    if let SmtTerm::Var(id, _) = p {
        return sub.bind(*id, t.clone());
    }
    if p.is_ground() {
        return p == t;
    }
    if p.same_head(t) {
        return p
            .children()
            .into_iter()
            .zip(t.children())
            .all(|(pc, tc)| match_into(pc, tc, sub));
    }
    match_numeral(p, t, sub)
}

fn match_numeral(p: &SmtTerm, t: &SmtTerm, sub: &mut Substitution) -> bool {
    let Some(value) = t.as_numeral() else {
        return false;
    };
    let (id, sort, bound) = match p {
        SmtTerm::Mul(k, v) | SmtTerm::Mul(v, k) if k.is_numeral() => {
            let (Some(k), SmtTerm::Var(id, sort)) = (k.as_numeral(), v.as_ref()) else {
                return false;
            };
            if num::Zero::is_zero(&k) {
                return false;
            }
            (*id, sort, value / k)
        }
        SmtTerm::Neg(v) => {
            let SmtTerm::Var(id, sort) = v.as_ref() else {
                return false;
            };
            (*id, sort, -value)
        }
        _ => return false,
    };
    if *sort == SmtSort::Int && !bound.is_integer() {
        return false;
    }
    sub.bind(id, SmtTerm::numeral(bound, sort))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> SmtTerm {
        SmtTerm::int_const("x")
    }
    fn v(id: u32) -> SmtTerm {
        SmtTerm::var(id, SmtSort::Int)
    }

    #[test]
    fn binds_numerals_consistently() {
        let pat = SmtTerm::and(vec![x().le(v(0)), x().ge(v(0).neg())]);
        let ok = SmtTerm::and(vec![x().le(SmtTerm::int(3)), x().ge(SmtTerm::int(-3))]);
        let m = sem_match(&pat, &ok).expect("matches");
        assert!(m.positive);
        assert_eq!(m.sub.get(0), Some(&SmtTerm::int(3)));

        let bad = SmtTerm::and(vec![x().le(SmtTerm::int(3)), x().ge(SmtTerm::int(-4))]);
        assert!(sem_match(&pat, &bad).is_none());
    }

    #[test]
    fn scaled_variable_matches_divisible_numeral() {
        let pat = x().le(SmtTerm::int(2).mul(v(0)));
        let m = sem_match(&pat, &x().le(SmtTerm::int(6))).expect("matches");
        assert_eq!(m.sub.get(0), Some(&SmtTerm::int(3)));
        assert!(sem_match(&pat, &x().le(SmtTerm::int(5))).is_none());
    }

    #[test]
    fn top_level_negation_flips_polarity() {
        let pat = x().le(v(0));
        let m = sem_match(&pat, &x().le(SmtTerm::int(1)).not()).expect("matches");
        assert!(!m.positive);
    }

    #[test]
    fn ground_mismatch_fails() {
        let pat = SmtTerm::int_const("y").le(v(0));
        assert!(sem_match(&pat, &x().le(SmtTerm::int(1))).is_none());
    }
}
