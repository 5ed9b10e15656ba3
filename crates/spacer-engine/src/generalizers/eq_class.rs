//! Saturating the equalities of a cube.

use spacer_smt::terms::SmtTerm;

use crate::error::Result;
use crate::generalizers::GenOutcome;
use crate::lemma::LemmaRef;
use crate::stats::Statistics;

/// Equivalence classes of the terms equated by `cube`, in first-occurrence
/// order, and the literals that are not equalities.
pub fn factor_eqs(cube: &[SmtTerm]) -> (Vec<Vec<SmtTerm>>, Vec<SmtTerm>) {
    let mut classes: Vec<Vec<SmtTerm>> = Vec::new();
    let mut rest = Vec::new();
    for lit in cube {
        let SmtTerm::Eq(a, b) = lit else {
            rest.push(lit.clone());
            continue;
        };
        let (a, b) = (a.as_ref(), b.as_ref());
        let ia = classes.iter().position(|c| c.contains(a));
        let ib = classes.iter().position(|c| c.contains(b));
        match (ia, ib) {
            (Some(i), Some(j)) if i == j => {}
            (Some(i), Some(j)) => {
                let (keep, gone) = (i.min(j), i.max(j));
                let moved = classes.remove(gone);
                classes[keep].extend(moved);
            }
            (Some(i), None) => classes[i].push(b.clone()),
            (None, Some(j)) => classes[j].push(a.clone()),
            (None, None) => classes.push(vec![a.clone(), b.clone()]),
        }
    }
    (classes, rest)
}

/// All pairwise equalities between members of each class.
pub fn equiv_to_expr_full(classes: &[Vec<SmtTerm>], out: &mut Vec<SmtTerm>) {
    for class in classes {
        for (i, a) in class.iter().enumerate() {
            for b in &class[i + 1..] {
                out.push(a.clone().eq(b.clone()));
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct EqClassGeneralizer {
    count: u32,
}

impl EqClassGeneralizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, lemma: &LemmaRef) -> Result<GenOutcome> {
        let cube = lemma.cube();
        let (classes, mut out) = factor_eqs(&cube);
        if !classes.iter().any(|c| c.len() > 2) {
            return Ok(GenOutcome::Unchanged);
        }
        equiv_to_expr_full(&classes, &mut out);
        tracing::debug!(%lemma, classes = classes.len(), "expanded equality classes");
        lemma.update_cube(out);
        self.count += 1;
        Ok(GenOutcome::Updated)
    }

    pub fn collect_statistics(&self, st: &mut Statistics) {
        st.update("SPACER eq class gen", self.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lemma::{Level, PobRef};

    fn c(n: &str) -> SmtTerm {
        SmtTerm::int_const(n)
    }

    #[test]
    fn transitive_equalities_are_exposed() {
        let cube = vec![
            c("x").eq(SmtTerm::int(3)),
            c("z").ge(SmtTerm::int(0)),
            c("y").eq(SmtTerm::int(3)),
        ];
        let lemma = LemmaRef::new(0, cube, Level(1), PobRef::new(SmtTerm::bool(true), Level(1)));
        let mut g = EqClassGeneralizer::new();
        assert_eq!(g.apply(&lemma).expect("apply"), GenOutcome::Updated);
        let out = lemma.cube();
        assert!(out.contains(&c("x").eq(c("y"))));
        assert!(out.contains(&c("z").ge(SmtTerm::int(0))));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn classes_merge_across_literals() {
        let cube = vec![c("a").eq(c("b")), c("c").eq(c("d")), c("b").eq(c("c"))];
        let (classes, rest) = factor_eqs(&cube);
        assert!(rest.is_empty());
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].len(), 4);
        let mut out = Vec::new();
        equiv_to_expr_full(&classes, &mut out);
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn single_equalities_are_kept_as_is() {
        let cube = vec![c("a").eq(c("b"))];
        let lemma = LemmaRef::new(0, cube.clone(), Level(1), PobRef::new(SmtTerm::bool(true), Level(1)));
        assert_eq!(EqClassGeneralizer::new().apply(&lemma).expect("apply"), GenOutcome::Unchanged);
        assert_eq!(lemma.cube(), cube);
    }
}
