//! Lemma clusters: lemmas that differ from a shared pattern only in their
//! numeric constants.

use spacer_smt::terms::SmtTerm;

use crate::anti_unify::Substitution;
use crate::lemma::LemmaRef;
use crate::matcher::sem_match;
use crate::normalize::normalize_cube;
use crate::subsume::subsumed_indices;

/// A cluster member and the numerals it instantiates the pattern with.
#[derive(Debug, Clone)]
pub struct LemmaInfo {
    lemma: LemmaRef,
    sub: Substitution,
}

impl LemmaInfo {
    pub fn new(lemma: LemmaRef, sub: Substitution) -> Self {
        Self { lemma, sub }
    }

    pub fn lemma(&self) -> &LemmaRef {
        &self.lemma
    }

    pub fn sub(&self) -> &Substitution {
        &self.sub
    }
}

/// What offering a lemma to a cluster did.
#[derive(Debug, Clone, Default)]
pub struct Admission {
    /// The lemma is a new member.
    pub added: bool,
    /// Members dropped by the subsumption pass. May include the offered
    /// lemma itself.
    pub subsumed: Vec<LemmaInfo>,
}

#[derive(Debug, Clone)]
pub struct LemmaCluster {
    pattern: SmtTerm,
    lemmas: Vec<LemmaInfo>,
}

impl LemmaCluster {
    pub fn new(pattern: SmtTerm) -> Self {
        Self {
            pattern,
            lemmas: Vec::new(),
        }
    }

    pub fn pattern(&self) -> &SmtTerm {
        &self.pattern
    }

    pub fn lemmas(&self) -> &[LemmaInfo] {
        &self.lemmas
    }

    pub fn size(&self) -> usize {
        self.lemmas.len()
    }

    /// Substitution instantiating the pattern to the normalized `cube`, if
    /// every pattern variable is bound to a numeral.
    pub fn match_cube(&self, cube: &[SmtTerm]) -> Option<Substitution> {
        let m = sem_match(&self.pattern, &normalize_cube(cube))?;
        let complete = m.sub.len() == self.pattern.var_ids().len();
        (m.positive && complete && m.sub.all_numerals()).then_some(m.sub)
    }

    pub fn can_contain(&self, lemma: &LemmaRef) -> bool {
        self.match_cube(&lemma.cube()).is_some()
    }

    pub fn contains(&self, lemma: &LemmaRef) -> bool {
        self.lemmas.iter().any(|li| li.lemma == *lemma)
    }

    /// Admit `lemma`. It is not added if it does not match the pattern, is
    /// already a member, or is itself removed by the subsumption pass.
    pub fn add_lemma(&mut self, lemma: &LemmaRef, subsume: bool) -> Admission {
        let Some(sub) = self.match_cube(&lemma.cube()) else {
            tracing::trace!(%lemma, pattern = %self.pattern, "lemma does not match cluster pattern");
            return Admission::default();
        };
        if self.contains(lemma) {
            return Admission::default();
        }
        tracing::debug!(%lemma, pattern = %self.pattern, size = self.lemmas.len() + 1, "adding lemma to cluster");
        self.lemmas.push(LemmaInfo::new(lemma.clone(), sub));
        let subsumed = if subsume { self.rm_subsumed() } else { Vec::new() };
        Admission {
            added: !subsumed.iter().any(|li| li.lemma == *lemma),
            subsumed,
        }
    }

    /// Drop members whose cube implies another member's cube and return
    /// them.
    pub fn rm_subsumed(&mut self) -> Vec<LemmaInfo> {
        if self.lemmas.len() <= 1 {
            return Vec::new();
        }
        let cubes: Vec<Vec<SmtTerm>> = self.lemmas.iter().map(|li| li.lemma.cube()).collect();
        let drop = subsumed_indices(&cubes);
        if drop.is_empty() {
            return Vec::new();
        }
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.lemmas)
            .into_iter()
            .enumerate()
            .partition(|(i, _)| drop.contains(i));
        self.lemmas = kept.into_iter().map(|(_, li)| li).collect();
        let removed: Vec<LemmaInfo> = removed.into_iter().map(|(_, li)| li).collect();
        for li in &removed {
            tracing::debug!(lemma = %li.lemma, "subsumed lemma removed from cluster");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lemma::{Level, PobRef};
    use spacer_smt::sorts::SmtSort;

    fn x() -> SmtTerm {
        SmtTerm::int_const("x")
    }
    fn y() -> SmtTerm {
        SmtTerm::int_const("y")
    }
    fn v(id: u32) -> SmtTerm {
        SmtTerm::var(id, SmtSort::Int)
    }

    fn lemma(id: u64, cube: Vec<SmtTerm>) -> LemmaRef {
        LemmaRef::new(id, cube, Level(1), PobRef::new(SmtTerm::bool(true), Level(1)))
    }

    // Conjuncts in normalized order: equalities sort before bounds.
    fn pattern() -> SmtTerm {
        SmtTerm::and(vec![y().eq(v(1)), x().le(v(0))])
    }

    #[test]
    fn admits_matching_lemmas_once() {
        let mut c = LemmaCluster::new(pattern());
        let l = lemma(0, vec![y().eq(SmtTerm::int(2)), x().le(SmtTerm::int(1))]);
        assert!(c.add_lemma(&l, false).added);
        assert!(!c.add_lemma(&l, false).added);
        assert_eq!(c.size(), 1);
        assert_eq!(c.lemmas()[0].sub().get(1), Some(&SmtTerm::int(2)));
    }

    #[test]
    fn rejects_non_numeral_bindings() {
        let mut c = LemmaCluster::new(pattern());
        let l = lemma(0, vec![x().le(y()), y().eq(SmtTerm::int(2))]);
        assert!(!c.add_lemma(&l, false).added);
        assert_eq!(c.size(), 0);
    }

    #[test]
    fn subsumed_new_lemma_reports_failure() {
        let mut c = LemmaCluster::new(SmtTerm::and(vec![x().le(v(0)), y().le(v(1))]));
        let general = lemma(0, vec![x().le(SmtTerm::int(3)), y().le(SmtTerm::int(4))]);
        let specific = lemma(1, vec![x().le(SmtTerm::int(1)), y().le(SmtTerm::int(2))]);
        assert!(c.add_lemma(&general, true).added);
        let admission = c.add_lemma(&specific, true);
        assert!(!admission.added);
        assert_eq!(admission.subsumed.len(), 1);
        assert_eq!(admission.subsumed[0].lemma(), &specific);
        assert_eq!(c.size(), 1);
        assert!(c.contains(&general));
    }

    #[test]
    fn subsumption_keeps_incomparable_members() {
        let mut c = LemmaCluster::new(pattern());
        let a = lemma(0, vec![x().le(SmtTerm::int(1)), y().eq(SmtTerm::int(2))]);
        let b = lemma(1, vec![x().le(SmtTerm::int(3)), y().eq(SmtTerm::int(4))]);
        assert!(c.add_lemma(&a, true).added);
        let admission = c.add_lemma(&b, true);
        assert!(admission.added);
        assert!(admission.subsumed.is_empty());
        assert!(c.rm_subsumed().is_empty());
        assert_eq!(c.size(), 2);
    }
}
