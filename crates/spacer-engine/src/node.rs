//! The lemma store and cluster registry of one predicate transformer.

use spacer_smt::terms::SmtTerm;

use crate::cluster::{Admission, LemmaCluster};
use crate::error::Result;
use crate::lemma::{LemmaRef, Level, PobRef};
use crate::oracle::{InductionOracle, InductiveCheck};

pub struct PredicateNode {
    name: String,
    lemmas: Vec<LemmaRef>,
    clusters: Vec<LemmaCluster>,
    oracle: Box<dyn InductionOracle>,
    next_lemma_id: u64,
}

impl PredicateNode {
    pub fn new(name: impl Into<String>, oracle: Box<dyn InductionOracle>) -> Self {
        Self {
            name: name.into(),
            lemmas: Vec::new(),
            clusters: Vec::new(),
            oracle,
            next_lemma_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a new lemma blocking `cube` at `level` on behalf of `pob`.
    pub fn add_lemma(&mut self, cube: Vec<SmtTerm>, level: Level, pob: &PobRef) -> LemmaRef {
        let lemma = LemmaRef::new(self.next_lemma_id, cube, level, pob.clone());
        self.next_lemma_id += 1;
        tracing::trace!(node = %self.name, %lemma, "new lemma");
        self.lemmas.push(lemma.clone());
        lemma
    }

    pub fn get_all_lemmas(&self) -> &[LemmaRef] {
        &self.lemmas
    }

    pub fn clusters(&self) -> &[LemmaCluster] {
        &self.clusters
    }

    /// A cluster that already holds `lemma`.
    pub fn get_cluster(&self, lemma: &LemmaRef) -> Option<&LemmaCluster> {
        self.clusters.iter().find(|c| c.contains(lemma))
    }

    /// The cluster for `pattern`, created on first request.
    pub fn mk_cluster(&mut self, pattern: SmtTerm) -> &mut LemmaCluster {
        let idx = match self.clusters.iter().position(|c| *c.pattern() == pattern) {
            Some(i) => i,
            None => {
                tracing::debug!(node = %self.name, %pattern, "new cluster");
                self.clusters.push(LemmaCluster::new(pattern));
                self.clusters.len() - 1
            }
        };
        &mut self.clusters[idx]
    }

    /// First cluster whose pattern matches `lemma` with numerals only.
    pub fn clstr_match(&self, lemma: &LemmaRef) -> Option<&LemmaCluster> {
        self.clusters.iter().find(|c| c.can_contain(lemma))
    }

    /// Offer `lemma` to every cluster that can hold it, with subsumption.
    pub fn add_to_cluster(&mut self, lemma: &LemmaRef) -> Vec<Admission> {
        self.clusters
            .iter_mut()
            .filter(|c| c.can_contain(lemma))
            .map(|c| c.add_lemma(lemma, true))
            .collect()
    }

    pub fn check_inductive(
        &mut self,
        level: Level,
        cube: &[SmtTerm],
        weakness: u32,
    ) -> Result<InductiveCheck> {
        self.oracle.check_inductive(level, cube, weakness)
    }
}

impl std::fmt::Debug for PredicateNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateNode")
            .field("name", &self.name)
            .field("lemmas", &self.lemmas.len())
            .field("clusters", &self.clusters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    struct Never;

    impl InductionOracle for Never {
        fn check_inductive(&mut self, level: Level, _: &[SmtTerm], _: u32) -> Result<InductiveCheck> {
            Ok(InductiveCheck::failed(level))
        }
    }

    struct Broken;

    impl InductionOracle for Broken {
        fn check_inductive(&mut self, _: Level, _: &[SmtTerm], _: u32) -> Result<InductiveCheck> {
            Err(EngineError::Solver("gone".into()))
        }
    }

    #[test]
    fn lemma_ids_are_sequential() {
        let mut node = PredicateNode::new("P", Box::new(Never));
        let pob = PobRef::new(SmtTerm::bool(true), Level(0));
        let a = node.add_lemma(vec![], Level(0), &pob);
        let b = node.add_lemma(vec![], Level(0), &pob);
        assert_eq!((a.id(), b.id()), (0, 1));
        assert_eq!(node.get_all_lemmas().len(), 2);
    }

    #[test]
    fn one_cluster_per_pattern() {
        let mut node = PredicateNode::new("P", Box::new(Never));
        let p = SmtTerm::int_const("x").le(SmtTerm::var(0, spacer_smt::sorts::SmtSort::Int));
        node.mk_cluster(p.clone());
        node.mk_cluster(p);
        assert_eq!(node.clusters().len(), 1);
    }

    #[test]
    fn oracle_errors_propagate() {
        let mut node = PredicateNode::new("P", Box::new(Broken));
        assert!(matches!(
            node.check_inductive(Level(1), &[], 0),
            Err(EngineError::Solver(_))
        ));
    }
}
