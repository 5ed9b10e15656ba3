//! Discovery of lemma clusters.
//!
//! A new lemma either joins a cluster whose pattern it already matches, or
//! is anti-unified with every neighbour at its node to find patterns general
//! enough to cover all of them; each such pattern becomes a cluster.

use spacer_smt::terms::SmtTerm;

use crate::anti_unify::{anti_unify, are_neighbours};
use crate::cluster::Admission;
use crate::error::Result;
use crate::lemma::LemmaRef;
use crate::matcher::sem_match;
use crate::node::PredicateNode;
use crate::normalize::normalize_cube;
use crate::stats::{Statistics, Stopwatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoNeighbours,
    /// No pairwise pattern matches every neighbour.
    NoGeneralPattern,
    /// A neighbour anti-unified to a ground pattern.
    RepeatedLemma,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterOutcome {
    AlreadyClustered,
    /// The lemma matched existing clusters; `added` of them accepted it and
    /// `subsumed` members were dropped from them.
    MatchedExisting { added: usize, subsumed: Vec<LemmaRef> },
    FormedNewClusters(usize),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternSearch {
    Repeated,
    Found(Vec<SmtTerm>),
}

/// Pairwise patterns of `cube` with each neighbour that match every
/// neighbour positively.
pub fn anti_unify_n_intrp(cube: &SmtTerm, neighbours: &[SmtTerm]) -> PatternSearch {
    let mut patterns: Vec<SmtTerm> = Vec::new();
    for n in neighbours {
        let au = anti_unify(cube, n);
        if au.num_vars() == 0 {
            tracing::debug!(%cube, "repeated lemma while searching for patterns");
            return PatternSearch::Repeated;
        }
        if !patterns.contains(&au.pattern) {
            patterns.push(au.pattern);
        }
    }
    patterns.retain(|p| {
        neighbours
            .iter()
            .all(|n| sem_match(p, n).is_some_and(|m| m.positive))
    });
    PatternSearch::Found(patterns)
}

fn subsumed_lemmas(admissions: Vec<Admission>) -> Vec<LemmaRef> {
    let mut out: Vec<LemmaRef> = Vec::new();
    for li in admissions.into_iter().flat_map(|a| a.subsumed) {
        if !out.contains(li.lemma()) {
            out.push(li.lemma().clone());
        }
    }
    out
}

#[derive(Debug, Default)]
pub struct LemmaClusterFinder {
    watch: Stopwatch,
}

impl LemmaClusterFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cluster(&mut self, node: &mut PredicateNode, lemma: &LemmaRef) -> Result<ClusterOutcome> {
        let _watch = self.watch.scoped();

        if node.get_cluster(lemma).is_some() {
            return Ok(ClusterOutcome::AlreadyClustered);
        }
        if node.clstr_match(lemma).is_some() {
            let admissions = node.add_to_cluster(lemma);
            let added = admissions.iter().filter(|a| a.added).count();
            let subsumed = subsumed_lemmas(admissions);
            tracing::debug!(%lemma, added, subsumed = subsumed.len(), "lemma joined existing clusters");
            return Ok(ClusterOutcome::MatchedExisting { added, subsumed });
        }

        let cube = normalize_cube(&lemma.cube());
        let mut neighbours: Vec<LemmaRef> = Vec::new();
        let mut neighbour_cubes: Vec<SmtTerm> = Vec::new();
        for other in node.get_all_lemmas().to_vec() {
            if other == *lemma {
                continue;
            }
            let other_cube = normalize_cube(&other.cube());
            if other_cube != cube && are_neighbours(&cube, &other_cube)? {
                neighbours.push(other);
                neighbour_cubes.push(other_cube);
            }
        }
        if neighbours.is_empty() {
            return Ok(ClusterOutcome::Rejected(RejectReason::NoNeighbours));
        }

        let patterns = match anti_unify_n_intrp(&cube, &neighbour_cubes) {
            PatternSearch::Repeated => return Ok(ClusterOutcome::Rejected(RejectReason::RepeatedLemma)),
            PatternSearch::Found(p) if p.is_empty() => {
                return Ok(ClusterOutcome::Rejected(RejectReason::NoGeneralPattern))
            }
            PatternSearch::Found(p) => p,
        };

        let formed = patterns.len();
        for pattern in patterns {
            let cluster = node.mk_cluster(pattern);
            for n in &neighbours {
                cluster.add_lemma(n, false);
            }
            let admission = cluster.add_lemma(lemma, true);
            tracing::debug!(
                pattern = %cluster.pattern(),
                size = cluster.size(),
                subsumed = admission.subsumed.len(),
                "formed cluster"
            );
        }
        Ok(ClusterOutcome::FormedNewClusters(formed))
    }

    pub fn collect_statistics(&self, st: &mut Statistics) {
        st.update("time.spacer.solve.reach.cluster", self.watch.seconds());
    }
}
