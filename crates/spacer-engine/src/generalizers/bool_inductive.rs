//! Greedy literal dropping.

use spacer_smt::terms::SmtTerm;

use crate::error::Result;
use crate::generalizers::GenOutcome;
use crate::lemma::LemmaRef;
use crate::node::PredicateNode;
use crate::stats::{Statistics, Stopwatch};

#[derive(Debug, Default)]
struct Stats {
    count: u32,
    num_failures: u32,
}

/// Drops cube literals one at a time while the cube stays blocked. A
/// literal whose removal fails is kept for good; after a success the scan
/// resumes at the first literal not yet kept. Gives up after more than
/// `failure_limit` consecutive failures (zero means never).
#[derive(Debug, Default)]
pub struct BoolInductiveGeneralizer {
    failure_limit: u32,
    st: Stats,
    watch: Stopwatch,
}

impl BoolInductiveGeneralizer {
    pub fn new(failure_limit: u32) -> Self {
        Self {
            failure_limit,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, node: &mut PredicateNode, lemma: &LemmaRef) -> Result<GenOutcome> {
        let mut cube = lemma.cube();
        if cube.len() <= 1 {
            return Ok(GenOutcome::Unchanged);
        }
        let _watch = self.watch.scoped();

        let old_size = cube.len();
        let weakness = lemma.weakness();
        let mut uses_level = lemma.level();
        let mut kept: Vec<SmtTerm> = Vec::new();
        let mut failures = 0;
        let mut i = 0;

        while i < cube.len()
            && cube.len() > 1
            && (self.failure_limit == 0 || failures <= self.failure_limit)
        {
            let mut candidate = cube.clone();
            let lit = candidate.remove(i);
            let res = node.check_inductive(lemma.level(), &candidate, weakness)?;
            if res.inductive {
                uses_level = res.level;
                cube = match res.core {
                    Some(core) if !core.is_empty() && core.iter().all(|l| candidate.contains(l)) => core,
                    _ => candidate,
                };
                failures = 0;
                i = cube
                    .iter()
                    .position(|l| !kept.contains(l))
                    .unwrap_or(cube.len());
            } else {
                tracing::trace!(%lit, "literal is needed");
                kept.push(lit);
                failures += 1;
                self.st.num_failures += 1;
                i += 1;
            }
        }

        if cube.len() < old_size {
            tracing::debug!(%lemma, from = old_size, to = cube.len(), "bool inductive generalization");
            lemma.update_cube(cube);
            lemma.set_level(uses_level);
            self.st.count += 1;
            return Ok(GenOutcome::Updated);
        }
        Ok(GenOutcome::Unchanged)
    }

    pub fn collect_statistics(&self, st: &mut Statistics) {
        st.update("time.spacer.solve.reach.gen.bool_ind", self.watch.seconds());
        st.update("bool inductive gen", self.st.count);
        st.update("bool inductive gen failures", self.st.num_failures);
    }
}
