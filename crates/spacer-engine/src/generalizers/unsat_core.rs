//! Shrinking a lemma to the oracle's unsat core.

use crate::error::Result;
use crate::generalizers::GenOutcome;
use crate::lemma::LemmaRef;
use crate::node::PredicateNode;
use crate::stats::{Statistics, Stopwatch};

#[derive(Debug, Default)]
pub struct UnsatCoreGeneralizer {
    count: u32,
    failures: u32,
    watch: Stopwatch,
}

impl UnsatCoreGeneralizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, node: &mut PredicateNode, lemma: &LemmaRef) -> Result<GenOutcome> {
        let _watch = self.watch.scoped();
        let cube = lemma.cube();
        let res = node.check_inductive(lemma.level(), &cube, lemma.weakness())?;
        if !res.inductive {
            tracing::warn!(%lemma, "lemma is not blocked at its own level");
            self.failures += 1;
            return Ok(GenOutcome::Unchanged);
        }
        match res.core {
            Some(core) if core.len() < cube.len() => {
                tracing::debug!(%lemma, from = cube.len(), to = core.len(), "unsat core generalization");
                lemma.update_cube(core);
                lemma.set_level(res.level);
                self.count += 1;
                Ok(GenOutcome::Updated)
            }
            _ => Ok(GenOutcome::Unchanged),
        }
    }

    pub fn collect_statistics(&self, st: &mut Statistics) {
        st.update("time.spacer.solve.reach.gen.unsat_core", self.watch.seconds());
        st.update("gen.unsat_core.cnt", self.count);
        st.update("gen.unsat_core.fail", self.failures);
    }
}
