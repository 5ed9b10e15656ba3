//! Lemma generalizers and the pipeline that runs them.
//!
//! Every pass has the same shape: given the environment of the owning node
//! and a lemma, possibly replace the lemma's cube (and level) and report
//! what happened. The set of passes is closed; [`GeneralizerPipeline`] runs
//! them in the configured order.

pub mod array_eq;
pub mod bool_inductive;
pub mod eq_class;
pub mod merge;
pub mod pattern_merge;
pub mod sanity;
pub mod unsat_core;

use spacer_smt::context::TermContext;
use spacer_smt::mbp::Projector;

use crate::cluster_finder::LemmaClusterFinder;
use crate::config::{GeneralizerConfig, GeneralizerKind};
use crate::error::Result;
use crate::lemma::LemmaRef;
use crate::node::PredicateNode;
use crate::oracle::SatOracle;
use crate::stats::Statistics;

pub use array_eq::ArrayEqGeneralizer;
pub use bool_inductive::BoolInductiveGeneralizer;
pub use eq_class::EqClassGeneralizer;
pub use merge::MergeGeneralizer;
pub use pattern_merge::PatternMergeGeneralizer;
pub use sanity::LemmaSanityChecker;
pub use unsat_core::UnsatCoreGeneralizer;

/// Everything a generalizer may touch while processing one lemma.
pub struct GenEnv<'a> {
    pub terms: &'a mut TermContext,
    pub node: &'a mut PredicateNode,
    pub sat: &'a mut dyn SatOracle,
    pub projector: &'a mut dyn Projector,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenOutcome {
    /// The lemma's cube or level was replaced.
    Updated,
    Unchanged,
    /// An oracle could not decide; nothing was changed.
    Skipped(String),
}

pub enum Generalizer {
    BoolInductive(BoolInductiveGeneralizer),
    UnsatCore(UnsatCoreGeneralizer),
    ArrayEq(ArrayEqGeneralizer),
    EqClass(EqClassGeneralizer),
    Cluster(LemmaClusterFinder),
    Merge(PatternMergeGeneralizer),
    ClusterMerge(MergeGeneralizer),
    SanityCheck(LemmaSanityChecker),
}

impl Generalizer {
    pub fn from_kind(kind: GeneralizerKind, cfg: &GeneralizerConfig) -> Self {
        match kind {
            GeneralizerKind::BoolInductive => {
                Generalizer::BoolInductive(BoolInductiveGeneralizer::new(cfg.bool_failure_limit))
            }
            GeneralizerKind::UnsatCore => Generalizer::UnsatCore(UnsatCoreGeneralizer::new()),
            GeneralizerKind::ArrayEq => Generalizer::ArrayEq(ArrayEqGeneralizer::new(
                cfg.array_eq_min_consts,
                cfg.array_eq_max_consts,
            )),
            GeneralizerKind::EqClass => Generalizer::EqClass(EqClassGeneralizer::new()),
            GeneralizerKind::Cluster => Generalizer::Cluster(LemmaClusterFinder::new()),
            GeneralizerKind::Merge => Generalizer::Merge(PatternMergeGeneralizer::new()),
            GeneralizerKind::ClusterMerge => Generalizer::ClusterMerge(MergeGeneralizer::from_config(cfg)),
            GeneralizerKind::SanityCheck => Generalizer::SanityCheck(LemmaSanityChecker::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Generalizer::BoolInductive(_) => "bool_inductive",
            Generalizer::UnsatCore(_) => "unsat_core",
            Generalizer::ArrayEq(_) => "array_eq",
            Generalizer::EqClass(_) => "eq_class",
            Generalizer::Cluster(_) => "cluster",
            Generalizer::Merge(_) => "merge",
            Generalizer::ClusterMerge(_) => "cluster_merge",
            Generalizer::SanityCheck(_) => "sanity_check",
        }
    }

    pub fn apply(&mut self, env: &mut GenEnv<'_>, lemma: &LemmaRef) -> Result<GenOutcome> {
        match self {
            Generalizer::BoolInductive(g) => g.apply(env.node, lemma),
            Generalizer::UnsatCore(g) => g.apply(env.node, lemma),
            Generalizer::ArrayEq(g) => g.apply(env, lemma),
            Generalizer::EqClass(g) => g.apply(lemma),
            Generalizer::Cluster(finder) => {
                let outcome = finder.cluster(env.node, lemma)?;
                tracing::debug!(%lemma, ?outcome, "clustering");
                Ok(GenOutcome::Unchanged)
            }
            Generalizer::Merge(g) => g.apply(env, lemma),
            Generalizer::ClusterMerge(g) => g.apply(env, lemma),
            Generalizer::SanityCheck(g) => g.apply(env.node, lemma),
        }
    }

    pub fn collect_statistics(&self, st: &mut Statistics) {
        match self {
            Generalizer::BoolInductive(g) => g.collect_statistics(st),
            Generalizer::UnsatCore(g) => g.collect_statistics(st),
            Generalizer::ArrayEq(g) => g.collect_statistics(st),
            Generalizer::EqClass(g) => g.collect_statistics(st),
            Generalizer::Cluster(g) => g.collect_statistics(st),
            Generalizer::Merge(g) => g.collect_statistics(st),
            Generalizer::ClusterMerge(g) => g.collect_statistics(st),
            Generalizer::SanityCheck(_) => {}
        }
    }
}

/// What a pipeline run did to one lemma.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub updated_by: Vec<&'static str>,
    pub skipped: Vec<(&'static str, String)>,
}

pub struct GeneralizerPipeline {
    passes: Vec<Generalizer>,
}

impl GeneralizerPipeline {
    pub fn from_config(cfg: &GeneralizerConfig) -> Result<Self> {
        cfg.validate()?;
        let passes = cfg
            .pipeline
            .iter()
            .map(|kind| Generalizer::from_kind(*kind, cfg))
            .collect();
        Ok(Self { passes })
    }

    pub fn passes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(Generalizer::name)
    }

    pub fn run(&mut self, env: &mut GenEnv<'_>, lemma: &LemmaRef) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        for pass in &mut self.passes {
            match pass.apply(env, lemma)? {
                GenOutcome::Updated => {
                    tracing::debug!(pass = pass.name(), %lemma, "lemma updated");
                    report.updated_by.push(pass.name());
                }
                GenOutcome::Unchanged => {}
                GenOutcome::Skipped(reason) => {
                    tracing::debug!(pass = pass.name(), %reason, "pass skipped");
                    report.skipped.push((pass.name(), reason));
                }
            }
        }
        Ok(report)
    }

    pub fn collect_statistics(&self, st: &mut Statistics) {
        for pass in &self.passes {
            pass.collect_statistics(st);
        }
    }
}
