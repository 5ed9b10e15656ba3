//! Replacing literals by array disequalities they imply.

use spacer_smt::sorts::SmtSort;
use spacer_smt::terms::{mk_not, SmtTerm};

use crate::error::Result;
use crate::generalizers::{GenEnv, GenOutcome};
use crate::lemma::LemmaRef;
use crate::oracle::{SatAnswer, SolverScope};
use crate::stats::{Statistics, Stopwatch};

/// Array constants of the first array sort occurring in `cube`.
fn array_consts(cube: &[SmtTerm]) -> Vec<SmtTerm> {
    let mut sort: Option<SmtSort> = None;
    let mut out = Vec::new();
    for lit in cube {
        for (name, s) in lit.free_consts() {
            if !s.is_array() {
                continue;
            }
            let first = sort.get_or_insert_with(|| s.clone());
            if *first == s {
                let c = SmtTerm::constant(name, s);
                if !out.contains(&c) {
                    out.push(c);
                }
            }
        }
    }
    out
}

/// For lemmas over a handful of arrays of one sort: every literal that
/// implies `a != b` for some pair of those arrays is replaced by that
/// disequality, and the result is kept if still blocked.
#[derive(Debug, Default)]
pub struct ArrayEqGeneralizer {
    min_consts: usize,
    max_consts: usize,
    count: u32,
    failures: u32,
    watch: Stopwatch,
}

impl ArrayEqGeneralizer {
    pub fn new(min_consts: usize, max_consts: usize) -> Self {
        Self {
            min_consts,
            max_consts,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, env: &mut GenEnv<'_>, lemma: &LemmaRef) -> Result<GenOutcome> {
        let cube = lemma.cube();
        let arrays = array_consts(&cube);
        if arrays.len() < self.min_consts || arrays.len() > self.max_consts {
            return Ok(GenOutcome::Unchanged);
        }
        let _watch = self.watch.scoped();

        let mut eqs = Vec::new();
        for (i, a) in arrays.iter().enumerate() {
            for b in &arrays[i + 1..] {
                eqs.push(a.clone().eq(b.clone()));
            }
        }

        let mut out = Vec::with_capacity(cube.len());
        let mut changed = false;
        for lit in &cube {
            let mut replacement = lit.clone();
            let mut scope = SolverScope::new(&mut *env.sat)?;
            scope.assert(lit)?;
            for eq in &eqs {
                let mut inner = SolverScope::new(&mut *scope)?;
                inner.assert(eq)?;
                if inner.check()? == SatAnswer::Unsat {
                    replacement = mk_not(eq.clone());
                    changed = true;
                    break;
                }
            }
            drop(scope);
            out.push(replacement);
        }
        if !changed {
            return Ok(GenOutcome::Unchanged);
        }
        out.dedup();

        let res = env.node.check_inductive(lemma.level(), &out, lemma.weakness())?;
        if !res.inductive {
            tracing::debug!(%lemma, "array disequality generalization is not blocked");
            self.failures += 1;
            return Ok(GenOutcome::Unchanged);
        }
        tracing::debug!(%lemma, "array disequality generalization");
        lemma.update_cube(out);
        lemma.set_level(res.level);
        self.count += 1;
        Ok(GenOutcome::Updated)
    }

    pub fn collect_statistics(&self, st: &mut Statistics) {
        st.update("time.spacer.solve.reach.gen.array_eq", self.watch.seconds());
        st.update("SPACER array eq gen", self.count);
        st.update("SPACER array eq gen failures", self.failures);
    }
}
