//! Debug check that a lemma is still blocked at its own level.

use crate::error::{EngineError, Result};
use crate::generalizers::GenOutcome;
use crate::lemma::LemmaRef;
use crate::node::PredicateNode;

/// Fails loudly when a lemma is not blocked at its own level. Meant to run
/// last in debugging pipelines.
#[derive(Debug, Default)]
pub struct LemmaSanityChecker;

impl LemmaSanityChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&mut self, node: &mut PredicateNode, lemma: &LemmaRef) -> Result<GenOutcome> {
        let res = node.check_inductive(lemma.level(), &lemma.cube(), lemma.weakness())?;
        if !res.inductive {
            return Err(EngineError::Invariant(format!(
                "{lemma} is not blocked at level {}",
                lemma.level()
            )));
        }
        Ok(GenOutcome::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lemma::{Level, PobRef};
    use crate::oracle::ReachabilityOracle;
    use spacer_smt::backends::fourier_motzkin::FourierMotzkinSolver;
    use spacer_smt::terms::SmtTerm;

    #[test]
    fn flags_reachable_lemma() {
        let x = SmtTerm::int_const("x");
        let oracle = ReachabilityOracle::new(FourierMotzkinSolver::new(), x.clone().eq(SmtTerm::int(0)));
        let mut node = PredicateNode::new("P", Box::new(oracle));
        let pob = PobRef::new(SmtTerm::bool(true), Level(1));
        let good = node.add_lemma(vec![x.clone().ge(SmtTerm::int(1))], Level(1), &pob);
        let bad = node.add_lemma(vec![x.ge(SmtTerm::int(0))], Level(1), &pob);
        let mut checker = LemmaSanityChecker::new();
        assert_eq!(checker.apply(&mut node, &good).expect("sane"), GenOutcome::Unchanged);
        assert!(matches!(checker.apply(&mut node, &bad), Err(EngineError::Invariant(_))));
    }
}
