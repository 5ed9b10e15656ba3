//! Pattern-driven merges that need no convex closure.
//!
//! Each strategy reads the shape of the lemma's cluster pattern and rewrites
//! the matching literals of the lemma's normalized cube. Strategies are tried
//! in a fixed order and the first rewrite that the node still blocks wins.

use num::{BigRational, Signed, Zero};
use spacer_smt::terms::{mk_and, mk_not, SmtTerm};

use crate::error::Result;
use crate::generalizers::{GenEnv, GenOutcome};
use crate::lemma::LemmaRef;
use crate::normalize::normalize_literals;
use crate::oracle::{SatAnswer, SatOracle};
use crate::stats::{Statistics, Stopwatch};

/// `t REL s` with the relation mirrored, so that `REL'(s, t)` means the same.
fn flip(lit: &SmtTerm, lhs: SmtTerm, rhs: SmtTerm) -> Option<SmtTerm> {
    match lit {
        SmtTerm::Eq(..) => Some(lhs.eq(rhs)),
        SmtTerm::Le(..) => Some(lhs.ge(rhs)),
        SmtTerm::Lt(..) => Some(lhs.gt(rhs)),
        SmtTerm::Ge(..) => Some(lhs.le(rhs)),
        SmtTerm::Gt(..) => Some(lhs.lt(rhs)),
        _ => None,
    }
}

/// `(coefficient, atom)` of a monomial `k * t`, or of a bare `t`.
fn monomial(t: &SmtTerm) -> (Option<BigRational>, &SmtTerm) {
    match t {
        SmtTerm::Mul(k, a) => match k.as_numeral() {
            Some(k) => (Some(k), a.as_ref()),
            None => (None, t),
        },
        _ => (None, t),
    }
}

fn is_var_monomial(t: &SmtTerm) -> bool {
    matches!(t, SmtTerm::Mul(k, _) if matches!(k.as_ref(), SmtTerm::Var(..)))
}

/// `k1*t1 + k2*t2 REL c` with variable coefficients in the pattern and
/// same-signed numerals in the cube becomes `t1 + t2 REL 0`; the relation is
/// mirrored when both coefficients are negative.
fn monotonic_coefficient(pattern: &[SmtTerm], cube: &[SmtTerm]) -> Vec<Vec<SmtTerm>> {
    let mut out = Vec::new();
    for (i, (p, c)) in pattern.iter().zip(cube).enumerate() {
        let (Some((SmtTerm::Add(pargs), _)), Some((SmtTerm::Add(cargs), _))) =
            (p.relation_args(), c.relation_args())
        else {
            continue;
        };
        if pargs.len() != 2 || cargs.len() != 2 || !pargs.iter().all(is_var_monomial) {
            continue;
        }
        let (Some(k1), t1) = monomial(&cargs[0]) else { continue };
        let (Some(k2), t2) = monomial(&cargs[1]) else { continue };
        if k1.is_zero() || k2.is_zero() || k1.is_positive() != k2.is_positive() {
            continue;
        }
        let sum = t1.clone().add(t2.clone());
        let zero = SmtTerm::numeral(BigRational::zero(), &sum.sort());
        let lit = if k1.is_positive() {
            c.with_relation_args(sum, zero)
        } else {
            flip(c, sum, zero)
        };
        if let Some(lit) = lit {
            let mut cand = cube.to_vec();
            cand[i] = lit;
            out.push(cand);
        }
    }
    out
}

/// `t1 >= k1` and `t2 <= k2`, both with variable bounds in the pattern and
/// `k1 > k2` in the cube, become `t1 > t2`.
fn merge_halfspaces(pattern: &[SmtTerm], cube: &[SmtTerm]) -> Vec<Vec<SmtTerm>> {
    let var_bound = |p: &SmtTerm| matches!(p.relation_args(), Some((_, SmtTerm::Var(..))));
    let mut out = Vec::new();
    for (i, (pi, ci)) in pattern.iter().zip(cube).enumerate() {
        let (SmtTerm::Ge(t1, k1), true) = (ci, var_bound(pi)) else {
            continue;
        };
        let Some(k1) = k1.as_numeral() else { continue };
        for (j, (pj, cj)) in pattern.iter().zip(cube).enumerate() {
            let (SmtTerm::Le(t2, k2), true) = (cj, var_bound(pj)) else {
                continue;
            };
            let Some(k2) = k2.as_numeral() else { continue };
            if i == j || t1 == t2 || k1 <= k2 {
                continue;
            }
            let mut cand: Vec<SmtTerm> = cube
                .iter()
                .enumerate()
                .filter(|(n, _)| *n != i && *n != j)
                .map(|(_, l)| l.clone())
                .collect();
            cand.push(t1.as_ref().clone().gt(t2.as_ref().clone()));
            out.push(cand);
        }
    }
    out
}

/// `t <= k` with a variable bound and a ground `t` becomes `t = 0`.
fn monotonic_k(pattern: &[SmtTerm], cube: &[SmtTerm]) -> Vec<Vec<SmtTerm>> {
    let mut out = Vec::new();
    for (i, (p, c)) in pattern.iter().zip(cube).enumerate() {
        let (SmtTerm::Le(plhs, k), SmtTerm::Le(lhs, _)) = (p, c) else {
            continue;
        };
        if !matches!(k.as_ref(), SmtTerm::Var(..)) || !plhs.is_ground() {
            continue;
        }
        let zero = SmtTerm::numeral(BigRational::zero(), &lhs.sort());
        let mut cand = cube.to_vec();
        cand[i] = lhs.as_ref().clone().eq(zero);
        out.push(cand);
    }
    out
}

/// Mutual implication, decided by `sat`. Undecided counts as different.
fn semantically_equal(sat: &mut dyn SatOracle, a: &SmtTerm, b: &SmtTerm) -> Result<bool> {
    if a == b {
        return Ok(true);
    }
    for (x, y) in [(a, b), (b, a)] {
        let q = [x.clone(), mk_not(y.clone())];
        if sat.is_satisfiable(&q)? != SatAnswer::Unsat {
            return Ok(false);
        }
    }
    Ok(true)
}

type Strategy = fn(&[SmtTerm], &[SmtTerm]) -> Vec<Vec<SmtTerm>>;

const STRATEGIES: [(&str, Strategy); 3] = [
    ("monotonic_coefficient", monotonic_coefficient),
    ("merge_halfspaces", merge_halfspaces),
    ("monotonic_k", monotonic_k),
];

#[derive(Debug, Default)]
pub struct PatternMergeGeneralizer {
    count: u32,
    duplicates: u32,
    watch: Stopwatch,
}

impl PatternMergeGeneralizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, env: &mut GenEnv<'_>, lemma: &LemmaRef) -> Result<GenOutcome> {
        let Some(pattern) = env.node.clstr_match(lemma).map(|c| c.pattern().clone()) else {
            return Ok(GenOutcome::Unchanged);
        };
        let _watch = self.watch.scoped();
        let plits = pattern.flatten_and();
        let cube = normalize_literals(&lemma.cube());
        if plits.len() != cube.len() {
            return Ok(GenOutcome::Unchanged);
        }
        let original = mk_and(cube.clone());
        let others: Vec<SmtTerm> = env
            .node
            .get_all_lemmas()
            .iter()
            .filter(|l| !l.ptr_eq(lemma))
            .map(LemmaRef::cube_term)
            .collect();

        for (name, strategy) in STRATEGIES {
            for cand in strategy(&plits, &cube) {
                let term = mk_and(cand.clone());
                if term == original {
                    continue;
                }
                let mut duplicate = false;
                for other in &others {
                    if semantically_equal(&mut *env.sat, &term, other)? {
                        duplicate = true;
                        break;
                    }
                }
                if duplicate {
                    tracing::trace!(strategy = name, candidate = %term, "candidate duplicates a lemma");
                    self.duplicates += 1;
                    continue;
                }
                let res = env.node.check_inductive(lemma.level(), &cand, lemma.weakness())?;
                if res.inductive {
                    tracing::debug!(strategy = name, %lemma, candidate = %term, "pattern merge");
                    lemma.update_cube(cand);
                    lemma.set_level(res.level);
                    self.count += 1;
                    return Ok(GenOutcome::Updated);
                }
            }
        }
        Ok(GenOutcome::Unchanged)
    }

    pub fn collect_statistics(&self, st: &mut Statistics) {
        st.update("time.spacer.solve.reach.gen.pattern_merge", self.watch.seconds());
        st.update("SPACER pattern merge", self.count);
        st.update("SPACER pattern merge duplicates", self.duplicates);
    }
}
