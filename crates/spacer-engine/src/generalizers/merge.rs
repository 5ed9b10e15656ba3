//! Merging a cluster of lemmas into the convex closure of their constants.
//!
//! The numerals each member substitutes into the cluster pattern are points;
//! the closure of those points, conjoined with the pattern and projected onto
//! the lemma's own constants, is a single cube that covers every member. The
//! cube replaces the lemma when the node still blocks it. Bounds of the
//! merged cube may then be widened to a few canonical constants.

use std::collections::{BTreeMap, HashMap};

use num::{BigInt, BigRational};
use spacer_smt::sorts::SmtSort;
use spacer_smt::terms::{mk_and, mk_not, mk_or, SmtTerm};

use crate::arith_norm;
use crate::config::GeneralizerConfig;
use crate::convex_closure::ConvexClosure;
use crate::error::{EngineError, Result};
use crate::generalizers::{GenEnv, GenOutcome};
use crate::lemma::{LemmaRef, Level};
use crate::node::PredicateNode;
use crate::oracle::SatAnswer;
use crate::stats::{Statistics, Stopwatch};

/// A product of a pattern variable with anything but a numeral.
pub fn has_nonlinear_var_mul(pattern: &SmtTerm) -> bool {
    let is_var = |t: &SmtTerm| matches!(t, SmtTerm::Var(..));
    pattern.any(&|t| match t {
        SmtTerm::Mul(a, b) => (is_var(a) && !b.is_numeral()) || (is_var(b) && !a.is_numeral()),
        _ => false,
    })
}

fn var_sorts(pattern: &SmtTerm) -> BTreeMap<u32, SmtSort> {
    let mut out = BTreeMap::new();
    pattern.visit(&mut |t| {
        if let SmtTerm::Var(id, sort) = t {
            out.entry(*id).or_insert_with(|| sort.clone());
        }
    });
    out
}

/// Whether replacing the constant `val` of `lit` by `n` weakens the
/// literal's negation, i.e. makes the lemma more general.
pub fn should_apply(lit: &SmtTerm, val: &BigInt, n: &BigInt) -> bool {
    if val == n {
        return false;
    }
    match lit {
        SmtTerm::Not(inner) => !should_apply(inner, val, n),
        SmtTerm::Eq(..) => true,
        SmtTerm::Le(..) | SmtTerm::Lt(..) => n > val,
        SmtTerm::Ge(..) | SmtTerm::Gt(..) => n < val,
        _ => false,
    }
}

/// `t <= k` or `t >= k` with an uninterpreted `t` and an integer `k`. A
/// lower bound in linear normal form, `(* -1 t) <= -k`, is read back as
/// `t >= k`.
pub fn as_bound(lit: &SmtTerm) -> Option<SmtTerm> {
    let (SmtTerm::Le(lhs, rhs) | SmtTerm::Ge(lhs, rhs)) = lit else {
        return None;
    };
    let SmtTerm::IntLit(k) = rhs.as_ref() else {
        return None;
    };
    if lhs.is_uninterp() {
        return Some(lit.clone());
    }
    let negated = match lhs.as_ref() {
        SmtTerm::Mul(c, t) if c.as_integer() == Some(BigInt::from(-1)) => t.as_ref(),
        SmtTerm::Neg(t) => t.as_ref(),
        _ => return None,
    };
    if !negated.is_uninterp() {
        return None;
    }
    let k = SmtTerm::int_big(-k);
    Some(match lit {
        SmtTerm::Le(..) => negated.clone().ge(k),
        _ => negated.clone().le(k),
    })
}

#[derive(Debug, Default)]
struct Stats {
    wide_attempts: u32,
    wide_success: u32,
    merged: u32,
}

#[derive(Debug)]
pub struct MergeGeneralizer {
    lattice_stride: bool,
    widen_constants: Vec<BigInt>,
    conj_threshold: u32,
    st: Stats,
    merge_watch: Stopwatch,
    wide_watch: Stopwatch,
}

impl MergeGeneralizer {
    pub fn from_config(cfg: &GeneralizerConfig) -> Self {
        Self {
            lattice_stride: cfg.lattice_stride,
            widen_constants: cfg.widen_constants.iter().map(|&n| BigInt::from(n)).collect(),
            conj_threshold: cfg.merge_conjecture_threshold,
            st: Stats::default(),
            merge_watch: Stopwatch::new(),
            wide_watch: Stopwatch::new(),
        }
    }

    pub fn apply(&mut self, env: &mut GenEnv<'_>, lemma: &LemmaRef) -> Result<GenOutcome> {
        let outcome = {
            let _watch = self.merge_watch.scoped();
            self.core(env, lemma)?
        };
        if outcome == GenOutcome::Updated {
            self.st.merged += 1;
            if lemma.pob().widen() {
                self.widen(env.node, lemma)?;
            }
        }
        Ok(outcome)
    }

    fn core(&mut self, env: &mut GenEnv<'_>, lemma: &LemmaRef) -> Result<GenOutcome> {
        let Some(shared) = env.node.clstr_match(lemma) else {
            return Ok(GenOutcome::Unchanged);
        };
        let mut lc = shared.clone();
        lc.add_lemma(lemma, true);
        let pattern = lc.pattern().clone();
        tracing::debug!(%lemma, %pattern, "merging");

        if has_nonlinear_var_mul(&pattern) {
            tracing::debug!(%pattern, "nonlinear pattern, marked for splitting");
            let pob = lemma.pob();
            pob.set_split_pattern(pattern);
            pob.set_split();
            return Ok(GenOutcome::Unchanged);
        }
        if lc.size() < 2 {
            return Ok(GenOutcome::Unchanged);
        }

        let sorts = var_sorts(&pattern);
        let dims: Vec<SmtTerm> = sorts
            .iter()
            .map(|(id, sort)| SmtTerm::var(*id, sort.clone()))
            .collect();
        let mut cvx = ConvexClosure::new().with_lattice_stride(self.lattice_stride);
        cvx.reset(dims.len());
        for (j, d) in dims.iter().enumerate() {
            if let Err(e) = cvx.set_dimension(j, d.clone()) {
                return Ok(GenOutcome::Skipped(e.to_string()));
            }
        }
        for li in lc.lemmas() {
            let point = li
                .sub()
                .numerals()
                .filter(|p| p.len() == dims.len() && p.iter().all(BigRational::is_integer))
                .ok_or_else(|| {
                    EngineError::Invariant(format!(
                        "{} is not an integral instance of {pattern}",
                        li.lemma()
                    ))
                })?;
            if let Err(e) = cvx.push_back(point) {
                return Ok(GenOutcome::Skipped(e.to_string()));
            }
        }
        let closure = match cvx.closure() {
            Ok(c) => c,
            Err(e) => return Ok(GenOutcome::Skipped(e.to_string())),
        };

        let mut fresh = Vec::new();
        let mut rename = HashMap::new();
        for d in &dims {
            let c = env.terms.mk_fresh_const("mrg_cvx", d.sort());
            rename.insert(d.clone(), c.clone());
            fresh.push(c);
        }
        if !closure.exact {
            tracing::trace!(new_vars = cvx.new_vars().len(), "inexact closure");
            for v in cvx.new_vars() {
                let c = env.terms.mk_fresh_const("mrg_syn_cvx", SmtSort::Real);
                rename.insert(v.clone(), c.clone());
                fresh.push(c);
            }
        }
        let mut parts = closure.constraints.clone();
        parts.push(pattern.clone());
        let mut cvx_pattern = mk_and(parts).replace(&rename);
        if !closure.exact {
            cvx_pattern = arith_norm::to_real(&cvx_pattern);
        }

        let model = match env.sat.is_satisfiable(&[cvx_pattern.clone()])? {
            SatAnswer::Sat(m) => m,
            SatAnswer::Unsat => {
                return Err(EngineError::Invariant(format!(
                    "convex closure of {pattern} is unsatisfiable"
                )))
            }
            SatAnswer::Unknown(reason) => return Ok(GenOutcome::Skipped(reason)),
        };
        let projection = env.projector.project(&fresh, &cvx_pattern, &model)?;
        if !projection.residual.is_empty() {
            tracing::debug!(residual = projection.residual.len(), "could not eliminate all variables");
            return Ok(GenOutcome::Unchanged);
        }
        let mut projected = projection.formula;
        if !closure.exact {
            projected = arith_norm::normalize(&projected)?;
        }

        // Keep only literals implied by the closure itself.
        let mut pat = projected.flatten_and();
        let mut neg: Vec<SmtTerm> = pat.iter().cloned().map(mk_not).collect();
        while !neg.is_empty() {
            let query = [cvx_pattern.clone(), mk_or(neg.clone())];
            match env.sat.is_satisfiable(&query)? {
                SatAnswer::Unsat => return self.check_inductive_and_update(env.node, lemma, pat),
                SatAnswer::Unknown(reason) => return Ok(GenOutcome::Skipped(reason)),
                SatAnswer::Sat(m) => {
                    let before = neg.len();
                    (pat, neg) = pat
                        .into_iter()
                        .zip(neg)
                        .filter(|(_, n)| !m.is_true(n))
                        .unzip();
                    if neg.len() == before {
                        return Ok(GenOutcome::Skipped(
                            "counter-model falsifies no candidate literal".into(),
                        ));
                    }
                }
            }
        }
        tracing::debug!("projection does not over-approximate the closure");
        Ok(GenOutcome::Unchanged)
    }

    fn check_inductive_and_update(
        &mut self,
        node: &mut PredicateNode,
        lemma: &LemmaRef,
        conj: Vec<SmtTerm>,
    ) -> Result<GenOutcome> {
        tracing::debug!(%lemma, candidate = %mk_and(conj.clone()), "checking merged cube");
        let weakness = lemma.weakness();
        let mut res = node.check_inductive(Level::INFINITY, &conj, weakness)?;
        if !res.inductive {
            res = node.check_inductive(lemma.level(), &conj, weakness)?;
        }
        if res.inductive {
            tracing::debug!(level = %res.level, "blocked using merge");
            lemma.update_cube(conj);
            lemma.set_level(res.level);
            return Ok(GenOutcome::Updated);
        }
        let pob = lemma.pob();
        if pob.merge_attempts() > self.conj_threshold {
            tracing::debug!(post = %pob.post(), "merge conjecture recorded");
            pob.set_merge_conj(conj);
            pob.set_refine();
        }
        pob.bump_merge_attempts();
        Ok(GenOutcome::Unchanged)
    }

    /// Try to move each `c <= k` / `c >= k` bound of the lemma to a
    /// canonical constant, keeping the first replacement that stays blocked.
    fn widen(&mut self, node: &mut PredicateNode, lemma: &LemmaRef) -> Result<()> {
        let _watch = self.wide_watch.scoped();
        let conj = lemma.cube();
        let mut updated = conj.clone();
        for bnd in &conj {
            let Some(bound) = as_bound(bnd) else {
                continue;
            };
            let rest: Vec<SmtTerm> = updated.iter().filter(|t| *t != bnd).cloned().collect();
            if let Some(nw) = self.apply_widen(node, lemma, &bound, rest)? {
                updated.retain(|t| t != bnd);
                updated.push(nw);
            }
        }
        lemma.pob().stop_widening();
        Ok(())
    }

    fn apply_widen(
        &mut self,
        node: &mut PredicateNode,
        lemma: &LemmaRef,
        lit: &SmtTerm,
        mut conj: Vec<SmtTerm>,
    ) -> Result<Option<SmtTerm>> {
        let Some((lhs, SmtTerm::IntLit(val))) = lit.relation_args() else {
            return Ok(None);
        };
        for n in &self.widen_constants {
            if !should_apply(lit, val, n) {
                continue;
            }
            let Some(n_lit) = lit.with_relation_args(lhs.clone(), SmtTerm::int_big(n.clone())) else {
                continue;
            };
            self.st.wide_attempts += 1;
            conj.push(n_lit.clone());
            let res = node.check_inductive(lemma.level(), &conj, lemma.weakness().saturating_sub(1))?;
            if res.inductive {
                tracing::debug!(%lit, widened = %n_lit, "widening succeeded");
                self.st.wide_success += 1;
                lemma.update_cube(conj);
                lemma.set_level(res.level);
                return Ok(Some(n_lit));
            }
            conj.pop();
        }
        Ok(None)
    }

    pub fn collect_statistics(&self, st: &mut Statistics) {
        st.update("time.spacer.solve.reach.gen.merge", self.merge_watch.seconds());
        st.update("time.spacer.solve.reach.gen.wide", self.wide_watch.seconds());
        st.update("SPACER merge gen", self.st.merged);
        st.update("SPACER wide attmpts", self.st.wide_attempts);
        st.update("SPACER wide success", self.st.wide_success);
    }
}
