//! Model-based projection for linear arithmetic.
//!
//! [`Projector::project`] eliminates existentially quantified constants from
//! a conjunction so that the result is satisfied by the given model and
//! implies the existential closure of the input. Constants that occur in
//! positions the projector cannot handle are reported as residual and stay
//! in the result.

use num::{BigRational, Signed, Zero};
use thiserror::Error;

use crate::backends::fourier_motzkin::{eliminate, resolve, simplify, solve_for};
use crate::linear::{LinearConstraint, LinearExpr, Rel};
use crate::solver::Model;
use crate::terms::{mk_and, SmtTerm};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("model does not satisfy the formula")]
    ModelMismatch,
    #[error("no model value for `{0}`")]
    MissingValue(String),
}

/// Result of a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub formula: SmtTerm,
    /// Requested constants that could not be eliminated.
    pub residual: Vec<SmtTerm>,
}

/// Existential elimination guided by a model.
pub trait Projector {
    fn project(
        &mut self,
        vars: &[SmtTerm],
        fml: &SmtTerm,
        model: &Model,
    ) -> Result<Projection, ProjectionError>;
}

/// Projection for conjunctions of linear arithmetic literals.
///
/// Equalities are used for substitution first. Otherwise Fourier-Motzkin is
/// exact as long as the number of resolvents stays within `fm_pair_limit`;
/// beyond that the greatest lower bound in the model is selected and only
/// its consequences are kept. Integer constants are projected as if they
/// were rational.
#[derive(Debug, Clone)]
pub struct LraProjector {
    pub fm_pair_limit: usize,
}

impl Default for LraProjector {
    fn default() -> Self {
        Self { fm_pair_limit: 16 }
    }
}

impl LraProjector {
    pub fn new(fm_pair_limit: usize) -> Self {
        Self { fm_pair_limit }
    }
}

fn mentions_any(t: &SmtTerm, vars: &[SmtTerm]) -> bool {
    vars.iter().any(|v| t.contains(v))
}

/// Model-selected elimination of `atom`: keep the greatest lower bound.
fn eliminate_with_model(
    atom: &SmtTerm,
    constraints: Vec<LinearConstraint>,
    model: &Model,
) -> Result<Vec<LinearConstraint>, ProjectionError> {
    let (involved, mut remaining): (Vec<_>, Vec<_>) = constraints
        .into_iter()
        .partition(|c| !c.expr.coeff(atom).is_zero());
    let (lowers, uppers): (Vec<_>, Vec<_>) = involved
        .into_iter()
        .partition(|c| c.expr.coeff(atom).is_negative());
    if lowers.is_empty() {
        return Ok(remaining);
    }

    // Lower bound `atom >= rest / a` as a linear expression.
    let bound_of = |c: &LinearConstraint| -> LinearExpr {
        let a = -c.expr.coeff(atom);
        let mut rest = c.expr.clone();
        rest.coeffs.remove(atom);
        rest.scale(&a.recip())
    };
    let mut best: Option<(usize, BigRational)> = None;
    for (i, l) in lowers.iter().enumerate() {
        let v = bound_of(l)
            .eval(model)
            .ok_or_else(|| ProjectionError::MissingValue(l.to_string()))?;
        let better = match &best {
            None => true,
            Some((j, w)) => v > *w || (v == *w && l.rel == Rel::Lt && lowers[*j].rel == Rel::Le),
        };
        if better {
            best = Some((i, v));
        }
    }
    let Some((chosen_idx, _)) = best else {
        return Ok(remaining);
    };
    let chosen = &lowers[chosen_idx];
    let glb = bound_of(chosen);
    for (i, l) in lowers.iter().enumerate() {
        if i == chosen_idx {
            continue;
        }
        let rel = if chosen.rel == Rel::Le && l.rel == Rel::Lt {
            Rel::Lt
        } else {
            Rel::Le
        };
        remaining.push(LinearConstraint::new(bound_of(l).sub(&glb), rel).tighten_integral());
    }
    for u in &uppers {
        remaining.push(resolve(chosen, u, atom));
    }
    Ok(remaining)
}

impl Projector for LraProjector {
    fn project(
        &mut self,
        vars: &[SmtTerm],
        fml: &SmtTerm,
        model: &Model,
    ) -> Result<Projection, ProjectionError> {
        let mut kept = Vec::new();
        let mut arith = Vec::new();
        let mut residual: Vec<SmtTerm> = Vec::new();

        for lit in fml.flatten_and() {
            if !mentions_any(&lit, vars) {
                kept.push(lit);
                continue;
            }
            if let Some(c) = LinearConstraint::from_literal(&lit) {
                // A variable under a non-linear atom such as `mod` cannot be
                // eliminated by resolution.
                let hidden = vars
                    .iter()
                    .any(|v| c.expr.atoms().any(|a| a != v && a.contains(v)));
                if !hidden {
                    arith.push(c);
                    continue;
                }
            }
            // Disequality: keep the side the model picks.
            if let SmtTerm::Not(inner) = &lit {
                if let SmtTerm::Eq(a, b) = inner.as_ref() {
                    let (a, b): (SmtTerm, SmtTerm) = (a.as_ref().clone(), b.as_ref().clone());
                    if a.sort().is_arith() {
                        if let Some(c) = LinearConstraint::from_literal(&a.clone().lt(b.clone())) {
                            match c.holds(model) {
                                Some(true) => {
                                    arith.push(c);
                                    continue;
                                }
                                Some(false) => {
                                    if let Some(g) = LinearConstraint::from_literal(&a.gt(b)) {
                                        arith.push(g);
                                        continue;
                                    }
                                }
                                None => {}
                            }
                        }
                    }
                }
            }
            for v in vars {
                if lit.contains(v) && !residual.contains(v) {
                    residual.push(v.clone());
                }
            }
            kept.push(lit);
        }

        for c in &arith {
            if c.holds(model) == Some(false) {
                return Err(ProjectionError::ModelMismatch);
            }
        }

        let mut current = arith;
        for v in vars {
            if residual.contains(v) {
                continue;
            }
            let mentioned = current.iter().any(|c| !c.expr.coeff(v).is_zero());
            if !mentioned {
                continue;
            }
            let has_def = current.iter().any(|c| solve_for(c, v).is_some());
            let lowers = current.iter().filter(|c| c.expr.coeff(v).is_negative()).count();
            let uppers = current.iter().filter(|c| c.expr.coeff(v).is_positive()).count();
            current = if has_def || lowers * uppers <= self.fm_pair_limit {
                match eliminate(v, current.clone(), usize::MAX) {
                    Some(step) => step.remaining,
                    None => current,
                }
            } else {
                tracing::trace!(var = %v, lowers, uppers, "model-guided elimination");
                eliminate_with_model(v, current, model)?
            };
            current = simplify(current).ok_or(ProjectionError::ModelMismatch)?;
        }

        let mut out = kept;
        out.extend(current.iter().map(LinearConstraint::to_term));
        Ok(Projection {
            formula: mk_and(out),
            residual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::ModelValue;

    fn r(name: &str) -> SmtTerm {
        SmtTerm::real_const(name)
    }

    fn model(vals: &[(&str, i64)]) -> Model {
        let mut m = Model::new();
        for (n, v) in vals {
            m.insert(*n, ModelValue::Real(BigRational::from_integer((*v).into())));
        }
        m
    }

    #[test]
    fn substitutes_equalities() {
        // x = l, y = 2l, 0 <= l <= 1  -->  y = 2x, 0 <= x <= 1
        let l = r("l");
        let fml = SmtTerm::and(vec![
            r("x").eq(l.clone()),
            r("y").eq(SmtTerm::int(2).mul(l.clone())),
            l.clone().ge(SmtTerm::int(0)),
            l.clone().le(SmtTerm::int(1)),
        ]);
        let m = model(&[("x", 1), ("y", 2), ("l", 1)]);
        let p = LraProjector::default()
            .project(&[l.clone()], &fml, &m)
            .expect("projection");
        assert!(p.residual.is_empty());
        assert!(!p.formula.contains(&l));
        assert!(m.is_true(&p.formula));
        assert_eq!(p.formula.flatten_and().len(), 3);
    }

    #[test]
    fn model_guided_elimination_keeps_model() {
        let l = r("l");
        let lowers = ["a", "b", "c"];
        let uppers = ["d", "e"];
        let mut lits = Vec::new();
        for n in lowers {
            lits.push(l.clone().ge(r(n)));
        }
        for n in uppers {
            lits.push(l.clone().le(r(n)));
        }
        let fml = SmtTerm::and(lits);
        let m = model(&[("a", 1), ("b", 3), ("c", 2), ("d", 5), ("e", 4), ("l", 3)]);
        let p = LraProjector::new(1)
            .project(&[l.clone()], &fml, &m)
            .expect("projection");
        assert!(!p.formula.contains(&l));
        assert!(m.is_true(&p.formula));
        // b is the greatest lower bound: a <= b, c <= b, b <= d, b <= e
        assert_eq!(p.formula.flatten_and().len(), 4);
    }

    #[test]
    fn unsupported_occurrences_are_residual() {
        let l = r("l");
        let fml = SmtTerm::and(vec![
            l.clone().mul(r("x")).le(SmtTerm::int(1)),
            l.clone().ge(SmtTerm::int(0)),
        ]);
        let m = model(&[("x", 0), ("l", 0)]);
        let p = LraProjector::default()
            .project(&[l.clone()], &fml, &m)
            .expect("projection");
        assert_eq!(p.residual, vec![l]);
    }

    #[test]
    fn variables_under_mod_are_residual() {
        let l = SmtTerm::int_const("l");
        let fml = SmtTerm::and(vec![
            l.clone().modulo(SmtTerm::int(4)).eq(SmtTerm::int(0)),
            l.clone().ge(SmtTerm::int(0)),
            r("x").eq(l.clone()),
        ]);
        let m = Model::new()
            .with("l", ModelValue::Int(0.into()))
            .with("x", ModelValue::Real(BigRational::zero()));
        let p = LraProjector::default()
            .project(&[l.clone()], &fml, &m)
            .expect("projection");
        assert_eq!(p.residual, vec![l]);
    }

    #[test]
    fn rejects_inconsistent_model() {
        let l = r("l");
        let fml = l.clone().ge(SmtTerm::int(1));
        let m = model(&[("l", 0)]);
        assert!(matches!(
            LraProjector::default().project(&[l], &fml, &m),
            Err(ProjectionError::ModelMismatch)
        ));
    }
}
