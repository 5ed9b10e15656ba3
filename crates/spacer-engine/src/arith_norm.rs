//! Moving merge candidates between integer and real arithmetic.
//!
//! When a closure introduces real multipliers the pattern is lifted to the
//! reals with [`to_real`] before projection, and the projected literals are
//! brought back with [`normalize`]: denominators are cleared by scaling each
//! literal with the LCM of its numerals and the result is rewritten over the
//! integers.

use num::{BigInt, BigRational, Integer, One};
use spacer_smt::sorts::SmtSort;
use spacer_smt::terms::{mk_and, SmtTerm};

use crate::error::{EngineError, Result};

/// Lift every integer-sorted arithmetic sub-term of `t` to the reals.
pub fn to_real(t: &SmtTerm) -> SmtTerm {
    match t {
        SmtTerm::IntLit(n) => SmtTerm::real(BigRational::from_integer(n.clone())),
        SmtTerm::Const(..) | SmtTerm::Var(..) | SmtTerm::App(..) | SmtTerm::Select(..) | SmtTerm::Mod(..)
            if t.sort() == SmtSort::Int =>
        {
            t.clone().to_real()
        }
        SmtTerm::ToReal(_) | SmtTerm::RealLit(_) => t.clone(),
        SmtTerm::Ite(c, a, b) if t.sort() == SmtSort::Int => {
            SmtTerm::ite(c.as_ref().clone(), to_real(a), to_real(b))
        }
        SmtTerm::Eq(a, b) if !a.sort().is_arith() => t.clone(),
        _ => t.map_children(to_real),
    }
}

fn lcm_of_denominators(t: &SmtTerm, acc: &mut BigInt) {
    if let Some(q) = t.as_numeral() {
        *acc = acc.lcm(q.denom());
        return;
    }
    if let SmtTerm::Mod(..) = t {
        return;
    }
    for c in t.children() {
        lcm_of_denominators(c, acc);
    }
}

fn check_mod(t: &SmtTerm) -> Result<()> {
    if let SmtTerm::Mod(a, m) = t {
        let mut inner = BigInt::one();
        lcm_of_denominators(a, &mut inner);
        if !inner.is_one() || m.as_integer().is_none() {
            return Err(EngineError::Invariant(format!("cannot normalize modulo term `{t}`")));
        }
    }
    for c in t.children() {
        check_mod(c)?;
    }
    Ok(())
}

/// Multiply `t` by `k`, pushing the factor into sums and coefficients.
fn mul_and_simp(t: &SmtTerm, k: &BigRational) -> SmtTerm {
    if let Some(q) = t.as_numeral() {
        return SmtTerm::numeral(q * k, &t.sort());
    }
    match t {
        SmtTerm::Add(args) => SmtTerm::Add(args.iter().map(|a| mul_and_simp(a, k)).collect()),
        SmtTerm::Sub(a, b) => mul_and_simp(a, k).sub(mul_and_simp(b, k)),
        SmtTerm::Neg(a) => mul_and_simp(a, k).neg(),
        SmtTerm::Mul(c, x) if c.is_numeral() => mul_and_simp(c, k).mul(x.as_ref().clone()),
        SmtTerm::Mul(x, c) if c.is_numeral() => x.as_ref().clone().mul(mul_and_simp(c, k)),
        _ => SmtTerm::numeral(k.clone(), &t.sort()).mul(t.clone()),
    }
}

/// Drop `to_real` and turn numerals into integer literals.
fn to_int(t: &SmtTerm) -> Result<SmtTerm> {
    match t {
        SmtTerm::ToReal(inner) => to_int(inner),
        SmtTerm::RealLit(q) => {
            if !q.is_integer() {
                return Err(EngineError::Invariant(format!("numeral {q} is not integral after scaling")));
            }
            Ok(SmtTerm::int_big(q.to_integer()))
        }
        _ => t.try_map_children(to_int),
    }
}

/// Integer-sorted once every `to_real` is dropped.
fn is_integer_literal(t: &SmtTerm) -> bool {
    !t.any(&|s| match s {
        SmtTerm::Const(_, sort) | SmtTerm::Var(_, sort) | SmtTerm::App(_, _, sort) => *sort == SmtSort::Real,
        _ => false,
    })
}

fn normalize_literal(lit: &SmtTerm) -> Result<SmtTerm> {
    let (rel, negated) = match lit {
        SmtTerm::Not(inner) => (inner.as_ref(), true),
        other => (other, false),
    };
    let Some((a, b)) = rel.relation_args() else {
        return Ok(lit.clone());
    };
    if !a.sort().is_arith() || !is_integer_literal(rel) {
        return Ok(lit.clone());
    }
    check_mod(rel)?;
    let mut k = BigInt::one();
    lcm_of_denominators(rel, &mut k);
    let (a, b) = if k.is_one() {
        (a.clone(), b.clone())
    } else {
        let k = BigRational::from_integer(k);
        (mul_and_simp(a, &k), mul_and_simp(b, &k))
    };
    let out = rel
        .with_relation_args(to_int(&a)?, to_int(&b)?)
        .ok_or_else(|| EngineError::Invariant(format!("not a relation: {rel}")))?;
    Ok(if negated { out.not() } else { out })
}

/// Rewrite a conjunction of (possibly rational) literals over integer
/// constants into integer arithmetic.
pub fn normalize(fml: &SmtTerm) -> Result<SmtTerm> {
    let lits = fml
        .flatten_and()
        .iter()
        .map(normalize_literal)
        .collect::<Result<Vec<_>>>()?;
    Ok(mk_and(lits))
}
