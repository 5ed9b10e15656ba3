use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;

use indexmap::IndexMap;
use num::{BigInt, BigRational};

use crate::sorts::SmtSort;

/// Abstract SMT term representation, solver-agnostic.
///
/// Terms are plain owned trees. `Const` is an uninterpreted constant (a state
/// variable of the transition system, or a fresh existential), while `Var` is
/// a free pattern variable introduced by anti-unification and identified by
/// its index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SmtTerm {
    /// Uninterpreted constant.
    Const(String, SmtSort),
    /// Free pattern variable.
    Var(u32, SmtSort),
    /// Integer literal.
    IntLit(BigInt),
    /// Rational literal.
    RealLit(BigRational),
    /// Boolean literal.
    BoolLit(bool),
    /// Application of an uninterpreted function.
    App(String, Vec<SmtTerm>, SmtSort),

    // Arithmetic
    Add(Vec<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),
    Neg(Box<SmtTerm>),
    Mod(Box<SmtTerm>, Box<SmtTerm>),
    ToReal(Box<SmtTerm>),

    // Comparison
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // If-then-else
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),

    // Arrays
    Select(Box<SmtTerm>, Box<SmtTerm>),
    Store(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn constant(name: impl Into<String>, sort: SmtSort) -> Self {
        SmtTerm::Const(name.into(), sort)
    }

    pub fn int_const(name: impl Into<String>) -> Self {
        SmtTerm::Const(name.into(), SmtSort::Int)
    }

    pub fn real_const(name: impl Into<String>) -> Self {
        SmtTerm::Const(name.into(), SmtSort::Real)
    }

    pub fn bool_const(name: impl Into<String>) -> Self {
        SmtTerm::Const(name.into(), SmtSort::Bool)
    }

    pub fn var(id: u32, sort: SmtSort) -> Self {
        SmtTerm::Var(id, sort)
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(BigInt::from(n))
    }

    pub fn int_big(n: BigInt) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn real(q: BigRational) -> Self {
        SmtTerm::RealLit(q)
    }

    /// Numeral of the requested sort. Integral values of sort `Int` become
    /// `IntLit`, everything else `RealLit`.
    pub fn numeral(q: BigRational, sort: &SmtSort) -> Self {
        if *sort == SmtSort::Int && q.is_integer() {
            SmtTerm::IntLit(q.to_integer())
        } else {
            SmtTerm::RealLit(q)
        }
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn app(name: impl Into<String>, args: Vec<SmtTerm>, sort: SmtSort) -> Self {
        SmtTerm::App(name.into(), args, sort)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(vec![self, other])
    }

    pub fn sum(terms: Vec<SmtTerm>) -> Self {
        match terms.len() {
            0 => SmtTerm::int(0),
            1 => terms.into_iter().next().unwrap_or_else(|| SmtTerm::int(0)),
            _ => SmtTerm::Add(terms),
        }
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn neg(self) -> Self {
        SmtTerm::Neg(Box::new(self))
    }

    pub fn modulo(self, other: SmtTerm) -> Self {
        SmtTerm::Mod(Box::new(self), Box::new(other))
    }

    pub fn to_real(self) -> Self {
        SmtTerm::ToReal(Box::new(self))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        SmtTerm::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els))
    }

    pub fn select(self, index: SmtTerm) -> Self {
        SmtTerm::Select(Box::new(self), Box::new(index))
    }

    pub fn store(self, index: SmtTerm, value: SmtTerm) -> Self {
        SmtTerm::Store(Box::new(self), Box::new(index), Box::new(value))
    }
}

/// Conjunction with trivial simplifications: nested conjunctions are
/// flattened, `true` is dropped, `false` absorbs.
pub fn mk_and(terms: Vec<SmtTerm>) -> SmtTerm {
    let mut out = Vec::with_capacity(terms.len());
    for t in terms {
        for c in t.flatten_and() {
            if c.is_false() {
                return SmtTerm::bool(false);
            }
            out.push(c);
        }
    }
    match out.len() {
        0 => SmtTerm::bool(true),
        1 => out.pop().unwrap_or_else(|| SmtTerm::bool(true)),
        _ => SmtTerm::And(out),
    }
}

/// Disjunction with trivial simplifications, dual to [`mk_and`].
pub fn mk_or(terms: Vec<SmtTerm>) -> SmtTerm {
    let mut out = Vec::with_capacity(terms.len());
    for t in terms {
        match t {
            SmtTerm::Or(inner) => {
                for c in inner {
                    if c.is_true() {
                        return SmtTerm::bool(true);
                    }
                    if !c.is_false() {
                        out.push(c);
                    }
                }
            }
            c if c.is_true() => return SmtTerm::bool(true),
            c if c.is_false() => {}
            c => out.push(c),
        }
    }
    match out.len() {
        0 => SmtTerm::bool(false),
        1 => out.pop().unwrap_or_else(|| SmtTerm::bool(false)),
        _ => SmtTerm::Or(out),
    }
}

/// Negation that removes double negations and folds Boolean literals.
pub fn mk_not(term: SmtTerm) -> SmtTerm {
    match term {
        SmtTerm::BoolLit(b) => SmtTerm::BoolLit(!b),
        SmtTerm::Not(inner) => *inner,
        other => other.not(),
    }
}

impl SmtTerm {
    pub fn is_true(&self) -> bool {
        matches!(self, SmtTerm::BoolLit(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, SmtTerm::BoolLit(false))
    }

    pub fn is_numeral(&self) -> bool {
        matches!(self, SmtTerm::IntLit(_) | SmtTerm::RealLit(_))
    }

    /// Value of an interpreted numeric constant.
    pub fn as_numeral(&self) -> Option<BigRational> {
        match self {
            SmtTerm::IntLit(n) => Some(BigRational::from_integer(n.clone())),
            SmtTerm::RealLit(q) => Some(q.clone()),
            _ => None,
        }
    }

    /// Value of a numeral when it is integral.
    pub fn as_integer(&self) -> Option<BigInt> {
        match self {
            SmtTerm::IntLit(n) => Some(n.clone()),
            SmtTerm::RealLit(q) if q.is_integer() => Some(q.to_integer()),
            _ => None,
        }
    }

    /// Uninterpreted constant or uninterpreted function application.
    pub fn is_uninterp(&self) -> bool {
        matches!(self, SmtTerm::Const(..) | SmtTerm::App(..))
    }

    pub fn is_uninterp_const(&self) -> bool {
        matches!(self, SmtTerm::Const(..))
    }

    /// Arithmetic comparison or equality.
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            SmtTerm::Eq(..) | SmtTerm::Lt(..) | SmtTerm::Le(..) | SmtTerm::Gt(..) | SmtTerm::Ge(..)
        )
    }

    /// Left and right operands of a binary relation.
    pub fn relation_args(&self) -> Option<(&SmtTerm, &SmtTerm)> {
        match self {
            SmtTerm::Eq(a, b)
            | SmtTerm::Lt(a, b)
            | SmtTerm::Le(a, b)
            | SmtTerm::Gt(a, b)
            | SmtTerm::Ge(a, b) => Some((a, b)),
            _ => None,
        }
    }

    /// Same relation symbol applied to new operands.
    pub fn with_relation_args(&self, lhs: SmtTerm, rhs: SmtTerm) -> Option<SmtTerm> {
        let (l, r) = (Box::new(lhs), Box::new(rhs));
        match self {
            SmtTerm::Eq(..) => Some(SmtTerm::Eq(l, r)),
            SmtTerm::Lt(..) => Some(SmtTerm::Lt(l, r)),
            SmtTerm::Le(..) => Some(SmtTerm::Le(l, r)),
            SmtTerm::Gt(..) => Some(SmtTerm::Gt(l, r)),
            SmtTerm::Ge(..) => Some(SmtTerm::Ge(l, r)),
            _ => None,
        }
    }

    pub fn sort(&self) -> SmtSort {
        match self {
            SmtTerm::Const(_, sort) | SmtTerm::Var(_, sort) | SmtTerm::App(_, _, sort) => {
                sort.clone()
            }
            SmtTerm::IntLit(_) | SmtTerm::Mod(..) => SmtSort::Int,
            SmtTerm::RealLit(_) | SmtTerm::ToReal(_) => SmtSort::Real,
            SmtTerm::Add(args) => {
                if args.iter().any(|a| a.sort() == SmtSort::Real) {
                    SmtSort::Real
                } else {
                    SmtSort::Int
                }
            }
            SmtTerm::Sub(a, b) | SmtTerm::Mul(a, b) => {
                if a.sort() == SmtSort::Real || b.sort() == SmtSort::Real {
                    SmtSort::Real
                } else {
                    SmtSort::Int
                }
            }
            SmtTerm::Neg(a) => a.sort(),
            SmtTerm::BoolLit(_)
            | SmtTerm::Eq(..)
            | SmtTerm::Lt(..)
            | SmtTerm::Le(..)
            | SmtTerm::Gt(..)
            | SmtTerm::Ge(..)
            | SmtTerm::And(_)
            | SmtTerm::Or(_)
            | SmtTerm::Not(_)
            | SmtTerm::Implies(..) => SmtSort::Bool,
            SmtTerm::Ite(_, then, _) => then.sort(),
            SmtTerm::Select(array, _) => match array.sort() {
                SmtSort::Array(_, element) => *element,
                other => other,
            },
            SmtTerm::Store(array, _, _) => array.sort(),
        }
    }

    /// Direct sub-terms, left to right.
    pub fn children(&self) -> Vec<&SmtTerm> {
        match self {
            SmtTerm::Const(..)
            | SmtTerm::Var(..)
            | SmtTerm::IntLit(_)
            | SmtTerm::RealLit(_)
            | SmtTerm::BoolLit(_) => Vec::new(),
            SmtTerm::App(_, args, _) | SmtTerm::Add(args) | SmtTerm::And(args) | SmtTerm::Or(args) => {
                args.iter().collect()
            }
            SmtTerm::Neg(a) | SmtTerm::ToReal(a) | SmtTerm::Not(a) => vec![a],
            SmtTerm::Sub(a, b)
            | SmtTerm::Mul(a, b)
            | SmtTerm::Mod(a, b)
            | SmtTerm::Eq(a, b)
            | SmtTerm::Lt(a, b)
            | SmtTerm::Le(a, b)
            | SmtTerm::Gt(a, b)
            | SmtTerm::Ge(a, b)
            | SmtTerm::Implies(a, b)
            | SmtTerm::Select(a, b) => vec![a, b],
            SmtTerm::Ite(a, b, c) | SmtTerm::Store(a, b, c) => vec![a, b, c],
        }
    }

    /// Rebuild this node with every child replaced by `f(child)`.
    pub fn try_map_children<E>(
        &self,
        mut f: impl FnMut(&SmtTerm) -> Result<SmtTerm, E>,
    ) -> Result<SmtTerm, E> {
        let mut b = |t: &SmtTerm| f(t).map(Box::new);
        Ok(match self {
            SmtTerm::Const(..)
            | SmtTerm::Var(..)
            | SmtTerm::IntLit(_)
            | SmtTerm::RealLit(_)
            | SmtTerm::BoolLit(_) => self.clone(),
            SmtTerm::App(name, args, sort) => SmtTerm::App(
                name.clone(),
                args.iter().map(|a| b(a).map(|x| *x)).collect::<Result<_, _>>()?,
                sort.clone(),
            ),
            SmtTerm::Add(args) => {
                SmtTerm::Add(args.iter().map(|a| b(a).map(|x| *x)).collect::<Result<_, _>>()?)
            }
            SmtTerm::And(args) => {
                SmtTerm::And(args.iter().map(|a| b(a).map(|x| *x)).collect::<Result<_, _>>()?)
            }
            SmtTerm::Or(args) => {
                SmtTerm::Or(args.iter().map(|a| b(a).map(|x| *x)).collect::<Result<_, _>>()?)
            }
            SmtTerm::Neg(a) => SmtTerm::Neg(b(a)?),
            SmtTerm::ToReal(a) => SmtTerm::ToReal(b(a)?),
            SmtTerm::Not(a) => SmtTerm::Not(b(a)?),
            SmtTerm::Sub(x, y) => SmtTerm::Sub(b(x)?, b(y)?),
            SmtTerm::Mul(x, y) => SmtTerm::Mul(b(x)?, b(y)?),
            SmtTerm::Mod(x, y) => SmtTerm::Mod(b(x)?, b(y)?),
            SmtTerm::Eq(x, y) => SmtTerm::Eq(b(x)?, b(y)?),
            SmtTerm::Lt(x, y) => SmtTerm::Lt(b(x)?, b(y)?),
            SmtTerm::Le(x, y) => SmtTerm::Le(b(x)?, b(y)?),
            SmtTerm::Gt(x, y) => SmtTerm::Gt(b(x)?, b(y)?),
            SmtTerm::Ge(x, y) => SmtTerm::Ge(b(x)?, b(y)?),
            SmtTerm::Implies(x, y) => SmtTerm::Implies(b(x)?, b(y)?),
            SmtTerm::Select(x, y) => SmtTerm::Select(b(x)?, b(y)?),
            SmtTerm::Ite(x, y, z) => SmtTerm::Ite(b(x)?, b(y)?, b(z)?),
            SmtTerm::Store(x, y, z) => SmtTerm::Store(b(x)?, b(y)?, b(z)?),
        })
    }

    pub fn map_children(&self, mut f: impl FnMut(&SmtTerm) -> SmtTerm) -> SmtTerm {
        match self.try_map_children(|t| Ok::<_, Infallible>(f(t))) {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }

    /// True when both terms have the same head symbol and arity, so that
    /// they can be decomposed child-by-child.
    pub fn same_head(&self, other: &SmtTerm) -> bool {
        if std::mem::discriminant(self) != std::mem::discriminant(other) {
            return false;
        }
        match (self, other) {
            (SmtTerm::Const(..), _)
            | (SmtTerm::Var(..), _)
            | (SmtTerm::IntLit(_), _)
            | (SmtTerm::RealLit(_), _)
            | (SmtTerm::BoolLit(_), _) => self == other,
            (SmtTerm::App(f, xs, s), SmtTerm::App(g, ys, t)) => {
                f == g && s == t && xs.len() == ys.len()
            }
            (SmtTerm::Add(xs), SmtTerm::Add(ys))
            | (SmtTerm::And(xs), SmtTerm::And(ys))
            | (SmtTerm::Or(xs), SmtTerm::Or(ys)) => xs.len() == ys.len(),
            _ => true,
        }
    }

    /// Pre-order traversal.
    pub fn visit(&self, f: &mut impl FnMut(&SmtTerm)) {
        f(self);
        for c in self.children() {
            c.visit(f);
        }
    }

    pub fn any(&self, pred: &impl Fn(&SmtTerm) -> bool) -> bool {
        pred(self) || self.children().into_iter().any(|c| c.any(pred))
    }

    pub fn contains(&self, needle: &SmtTerm) -> bool {
        self.any(&|t| t == needle)
    }

    /// Indices of the free pattern variables.
    pub fn var_ids(&self) -> BTreeSet<u32> {
        let mut ids = BTreeSet::new();
        self.visit(&mut |t| {
            if let SmtTerm::Var(id, _) = t {
                ids.insert(*id);
            }
        });
        ids
    }

    /// Number of free-variable slots: one past the largest variable index.
    pub fn num_vars(&self) -> usize {
        self.var_ids().last().map(|id| *id as usize + 1).unwrap_or(0)
    }

    pub fn has_vars(&self) -> bool {
        self.any(&|t| matches!(t, SmtTerm::Var(..)))
    }

    pub fn is_ground(&self) -> bool {
        !self.has_vars()
    }

    /// Uninterpreted constants in first-occurrence order.
    pub fn free_consts(&self) -> IndexMap<String, SmtSort> {
        let mut out = IndexMap::new();
        self.collect_consts(&mut out);
        out
    }

    pub fn collect_consts(&self, out: &mut IndexMap<String, SmtSort>) {
        self.visit(&mut |t| {
            if let SmtTerm::Const(name, sort) = t {
                if !out.contains_key(name) {
                    out.insert(name.clone(), sort.clone());
                }
            }
        });
    }

    /// Top-down replacement of whole sub-terms.
    pub fn replace(&self, map: &HashMap<SmtTerm, SmtTerm>) -> SmtTerm {
        if let Some(r) = map.get(self) {
            return r.clone();
        }
        self.map_children(|c| c.replace(map))
    }

    /// Replace free variables by the terms `lookup` binds them to; unbound
    /// variables are left in place.
    pub fn instantiate(&self, lookup: &impl Fn(u32) -> Option<SmtTerm>) -> SmtTerm {
        if let SmtTerm::Var(id, _) = self {
            return lookup(*id).unwrap_or_else(|| self.clone());
        }
        self.map_children(|c| c.instantiate(lookup))
    }

    /// Conjuncts of a (possibly nested) conjunction, without `true`.
    pub fn flatten_and(&self) -> Vec<SmtTerm> {
        let mut out = Vec::new();
        self.flatten_and_into(&mut out);
        out
    }

    fn flatten_and_into(&self, out: &mut Vec<SmtTerm>) {
        match self {
            SmtTerm::And(args) => {
                for a in args {
                    a.flatten_and_into(out);
                }
            }
            SmtTerm::Not(inner) => match inner.as_ref() {
                SmtTerm::Not(x) => x.flatten_and_into(out),
                SmtTerm::Or(args) => {
                    for a in args {
                        mk_not(a.clone()).flatten_and_into(out);
                    }
                }
                _ => out.push(self.clone()),
            },
            t if t.is_true() => {}
            t => out.push(t.clone()),
        }
    }

    /// Number of nodes, used for size heuristics.
    pub fn size(&self) -> usize {
        1 + self.children().into_iter().map(SmtTerm::size).sum::<usize>()
    }
}

impl std::fmt::Display for SmtTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&crate::backends::smtlib_printer::to_smtlib(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> SmtTerm {
        SmtTerm::int_const("x")
    }

    #[test]
    fn mk_and_flattens_and_simplifies() {
        let t = mk_and(vec![
            SmtTerm::and(vec![x().le(SmtTerm::int(1)), SmtTerm::bool(true)]),
            x().ge(SmtTerm::int(0)),
        ]);
        assert_eq!(t.flatten_and().len(), 2);
        assert!(mk_and(vec![]).is_true());
        assert!(mk_and(vec![x().le(SmtTerm::int(1)), SmtTerm::bool(false)]).is_false());
    }

    #[test]
    fn mk_not_removes_double_negation() {
        let lit = x().le(SmtTerm::int(1));
        assert_eq!(mk_not(mk_not(lit.clone())), lit);
        assert!(mk_not(SmtTerm::bool(true)).is_false());
    }

    #[test]
    fn num_vars_is_one_past_largest_index() {
        let pat = x()
            .le(SmtTerm::var(2, SmtSort::Int))
            .implies(x().ge(SmtTerm::var(0, SmtSort::Int)));
        assert_eq!(pat.num_vars(), 3);
        assert!(!pat.is_ground());
        assert_eq!(x().num_vars(), 0);
    }

    #[test]
    fn instantiate_replaces_bound_variables_only() {
        let pat = x().le(SmtTerm::var(0, SmtSort::Int)).ge(SmtTerm::var(1, SmtSort::Int));
        let inst = pat.instantiate(&|id| (id == 0).then(|| SmtTerm::int(7)));
        assert!(inst.contains(&SmtTerm::int(7)));
        assert_eq!(inst.var_ids().into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn sort_inference_follows_operands() {
        assert_eq!(x().add(SmtTerm::int(1)).sort(), SmtSort::Int);
        assert_eq!(x().to_real().add(SmtTerm::real_const("r")).sort(), SmtSort::Real);
        let arr = SmtTerm::constant("a", SmtSort::array(SmtSort::Int, SmtSort::Bool));
        assert_eq!(arr.select(SmtTerm::int(0)).sort(), SmtSort::Bool);
    }

    #[test]
    fn same_head_compares_symbol_and_arity() {
        let a = x().le(SmtTerm::int(1));
        let b = SmtTerm::int_const("y").le(SmtTerm::int(4));
        assert!(a.same_head(&b));
        assert!(!a.same_head(&x().lt(SmtTerm::int(1))));
        assert!(!SmtTerm::sum(vec![x(), x()]).same_head(&SmtTerm::sum(vec![x(), x(), x()])));
    }

    #[test]
    fn free_consts_in_first_occurrence_order() {
        let t = SmtTerm::int_const("b").add(x()).le(SmtTerm::int_const("b"));
        let names: Vec<_> = t.free_consts().keys().cloned().collect();
        assert_eq!(names, vec!["b".to_string(), "x".to_string()]);
    }
}
