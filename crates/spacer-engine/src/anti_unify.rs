//! Anti-unification of ground terms.
//!
//! [`anti_unify`] computes the least general generalization of two terms: a
//! pattern with free variables and one substitution per input that maps the
//! pattern back to it. Variables are numbered in pre-order, left to right,
//! and a pair of differing sub-terms that occurs more than once is mapped to
//! the same variable.

use std::collections::{BTreeMap, HashMap};

use num::BigRational;
use spacer_smt::terms::SmtTerm;

use crate::error::{EngineError, Result};

/// Pattern variable index to bound term, in variable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Substitution {
    bindings: BTreeMap<u32, SmtTerm>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id` to `term`. Returns false if `id` is already bound to a
    /// different term.
    pub fn bind(&mut self, id: u32, term: SmtTerm) -> bool {
        match self.bindings.get(&id) {
            Some(existing) => *existing == term,
            None => {
                self.bindings.insert(id, term);
                true
            }
        }
    }

    pub fn get(&self, id: u32) -> Option<&SmtTerm> {
        self.bindings.get(&id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &SmtTerm)> {
        self.bindings.iter().map(|(id, t)| (*id, t))
    }

    pub fn all_numerals(&self) -> bool {
        self.bindings.values().all(SmtTerm::is_numeral)
    }

    /// Bound values in variable order, when every binding is a numeral.
    pub fn numerals(&self) -> Option<Vec<BigRational>> {
        self.bindings.values().map(SmtTerm::as_numeral).collect()
    }

    /// Instantiate `pattern` with this substitution.
    pub fn apply(&self, pattern: &SmtTerm) -> SmtTerm {
        pattern.instantiate(&|id| self.bindings.get(&id).cloned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AntiUnification {
    pub pattern: SmtTerm,
    pub left: Substitution,
    pub right: Substitution,
}

impl AntiUnification {
    pub fn num_vars(&self) -> usize {
        self.left.len()
    }
}

struct AntiUnifier {
    cache: HashMap<(SmtTerm, SmtTerm), u32>,
    left: Substitution,
    right: Substitution,
}

impl AntiUnifier {
    fn generalize(&mut self, a: &SmtTerm, b: &SmtTerm) -> SmtTerm {
        if a == b {
            return a.clone();
        }
        if a.same_head(b) && !a.children().is_empty() {
            let others = b.children();
            let mut i = 0;
            return a.map_children(|c| {
                let g = self.generalize(c, others[i]);
                i += 1;
                g
            });
        }
        let key = (a.clone(), b.clone());
        let id = match self.cache.get(&key) {
            Some(id) => *id,
            None => {
                let id = self.cache.len() as u32;
                self.cache.insert(key, id);
                self.left.bind(id, a.clone());
                self.right.bind(id, b.clone());
                id
            }
        };
        SmtTerm::var(id, a.sort())
    }
}

pub fn anti_unify(a: &SmtTerm, b: &SmtTerm) -> AntiUnification {
    let mut au = AntiUnifier {
        cache: HashMap::new(),
        left: Substitution::new(),
        right: Substitution::new(),
    };
    let pattern = au.generalize(a, b);
    AntiUnification {
        pattern,
        left: au.left,
        right: au.right,
    }
}

/// The two inputs of `au` differ only in numerals.
pub fn is_numeral_diff(au: &AntiUnification) -> Result<bool> {
    if au.left.len() != au.right.len() {
        return Err(EngineError::Invariant(format!(
            "anti-unification produced {} and {} bindings",
            au.left.len(),
            au.right.len()
        )));
    }
    Ok(au.left.all_numerals() && au.right.all_numerals())
}

/// Two cubes are neighbours when they differ only in numerals.
pub fn are_neighbours(a: &SmtTerm, b: &SmtTerm) -> Result<bool> {
    is_numeral_diff(&anti_unify(a, b))
}
