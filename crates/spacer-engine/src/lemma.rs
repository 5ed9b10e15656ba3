//! Lemmas, proof obligations and frame levels.
//!
//! Lemmas are shared between a predicate node and every cluster that holds
//! them, so they live behind [`LemmaRef`], a reference-counted handle whose
//! identity is pointer identity. Proof obligations are shared the same way
//! through [`PobRef`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use spacer_smt::terms::{mk_and, mk_not, SmtTerm};

/// Frame level. [`Level::INFINITY`] marks a lemma that holds in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(pub u32);

impl Level {
    pub const INFINITY: Level = Level(u32::MAX);

    pub fn is_infinite(self) -> bool {
        self == Self::INFINITY
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            f.write_str("inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug)]
pub struct ProofObligation {
    post: SmtTerm,
    level: Level,
    merge_attempts: u32,
    merge_conj: Option<Vec<SmtTerm>>,
    refine: bool,
    split: bool,
    split_pattern: Option<SmtTerm>,
    widen: bool,
}

/// Shared handle to a proof obligation.
#[derive(Debug, Clone)]
pub struct PobRef(Rc<RefCell<ProofObligation>>);

impl PobRef {
    pub fn new(post: SmtTerm, level: Level) -> Self {
        Self(Rc::new(RefCell::new(ProofObligation {
            post,
            level,
            merge_attempts: 0,
            merge_conj: None,
            refine: false,
            split: false,
            split_pattern: None,
            widen: true,
        })))
    }

    pub fn post(&self) -> SmtTerm {
        self.0.borrow().post.clone()
    }

    pub fn level(&self) -> Level {
        self.0.borrow().level
    }

    pub fn merge_attempts(&self) -> u32 {
        self.0.borrow().merge_attempts
    }

    pub fn bump_merge_attempts(&self) {
        self.0.borrow_mut().merge_attempts += 1;
    }

    /// Record a merge candidate that failed the inductiveness check.
    pub fn set_merge_conj(&self, conj: Vec<SmtTerm>) {
        self.0.borrow_mut().merge_conj = Some(conj);
    }

    pub fn merge_conj(&self) -> Option<Vec<SmtTerm>> {
        self.0.borrow().merge_conj.clone()
    }

    pub fn set_refine(&self) {
        self.0.borrow_mut().refine = true;
    }

    pub fn needs_refine(&self) -> bool {
        self.0.borrow().refine
    }

    pub fn set_split(&self) {
        self.0.borrow_mut().split = true;
    }

    pub fn is_split(&self) -> bool {
        self.0.borrow().split
    }

    pub fn set_split_pattern(&self, pattern: SmtTerm) {
        self.0.borrow_mut().split_pattern = Some(pattern);
    }

    pub fn split_pattern(&self) -> Option<SmtTerm> {
        self.0.borrow().split_pattern.clone()
    }

    /// Whether widening may still be attempted for lemmas of this obligation.
    pub fn widen(&self) -> bool {
        self.0.borrow().widen
    }

    pub fn set_widen(&self, on: bool) {
        self.0.borrow_mut().widen = on;
    }

    pub fn stop_widening(&self) {
        self.set_widen(false);
    }

    pub fn ptr_eq(&self, other: &PobRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug)]
pub struct Lemma {
    id: u64,
    cube: Vec<SmtTerm>,
    level: Level,
    weakness: u32,
    pob: PobRef,
}

/// Shared handle to a lemma. Two handles are equal when they point to the
/// same lemma.
#[derive(Debug, Clone)]
pub struct LemmaRef(Rc<RefCell<Lemma>>);

impl LemmaRef {
    pub fn new(id: u64, cube: Vec<SmtTerm>, level: Level, pob: PobRef) -> Self {
        Self(Rc::new(RefCell::new(Lemma {
            id,
            cube,
            level,
            weakness: 0,
            pob,
        })))
    }

    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    /// Literals of the blocked cube.
    pub fn cube(&self) -> Vec<SmtTerm> {
        self.0.borrow().cube.clone()
    }

    /// The blocked cube as a single conjunction.
    pub fn cube_term(&self) -> SmtTerm {
        mk_and(self.cube())
    }

    /// The lemma itself: the negation of its cube.
    pub fn expr(&self) -> SmtTerm {
        mk_not(self.cube_term())
    }

    pub fn level(&self) -> Level {
        self.0.borrow().level
    }

    pub fn set_level(&self, level: Level) {
        self.0.borrow_mut().level = level;
    }

    pub fn weakness(&self) -> u32 {
        self.0.borrow().weakness
    }

    pub fn set_weakness(&self, weakness: u32) {
        self.0.borrow_mut().weakness = weakness;
    }

    pub fn pob(&self) -> PobRef {
        self.0.borrow().pob.clone()
    }

    /// Replace the cube; `true` conjuncts are dropped.
    pub fn update_cube(&self, cube: Vec<SmtTerm>) {
        let cube = cube.into_iter().filter(|l| !l.is_true()).collect();
        self.0.borrow_mut().cube = cube;
    }

    pub fn ptr_eq(&self, other: &LemmaRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for LemmaRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for LemmaRef {}

impl fmt::Display for LemmaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = self.0.borrow();
        write!(f, "lemma#{} @{}: {}", l.id, l.level, mk_not(mk_and(l.cube.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinity_prints_as_inf() {
        assert_eq!(Level::INFINITY.to_string(), "inf");
        assert_eq!(Level(3).to_string(), "3");
        assert!(Level(3) < Level::INFINITY);
    }

    #[test]
    fn lemma_identity_is_pointer_identity() {
        let pob = PobRef::new(SmtTerm::bool(true), Level(1));
        let cube = vec![SmtTerm::int_const("x").le(SmtTerm::int(1))];
        let a = LemmaRef::new(0, cube.clone(), Level(1), pob.clone());
        let b = LemmaRef::new(0, cube, Level(1), pob);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn update_cube_drops_true() {
        let pob = PobRef::new(SmtTerm::bool(true), Level(1));
        let x = SmtTerm::int_const("x");
        let l = LemmaRef::new(0, vec![], Level(1), pob);
        l.update_cube(vec![SmtTerm::bool(true), x.clone().ge(SmtTerm::int(0))]);
        assert_eq!(l.cube(), vec![x.ge(SmtTerm::int(0))]);
    }

    #[test]
    fn obligation_flags_are_shared() {
        let pob = PobRef::new(SmtTerm::bool(true), Level(2));
        let alias = pob.clone();
        assert!(pob.widen());
        alias.stop_widening();
        alias.bump_merge_attempts();
        assert!(!pob.widen());
        assert_eq!(pob.merge_attempts(), 1);
        assert!(pob.ptr_eq(&alias));
    }
}
