use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Source of fresh constants.
///
/// Names have the form `{prefix}!{n}`; `!` never occurs in names produced
/// by the front ends, so fresh constants cannot capture user symbols.
#[derive(Debug, Default, Clone)]
pub struct TermContext {
    next_fresh: u64,
}

impl TermContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mk_fresh_const(&mut self, prefix: &str, sort: SmtSort) -> SmtTerm {
        let name = format!("{prefix}!{}", self.next_fresh);
        self.next_fresh += 1;
        SmtTerm::Const(name, sort)
    }

    /// Number of fresh constants handed out so far.
    pub fn fresh_count(&self) -> u64 {
        self.next_fresh
    }
}
