/// SMT sorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SmtSort {
    Bool,
    Int,
    Real,
    /// Array sort from an index sort to an element sort.
    Array(Box<SmtSort>, Box<SmtSort>),
}

impl SmtSort {
    pub fn array(index: SmtSort, element: SmtSort) -> Self {
        SmtSort::Array(Box::new(index), Box::new(element))
    }

    pub fn is_arith(&self) -> bool {
        matches!(self, SmtSort::Int | SmtSort::Real)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, SmtSort::Array(..))
    }
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::Int => write!(f, "Int"),
            SmtSort::Real => write!(f, "Real"),
            SmtSort::Array(index, element) => write!(f, "(Array {index} {element})"),
        }
    }
}
