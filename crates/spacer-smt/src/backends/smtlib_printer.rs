use num::{BigInt, BigRational, Signed};

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Print an SmtTerm as SMT-LIB2 format.
///
/// Pattern variables have no SMT-LIB counterpart; they print as `?N` so that
/// patterns stay readable in logs.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Const(name, _) => symbol(name),
        SmtTerm::Var(id, _) => format!("?{id}"),
        SmtTerm::IntLit(n) => int_to_smtlib(n),
        SmtTerm::RealLit(q) => real_to_smtlib(q),
        SmtTerm::BoolLit(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        SmtTerm::App(name, args, _) => {
            if args.is_empty() {
                symbol(name)
            } else {
                nary(&symbol(name), args)
            }
        }
        SmtTerm::Add(terms) => match terms.len() {
            0 => "0".to_string(),
            1 => to_smtlib(&terms[0]),
            _ => nary("+", terms),
        },
        SmtTerm::Sub(lhs, rhs) => format!("(- {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Mul(lhs, rhs) => format!("(* {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Neg(inner) => format!("(- {})", to_smtlib(inner)),
        SmtTerm::Mod(lhs, rhs) => format!("(mod {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::ToReal(inner) => format!("(to_real {})", to_smtlib(inner)),
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Lt(lhs, rhs) => format!("(< {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Le(lhs, rhs) => format!("(<= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Gt(lhs, rhs) => format!("(> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Ge(lhs, rhs) => format!("(>= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::And(terms) => match terms.len() {
            0 => "true".to_string(),
            1 => to_smtlib(&terms[0]),
            _ => nary("and", terms),
        },
        SmtTerm::Or(terms) => match terms.len() {
            0 => "false".to_string(),
            1 => to_smtlib(&terms[0]),
            _ => nary("or", terms),
        },
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => {
            format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs))
        }
        SmtTerm::Ite(cond, then, els) => {
            format!(
                "(ite {} {} {})",
                to_smtlib(cond),
                to_smtlib(then),
                to_smtlib(els)
            )
        }
        SmtTerm::Select(array, index) => {
            format!("(select {} {})", to_smtlib(array), to_smtlib(index))
        }
        SmtTerm::Store(array, index, value) => format!(
            "(store {} {} {})",
            to_smtlib(array),
            to_smtlib(index),
            to_smtlib(value)
        ),
    }
}

fn nary(head: &str, args: &[SmtTerm]) -> String {
    let inner: Vec<String> = args.iter().map(to_smtlib).collect();
    format!("({head} {})", inner.join(" "))
}

fn int_to_smtlib(n: &BigInt) -> String {
    if n.is_negative() {
        format!("(- {})", -n)
    } else {
        n.to_string()
    }
}

fn real_to_smtlib(q: &BigRational) -> String {
    let body = if q.is_integer() {
        format!("{}.0", q.numer().abs())
    } else {
        format!("(/ {}.0 {}.0)", q.numer().abs(), q.denom())
    };
    if q.is_negative() {
        format!("(- {body})")
    } else {
        body
    }
}

/// Quote a symbol with `|...|` unless it is a legal simple symbol.
pub fn symbol(name: &str) -> String {
    let simple = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c));
    if simple {
        name.to_string()
    } else {
        format!("|{name}|")
    }
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> String {
    sort.to_string()
}
