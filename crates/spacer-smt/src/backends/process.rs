use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::str::FromStr;

use num::{BigInt, BigRational};
use thiserror::Error;

use crate::backends::smtlib_printer::{sort_to_smtlib, symbol, to_smtlib};
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("solver I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("solver not found: {0}")]
    NotFound(String),
    #[error("solver error: {0}")]
    SolverError(String),
    #[error("failed to parse solver output: {0}")]
    ParseError(String),
}

/// An external SMT-LIB2 solver driven over stdin/stdout.
///
/// Works with any solver that accepts incremental SMT-LIB2 on standard input,
/// e.g. `z3 -in` or `cvc5 --incremental`.
pub struct SmtLibProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
    vars: HashMap<String, SmtSort>,
}

impl SmtLibProcess {
    /// Spawn `z3 -in`.
    pub fn z3() -> Result<Self, ProcessError> {
        Self::spawn("z3", &["-in", "-smt2"], None)
    }

    /// Spawn cvc5 in incremental mode.
    pub fn cvc5() -> Result<Self, ProcessError> {
        Self::spawn(
            "cvc5",
            &["--lang", "smt2", "--incremental", "--produce-models"],
            None,
        )
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Result<Self, ProcessError> {
        if timeout_ms > 0 {
            self.send_command_no_response(&format!("(set-option :timeout {timeout_ms})"))?;
        }
        Ok(self)
    }

    pub fn spawn(cmd: &str, args: &[&str], logic: Option<&str>) -> Result<Self, ProcessError> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProcessError::NotFound(format!("{cmd}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProcessError::SolverError("failed to capture solver stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::SolverError("failed to capture solver stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProcessError::SolverError("failed to capture solver stderr".into()))?;

        let mut solver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr: BufReader::new(stderr),
            vars: HashMap::new(),
        };

        solver.send_command_no_response("(set-option :produce-models true)")?;
        solver.send_command_no_response(&format!("(set-logic {})", logic.unwrap_or("ALL")))?;
        tracing::debug!(cmd, "spawned SMT-LIB solver");
        Ok(solver)
    }

    fn send_command(&mut self, cmd: &str) -> Result<String, ProcessError> {
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;

        // Responses may span several lines; read until parentheses balance.
        let mut response = String::new();
        loop {
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            response.push_str(&line);
            if paren_balance(&response) <= 0 {
                break;
            }
        }
        if response.is_empty() {
            let mut stderr = String::new();
            let _ = self.stderr.read_line(&mut stderr);
            return Err(ProcessError::SolverError(format!(
                "no response for command `{cmd}`. stderr: {}",
                stderr.trim()
            )));
        }
        let response = response.trim().to_string();
        if response.starts_with("(error") {
            return Err(ProcessError::SolverError(response));
        }
        Ok(response)
    }

    fn send_command_no_response(&mut self, cmd: &str) -> Result<(), ProcessError> {
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;
        Ok(())
    }
}

fn paren_balance(s: &str) -> i64 {
    let mut depth = 0i64;
    let mut quoted = false;
    for c in s.chars() {
        match c {
            '|' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            _ => {}
        }
    }
    depth
}

impl Drop for SmtLibProcess {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}

impl SmtSolver for SmtLibProcess {
    type Error = ProcessError;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), ProcessError> {
        let sort_str = sort_to_smtlib(sort);
        self.send_command_no_response(&format!("(declare-const {} {sort_str})", symbol(name)))?;
        self.vars.insert(name.to_string(), sort.clone());
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), ProcessError> {
        let smt_str = to_smtlib(term);
        self.send_command_no_response(&format!("(assert {smt_str})"))?;
        Ok(())
    }

    fn push(&mut self) -> Result<(), ProcessError> {
        self.send_command_no_response("(push 1)")
    }

    fn pop(&mut self) -> Result<(), ProcessError> {
        self.send_command_no_response("(pop 1)")
    }

    fn check_sat(&mut self) -> Result<SatResult, ProcessError> {
        let response = self.send_command("(check-sat)")?;
        match response.as_str() {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => Ok(SatResult::Unknown("solver returned unknown".into())),
            other => Err(ProcessError::SolverError(other.to_string())),
        }
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), ProcessError> {
        let result = self.check_sat()?;
        if result != SatResult::Sat {
            return Ok((result, None));
        }

        // An empty request asks for every declared constant.
        let wanted: Vec<(String, SmtSort)> = if var_names.is_empty() {
            self.vars.iter().map(|(n, s)| (n.clone(), s.clone())).collect()
        } else {
            var_names
                .iter()
                .map(|&(n, s)| (n.to_string(), s.clone()))
                .collect()
        };
        let mut model = Model::new();
        for (name, sort) in wanted {
            if sort.is_array() {
                continue;
            }
            let response = self.send_command(&format!("(get-value ({}))", symbol(&name)))?;
            let val = parse_value(&response, &sort)?;
            model.insert(name, val);
        }

        Ok((SatResult::Sat, Some(model)))
    }

    fn reset(&mut self) -> Result<(), ProcessError> {
        self.send_command_no_response("(reset)")?;
        self.send_command_no_response("(set-option :produce-models true)")?;
        self.send_command_no_response("(set-logic ALL)")?;
        self.vars.clear();
        Ok(())
    }
}

/// Minimal s-expression used for `get-value` responses.
#[derive(Debug, PartialEq)]
enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

fn parse_sexp(input: &str) -> Result<Sexp, ProcessError> {
    let mut stack: Vec<Vec<Sexp>> = vec![Vec::new()];
    let mut atom = String::new();
    let mut quoted = false;
    let flush = |atom: &mut String, stack: &mut Vec<Vec<Sexp>>| {
        if !atom.is_empty() {
            if let Some(top) = stack.last_mut() {
                top.push(Sexp::Atom(std::mem::take(atom)));
            }
        }
    };
    for ch in input.chars() {
        match ch {
            '|' => quoted = !quoted,
            '(' if !quoted => {
                flush(&mut atom, &mut stack);
                stack.push(Vec::new());
            }
            ')' if !quoted => {
                flush(&mut atom, &mut stack);
                let done = stack
                    .pop()
                    .ok_or_else(|| ProcessError::ParseError(input.to_string()))?;
                stack
                    .last_mut()
                    .ok_or_else(|| ProcessError::ParseError(input.to_string()))?
                    .push(Sexp::List(done));
            }
            c if c.is_whitespace() && !quoted => flush(&mut atom, &mut stack),
            c => atom.push(c),
        }
    }
    flush(&mut atom, &mut stack);
    match stack.pop() {
        Some(mut top) if stack.is_empty() && top.len() == 1 => top
            .pop()
            .ok_or_else(|| ProcessError::ParseError(input.to_string())),
        _ => Err(ProcessError::ParseError(input.to_string())),
    }
}

fn parse_number(s: &Sexp) -> Option<BigRational> {
    match s {
        Sexp::Atom(a) => {
            if let Some((int, frac)) = a.split_once('.') {
                let digits = format!("{int}{frac}");
                let numer = BigInt::from_str(&digits).ok()?;
                let denom = num::pow(BigInt::from(10), frac.len());
                Some(BigRational::new(numer, denom))
            } else {
                BigInt::from_str(a).ok().map(BigRational::from_integer)
            }
        }
        Sexp::List(items) => match items.as_slice() {
            [Sexp::Atom(op), x] if op == "-" => parse_number(x).map(|q| -q),
            [Sexp::Atom(op), x, y] if op == "/" => {
                let (n, d) = (parse_number(x)?, parse_number(y)?);
                if num::Zero::is_zero(&d) {
                    None
                } else {
                    Some(n / d)
                }
            }
            _ => None,
        },
    }
}

/// Value of an SMT-LIB numeral such as `3`, `(- 2)` or `(/ 1.0 2.0)`.
pub(crate) fn parse_numeral(text: &str) -> Option<BigRational> {
    parse_sexp(text).ok().as_ref().and_then(parse_number)
}

/// Parse a `((name value))` response.
fn parse_value(response: &str, sort: &SmtSort) -> Result<ModelValue, ProcessError> {
    let bad = || ProcessError::ParseError(response.to_string());
    let sexp = parse_sexp(response)?;
    let value = match &sexp {
        Sexp::List(pairs) => match pairs.as_slice() {
            [Sexp::List(pair)] if pair.len() == 2 => &pair[1],
            _ => return Err(bad()),
        },
        Sexp::Atom(_) => return Err(bad()),
    };
    match sort {
        SmtSort::Bool => match value {
            Sexp::Atom(a) if a == "true" => Ok(ModelValue::Bool(true)),
            Sexp::Atom(a) if a == "false" => Ok(ModelValue::Bool(false)),
            _ => Err(bad()),
        },
        SmtSort::Int => {
            let q = parse_number(value).ok_or_else(bad)?;
            if q.is_integer() {
                Ok(ModelValue::Int(q.to_integer()))
            } else {
                Err(bad())
            }
        }
        SmtSort::Real => parse_number(value).map(ModelValue::Real).ok_or_else(bad),
        SmtSort::Array(..) => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_value() {
        let v = parse_value("((x 42))", &SmtSort::Int).expect("int value");
        assert_eq!(v, ModelValue::Int(BigInt::from(42)));
    }

    #[test]
    fn parse_negative_int_value() {
        let v = parse_value("((x (- 7)))", &SmtSort::Int).expect("negative int");
        assert_eq!(v, ModelValue::Int(BigInt::from(-7)));
    }

    #[test]
    fn parse_real_values() {
        let v = parse_value("((r (/ 1.0 3.0)))", &SmtSort::Real).expect("fraction");
        assert_eq!(v, ModelValue::Real(BigRational::new(1.into(), 3.into())));
        let v = parse_value("((r (- 2.5)))", &SmtSort::Real).expect("decimal");
        assert_eq!(v, ModelValue::Real(BigRational::new((-5).into(), 2.into())));
    }

    #[test]
    fn parse_bool_value() {
        assert_eq!(
            parse_value("((b true))", &SmtSort::Bool).expect("true"),
            ModelValue::Bool(true)
        );
        assert_eq!(
            parse_value("((|b x| false))", &SmtSort::Bool).expect("false"),
            ModelValue::Bool(false)
        );
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse_value("((x 1.5))", &SmtSort::Int).is_err());
        assert!(parse_value("(x", &SmtSort::Int).is_err());
    }

    #[test]
    fn bare_numerals() {
        assert_eq!(parse_numeral("(- 12)"), Some(BigRational::from_integer((-12).into())));
        assert_eq!(parse_numeral("(/ 3.0 4.0)"), Some(BigRational::new(3.into(), 4.into())));
        assert_eq!(parse_numeral("x"), None);
    }

    #[test]
    fn paren_balance_ignores_quoted_symbols() {
        assert_eq!(paren_balance("((|a(| 1))"), 0);
        assert_eq!(paren_balance("((x"), 2);
    }
}
