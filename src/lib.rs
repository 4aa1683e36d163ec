//! lispy - a minimal Scheme-family expression evaluator
//!
//! This crate reads Scheme source text into symbolic expressions, evaluates
//! them against chained lexical environments with proper tail calls, and
//! prints the results back as source-like text.
//!
//! ```scheme
//! (define (count n) (if (= n 0) 'done (count (- n 1))))
//! (count 100000)          ; tail calls run in constant stack
//! (map (lambda (x) (* x x)) '(1 2 3))
//! `(1 ,(+ 1 1) ,@(list 3 4))
//! ```
//!
//! ## Pipeline
//!
//! text → [`tokenizer`] → [`reader`] → [`ast::Value`] → [`evaluator`]
//! (using [`environment::Environment`]) → [`ast::Value`] → [`printer`] → text
//!
//! ```
//! use lispy::evaluator::{eval, standard_environment};
//! use lispy::printer::print;
//! use lispy::reader::read;
//!
//! let env = standard_environment();
//! let expr = read("(* 10 (+ 8 8))").unwrap();
//! let result = eval(&expr, &env).unwrap();
//! assert_eq!(print(&result), "160");
//! ```
//!
//! ## Modules
//!
//! - `tokenizer`: splits source text into tokens
//! - `reader`: builds expressions from tokens, from strings or line streams
//! - `ast`: the value model (numbers, symbols, lists, procedures)
//! - `environment`: shared, chained binding frames
//! - `evaluator`: the trampolined evaluator and special forms
//! - `builtinops` / `mathlib`: primitive procedures of the standard environment
//! - `printer`: rendering values as text

use std::fmt;

use crate::builtinops::Arity;

/// Maximum nesting depth accepted by the reader
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum depth of non-tail evaluation nesting.
///
/// Tail calls do not count against this limit; only sub-expressions that
/// must be evaluated before their enclosing form can continue (operands,
/// `if` tests, `define` values) nest.
///
/// Each level takes a few kilobytes of native stack in unoptimized builds,
/// so reaching the limit needs more than a default 2 MiB thread stack. Run
/// deep evaluations through [`evaluator::with_eval_stack`].
pub const MAX_EVAL_DEPTH: usize = 1000;

/// Thread stack size that holds [`MAX_EVAL_DEPTH`] nested evaluations
pub const EVAL_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Reader configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadConfig {
    /// Nesting depth at which reading fails with [`SyntaxErrorKind::TooDeeplyNested`]
    pub max_depth: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        ReadConfig {
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

/// Categorizes the different kinds of syntax errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SyntaxErrorKind {
    /// Input ended where a token was expected (unclosed list, dangling quote)
    UnexpectedEof,
    /// A `)` appeared where an expression was expected
    UnexpectedClose,
    /// Extra input found after a complete expression
    TrailingContent,
    /// Expression nesting exceeded the configured read depth
    TooDeeplyNested,
    /// A special form was used with the wrong shape, e.g. `(if)`
    MalformedForm,
    /// Text that cannot be split into tokens
    InvalidSyntax,
}

/// A structured error describing malformed source or a malformed special form.
#[derive(Debug, PartialEq, Clone)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    /// The offending token or expression, if identifiable
    pub found: Option<String>,
}

impl SyntaxError {
    pub fn new(kind: SyntaxErrorKind, message: impl Into<String>, found: Option<String>) -> Self {
        SyntaxError {
            kind,
            message: message.into(),
            found,
        }
    }

    /// Create a SyntaxError with a kind and message but no offending text
    pub fn from_message(kind: SyntaxErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Syntax(SyntaxError),
    /// A literal token that cannot be converted into a value, e.g. an
    /// unterminated string
    ConversionError(String),
    UnboundVariable(String),
    ArityError {
        expected: Arity,
        got: usize,
        expression: Option<String>,
    },
    NotCallable(String),
    TypeError(String),
    EvalError(String),
}

impl Error {
    pub fn syntax(kind: SyntaxErrorKind, message: impl Into<String>) -> Self {
        Error::Syntax(SyntaxError::from_message(kind, message))
    }

    /// A malformed special form, carrying the rendered form as context
    pub fn malformed(message: impl Into<String>, form: String) -> Self {
        Error::Syntax(SyntaxError::new(
            SyntaxErrorKind::MalformedForm,
            message,
            Some(form),
        ))
    }

    /// Create an ArityError without expression context
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError naming the procedure that was called
    pub fn arity_error_with_expr(expected: Arity, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    /// The syntax error kind, if this is a syntax error
    pub fn syntax_kind(&self) -> Option<SyntaxErrorKind> {
        match self {
            Error::Syntax(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Syntax(e) => {
                write!(f, "SyntaxError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                Ok(())
            }
            Error::ConversionError(msg) => write!(f, "ConversionError: {msg}"),
            Error::UnboundVariable(var) => write!(f, "Unbound variable: {var}"),
            Error::ArityError {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: {expr}: expected {expected} arguments, got {got}"
                ),
                None => write!(f, "ArityError: expected {expected} arguments but got {got}"),
            },
            Error::NotCallable(what) => write!(f, "NotCallable: {what} is not a procedure"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<SyntaxError> for Error {
    fn from(err: SyntaxError) -> Self {
        Error::Syntax(err)
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod mathlib;
pub mod number;
pub mod printer;
pub mod reader;
pub mod tokenizer;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let cases = vec![
            (
                Error::syntax(SyntaxErrorKind::UnexpectedEof, "unexpected EOF"),
                "SyntaxError: unexpected EOF",
            ),
            (
                Error::malformed("if: expected 2 or 3 operands, got 0", "(if)".into()),
                "SyntaxError: if: expected 2 or 3 operands, got 0\nFound: (if)",
            ),
            (Error::UnboundVariable("x".into()), "Unbound variable: x"),
            (
                Error::arity_error(Arity::Exact(2), 3),
                "ArityError: expected exactly 2 arguments but got 3",
            ),
            (
                Error::arity_error_with_expr(Arity::AtLeast(1), 0, "max".into()),
                "ArityError: max: expected at least 1 arguments, got 0",
            ),
            (
                Error::NotCallable("5".into()),
                "NotCallable: 5 is not a procedure",
            ),
            (
                Error::ConversionError("unterminated string literal".into()),
                "ConversionError: unterminated string literal",
            ),
        ];

        for (i, (error, expected)) in cases.iter().enumerate() {
            assert_eq!(format!("{error}"), *expected, "case #{}", i + 1);
        }
    }

    #[test]
    fn test_eval_config_limits() {
        assert!(MAX_EVAL_DEPTH >= 1000);
        assert!(EVAL_STACK_SIZE / MAX_EVAL_DEPTH >= 64 * 1024);
    }

    #[test]
    fn test_syntax_kind() {
        let err = Error::syntax(SyntaxErrorKind::UnexpectedClose, "unexpected )");
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedClose));
        assert_eq!(Error::EvalError("x".into()).syntax_kind(), None);
        assert_eq!(ReadConfig::default().max_depth, MAX_PARSE_DEPTH);
    }
}
