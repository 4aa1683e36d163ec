//! Rendering values as source-like text.
//!
//! For pure data (numbers, symbols, strings, booleans and lists of them) the
//! output reads back to an equal value.

use std::fmt;

use crate::ast::{Complex, Delimiters, Number, Value, write_nested};

/// Render a value the way the REPL shows it
pub fn print(value: &Value) -> String {
    value.to_string()
}

fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        write!(f, "nan")
    } else if x.is_infinite() {
        write!(f, "{}", if x > 0.0 { "inf" } else { "-inf" })
    } else {
        // Debug always keeps a fractional part or exponent: 10.0, 1e100
        write!(f, "{x:?}")
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.real != 0.0 {
            write_float(f, self.real)?;
            if self.imaginary >= 0.0 || self.imaginary.is_nan() {
                write!(f, "+")?;
            }
        }
        write_float(f, self.imaginary)?;
        write!(f, "i")
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(x) => write_float(f, *x),
            Number::Complex(z) => write!(f, "{z}"),
        }
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

fn write_atom(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Number(n) => write!(f, "{n}"),
        Value::Symbol(s) => write!(f, "{s}"),
        Value::String(s) => write_string_literal(f, s),
        Value::Bool(true) => write!(f, "#t"),
        Value::Bool(false) => write!(f, "#f"),
        // Non-empty lists are expanded by write_nested
        Value::List(_) => write!(f, "()"),
        Value::Procedure(_) => write!(f, "#<procedure>"),
        Value::Builtin(builtin) => write!(f, "#<builtin:{}>", builtin.id),
        Value::Unspecified => write!(f, "#<unspecified>"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delimiters = Delimiters {
            open: "(",
            separator: " ",
            close: ")",
        };
        write_nested(f, self, &delimiters, write_atom)
    }
}
