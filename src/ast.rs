//! This module defines the core value types of the interpreter. The main enum,
//! [`Value`], covers every Scheme datum: numbers, symbols, strings, booleans,
//! lists, user-defined procedures (closures) and host builtins. Code and data
//! share this one representation, so a parsed program is itself a [`Value`].
//!
//! Ergonomic helper functions such as [`val`], [`sym`], and [`nil`] are
//! provided for convenient construction in code and tests, along with
//! conversion traits for common Rust types (integers, floats, strings,
//! arrays, slices and vectors). Equality follows Scheme value semantics:
//! numbers compare after promotion, lists element-wise, procedures by
//! identity.

use std::fmt;
use std::mem;
use std::ops::Deref;
use std::rc::Rc;
use std::slice;

use crate::Error;
use crate::builtinops::{Arity, Builtin};
use crate::environment::Environment;
use crate::mathlib::float_to_int;
pub use crate::number::{Complex, IntType, Number};

/// Core value type of the interpreter
///
/// To build a value, use the ergonomic helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for empty lists
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// Integers, floats and complex numbers
    Number(Number),
    /// Symbols (identifiers and special-form keywords)
    Symbol(String),
    /// String literals
    String(String),
    /// Boolean values
    Bool(bool),
    /// Lists; the empty list is nil
    List(ValueList),
    /// User-defined procedures (closures)
    Procedure(Rc<Procedure>),
    /// Host-provided primitive procedures
    Builtin(Rc<Builtin>),
    /// Result of forms evaluated for effect (e.g. `define`).
    /// These values never equal themselves or any other value
    Unspecified,
}

/// Shared, immutable list storage.
///
/// Dropping, printing and comparing lists never recurse once per nesting
/// level, so a list nested arbitrarily deep at runtime is as safe to handle
/// as a flat one.
#[derive(Clone)]
pub struct ValueList(Rc<[Value]>);

impl ValueList {
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    /// Whether both handles share the same storage
    pub fn ptr_eq(a: &ValueList, b: &ValueList) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl Deref for ValueList {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for ValueList {
    fn from(elements: Vec<Value>) -> Self {
        ValueList(Rc::from(elements))
    }
}

impl FromIterator<Value> for ValueList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        ValueList(iter.into_iter().collect())
    }
}

impl Drop for ValueList {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        if let Some(items) = Rc::get_mut(&mut self.0) {
            take_nested(items, &mut pending);
        }
        release(pending);
    }
}

/// Move out the elements that may own further lists or closures
fn take_nested(items: &mut [Value], pending: &mut Vec<Value>) {
    for item in items {
        if matches!(item, Value::List(_) | Value::Procedure(_)) {
            pending.push(mem::replace(item, Value::Unspecified));
        }
    }
}

/// Drop values one level at a time from a heap stack. Storage still shared
/// with another handle is only released, leaving its contents alone.
fn release(mut pending: Vec<Value>) {
    while let Some(mut value) = pending.pop() {
        match &mut value {
            Value::List(list) => {
                if let Some(items) = Rc::get_mut(&mut list.0) {
                    take_nested(items, &mut pending);
                }
            }
            Value::Procedure(procedure) => {
                if let Some(procedure) = Rc::get_mut(procedure) {
                    procedure.take_parts(&mut pending);
                }
            }
            _ => {}
        }
    }
}

/// Formal parameters of a procedure: required names plus an optional rest
/// parameter collecting surplus arguments as a list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    pub required: Vec<String>,
    pub rest: Option<String>,
}

impl Params {
    pub fn fixed<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Params {
            required: names.into_iter().map(Into::into).collect(),
            rest: None,
        }
    }

    /// How many arguments a call must supply
    pub fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::AtLeast(self.required.len()),
            None => Arity::Exact(self.required.len()),
        }
    }
}

/// A closure: parameters, body and the environment it was created in.
pub struct Procedure {
    pub params: Params,
    pub body: Value,
    pub env: Environment,
}

impl Procedure {
    /// Move out the body and, if no other handle shares it, the captured
    /// frame's bindings. A chain of closures each capturing the previous one
    /// is then released iteratively.
    fn take_parts(&mut self, pending: &mut Vec<Value>) {
        pending.push(mem::replace(&mut self.body, Value::Unspecified));
        self.env.take_unique_bindings(pending);
    }
}

impl Drop for Procedure {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_parts(&mut pending);
        release(pending);
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The captured environment may contain this procedure; don't recurse into it.
        write!(f, "Procedure(params={:?}, body={:?})", self.params, self.body)
    }
}

/// List delimiters used by [`write_nested`]
pub(crate) struct Delimiters {
    pub open: &'static str,
    pub separator: &'static str,
    pub close: &'static str,
}

/// Write `value`, expanding non-empty lists with `delimiters` and handing
/// every other value (empty lists included) to `atom`. Nesting is tracked
/// on a heap stack.
pub(crate) fn write_nested<'a>(
    f: &mut fmt::Formatter<'_>,
    value: &'a Value,
    delimiters: &Delimiters,
    atom: fn(&mut fmt::Formatter<'_>, &Value) -> fmt::Result,
) -> fmt::Result {
    // Open lists: remaining elements, and whether one was written already
    let mut open: Vec<(slice::Iter<'a, Value>, bool)> = Vec::new();
    let mut next = Some(value);

    loop {
        match next.take() {
            Some(Value::List(items)) if !items.is_empty() => {
                f.write_str(delimiters.open)?;
                open.push((items.iter(), false));
            }
            Some(other) => atom(f, other)?,
            None => {}
        }

        let Some((items, started)) = open.last_mut() else {
            return Ok(());
        };
        match items.next() {
            Some(item) => {
                if *started {
                    f.write_str(delimiters.separator)?;
                }
                *started = true;
                next = Some(item);
            }
            None => {
                f.write_str(delimiters.close)?;
                open.pop();
            }
        }
    }
}

fn debug_atom(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Number(n) => write!(f, "Number({n})"),
        Value::Symbol(s) => write!(f, "Symbol({s})"),
        Value::String(s) => write!(f, "String({s:?})"),
        Value::Bool(b) => write!(f, "Bool({b})"),
        Value::List(_) => write!(f, "List()"),
        Value::Procedure(p) => write!(f, "{p:?}"),
        Value::Builtin(b) => write!(f, "Builtin({})", b.id),
        Value::Unspecified => write!(f, "Unspecified"),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delimiters = Delimiters {
            open: "List(",
            separator: ", ",
            close: ")",
        };
        write_nested(f, self, &delimiters, debug_atom)
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(Number::Float(x))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<Complex> for Value {
    fn from(z: Complex) -> Self {
        Value::Number(Number::Complex(z))
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(Number::Int(IntType::from(n)))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(IntType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::List(slice.iter().cloned().map(Into::into).collect())
    }
}

// Fallible conversions from `Value` back into primitive Rust types.

impl TryFrom<&Value> for Number {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Number, Error> {
        if let Value::Number(n) = value {
            Ok(*n)
        } else {
            Err(Error::TypeError(format!(
                "expected number, got {}",
                value.type_name()
            )))
        }
    }
}

impl TryFrom<&Value> for IntType {
    type Error = Error;

    fn try_from(value: &Value) -> Result<IntType, Error> {
        match value {
            Value::Number(Number::Int(n)) => Ok(*n),
            // Infinities and NaN have a NaN fraction
            Value::Number(Number::Float(x)) if x.fract() == 0.0 => float_to_int(*x),
            _ => Err(Error::TypeError(format!(
                "expected integer, got {}",
                value.type_name()
            ))),
        }
    }
}

impl TryFrom<&Value> for bool {
    type Error = Error;

    fn try_from(value: &Value) -> Result<bool, Error> {
        if let Value::Bool(b) = value {
            Ok(*b)
        } else {
            Err(Error::TypeError(format!(
                "expected boolean, got {}",
                value.type_name()
            )))
        }
    }
}

/// Helper function for creating symbols - works great in mixed lists!
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values - works great in mixed lists!
/// Accepts any type that can be converted to Value
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating empty lists (nil)
pub fn nil() -> Value {
    Value::List(ValueList::from(Vec::new()))
}

impl Value {
    /// Build a list value from its elements
    pub fn list(elements: Vec<Value>) -> Value {
        Value::List(ValueList::from(elements))
    }

    /// Check if a value represents nil (empty list)
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }

    /// Only `#f` is false; every other value, including `0`, `""` and `()`, is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::Procedure(_) | Value::Builtin(_))
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Short type description used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(Number::Int(_)) => "integer",
            Value::Number(Number::Float(_)) => "float",
            Value::Number(Number::Complex(_)) => "complex",
            Value::Symbol(_) => "symbol",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
            Value::Procedure(_) | Value::Builtin(_) => "procedure",
            Value::Unspecified => "unspecified",
        }
    }

    /// Identity comparison (`eq?`): lists and procedures are the same object,
    /// atoms are equal values. All empty lists are identical.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                (a.is_empty() && b.is_empty()) || ValueList::ptr_eq(a, b)
            }
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

impl Value {
    /// Equality of two values that are not both lists
    fn atom_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            // Compare builtins by id string, not function pointer
            (Value::Builtin(a), Value::Builtin(b)) => a.id == b.id,
            (Value::Unspecified, _) | (_, Value::Unspecified) => false,
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some(pair) = pending.pop() {
            match pair {
                (Value::List(a), Value::List(b)) => {
                    if a.len() != b.len() {
                        return false;
                    }
                    pending.extend(a.iter().zip(b.iter()));
                }
                (a, b) => {
                    if !a.atom_eq(b) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod helper_function_tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        // (helper_result, expected_value)
        let test_cases = vec![
            (val(42), Value::Number(Number::Int(42))),
            (val(-17), Value::Number(Number::Int(-17))),
            (val(4294967295u32), Value::Number(Number::Int(4294967295))),
            (val(255u8), Value::Number(Number::Int(255))),
            (val(-128i8), Value::Number(Number::Int(-128))),
            (val(IntType::MAX), Value::Number(Number::Int(IntType::MAX))),
            (val(2.5), Value::Number(Number::Float(2.5))),
            (val(true), Value::Bool(true)),
            (val("hello"), Value::String("hello".to_owned())),
            (val(""), Value::String(String::new())),
            (sym("foo-bar?"), Value::Symbol("foo-bar?".to_owned())),
            (sym(String::from("test")), Value::Symbol("test".to_owned())),
            (nil(), Value::list(vec![])),
            (
                val([1, 2, 3]),
                Value::list(vec![val(1), val(2), val(3)]),
            ),
            (
                val(vec![sym("operation"), val(42), val("result"), val(true)]),
                Value::list(vec![
                    Value::Symbol("operation".to_owned()),
                    Value::Number(Number::Int(42)),
                    Value::String("result".to_owned()),
                    Value::Bool(true),
                ]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_unspecified_values() {
        // Unspecified never equals anything, including itself
        let unspec = Value::Unspecified;
        assert_ne!(unspec, unspec);
        assert_ne!(unspec, Value::Unspecified);
        assert_ne!(unspec, val(42));
    }

    #[test]
    fn test_truthiness() {
        let truthy = [val(0), val(""), nil(), val(true), sym("x"), val(0.0)];
        for value in &truthy {
            assert!(value.is_truthy(), "{value:?} should be truthy");
        }
        assert!(!val(false).is_truthy());
    }

    #[test]
    fn test_numeric_equality_across_representations() {
        assert_eq!(val(1), val(1.0));
        assert_eq!(val([1, 2]), val([1.0, 2.0]));
        assert_ne!(val("1"), val(1));
        assert_ne!(sym("a"), val("a"));
    }

    #[test]
    fn test_identity() {
        let list = val([1, 2, 3]);
        let same = list.clone();
        let copy = val([1, 2, 3]);
        assert!(list.is_identical(&same));
        assert!(!list.is_identical(&copy));
        assert!(nil().is_identical(&nil()));
        assert!(sym("a").is_identical(&sym("a")));
    }

    #[test]
    fn test_params_arity() {
        assert_eq!(Params::fixed(["a", "b"]).arity(), Arity::Exact(2));
        let variadic = Params {
            required: vec!["a".into()],
            rest: Some("rest".into()),
        };
        assert_eq!(variadic.arity(), Arity::AtLeast(1));
    }

    fn nested(depth: usize) -> Value {
        let mut value = nil();
        for _ in 0..depth {
            value = Value::list(vec![value, val(1)]);
        }
        value
    }

    #[test]
    fn test_deeply_nested_values() {
        let deep = nested(200_000);
        assert_eq!(deep, nested(200_000));
        assert_ne!(deep, nested(199_999));
        assert!(format!("{deep:?}").starts_with("List(List(List("));

        // Shared storage survives dropping one handle
        let shared = deep.clone();
        drop(deep);
        assert_eq!(shared.as_list().map(<[Value]>::len), Some(2));
        drop(shared);
    }

    #[test]
    fn test_integer_conversion() {
        let cases: Vec<(Value, Option<IntType>)> = vec![
            (val(7), Some(7)),
            (val(-3.0), Some(-3)),
            (val(2.5), None),
            (val(1e300), None),
            (val(f64::INFINITY), None),
            (val(f64::NAN), None),
            (val("7"), None),
        ];

        for (i, (value, expected)) in cases.iter().enumerate() {
            assert_eq!(IntType::try_from(value).ok(), *expected, "case #{}", i + 1);
        }
        assert!(matches!(
            IntType::try_from(&val(1e300)),
            Err(Error::EvalError(_))
        ));
    }
}
