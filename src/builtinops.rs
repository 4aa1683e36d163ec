//! Built-in operations registry.
//!
//! This module provides the registry of primitive procedures installed in the
//! standard environment. Each entry pairs a Scheme identifier with its
//! implementation and the number of arguments it accepts:
//!
//! ```scheme
//! (+ 1 2 3)            ; arithmetic over the numeric tower
//! (car '(1 2 3))       ; list access
//! (map abs '(-1 2 -3)) ; higher-order: calls back into the evaluator
//! ```
//!
//! ## Functions vs Higher-Order Operations
//!
//! - **Functions**: pure host functions over evaluated arguments (e.g., `+`, `not`, `car`)
//! - **Higher-order operations**: may invoke procedures passed as arguments
//!   (`apply`, `map`), so they receive the current evaluation depth
//!
//! Special forms (`if`, `define`, `lambda`, ...) control evaluation of their
//! operands and are handled directly by the evaluator, not by this registry.
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** following the signature `fn(args: &[Value]) -> Result<Value, Error>`
//! 2. **Add to BUILTIN_OPS** with its Scheme identifier and arity
//! 3. **Add tests** covering edge cases and error conditions
//!
//! Arity is validated before the implementation runs, so implementations may
//! rely on the argument count promised by their [`Arity`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::Error;
use crate::ast::{IntType, Number, Value, val};
use crate::evaluator::call_procedure;
use crate::mathlib::{self, float_to_int, real_arg};
use crate::printer::print;

/// The canonical erased signature of a host function
pub type OperationFn = dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync;

/// A host function that calls back into the evaluator at the given depth
pub type HigherOrderFn = fn(&[Value], usize) -> Result<Value, Error>;

/// Number of arguments an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive range
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::Any => true,
        }
    }

    /// Check if the given number of arguments is valid
    pub fn validate(&self, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error(*self, count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "between {min} and {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Represents the implementation of a built-in operation
#[derive(Clone)]
pub enum OpKind {
    /// Regular function that takes evaluated arguments and returns a value
    Function(Arc<OperationFn>),
    /// Operation that invokes procedures passed to it
    HigherOrder(HigherOrderFn),
}

impl fmt::Debug for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::HigherOrder(_) => write!(f, "HigherOrder(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The Scheme identifier for this operation
    pub id: &'static str,
    pub kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // Compare operations by their id, which uniquely identifies them
        self.id == other.id
    }
}

/// A primitive procedure as a runtime value
#[derive(Clone)]
pub struct Builtin {
    pub id: String,
    pub kind: OpKind,
    pub arity: Arity,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({}, {:?}, {:?})", self.id, self.kind, self.arity)
    }
}

impl From<&BuiltinOp> for Builtin {
    fn from(op: &BuiltinOp) -> Self {
        Builtin {
            id: op.id.to_owned(),
            kind: op.kind.clone(),
            arity: op.arity,
        }
    }
}

impl Builtin {
    pub fn function(id: impl Into<String>, arity: Arity, func: Arc<OperationFn>) -> Self {
        Builtin {
            id: id.into(),
            kind: OpKind::Function(func),
            arity,
        }
    }

    /// Validate the argument count, then run the operation.
    pub(crate) fn invoke(&self, args: &[Value], depth: usize) -> Result<Value, Error> {
        if !self.arity.accepts(args.len()) {
            return Err(Error::arity_error_with_expr(
                self.arity,
                args.len(),
                self.id.clone(),
            ));
        }
        match &self.kind {
            OpKind::Function(func) => func(args),
            OpKind::HigherOrder(func) => func(args, depth),
        }
    }
}

//
// Builtin Function Implementations
//

fn number(value: &Value) -> Result<Number, Error> {
    Number::try_from(value)
}

fn numbers(args: &[Value]) -> Result<Vec<Number>, Error> {
    args.iter().map(number).collect()
}

fn list_arg<'a>(value: &'a Value, op: &str) -> Result<&'a [Value], Error> {
    value
        .as_list()
        .ok_or_else(|| Error::TypeError(format!("{op} requires a list, got {}", value.type_name())))
}

/// `+` adds numbers, and concatenates strings or lists
fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    match args.first() {
        Some(Value::String(_)) => {
            let mut result = String::new();
            for arg in args {
                match arg {
                    Value::String(s) => result.push_str(s),
                    other => {
                        return Err(Error::TypeError(format!(
                            "cannot concatenate string and {}",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::String(result))
        }
        Some(Value::List(_)) => {
            let mut result = Vec::new();
            for arg in args {
                result.extend_from_slice(list_arg(arg, "list concatenation")?);
            }
            Ok(Value::list(result))
        }
        _ => {
            let mut sum = Number::Int(0);
            for n in numbers(args)? {
                sum = sum.checked_add(n)?;
            }
            Ok(Value::Number(sum))
        }
    }
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    let nums = numbers(args)?;
    let Some((&first, rest)) = nums.split_first() else {
        return Err(Error::arity_error(Arity::AtLeast(1), 0));
    };
    if rest.is_empty() {
        return first.checked_neg().map(Value::Number);
    }
    let mut result = first;
    for &n in rest {
        result = result.checked_sub(n)?;
    }
    Ok(Value::Number(result))
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    let mut product = Number::Int(1);
    for n in numbers(args)? {
        product = product.checked_mul(n)?;
    }
    Ok(Value::Number(product))
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    let nums = numbers(args)?;
    let Some((&first, rest)) = nums.split_first() else {
        return Err(Error::arity_error(Arity::AtLeast(1), 0));
    };
    if rest.is_empty() {
        return Number::Int(1).checked_div(first).map(Value::Number);
    }
    let mut result = first;
    for &n in rest {
        result = result.checked_div(n)?;
    }
    Ok(Value::Number(result))
}

// Macro to generate chained numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $ordering:pat) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let nums = numbers(args)?;
            // All adjacent pairs must satisfy the comparison
            for pair in nums.windows(2) {
                if !matches!(pair[0].compare(pair[1])?, Some($ordering)) {
                    return Ok(val(false));
                }
            }
            Ok(val(true))
        }
    };
}

numeric_comparison!(builtin_lt, Ordering::Less);
numeric_comparison!(builtin_gt, Ordering::Greater);
numeric_comparison!(builtin_le, Ordering::Less | Ordering::Equal);
numeric_comparison!(builtin_ge, Ordering::Greater | Ordering::Equal);

fn builtin_equal(args: &[Value]) -> Result<Value, Error> {
    Ok(val(args.windows(2).all(|pair| pair[0] == pair[1])))
}

fn builtin_eq(args: &[Value]) -> Result<Value, Error> {
    Ok(val(args.windows(2).all(|pair| pair[0].is_identical(&pair[1]))))
}

fn builtin_abs(args: &[Value]) -> Result<Value, Error> {
    number(&args[0])?.checked_abs().map(Value::Number)
}

fn builtin_expt(args: &[Value]) -> Result<Value, Error> {
    number(&args[0])?
        .checked_pow(number(&args[1])?)
        .map(Value::Number)
}

/// `(round x)` rounds half to even and yields an integer;
/// `(round x n)` keeps `n` decimal places and yields a float.
fn builtin_round(args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::Number(Number::Int(n))] => Ok(val(*n)),
        [x] => float_to_int(real_arg(x, "round")?.round_ties_even()).map(val),
        [x, digits] => {
            let x = real_arg(x, "round")?;
            let digits = IntType::try_from(digits)?;
            let digits = i32::try_from(digits)
                .map_err(|_| Error::EvalError("round: too many digits".to_owned()))?;
            let scale = 10f64.powi(digits);
            Ok(val((x * scale).round_ties_even() / scale))
        }
        _ => Err(Error::arity_error(Arity::Range(1, 2), args.len())),
    }
}

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    match list_arg(&args[0], "car")?.first() {
        Some(first) => Ok(first.clone()),
        None => Err(Error::EvalError("car of empty list".into())),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    match list_arg(&args[0], "cdr")?.split_first() {
        Some((_, rest)) => Ok(Value::list(rest.to_vec())),
        None => Err(Error::EvalError("cdr of empty list".into())),
    }
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    match &args[1] {
        Value::List(tail) => {
            let mut new_list = Vec::with_capacity(tail.len() + 1);
            new_list.push(args[0].clone());
            new_list.extend_from_slice(tail);
            Ok(Value::list(new_list))
        }
        // Improper lists (dotted pairs) are not representable
        _ => Err(Error::TypeError(
            "cons requires a list as second argument".to_owned(),
        )),
    }
}

fn builtin_length(args: &[Value]) -> Result<Value, Error> {
    let len = match &args[0] {
        Value::List(items) => items.len(),
        Value::String(s) => s.chars().count(),
        other => {
            return Err(Error::TypeError(format!(
                "length requires a list or string, got {}",
                other.type_name()
            )));
        }
    };
    Ok(val(len as IntType))
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::list(args.to_vec()))
}

fn builtin_is_list(args: &[Value]) -> Result<Value, Error> {
    Ok(val(matches!(args[0], Value::List(_))))
}

fn builtin_max(args: &[Value]) -> Result<Value, Error> {
    extremum(args, Ordering::Greater)
}

fn builtin_min(args: &[Value]) -> Result<Value, Error> {
    extremum(args, Ordering::Less)
}

/// The first argument that no later argument beats in the `wanted` direction
fn extremum(args: &[Value], wanted: Ordering) -> Result<Value, Error> {
    let nums = numbers(args)?;
    let Some((&first, rest)) = nums.split_first() else {
        return Err(Error::arity_error(Arity::AtLeast(1), 0));
    };
    let mut best = first;
    for &n in rest {
        if n.compare(best)? == Some(wanted) {
            best = n;
        }
    }
    Ok(Value::Number(best))
}

fn builtin_not(args: &[Value]) -> Result<Value, Error> {
    Ok(val(!args[0].is_truthy()))
}

fn builtin_null(args: &[Value]) -> Result<Value, Error> {
    Ok(val(args[0].is_nil()))
}

fn builtin_is_number(args: &[Value]) -> Result<Value, Error> {
    Ok(val(matches!(args[0], Value::Number(_))))
}

fn builtin_is_procedure(args: &[Value]) -> Result<Value, Error> {
    Ok(val(args[0].is_procedure()))
}

fn builtin_is_symbol(args: &[Value]) -> Result<Value, Error> {
    Ok(val(matches!(args[0], Value::Symbol(_))))
}

fn builtin_print(args: &[Value]) -> Result<Value, Error> {
    let rendered: Vec<String> = args.iter().map(print).collect();
    println!("{}", rendered.join(" "));
    Ok(Value::Unspecified)
}

fn builtin_begin(args: &[Value]) -> Result<Value, Error> {
    Ok(args.last().cloned().unwrap_or(Value::Unspecified))
}

fn builtin_apply(args: &[Value], depth: usize) -> Result<Value, Error> {
    let arguments = list_arg(&args[1], "apply")?;
    call_procedure(&args[0], arguments.to_vec(), depth)
}

/// `(map f l1 l2 ...)` stops at the end of the shortest list
fn builtin_map(args: &[Value], depth: usize) -> Result<Value, Error> {
    let Some((func, lists)) = args.split_first() else {
        return Err(Error::arity_error(Arity::AtLeast(2), 0));
    };
    let lists = lists
        .iter()
        .map(|list| list_arg(list, "map"))
        .collect::<Result<Vec<_>, _>>()?;
    let count = lists.iter().map(|list| list.len()).min().unwrap_or(0);

    let mut results = Vec::with_capacity(count);
    for i in 0..count {
        let call_args = lists.iter().map(|list| list[i].clone()).collect();
        results.push(call_procedure(func, call_args, depth)?);
    }
    Ok(Value::list(results))
}

fn function(func: fn(&[Value]) -> Result<Value, Error>) -> OpKind {
    let func: Arc<OperationFn> = Arc::new(func);
    OpKind::Function(func)
}

/// Global registry of all built-in operations, including the numeric library.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    let op = |id, kind, arity| BuiltinOp { id, kind, arity };

    let mut ops = vec![
        // Arithmetic operations
        op("+", function(builtin_add), Arity::Any),
        op("-", function(builtin_sub), Arity::AtLeast(1)),
        op("*", function(builtin_mul), Arity::Any),
        op("/", function(builtin_div), Arity::AtLeast(1)),
        op("abs", function(builtin_abs), Arity::Exact(1)),
        op("expt", function(builtin_expt), Arity::Exact(2)),
        op("round", function(builtin_round), Arity::Range(1, 2)),
        op("max", function(builtin_max), Arity::AtLeast(1)),
        op("min", function(builtin_min), Arity::AtLeast(1)),
        // Comparison operations
        op(">", function(builtin_gt), Arity::AtLeast(2)),
        op("<", function(builtin_lt), Arity::AtLeast(2)),
        op(">=", function(builtin_ge), Arity::AtLeast(2)),
        op("<=", function(builtin_le), Arity::AtLeast(2)),
        op("=", function(builtin_equal), Arity::AtLeast(2)),
        op("equal?", function(builtin_equal), Arity::Exact(2)),
        op("eq?", function(builtin_eq), Arity::Exact(2)),
        // Logical operations
        op("not", function(builtin_not), Arity::Exact(1)),
        // List operations
        op("append", function(builtin_add), Arity::Any),
        op("car", function(builtin_car), Arity::Exact(1)),
        op("cdr", function(builtin_cdr), Arity::Exact(1)),
        op("cons", function(builtin_cons), Arity::Exact(2)),
        op("length", function(builtin_length), Arity::Exact(1)),
        op("list", function(builtin_list), Arity::Any),
        op("list?", function(builtin_is_list), Arity::Exact(1)),
        op("null?", function(builtin_null), Arity::Exact(1)),
        // Type predicates
        op("number?", function(builtin_is_number), Arity::Exact(1)),
        op("procedure?", function(builtin_is_procedure), Arity::Exact(1)),
        op("symbol?", function(builtin_is_symbol), Arity::Exact(1)),
        // Control and output
        op("begin", function(builtin_begin), Arity::AtLeast(1)),
        op("print", function(builtin_print), Arity::Any),
        op("apply", OpKind::HigherOrder(builtin_apply), Arity::Exact(2)),
        op("map", OpKind::HigherOrder(builtin_map), Arity::AtLeast(2)),
    ];
    ops.extend(mathlib::math_ops());
    ops
});

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its Scheme identifier
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}
