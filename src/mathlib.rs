//! Numeric library: constants and real-valued math functions.
//!
//! Functions accept integers and floats; complex arguments are rejected
//! with a type error. A NaN result from non-NaN input is reported as a
//! math domain error, and an infinite result from finite input as a math
//! range error, instead of being returned. Special functions without a
//! `std` counterpart come from `libm`.

use std::f64::consts;
use std::sync::Arc;

use crate::Error;
use crate::ast::{IntType, Number, Value, val};
use crate::builtinops::{Arity, BuiltinOp, OpKind, OperationFn};

/// Named constants bound in the standard environment
pub const CONSTANTS: [(&str, f64); 5] = [
    ("pi", consts::PI),
    ("e", consts::E),
    ("tau", consts::TAU),
    ("inf", f64::INFINITY),
    ("nan", f64::NAN),
];

fn domain_error() -> Error {
    Error::EvalError("math domain error".to_owned())
}

fn range_error() -> Error {
    Error::EvalError("math range error".to_owned())
}

fn overflow(op: &str) -> Error {
    Error::EvalError(format!("Integer overflow in {op}"))
}

pub(crate) fn real_arg(value: &Value, op: &str) -> Result<f64, Error> {
    Number::try_from(value)?
        .as_real()
        .ok_or_else(|| Error::TypeError(format!("{op} requires a real number")))
}

/// Convert an integral float to an exact integer, failing outside `i64` range
pub(crate) fn float_to_int(x: f64) -> Result<IntType, Error> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    if x.is_finite() && (-LIMIT..LIMIT).contains(&x) {
        Ok(x as IntType)
    } else {
        Err(Error::EvalError(format!("cannot convert {x:?} to integer")))
    }
}

fn checked_float(inputs: &[f64], result: f64) -> Result<f64, Error> {
    if result.is_nan() && !inputs.iter().any(|x| x.is_nan()) {
        Err(domain_error())
    } else if result.is_infinite() && inputs.iter().all(|x| x.is_finite()) {
        Err(range_error())
    } else {
        Ok(result)
    }
}

fn checked_result(inputs: &[f64], result: f64) -> Result<Value, Error> {
    checked_float(inputs, result).map(val)
}

/// A list argument of real numbers
fn real_list(value: &Value, op: &str) -> Result<Vec<f64>, Error> {
    value
        .as_list()
        .ok_or_else(|| Error::TypeError(format!("{op} requires a list, got {}", value.type_name())))?
        .iter()
        .map(|x| real_arg(x, op))
        .collect()
}

fn non_negative(value: &Value, op: &str) -> Result<IntType, Error> {
    let n = IntType::try_from(value)?;
    if n < 0 {
        return Err(Error::EvalError(format!(
            "{op}() argument must be a non-negative integer"
        )));
    }
    Ok(n)
}

fn unary(id: &'static str, func: fn(f64) -> f64) -> BuiltinOp {
    let op: Arc<OperationFn> = Arc::new(move |args: &[Value]| {
        let x = real_arg(&args[0], id)?;
        checked_result(&[x], func(x))
    });
    BuiltinOp {
        id,
        kind: OpKind::Function(op),
        arity: Arity::Exact(1),
    }
}

fn binary(id: &'static str, func: fn(f64, f64) -> f64) -> BuiltinOp {
    let op: Arc<OperationFn> = Arc::new(move |args: &[Value]| {
        let x = real_arg(&args[0], id)?;
        let y = real_arg(&args[1], id)?;
        checked_result(&[x, y], func(x, y))
    });
    BuiltinOp {
        id,
        kind: OpKind::Function(op),
        arity: Arity::Exact(2),
    }
}

/// Rounding functions yield exact integers
fn rounding(id: &'static str, func: fn(f64) -> f64) -> BuiltinOp {
    let op: Arc<OperationFn> = Arc::new(move |args: &[Value]| match &args[0] {
        Value::Number(Number::Int(n)) => Ok(val(*n)),
        other => float_to_int(func(real_arg(other, id)?)).map(val),
    });
    BuiltinOp {
        id,
        kind: OpKind::Function(op),
        arity: Arity::Exact(1),
    }
}

fn predicate(id: &'static str, func: fn(f64) -> bool) -> BuiltinOp {
    let op: Arc<OperationFn> = Arc::new(move |args: &[Value]| Ok(val(func(real_arg(&args[0], id)?))));
    BuiltinOp {
        id,
        kind: OpKind::Function(op),
        arity: Arity::Exact(1),
    }
}

/// `(log x)` is the natural logarithm, `(log x base)` divides by `ln(base)`
fn math_log(args: &[Value]) -> Result<Value, Error> {
    let x = real_arg(&args[0], "log")?;
    if x == 0.0 {
        return Err(domain_error());
    }
    let ln_x = x.ln();
    match args.get(1) {
        None => checked_result(&[x], ln_x),
        Some(base) => {
            let base = real_arg(base, "log")?;
            if base == 0.0 {
                return Err(domain_error());
            }
            let ln_base = base.ln();
            if ln_base == 0.0 {
                return Err(Error::EvalError("division by zero".to_owned()));
            }
            checked_result(&[x, base], ln_x / ln_base)
        }
    }
}

fn math_factorial(args: &[Value]) -> Result<Value, Error> {
    let n = IntType::try_from(&args[0])?;
    if n < 0 {
        return Err(Error::EvalError(
            "factorial() not defined for negative values".to_owned(),
        ));
    }
    let mut result: IntType = 1;
    for k in 2..=n {
        result = result
            .checked_mul(k)
            .ok_or_else(|| overflow("factorial"))?;
    }
    Ok(val(result))
}

/// Greatest common divisor of any number of integers; `(gcd)` is 0
fn math_gcd(args: &[Value]) -> Result<Value, Error> {
    let mut result: u64 = 0;
    for arg in args {
        result = gcd_u64(result, IntType::try_from(arg)?.unsigned_abs());
    }
    IntType::try_from(result).map(val).map_err(|_| overflow("gcd"))
}

/// `gamma` and `lgamma` have poles at zero and the negative integers
fn gamma_like(id: &'static str, func: fn(f64) -> f64) -> BuiltinOp {
    let op: Arc<OperationFn> = Arc::new(move |args: &[Value]| {
        let x = real_arg(&args[0], id)?;
        if x <= 0.0 && x.fract() == 0.0 {
            return Err(domain_error());
        }
        checked_result(&[x], func(x))
    });
    BuiltinOp {
        id,
        kind: OpKind::Function(op),
        arity: Arity::Exact(1),
    }
}

fn gcd_u64(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Least common multiple of any number of integers; `(lcm)` is 1
fn math_lcm(args: &[Value]) -> Result<Value, Error> {
    let mut result: u64 = 1;
    for arg in args {
        let n = IntType::try_from(arg)?.unsigned_abs();
        if n == 0 || result == 0 {
            result = 0;
            continue;
        }
        result = (result / gcd_u64(result, n))
            .checked_mul(n)
            .ok_or_else(|| overflow("lcm"))?;
    }
    IntType::try_from(result).map(val).map_err(|_| overflow("lcm"))
}

fn math_isqrt(args: &[Value]) -> Result<Value, Error> {
    Ok(val(non_negative(&args[0], "isqrt")?.isqrt()))
}

/// Ways to choose `k` of `n` items without order
fn math_comb(args: &[Value]) -> Result<Value, Error> {
    let n = non_negative(&args[0], "comb")?;
    let k = non_negative(&args[1], "comb")?;
    if k > n {
        return Ok(val(0));
    }
    let k = k.min(n - k);
    // C(n, i + 1) = C(n, i) * (n - i) / (i + 1) is exact at every step
    let mut result: i128 = 1;
    for i in 0..k {
        result = result * i128::from(n - i) / i128::from(i + 1);
        if result > i128::from(IntType::MAX) {
            return Err(overflow("comb"));
        }
    }
    IntType::try_from(result).map(val).map_err(|_| overflow("comb"))
}

/// Ways to choose `k` of `n` items in order; `k` defaults to `n`
fn math_perm(args: &[Value]) -> Result<Value, Error> {
    let n = non_negative(&args[0], "perm")?;
    let k = match args.get(1) {
        Some(k) => non_negative(k, "perm")?,
        None => n,
    };
    if k > n {
        return Ok(val(0));
    }
    let mut result: IntType = 1;
    for factor in (0..k).map(|i| n - i) {
        result = result.checked_mul(factor).ok_or_else(|| overflow("perm"))?;
    }
    Ok(val(result))
}

/// `x * 2^exp`
fn math_ldexp(args: &[Value]) -> Result<Value, Error> {
    let x = real_arg(&args[0], "ldexp")?;
    // Exponents beyond i32 saturate to zero or infinity either way
    let exp = IntType::try_from(&args[1])?.clamp(IntType::from(i32::MIN), IntType::from(i32::MAX));
    let exp = i32::try_from(exp).map_err(|_| range_error())?;
    checked_result(&[x], libm::ldexp(x, exp))
}

/// `(frexp x)` is `(m e)` with `x = m * 2^e` and `0.5 <= |m| < 1`
fn math_frexp(args: &[Value]) -> Result<Value, Error> {
    let x = real_arg(&args[0], "frexp")?;
    let (mantissa, exp) = libm::frexp(x);
    Ok(Value::list(vec![val(mantissa), val(exp)]))
}

/// `(modf x)` is `(fractional integral)`, both carrying the sign of `x`
fn math_modf(args: &[Value]) -> Result<Value, Error> {
    let x = real_arg(&args[0], "modf")?;
    let integral = x.trunc();
    let fractional = if x.is_infinite() {
        0.0f64.copysign(x)
    } else {
        (x - integral).copysign(x)
    };
    Ok(Value::list(vec![val(fractional), val(integral)]))
}

/// `(isclose a b [rel_tol [abs_tol]])` with a relative tolerance of 1e-9
/// and an absolute tolerance of 0 by default
fn math_isclose(args: &[Value]) -> Result<Value, Error> {
    let a = real_arg(&args[0], "isclose")?;
    let b = real_arg(&args[1], "isclose")?;
    let rel_tol = args.get(2).map_or(Ok(1e-9), |t| real_arg(t, "isclose"))?;
    let abs_tol = args.get(3).map_or(Ok(0.0), |t| real_arg(t, "isclose"))?;
    if rel_tol < 0.0 || abs_tol < 0.0 {
        return Err(Error::EvalError(
            "isclose: tolerances must be non-negative".to_owned(),
        ));
    }
    if a == b {
        return Ok(val(true));
    }
    if a.is_infinite() || b.is_infinite() {
        return Ok(val(false));
    }
    let diff = (b - a).abs();
    Ok(val(
        diff <= (rel_tol * b).abs() || diff <= (rel_tol * a).abs() || diff <= abs_tol,
    ))
}

/// Sum of a list of reals without intermediate rounding loss, kept as
/// non-overlapping partial sums
fn math_fsum(args: &[Value]) -> Result<Value, Error> {
    let values = real_list(&args[0], "fsum")?;
    if values.iter().any(|x| !x.is_finite()) {
        return checked_result(&values, values.iter().sum());
    }

    let mut partials: Vec<f64> = Vec::new();
    for &value in &values {
        let mut x = value;
        let mut kept = 0;
        for i in 0..partials.len() {
            let mut y = partials[i];
            if x.abs() < y.abs() {
                (x, y) = (y, x);
            }
            let hi = x + y;
            if hi.is_infinite() {
                return Err(range_error());
            }
            let lo = y - (hi - x);
            if lo != 0.0 {
                partials[kept] = lo;
                kept += 1;
            }
            x = hi;
        }
        partials.truncate(kept);
        partials.push(x);
    }

    // Add the partials from the largest down until the result is inexact
    let Some(mut hi) = partials.pop() else {
        return Ok(val(0.0));
    };
    let mut lo = 0.0;
    while let Some(y) = partials.pop() {
        let x = hi;
        hi = x + y;
        lo = y - (hi - x);
        if lo != 0.0 {
            break;
        }
    }
    // Ties round half to even when the remaining partials break the tie
    if let Some(&below) = partials.last() {
        if (lo < 0.0 && below < 0.0) || (lo > 0.0 && below > 0.0) {
            let doubled = lo * 2.0;
            let x = hi + doubled;
            if doubled == x - hi {
                hi = x;
            }
        }
    }
    Ok(val(hi))
}

/// Product of a list of numbers, times an optional start value
fn math_prod(args: &[Value]) -> Result<Value, Error> {
    let items = args[0]
        .as_list()
        .ok_or_else(|| Error::TypeError(format!("prod requires a list, got {}", args[0].type_name())))?;
    let mut result = match args.get(1) {
        Some(start) => Number::try_from(start)?,
        None => Number::Int(1),
    };
    for item in items {
        result = result.checked_mul(Number::try_from(item)?)?;
    }
    Ok(Value::Number(result))
}

/// Sum of element-wise products of two equal-length lists
fn math_sumprod(args: &[Value]) -> Result<Value, Error> {
    let (p, q) = two_lists(args, "sumprod")?;
    let mut result = Number::Int(0);
    for (a, b) in p.iter().zip(q) {
        let product = Number::try_from(a)?.checked_mul(Number::try_from(b)?)?;
        result = result.checked_add(product)?;
    }
    Ok(Value::Number(result))
}

/// Euclidean distance between two points given as coordinate lists
fn math_dist(args: &[Value]) -> Result<Value, Error> {
    let (p, q) = two_lists(args, "dist")?;
    let mut inputs = Vec::with_capacity(p.len() * 2);
    let mut sum = 0.0;
    for (a, b) in p.iter().zip(q) {
        let (a, b) = (real_arg(a, "dist")?, real_arg(b, "dist")?);
        inputs.extend([a, b]);
        sum += (a - b) * (a - b);
    }
    checked_result(&inputs, sum.sqrt())
}

fn two_lists<'a>(args: &'a [Value], op: &str) -> Result<(&'a [Value], &'a [Value]), Error> {
    let list = |value: &'a Value| {
        value
            .as_list()
            .ok_or_else(|| Error::TypeError(format!("{op} requires lists, got {}", value.type_name())))
    };
    let (p, q) = (list(&args[0])?, list(&args[1])?);
    if p.len() != q.len() {
        return Err(Error::EvalError(format!(
            "{op}: both lists must have the same length"
        )));
    }
    Ok((p, q))
}

/// The next float after `x` in the direction of `y`
fn next_after(x: f64, y: f64) -> f64 {
    if x.is_nan() || y.is_nan() {
        f64::NAN
    } else if x == y {
        y
    } else if x < y {
        x.next_up()
    } else {
        x.next_down()
    }
}

/// Distance from `|x|` to the next larger float
fn unit_in_last_place(x: f64) -> f64 {
    let x = x.abs();
    if !x.is_finite() {
        x
    } else if x == f64::MAX {
        x - x.next_down()
    } else {
        x.next_up() - x
    }
}

fn math_fma(args: &[Value]) -> Result<Value, Error> {
    let x = real_arg(&args[0], "fma")?;
    let y = real_arg(&args[1], "fma")?;
    let z = real_arg(&args[2], "fma")?;
    checked_result(&[x, y, z], x.mul_add(y, z))
}

/// All numeric library operations, registered alongside the core builtins
pub(crate) fn math_ops() -> Vec<BuiltinOp> {
    let function = |id, func: fn(&[Value]) -> Result<Value, Error>, arity| {
        let op: Arc<OperationFn> = Arc::new(func);
        BuiltinOp {
            id,
            kind: OpKind::Function(op),
            arity,
        }
    };

    vec![
        // Trigonometric and hyperbolic
        unary("sin", f64::sin),
        unary("cos", f64::cos),
        unary("tan", f64::tan),
        unary("asin", f64::asin),
        unary("acos", f64::acos),
        unary("atan", f64::atan),
        unary("sinh", f64::sinh),
        unary("cosh", f64::cosh),
        unary("tanh", f64::tanh),
        unary("asinh", f64::asinh),
        unary("acosh", f64::acosh),
        unary("atanh", f64::atanh),
        // Exponential and logarithmic
        unary("exp", f64::exp),
        unary("exp2", f64::exp2),
        unary("expm1", f64::exp_m1),
        unary("log2", f64::log2),
        unary("log10", f64::log10),
        unary("log1p", f64::ln_1p),
        unary("sqrt", f64::sqrt),
        unary("cbrt", f64::cbrt),
        function("log", math_log, Arity::Range(1, 2)),
        // Special functions
        unary("erf", libm::erf),
        unary("erfc", libm::erfc),
        gamma_like("gamma", libm::tgamma),
        gamma_like("lgamma", libm::lgamma),
        // Miscellaneous real functions
        unary("fabs", f64::abs),
        unary("degrees", f64::to_degrees),
        unary("radians", f64::to_radians),
        rounding("floor", f64::floor),
        rounding("ceil", f64::ceil),
        rounding("trunc", f64::trunc),
        binary("atan2", f64::atan2),
        binary("copysign", f64::copysign),
        binary("fmod", |x, y| x % y),
        binary("hypot", f64::hypot),
        binary("pow", f64::powf),
        binary("remainder", libm::remainder),
        binary("nextafter", next_after),
        unary("ulp", unit_in_last_place),
        function("fma", math_fma, Arity::Exact(3)),
        function("ldexp", math_ldexp, Arity::Exact(2)),
        function("frexp", math_frexp, Arity::Exact(1)),
        function("modf", math_modf, Arity::Exact(1)),
        function("isclose", math_isclose, Arity::Range(2, 4)),
        // Sums and products over lists
        function("fsum", math_fsum, Arity::Exact(1)),
        function("prod", math_prod, Arity::Range(1, 2)),
        function("sumprod", math_sumprod, Arity::Exact(2)),
        function("dist", math_dist, Arity::Exact(2)),
        predicate("isnan", f64::is_nan),
        predicate("isinf", f64::is_infinite),
        predicate("isfinite", f64::is_finite),
        // Integer functions
        function("factorial", math_factorial, Arity::Exact(1)),
        function("gcd", math_gcd, Arity::Any),
        function("lcm", math_lcm, Arity::Any),
        function("isqrt", math_isqrt, Arity::Exact(1)),
        function("comb", math_comb, Arity::Exact(2)),
        function("perm", math_perm, Arity::Range(1, 2)),
    ]
}
