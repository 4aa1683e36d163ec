//! Numeric values: exact integers, floats and complex numbers.
//!
//! Arithmetic promotes operands along Int → Float → Complex, so `(+ 1 2.5)`
//! is a float and `(* 2 1+1i)` is complex. Integer arithmetic is checked;
//! overflow is reported instead of wrapping.

use std::cmp::Ordering;
use std::ops;

use crate::Error;

/// Type alias for exact integers in the interpreter
pub type IntType = i64;

/// `0` as a complex number.
pub const ZERO: Complex = Complex::new(0.0, 0.0);
/// `1` as a complex number.
pub const ONE: Complex = Complex::new(1.0, 0.0);

/// A complex number with real and imaginary parts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex {
    pub real: f64,
    pub imaginary: f64,
}

impl Complex {
    #[must_use]
    pub const fn new(real: f64, imaginary: f64) -> Self {
        Self { real, imaginary }
    }

    /// The magnitude `|z|`.
    #[must_use]
    pub fn norm(self) -> f64 {
        self.real.hypot(self.imaginary)
    }

    #[must_use]
    pub fn exp(self) -> Self {
        let magnitude = self.real.exp();
        Self::new(
            magnitude * self.imaginary.cos(),
            magnitude * self.imaginary.sin(),
        )
    }

    /// Principal natural logarithm.
    #[must_use]
    pub fn ln(self) -> Self {
        Self::new(self.norm().ln(), self.imaginary.atan2(self.real))
    }

    /// `self` raised to a complex power, computed as `exp(w * ln(z))`.
    #[must_use]
    pub fn powc(self, exponent: Self) -> Self {
        if self == ZERO {
            return if exponent == ZERO { ONE } else { ZERO };
        }
        (exponent * self.ln()).exp()
    }
}

impl ops::Add for Complex {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.real + rhs.real, self.imaginary + rhs.imaginary)
    }
}

impl ops::Sub for Complex {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.real - rhs.real, self.imaginary - rhs.imaginary)
    }
}

impl ops::Mul for Complex {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.real * rhs.real - self.imaginary * rhs.imaginary,
            self.real * rhs.imaginary + self.imaginary * rhs.real,
        )
    }
}

impl ops::Div for Complex {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let denominator = rhs.real * rhs.real + rhs.imaginary * rhs.imaginary;
        Self::new(
            (self.real * rhs.real + self.imaginary * rhs.imaginary) / denominator,
            (self.imaginary * rhs.real - self.real * rhs.imaginary) / denominator,
        )
    }
}

impl ops::Neg for Complex {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.real, -self.imaginary)
    }
}

/// A number literal or arithmetic result
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(IntType),
    Float(f64),
    Complex(Complex),
}

/// Two operands brought to a common representation
enum Promoted {
    Ints(IntType, IntType),
    Floats(f64, f64),
    Complexes(Complex, Complex),
}

fn promote(a: Number, b: Number) -> Promoted {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Promoted::Ints(x, y),
        (Number::Complex(x), other) => Promoted::Complexes(x, other.to_complex()),
        (other, Number::Complex(y)) => Promoted::Complexes(other.to_complex(), y),
        (x, y) => Promoted::Floats(x.to_f64_lossy(), y.to_f64_lossy()),
    }
}

fn overflow(operation: &str) -> Error {
    Error::EvalError(format!("Integer overflow in {operation}"))
}

fn division_by_zero() -> Error {
    Error::EvalError("division by zero".to_owned())
}

impl Number {
    /// The value as a real number; `None` for complex numbers
    pub fn as_real(self) -> Option<f64> {
        match self {
            Number::Int(n) => Some(n as f64),
            Number::Float(x) => Some(x),
            Number::Complex(_) => None,
        }
    }

    fn to_f64_lossy(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
            Number::Complex(z) => z.real,
        }
    }

    pub fn to_complex(self) -> Complex {
        match self {
            Number::Int(n) => Complex::new(n as f64, 0.0),
            Number::Float(x) => Complex::new(x, 0.0),
            Number::Complex(z) => z,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(n) => n == 0,
            Number::Float(x) => x == 0.0,
            Number::Complex(z) => z == ZERO,
        }
    }

    pub fn checked_add(self, other: Number) -> Result<Number, Error> {
        Ok(match promote(self, other) {
            Promoted::Ints(a, b) => Number::Int(a.checked_add(b).ok_or_else(|| overflow("addition"))?),
            Promoted::Floats(a, b) => Number::Float(a + b),
            Promoted::Complexes(a, b) => Number::Complex(a + b),
        })
    }

    pub fn checked_sub(self, other: Number) -> Result<Number, Error> {
        Ok(match promote(self, other) {
            Promoted::Ints(a, b) => {
                Number::Int(a.checked_sub(b).ok_or_else(|| overflow("subtraction"))?)
            }
            Promoted::Floats(a, b) => Number::Float(a - b),
            Promoted::Complexes(a, b) => Number::Complex(a - b),
        })
    }

    pub fn checked_mul(self, other: Number) -> Result<Number, Error> {
        Ok(match promote(self, other) {
            Promoted::Ints(a, b) => {
                Number::Int(a.checked_mul(b).ok_or_else(|| overflow("multiplication"))?)
            }
            Promoted::Floats(a, b) => Number::Float(a * b),
            Promoted::Complexes(a, b) => Number::Complex(a * b),
        })
    }

    /// True division: real operands always produce a float.
    pub fn checked_div(self, other: Number) -> Result<Number, Error> {
        if other.is_zero() {
            return Err(division_by_zero());
        }
        Ok(match promote(self, other) {
            Promoted::Ints(a, b) => Number::Float(a as f64 / b as f64),
            Promoted::Floats(a, b) => Number::Float(a / b),
            Promoted::Complexes(a, b) => Number::Complex(a / b),
        })
    }

    pub fn checked_neg(self) -> Result<Number, Error> {
        Ok(match self {
            Number::Int(n) => Number::Int(n.checked_neg().ok_or_else(|| overflow("negation"))?),
            Number::Float(x) => Number::Float(-x),
            Number::Complex(z) => Number::Complex(-z),
        })
    }

    /// Absolute value; the magnitude for complex numbers.
    pub fn checked_abs(self) -> Result<Number, Error> {
        Ok(match self {
            Number::Int(n) => Number::Int(n.checked_abs().ok_or_else(|| overflow("abs"))?),
            Number::Float(x) => Number::Float(x.abs()),
            Number::Complex(z) => Number::Float(z.norm()),
        })
    }

    /// Exponentiation. Integer powers stay exact when the exponent is
    /// non-negative; a negative base with a fractional exponent is complex.
    pub fn checked_pow(self, exponent: Number) -> Result<Number, Error> {
        match promote(self, exponent) {
            Promoted::Ints(base, exp) if exp >= 0 => {
                let exp = u32::try_from(exp).map_err(|_| overflow("exponentiation"))?;
                base.checked_pow(exp)
                    .map(Number::Int)
                    .ok_or_else(|| overflow("exponentiation"))
            }
            Promoted::Ints(base, exp) => {
                if base == 0 {
                    return Err(division_by_zero());
                }
                Ok(Number::Float((base as f64).powf(exp as f64)))
            }
            Promoted::Floats(base, exp) => {
                if base < 0.0 && exp.fract() != 0.0 {
                    let z = Complex::new(base, 0.0).powc(Complex::new(exp, 0.0));
                    return Ok(Number::Complex(z));
                }
                if base == 0.0 && exp < 0.0 {
                    return Err(division_by_zero());
                }
                Ok(Number::Float(base.powf(exp)))
            }
            Promoted::Complexes(base, exp) => Ok(Number::Complex(base.powc(exp))),
        }
    }

    /// Ordering between real numbers. Complex numbers are unordered.
    pub fn compare(self, other: Number) -> Result<Option<Ordering>, Error> {
        match promote(self, other) {
            Promoted::Ints(a, b) => Ok(Some(a.cmp(&b))),
            Promoted::Floats(a, b) => Ok(a.partial_cmp(&b)),
            Promoted::Complexes(..) => Err(Error::TypeError(
                "complex numbers cannot be ordered".to_owned(),
            )),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match promote(*self, *other) {
            Promoted::Ints(a, b) => a == b,
            Promoted::Floats(a, b) => a == b,
            Promoted::Complexes(a, b) => a == b,
        }
    }
}

impl From<IntType> for Number {
    fn from(n: IntType) -> Self {
        Number::Int(n)
    }
}

impl From<f64> for Number {
    fn from(x: f64) -> Self {
        Number::Float(x)
    }
}

impl From<Complex> for Number {
    fn from(z: Complex) -> Self {
        Number::Complex(z)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[test]
    fn test_promotion_and_arithmetic() {
        use Number::{Complex as C, Float as F, Int as I};

        let cases: Vec<(Result<Number, Error>, Number)> = vec![
            (I(2).checked_add(I(3)), I(5)),
            (I(2).checked_add(F(0.5)), F(2.5)),
            (F(1.5).checked_mul(I(2)), F(3.0)),
            (I(7).checked_div(I(2)), F(3.5)),
            (I(6).checked_div(I(2)), F(3.0)),
            (I(10).checked_sub(I(12)), I(-2)),
            (I(2).checked_pow(I(10)), I(1024)),
            (I(2).checked_pow(I(-1)), F(0.5)),
            (F(2.0).checked_pow(I(3)), F(8.0)),
            (I(-5).checked_abs(), I(5)),
            (C(Complex::new(3.0, 4.0)).checked_abs(), F(5.0)),
            (
                C(Complex::new(1.0, 1.0)).checked_mul(C(Complex::new(1.0, -1.0))),
                C(Complex::new(2.0, 0.0)),
            ),
            (I(1).checked_add(C(Complex::new(0.0, 2.0))), C(Complex::new(1.0, 2.0))),
        ];

        for (i, (actual, expected)) in cases.into_iter().enumerate() {
            assert_eq!(actual.unwrap(), expected, "case #{}", i + 1);
        }
    }

    #[test]
    fn test_numeric_errors() {
        assert!(Number::Int(IntType::MAX).checked_add(Number::Int(1)).is_err());
        assert!(Number::Int(IntType::MIN).checked_neg().is_err());
        assert!(Number::Int(1).checked_div(Number::Int(0)).is_err());
        assert!(Number::Float(1.0).checked_div(Number::Float(0.0)).is_err());
        assert!(Number::Int(3).checked_pow(Number::Int(100)).is_err());
        assert!(Number::Complex(ONE).compare(Number::Int(1)).is_err());
    }

    #[test]
    fn test_mixed_equality() {
        assert_eq!(Number::Int(1), Number::Float(1.0));
        assert_eq!(Number::Float(2.0), Number::Complex(Complex::new(2.0, 0.0)));
        assert_ne!(Number::Int(1), Number::Complex(Complex::new(1.0, 1.0)));
        assert_ne!(Number::Float(f64::NAN), Number::Float(f64::NAN));
    }

    #[test]
    fn test_negative_base_fractional_power_is_complex() {
        let result = Number::Float(-8.0).checked_pow(Number::Float(1.0 / 3.0)).unwrap();
        match result {
            Number::Complex(z) => {
                assert!((z.real - 1.0).abs() < 1e-9);
                assert!((z.imaginary - 3f64.sqrt()).abs() < 1e-9);
            }
            other => panic!("expected complex result, got {other:?}"),
        }
    }
}
