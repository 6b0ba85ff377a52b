//! Exact rational amounts and values.
//!
//! # Motivation
//!
//! Every amount (commodity units) and value (transaction currency) in the
//! ledger is a `Numeric`: an arbitrary-precision fraction that is always kept
//! in lowest terms.  Lot matching divides splits proportionally and gains are
//! pro-rated from the opening split, so any rounding here would leave
//! transactions unbalanced by a unit.  `Numeric` has no floating-point
//! constructor and no lossy arithmetic.
//!
//! # Rounding
//!
//! Arithmetic never rounds.  When a figure has to be expressed at a fixed
//! denominator (a commodity's smallest fraction, for display or import
//! validation) use [`Numeric::convert`] with an explicit [`RoundMode`];
//! [`RoundMode::Never`] refuses to round and reports the remainder instead.
//!
//! # Text form
//!
//! `FromStr` accepts integers (`-12`), decimals (`12.345`) and fractions
//! (`-3/7`).  `Display` renders integers and power-of-ten denominators as
//! decimals and everything else as `n/d`.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("denominator must be > 0")]
    ZeroDenominator,
    #[error("{value} is not representable at denominator {denom} without rounding")]
    Inexact { value: String, denom: u64 },
    #[error("cannot parse '{0}' as a number")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Rounding policy
// ---------------------------------------------------------------------------

/// How [`Numeric::convert`] treats a remainder at the target denominator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoundMode {
    /// Exact conversion only; a remainder is an error.
    Never,
    /// Toward negative infinity.
    Floor,
    /// Toward positive infinity.
    Ceiling,
    /// Toward zero.
    Truncate,
    /// To nearest, halves away from zero.
    HalfUp,
}

// ---------------------------------------------------------------------------
// Numeric newtype
// ---------------------------------------------------------------------------

/// An exact, always-reduced rational number.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Numeric(BigRational);

impl Numeric {
    /// Zero.
    pub fn zero() -> Self {
        Numeric(BigRational::zero())
    }

    /// A whole number.
    pub fn from_int(n: i64) -> Self {
        Numeric(BigRational::from_integer(BigInt::from(n)))
    }

    /// `numer / denom`, reduced.
    pub fn new(numer: i64, denom: i64) -> Result<Self, NumericError> {
        if denom == 0 {
            return Err(NumericError::ZeroDenominator);
        }
        Ok(Numeric(BigRational::new(
            BigInt::from(numer),
            BigInt::from(denom),
        )))
    }

    /// Wrap an existing big rational.
    pub fn from_ratio(r: BigRational) -> Self {
        Numeric(r)
    }

    pub fn as_ratio(&self) -> &BigRational {
        &self.0
    }

    pub fn numer(&self) -> &BigInt {
        self.0.numer()
    }

    pub fn denom(&self) -> &BigInt {
        self.0.denom()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn abs(&self) -> Numeric {
        Numeric(self.0.abs())
    }

    /// `1`, `0` or `-1`.
    pub fn signum(&self) -> i32 {
        if self.is_positive() {
            1
        } else if self.is_negative() {
            -1
        } else {
            0
        }
    }

    /// Exact `self / rhs`.
    pub fn checked_div(&self, rhs: &Numeric) -> Result<Numeric, NumericError> {
        if rhs.is_zero() {
            return Err(NumericError::DivisionByZero);
        }
        Ok(Numeric(&self.0 / &rhs.0))
    }

    /// Exact `self * mul / div`.
    ///
    /// The product is formed before dividing so no intermediate rounding can
    /// occur even in principle.
    pub fn mul_div(&self, mul: &Numeric, div: &Numeric) -> Result<Numeric, NumericError> {
        if div.is_zero() {
            return Err(NumericError::DivisionByZero);
        }
        Ok(Numeric(&self.0 * &mul.0 / &div.0))
    }

    /// Express this number as `k / denom` for integer `k`, rounding per `mode`.
    pub fn convert(&self, denom: u64, mode: RoundMode) -> Result<Numeric, NumericError> {
        if denom == 0 {
            return Err(NumericError::ZeroDenominator);
        }
        let d = BigRational::from_integer(BigInt::from(denom));
        let scaled = &self.0 * &d;
        let units = match mode {
            RoundMode::Never => {
                if !scaled.is_integer() {
                    return Err(NumericError::Inexact {
                        value: self.to_string(),
                        denom,
                    });
                }
                scaled
            }
            RoundMode::Floor => scaled.floor(),
            RoundMode::Ceiling => scaled.ceil(),
            RoundMode::Truncate => scaled.trunc(),
            RoundMode::HalfUp => scaled.round(),
        };
        Ok(Numeric(units / d))
    }

    /// Smallest power-of-ten exponent `k` with `denom | 10^k`, if any within range.
    fn decimal_places(&self) -> Option<usize> {
        let denom = self.0.denom();
        let ten = BigInt::from(10);
        let mut pow = BigInt::one();
        for k in 0..=30 {
            if (&pow % denom).is_zero() {
                return Some(k);
            }
            pow *= &ten;
        }
        None
    }
}

impl Default for Numeric {
    fn default() -> Self {
        Numeric::zero()
    }
}

// ---------------------------------------------------------------------------
// Text form
// ---------------------------------------------------------------------------

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_integer() {
            return write!(f, "{}", self.0.numer());
        }
        match self.decimal_places() {
            Some(places) => {
                let scale = num_traits::pow(BigInt::from(10), places);
                let units = self.0.numer() * (&scale / self.0.denom());
                let sign = if units.is_negative() { "-" } else { "" };
                let digits = units.abs().to_string();
                let digits = format!("{:0>width$}", digits, width = places + 1);
                let (int_part, frac_part) = digits.split_at(digits.len() - places);
                write!(f, "{sign}{int_part}.{frac_part}")
            }
            None => write!(f, "{}/{}", self.0.numer(), self.0.denom()),
        }
    }
}

impl FromStr for Numeric {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let bad = || NumericError::Parse(s.to_string());
        if t.is_empty() {
            return Err(bad());
        }

        if let Some((n, d)) = t.split_once('/') {
            let numer: BigInt = n.trim().parse().map_err(|_| bad())?;
            let denom: BigInt = d.trim().parse().map_err(|_| bad())?;
            if denom.is_zero() {
                return Err(NumericError::ZeroDenominator);
            }
            return Ok(Numeric(BigRational::new(numer, denom)));
        }

        let (negative, body) = match t.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, t.strip_prefix('+').unwrap_or(t)),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(bad());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(bad());
        }

        let digits = format!("{int_part}{frac_part}");
        let mut numer: BigInt = digits.parse().map_err(|_| bad())?;
        if negative {
            numer = -numer;
        }
        let denom = num_traits::pow(BigInt::from(10), frac_part.len());
        Ok(Numeric(BigRational::new(numer, denom)))
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct NumericVisitor;

impl<'de> Visitor<'de> for NumericVisitor {
    type Value = Numeric;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a string such as \"12.5\" or \"1/3\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Numeric, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Numeric, E> {
        Ok(Numeric::from_int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Numeric, E> {
        Ok(Numeric(BigRational::from_integer(BigInt::from(v))))
    }

    // Shortest round-trip text of the float, read back exactly.
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Numeric, E> {
        if !v.is_finite() {
            return Err(E::custom("non-finite number"));
        }
        v.to_string().parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Numeric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NumericVisitor)
    }
}

// ---------------------------------------------------------------------------
// Arithmetic operators (closed over Numeric, never rounding)
// ---------------------------------------------------------------------------

impl Add for Numeric {
    type Output = Numeric;
    fn add(self, rhs: Numeric) -> Numeric {
        Numeric(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Numeric> for &'a Numeric {
    type Output = Numeric;
    fn add(self, rhs: &'a Numeric) -> Numeric {
        Numeric(&self.0 + &rhs.0)
    }
}

impl Sub for Numeric {
    type Output = Numeric;
    fn sub(self, rhs: Numeric) -> Numeric {
        Numeric(self.0 - rhs.0)
    }
}

impl<'a> Sub<&'a Numeric> for &'a Numeric {
    type Output = Numeric;
    fn sub(self, rhs: &'a Numeric) -> Numeric {
        Numeric(&self.0 - &rhs.0)
    }
}

impl Mul for Numeric {
    type Output = Numeric;
    fn mul(self, rhs: Numeric) -> Numeric {
        Numeric(self.0 * rhs.0)
    }
}

impl<'a> Mul<&'a Numeric> for &'a Numeric {
    type Output = Numeric;
    fn mul(self, rhs: &'a Numeric) -> Numeric {
        Numeric(&self.0 * &rhs.0)
    }
}

impl Neg for Numeric {
    type Output = Numeric;
    fn neg(self) -> Numeric {
        Numeric(-self.0)
    }
}

impl Neg for &Numeric {
    type Output = Numeric;
    fn neg(self) -> Numeric {
        Numeric(-&self.0)
    }
}

impl AddAssign<&Numeric> for Numeric {
    fn add_assign(&mut self, rhs: &Numeric) {
        self.0 += &rhs.0;
    }
}

impl SubAssign<&Numeric> for Numeric {
    fn sub_assign(&mut self, rhs: &Numeric) {
        self.0 -= &rhs.0;
    }
}

impl Sum for Numeric {
    fn sum<I: Iterator<Item = Numeric>>(iter: I) -> Numeric {
        iter.fold(Numeric::zero(), |acc, n| acc + n)
    }
}

impl<'a> Sum<&'a Numeric> for Numeric {
    fn sum<I: Iterator<Item = &'a Numeric>>(iter: I) -> Numeric {
        iter.fold(Numeric::zero(), |mut acc, n| {
            acc += n;
            acc
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
