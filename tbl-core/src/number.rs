//! Arbitrary precision numbers using dashu
//!
//! Uses dashu-float (DBig) for decimal arithmetic so that values typed by an
//! operator ("0.1", "15%") add up the way they read, without binary float
//! drift. Conversion to `f64` only happens at the output boundary.

use dashu_float::DBig;
use dashu_float::ops::{SquareRoot, Abs};
use dashu_int::IBig;
use serde::{Deserialize, Serialize, Serializer, Deserializer};
use thiserror::Error;

/// Error type for number operations
#[derive(Debug, Clone, Error)]
pub enum NumberError {
    #[error("Invalid number format: {0}")]
    ParseError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Domain error: {0}")]
    DomainError(String),
}

/// Default precision for calculations (decimal digits)
pub const DEFAULT_PRECISION: usize = 50;

/// Arbitrary precision decimal number
///
/// All operations return Results or new Numbers - never panic.
#[derive(Debug, Clone)]
pub struct Number {
    inner: DBig,
}

impl Number {
    // ========== Construction ==========

    fn with_work_precision(val: DBig) -> DBig {
        val.with_precision(DEFAULT_PRECISION).value()
    }

    /// Create from string representation
    /// Supports: "123", "3.14", "+7", "1.5e10", "-42", "602214076e15"
    pub fn from_str(s: &str) -> Result<Self, NumberError> {
        let s = s.trim();
        let s = s.strip_prefix('+').unwrap_or(s);
        if s.is_empty() {
            return Err(NumberError::ParseError(s.to_string()));
        }

        // Scientific notation with integer mantissa: "602214076e15"
        if (s.contains('e') || s.contains('E')) && !s.contains('.') {
            let s_lower = s.to_lowercase();
            let parts: Vec<&str> = s_lower.split('e').collect();
            if parts.len() == 2 {
                let mantissa: IBig = parts[0].parse()
                    .map_err(|_| NumberError::ParseError(s.to_string()))?;
                let exp: i32 = parts[1].parse()
                    .map_err(|_| NumberError::ParseError(s.to_string()))?;
                let result = DBig::from_parts(mantissa, exp as isize);
                return Ok(Self { inner: Self::with_work_precision(result) });
            }
        }

        let inner: DBig = s.parse()
            .map_err(|_| NumberError::ParseError(s.to_string()))?;

        Ok(Self { inner: Self::with_work_precision(inner) })
    }

    /// Parse operator-typed text: plain decimals and percent literals.
    ///
    /// `"15%"` becomes 0.15, `" 42 "` becomes 42. Returns `None` for blank or
    /// non-numeric text.
    pub fn parse_numeric(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.strip_suffix('%') {
            Some(base) => {
                let n = Self::from_str(base).ok()?;
                n.checked_div(&Self::from_i64(100)).ok()
            }
            None => Self::from_str(trimmed).ok(),
        }
    }

    /// True when the text is a percent literal such as "15%" or "-2.5 %"
    pub fn is_percent_literal(s: &str) -> bool {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.strip_suffix('%') {
            Some(base) => Self::from_str(base).is_ok(),
            None => false,
        }
    }

    /// Create from i64 with working precision
    pub fn from_i64(n: i64) -> Self {
        Self { inner: Self::with_work_precision(DBig::from(n)) }
    }

    /// Create from ratio (exact division)
    pub fn from_ratio(num: i64, den: i64) -> Self {
        if den == 0 {
            return Self { inner: DBig::ZERO };
        }
        let n = Self::with_work_precision(DBig::from(num));
        let d = Self::with_work_precision(DBig::from(den));
        Self { inner: n / d }
    }

    /// Create from f64 (may lose precision for very large or very small values)
    pub fn from_f64(f: f64) -> Self {
        if f.is_nan() || f.is_infinite() {
            return Self { inner: DBig::ZERO };
        }
        // Integral floats go through i64 so 1e20 style values keep their digits
        if f.fract() == 0.0 && f.abs() < 9.0e15 {
            return Self::from_i64(f as i64);
        }
        let s = format!("{:.15}", f);
        Self::from_str(&s).unwrap_or(Self { inner: DBig::ZERO })
    }

    // ========== Predicates ==========

    pub fn is_zero(&self) -> bool {
        self.inner == DBig::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.inner < DBig::ZERO
    }

    pub fn is_integer(&self) -> bool {
        let floor_val = self.inner.clone().floor();
        self.inner == floor_val
    }

    // ========== Basic Arithmetic ==========

    pub fn add(&self, other: &Self) -> Self {
        Self { inner: &self.inner + &other.inner }
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self { inner: &self.inner - &other.inner }
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self { inner: &self.inner * &other.inner }
    }

    pub fn neg(&self) -> Self {
        Self { inner: -&self.inner }
    }

    /// Safe division (returns Result, never panics)
    pub fn checked_div(&self, other: &Self) -> Result<Self, NumberError> {
        if other.is_zero() {
            Err(NumberError::DivisionByZero)
        } else {
            Ok(Self { inner: &self.inner / &other.inner })
        }
    }

    /// Remainder with the sign of the dividend (`-7 % 3 == -1`)
    pub fn checked_rem(&self, other: &Self) -> Result<Self, NumberError> {
        let quotient = self.checked_div(other)?;
        let truncated = if quotient.is_negative() { quotient.ceil() } else { quotient.floor() };
        Ok(self.sub(&truncated.mul(other)))
    }

    /// Integer power (exact)
    pub fn pow(&self, exp: i32) -> Self {
        if exp == 0 {
            return Self::from_i64(1);
        }

        let mut result = Self::from_i64(1);
        for _ in 0..exp.unsigned_abs() {
            result = result.mul(self);
        }

        if exp < 0 {
            Self::from_i64(1).checked_div(&result).unwrap_or(Self::from_i64(0))
        } else {
            result
        }
    }

    /// Real-valued power: x^y = exp(y * ln(x))
    pub fn pow_real(&self, exp: &Self, precision: u32) -> Result<Self, NumberError> {
        if exp.is_zero() {
            return Ok(Self::from_i64(1));
        }
        if self.is_zero() {
            if exp.is_negative() {
                return Err(NumberError::DivisionByZero);
            }
            return Ok(Self::from_i64(0));
        }

        if exp.is_integer() {
            if let Some(e) = exp.to_i64() {
                if e.abs() <= 10_000 {
                    return Ok(self.pow(e as i32));
                }
            }
        }

        if self.is_negative() {
            return Err(NumberError::DomainError(
                "negative base with non-integer exponent".to_string()
            ));
        }

        let ln_x = self.inner.clone().with_precision(precision as usize).value().ln();
        let product = &ln_x * &exp.inner;
        Ok(Self { inner: product.exp() })
    }

    // ========== Transcendental Functions ==========

    pub fn sqrt(&self, precision: u32) -> Result<Self, NumberError> {
        if self.is_negative() {
            return Err(NumberError::DomainError(
                "square root of negative number".to_string()
            ));
        }
        if self.is_zero() {
            return Ok(Self::from_i64(0));
        }

        let val = self.inner.clone().with_precision(precision as usize).value();
        Ok(Self { inner: val.sqrt() })
    }

    pub fn exp(&self, precision: u32) -> Self {
        let val = self.inner.clone().with_precision(precision as usize).value();
        Self { inner: val.exp() }
    }

    // ========== Mathematical Constants ==========

    /// Pi - from high-precision string constant
    pub fn pi(precision: u32) -> Self {
        const PI_STR: &str = "3.14159265358979323846264338327950288419716939937510582097494459230781640628620899862803482534211706798214808651328230664709384460955058223172535940812848111745028410270193852110555964462294895493038196442881097566593344612847564823378678316527120190914564856692346034861045432664821339360726024914127372458700660631558817488152092096282925409171536436789259036001133053054882046652138414695194151160943305727036575959195309218611738193261179310511854807446237996274956735188575272489122793818301194912";

        let end_pos = (precision as usize + 2).min(PI_STR.len());
        Self::from_str(&PI_STR[..end_pos])
            .unwrap_or(Self::from_ratio(355, 113))
    }

    /// Euler's number e
    pub fn e(precision: u32) -> Self {
        Self::from_i64(1).exp(precision)
    }

    // ========== Rounding ==========

    pub fn abs(&self) -> Self {
        Self { inner: Abs::abs(self.inner.clone()) }
    }

    /// Largest integer <= x
    pub fn floor(&self) -> Self {
        Self { inner: self.inner.clone().floor() }
    }

    /// Smallest integer >= x
    pub fn ceil(&self) -> Self {
        Self { inner: self.inner.clone().ceil() }
    }

    /// Round half away from zero to `places` decimals (negative places round
    /// to tens, hundreds, ...)
    pub fn round(&self, places: i32) -> Self {
        let scale = Self::from_i64(10).pow(places.abs());
        let half = Self::from_ratio(1, 2);
        let scaled = if places >= 0 {
            self.abs().mul(&scale)
        } else {
            self.abs().checked_div(&scale).unwrap_or_else(|_| self.abs())
        };
        let rounded = scaled.add(&half).floor();
        let unscaled = if places >= 0 {
            rounded.checked_div(&scale).unwrap_or_else(|_| rounded.clone())
        } else {
            rounded.mul(&scale)
        };
        if self.is_negative() { unscaled.neg() } else { unscaled }
    }

    /// Floor to a multiple of `step` (`FLOOR(7, 5) == 5`)
    pub fn floor_to(&self, step: &Self) -> Result<Self, NumberError> {
        Ok(self.checked_div(step)?.floor().mul(step))
    }

    /// Ceiling to a multiple of `step` (`CEILING(7, 5) == 10`)
    pub fn ceil_to(&self, step: &Self) -> Result<Self, NumberError> {
        Ok(self.checked_div(step)?.ceil().mul(step))
    }

    // ========== Conversion ==========

    /// Try to convert to i64
    pub fn to_i64(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }

        // DBig stores as significand * 10^exponent
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();
        let sig_i64: i64 = significand.try_into().ok()?;

        if exponent == 0 {
            Some(sig_i64)
        } else if exponent > 0 && exponent <= 18 {
            sig_i64.checked_mul(10_i64.checked_pow(exponent as u32)?)
        } else if exponent < 0 && exponent >= -18 {
            let divisor = 10_i64.checked_pow((-exponent) as u32)?;
            if sig_i64 % divisor == 0 {
                Some(sig_i64 / divisor)
            } else {
                None
            }
        } else {
            None
        }
    }

    /// Convert to f64 (correctly rounded, may lose precision)
    pub fn to_f64(&self) -> Option<f64> {
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();
        let f: f64 = format!("{}e{}", significand, exponent).parse().ok()?;
        if f.is_finite() { Some(f) } else { None }
    }

    /// Render as decimal string with specified decimal places
    pub fn as_decimal(&self, places: u32) -> String {
        match self.to_f64() {
            Some(f) => format!("{:.prec$}", f, prec = places as usize),
            None => format!("{}", self.inner),
        }
    }
}

// ========== Trait Implementations ==========

impl std::fmt::Display for Number {
    /// Shortest form that reads back to the same value: `8`, `0.15`, `-2.5`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(i) = self.to_i64() {
            return write!(f, "{}", i);
        }
        match self.to_f64() {
            Some(x) => write!(f, "{}", x),
            None => write!(f, "{}", self.inner),
        }
    }
}

/// Numbers leave the engine as plain JSON numbers.
impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(i) = self.to_i64() {
            return serializer.serialize_i64(i);
        }
        match self.to_f64() {
            Some(f) => serializer.serialize_f64(f),
            None => serializer.serialize_str(&self.to_string()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberRepr {
    Int(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberRepr::deserialize(deserializer)? {
            NumberRepr::Int(i) => Ok(Self::from_i64(i)),
            NumberRepr::Float(f) => Ok(Self::from_f64(f)),
            NumberRepr::Text(s) => Self::parse_numeric(&s)
                .ok_or_else(|| serde::de::Error::custom(NumberError::ParseError(s))),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner.partial_cmp(&other.inner).unwrap_or(std::cmp::Ordering::Equal)
    }
}
