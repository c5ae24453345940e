//! Arbitrary-precision resource quantities
//!
//! Quantities use the Kubernetes notation: a signed decimal number followed
//! by an optional suffix. Binary suffixes (`Ki`, `Mi`, ... `Ei`) scale by
//! powers of 1024, decimal suffixes (`n`, `u`, `m`, `k`, `M`, ... `E`) by
//! powers of 1000, and `e<int>` is a plain decimal exponent.
//!
//! Values are held exactly at nano precision. Anything finer is rounded away
//! from zero, so a non-zero request never collapses to zero.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::{Error, Result};

const NANOS_PER_UNIT: i128 = 1_000_000_000;
const NANOS_PER_MILLI: i128 = 1_000_000;

/// A resource quantity (CPU cores, bytes, ...)
///
/// Equality and ordering compare the numeric value, not the spelling:
/// `"1"` and `"1000m"` are equal. The original spelling is kept for display
/// and serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity {
    nanos: i128,
    repr: String,
}

#[derive(Debug, Clone, Copy)]
enum Scale {
    Decimal(i64),
    Binary(u32),
}

impl Quantity {
    /// Parse a quantity string
    ///
    /// # Errors
    /// Returns [`Error::InvalidQuantity`] if the string is malformed or its
    /// value does not fit
    pub fn parse(input: &str) -> Result<Self> {
        let nanos = parse_nanos(input)?;
        Ok(Self {
            nanos,
            repr: input.to_string(),
        })
    }

    /// Quantity of `millis` thousandths (e.g. millicores)
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self {
            nanos: i128::from(millis) * NANOS_PER_MILLI,
            repr: format!("{millis}m"),
        }
    }

    /// Quantity of whole units (e.g. bytes)
    #[must_use]
    pub fn from_bytes(bytes: i64) -> Self {
        Self {
            nanos: i128::from(bytes) * NANOS_PER_UNIT,
            repr: bytes.to_string(),
        }
    }

    /// Value in thousandths, rounded up
    ///
    /// # Errors
    /// Returns error if the result does not fit in an `i64`
    pub fn milli_value(&self) -> Result<i64> {
        i64::try_from(div_away_from_zero(self.nanos, NANOS_PER_MILLI))
            .map_err(|_| Error::quantity(&self.repr, "milli value out of range"))
    }

    /// Value in whole units, rounded up
    ///
    /// # Errors
    /// Returns error if the result does not fit in an `i64`
    pub fn value(&self) -> Result<i64> {
        i64::try_from(div_away_from_zero(self.nanos, NANOS_PER_UNIT))
            .map_err(|_| Error::quantity(&self.repr, "value out of range"))
    }

    /// Whether the value is below zero
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.nanos < 0
    }

    /// Whether the value is exactly zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// Original spelling
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.repr
    }
}

fn parse_nanos(input: &str) -> Result<i128> {
    let invalid = |reason: &str| Error::quantity(input, reason);

    let (negative, rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        Some(_) => (false, input),
        None => return Err(invalid("empty quantity")),
    };

    let number_end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(number_end);

    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if frac.contains('.') {
        return Err(invalid("more than one decimal point"));
    }
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("missing digits"));
    }

    let mut mantissa: i128 = 0;
    for digit in whole.bytes().chain(frac.bytes()) {
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(i128::from(digit - b'0')))
            .ok_or_else(|| invalid("value out of range"))?;
    }

    let frac_digits = i64::try_from(frac.len()).map_err(|_| invalid("value out of range"))?;
    let scale = scale_for(suffix).ok_or_else(|| invalid("unknown suffix"))?;

    let nanos = match scale {
        Scale::Decimal(exp) => exp
            .checked_add(9 - frac_digits)
            .and_then(|exp| scale_decimal(mantissa, exp)),
        Scale::Binary(shift) => mantissa
            .checked_mul(1_i128 << shift)
            .and_then(|m| scale_decimal(m, 9 - frac_digits)),
    }
    .ok_or_else(|| invalid("value out of range"))?;

    Ok(if negative { -nanos } else { nanos })
}

fn scale_for(suffix: &str) -> Option<Scale> {
    let scale = match suffix {
        "" => Scale::Decimal(0),
        "n" => Scale::Decimal(-9),
        "u" => Scale::Decimal(-6),
        "m" => Scale::Decimal(-3),
        "k" => Scale::Decimal(3),
        "M" => Scale::Decimal(6),
        "G" => Scale::Decimal(9),
        "T" => Scale::Decimal(12),
        "P" => Scale::Decimal(15),
        "E" => Scale::Decimal(18),
        "Ki" => Scale::Binary(10),
        "Mi" => Scale::Binary(20),
        "Gi" => Scale::Binary(30),
        "Ti" => Scale::Binary(40),
        "Pi" => Scale::Binary(50),
        "Ei" => Scale::Binary(60),
        _ => {
            let exp = suffix.strip_prefix(['e', 'E'])?;
            Scale::Decimal(exp.parse().ok()?)
        }
    };
    Some(scale)
}

/// `mantissa * 10^exp`, rounding a fractional result away from zero
fn scale_decimal(mantissa: i128, exp: i64) -> Option<i128> {
    if exp >= 0 {
        let factor = 10_i128.checked_pow(u32::try_from(exp).ok()?)?;
        return mantissa.checked_mul(factor);
    }

    let divisor = u32::try_from(exp.unsigned_abs())
        .ok()
        .and_then(|e| 10_i128.checked_pow(e));
    match divisor {
        Some(divisor) => Some(div_away_from_zero(mantissa, divisor)),
        // smaller than one nano but not zero
        None => Some(mantissa.signum()),
    }
}

fn div_away_from_zero(n: i128, d: i128) -> i128 {
    let q = n / d;
    if n % d == 0 { q } else { q + n.signum() }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl FromStr for Quantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Quantity {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        let nanos = parse_nanos(&s)?;
        Ok(Self { nanos, repr: s })
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.repr
    }
}
