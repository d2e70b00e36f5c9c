use std::{
    fmt,
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "ZAR";
pub const CURRENCY_CODE_LOWER: &str = "zar";

//--------------------------------------       Money       -----------------------------------------------------------
/// A monetary amount, stored as an integer number of minor currency units (cents).
///
/// Providers receive and report amounts in minor units; everything user-facing is formatted as a major-unit decimal
/// with two fraction digits. Parsing and formatting never go through floating point, so any amount with at most two
/// fraction digits round-trips exactly.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a major-unit decimal string with at most two fraction digits, e.g. "129.99", "800", "-5.50".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyConversionError("empty string".to_string()));
        }
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || frac.len() > 2
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(MoneyConversionError(format!("{s} is not a valid amount")));
        }
        let whole = whole.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        let cents = match frac.len() {
            0 => 0,
            n => {
                let f = frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
                if n == 1 {
                    f * 10
                } else {
                    f
                }
            },
        };
        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(cents))
            .map(|v| Self(sign * v))
            .ok_or_else(|| MoneyConversionError(format!("{s} overflows the representable range")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl Money {
    /// The amount as an integer number of minor currency units.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod test {
    use super::Money;

    #[test]
    fn round_trip_is_exact() {
        let m = "129.99".parse::<Money>().unwrap();
        assert_eq!(m.value(), 12999);
        assert_eq!(m.to_string(), "129.99");
        let m = "800.00".parse::<Money>().unwrap();
        assert_eq!(m.value(), 80000);
        assert_eq!(m.to_string(), "800.00");
    }

    #[test]
    fn parses_short_forms() {
        assert_eq!("800".parse::<Money>().unwrap(), Money::from_cents(80000));
        assert_eq!("0.5".parse::<Money>().unwrap(), Money::from_cents(50));
        assert_eq!("-5.50".parse::<Money>().unwrap(), Money::from_cents(-550));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert!("".parse::<Money>().is_err());
        assert!("12.345".parse::<Money>().is_err());
        assert!(".99".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("--5".parse::<Money>().is_err());
    }

    #[test]
    fn formats_small_amounts_with_leading_zeroes() {
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_cents(100);
        let b = Money::from_cents(250);
        assert_eq!(a + b, Money::from_cents(350));
        assert_eq!(b - a, Money::from_cents(150));
        assert_eq!(a * 3, Money::from_cents(300));
        assert_eq!(-a, Money::from_cents(-100));
    }
}
