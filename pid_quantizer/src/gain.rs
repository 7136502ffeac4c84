//! Exact gain values

use std::{fmt, str::FromStr};

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero, pow};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::GainParseError;

/// Largest decimal exponent accepted when parsing (`1e4096`).
const MAX_EXPONENT: u64 = 4096;

/// A controller gain held as an exact rational number in lowest terms.
///
/// Parses from decimal literals (`1.013`, `-0.5`, `2.5e-3`) and explicit
/// fractions (`667/2000`) without ever going through binary floating point.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Gain(BigRational);

impl Gain {
    pub fn from_ratio(ratio: BigRational) -> Self {
        Self(ratio)
    }

    /// `mantissa * 10^-places`, e.g. `decimal(1013, 3)` is 1.013.
    pub fn decimal(mantissa: i64, places: u32) -> Self {
        let denom = pow(BigInt::from(10), places as usize);
        Self(BigRational::new(BigInt::from(mantissa), denom))
    }

    pub fn ratio(&self) -> &BigRational {
        &self.0
    }

    pub fn numer(&self) -> &BigInt {
        self.0.numer()
    }

    pub fn denom(&self) -> &BigInt {
        self.0.denom()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Exact `floor(self * divisor)`.
    pub fn scaled(&self, divisor: &BigInt) -> BigInt {
        (self.0.numer() * divisor).div_floor(self.0.denom())
    }
}

impl From<BigRational> for Gain {
    fn from(ratio: BigRational) -> Self {
        Self(ratio)
    }
}

impl From<i64> for Gain {
    fn from(value: i64) -> Self {
        Self(BigRational::from_integer(BigInt::from(value)))
    }
}

impl From<u64> for Gain {
    fn from(value: u64) -> Self {
        Self(BigRational::from_integer(BigInt::from(value)))
    }
}

impl TryFrom<f64> for Gain {
    type Error = GainParseError;

    /// Goes through the shortest decimal that round-trips to `value`, so
    /// `1.013_f64` becomes exactly 1013/1000 rather than its binary expansion.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(GainParseError::NonFinite { value });
        }

        value.to_string().parse()
    }
}

impl FromStr for Gain {
    type Err = GainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(GainParseError::Empty);
        }

        let invalid = || GainParseError::Invalid {
            input: input.to_string(),
        };

        if let Some((numer, denom)) = input.split_once('/') {
            let numer: BigInt = numer.trim().parse().map_err(|_| invalid())?;
            let denom: BigInt = denom.trim().parse().map_err(|_| invalid())?;
            if denom.is_zero() {
                return Err(GainParseError::ZeroDenominator {
                    input: input.to_string(),
                });
            }
            return Ok(Self(BigRational::new(numer, denom)));
        }

        let (mantissa, exponent) = match input.split_once(['e', 'E']) {
            Some((mantissa, exponent)) => {
                let exponent: i64 = exponent.parse().map_err(|_| invalid())?;
                (mantissa, exponent)
            }
            None => (input, 0),
        };

        if exponent.unsigned_abs() > MAX_EXPONENT {
            return Err(GainParseError::ExponentOutOfRange {
                input: input.to_string(),
            });
        }

        let (negative, digits) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };

        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(invalid());
        }

        let mut numer: BigInt = format!("{}{}", int_part, frac_part)
            .parse()
            .map_err(|_| invalid())?;
        if negative {
            numer = -numer;
        }

        let scale = exponent - frac_part.len() as i64;
        let ten = BigInt::from(10);
        let ratio = if scale >= 0 {
            BigRational::from_integer(numer * pow(ten, scale as usize))
        } else {
            BigRational::new(numer, pow(ten, scale.unsigned_abs() as usize))
        };

        Ok(Self(ratio))
    }
}

/// Number of decimal places needed to print `1 / denom` exactly, if it terminates.
fn decimal_places(denom: &BigInt) -> Option<usize> {
    let two = BigInt::from(2);
    let five = BigInt::from(5);

    let mut rest = denom.clone();
    let mut twos = 0;
    let mut fives = 0;

    while rest.is_even() && !rest.is_zero() {
        rest /= &two;
        twos += 1;
    }
    while (&rest % &five).is_zero() && !rest.is_zero() {
        rest /= &five;
        fives += 1;
    }

    rest.is_one().then_some(twos.max(fives))
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numer = self.0.numer();
        let denom = self.0.denom();

        if denom.is_one() {
            return write!(f, "{}", numer);
        }

        match decimal_places(denom) {
            Some(places) => {
                let scaled = numer.abs() * pow(BigInt::from(10), places) / denom;
                let digits = format!("{:0>width$}", scaled.to_string(), width = places + 1);
                let (int_part, frac_part) = digits.split_at(digits.len() - places);
                let sign = if numer.is_negative() { "-" } else { "" };
                write!(f, "{}{}.{}", sign, int_part, frac_part)
            }
            None => write!(f, "{}/{}", numer, denom),
        }
    }
}

impl Serialize for Gain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Gain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(GainVisitor)
    }
}

struct GainVisitor;

impl de::Visitor<'_> for GainVisitor {
    type Value = Gain;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number, a decimal string or a fraction string")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Gain, E> {
        value.parse().map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Gain, E> {
        Gain::try_from(value).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Gain, E> {
        Ok(Gain::from(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Gain, E> {
        Ok(Gain::from(value))
    }
}
