use thiserror::Error;

use crate::{gain::Gain, pid::GainTerm};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GainParseError {
    #[error("Empty gain value")]
    Empty,

    #[error("Invalid gain value: {input:?}")]
    Invalid { input: String },

    #[error("Zero denominator in gain value: {input:?}")]
    ZeroDenominator { input: String },

    #[error("Exponent out of range in gain value: {input:?}")]
    ExponentOutOfRange { input: String },

    #[error("Gain value is not finite: {value}")]
    NonFinite { value: f64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantizeError {
    #[error("Negative {term} gain {value} cannot be stored as an unsigned word")]
    NegativeGain { term: GainTerm, value: Gain },

    #[error("{term} gain {value} exceeds the 16-bit range even with a divisor of 1")]
    RangeExceeded { term: GainTerm, value: Gain },
}
