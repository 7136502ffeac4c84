//! Fixed-point PID parameter quantization.
//!
//! Converts exact rational gains into 16-bit scaled gains sharing one integer
//! divisor, as stored in the flight controller's EEPROM parameter block.

mod error;
mod gain;
mod pid;

pub use error::{GainParseError, QuantizeError};
pub use gain::Gain;
pub use pid::{GainTerm, PidBlock, PidGains, WORD_MAX, quantize};
