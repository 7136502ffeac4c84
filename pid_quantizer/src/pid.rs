use std::fmt;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, ToPrimitive};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{error::QuantizeError, gain::Gain};

/// Largest value a parameter word can hold.
pub const WORD_MAX: u16 = u16::MAX;

const RESERVED: u16 = 0;
const UNITY: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GainTerm {
    Proportional,
    Integral,
    Derivative,
}

impl fmt::Display for GainTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GainTerm::Proportional => "kp",
            GainTerm::Integral => "ki",
            GainTerm::Derivative => "kd",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PidGains {
    pub kp: Gain,
    pub ki: Gain,
    pub kd: Gain,
}

impl PidGains {
    pub fn new(kp: Gain, ki: Gain, kd: Gain) -> Self {
        Self { kp, ki, kd }
    }

    pub fn terms(&self) -> [(GainTerm, &Gain); 3] {
        [
            (GainTerm::Proportional, &self.kp),
            (GainTerm::Integral, &self.ki),
            (GainTerm::Derivative, &self.kd),
        ]
    }
}

/// Fixed-point PID parameters for one axis. Each gain is `value / divisor`.
///
/// `unit_mul` and `unit_div` are unit scaling placeholders; the firmware
/// currently expects both to be 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidBlock {
    pub kp: u16,
    pub ki: u16,
    pub kd: u16,
    pub divisor: u16,
    pub unit_mul: u16,
    pub unit_div: u16,
}

impl PidBlock {
    pub const WORDS: usize = 8;

    /// Layout as stored in EEPROM: gains, divisor, two reserved words, unit scaling.
    pub fn to_words(&self) -> [u16; Self::WORDS] {
        [
            self.kp,
            self.ki,
            self.kd,
            self.divisor,
            RESERVED,
            RESERVED,
            self.unit_mul,
            self.unit_div,
        ]
    }
}

/// Finds the largest divisor, starting from the LCM of the gain denominators
/// and halving, at which the divisor and every `floor(gain * divisor)` fit in a
/// 16-bit word.
pub fn quantize(gains: &PidGains) -> Result<PidBlock, QuantizeError> {
    let terms = gains.terms();

    if let Some(&(term, value)) = terms.iter().find(|(_, gain)| gain.is_negative()) {
        return Err(QuantizeError::NegativeGain {
            term,
            value: value.clone(),
        });
    }

    let two = BigInt::from(2);
    let mut divisor = terms
        .iter()
        .fold(BigInt::one(), |lcm, (_, gain)| lcm.lcm(gain.denom()));

    debug!("Denominator LCM for {}/{}/{}: {}", gains.kp, gains.ki, gains.kd, divisor);

    // The divisor strictly decreases and never drops below 1, so this ends
    // after at most log2(LCM) + 16 rounds.
    loop {
        let Some(candidate) = divisor.to_u16() else {
            divisor /= &two;
            continue;
        };

        let scaled = terms.map(|(_, gain)| gain.scaled(&divisor).to_u16());
        trace!("Divisor {} gives {:?}", candidate, scaled);

        let overflow = terms
            .iter()
            .zip(&scaled)
            .find(|(_, value)| value.is_none())
            .map(|(&(term, gain), _)| (term, gain));

        match (overflow, scaled) {
            (None, [Some(kp), Some(ki), Some(kd)]) => {
                debug!(
                    "Quantized to kp={} ki={} kd={} / {}",
                    kp, ki, kd, candidate
                );
                return Ok(PidBlock {
                    kp,
                    ki,
                    kd,
                    divisor: candidate,
                    unit_mul: UNITY,
                    unit_div: UNITY,
                });
            }
            (Some((term, gain)), _) if candidate == 1 => {
                return Err(QuantizeError::RangeExceeded {
                    term,
                    value: gain.clone(),
                });
            }
            _ => divisor /= &two,
        }
    }
}
