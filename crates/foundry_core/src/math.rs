//! Fixed-point math utilities for deterministic simulation.
//!
//! All simulation quantities (energy, cycle progress, ledger amounts,
//! elapsed time) use fixed-point arithmetic. Addition and subtraction are
//! exact, so splitting a time span across several ticks, or across an
//! offline catch-up and a live tick, never gains or loses a fraction of
//! a second.

use fixed::types::I32F32;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Convert host seconds into simulation time.
///
/// Frame deltas and wall-clock spans arrive from the host as floats.
/// NaN and negative values become zero; values beyond the fixed-point
/// range saturate.
#[must_use]
pub fn seconds(value: f64) -> Fixed {
    if value.is_nan() || value <= 0.0 {
        return Fixed::ZERO;
    }
    Fixed::saturating_from_num(value)
}

/// Convert a count (villagers, tiers) into a fixed-point multiplier.
#[must_use]
pub fn from_count(count: u32) -> Fixed {
    Fixed::saturating_from_num(count)
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across save/load.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for hand-written configuration values.
///
/// Designers write `cycle_duration: 12.5` in RON, not raw bits. Values are
/// read as `f64` and converted; NaN or out-of-range numbers are rejected.
pub mod decimal_serde {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| D::Error::custom(format!("{value} is not representable")))
    }
}
