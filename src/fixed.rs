//! Fixed-Point Math
//!
//! Raw integers carrying a fixed number of fractional digits:
//! - D18: basket weights, tolerances and spreads ({1})
//! - D27: exchange rates ({buyTok/sellTok}), limits ({tok/share}), USD prices
//! - D36: simulator working precision (`Precise`, 512-bit)
//!
//! Derived quantities are evaluated as one exact fraction on 512-bit
//! integers and rounded once. Floats and decimal strings only enter
//! through the parsers at the bottom of this file.

use alloy_primitives::{U256, U512};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{RebalanceError, Result};

// ============================================
// SCALES
// ============================================

/// 1e18
pub const D18: u128 = 1_000_000_000_000_000_000;

/// 1e27
pub const D27: u128 = 1_000_000_000_000_000_000_000_000_000;

/// Fractional digits of `Precise`
pub const PRECISE_DECIMALS: u32 = 36;

/// Largest token precision accepted
pub const MAX_TOKEN_DECIMALS: u8 = 36;

/// Digits of the saturating limit / auction value (1e54)
pub const MAX_LIMIT_DECIMALS: u32 = 54;

/// 10^exp on 512 bits
pub fn pow10(exp: u32) -> U512 {
    U512::from(10u64).pow(U512::from(exp))
}

/// 1e54, the saturating "unbounded" value
pub fn max_limit() -> U256 {
    U256::from(10u64).pow(U256::from(MAX_LIMIT_DECIMALS))
}

// ============================================
// EXACT FRACTIONS
// ============================================

/// Rounding applied when a fraction is re-quantized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Floor,
    Ceil,
    /// Half up
    Nearest,
}

/// `num / den` rounded as requested
pub fn div_round(num: U512, den: U512, rounding: Rounding) -> Result<U512> {
    if den.is_zero() {
        return Err(RebalanceError::Arithmetic("division by zero"));
    }

    let quotient = num / den;
    let remainder = num % den;

    let bump = match rounding {
        Rounding::Floor => false,
        Rounding::Ceil => !remainder.is_zero(),
        // remainder * 2 >= den, without the overflow
        Rounding::Nearest => !remainder.is_zero() && remainder >= den - remainder,
    };

    Ok(if bump {
        quotient + U512::from(1u64)
    } else {
        quotient
    })
}

/// `a * b / den` with a single rounding step
pub fn mul_div(a: U512, b: U512, den: U512, rounding: Rounding) -> Result<U512> {
    let product = a
        .checked_mul(b)
        .ok_or(RebalanceError::Arithmetic("multiplication overflow"))?;
    div_round(product, den, rounding)
}

/// Widen a 256-bit value
pub fn widen(value: U256) -> U512 {
    let limbs = value.as_limbs();
    U512::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3], 0, 0, 0, 0])
}

/// Narrow a 512-bit value, failing when it does not fit in 256 bits
pub fn narrow(value: U512) -> Result<U256> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|&limb| limb != 0) {
        return Err(RebalanceError::Arithmetic("value exceeds 256 bits"));
    }
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// Narrow and clamp to 1e54
pub fn saturate(value: U512) -> U256 {
    let max = max_limit();
    if value > widen(max) {
        max
    } else {
        // fits: 1e54 < 2^256
        narrow(value).unwrap_or(max)
    }
}

// ============================================
// FIXED-POINT NEWTYPE
// ============================================

/// Raw unsigned value scaled by `10^D`
///
/// One type per scale; the raw integer is what an on-chain consumer sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed<const D: u32>(U256);

/// D18{1}: basket fractions, tolerances, spreads
pub type Weight = Fixed<18>;

/// D27{buyTok/sellTok}: decimal-adjusted exchange rate
pub type Rate = Fixed<27>;

/// D27{tok/share}: raw tokens per raw share
pub type ShareRatio = Fixed<27>;

/// D27{USD/wholeTok}
pub type UsdPrice = Fixed<27>;

impl<const D: u32> Fixed<D> {
    pub const ZERO: Self = Self(U256::ZERO);

    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> U256 {
        self.0
    }

    /// One whole unit (`10^D` raw)
    pub fn one() -> Self {
        Self(U256::from(10u64).pow(U256::from(D)))
    }

    pub fn scale() -> U512 {
        pow10(D)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn widen(self) -> U512 {
        widen(self.0)
    }

    /// Whole-unit float, e.g. `0.01` for a 1% weight
    pub fn from_f64(value: f64) -> Result<Self> {
        parse_f64(value, D, "fixed-point value").map(Self)
    }

    /// Whole-unit decimal string, e.g. `"0.5"`
    pub fn parse(text: &str) -> Result<Self> {
        parse_units(text, D).map(Self)
    }

    /// Raw decimal string, e.g. `"5e26"`
    pub fn parse_raw(text: &str) -> Result<Self> {
        parse_units(text, 0).map(Self)
    }

    /// Lossy whole-unit float for display
    pub fn to_f64(self) -> f64 {
        scaled_to_f64(&self.0.to_string(), D)
    }
}

impl<const D: u32> std::fmt::Display for Fixed<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<const D: u32> Serialize for Fixed<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        amount::serialize(&self.0, serializer)
    }
}

impl<'de, const D: u32> Deserialize<'de> for Fixed<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> std::result::Result<Self, De::Error> {
        amount::deserialize(deserializer).map(Self)
    }
}

/// Serde for raw amounts as decimal strings (`"1e21"`, `"1000"`) or integers
pub mod amount {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Int(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => super::parse_units(&text, 0).map_err(serde::de::Error::custom),
            Repr::Int(n) => Ok(U256::from(n)),
        }
    }
}

// ============================================
// HIGH-PRECISION WORKING VALUE
// ============================================

/// D36 on 512 bits, used where values are updated repeatedly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Precise(U512);

impl Precise {
    pub const ZERO: Self = Self(U512::ZERO);

    pub const fn from_raw(raw: U512) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> U512 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Exact: D18 -> D36
    pub fn from_weight(weight: Weight) -> Self {
        Self(weight.widen() * pow10(PRECISE_DECIMALS - 18))
    }

    /// Round half up back to D18
    pub fn to_weight(self) -> Result<Weight> {
        let raw = div_round(self.0, pow10(PRECISE_DECIMALS - 18), Rounding::Nearest)?;
        narrow(raw).map(Weight::from_raw)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(RebalanceError::Arithmetic("addition overflow"))
    }

    pub fn to_f64(self) -> f64 {
        scaled_to_f64(&self.0.to_string(), PRECISE_DECIMALS)
    }
}

// ============================================
// BOUNDARY PARSING
// ============================================

/// Parse `"1000"`, `"0.5"`, `"1.01e39"` into an integer scaled by `10^decimals`.
///
/// Digits beyond the kept precision are rounded half up.
pub fn parse_units(text: &str, decimals: u32) -> Result<U256> {
    let invalid = || RebalanceError::InvalidInput {
        what: "decimal number",
        value: text.to_string(),
    };

    let cleaned = text.trim().replace('_', "");
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    let (mantissa, exponent) = match cleaned.find(|c: char| c == 'e' || c == 'E') {
        Some(pos) => (
            &cleaned[..pos],
            cleaned[pos + 1..].parse::<i64>().map_err(|_| invalid())?,
        ),
        None => (cleaned, 0),
    };

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }

    let ten = U512::from(10u64);
    let mut digits = U512::ZERO;
    for c in int_part.chars().chain(frac_part.chars()) {
        let digit = c.to_digit(10).ok_or_else(invalid)?;
        digits = digits
            .checked_mul(ten)
            .and_then(|v| v.checked_add(U512::from(digit)))
            .ok_or_else(invalid)?;
    }

    let shift = exponent + decimals as i64 - frac_part.len() as i64;
    let scaled = if digits.is_zero() {
        U512::ZERO
    } else if shift >= 0 {
        if shift > 154 {
            return Err(invalid());
        }
        digits.checked_mul(pow10(shift as u32)).ok_or_else(invalid)?
    } else if -shift > 154 {
        U512::ZERO
    } else {
        div_round(digits, pow10((-shift) as u32), Rounding::Nearest)?
    };

    narrow(scaled).map_err(|_| invalid())
}

/// Nearest float to `digits / 10^decimals`, rounded once by the float parser
pub fn scaled_to_f64(digits: &str, decimals: u32) -> f64 {
    let decimals = decimals as usize;
    let text = if decimals == 0 {
        digits.to_string()
    } else if digits.len() > decimals {
        let (int, frac) = digits.split_at(digits.len() - decimals);
        format!("{}.{}", int, frac)
    } else {
        format!("0.{}{}", "0".repeat(decimals - digits.len()), digits)
    };
    text.parse().unwrap_or(0.0)
}

/// Raw amount with no scaling, e.g. `parse_amount("1e21")`
pub fn parse_amount(text: &str) -> Result<U256> {
    parse_units(text, 0)
}

/// Parse a non-negative float through its shortest decimal form,
/// so `0.01` is exactly `1e16` at D18.
pub fn parse_f64(value: f64, decimals: u32, what: &'static str) -> Result<U256> {
    if !value.is_finite() || value < 0.0 {
        return Err(RebalanceError::InvalidInput {
            what,
            value: value.to_string(),
        });
    }

    // -0.0 prints with a sign
    let value = if value == 0.0 { 0.0 } else { value };

    parse_units(&value.to_string(), decimals).map_err(|_| RebalanceError::InvalidInput {
        what,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(text: &str) -> U256 {
        parse_amount(text).unwrap()
    }

    #[test]
    fn test_parse_units_forms() {
        assert_eq!(u("1000"), U256::from(1000u64));
        assert_eq!(u("1e21"), U256::from(10u64).pow(U256::from(21)));
        assert_eq!(u("0.5e18"), U256::from(500_000_000_000_000_000u128));
        assert_eq!(u("1.01e39"), U256::from(101u64) * U256::from(10u64).pow(U256::from(37)));
        assert_eq!(u("1_000"), U256::from(1000u64));
        assert_eq!(parse_units("0.5", 18).unwrap(), U256::from(D18 / 2));
        // half up beyond kept digits
        assert_eq!(parse_units("1.5", 0).unwrap(), U256::from(2u64));
        assert_eq!(parse_units("1.49", 0).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("1e").is_err());
        assert!(parse_amount("1e80").is_err()); // > 2^256
    }

    #[test]
    fn test_parse_f64_is_exact_for_short_decimals() {
        assert_eq!(parse_f64(0.01, 18, "tolerance").unwrap(), U256::from(10_000_000_000_000_000u128));
        assert_eq!(parse_f64(3000.0, 27, "price").unwrap(), U256::from(3000u64) * U256::from(D27));
        assert_eq!(parse_f64(0.000000000001, 27, "price").unwrap(), U256::from(1_000_000_000_000_000u128));
        assert_eq!(parse_f64(-0.0, 18, "price").unwrap(), U256::ZERO);
        assert!(parse_f64(f64::NAN, 18, "price").is_err());
        assert!(parse_f64(-1.0, 18, "price").is_err());
        assert!(parse_f64(f64::INFINITY, 18, "price").is_err());
    }

    #[test]
    fn test_mul_div_rounding() {
        let a = U512::from(10u64);
        let b = U512::from(1u64);
        let three = U512::from(3u64);
        assert_eq!(mul_div(a, b, three, Rounding::Floor).unwrap(), U512::from(3u64));
        assert_eq!(mul_div(a, b, three, Rounding::Ceil).unwrap(), U512::from(4u64));
        assert_eq!(mul_div(a, b, three, Rounding::Nearest).unwrap(), U512::from(3u64));
        assert_eq!(
            mul_div(U512::from(5u64), b, U512::from(2u64), Rounding::Nearest).unwrap(),
            U512::from(3u64)
        );
        assert!(div_round(a, U512::ZERO, Rounding::Floor).is_err());
    }

    #[test]
    fn test_widen_narrow_saturate() {
        let max = max_limit();
        assert_eq!(narrow(widen(max)).unwrap(), max);
        assert_eq!(narrow(widen(U256::MAX)).unwrap(), U256::MAX);
        assert!(narrow(widen(U256::MAX) + U512::from(1u64)).is_err());
        assert_eq!(saturate(pow10(60)), max);
        assert_eq!(saturate(U512::from(7u64)), U256::from(7u64));
    }

    #[test]
    fn test_precise_round_trip() {
        let w = Weight::parse("0.333333333333333333").unwrap();
        assert_eq!(Precise::from_weight(w).to_weight().unwrap(), w);
        assert_eq!(Precise::from_weight(Weight::one()).to_weight().unwrap(), Weight::one());

        // half a D18 unit rounds up
        let half = Precise::from_raw(pow10(17) * U512::from(5u64));
        assert_eq!(half.to_weight().unwrap().raw(), U256::from(1u64));
    }

    #[test]
    fn test_fixed_serde_as_decimal_strings() {
        let rate = Rate::parse_raw("1.01e39").unwrap();
        let json = serde_json::to_string(&rate).unwrap();
        assert_eq!(json, format!("\"{}\"", rate.raw()));
        let back: Rate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rate);

        let small: Weight = serde_json::from_str("42").unwrap();
        assert_eq!(small.raw(), U256::from(42u64));
    }

    #[test]
    fn test_fixed_to_f64() {
        assert_eq!(Weight::parse("0.25").unwrap().to_f64(), 0.25);
        assert_eq!(UsdPrice::from_f64(3000.0).unwrap().to_f64(), 3000.0);
        assert_eq!(UsdPrice::one().to_f64(), 1.0);
        assert_eq!(Precise::from_weight(Weight::parse("0.1").unwrap()).to_f64(), 0.1);
        assert_eq!(scaled_to_f64("5", 3), 0.005);
        assert_eq!(scaled_to_f64("0", 18), 0.0);
    }
}
