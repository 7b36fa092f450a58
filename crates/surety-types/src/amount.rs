//! Amount type with 18-decimal precision
//!
//! Stakes, premiums and payouts are unsigned base-unit integers. One
//! currency unit is `10^18` base units, so the reference stake of 10 units
//! and the 1 unit policy cap are exact. Payout multipliers are applied with
//! `rust_decimal` and floored; no floating point touches accounting.

use crate::{Result, TypesError};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Number of decimal places in one currency unit
pub const STANDARD_DECIMALS: u32 = 18;

/// Amount in base units
///
/// Serialized as a decimal string of base units; JSON numbers cannot carry
/// 128-bit values without losing precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(pub u128);

impl Amount {
    /// Base units per currency unit
    pub const UNIT: u128 = 1_000_000_000_000_000_000;

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn new(base_units: u128) -> Self {
        Self(base_units)
    }

    /// Whole currency units
    pub const fn units(units: u64) -> Self {
        Self(units as u128 * Self::UNIT)
    }

    /// Thousandths of a currency unit
    pub const fn milli_units(milli: u64) -> Self {
        Self(milli as u128 * (Self::UNIT / 1_000))
    }

    /// Convert a human-readable unit value such as `0.5`
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(TypesError::NegativeAmount {
                value: value.to_string(),
            });
        }
        let unit = Decimal::from_u128(Self::UNIT).ok_or(TypesError::AmountOverflow)?;
        value
            .checked_mul(unit)
            .and_then(|base| base.trunc().to_u128())
            .map(Self)
            .ok_or(TypesError::AmountOverflow)
    }

    /// Multiply by `factor`, rounding down to whole base units
    pub fn scale(self, factor: Decimal) -> Result<Self> {
        if factor.is_sign_negative() && !factor.is_zero() {
            return Err(TypesError::NegativeAmount {
                value: factor.to_string(),
            });
        }
        Decimal::from_u128(self.0)
            .and_then(|base| base.checked_mul(factor))
            .and_then(|scaled| scaled.floor().to_u128())
            .map(Self)
            .ok_or(TypesError::AmountOverflow)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn base_units(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::UNIT;
        let frac = self.0 % Self::UNIT;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", frac, width = STANDARD_DECIMALS as usize);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u128>().map(Self).map_err(serde::de::Error::custom)
    }
}
