//! Types that can be used in other crates

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{CustomResult, ValidationError};

/// This Unit struct represents MinorUnit aka the lowest denomination of a
/// currency (kuruş for TRY, cents for USD/EUR).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct MinorUnit(i64);

impl MinorUnit {
    /// Construct from an amount already expressed in minor units.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Convert a major-unit decimal (e.g. `150.00`) into minor units.
    /// Rounds to the nearest minor unit the way the upstream API encodes
    /// amounts.
    pub fn from_major_f64(amount: f64) -> CustomResult<Self, ValidationError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ValidationError::IncorrectValueProvided {
                field_name: "amount",
            }
            .into());
        }
        #[allow(clippy::as_conversions)]
        Ok(Self((amount * 100.0).round() as i64))
    }

    /// Amount in minor units.
    pub const fn get_amount_as_i64(self) -> i64 {
        self.0
    }

    /// Major-unit decimal with two places: `15000` -> `"150.00"`.
    pub fn to_major_unit_string(self) -> String {
        format!("{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }

    /// Plain minor-unit (cents) integer string: `15000` -> `"15000"`.
    /// Also the POSNET amount coding, which is the two-decimal major
    /// string with the dot stripped.
    pub fn to_minor_unit_string(self) -> String {
        self.0.to_string()
    }

    /// Major-unit f64 view for API responses.
    #[allow(clippy::as_conversions)]
    pub fn to_major_unit_f64(self) -> f64 {
        (self.0 as f64) / 100.0
    }
}

impl fmt::Display for MinorUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for MinorUnit {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

#[cfg(test)]
mod amount_tests {
    #![allow(clippy::expect_used)]

    use super::MinorUnit;

    #[test]
    fn major_string_two_places() {
        assert_eq!(MinorUnit::new(15000).to_major_unit_string(), "150.00");
        assert_eq!(MinorUnit::new(15050).to_major_unit_string(), "150.50");
        assert_eq!(MinorUnit::new(5).to_major_unit_string(), "0.05");
    }

    #[test]
    fn minor_string_is_cents() {
        assert_eq!(MinorUnit::new(15000).to_minor_unit_string(), "15000");
    }

    #[test]
    fn from_major_rounds() {
        assert_eq!(
            MinorUnit::from_major_f64(150.00).expect("valid").get_amount_as_i64(),
            15000
        );
        assert_eq!(
            MinorUnit::from_major_f64(0.1).expect("valid").get_amount_as_i64(),
            10
        );
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(MinorUnit::from_major_f64(-1.0).is_err());
        assert!(MinorUnit::from_major_f64(f64::NAN).is_err());
    }
}
