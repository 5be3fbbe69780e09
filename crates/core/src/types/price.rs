//! Decimal price representation.
//!
//! The Soko backend serializes `DecimalField`s as JSON strings (`"12.50"`),
//! but computed fields such as `total_price` sometimes arrive as JSON numbers.
//! [`Price`] accepts both encodings and always does arithmetic in
//! [`Decimal`], never in floating point.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Quantity;

/// Errors that can occur when parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("invalid price: {0}")]
    Invalid(String),
    /// The input is negative.
    #[error("price cannot be negative")]
    Negative,
}

/// A non-negative amount in the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if the amount is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount))
    }

    /// Parse a price from its decimal string form (e.g. `"12.50"`).
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a decimal or is negative.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let amount =
            Decimal::from_str(s.trim()).map_err(|_| PriceError::Invalid(s.to_string()))?;
        Self::new(amount)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Line total for `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: Quantity) -> Self {
        Self(self.0 * Decimal::from(quantity.get()))
    }

    /// Format for display with a currency label, e.g. `Kshs. 12.50`.
    #[must_use]
    pub fn display(&self, label: &str) -> String {
        format!("{label} {self}")
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0.round_dp(2))
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Price {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

struct PriceVisitor;

impl Visitor<'_> for PriceVisitor {
    type Value = Price;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal price as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
        Price::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
        Price::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
        Price::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
        let amount = Decimal::try_from(v).map_err(E::custom)?;
        // f64 inputs carry binary noise past the cent
        Price::new(amount.round_dp(2)).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PriceVisitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn price(s: &str) -> Price {
        Price::parse(s).unwrap()
    }

    #[test]
    fn test_deserialize_string_and_number() {
        let from_str: Price = serde_json::from_str("\"12.50\"").unwrap();
        let from_float: Price = serde_json::from_str("12.5").unwrap();
        let from_int: Price = serde_json::from_str("12").unwrap();

        assert_eq!(from_str, from_float);
        assert_eq!(from_int, price("12.00"));
    }

    #[test]
    fn test_float_noise_is_rounded_to_cents() {
        let p: Price = serde_json::from_str("0.30000000000000004").unwrap();
        assert_eq!(p, price("0.30"));
    }

    #[test]
    fn test_rejects_garbage_and_negative() {
        assert!(serde_json::from_str::<Price>("\"abc\"").is_err());
        assert!(serde_json::from_str::<Price>("\"-1.00\"").is_err());
        assert!(serde_json::from_str::<Price>("true").is_err());
        assert_eq!(Price::parse("-3"), Err(PriceError::Negative));
    }

    #[test]
    fn test_times_quantity() {
        let unit = price("19.99");
        let qty = Quantity::new(3).unwrap();
        assert_eq!(unit.times(qty), price("59.97"));
    }

    #[test]
    fn test_sum() {
        let prices = [price("1.10"), price("2.20"), price("3.30")];
        let total: Price = prices.iter().sum();
        assert_eq!(total, price("6.60"));
        assert_eq!(Vec::<Price>::new().into_iter().sum::<Price>(), Price::ZERO);
    }

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(price("5").to_string(), "5.00");
        assert_eq!(price("1234.5").display("Kshs."), "Kshs. 1234.50");
    }

    #[test]
    fn test_serializes_as_string() {
        assert_eq!(serde_json::to_string(&price("9.90")).unwrap(), "\"9.90\"");
    }
}
