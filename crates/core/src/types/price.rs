//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is zero or negative.
    #[error("price must be greater than 0")]
    NotPositive,
}

/// A strictly positive unit price.
///
/// Amounts are kept as [`Decimal`] so that totals computed from line items
/// (`price * quantity`) are exact.
///
/// ## Examples
///
/// ```
/// use bazaar_core::Price;
/// use rust_decimal::Decimal;
///
/// let price = Price::new(Decimal::new(1999, 2)).unwrap();
/// assert_eq!(price.line_total(4), Some(Decimal::new(7996, 2)));
///
/// assert!(Price::new(Decimal::ZERO).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a price, rejecting zero and negative amounts.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::NotPositive` if `amount <= 0`.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount <= Decimal::ZERO {
            return Err(PriceError::NotPositive);
        }
        Ok(Self(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Total for `quantity` units at this price, or `None` if it does not
    /// fit in a `Decimal`.
    #[must_use]
    pub fn line_total(&self, quantity: u32) -> Option<Decimal> {
        self.0.checked_mul(Decimal::from(quantity))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive() {
        assert_eq!(Price::new(Decimal::ZERO), Err(PriceError::NotPositive));
        assert_eq!(Price::new(Decimal::new(-1, 0)), Err(PriceError::NotPositive));
    }

    #[test]
    fn test_line_total_is_exact() {
        let price = Price::new(Decimal::new(1999, 2)).unwrap();
        assert_eq!(price.line_total(3), Some(Decimal::new(5997, 2)));
        assert_eq!(price.line_total(0), Some(Decimal::ZERO));
    }

    #[test]
    fn test_line_total_overflow() {
        let price = Price::new(Decimal::MAX).unwrap();
        assert_eq!(price.line_total(1), Some(Decimal::MAX));
        assert_eq!(price.line_total(2), None);
    }

    #[test]
    fn test_deserialize_from_number_and_string() {
        let a: Price = serde_json::from_str("19.99").unwrap();
        let b: Price = serde_json::from_str("\"19.99\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<Price>("0").is_err());
    }
}
