//! Value objects for the checkout domain

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Money value object.
///
/// Amounts are held in integer minor units (cents) so subtotal, discount and
/// total arithmetic never drifts; conversion to major units happens only at
/// display and serialization boundaries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    cents: i64,
    currency: String,
}

impl Money {
    pub fn new(cents: i64, currency: &str) -> Self {
        Self {
            cents,
            currency: currency.to_string(),
        }
    }

    pub fn usd(cents: i64) -> Self {
        Self::new(cents, "USD")
    }

    pub fn zero(currency: &str) -> Self {
        Self::new(0, currency)
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Major-unit representation, e.g. 1999 cents -> 19.99.
    pub fn major(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    /// Parse a major-unit amount, rounding to the nearest cent.
    pub fn from_major(amount: Decimal, currency: &str) -> Self {
        let cents = (amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(0);
        Self::new(cents, currency)
    }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch);
        }
        Ok(Money::new(self.cents + other.cents, &self.currency))
    }

    /// Subtraction clamped at zero. A discount larger than the subtotal can
    /// never drive a total negative.
    pub fn subtract_clamped(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch);
        }
        Ok(Money::new((self.cents - other.cents).max(0), &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money {
        Money::new(self.cents * i64::from(qty), &self.currency)
    }

    /// `percent` of this amount, rounded half-up to the nearest cent.
    pub fn percent(&self, percent: Decimal) -> Money {
        let cents = (Decimal::from(self.cents) * percent / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(0);
        Money::new(cents, &self.currency)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero("USD")
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.major(), self.currency)
    }
}

#[derive(Debug, Clone, Error)]
pub enum MoneyError {
    #[error("currency mismatch")]
    CurrencyMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn add_and_multiply() {
        let a = Money::usd(100_00);
        let b = Money::usd(50_00);
        assert_eq!(a.add(&b).unwrap().cents(), 150_00);
        assert_eq!(b.multiply(3).cents(), 150_00);
    }

    #[test]
    fn currency_mismatch_rejected() {
        let a = Money::usd(100);
        let b = Money::new(100, "EUR");
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn percent_rounds_half_up_to_cent() {
        // 10% of $0.05 is half a cent, rounds up
        assert_eq!(Money::usd(5).percent(dec!(10)).cents(), 1);
        assert_eq!(Money::usd(100_00).percent(dec!(10)).cents(), 10_00);
        // 12.5% of $19.99 = $2.49875 -> $2.50
        assert_eq!(Money::usd(19_99).percent(dec!(12.5)).cents(), 2_50);
    }

    #[test]
    fn subtract_clamps_at_zero() {
        let small = Money::usd(100);
        let big = Money::usd(500);
        assert_eq!(small.subtract_clamped(&big).unwrap().cents(), 0);
        assert_eq!(big.subtract_clamped(&small).unwrap().cents(), 400);
    }

    #[test]
    fn major_unit_conversion() {
        assert_eq!(Money::usd(19_99).major().to_string(), "19.99");
        assert_eq!(Money::from_major(dec!(19.99), "USD").cents(), 19_99);
        assert_eq!(Money::from_major(dec!(19.995), "USD").cents(), 20_00);
    }
}
