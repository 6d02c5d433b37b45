//! Discount engine
//!
//! Validates a coupon code against the coupon list fetched for the session
//! and computes the discount against the current subtotal. Purely local and
//! therefore optimistic: a usage limit exhausted by another shopper between
//! list-fetch and apply is only caught by the backend at order submission.
//!
//! `usage_count` is never incremented here; the backend does that when an
//! order referencing the coupon is created.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    pub code: String,
    pub discount_percent: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub usage_count: u32,
    pub usage_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("invalid coupon code")]
    InvalidCode,
    #[error("coupon is not valid at this time or has expired")]
    Expired,
    #[error("coupon has reached its usage limit")]
    UsageLimitReached,
}

/// A successfully applied coupon, with the discount it yielded against the
/// subtotal it was applied to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedCoupon {
    pub coupon: Coupon,
    pub discount: Money,
}

/// Validates `code` and computes the discount. Checks run in order and the
/// first failure wins: exact-match lookup, validity window, usage limit.
/// Code matching is exact and case-sensitive.
pub fn apply_coupon(
    code: &str,
    coupons: &[Coupon],
    now: DateTime<Utc>,
    subtotal: &Money,
) -> Result<AppliedCoupon, CouponError> {
    let coupon = coupons
        .iter()
        .find(|c| c.code == code)
        .ok_or(CouponError::InvalidCode)?;

    if now < coupon.start_date || now > coupon.end_date {
        return Err(CouponError::Expired);
    }

    if coupon.usage_count >= coupon.usage_limit {
        return Err(CouponError::UsageLimitReached);
    }

    Ok(AppliedCoupon {
        discount: subtotal.percent(coupon.discount_percent),
        coupon: coupon.clone(),
    })
}

/// Subtotal, discount and final total for a checkout session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

impl CheckoutTotals {
    /// At most one coupon contributes; the total is clamped at zero.
    pub fn compute(subtotal: Money, coupon: Option<&Coupon>) -> Self {
        let discount = match coupon {
            Some(c) => subtotal.percent(c.discount_percent),
            None => Money::zero(subtotal.currency()),
        };
        let total = subtotal
            .subtract_clamped(&discount)
            .unwrap_or_else(|_| subtotal.clone());
        Self {
            subtotal,
            discount,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn coupon(code: &str, percent: Decimal, used: u32, limit: u32) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: format!("coupon-{code}"),
            code: code.into(),
            discount_percent: percent,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            usage_count: used,
            usage_limit: limit,
        }
    }

    #[test]
    fn valid_coupon_discounts_subtotal() {
        let coupons = vec![coupon("SAVE10", dec!(10), 0, 100)];
        let applied = apply_coupon("SAVE10", &coupons, Utc::now(), &Money::usd(100_00)).unwrap();
        assert_eq!(applied.discount, Money::usd(10_00));
        assert_eq!(applied.coupon.id, "coupon-SAVE10");

        let totals = CheckoutTotals::compute(Money::usd(100_00), Some(&applied.coupon));
        assert_eq!(totals.total, Money::usd(90_00));
    }

    #[test]
    fn unknown_code_is_invalid() {
        let coupons = vec![coupon("SAVE10", dec!(10), 0, 100)];
        let err = apply_coupon("NOPE", &coupons, Utc::now(), &Money::usd(100_00)).unwrap_err();
        assert_eq!(err, CouponError::InvalidCode);
    }

    #[test]
    fn code_match_is_case_sensitive() {
        let coupons = vec![coupon("SAVE10", dec!(10), 0, 100)];
        let err = apply_coupon("save10", &coupons, Utc::now(), &Money::usd(100_00)).unwrap_err();
        assert_eq!(err, CouponError::InvalidCode);
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let c = coupon("SAVE10", dec!(10), 0, 100);
        let subtotal = Money::usd(100_00);
        assert!(apply_coupon("SAVE10", &[c.clone()], c.start_date, &subtotal).is_ok());
        assert!(apply_coupon("SAVE10", &[c.clone()], c.end_date, &subtotal).is_ok());
        assert_eq!(
            apply_coupon(
                "SAVE10",
                &[c.clone()],
                c.start_date - Duration::seconds(1),
                &subtotal
            )
            .unwrap_err(),
            CouponError::Expired
        );
        assert_eq!(
            apply_coupon("SAVE10", &[c.clone()], c.end_date + Duration::seconds(1), &subtotal)
                .unwrap_err(),
            CouponError::Expired
        );
    }

    #[test]
    fn exhausted_coupon_is_rejected() {
        let coupons = vec![coupon("SAVE10", dec!(10), 5, 5)];
        let err = apply_coupon("SAVE10", &coupons, Utc::now(), &Money::usd(100_00)).unwrap_err();
        assert_eq!(err, CouponError::UsageLimitReached);

        // The total is unchanged when no coupon applies.
        let totals = CheckoutTotals::compute(Money::usd(100_00), None);
        assert_eq!(totals.total, Money::usd(100_00));
        assert!(totals.discount.is_zero());
    }

    #[test]
    fn expiry_wins_over_usage_limit() {
        let mut c = coupon("SAVE10", dec!(10), 5, 5);
        c.end_date = Utc::now() - Duration::days(1);
        c.start_date = Utc::now() - Duration::days(2);
        let err = apply_coupon("SAVE10", &[c], Utc::now(), &Money::usd(100_00)).unwrap_err();
        assert_eq!(err, CouponError::Expired);
    }

    #[test]
    fn fractional_percent_rounds_to_cent() {
        let coupons = vec![coupon("ODD", dec!(12.5), 0, 10)];
        let applied = apply_coupon("ODD", &coupons, Utc::now(), &Money::usd(19_99)).unwrap();
        // 12.5% of $19.99 = $2.49875 -> $2.50
        assert_eq!(applied.discount, Money::usd(2_50));
    }

    #[test]
    fn hundred_percent_coupon_never_goes_negative() {
        let coupons = vec![coupon("FREE", dec!(150), 0, 10)];
        let applied = apply_coupon("FREE", &coupons, Utc::now(), &Money::usd(10_00)).unwrap();
        let totals = CheckoutTotals::compute(Money::usd(10_00), Some(&applied.coupon));
        assert_eq!(totals.total, Money::usd(0));
    }
}
