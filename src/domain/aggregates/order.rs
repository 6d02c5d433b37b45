//! Order aggregate
//!
//! A `PendingOrder` is the durable order record assembled after a successful
//! payment capture. It is a point-in-time snapshot: line items carry the
//! resolved name, category and unit price so the order survives later catalog
//! edits. Once submitted it is never edited.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Completed,
}

/// One line of the order snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub product_category: String,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrder {
    pub user_id: String,
    pub address_id: String,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_id: Option<String>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// The external capture id this order settles against.
    pub payment_id: String,
    /// One key per checkout attempt; the backend uses it to reject a
    /// duplicate submission carrying the same capture.
    pub idempotency_key: Uuid,
}
