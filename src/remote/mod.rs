//! Collaborator interfaces
//!
//! Everything the checkout core needs from the outside world sits behind one
//! of these traits: the catalog, the remote cart store, the coupon directory,
//! the email/bot protection gate, the payment processor and order creation.
//! HTTP implementations live in [`http`]; tests use in-memory fakes.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::coupon::Coupon;
use crate::domain::aggregates::{Cart, CartLine, PendingOrder};
use crate::domain::value_objects::Money;
use crate::pricing::{ProductRecord, ResolvedLine};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Why the protection gate refused to open the payment flow.
///
/// The first five come back on the wire; `ServiceUnavailable` is synthesized
/// locally when the gate itself cannot be reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    DisposableEmail,
    InvalidEmail,
    NoMxRecords,
    BotDetected,
    RateLimited,
    ServiceUnavailable,
}

impl GateReason {
    /// User-facing message for the denial.
    pub fn message(&self) -> &'static str {
        match self {
            Self::DisposableEmail => "Disposable email addresses are not allowed",
            Self::InvalidEmail => "Please enter a valid email address",
            Self::NoMxRecords => "This email domain cannot receive mail",
            Self::BotDetected => "Automated traffic detected",
            Self::RateLimited => "Too many attempts, please wait and try again",
            Self::ServiceUnavailable => "Verification is temporarily unavailable",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Denied(GateReason),
}

/// Successful payment capture returned by the gateway.
#[derive(Clone, Debug, Deserialize)]
pub struct Capture {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreatedOrder {
    pub id: String,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// `Ok(None)` means the product does not exist; callers degrade to a
    /// sentinel line rather than failing the checkout view.
    async fn product_by_id(&self, id: &str) -> Result<Option<ProductRecord>, RemoteError>;
}

#[async_trait]
pub trait CouponDirectory: Send + Sync {
    async fn list_coupons(&self) -> Result<Vec<Coupon>, RemoteError>;
}

/// Remote cart store. Every mutation returns the authoritative post-mutation
/// cart; callers replace their local snapshot with it, never merge.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn fetch(&self) -> Result<Cart, RemoteError>;
    async fn add_line(&self, line: CartLine) -> Result<Cart, RemoteError>;
    async fn update_quantity(&self, line_id: Uuid, quantity: u32) -> Result<Cart, RemoteError>;
    async fn remove_line(&self, line_id: Uuid) -> Result<Cart, RemoteError>;
    async fn clear(&self) -> Result<Cart, RemoteError>;
}

/// Email/bot protection service consulted before the payment UI is shown.
#[async_trait]
pub trait CheckoutGate: Send + Sync {
    async fn screen(&self, email: &str) -> Result<GateDecision, RemoteError>;
}

/// Two-phase external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent sized to `total`, returning its id.
    async fn create_intent(
        &self,
        lines: &[ResolvedLine],
        total: &Money,
    ) -> Result<String, RemoteError>;

    /// Captures an approved intent. An error here means no funds moved and
    /// the shopper may retry.
    async fn capture(&self, intent_id: &str) -> Result<Capture, RemoteError>;
}

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn create_order(&self, order: &PendingOrder) -> Result<CreatedOrder, RemoteError>;
}
