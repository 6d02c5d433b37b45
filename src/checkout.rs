//! Order/payment orchestrator
//!
//! Drives one checkout session through the staged pipeline:
//!
//! ```text
//! Idle -> ContactCollected -> PaymentIntentCreated -> PaymentCaptured -> OrderSubmitted
//! ```
//!
//! with `Failed(reason)` reachable from every non-idle stage. Stage matching
//! enforces the ordering invariants: an order is never submitted without a
//! successful capture in the same attempt, and the cart is cleared exactly
//! once, only after the order record is durably created. A failed intent or
//! capture re-enters at intent creation with address, coupon and contact
//! preserved; a post-capture order failure stays terminal.
//!
//! Driver methods take `&mut self`, so at most one remote step can be in
//! flight per session; the HTTP surface keeps each session behind its own
//! async mutex and rejects overlapping requests instead of queueing them.

use std::sync::Arc;
use uuid::Uuid;

use serde::Serialize;
use thiserror::Error;

use crate::cart::SyncedCart;
use crate::coupon::{self, AppliedCoupon, CheckoutTotals, Coupon, CouponError};
use crate::domain::aggregates::{OrderItem, PaymentMethod, PaymentStatus, PendingOrder};
use crate::domain::events::{CheckoutEvent, EventPublisher};
use crate::pricing::{self, ResolvedLine};
use crate::remote::{
    CartStore, CheckoutGate, CouponDirectory, GateDecision, GateReason, OrderService,
    PaymentGateway, ProductCatalog, RemoteError,
};

/// Collaborators a checkout session works against.
#[derive(Clone)]
pub struct CheckoutDeps {
    pub catalog: Arc<dyn ProductCatalog>,
    pub coupons: Arc<dyn CouponDirectory>,
    pub cart: Arc<dyn CartStore>,
    pub gate: Arc<dyn CheckoutGate>,
    pub payments: Arc<dyn PaymentGateway>,
    pub orders: Arc<dyn OrderService>,
    pub events: EventPublisher,
}

/// Terminal failure of a checkout attempt.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutFailure {
    #[error("{}", .reason.message())]
    Gate { reason: GateReason },
    #[error("payment could not be initiated")]
    PaymentIntentFailed,
    #[error("payment could not be processed")]
    PaymentCaptureFailed,
    /// The most severe class: funds were captured but no order record
    /// exists. Never retried automatically; the capture id is kept for
    /// support reconciliation.
    #[error("payment was received but the order could not be recorded; please contact support with reference {capture_id}")]
    OrderCreationFailed { capture_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum CheckoutStage {
    Idle,
    ContactCollected,
    PaymentIntentCreated { intent_id: String },
    PaymentCaptured { capture_id: String },
    OrderSubmitted { order_id: String },
    Failed { reason: CheckoutFailure },
}

impl CheckoutStage {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ContactCollected => "contact_collected",
            Self::PaymentIntentCreated { .. } => "payment_intent_created",
            Self::PaymentCaptured { .. } => "payment_captured",
            Self::OrderSubmitted { .. } => "order_submitted",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Recoverable errors. The session stays at its current stage; the caller
/// corrects the input and retries.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("checkout is at the {actual} step, expected {expected}")]
    OutOfOrder {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("cart is empty")]
    EmptyCart,
    #[error("no delivery address selected")]
    MissingAddress,
    #[error("'{product_id}' is no longer available")]
    UnavailableProduct { product_id: String },
    #[error("only {available} of '{name}' in stock, requested {requested}")]
    InsufficientStock {
        name: String,
        requested: u32,
        available: u32,
    },
    #[error(transparent)]
    Coupon(#[from] CouponError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub struct CheckoutSession {
    id: Uuid,
    user_id: String,
    deps: CheckoutDeps,
    cart: SyncedCart,
    coupon_list: Vec<Coupon>,
    resolved: Vec<ResolvedLine>,
    applied: Option<AppliedCoupon>,
    address_id: Option<String>,
    email: Option<String>,
    stage: CheckoutStage,
    /// One key per payment attempt, minted at intent creation and attached
    /// to order submission.
    idempotency_key: Option<Uuid>,
}

impl CheckoutSession {
    pub fn new(deps: CheckoutDeps, user_id: impl Into<String>) -> Self {
        let cart = SyncedCart::new(deps.cart.clone());
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            deps,
            cart,
            coupon_list: Vec::new(),
            resolved: Vec::new(),
            applied: None,
            address_id: None,
            email: None,
            stage: CheckoutStage::Idle,
            idempotency_key: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> &CheckoutStage {
        &self.stage
    }

    pub fn resolved_lines(&self) -> &[ResolvedLine] {
        &self.resolved
    }

    pub fn applied_coupon(&self) -> Option<&AppliedCoupon> {
        self.applied.as_ref()
    }

    /// The screened contact email, once the gate has passed.
    pub fn contact_email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn select_address(&mut self, address_id: impl Into<String>) {
        self.address_id = Some(address_id.into());
    }

    /// Fetches the session's coupon list and cart, then resolves pricing.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn load(&mut self) -> Result<(), CheckoutError> {
        self.coupon_list = self.deps.coupons.list_coupons().await?;
        self.cart.refresh().await?;
        self.refresh_pricing().await;
        Ok(())
    }

    /// Re-resolves every line. Never cached: flash-sale prices move with the
    /// clock, so pricing is recomputed on load and again before payment.
    pub async fn refresh_pricing(&mut self) {
        self.resolved =
            pricing::resolve_cart(self.deps.catalog.as_ref(), self.cart.snapshot().lines()).await;
    }

    pub fn totals(&self) -> CheckoutTotals {
        CheckoutTotals::compute(
            pricing::subtotal(&self.resolved),
            self.applied.as_ref().map(|a| &a.coupon),
        )
    }

    /// Validates and applies a coupon code against the session's coupon
    /// list. A successful application replaces any prior coupon; at most one
    /// is active per session.
    pub fn apply_coupon(&mut self, code: &str) -> Result<&AppliedCoupon, CouponError> {
        let subtotal = pricing::subtotal(&self.resolved);
        match coupon::apply_coupon(code, &self.coupon_list, chrono::Utc::now(), &subtotal) {
            Ok(applied) => Ok(&*self.applied.insert(applied)),
            Err(err) => {
                // A failed apply also drops any previously applied coupon,
                // mirroring what the shopper sees in the summary.
                self.applied = None;
                Err(err)
            }
        }
    }

    pub fn remove_coupon(&mut self) {
        self.applied = None;
    }

    /// Pre-payment gate: screens the contact email with the protection
    /// collaborator. A denial is terminal for this attempt; the shopper
    /// corrects the input and a retry runs the gate again.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn submit_contact(&mut self, email: &str) -> Result<&CheckoutStage, CheckoutError> {
        match &self.stage {
            CheckoutStage::Idle
            | CheckoutStage::ContactCollected
            | CheckoutStage::Failed {
                reason: CheckoutFailure::Gate { .. },
            } => {}
            other => {
                return Err(CheckoutError::OutOfOrder {
                    expected: "idle",
                    actual: other.name(),
                })
            }
        }

        self.stage = match self.deps.gate.screen(email).await {
            Ok(GateDecision::Allowed) => {
                self.email = Some(email.to_string());
                CheckoutStage::ContactCollected
            }
            Ok(GateDecision::Denied(reason)) => {
                tracing::info!(?reason, "checkout gate denied");
                CheckoutStage::Failed {
                    reason: CheckoutFailure::Gate { reason },
                }
            }
            Err(err) => {
                tracing::warn!(%err, "checkout gate unreachable");
                CheckoutStage::Failed {
                    reason: CheckoutFailure::Gate {
                        reason: GateReason::ServiceUnavailable,
                    },
                }
            }
        };
        Ok(&self.stage)
    }

    /// Creates the external payment intent sized to the post-discount total.
    ///
    /// Also the retry entry point after a failed intent or capture: those
    /// failures leave cart, coupon, address and contact intact, so a new
    /// payment attempt starts here with fresh pricing.
    ///
    /// Validation failures abort synchronously without contacting the
    /// gateway: the address and cart must be present, pricing is refreshed,
    /// and any sentinel line or quantity above available stock rejects the
    /// attempt (a sentinel would silently charge zero for the line).
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn create_payment_intent(&mut self) -> Result<&CheckoutStage, CheckoutError> {
        match &self.stage {
            CheckoutStage::ContactCollected
            | CheckoutStage::Failed {
                reason:
                    CheckoutFailure::PaymentIntentFailed | CheckoutFailure::PaymentCaptureFailed,
            } => {}
            other => {
                return Err(CheckoutError::OutOfOrder {
                    expected: "contact_collected",
                    actual: other.name(),
                })
            }
        }
        if self.address_id.is_none() {
            return Err(CheckoutError::MissingAddress);
        }

        self.cart.refresh().await?;
        self.refresh_pricing().await;
        if self.resolved.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        for line in &self.resolved {
            if !line.found {
                return Err(CheckoutError::UnavailableProduct {
                    product_id: line.line.product_id.clone(),
                });
            }
            if line.line.quantity > line.available_stock {
                return Err(CheckoutError::InsufficientStock {
                    name: line.display_name.clone(),
                    requested: line.line.quantity,
                    available: line.available_stock,
                });
            }
        }

        let total = self.totals().total;
        match self.deps.payments.create_intent(&self.resolved, &total).await {
            Ok(intent_id) => {
                self.idempotency_key = Some(Uuid::new_v4());
                tracing::info!(%intent_id, total = %total, "payment intent created");
                self.stage = CheckoutStage::PaymentIntentCreated { intent_id };
            }
            Err(err) => {
                tracing::warn!(%err, "payment intent creation failed");
                self.stage = CheckoutStage::Failed {
                    reason: CheckoutFailure::PaymentIntentFailed,
                };
            }
        }
        Ok(&self.stage)
    }

    /// Captures the approved intent. On failure the cart and coupon are left
    /// untouched so the shopper can retry the whole payment attempt.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn capture_payment(&mut self) -> Result<&CheckoutStage, CheckoutError> {
        let intent_id = match &self.stage {
            CheckoutStage::PaymentIntentCreated { intent_id } => intent_id.clone(),
            other => {
                return Err(CheckoutError::OutOfOrder {
                    expected: "payment_intent_created",
                    actual: other.name(),
                })
            }
        };

        match self.deps.payments.capture(&intent_id).await {
            Ok(capture) => {
                tracing::info!(capture_id = %capture.id, "payment captured");
                self.deps
                    .events
                    .publish(&CheckoutEvent::PaymentCaptured {
                        session_id: self.id,
                        capture_id: capture.id.clone(),
                        total: self.totals().total,
                    })
                    .await;
                self.stage = CheckoutStage::PaymentCaptured {
                    capture_id: capture.id,
                };
            }
            Err(err) => {
                tracing::warn!(%intent_id, %err, "payment capture failed");
                self.stage = CheckoutStage::Failed {
                    reason: CheckoutFailure::PaymentCaptureFailed,
                };
            }
        }
        Ok(&self.stage)
    }

    /// Submits the durable order record and, only once that succeeds, clears
    /// the cart. A submission failure after capture is terminal and never
    /// retried automatically: a blind retry against the same capture id
    /// could create a duplicate order for one payment.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn submit_order(&mut self) -> Result<&CheckoutStage, CheckoutError> {
        let capture_id = match &self.stage {
            CheckoutStage::PaymentCaptured { capture_id } => capture_id.clone(),
            other => {
                return Err(CheckoutError::OutOfOrder {
                    expected: "payment_captured",
                    actual: other.name(),
                })
            }
        };
        let address_id = self.address_id.clone().ok_or(CheckoutError::MissingAddress)?;

        let totals = self.totals();
        let order = PendingOrder {
            user_id: self.user_id.clone(),
            address_id,
            items: self
                .resolved
                .iter()
                .map(|line| OrderItem {
                    product_id: line.line.product_id.clone(),
                    product_name: line.display_name.clone(),
                    product_category: line.category_name.clone(),
                    quantity: line.line.quantity,
                    size: line.line.variation.size.clone(),
                    color: line.line.variation.color.clone(),
                    price: line.unit_price.clone(),
                })
                .collect(),
            coupon_id: self.applied.as_ref().map(|a| a.coupon.id.clone()),
            total: totals.total.clone(),
            payment_method: PaymentMethod::CreditCard,
            payment_status: PaymentStatus::Completed,
            payment_id: capture_id.clone(),
            idempotency_key: self.idempotency_key.unwrap_or_else(Uuid::new_v4),
        };

        match self.deps.orders.create_order(&order).await {
            Ok(created) => {
                tracing::info!(order_id = %created.id, "order submitted");
                // Order is durable; losing the clear is recoverable, losing
                // the order is not.
                if let Err(err) = self.cart.clear().await {
                    tracing::warn!(%err, "cart clear after order submission failed");
                }
                self.deps
                    .events
                    .publish(&CheckoutEvent::OrderSubmitted {
                        session_id: self.id,
                        order_id: created.id.clone(),
                        user_id: self.user_id.clone(),
                        total: totals.total,
                    })
                    .await;
                self.stage = CheckoutStage::OrderSubmitted {
                    order_id: created.id,
                };
            }
            Err(err) => {
                tracing::error!(%capture_id, %err, "order creation failed after capture");
                self.stage = CheckoutStage::Failed {
                    reason: CheckoutFailure::OrderCreationFailed { capture_id },
                };
            }
        }
        Ok(&self.stage)
    }
}
