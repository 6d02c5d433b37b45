//! Storefront Checkout
//!
//! Order-composition and checkout pipeline for an e-commerce storefront:
//! a remote-synced cart, fresh per-line price resolution with flash-sale
//! overrides, coupon validation, and a staged payment/order orchestrator
//! driving an external two-phase payment (intent -> capture) before the
//! durable order record is created.
//!
//! Catalog, cart storage, coupons, payment processing, order persistence and
//! email protection are external collaborators behind the traits in
//! [`remote`]; this crate owns no storage of its own.
//!
//! ## Pipeline
//! cart lines -> [`pricing`] (per-line unit price) -> subtotal ->
//! [`coupon`] (discount) -> total -> [`checkout`] (gate, intent, capture,
//! order, cart clear).

pub mod cart;
pub mod checkout;
pub mod config;
pub mod coupon;
pub mod domain;
pub mod pricing;
pub mod remote;

pub use checkout::{CheckoutDeps, CheckoutError, CheckoutFailure, CheckoutSession, CheckoutStage};
pub use coupon::{apply_coupon, AppliedCoupon, CheckoutTotals, Coupon, CouponError};
pub use domain::aggregates::{Cart, CartLine, PendingOrder, Variation};
pub use domain::value_objects::Money;
pub use pricing::{resolve_cart, resolve_line, FlashSale, ProductRecord, ResolvedLine};
