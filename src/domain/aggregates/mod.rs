//! Aggregates module
pub mod cart;
pub mod order;

pub use cart::{Cart, CartError, CartLine, Variation};
pub use order::{OrderItem, PaymentMethod, PaymentStatus, PendingOrder};
