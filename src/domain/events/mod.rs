//! Checkout lifecycle events
//!
//! Published to NATS when a client is configured, dropped otherwise. Consumers
//! (fulfilment, analytics) subscribe to `storefront.checkout.*`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutEvent {
    PaymentCaptured {
        session_id: Uuid,
        capture_id: String,
        total: Money,
    },
    OrderSubmitted {
        session_id: Uuid,
        order_id: String,
        user_id: String,
        total: Money,
    },
}

impl CheckoutEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::PaymentCaptured { .. } => "storefront.checkout.payment_captured",
            Self::OrderSubmitted { .. } => "storefront.checkout.order_submitted",
        }
    }
}

/// Best-effort publisher. Event delivery must never fail a checkout, so
/// publish errors are logged and swallowed.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    pub fn disabled() -> Self {
        Self { nats: None }
    }

    pub async fn publish(&self, event: &CheckoutEvent) {
        let Some(client) = &self.nats else { return };
        match serde_json::to_vec(event) {
            Ok(payload) => {
                if let Err(err) = client.publish(event.subject().to_string(), payload.into()).await {
                    tracing::warn!(subject = event.subject(), %err, "event publish failed");
                }
            }
            Err(err) => tracing::warn!(%err, "event serialization failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_their_subject() {
        let event = CheckoutEvent::OrderSubmitted {
            session_id: Uuid::new_v4(),
            order_id: "O1".into(),
            user_id: "U1".into(),
            total: Money::usd(90_00),
        };
        assert_eq!(event.subject(), "storefront.checkout.order_submitted");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order_submitted");
    }
}
