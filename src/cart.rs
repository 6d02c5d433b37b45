//! Cart sync boundary
//!
//! Local cart state always mirrors the last successful response from the
//! remote cart store. Every mutation round-trips and the returned cart
//! replaces the snapshot wholesale; nothing is predicted locally, so local
//! and remote state cannot diverge.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine};
use crate::remote::{CartStore, RemoteError};

pub struct SyncedCart {
    store: Arc<dyn CartStore>,
    snapshot: Cart,
}

impl SyncedCart {
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        Self {
            store,
            snapshot: Cart::new(),
        }
    }

    /// The last cart the store acknowledged.
    pub fn snapshot(&self) -> &Cart {
        &self.snapshot
    }

    pub async fn refresh(&mut self) -> Result<&Cart, RemoteError> {
        self.snapshot = self.store.fetch().await?;
        Ok(&self.snapshot)
    }

    pub async fn add_line(&mut self, line: CartLine) -> Result<&Cart, RemoteError> {
        self.snapshot = self.store.add_line(line).await?;
        Ok(&self.snapshot)
    }

    /// Quantities of zero are not special-cased here; callers translate a
    /// zero target into [`remove_line`](Self::remove_line).
    pub async fn update_quantity(
        &mut self,
        line_id: Uuid,
        quantity: u32,
    ) -> Result<&Cart, RemoteError> {
        self.snapshot = self.store.update_quantity(line_id, quantity).await?;
        Ok(&self.snapshot)
    }

    pub async fn remove_line(&mut self, line_id: Uuid) -> Result<&Cart, RemoteError> {
        self.snapshot = self.store.remove_line(line_id).await?;
        Ok(&self.snapshot)
    }

    /// Called exactly once per checkout, after the order record is durably
    /// created. A failed order submission leaves the cart intact.
    pub async fn clear(&mut self) -> Result<&Cart, RemoteError> {
        self.snapshot = self.store.clear().await?;
        Ok(&self.snapshot)
    }
}
