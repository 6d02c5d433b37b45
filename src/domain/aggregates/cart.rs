//! Cart aggregate
//!
//! A cart snapshot as returned by the remote cart store. Lines carry no
//! price: unit prices are resolved fresh at checkout time because flash-sale
//! pricing is time-sensitive.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Chosen product variation. Two lines belong to the same merge key only if
/// both size and color match exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variation {
    pub size: Option<String>,
    pub color: Option<String>,
}

impl Variation {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(size: Option<&str>, color: Option<&str>) -> Self {
        Self {
            size: size.map(str::to_string),
            color: color.map(str::to_string),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: String,
    pub variation: Variation,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, variation: Variation, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: product_id.into(),
            variation,
            quantity,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds a line, merging quantities into an existing line with the same
    /// (product, variation) key rather than appending a duplicate.
    pub fn add_line(&mut self, line: CartLine) {
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id && l.variation == line.variation)
        {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
        } else {
            self.lines.push(line);
        }
    }

    /// Sets the quantity of an existing line. Quantities of zero are the
    /// caller's responsibility to translate into a removal.
    pub fn update_quantity(&mut self, line_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or(CartError::LineNotFound)?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        if self.lines.len() == before {
            return Err(CartError::LineNotFound);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[derive(Debug, Clone, Error)]
pub enum CartError {
    #[error("cart line not found")]
    LineNotFound,
}
