//! Pricing resolver
//!
//! Resolves the authoritative unit price for each cart line against catalog
//! data and any active flash-sale override, and enriches lines with display
//! details and available stock. Resolution is pure; the only I/O is one
//! catalog lookup per line, and those are independent so [`resolve_cart`]
//! issues them concurrently.
//!
//! Resolution is deliberately fail-open: a line whose product has vanished
//! (or whose lookup failed) becomes a zero-priced sentinel so the rest of the
//! checkout view still renders. Order submission separately refuses carts
//! that still contain sentinel lines.

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{CartLine, Variation};
use crate::domain::value_objects::Money;
use crate::remote::ProductCatalog;

pub const NOT_FOUND_NAME: &str = "Product Not Found";
pub const PLACEHOLDER_IMAGE: &str = "/placeholder-image.jpg";

/// Time-boxed discounted price, authoritative only while the catalog marks it
/// active. The catalog owns the time-window judgment; this module only honors
/// the flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlashSale {
    pub discount_price: Money,
    pub discount_percent: Decimal,
    pub active: bool,
}

/// Per-(size, color) stock entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariationStock {
    pub size: Option<String>,
    pub color: Option<String>,
    pub stock: u32,
}

/// Product data as returned by the catalog collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub price: Money,
    pub base_stock: u32,
    pub category_name: String,
    pub image_url: Option<String>,
    pub flash_sale: Option<FlashSale>,
    pub variations: Vec<VariationStock>,
}

impl ProductRecord {
    /// Effective unit price: the flash-sale price only when the override is
    /// explicitly active, the base price otherwise.
    pub fn effective_price(&self) -> Money {
        match &self.flash_sale {
            Some(sale) if sale.active => sale.discount_price.clone(),
            _ => self.price.clone(),
        }
    }

    /// Stock for a chosen variation: linear scan over the variation list, no
    /// match means zero. A line without a chosen variation draws on base
    /// stock.
    pub fn stock_for(&self, variation: &Variation) -> u32 {
        if variation.size.is_none() && variation.color.is_none() {
            return self.base_stock;
        }
        self.variations
            .iter()
            .find(|v| v.size == variation.size && v.color == variation.color)
            .map(|v| v.stock)
            .unwrap_or(0)
    }
}

/// A cart line enriched with resolved price and display details. Never cached
/// across requests: flash-sale pricing is time-sensitive.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedLine {
    pub line: CartLine,
    pub unit_price: Money,
    pub display_name: String,
    pub image_url: String,
    pub category_name: String,
    pub available_stock: u32,
    /// False for sentinel lines substituted for missing products.
    pub found: bool,
}

impl ResolvedLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.line.quantity)
    }
}

/// Resolves one cart line against its product record, substituting a
/// zero-priced sentinel when the product is missing.
pub fn resolve_line(line: &CartLine, product: Option<&ProductRecord>) -> ResolvedLine {
    match product {
        Some(product) => ResolvedLine {
            unit_price: product.effective_price(),
            display_name: product.name.clone(),
            image_url: product
                .image_url
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            category_name: product.category_name.clone(),
            available_stock: product.stock_for(&line.variation),
            found: true,
            line: line.clone(),
        },
        None => ResolvedLine {
            unit_price: Money::zero("USD"),
            display_name: NOT_FOUND_NAME.to_string(),
            image_url: PLACEHOLDER_IMAGE.to_string(),
            category_name: String::new(),
            available_stock: 0,
            found: false,
            line: line.clone(),
        },
    }
}

/// Resolves a whole cart. Lookups run concurrently; a failed lookup degrades
/// that line to the sentinel instead of aborting the rest.
pub async fn resolve_cart(catalog: &dyn ProductCatalog, lines: &[CartLine]) -> Vec<ResolvedLine> {
    let lookups = lines.iter().map(|line| async move {
        let product = match catalog.product_by_id(&line.product_id).await {
            Ok(product) => product,
            Err(err) => {
                tracing::warn!(product_id = %line.product_id, %err, "product lookup failed");
                None
            }
        };
        resolve_line(line, product.as_ref())
    });
    join_all(lookups).await
}

/// Sum of line totals. Lines are priced in a single currency per cart.
pub fn subtotal(lines: &[ResolvedLine]) -> Money {
    let currency = lines
        .first()
        .map(|l| l.unit_price.currency().to_string())
        .unwrap_or_else(|| "USD".to_string());
    lines.iter().fold(Money::zero(&currency), |acc, line| {
        acc.add(&line.line_total()).unwrap_or(acc)
    })
}
