//! HTTP implementations of the collaborator traits
//!
//! `BackendApi` talks to the storefront backend (catalog, coupons, cart,
//! orders); `PaymentApi` drives the backend's payment-processor proxy
//! (create external order -> capture); `ProtectionApi` calls the email/bot
//! protection service. All of them translate wire failures into
//! [`RemoteError`] so nothing upstream ever sees a raw reqwest error.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::coupon::Coupon;
use crate::domain::aggregates::{
    Cart, CartLine, PaymentMethod, PaymentStatus, PendingOrder, Variation,
};
use crate::domain::value_objects::Money;
use crate::pricing::{FlashSale, ProductRecord, VariationStock};
use crate::remote::{
    Capture, CartStore, CheckoutGate, CouponDirectory, CreatedOrder, GateDecision, GateReason,
    OrderService, PaymentGateway, ProductCatalog, RemoteError,
};

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// Rejects non-2xx responses, carrying the body for diagnostics.
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(RemoteError::UnexpectedStatus {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    response
        .json::<T>()
        .await
        .map_err(|err| RemoteError::Decode(err.to_string()))
}

// ---------------------------------------------------------------------------
// Backend API (catalog, coupons, cart, orders)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct BackendApi {
    base_url: String,
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl BackendApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            bearer_token: None,
        }
    }

    /// Shopper-scoped token forwarded to the backend; cart and order routes
    /// are per-user there.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(format!("{}{path}", self.base_url)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(format!("{}{path}", self.base_url)))
    }

    fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.put(format!("{}{path}", self.base_url)))
    }

    fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.delete(format!("{}{path}", self.base_url)))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductImageDto {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlashSaleDto {
    discount_price: f64,
    #[serde(default)]
    discount_percentage: f64,
    is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductVariationDto {
    size: Option<String>,
    color: Option<String>,
    stock: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductCategoryDto {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDto {
    id: String,
    name: String,
    price: f64,
    base_stock: u32,
    category: Option<ProductCategoryDto>,
    #[serde(default)]
    product_images: Vec<ProductImageDto>,
    flash_sale: Option<FlashSaleDto>,
    #[serde(default)]
    variations: Vec<ProductVariationDto>,
}

fn money_from_f64(amount: f64, currency: &str) -> Money {
    Money::from_major(Decimal::from_f64(amount).unwrap_or_default(), currency)
}

/// Outbound amounts go out as plain major-unit numbers, matching the numeric
/// `price` fields the backend serves; cents stay internal.
fn money_to_major_f64(money: &Money) -> f64 {
    money.major().to_f64().unwrap_or_default()
}

impl From<ProductDto> for ProductRecord {
    fn from(dto: ProductDto) -> Self {
        ProductRecord {
            id: dto.id,
            name: dto.name,
            price: money_from_f64(dto.price, "USD"),
            base_stock: dto.base_stock,
            category_name: dto.category.map(|c| c.name).unwrap_or_default(),
            image_url: dto.product_images.into_iter().next().map(|i| i.url),
            flash_sale: dto.flash_sale.map(|sale| FlashSale {
                discount_price: money_from_f64(sale.discount_price, "USD"),
                discount_percent: Decimal::from_f64(sale.discount_percentage).unwrap_or_default(),
                active: sale.is_active,
            }),
            variations: dto
                .variations
                .into_iter()
                .map(|v| VariationStock {
                    size: v.size,
                    color: v.color,
                    stock: v.stock,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ProductCatalog for BackendApi {
    #[instrument(skip(self))]
    async fn product_by_id(&self, id: &str) -> Result<Option<ProductRecord>, RemoteError> {
        let response = self.get(&format!("/api/products/{id}")).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let dto: ProductDto = decode(check_status(response).await?).await?;
        Ok(Some(dto.into()))
    }
}

#[async_trait]
impl CouponDirectory for BackendApi {
    #[instrument(skip(self))]
    async fn list_coupons(&self) -> Result<Vec<Coupon>, RemoteError> {
        let response = check_status(self.get("/api/coupon").send().await?).await?;
        decode(response).await
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLineDto {
    id: Uuid,
    product_id: String,
    size: Option<String>,
    color: Option<String>,
    quantity: u32,
}

impl From<CartLineDto> for CartLine {
    fn from(dto: CartLineDto) -> Self {
        CartLine {
            id: dto.id,
            product_id: dto.product_id,
            variation: Variation {
                size: dto.size,
                color: dto.color,
            },
            quantity: dto.quantity,
        }
    }
}

impl From<&CartLine> for CartLineDto {
    fn from(line: &CartLine) -> Self {
        CartLineDto {
            id: line.id,
            product_id: line.product_id.clone(),
            size: line.variation.size.clone(),
            color: line.variation.color.clone(),
            quantity: line.quantity,
        }
    }
}

async fn decode_cart(response: Response) -> Result<Cart, RemoteError> {
    let lines: Vec<CartLineDto> = decode(response).await?;
    Ok(Cart::from_lines(lines.into_iter().map(Into::into).collect()))
}

#[async_trait]
impl CartStore for BackendApi {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Cart, RemoteError> {
        decode_cart(check_status(self.get("/api/cart").send().await?).await?).await
    }

    #[instrument(skip(self, line))]
    async fn add_line(&self, line: CartLine) -> Result<Cart, RemoteError> {
        let response = self
            .post("/api/cart/items")
            .json(&CartLineDto::from(&line))
            .send()
            .await?;
        decode_cart(check_status(response).await?).await
    }

    #[instrument(skip(self))]
    async fn update_quantity(&self, line_id: Uuid, quantity: u32) -> Result<Cart, RemoteError> {
        let response = self
            .put(&format!("/api/cart/items/{line_id}"))
            .json(&json!({ "quantity": quantity }))
            .send()
            .await?;
        decode_cart(check_status(response).await?).await
    }

    #[instrument(skip(self))]
    async fn remove_line(&self, line_id: Uuid) -> Result<Cart, RemoteError> {
        let response = self
            .delete(&format!("/api/cart/items/{line_id}"))
            .send()
            .await?;
        decode_cart(check_status(response).await?).await
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<Cart, RemoteError> {
        decode_cart(check_status(self.delete("/api/cart").send().await?).await?).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderItemDto {
    product_id: String,
    product_name: String,
    product_category: String,
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
    price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingOrderDto {
    user_id: String,
    address_id: String,
    items: Vec<OrderItemDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    coupon_id: Option<String>,
    total: f64,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment_id: String,
    idempotency_key: Uuid,
}

impl From<&PendingOrder> for PendingOrderDto {
    fn from(order: &PendingOrder) -> Self {
        PendingOrderDto {
            user_id: order.user_id.clone(),
            address_id: order.address_id.clone(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemDto {
                    product_id: item.product_id.clone(),
                    product_name: item.product_name.clone(),
                    product_category: item.product_category.clone(),
                    quantity: item.quantity,
                    size: item.size.clone(),
                    color: item.color.clone(),
                    price: money_to_major_f64(&item.price),
                })
                .collect(),
            coupon_id: order.coupon_id.clone(),
            total: money_to_major_f64(&order.total),
            payment_method: order.payment_method.clone(),
            payment_status: order.payment_status.clone(),
            payment_id: order.payment_id.clone(),
            idempotency_key: order.idempotency_key,
        }
    }
}

#[async_trait]
impl OrderService for BackendApi {
    #[instrument(skip(self, order))]
    async fn create_order(&self, order: &PendingOrder) -> Result<CreatedOrder, RemoteError> {
        let response = self
            .post("/api/order/create-final-order")
            .header("Idempotency-Key", order.idempotency_key.to_string())
            .json(&PendingOrderDto::from(order))
            .send()
            .await?;
        decode(check_status(response).await?).await
    }
}

// ---------------------------------------------------------------------------
// Payment processor proxy
// ---------------------------------------------------------------------------

/// Two-phase payment client. The backend proxies the processor's order
/// lifecycle; this client only ever sees opaque intent and capture ids.
#[derive(Clone)]
pub struct PaymentApi {
    base_url: String,
    client: reqwest::Client,
}

impl PaymentApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExternalOrderDto {
    id: String,
}

#[async_trait]
impl PaymentGateway for PaymentApi {
    #[instrument(skip(self, lines))]
    async fn create_intent(
        &self,
        lines: &[crate::pricing::ResolvedLine],
        total: &Money,
    ) -> Result<String, RemoteError> {
        let items: Vec<_> = lines
            .iter()
            .map(|line| {
                json!({
                    "name": line.display_name,
                    "quantity": line.line.quantity,
                    "unitAmount": money_to_major_f64(&line.unit_price),
                })
            })
            .collect();
        let response = self
            .client
            .post(format!("{}/api/order/create-payment-order", self.base_url))
            .json(&json!({ "items": items, "total": money_to_major_f64(total) }))
            .send()
            .await?;
        let dto: ExternalOrderDto = decode(check_status(response).await?).await?;
        Ok(dto.id)
    }

    #[instrument(skip(self))]
    async fn capture(&self, intent_id: &str) -> Result<Capture, RemoteError> {
        let response = self
            .client
            .post(format!("{}/api/order/capture-payment-order", self.base_url))
            .json(&json!({ "orderId": intent_id }))
            .send()
            .await?;
        decode(check_status(response).await?).await
    }
}

// ---------------------------------------------------------------------------
// Email/bot protection gate
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ProtectionApi {
    url: String,
    client: reqwest::Client,
}

impl ProtectionApi {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProtectionDto {
    denied: bool,
    reason: Option<GateReason>,
}

#[async_trait]
impl CheckoutGate for ProtectionApi {
    #[instrument(skip(self, email))]
    async fn screen(&self, email: &str) -> Result<GateDecision, RemoteError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "email": email }))
            .send()
            .await?;
        let dto: ProtectionDto = decode(check_status(response).await?).await?;
        if dto.denied {
            Ok(GateDecision::Denied(
                dto.reason.unwrap_or(GateReason::InvalidEmail),
            ))
        } else {
            Ok(GateDecision::Allowed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_dto_maps_to_record() {
        let dto: ProductDto = serde_json::from_value(json!({
            "id": "P1",
            "name": "Denim Jacket",
            "price": 49.99,
            "baseStock": 12,
            "category": { "name": "Jackets" },
            "productImages": [{ "url": "/img/p1.jpg" }],
            "flashSale": {
                "discountPrice": 39.99,
                "discountPercentage": 20.0,
                "isActive": true
            },
            "variations": [
                { "size": "M", "color": "blue", "stock": 3 }
            ]
        }))
        .unwrap();

        let record: ProductRecord = dto.into();
        assert_eq!(record.price, Money::usd(49_99));
        assert_eq!(record.category_name, "Jackets");
        assert_eq!(record.image_url.as_deref(), Some("/img/p1.jpg"));
        let sale = record.flash_sale.unwrap();
        assert!(sale.active);
        assert_eq!(sale.discount_price, Money::usd(39_99));
        assert_eq!(record.variations.len(), 1);
    }

    #[test]
    fn product_dto_tolerates_sparse_payloads() {
        let dto: ProductDto = serde_json::from_value(json!({
            "id": "P2",
            "name": "Plain Tee",
            "price": 9.5,
            "baseStock": 0
        }))
        .unwrap();
        let record: ProductRecord = dto.into();
        assert_eq!(record.price, Money::usd(9_50));
        assert!(record.flash_sale.is_none());
        assert!(record.image_url.is_none());
        assert_eq!(record.category_name, "");
    }

    #[test]
    fn order_payload_carries_major_unit_amounts() {
        use crate::domain::aggregates::OrderItem;

        let order = PendingOrder {
            user_id: "U1".into(),
            address_id: "A1".into(),
            items: vec![OrderItem {
                product_id: "P1".into(),
                product_name: "Denim Jacket".into(),
                product_category: "Jackets".into(),
                quantity: 2,
                size: Some("M".into()),
                color: None,
                price: Money::usd(49_99),
            }],
            coupon_id: None,
            total: Money::usd(89_98),
            payment_method: PaymentMethod::CreditCard,
            payment_status: PaymentStatus::Completed,
            payment_id: "C1".into(),
            idempotency_key: Uuid::new_v4(),
        };

        let payload = serde_json::to_value(PendingOrderDto::from(&order)).unwrap();
        // Amounts cross the wire as plain numbers, like the read side.
        assert_eq!(payload["items"][0]["price"], 49.99);
        assert_eq!(payload["total"], 89.98);
        assert_eq!(payload["paymentMethod"], "CREDIT_CARD");
        assert_eq!(payload["paymentStatus"], "COMPLETED");
        assert_eq!(payload["items"][0]["productId"], "P1");
        assert!(payload.get("couponId").is_none());
    }

    #[test]
    fn protection_reason_parses_from_wire() {
        let dto: ProtectionDto = serde_json::from_value(json!({
            "denied": true,
            "reason": "bot_detected"
        }))
        .unwrap();
        assert!(dto.denied);
        assert_eq!(dto.reason, Some(GateReason::BotDetected));
    }
}
