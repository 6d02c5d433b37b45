//! Storefront Checkout - checkout and order-composition service

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::Validate;

use storefront_checkout::checkout::{CheckoutDeps, CheckoutError, CheckoutSession, CheckoutStage};
use storefront_checkout::config::Config;
use storefront_checkout::coupon::CheckoutTotals;
use storefront_checkout::domain::aggregates::{Cart, CartLine, Variation};
use storefront_checkout::domain::events::EventPublisher;
use storefront_checkout::pricing::{self, ResolvedLine};
use storefront_checkout::remote::http::{BackendApi, PaymentApi, ProtectionApi};
use storefront_checkout::remote::{CartStore, RemoteError};

type SharedSession = Arc<tokio::sync::Mutex<CheckoutSession>>;
type ApiError = (StatusCode, String);

/// Checkout sessions are scoped to this state and looked up per request; no
/// module-level singletons, so concurrent shoppers never share cart or
/// coupon state.
#[derive(Clone)]
struct AppState {
    deps: CheckoutDeps,
    sessions: Arc<Mutex<HashMap<Uuid, SharedSession>>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let mut backend = BackendApi::new(&config.backend_url);
    if let Some(token) = &config.backend_token {
        backend = backend.with_bearer_token(token);
    }
    let nats = match &config.nats_url {
        Some(url) => async_nats::connect(url).await.ok(),
        None => None,
    };

    let deps = CheckoutDeps {
        catalog: Arc::new(backend.clone()),
        coupons: Arc::new(backend.clone()),
        cart: Arc::new(backend.clone()),
        gate: Arc::new(ProtectionApi::new(&config.protection_url)),
        payments: Arc::new(PaymentApi::new(&config.payment_url)),
        orders: Arc::new(backend),
        events: EventPublisher::new(nats),
    };
    let state = AppState {
        deps,
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/v1/cart", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/items", post(add_cart_line))
        .route(
            "/api/v1/cart/items/:id",
            put(update_cart_line).delete(remove_cart_line),
        )
        .route("/api/v1/checkout/sessions", post(create_session))
        .route("/api/v1/checkout/sessions/:id", get(get_session))
        .route("/api/v1/checkout/sessions/:id/address", post(select_address))
        .route(
            "/api/v1/checkout/sessions/:id/coupon",
            post(apply_session_coupon).delete(remove_session_coupon),
        )
        .route("/api/v1/checkout/sessions/:id/contact", post(submit_contact))
        .route(
            "/api/v1/checkout/sessions/:id/payment-intent",
            post(create_payment_intent),
        )
        .route("/api/v1/checkout/sessions/:id/capture", post(capture_payment))
        .route("/api/v1/checkout/sessions/:id/order", post(submit_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("storefront-checkout listening on 0.0.0.0:{}", config.port);
    axum::serve(
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?,
        app,
    )
    .await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "storefront-checkout"}))
}

fn remote_error(err: RemoteError) -> ApiError {
    (StatusCode::BAD_GATEWAY, err.to_string())
}

fn checkout_error(err: CheckoutError) -> ApiError {
    match &err {
        CheckoutError::OutOfOrder { .. } => (StatusCode::CONFLICT, err.to_string()),
        CheckoutError::Remote(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        _ => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
    }
}

fn bad_request(err: impl std::fmt::Display) -> ApiError {
    (StatusCode::BAD_REQUEST, err.to_string())
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

async fn get_cart(State(s): State<AppState>) -> Result<Json<Vec<ResolvedLine>>, ApiError> {
    let cart = s.deps.cart.fetch().await.map_err(remote_error)?;
    Ok(Json(
        pricing::resolve_cart(s.deps.catalog.as_ref(), cart.lines()).await,
    ))
}

#[derive(Debug, Deserialize, Validate)]
struct AddLineRequest {
    #[validate(length(min = 1))]
    product_id: String,
    size: Option<String>,
    color: Option<String>,
    #[validate(range(min = 1))]
    quantity: u32,
}

async fn add_cart_line(
    State(s): State<AppState>,
    Json(r): Json<AddLineRequest>,
) -> Result<(StatusCode, Json<Cart>), ApiError> {
    r.validate().map_err(bad_request)?;
    let line = CartLine::new(
        r.product_id,
        Variation::new(r.size.as_deref(), r.color.as_deref()),
        r.quantity,
    );
    let cart = s.deps.cart.add_line(line).await.map_err(remote_error)?;
    Ok((StatusCode::CREATED, Json(cart)))
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityRequest {
    quantity: u32,
}

async fn update_cart_line(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateQuantityRequest>,
) -> Result<Json<Cart>, ApiError> {
    // A zero target is a removal; the store itself does not special-case it.
    let result = if r.quantity == 0 {
        s.deps.cart.remove_line(id).await
    } else {
        s.deps.cart.update_quantity(id, r.quantity).await
    };
    let cart = result.map_err(remote_error)?;
    Ok(Json(cart))
}

async fn remove_cart_line(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    let cart = s.deps.cart.remove_line(id).await.map_err(remote_error)?;
    Ok(Json(cart))
}

async fn clear_cart(State(s): State<AppState>) -> Result<Json<Cart>, ApiError> {
    let cart = s.deps.cart.clear().await.map_err(remote_error)?;
    Ok(Json(cart))
}

// ---------------------------------------------------------------------------
// Checkout sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SessionView {
    id: Uuid,
    stage: CheckoutStage,
    lines: Vec<ResolvedLine>,
    totals: CheckoutTotals,
    coupon_code: Option<String>,
    contact_email: Option<String>,
}

impl SessionView {
    fn of(session: &CheckoutSession) -> Self {
        Self {
            id: session.id(),
            stage: session.stage().clone(),
            lines: session.resolved_lines().to_vec(),
            totals: session.totals(),
            coupon_code: session.applied_coupon().map(|a| a.coupon.code.clone()),
            contact_email: session.contact_email().map(str::to_string),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct CreateSessionRequest {
    #[validate(length(min = 1))]
    user_id: String,
    address_id: Option<String>,
}

async fn create_session(
    State(s): State<AppState>,
    Json(r): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    r.validate().map_err(bad_request)?;
    let mut session = CheckoutSession::new(s.deps.clone(), r.user_id);
    if let Some(address_id) = r.address_id {
        session.select_address(address_id);
    }
    session.load().await.map_err(checkout_error)?;

    let view = SessionView::of(&session);
    s.sessions
        .lock()
        .unwrap()
        .insert(session.id(), Arc::new(tokio::sync::Mutex::new(session)));
    Ok((StatusCode::CREATED, Json(view)))
}

fn find_session(state: &AppState, id: Uuid) -> Result<SharedSession, ApiError> {
    state
        .sessions
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .ok_or((StatusCode::NOT_FOUND, "checkout session not found".into()))
}

/// One request per session at a time: an overlapping driver call is rejected
/// rather than queued, mirroring a UI that disables its buttons while a
/// request is pending.
fn lock_session(shared: &SharedSession) -> Result<tokio::sync::MutexGuard<'_, CheckoutSession>, ApiError> {
    shared.try_lock().map_err(|_| {
        (
            StatusCode::CONFLICT,
            "another checkout request is in flight for this session".into(),
        )
    })
}

async fn get_session(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = find_session(&s, id)?;
    let session = lock_session(&shared)?;
    Ok(Json(SessionView::of(&session)))
}

#[derive(Debug, Deserialize, Validate)]
struct SelectAddressRequest {
    #[validate(length(min = 1))]
    address_id: String,
}

async fn select_address(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<SelectAddressRequest>,
) -> Result<Json<SessionView>, ApiError> {
    r.validate().map_err(bad_request)?;
    let shared = find_session(&s, id)?;
    let mut session = lock_session(&shared)?;
    session.select_address(r.address_id);
    Ok(Json(SessionView::of(&session)))
}

#[derive(Debug, Deserialize, Validate)]
struct ApplyCouponRequest {
    #[validate(length(min = 1))]
    code: String,
}

async fn apply_session_coupon(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<ApplyCouponRequest>,
) -> Result<Json<SessionView>, ApiError> {
    r.validate().map_err(bad_request)?;
    let shared = find_session(&s, id)?;
    let mut session = lock_session(&shared)?;
    session
        .apply_coupon(&r.code)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    Ok(Json(SessionView::of(&session)))
}

async fn remove_session_coupon(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = find_session(&s, id)?;
    let mut session = lock_session(&shared)?;
    session.remove_coupon();
    Ok(Json(SessionView::of(&session)))
}

#[derive(Debug, Deserialize, Validate)]
struct ContactRequest {
    #[validate(email)]
    email: String,
}

async fn submit_contact(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<ContactRequest>,
) -> Result<Json<SessionView>, ApiError> {
    r.validate().map_err(bad_request)?;
    let shared = find_session(&s, id)?;
    let mut session = lock_session(&shared)?;
    session.submit_contact(&r.email).await.map_err(checkout_error)?;
    Ok(Json(SessionView::of(&session)))
}

async fn create_payment_intent(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = find_session(&s, id)?;
    let mut session = lock_session(&shared)?;
    session.create_payment_intent().await.map_err(checkout_error)?;
    Ok(Json(SessionView::of(&session)))
}

async fn capture_payment(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = find_session(&s, id)?;
    let mut session = lock_session(&shared)?;
    session.capture_payment().await.map_err(checkout_error)?;
    Ok(Json(SessionView::of(&session)))
}

async fn submit_order(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = find_session(&s, id)?;
    let mut session = lock_session(&shared)?;
    session.submit_order().await.map_err(checkout_error)?;
    Ok(Json(SessionView::of(&session)))
}
