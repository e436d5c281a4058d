//! HTTP adapter
//!
//! Thin axum layer over the services. Caller identity comes from the `x-user-id` header, set by the
//! gateway in front of this service.

mod error;
mod handlers;

pub use error::ApiError;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    routing::{delete, get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::Validate;
use crate::domain::pricing::PricingRules;
use crate::domain::value_objects::UserId;
use crate::ports::{EventPublisher, PaymentGateway};
use crate::services::{CartService, CouponService, OrderService};
use crate::store::{InMemoryCartStore, InMemoryCatalog, InMemoryCouponStore, InMemoryOrderStore};

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub carts: Arc<CartService>,
    pub coupons: Arc<CouponService>,
    pub orders: Arc<OrderService>,
    pub catalog: Arc<InMemoryCatalog>,
}

impl AppState {
    /// Wires every service over in-process stores.
    pub fn in_memory(
        rules: PricingRules,
        currency: &str,
        payments: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let catalog = Arc::new(InMemoryCatalog::new());
        let order_store = Arc::new(InMemoryOrderStore::new());
        let carts = Arc::new(CartService::new(Arc::new(InMemoryCartStore::new()), catalog.clone()));
        let coupons = Arc::new(CouponService::new(Arc::new(InMemoryCouponStore::new()), order_store.clone()));
        let orders = OrderService::new(carts.clone(), coupons.clone(), catalog.clone(), order_store, payments, publisher)
            .with_rules(rules)
            .with_currency(currency);
        Self { carts, coupons, orders: Arc::new(orders), catalog }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/cart", get(handlers::get_cart).delete(handlers::clear_cart))
        .route("/api/v1/cart/items", post(handlers::add_cart_item).put(handlers::set_cart_item))
        .route("/api/v1/cart/items/:product_id", delete(handlers::remove_cart_item))
        .route("/api/v1/coupons", get(handlers::list_coupons).post(handlers::create_coupon))
        .route("/api/v1/coupons/validate", post(handlers::validate_coupon))
        .route("/api/v1/coupons/:id", delete(handlers::deactivate_coupon).patch(handlers::update_coupon))
        .route("/api/v1/coupons/:id/hard", delete(handlers::hard_delete_coupon))
        .route("/api/v1/orders", get(handlers::list_orders).post(handlers::place_order))
        .route("/api/v1/orders/quote", post(handlers::quote))
        .route("/api/v1/orders/payment-intent", post(handlers::create_payment_intent))
        .route("/api/v1/orders/latest", get(handlers::latest_order))
        .route("/api/v1/orders/:id", get(handlers::get_order).delete(handlers::delete_order))
        .route("/api/v1/orders/:id/transitions", post(handlers::transition_order))
        .route("/api/v1/restaurants", post(handlers::create_restaurant))
        .route("/api/v1/products", post(handlers::create_product))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<UserId>().ok())
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// JSON body that passed its `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}
