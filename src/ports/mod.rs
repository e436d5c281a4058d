//! Collaborator contracts
//!
//! The engine never talks to a database, a payment provider or a message bus directly. Services are
//! built over these traits, so any backing implementation can be injected.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use crate::domain::aggregates::{Cart, Coupon, CouponStatus, Order, OrderStatus, ProductSnapshot, Restaurant};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{CouponCode, CouponId, Money, OrderId, ProductId, RestaurantId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Conflicting write: {0}")]
    Conflict(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("Payment gateway error: {0}")]
    Gateway(String),
    #[error("Unknown payment intent {0}")]
    UnknownIntent(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Event publish failed: {0}")]
pub struct PublishError(pub String);

#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn get_by_id(&self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError>;
}

#[async_trait]
pub trait RestaurantLookup: Send + Sync {
    async fn get_by_id(&self, id: RestaurantId) -> Result<Option<Restaurant>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub intent_id: String,
    pub client_secret: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub paid: bool,
    /// Amount the intent was created for.
    pub amount: Money,
}

/// Opaque payment provider. A confirmation is only read for its `paid` flag and its amount.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, amount: Money, currency: &str, metadata: HashMap<String, String>) -> Result<PaymentIntent, PaymentError>;
    async fn confirm(&self, intent_id: &str) -> Result<PaymentConfirmation, PaymentError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_by_owner(&self, owner: UserId) -> Result<Option<Cart>, StoreError>;
    async fn save(&self, cart: &Cart) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CouponFilter {
    pub status: Option<CouponStatus>,
    pub restaurant_id: Option<RestaurantId>,
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError>;
    async fn find_by_id(&self, id: CouponId) -> Result<Option<Coupon>, StoreError>;
    async fn list(&self, filter: CouponFilter) -> Result<Vec<Coupon>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when the code is taken.
    async fn insert(&self, coupon: Coupon) -> Result<(), StoreError>;
    async fn save(&self, coupon: &Coupon) -> Result<(), StoreError>;
    /// Atomically counts one redemption and returns the new usage count. `None` when the coupon is
    /// gone, [`StoreError::Conflict`] when its usage limit is reached.
    async fn increment_usage(&self, id: CouponId) -> Result<Option<u32>, StoreError>;
    /// Gives back one redemption counted by `increment_usage`.
    async fn release_usage(&self, id: CouponId) -> Result<(), StoreError>;
    async fn delete(&self, id: CouponId) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub restaurant_id: Option<RestaurantId>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the idempotency key or payment intent is taken.
    async fn create(&self, order: &Order) -> Result<(), StoreError>;
    async fn save(&self, order: &Order) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;
    async fn find_all(&self, user: UserId, filter: OrderFilter) -> Result<Vec<Order>, StoreError>;
    async fn find_latest_by_user(&self, user: UserId) -> Result<Option<Order>, StoreError>;
    async fn find_by_idempotency_key(&self, user: UserId, key: &str) -> Result<Option<Order>, StoreError>;
    async fn find_by_payment_intent(&self, intent_id: &str) -> Result<Option<Order>, StoreError>;
    /// Orders `user` placed with `code`, excluding refunded and canceled ones.
    async fn count_coupon_uses(&self, user: UserId, code: &CouponCode) -> Result<u32, StoreError>;
    async fn delete(&self, id: OrderId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}
