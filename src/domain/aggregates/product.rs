//! Product snapshot
//!
//! The authoritative view of a product at the moment a cart is mutated or priced.
//! Snapshots are resolved on demand and never cached inside the cart.

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{Money, ProductId, RestaurantId, ValidationError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    id: ProductId,
    restaurant_id: RestaurantId,
    name: String,
    category: String,
    price: Money,
    discount_price: Option<Money>,
    is_available: bool,
}

impl ProductSnapshot {
    pub fn new(
        id: ProductId, restaurant_id: RestaurantId, name: impl Into<String>, category: impl Into<String>,
        price: Money, discount_price: Option<Money>,
    ) -> Result<Self, ValidationError> {
        if let Some(discount) = discount_price {
            if discount > price { return Err(ValidationError::DiscountAbovePrice { price, discount }); }
        }
        Ok(Self {
            id, restaurant_id, name: name.into(), category: category.into(),
            price, discount_price, is_available: true,
        })
    }

    pub fn unavailable(mut self) -> Self { self.is_available = false; self }

    pub fn id(&self) -> ProductId { self.id }
    pub fn restaurant_id(&self) -> RestaurantId { self.restaurant_id }
    pub fn name(&self) -> &str { &self.name }
    pub fn category(&self) -> &str { &self.category }
    pub fn price(&self) -> Money { self.price }
    pub fn discount_price(&self) -> Option<Money> { self.discount_price }
    pub fn is_available(&self) -> bool { self.is_available }

    /// `discount_price` when present, otherwise `price`.
    pub fn effective_price(&self) -> Money { self.discount_price.unwrap_or(self.price) }
}
