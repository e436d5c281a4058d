//! Cart Aggregate
//!
//! A cart holds items from exactly one restaurant. `restaurant_id` is `None` iff `items` is empty,
//! and every stored item has a quantity of at least one. Every mutation validates before it
//! touches state, so a rejected call leaves the cart unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::aggregates::product::ProductSnapshot;
use crate::domain::value_objects::{ProductId, Quantity, RestaurantId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    owner_id: UserId,
    restaurant_id: Option<RestaurantId>,
    items: Vec<CartItem>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl Cart {
    pub fn new(owner_id: UserId) -> Self {
        Self { owner_id, restaurant_id: None, items: vec![], updated_at: Utc::now() }
    }

    pub fn owner_id(&self) -> UserId { self.owner_id }
    pub fn restaurant_id(&self) -> Option<RestaurantId> { self.restaurant_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Adds `quantity` of `product`, merging into an existing line if there is one.
    pub fn upsert_item(&mut self, product: &ProductSnapshot, quantity: Quantity) -> Result<(), CartError> {
        if !product.is_available() {
            return Err(CartError::ProductUnavailable(product.id()));
        }
        if let Some(current) = self.restaurant_id {
            if current != product.restaurant_id() {
                return Err(CartError::MultiRestaurantConflict { cart: current, product: product.restaurant_id() });
            }
        }

        self.restaurant_id = Some(product.restaurant_id());
        match self.items.iter_mut().find(|i| i.product_id == product.id()) {
            Some(existing) => existing.quantity = existing.quantity.add(quantity),
            None => self.items.push(CartItem { product_id: product.id(), quantity }),
        }
        self.touch();
        Ok(())
    }

    /// Replaces the quantity of an existing line.
    pub fn set_item_quantity(&mut self, product_id: ProductId, quantity: Quantity) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.product_id == product_id).ok_or(CartError::ItemNotInCart(product_id))?;
        item.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Removes the line for `product_id`. Returns whether anything was removed.
    pub fn remove_item(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.is_empty() { self.restaurant_id = None; }
        self.touch();
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.restaurant_id = None;
        self.touch();
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Product {0} not found or is unavailable")]
    ProductUnavailable(ProductId),
    #[error("You can only order from one restaurant at a time. Please clear your cart to start a new order.")]
    MultiRestaurantConflict { cart: RestaurantId, product: RestaurantId },
    #[error("Product {0} not found in cart")]
    ItemNotInCart(ProductId),
    #[error("Your cart is empty")]
    EmptyCart,
}
