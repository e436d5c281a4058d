//! Cart service

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, instrument};
use crate::domain::aggregates::{Cart, CartError, ProductSnapshot};
use crate::domain::pricing::PricedLine;
use crate::domain::value_objects::{Money, ProductId, Quantity, RestaurantId, UserId};
use crate::ports::{CartStore, ProductLookup};
use crate::services::KeyedLocks;
use crate::Result;

/// A cart with its products resolved against the catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub owner_id: UserId,
    pub restaurant_id: Option<RestaurantId>,
    pub items: Vec<CartLineView>,
    /// Items whose product disappeared or was switched off since it was added.
    pub unavailable: Vec<ProductId>,
    pub subtotal: Money,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub product: ProductSnapshot,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub line_total: Money,
}

pub struct CartService {
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductLookup>,
    locks: KeyedLocks<UserId>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, products: Arc<dyn ProductLookup>) -> Self {
        Self { carts, products, locks: KeyedLocks::new() }
    }

    #[instrument(skip(self))]
    pub async fn get_cart(&self, owner: UserId) -> Result<CartView> {
        let _guard = self.lock(owner).await;
        let cart = match self.carts.find_by_owner(owner).await? {
            Some(cart) => cart,
            None => {
                let cart = Cart::new(owner);
                self.carts.save(&cart).await?;
                cart
            }
        };
        self.view(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn upsert_item(&self, owner: UserId, product_id: ProductId, quantity: Quantity) -> Result<CartView> {
        let _guard = self.lock(owner).await;
        let product = self.products.get_by_id(product_id).await?.ok_or(CartError::ProductUnavailable(product_id))?;
        let mut cart = self.load(owner).await?;
        cart.upsert_item(&product, quantity)?;
        self.carts.save(&cart).await?;
        info!(%owner, %product_id, quantity = quantity.value(), "cart item added");
        self.view(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn set_item_quantity(&self, owner: UserId, product_id: ProductId, quantity: Quantity) -> Result<CartView> {
        let _guard = self.lock(owner).await;
        let mut cart = self.load(owner).await?;
        cart.set_item_quantity(product_id, quantity)?;
        self.carts.save(&cart).await?;
        info!(%owner, %product_id, quantity = quantity.value(), "cart item quantity set");
        self.view(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, owner: UserId, product_id: ProductId) -> Result<CartView> {
        let _guard = self.lock(owner).await;
        let mut cart = self.load(owner).await?;
        if cart.remove_item(product_id) {
            self.carts.save(&cart).await?;
            info!(%owner, %product_id, "cart item removed");
        }
        self.view(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, owner: UserId) -> Result<CartView> {
        let _guard = self.lock(owner).await;
        let cart = self.clear_held(owner).await?;
        self.view(&cart).await
    }

    /// Takes the owner's cart lock. Checkout holds it across order creation and cart clearing.
    pub(crate) async fn lock(&self, owner: UserId) -> OwnedMutexGuard<()> { self.locks.lock(&owner).await }

    pub(crate) async fn load(&self, owner: UserId) -> Result<Cart> {
        Ok(self.carts.find_by_owner(owner).await?.unwrap_or_else(|| Cart::new(owner)))
    }

    /// Clears the cart. The caller must hold the owner's lock.
    pub(crate) async fn clear_held(&self, owner: UserId) -> Result<Cart> {
        let mut cart = self.load(owner).await?;
        cart.clear();
        self.carts.save(&cart).await?;
        info!(%owner, "cart cleared");
        Ok(cart)
    }

    /// Resolves every line for pricing. A product that vanished or went unavailable fails the
    /// whole cart; no price is ever guessed.
    pub(crate) async fn priced_lines(&self, cart: &Cart) -> Result<Vec<(ProductSnapshot, PricedLine)>> {
        let mut lines = Vec::with_capacity(cart.items().len());
        for item in cart.items() {
            let product = self
                .products
                .get_by_id(item.product_id)
                .await?
                .filter(ProductSnapshot::is_available)
                .ok_or(CartError::ProductUnavailable(item.product_id))?;
            let line = PricedLine::from_product(&product, item.quantity);
            lines.push((product, line));
        }
        Ok(lines)
    }

    async fn view(&self, cart: &Cart) -> Result<CartView> {
        let mut items = Vec::with_capacity(cart.items().len());
        let mut unavailable = vec![];
        for item in cart.items() {
            match self.products.get_by_id(item.product_id).await? {
                Some(product) if product.is_available() => {
                    let line = PricedLine::from_product(&product, item.quantity);
                    items.push(CartLineView { unit_price: line.unit_price(), line_total: line.total(), quantity: item.quantity, product });
                }
                _ => unavailable.push(item.product_id),
            }
        }
        Ok(CartView {
            owner_id: cart.owner_id(),
            restaurant_id: cart.restaurant_id(),
            subtotal: items.iter().map(|l| l.line_total).sum(),
            items,
            unavailable,
            updated_at: cart.updated_at(),
        })
    }
}
