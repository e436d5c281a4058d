//! In-process stores backed by `tokio::sync::RwLock` maps.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use crate::domain::aggregates::{Cart, Coupon, Order, OrderStatus, ProductSnapshot, Restaurant};
use crate::domain::value_objects::{CouponCode, CouponId, OrderId, ProductId, RestaurantId, UserId};
use crate::ports::{
    CartStore, CouponFilter, CouponStore, OrderFilter, OrderStore, ProductLookup, RestaurantLookup, StoreError,
};

/// Products and restaurants, seeded through [`InMemoryCatalog::insert_product`] and
/// [`InMemoryCatalog::insert_restaurant`].
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, ProductSnapshot>>,
    restaurants: RwLock<HashMap<RestaurantId, Restaurant>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self { Self::default() }

    pub async fn insert_product(&self, product: ProductSnapshot) {
        self.products.write().await.insert(product.id(), product);
    }

    pub async fn remove_product(&self, id: ProductId) -> Option<ProductSnapshot> {
        self.products.write().await.remove(&id)
    }

    pub async fn insert_restaurant(&self, restaurant: Restaurant) {
        self.restaurants.write().await.insert(restaurant.id, restaurant);
    }
}

#[async_trait]
impl ProductLookup for InMemoryCatalog {
    async fn get_by_id(&self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        Ok(self.products.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl RestaurantLookup for InMemoryCatalog {
    async fn get_by_id(&self, id: RestaurantId) -> Result<Option<Restaurant>, StoreError> {
        Ok(self.restaurants.read().await.get(&id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<UserId, Cart>>,
    fail_on_save: RwLock<bool>,
}

impl InMemoryCartStore {
    pub fn new() -> Self { Self::default() }

    /// Makes every subsequent `save` fail, for exercising partial-failure paths.
    pub async fn set_fail_on_save(&self, fail: bool) {
        *self.fail_on_save.write().await = fail;
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn find_by_owner(&self, owner: UserId) -> Result<Option<Cart>, StoreError> {
        Ok(self.carts.read().await.get(&owner).cloned())
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        if *self.fail_on_save.read().await {
            return Err(StoreError::Unavailable("cart store rejected write".to_string()));
        }
        self.carts.write().await.insert(cart.owner_id(), cart.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCouponStore {
    coupons: RwLock<HashMap<CouponId, Coupon>>,
}

impl InMemoryCouponStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        Ok(self.coupons.read().await.values().find(|c| c.code() == code).cloned())
    }

    async fn find_by_id(&self, id: CouponId) -> Result<Option<Coupon>, StoreError> {
        Ok(self.coupons.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: CouponFilter) -> Result<Vec<Coupon>, StoreError> {
        let coupons = self.coupons.read().await;
        let mut matching: Vec<Coupon> = coupons
            .values()
            .filter(|c| filter.status.map_or(true, |s| c.status() == s))
            .filter(|c| filter.restaurant_id.map_or(true, |r| c.restaurant_id() == Some(r)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.code().as_str().cmp(b.code().as_str()));
        Ok(matching)
    }

    async fn insert(&self, coupon: Coupon) -> Result<(), StoreError> {
        let mut coupons = self.coupons.write().await;
        if coupons.values().any(|c| c.code() == coupon.code()) {
            return Err(StoreError::Conflict(format!("coupon code {} exists", coupon.code())));
        }
        coupons.insert(coupon.id(), coupon);
        Ok(())
    }

    async fn save(&self, coupon: &Coupon) -> Result<(), StoreError> {
        self.coupons.write().await.insert(coupon.id(), coupon.clone());
        Ok(())
    }

    async fn increment_usage(&self, id: CouponId) -> Result<Option<u32>, StoreError> {
        let mut coupons = self.coupons.write().await;
        let Some(coupon) = coupons.get_mut(&id) else { return Ok(None) };
        coupon.record_redemption().map_err(|e| StoreError::Conflict(e.to_string()))?;
        Ok(Some(coupon.usage_count()))
    }

    async fn release_usage(&self, id: CouponId) -> Result<(), StoreError> {
        if let Some(coupon) = self.coupons.write().await.get_mut(&id) {
            coupon.release_redemption();
        }
        Ok(())
    }

    async fn delete(&self, id: CouponId) -> Result<bool, StoreError> {
        Ok(self.coupons.write().await.remove(&id).is_some())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    fail_on_create: RwLock<bool>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self { Self::default() }

    pub async fn len(&self) -> usize { self.orders.read().await.len() }

    pub async fn set_fail_on_create(&self, fail: bool) {
        *self.fail_on_create.write().await = fail;
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<(), StoreError> {
        if *self.fail_on_create.read().await {
            return Err(StoreError::Unavailable("order store rejected write".to_string()));
        }
        let mut orders = self.orders.write().await;
        if let Some(key) = order.idempotency_key() {
            if orders.values().any(|o| o.user_id() == order.user_id() && o.idempotency_key() == Some(key)) {
                return Err(StoreError::Conflict(format!("idempotency key {key} already used")));
            }
        }
        if let Some(intent) = order.payment().intent_id.as_deref() {
            if orders.values().any(|o| o.payment().intent_id.as_deref() == Some(intent)) {
                return Err(StoreError::Conflict(format!("payment intent {intent} already used")));
            }
        }
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        self.orders.write().await.insert(order.id(), order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_all(&self, user: UserId, filter: OrderFilter) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id() == user)
            .filter(|o| filter.status.map_or(true, |s| o.status() == s))
            .filter(|o| filter.restaurant_id.map_or(true, |r| o.restaurant_id() == r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
        Ok(matching)
    }

    async fn find_latest_by_user(&self, user: UserId) -> Result<Option<Order>, StoreError> {
        Ok(self.find_all(user, OrderFilter::default()).await?.into_iter().next())
    }

    async fn find_by_idempotency_key(&self, user: UserId, key: &str) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders.values().find(|o| o.user_id() == user && o.idempotency_key() == Some(key)).cloned())
    }

    async fn find_by_payment_intent(&self, intent_id: &str) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders.values().find(|o| o.payment().intent_id.as_deref() == Some(intent_id)).cloned())
    }

    async fn count_coupon_uses(&self, user: UserId, code: &CouponCode) -> Result<u32, StoreError> {
        let orders = self.orders.read().await;
        let count = orders
            .values()
            .filter(|o| o.user_id() == user && o.coupon_code() == Some(code))
            .filter(|o| !matches!(o.status(), OrderStatus::Canceled | OrderStatus::Refunded))
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
        Ok(self.orders.write().await.remove(&id).is_some())
    }
}
