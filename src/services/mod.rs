//! Application services
//!
//! Services resolve collaborators, hold the per-key locks that serialize read-modify-write cycles,
//! and hand the actual rules to the domain aggregates.

pub mod cart;
pub mod coupon;
pub mod order;

pub use cart::{CartLineView, CartService, CartView};
pub use coupon::CouponService;
pub use order::{CheckoutInput, OrderAction, OrderService, PaymentMethod, Quote, QuoteInput};

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per key, created on demand.
///
/// Holding the guard for a cart owner (or an order) serializes every mutation of that entity
/// across tasks. Idle entries are dropped the next time a lock is taken.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self { Self { locks: Mutex::new(HashMap::new()) } }

    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|k, l| k == key || Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self { Self::new() }
}
