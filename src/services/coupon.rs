//! Coupon service

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use crate::domain::aggregates::coupon::validate;
use crate::domain::aggregates::{Coupon, CouponContext, CouponError, CouponPatch, NewCoupon};
use crate::domain::value_objects::{CouponCode, CouponId, Money, RestaurantId, UserId};
use crate::ports::{CouponFilter, CouponStore, OrderStore, StoreError};
use crate::Result;

pub struct CouponService {
    coupons: Arc<dyn CouponStore>,
    orders: Arc<dyn OrderStore>,
}

impl CouponService {
    pub fn new(coupons: Arc<dyn CouponStore>, orders: Arc<dyn OrderStore>) -> Self {
        Self { coupons, orders }
    }

    #[instrument(skip(self, new), fields(code = %new.code))]
    pub async fn create(&self, new: NewCoupon) -> Result<Coupon> {
        let coupon = Coupon::create(new)?;
        match self.coupons.insert(coupon.clone()).await {
            Ok(()) => {
                info!(coupon_id = %coupon.id(), "coupon created");
                Ok(coupon)
            }
            Err(StoreError::Conflict(_)) => Err(CouponError::DuplicateCode(coupon.code().clone()).into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self, filter: CouponFilter) -> Result<Vec<Coupon>> {
        Ok(self.coupons.list(filter).await?)
    }

    /// Changes the terms of a coupon. Its code and usage count stay as they are.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: CouponId, patch: CouponPatch) -> Result<Coupon> {
        let mut coupon = self.coupons.find_by_id(id).await?.ok_or(CouponError::NotFound)?;
        coupon.update(patch)?;
        self.coupons.save(&coupon).await?;
        info!(coupon_id = %id, "coupon updated");
        Ok(coupon)
    }

    /// Removes the coupon for good. Orders that used it keep their code and discount.
    #[instrument(skip(self))]
    pub async fn hard_delete(&self, id: CouponId) -> Result<()> {
        if !self.coupons.delete(id).await? {
            return Err(CouponError::NotFound.into());
        }
        info!(coupon_id = %id, "coupon deleted");
        Ok(())
    }

    /// Soft delete: the coupon stays on record as inactive.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: CouponId) -> Result<Coupon> {
        let mut coupon = self.coupons.find_by_id(id).await?.ok_or(CouponError::NotFound)?;
        coupon.deactivate();
        self.coupons.save(&coupon).await?;
        info!(coupon_id = %id, "coupon deactivated");
        Ok(coupon)
    }

    /// Looks the code up and runs every eligibility rule against the cart.
    ///
    /// The per-user limit is checked only when `user` is given; their usage is counted from
    /// order history.
    #[instrument(skip(self))]
    pub async fn validate(&self, code: &str, cart_amount: Money, restaurant_id: RestaurantId, user: Option<UserId>) -> Result<Coupon> {
        let found = match CouponCode::new(code) {
            Ok(code) => self.coupons.find_by_code(&code).await?,
            Err(_) => None,
        };

        let user_usage_count = match (&found, user) {
            (Some(coupon), Some(user)) if coupon.per_user_limit().is_some() => {
                Some(self.orders.count_coupon_uses(user, coupon.code()).await?)
            }
            _ => None,
        };

        let ctx = CouponContext { cart_amount, restaurant_id, now: Utc::now(), user_usage_count };
        if let Err(e) = validate(found.as_ref(), &ctx) {
            warn!(code, reason = %e, "coupon rejected");
            return Err(e.into());
        }
        Ok(found.ok_or(CouponError::NotFound)?)
    }

    /// Counts one use against the global limit before the order that uses it is stored.
    pub(crate) async fn reserve(&self, id: CouponId) -> Result<u32> {
        match self.coupons.increment_usage(id).await {
            Ok(Some(count)) => Ok(count),
            Ok(None) => Err(CouponError::NotFound.into()),
            Err(StoreError::Conflict(_)) => Err(CouponError::UsageLimitReached.into()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn release(&self, id: CouponId) -> Result<()> {
        Ok(self.coupons.release_usage(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CouponDiscount, CouponStatus};
    use crate::domain::value_objects::ValidationError;
    use crate::store::{InMemoryCouponStore, InMemoryOrderStore};
    use crate::Error;
    use chrono::Duration;

    fn service() -> CouponService {
        CouponService::new(Arc::new(InMemoryCouponStore::new()), Arc::new(InMemoryOrderStore::new()))
    }

    fn new_coupon(code: &str) -> NewCoupon {
        NewCoupon::new(CouponCode::new(code).unwrap(), CouponDiscount::Percent(20))
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let service = service();
        service.create(new_coupon("pizza20")).await.unwrap();
        let err = service.create(new_coupon("PIZZA20")).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::DuplicateCode(_))));
    }

    #[tokio::test]
    async fn test_validate_by_code_case_insensitive() {
        let service = service();
        service.create(new_coupon("PIZZA20")).await.unwrap();
        let coupon = service.validate(" pizza20 ", Money::from_minor(1000), RestaurantId::new(), None).await.unwrap();
        assert_eq!(coupon.code().as_str(), "PIZZA20");
    }

    #[tokio::test]
    async fn test_unknown_code_not_found() {
        let service = service();
        let err = service.validate("NOPE", Money::from_minor(1000), RestaurantId::new(), None).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::NotFound)));
        let err = service.validate("x", Money::from_minor(1000), RestaurantId::new(), None).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::NotFound)));
    }

    #[tokio::test]
    async fn test_expired_and_inactive_reports_inactive() {
        let service = service();
        let mut new = new_coupon("OLDIE");
        new.status = CouponStatus::Inactive;
        new.valid_from = Some(Utc::now() - Duration::days(10));
        new.valid_until = Some(Utc::now() - Duration::days(5));
        service.create(new).await.unwrap();
        let err = service.validate("OLDIE", Money::from_minor(1000), RestaurantId::new(), None).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::NotActive)));
    }

    #[tokio::test]
    async fn test_deactivate_then_validate() {
        let service = service();
        let coupon = service.create(new_coupon("BYE")).await.unwrap();
        let coupon = service.deactivate(coupon.id()).await.unwrap();
        assert_eq!(coupon.status(), CouponStatus::Inactive);
        let err = service.validate("BYE", Money::from_minor(1000), RestaurantId::new(), None).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::NotActive)));
    }

    #[tokio::test]
    async fn test_reserve_until_limit() {
        let service = service();
        let mut new = new_coupon("ONCE");
        new.usage_limit = Some(1);
        let coupon = service.create(new).await.unwrap();
        assert_eq!(service.reserve(coupon.id()).await.unwrap(), 1);
        let err = service.reserve(coupon.id()).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::UsageLimitReached)));
        let err = service.validate("ONCE", Money::from_minor(1000), RestaurantId::new(), None).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::UsageLimitReached)));

        service.release(coupon.id()).await.unwrap();
        assert!(service.validate("ONCE", Money::from_minor(1000), RestaurantId::new(), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_keeps_code_and_rechecks() {
        let service = service();
        let coupon = service.create(new_coupon("EDIT")).await.unwrap();
        let patch = CouponPatch { discount: Some(CouponDiscount::Percent(0)), ..Default::default() };
        let err = service.update(coupon.id(), patch).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::CouponValueNotPositive)));

        let patch = CouponPatch { min_order_amount: Some(Money::from_minor(5000)), ..Default::default() };
        let updated = service.update(coupon.id(), patch).await.unwrap();
        assert_eq!(updated.code().as_str(), "EDIT");
        let err = service.validate("EDIT", Money::from_minor(4999), RestaurantId::new(), None).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::MinOrderNotMet { .. })));

        let err = service.update(CouponId::new(), CouponPatch::default()).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::NotFound)));
    }

    #[tokio::test]
    async fn test_hard_delete_frees_the_code() {
        let service = service();
        let coupon = service.create(new_coupon("GONE")).await.unwrap();
        service.hard_delete(coupon.id()).await.unwrap();
        let err = service.validate("GONE", Money::from_minor(1000), RestaurantId::new(), None).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::NotFound)));
        let err = service.hard_delete(coupon.id()).await.unwrap_err();
        assert!(matches!(err, Error::Coupon(CouponError::NotFound)));
        service.create(new_coupon("GONE")).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let service = service();
        service.create(new_coupon("AAA")).await.unwrap();
        let b = service.create(new_coupon("BBB")).await.unwrap();
        service.deactivate(b.id()).await.unwrap();
        let active = service.list(CouponFilter { status: Some(CouponStatus::Active), restaurant_id: None }).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code().as_str(), "AAA");
    }
}
