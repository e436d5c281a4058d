//! Coupon Aggregate
//!
//! Eligibility is decided by [`validate`], which runs its checks in a fixed order and reports the
//! first one that fails. Callers branch on the returned [`CouponError`], so the order is part of
//! the contract:
//!
//! 1. the coupon exists
//! 2. its status is active
//! 3. `valid_from` has passed
//! 4. `valid_until` has not passed
//! 5. the global usage limit has room
//! 6. the cart meets the minimum order amount
//! 7. the coupon is global or bound to the cart's restaurant
//! 8. the per-user limit has room, when the caller supplied a usage count

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::value_objects::{CouponCode, CouponId, Money, RestaurantId, ValidationError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    id: CouponId,
    code: CouponCode,
    #[serde(flatten)]
    discount: CouponDiscount,
    restaurant_id: Option<RestaurantId>,
    min_order_amount: Option<Money>,
    usage_limit: Option<u32>,
    usage_count: u32,
    per_user_limit: Option<u32>,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    status: CouponStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// How a coupon reduces the amount it is applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CouponDiscount {
    /// Whole percent of the amount, floored.
    Percent(u32),
    /// Fixed amount in minor units, capped at the amount.
    Fixed(Money),
}

impl CouponDiscount {
    pub fn discount_for(&self, amount: Money) -> Money {
        let discount = match *self {
            CouponDiscount::Percent(percent) => amount.percent_floor(percent),
            CouponDiscount::Fixed(value) => value,
        };
        discount.min(amount)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus { #[default] Active, Inactive, Expired }

/// Input for creating a coupon.
#[derive(Clone, Debug)]
pub struct NewCoupon {
    pub code: CouponCode,
    pub discount: CouponDiscount,
    pub restaurant_id: Option<RestaurantId>,
    pub min_order_amount: Option<Money>,
    pub usage_limit: Option<u32>,
    pub per_user_limit: Option<u32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub status: CouponStatus,
}

impl NewCoupon {
    pub fn new(code: CouponCode, discount: CouponDiscount) -> Self {
        Self {
            code, discount, restaurant_id: None, min_order_amount: None, usage_limit: None,
            per_user_limit: None, valid_from: None, valid_until: None, status: CouponStatus::Active,
        }
    }
}

/// Changes to an existing coupon. `None` leaves a field as it is; the code never changes.
#[derive(Clone, Debug, Default)]
pub struct CouponPatch {
    pub discount: Option<CouponDiscount>,
    pub restaurant_id: Option<RestaurantId>,
    pub min_order_amount: Option<Money>,
    pub usage_limit: Option<u32>,
    pub per_user_limit: Option<u32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub status: Option<CouponStatus>,
}

/// The cart-side facts a coupon is checked against.
#[derive(Clone, Copy, Debug)]
pub struct CouponContext {
    pub cart_amount: Money,
    pub restaurant_id: RestaurantId,
    pub now: DateTime<Utc>,
    /// Orders this user already placed with the coupon, if the caller counted them.
    pub user_usage_count: Option<u32>,
}

/// A validated coupon as carried into pricing and onto the order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    pub code: CouponCode,
    #[serde(flatten)]
    pub discount: CouponDiscount,
}

impl Coupon {
    pub fn create(new: NewCoupon) -> Result<Self, ValidationError> {
        check_terms(new.discount, new.valid_from, new.valid_until)?;
        let now = Utc::now();
        Ok(Self {
            id: CouponId::new(), code: new.code, discount: new.discount, restaurant_id: new.restaurant_id,
            min_order_amount: new.min_order_amount, usage_limit: new.usage_limit, usage_count: 0,
            per_user_limit: new.per_user_limit, valid_from: new.valid_from, valid_until: new.valid_until,
            status: new.status, created_at: now, updated_at: now,
        })
    }

    pub fn id(&self) -> CouponId { self.id }
    pub fn code(&self) -> &CouponCode { &self.code }
    pub fn discount(&self) -> CouponDiscount { self.discount }
    pub fn restaurant_id(&self) -> Option<RestaurantId> { self.restaurant_id }
    pub fn status(&self) -> CouponStatus { self.status }
    pub fn usage_count(&self) -> u32 { self.usage_count }
    pub fn usage_limit(&self) -> Option<u32> { self.usage_limit }
    pub fn per_user_limit(&self) -> Option<u32> { self.per_user_limit }

    pub fn applied(&self) -> AppliedCoupon { AppliedCoupon { code: self.code.clone(), discount: self.discount } }

    pub fn check(&self, ctx: &CouponContext) -> Result<(), CouponError> {
        if self.status != CouponStatus::Active {
            return Err(CouponError::NotActive);
        }
        if self.valid_from.is_some_and(|from| from > ctx.now) {
            return Err(CouponError::NotYetValid);
        }
        if self.valid_until.is_some_and(|until| until < ctx.now) {
            return Err(CouponError::Expired);
        }
        if self.usage_limit.is_some_and(|limit| self.usage_count >= limit) {
            return Err(CouponError::UsageLimitReached);
        }
        if let Some(minimum) = self.min_order_amount {
            if ctx.cart_amount < minimum { return Err(CouponError::MinOrderNotMet { minimum }); }
        }
        if self.restaurant_id.is_some_and(|r| r != ctx.restaurant_id) {
            return Err(CouponError::RestaurantMismatch);
        }
        if let (Some(limit), Some(used)) = (self.per_user_limit, ctx.user_usage_count) {
            if used >= limit { return Err(CouponError::PerUserLimitReached); }
        }
        Ok(())
    }

    /// Counts one redemption against the global limit.
    pub fn record_redemption(&mut self) -> Result<(), CouponError> {
        if self.usage_limit.is_some_and(|limit| self.usage_count >= limit) {
            return Err(CouponError::UsageLimitReached);
        }
        self.usage_count += 1;
        self.touch();
        Ok(())
    }

    /// Gives back a redemption whose order was never stored.
    pub fn release_redemption(&mut self) {
        self.usage_count = self.usage_count.saturating_sub(1);
        self.touch();
    }

    /// Applies `patch`. The merged terms go through the same checks as [`Coupon::create`]; on
    /// failure the coupon is left untouched.
    pub fn update(&mut self, patch: CouponPatch) -> Result<(), ValidationError> {
        let discount = patch.discount.unwrap_or(self.discount);
        let valid_from = patch.valid_from.or(self.valid_from);
        let valid_until = patch.valid_until.or(self.valid_until);
        check_terms(discount, valid_from, valid_until)?;

        self.discount = discount;
        self.valid_from = valid_from;
        self.valid_until = valid_until;
        if let Some(restaurant_id) = patch.restaurant_id { self.restaurant_id = Some(restaurant_id); }
        if let Some(minimum) = patch.min_order_amount { self.min_order_amount = Some(minimum); }
        if let Some(limit) = patch.usage_limit { self.usage_limit = Some(limit); }
        if let Some(limit) = patch.per_user_limit { self.per_user_limit = Some(limit); }
        if let Some(status) = patch.status { self.status = status; }
        self.touch();
        Ok(())
    }

    pub fn deactivate(&mut self) { self.status = CouponStatus::Inactive; self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn check_terms(
    discount: CouponDiscount,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match discount {
        CouponDiscount::Percent(0) => return Err(ValidationError::CouponValueNotPositive),
        CouponDiscount::Fixed(value) if value.is_zero() => return Err(ValidationError::CouponValueNotPositive),
        CouponDiscount::Percent(p) if p > 100 => return Err(ValidationError::CouponPercentTooLarge(p)),
        _ => {}
    }
    if let (Some(from), Some(until)) = (valid_from, valid_until) {
        if from >= until { return Err(ValidationError::InvalidValidityWindow); }
    }
    Ok(())
}

/// Checks `coupon` against `ctx`, returning it when every rule passes.
pub fn validate<'a>(coupon: Option<&'a Coupon>, ctx: &CouponContext) -> Result<&'a Coupon, CouponError> {
    let coupon = coupon.ok_or(CouponError::NotFound)?;
    coupon.check(ctx)?;
    Ok(coupon)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("Coupon not found")]
    NotFound,
    #[error("Coupon is not active")]
    NotActive,
    #[error("Coupon is not yet valid")]
    NotYetValid,
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon has reached its usage limit")]
    UsageLimitReached,
    #[error("Minimum order amount is {minimum}")]
    MinOrderNotMet { minimum: Money },
    #[error("Coupon is not valid for this restaurant")]
    RestaurantMismatch,
    #[error("You have already used this coupon the maximum number of times")]
    PerUserLimitReached,
    #[error("Coupon code {0} already exists")]
    DuplicateCode(CouponCode),
}
