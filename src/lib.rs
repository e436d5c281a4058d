//! Food Delivery Ordering Engine
//!
//! Cart consistency, coupon eligibility, order pricing and the order lifecycle for a food-delivery
//! marketplace.
//!
//! ## Features
//! - Single-restaurant carts with quantity merging
//! - Ordered, fail-fast coupon validation
//! - Deterministic minor-unit order pricing (fees, small-order surcharge, tax, tip, coupons)
//! - Order state machine with an append-only delivery log
//! - Idempotent checkout that clears the cart with the order it creates

pub mod api;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;
pub mod store;

use thiserror::Error;
use crate::domain::aggregates::{CartError, CouponError, OrderError};
use crate::domain::value_objects::ValidationError;
use crate::ports::{PaymentError, StoreError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Restaurant not found")]
    RestaurantNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// Coarse classification callers use to decide how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape.
    Validation,
    /// The request clashes with current state and the user must resolve it.
    Conflict,
    /// The entity is not in a state that allows the operation.
    State,
    NotFound,
    /// A collaborator failed. Never defaulted or retried here.
    External,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Cart(CartError::ProductUnavailable(_)) => ErrorKind::NotFound,
            Error::Cart(CartError::MultiRestaurantConflict { .. } | CartError::ItemNotInCart(_)) => ErrorKind::Conflict,
            Error::Cart(CartError::EmptyCart) => ErrorKind::State,
            Error::Coupon(CouponError::NotFound) => ErrorKind::NotFound,
            Error::Coupon(CouponError::DuplicateCode(_)) => ErrorKind::Conflict,
            Error::Coupon(_) => ErrorKind::State,
            Error::Order(OrderError::NotFound) => ErrorKind::NotFound,
            Error::Order(OrderError::PaymentIntentRequired) => ErrorKind::Validation,
            Error::Order(OrderError::PaymentIntentAlreadyUsed(_)) => ErrorKind::Conflict,
            Error::Order(_) => ErrorKind::State,
            Error::RestaurantNotFound => ErrorKind::NotFound,
            Error::Store(StoreError::Conflict(_)) => ErrorKind::Conflict,
            Error::Store(StoreError::Unavailable(_)) | Error::Payment(_) => ErrorKind::External,
        }
    }

    /// Stable machine-readable reason.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(e) => match e {
                ValidationError::QuantityBelowOne => "quantity_below_one",
                ValidationError::PercentageOutOfRange(_) => "percentage_out_of_range",
                ValidationError::InvalidCouponCode => "invalid_coupon_code",
                ValidationError::MalformedId(_) => "malformed_id",
                ValidationError::DiscountAbovePrice { .. } => "discount_above_price",
                ValidationError::CouponValueNotPositive => "coupon_value_not_positive",
                ValidationError::CouponPercentTooLarge(_) => "coupon_percent_too_large",
                ValidationError::InvalidValidityWindow => "invalid_validity_window",
                ValidationError::ZeroFallbackFee => "zero_fallback_fee",
            },
            Error::Cart(e) => match e {
                CartError::ProductUnavailable(_) => "product_unavailable",
                CartError::MultiRestaurantConflict { .. } => "multi_restaurant_conflict",
                CartError::ItemNotInCart(_) => "item_not_in_cart",
                CartError::EmptyCart => "empty_cart",
            },
            Error::Coupon(e) => match e {
                CouponError::NotFound => "coupon_not_found",
                CouponError::NotActive => "coupon_not_active",
                CouponError::NotYetValid => "coupon_not_yet_valid",
                CouponError::Expired => "coupon_expired",
                CouponError::UsageLimitReached => "coupon_usage_limit_reached",
                CouponError::MinOrderNotMet { .. } => "coupon_min_order_not_met",
                CouponError::RestaurantMismatch => "coupon_restaurant_mismatch",
                CouponError::PerUserLimitReached => "coupon_per_user_limit_reached",
                CouponError::DuplicateCode(_) => "duplicate_coupon",
            },
            Error::Order(e) => match e {
                OrderError::NoItems => "empty_cart",
                OrderError::InvalidTransition { .. } => "invalid_transition",
                OrderError::NotDeletable(_) => "order_not_deletable",
                OrderError::PaymentNotSettled => "payment_not_settled",
                OrderError::EventNotAllowed { .. } => "event_not_allowed",
                OrderError::PickupOrder => "pickup_order",
                OrderError::NothingToRefund => "nothing_to_refund",
                OrderError::PaymentIntentRequired => "payment_intent_required",
                OrderError::PaymentNotConfirmed => "payment_not_confirmed",
                OrderError::PaymentIntentAlreadyUsed(_) => "payment_intent_already_used",
                OrderError::PaymentAmountMismatch { .. } => "payment_amount_mismatch",
                OrderError::NonPositiveTotal => "non_positive_total",
                OrderError::NotFound => "order_not_found",
            },
            Error::RestaurantNotFound => "restaurant_not_found",
            Error::Store(StoreError::Conflict(_)) => "store_conflict",
            Error::Store(StoreError::Unavailable(_)) => "store_unavailable",
            Error::Payment(_) => "payment_gateway_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
