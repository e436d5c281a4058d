//! Value Objects for the delivery marketplace

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Rejected input shapes. Reported immediately, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Quantity must be at least 1")]
    QuantityBelowOne,
    #[error("Percentage must be between 0 and 100, got {0}")]
    PercentageOutOfRange(u32),
    #[error("Coupon code must be 3 to 20 characters")]
    InvalidCouponCode,
    #[error("Invalid ID format: {0}")]
    MalformedId(String),
    #[error("Discount price {discount} exceeds price {price}")]
    DiscountAbovePrice { price: Money, discount: Money },
    #[error("Coupon value must be positive")]
    CouponValueNotPositive,
    #[error("Percent coupon value cannot exceed 100, got {0}")]
    CouponPercentTooLarge(u32),
    #[error("validUntil must be after validFrom")]
    InvalidValidityWindow,
    #[error("Delivery fee must be positive")]
    ZeroFallbackFee,
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self { Self(Uuid::now_v7()) }
            pub fn from_uuid(id: Uuid) -> Self { Self(id) }
            pub fn as_uuid(&self) -> &Uuid { &self.0 }
        }

        impl Default for $name {
            fn default() -> Self { Self::new() }
        }

        impl FromStr for $name {
            type Err = ValidationError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|_| ValidationError::MalformedId(s.to_string()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }
    };
}

entity_id!(
    /// Customer owning a cart and placing orders
    UserId
);
entity_id!(ProductId);
entity_id!(RestaurantId);
entity_id!(OrderId);
entity_id!(CouponId);

/// Money value object, counted in minor currency units (bani, cents).
///
/// Non-negative by construction. Addition and multiplication saturate, subtraction floors at zero,
/// so no code path can produce a negative amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(amount: u64) -> Self { Self(amount) }
    pub const fn minor(&self) -> u64 { self.0 }
    pub fn is_zero(&self) -> bool { self.0 == 0 }

    pub fn add(self, other: Money) -> Money { Money(self.0.saturating_add(other.0)) }
    pub fn saturating_sub(self, other: Money) -> Money { Money(self.0.saturating_sub(other.0)) }
    pub fn multiply(self, qty: Quantity) -> Money { Money(self.0.saturating_mul(u64::from(qty.value()))) }

    /// `floor(amount * percent / 100)`
    pub fn percent_floor(self, percent: u32) -> Money {
        Money(self.0.saturating_mul(u64::from(percent)) / 100)
    }

    /// `round(amount * bps / 10_000)`, halves rounded up.
    pub fn apply_rate_bps(self, bps: u32) -> Money {
        Money(self.0.saturating_mul(u64::from(bps)).saturating_add(5_000) / 10_000)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self { iter.fold(Money::ZERO, Money::add) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}.{:02}", self.0 / 100, self.0 % 100) }
}

/// Item quantity, always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value == 0 { return Err(ValidationError::QuantityBelowOne); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
}

impl TryFrom<u32> for Quantity {
    type Error = ValidationError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

/// Whole percentage in `0..=100`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Percentage(u32);

impl Percentage {
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value > 100 { return Err(ValidationError::PercentageOutOfRange(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
}

impl TryFrom<u32> for Percentage {
    type Error = ValidationError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Percentage> for u32 {
    fn from(p: Percentage) -> Self { p.0 }
}

/// Coupon code, stored trimmed and uppercased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into().trim().to_uppercase();
        if !(3..=20).contains(&value.chars().count()) { return Err(ValidationError::InvalidCouponCode); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for CouponCode {
    type Error = ValidationError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self { code.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}
