//! Order amount calculation
//!
//! [`PricingRules::calculate`] is pure: the same lines, policy, method, tip and coupon always give
//! the same [`OrderAmounts`]. It trusts its input. Availability and ownership are enforced when
//! items enter the cart, and missing products must fail before pricing is attempted.
//!
//! Steps, in order:
//!
//! 1. `subtotal` sums effective unit price times quantity.
//! 2. `discount` sums `price - discount_price` times quantity. It is informational only, since
//!    `subtotal` already reflects it.
//! 3. Pickup orders carry no delivery fee, no small-order surcharge and no tip.
//! 4. Delivery orders pay the policy fee (or the fallback), the flat surcharge when
//!    `subtotal < min_order`, and `floor(subtotal * tip% / 100)`.
//! 5. `tax` is the rounded tax rate applied to `subtotal` alone.
//! 6. A coupon discount, computed against `subtotal`, comes off the total, which never drops
//!    below zero.

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::coupon::AppliedCoupon;
use crate::domain::aggregates::product::ProductSnapshot;
use crate::domain::aggregates::restaurant::DeliveryPolicy;
use crate::domain::value_objects::{Money, Percentage, Quantity, ValidationError};

pub const DEFAULT_TAX_RATE_BPS: u32 = 900;
pub const DEFAULT_SMALL_ORDER_FEE: Money = Money::from_minor(5_000);
pub const DEFAULT_FALLBACK_DELIVERY_FEE: Money = Money::from_minor(1_500);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod { #[default] Delivery, Pickup }

/// One cart line as seen by the calculator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricedLine {
    pub price: Money,
    pub discount_price: Option<Money>,
    pub quantity: Quantity,
}

impl PricedLine {
    pub fn from_product(product: &ProductSnapshot, quantity: Quantity) -> Self {
        Self { price: product.price(), discount_price: product.discount_price(), quantity }
    }

    pub fn unit_price(&self) -> Money { self.discount_price.unwrap_or(self.price) }
    pub fn total(&self) -> Money { self.unit_price().multiply(self.quantity) }
}

/// Monetary breakdown of an order, all in minor units.
///
/// `delivery_fee` already includes `small_order_fee`; the surcharge is reported separately only for
/// display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAmounts {
    pub subtotal: Money,
    pub discount: Money,
    pub delivery_fee: Money,
    pub small_order_fee: Money,
    pub tax: Money,
    pub tip_amount: Money,
    pub coupon_discount: Money,
    pub total: Money,
}

/// Platform-wide pricing constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricingRules {
    tax_rate_bps: u32,
    small_order_fee: Money,
    fallback_delivery_fee: Money,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            small_order_fee: DEFAULT_SMALL_ORDER_FEE,
            fallback_delivery_fee: DEFAULT_FALLBACK_DELIVERY_FEE,
        }
    }
}

impl PricingRules {
    /// The fallback fee must be non-zero so a restaurant without a policy never delivers for free.
    pub fn new(tax_rate_bps: u32, small_order_fee: Money, fallback_delivery_fee: Money) -> Result<Self, ValidationError> {
        if fallback_delivery_fee.is_zero() { return Err(ValidationError::ZeroFallbackFee); }
        Ok(Self { tax_rate_bps, small_order_fee, fallback_delivery_fee })
    }

    pub fn tax_rate_bps(&self) -> u32 { self.tax_rate_bps }
    pub fn small_order_fee(&self) -> Money { self.small_order_fee }
    pub fn fallback_delivery_fee(&self) -> Money { self.fallback_delivery_fee }

    pub fn calculate(
        &self,
        lines: &[PricedLine],
        policy: &DeliveryPolicy,
        method: DeliveryMethod,
        tip: Percentage,
        coupon: Option<&AppliedCoupon>,
    ) -> OrderAmounts {
        if lines.is_empty() {
            return OrderAmounts::default();
        }

        let subtotal: Money = lines.iter().map(PricedLine::total).sum();
        let discount: Money = lines
            .iter()
            .filter_map(|l| l.discount_price.map(|d| l.price.saturating_sub(d).multiply(l.quantity)))
            .sum();

        let (base_fee, small_order_fee, tip_amount) = match method {
            DeliveryMethod::Pickup => (Money::ZERO, Money::ZERO, Money::ZERO),
            DeliveryMethod::Delivery => {
                let fee = policy.fee.unwrap_or(self.fallback_delivery_fee);
                let surcharge = if subtotal < policy.min_order { self.small_order_fee } else { Money::ZERO };
                (fee, surcharge, subtotal.percent_floor(tip.value()))
            }
        };
        let delivery_fee = base_fee.add(small_order_fee);
        let tax = subtotal.apply_rate_bps(self.tax_rate_bps);
        let coupon_discount = coupon.map_or(Money::ZERO, |c| c.discount.discount_for(subtotal));

        let total = subtotal.add(delivery_fee).add(tax).add(tip_amount).saturating_sub(coupon_discount);

        OrderAmounts { subtotal, discount, delivery_fee, small_order_fee, tax, tip_amount, coupon_discount, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::coupon::CouponDiscount;
    use crate::domain::value_objects::CouponCode;

    fn line(price: u64, discount: Option<u64>, qty: u32) -> PricedLine {
        PricedLine { price: Money::from_minor(price), discount_price: discount.map(Money::from_minor), quantity: Quantity::new(qty).unwrap() }
    }

    fn policy(min_order: u64, fee: Option<u64>) -> DeliveryPolicy {
        DeliveryPolicy { min_order: Money::from_minor(min_order), fee: fee.map(Money::from_minor), estimated_minutes: None }
    }

    fn pct(v: u32) -> Percentage { Percentage::new(v).unwrap() }

    fn coupon(discount: CouponDiscount) -> AppliedCoupon {
        AppliedCoupon { code: CouponCode::new("WELCOME").unwrap(), discount }
    }

    #[test]
    fn test_reference_breakdown() {
        let rules = PricingRules::default();
        let lines = [line(1999, Some(1499), 1), line(699, None, 2)];
        let amounts = rules.calculate(&lines, &policy(1500, Some(500)), DeliveryMethod::Delivery, pct(15), None);

        assert_eq!(amounts.subtotal, Money::from_minor(2897));
        assert_eq!(amounts.discount, Money::from_minor(500));
        assert_eq!(amounts.small_order_fee, Money::ZERO);
        assert_eq!(amounts.delivery_fee, Money::from_minor(500));
        assert_eq!(amounts.tax, Money::from_minor(261));
        assert_eq!(amounts.tip_amount, Money::from_minor(434));
        assert_eq!(amounts.total, Money::from_minor(4092));
    }

    #[test]
    fn test_deterministic() {
        let rules = PricingRules::default();
        let lines = [line(1250, Some(999), 3)];
        let p = policy(0, Some(300));
        let a = rules.calculate(&lines, &p, DeliveryMethod::Delivery, pct(10), None);
        let b = rules.calculate(&lines, &p, DeliveryMethod::Delivery, pct(10), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_cart_is_all_zero() {
        let amounts = PricingRules::default().calculate(&[], &policy(1500, Some(500)), DeliveryMethod::Delivery, pct(20), None);
        assert_eq!(amounts, OrderAmounts::default());
    }

    #[test]
    fn test_small_order_boundary() {
        let rules = PricingRules::default();
        let p = policy(1500, Some(500));

        let at_minimum = rules.calculate(&[line(1500, None, 1)], &p, DeliveryMethod::Delivery, pct(0), None);
        assert_eq!(at_minimum.small_order_fee, Money::ZERO);
        assert_eq!(at_minimum.delivery_fee, Money::from_minor(500));

        let below = rules.calculate(&[line(1499, None, 1)], &p, DeliveryMethod::Delivery, pct(0), None);
        assert_eq!(below.small_order_fee, DEFAULT_SMALL_ORDER_FEE);
        assert_eq!(below.delivery_fee, Money::from_minor(500).add(DEFAULT_SMALL_ORDER_FEE));
    }

    #[test]
    fn test_pickup_has_no_delivery_charges() {
        let amounts = PricingRules::default().calculate(&[line(800, None, 1)], &policy(5000, Some(900)), DeliveryMethod::Pickup, pct(25), None);
        assert_eq!(amounts.delivery_fee, Money::ZERO);
        assert_eq!(amounts.small_order_fee, Money::ZERO);
        assert_eq!(amounts.tip_amount, Money::ZERO);
        assert_eq!(amounts.tax, Money::from_minor(72));
        assert_eq!(amounts.total, Money::from_minor(872));
    }

    #[test]
    fn test_fallback_fee_applies_without_policy_fee() {
        let amounts = PricingRules::default().calculate(&[line(2000, None, 1)], &DeliveryPolicy::default(), DeliveryMethod::Delivery, pct(0), None);
        assert_eq!(amounts.delivery_fee, DEFAULT_FALLBACK_DELIVERY_FEE);
    }

    #[test]
    fn test_tax_excludes_fees_and_tip() {
        let amounts = PricingRules::default().calculate(&[line(1000, None, 1)], &policy(0, Some(10_000)), DeliveryMethod::Delivery, pct(50), None);
        assert_eq!(amounts.tax, Money::from_minor(90));
    }

    #[test]
    fn test_full_percent_coupon_never_negative() {
        let applied = coupon(CouponDiscount::Percent(100));
        let amounts = PricingRules::default().calculate(&[line(3000, None, 1)], &policy(0, Some(500)), DeliveryMethod::Delivery, pct(10), Some(&applied));
        assert_eq!(amounts.coupon_discount, Money::from_minor(3000));
        // 3000 + 500 + 270 + 300 - 3000
        assert_eq!(amounts.total, Money::from_minor(1070));

        let amounts = PricingRules::default().calculate(&[line(3000, None, 1)], &policy(0, None), DeliveryMethod::Pickup, pct(0), Some(&applied));
        assert_eq!(amounts.total, Money::from_minor(270));
    }

    #[test]
    fn test_fixed_coupon_capped_at_subtotal() {
        let applied = coupon(CouponDiscount::Fixed(Money::from_minor(10_000)));
        let amounts = PricingRules::default().calculate(&[line(400, None, 1)], &policy(0, None), DeliveryMethod::Pickup, pct(0), Some(&applied));
        assert_eq!(amounts.coupon_discount, Money::from_minor(400));
        assert_eq!(amounts.total, Money::from_minor(36));
    }

    #[test]
    fn test_rules_reject_zero_fallback() {
        assert_eq!(PricingRules::new(900, Money::from_minor(50), Money::ZERO), Err(ValidationError::ZeroFallbackFee));
    }
}
