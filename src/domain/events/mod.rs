//! Domain events
use serde::Serialize;
use crate::domain::aggregates::order::OrderStatus;
use crate::domain::value_objects::{CouponCode, Money, OrderId, RestaurantId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Coupon(CouponEvent),
}

impl DomainEvent {
    /// Subject suffix used when the event leaves the process.
    pub fn subject(&self) -> &'static str {
        match self {
            DomainEvent::Order(OrderEvent::Placed { .. }) => "order.placed",
            DomainEvent::Order(OrderEvent::PaymentConfirmed { .. }) => "order.payment_confirmed",
            DomainEvent::Order(OrderEvent::StatusChanged { .. }) => "order.status_changed",
            DomainEvent::Order(OrderEvent::Deleted { .. }) => "order.deleted",
            DomainEvent::Coupon(CouponEvent::Redeemed { .. }) => "coupon.redeemed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: OrderId, user_id: UserId, restaurant_id: RestaurantId, total: Money },
    PaymentConfirmed { order_id: OrderId },
    StatusChanged { order_id: OrderId, from: OrderStatus, to: OrderStatus },
    Deleted { order_id: OrderId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponEvent {
    Redeemed { code: CouponCode, order_id: OrderId },
}
