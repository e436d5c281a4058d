//! Order Aggregate
//!
//! Lifecycle:
//!
//! ```text
//! created -> payment_pending -> paid -> accepted -> preparing -> ready_for_pickup -> out_for_delivery -> delivered
//! ```
//!
//! with `payment_failed`, `canceled` and `refunded` reachable from the early states. Payment status
//! is tracked next to the order status. Cash orders start in `payment_pending` with payment
//! `requires_payment` and may be accepted before the cash is collected. Card orders are placed only
//! after the gateway confirmed the payment and start in `paid`.
//!
//! The delivery log is append-only and is kept independently of `status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use crate::domain::aggregates::coupon::AppliedCoupon;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::{DeliveryMethod, OrderAmounts};
use crate::domain::value_objects::{CouponCode, Money, OrderId, ProductId, Quantity, RestaurantId, UserId};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    restaurant_id: RestaurantId,
    items: Vec<OrderLine>,
    amounts: OrderAmounts,
    coupon_code: Option<CouponCode>,
    payment: Payment,
    status: OrderStatus,
    delivery: Delivery,
    #[serde(skip_serializing_if = "Option::is_none")]
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// A cart line copied by value at checkout. Later product edits never reach it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub unit_price: Money,
    pub quantity: Quantity,
}

impl OrderLine {
    pub fn total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub details: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Created,
    PaymentPending,
    Paid,
    PaymentFailed,
    Accepted,
    Preparing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Canceled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::PaymentPending => "payment_pending",
            Self::Paid => "paid",
            Self::PaymentFailed => "payment_failed",
            Self::Accepted => "accepted",
            Self::Preparing => "preparing",
            Self::ReadyForPickup => "ready_for_pickup",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
            Self::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Created, PaymentPending | Paid | Canceled)
                | (PaymentPending, Paid | PaymentFailed | Accepted | Canceled)
                | (PaymentFailed, PaymentPending | Canceled)
                | (Paid, Accepted | Canceled | Refunded)
                | (Accepted, Preparing | Canceled | Refunded)
                | (Preparing, ReadyForPickup)
                | (ReadyForPickup, OutForDelivery | Delivered)
                | (OutForDelivery, Delivered)
                | (Delivered | Canceled, Refunded)
        )
    }

    /// Orders can be deleted only before any payment was taken or the restaurant saw them.
    pub fn is_deletable(self) -> bool { matches!(self, Self::Created | Self::PaymentPending) }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] RequiresPayment, Paid, Failed, Refunded }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider { Stripe, Cash }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub provider: PaymentProvider,
    pub intent_id: Option<String>,
    pub status: PaymentStatus,
}

/// How the order is being paid, as established before placement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentSetup {
    Cash,
    /// The gateway reported this intent as paid.
    ConfirmedCard { intent_id: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryEventStatus { OrderPlaced, RestaurantAccepted, DriverAssigned, OrderPickedUp, OrderDelivered }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub at: DateTime<Utc>,
    pub status: DeliveryEventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    method: DeliveryMethod,
    address: Address,
    eta_minutes: Option<u32>,
    events: Vec<DeliveryEvent>,
}

impl Delivery {
    pub fn method(&self) -> DeliveryMethod { self.method }
    pub fn address(&self) -> &Address { &self.address }
    pub fn eta_minutes(&self) -> Option<u32> { self.eta_minutes }
    pub fn events(&self) -> &[DeliveryEvent] { &self.events }
    pub fn has_event(&self, status: DeliveryEventStatus) -> bool { self.events.iter().any(|e| e.status == status) }

    fn append(&mut self, status: DeliveryEventStatus, note: Option<String>) {
        self.events.push(DeliveryEvent { at: Utc::now(), status, note });
    }
}

/// Everything checkout has established before an order exists.
#[derive(Clone, Debug)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub restaurant_id: RestaurantId,
    pub items: Vec<OrderLine>,
    pub amounts: OrderAmounts,
    pub coupon: Option<AppliedCoupon>,
    pub payment: PaymentSetup,
    pub delivery_method: DeliveryMethod,
    pub address: Address,
    pub eta_minutes: Option<u32>,
    pub special_instructions: Option<String>,
    pub idempotency_key: Option<String>,
}

impl Order {
    pub fn place(input: PlaceOrder) -> Result<Self, OrderError> {
        if input.items.is_empty() { return Err(OrderError::NoItems); }

        let (status, payment) = match input.payment {
            PaymentSetup::Cash => (
                OrderStatus::PaymentPending,
                Payment { provider: PaymentProvider::Cash, intent_id: None, status: PaymentStatus::RequiresPayment },
            ),
            PaymentSetup::ConfirmedCard { intent_id } => (
                OrderStatus::Paid,
                Payment { provider: PaymentProvider::Stripe, intent_id: Some(intent_id), status: PaymentStatus::Paid },
            ),
        };

        let now = Utc::now();
        let mut delivery = Delivery { method: input.delivery_method, address: input.address, eta_minutes: input.eta_minutes, events: vec![] };
        delivery.append(DeliveryEventStatus::OrderPlaced, input.special_instructions);

        let mut order = Self {
            id: OrderId::new(), user_id: input.user_id, restaurant_id: input.restaurant_id, items: input.items,
            amounts: input.amounts, coupon_code: input.coupon.map(|c| c.code), payment, status, delivery,
            idempotency_key: input.idempotency_key, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, user_id: order.user_id, restaurant_id: order.restaurant_id, total: order.amounts.total,
        }));
        Ok(order)
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn user_id(&self) -> UserId { self.user_id }
    pub fn restaurant_id(&self) -> RestaurantId { self.restaurant_id }
    pub fn items(&self) -> &[OrderLine] { &self.items }
    pub fn amounts(&self) -> &OrderAmounts { &self.amounts }
    pub fn coupon_code(&self) -> Option<&CouponCode> { self.coupon_code.as_ref() }
    pub fn payment(&self) -> &Payment { &self.payment }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn delivery(&self) -> &Delivery { &self.delivery }
    pub fn idempotency_key(&self) -> Option<&str> { self.idempotency_key.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn confirm_payment(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Paid)?;
        self.payment.status = PaymentStatus::Paid;
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentConfirmed { order_id: self.id }));
        Ok(())
    }

    pub fn fail_payment(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::PaymentFailed)?;
        self.payment.status = PaymentStatus::Failed;
        Ok(())
    }

    /// Puts a failed payment back to pending so the customer can retry.
    pub fn retry_payment(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::PaymentPending)?;
        self.payment.status = PaymentStatus::RequiresPayment;
        Ok(())
    }

    pub fn accept(&mut self, note: Option<String>) -> Result<(), OrderError> {
        if self.status == OrderStatus::PaymentPending && self.payment.provider != PaymentProvider::Cash {
            return Err(OrderError::PaymentNotSettled);
        }
        self.transition(OrderStatus::Accepted)?;
        self.delivery.append(DeliveryEventStatus::RestaurantAccepted, note);
        Ok(())
    }

    pub fn start_preparing(&mut self) -> Result<(), OrderError> { self.transition(OrderStatus::Preparing) }

    pub fn mark_ready(&mut self) -> Result<(), OrderError> { self.transition(OrderStatus::ReadyForPickup) }

    /// Records a courier assignment. Does not move `status`.
    pub fn assign_driver(&mut self, note: Option<String>) -> Result<(), OrderError> {
        self.require_delivery()?;
        if !matches!(self.status, OrderStatus::Accepted | OrderStatus::Preparing | OrderStatus::ReadyForPickup) {
            return Err(OrderError::EventNotAllowed { status: self.status, event: DeliveryEventStatus::DriverAssigned });
        }
        if self.delivery.has_event(DeliveryEventStatus::DriverAssigned) {
            return Err(OrderError::EventNotAllowed { status: self.status, event: DeliveryEventStatus::DriverAssigned });
        }
        self.delivery.append(DeliveryEventStatus::DriverAssigned, note);
        self.touch();
        Ok(())
    }

    pub fn pick_up(&mut self, note: Option<String>) -> Result<(), OrderError> {
        self.require_delivery()?;
        if !self.delivery.has_event(DeliveryEventStatus::DriverAssigned) {
            return Err(OrderError::EventNotAllowed { status: self.status, event: DeliveryEventStatus::OrderPickedUp });
        }
        self.transition(OrderStatus::OutForDelivery)?;
        self.delivery.append(DeliveryEventStatus::OrderPickedUp, note);
        Ok(())
    }

    /// Delivery orders complete from `out_for_delivery`, pickup orders from `ready_for_pickup`.
    /// Cash is considered collected on completion.
    pub fn deliver(&mut self, note: Option<String>) -> Result<(), OrderError> {
        let required = match self.delivery.method {
            DeliveryMethod::Delivery => OrderStatus::OutForDelivery,
            DeliveryMethod::Pickup => OrderStatus::ReadyForPickup,
        };
        if self.status != required {
            return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Delivered });
        }
        self.transition(OrderStatus::Delivered)?;
        if self.payment.provider == PaymentProvider::Cash && self.payment.status == PaymentStatus::RequiresPayment {
            self.payment.status = PaymentStatus::Paid;
        }
        self.delivery.append(DeliveryEventStatus::OrderDelivered, note);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> { self.transition(OrderStatus::Canceled) }

    pub fn refund(&mut self) -> Result<(), OrderError> {
        if self.payment.status != PaymentStatus::Paid { return Err(OrderError::NothingToRefund); }
        self.transition(OrderStatus::Refunded)?;
        self.payment.status = PaymentStatus::Refunded;
        Ok(())
    }

    /// Guard for deletion. Records the deletion event when allowed.
    pub fn mark_deleted(&mut self) -> Result<(), OrderError> {
        if !self.status.is_deletable() { return Err(OrderError::NotDeletable(self.status)); }
        self.raise_event(DomainEvent::Order(OrderEvent::Deleted { order_id: self.id }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn transition(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        let from = self.status;
        if !from.can_transition_to(to) { return Err(OrderError::InvalidTransition { from, to }); }
        self.status = to;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to }));
        Ok(())
    }

    fn require_delivery(&self) -> Result<(), OrderError> {
        if self.delivery.method == DeliveryMethod::Pickup { return Err(OrderError::PickupOrder); }
        Ok(())
    }

    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Your cart is empty. Cannot create an order.")]
    NoItems,
    #[error("Cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Cannot delete an order with status: {0}")]
    NotDeletable(OrderStatus),
    #[error("Card payment has not been settled")]
    PaymentNotSettled,
    #[error("Cannot record {event:?} while order is {status}")]
    EventNotAllowed { status: OrderStatus, event: DeliveryEventStatus },
    #[error("Pickup orders have no courier")]
    PickupOrder,
    #[error("Order has no settled payment to refund")]
    NothingToRefund,
    #[error("Payment Intent ID is required for card payments.")]
    PaymentIntentRequired,
    #[error("Payment has not been confirmed by the gateway")]
    PaymentNotConfirmed,
    #[error("Payment intent {0} already paid for another order")]
    PaymentIntentAlreadyUsed(String),
    #[error("Payment intent covers {paid} but the order total is {expected}")]
    PaymentAmountMismatch { expected: Money, paid: Money },
    #[error("Total must be a positive amount.")]
    NonPositiveTotal,
    #[error("Order not found")]
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> OrderLine {
        OrderLine {
            product_id: ProductId::new(), name: "Margherita".into(), category: "pizza".into(),
            unit_price: Money::from_minor(3200), quantity: Quantity::new(2).unwrap(),
        }
    }

    fn place(payment: PaymentSetup, method: DeliveryMethod) -> Order {
        Order::place(PlaceOrder {
            user_id: UserId::new(), restaurant_id: RestaurantId::new(), items: vec![line()],
            amounts: OrderAmounts::default(), coupon: None, payment, delivery_method: method,
            address: Address::default(), eta_minutes: Some(30), special_instructions: Some("ring twice".into()),
            idempotency_key: None,
        })
        .unwrap()
    }

    fn card() -> PaymentSetup { PaymentSetup::ConfirmedCard { intent_id: "pi_123".into() } }

    #[test]
    fn test_cash_order_starts_pending() {
        let order = place(PaymentSetup::Cash, DeliveryMethod::Delivery);
        assert_eq!(order.status(), OrderStatus::PaymentPending);
        assert_eq!(order.payment().status, PaymentStatus::RequiresPayment);
        assert_eq!(order.payment().provider, PaymentProvider::Cash);
        let events = order.delivery().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, DeliveryEventStatus::OrderPlaced);
        assert_eq!(events[0].note.as_deref(), Some("ring twice"));
    }

    #[test]
    fn test_confirmed_card_order_starts_paid() {
        let mut order = place(card(), DeliveryMethod::Delivery);
        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(order.payment().status, PaymentStatus::Paid);
        assert_eq!(order.payment().intent_id.as_deref(), Some("pi_123"));
        assert!(matches!(order.take_events().as_slice(), [DomainEvent::Order(OrderEvent::Placed { .. })]));
    }

    #[test]
    fn test_empty_order_rejected() {
        let err = Order::place(PlaceOrder {
            user_id: UserId::new(), restaurant_id: RestaurantId::new(), items: vec![], amounts: OrderAmounts::default(),
            coupon: None, payment: PaymentSetup::Cash, delivery_method: DeliveryMethod::Pickup, address: Address::default(),
            eta_minutes: None, special_instructions: None, idempotency_key: None,
        });
        assert!(matches!(err, Err(OrderError::NoItems)));
    }

    #[test]
    fn test_full_delivery_flow_appends_log() {
        let mut order = place(card(), DeliveryMethod::Delivery);
        order.accept(None).unwrap();
        order.start_preparing().unwrap();
        order.assign_driver(Some("courier 7".into())).unwrap();
        order.mark_ready().unwrap();
        order.pick_up(None).unwrap();
        order.deliver(None).unwrap();

        assert_eq!(order.status(), OrderStatus::Delivered);
        let log: Vec<_> = order.delivery().events().iter().map(|e| e.status).collect();
        assert_eq!(log, vec![
            DeliveryEventStatus::OrderPlaced,
            DeliveryEventStatus::RestaurantAccepted,
            DeliveryEventStatus::DriverAssigned,
            DeliveryEventStatus::OrderPickedUp,
            DeliveryEventStatus::OrderDelivered,
        ]);
        assert!(order.delivery().events().windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn test_cash_collected_on_delivery() {
        let mut order = place(PaymentSetup::Cash, DeliveryMethod::Pickup);
        order.accept(None).unwrap();
        order.start_preparing().unwrap();
        order.mark_ready().unwrap();
        assert_eq!(order.pick_up(None), Err(OrderError::PickupOrder));
        order.deliver(None).unwrap();
        assert_eq!(order.payment().status, PaymentStatus::Paid);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut order = place(PaymentSetup::Cash, DeliveryMethod::Delivery);
        assert_eq!(
            order.deliver(None),
            Err(OrderError::InvalidTransition { from: OrderStatus::PaymentPending, to: OrderStatus::Delivered })
        );
        assert!(matches!(order.start_preparing(), Err(OrderError::InvalidTransition { .. })));
        assert_eq!(order.status(), OrderStatus::PaymentPending);
        assert_eq!(order.delivery().events().len(), 1);
    }

    #[test]
    fn test_payment_failure_and_retry() {
        let mut order = place(PaymentSetup::Cash, DeliveryMethod::Delivery);
        order.fail_payment().unwrap();
        assert_eq!(order.payment().status, PaymentStatus::Failed);
        order.retry_payment().unwrap();
        order.confirm_payment().unwrap();
        assert_eq!(order.status(), OrderStatus::Paid);
    }

    #[test]
    fn test_delete_guard() {
        let mut pending = place(PaymentSetup::Cash, DeliveryMethod::Delivery);
        assert!(pending.mark_deleted().is_ok());

        let mut paid = place(card(), DeliveryMethod::Delivery);
        assert_eq!(paid.mark_deleted(), Err(OrderError::NotDeletable(OrderStatus::Paid)));
        paid.accept(None).unwrap();
        assert_eq!(paid.mark_deleted(), Err(OrderError::NotDeletable(OrderStatus::Accepted)));

        for status in [OrderStatus::Created, OrderStatus::PaymentPending] {
            assert!(status.is_deletable());
        }
        for status in [OrderStatus::Paid, OrderStatus::Accepted, OrderStatus::Preparing, OrderStatus::Delivered, OrderStatus::Refunded] {
            assert!(!status.is_deletable());
        }
    }

    #[test]
    fn test_refund_requires_settled_payment() {
        let mut cash = place(PaymentSetup::Cash, DeliveryMethod::Delivery);
        cash.cancel().unwrap();
        assert_eq!(cash.refund(), Err(OrderError::NothingToRefund));

        let mut paid = place(card(), DeliveryMethod::Delivery);
        paid.cancel().unwrap();
        paid.refund().unwrap();
        assert_eq!(paid.status(), OrderStatus::Refunded);
        assert_eq!(paid.payment().status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_driver_assigned_once() {
        let mut order = place(card(), DeliveryMethod::Delivery);
        assert!(matches!(order.assign_driver(None), Err(OrderError::EventNotAllowed { .. })));
        order.accept(None).unwrap();
        order.assign_driver(None).unwrap();
        assert!(matches!(order.assign_driver(None), Err(OrderError::EventNotAllowed { .. })));
    }
}
