//! Order service
//!
//! Checkout runs under the cart owner's lock. Order creation and cart clearing happen inside that
//! one critical section. When clearing fails after the order was stored, retrying with the same
//! idempotency key returns the stored order and finishes the clear, so a retry never creates a
//! second order or charges twice.
//!
//! A card order must present a settled payment intent that no other order has used, created for
//! exactly the order total. A coupon use is reserved before the order is stored and given back if
//! the write fails.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use crate::domain::aggregates::{
    Address, AppliedCoupon, Cart, CartError, Coupon, Order, OrderError, OrderLine, PaymentSetup, PlaceOrder,
};
use crate::domain::events::{CouponEvent, DomainEvent};
use crate::domain::pricing::{DeliveryMethod, OrderAmounts, PricedLine, PricingRules};
use crate::domain::value_objects::{OrderId, Percentage, RestaurantId, UserId};
use crate::ports::{EventPublisher, OrderFilter, OrderStore, PaymentGateway, PaymentIntent, RestaurantLookup};
use crate::services::{CartService, CouponService, KeyedLocks};
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { Card, Cash }

/// Choices that affect the price of the current cart.
#[derive(Clone, Debug, Default)]
pub struct QuoteInput {
    pub delivery_method: DeliveryMethod,
    pub tip: Percentage,
    pub coupon_code: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CheckoutInput {
    pub quote: QuoteInput,
    pub payment_method: PaymentMethod,
    pub payment_intent_id: Option<String>,
    pub address: Address,
    pub special_instructions: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Authoritative price of the cart as it stands.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub restaurant_id: RestaurantId,
    pub lines: Vec<OrderLine>,
    pub amounts: OrderAmounts,
    pub coupon: Option<AppliedCoupon>,
    pub estimated_minutes: Option<u32>,
}

/// Lifecycle step requested by the restaurant, courier or payment callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    ConfirmPayment,
    FailPayment,
    RetryPayment,
    Accept,
    StartPreparing,
    MarkReady,
    AssignDriver,
    PickUp,
    Deliver,
    Cancel,
    Refund,
}

pub struct OrderService {
    carts: Arc<CartService>,
    coupons: Arc<CouponService>,
    restaurants: Arc<dyn RestaurantLookup>,
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
    rules: PricingRules,
    currency: String,
    order_locks: KeyedLocks<OrderId>,
}

impl OrderService {
    pub fn new(
        carts: Arc<CartService>,
        coupons: Arc<CouponService>,
        restaurants: Arc<dyn RestaurantLookup>,
        orders: Arc<dyn OrderStore>,
        payments: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            carts, coupons, restaurants, orders, payments, publisher,
            rules: PricingRules::default(), currency: "ron".to_string(), order_locks: KeyedLocks::new(),
        }
    }

    pub fn with_rules(mut self, rules: PricingRules) -> Self { self.rules = rules; self }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self { self.currency = currency.into(); self }

    #[instrument(skip(self))]
    pub async fn quote(&self, owner: UserId, input: &QuoteInput) -> Result<Quote> {
        let cart = self.carts.load(owner).await?;
        Ok(self.price(owner, &cart, input).await?.0)
    }

    #[instrument(skip(self))]
    pub async fn create_payment_intent(&self, owner: UserId, input: &QuoteInput) -> Result<PaymentIntent> {
        let cart = self.carts.load(owner).await?;
        let (quote, _) = self.price(owner, &cart, input).await?;
        if quote.amounts.total.is_zero() {
            return Err(OrderError::NonPositiveTotal.into());
        }
        let metadata = HashMap::from([
            ("userId".to_string(), owner.to_string()),
            ("restaurantId".to_string(), quote.restaurant_id.to_string()),
        ]);
        let intent = self.payments.create_intent(quote.amounts.total, &self.currency, metadata).await?;
        info!(%owner, intent_id = %intent.intent_id, amount = %intent.amount, "payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self, input), fields(method = ?input.payment_method))]
    pub async fn place_order(&self, owner: UserId, input: CheckoutInput) -> Result<Order> {
        let _guard = self.carts.lock(owner).await;

        if let Some(key) = input.idempotency_key.as_deref() {
            if let Some(existing) = self.orders.find_by_idempotency_key(owner, key).await? {
                let cart = self.carts.load(owner).await?;
                if !cart.is_empty() && cart.updated_at() <= existing.created_at() {
                    self.carts.clear_held(owner).await?;
                }
                info!(order_id = %existing.id(), "order placement replayed");
                return Ok(existing);
            }
        }

        let cart = self.carts.load(owner).await?;
        let (quote, coupon) = self.price(owner, &cart, &input.quote).await?;

        let payment = match input.payment_method {
            PaymentMethod::Cash => PaymentSetup::Cash,
            PaymentMethod::Card => {
                let intent_id = input
                    .payment_intent_id
                    .filter(|id| !id.trim().is_empty())
                    .ok_or(OrderError::PaymentIntentRequired)?;
                if self.orders.find_by_payment_intent(&intent_id).await?.is_some() {
                    warn!(%owner, %intent_id, "payment intent reused");
                    return Err(OrderError::PaymentIntentAlreadyUsed(intent_id).into());
                }
                let confirmation = self.payments.confirm(&intent_id).await?;
                if !confirmation.paid {
                    warn!(%owner, %intent_id, "card payment not confirmed");
                    return Err(OrderError::PaymentNotConfirmed.into());
                }
                if confirmation.amount != quote.amounts.total {
                    warn!(%owner, %intent_id, paid = %confirmation.amount, total = %quote.amounts.total, "payment amount differs from order total");
                    return Err(OrderError::PaymentAmountMismatch { expected: quote.amounts.total, paid: confirmation.amount }.into());
                }
                PaymentSetup::ConfirmedCard { intent_id }
            }
        };

        let mut order = Order::place(PlaceOrder {
            user_id: owner,
            restaurant_id: quote.restaurant_id,
            items: quote.lines,
            amounts: quote.amounts,
            coupon: quote.coupon,
            payment,
            delivery_method: input.quote.delivery_method,
            address: input.address,
            eta_minutes: quote.estimated_minutes,
            special_instructions: input.special_instructions,
            idempotency_key: input.idempotency_key,
        })?;
        let mut events = order.take_events();

        if let Some(coupon) = &coupon {
            if let Err(e) = self.coupons.reserve(coupon.id()).await {
                warn!(%owner, code = %coupon.code(), error = %e, "coupon use could not be reserved");
                return Err(e);
            }
        }
        if let Err(e) = self.orders.create(&order).await {
            if let Some(coupon) = &coupon {
                if let Err(release) = self.coupons.release(coupon.id()).await {
                    warn!(code = %coupon.code(), error = %release, "coupon reservation not released");
                }
            }
            return Err(e.into());
        }
        if let Some(coupon) = &coupon {
            events.push(DomainEvent::Coupon(CouponEvent::Redeemed { code: coupon.code().clone(), order_id: order.id() }));
        }

        self.carts.clear_held(owner).await?;
        info!(order_id = %order.id(), status = %order.status(), total = %order.amounts().total, "order placed");
        self.publish(events).await;
        Ok(order)
    }

    pub async fn find_all(&self, owner: UserId, filter: OrderFilter) -> Result<Vec<Order>> {
        Ok(self.orders.find_all(owner, filter).await?)
    }

    /// Orders belonging to someone else are reported as missing.
    pub async fn find_by_id(&self, owner: UserId, id: OrderId) -> Result<Order> {
        match self.orders.find_by_id(id).await? {
            Some(order) if order.user_id() == owner => Ok(order),
            _ => Err(OrderError::NotFound.into()),
        }
    }

    pub async fn find_latest(&self, owner: UserId) -> Result<Order> {
        Ok(self.orders.find_latest_by_user(owner).await?.ok_or(OrderError::NotFound)?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, owner: UserId, id: OrderId) -> Result<()> {
        let _guard = self.order_locks.lock(&id).await;
        let mut order = self.find_by_id(owner, id).await?;
        if let Err(e) = order.mark_deleted() {
            warn!(order_id = %id, status = %order.status(), "order deletion refused");
            return Err(e.into());
        }
        self.orders.delete(id).await?;
        info!(order_id = %id, "order deleted");
        self.publish(order.take_events()).await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn advance(&self, id: OrderId, action: OrderAction, note: Option<String>) -> Result<Order> {
        let _guard = self.order_locks.lock(&id).await;
        let mut order = self.orders.find_by_id(id).await?.ok_or(OrderError::NotFound)?;
        let from = order.status();
        match action {
            OrderAction::ConfirmPayment => order.confirm_payment(),
            OrderAction::FailPayment => order.fail_payment(),
            OrderAction::RetryPayment => order.retry_payment(),
            OrderAction::Accept => order.accept(note),
            OrderAction::StartPreparing => order.start_preparing(),
            OrderAction::MarkReady => order.mark_ready(),
            OrderAction::AssignDriver => order.assign_driver(note),
            OrderAction::PickUp => order.pick_up(note),
            OrderAction::Deliver => order.deliver(note),
            OrderAction::Cancel => order.cancel(),
            OrderAction::Refund => order.refund(),
        }?;
        self.orders.save(&order).await?;
        info!(order_id = %id, ?action, %from, to = %order.status(), "order advanced");
        self.publish(order.take_events()).await;
        Ok(order)
    }

    async fn price(&self, owner: UserId, cart: &Cart, input: &QuoteInput) -> Result<(Quote, Option<Coupon>)> {
        let restaurant_id = cart.restaurant_id().filter(|_| !cart.is_empty()).ok_or(CartError::EmptyCart)?;
        let restaurant = self.restaurants.get_by_id(restaurant_id).await?.ok_or(Error::RestaurantNotFound)?;
        let resolved = self.carts.priced_lines(cart).await?;
        let priced: Vec<PricedLine> = resolved.iter().map(|(_, line)| *line).collect();
        let method = input.delivery_method;

        let subtotal = self.rules.calculate(&priced, &restaurant.delivery, method, input.tip, None).subtotal;
        let coupon = match input.coupon_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.coupons.validate(code, subtotal, restaurant_id, Some(owner)).await?),
            None => None,
        };
        let applied = coupon.as_ref().map(Coupon::applied);
        let amounts = self.rules.calculate(&priced, &restaurant.delivery, method, input.tip, applied.as_ref());
        debug!(%owner, ?amounts, "cart priced");

        let lines = resolved
            .into_iter()
            .map(|(product, line)| OrderLine {
                product_id: product.id(),
                name: product.name().to_string(),
                category: product.category().to_string(),
                unit_price: line.unit_price(),
                quantity: line.quantity,
            })
            .collect();
        let estimated_minutes = match method {
            DeliveryMethod::Delivery => restaurant.delivery.estimated_minutes,
            DeliveryMethod::Pickup => None,
        };
        Ok((Quote { restaurant_id, lines, amounts, coupon: applied, estimated_minutes }, coupon))
    }

    async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            if let Err(e) = self.publisher.publish(&event).await {
                warn!(subject = event.subject(), error = %e, "domain event not published");
            }
        }
    }
}
