use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::api::{ApiError, AppState, CurrentUser, ValidJson};
use crate::domain::aggregates::{
    Address, Coupon, CouponDiscount, CouponPatch, CouponStatus, DeliveryPolicy, NewCoupon, Order, OrderStatus, ProductSnapshot, Restaurant,
};
use crate::domain::pricing::DeliveryMethod;
use crate::domain::value_objects::{CouponCode, CouponId, Money, OrderId, Percentage, ProductId, Quantity, RestaurantId, ValidationError};
use crate::ports::{CouponFilter, OrderFilter, PaymentIntent, RestaurantLookup};
use crate::services::{CartView, CheckoutInput, OrderAction, PaymentMethod, Quote, QuoteInput};
use crate::Error;

type ApiResult<T> = Result<T, ApiError>;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "food-delivery" }))
}

// -----------------------------------------------------------------------------
// Cart
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[validate(range(min = 1, max = 999))]
    pub quantity: u32,
}

/// A quantity below one removes the item.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetItemRequest {
    pub product_id: ProductId,
    #[validate(range(max = 999))]
    pub quantity: i64,
}

pub async fn get_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.get_cart(user).await?))
}

pub async fn clear_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.clear(user).await?))
}

pub async fn add_cart_item(State(s): State<AppState>, CurrentUser(user): CurrentUser, ValidJson(req): ValidJson<AddItemRequest>) -> ApiResult<Json<CartView>> {
    let quantity = Quantity::new(req.quantity)?;
    Ok(Json(s.carts.upsert_item(user, req.product_id, quantity).await?))
}

pub async fn set_cart_item(State(s): State<AppState>, CurrentUser(user): CurrentUser, ValidJson(req): ValidJson<SetItemRequest>) -> ApiResult<Json<CartView>> {
    let view = match u32::try_from(req.quantity).ok().and_then(|q| Quantity::new(q).ok()) {
        Some(quantity) => s.carts.set_item_quantity(user, req.product_id, quantity).await?,
        None => s.carts.remove_item(user, req.product_id).await?,
    };
    Ok(Json(view))
}

pub async fn remove_cart_item(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(product_id): Path<String>) -> ApiResult<Json<CartView>> {
    let product_id: ProductId = product_id.parse()?;
    Ok(Json(s.carts.remove_item(user, product_id).await?))
}

// -----------------------------------------------------------------------------
// Coupons
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType { Percent, Fixed }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[validate(length(min = 3, max = 20))]
    pub code: String,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    #[validate(range(min = 1))]
    pub value: u64,
    pub restaurant_id: Option<RestaurantId>,
    pub min_order_amount: Option<Money>,
    #[validate(range(min = 1))]
    pub usage_limit: Option<u32>,
    #[validate(range(min = 1))]
    pub per_user_limit: Option<u32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub status: Option<CouponStatus>,
}

impl CreateCouponRequest {
    fn into_new_coupon(self) -> Result<NewCoupon, ValidationError> {
        let discount = discount_of(self.discount_type, self.value)?;
        let mut new = NewCoupon::new(CouponCode::new(self.code)?, discount);
        new.restaurant_id = self.restaurant_id;
        new.min_order_amount = self.min_order_amount;
        new.usage_limit = self.usage_limit;
        new.per_user_limit = self.per_user_limit;
        new.valid_from = self.valid_from;
        new.valid_until = self.valid_until;
        new.status = self.status.unwrap_or_default();
        Ok(new)
    }
}

fn discount_of(discount_type: DiscountType, value: u64) -> Result<CouponDiscount, ValidationError> {
    Ok(match discount_type {
        DiscountType::Percent => {
            let percent = u32::try_from(value).map_err(|_| ValidationError::CouponPercentTooLarge(u32::MAX))?;
            CouponDiscount::Percent(percent)
        }
        DiscountType::Fixed => CouponDiscount::Fixed(Money::from_minor(value)),
    })
}

/// Every field is optional; `type` and `value` travel together.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponRequest {
    #[serde(rename = "type")]
    pub discount_type: Option<DiscountType>,
    #[validate(range(min = 1))]
    pub value: Option<u64>,
    pub restaurant_id: Option<RestaurantId>,
    pub min_order_amount: Option<Money>,
    #[validate(range(min = 1))]
    pub usage_limit: Option<u32>,
    #[validate(range(min = 1))]
    pub per_user_limit: Option<u32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub status: Option<CouponStatus>,
}

impl UpdateCouponRequest {
    fn into_patch(self) -> ApiResult<CouponPatch> {
        let discount = match (self.discount_type, self.value) {
            (Some(discount_type), Some(value)) => Some(discount_of(discount_type, value)?),
            (None, None) => None,
            _ => return Err(ApiError::InvalidRequest("type and value must be sent together".to_string())),
        };
        Ok(CouponPatch {
            discount,
            restaurant_id: self.restaurant_id,
            min_order_amount: self.min_order_amount,
            usage_limit: self.usage_limit,
            per_user_limit: self.per_user_limit,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            status: self.status,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponListParams {
    pub status: Option<CouponStatus>,
    pub restaurant_id: Option<RestaurantId>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub cart_amount: Money,
    pub restaurant_id: RestaurantId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    pub coupon: Coupon,
    pub discount: Money,
}

pub async fn create_coupon(State(s): State<AppState>, ValidJson(req): ValidJson<CreateCouponRequest>) -> ApiResult<(StatusCode, Json<Coupon>)> {
    let coupon = s.coupons.create(req.into_new_coupon()?).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

pub async fn list_coupons(State(s): State<AppState>, Query(p): Query<CouponListParams>) -> ApiResult<Json<Vec<Coupon>>> {
    let filter = CouponFilter { status: p.status, restaurant_id: p.restaurant_id };
    Ok(Json(s.coupons.list(filter).await?))
}

pub async fn validate_coupon(State(s): State<AppState>, CurrentUser(user): CurrentUser, ValidJson(req): ValidJson<ValidateCouponRequest>) -> ApiResult<Json<ValidateCouponResponse>> {
    let coupon = s.coupons.validate(&req.code, req.cart_amount, req.restaurant_id, Some(user)).await?;
    let discount = coupon.discount().discount_for(req.cart_amount);
    Ok(Json(ValidateCouponResponse { coupon, discount }))
}

pub async fn update_coupon(State(s): State<AppState>, Path(id): Path<String>, ValidJson(req): ValidJson<UpdateCouponRequest>) -> ApiResult<Json<Coupon>> {
    let id: CouponId = id.parse()?;
    Ok(Json(s.coupons.update(id, req.into_patch()?).await?))
}

pub async fn deactivate_coupon(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Coupon>> {
    let id: CouponId = id.parse()?;
    Ok(Json(s.coupons.deactivate(id).await?))
}

pub async fn hard_delete_coupon(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id: CouponId = id.parse()?;
    s.coupons.hard_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -----------------------------------------------------------------------------
// Orders
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub tip_percentage: u32,
    #[validate(length(max = 64))]
    pub coupon_code: Option<String>,
}

impl QuoteRequest {
    fn into_input(self) -> Result<QuoteInput, ValidationError> {
        Ok(QuoteInput {
            delivery_method: self.delivery_method,
            tip: Percentage::new(self.tip_percentage)?,
            coupon_code: self.coupon_code,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub postal_code: String,
    #[validate(length(max = 200))]
    pub details: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub tip_percentage: u32,
    #[validate(length(max = 64))]
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, max = 255))]
    pub payment_intent_id: Option<String>,
    #[validate]
    pub address: Option<AddressRequest>,
    #[validate(length(max = 500))]
    pub special_instructions: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: Option<String>,
}

impl PlaceOrderRequest {
    fn into_input(self) -> Result<CheckoutInput, ApiError> {
        let address = match (self.delivery_method, self.address) {
            (_, Some(a)) => Address { street: a.street, city: a.city, postal_code: a.postal_code, details: a.details },
            (DeliveryMethod::Pickup, None) => Address::default(),
            (DeliveryMethod::Delivery, None) => {
                return Err(ApiError::InvalidRequest("address is required for delivery orders".to_string()))
            }
        };
        Ok(CheckoutInput {
            quote: QuoteInput {
                delivery_method: self.delivery_method,
                tip: Percentage::new(self.tip_percentage)?,
                coupon_code: self.coupon_code,
            },
            payment_method: self.payment_method,
            payment_intent_id: self.payment_intent_id,
            address,
            special_instructions: self.special_instructions,
            idempotency_key: self.idempotency_key,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListParams {
    pub status: Option<OrderStatus>,
    pub restaurant_id: Option<RestaurantId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransitionRequest {
    pub action: OrderAction,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

pub async fn quote(State(s): State<AppState>, CurrentUser(user): CurrentUser, ValidJson(req): ValidJson<QuoteRequest>) -> ApiResult<Json<Quote>> {
    Ok(Json(s.orders.quote(user, &req.into_input()?).await?))
}

pub async fn create_payment_intent(State(s): State<AppState>, CurrentUser(user): CurrentUser, ValidJson(req): ValidJson<QuoteRequest>) -> ApiResult<Json<PaymentIntent>> {
    Ok(Json(s.orders.create_payment_intent(user, &req.into_input()?).await?))
}

pub async fn place_order(State(s): State<AppState>, CurrentUser(user): CurrentUser, ValidJson(req): ValidJson<PlaceOrderRequest>) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = s.orders.place_order(user, req.into_input()?).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(State(s): State<AppState>, CurrentUser(user): CurrentUser, Query(p): Query<OrderListParams>) -> ApiResult<Json<Vec<Order>>> {
    let filter = OrderFilter { status: p.status, restaurant_id: p.restaurant_id };
    Ok(Json(s.orders.find_all(user, filter).await?))
}

pub async fn latest_order(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.find_latest(user).await?))
}

pub async fn get_order(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<String>) -> ApiResult<Json<Order>> {
    let id: OrderId = id.parse()?;
    Ok(Json(s.orders.find_by_id(user, id).await?))
}

pub async fn delete_order(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id: OrderId = id.parse()?;
    s.orders.delete(user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn transition_order(State(s): State<AppState>, Path(id): Path<String>, ValidJson(req): ValidJson<TransitionRequest>) -> ApiResult<Json<Order>> {
    let id: OrderId = id.parse()?;
    Ok(Json(s.orders.advance(id, req.action, req.note).await?))
}

// -----------------------------------------------------------------------------
// Catalog
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRestaurantRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    #[serde(default)]
    pub delivery: DeliveryPolicy,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub restaurant_id: RestaurantId,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 60))]
    pub category: String,
    #[validate(range(min = 1))]
    pub price: u64,
    pub discount_price: Option<u64>,
    #[serde(default = "available")]
    pub is_available: bool,
}

fn available() -> bool { true }

pub async fn create_restaurant(State(s): State<AppState>, ValidJson(req): ValidJson<CreateRestaurantRequest>) -> (StatusCode, Json<Restaurant>) {
    let restaurant = Restaurant::new(req.name, req.address, req.delivery);
    s.catalog.insert_restaurant(restaurant.clone()).await;
    tracing::info!(restaurant_id = %restaurant.id, "restaurant registered");
    (StatusCode::CREATED, Json(restaurant))
}

pub async fn create_product(State(s): State<AppState>, ValidJson(req): ValidJson<CreateProductRequest>) -> ApiResult<(StatusCode, Json<ProductSnapshot>)> {
    RestaurantLookup::get_by_id(s.catalog.as_ref(), req.restaurant_id)
        .await
        .map_err(Error::from)?
        .ok_or(Error::RestaurantNotFound)?;
    let product = ProductSnapshot::new(
        ProductId::new(),
        req.restaurant_id,
        req.name,
        req.category,
        Money::from_minor(req.price),
        req.discount_price.map(Money::from_minor),
    )?;
    let product = if req.is_available { product } else { product.unavailable() };
    s.catalog.insert_product(product.clone()).await;
    tracing::info!(product_id = %product.id(), restaurant_id = %req.restaurant_id, "product registered");
    Ok((StatusCode::CREATED, Json(product)))
}
