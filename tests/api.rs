use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use food_delivery::api::{router, AppState, USER_HEADER};
use food_delivery::domain::pricing::PricingRules;
use food_delivery::domain::value_objects::UserId;
use food_delivery::store::{MockPaymentGateway, RecordingPublisher};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let state = AppState::in_memory(
        PricingRules::default(),
        "ron",
        Arc::new(MockPaymentGateway::new(true)),
        Arc::new(RecordingPublisher::new()),
    );
    router(state)
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<UserId>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        req = req.header(USER_HEADER, user.to_string());
    }
    let req = match body {
        Some(body) => req.header("content-type", "application/json").body(Body::from(body.to_string())).unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

struct Menu {
    restaurant: String,
    pizza: String,
    cola: String,
}

async fn seed_menu(app: &Router) -> Menu {
    let (status, restaurant) = send(app, "POST", "/api/v1/restaurants", None, Some(json!({
        "name": "Pizzeria Roma",
        "address": "Bd. Unirii 5",
        "delivery": { "minOrder": 1500, "fee": 500, "estimatedMinutes": 35 }
    }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let restaurant = restaurant["id"].as_str().unwrap().to_string();

    let (_, pizza) = send(app, "POST", "/api/v1/products", None, Some(json!({
        "restaurantId": restaurant, "name": "Pizza", "category": "pizza", "price": 1999, "discountPrice": 1499
    }))).await;
    let (_, cola) = send(app, "POST", "/api/v1/products", None, Some(json!({
        "restaurantId": restaurant, "name": "Cola", "category": "drinks", "price": 699
    }))).await;

    Menu { restaurant, pizza: pizza["id"].as_str().unwrap().to_string(), cola: cola["id"].as_str().unwrap().to_string() }
}

async fn fill_cart(app: &Router, user: UserId, menu: &Menu) {
    let (status, _) = send(app, "POST", "/api/v1/cart/items", Some(user), Some(json!({ "productId": menu.pizza, "quantity": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, cart) = send(app, "POST", "/api/v1/cart/items", Some(user), Some(json!({ "productId": menu.cola, "quantity": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["subtotal"], 2897);
}

fn address() -> Value {
    json!({ "street": "Str. Florilor 3", "city": "Cluj", "postalCode": "400000" })
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_cart_requires_user_header() {
    let (status, body) = send(&app(), "GET", "/api/v1/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_checkout_and_lifecycle() {
    let app = app();
    let menu = seed_menu(&app).await;
    let user = UserId::new();
    fill_cart(&app, user, &menu).await;

    let (status, quote) = send(&app, "POST", "/api/v1/orders/quote", Some(user), Some(json!({ "tipPercentage": 15 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["amounts"]["tax"], 261);
    assert_eq!(quote["amounts"]["tipAmount"], 434);
    assert_eq!(quote["amounts"]["total"], 4092);

    let (status, order) = send(&app, "POST", "/api/v1/orders", Some(user), Some(json!({
        "tipPercentage": 15, "paymentMethod": "cash", "address": address(), "specialInstructions": "no onions"
    }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "payment_pending");
    assert_eq!(order["payment"]["status"], "requires_payment");
    assert_eq!(order["amounts"]["total"], 4092);
    assert_eq!(order["delivery"]["events"][0]["status"], "order_placed");
    assert_eq!(order["delivery"]["events"][0]["note"], "no onions");
    let id = order["id"].as_str().unwrap().to_string();

    let (_, cart) = send(&app, "GET", "/api/v1/cart", Some(user), None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
    assert_eq!(cart["restaurantId"], Value::Null);

    let (_, latest) = send(&app, "GET", "/api/v1/orders/latest", Some(user), None).await;
    assert_eq!(latest["id"], id.as_str());

    let uri = format!("/api/v1/orders/{id}/transitions");
    for action in ["accept", "start_preparing", "assign_driver", "mark_ready", "pick_up", "deliver"] {
        let (status, body) = send(&app, "POST", &uri, None, Some(json!({ "action": action }))).await;
        assert_eq!(status, StatusCode::OK, "{action}: {body}");
    }

    let (status, body) = send(&app, "POST", &uri, None, Some(json!({ "action": "accept" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_transition");

    let (status, body) = send(&app, "DELETE", &format!("/api/v1/orders/{id}"), Some(user), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "order_not_deletable");
    assert_eq!(body["error"], "Cannot delete an order with status: delivered");
}

#[tokio::test]
async fn test_pending_order_can_be_deleted() {
    let app = app();
    let menu = seed_menu(&app).await;
    let user = UserId::new();
    fill_cart(&app, user, &menu).await;
    let (_, order) = send(&app, "POST", "/api/v1/orders", Some(user), Some(json!({ "paymentMethod": "cash", "deliveryMethod": "pickup" }))).await;
    let uri = format!("/api/v1/orders/{}", order["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, Some(UserId::new()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &uri, Some(user), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, "GET", &uri, Some(user), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "order_not_found");
}

#[tokio::test]
async fn test_card_checkout_through_payment_intent() {
    let app = app();
    let menu = seed_menu(&app).await;
    let user = UserId::new();
    fill_cart(&app, user, &menu).await;

    let (status, body) = send(&app, "POST", "/api/v1/orders", Some(user), Some(json!({ "paymentMethod": "card", "address": address() }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "payment_intent_required");

    let (status, intent) = send(&app, "POST", "/api/v1/orders/payment-intent", Some(user), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent["amount"], 3658);
    assert!(intent["clientSecret"].as_str().unwrap().starts_with(intent["intentId"].as_str().unwrap()));

    let (status, order) = send(&app, "POST", "/api/v1/orders", Some(user), Some(json!({
        "paymentMethod": "card", "paymentIntentId": intent["intentId"], "address": address(), "idempotencyKey": "abc"
    }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "paid");
    assert_eq!(order["payment"]["provider"], "stripe");

    fill_cart(&app, user, &menu).await;
    let (status, body) = send(&app, "POST", "/api/v1/orders", Some(user), Some(json!({
        "paymentMethod": "card", "paymentIntentId": intent["intentId"], "address": address()
    }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "payment_intent_already_used");

    let (_, intent) = send(&app, "POST", "/api/v1/orders/payment-intent", Some(user), Some(json!({}))).await;
    send(&app, "POST", "/api/v1/cart/items", Some(user), Some(json!({ "productId": menu.pizza, "quantity": 1 }))).await;
    let (status, body) = send(&app, "POST", "/api/v1/orders", Some(user), Some(json!({
        "paymentMethod": "card", "paymentIntentId": intent["intentId"], "address": address()
    }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "payment_amount_mismatch");
}

#[tokio::test]
async fn test_cart_conflicts_and_quantity_updates() {
    let app = app();
    let menu = seed_menu(&app).await;
    let other = seed_menu(&app).await;
    let user = UserId::new();
    fill_cart(&app, user, &menu).await;

    let (status, body) = send(&app, "POST", "/api/v1/cart/items", Some(user), Some(json!({ "productId": other.pizza, "quantity": 1 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "multi_restaurant_conflict");

    let (status, body) = send(&app, "POST", "/api/v1/cart/items", Some(user), Some(json!({ "productId": menu.pizza, "quantity": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (_, cart) = send(&app, "PUT", "/api/v1/cart/items", Some(user), Some(json!({ "productId": menu.cola, "quantity": 0 }))).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    let (_, cart) = send(&app, "PUT", "/api/v1/cart/items", Some(user), Some(json!({ "productId": menu.pizza, "quantity": 3 }))).await;
    assert_eq!(cart["subtotal"], 1499 * 3);
    assert_eq!(cart["restaurantId"], menu.restaurant.as_str());

    let (status, body) = send(&app, "DELETE", "/api/v1/cart/items/not-a-uuid", Some(user), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "malformed_id");
}

#[tokio::test]
async fn test_coupon_admin_and_validation() {
    let app = app();
    let menu = seed_menu(&app).await;
    let user = UserId::new();

    let (status, coupon) = send(&app, "POST", "/api/v1/coupons", None, Some(json!({
        "code": "pizza10", "type": "fixed", "value": 1000, "restaurantId": menu.restaurant, "minOrderAmount": 2000
    }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(coupon["code"], "PIZZA10");

    let (status, body) = send(&app, "POST", "/api/v1/coupons", None, Some(json!({ "code": "PIZZA10", "type": "percent", "value": 5 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "duplicate_coupon");

    let validate = |amount: u64| json!({ "code": "pizza10", "cartAmount": amount, "restaurantId": menu.restaurant });
    let (status, body) = send(&app, "POST", "/api/v1/coupons/validate", Some(user), Some(validate(1500))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "coupon_min_order_not_met");

    let (status, body) = send(&app, "POST", "/api/v1/coupons/validate", Some(user), Some(validate(2500))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["discount"], 1000);

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/coupons/{}", coupon["id"].as_str().unwrap()), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "POST", "/api/v1/coupons/validate", Some(user), Some(validate(2500))).await;
    assert_eq!(body["code"], "coupon_not_active");

    let (_, list) = send(&app, "GET", "/api/v1/coupons?status=inactive", None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_coupon_update_and_hard_delete() {
    let app = app();
    let menu = seed_menu(&app).await;
    let user = UserId::new();
    let (_, coupon) = send(&app, "POST", "/api/v1/coupons", None, Some(json!({ "code": "LUNCH", "type": "percent", "value": 10 }))).await;
    let uri = format!("/api/v1/coupons/{}", coupon["id"].as_str().unwrap());

    let (status, body) = send(&app, "PATCH", &uri, None, Some(json!({ "type": "percent", "value": 150 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "coupon_percent_too_large");
    let (status, body) = send(&app, "PATCH", &uri, None, Some(json!({ "value": 20 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (status, updated) = send(&app, "PATCH", &uri, None, Some(json!({ "type": "fixed", "value": 700, "minOrderAmount": 2000 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["code"], "LUNCH");
    assert_eq!(updated["type"], "fixed");
    assert_eq!(updated["value"], 700);

    let validate = json!({ "code": "lunch", "cartAmount": 2500, "restaurantId": menu.restaurant });
    let (_, body) = send(&app, "POST", "/api/v1/coupons/validate", Some(user), Some(validate.clone())).await;
    assert_eq!(body["discount"], 700);

    let (status, _) = send(&app, "DELETE", &format!("{uri}/hard"), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, "DELETE", &format!("{uri}/hard"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "coupon_not_found");
    let (_, body) = send(&app, "POST", "/api/v1/coupons/validate", Some(user), Some(validate)).await;
    assert_eq!(body["code"], "coupon_not_found");
}

#[tokio::test]
async fn test_delivery_order_needs_address() {
    let app = app();
    let menu = seed_menu(&app).await;
    let user = UserId::new();
    fill_cart(&app, user, &menu).await;
    let (status, body) = send(&app, "POST", "/api/v1/orders", Some(user), Some(json!({ "paymentMethod": "cash" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

#[tokio::test]
async fn test_empty_cart_cannot_be_checked_out() {
    let (status, body) = send(&app(), "POST", "/api/v1/orders/quote", Some(UserId::new()), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "empty_cart");
}
