//! Integration tests for the Copperbay commerce API.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the server; the in-memory backend is enough
//! cargo run -p copperbay-api
//!
//! # Run the ignored tests against it
//! cargo test -p copperbay-integration-tests -- --ignored
//! ```
//!
//! Tests target `COMMERCE_API_URL` (default `http://localhost:3000`) and
//! create their own records with unique skus and emails, so they can run
//! repeatedly against a shared development instance without cleanup.

// Helpers assert and panic on failure; that is the point of them.
#![allow(clippy::missing_panics_doc)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("COMMERCE_API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Plain HTTP client; the API is stateless so no cookie store is needed.
#[must_use]
pub fn client() -> Client {
    Client::new()
}

/// Unique suffix for skus and emails so reruns never collide.
#[must_use]
pub fn unique() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Unwrap the `data` member of a success envelope, panicking with the whole
/// body on failure responses.
#[must_use]
pub fn data(body: Value) -> Value {
    assert_eq!(
        body.get("success").and_then(Value::as_bool),
        Some(true),
        "expected success envelope, got: {body}"
    );
    body.get("data")
        .cloned()
        .expect("success envelope without data")
}

/// A string field, panicking with the document when it is absent.
#[must_use]
pub fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("missing string field `{key}` in {value}"))
        .to_string()
}

/// A monetary field as `f64`; the API serializes decimals as strings.
#[must_use]
pub fn amount(value: &Value, key: &str) -> f64 {
    let field = value
        .get(key)
        .unwrap_or_else(|| panic!("missing field `{key}` in {value}"));
    match field {
        Value::String(s) => s.parse().expect("amount string parses"),
        Value::Number(n) => n.as_f64().expect("amount fits f64"),
        other => panic!("field `{key}` is not monetary: {other}"),
    }
}

/// POST a JSON body and decode the response.
pub async fn post_json(client: &Client, path: &str, body: &Value) -> (StatusCode, Value) {
    let resp = client
        .post(format!("{}{path}", base_url()))
        .json(body)
        .send()
        .await
        .expect("request failed");
    let status = resp.status();
    let body = resp.json().await.expect("response is not JSON");
    (status, body)
}

/// PUT a JSON body and decode the response.
pub async fn put_json(client: &Client, path: &str, body: &Value) -> (StatusCode, Value) {
    let resp = client
        .put(format!("{}{path}", base_url()))
        .json(body)
        .send()
        .await
        .expect("request failed");
    let status = resp.status();
    let body = resp.json().await.expect("response is not JSON");
    (status, body)
}

/// PATCH a JSON body and decode the response.
pub async fn patch_json(client: &Client, path: &str, body: &Value) -> (StatusCode, Value) {
    let resp = client
        .patch(format!("{}{path}", base_url()))
        .json(body)
        .send()
        .await
        .expect("request failed");
    let status = resp.status();
    let body = resp.json().await.expect("response is not JSON");
    (status, body)
}

/// GET a path and decode the response.
pub async fn get_json(client: &Client, path: &str) -> (StatusCode, Value) {
    let resp = client
        .get(format!("{}{path}", base_url()))
        .send()
        .await
        .expect("request failed");
    let status = resp.status();
    let body = resp.json().await.expect("response is not JSON");
    (status, body)
}

/// DELETE a path and decode the response.
pub async fn delete_json(client: &Client, path: &str) -> (StatusCode, Value) {
    let resp = client
        .delete(format!("{}{path}", base_url()))
        .send()
        .await
        .expect("request failed");
    let status = resp.status();
    let body = resp.json().await.expect("response is not JSON");
    (status, body)
}

/// Create a user with one address and one card on file.
pub async fn seed_user(client: &Client) -> Value {
    let email = format!("it-{}@example.com", unique());
    let (status, body) = post_json(
        client,
        "/api/users",
        &json!({
            "name": "Integration Shopper",
            "email": email,
            "addresses": [{
                "recipient": "Integration Shopper",
                "line1": "1 Harbor Way",
                "city": "Kochi",
                "postal_code": "682001",
                "country": "IN",
                "preferred": true
            }],
            "payment_methods": [{
                "type": "card",
                "brand": "visa",
                "last4": "4242",
                "expiry": "12/27",
                "preferred": true
            }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "user create failed: {body}");
    data(body)
}

/// Create a single-variant product at the given unit price.
pub async fn seed_product(client: &Client, price: &str) -> Value {
    let (status, body) = post_json(
        client,
        "/api/products",
        &json!({
            "sku": format!("IT-{}", unique()),
            "name": "Integration Widget",
            "variants": [{
                "variant_id": format!("var_{}", unique()),
                "price": {"currency": "USD", "amount": price},
                "inventory": {"available": 100}
            }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "product create failed: {body}");
    data(body)
}

/// Create a cart for the user and add `quantity` of the product's first
/// variant. Returns the cart as it stands after the add.
pub async fn seed_cart_with_item(
    client: &Client,
    user: &Value,
    product: &Value,
    quantity: u32,
) -> Value {
    let (status, body) = post_json(
        client,
        "/api/carts",
        &json!({"user_id": str_field(user, "id")}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "cart create failed: {body}");
    let cart = data(body);

    let variant = product
        .get("variants")
        .and_then(|v| v.get(0))
        .expect("product has a variant");
    let (status, body) = post_json(
        client,
        &format!("/api/carts/{}/items", str_field(&cart, "id")),
        &json!({
            "product_id": str_field(product, "id"),
            "variant_id": str_field(variant, "variant_id"),
            "quantity": quantity
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "add item failed: {body}");
    data(body)
}

/// Open a checkout for the cart using the user's first address and payment
/// method.
pub async fn seed_checkout(client: &Client, user: &Value, cart: &Value) -> Value {
    let address = user
        .get("addresses")
        .and_then(|a| a.get(0))
        .expect("user has an address");
    let method = user
        .get("payment_methods")
        .and_then(|m| m.get(0))
        .expect("user has a payment method");
    let (status, body) = post_json(
        client,
        "/api/checkouts",
        &json!({
            "user_id": str_field(user, "id"),
            "cart_id": str_field(cart, "id"),
            "shipping_address_id": str_field(address, "address_id"),
            "shipping_method": {
                "id": "ship_standard",
                "label": "Standard",
                "cost": "0.00",
                "carrier_estimated_days": 5
            },
            "payment": {
                "payment_method_id": str_field(method, "payment_id"),
                "gateway": "razorpay"
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "checkout create failed: {body}");
    data(body)
}

/// Run user -> product -> cart -> checkout -> complete and return the placed
/// order document.
pub async fn place_order(client: &Client) -> Value {
    let user = seed_user(client).await;
    let product = seed_product(client, "100.00").await;
    let cart = seed_cart_with_item(client, &user, &product, 2).await;
    let checkout = seed_checkout(client, &user, &cart).await;

    let (status, body) = post_json(
        client,
        &format!("/api/checkouts/{}/complete", str_field(&checkout, "id")),
        &json!({"transaction_id": format!("txn_{}", unique())}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "checkout complete failed: {body}");
    let completed = data(body);
    let order_id = str_field(
        completed.get("order").expect("completion carries an order"),
        "id",
    );

    let (status, body) = get_json(client, &format!("/api/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK, "order fetch failed: {body}");
    data(body)
}
