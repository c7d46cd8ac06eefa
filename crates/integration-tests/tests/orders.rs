//! Order endpoints. Orders only come from completed checkouts, so every
//! test starts by running the purchase flow.
//!
//! These tests require a running API server (cargo run -p copperbay-api).

use copperbay_integration_tests::{
    amount, client, data, get_json, patch_json, place_order, post_json, str_field,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn history_len(order: &Value) -> usize {
    order
        .get("status_history")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_order_status_updates_append_history() {
    let client = client();
    let order = place_order(&client).await;
    let id = str_field(&order, "id");
    assert_eq!(history_len(&order), 1);

    let (status, body) = patch_json(
        &client,
        &format!("/api/orders/{id}/status"),
        &json!({"status": "CONFIRMED", "note": "Payment checked"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "status update failed: {body}");
    let order = data(body);
    assert_eq!(str_field(&order, "status"), "CONFIRMED");
    assert_eq!(history_len(&order), 2);

    // Backward moves are rejected and leave no trace
    let (status, body) = patch_json(
        &client,
        &format!("/api/orders/{id}/status"),
        &json!({"status": "PLACED"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.get("success"), Some(&Value::Bool(false)));

    let (_, body) = get_json(&client, &format!("/api/orders/{id}")).await;
    let order = data(body);
    assert_eq!(str_field(&order, "status"), "CONFIRMED");
    assert_eq!(history_len(&order), 2);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_order_cancel_only_before_fulfillment() {
    let client = client();

    // Shipped orders refuse to cancel, history untouched
    let order = place_order(&client).await;
    let id = str_field(&order, "id");
    let (status, _) = patch_json(
        &client,
        &format!("/api/orders/{id}/status"),
        &json!({"status": "SHIPPED"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &client,
        &format!("/api/orders/{id}/cancel"),
        &json!({"reason": "Too late"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "late cancel accepted: {body}");

    let (_, body) = get_json(&client, &format!("/api/orders/{id}")).await;
    let order = data(body);
    assert_eq!(str_field(&order, "status"), "SHIPPED");
    assert_eq!(history_len(&order), 2);

    // A freshly placed order cancels with exactly one new entry
    let order = place_order(&client).await;
    let id = str_field(&order, "id");
    let (status, body) = post_json(&client, &format!("/api/orders/{id}/cancel"), &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body.get("message").and_then(Value::as_str),
        Some("Order cancelled successfully")
    );
    let order = data(body);
    assert_eq!(str_field(&order, "status"), "CANCELLED");
    assert_eq!(history_len(&order), 2);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_order_tracking_ships_and_delivers() {
    let client = client();
    let order = place_order(&client).await;
    let id = str_field(&order, "id");

    let (status, _) = patch_json(
        &client,
        &format!("/api/orders/{id}/status"),
        &json!({"status": "CONFIRMED"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Tracking on a confirmed order moves it to SHIPPED
    let (status, body) = post_json(
        &client,
        &format!("/api/orders/{id}/tracking"),
        &json!({"tracking_number": "TRK12345", "carrier": "BlueDart"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "tracking failed: {body}");
    let order = data(body);
    assert_eq!(str_field(&order, "status"), "SHIPPED");
    let tracking = order
        .get("shipping")
        .and_then(|s| s.get("tracking"))
        .expect("order carries tracking");
    assert_eq!(
        tracking.get("tracking_number").and_then(Value::as_str),
        Some("TRK12345")
    );

    // Deliver stamps the actual time
    let (status, body) = post_json(&client, &format!("/api/orders/{id}/deliver"), &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let order = data(body);
    assert_eq!(str_field(&order, "status"), "DELIVERED");
    assert!(
        order
            .get("shipping")
            .and_then(|s| s.get("tracking"))
            .and_then(|t| t.get("actual_delivery"))
            .is_some_and(|v| !v.is_null())
    );
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_order_refund_requires_return() {
    let client = client();
    let order = place_order(&client).await;
    let id = str_field(&order, "id");

    // Not refundable while merely placed
    let (status, _) = post_json(
        &client,
        &format!("/api/orders/{id}/refund"),
        &json!({"reason": "Damaged"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Walk the return path, then refund in full
    for step in ["DELIVERED", "RETURN_REQUESTED", "RETURNED"] {
        let (status, body) = patch_json(
            &client,
            &format!("/api/orders/{id}/status"),
            &json!({"status": step}),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "step {step} failed: {body}");
    }

    let (status, body) = post_json(
        &client,
        &format!("/api/orders/{id}/refund"),
        &json!({"reason": "Damaged"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "refund failed: {body}");
    let order = data(body);
    assert_eq!(str_field(&order, "status"), "REFUNDED");
    assert!((amount(&order, "refund_amount") - 200.0).abs() < f64::EPSILON);
    assert_eq!(
        order
            .get("payment")
            .map(|p| str_field(p, "status"))
            .as_deref(),
        Some("refunded")
    );
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_order_lookups_and_stats() {
    let client = client();
    let order = place_order(&client).await;
    let id = str_field(&order, "id");
    let number = str_field(&order, "order_number");
    let user_id = str_field(&order, "user_id");

    let (status, body) = get_json(&client, &format!("/api/orders/number/{number}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_field(&data(body), "id"), id);

    let (status, body) = get_json(&client, &format!("/api/orders/user/{user_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let orders = data(body);
    let listed = orders.as_array().expect("user orders is a list");
    assert!(
        listed
            .iter()
            .any(|o| o.get("id").and_then(Value::as_str) == Some(id.as_str()))
    );

    let (status, body) = get_json(&client, "/api/orders/stats").await;
    assert_eq!(status, StatusCode::OK);
    let stats = data(body);
    assert!(
        stats
            .get("total_orders")
            .and_then(Value::as_u64)
            .is_some_and(|n| n >= 1)
    );
    assert!(
        stats
            .get("by_status")
            .and_then(|m| m.get("PLACED"))
            .and_then(Value::as_u64)
            .is_some_and(|n| n >= 1)
    );
}
