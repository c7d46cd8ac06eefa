//! Shipment endpoints.
//!
//! These tests require a running API server (cargo run -p copperbay-api).

use copperbay_integration_tests::{
    client, data, delete_json, get_json, place_order, post_json, put_json, str_field,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn seed_shipment(client: &reqwest::Client, order: &Value) -> Value {
    let (status, body) = post_json(
        client,
        "/api/shipments",
        &json!({
            "order_id": str_field(order, "id"),
            "carrier": "BlueDart",
            "service_level": "express",
            "cost": "49.00"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "shipment create failed: {body}");
    data(body)
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_shipment_snapshots_order() {
    let client = client();
    let order = place_order(&client).await;
    let shipment = seed_shipment(&client, &order).await;

    assert_eq!(
        str_field(&shipment, "order_number"),
        str_field(&order, "order_number")
    );
    assert_eq!(str_field(&shipment, "status"), "pending");
    assert!(str_field(&shipment, "tracking_number").starts_with("TRK"));

    let items = shipment
        .get("items")
        .and_then(Value::as_array)
        .expect("shipment has items");
    let order_items = order
        .get("items")
        .and_then(Value::as_array)
        .expect("order has items");
    assert_eq!(items.len(), order_items.len());
    assert_eq!(
        shipment
            .get("events")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(0)
    );
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_shipment_scans_feed_the_tracking_view() {
    let client = client();
    let order = place_order(&client).await;
    let shipment = seed_shipment(&client, &order).await;
    let id = str_field(&shipment, "id");

    let (status, body) = post_json(
        &client,
        &format!("/api/shipments/{id}/events"),
        &json!({"status": "in_transit", "location": "Kochi hub"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "event add failed: {body}");
    let updated = data(body);
    // A mid-route scan does not move the shipment's own status
    assert_eq!(str_field(&updated, "status"), "pending");
    assert_eq!(
        updated
            .get("events")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(1)
    );

    // The tracking view reports the latest scan
    let (status, body) = get_json(&client, &format!("/api/shipments/{id}/tracking")).await;
    assert_eq!(status, StatusCode::OK);
    let view = data(body);
    assert_eq!(str_field(&view, "status"), "in_transit");
    assert_eq!(
        str_field(&view, "order_number"),
        str_field(&order, "order_number")
    );

    // Public lookup by tracking number finds the same shipment
    let (status, body) = get_json(
        &client,
        &format!(
            "/api/shipments/tracking/{}",
            str_field(&shipment, "tracking_number")
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_field(&data(body), "id"), id);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_shipment_delivery_advances_the_order() {
    let client = client();
    let order = place_order(&client).await;
    let shipment = seed_shipment(&client, &order).await;
    let id = str_field(&shipment, "id");

    let (status, body) = post_json(
        &client,
        &format!("/api/shipments/{id}/deliver"),
        &json!({"location": "Front desk"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "deliver failed: {body}");
    let delivered = data(body);
    assert_eq!(str_field(&delivered, "status"), "delivered");
    assert!(
        delivered
            .get("actual_delivery")
            .is_some_and(|v| !v.is_null())
    );

    // The parent order follows with exactly one new history entry
    let (status, body) = get_json(
        &client,
        &format!("/api/orders/{}", str_field(&order, "id")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let order = data(body);
    assert_eq!(str_field(&order, "status"), "DELIVERED");
    assert_eq!(
        order
            .get("status_history")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(2)
    );
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_shipment_update_and_delete() {
    let client = client();
    let order = place_order(&client).await;
    let shipment = seed_shipment(&client, &order).await;
    let id = str_field(&shipment, "id");

    let (status, body) = put_json(
        &client,
        &format!("/api/shipments/{id}"),
        &json!({"carrier": "Delhivery", "notes": "Leave at reception"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated = data(body);
    assert_eq!(str_field(&updated, "carrier"), "Delhivery");
    // The order snapshot is not touched by shipment edits
    assert_eq!(
        str_field(&updated, "order_number"),
        str_field(&order, "order_number")
    );

    let (status, body) = delete_json(&client, &format!("/api/shipments/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body.get("message").and_then(Value::as_str),
        Some("Shipment deleted successfully")
    );

    let (status, _) = get_json(&client, &format!("/api/shipments/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_shipment_rejects_unknown_order() {
    let client = client();

    let (status, body) = post_json(
        &client,
        "/api/shipments",
        &json!({"order_id": "order_does_not_exist", "carrier": "BlueDart"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "ghost order accepted: {body}");
    assert_eq!(
        body.get("message").and_then(Value::as_str),
        Some("Order not found")
    );
}
