//! Shipment endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::{created, message_only, ok, paginated, with_message};
use crate::error::Result;
use crate::services::ShipmentService;
use crate::services::shipments::{
    DeliveryRequest, EventRequest, ShipmentDraft, ShipmentListParams, ShipmentUpdate,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/tracking/{tracking_number}", get(by_tracking_number))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/tracking", get(tracking))
        .route("/{id}/events", post(add_event))
        .route("/{id}/deliver", post(deliver))
}

/// `GET /api/shipments`
async fn list(
    State(state): State<AppState>,
    Query(params): Query<ShipmentListParams>,
) -> Result<Response> {
    let page = ShipmentService::new(state.store()).list(&params).await?;
    Ok(paginated(page))
}

/// `POST /api/shipments`
async fn create(
    State(state): State<AppState>,
    Json(draft): Json<ShipmentDraft>,
) -> Result<Response> {
    let shipment = ShipmentService::new(state.store()).create(draft).await?;
    Ok(created("Shipment created successfully", shipment))
}

/// `GET /api/shipments/tracking/{tracking_number}`
async fn by_tracking_number(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> Result<Response> {
    let shipment = ShipmentService::new(state.store())
        .by_tracking_number(&tracking_number)
        .await?;
    Ok(ok(shipment))
}

/// `GET /api/shipments/{id}`
async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let shipment = ShipmentService::new(state.store()).get(&id).await?;
    Ok(ok(shipment))
}

/// `PUT /api/shipments/{id}`
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ShipmentUpdate>,
) -> Result<Response> {
    let shipment = ShipmentService::new(state.store()).update(&id, body).await?;
    Ok(with_message("Shipment updated successfully", shipment))
}

/// `DELETE /api/shipments/{id}`
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    ShipmentService::new(state.store()).delete(&id).await?;
    Ok(message_only("Shipment deleted successfully"))
}

/// `GET /api/shipments/{id}/tracking`
async fn tracking(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let view = ShipmentService::new(state.store()).tracking(&id).await?;
    Ok(ok(view))
}

/// `POST /api/shipments/{id}/events`
async fn add_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<EventRequest>,
) -> Result<Response> {
    let shipment = ShipmentService::new(state.store())
        .add_tracking_event(&id, body)
        .await?;
    Ok(with_message("Tracking event added successfully", shipment))
}

/// `POST /api/shipments/{id}/deliver`
async fn deliver(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<DeliveryRequest>>,
) -> Result<Response> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let shipment = ShipmentService::new(state.store())
        .mark_delivered(&id, request)
        .await?;
    Ok(with_message(
        "Shipment marked as delivered successfully",
        shipment,
    ))
}
