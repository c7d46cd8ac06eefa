//! Order endpoints.
//!
//! No create, update or delete here: orders enter through checkout
//! completion and change only via the transition endpoints below.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::{ok, paginated, with_message};
use crate::error::Result;
use crate::services::OrderService;
use crate::services::orders::{
    OrderListParams, RefundRequest, StatusUpdateRequest, TrackingRequest,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/stats", get(stats))
        .route("/number/{order_number}", get(by_number))
        .route("/user/{user_id}", get(for_user))
        .route("/{id}", get(show))
        .route("/{id}/status", patch(update_status))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/tracking", post(add_tracking))
        .route("/{id}/deliver", post(deliver))
        .route("/{id}/refund", post(refund))
}

/// Optional reason carried by the cancel endpoint.
#[derive(Debug, Default, Deserialize)]
struct ReasonBody {
    #[serde(default)]
    reason: Option<String>,
}

/// `GET /api/orders`
async fn list(
    State(state): State<AppState>,
    Query(params): Query<OrderListParams>,
) -> Result<Response> {
    let page = OrderService::new(state.store()).list(&params).await?;
    Ok(paginated(page))
}

/// `GET /api/orders/stats`
async fn stats(State(state): State<AppState>) -> Result<Response> {
    let stats = OrderService::new(state.store()).stats().await?;
    Ok(ok(stats))
}

/// `GET /api/orders/number/{order_number}`
async fn by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Response> {
    let order = OrderService::new(state.store()).by_number(&order_number).await?;
    Ok(ok(order))
}

/// `GET /api/orders/user/{user_id}` - the user's orders, newest first.
async fn for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(mut params): Query<OrderListParams>,
) -> Result<Response> {
    params.user_id = Some(user_id);
    let page = OrderService::new(state.store()).list(&params).await?;
    Ok(paginated(page))
}

/// `GET /api/orders/{id}`
async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let order = OrderService::new(state.store()).get(&id).await?;
    Ok(ok(order))
}

/// `PATCH /api/orders/{id}/status`
async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Response> {
    let order = OrderService::new(state.store()).update_status(&id, body).await?;
    Ok(with_message("Order status updated successfully", order))
}

/// `POST /api/orders/{id}/cancel`
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ReasonBody>>,
) -> Result<Response> {
    let reason = body.and_then(|Json(body)| body.reason);
    let order = OrderService::new(state.store()).cancel(&id, reason).await?;
    Ok(with_message("Order cancelled successfully", order))
}

/// `POST /api/orders/{id}/tracking`
async fn add_tracking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TrackingRequest>,
) -> Result<Response> {
    let order = OrderService::new(state.store()).add_tracking(&id, body).await?;
    Ok(with_message("Tracking number added successfully", order))
}

/// `POST /api/orders/{id}/deliver`
async fn deliver(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let order = OrderService::new(state.store()).mark_delivered(&id).await?;
    Ok(with_message("Order marked as delivered successfully", order))
}

/// `POST /api/orders/{id}/refund`
async fn refund(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RefundRequest>,
) -> Result<Response> {
    let order = OrderService::new(state.store()).process_refund(&id, body).await?;
    Ok(with_message("Refund processed successfully", order))
}
