//! Checkout endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::{created, message_only, ok, paginated, with_message};
use crate::error::Result;
use crate::services::CheckoutService;
use crate::services::checkouts::{CheckoutDraft, CheckoutListParams, CompletionRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/cleanup", post(cleanup))
        .route("/{id}", get(show).delete(remove))
        .route("/{id}/complete", post(complete))
        .route("/{id}/fail", post(fail))
        .route("/{id}/cancel", post(cancel))
}

/// Optional reason carried by the fail and cancel endpoints.
#[derive(Debug, Default, Deserialize)]
struct ReasonBody {
    #[serde(default)]
    reason: Option<String>,
}

/// `GET /api/checkouts`
async fn list(
    State(state): State<AppState>,
    Query(params): Query<CheckoutListParams>,
) -> Result<Response> {
    let page = CheckoutService::new(state.store()).list(&params).await?;
    Ok(paginated(page))
}

/// `POST /api/checkouts`
async fn create(
    State(state): State<AppState>,
    Json(draft): Json<CheckoutDraft>,
) -> Result<Response> {
    let checkout = CheckoutService::new(state.store()).create(draft).await?;
    Ok(created("Checkout created successfully", checkout))
}

/// `POST /api/checkouts/cleanup`
async fn cleanup(State(state): State<AppState>) -> Result<Response> {
    let deleted_count = CheckoutService::new(state.store()).cleanup_expired().await?;
    Ok(with_message(
        &format!("Cleaned up {deleted_count} expired checkouts"),
        serde_json::json!({ "deleted_count": deleted_count }),
    ))
}

/// `GET /api/checkouts/{id}`
async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let checkout = CheckoutService::new(state.store()).get(&id).await?;
    Ok(ok(checkout))
}

/// `POST /api/checkouts/{id}/complete`
async fn complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CompletionRequest>>,
) -> Result<Response> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let completed = CheckoutService::new(state.store()).complete(&id, request).await?;
    Ok(with_message("Checkout completed successfully", completed))
}

/// `POST /api/checkouts/{id}/fail`
async fn fail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ReasonBody>>,
) -> Result<Response> {
    let reason = body.and_then(|Json(body)| body.reason);
    let checkout = CheckoutService::new(state.store()).fail(&id, reason).await?;
    Ok(with_message("Checkout marked as failed", checkout))
}

/// `POST /api/checkouts/{id}/cancel`
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ReasonBody>>,
) -> Result<Response> {
    let reason = body.and_then(|Json(body)| body.reason);
    let checkout = CheckoutService::new(state.store()).cancel(&id, reason).await?;
    Ok(with_message("Checkout cancelled successfully", checkout))
}

/// `DELETE /api/checkouts/{id}`
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    CheckoutService::new(state.store()).delete(&id).await?;
    Ok(message_only("Checkout deleted successfully"))
}
