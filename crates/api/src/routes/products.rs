//! Catalog endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};

use super::{created, message_only, ok, paginated, with_message};
use crate::error::Result;
use crate::services::ProductService;
use crate::services::products::{ProductDraft, ProductListParams, ProductUpdate};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/variants", get(variants))
}

/// `GET /api/products`
async fn list(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> Result<Response> {
    let page = ProductService::new(state.store()).list(&params).await?;
    Ok(paginated(page))
}

/// `POST /api/products`
async fn create(State(state): State<AppState>, Json(draft): Json<ProductDraft>) -> Result<Response> {
    let product = ProductService::new(state.store()).create(draft).await?;
    Ok(created("Product created successfully", product))
}

/// `GET /api/products/{id}`
async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let product = ProductService::new(state.store()).get(&id).await?;
    Ok(ok(product))
}

/// `PUT /api/products/{id}`
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ProductUpdate>,
) -> Result<Response> {
    let product = ProductService::new(state.store()).update(&id, body).await?;
    Ok(with_message("Product updated successfully", product))
}

/// `DELETE /api/products/{id}`
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    ProductService::new(state.store()).deactivate(&id).await?;
    Ok(message_only("Product deleted successfully"))
}

/// `GET /api/products/{id}/variants`
async fn variants(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let variants = ProductService::new(state.store()).variants(&id).await?;
    Ok(ok(variants))
}
