//! Cart endpoints.
//!
//! `/stats` and `/user/{user_id}/active` are registered as static segments
//! so they never collide with the `/{id}` capture.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::{created, ok, paginated, with_message};
use crate::error::Result;
use crate::services::CartService;
use crate::services::carts::{CartDraft, CartItemDraft, CartListParams, DiscountRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/stats", get(stats))
        .route("/user/{user_id}/active", get(active_for_user))
        .route("/{id}", get(show).delete(abandon))
        .route("/{id}/items", post(add_item))
        .route("/{id}/items/{product_id}/{variant_id}", axum::routing::delete(remove_item))
        .route("/{id}/clear", post(clear))
        .route("/{id}/discount", post(apply_discount))
}

/// `GET /api/carts`
async fn list(
    State(state): State<AppState>,
    Query(params): Query<CartListParams>,
) -> Result<Response> {
    let page = CartService::new(state.store()).list(&params).await?;
    Ok(paginated(page))
}

/// `POST /api/carts`
async fn create(State(state): State<AppState>, Json(draft): Json<CartDraft>) -> Result<Response> {
    let cart = CartService::new(state.store()).create(draft).await?;
    Ok(created("Cart created successfully", cart))
}

/// `GET /api/carts/stats`
async fn stats(State(state): State<AppState>) -> Result<Response> {
    let stats = CartService::new(state.store()).stats().await?;
    Ok(ok(stats))
}

/// `GET /api/carts/user/{user_id}/active`
async fn active_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response> {
    let cart = CartService::new(state.store()).active_for_user(&user_id).await?;
    Ok(ok(cart))
}

/// `GET /api/carts/{id}`
async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let cart = CartService::new(state.store()).get(&id).await?;
    Ok(ok(cart))
}

/// `DELETE /api/carts/{id}` - soft delete; the cart is kept as abandoned.
async fn abandon(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let cart = CartService::new(state.store()).abandon(&id).await?;
    Ok(with_message("Cart deleted successfully", cart))
}

/// `POST /api/carts/{id}/items`
async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<CartItemDraft>,
) -> Result<Response> {
    let cart = CartService::new(state.store()).add_item(&id, draft).await?;
    Ok(with_message("Item added to cart successfully", cart))
}

/// `DELETE /api/carts/{id}/items/{product_id}/{variant_id}`
async fn remove_item(
    State(state): State<AppState>,
    Path((id, product_id, variant_id)): Path<(String, String, String)>,
) -> Result<Response> {
    let cart = CartService::new(state.store())
        .remove_item(&id, &product_id, &variant_id)
        .await?;
    Ok(with_message("Item removed from cart successfully", cart))
}

/// `POST /api/carts/{id}/clear`
async fn clear(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let cart = CartService::new(state.store()).clear(&id).await?;
    Ok(with_message("Cart cleared successfully", cart))
}

/// `POST /api/carts/{id}/discount`
async fn apply_discount(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DiscountRequest>,
) -> Result<Response> {
    let cart = CartService::new(state.store()).apply_discount(&id, body).await?;
    Ok(with_message("Discount applied successfully", cart))
}
