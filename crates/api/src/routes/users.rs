//! Customer endpoints: profile, address book, wallet and loyalty.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use copperbay_core::AddressId;

use super::{created, message_only, ok, paginated, with_message};
use crate::error::Result;
use crate::services::UserService;
use crate::services::users::{
    AddressDraft, LoyaltyAdjustment, PaymentMethodDraft, UserDraft, UserListParams, UserUpdate,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/addresses", post(add_address))
        .route(
            "/{id}/addresses/{address_id}",
            put(update_address).delete(remove_address),
        )
        .route("/{id}/payment-methods", post(add_payment_method))
        .route("/{id}/loyalty-points", post(adjust_loyalty))
}

/// `GET /api/users`
async fn list(
    State(state): State<AppState>,
    Query(params): Query<UserListParams>,
) -> Result<Response> {
    let page = UserService::new(state.store()).list(&params).await?;
    Ok(paginated(page))
}

/// `POST /api/users`
async fn create(State(state): State<AppState>, Json(draft): Json<UserDraft>) -> Result<Response> {
    let user = UserService::new(state.store()).create(draft).await?;
    Ok(created("User created successfully", user))
}

/// `GET /api/users/{id}`
async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let user = UserService::new(state.store()).get(&id).await?;
    Ok(ok(user))
}

/// `PUT /api/users/{id}`
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UserUpdate>,
) -> Result<Response> {
    let user = UserService::new(state.store()).update(&id, body).await?;
    Ok(with_message("User updated successfully", user))
}

/// `DELETE /api/users/{id}`
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    UserService::new(state.store()).deactivate(&id).await?;
    Ok(message_only("User deleted successfully"))
}

/// `POST /api/users/{id}/addresses`
async fn add_address(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<AddressDraft>,
) -> Result<Response> {
    let user = UserService::new(state.store()).add_address(&id, draft).await?;
    Ok(created("Address added successfully", user))
}

/// `PUT /api/users/{id}/addresses/{address_id}`
async fn update_address(
    State(state): State<AppState>,
    Path((id, address_id)): Path<(String, String)>,
    Json(draft): Json<AddressDraft>,
) -> Result<Response> {
    let user = UserService::new(state.store())
        .update_address(&id, &AddressId::new(address_id), draft)
        .await?;
    Ok(with_message("Address updated successfully", user))
}

/// `DELETE /api/users/{id}/addresses/{address_id}`
async fn remove_address(
    State(state): State<AppState>,
    Path((id, address_id)): Path<(String, String)>,
) -> Result<Response> {
    let user = UserService::new(state.store())
        .remove_address(&id, &AddressId::new(address_id))
        .await?;
    Ok(with_message("Address deleted successfully", user))
}

/// `POST /api/users/{id}/payment-methods`
async fn add_payment_method(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<PaymentMethodDraft>,
) -> Result<Response> {
    let user = UserService::new(state.store())
        .add_payment_method(&id, draft)
        .await?;
    Ok(created("Payment method added successfully", user))
}

/// `POST /api/users/{id}/loyalty-points`
async fn adjust_loyalty(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LoyaltyAdjustment>,
) -> Result<Response> {
    let user = UserService::new(state.store()).adjust_loyalty(&id, body).await?;
    Ok(with_message("Loyalty points updated successfully", user))
}
