//! HTTP route handlers for the commerce API.
//!
//! Handlers are deliberately thin: parse the request, call the matching
//! service, wrap the result in the response envelope. Every response body
//! is `{success, message?, data?}`, with a `pagination` block on lists;
//! errors render through [`AppError`](crate::error::AppError).
//!
//! # Route Structure
//!
//! ```text
//! # Products
//! GET    /api/products                     - List (category, brand, page, limit)
//! POST   /api/products                     - Create
//! GET    /api/products/{id}                - Detail
//! PUT    /api/products/{id}                - Update mutable fields
//! DELETE /api/products/{id}                - Soft delete
//! GET    /api/products/{id}/variants       - Embedded variants
//!
//! # Users
//! GET    /api/users                        - List (loyalty_tier, page, limit)
//! POST   /api/users                        - Create
//! GET    /api/users/{id}                   - Detail
//! PUT    /api/users/{id}                   - Update
//! DELETE /api/users/{id}                   - Soft delete
//! POST   /api/users/{id}/addresses         - Add address
//! PUT    /api/users/{id}/addresses/{address_id}    - Update address
//! DELETE /api/users/{id}/addresses/{address_id}    - Remove address
//! POST   /api/users/{id}/payment-methods   - Add payment method
//! POST   /api/users/{id}/loyalty-points    - Adjust loyalty points
//!
//! # Carts
//! GET    /api/carts                        - List (user_id, status, page, limit)
//! POST   /api/carts                        - Create, empty or with items
//! GET    /api/carts/stats                  - Aggregate counts and values
//! GET    /api/carts/user/{user_id}/active  - The user's single active cart
//! GET    /api/carts/{id}                   - Detail
//! DELETE /api/carts/{id}                   - Abandon (soft)
//! POST   /api/carts/{id}/items             - Add or merge a line
//! DELETE /api/carts/{id}/items/{product_id}/{variant_id} - Remove a line
//! POST   /api/carts/{id}/clear             - Empty the cart
//! POST   /api/carts/{id}/discount          - Apply a coupon
//!
//! # Checkouts
//! GET    /api/checkouts                    - List (user_id, cart_id, status, page, limit)
//! POST   /api/checkouts                    - Create from an active cart
//! POST   /api/checkouts/cleanup            - Delete expired pending checkouts
//! GET    /api/checkouts/{id}               - Detail
//! POST   /api/checkouts/{id}/complete      - Complete -> {checkout, order}
//! POST   /api/checkouts/{id}/fail          - Mark failed
//! POST   /api/checkouts/{id}/cancel        - Cancel
//! DELETE /api/checkouts/{id}               - Hard delete
//!
//! # Orders (no create/update/delete: orders come from checkout completion)
//! GET    /api/orders                       - List (user_id, status, page, limit)
//! GET    /api/orders/stats                 - Counts by status, revenue
//! GET    /api/orders/number/{order_number} - Lookup by order number
//! GET    /api/orders/user/{user_id}        - A user's orders
//! GET    /api/orders/{id}                  - Detail
//! PATCH  /api/orders/{id}/status           - Status transition
//! POST   /api/orders/{id}/cancel           - Cancel
//! POST   /api/orders/{id}/tracking         - Attach tracking data
//! POST   /api/orders/{id}/deliver          - Mark delivered
//! POST   /api/orders/{id}/refund           - Process refund
//!
//! # Shipments
//! GET    /api/shipments                    - List (order_id, carrier, status, page, limit)
//! POST   /api/shipments                    - Create against an order
//! GET    /api/shipments/tracking/{tracking_number} - Lookup by tracking number
//! GET    /api/shipments/{id}               - Detail
//! PUT    /api/shipments/{id}               - Update carrier/package fields
//! DELETE /api/shipments/{id}               - Hard delete
//! GET    /api/shipments/{id}/tracking      - Customer-facing tracking view
//! POST   /api/shipments/{id}/events        - Append a carrier scan
//! POST   /api/shipments/{id}/deliver       - Mark delivered (moves the order too)
//! ```

pub mod carts;
pub mod checkouts;
pub mod orders;
pub mod products;
pub mod shipments;
pub mod users;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;

use crate::services::Page;
use crate::state::AppState;

/// Assemble every resource router under its `/api` prefix segment.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/users", users::router())
        .nest("/carts", carts::router())
        .nest("/checkouts", checkouts::router())
        .nest("/orders", orders::router())
        .nest("/shipments", shipments::router())
}

/// The standard response body. Error responses use the same shape, built
/// in `AppError::into_response`.
#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
}

/// Pagination block attached to list responses.
#[derive(Debug, Serialize)]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: u64,
}

impl Pagination {
    fn for_page<T>(page: &Page<T>) -> Self {
        Self {
            current_page: page.page,
            total_pages: page.total.div_ceil(page.limit.max(1)),
            total_items: page.total,
            items_per_page: page.limit,
        }
    }
}

/// `200 {success, data}`.
pub(crate) fn ok<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        success: true,
        message: None,
        data: Some(data),
        pagination: None,
    })
    .into_response()
}

/// `201 {success, message, data}`.
pub(crate) fn created<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(Envelope {
            success: true,
            message: Some(message.to_owned()),
            data: Some(data),
            pagination: None,
        }),
    )
        .into_response()
}

/// `200 {success, message, data}`.
pub(crate) fn with_message<T: Serialize>(message: &str, data: T) -> Response {
    Json(Envelope {
        success: true,
        message: Some(message.to_owned()),
        data: Some(data),
        pagination: None,
    })
    .into_response()
}

/// `200 {success, message}` with no payload.
pub(crate) fn message_only(message: &str) -> Response {
    Json(Envelope::<()> {
        success: true,
        message: Some(message.to_owned()),
        data: None,
        pagination: None,
    })
    .into_response()
}

/// `200 {success, data: [...], pagination}`.
pub(crate) fn paginated<T: Serialize>(page: Page<T>) -> Response {
    let pagination = Pagination::for_page(&page);
    Json(Envelope {
        success: true,
        message: None,
        data: Some(page.items),
        pagination: Some(pagination),
    })
    .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_partial_pages_up() {
        let page = Page {
            items: vec![1, 2, 3],
            total: 23,
            page: 1,
            limit: 10,
        };
        let pagination = Pagination::for_page(&page);
        assert_eq!(pagination.total_pages, 3);
        assert_eq!(pagination.total_items, 23);
        assert_eq!(pagination.items_per_page, 10);
    }

    #[test]
    fn pagination_of_nothing_is_zero_pages() {
        let page = Page {
            items: Vec::<u8>::new(),
            total: 0,
            page: 1,
            limit: 10,
        };
        assert_eq!(Pagination::for_page(&page).total_pages, 0);
    }

    #[test]
    fn envelope_omits_empty_fields() {
        let body = serde_json::to_value(Envelope {
            success: true,
            message: None,
            data: Some(vec![1]),
            pagination: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": [1]}));
    }
}
