//! Domain services.
//!
//! One service per resource, constructed per request over the shared
//! [`ResourceStore`](crate::store::ResourceStore). Services own the business
//! rules: input validation, lifecycle transitions and cross-entity writes.
//! Route handlers only parse requests and shape responses.

pub mod carts;
pub mod checkouts;
pub mod orders;
pub mod products;
pub mod shipments;
pub mod users;

pub use carts::CartService;
pub use checkouts::CheckoutService;
pub use orders::OrderService;
pub use products::ProductService;
pub use shipments::ShipmentService;
pub use users::UserService;

use crate::error::AppError;
use crate::store::{Collection, Document, ListQuery, MAX_PAGE_SIZE, StoreError};

/// One page of results plus the figures the response envelope needs.
///
/// `page` and `limit` are the normalized values actually applied by the
/// store, not what the client asked for.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Map a store-level `NotFound` to a resource-specific 404 message; other
/// store errors pass through unchanged.
pub(crate) fn named_not_found(err: StoreError, message: &str) -> AppError {
    match err {
        StoreError::NotFound => AppError::NotFound(message.to_owned()),
        other => AppError::Store(other),
    }
}

/// Fetch every document in a collection by walking pages of the maximum
/// size. Only the stats endpoints use this; regular reads stay paginated.
pub(crate) async fn collect_all<T: Document>(
    collection: &Collection<'_, T>,
) -> Result<Vec<T>, StoreError> {
    let mut items: Vec<T> = Vec::new();
    let mut page = 1;
    loop {
        let query = ListQuery::new().page(page, MAX_PAGE_SIZE);
        let (mut batch, total) = collection.page(&query).await?;
        let fetched = batch.len();
        items.append(&mut batch);
        if fetched == 0 || u64::try_from(items.len()).unwrap_or(u64::MAX) >= total {
            return Ok(items);
        }
        page += 1;
    }
}
