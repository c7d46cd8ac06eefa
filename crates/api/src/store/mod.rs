//! Document store abstraction for the commerce collections.
//!
//! Every entity is persisted as one JSON document in a named collection:
//!
//! - `products` - catalog entries with embedded variants
//! - `users` - customers with embedded addresses and payment methods
//! - `carts` - live carts with denormalized totals
//! - `checkouts` - short-lived checkout sessions
//! - `orders` - placed orders with embedded status history
//! - `shipments` - shipments with embedded tracking events
//!
//! # Backends
//!
//! - [`memory::MemoryStore`] - in-process maps, used by tests and local runs
//! - [`postgres::PostgresStore`] - JSONB rows in the `commerce.document` table
//!
//! Services never talk to a backend directly; they go through
//! [`Collection`], which handles JSON encoding and decoding for one
//! document type.

pub mod memory;
pub mod postgres;

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::{PostgresStore, create_pool};

/// Default page size for list queries.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Hard cap on page size, regardless of what the client asks for.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored document does not decode to its expected shape.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested document was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate id).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

// ===== Query types =====

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Top-level field equals the value exactly.
    Eq,
    /// Top-level array field contains the value.
    Contains,
    /// Top-level timestamp field sorts before the value.
    Lt,
}

/// One predicate against a top-level document field.
///
/// Field names are chosen by the services and are never taken from request
/// input, so they are trusted identifiers.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: JsonValue,
}

impl Filter {
    /// Match documents whose `field` equals `value`.
    pub fn equals(field: &str, value: impl Into<JsonValue>) -> Self {
        Self {
            field: field.to_owned(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// Match documents whose array `field` contains `value`.
    pub fn contains(field: &str, value: impl Into<JsonValue>) -> Self {
        Self {
            field: field.to_owned(),
            op: FilterOp::Contains,
            value: value.into(),
        }
    }

    /// Match documents whose timestamp `field` is strictly before `at`.
    #[must_use]
    pub fn before(field: &str, at: DateTime<Utc>) -> Self {
        Self {
            field: field.to_owned(),
            op: FilterOp::Lt,
            value: JsonValue::String(at.to_rfc3339()),
        }
    }
}

/// Sort order for list queries. Only one sort key is supported.
#[derive(Debug, Clone)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    /// Ascending sort on `field`.
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_owned(),
            descending: false,
        }
    }

    /// Descending sort on `field`.
    #[must_use]
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_owned(),
            descending: true,
        }
    }
}

/// Filters, sort and pagination for a list query.
///
/// Page numbers are 1-based. Out-of-range values are normalized: page is
/// floored at 1 and the limit is clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub page: u64,
    pub limit: u64,
}

impl ListQuery {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            filters: Vec::new(),
            sort: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }

    /// Add one filter predicate. All predicates must match.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the sort key.
    #[must_use]
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set page and page size, normalizing out-of-range values.
    #[must_use]
    pub fn page(mut self, page: u64, limit: u64) -> Self {
        self.page = page.max(1);
        self.limit = limit.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Number of documents to skip before the requested page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Write batches =====

/// One write against a collection.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Insert {
        collection: &'static str,
        id: String,
        doc: JsonValue,
    },
    Replace {
        collection: &'static str,
        id: String,
        doc: JsonValue,
    },
    Remove {
        collection: &'static str,
        id: String,
    },
}

/// An ordered group of writes applied atomically by
/// [`ResourceStore::apply`]. Either every op lands or none do.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Queue an insert of `doc` into its collection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the document fails to encode.
    pub fn insert<T: Document>(&mut self, doc: &T) -> Result<(), StoreError> {
        self.ops.push(WriteOp::Insert {
            collection: T::COLLECTION,
            id: doc.id().to_owned(),
            doc: encode(doc)?,
        });
        Ok(())
    }

    /// Queue a full replacement of an existing document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the document fails to encode.
    pub fn replace<T: Document>(&mut self, doc: &T) -> Result<(), StoreError> {
        self.ops.push(WriteOp::Replace {
            collection: T::COLLECTION,
            id: doc.id().to_owned(),
            doc: encode(doc)?,
        });
        Ok(())
    }

    /// Queue a hard removal by id.
    pub fn remove<T: Document>(&mut self, id: &str) {
        self.ops.push(WriteOp::Remove {
            collection: T::COLLECTION,
            id: id.to_owned(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

// ===== Store trait =====

/// A JSON document that lives in a named collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Collection name, e.g. `"products"`.
    const COLLECTION: &'static str;

    /// Stable document id used as the storage key.
    fn id(&self) -> &str;
}

/// Backend-agnostic document store.
///
/// Implementations must keep `is_active` soft-delete semantics and
/// all-or-nothing [`WriteBatch`] application consistent with each other;
/// services rely on both.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Insert a new document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the id already exists in the
    /// collection.
    async fn insert(&self, collection: &str, id: &str, doc: JsonValue) -> Result<(), StoreError>;

    /// Fetch a document by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` on backend failure.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>, StoreError>;

    /// Replace an existing document wholesale.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no document has this id.
    async fn replace(&self, collection: &str, id: &str, doc: JsonValue) -> Result<(), StoreError>;

    /// Mark a document inactive (`is_active = false`) without removing it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no document has this id.
    async fn soft_delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Hard-remove a document. Returns whether a document was removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` on backend failure.
    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Hard-remove every document matching all `filters`, returning the
    /// number removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` on backend failure.
    async fn remove_where(&self, collection: &str, filters: &[Filter]) -> Result<u64, StoreError>;

    /// List documents matching the query, returning the requested page and
    /// the total match count before pagination.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` on backend failure.
    async fn list(
        &self,
        collection: &str,
        query: &ListQuery,
    ) -> Result<(Vec<JsonValue>, u64), StoreError>;

    /// Apply a batch of writes atomically.
    ///
    /// # Errors
    ///
    /// Returns the first op's error; no op is applied when any fails.
    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Check backend liveness, for readiness probes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the backend is unreachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

// ===== Typed collection facade =====

/// Typed view of one collection on a [`ResourceStore`].
///
/// Encodes and decodes documents at the boundary so services work with
/// domain types only.
pub struct Collection<'a, T: Document> {
    store: &'a dyn ResourceStore,
    _marker: PhantomData<T>,
}

impl<'a, T: Document> Collection<'a, T> {
    #[must_use]
    pub const fn new(store: &'a dyn ResourceStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Insert a new document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the id already exists.
    pub async fn insert(&self, doc: &T) -> Result<(), StoreError> {
        self.store.insert(T::COLLECTION, doc.id(), encode(doc)?).await
    }

    /// Fetch a document by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the stored JSON fails to
    /// decode.
    pub async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.store
            .get(T::COLLECTION, id)
            .await?
            .map(decode)
            .transpose()
    }

    /// Fetch a document by id, treating absence as an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no document has this id.
    pub async fn require(&self, id: &str) -> Result<T, StoreError> {
        self.get(id).await?.ok_or(StoreError::NotFound)
    }

    /// Replace the stored document with `doc`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the document no longer exists.
    pub async fn save(&self, doc: &T) -> Result<(), StoreError> {
        self.store
            .replace(T::COLLECTION, doc.id(), encode(doc)?)
            .await
    }

    /// List one page of documents plus the total match count.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if any stored JSON fails to
    /// decode.
    pub async fn page(&self, query: &ListQuery) -> Result<(Vec<T>, u64), StoreError> {
        let (docs, total) = self.store.list(T::COLLECTION, query).await?;
        let items = docs.into_iter().map(decode).collect::<Result<_, _>>()?;
        Ok((items, total))
    }

    /// Fetch the first document matching `filter`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` on backend failure.
    pub async fn find_one(&self, filter: Filter) -> Result<Option<T>, StoreError> {
        let query = ListQuery::new().filter(filter).page(1, 1);
        let (mut items, _) = self.page(&query).await?;
        Ok(items.pop())
    }

    /// Mark a document inactive without removing it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no document has this id.
    pub async fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        self.store.soft_delete(T::COLLECTION, id).await
    }

    /// Hard-remove a document. Returns whether a document was removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` on backend failure.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.store.remove(T::COLLECTION, id).await
    }

    /// Hard-remove every document matching all `filters`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` on backend failure.
    pub async fn remove_where(&self, filters: &[Filter]) -> Result<u64, StoreError> {
        self.store.remove_where(T::COLLECTION, filters).await
    }
}

fn encode<T: Document>(doc: &T) -> Result<JsonValue, StoreError> {
    serde_json::to_value(doc)
        .map_err(|e| StoreError::DataCorruption(format!("encoding {}: {e}", T::COLLECTION)))
}

fn decode<T: Document>(doc: JsonValue) -> Result<T, StoreError> {
    serde_json::from_value(doc)
        .map_err(|e| StoreError::DataCorruption(format!("decoding {}: {e}", T::COLLECTION)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Widget {
        id: String,
        name: String,
    }

    impl Document for Widget {
        const COLLECTION: &'static str = "widgets";

        fn id(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn list_query_normalizes_page_and_limit() {
        let query = ListQuery::new().page(0, 0);
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 1);

        let query = ListQuery::new().page(3, 10_000);
        assert_eq!(query.page, 3);
        assert_eq!(query.limit, MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 2 * MAX_PAGE_SIZE);
    }

    #[test]
    fn list_query_defaults() {
        let query = ListQuery::default();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);
        assert!(query.filters.is_empty());
        assert!(query.sort.is_none());
    }

    #[test]
    fn filter_constructors_carry_expected_values() {
        let eq = Filter::equals("status", "active");
        assert_eq!(eq.op, FilterOp::Eq);
        assert_eq!(eq.value, serde_json::json!("active"));

        let contains = Filter::contains("tags", "summer");
        assert_eq!(contains.op, FilterOp::Contains);

        let at = chrono::Utc::now();
        let before = Filter::before("expires_at", at);
        assert_eq!(before.op, FilterOp::Lt);
        assert_eq!(before.value, serde_json::json!(at.to_rfc3339()));
    }

    #[test]
    fn write_batch_preserves_op_order() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        let widget = Widget {
            id: "w_1".into(),
            name: "gear".into(),
        };
        batch.insert(&widget).unwrap();
        batch.replace(&widget).unwrap();
        batch.remove::<Widget>("w_2");

        let ops = batch.into_ops();
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0], WriteOp::Insert { collection, id, .. }
            if *collection == "widgets" && id == "w_1"));
        assert!(matches!(&ops[1], WriteOp::Replace { .. }));
        assert!(matches!(&ops[2], WriteOp::Remove { id, .. } if id == "w_2"));
    }
}
