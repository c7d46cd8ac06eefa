//! `PostgreSQL` document store.
//!
//! Documents are JSONB rows in `commerce.document`, keyed by
//! `(collection, id)`. Equality and containment filters compile to a single
//! `doc @>` probe served by the GIN index; timestamp filters cast the text
//! projection. Migrations live in `crates/api/migrations/` and run via:
//!
//! ```bash
//! cargo run -p copperbay-cli -- migrate
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{Filter, FilterOp, ListQuery, ResourceStore, Sort, StoreError, WriteBatch, WriteOp};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// [`ResourceStore`] backed by the `commerce.document` JSONB table.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Field names come from service code, never from request input. Reject
/// anything outside `[a-z0-9_]` so they can be spliced into `doc->>'...'`.
fn validate_field(field: &str) -> Result<(), StoreError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::DataCorruption(format!(
            "invalid filter field: {field}"
        )))
    }
}

/// Append filter predicates to a query that already constrains `collection`.
///
/// `Eq` fields become `{"field": value}` pairs and `Contains` fields become
/// `{"field": [value]}` pairs, merged into one `doc @>` containment probe.
/// `Lt` predicates cast the text projection to `timestamptz`.
fn push_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    filters: &[Filter],
) -> Result<(), StoreError> {
    let mut containment = serde_json::Map::new();
    for filter in filters {
        validate_field(&filter.field)?;
        match filter.op {
            FilterOp::Eq => {
                containment.insert(filter.field.clone(), filter.value.clone());
            }
            FilterOp::Contains => {
                containment.insert(
                    filter.field.clone(),
                    JsonValue::Array(vec![filter.value.clone()]),
                );
            }
            FilterOp::Lt => {}
        }
    }

    if !containment.is_empty() {
        builder.push(" AND doc @> ");
        builder.push_bind(JsonValue::Object(containment));
    }

    for filter in filters {
        if filter.op == FilterOp::Lt {
            let JsonValue::String(at) = &filter.value else {
                return Err(StoreError::DataCorruption(format!(
                    "timestamp filter on {} must carry a string value",
                    filter.field
                )));
            };
            builder.push(" AND (doc->>'");
            builder.push(&filter.field);
            builder.push("')::timestamptz < ");
            builder.push_bind(at.clone());
            builder.push("::timestamptz");
        }
    }
    Ok(())
}

/// `created_at` and `updated_at` sort on their real columns; other fields
/// sort on the JSONB text projection. A trailing id tiebreak keeps pages
/// stable across requests.
fn push_order(
    builder: &mut QueryBuilder<'_, Postgres>,
    sort: Option<&Sort>,
) -> Result<(), StoreError> {
    if let Some(sort) = sort {
        validate_field(&sort.field)?;
        match sort.field.as_str() {
            "created_at" | "updated_at" => {
                builder.push(" ORDER BY ");
                builder.push(&sort.field);
            }
            _ => {
                builder.push(" ORDER BY doc->>'");
                builder.push(&sort.field);
                builder.push("'");
            }
        }
        builder.push(if sort.descending { " DESC" } else { " ASC" });
        builder.push(", id ASC");
    } else {
        builder.push(" ORDER BY id ASC");
    }
    Ok(())
}

#[async_trait]
impl ResourceStore for PostgresStore {
    async fn insert(&self, collection: &str, id: &str, doc: JsonValue) -> Result<(), StoreError> {
        let result =
            sqlx::query("INSERT INTO commerce.document (collection, id, doc) VALUES ($1, $2, $3)")
                .bind(collection)
                .bind(id)
                .bind(&doc)
                .execute(&self.pool)
                .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return Err(StoreError::Conflict(format!(
                        "{collection} id already exists: {id}"
                    )));
                }
                Err(e.into())
            }
        }
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>, StoreError> {
        let doc = sqlx::query_scalar::<_, JsonValue>(
            "SELECT doc FROM commerce.document WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc)
    }

    async fn replace(&self, collection: &str, id: &str, doc: JsonValue) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE commerce.document SET doc = $3, updated_at = NOW()
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(&doc)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn soft_delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE commerce.document
             SET doc = doc || jsonb_build_object('is_active', false, 'updated_at', to_jsonb(NOW())),
                 updated_at = NOW()
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM commerce.document WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_where(&self, collection: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("DELETE FROM commerce.document WHERE collection = ");
        builder.push_bind(collection);
        push_filters(&mut builder, filters)?;

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn list(
        &self,
        collection: &str,
        query: &ListQuery,
    ) -> Result<(Vec<JsonValue>, u64), StoreError> {
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM commerce.document WHERE collection = ");
        count.push_bind(collection);
        push_filters(&mut count, &query.filters)?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Postgres>::new("SELECT doc FROM commerce.document WHERE collection = ");
        select.push_bind(collection);
        push_filters(&mut select, &query.filters)?;
        push_order(&mut select, query.sort.as_ref())?;
        select.push(" LIMIT ");
        select.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
        select.push(" OFFSET ");
        select.push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let docs: Vec<JsonValue> = select.build_query_scalar().fetch_all(&self.pool).await?;
        Ok((docs, u64::try_from(total).unwrap_or(0)))
    }

    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Early returns drop the transaction, which rolls it back.
        for op in batch.into_ops() {
            match op {
                WriteOp::Insert {
                    collection,
                    id,
                    doc,
                } => {
                    let result = sqlx::query(
                        "INSERT INTO commerce.document (collection, id, doc) VALUES ($1, $2, $3)",
                    )
                    .bind(collection)
                    .bind(&id)
                    .bind(&doc)
                    .execute(&mut *tx)
                    .await;

                    if let Err(e) = result {
                        if let sqlx::Error::Database(ref db_err) = e
                            && db_err.is_unique_violation()
                        {
                            return Err(StoreError::Conflict(format!(
                                "{collection} id already exists: {id}"
                            )));
                        }
                        return Err(e.into());
                    }
                }
                WriteOp::Replace {
                    collection,
                    id,
                    doc,
                } => {
                    let result = sqlx::query(
                        "UPDATE commerce.document SET doc = $3, updated_at = NOW()
                         WHERE collection = $1 AND id = $2",
                    )
                    .bind(collection)
                    .bind(&id)
                    .bind(&doc)
                    .execute(&mut *tx)
                    .await?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::NotFound);
                    }
                }
                WriteOp::Remove { collection, id } => {
                    sqlx::query("DELETE FROM commerce.document WHERE collection = $1 AND id = $2")
                        .bind(collection)
                        .bind(&id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
