//! In-memory document store.
//!
//! Used by unit tests and local runs (`STORE_BACKEND=memory`). Collections
//! are `BTreeMap`s behind one async `RwLock`, so unsorted list order is
//! stable by id.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use super::{Filter, FilterOp, ListQuery, ResourceStore, StoreError, WriteBatch, WriteOp};

type Collections = HashMap<String, BTreeMap<String, JsonValue>>;

/// Process-local [`ResourceStore`] backed by ordinary maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(doc: &JsonValue, filter: &Filter) -> bool {
    let field = doc.get(&filter.field);
    match filter.op {
        FilterOp::Eq => field == Some(&filter.value),
        FilterOp::Contains => field
            .and_then(JsonValue::as_array)
            .is_some_and(|items| items.contains(&filter.value)),
        FilterOp::Lt => {
            field.is_some_and(|actual| compare(actual, &filter.value) == Ordering::Less)
        }
    }
}

/// Compare two JSON scalars, treating RFC 3339 strings as timestamps.
fn compare(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::String(a), JsonValue::String(b)) => {
            match (parse_timestamp(a), parse_timestamp(b)) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (JsonValue::Number(a), JsonValue::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .map_or(Ordering::Equal, |(a, b)| a.total_cmp(&b)),
        _ => Ordering::Equal,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Documents missing the sort field sort first.
fn compare_by_field(a: &JsonValue, b: &JsonValue, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(a), Some(b)) => compare(a, b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn insert(&self, collection: &str, id: &str, doc: JsonValue) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_owned()).or_default();
        if docs.contains_key(id) {
            return Err(StoreError::Conflict(format!(
                "{collection} id already exists: {id}"
            )));
        }
        docs.insert(id.to_owned(), doc);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn replace(&self, collection: &str, id: &str, doc: JsonValue) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let slot = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or(StoreError::NotFound)?;
        *slot = doc;
        Ok(())
    }

    async fn soft_delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or(StoreError::NotFound)?;
        if let Some(fields) = doc.as_object_mut() {
            fields.insert("is_active".to_owned(), JsonValue::Bool(false));
            fields.insert(
                "updated_at".to_owned(),
                JsonValue::String(Utc::now().to_rfc3339()),
            );
        }
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn remove_where(&self, collection: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|_, doc| !filters.iter().all(|filter| matches(doc, filter)));
        Ok((before - docs.len()) as u64)
    }

    async fn list(
        &self,
        collection: &str,
        query: &ListQuery,
    ) -> Result<(Vec<JsonValue>, u64), StoreError> {
        let collections = self.collections.read().await;
        let mut matched: Vec<&JsonValue> = collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| query.filters.iter().all(|filter| matches(doc, filter)))
                    .collect()
            })
            .unwrap_or_default();

        let total = matched.len() as u64;
        if let Some(sort) = &query.sort {
            // Stable sort keeps the by-id order for ties.
            matched.sort_by(|a, b| {
                let ord = compare_by_field(a, b, &sort.field);
                if sort.descending { ord.reverse() } else { ord }
            });
        }

        let page = matched
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let ops = batch.into_ops();

        // Check every precondition before mutating anything so a failed
        // batch leaves the store untouched.
        for op in &ops {
            match op {
                WriteOp::Insert { collection, id, .. } => {
                    if collections
                        .get(*collection)
                        .is_some_and(|docs| docs.contains_key(id))
                    {
                        return Err(StoreError::Conflict(format!(
                            "{collection} id already exists: {id}"
                        )));
                    }
                }
                WriteOp::Replace { collection, id, .. } => {
                    if !collections
                        .get(*collection)
                        .is_some_and(|docs| docs.contains_key(id))
                    {
                        return Err(StoreError::NotFound);
                    }
                }
                WriteOp::Remove { .. } => {}
            }
        }

        for op in ops {
            match op {
                WriteOp::Insert {
                    collection,
                    id,
                    doc,
                }
                | WriteOp::Replace {
                    collection,
                    id,
                    doc,
                } => {
                    collections
                        .entry(collection.to_owned())
                        .or_default()
                        .insert(id, doc);
                }
                WriteOp::Remove { collection, id } => {
                    if let Some(docs) = collections.get_mut(collection) {
                        docs.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
