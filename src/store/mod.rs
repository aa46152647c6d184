/// Record store
///
/// Collection-scoped access to the schemaless catalog documents. The
/// aggregation and geospatial layers only ever talk to the store through
/// the `RecordStore` trait, so they stay independent of the engine behind it.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use crate::error::CatalogResult;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

/// A stored record. Every document carries its identity under `_id`.
pub type Document = Map<String, Value>;

/// Field holding a document's identity
pub const ID_FIELD: &str = "_id";

/// Catalog collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Books,
    Users,
    Comments,
    Livrarias,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Books => "books",
            Collection::Users => "users",
            Collection::Comments => "comments",
            Collection::Livrarias => "livrarias",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document filter
///
/// Paths are dotted (`geometry.type`) and resolve through nested objects.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Id(i64),
    IdIn(Vec<i64>),
    /// Field equals a JSON scalar
    Eq(String, Value),
    /// Numeric field within inclusive bounds
    Range {
        path: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Array field contains the value
    Contains(String, Value),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn contains(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Contains(path.into(), value.into())
    }

    /// Evaluate the filter against a document in memory
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => document_id(doc) == Some(*id),
            Filter::IdIn(ids) => document_id(doc).map_or(false, |id| ids.contains(&id)),
            Filter::Eq(path, expected) => {
                lookup(doc, path).map_or(false, |actual| scalar_eq(actual, expected))
            }
            Filter::Range { path, min, max } => match lookup(doc, path).and_then(Value::as_f64) {
                Some(v) => min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m),
                None => false,
            },
            Filter::Contains(path, expected) => match lookup(doc, path) {
                Some(Value::Array(items)) => items.iter().any(|item| scalar_eq(item, expected)),
                _ => false,
            },
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

/// Numbers compare by value so that `5` matches `5.0`
fn scalar_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

/// Resolve a dotted path inside a document
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Identity of a document, if it has an integral one
pub fn document_id(doc: &Document) -> Option<i64> {
    doc.get(ID_FIELD).and_then(Value::as_i64)
}

/// Paging for `find`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn page(skip: u64, limit: u64) -> Self {
        Self {
            skip,
            limit: Some(limit),
        }
    }
}

/// Record store backend trait
///
/// Results of `find` are always in ascending identity order.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Find all documents matching a filter
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> CatalogResult<Vec<Document>>;

    /// Find the first document matching a filter
    async fn find_one(&self, collection: Collection, filter: &Filter)
        -> CatalogResult<Option<Document>>;

    /// Count documents matching a filter
    async fn count_documents(&self, collection: Collection, filter: &Filter) -> CatalogResult<u64>;

    /// Insert documents, assigning fresh identities in input order
    async fn insert_many(
        &self,
        collection: Collection,
        documents: Vec<Document>,
    ) -> CatalogResult<Vec<i64>>;

    /// Replace top-level fields of one document. Returns whether it matched.
    async fn update_one(
        &self,
        collection: Collection,
        id: i64,
        fields: Document,
    ) -> CatalogResult<bool>;

    /// Replace top-level fields of every matching document. Returns the match count.
    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Document,
    ) -> CatalogResult<u64>;

    /// Delete one document by identity. Returns whether it existed.
    async fn delete_one(&self, collection: Collection, id: i64) -> CatalogResult<bool>;

    /// Check the store is reachable
    async fn ping(&self) -> CatalogResult<()>;
}

/// Drop the identity from update fields; identities are immutable
pub(crate) fn strip_identity(mut fields: Document) -> Document {
    fields.remove(ID_FIELD);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_lookup_nested_path() {
        let d = doc(json!({"_id": 1, "geometry": {"type": "Point"}}));
        assert_eq!(lookup(&d, "geometry.type"), Some(&json!("Point")));
        assert_eq!(lookup(&d, "geometry.coordinates"), None);
        assert_eq!(lookup(&d, "_id.inner"), None);
    }

    #[test]
    fn test_filter_matches() {
        let d = doc(json!({
            "_id": 4,
            "price": 12.5,
            "categories": ["Java", "Web"],
            "book_id": 2
        }));

        assert!(Filter::All.matches(&d));
        assert!(Filter::Id(4).matches(&d));
        assert!(!Filter::IdIn(vec![1, 2]).matches(&d));
        assert!(Filter::eq("book_id", 2).matches(&d));
        assert!(Filter::eq("book_id", 2.0).matches(&d));
        assert!(Filter::contains("categories", "Web").matches(&d));
        assert!(!Filter::contains("categories", "Python").matches(&d));
        assert!(Filter::Range {
            path: "price".to_string(),
            min: Some(10.0),
            max: Some(12.5)
        }
        .matches(&d));
        assert!(!Filter::Range {
            path: "price".to_string(),
            min: None,
            max: Some(12.0)
        }
        .matches(&d));
        assert!(!Filter::And(vec![Filter::Id(4), Filter::eq("book_id", 3)]).matches(&d));
    }

    #[test]
    fn test_range_requires_numeric_field() {
        let d = doc(json!({"_id": 1, "price": "cheap"}));
        let filter = Filter::Range {
            path: "price".to_string(),
            min: Some(0.0),
            max: None,
        };
        assert!(!filter.matches(&d));
    }
}
