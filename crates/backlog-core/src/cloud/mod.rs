//! Cloud document store abstraction.
//!
//! `DocumentStore` is the seam between the hybrid store and whatever remote
//! document database backs it. Documents are flat maps of store-native
//! `Value`s grouped into collections and addressed by id.

pub mod codec;
pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreClient;
pub use self::memory::MemoryDocumentStore;

use crate::error::{Result, StoreError};
use crate::timestamp::Timestamp;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type Fields = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(Timestamp),
    Array(Vec<Value>),
    Map(Fields),
    /// Write-only sentinel: the store substitutes its own clock.
    ServerTimestamp,
}

impl Value {
    pub fn from_json(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back to JSON. Timestamps become ISO-8601 strings through the
    /// timestamp module.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => serde_json::Value::String(ts.to_iso8601()?),
            Value::Array(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<_>>()?,
            ),
            Value::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_>>()?,
            ),
            Value::ServerTimestamp => {
                return Err(StoreError::CloudResponse(
                    "unresolved server timestamp in read path".into(),
                ))
            }
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Ordering used by `order_by`. Values of different kinds compare by
    /// kind rank, mirroring how document databases order mixed fields.
    pub fn order(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Integer(a), Value::Double(b)) => (*a as f64).total_cmp(b),
            (Value::Double(a), Value::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) | Value::Double(_) => 2,
            Value::Timestamp(_) | Value::ServerTimestamp => 3,
            Value::String(_) => 4,
            Value::Array(_) => 5,
            Value::Map(_) => 6,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Value::Timestamp(ts)
    }
}

// ---------------------------------------------------------------------------
// Document / query types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equal { field: String, value: Value },
}

impl Filter {
    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Equal {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Equal { field, value } => doc.fields.get(field) == Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document. With `id = None` the store assigns one. Fails if
    /// the id is already taken. Returns the document id.
    async fn create_doc(&self, collection: &str, id: Option<&str>, fields: Fields)
        -> Result<String>;

    /// Create or fully replace the document at `id`.
    async fn set_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Merge top-level `fields` into an existing document. Returns `false`
    /// when no document exists at `id`.
    async fn update_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<bool>;

    /// Delete the document; deleting a missing document succeeds.
    async fn delete_doc(&self, collection: &str, id: &str) -> Result<()>;

    /// All documents matching every filter, optionally ordered.
    async fn query_docs(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn create_doc(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String> {
        (**self).create_doc(collection, id, fields).await
    }

    async fn set_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        (**self).set_doc(collection, id, fields).await
    }

    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        (**self).get_doc(collection, id).await
    }

    async fn update_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<bool> {
        (**self).update_doc(collection, id, fields).await
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<()> {
        (**self).delete_doc(collection, id).await
    }

    async fn query_docs(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        (**self).query_docs(collection, filters, order_by).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
