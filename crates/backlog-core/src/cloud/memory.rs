//! In-process `DocumentStore` with fault injection.

use super::{Direction, Document, DocumentStore, Fields, Filter, OrderBy, Value};
use crate::error::{Result, StoreError};
use crate::timestamp::Timestamp;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

type Collection = BTreeMap<String, Fields>;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    offline: AtomicBool,
    fail_every: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `CloudUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reject every `k`th write (create, set, update, delete). `0` disables.
    pub fn fail_every_nth_write(&self, k: usize) {
        self.fail_every.store(k, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Number of documents in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::CloudUnavailable("memory store offline".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        self.check_online()?;
        let k = self.fail_every.load(Ordering::SeqCst);
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if k > 0 && n % k == 0 {
            return Err(StoreError::CloudUnavailable(format!(
                "injected failure on write #{n}"
            )));
        }
        Ok(())
    }

    fn resolve(fields: Fields) -> Fields {
        let now = Timestamp::now();
        fields
            .into_iter()
            .map(|(k, v)| match v {
                Value::ServerTimestamp => (k, Value::Timestamp(now)),
                other => (k, other),
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_doc(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String> {
        self.check_write()?;
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::CloudApi {
                status: 409,
                body: format!("document {collection}/{id} already exists"),
            });
        }
        docs.insert(id.clone(), Self::resolve(fields));
        Ok(id)
    }

    async fn set_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.check_write()?;
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), Self::resolve(fields));
        Ok(())
    }

    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.check_online()?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn update_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<bool> {
        self.check_write()?;
        let mut collections = self.collections.write().await;
        let Some(existing) = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        else {
            return Ok(false);
        };
        existing.extend(Self::resolve(fields));
        Ok(true)
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<()> {
        self.check_write()?;
        if let Some(docs) = self.collections.write().await.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query_docs(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        self.check_online()?;
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(collection)
            .map(|c| {
                c.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .filter(|d| filters.iter().all(|f| f.matches(d)))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order_by {
            docs.retain(|d| d.fields.contains_key(&order.field));
            docs.sort_by(|a, b| {
                let ord = a.fields[&order.field].order(&b.fields[&order.field]);
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        Ok(docs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
