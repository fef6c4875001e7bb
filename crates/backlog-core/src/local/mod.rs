//! Local persistent storage.
//!
//! A `KeyValueStore` holds opaque strings under keys. `LocalProjectStore`
//! keeps the entire project collection as one JSON array under a single key,
//! so every operation reads and rewrites the whole collection.

pub mod file;
pub mod memory;
pub mod redb_store;

pub use self::file::FileKeyValueStore;
pub use self::memory::MemoryKeyValueStore;
pub use self::redb_store::RedbKeyValueStore;

use crate::error::{Result, StoreError};
use crate::project::{mint_project_id, Project, ProjectDraft, ProjectPatch};

/// Key the project array is stored under unless configured otherwise.
pub const DEFAULT_KEY: &str = "projects";

/// Synchronous string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<K: KeyValueStore + ?Sized> KeyValueStore for Box<K> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

// ---------------------------------------------------------------------------
// LocalProjectStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Collection {
    projects: Vec<Project>,
    unreadable: Vec<serde_json::Value>,
}

pub struct LocalProjectStore<K> {
    kv: K,
    key: String,
}

impl<K: KeyValueStore> LocalProjectStore<K> {
    pub fn new(kv: K) -> Self {
        Self::with_key(kv, DEFAULT_KEY)
    }

    pub fn with_key(kv: K, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Every stored project, archived ones included, in storage order.
    /// Records that do not decode as a project are skipped.
    pub fn all(&self) -> Result<Vec<Project>> {
        Ok(self.read()?.projects)
    }

    fn read(&self) -> Result<Collection> {
        let Some(raw) = self.kv.get(&self.key)? else {
            return Ok(Collection::default());
        };
        if raw.trim().is_empty() {
            return Ok(Collection::default());
        }
        let records: Vec<serde_json::Value> =
            serde_json::from_str(&raw).map_err(|source| StoreError::CorruptLocal {
                key: self.key.clone(),
                source,
            })?;

        let mut collection = Collection::default();
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<Project>(record.clone()) {
                Ok(mut project) => {
                    project.synced_to_firestore = false;
                    collection.projects.push(project);
                }
                Err(err) => {
                    let id = record.get("id").and_then(|v| v.as_str()).unwrap_or("?");
                    tracing::warn!(
                        key = %self.key,
                        index,
                        id,
                        error = %err,
                        "skipping unreadable local project"
                    );
                    collection.unreadable.push(record);
                }
            }
        }
        Ok(collection)
    }

    /// Unreadable records are written back untouched after the projects.
    fn write(&self, collection: &Collection) -> Result<()> {
        let mut records = collection
            .projects
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        records.extend(collection.unreadable.iter().cloned());
        let data = serde_json::to_string(&records)?;
        self.kv.set(&self.key, &data)
    }

    /// Non-archived projects, most recently updated first.
    pub fn list(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> =
            self.all()?.into_iter().filter(|p| !p.archived).collect();
        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(projects)
    }

    /// Create a project, or overwrite in place the existing project whose
    /// `product.description` is identical to the draft's.
    pub fn save(&self, draft: ProjectDraft) -> Result<Project> {
        let mut collection = self.read()?;
        let saved = match collection
            .projects
            .iter_mut()
            .find(|p| p.product.description == draft.product.description)
        {
            Some(existing) => {
                tracing::debug!(id = %existing.id, "overwriting local project with same description");
                existing.overwrite_with(draft);
                existing.clone()
            }
            None => {
                let project = Project::from_draft(mint_project_id(), draft);
                collection.projects.push(project.clone());
                project
            }
        };
        self.write(&collection)?;
        Ok(saved)
    }

    pub fn load(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.all()?.into_iter().find(|p| p.id == id))
    }

    pub fn update(&self, id: &str, patch: ProjectPatch) -> Result<Option<Project>> {
        let mut collection = self.read()?;
        let Some(project) = collection.projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        project.apply(patch);
        let updated = project.clone();
        self.write(&collection)?;
        Ok(Some(updated))
    }

    /// Remove by id. Returns `false` (not an error) when nothing matched.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut collection = self.read()?;
        let before = collection.projects.len();
        collection.projects.retain(|p| p.id != id);
        if collection.projects.len() == before {
            return Ok(false);
        }
        self.write(&collection)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
