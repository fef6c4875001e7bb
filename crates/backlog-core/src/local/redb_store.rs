//! Single-file embedded key-value store backed by redb.

use super::KeyValueStore;
use crate::error::{Result, StoreError};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;

/// Key: store key, Value: serialized payload
const ENTRIES: TableDefinition<&str, &str> = TableDefinition::new("entries");

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::LocalBackend(e.to_string())
}

pub struct RedbKeyValueStore {
    db: Database,
}

impl RedbKeyValueStore {
    /// Open or create the database at `path`, creating the table up front so
    /// reads never race table creation.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(backend)?;
        let wt = db.begin_write().map_err(backend)?;
        wt.open_table(ENTRIES).map_err(backend)?;
        wt.commit().map_err(backend)?;
        Ok(Self { db })
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> Result<usize> {
        let rt = self.db.begin_read().map_err(backend)?;
        let table = rt.open_table(ENTRIES).map_err(backend)?;
        let mut n = 0;
        for entry in table.iter().map_err(backend)? {
            entry.map_err(backend)?;
            n += 1;
        }
        Ok(n)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl KeyValueStore for RedbKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let rt = self.db.begin_read().map_err(backend)?;
        let table = rt.open_table(ENTRIES).map_err(backend)?;
        let value = table.get(key).map_err(backend)?;
        Ok(value.map(|v| v.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(backend)?;
        {
            let mut table = wt.open_table(ENTRIES).map_err(backend)?;
            table.insert(key, value).map_err(backend)?;
        }
        wt.commit().map_err(backend)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(backend)?;
        {
            let mut table = wt.open_table(ENTRIES).map_err(backend)?;
            table.remove(key).map_err(backend)?;
        }
        wt.commit().map_err(backend)?;
        Ok(())
    }
}
