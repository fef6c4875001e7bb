use super::KeyValueStore;
use crate::error::{Result, StoreError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// In-process key-value store. Contents vanish with the value.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::LocalBackend("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites() {
        let kv = MemoryKeyValueStore::new();
        kv.set("k", "1").unwrap();
        kv.set("k", "2").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("2"));
        kv.remove("k").unwrap();
        assert!(kv.get("k").unwrap().is_none());
    }
}
