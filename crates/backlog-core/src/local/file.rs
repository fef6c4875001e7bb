use super::KeyValueStore;
use crate::error::Result;
use crate::{io, paths};
use std::path::{Path, PathBuf};

/// One JSON file per key under a directory. Writes are atomic.
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        paths::validate_id(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        io::read_optional(&self.key_path(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        io::atomic_write(&self.key_path(key)?, value.as_bytes())
    }

    fn remove(&self, key: &str) -> Result<()> {
        io::remove_if_exists(&self.key_path(key)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalProjectStore;
    use crate::project::ProjectDraft;
    use crate::types::Product;
    use tempfile::TempDir;

    #[test]
    fn get_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let kv = FileKeyValueStore::new(dir.path());
        assert!(kv.get("projects").unwrap().is_none());
    }

    #[test]
    fn set_get_remove() {
        let dir = TempDir::new().unwrap();
        let kv = FileKeyValueStore::new(dir.path().join("local"));
        kv.set("projects", "[]").unwrap();
        assert!(dir.path().join("local/projects.json").exists());
        assert_eq!(kv.get("projects").unwrap().as_deref(), Some("[]"));
        kv.remove("projects").unwrap();
        kv.remove("projects").unwrap();
        assert!(kv.get("projects").unwrap().is_none());
    }

    #[test]
    fn rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let kv = FileKeyValueStore::new(dir.path());
        assert!(kv.set("../escape", "x").is_err());
    }

    #[test]
    fn projects_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let saved = {
            let store = LocalProjectStore::new(FileKeyValueStore::new(dir.path()));
            store
                .save(ProjectDraft::new(Product::new("Acme", "widgets"), Vec::new()))
                .unwrap()
        };
        let store = LocalProjectStore::new(FileKeyValueStore::new(dir.path()));
        assert_eq!(store.load(&saved.id).unwrap(), Some(saved));
    }
}
