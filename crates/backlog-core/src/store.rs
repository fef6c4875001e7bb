//! Build a `HybridProjectStore` from `.backlog/config.yaml`.

use crate::cloud::{DocumentStore, FirestoreClient};
use crate::config::{CloudConfig, Config, LocalBackend};
use crate::error::Result;
use crate::hybrid::HybridProjectStore;
use crate::local::{
    FileKeyValueStore, KeyValueStore, LocalProjectStore, MemoryKeyValueStore, RedbKeyValueStore,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Store with backends chosen at runtime.
pub type ConfiguredStore = HybridProjectStore<Arc<dyn DocumentStore>, Box<dyn KeyValueStore>>;

pub fn open_local(root: &Path, config: &Config) -> Result<LocalProjectStore<Box<dyn KeyValueStore>>> {
    let local = &config.local;
    let kv: Box<dyn KeyValueStore> = match local.backend {
        LocalBackend::File => Box::new(FileKeyValueStore::new(local.resolved_path(root))),
        LocalBackend::Redb => Box::new(RedbKeyValueStore::open(&local.resolved_path(root))?),
        LocalBackend::Memory => Box::new(MemoryKeyValueStore::new()),
    };
    Ok(LocalProjectStore::with_key(kv, local.key.clone()))
}

pub fn open_cloud(cloud: &CloudConfig) -> Result<FirestoreClient> {
    let client = match cloud.timeout_secs {
        Some(secs) => FirestoreClient::with_timeout(
            cloud.base_url.clone(),
            cloud.project_id.clone(),
            Duration::from_secs(secs),
        )?,
        None => FirestoreClient::new(cloud.base_url.clone(), cloud.project_id.clone()),
    };
    Ok(client.database(cloud.database.clone()).token(cloud.token()))
}

/// Open the store described by `config`. Without a `cloud` section the store
/// runs local-only.
pub fn open(root: &Path, config: &Config) -> Result<ConfiguredStore> {
    let local = open_local(root, config)?;
    match &config.cloud {
        Some(cloud) => {
            let client: Arc<dyn DocumentStore> = Arc::new(open_cloud(cloud)?);
            Ok(HybridProjectStore::new(client, local).with_collection(cloud.collection.clone()))
        }
        None => Ok(HybridProjectStore::local_only(local)),
    }
}
