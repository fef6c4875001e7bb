//! `HybridProjectStore`: one project CRUD surface over a cloud document store
//! and a local key-value store.
//!
//! The identity passed to each call picks the authoritative store: with a user
//! (and a configured cloud backend) the cloud store is tried first and any
//! cloud failure falls back to the local store; without a user only the local
//! store is used. Local-store failures have no fallback and propagate.

use crate::cloud::codec::{self, ARCHIVED_FIELD, UPDATED_FIELD, USER_FIELD};
use crate::cloud::{DocumentStore, Filter, OrderBy};
use crate::error::{Result, StoreError};
use crate::identity::UserId;
use crate::local::{KeyValueStore, LocalProjectStore};
use crate::paths;
use crate::project::{mint_project_id, Project, ProjectDraft, ProjectPatch};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Collection cloud projects live in unless configured otherwise.
pub const DEFAULT_COLLECTION: &str = "projects";

/// Outcome of [`HybridProjectStore::migrate_to_cloud`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Local projects considered.
    pub total: usize,
    /// Projects written to the cloud store.
    pub migrated: usize,
    /// Ids whose cloud write failed; their local copies are untouched.
    pub failed_ids: Vec<String>,
}

pub struct HybridProjectStore<C, K> {
    cloud: Option<C>,
    local: LocalProjectStore<K>,
    collection: String,
}

impl<C: DocumentStore, K: KeyValueStore> HybridProjectStore<C, K> {
    pub fn new(cloud: C, local: LocalProjectStore<K>) -> Self {
        Self::from_parts(Some(cloud), local)
    }

    /// A store with no cloud backend; every identity is ignored.
    pub fn local_only(local: LocalProjectStore<K>) -> Self {
        Self::from_parts(None, local)
    }

    pub fn from_parts(cloud: Option<C>, local: LocalProjectStore<K>) -> Self {
        Self {
            cloud,
            local,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn local(&self) -> &LocalProjectStore<K> {
        &self.local
    }

    pub fn cloud(&self) -> Option<&C> {
        self.cloud.as_ref()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The cloud store and user to use for this call, if both are present.
    fn cloud_for<'a>(&'a self, user: Option<&'a UserId>) -> Option<(&'a C, &'a UserId)> {
        match (self.cloud.as_ref(), user) {
            (Some(cloud), Some(user)) => {
                debug!(user = %user, "using cloud store");
                Some((cloud, user))
            }
            (None, Some(user)) => {
                debug!(user = %user, "no cloud backend configured; using local store");
                None
            }
            _ => {
                debug!("no identity; using local store");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Non-archived projects, most recently updated first.
    pub async fn list(&self, user: Option<&UserId>) -> Result<Vec<Project>> {
        if let Some((cloud, user)) = self.cloud_for(user) {
            match self.cloud_list(cloud, user).await {
                Ok(projects) => return Ok(projects),
                Err(e) => warn!(error = %e, "cloud list failed; falling back to local store"),
            }
        }
        self.local.list()
    }

    /// Create a project. Cloud saves mint a fresh id; local saves overwrite
    /// an existing project with the same `product.description`.
    ///
    /// Only a failed cloud create falls back to the local store. Once the
    /// document is written the project is reported as synced even if reading
    /// it back fails.
    pub async fn save(&self, draft: ProjectDraft, user: Option<&UserId>) -> Result<Project> {
        if let Some((cloud, user)) = self.cloud_for(user) {
            match self.cloud_create(cloud, draft.clone(), user).await {
                Ok(id) => return Ok(self.cloud_read_back(cloud, id, draft, user).await),
                Err(e) => warn!(error = %e, "cloud save failed; falling back to local store"),
            }
        }
        self.local.save(draft)
    }

    pub async fn load(&self, id: &str, user: Option<&UserId>) -> Result<Option<Project>> {
        paths::validate_id(id)?;
        if let Some((cloud, user)) = self.cloud_for(user) {
            match self.cloud_load(cloud, id, user).await {
                Ok(Some(project)) => return Ok(Some(project)),
                Ok(None) => debug!(id, "not in cloud store; trying local store"),
                Err(e) => warn!(id, error = %e, "cloud load failed; falling back to local store"),
            }
        }
        self.local.load(id)
    }

    /// Merge `patch` into the project. Fields absent from the patch are kept.
    pub async fn update(
        &self,
        id: &str,
        patch: ProjectPatch,
        user: Option<&UserId>,
    ) -> Result<Option<Project>> {
        paths::validate_id(id)?;
        if let Some((cloud, user)) = self.cloud_for(user) {
            match self.cloud_update(cloud, id, patch.clone(), user).await {
                Ok(Some(project)) => return Ok(Some(project)),
                Ok(None) => debug!(id, "not in cloud store; updating local store"),
                Err(e) => warn!(id, error = %e, "cloud update failed; falling back to local store"),
            }
        }
        self.local.update(id, patch)
    }

    pub async fn archive(&self, id: &str, user: Option<&UserId>) -> Result<Option<Project>> {
        self.update(id, ProjectPatch::archived(true), user).await
    }

    pub async fn restore(&self, id: &str, user: Option<&UserId>) -> Result<Option<Project>> {
        self.update(id, ProjectPatch::archived(false), user).await
    }

    /// Remove the project from the local store and, with a user, from the
    /// cloud store. The local copy is removed first; a cloud failure is then
    /// returned as [`StoreError::CloudDelete`]. Unknown ids are a no-op.
    pub async fn delete(&self, id: &str, user: Option<&UserId>) -> Result<()> {
        paths::validate_id(id)?;
        if self.local.delete(id)? {
            debug!(id, "removed local copy");
        }
        if let Some((cloud, user)) = self.cloud_for(user) {
            if let Err(e) = self.cloud_delete(cloud, id, user).await {
                warn!(id, error = %e, "cloud delete failed");
                return Err(StoreError::CloudDelete {
                    id: id.to_string(),
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }

    /// Copy every local project (archived ones included) into the cloud store
    /// under `user`, keeping ids. Failures are recorded and skipped.
    pub async fn migrate_to_cloud(&self, user: &UserId) -> Result<MigrationReport> {
        let cloud = self.cloud.as_ref().ok_or(StoreError::CloudNotConfigured)?;
        let projects = self.local.all()?;
        let mut report = MigrationReport {
            total: projects.len(),
            ..MigrationReport::default()
        };

        for project in &projects {
            let written = match codec::migrated_project_fields(project, user) {
                Ok(fields) => cloud.set_doc(&self.collection, &project.id, fields).await,
                Err(e) => Err(e),
            };
            match written {
                Ok(()) => report.migrated += 1,
                Err(e) => {
                    warn!(id = %project.id, error = %e, "migration of project failed; skipping");
                    report.failed_ids.push(project.id.clone());
                }
            }
        }

        info!(
            user = %user,
            total = report.total,
            migrated = report.migrated,
            failed = report.failed_ids.len(),
            "migration to cloud finished"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Cloud paths
    // -----------------------------------------------------------------------

    async fn cloud_list(&self, cloud: &C, user: &UserId) -> Result<Vec<Project>> {
        let docs = cloud
            .query_docs(
                &self.collection,
                &[
                    Filter::equal(USER_FIELD, user.as_str()),
                    Filter::equal(ARCHIVED_FIELD, false),
                ],
                Some(&OrderBy::desc(UPDATED_FIELD)),
            )
            .await?;
        let mut projects = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = doc.id.clone();
            match codec::project_from_document(doc) {
                Ok(project) => projects.push(project),
                Err(e) => warn!(id = %id, error = %e, "skipping unreadable cloud project"),
            }
        }
        Ok(projects)
    }

    async fn cloud_create(&self, cloud: &C, draft: ProjectDraft, user: &UserId) -> Result<String> {
        let id = mint_project_id();
        let fields = codec::new_project_fields(&id, draft, user)?;
        cloud.create_doc(&self.collection, Some(&id), fields).await
    }

    /// The stored project, or one built from the written draft when the
    /// document cannot be read back.
    async fn cloud_read_back(
        &self,
        cloud: &C,
        id: String,
        draft: ProjectDraft,
        user: &UserId,
    ) -> Project {
        match self.cloud_load(cloud, &id, user).await {
            Ok(Some(project)) => return project,
            Ok(None) => warn!(id = %id, "created cloud project not found on read-back"),
            Err(e) => warn!(id = %id, error = %e, "reading back created cloud project failed"),
        }
        let mut project = Project::from_draft(id, draft);
        project.user_id = Some(user.as_str().to_string());
        project.synced_to_firestore = true;
        project
    }

    /// Fetch a document owned by `user`. Documents owned by anyone else are
    /// reported as missing.
    async fn cloud_load(&self, cloud: &C, id: &str, user: &UserId) -> Result<Option<Project>> {
        let Some(doc) = cloud.get_doc(&self.collection, id).await? else {
            return Ok(None);
        };
        if codec::owner(&doc) != Some(user.as_str()) {
            debug!(id, "cloud document belongs to another user");
            return Ok(None);
        }
        codec::project_from_document(doc).map(Some)
    }

    async fn cloud_update(
        &self,
        cloud: &C,
        id: &str,
        patch: ProjectPatch,
        user: &UserId,
    ) -> Result<Option<Project>> {
        let Some(current) = self.cloud_load(cloud, id, user).await? else {
            return Ok(None);
        };
        let fields = codec::patch_fields(patch.resolved_against(&current))?;
        if !cloud.update_doc(&self.collection, id, fields).await? {
            return Ok(None);
        }
        self.cloud_load(cloud, id, user).await
    }

    async fn cloud_delete(&self, cloud: &C, id: &str, user: &UserId) -> Result<()> {
        if let Some(doc) = cloud.get_doc(&self.collection, id).await? {
            if codec::owner(&doc) != Some(user.as_str()) {
                debug!(id, "not deleting cloud document owned by another user");
                return Ok(());
            }
        }
        cloud.delete_doc(&self.collection, id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
