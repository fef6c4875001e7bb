//! Mapping between `Project` and cloud document fields.
//!
//! Written documents store `created_at`/`updated_at` as native timestamps and
//! carry the owner in `userId`. Read documents are normalized back into the
//! common `Project` shape with `syncedToFirestore = true`.

use super::{Document, Fields, Value};
use crate::error::{Result, StoreError};
use crate::identity::UserId;
use crate::project::{Project, ProjectDraft, ProjectPatch};
use crate::timestamp::Timestamp;

pub const USER_FIELD: &str = "userId";
pub const ARCHIVED_FIELD: &str = "archived";
pub const CREATED_FIELD: &str = "created_at";
pub const UPDATED_FIELD: &str = "updated_at";

/// Keys that only exist on the in-memory `Project`, never in a document.
const TRANSIENT: &[&str] = &["id", "syncedToFirestore"];

fn object_fields(value: serde_json::Value) -> Result<Fields> {
    match Value::from_json(value) {
        Value::Map(fields) => Ok(fields),
        _ => Err(StoreError::CloudResponse(
            "expected a JSON object when encoding fields".into(),
        )),
    }
}

/// Every persisted field of `project`, timestamps as store-native values.
pub fn project_fields(project: &Project) -> Result<Fields> {
    let mut fields = object_fields(serde_json::to_value(project)?)?;
    for key in TRANSIENT {
        fields.remove(*key);
    }
    fields.insert(
        CREATED_FIELD.into(),
        Value::Timestamp(Timestamp::from_datetime(project.created_at)),
    );
    fields.insert(
        UPDATED_FIELD.into(),
        Value::Timestamp(Timestamp::from_datetime(project.updated_at)),
    );
    Ok(fields)
}

/// Fields for a brand-new cloud record owned by `user`. Both timestamps are
/// left to the store's clock.
pub fn new_project_fields(id: &str, draft: ProjectDraft, user: &UserId) -> Result<Fields> {
    let mut project = Project::from_draft(id, draft);
    project.user_id = Some(user.as_str().to_string());
    let mut fields = project_fields(&project)?;
    fields.insert(CREATED_FIELD.into(), Value::ServerTimestamp);
    fields.insert(UPDATED_FIELD.into(), Value::ServerTimestamp);
    Ok(fields)
}

/// Fields for copying an existing local project into the cloud under `user`.
/// `created_at` is preserved; `updated_at` comes from the store's clock.
pub fn migrated_project_fields(project: &Project, user: &UserId) -> Result<Fields> {
    let mut owned = project.clone();
    owned.user_id = Some(user.as_str().to_string());
    let mut fields = project_fields(&owned)?;
    fields.insert(UPDATED_FIELD.into(), Value::ServerTimestamp);
    Ok(fields)
}

/// Fields for a partial update. Only fields present in the patch are
/// written, plus a store-assigned `updated_at`.
pub fn patch_fields(patch: ProjectPatch) -> Result<Fields> {
    let mut fields = object_fields(serde_json::to_value(patch.normalized())?)?;
    fields.insert(UPDATED_FIELD.into(), Value::ServerTimestamp);
    Ok(fields)
}

/// Owner recorded on a document, if any.
pub fn owner(doc: &Document) -> Option<&str> {
    doc.fields.get(USER_FIELD).and_then(Value::as_str)
}

/// Normalize a cloud document into a `Project`.
pub fn project_from_document(doc: Document) -> Result<Project> {
    let mut object = serde_json::Map::new();
    for (key, value) in &doc.fields {
        object.insert(key.clone(), value.to_json()?);
    }
    object.insert("id".into(), serde_json::Value::String(doc.id.clone()));
    object.insert("syncedToFirestore".into(), serde_json::Value::Bool(true));
    let project: Project = serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| StoreError::CloudResponse(format!("document '{}': {e}", doc.id)))?;
    Ok(project)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
