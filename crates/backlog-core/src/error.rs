use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not initialized: run 'backlog init'")]
    NotInitialized,

    #[error("invalid project id '{0}': must be 1-128 characters of [A-Za-z0-9_-]")]
    InvalidId(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    #[error("cloud store is not configured")]
    CloudNotConfigured,

    #[error("cloud store error ({status}): {body}")]
    CloudApi { status: u16, body: String },

    #[error("cloud request failed: {0}")]
    CloudRequest(#[from] reqwest::Error),

    #[error("malformed cloud response: {0}")]
    CloudResponse(String),

    #[error("cloud store unavailable: {0}")]
    CloudUnavailable(String),

    #[error("cloud delete of '{id}' failed (local copy removed): {source}")]
    CloudDelete {
        id: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error("local store error: {0}")]
    LocalBackend(String),

    #[error("local store holds a corrupt project list under '{key}': {source}")]
    CorruptLocal {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("timestamp out of range: {0}")]
    TimestampRange(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
