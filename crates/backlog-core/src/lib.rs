pub mod artifact;
pub mod cloud;
pub mod config;
pub mod error;
pub mod hybrid;
pub mod identity;
pub mod io;
pub mod local;
pub mod paths;
pub mod project;
pub mod store;
pub mod timestamp;
pub mod types;

pub use error::{Result, StoreError};
pub use hybrid::{HybridProjectStore, MigrationReport};
pub use identity::UserId;
pub use project::{Project, ProjectDraft, ProjectPatch};
