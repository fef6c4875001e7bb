use crate::error::{Result, StoreError};
use crate::hybrid::DEFAULT_COLLECTION;
use crate::local::DEFAULT_KEY;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// LocalConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalBackend {
    /// One JSON file per key under a directory.
    #[default]
    File,
    /// Single-file embedded database.
    Redb,
    /// Process memory; nothing survives exit.
    Memory,
}

impl LocalBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            LocalBackend::File => "file",
            LocalBackend::Redb => "redb",
            LocalBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub backend: LocalBackend,
    /// Directory (file backend) or database file (redb backend). Relative
    /// paths resolve against the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Key the project array is stored under.
    #[serde(default = "default_key")]
    pub key: String,
}

fn default_key() -> String {
    DEFAULT_KEY.to_string()
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            backend: LocalBackend::default(),
            path: None,
            key: default_key(),
        }
    }
}

impl LocalConfig {
    /// Where the configured backend keeps its data under `root`.
    pub fn resolved_path(&self, root: &Path) -> PathBuf {
        match (&self.path, self.backend) {
            (Some(p), _) => paths::resolve(root, p),
            (None, LocalBackend::Redb) => paths::redb_path(root),
            (None, _) => paths::local_dir(root),
        }
    }
}

// ---------------------------------------------------------------------------
// CloudConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    pub project_id: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Environment variable holding the bearer token. When the variable is
    /// unset requests go out unauthenticated (e.g. against an emulator).
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Per-request client timeout; `None` leaves it to the HTTP client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_database() -> String {
    crate::cloud::firestore::DEFAULT_DATABASE.to_string()
}

fn default_base_url() -> String {
    crate::cloud::firestore::DEFAULT_BASE_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_token_env() -> String {
    "BACKLOG_CLOUD_TOKEN".to_string()
}

impl CloudConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: default_database(),
            base_url: default_base_url(),
            collection: default_collection(),
            token_env: default_token_env(),
            timeout_secs: None,
        }
    }

    /// Token from `token_env`, if set and non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudConfig>,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            local: LocalConfig::default(),
            cloud: None,
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(StoreError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.local.key.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "local.key is empty".to_string(),
            });
        } else if self.local.backend == LocalBackend::File
            && paths::validate_id(&self.local.key).is_err()
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "local.key '{}' is not usable as a file name with the file backend",
                    self.local.key
                ),
            });
        }

        if self.local.backend == LocalBackend::Memory {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "local.backend is 'memory': projects are lost when the process exits"
                    .to_string(),
            });
        }

        if let Some(cloud) = &self.cloud {
            if cloud.project_id.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "cloud.project_id is empty".to_string(),
                });
            }
            if cloud.collection.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "cloud.collection is empty".to_string(),
                });
            }
            if !(cloud.base_url.starts_with("http://") || cloud.base_url.starts_with("https://"))
            {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("cloud.base_url '{}' is not an http(s) URL", cloud.base_url),
                });
            }
            if cloud.timeout_secs == Some(0) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "cloud.timeout_secs is 0: every cloud call will time out and fall back"
                        .to_string(),
                });
            }
            if cloud.token_env.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "cloud.token_env is empty: requests will be unauthenticated"
                        .to_string(),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
