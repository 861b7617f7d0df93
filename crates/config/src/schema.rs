//! Config schema types.
//!
//! Every section is `#[serde(default)]` so a partial (or missing) config file
//! always yields a usable [`HuddleConfig`].

use {
    serde::{Deserialize, Serialize},
    std::path::PathBuf,
};

use crate::mode::RuntimeEnv;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub routing: RoutingConfig,
    pub storage: StorageConfig,
}

/// Responder selection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Deployment environment. `HUDDLE_ENV` wins when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<RuntimeEnv>,
    /// Force strict (`true`) or lenient (`false`) failure handling regardless
    /// of the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    /// Ordered role keywords used to pick a team lead. Empty means the
    /// built-in table.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub role_priority: Vec<String>,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sqlx connection string for message and roster storage.
    pub database_url: String,
    /// Optional TOML roster file, used instead of the database roster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roster_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://huddle.db?mode=rwc".into(),
            roster_path: None,
        }
    }
}
