//! Configuration loading, env substitution, and runtime-mode resolution.
//!
//! Config files: `huddle.toml`, `huddle.yaml`, or `huddle.json`
//! Searched in `./` then `~/.config/huddle/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all
//! string values.

pub mod env_subst;
pub mod loader;
pub mod mode;
pub mod schema;
pub mod validate;

pub use {
    loader::{ConfigFormat, config_dir, discover_and_load, load_config},
    mode::{RuntimeEnv, StrictMode, resolve_strict_mode, resolve_strict_mode_with},
    schema::{HuddleConfig, RoutingConfig, StorageConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
