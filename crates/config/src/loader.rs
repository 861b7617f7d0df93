use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::HuddleConfig};

/// Standard config file names, checked in order within each directory.
const CONFIG_FILENAMES: &[&str] = &["huddle.toml", "huddle.yaml", "huddle.yml", "huddle.json"];

/// On-disk config formats, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// A path without an extension is read as TOML.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            None | Some("toml") => Ok(Self::Toml),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some(ext) => anyhow::bail!("unsupported config format: .{ext}"),
        }
    }

    fn parse(self, raw: &str) -> anyhow::Result<HuddleConfig> {
        Ok(match self {
            Self::Toml => toml::from_str(raw)?,
            Self::Yaml => serde_yaml::from_str(raw)?,
            Self::Json => serde_json::from_str(raw)?,
        })
    }
}

/// Read one config file, substituting `${VAR}` references before parsing.
pub fn load_config(path: &Path) -> anyhow::Result<HuddleConfig> {
    let format = ConfigFormat::from_path(path)?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    format
        .parse(&substitute_env(&raw))
        .with_context(|| format!("invalid config in {}", path.display()))
}

/// Load the first config file found by [`find_config_file`]. Falls back to
/// [`HuddleConfig::default`] when none exists or it cannot be loaded.
pub fn discover_and_load() -> HuddleConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return HuddleConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    load_config(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
        HuddleConfig::default()
    })
}

/// Candidate config paths: the working directory first, then
/// [`config_dir`].
fn search_paths() -> Vec<PathBuf> {
    let dirs = std::iter::once(PathBuf::new()).chain(config_dir());
    dirs.flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .collect()
}

/// The first existing config file, shared with `validate`.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    search_paths().into_iter().find(|p| p.exists())
}

/// The user-global config directory (`~/.config/huddle/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "huddle").map(|d| d.config_dir().to_path_buf())
}
