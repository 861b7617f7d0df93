//! Configuration validation engine.
//!
//! Validates TOML configuration files against the known schema, detects
//! unknown or misspelled fields, and flags settings that will misbehave at
//! runtime.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use crate::{mode::RuntimeEnv, schema::HuddleConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "routing",
    /// "storage", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "routing.role_priority[2]"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

/// Mirrors every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    Struct(HashMap::from([
        (
            "routing",
            Struct(HashMap::from([
                ("environment", Leaf),
                ("strict", Leaf),
                ("role_priority", Leaf),
            ])),
        ),
        (
            "storage",
            Struct(HashMap::from([("database_url", Leaf), ("roster_path", Leaf)])),
        ),
    ]))
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    if !matches!(
        crate::loader::ConfigFormat::from_path(actual_path),
        Ok(crate::loader::ConfigFormat::Toml)
    ) {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "only TOML config files are checked",
            )],
            config_path,
        };
    }

    match std::fs::read_to_string(actual_path) {
        Ok(content) => {
            let mut result = validate_toml_str(&content);
            check_roster_path(&content, actual_path, &mut result.diagnostics);
            result.config_path = config_path;
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path,
        },
    }
}

/// Validate a TOML string without touching the file system.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&toml_value, &build_schema_map(), "", &mut diagnostics);

    match toml::from_str::<HuddleConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (toml::Value::Table(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }
        let level = if prefix.is_empty() {
            " at top level"
        } else {
            ""
        };
        let message = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field{level} (did you mean \"{s}\"?)"),
            None => format!("unknown field{level}"),
        };
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "unknown-field",
            path,
            message,
        ));
    }
}

fn check_semantics(config: &HuddleConfig, diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    for (i, role) in config.routing.role_priority.iter().enumerate() {
        let path = format!("routing.role_priority[{i}]");
        let normalized = role.trim().to_lowercase();
        if normalized.is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "routing",
                path,
                "blank role never matches an agent",
            ));
        } else if !seen.insert(normalized) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "routing",
                path,
                format!("duplicate role \"{role}\" has no effect"),
            ));
        }
    }

    if config.routing.environment == Some(RuntimeEnv::Production)
        && config.routing.strict == Some(true)
    {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "routing",
            "routing.strict",
            "strict mode in production rejects requests instead of falling back",
        ));
    }

    if !config.storage.database_url.starts_with("sqlite:") {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "storage",
            "storage.database_url",
            "only sqlite: connection strings are supported",
        ));
    }
}

/// Resolve `storage.roster_path` relative to the config file and check it
/// exists.
fn check_roster_path(toml_str: &str, config_path: &Path, diagnostics: &mut Vec<Diagnostic>) {
    let Ok(config) = toml::from_str::<HuddleConfig>(toml_str) else {
        return;
    };
    let Some(roster_path) = config.storage.roster_path else {
        return;
    };
    let resolved = if roster_path.is_absolute() {
        roster_path
    } else {
        config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(roster_path)
    };
    if !resolved.is_file() {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "file-ref",
            "storage.roster_path",
            format!("roster file not found: {}", resolved.display()),
        ));
    }
}
