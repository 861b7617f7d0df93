//! Runtime environment and the single strict-mode switch.
//!
//! Strict mode makes routing validation failures and invariant violations
//! return errors (development and test). Lenient mode converts them into
//! error frames or log lines (production). The mode is resolved once at
//! startup and passed explicitly to every check.

use {
    serde::{Deserialize, Serialize},
    std::{fmt, str::FromStr},
    tracing::{debug, warn},
};

use crate::schema::HuddleConfig;

/// Environment variable naming the deployment environment.
pub const ENV_VAR: &str = "HUDDLE_ENV";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnv {
    #[default]
    Development,
    Test,
    Production,
}

impl RuntimeEnv {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }

    pub fn strict_mode(self) -> StrictMode {
        match self {
            Self::Development | Self::Test => StrictMode::Strict,
            Self::Production => StrictMode::Lenient,
        }
    }
}

impl fmt::Display for RuntimeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown runtime environment: {other}")),
        }
    }
}

/// How routing checks react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrictMode {
    /// Return the error to the caller.
    Strict,
    /// Log it and degrade gracefully.
    Lenient,
}

impl StrictMode {
    pub fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// Resolve the strict-mode flag from `HUDDLE_ENV` and the loaded config.
///
/// Call once at startup.
pub fn resolve_strict_mode(config: &HuddleConfig) -> StrictMode {
    resolve_strict_mode_with(config, std::env::var(ENV_VAR).ok().as_deref())
}

/// Precedence: `routing.strict` > `HUDDLE_ENV` > `routing.environment` >
/// development.
pub fn resolve_strict_mode_with(config: &HuddleConfig, env_value: Option<&str>) -> StrictMode {
    if let Some(strict) = config.routing.strict {
        return if strict {
            StrictMode::Strict
        } else {
            StrictMode::Lenient
        };
    }

    let from_env = env_value.and_then(|raw| match raw.parse::<RuntimeEnv>() {
        Ok(env) => Some(env),
        Err(e) => {
            warn!(error = %e, "ignoring invalid HUDDLE_ENV value");
            None
        },
    });
    let env = from_env
        .or(config.routing.environment)
        .unwrap_or_default();
    let mode = env.strict_mode();
    debug!(environment = %env, strict = mode.is_strict(), "resolved routing strict mode");
    mode
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(None, None, StrictMode::Strict)]
    #[case(Some("production"), None, StrictMode::Lenient)]
    #[case(Some("prod"), Some(RuntimeEnv::Development), StrictMode::Lenient)]
    #[case(Some("test"), Some(RuntimeEnv::Production), StrictMode::Strict)]
    #[case(None, Some(RuntimeEnv::Production), StrictMode::Lenient)]
    #[case(Some("staging"), Some(RuntimeEnv::Production), StrictMode::Lenient)]
    #[case(Some("staging"), None, StrictMode::Strict)]
    fn env_precedence(
        #[case] env_value: Option<&str>,
        #[case] configured: Option<RuntimeEnv>,
        #[case] expected: StrictMode,
    ) {
        let mut config = HuddleConfig::default();
        config.routing.environment = configured;
        assert_eq!(resolve_strict_mode_with(&config, env_value), expected);
    }

    #[test]
    fn explicit_strict_flag_wins() {
        let mut config = HuddleConfig::default();
        config.routing.strict = Some(false);
        assert_eq!(
            resolve_strict_mode_with(&config, Some("development")),
            StrictMode::Lenient
        );
        config.routing.strict = Some(true);
        assert_eq!(
            resolve_strict_mode_with(&config, Some("production")),
            StrictMode::Strict
        );
    }
}
