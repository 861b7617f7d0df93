use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("failed to parse roster file {path}: {source}")]
    TomlDeserialize {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("unknown project `{project_id}`")]
    UnknownProject { project_id: String },
    #[error("agent id `{agent_id}` is reserved for system messages (project `{project_id}`)")]
    ReservedAgentId {
        project_id: String,
        agent_id: String,
    },
    #[error("agent `{agent_id}` references unknown team `{team_id}` in project `{project_id}`")]
    UnknownTeam {
        project_id: String,
        team_id: String,
        agent_id: String,
    },
}

impl Error {
    #[must_use]
    pub fn unknown_project(project_id: impl Into<String>) -> Self {
        Self::UnknownProject {
            project_id: project_id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
