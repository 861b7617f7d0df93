//! Roster and message-sender types shared by the routing, storage, and chat
//! crates.

use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Id reserved for system messages. No agent may carry it.
pub const RESERVED_AGENT_ID: &str = "system";

/// Whether `id` collides with [`RESERVED_AGENT_ID`], ignoring case and
/// surrounding whitespace.
pub fn is_reserved_agent_id(id: &str) -> bool {
    id.trim().eq_ignore_ascii_case(RESERVED_AGENT_ID)
}

/// Top-level container. The id is opaque and may contain hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// A team inside one project. Membership lives on [`Agent::team_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub project_id: String,
    pub name: String,
}

/// An AI agent belonging to one project and at most one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    pub name: String,
    /// Free-text role, e.g. "Senior Engineer" or "Product Manager".
    #[serde(default)]
    pub role: String,
    /// Explicit team-lead designation. Wins over any role heuristic.
    #[serde(default)]
    pub is_team_lead: bool,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            team_id: None,
            name: name.into(),
            role: role.into(),
            is_team_lead: false,
        }
    }

    #[must_use]
    pub fn in_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    #[must_use]
    pub fn team_lead(mut self) -> Self {
        self.is_team_lead = true;
        self
    }

    pub fn has_reserved_id(&self) -> bool {
        is_reserved_agent_id(&self.id)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    User,
    Agent,
    System,
}

impl SenderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SenderKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            "system" => Ok(Self::System),
            other => Err(crate::Error::UnknownSenderKind(other.to_string())),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_deserializes_with_defaults() {
        let agent: Agent = serde_json::from_value(serde_json::json!({
            "id": "dev-1",
            "projectId": "saas-startup",
            "name": "Dev",
        }))
        .unwrap();
        assert_eq!(agent.role, "");
        assert!(agent.team_id.is_none());
        assert!(!agent.is_team_lead);
    }

    #[test]
    fn sender_kind_roundtrips_through_str() {
        for kind in [SenderKind::User, SenderKind::Agent, SenderKind::System] {
            assert_eq!(kind.as_str().parse::<SenderKind>().unwrap(), kind);
        }
        assert!("bot".parse::<SenderKind>().is_err());
    }

    #[test]
    fn system_id_is_reserved() {
        for id in ["system", "System", " SYSTEM "] {
            assert!(Agent::new(id, "acme", "Sys", "").has_reserved_id(), "{id:?}");
        }
        assert!(!Agent::new("system-admin", "acme", "Ada", "Admin").has_reserved_id());
    }
}
