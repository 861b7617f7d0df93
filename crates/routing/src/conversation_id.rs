//! Canonical conversation identifiers.
//!
//! Grammar (no other forms are valid):
//!
//! ```text
//! project-{projectId}
//! team-{projectId}-{teamId}
//! agent-{projectId}-{agentId}
//! ```
//!
//! Project, team, and agent ids may themselves contain hyphens, so a team or
//! agent identifier with more than three segments cannot be split without
//! knowing the project id. Parsing such an identifier without one is an
//! error, never a guess.

use {
    serde::{Deserialize, Serialize},
    std::{fmt, str::FromStr},
};

use crate::error::{Error, Result};

const SEPARATOR: char = '-';

/// Granularity of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Project,
    Team,
    Agent,
}

impl Scope {
    pub const ALL: [Self; 3] = [Self::Project, Self::Team, Self::Agent];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Team => "team",
            Self::Agent => "agent",
        }
    }

    /// Team and agent conversations name a context entity after the project.
    pub fn requires_context(self) -> bool {
        !matches!(self, Self::Project)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| Error::malformed(s, "must start with `project-`, `team-`, or `agent-`"))
    }
}

/// A decoded conversation identifier.
///
/// Pass this alongside the canonical string wherever it is already known
/// instead of re-parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum ConversationRef {
    Project {
        #[serde(rename = "projectId")]
        project_id: String,
    },
    Team {
        #[serde(rename = "projectId")]
        project_id: String,
        #[serde(rename = "teamId")]
        team_id: String,
    },
    Agent {
        #[serde(rename = "projectId")]
        project_id: String,
        #[serde(rename = "agentId")]
        agent_id: String,
    },
}

impl ConversationRef {
    /// Validate the parts and build a reference.
    pub fn new(scope: Scope, project_id: &str, context_id: Option<&str>) -> Result<Self> {
        require_non_empty("projectId", project_id)?;
        match (scope, context_id) {
            (Scope::Project, None) => Ok(Self::Project {
                project_id: project_id.to_string(),
            }),
            (Scope::Project, Some(_)) => Err(Error::ContextNotAllowed),
            (scope, context_id) => {
                let context_id = context_id
                    .filter(|c| !c.trim().is_empty())
                    .ok_or(Error::ContextRequired { scope })?;
                Ok(Self::scoped(scope, project_id, context_id))
            },
        }
    }

    pub fn project(project_id: &str) -> Result<Self> {
        Self::new(Scope::Project, project_id, None)
    }

    pub fn team(project_id: &str, team_id: &str) -> Result<Self> {
        Self::new(Scope::Team, project_id, Some(team_id))
    }

    pub fn agent(project_id: &str, agent_id: &str) -> Result<Self> {
        Self::new(Scope::Agent, project_id, Some(agent_id))
    }

    // Callers have already validated both parts.
    fn scoped(scope: Scope, project_id: &str, context_id: &str) -> Self {
        let project_id = project_id.to_string();
        let context_id = context_id.to_string();
        match scope {
            Scope::Project => Self::Project { project_id },
            Scope::Team => Self::Team {
                project_id,
                team_id: context_id,
            },
            Scope::Agent => Self::Agent {
                project_id,
                agent_id: context_id,
            },
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::Project { .. } => Scope::Project,
            Self::Team { .. } => Scope::Team,
            Self::Agent { .. } => Scope::Agent,
        }
    }

    pub fn project_id(&self) -> &str {
        match self {
            Self::Project { project_id }
            | Self::Team { project_id, .. }
            | Self::Agent { project_id, .. } => project_id,
        }
    }

    /// Team id or agent id; `None` for project scope.
    pub fn context_id(&self) -> Option<&str> {
        match self {
            Self::Project { .. } => None,
            Self::Team { team_id, .. } => Some(team_id),
            Self::Agent { agent_id, .. } => Some(agent_id),
        }
    }

    /// The canonical identifier string.
    pub fn conversation_id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConversationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.context_id() {
            None => write!(f, "{}{SEPARATOR}{}", self.scope(), self.project_id()),
            Some(context_id) => write!(
                f,
                "{}{SEPARATOR}{}{SEPARATOR}{context_id}",
                self.scope(),
                self.project_id()
            ),
        }
    }
}

/// Build a canonical conversation identifier.
pub fn build_conversation_id(
    scope: Scope,
    project_id: &str,
    context_id: Option<&str>,
) -> Result<String> {
    ConversationRef::new(scope, project_id, context_id).map(|r| r.to_string())
}

/// Parse a canonical conversation identifier.
///
/// With `known_project_id`, team and agent identifiers decode to exactly that
/// project and the literal remainder; an identifier with a different prefix
/// yields [`Error::ProjectMismatch`]. Without it, team and agent identifiers
/// with more than three segments yield [`Error::Ambiguous`].
pub fn parse_conversation_id(
    conversation_id: &str,
    known_project_id: Option<&str>,
) -> Result<ConversationRef> {
    let id = conversation_id.trim();
    require_non_empty("conversationId", id)?;
    if let Some(known) = known_project_id {
        require_non_empty("knownProjectId", known)?;
    }

    let segments: Vec<&str> = id.split(SEPARATOR).collect();
    let scope = segments[0]
        .parse::<Scope>()
        .map_err(|_| Error::malformed(id, "must start with `project-`, `team-`, or `agent-`"))?;

    match scope {
        Scope::Project => parse_project(id, segments.len(), known_project_id),
        scope => parse_scoped(id, scope, &segments, known_project_id),
    }
}

fn parse_project(id: &str, segment_count: usize, known: Option<&str>) -> Result<ConversationRef> {
    if segment_count < 2 {
        return Err(Error::malformed(id, "expected `project-{projectId}`"));
    }
    // Everything after the scope prefix, hyphens included.
    let project_id = &id[Scope::Project.as_str().len() + 1..];
    if project_id.trim().is_empty() {
        return Err(Error::malformed(id, "project id is empty"));
    }
    if let Some(known) = known
        && known != project_id
    {
        return Err(Error::ProjectMismatch {
            id: id.to_string(),
            project_id: known.to_string(),
        });
    }
    Ok(ConversationRef::Project {
        project_id: project_id.to_string(),
    })
}

fn parse_scoped(
    id: &str,
    scope: Scope,
    segments: &[&str],
    known: Option<&str>,
) -> Result<ConversationRef> {
    if segments.len() < 3 {
        return Err(Error::malformed(
            id,
            format!("expected `{scope}-{{projectId}}-{{contextId}}`"),
        ));
    }

    match known {
        Some(known) => {
            let prefix = format!("{scope}{SEPARATOR}{known}{SEPARATOR}");
            let Some(context_id) = id.strip_prefix(&prefix) else {
                return Err(Error::ProjectMismatch {
                    id: id.to_string(),
                    project_id: known.to_string(),
                });
            };
            if context_id.trim().is_empty() {
                return Err(Error::malformed(id, "context id is empty"));
            }
            Ok(ConversationRef::scoped(scope, known, context_id))
        },
        None if segments.len() > 3 => Err(Error::Ambiguous { id: id.to_string() }),
        None => {
            let (project_id, context_id) = (segments[1], segments[2]);
            if project_id.is_empty() || context_id.is_empty() {
                return Err(Error::malformed(id, "empty id segment"));
            }
            Ok(ConversationRef::scoped(scope, project_id, context_id))
        },
    }
}

/// The literal text before the first hyphen, without interpretation.
pub fn literal_scope_prefix(conversation_id: &str) -> &str {
    conversation_id
        .trim()
        .split(SEPARATOR)
        .next()
        .unwrap_or_default()
}

fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::EmptyIdentifier { field });
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(Scope::Project, "saas", None, "project-saas")]
    #[case(Scope::Team, "saas", Some("design"), "team-saas-design")]
    #[case(Scope::Agent, "saas-startup", Some("dev-1"), "agent-saas-startup-dev-1")]
    fn builds_canonical_ids(
        #[case] scope: Scope,
        #[case] project_id: &str,
        #[case] context_id: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(
            build_conversation_id(scope, project_id, context_id).unwrap(),
            expected
        );
    }

    #[test]
    fn build_rejects_bad_parts() {
        assert_eq!(
            build_conversation_id(Scope::Project, "saas", Some("x")),
            Err(Error::ContextNotAllowed)
        );
        assert_eq!(
            build_conversation_id(Scope::Team, "saas", None),
            Err(Error::ContextRequired { scope: Scope::Team })
        );
        assert_eq!(
            build_conversation_id(Scope::Agent, "saas", Some("  ")),
            Err(Error::ContextRequired {
                scope: Scope::Agent
            })
        );
        assert_eq!(
            build_conversation_id(Scope::Team, " ", Some("design")),
            Err(Error::EmptyIdentifier { field: "projectId" })
        );
    }

    #[test]
    fn parses_unambiguous_team_id() {
        let parsed = parse_conversation_id("team-saas-design", None).unwrap();
        assert_eq!(parsed.scope(), Scope::Team);
        assert_eq!(parsed.project_id(), "saas");
        assert_eq!(parsed.context_id(), Some("design"));
    }

    #[test]
    fn hyphenated_ids_require_known_project() {
        let id = "team-saas-startup-design-team";
        assert!(matches!(
            parse_conversation_id(id, None),
            Err(Error::Ambiguous { .. })
        ));

        let parsed = parse_conversation_id(id, Some("saas-startup")).unwrap();
        assert_eq!(parsed, ConversationRef::Team {
            project_id: "saas-startup".into(),
            team_id: "design-team".into(),
        });
    }

    #[test]
    fn known_project_mismatch_is_not_a_decode() {
        let err = parse_conversation_id("agent-other-proj-dev", Some("saas")).unwrap_err();
        assert_eq!(err, Error::ProjectMismatch {
            id: "agent-other-proj-dev".into(),
            project_id: "saas".into(),
        });

        let err = parse_conversation_id("project-other", Some("saas")).unwrap_err();
        assert!(matches!(err, Error::ProjectMismatch { .. }));
    }

    #[test]
    fn project_scope_keeps_hyphens() {
        let parsed = parse_conversation_id("  project-saas-startup ", None).unwrap();
        assert_eq!(parsed, ConversationRef::Project {
            project_id: "saas-startup".into(),
        });
        assert_eq!(parsed.context_id(), None);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("chat-saas-design")]
    #[case("project")]
    #[case("project-")]
    #[case("team-saas")]
    #[case("agent")]
    #[case("team--design")]
    #[case("agent-saas-")]
    fn rejects_malformed_ids(#[case] id: &str) {
        let err = parse_conversation_id(id, None).unwrap_err();
        assert!(
            matches!(
                err,
                Error::Malformed { .. } | Error::EmptyIdentifier { .. }
            ),
            "{id}: {err:?}"
        );
    }

    #[test]
    fn unknown_prefix_message_names_valid_scopes() {
        let err = parse_conversation_id("room-saas-x", None).unwrap_err();
        assert!(err.to_string().contains("must start with"));
    }

    #[test]
    fn known_project_requires_context_remainder() {
        assert!(matches!(
            parse_conversation_id("team-saas-startup-", Some("saas-startup")),
            Err(Error::Malformed { .. })
        ));
        assert_eq!(
            parse_conversation_id("team-saas-design", Some(" ")),
            Err(Error::EmptyIdentifier {
                field: "knownProjectId"
            })
        );
    }

    #[test]
    fn reference_serializes_tagged() {
        let r = ConversationRef::agent("saas", "dev-1").unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["scope"], "agent");
        assert_eq!(json["projectId"], "saas");
        assert_eq!(json["agentId"], "dev-1");
        assert_eq!(r.conversation_id(), "agent-saas-dev-1");
    }

    #[test]
    fn literal_prefix_is_uninterpreted() {
        assert_eq!(literal_scope_prefix(" team-a-b"), "team");
        assert_eq!(literal_scope_prefix("nohyphen"), "nohyphen");
    }
}
