//! Deterministic team lead selection.
//!
//! Rules, first match wins:
//! 1. An agent explicitly flagged as team lead.
//! 2. The first role keyword in [`DEFAULT_ROLE_PRIORITY`] (or a configured
//!    table) that matches any non-PM agent, taking the first such agent in
//!    roster order.
//! 3. The first agent in roster order.

use {
    serde::{Serialize, Serializer},
    std::fmt,
    tracing::debug,
};

use {
    crate::error::{Error, Result},
    huddle_common::Agent,
};

/// Role keywords in descending priority. Matching is a case-insensitive
/// substring test against [`Agent::role`].
pub const DEFAULT_ROLE_PRIORITY: &[&str] = &[
    "Tech Lead",
    "Team Lead",
    "Engineering Lead",
    "Lead Engineer",
    "Lead Developer",
    "Senior Engineer",
    "Senior Developer",
    "Architect",
];

/// Why an agent was picked as team lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamLeadReason {
    ExplicitTeamLead,
    RolePriority(String),
    FirstAgent,
}

impl fmt::Display for TeamLeadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExplicitTeamLead => f.write_str("explicit_team_lead"),
            Self::RolePriority(role) => write!(f, "role_priority:{role}"),
            Self::FirstAgent => f.write_str("fallback:first_agent"),
        }
    }
}

impl Serialize for TeamLeadReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamLead<'a> {
    pub lead: &'a Agent,
    pub reason: TeamLeadReason,
}

/// Case-insensitive substring match of a role keyword. A blank keyword
/// matches nothing.
pub fn role_matches(role: &str, keyword: &str) -> bool {
    let keyword = keyword.trim();
    !keyword.is_empty() && role.to_lowercase().contains(&keyword.to_lowercase())
}

/// Whether a role names a product manager: "product manager" anywhere, or a
/// standalone "PM" token. Token matching keeps words like "development" from
/// counting.
pub fn is_product_manager_role(role: &str) -> bool {
    role_matches(role, "product manager")
        || role
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token.eq_ignore_ascii_case("pm"))
}

/// Pick the lead of `team_id` using the built-in role priority table.
pub fn resolve_team_lead<'a>(team_id: &str, agents: &'a [Agent]) -> Result<TeamLead<'a>> {
    resolve_team_lead_with_priority(team_id, agents, DEFAULT_ROLE_PRIORITY)
}

/// Pick the lead of `team_id` using a caller-supplied role priority table.
pub fn resolve_team_lead_with_priority<'a, S: AsRef<str>>(
    team_id: &str,
    agents: &'a [Agent],
    role_priority: &[S],
) -> Result<TeamLead<'a>> {
    let first = agents.first().ok_or(Error::EmptyRoster {
        context: "team lead resolution",
    })?;

    let decision = if let Some(lead) = agents.iter().find(|a| a.is_team_lead) {
        TeamLead {
            lead,
            reason: TeamLeadReason::ExplicitTeamLead,
        }
    } else if let Some((keyword, lead)) = by_role_priority(agents, role_priority) {
        TeamLead {
            lead,
            reason: TeamLeadReason::RolePriority(keyword.to_string()),
        }
    } else {
        TeamLead {
            lead: first,
            reason: TeamLeadReason::FirstAgent,
        }
    };

    debug!(
        team_id,
        agent_id = %decision.lead.id,
        reason = %decision.reason,
        "resolved team lead"
    );
    Ok(decision)
}

fn by_role_priority<'a, 'k, S: AsRef<str>>(
    agents: &'a [Agent],
    role_priority: &'k [S],
) -> Option<(&'k str, &'a Agent)> {
    // Explicitly flagged PMs never reach this point.
    let eligible = || {
        agents
            .iter()
            .filter(|a| !is_product_manager_role(&a.role))
    };
    role_priority
        .iter()
        .map(|k| k.as_ref().trim())
        .filter(|k| !k.is_empty())
        .find_map(|keyword| {
            eligible()
                .find(|a| role_matches(&a.role, keyword))
                .map(|agent| (keyword, agent))
        })
}
