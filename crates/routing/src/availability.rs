//! Narrow a project roster to the agents eligible for a conversation.
//!
//! Membership is the only availability dimension today. The filter stays
//! permissive: agent mode without a target passes everyone and leaves the
//! final pick to the speaking-authority resolver.

use huddle_common::Agent;

use crate::conversation_id::ConversationRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityScope<'a> {
    Project,
    Team { team_id: &'a str },
    Agent { agent_id: Option<&'a str> },
}

impl<'a> From<&'a ConversationRef> for AvailabilityScope<'a> {
    fn from(conversation: &'a ConversationRef) -> Self {
        match conversation {
            ConversationRef::Project { .. } => Self::Project,
            ConversationRef::Team { team_id, .. } => Self::Team {
                team_id: team_id.as_str(),
            },
            ConversationRef::Agent { agent_id, .. } => Self::Agent {
                agent_id: Some(agent_id.as_str()),
            },
        }
    }
}

impl AvailabilityScope<'_> {
    pub fn admits(&self, agent: &Agent) -> bool {
        match self {
            Self::Project => true,
            Self::Team { team_id } => agent.team_id.as_deref() == Some(*team_id),
            Self::Agent { agent_id: None } => true,
            Self::Agent {
                agent_id: Some(agent_id),
            } => agent.id == *agent_id,
        }
    }
}

/// Agents from `roster` (already restricted to one project) admitted by
/// `scope`, in roster order.
pub fn available_agents(roster: &[Agent], scope: AvailabilityScope<'_>) -> Vec<Agent> {
    roster
        .iter()
        .filter(|agent| scope.admits(agent))
        .cloned()
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Agent> {
        vec![
            Agent::new("pm", "saas", "Pat", "Product Manager"),
            Agent::new("dev", "saas", "Dee", "Developer").in_team("core"),
            Agent::new("ux", "saas", "Uma", "Designer").in_team("design"),
            Agent::new("tl", "saas", "Tom", "Tech Lead").in_team("core"),
        ]
    }

    fn ids(agents: &[Agent]) -> Vec<&str> {
        agents.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn project_mode_passes_everyone() {
        let roster = roster();
        assert_eq!(
            ids(&available_agents(&roster, AvailabilityScope::Project)),
            ["pm", "dev", "ux", "tl"]
        );
    }

    #[test]
    fn team_mode_filters_by_membership() {
        let roster = roster();
        let core = available_agents(&roster, AvailabilityScope::Team { team_id: "core" });
        assert_eq!(ids(&core), ["dev", "tl"]);
        let none = available_agents(&roster, AvailabilityScope::Team { team_id: "sales" });
        assert!(none.is_empty());
    }

    #[test]
    fn agent_mode_matches_exactly_or_passes_all() {
        let roster = roster();
        let exact = available_agents(&roster, AvailabilityScope::Agent {
            agent_id: Some("ux"),
        });
        assert_eq!(ids(&exact), ["ux"]);
        let open = available_agents(&roster, AvailabilityScope::Agent { agent_id: None });
        assert_eq!(open.len(), 4);
    }

    #[test]
    fn scope_from_conversation_ref() {
        let team = ConversationRef::team("saas", "design").unwrap();
        assert_eq!(AvailabilityScope::from(&team), AvailabilityScope::Team {
            team_id: "design"
        });
        let agent = ConversationRef::agent("saas", "tl").unwrap();
        assert_eq!(AvailabilityScope::from(&agent), AvailabilityScope::Agent {
            agent_id: Some("tl")
        });
    }
}
