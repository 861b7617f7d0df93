//! Speaking authority: which agent may produce the next reply.
//!
//! Rules, first applicable wins:
//! 1. Explicit addressing of an available agent. Overrides everything else.
//! 2. Agent scope: the conversation's target agent.
//! 3. Project scope: the first product manager.
//! 4. Team scope: the team lead (see [`crate::team_lead`]).
//! 5. The first available agent.
//!
//! A rule whose target is missing from the candidates is skipped, never
//! fatal. Only an empty candidate list is an error.

use {
    serde::Serialize,
    std::fmt,
    tracing::{debug, warn},
};

use {
    crate::{
        conversation_id::{ConversationRef, Scope, parse_conversation_id},
        error::{Error, Result},
        team_lead::{
            TeamLeadReason, resolve_team_lead, resolve_team_lead_with_priority, role_matches,
        },
    },
    huddle_common::Agent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityReason {
    ExplicitAddressing,
    DirectAgentConversation,
    ProjectScopePmAuthority,
    TeamScopeTeamLead,
    FallbackFirstAgent,
}

impl AuthorityReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExplicitAddressing => "explicit_addressing",
            Self::DirectAgentConversation => "direct_agent_conversation",
            Self::ProjectScopePmAuthority => "project_scope_pm_authority",
            Self::TeamScopeTeamLead => "team_scope_team_lead",
            Self::FallbackFirstAgent => "fallback_first_agent",
        }
    }
}

impl fmt::Display for AuthorityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the resolver needs. No ambient state is consulted.
#[derive(Debug, Clone, Copy)]
pub struct AuthorityRequest<'a> {
    pub scope: Scope,
    pub conversation_id: &'a str,
    /// Candidates, normally the output of
    /// [`available_agents`](crate::availability::available_agents).
    pub agents: &'a [Agent],
    pub addressed_agent_id: Option<&'a str>,
    /// Thread this through whenever the caller knows it; hyphenated ids cannot
    /// be decoded without it.
    pub known_project_id: Option<&'a str>,
    pub role_priority: Option<&'a [String]>,
}

impl<'a> AuthorityRequest<'a> {
    pub fn new(scope: Scope, conversation_id: &'a str, agents: &'a [Agent]) -> Self {
        Self {
            scope,
            conversation_id,
            agents,
            addressed_agent_id: None,
            known_project_id: None,
            role_priority: None,
        }
    }

    #[must_use]
    pub fn addressed_to(mut self, agent_id: Option<&'a str>) -> Self {
        self.addressed_agent_id = agent_id;
        self
    }

    #[must_use]
    pub fn in_project(mut self, project_id: &'a str) -> Self {
        self.known_project_id = Some(project_id);
        self
    }

    #[must_use]
    pub fn with_role_priority(mut self, role_priority: &'a [String]) -> Self {
        self.role_priority = Some(role_priority);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingAuthority<'a> {
    pub allowed_speaker: &'a Agent,
    pub reason: AuthorityReason,
    /// Set when the team lead resolver made the pick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_lead_reason: Option<TeamLeadReason>,
}

impl<'a> SpeakingAuthority<'a> {
    fn new(allowed_speaker: &'a Agent, reason: AuthorityReason) -> Self {
        Self {
            allowed_speaker,
            reason,
            team_lead_reason: None,
        }
    }
}

/// Resolve the agent allowed to speak next.
pub fn resolve_speaking_authority<'a>(
    request: &AuthorityRequest<'a>,
) -> Result<SpeakingAuthority<'a>> {
    let agents = request.agents;
    let first = agents.first().ok_or(Error::EmptyRoster {
        context: "speaking authority resolution",
    })?;

    let decision = explicit_addressing(request)
        .or_else(|| match request.scope {
            Scope::Agent => direct_agent_target(request).map(|agent| {
                SpeakingAuthority::new(agent, AuthorityReason::DirectAgentConversation)
            }),
            Scope::Project => agents
                .iter()
                .find(|a| role_matches(&a.role, "product manager"))
                .map(|pm| SpeakingAuthority::new(pm, AuthorityReason::ProjectScopePmAuthority)),
            Scope::Team => team_lead(request),
        })
        .unwrap_or_else(|| SpeakingAuthority::new(first, AuthorityReason::FallbackFirstAgent));

    debug!(
        conversation_id = request.conversation_id,
        scope = %request.scope,
        agent_id = %decision.allowed_speaker.id,
        reason = %decision.reason,
        "resolved speaking authority"
    );
    Ok(decision)
}

fn explicit_addressing<'a>(request: &AuthorityRequest<'a>) -> Option<SpeakingAuthority<'a>> {
    let addressed = request
        .addressed_agent_id
        .map(str::trim)
        .filter(|id| !id.is_empty())?;
    let agents = request.agents;
    match agents.iter().find(|a| a.id == addressed) {
        Some(agent) => Some(SpeakingAuthority::new(agent, AuthorityReason::ExplicitAddressing)),
        None => {
            debug!(
                addressed_agent_id = addressed,
                "addressed agent is not a candidate, applying scope rules"
            );
            None
        },
    }
}

fn direct_agent_target<'a>(request: &AuthorityRequest<'a>) -> Option<&'a Agent> {
    let agents = request.agents;
    match parse_conversation_id(request.conversation_id, request.known_project_id) {
        Ok(ConversationRef::Agent { agent_id, .. }) => agents.iter().find(|a| a.id == agent_id),
        Ok(other) => {
            warn!(
                conversation_id = request.conversation_id,
                parsed_scope = %other.scope(),
                "agent-scope request carries a non-agent conversation ID"
            );
            None
        },
        Err(e) => {
            debug!(
                conversation_id = request.conversation_id,
                error = %e,
                "structured parse failed, matching roster ids against the ID tail"
            );
            match_id_tail(request.conversation_id, agents)
        },
    }
}

/// The agent whose id is the hyphen-delimited tail of `conversation_id`.
/// The longest matching id wins; ties keep roster order.
fn match_id_tail<'a>(conversation_id: &str, agents: &'a [Agent]) -> Option<&'a Agent> {
    let id = conversation_id.trim();
    let mut best: Option<&'a Agent> = None;
    for agent in agents {
        let is_tail = !agent.id.is_empty()
            && id
                .strip_suffix(agent.id.as_str())
                .is_some_and(|head| head.ends_with('-'));
        if is_tail && best.is_none_or(|b| agent.id.len() > b.id.len()) {
            best = Some(agent);
        }
    }
    best
}

fn team_lead<'a>(request: &AuthorityRequest<'a>) -> Option<SpeakingAuthority<'a>> {
    let team_id = match parse_conversation_id(request.conversation_id, request.known_project_id) {
        Ok(ConversationRef::Team { team_id, .. }) => team_id,
        Ok(other) => {
            warn!(
                conversation_id = request.conversation_id,
                parsed_scope = %other.scope(),
                "team-scope request carries a non-team conversation ID"
            );
            return None;
        },
        Err(e) => {
            warn!(
                conversation_id = request.conversation_id,
                error = %e,
                "cannot recover team id, skipping team lead rule"
            );
            return None;
        },
    };

    let resolved = match request.role_priority {
        Some(priority) => resolve_team_lead_with_priority(&team_id, request.agents, priority),
        None => resolve_team_lead(&team_id, request.agents),
    };
    // The roster was checked non-empty by the caller.
    let lead = resolved.ok()?;
    Some(SpeakingAuthority {
        allowed_speaker: lead.lead,
        reason: AuthorityReason::TeamScopeTeamLead,
        team_lead_reason: Some(lead.reason),
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn dev() -> Agent {
        Agent::new("dev", "saas", "Dev", "Senior Developer").in_team("core")
    }

    fn pm() -> Agent {
        Agent::new("pm", "saas", "PM", "Product Manager").in_team("core")
    }

    fn designer() -> Agent {
        Agent::new("designer", "saas", "Designer", "Designer").in_team("design")
    }

    fn tech_lead() -> Agent {
        Agent::new("tech-lead", "saas", "TechLead", "Tech Lead").in_team("core")
    }

    #[test]
    fn project_scope_prefers_pm() {
        let agents = vec![dev(), pm(), designer()];
        let req = AuthorityRequest::new(Scope::Project, "project-saas", &agents);
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "pm");
        assert_eq!(decision.reason.as_str(), "project_scope_pm_authority");
    }

    #[test]
    fn team_scope_uses_team_lead_not_pm() {
        let agents = vec![pm(), tech_lead()];
        let req = AuthorityRequest::new(Scope::Team, "team-saas-core", &agents);
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "tech-lead");
        assert_eq!(decision.reason.as_str(), "team_scope_team_lead");
        assert_eq!(
            decision.team_lead_reason,
            Some(TeamLeadReason::RolePriority("Tech Lead".into()))
        );
    }

    #[test]
    fn explicit_addressing_overrides_pm_authority() {
        let agents = vec![dev(), pm(), designer()];
        let req = AuthorityRequest::new(Scope::Project, "project-saas", &agents)
            .addressed_to(Some("designer"));
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "designer");
        assert_eq!(decision.reason.as_str(), "explicit_addressing");
    }

    #[test]
    fn explicit_addressing_overrides_team_lead() {
        let agents = vec![pm(), tech_lead(), dev()];
        let req =
            AuthorityRequest::new(Scope::Team, "team-saas-core", &agents).addressed_to(Some("dev"));
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "dev");
        assert_eq!(decision.reason, AuthorityReason::ExplicitAddressing);
        assert!(decision.team_lead_reason.is_none());
    }

    #[test]
    fn unknown_addressee_falls_through_to_scope_rules() {
        let agents = vec![dev(), pm()];
        let req = AuthorityRequest::new(Scope::Project, "project-saas", &agents)
            .addressed_to(Some("ghost"));
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "pm");
        assert_eq!(decision.reason, AuthorityReason::ProjectScopePmAuthority);
    }

    #[test]
    fn blank_addressee_is_ignored() {
        let agents = vec![dev(), pm()];
        let req =
            AuthorityRequest::new(Scope::Project, "project-saas", &agents).addressed_to(Some("  "));
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.reason, AuthorityReason::ProjectScopePmAuthority);
    }

    #[test]
    fn agent_scope_targets_the_conversation_agent() {
        let agents = vec![dev(), pm(), designer()];
        let req = AuthorityRequest::new(Scope::Agent, "agent-saas-designer", &agents);
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "designer");
        assert_eq!(decision.reason, AuthorityReason::DirectAgentConversation);
    }

    #[test]
    fn agent_scope_with_hyphens_uses_known_project() {
        let agents = vec![dev(), tech_lead()];
        let req = AuthorityRequest::new(Scope::Agent, "agent-saas-startup-tech-lead", &agents)
            .in_project("saas-startup");
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "tech-lead");
        assert_eq!(decision.reason, AuthorityReason::DirectAgentConversation);
    }

    #[test]
    fn agent_scope_tail_match_when_parse_is_ambiguous() {
        let lead = Agent::new("lead", "saas-startup", "Lead", "Tech Lead");
        let agents = vec![dev(), lead, tech_lead()];
        // No known project: the structured parse is ambiguous.
        let req = AuthorityRequest::new(Scope::Agent, "agent-saas-startup-tech-lead", &agents);
        let decision = resolve_speaking_authority(&req).unwrap();
        // "tech-lead" is a longer tail match than "lead".
        assert_eq!(decision.allowed_speaker.id, "tech-lead");
        assert_eq!(decision.reason, AuthorityReason::DirectAgentConversation);
    }

    #[test]
    fn tail_match_requires_hyphen_boundary() {
        let agents = vec![Agent::new("ead", "saas", "Ead", "Engineer")];
        assert!(match_id_tail("agent-saas-startup-lead", &agents).is_none());
    }

    #[test]
    fn agent_scope_missing_target_falls_back() {
        let agents = vec![dev(), pm()];
        let req = AuthorityRequest::new(Scope::Agent, "agent-saas-designer", &agents);
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "dev");
        assert_eq!(decision.reason, AuthorityReason::FallbackFirstAgent);
    }

    #[test]
    fn project_without_pm_falls_back_to_first() {
        let agents = vec![designer(), dev()];
        let req = AuthorityRequest::new(Scope::Project, "project-saas", &agents);
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "designer");
        assert_eq!(decision.reason.to_string(), "fallback_first_agent");
    }

    #[test]
    fn unparseable_team_id_falls_back() {
        let agents = vec![dev(), tech_lead()];
        let req = AuthorityRequest::new(Scope::Team, "team-saas-startup-core", &agents);
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "dev");
        assert_eq!(decision.reason, AuthorityReason::FallbackFirstAgent);
    }

    #[test]
    fn configured_role_priority_is_used() {
        let agents = vec![tech_lead(), dev()];
        let priority = vec!["Senior Developer".to_string()];
        let req = AuthorityRequest::new(Scope::Team, "team-saas-core", &agents)
            .with_role_priority(&priority);
        let decision = resolve_speaking_authority(&req).unwrap();
        assert_eq!(decision.allowed_speaker.id, "dev");
    }

    #[test]
    fn empty_roster_is_an_error() {
        let req = AuthorityRequest::new(Scope::Project, "project-saas", &[]);
        assert!(matches!(
            resolve_speaking_authority(&req),
            Err(Error::EmptyRoster { .. })
        ));
    }

    #[test]
    fn deterministic_across_calls() {
        let agents = vec![designer(), pm(), tech_lead(), dev()];
        for (scope, id) in [
            (Scope::Project, "project-saas"),
            (Scope::Team, "team-saas-core"),
            (Scope::Agent, "agent-saas-dev"),
        ] {
            let req = AuthorityRequest::new(scope, id, &agents);
            let first = resolve_speaking_authority(&req).unwrap();
            for _ in 0..25 {
                assert_eq!(resolve_speaking_authority(&req).unwrap(), first);
            }
        }
    }

    #[test]
    fn decision_serializes_camel_case() {
        let agents = vec![pm()];
        let req = AuthorityRequest::new(Scope::Project, "project-saas", &agents);
        let json = serde_json::to_value(resolve_speaking_authority(&req).unwrap()).unwrap();
        assert_eq!(json["allowedSpeaker"]["id"], "pm");
        assert_eq!(json["reason"], "project_scope_pm_authority");
        assert!(json.get("teamLeadReason").is_none());
    }
}
