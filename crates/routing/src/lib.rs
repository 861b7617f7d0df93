//! Conversation routing and speaking authority.
//!
//! A conversation ID encodes its scope and project: `project-{projectId}`,
//! `team-{projectId}-{teamId}` or `agent-{projectId}-{agentId}`. Inbound
//! messages pass through [`validate_send_message`], the roster is narrowed
//! with [`available_agents`], and [`resolve_speaking_authority`] names the
//! one agent allowed to answer.

pub mod authority;
pub mod availability;
pub mod conversation_id;
pub mod error;
pub mod ingress;
pub mod invariants;
pub mod team_lead;

pub use {
    authority::{AuthorityReason, AuthorityRequest, SpeakingAuthority, resolve_speaking_authority},
    availability::{AvailabilityScope, available_agents},
    conversation_id::{
        ConversationRef, Scope, build_conversation_id, literal_scope_prefix,
        parse_conversation_id,
    },
    error::{Error, Result},
    ingress::{
        IngressOutcome, ValidatedMessage, validate_envelope, validate_send_message,
        validate_send_message_text,
    },
    invariants::{assert_no_fake_system_agent, assert_route_unchanged, assert_routing_consistency},
    team_lead::{
        DEFAULT_ROLE_PRIORITY, TeamLead, TeamLeadReason, is_product_manager_role,
        resolve_team_lead, resolve_team_lead_with_priority, role_matches,
    },
};
