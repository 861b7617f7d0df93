//! Handle one inbound send-message payload end to end.
//!
//! Every accepted user turn ends with exactly one persisted response. When
//! the preferred speaker cannot answer, the response degrades to a product
//! manager stand-in or, with no agents at all, to a system notice that is
//! never attributed to an agent.

use std::sync::Arc;

use {
    huddle_common::{Agent, SenderKind, is_reserved_agent_id},
    huddle_config::StrictMode,
    huddle_projects::RosterStore,
    huddle_protocol::ErrorFrame,
    huddle_routing::{
        AuthorityRequest, AvailabilityScope, ConversationRef, DEFAULT_ROLE_PRIORITY, IngressOutcome,
        Scope, ValidatedMessage, assert_no_fake_system_agent, assert_route_unchanged,
        assert_routing_consistency, available_agents, resolve_speaking_authority, role_matches,
        validate_send_message,
    },
    huddle_sessions::{ConversationStore, FallbackInfo, MessageStore, PersistedMessage},
    serde::Serialize,
    serde_json::Value,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    runtime::{ReplyGenerator, ReplyRequest},
};

/// Reasons recorded in `metadata.fallback.reason`.
pub mod fallback_reason {
    pub const NO_AGENTS_IN_PROJECT: &str = "no_agents_in_project";
    pub const ROSTER_UNAVAILABLE: &str = "roster_unavailable";
    pub const NO_AGENTS_IN_TEAM: &str = "no_agents_in_team";
    pub const AGENT_NOT_IN_PROJECT: &str = "agent_not_in_project";
    pub const AUTHORITY_UNRESOLVED: &str = "authority_unresolved";
    pub const REPLY_GENERATION_FAILED: &str = "reply_generation_failed";
    pub const INVARIANT_VIOLATION: &str = "invariant_violation";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    /// A fresh user turn and its response.
    Replied {
        user: PersistedMessage,
        response: PersistedMessage,
    },
    /// A retry of a turn that already has a response. Nothing new was written.
    Replayed {
        user: PersistedMessage,
        response: PersistedMessage,
    },
    /// Lenient-mode validation failure; send the frame back to the client.
    Rejected { error: ErrorFrame },
}

impl SendOutcome {
    pub fn response(&self) -> Option<&PersistedMessage> {
        match self {
            Self::Replied { response, .. } | Self::Replayed { response, .. } => Some(response),
            Self::Rejected { .. } => None,
        }
    }
}

/// Who will answer, before any text exists.
enum Responder<'a> {
    Resolved {
        speaker: &'a Agent,
        reason: &'static str,
    },
    Pm {
        speaker: &'a Agent,
        fallback: FallbackInfo,
    },
    System {
        reason: &'static str,
    },
}

pub struct ChatPipeline {
    roster: Arc<dyn RosterStore>,
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    generator: Arc<dyn ReplyGenerator>,
    mode: StrictMode,
    role_priority: Vec<String>,
}

impl ChatPipeline {
    pub fn new(
        roster: Arc<dyn RosterStore>,
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        generator: Arc<dyn ReplyGenerator>,
        mode: StrictMode,
    ) -> Self {
        Self {
            roster,
            conversations,
            messages,
            generator,
            mode,
            role_priority: DEFAULT_ROLE_PRIORITY.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the team-lead role table. Blank entries are dropped; a table
    /// left empty keeps the default.
    #[must_use]
    pub fn with_role_priority(mut self, mut role_priority: Vec<String>) -> Self {
        role_priority.retain(|role| !role.trim().is_empty());
        if !role_priority.is_empty() {
            self.role_priority = role_priority;
        }
        self
    }

    pub async fn handle_send_message(
        &self,
        payload: &Value,
        known_project_id: Option<&str>,
    ) -> Result<SendOutcome> {
        let message = match validate_send_message(payload, known_project_id, self.mode)? {
            IngressOutcome::Accepted(message) => message,
            IngressOutcome::Rejected(error) => return Ok(SendOutcome::Rejected { error }),
        };

        let conversation = self
            .conversations
            .get_or_create(&message.conversation)
            .await
            .map_err(|e| Error::store("loading conversation", e))?;
        assert_route_unchanged(&conversation.route, &message.conversation, self.mode)?;
        // The stored fields win; a conversation is never rescoped.
        let route = conversation.route;

        let user = match self.existing_user_turn(&message).await? {
            Some(user) => {
                if let Some(response) = self
                    .messages
                    .response_to(&user.id)
                    .await
                    .map_err(|e| Error::store("looking up response", e))?
                {
                    info!(
                        conversation_id = %message.conversation_id,
                        message_id = %user.id,
                        "replaying response for retried message"
                    );
                    return Ok(SendOutcome::Replayed { user, response });
                }
                user
            },
            None => {
                let user = PersistedMessage::user(&message.conversation_id, &message.content)
                    .in_thread(message.thread_id.clone())
                    .with_client_id(message.client_message_id.clone());
                self.messages
                    .append(&user)
                    .await
                    .map_err(|e| Error::store("persisting user message", e))?;
                user
            },
        };

        let response = self.respond(&route, &message, &user).await?;
        Ok(SendOutcome::Replied { user, response })
    }

    async fn existing_user_turn(
        &self,
        message: &ValidatedMessage,
    ) -> Result<Option<PersistedMessage>> {
        let Some(client_id) = message.client_message_id.as_deref() else {
            return Ok(None);
        };
        self.messages
            .find_user_turn(&message.conversation_id, client_id)
            .await
            .map_err(|e| Error::store("looking up retried message", e))
    }

    async fn respond(
        &self,
        route: &ConversationRef,
        message: &ValidatedMessage,
        user: &PersistedMessage,
    ) -> Result<PersistedMessage> {
        let response = match self.roster.list_agents(route.project_id()).await {
            Ok(roster) => {
                let roster = speakable(roster, route.project_id());
                self.compose(route, message, user, &roster).await
            },
            Err(e) => {
                warn!(project_id = route.project_id(), error = %e, "roster unavailable");
                system_notice(&message.conversation_id, fallback_reason::ROSTER_UNAVAILABLE)
            },
        };

        self.persist(route, user, response).await
    }

    async fn compose(
        &self,
        route: &ConversationRef,
        message: &ValidatedMessage,
        user: &PersistedMessage,
        roster: &[Agent],
    ) -> PersistedMessage {
        let conversation_id = message.conversation_id.as_str();
        match self.choose_responder(route, message, roster) {
            Responder::System { reason } => system_notice(conversation_id, reason),
            Responder::Resolved { speaker, reason } => {
                match self.generate(route, speaker, user, None).await {
                    Some(text) => PersistedMessage::agent(conversation_id, &speaker.id, text)
                        .with_routing(reason, message.addressed_agent_id.clone()),
                    None => {
                        system_notice(conversation_id, fallback_reason::REPLY_GENERATION_FAILED)
                    },
                }
            },
            Responder::Pm { speaker, fallback } => {
                match self.generate(route, speaker, user, Some(&fallback)).await {
                    Some(text) => PersistedMessage::agent(conversation_id, &speaker.id, text)
                        .with_fallback(fallback),
                    None => {
                        system_notice(conversation_id, fallback_reason::REPLY_GENERATION_FAILED)
                    },
                }
            },
        }
    }

    fn choose_responder<'a>(
        &self,
        route: &ConversationRef,
        message: &ValidatedMessage,
        roster: &'a [Agent],
    ) -> Responder<'a> {
        if roster.is_empty() {
            return Responder::System {
                reason: fallback_reason::NO_AGENTS_IN_PROJECT,
            };
        }

        let candidates = available_agents(roster, AvailabilityScope::from(route));
        if candidates.is_empty() {
            let reason = match route.scope() {
                Scope::Agent => fallback_reason::AGENT_NOT_IN_PROJECT,
                _ => fallback_reason::NO_AGENTS_IN_TEAM,
            };
            return pm_fallback(roster, reason);
        }

        let request = AuthorityRequest::new(route.scope(), &message.conversation_id, &candidates)
            .addressed_to(message.addressed_agent_id.as_deref())
            .in_project(route.project_id())
            .with_role_priority(&self.role_priority);
        match resolve_speaking_authority(&request) {
            Ok(authority) => {
                // Candidates are clones; answer with the roster entry.
                let id = &authority.allowed_speaker.id;
                match roster.iter().find(|a| &a.id == id) {
                    Some(speaker) => Responder::Resolved {
                        speaker,
                        reason: authority.reason.as_str(),
                    },
                    None => pm_fallback(roster, fallback_reason::AUTHORITY_UNRESOLVED),
                }
            },
            Err(e) => {
                warn!(
                    conversation_id = %message.conversation_id,
                    error = %e,
                    "speaking authority unresolved"
                );
                pm_fallback(roster, fallback_reason::AUTHORITY_UNRESOLVED)
            },
        }
    }

    async fn generate(
        &self,
        route: &ConversationRef,
        speaker: &Agent,
        user: &PersistedMessage,
        fallback: Option<&FallbackInfo>,
    ) -> Option<String> {
        let request = ReplyRequest {
            conversation: route,
            speaker,
            user_message: user,
            fallback,
        };
        match self.generator.generate(request).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!(agent_id = %speaker.id, "reply generator returned empty text");
                None
            },
            Err(e) => {
                warn!(agent_id = %speaker.id, error = %e, "reply generation failed");
                None
            },
        }
    }

    /// Persist the one response to `user`. An agent turn that fails its
    /// checks in lenient mode, or that the store refuses, is replaced by a
    /// system notice so the user turn is still answered.
    async fn persist(
        &self,
        route: &ConversationRef,
        user: &PersistedMessage,
        response: PersistedMessage,
    ) -> Result<PersistedMessage> {
        let response = response
            .replying_to(&user.id)
            .in_thread(user.thread_id.clone());
        assert_no_fake_system_agent(response.sender, response.agent_id.as_deref(), self.mode)?;
        assert_routing_consistency(&response.conversation_id, route, self.mode)?;

        if response.sender != SenderKind::Agent {
            return self.append(response).await;
        }
        let attributable = response
            .agent_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty() && !is_reserved_agent_id(id));
        let refused = if attributable {
            match self.append(response).await {
                Ok(response) => return Ok(response),
                Err(e) => e.to_string(),
            }
        } else {
            "agent id cannot be attributed".to_string()
        };

        warn!(
            conversation_id = %user.conversation_id,
            message_id = %user.id,
            error = %refused,
            "agent response refused; answering with system notice"
        );
        let notice = system_notice(&user.conversation_id, fallback_reason::INVARIANT_VIOLATION)
            .replying_to(&user.id)
            .in_thread(user.thread_id.clone());
        self.append(notice).await
    }

    async fn append(&self, response: PersistedMessage) -> Result<PersistedMessage> {
        self.messages
            .append(&response)
            .await
            .map_err(|e| Error::store("persisting response", e))?;
        debug!(
            conversation_id = %response.conversation_id,
            message_id = %response.id,
            sender = %response.sender,
            agent_id = response.agent_id.as_deref(),
            fallback = response.metadata.fallback.as_ref().map(|f| f.reason.as_str()),
            "persisted response"
        );
        Ok(response)
    }
}

/// Drop roster entries that could never be attributed a reply.
fn speakable(roster: Vec<Agent>, project_id: &str) -> Vec<Agent> {
    let (reserved, roster): (Vec<_>, Vec<_>) =
        roster.into_iter().partition(Agent::has_reserved_id);
    for agent in reserved {
        warn!(project_id, agent_id = %agent.id, "ignoring agent with reserved id");
    }
    roster
}

/// First product manager in the project, else the first agent.
fn pm_fallback<'a>(roster: &'a [Agent], reason: &'static str) -> Responder<'a> {
    let speaker = roster
        .iter()
        .find(|a| role_matches(&a.role, "product manager"))
        .or_else(|| roster.first());
    match speaker {
        Some(speaker) => {
            warn!(agent_id = %speaker.id, reason, "falling back to product manager");
            Responder::Pm {
                speaker,
                fallback: FallbackInfo::pm(reason),
            }
        },
        None => Responder::System {
            reason: fallback_reason::NO_AGENTS_IN_PROJECT,
        },
    }
}

fn system_notice(conversation_id: &str, reason: &'static str) -> PersistedMessage {
    warn!(conversation_id, reason, "responding with system notice");
    let text = match reason {
        fallback_reason::NO_AGENTS_IN_PROJECT => {
            "No agents are available in this project yet. Add an agent to start the conversation."
        },
        fallback_reason::ROSTER_UNAVAILABLE => {
            "The project roster could not be loaded. Please try again shortly."
        },
        _ => "No reply could be produced for this message. Please try again.",
    };
    PersistedMessage::system_fallback(conversation_id, reason, text)
}
