//! Stored chat turns.
//!
//! A message belongs to one conversation. User turns carry no agent id,
//! agent turns carry the id of the agent that spoke, and system turns are
//! never attributed to an agent.

use {
    huddle_common::SenderKind,
    serde::{Deserialize, Serialize},
};

/// Who produced a degraded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackKind {
    /// Platform notice, no agent involved.
    System,
    /// A product manager (or the first agent) stood in.
    Pm,
}

/// Attached to a response that did not come from the preferred speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackInfo {
    #[serde(rename = "type")]
    pub kind: FallbackKind,
    pub reason: String,
}

impl FallbackInfo {
    pub fn system(reason: impl Into<String>) -> Self {
        Self {
            kind: FallbackKind::System,
            reason: reason.into(),
        }
    }

    pub fn pm(reason: impl Into<String>) -> Self {
        Self {
            kind: FallbackKind::Pm,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackInfo>,
    /// Speaking-authority reason for agent responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addressed_agent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedMessage {
    pub id: String,
    pub conversation_id: String,
    #[serde(rename = "messageType")]
    pub sender: SenderKind,
    pub agent_id: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// The user turn this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Client-assigned id of a user turn, used to collapse retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
    #[serde(default)]
    pub metadata: MessageMetadata,
    pub created_at: u64,
}

impl PersistedMessage {
    fn new(
        conversation_id: impl Into<String>,
        sender: SenderKind,
        agent_id: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            sender,
            agent_id,
            content: content.into(),
            thread_id: None,
            reply_to: None,
            client_message_id: None,
            metadata: MessageMetadata::default(),
            created_at: now_ms(),
        }
    }

    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, SenderKind::User, None, content)
    }

    pub fn agent(
        conversation_id: impl Into<String>,
        agent_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            conversation_id,
            SenderKind::Agent,
            Some(agent_id.into()),
            content,
        )
    }

    /// A degraded platform notice. Never attributed to an agent.
    pub fn system_fallback(
        conversation_id: impl Into<String>,
        reason: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut message = Self::new(conversation_id, SenderKind::System, None, content);
        message.metadata.fallback = Some(FallbackInfo::system(reason));
        message
    }

    pub fn in_thread(mut self, thread_id: Option<String>) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn replying_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }

    pub fn with_client_id(mut self, client_message_id: Option<String>) -> Self {
        self.client_message_id = client_message_id;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackInfo) -> Self {
        self.metadata.fallback = Some(fallback);
        self
    }

    pub fn with_routing(
        mut self,
        routing_reason: impl Into<String>,
        addressed_agent_id: Option<String>,
    ) -> Self {
        self.metadata.routing_reason = Some(routing_reason.into());
        self.metadata.addressed_agent_id = addressed_agent_id;
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata.fallback.is_some()
    }
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
