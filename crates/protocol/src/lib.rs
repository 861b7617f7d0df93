//! Chat transport frame definitions.
//!
//! All communication uses JSON frames. This crate only describes the frames
//! the routing layer consumes and produces:
//! - `SendMessageEnvelope`: client → server chat message
//! - `ErrorFrame`: server → client machine-readable rejection

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

/// The only frame type accepted by the message ingress.
pub const SEND_MESSAGE_STREAMING: &str = "send_message_streaming";
pub const ERROR_FRAME_TYPE: &str = "error";

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod error_codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const UNSUPPORTED_TYPE: &str = "UNSUPPORTED_TYPE";
    pub const MISSING_CONVERSATION_ID: &str = "MISSING_CONVERSATION_ID";
    pub const EMPTY_MESSAGE: &str = "EMPTY_MESSAGE";
    pub const INVALID_CONVERSATION_ID: &str = "INVALID_CONVERSATION_ID";
    pub const AMBIGUOUS_CONVERSATION_ID: &str = "AMBIGUOUS_CONVERSATION_ID";
    pub const CONVERSATION_PROJECT_MISMATCH: &str = "CONVERSATION_PROJECT_MISMATCH";
    pub const ROUTING_MISMATCH: &str = "ROUTING_MISMATCH";
    pub const INVARIANT_VIOLATION: &str = "INVARIANT_VIOLATION";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
}

// ── Inbound ──────────────────────────────────────────────────────────────────

/// Client → server chat message.
///
/// Every field is optional at the serde level so the ingress validator can
/// report precisely which one is missing instead of a generic decode error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(
        rename = "conversationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageBody>,
    #[serde(
        rename = "addressedAgentId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub addressed_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EnvelopeMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Client-assigned message id, used as the idempotency key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    #[serde(
        rename = "addressedAgentId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub addressed_agent_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Outbound ─────────────────────────────────────────────────────────────────

/// Server → client rejection frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub r#type: String, // always "error"
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorFrame {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            r#type: ERROR_FRAME_TYPE.into(),
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_reads_camel_case_fields() {
        let env: SendMessageEnvelope = serde_json::from_value(serde_json::json!({
            "type": "send_message_streaming",
            "conversationId": "team-saas-design",
            "message": { "content": "hi", "threadId": "t-1", "attachments": [] },
            "metadata": { "addressedAgentId": "dev-1", "client": "web" }
        }))
        .unwrap();
        assert_eq!(env.r#type.as_deref(), Some(SEND_MESSAGE_STREAMING));
        assert_eq!(env.conversation_id.as_deref(), Some("team-saas-design"));
        let message = env.message.unwrap();
        assert_eq!(message.content.as_deref(), Some("hi"));
        assert_eq!(message.thread_id.as_deref(), Some("t-1"));
        assert!(message.extra.contains_key("attachments"));
        let metadata = env.metadata.unwrap();
        assert_eq!(metadata.addressed_agent_id.as_deref(), Some("dev-1"));
        assert_eq!(metadata.extra["client"], "web");
    }

    #[test]
    fn error_frame_omits_empty_details() {
        let frame = ErrorFrame::new(error_codes::EMPTY_MESSAGE, "message content is empty");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "EMPTY_MESSAGE");
        assert!(json.get("details").is_none());

        let frame = frame.with_details(serde_json::json!({ "field": "message.content" }));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["details"]["field"], "message.content");
    }
}
