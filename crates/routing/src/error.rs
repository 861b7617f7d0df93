use huddle_protocol::{ErrorFrame, error_codes};

use crate::conversation_id::Scope;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{field} must be a non-empty string")]
    EmptyIdentifier { field: &'static str },

    #[error("project scope does not take a context id")]
    ContextNotAllowed,

    #[error("{scope} scope requires a non-empty context id")]
    ContextRequired { scope: Scope },

    #[error("invalid conversation ID `{id}`: {reason}")]
    Malformed { id: String, reason: String },

    #[error("ambiguous conversation ID `{id}`: requires known projectId")]
    Ambiguous { id: String },

    #[error("conversation ID `{id}` does not belong to project `{project_id}`")]
    ProjectMismatch { id: String, project_id: String },

    #[error("no agents available for {context}")]
    EmptyRoster { context: &'static str },

    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("unsupported message type `{found}`")]
    UnsupportedType { found: String },

    #[error("conversationId is required")]
    MissingConversationId,

    #[error("message content is empty")]
    EmptyMessage,

    #[error("conversation ID `{id}` does not match its parsed routing fields")]
    RoutingMismatch { id: String },

    #[error("invariant `{invariant}` violated: {detail}")]
    InvariantViolation {
        invariant: &'static str,
        detail: String,
    },
}

impl Error {
    #[must_use]
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invariant(invariant: &'static str, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            invariant,
            detail: detail.into(),
        }
    }

    /// Stable wire code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyIdentifier { .. }
            | Self::ContextNotAllowed
            | Self::ContextRequired { .. }
            | Self::Malformed { .. } => error_codes::INVALID_CONVERSATION_ID,
            Self::Ambiguous { .. } => error_codes::AMBIGUOUS_CONVERSATION_ID,
            Self::ProjectMismatch { .. } => error_codes::CONVERSATION_PROJECT_MISMATCH,
            Self::EmptyRoster { .. } => error_codes::UNAVAILABLE,
            Self::InvalidPayload { .. } => error_codes::INVALID_REQUEST,
            Self::UnsupportedType { .. } => error_codes::UNSUPPORTED_TYPE,
            Self::MissingConversationId => error_codes::MISSING_CONVERSATION_ID,
            Self::EmptyMessage => error_codes::EMPTY_MESSAGE,
            Self::RoutingMismatch { .. } => error_codes::ROUTING_MISMATCH,
            Self::InvariantViolation { .. } => error_codes::INVARIANT_VIOLATION,
        }
    }

    /// Machine-readable frame for the transport.
    pub fn to_error_frame(&self) -> ErrorFrame {
        let frame = ErrorFrame::new(self.code(), self.to_string());
        match self {
            Self::Malformed { id, .. }
            | Self::Ambiguous { id }
            | Self::RoutingMismatch { id } => {
                frame.with_details(serde_json::json!({ "conversationId": id }))
            },
            Self::ProjectMismatch { id, project_id } => frame.with_details(serde_json::json!({
                "conversationId": id,
                "projectId": project_id,
            })),
            Self::UnsupportedType { found } => frame.with_details(serde_json::json!({
                "expected": huddle_protocol::SEND_MESSAGE_STREAMING,
                "found": found,
            })),
            _ => frame,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_message_mentions_known_project() {
        let err = Error::Ambiguous {
            id: "team-a-b-c".into(),
        };
        assert!(err.to_string().starts_with("ambiguous conversation ID"));
        assert!(err.to_string().contains("requires known projectId"));
    }

    #[test]
    fn error_frame_carries_code_and_details() {
        let frame = Error::ProjectMismatch {
            id: "team-other-x".into(),
            project_id: "saas".into(),
        }
        .to_error_frame();
        assert_eq!(frame.r#type, "error");
        assert_eq!(frame.code, error_codes::CONVERSATION_PROJECT_MISMATCH);
        let details = frame.details.unwrap();
        assert_eq!(details["projectId"], "saas");

        let frame = Error::EmptyMessage.to_error_frame();
        assert_eq!(frame.code, error_codes::EMPTY_MESSAGE);
        assert!(frame.details.is_none());
    }
}
