//! The single validation boundary for inbound send-message payloads.
//!
//! In strict mode a failure is returned as `Err` so developers see it at
//! once. In lenient mode it becomes [`IngressOutcome::Rejected`] carrying an
//! error frame the transport can send back without dropping the connection.

use {
    huddle_config::StrictMode,
    huddle_protocol::{ErrorFrame, SEND_MESSAGE_STREAMING, SendMessageEnvelope},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::{debug, warn},
};

use crate::{
    conversation_id::{ConversationRef, Scope, literal_scope_prefix, parse_conversation_id},
    error::{Error, Result},
};

/// A payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedMessage {
    pub mode: Scope,
    pub project_id: String,
    pub context_id: Option<String>,
    pub addressed_agent_id: Option<String>,
    /// Canonical (trimmed) identifier.
    pub conversation_id: String,
    #[serde(skip)]
    pub conversation: ConversationRef,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngressOutcome {
    Accepted(ValidatedMessage),
    Rejected(ErrorFrame),
}

impl IngressOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// `{ "success": true, ... }` or `{ "success": false, "error": frame }`.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Accepted(message) => {
                let mut value = serde_json::json!({ "success": true });
                if let (Some(obj), Ok(Value::Object(fields))) =
                    (value.as_object_mut(), serde_json::to_value(message))
                {
                    obj.extend(fields);
                }
                value
            },
            Self::Rejected(frame) => serde_json::json!({
                "success": false,
                "error": frame,
            }),
        }
    }
}

/// Validate a raw JSON frame.
pub fn validate_send_message_text(
    raw: &str,
    known_project_id: Option<&str>,
    mode: StrictMode,
) -> Result<IngressOutcome> {
    match serde_json::from_str::<Value>(raw) {
        Ok(payload) => validate_send_message(&payload, known_project_id, mode),
        Err(e) => settle(
            Err(Error::InvalidPayload {
                reason: e.to_string(),
            }),
            mode,
        ),
    }
}

/// Validate a decoded payload, applying the strict-mode failure policy.
pub fn validate_send_message(
    payload: &Value,
    known_project_id: Option<&str>,
    mode: StrictMode,
) -> Result<IngressOutcome> {
    settle(validate_envelope(payload, known_project_id), mode)
}

fn settle(result: Result<ValidatedMessage>, mode: StrictMode) -> Result<IngressOutcome> {
    match result {
        Ok(message) => Ok(IngressOutcome::Accepted(message)),
        Err(e) if mode.is_strict() => Err(e),
        Err(e) => {
            warn!(code = e.code(), error = %e, "rejecting inbound message");
            Ok(IngressOutcome::Rejected(e.to_error_frame()))
        },
    }
}

/// Validate a decoded payload. Always returns the error itself.
pub fn validate_envelope(
    payload: &Value,
    known_project_id: Option<&str>,
) -> Result<ValidatedMessage> {
    let envelope =
        SendMessageEnvelope::deserialize(payload).map_err(|e| Error::InvalidPayload {
            reason: e.to_string(),
        })?;

    match envelope.r#type.as_deref() {
        Some(SEND_MESSAGE_STREAMING) => {},
        other => {
            return Err(Error::UnsupportedType {
                found: other.unwrap_or("<missing>").to_string(),
            });
        },
    }

    let conversation_id = envelope
        .conversation_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(Error::MissingConversationId)?;

    let message = envelope.message.unwrap_or_default();
    let content = message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or(Error::EmptyMessage)?;

    // Top-level addressing wins over the metadata copy.
    let addressed_agent_id = non_blank(envelope.addressed_agent_id).or_else(|| {
        envelope
            .metadata
            .and_then(|m| non_blank(m.addressed_agent_id))
    });

    let conversation = parse_conversation_id(conversation_id, known_project_id)?;
    check_routing_fields(conversation_id, &conversation)?;

    debug!(
        conversation_id,
        scope = %conversation.scope(),
        addressed_agent_id = addressed_agent_id.as_deref(),
        "accepted inbound message"
    );

    Ok(ValidatedMessage {
        mode: conversation.scope(),
        project_id: conversation.project_id().to_string(),
        context_id: conversation.context_id().map(str::to_string),
        addressed_agent_id,
        conversation_id: conversation_id.to_string(),
        conversation,
        content,
        client_message_id: non_blank(message.id),
        thread_id: non_blank(message.thread_id),
    })
}

/// The literal prefix and the canonical re-encoding must agree with the
/// parsed fields.
fn check_routing_fields(conversation_id: &str, parsed: &ConversationRef) -> Result<()> {
    // Every id the current grammar parses re-encodes to itself, so only the
    // prefix check can fire today. The re-encoding check catches a parser that
    // starts normalizing ids.
    if literal_scope_prefix(conversation_id) != parsed.scope().as_str()
        || parsed.conversation_id() != conversation_id
    {
        return Err(Error::RoutingMismatch {
            id: conversation_id.to_string(),
        });
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, huddle_protocol::error_codes, serde_json::json};

    fn payload(conversation_id: &str) -> Value {
        json!({
            "type": "send_message_streaming",
            "conversationId": conversation_id,
            "message": { "content": "Can we ship Friday?" },
        })
    }

    fn accepted(outcome: IngressOutcome) -> ValidatedMessage {
        match outcome {
            IngressOutcome::Accepted(message) => message,
            IngressOutcome::Rejected(frame) => panic!("unexpected rejection: {frame:?}"),
        }
    }

    #[test]
    fn accepts_team_message() {
        let msg = accepted(
            validate_send_message(&payload("team-saas-design"), None, StrictMode::Strict).unwrap(),
        );
        assert_eq!(msg.mode, Scope::Team);
        assert_eq!(msg.project_id, "saas");
        assert_eq!(msg.context_id.as_deref(), Some("design"));
        assert_eq!(msg.addressed_agent_id, None);
        assert_eq!(msg.content, "Can we ship Friday?");
    }

    #[test]
    fn top_level_addressing_overrides_metadata() {
        let mut p = payload("project-saas");
        p["addressedAgentId"] = json!("designer");
        p["metadata"] = json!({ "addressedAgentId": "dev" });
        let msg = accepted(validate_send_message(&p, None, StrictMode::Strict).unwrap());
        assert_eq!(msg.addressed_agent_id.as_deref(), Some("designer"));
    }

    #[test]
    fn metadata_addressing_used_when_top_level_absent_or_blank() {
        let mut p = payload("project-saas");
        p["addressedAgentId"] = json!("  ");
        p["metadata"] = json!({ "addressedAgentId": "dev" });
        let msg = accepted(validate_send_message(&p, None, StrictMode::Strict).unwrap());
        assert_eq!(msg.addressed_agent_id.as_deref(), Some("dev"));
    }

    #[test]
    fn known_project_resolves_hyphenated_ids() {
        let p = payload("agent-saas-startup-tech-lead");
        let msg = accepted(
            validate_send_message(&p, Some("saas-startup"), StrictMode::Strict).unwrap(),
        );
        assert_eq!(msg.project_id, "saas-startup");
        assert_eq!(msg.context_id.as_deref(), Some("tech-lead"));
        assert_eq!(msg.conversation, ConversationRef::Agent {
            project_id: "saas-startup".into(),
            agent_id: "tech-lead".into(),
        });
    }

    #[test]
    fn keeps_client_id_and_thread() {
        let mut p = payload("project-saas");
        p["message"]["id"] = json!("m-1");
        p["message"]["threadId"] = json!("t-9");
        let msg = accepted(validate_send_message(&p, None, StrictMode::Strict).unwrap());
        assert_eq!(msg.client_message_id.as_deref(), Some("m-1"));
        assert_eq!(msg.thread_id.as_deref(), Some("t-9"));
    }

    #[test]
    fn strict_mode_returns_errors() {
        let mut wrong_type = payload("project-saas");
        wrong_type["type"] = json!("send_message");
        assert!(matches!(
            validate_send_message(&wrong_type, None, StrictMode::Strict),
            Err(Error::UnsupportedType { .. })
        ));

        let mut empty = payload("project-saas");
        empty["message"]["content"] = json!("   ");
        assert_eq!(
            validate_send_message(&empty, None, StrictMode::Strict).unwrap_err(),
            Error::EmptyMessage
        );

        assert_eq!(
            validate_send_message(&payload("  "), None, StrictMode::Strict).unwrap_err(),
            Error::MissingConversationId
        );

        assert!(matches!(
            validate_send_message(&payload("team-saas-startup-design"), None, StrictMode::Strict),
            Err(Error::Ambiguous { .. })
        ));
    }

    #[test]
    fn lenient_mode_returns_error_frames() {
        let outcome = validate_send_message(
            &payload("team-saas-startup-design"),
            None,
            StrictMode::Lenient,
        )
        .unwrap();
        let IngressOutcome::Rejected(frame) = &outcome else {
            panic!("expected rejection");
        };
        assert_eq!(frame.code, error_codes::AMBIGUOUS_CONVERSATION_ID);
        assert_eq!(
            frame.details.as_ref().unwrap()["conversationId"],
            "team-saas-startup-design"
        );

        let value = outcome.to_value();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["type"], "error");
    }

    #[test]
    fn lenient_mode_rejects_invalid_json() {
        let outcome = validate_send_message_text("{not json", None, StrictMode::Lenient).unwrap();
        let IngressOutcome::Rejected(frame) = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(frame.code, error_codes::INVALID_REQUEST);
    }

    #[test]
    fn non_string_content_is_invalid_payload() {
        let mut p = payload("project-saas");
        p["message"]["content"] = json!(42);
        assert!(matches!(
            validate_send_message(&p, None, StrictMode::Strict),
            Err(Error::InvalidPayload { .. })
        ));
    }

    #[test]
    fn accepted_outcome_serializes_routing_fields() {
        let outcome =
            validate_send_message(&payload("agent-saas-dev"), None, StrictMode::Lenient).unwrap();
        assert!(outcome.is_accepted());
        let value = outcome.to_value();
        assert_eq!(value["success"], true);
        assert_eq!(value["mode"], "agent");
        assert_eq!(value["projectId"], "saas");
        assert_eq!(value["contextId"], "dev");
        assert!(value["addressedAgentId"].is_null());
    }

    #[test]
    fn routing_cross_check_rejects_disagreement() {
        let parsed = ConversationRef::team("saas", "design").unwrap();
        assert!(check_routing_fields("team-saas-design", &parsed).is_ok());
        assert_eq!(
            check_routing_fields("agent-saas-design", &parsed),
            Err(Error::RoutingMismatch {
                id: "agent-saas-design".into()
            })
        );
    }
}
