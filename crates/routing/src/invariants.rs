//! Runtime checks run before a reply is persisted.
//!
//! Strict mode turns a violation into [`Error::InvariantViolation`]; lenient
//! mode logs it at error level and lets the caller continue.

use {
    huddle_common::{SenderKind, is_reserved_agent_id},
    huddle_config::StrictMode,
    tracing::error,
};

use crate::{
    conversation_id::{ConversationRef, parse_conversation_id},
    error::{Error, Result},
};

pub const NO_FAKE_SYSTEM_AGENT: &str = "no_fake_system_agent";
pub const ROUTING_CONSISTENCY: &str = "routing_consistency";

/// Agent messages carry a real agent id. System messages carry none.
pub fn assert_no_fake_system_agent(
    sender: SenderKind,
    agent_id: Option<&str>,
    mode: StrictMode,
) -> Result<()> {
    let violation = match (sender, agent_id) {
        (SenderKind::Agent, None) => Some("agent message without an agent id".to_string()),
        (SenderKind::Agent, Some(id)) if id.trim().is_empty() => {
            Some("agent message with a blank agent id".to_string())
        },
        (SenderKind::Agent, Some(id)) if is_reserved_agent_id(id) => {
            Some(format!("agent message impersonates the system with id `{id}`"))
        },
        (SenderKind::System, Some(id)) => {
            Some(format!("system message attributed to agent `{id}`"))
        },
        _ => None,
    };
    settle(NO_FAKE_SYSTEM_AGENT, violation, mode)
}

/// Re-parsing `conversation_id` with its own project id must reproduce
/// `expected` exactly.
pub fn assert_routing_consistency(
    conversation_id: &str,
    expected: &ConversationRef,
    mode: StrictMode,
) -> Result<()> {
    let violation = match parse_conversation_id(conversation_id, Some(expected.project_id())) {
        Ok(parsed) if &parsed == expected => None,
        Ok(parsed) => Some(format!(
            "conversation ID `{conversation_id}` decodes to {} `{}`/`{}`, expected {} `{}`/`{}`",
            parsed.scope(),
            parsed.project_id(),
            parsed.context_id().unwrap_or_default(),
            expected.scope(),
            expected.project_id(),
            expected.context_id().unwrap_or_default(),
        )),
        Err(e) => Some(format!("conversation ID `{conversation_id}` does not re-parse: {e}")),
    };
    settle(ROUTING_CONSISTENCY, violation, mode)
}

/// A stored conversation keeps the routing fields it was created with.
pub fn assert_route_unchanged(
    stored: &ConversationRef,
    requested: &ConversationRef,
    mode: StrictMode,
) -> Result<()> {
    let violation = (stored != requested).then(|| {
        format!(
            "conversation `{stored}` belongs to project `{}`, not `{}`",
            stored.project_id(),
            requested.project_id(),
        )
    });
    settle(ROUTING_CONSISTENCY, violation, mode)
}

fn settle(invariant: &'static str, violation: Option<String>, mode: StrictMode) -> Result<()> {
    let Some(detail) = violation else {
        return Ok(());
    };
    if mode.is_strict() {
        return Err(Error::invariant(invariant, detail));
    }
    error!(invariant, %detail, "invariant violated");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(SenderKind::Agent, Some("dev"))]
    #[case(SenderKind::System, None)]
    #[case(SenderKind::User, None)]
    fn well_formed_senders_pass(#[case] sender: SenderKind, #[case] agent_id: Option<&str>) {
        assert!(assert_no_fake_system_agent(sender, agent_id, StrictMode::Strict).is_ok());
    }

    #[rstest]
    #[case(SenderKind::Agent, None)]
    #[case(SenderKind::Agent, Some(""))]
    #[case(SenderKind::Agent, Some("system"))]
    #[case(SenderKind::Agent, Some("System"))]
    #[case(SenderKind::System, Some("dev"))]
    fn fake_system_agent_rejected_in_strict_mode(
        #[case] sender: SenderKind,
        #[case] agent_id: Option<&str>,
    ) {
        let err = assert_no_fake_system_agent(sender, agent_id, StrictMode::Strict).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation {
            invariant: NO_FAKE_SYSTEM_AGENT,
            ..
        }));
    }

    #[test]
    fn lenient_mode_only_logs() {
        assert!(
            assert_no_fake_system_agent(SenderKind::Agent, Some("system"), StrictMode::Lenient)
                .is_ok()
        );
        let expected = ConversationRef::team("saas", "design").unwrap();
        assert!(
            assert_routing_consistency("team-saas-dev", &expected, StrictMode::Lenient).is_ok()
        );
    }

    #[test]
    fn routing_consistency() {
        let expected = ConversationRef::agent("saas-startup", "tech-lead").unwrap();
        assert!(
            assert_routing_consistency(
                "agent-saas-startup-tech-lead",
                &expected,
                StrictMode::Strict
            )
            .is_ok()
        );
        let err = assert_routing_consistency(
            "team-saas-startup-tech-lead",
            &expected,
            StrictMode::Strict,
        )
        .unwrap_err();
        assert_eq!(err.code(), huddle_protocol::error_codes::INVARIANT_VIOLATION);
    }

    #[test]
    fn route_unchanged() {
        let stored = ConversationRef::team("saas-startup", "design").unwrap();
        let split = ConversationRef::team("saas", "startup-design").unwrap();
        assert!(assert_route_unchanged(&stored, &stored.clone(), StrictMode::Strict).is_ok());
        assert!(assert_route_unchanged(&stored, &split, StrictMode::Strict).is_err());
        assert!(assert_route_unchanged(&stored, &split, StrictMode::Lenient).is_ok());
    }
}
