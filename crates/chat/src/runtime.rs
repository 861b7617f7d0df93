//! The seam between routing and text generation.
//!
//! The pipeline decides who speaks; a [`ReplyGenerator`] decides what they
//! say. Tests and the CLI plug in lightweight implementations.

use {
    async_trait::async_trait,
    huddle_common::Agent,
    huddle_routing::ConversationRef,
    huddle_sessions::{FallbackInfo, PersistedMessage},
};

/// Everything a generator needs to answer one user turn.
#[derive(Debug, Clone, Copy)]
pub struct ReplyRequest<'a> {
    pub conversation: &'a ConversationRef,
    pub speaker: &'a Agent,
    pub user_message: &'a PersistedMessage,
    /// Set when `speaker` is standing in for an unavailable agent.
    pub fallback: Option<&'a FallbackInfo>,
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produce the reply text. An error or blank text degrades the turn to a
    /// system notice.
    async fn generate(&self, request: ReplyRequest<'_>) -> anyhow::Result<String>;
}
