//! Shared types and error definitions used across all huddle crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{Agent, Project, RESERVED_AGENT_ID, SenderKind, Team, is_reserved_agent_id},
};
