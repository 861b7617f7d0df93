//! Chat turn handling: validate, route, generate, persist.

pub mod error;
pub mod pipeline;
pub mod runtime;

pub use {
    error::{Error, Result},
    pipeline::{ChatPipeline, SendOutcome, fallback_reason},
    runtime::{ReplyGenerator, ReplyRequest},
};
