use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    clap::Args,
    huddle_chat::{ChatPipeline, ReplyGenerator, ReplyRequest},
    huddle_config::{HuddleConfig, resolve_strict_mode},
    huddle_projects::{RosterStore, SqliteRosterStore, TomlRosterStore},
    huddle_routing::{
        AuthorityRequest, AvailabilityScope, IngressOutcome, available_agents,
        resolve_speaking_authority, validate_send_message,
    },
    huddle_sessions::{SqliteConversationStore, SqliteMessageStore},
    serde_json::{Value, json},
    tracing::info,
};

use crate::stores::{open_pool, open_roster};

#[derive(Args)]
pub struct RouteArgs {
    /// JSON file holding a `SEND_MESSAGE_STREAMING` payload.
    payload: PathBuf,
    /// Project the caller already knows the conversation belongs to.
    #[arg(long)]
    project: Option<String>,
}

#[derive(Args)]
pub struct SendArgs {
    /// JSON file holding a `SEND_MESSAGE_STREAMING` payload.
    payload: PathBuf,
    #[arg(long)]
    project: Option<String>,
}

fn read_payload(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Validate the payload and print who would speak, without persisting.
pub async fn route(
    args: RouteArgs,
    config: &HuddleConfig,
    roster_path: Option<PathBuf>,
) -> Result<()> {
    let payload = read_payload(&args.payload)?;
    let mode = resolve_strict_mode(config);
    let message = match validate_send_message(&payload, args.project.as_deref(), mode)? {
        IngressOutcome::Accepted(message) => message,
        rejected @ IngressOutcome::Rejected(_) => {
            println!("{}", serde_json::to_string_pretty(&rejected.to_value())?);
            return Ok(());
        },
    };

    let roster = open_roster(config, roster_path)
        .await?
        .list_agents(&message.project_id)
        .await?;
    let candidates = available_agents(&roster, AvailabilityScope::from(&message.conversation));
    let candidate_ids: Vec<&str> = candidates.iter().map(|a| a.id.as_str()).collect();

    // Blank entries never match; an all-blank table keeps the default.
    let role_priority: Vec<String> = config
        .routing
        .role_priority
        .iter()
        .filter(|role| !role.trim().is_empty())
        .cloned()
        .collect();
    let authority = if candidates.is_empty() {
        Value::Null
    } else {
        let mut request =
            AuthorityRequest::new(message.mode, &message.conversation_id, &candidates)
                .addressed_to(message.addressed_agent_id.as_deref())
                .in_project(&message.project_id);
        if !role_priority.is_empty() {
            request = request.with_role_priority(&role_priority);
        }
        serde_json::to_value(resolve_speaking_authority(&request)?)?
    };

    let decision = json!({
        "message": message,
        "rosterSize": roster.len(),
        "candidates": candidate_ids,
        "authority": authority,
    });
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

/// Run the full pipeline against the configured database.
pub async fn send(
    args: SendArgs,
    config: &HuddleConfig,
    roster_path: Option<PathBuf>,
) -> Result<()> {
    let payload = read_payload(&args.payload)?;
    let pool = open_pool(config).await?;
    let roster: Arc<dyn RosterStore> = match roster_path {
        Some(path) => Arc::new(TomlRosterStore::new(path)),
        None => Arc::new(SqliteRosterStore::new(pool.clone())),
    };
    let pipeline = ChatPipeline::new(
        roster,
        Arc::new(SqliteConversationStore::new(pool.clone())),
        Arc::new(SqliteMessageStore::new(pool)),
        Arc::new(AcknowledgeGenerator),
        resolve_strict_mode(config),
    )
    .with_role_priority(config.routing.role_priority.clone());

    let outcome = pipeline
        .handle_send_message(&payload, args.project.as_deref())
        .await?;
    if let Some(response) = outcome.response() {
        info!(
            message_id = %response.id,
            agent_id = response.agent_id.as_deref(),
            "response persisted"
        );
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Offline reply generator: the chosen speaker acknowledges the message.
struct AcknowledgeGenerator;

#[async_trait]
impl ReplyGenerator for AcknowledgeGenerator {
    async fn generate(&self, request: ReplyRequest<'_>) -> Result<String> {
        let speaker = request.speaker;
        let role = if speaker.role.is_empty() {
            "agent"
        } else {
            speaker.role.as_str()
        };
        Ok(format!(
            "{} ({role}) received: {}",
            speaker.name, request.user_message.content
        ))
    }
}
