use {
    anyhow::Result,
    clap::Subcommand,
    huddle_routing::{Scope, build_conversation_id, parse_conversation_id},
};

#[derive(Subcommand)]
pub enum ConversationAction {
    /// Print the canonical id for a scope, project and context.
    Build {
        /// project, team or agent.
        #[arg(long)]
        scope: Scope,
        #[arg(long)]
        project: String,
        /// Team id for team scope, agent id for agent scope.
        #[arg(long)]
        context: Option<String>,
    },
    /// Decode a conversation id into its routing fields.
    Parse {
        id: String,
        /// Known project id, required when ids contain hyphens.
        #[arg(long)]
        project: Option<String>,
    },
}

pub fn handle_conversation(action: ConversationAction) -> Result<()> {
    match action {
        ConversationAction::Build {
            scope,
            project,
            context,
        } => {
            println!("{}", build_conversation_id(scope, &project, context.as_deref())?);
        },
        ConversationAction::Parse { id, project } => {
            let parsed = parse_conversation_id(&id, project.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        },
    }
    Ok(())
}
