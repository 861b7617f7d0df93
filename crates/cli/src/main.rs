mod config_commands;
mod conversation_commands;
mod db_commands;
mod roster_commands;
mod route_commands;
mod stores;

use {
    clap::{Parser, Subcommand},
    std::path::PathBuf,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "huddle", about = "Huddle: conversation routing for agent teams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of the discovered one.
    #[arg(long, global = true, env = "HUDDLE_CONFIG")]
    config: Option<PathBuf>,

    /// TOML roster file (overrides `storage.roster_path`).
    #[arg(long, global = true)]
    roster: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and parse conversation identifiers.
    Conversation {
        #[command(subcommand)]
        action: conversation_commands::ConversationAction,
    },
    /// Show which agent would answer a send-message payload.
    Route(route_commands::RouteArgs),
    /// Handle a send-message payload end to end and persist the turn.
    Send(route_commands::SendArgs),
    /// Inspect the project roster.
    Roster {
        #[command(subcommand)]
        action: roster_commands::RosterAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Database management.
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output on stdout stays machine-readable.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "huddle starting");

    let config = match cli.config {
        Some(ref path) => huddle_config::load_config(path)?,
        None => huddle_config::discover_and_load(),
    };
    let roster_path = cli.roster.clone().or_else(|| config.storage.roster_path.clone());

    match cli.command {
        Commands::Conversation { action } => conversation_commands::handle_conversation(action),
        Commands::Route(args) => route_commands::route(args, &config, roster_path).await,
        Commands::Send(args) => route_commands::send(args, &config, roster_path).await,
        Commands::Roster { action } => {
            roster_commands::handle_roster(action, &config, roster_path).await
        },
        Commands::Config { action } => config_commands::handle_config(action, cli.config),
        Commands::Db { action } => db_commands::handle_db(action, &config).await,
    }
}
