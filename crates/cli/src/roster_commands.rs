use std::path::PathBuf;

use {
    anyhow::Result,
    clap::Subcommand,
    huddle_config::HuddleConfig,
    huddle_projects::{RosterStore, SqliteRosterStore, TomlRosterStore},
    tracing::info,
};

use crate::stores::{open_pool, open_roster};

#[derive(Subcommand)]
pub enum RosterAction {
    /// List projects.
    Projects,
    /// List a project's agents in roster order.
    Agents { project: String },
    /// Copy every project, team and agent from a TOML roster into the database.
    Import { file: PathBuf },
}

pub async fn handle_roster(
    action: RosterAction,
    config: &HuddleConfig,
    roster_path: Option<PathBuf>,
) -> Result<()> {
    match action {
        RosterAction::Projects => {
            let store = open_roster(config, roster_path).await?;
            let projects = store.list_projects().await?;
            if projects.is_empty() {
                println!("No projects found.");
            }
            for project in projects {
                println!("  {}  {}", project.id, project.name);
            }
        },
        RosterAction::Agents { project } => {
            let store = open_roster(config, roster_path).await?;
            let agents = store.list_agents(&project).await?;
            if agents.is_empty() {
                println!("No agents in project '{project}'.");
            }
            for agent in agents {
                let team = agent.team_id.as_deref().unwrap_or("-");
                let lead = if agent.is_team_lead {
                    " [lead]"
                } else {
                    ""
                };
                println!("  {:<16} {:<12} {}{lead}", agent.id, team, agent.role);
            }
        },
        RosterAction::Import { file } => import(config, file).await?,
    }
    Ok(())
}

async fn import(config: &HuddleConfig, file: PathBuf) -> Result<()> {
    let source = TomlRosterStore::new(file);
    let target = SqliteRosterStore::new(open_pool(config).await?);

    let (mut teams, mut agents) = (0, 0);
    let projects = source.list_projects().await?;
    for project in &projects {
        target.upsert_project(project.clone()).await?;
        // Teams first; agents reference them.
        for team in source.list_teams(&project.id).await? {
            target.upsert_team(team).await?;
            teams += 1;
        }
        for agent in source.list_agents(&project.id).await? {
            target.upsert_agent(agent).await?;
            agents += 1;
        }
    }

    info!(projects = projects.len(), teams, agents, "roster imported");
    println!(
        "Imported {} project(s), {teams} team(s), {agents} agent(s).",
        projects.len()
    );
    Ok(())
}
