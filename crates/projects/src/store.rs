use std::{fs, path::PathBuf};

use {
    anyhow::Result,
    async_trait::async_trait,
    huddle_common::{Agent, Project, Team},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::error::Error;

/// Persistence for project rosters. Agents come back in roster order:
/// insertion order, unchanged by later updates.
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>>;
    async fn get_project(&self, id: &str) -> Result<Option<Project>>;
    async fn upsert_project(&self, project: Project) -> Result<()>;
    /// Removes the project with its teams and agents.
    async fn delete_project(&self, id: &str) -> Result<()>;
    async fn list_teams(&self, project_id: &str) -> Result<Vec<Team>>;
    async fn upsert_team(&self, team: Team) -> Result<()>;
    async fn list_agents(&self, project_id: &str) -> Result<Vec<Agent>>;
    async fn upsert_agent(&self, agent: Agent) -> Result<()>;
    async fn delete_agent(&self, project_id: &str, agent_id: &str) -> Result<()>;
}

// ── TOML file-backed implementation ──────────────────────────────────

/// On-disk layout: teams and agents nest under their project.
///
/// ```toml
/// [[projects]]
/// id = "saas-startup"
/// name = "SaaS Startup"
///
/// [[projects.teams]]
/// id = "design"
/// name = "Design"
///
/// [[projects.agents]]
/// id = "tech-lead"
/// name = "Tom"
/// role = "Tech Lead"
/// team = "design"
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
struct RosterFile {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectEntry {
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    teams: Vec<TeamEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    agents: Vec<AgentEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TeamEntry {
    id: String,
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AgentEntry {
    id: String,
    name: String,
    #[serde(default)]
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    team: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    lead: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ProjectEntry {
    fn project(&self) -> Project {
        Project {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    fn teams(&self) -> Vec<Team> {
        self.teams
            .iter()
            .map(|t| Team {
                id: t.id.clone(),
                project_id: self.id.clone(),
                name: t.name.clone(),
            })
            .collect()
    }

    fn agents(&self) -> Vec<Agent> {
        self.agents
            .iter()
            .map(|a| Agent {
                id: a.id.clone(),
                project_id: self.id.clone(),
                team_id: a.team.clone(),
                name: a.name.clone(),
                role: a.role.clone(),
                is_team_lead: a.lead,
            })
            .collect()
    }

    fn check_team(&self, agent: &Agent) -> crate::Result<()> {
        match &agent.team_id {
            Some(team_id) if !self.teams.iter().any(|t| &t.id == team_id) => {
                Err(Error::UnknownTeam {
                    project_id: self.id.clone(),
                    team_id: team_id.clone(),
                    agent_id: agent.id.clone(),
                })
            },
            _ => Ok(()),
        }
    }
}

impl From<Agent> for AgentEntry {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            role: agent.role,
            team: agent.team_id,
            lead: agent.is_team_lead,
        }
    }
}

/// Stores rosters in a TOML file at the given path.
pub struct TomlRosterStore {
    path: PathBuf,
}

impl TomlRosterStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_file(&self) -> crate::Result<RosterFile> {
        if !self.path.exists() {
            return Ok(RosterFile::default());
        }
        let data = fs::read_to_string(&self.path)?;
        toml::from_str(&data).map_err(|source| Error::TomlDeserialize {
            path: self.path.clone(),
            source,
        })
    }

    fn write_file(&self, file: &RosterFile) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(file)?;
        fs::write(&self.path, data)?;
        Ok(())
    }

    fn find<'f>(file: &'f mut RosterFile, project_id: &str) -> crate::Result<&'f mut ProjectEntry> {
        file.projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| Error::unknown_project(project_id))
    }
}

#[async_trait]
impl RosterStore for TomlRosterStore {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self
            .read_file()?
            .projects
            .iter()
            .map(ProjectEntry::project)
            .collect())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self
            .read_file()?
            .projects
            .iter()
            .find(|p| p.id == id)
            .map(ProjectEntry::project))
    }

    async fn upsert_project(&self, project: Project) -> Result<()> {
        let mut file = self.read_file()?;
        if let Some(existing) = file.projects.iter_mut().find(|p| p.id == project.id) {
            existing.name = project.name;
        } else {
            file.projects.push(ProjectEntry {
                id: project.id,
                name: project.name,
                teams: Vec::new(),
                agents: Vec::new(),
            });
        }
        Ok(self.write_file(&file)?)
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        let mut file = self.read_file()?;
        file.projects.retain(|p| p.id != id);
        Ok(self.write_file(&file)?)
    }

    async fn list_teams(&self, project_id: &str) -> Result<Vec<Team>> {
        Ok(self
            .read_file()?
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .map(ProjectEntry::teams)
            .unwrap_or_default())
    }

    async fn upsert_team(&self, team: Team) -> Result<()> {
        let mut file = self.read_file()?;
        let project = Self::find(&mut file, &team.project_id)?;
        if let Some(existing) = project.teams.iter_mut().find(|t| t.id == team.id) {
            existing.name = team.name;
        } else {
            project.teams.push(TeamEntry {
                id: team.id,
                name: team.name,
            });
        }
        Ok(self.write_file(&file)?)
    }

    async fn list_agents(&self, project_id: &str) -> Result<Vec<Agent>> {
        let agents = self
            .read_file()?
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .map(ProjectEntry::agents)
            .unwrap_or_default();
        debug!(project_id, count = agents.len(), "loaded roster from file");
        Ok(agents)
    }

    async fn upsert_agent(&self, agent: Agent) -> Result<()> {
        check_agent_id(&agent)?;
        let mut file = self.read_file()?;
        let project = Self::find(&mut file, &agent.project_id)?;
        project.check_team(&agent)?;
        let id = agent.id.clone();
        if let Some(existing) = project.agents.iter_mut().find(|a| a.id == id) {
            *existing = agent.into();
        } else {
            project.agents.push(agent.into());
        }
        Ok(self.write_file(&file)?)
    }

    async fn delete_agent(&self, project_id: &str, agent_id: &str) -> Result<()> {
        let mut file = self.read_file()?;
        if let Some(project) = file.projects.iter_mut().find(|p| p.id == project_id) {
            project.agents.retain(|a| a.id != agent_id);
        }
        Ok(self.write_file(&file)?)
    }
}

/// Refuse agent ids that would collide with system messages.
fn check_agent_id(agent: &Agent) -> crate::Result<()> {
    if agent.has_reserved_id() {
        return Err(Error::ReservedAgentId {
            project_id: agent.project_id.clone(),
            agent_id: agent.id.clone(),
        });
    }
    Ok(())
}

// ── SQLite-backed implementation ────────────────────────────────────

/// Stores rosters in a SQLite database.
pub struct SqliteRosterStore {
    pool: sqlx::SqlitePool,
}

impl SqliteRosterStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the roster tables directly from the migration script.
    ///
    /// Used by tests on in-memory databases; deployments call
    /// [`crate::run_migrations`].
    #[doc(hidden)]
    pub async fn init(pool: &sqlx::SqlitePool) -> Result<()> {
        sqlx::raw_sql(include_str!("../migrations/20260301000000_roster.sql"))
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn require_project(&self, project_id: &str) -> crate::Result<()> {
        let found: Option<(String,)> = sqlx::query_as("SELECT id FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        found
            .map(|_| ())
            .ok_or_else(|| Error::unknown_project(project_id))
    }

    async fn require_team(&self, agent: &Agent) -> crate::Result<()> {
        let Some(team_id) = &agent.team_id else {
            return Ok(());
        };
        let found: Option<(String,)> =
            sqlx::query_as("SELECT id FROM teams WHERE project_id = ? AND id = ?")
                .bind(&agent.project_id)
                .bind(team_id)
                .fetch_optional(&self.pool)
                .await?;
        found.map(|_| ()).ok_or_else(|| Error::UnknownTeam {
            project_id: agent.project_id.clone(),
            team_id: team_id.clone(),
            agent_id: agent.id.clone(),
        })
    }
}

#[async_trait]
impl RosterStore for SqliteRosterStore {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>("SELECT id, name FROM projects ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>("SELECT id, name FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn upsert_project(&self, project: Project) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO projects (id, name) VALUES (?, ?)
               ON CONFLICT(id) DO UPDATE SET name = excluded.name"#,
        )
        .bind(&project.id)
        .bind(&project.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["agents", "teams"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE project_id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_teams(&self, project_id: &str) -> Result<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>(
            "SELECT project_id, id, name FROM teams WHERE project_id = ? ORDER BY rowid",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upsert_team(&self, team: Team) -> Result<()> {
        self.require_project(&team.project_id).await?;
        sqlx::query(
            r#"INSERT INTO teams (project_id, id, name) VALUES (?, ?, ?)
               ON CONFLICT(project_id, id) DO UPDATE SET name = excluded.name"#,
        )
        .bind(&team.project_id)
        .bind(&team.id)
        .bind(&team.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_agents(&self, project_id: &str) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            r#"SELECT project_id, id, team_id, name, role, is_team_lead
               FROM agents WHERE project_id = ? ORDER BY position"#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        debug!(project_id, count = rows.len(), "loaded roster from database");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upsert_agent(&self, agent: Agent) -> Result<()> {
        check_agent_id(&agent)?;
        self.require_project(&agent.project_id).await?;
        self.require_team(&agent).await?;
        // Position is assigned once so updates keep roster order.
        sqlx::query(
            r#"INSERT INTO agents (project_id, id, team_id, name, role, is_team_lead, position)
               VALUES (?, ?, ?, ?, ?, ?,
                       (SELECT COALESCE(MAX(position) + 1, 0) FROM agents WHERE project_id = ?))
               ON CONFLICT(project_id, id) DO UPDATE SET
                 team_id = excluded.team_id,
                 name = excluded.name,
                 role = excluded.role,
                 is_team_lead = excluded.is_team_lead"#,
        )
        .bind(&agent.project_id)
        .bind(&agent.id)
        .bind(&agent.team_id)
        .bind(&agent.name)
        .bind(&agent.role)
        .bind(agent.is_team_lead)
        .bind(&agent.project_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_agent(&self, project_id: &str, agent_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM agents WHERE project_id = ? AND id = ?")
            .bind(project_id)
            .bind(agent_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    name: String,
}

impl From<ProjectRow> for Project {
    fn from(r: ProjectRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TeamRow {
    project_id: String,
    id: String,
    name: String,
}

impl From<TeamRow> for Team {
    fn from(r: TeamRow) -> Self {
        Self {
            id: r.id,
            project_id: r.project_id,
            name: r.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    project_id: String,
    id: String,
    team_id: Option<String>,
    name: String,
    role: String,
    is_team_lead: bool,
}

impl From<AgentRow> for Agent {
    fn from(r: AgentRow) -> Self {
        Self {
            id: r.id,
            project_id: r.project_id,
            team_id: r.team_id,
            name: r.name,
            role: r.role,
            is_team_lead: r.is_team_lead,
        }
    }
}
