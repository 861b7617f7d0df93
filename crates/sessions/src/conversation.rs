use {
    anyhow::Result,
    async_trait::async_trait,
    huddle_routing::{ConversationRef, Scope},
    serde::Serialize,
    tracing::debug,
};

use crate::{error::Error, message::now_ms};

/// A stored conversation. `route` is the decoded form of `id` and never
/// changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub route: ConversationRef,
    pub created_at: u64,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Conversation>>;

    /// Return the conversation for `route`, creating it on first use. An
    /// existing record keeps its original fields even if they differ from
    /// `route`; callers compare and decide.
    async fn get_or_create(&self, route: &ConversationRef) -> Result<Conversation>;
}

/// Stores conversations in a SQLite database.
pub struct SqliteConversationStore {
    pool: sqlx::SqlitePool,
}

impl SqliteConversationStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(
            "SELECT id, scope, project_id, context_id, created_at FROM conversations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Conversation::try_from).transpose()?)
    }

    async fn get_or_create(&self, route: &ConversationRef) -> Result<Conversation> {
        let id = route.conversation_id();
        let inserted = sqlx::query(
            r#"INSERT INTO conversations (id, scope, project_id, context_id, created_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(id) DO NOTHING"#,
        )
        .bind(&id)
        .bind(route.scope().as_str())
        .bind(route.project_id())
        .bind(route.context_id())
        .bind(now_ms() as i64)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if inserted > 0 {
            debug!(conversation_id = %id, scope = %route.scope(), "created conversation");
        }

        let conversation = self.get(&id).await?;
        conversation
            .ok_or_else(|| Error::message(format!("conversation `{id}` vanished after insert")))
            .map_err(Into::into)
    }
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: String,
    scope: String,
    project_id: String,
    context_id: Option<String>,
    created_at: i64,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = Error;

    fn try_from(r: ConversationRow) -> crate::Result<Self> {
        let corrupt = |source| Error::CorruptConversation {
            id: r.id.clone(),
            source,
        };
        let scope = r.scope.parse::<Scope>().map_err(corrupt)?;
        let route =
            ConversationRef::new(scope, &r.project_id, r.context_id.as_deref()).map_err(corrupt)?;
        Ok(Self {
            id: r.id,
            route,
            created_at: r.created_at as u64,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteConversationStore {
        SqliteConversationStore::new(crate::test_pool().await)
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = store().await;
        let route = ConversationRef::team("saas-startup", "design").unwrap();

        let first = store.get_or_create(&route).await.unwrap();
        assert_eq!(first.id, "team-saas-startup-design");
        assert_eq!(first.route, route);

        let again = store.get_or_create(&route).await.unwrap();
        assert_eq!(again, first);
    }

    #[tokio::test]
    async fn existing_record_keeps_original_split() {
        let store = store().await;
        let original = ConversationRef::team("saas-startup", "design").unwrap();
        store.get_or_create(&original).await.unwrap();

        // Same canonical string, different project/team split.
        let other = ConversationRef::team("saas", "startup-design").unwrap();
        assert_eq!(other.conversation_id(), original.conversation_id());
        let found = store.get_or_create(&other).await.unwrap();
        assert_eq!(found.route, original);
    }

    #[tokio::test]
    async fn project_conversation_has_no_context() {
        let store = store().await;
        let route = ConversationRef::project("saas").unwrap();
        store.get_or_create(&route).await.unwrap();
        let found = store.get("project-saas").await.unwrap().unwrap();
        assert_eq!(found.route.context_id(), None);
        assert!(store.get("project-other").await.unwrap().is_none());
    }
}
