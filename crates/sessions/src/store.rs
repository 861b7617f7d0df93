use {
    anyhow::Result,
    async_trait::async_trait,
    huddle_common::SenderKind,
    tracing::debug,
};

use crate::{
    error::{Context, Error},
    message::{MessageMetadata, PersistedMessage},
};

/// Append-only message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: &PersistedMessage) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<PersistedMessage>>;
    /// Messages of one conversation, oldest first.
    async fn list(&self, conversation_id: &str) -> Result<Vec<PersistedMessage>>;
    /// The user turn a client already sent under `client_message_id`.
    async fn find_user_turn(
        &self,
        conversation_id: &str,
        client_message_id: &str,
    ) -> Result<Option<PersistedMessage>>;
    /// The response persisted for `message_id`, if any.
    async fn response_to(&self, message_id: &str) -> Result<Option<PersistedMessage>>;
}

/// Stores messages in a SQLite database.
pub struct SqliteMessageStore {
    pool: sqlx::SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        binds: &[&str],
    ) -> Result<Option<PersistedMessage>> {
        let sql = format!("{SELECT_MESSAGE} WHERE {clause} LIMIT 1");
        let mut query = sqlx::query_as::<_, MessageRow>(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(PersistedMessage::try_from).transpose()?)
    }
}

const SELECT_MESSAGE: &str = "SELECT id, conversation_id, message_type, agent_id, content, \
                              thread_id, reply_to, client_message_id, metadata, created_at \
                              FROM messages";

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append(&self, message: &PersistedMessage) -> Result<()> {
        let metadata = serde_json::to_string(&message.metadata)?;
        sqlx::query(
            r#"INSERT INTO messages (id, conversation_id, message_type, agent_id, content,
                                    thread_id, reply_to, client_message_id, metadata, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(message.sender.as_str())
        .bind(&message.agent_id)
        .bind(&message.content)
        .bind(&message.thread_id)
        .bind(&message.reply_to)
        .bind(&message.client_message_id)
        .bind(metadata)
        .bind(message.created_at as i64)
        .execute(&self.pool)
        .await?;
        debug!(
            message_id = %message.id,
            conversation_id = %message.conversation_id,
            sender = %message.sender,
            "appended message"
        );
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PersistedMessage>> {
        self.fetch_one_where("id = ?", &[id]).await
    }

    async fn list(&self, conversation_id: &str) -> Result<Vec<PersistedMessage>> {
        let sql = format!("{SELECT_MESSAGE} WHERE conversation_id = ? ORDER BY created_at, rowid");
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(conversation_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(PersistedMessage::try_from)
            .collect::<crate::Result<_>>()?)
    }

    async fn find_user_turn(
        &self,
        conversation_id: &str,
        client_message_id: &str,
    ) -> Result<Option<PersistedMessage>> {
        self.fetch_one_where(
            "conversation_id = ? AND client_message_id = ? AND message_type = 'user'",
            &[conversation_id, client_message_id],
        )
        .await
    }

    async fn response_to(&self, message_id: &str) -> Result<Option<PersistedMessage>> {
        self.fetch_one_where("reply_to = ?", &[message_id]).await
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    conversation_id: String,
    message_type: String,
    agent_id: Option<String>,
    content: String,
    thread_id: Option<String>,
    reply_to: Option<String>,
    client_message_id: Option<String>,
    metadata: String,
    created_at: i64,
}

impl TryFrom<MessageRow> for PersistedMessage {
    type Error = Error;

    fn try_from(r: MessageRow) -> crate::Result<Self> {
        let sender = r
            .message_type
            .parse::<SenderKind>()
            .with_context(|| format!("message `{}` has an invalid type", r.id))?;
        let metadata: MessageMetadata = serde_json::from_str(&r.metadata)
            .with_context(|| format!("message `{}` has invalid metadata", r.id))?;
        Ok(Self {
            id: r.id,
            conversation_id: r.conversation_id,
            sender,
            agent_id: r.agent_id,
            content: r.content,
            thread_id: r.thread_id,
            reply_to: r.reply_to,
            client_message_id: r.client_message_id,
            metadata,
            created_at: r.created_at as u64,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            conversation::{ConversationStore, SqliteConversationStore},
            message::FallbackInfo,
        },
        huddle_routing::ConversationRef,
    };

    async fn stores() -> (SqliteMessageStore, sqlx::SqlitePool) {
        let pool = crate::test_pool().await;
        let conversations = SqliteConversationStore::new(pool.clone());
        for route in [
            ConversationRef::project("saas").unwrap(),
            ConversationRef::team("saas", "design").unwrap(),
        ] {
            conversations.get_or_create(&route).await.unwrap();
        }
        (SqliteMessageStore::new(pool.clone()), pool)
    }

    #[tokio::test]
    async fn append_and_list_in_order() {
        let (store, _pool) = stores().await;
        let user =
            PersistedMessage::user("project-saas", "hello").with_client_id(Some("c-1".into()));
        let reply = PersistedMessage::agent("project-saas", "pm", "hi there")
            .replying_to(&user.id)
            .with_routing("project_scope_pm_authority", None);
        store.append(&user).await.unwrap();
        store.append(&reply).await.unwrap();
        store
            .append(&PersistedMessage::user("team-saas-design", "elsewhere"))
            .await
            .unwrap();

        let listed = store.list("project-saas").await.unwrap();
        assert_eq!(listed, vec![user.clone(), reply.clone()]);

        assert_eq!(store.get(&reply.id).await.unwrap(), Some(reply.clone()));
        assert_eq!(store.response_to(&user.id).await.unwrap(), Some(reply));
        assert_eq!(
            store.find_user_turn("project-saas", "c-1").await.unwrap(),
            Some(user)
        );
        assert!(store.find_user_turn("team-saas-design", "c-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn system_fallback_round_trips_metadata() {
        let (store, _pool) = stores().await;
        let notice =
            PersistedMessage::system_fallback("project-saas", "no_agents_in_project", "No agents.");
        store.append(&notice).await.unwrap();
        let loaded = store.get(&notice.id).await.unwrap().unwrap();
        assert_eq!(loaded.agent_id, None);
        assert_eq!(
            loaded.metadata.fallback,
            Some(FallbackInfo::system("no_agents_in_project"))
        );
    }

    #[tokio::test]
    async fn schema_rejects_fake_system_agents() {
        let (store, _pool) = stores().await;
        let fake = PersistedMessage::agent("project-saas", "system", "I am the system");
        assert!(store.append(&fake).await.is_err());

        let mut attributed = PersistedMessage::system_fallback("project-saas", "x", "notice");
        attributed.agent_id = Some("pm".into());
        assert!(store.append(&attributed).await.is_err());
    }

    #[tokio::test]
    async fn second_response_to_same_turn_is_rejected() {
        let (store, _pool) = stores().await;
        let user = PersistedMessage::user("project-saas", "hello");
        store.append(&user).await.unwrap();
        store
            .append(&PersistedMessage::agent("project-saas", "pm", "one").replying_to(&user.id))
            .await
            .unwrap();
        let second = PersistedMessage::agent("project-saas", "dev", "two").replying_to(&user.id);
        assert!(store.append(&second).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_metadata_is_reported() {
        let (store, pool) = stores().await;
        let user = PersistedMessage::user("project-saas", "hello");
        store.append(&user).await.unwrap();
        sqlx::query("UPDATE messages SET metadata = 'not json' WHERE id = ?")
            .bind(&user.id)
            .execute(&pool)
            .await
            .unwrap();
        let err = store.get(&user.id).await.unwrap_err();
        assert!(err.to_string().contains("invalid metadata"));
    }
}
