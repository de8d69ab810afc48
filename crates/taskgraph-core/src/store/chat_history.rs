//! Backs `GET /api/chat-history`: a narrow read-only seam over whatever SQL
//! store holds session transcripts. Reuses the orchestrator's own database
//! handle rather than standing up a second external collaborator for a
//! single read-only endpoint.

use async_trait::async_trait;
use serde::Serialize;

use crate::db::Database;
use crate::error::EngineError;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

#[async_trait]
pub trait ChatHistoryProvider: Send + Sync {
    async fn list_messages(
        &self,
        client_id: &str,
        project_id: &str,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, EngineError>;
}

pub struct SqliteChatHistoryProvider {
    db: Database,
}

impl SqliteChatHistoryProvider {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatHistoryProvider for SqliteChatHistoryProvider {
    async fn list_messages(
        &self,
        client_id: &str,
        project_id: &str,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, EngineError> {
        let client_id = client_id.to_string();
        let project_id = project_id.to_string();
        let session_id = session_id.to_string();

        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, role, content, created_at FROM chat_messages
                     WHERE client_id = ?1 AND project_id = ?2 AND session_id = ?3
                     ORDER BY created_at ASC",
                )?;
                let rows = stmt.query_map(
                    rusqlite::params![client_id, project_id, session_id],
                    |row| {
                        let created_at_ms: i64 = row.get(3)?;
                        let created_at = chrono::DateTime::from_timestamp_millis(created_at_ms)
                            .map(|dt| dt.to_rfc3339())
                            .unwrap_or_default();
                        Ok(ChatMessage {
                            id: row.get(0)?,
                            role: row.get(1)?,
                            content: row.get(2)?,
                            created_at,
                        })
                    },
                )?;
                rows.collect()
            })
            .await
    }
}
