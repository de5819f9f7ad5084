//! SQLite-backed relational metadata: users, conversations, chat turns
//! and uploaded-file records. The RAG core only sees this through the
//! `ChatHistory` and `FileRegistry` traits.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use crate::core::errors::RagError;
use crate::rag::session::{ChatHistory, FileRegistry};
use crate::rag::{ChatTurn, FileEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, RagError> {
        let conn_str = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await
            .map_err(|e| RagError::internal(format!("failed to connect to db: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await
            .map_err(RagError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                human_message TEXT NOT NULL,
                ai_response TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_path TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chats_conversation ON chats(conversation_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::internal)?;

        Ok(())
    }

    pub async fn create_user(&self, username: &str) -> Result<String, RagError> {
        let user_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO users (id, username, created_at) VALUES (?, ?, ?)")
            .bind(&user_id)
            .bind(username)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(RagError::internal)?;

        Ok(user_id)
    }

    pub async fn create_conversation(&self, user_id: &str) -> Result<String, RagError> {
        let conversation_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO conversations (id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(&conversation_id)
            .bind(user_id)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(RagError::internal)?;

        Ok(conversation_id)
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationInfo>, RagError> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, created_at FROM conversations \
             WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::internal)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(ConversationInfo {
                id: row.try_get("id").unwrap_or_default(),
                user_id: row.try_get("user_id").unwrap_or_default(),
                name: row.try_get("name").unwrap_or(None),
                created_at: row.try_get("created_at").unwrap_or_default(),
            });
        }
        Ok(conversations)
    }

    pub async fn register_file(
        &self,
        user_id: &str,
        file_name: &str,
        file_type: &str,
        file_path: &str,
    ) -> Result<FileEntry, RagError> {
        let file_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO files (id, user_id, file_name, file_type, file_path, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&file_id)
        .bind(user_id)
        .bind(file_name)
        .bind(file_type)
        .bind(file_path)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(RagError::internal)?;

        Ok(FileEntry {
            file_id,
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
            file_path: file_path.to_string(),
        })
    }
}

#[async_trait]
impl ChatHistory for HistoryStore {
    async fn turns(&self, conversation_id: &str) -> Result<Vec<ChatTurn>, RagError> {
        let rows = sqlx::query(
            "SELECT human_message, ai_response FROM chats \
             WHERE conversation_id = ? ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::internal)?;

        let mut turns = Vec::new();
        for row in rows {
            turns.push(ChatTurn {
                human_message: row.try_get("human_message").unwrap_or_default(),
                ai_response: row.try_get("ai_response").unwrap_or_default(),
            });
        }
        Ok(turns)
    }

    async fn append_turn(
        &self,
        conversation_id: &str,
        human_message: &str,
        ai_response: &str,
    ) -> Result<bool, RagError> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO chats (conversation_id, human_message, ai_response, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(human_message)
        .bind(ai_response)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(RagError::internal)?;

        Ok(result.rows_affected() > 0)
    }

    async fn rename(&self, conversation_id: &str, title: &str) -> Result<bool, RagError> {
        let result = sqlx::query("UPDATE conversations SET name = ? WHERE id = ?")
            .bind(title)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(RagError::internal)?;

        Ok(result.rows_affected() > 0)
    }

    async fn owner(&self, conversation_id: &str) -> Result<String, RagError> {
        let row = sqlx::query("SELECT user_id FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RagError::internal)?;

        match row {
            Some(row) => Ok(row.try_get("user_id").unwrap_or_default()),
            None => Err(RagError::NotFound(format!(
                "conversation {}",
                conversation_id
            ))),
        }
    }
}

#[async_trait]
impl FileRegistry for HistoryStore {
    async fn list_files(&self, user_id: &str) -> Result<Vec<FileEntry>, RagError> {
        let rows = sqlx::query(
            "SELECT id, file_name, file_type, file_path FROM files \
             WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::internal)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(FileEntry {
                file_id: row.try_get("id").unwrap_or_default(),
                file_name: row.try_get("file_name").unwrap_or_default(),
                file_type: row.try_get("file_type").unwrap_or_default(),
                file_path: row.try_get("file_path").unwrap_or_default(),
            });
        }
        Ok(files)
    }
}
