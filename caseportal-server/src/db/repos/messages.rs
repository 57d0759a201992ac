//! Chat message repository
//!
//! Messages are never edited or deleted; only the `read` flag changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::ChatContent;

/// Chat message record
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub case_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Chat message with its sender's display name
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatMessageView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub message: ChatMessage,
    pub sender_name: Option<String>,
}

/// Message repository
pub struct MessageRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> MessageRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        case_id: Uuid,
        sender_id: Uuid,
        content: ChatContent,
    ) -> Result<ChatMessage, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO case_messages (case_id, sender_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, case_id, sender_id, content, read, created_at
            "#,
        )
        .bind(case_id)
        .bind(sender_id)
        .bind(content.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if super::is_foreign_key_violation(&e) {
                DbError::not_found("case", case_id)
            } else {
                e.into()
            }
        })
    }

    /// Messages for a case, oldest first.
    pub async fn list_for_case(&self, case_id: Uuid) -> Result<Vec<ChatMessageView>, DbError> {
        let messages = sqlx::query_as(
            r#"
            SELECT
                m.id, m.case_id, m.sender_id, m.content, m.read, m.created_at,
                p.full_name AS sender_name
            FROM case_messages m
            LEFT JOIN profiles p ON p.id = m.sender_id
            WHERE m.case_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            "#,
        )
        .bind(case_id)
        .fetch_all(self.pool)
        .await?;

        Ok(messages)
    }

    /// Distinct cases the given messages belong to.
    pub async fn case_ids_for(&self, message_ids: &[Uuid]) -> Result<Vec<Uuid>, DbError> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT DISTINCT case_id FROM case_messages WHERE id = ANY($1)")
                .bind(message_ids)
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Set `read = true` on every listed message in one statement.
    ///
    /// Unknown ids are ignored. Returns the number of rows touched.
    pub async fn mark_read(&self, message_ids: &[Uuid]) -> Result<u64, DbError> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("UPDATE case_messages SET read = TRUE WHERE id = ANY($1)")
            .bind(message_ids)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Unread messages in a case that were not sent by `viewer_id`.
    pub async fn unread_count(&self, case_id: Uuid, viewer_id: Uuid) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM case_messages
            WHERE case_id = $1 AND read = FALSE AND sender_id <> $2
            "#,
        )
        .bind(case_id)
        .bind(viewer_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}
