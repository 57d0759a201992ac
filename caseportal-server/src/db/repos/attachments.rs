//! Attachment metadata repository
//!
//! Only the metadata row lives here; blob bytes live in the
//! [`crate::storage::BlobStore`]. Callers sequence the two writes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::AttachmentUpload;

/// Attachment record
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Attachment {
    pub id: Uuid,
    pub case_id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// Attachment with its uploader's display name
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttachmentView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attachment: Attachment,
    pub uploader_name: Option<String>,
}

/// Attachment repository
pub struct AttachmentRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> AttachmentRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record metadata for a blob already written at `file_path`.
    pub async fn create(
        &self,
        case_id: Uuid,
        uploader_id: Uuid,
        upload: &AttachmentUpload,
        file_path: &str,
    ) -> Result<Attachment, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO case_attachments (case_id, user_id, file_name, file_path, file_size, mime_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, case_id, user_id, file_name, file_path, file_size, mime_type, created_at
            "#,
        )
        .bind(case_id)
        .bind(uploader_id)
        .bind(upload.file_name())
        .bind(file_path)
        .bind(upload.size())
        .bind(upload.mime_type())
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if super::is_foreign_key_violation(&e) {
                DbError::not_found("case", case_id)
            } else if super::is_unique_violation(&e) {
                DbError::Conflict(format!("storage path '{}' already recorded", file_path))
            } else {
                e.into()
            }
        })
    }

    /// Attachments for a case, newest first.
    pub async fn list_for_case(&self, case_id: Uuid) -> Result<Vec<AttachmentView>, DbError> {
        let attachments = sqlx::query_as(
            r#"
            SELECT
                a.id, a.case_id, a.user_id, a.file_name, a.file_path, a.file_size,
                a.mime_type, a.created_at,
                p.full_name AS uploader_name
            FROM case_attachments a
            LEFT JOIN profiles p ON p.id = a.user_id
            WHERE a.case_id = $1
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .bind(case_id)
        .fetch_all(self.pool)
        .await?;

        Ok(attachments)
    }

    pub async fn get(&self, attachment_id: Uuid) -> Result<Attachment, DbError> {
        sqlx::query_as(
            r#"
            SELECT id, case_id, user_id, file_name, file_path, file_size, mime_type, created_at
            FROM case_attachments
            WHERE id = $1
            "#,
        )
        .bind(attachment_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("attachment", attachment_id))
    }

    /// Look up the record owning a storage path.
    pub async fn get_by_path(&self, file_path: &str) -> Result<Attachment, DbError> {
        sqlx::query_as(
            r#"
            SELECT id, case_id, user_id, file_name, file_path, file_size, mime_type, created_at
            FROM case_attachments
            WHERE file_path = $1
            "#,
        )
        .bind(file_path)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("attachment", file_path))
    }

    /// Delete the metadata row.
    pub async fn delete(&self, attachment_id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM case_attachments WHERE id = $1")
            .bind(attachment_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("attachment", attachment_id));
        }
        Ok(())
    }
}
