//! Comment repository
//!
//! Comments are append-only: there is no update or delete.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::CommentBody;

/// Comment record
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub case_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Comment with its author's display name
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommentView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: Option<String>,
}

/// Comment repository
pub struct CommentRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> CommentRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append a comment to a case.
    pub async fn create(
        &self,
        case_id: Uuid,
        author_id: Uuid,
        body: CommentBody,
    ) -> Result<Comment, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO case_comments (case_id, user_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, case_id, user_id, content, created_at
            "#,
        )
        .bind(case_id)
        .bind(author_id)
        .bind(body.as_str())
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

    /// Comments for a case, oldest first.
    pub async fn list_for_case(&self, case_id: Uuid) -> Result<Vec<CommentView>, DbError> {
        let comments = sqlx::query_as(
            r#"
            SELECT
                cc.id, cc.case_id, cc.user_id, cc.content, cc.created_at,
                p.full_name AS author_name
            FROM case_comments cc
            LEFT JOIN profiles p ON p.id = cc.user_id
            WHERE cc.case_id = $1
            ORDER BY cc.created_at ASC, cc.id ASC
            "#,
        )
        .bind(case_id)
        .fetch_all(self.pool)
        .await?;

        Ok(comments)
    }
}
