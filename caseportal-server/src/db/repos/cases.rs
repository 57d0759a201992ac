//! Case repository
//!
//! Handles the case aggregate:
//! - create: status pending, no assignee
//! - list: newest first; the admin list resolves client and assignee names
//!   with LEFT JOINs in one query
//! - update: exactly one column per call, last write wins

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::{
    CaseDescription, CaseFieldUpdate, CasePriority, CaseStatus, CaseTitle, StatusPolicy,
    ValidationError, ADMIN_ROLE,
};

/// Case record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Case {
    pub id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: CaseStatus,
    pub priority: CasePriority,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Case with display names resolved
#[derive(Debug, Clone, Serialize)]
pub struct CaseView {
    #[serde(flatten)]
    pub case: Case,
    pub client_name: Option<String>,
    pub assignee_name: Option<String>,
}

#[derive(FromRow)]
struct CaseRow {
    id: Uuid,
    client_id: Uuid,
    title: String,
    description: String,
    status: String,
    priority: String,
    assigned_to: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CaseRow> for Case {
    type Error = DbError;

    fn try_from(r: CaseRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            client_id: r.client_id,
            title: r.title,
            description: r.description,
            status: r.status.parse().map_err(|e| DbError::decode("case", e))?,
            priority: r.priority.parse().map_err(|e| DbError::decode("case", e))?,
            assigned_to: r.assigned_to,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct CaseViewRow {
    #[sqlx(flatten)]
    case: CaseRow,
    client_name: Option<String>,
    assignee_name: Option<String>,
}

impl TryFrom<CaseViewRow> for CaseView {
    type Error = DbError;

    fn try_from(r: CaseViewRow) -> Result<Self, Self::Error> {
        Ok(Self {
            case: r.case.try_into()?,
            client_name: r.client_name,
            assignee_name: r.assignee_name,
        })
    }
}

/// Case repository
pub struct CaseRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> CaseRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Submit a new case for `client_id`.
    ///
    /// Status and assignee are never taken from the caller.
    pub async fn create(
        &self,
        client_id: Uuid,
        title: CaseTitle,
        description: CaseDescription,
        priority: CasePriority,
    ) -> Result<Case, DbError> {
        let row: CaseRow = sqlx::query_as(
            r#"
            INSERT INTO cases (client_id, title, description, priority, status, assigned_to)
            VALUES ($1, $2, $3, $4, 'pending', NULL)
            RETURNING id, client_id, title, description, status, priority, assigned_to, created_at
            "#,
        )
        .bind(client_id)
        .bind(title.as_str())
        .bind(description.as_str())
        .bind(priority.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if super::is_foreign_key_violation(&e) {
                DbError::not_found("profile", client_id)
            } else {
                e.into()
            }
        })?;

        row.try_into()
    }

    /// Cases owned by one client, newest first.
    pub async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<Case>, DbError> {
        let rows: Vec<CaseRow> = sqlx::query_as(
            r#"
            SELECT id, client_id, title, description, status, priority, assigned_to, created_at
            FROM cases
            WHERE client_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(client_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Case::try_from).collect()
    }

    /// All cases, newest first, optionally filtered by status.
    ///
    /// Client and assignee names come from the same query.
    pub async fn list_all(&self, status: Option<CaseStatus>) -> Result<Vec<CaseView>, DbError> {
        let rows: Vec<CaseViewRow> = sqlx::query_as(
            r#"
            SELECT
                c.id, c.client_id, c.title, c.description, c.status, c.priority,
                c.assigned_to, c.created_at,
                client.full_name AS client_name,
                assignee.full_name AS assignee_name
            FROM cases c
            LEFT JOIN profiles client ON client.id = c.client_id
            LEFT JOIN profiles assignee ON assignee.id = c.assigned_to
            WHERE ($1::text IS NULL OR c.status = $1)
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(CaseView::try_from).collect()
    }

    /// Fetch one case with client and assignee names.
    pub async fn get(&self, case_id: Uuid) -> Result<CaseView, DbError> {
        let row: CaseViewRow = sqlx::query_as(
            r#"
            SELECT
                c.id, c.client_id, c.title, c.description, c.status, c.priority,
                c.assigned_to, c.created_at,
                client.full_name AS client_name,
                assignee.full_name AS assignee_name
            FROM cases c
            LEFT JOIN profiles client ON client.id = c.client_id
            LEFT JOIN profiles assignee ON assignee.id = c.assigned_to
            WHERE c.id = $1
            "#,
        )
        .bind(case_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("case", case_id))?;

        row.try_into()
    }

    /// Owning client of a case.
    pub async fn client_of(&self, case_id: Uuid) -> Result<Uuid, DbError> {
        let client: Option<(Uuid,)> = sqlx::query_as("SELECT client_id FROM cases WHERE id = $1")
            .bind(case_id)
            .fetch_optional(self.pool)
            .await?;

        client
            .map(|(id,)| id)
            .ok_or_else(|| DbError::not_found("case", case_id))
    }

    /// Apply one administrative field update.
    ///
    /// The row is locked for the duration of the check so the status policy
    /// sees the value it replaces. Assignees must hold the admin role at this
    /// moment; existing assignments are never re-validated.
    pub async fn update_field(
        &self,
        case_id: Uuid,
        update: CaseFieldUpdate,
        policy: StatusPolicy,
    ) -> Result<Case, DbError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(String,)> =
            sqlx::query_as("SELECT status FROM cases WHERE id = $1 FOR UPDATE")
                .bind(case_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (current_status,) = current.ok_or_else(|| DbError::not_found("case", case_id))?;

        let row: CaseRow = match update {
            CaseFieldUpdate::Status(next) => {
                let from: CaseStatus = current_status
                    .parse()
                    .map_err(|e| DbError::decode("case", e))?;
                policy.check(from, next)?;

                sqlx::query_as(
                    r#"
                    UPDATE cases SET status = $2 WHERE id = $1
                    RETURNING id, client_id, title, description, status, priority, assigned_to, created_at
                    "#,
                )
                .bind(case_id)
                .bind(next.as_str())
                .fetch_one(&mut *tx)
                .await?
            }
            CaseFieldUpdate::Priority(priority) => {
                sqlx::query_as(
                    r#"
                    UPDATE cases SET priority = $2 WHERE id = $1
                    RETURNING id, client_id, title, description, status, priority, assigned_to, created_at
                    "#,
                )
                .bind(case_id)
                .bind(priority.as_str())
                .fetch_one(&mut *tx)
                .await?
            }
            CaseFieldUpdate::AssignedTo(assignee) => {
                if let Some(user_id) = assignee {
                    let (is_admin,): (bool,) = sqlx::query_as(
                        "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2)",
                    )
                    .bind(user_id)
                    .bind(ADMIN_ROLE)
                    .fetch_one(&mut *tx)
                    .await?;

                    if !is_admin {
                        return Err(ValidationError::NotAssignable {
                            user_id: user_id.to_string(),
                        }
                        .into());
                    }
                }

                sqlx::query_as(
                    r#"
                    UPDATE cases SET assigned_to = $2 WHERE id = $1
                    RETURNING id, client_id, title, description, status, priority, assigned_to, created_at
                    "#,
                )
                .bind(case_id)
                .bind(assignee)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        tracing::debug!(%case_id, field = update.column(), "case updated");
        row.try_into()
    }
}
