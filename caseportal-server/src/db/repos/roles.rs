//! Role repository: `user_roles` keyed by identity

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::{RoleSet, ADMIN_ROLE};

/// Admin identity offered in the assignment picker
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct AdminProfile {
    pub id: Uuid,
    pub full_name: String,
}

/// Role repository
pub struct RoleRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> RoleRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All role labels held by `user_id`.
    pub async fn roles_for(&self, user_id: Uuid) -> Result<RoleSet, DbError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT role FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        Ok(RoleSet::new(rows.into_iter().map(|(role,)| role)))
    }

    /// Roles for `user_id`, resolving to an empty set if the lookup fails.
    ///
    /// The failure is logged; the caller sees a non-admin identity.
    pub async fn resolve(&self, user_id: Uuid) -> RoleSet {
        match self.roles_for(user_id).await {
            Ok(roles) => roles,
            Err(e) => {
                tracing::error!(%user_id, error = %e, "role lookup failed, treating as no roles");
                RoleSet::default()
            }
        }
    }

    /// Grant a role. Returns `false` if it was already held.
    pub async fn grant(&self, user_id: Uuid, role: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role) VALUES ($1, $2)
            ON CONFLICT (user_id, role) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if super::is_foreign_key_violation(&e) {
                DbError::not_found("profile", user_id)
            } else {
                e.into()
            }
        })?;

        Ok(result.rows_affected() == 1)
    }

    /// Revoke a role. Returns `false` if it was not held.
    pub async fn revoke(&self, user_id: Uuid, role: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role = $2")
            .bind(user_id)
            .bind(role)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Every admin with a display name, sorted by name.
    pub async fn list_admins(&self) -> Result<Vec<AdminProfile>, DbError> {
        let admins = sqlx::query_as(
            r#"
            SELECT p.id, p.full_name
            FROM user_roles r
            JOIN profiles p ON p.id = r.user_id
            WHERE r.role = $1
            ORDER BY p.full_name ASC
            "#,
        )
        .bind(ADMIN_ROLE)
        .fetch_all(self.pool)
        .await?;

        Ok(admins)
    }
}
