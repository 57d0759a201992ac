//! Account repository: profiles, password hashes and sessions
//!
//! Sessions are opaque random tokens stored server-side, so sign-out is a
//! row delete and takes effect immediately.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::{Email, FullName, Password, CLIENT_ROLE};

/// Hash checked when no account matches, so unknown emails cost a bcrypt
/// verify like known ones.
static DUMMY_HASH: Lazy<String> = Lazy::new(|| {
    bcrypt::hash("caseportal-no-such-account", bcrypt::DEFAULT_COST).unwrap_or_default()
});

/// Public profile of an identity
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

/// Issued session
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
    pub user: Profile,
}

#[derive(FromRow)]
struct Credentials {
    #[sqlx(flatten)]
    profile: Profile,
    password_hash: String,
}

/// Account repository
pub struct AccountRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> AccountRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Register a new identity with the `client` role.
    pub async fn sign_up(
        &self,
        email: Email,
        password: Password,
        full_name: FullName,
    ) -> Result<Profile, DbError> {
        let password_hash = tokio::task::spawn_blocking(move || {
            bcrypt::hash(password.expose(), bcrypt::DEFAULT_COST)
        })
        .await??;

        let mut tx = self.pool.begin().await?;

        let profile: Profile = sqlx::query_as(
            r#"
            INSERT INTO profiles (email, full_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, full_name, created_at
            "#,
        )
        .bind(email.as_str())
        .bind(full_name.as_str())
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if super::is_unique_violation(&e) {
                DbError::Conflict(format!("an account for {} already exists", email.as_str()))
            } else {
                e.into()
            }
        })?;

        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(profile.id)
            .bind(CLIENT_ROLE)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %profile.id, "account created");
        Ok(profile)
    }

    /// Verify credentials and open a session valid for `ttl`.
    pub async fn sign_in(
        &self,
        email: Email,
        password: &str,
        ttl: Duration,
    ) -> Result<SessionToken, DbError> {
        let creds: Option<Credentials> = sqlx::query_as(
            r#"
            SELECT id, email, full_name, created_at, password_hash
            FROM profiles
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let (hash, profile) = match creds {
            Some(creds) => (creds.password_hash, Some(creds.profile)),
            None => (DUMMY_HASH.clone(), None),
        };

        let candidate = password.to_owned();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hash)).await?;
        let Some(profile) = profile else {
            return Err(DbError::InvalidCredentials);
        };
        if !verified? {
            return Err(DbError::InvalidCredentials);
        }

        let token = Uuid::new_v4();
        let expires_at = session_expiry(Utc::now(), ttl)?;

        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(profile.id)
            .bind(expires_at)
            .execute(self.pool)
            .await?;

        tracing::info!(user_id = %profile.id, "session opened");
        Ok(SessionToken {
            token,
            expires_at,
            user: profile,
        })
    }

    /// Profile behind a live session token, if any.
    pub async fn current_user(&self, token: Uuid) -> Result<Option<Profile>, DbError> {
        let profile = sqlx::query_as(
            r#"
            SELECT p.id, p.email, p.full_name, p.created_at
            FROM sessions s
            JOIN profiles p ON p.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(profile)
    }

    /// End a session. Returns `false` if the token was unknown.
    pub async fn sign_out(&self, token: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find_by_email(&self, email: &Email) -> Result<Profile, DbError> {
        sqlx::query_as("SELECT id, email, full_name, created_at FROM profiles WHERE email = $1")
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("profile", email.as_str()))
    }

    /// Drop expired sessions. Returns the number removed.
    pub async fn purge_expired_sessions(&self) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// `now + ttl`, refusing lifetimes that overflow the timestamp range.
fn session_expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, DbError> {
    now.checked_add_signed(ttl).ok_or(DbError::SessionLifetime)
}
