//! Custom Axum extractors
//!
//! Authentication runs before any handler body: a request without a live
//! session is rejected with 401 and never reaches a case query.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use super::error::ApiError;
use super::server::AppState;
use crate::db::repos::{AccountRepo, CaseRepo, Profile, RoleRepo};
use crate::models::{RoleSet, RoleState, ValidationError};

/// Authenticated caller with resolved roles
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: Uuid,
    pub user: Profile,
    pub roles: RoleSet,
}

impl AuthSession {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.roles.is_admin()
    }

    pub fn role_state(&self) -> RoleState {
        RoleState::Resolved(self.roles.clone())
    }

    /// Allow admins and the owning client through.
    ///
    /// A client asking for someone else's case sees the same 404 as for a
    /// case that does not exist.
    pub async fn authorize_case(&self, state: &AppState, case_id: Uuid) -> Result<(), ApiError> {
        let owner = CaseRepo::new(&state.pool).client_of(case_id).await?;
        if self.is_admin() || owner == self.user.id {
            Ok(())
        } else {
            tracing::debug!(%case_id, user_id = %self.user.id, "case hidden from non-owner");
            Err(ApiError::not_found("case", case_id))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("admin role required"))
        }
    }
}

/// Session token from `Authorization: Bearer`, or `access_token` in the
/// query string for WebSocket clients that cannot set headers.
fn session_token(parts: &Parts) -> Result<Uuid, ApiError> {
    let raw = match parts.headers.get(AUTHORIZATION) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .map(str::to_owned)
            .ok_or(ApiError::Unauthorized {
                reason: "malformed authorization header",
            })?,
        None => parts
            .uri
            .query()
            .and_then(|q| {
                q.split('&')
                    .find_map(|kv| kv.strip_prefix("access_token="))
                    .map(|v| urlencoding::decode(v).map(|s| s.into_owned()).unwrap_or_default())
            })
            .ok_or(ApiError::Unauthorized {
                reason: "missing bearer token",
            })?,
    };

    Uuid::parse_str(&raw).map_err(|_| ApiError::Unauthorized {
        reason: "invalid session token",
    })
}

impl FromRequestParts<Arc<AppState>> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts)?;

        let user = AccountRepo::new(&state.pool)
            .current_user(token)
            .await?
            .ok_or(ApiError::Unauthorized {
                reason: "session expired or signed out",
            })?;

        let roles = RoleRepo::new(&state.pool).resolve(user.id).await;

        Ok(Self { token, user, roles })
    }
}

/// Authenticated caller holding the admin role
#[derive(Debug, Clone)]
pub struct AdminSession(pub AuthSession);

impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = AuthSession::from_request_parts(parts, state).await?;
        session.require_admin()?;
        Ok(Self(session))
    }
}

/// Extract and validate a UUID from path
pub struct ValidUuid(pub Uuid);

impl<S> FromRequestParts<S> for ValidUuid
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "id" }))?;

        let uuid = Uuid::parse_str(&id).map_err(|_| {
            ApiError::Validation(ValidationError::InvalidFormat {
                field: "id",
                reason: "invalid UUID format",
            })
        })?;

        Ok(Self(uuid))
    }
}
