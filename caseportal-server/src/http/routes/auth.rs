//! Identity endpoints: sign-up, sign-in, sign-out, current user

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::repos::{AccountRepo, Profile, SessionToken};
use crate::http::error::ApiError;
use crate::http::extractors::AuthSession;
use crate::http::server::AppState;
use crate::models::{Email, FullName, Password, RoleState};

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Current identity with its resolved roles
#[derive(Serialize)]
pub struct MeResponse {
    pub user: Profile,
    pub roles: RoleState,
}

/// POST /auth/signup
async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    let email = Email::new(&req.email)?;
    let password = Password::new(&req.password)?;
    let full_name = FullName::new(&req.full_name)?;

    let profile = AccountRepo::new(&state.pool)
        .sign_up(email, password, full_name)
        .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// POST /auth/signin
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SessionToken>, ApiError> {
    // A malformed address cannot belong to an account
    let email = Email::new(&req.email).map_err(|_| ApiError::Unauthorized {
        reason: "invalid email or password",
    })?;

    let session = AccountRepo::new(&state.pool)
        .sign_in(email, &req.password, state.session_ttl)
        .await?;

    Ok(Json(session))
}

/// POST /auth/signout
async fn sign_out(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> Result<StatusCode, ApiError> {
    AccountRepo::new(&state.pool).sign_out(session.token).await?;
    tracing::info!(user_id = %session.user_id(), "session closed");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me
async fn me(session: AuthSession) -> Json<MeResponse> {
    let roles = session.role_state();
    Json(MeResponse {
        user: session.user,
        roles,
    })
}

/// Auth routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/auth/me", get(me))
}
