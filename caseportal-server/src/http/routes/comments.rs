//! Case comment endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::repos::{Comment, CommentRepo, CommentView};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthSession, ValidUuid};
use crate::http::server::AppState;
use crate::live::{Change, ChangeKind, Table};
use crate::models::CommentBody;

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

/// GET /cases/{id}/comments - oldest first, with author names
async fn list_comments(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    ValidUuid(case_id): ValidUuid,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    session.authorize_case(&state, case_id).await?;
    let comments = CommentRepo::new(&state.pool).list_for_case(case_id).await?;
    Ok(Json(comments))
}

/// POST /cases/{id}/comments
async fn add_comment(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    ValidUuid(case_id): ValidUuid,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let body = CommentBody::new(&req.content)?;
    session.authorize_case(&state, case_id).await?;

    let comment = CommentRepo::new(&state.pool)
        .create(case_id, session.user_id(), body)
        .await?;

    state
        .live
        .publish(Change::new(Table::CaseComments, ChangeKind::Insert, case_id));

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Comment routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/cases/{id}/comments", get(list_comments).post(add_comment))
}
