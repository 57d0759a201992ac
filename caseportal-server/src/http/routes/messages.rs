//! Case chat endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repos::{ChatMessageView, MessageRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthSession, ValidUuid};
use crate::http::server::AppState;
use crate::live::{Change, ChangeKind, Table};
use crate::models::ChatContent;

/// Upper bound on ids in one mark-read request
const MAX_MARK_READ_IDS: usize = 500;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct MarkReadRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

#[derive(Serialize)]
pub struct UnreadResponse {
    pub case_id: Uuid,
    pub unread: i64,
}

/// GET /cases/{id}/messages - oldest first, with sender names
async fn list_messages(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    ValidUuid(case_id): ValidUuid,
) -> Result<Json<Vec<ChatMessageView>>, ApiError> {
    session.authorize_case(&state, case_id).await?;
    let messages = MessageRepo::new(&state.pool).list_for_case(case_id).await?;
    Ok(Json(messages))
}

/// POST /cases/{id}/messages
///
/// Blank content is accepted and ignored: 204, nothing stored.
async fn send_message(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    ValidUuid(case_id): ValidUuid,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    session.authorize_case(&state, case_id).await?;

    let Some(content) = ChatContent::new(&req.content)? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let message = MessageRepo::new(&state.pool)
        .create(case_id, session.user_id(), content)
        .await?;

    state
        .live
        .publish(Change::new(Table::CaseMessages, ChangeKind::Insert, case_id));

    Ok((StatusCode::CREATED, Json(message)).into_response())
}

/// GET /cases/{id}/messages/unread - unread messages from the other party
async fn unread_count(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    ValidUuid(case_id): ValidUuid,
) -> Result<Json<UnreadResponse>, ApiError> {
    session.authorize_case(&state, case_id).await?;
    let unread = MessageRepo::new(&state.pool)
        .unread_count(case_id, session.user_id())
        .await?;
    Ok(Json(UnreadResponse { case_id, unread }))
}

/// POST /messages/read - bulk mark read
///
/// Every case the ids belong to must be visible to the caller.
async fn mark_read(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    if req.ids.len() > MAX_MARK_READ_IDS {
        return Err(ApiError::BadRequest {
            message: format!("at most {} ids per request", MAX_MARK_READ_IDS),
        });
    }

    let repo = MessageRepo::new(&state.pool);
    let case_ids = repo.case_ids_for(&req.ids).await?;
    for case_id in &case_ids {
        session.authorize_case(&state, *case_id).await?;
    }

    let updated = repo.mark_read(&req.ids).await?;

    if updated > 0 {
        for case_id in case_ids {
            state
                .live
                .publish(Change::new(Table::CaseMessages, ChangeKind::Update, case_id));
        }
    }

    Ok(Json(MarkReadResponse { updated }))
}

/// Message routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cases/{id}/messages", get(list_messages).post(send_message))
        .route("/cases/{id}/messages/unread", get(unread_count))
        .route("/messages/read", post(mark_read))
}
