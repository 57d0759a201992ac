//! Case endpoints: submit, list own, view, administrative field update

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::repos::{Case, CaseRepo, CaseView};
use crate::http::error::ApiError;
use crate::http::extractors::{AdminSession, AuthSession, ValidUuid};
use crate::http::server::AppState;
use crate::live::{Change, ChangeKind, Table};
use crate::models::{CaseDescription, CaseFieldUpdate, CasePriority, CaseTitle};

/// Submit case request. Status and assignee are not accepted from clients.
///
/// `priority` may be omitted; it then falls back to `medium`, the value the
/// submission form preselects.
#[derive(Deserialize)]
pub struct CreateCaseRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Option<CasePriority>,
}

/// Single-field update request
#[derive(Deserialize)]
pub struct UpdateCaseRequest {
    pub field: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// GET /cases - the caller's own cases, newest first
async fn list_my_cases(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> Result<Json<Vec<Case>>, ApiError> {
    let cases = CaseRepo::new(&state.pool)
        .list_for_client(session.user_id())
        .await?;
    Ok(Json(cases))
}

/// POST /cases - submit a new case
async fn create_case(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Json(req): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<Case>), ApiError> {
    let title = CaseTitle::new(&req.title)?;
    let description = CaseDescription::new(&req.description)?;
    let priority = req.priority.unwrap_or_default();

    let case = CaseRepo::new(&state.pool)
        .create(session.user_id(), title, description, priority)
        .await?;

    tracing::info!(case_id = %case.id, user_id = %session.user_id(), "case submitted");
    state
        .live
        .publish(Change::new(Table::Cases, ChangeKind::Insert, case.id));

    Ok((StatusCode::CREATED, Json(case)))
}

/// GET /cases/{id}
async fn get_case(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    ValidUuid(case_id): ValidUuid,
) -> Result<Json<CaseView>, ApiError> {
    session.authorize_case(&state, case_id).await?;
    let case = CaseRepo::new(&state.pool).get(case_id).await?;
    Ok(Json(case))
}

/// PATCH /cases/{id} - admin sets status, priority or assignee
async fn update_case(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    ValidUuid(case_id): ValidUuid,
    Json(req): Json<UpdateCaseRequest>,
) -> Result<Json<Case>, ApiError> {
    let update = CaseFieldUpdate::parse(&req.field, &req.value)?;

    let case = CaseRepo::new(&state.pool)
        .update_field(case_id, update, state.policy)
        .await?;

    tracing::info!(
        case_id = %case_id,
        admin_id = %session.user_id(),
        field = update.column(),
        "case updated"
    );
    state
        .live
        .publish(Change::new(Table::Cases, ChangeKind::Update, case_id));

    Ok(Json(case))
}

/// Case routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cases", get(list_my_cases).post(create_case))
        .route("/cases/{id}", get(get_case).patch(update_case))
}
