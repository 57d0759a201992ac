//! Admin dashboard endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::repos::{AdminProfile, AdminStats, CaseRepo, CaseView, RoleRepo, StatsRepo};
use crate::http::error::ApiError;
use crate::http::extractors::AdminSession;
use crate::http::server::AppState;
use crate::models::CaseStatus;

#[derive(Deserialize)]
pub struct ListCasesQuery {
    pub status: Option<String>,
}

/// GET /admin/cases?status= - every case with client and assignee names
async fn list_all_cases(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    Query(query): Query<ListCasesQuery>,
) -> Result<Json<Vec<CaseView>>, ApiError> {
    let status = match query.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(s) => Some(s.parse::<CaseStatus>()?),
    };

    let cases = CaseRepo::new(&state.pool).list_all(status).await?;
    Ok(Json(cases))
}

/// GET /admin/stats
async fn stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
) -> Result<Json<AdminStats>, ApiError> {
    let stats = StatsRepo::new(&state.pool).summary().await?;
    Ok(Json(stats))
}

/// GET /admin/admins - candidates for case assignment
async fn list_admins(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
) -> Result<Json<Vec<AdminProfile>>, ApiError> {
    let admins = RoleRepo::new(&state.pool).list_admins().await?;
    Ok(Json(admins))
}

/// Admin routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/cases", get(list_all_cases))
        .route("/admin/stats", get(stats))
        .route("/admin/admins", get(list_admins))
}
