//! Signed blob downloads
//!
//! No session is needed here: the signature in the query string is the
//! credential, and it was only issued to a caller allowed to see the case.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::db::repos::AttachmentRepo;
use crate::http::error::ApiError;
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// GET /storage/{*path}?expires=&signature=
async fn fetch_blob(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, ApiError> {
    state
        .signer
        .verify(&path, query.expires, &query.signature, Utc::now())?;

    let attachment = AttachmentRepo::new(&state.pool).get_by_path(&path).await?;
    let bytes = state.blobs.read(&path).await?;

    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&attachment.file_name)
    );

    Ok((
        [
            (header::CONTENT_TYPE, attachment.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Storage routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/storage/{*path}", get(fetch_blob))
}
