//! Attachment endpoints: batch upload, listing, signed download, delete
//!
//! Blob bytes and metadata rows are written separately. Upload writes the
//! blob first and removes it if the row insert fails; delete removes the
//! blob first. Either way a failure in the second step is logged with the
//! storage path so it can be reconciled.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::db::repos::{Attachment, AttachmentRepo, AttachmentView};
use crate::http::error::ApiError;
use crate::http::extractors::{AdminSession, AuthSession, ValidUuid};
use crate::http::server::AppState;
use crate::live::{Change, ChangeKind, Table};
use crate::models::{
    partition_batch, AttachmentUpload, CappedBuffer, FileRejection, IncomingFile,
    ValidationError, MAX_ATTACHMENT_BYTES,
};
use crate::storage::{SignedUrl, StorageError};

/// Upper bound on one multipart request, an abuse guard only. Oversized
/// files inside it are drained and rejected one by one against
/// [`MAX_ATTACHMENT_BYTES`]; going past this cap answers 413.
pub const MAX_UPLOAD_REQUEST_BYTES: usize = 256 * 1024 * 1024;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Per-file outcome of a batch upload
#[derive(Debug, Default, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<Attachment>,
    pub rejected: Vec<FileRejection>,
}

/// GET /cases/{id}/attachments - newest first, with uploader names
async fn list_attachments(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    ValidUuid(case_id): ValidUuid,
) -> Result<Json<Vec<AttachmentView>>, ApiError> {
    session.authorize_case(&state, case_id).await?;
    let attachments = AttachmentRepo::new(&state.pool).list_for_case(case_id).await?;
    Ok(Json(attachments))
}

/// POST /cases/{id}/attachments - multipart batch, one part per file
async fn upload_attachments(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    ValidUuid(case_id): ValidUuid,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadReport>), ApiError> {
    session.authorize_case(&state, case_id).await?;

    let mut files = Vec::new();
    let mut oversized = Vec::new();
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let mime_type = field.content_type().unwrap_or(FALLBACK_MIME).to_owned();

        // Stream the part so an oversized file is drained, not buffered
        let mut buf = CappedBuffer::new(MAX_ATTACHMENT_BYTES);
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            buf.push(&chunk);
        }
        match buf.finish() {
            Ok(bytes) => files.push(IncomingFile {
                file_name,
                mime_type,
                bytes,
            }),
            Err(size) => oversized.push(FileRejection::too_large(&file_name, size)),
        }
    }

    if files.is_empty() && oversized.is_empty() {
        return Err(ValidationError::Empty { field: "files" }.into());
    }

    // Every file is validated before anything is written
    let (accepted, mut rejected) = partition_batch(files);
    rejected.append(&mut oversized);

    let mut uploaded = Vec::with_capacity(accepted.len());
    for upload in accepted {
        match store_one(&state, case_id, session.user_id(), &upload).await {
            Ok(attachment) => uploaded.push(attachment),
            Err(rejection) => rejected.push(rejection),
        }
    }

    if !uploaded.is_empty() {
        state
            .live
            .publish(Change::new(Table::CaseAttachments, ChangeKind::Insert, case_id));
    }

    tracing::info!(
        %case_id,
        uploaded = uploaded.len(),
        rejected = rejected.len(),
        "attachment batch processed"
    );

    let status = if uploaded.is_empty() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(UploadReport { uploaded, rejected })))
}

async fn store_one(
    state: &AppState,
    case_id: Uuid,
    uploader_id: Uuid,
    upload: &AttachmentUpload,
) -> Result<Attachment, FileRejection> {
    let path = upload.storage_path(case_id, Utc::now());
    let reject = |reason: &str| FileRejection {
        file_name: upload.file_name().to_owned(),
        reason: reason.to_owned(),
    };

    if let Err(e) = state.blobs.upload(&path, upload.bytes().clone()).await {
        return Err(match e {
            StorageError::AlreadyExists(_) => reject("a file with this name was just uploaded"),
            other => {
                tracing::error!(%case_id, path = %path, error = %other, "blob write failed");
                reject("storage write failed")
            }
        });
    }

    match AttachmentRepo::new(&state.pool)
        .create(case_id, uploader_id, upload, &path)
        .await
    {
        Ok(attachment) => Ok(attachment),
        Err(e) => {
            tracing::error!(
                %case_id,
                path = %path,
                error = %e,
                "attachment record insert failed after blob write"
            );
            if let Err(cleanup) = state.blobs.remove(std::slice::from_ref(&path)).await {
                tracing::error!(path = %path, error = %cleanup, "orphaned blob left in storage");
            }
            Err(reject("could not record attachment"))
        }
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            message: e.body_text(),
        }
    } else {
        ApiError::BadRequest {
            message: e.body_text(),
        }
    }
}

/// GET /attachments/{id}/download - time-limited URL for the blob
async fn download_attachment(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    ValidUuid(attachment_id): ValidUuid,
) -> Result<Json<SignedUrl>, ApiError> {
    let attachment = AttachmentRepo::new(&state.pool).get(attachment_id).await?;
    session.authorize_case(&state, attachment.case_id).await?;

    let signed = state.signer.sign_download(&attachment.file_path)?;
    Ok(Json(signed))
}

/// DELETE /attachments/{id} - admin only
async fn delete_attachment(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    ValidUuid(attachment_id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    let repo = AttachmentRepo::new(&state.pool);
    let attachment = repo.get(attachment_id).await?;

    state
        .blobs
        .remove(std::slice::from_ref(&attachment.file_path))
        .await?;

    if let Err(e) = repo.delete(attachment_id).await {
        tracing::error!(
            %attachment_id,
            path = %attachment.file_path,
            error = %e,
            "attachment record outlived its blob, needs reconciliation"
        );
        return Err(e.into());
    }

    tracing::info!(
        %attachment_id,
        case_id = %attachment.case_id,
        admin_id = %session.user_id(),
        "attachment deleted"
    );
    state.live.publish(Change::new(
        Table::CaseAttachments,
        ChangeKind::Delete,
        attachment.case_id,
    ));

    Ok(StatusCode::NO_CONTENT)
}

/// Attachment routes
pub fn router() -> Router<Arc<AppState>> {
    let uploads = Router::new()
        .route(
            "/cases/{id}/attachments",
            get(list_attachments).post(upload_attachments),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_REQUEST_BYTES));

    Router::new()
        .merge(uploads)
        .route("/attachments/{id}/download", get(download_attachment))
        .route("/attachments/{id}", delete(delete_attachment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_limit_fits_a_full_size_file() {
        assert!(MAX_UPLOAD_REQUEST_BYTES as u64 > MAX_ATTACHMENT_BYTES);
    }

    #[test]
    fn report_serializes_both_lists() {
        let report = UploadReport {
            uploaded: vec![],
            rejected: vec![FileRejection {
                file_name: "big.zip".into(),
                reason: "big.zip exceeds the 10 MB limit".into(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["uploaded"], serde_json::json!([]));
        assert_eq!(json["rejected"][0]["file_name"], "big.zip");
    }
}
