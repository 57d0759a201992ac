//! Router behavior that needs no database
//!
//! The pool connects lazily and is never touched: every request here is
//! answered before a query would run.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use caseportal_server::storage::{LocalBlobStore, UrlSigner};
use caseportal_server::{build_router, AppState, ServerConfig};

fn app(blob_root: &std::path::Path) -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://caseportal@localhost/unused")
        .unwrap();
    let state = AppState::new(
        pool,
        Arc::new(LocalBlobStore::new(blob_root)),
        UrlSigner::new(b"router-test-key".to_vec(), "http://localhost:3030"),
    );
    build_router(state, &ServerConfig::default())
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn case_routes_require_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let case_id = Uuid::new_v4();

    for (method, uri) in [
        ("GET", "/cases".to_string()),
        ("POST", "/cases".to_string()),
        ("GET", format!("/cases/{}", case_id)),
        ("PATCH", format!("/cases/{}", case_id)),
        ("GET", format!("/cases/{}/comments", case_id)),
        ("GET", format!("/cases/{}/attachments", case_id)),
        ("GET", format!("/cases/{}/messages", case_id)),
        ("GET", "/admin/cases".to_string()),
        ("GET", "/auth/me".to_string()),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(&uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{} {} should need a session",
            method,
            uri
        );
        assert_eq!(json_body(response).await["error"], "unauthorized");
    }
}

#[tokio::test]
async fn malformed_bearer_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::get("/cases")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "invalid session token");
}

#[tokio::test]
async fn storage_rejects_bad_and_expired_signatures() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let expires = (Utc::now() + Duration::hours(1)).timestamp();
    let response = app
        .clone()
        .oneshot(
            Request::get(format!(
                "/storage/case/1-a.pdf?expires={}&signature={}",
                expires,
                "00".repeat(32)
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let signer = UrlSigner::new(b"router-test-key".to_vec(), "http://localhost:3030");
    let stale = signer
        .sign("case/1-a.pdf", Duration::hours(1), Utc::now() - Duration::hours(3))
        .unwrap();
    let path = stale.url.strip_prefix("http://localhost:3030").unwrap();
    let response = app
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["message"], "download link has expired");
}
