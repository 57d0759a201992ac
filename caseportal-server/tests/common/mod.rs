//! Shared harness for database-backed integration tests
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p caseportal-server -- --ignored

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

use caseportal_server::db::repos::RoleRepo;
use caseportal_server::db::{create_pool, migrations};
use caseportal_server::models::{StatusPolicy, ADMIN_ROLE};
use caseportal_server::storage::{LocalBlobStore, UrlSigner};
use caseportal_server::{build_router, AppState, ServerConfig};

pub const PUBLIC_ORIGIN: &str = "http://localhost:3030";
const SIGNING_KEY: &[u8] = b"integration-signing-key-0123456789";
const PASSWORD: &str = "correct horse battery";

static MIGRATED: Lazy<OnceCell<()>> = Lazy::new(OnceCell::new);

pub struct Harness {
    pub app: Router,
    pub state: AppState,
    pub blob_root: PathBuf,
    _blobs: TempDir,
}

pub struct User {
    pub id: Uuid,
    pub token: Uuid,
    pub full_name: String,
}

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL required")
}

pub async fn harness() -> Harness {
    harness_with_policy(StatusPolicy::Permissive).await
}

pub async fn harness_with_policy(policy: StatusPolicy) -> Harness {
    MIGRATED
        .get_or_init(|| async {
            let pool = create_pool(&database_url()).await.expect("pool creation failed");
            migrations::run(&pool).await.expect("migrations failed");
            pool.close().await;
        })
        .await;

    let pool = create_pool(&database_url()).await.expect("pool creation failed");
    let blobs = tempfile::tempdir().expect("tempdir");
    let blob_root = blobs.path().to_path_buf();

    let mut state = AppState::new(
        pool,
        Arc::new(LocalBlobStore::new(&blob_root)),
        UrlSigner::new(SIGNING_KEY.to_vec(), PUBLIC_ORIGIN),
    );
    state.policy = policy;

    let app = build_router(state.clone(), &ServerConfig::default());

    Harness {
        app,
        state,
        blob_root,
        _blobs: blobs,
    }
}

impl Harness {
    /// Send a request and decode the JSON body (`Null` when empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(json) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let (status, bytes) = self.raw(req).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn raw(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    pub async fn client(&self, name: &str) -> User {
        let email = format!("{}-{}@example.com", name, Uuid::new_v4().simple());
        let full_name = format!("{} Tester", name);

        let (status, profile) = self
            .send(
                Method::POST,
                "/auth/signup",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": PASSWORD,
                    "full_name": full_name,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", profile);

        let (status, session) = self
            .send(
                Method::POST,
                "/auth/signin",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "signin failed: {}", session);

        User {
            id: profile["id"].as_str().unwrap().parse().unwrap(),
            token: session["token"].as_str().unwrap().parse().unwrap(),
            full_name,
        }
    }

    pub async fn admin(&self, name: &str) -> User {
        let user = self.client(name).await;
        RoleRepo::new(&self.state.pool)
            .grant(user.id, ADMIN_ROLE)
            .await
            .expect("grant admin");
        user
    }

    /// Submit a case as `owner` and return its id.
    pub async fn submit_case(&self, owner: &User, title: &str) -> Uuid {
        let (status, case) = self
            .send(
                Method::POST,
                "/cases",
                Some(owner.token),
                Some(serde_json::json!({
                    "title": title,
                    "description": "Details for the support team",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", case);
        case["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn upload(
        &self,
        token: Uuid,
        case_id: Uuid,
        files: &[(&str, &str, Vec<u8>)],
    ) -> (StatusCode, Value) {
        let (content_type, body) = multipart_body(files);
        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("/cases/{}/attachments", case_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();

        let (status, bytes) = self.raw(req).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Count files under the blob root.
    pub fn blob_count(&self) -> usize {
        fn walk(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|e| {
                            let path = e.path();
                            if path.is_dir() {
                                walk(&path)
                            } else {
                                1
                            }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        walk(&self.blob_root)
    }
}

/// Build a `multipart/form-data` body with one `files` part per entry.
pub fn multipart_body(files: &[(&str, &str, Vec<u8>)]) -> (String, Vec<u8>) {
    let boundary = format!("caseportal-{}", Uuid::new_v4().simple());
    let mut body = Vec::new();

    for (name, mime, bytes) in files {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}
