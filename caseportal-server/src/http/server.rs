//! Axum server setup
//!
//! Server skeleton with:
//! - Localhost-only CORS by default
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C
//! - Hourly purge of expired sessions

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::http::HeaderValue;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::db::repos::AccountRepo;
use crate::live::LiveHub;
use crate::models::StatusPolicy;
use crate::storage::{BlobStore, UrlSigner};

/// Default session lifetime: 7 days
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 168;

const SESSION_PURGE_INTERVAL: StdDuration = StdDuration::from_secs(3600);

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:3030)
    pub bind_addr: SocketAddr,

    /// Allow permissive CORS (default: false = localhost only)
    ///
    /// WARNING: Setting this to true allows any origin.
    pub cors_permissive: bool,

    /// Public origin of the portal front end, added to the CORS allow-list
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            cors_permissive: false,
            public_url: None,
        }
    }
}

impl ServerConfig {
    fn allowed_origins(&self) -> Vec<HeaderValue> {
        let port = self.bind_addr.port();
        let mut origins = vec![
            "http://localhost:3000".to_string(),
            "http://127.0.0.1:3000".to_string(),
            format!("http://localhost:{}", port),
            format!("http://127.0.0.1:{}", port),
        ];
        if let Some(url) = &self.public_url {
            origins.push(url.trim_end_matches('/').to_string());
        }
        origins.sort();
        origins.dedup();

        origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Attachment bytes
    pub blobs: Arc<dyn BlobStore>,
    /// Issues and checks download URLs
    pub signer: UrlSigner,
    pub live: LiveHub,
    pub policy: StatusPolicy,
    pub session_ttl: chrono::Duration,
}

impl AppState {
    /// State with default policy, live capacity and session lifetime.
    pub fn new(pool: PgPool, blobs: Arc<dyn BlobStore>, signer: UrlSigner) -> Self {
        Self {
            pool,
            blobs,
            signer,
            live: LiveHub::default(),
            policy: StatusPolicy::default(),
            session_ttl: chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
        }
    }
}

/// Assemble every route with CORS and tracing layers.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(config.allowed_origins())
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::cases::router())
        .merge(routes::admin::router())
        .merge(routes::comments::router())
        .merge(routes::attachments::router())
        .merge(routes::messages::router())
        .merge(routes::storage::router())
        .merge(routes::live::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Run the HTTP server.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool(&database_url).await?;
/// let state = AppState::new(pool, Arc::new(LocalBlobStore::new(root)), signer);
/// run_server(state, ServerConfig::default()).await?;
/// ```
pub async fn run_server(state: AppState, config: ServerConfig) -> Result<(), ServerError> {
    tracing::info!(
        policy = state.policy.as_str(),
        session_ttl_hours = state.session_ttl.num_hours(),
        "case portal state ready"
    );

    let purge = tokio::spawn(purge_sessions(state.pool.clone()));
    let app = build_router(state, &config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn purge_sessions(pool: PgPool) {
    let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        match AccountRepo::new(&pool).purge_expired_sessions().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "expired sessions purged"),
            Err(e) => tracing::warn!(error = %e, "session purge failed"),
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
