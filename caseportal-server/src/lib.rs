//! caseportal-server: client support case portal backend
//!
//! Clients submit cases, attach files and chat with support staff; admins
//! triage, assign and move cases through their lifecycle. Everything is
//! served over HTTP with live change feeds on WebSockets.
//!
//! Layers, bottom up:
//! - [`models`]: validated domain values
//! - [`db`]: Postgres pool, schema and repositories
//! - [`storage`]: attachment blobs and signed download URLs
//! - [`live`]: in-process change fan-out
//! - [`http`]: axum routes, auth extractors and server runner

pub mod config;
pub mod db;
pub mod http;
pub mod live;
pub mod models;
pub mod storage;

pub use config::{ConfigError, PortalConfig};
pub use http::{build_router, run_server, AppState, ServerConfig};
pub use live::LiveHub;
