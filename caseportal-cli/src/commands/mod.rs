//! Command implementations for the caseportal CLI

pub mod admin;
pub mod migrate;
pub mod serve;

pub use admin::run_admin;
pub use migrate::run_migrate;
pub use serve::run_serve;

use anyhow::{Context, Result};
use caseportal_server::db::{create_pool_with_options, PgPool};
use caseportal_server::PortalConfig;

/// Resolve the database URL (flag, then env/config) and open a pool.
pub(crate) async fn connect(
    config: &mut PortalConfig,
    database_url: Option<String>,
) -> Result<PgPool> {
    if let Some(url) = database_url {
        config.database.url = Some(url);
    }
    let url = config
        .database_url()
        .context("Set it via --database-url, DATABASE_URL or ~/.caseportal/.env")?;

    create_pool_with_options(url, config.database.max_connections)
        .await
        .context("Failed to create database pool")
}
