//! Schema migration command

use anyhow::{Context, Result};
use clap::Parser;

use caseportal_server::db::migrations;
use caseportal_server::PortalConfig;

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let mut config = PortalConfig::load().context("Failed to load configuration")?;
    let pool = super::connect(&mut config, args.database_url).await?;

    migrations::run(&pool)
        .await
        .context("Failed to apply migrations")?;

    pool.close().await;
    println!("✅ Schema is up to date");
    Ok(())
}
