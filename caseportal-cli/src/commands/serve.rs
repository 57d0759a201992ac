//! HTTP server command
//!
//! Loads the portal config, lets flags override it, applies migrations and
//! runs the server until ctrl-c.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use caseportal_server::db::migrations;
use caseportal_server::models::StatusPolicy;
use caseportal_server::storage::{LocalBlobStore, UrlSigner};
use caseportal_server::{run_server, AppState, LiveHub, PortalConfig, ServerConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default from config: 127.0.0.1:3030)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Public origin used in signed download links and the CORS allow-list
    #[arg(long)]
    pub public_url: Option<String>,

    /// Case status transition policy
    #[arg(long, value_parser = parse_policy)]
    pub policy: Option<StatusPolicy>,

    /// Skip applying migrations on startup
    #[arg(long)]
    pub no_migrate: bool,
}

fn parse_policy(s: &str) -> Result<StatusPolicy, String> {
    s.parse().map_err(|e| format!("{}", e))
}

impl ServeArgs {
    /// Flags win over file and environment.
    fn apply(&self, config: &mut PortalConfig) {
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if self.cors_permissive {
            config.server.cors_permissive = true;
        }
        if let Some(url) = &self.public_url {
            config.server.public_url = Some(url.clone());
        }
        if let Some(policy) = self.policy {
            config.cases.status_policy = policy;
        }
    }
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = PortalConfig::load().context("Failed to load configuration")?;
    args.apply(&mut config);

    let signing_key = config
        .signing_key()
        .context("Download links need a signing key")?
        .to_vec();
    let session_ttl = config.session_ttl()?;

    let pool = super::connect(&mut config, args.database_url.clone()).await?;

    if !args.no_migrate {
        migrations::run(&pool)
            .await
            .context("Failed to apply migrations")?;
    }

    let storage_root = config.storage_root();
    tokio::fs::create_dir_all(&storage_root)
        .await
        .with_context(|| format!("Failed to create {}", storage_root.display()))?;

    tracing::info!(
        bind = %config.server.bind,
        storage = %storage_root.display(),
        "starting caseportal server"
    );

    let mut state = AppState::new(
        pool,
        Arc::new(LocalBlobStore::new(storage_root)),
        UrlSigner::new(signing_key, config.server.public_origin()),
    );
    state.policy = config.cases.status_policy;
    state.live = LiveHub::new(config.live.capacity);
    state.session_ttl = session_ttl;

    let server_config = ServerConfig {
        bind_addr: config.server.bind,
        cors_permissive: config.server.cors_permissive,
        public_url: config.server.public_url.clone(),
    };

    run_server(state, server_config)
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        serve: ServeArgs,
    }

    fn parse(args: &[&str]) -> ServeArgs {
        let argv = std::iter::once("serve").chain(args.iter().copied());
        Harness::try_parse_from(argv).unwrap().serve
    }

    #[test]
    fn flags_override_config() {
        let mut config = PortalConfig::default();
        parse(&[
            "--bind",
            "0.0.0.0:8080",
            "--public-url",
            "https://portal.example.com",
            "--policy",
            "forward_only",
            "--cors-permissive",
        ])
        .apply(&mut config);

        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(
            config.server.public_origin(),
            "https://portal.example.com"
        );
        assert_eq!(config.cases.status_policy, StatusPolicy::ForwardOnly);
        assert!(config.server.cors_permissive);
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut config = PortalConfig::default();
        config.server.public_url = Some("https://from-file.example.com".into());
        config.cases.status_policy = StatusPolicy::ForwardOnly;

        parse(&[]).apply(&mut config);

        assert_eq!(config.server.bind.port(), 3030);
        assert_eq!(
            config.server.public_url.as_deref(),
            Some("https://from-file.example.com")
        );
        assert_eq!(config.cases.status_policy, StatusPolicy::ForwardOnly);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let argv = ["serve", "--policy", "sideways"];
        assert!(Harness::try_parse_from(argv).is_err());
    }
}
