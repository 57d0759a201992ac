//! Admin role management
//!
//! Roles are only ever granted out of band; the HTTP API has no endpoint
//! that changes them.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use caseportal_server::db::{AccountRepo, PgPool, RoleRepo};
use caseportal_server::models::{Email, ADMIN_ROLE};
use caseportal_server::PortalConfig;

#[derive(Parser, Debug)]
pub struct AdminArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: AdminCommands,
}

#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Give a user the admin role
    Grant {
        /// Email address or user id
        user: String,
    },
    /// Take the admin role away
    Revoke {
        /// Email address or user id
        user: String,
    },
    /// List current admins
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// How a user was named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
enum UserRef {
    Id(Uuid),
    Email(Email),
}

impl UserRef {
    fn parse(s: &str) -> Result<Self> {
        if let Ok(id) = Uuid::parse_str(s) {
            return Ok(Self::Id(id));
        }
        Email::new(s)
            .map(Self::Email)
            .map_err(|e| anyhow!("'{}' is neither a user id nor an email: {}", s, e))
    }

    async fn resolve(&self, pool: &PgPool) -> Result<Uuid> {
        match self {
            Self::Id(id) => Ok(*id),
            Self::Email(email) => {
                let profile = AccountRepo::new(pool)
                    .find_by_email(email)
                    .await
                    .with_context(|| format!("No account for {}", email.as_str()))?;
                Ok(profile.id)
            }
        }
    }
}

pub async fn run_admin(args: AdminArgs) -> Result<()> {
    let mut config = PortalConfig::load().context("Failed to load configuration")?;
    let pool = super::connect(&mut config, args.database_url).await?;
    let roles = RoleRepo::new(&pool);

    match args.command {
        AdminCommands::Grant { user } => {
            let user_id = UserRef::parse(&user)?.resolve(&pool).await?;
            if roles.grant(user_id, ADMIN_ROLE).await? {
                tracing::info!(%user_id, "admin role granted");
                println!("✅ {} is now an admin", user);
            } else {
                println!("{} is already an admin", user);
            }
        }
        AdminCommands::Revoke { user } => {
            let user_id = UserRef::parse(&user)?.resolve(&pool).await?;
            if roles.revoke(user_id, ADMIN_ROLE).await? {
                tracing::info!(%user_id, "admin role revoked");
                println!("✅ {} is no longer an admin", user);
            } else {
                println!("{} was not an admin", user);
            }
        }
        AdminCommands::List { json } => {
            let admins = roles.list_admins().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&admins)?);
            } else if admins.is_empty() {
                println!("No admins yet. Grant one with: caseportal admin grant <email>");
            } else {
                for admin in &admins {
                    println!("{}  {}", admin.id, admin.full_name);
                }
            }
        }
    }

    pool.close().await;
    Ok(())
}
