//! Portal configuration
//!
//! Resolution order, lowest to highest: built-in defaults, the TOML file at
//! `~/.caseportal/config.toml`, environment variables, then whatever the caller
//! (usually CLI flags) sets on the loaded value.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::pool::DEFAULT_MAX_CONNECTIONS;
use crate::http::server::DEFAULT_SESSION_TTL_HOURS;
use crate::live::DEFAULT_CAPACITY;
use crate::models::StatusPolicy;

/// Config error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0} is not set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub storage: StorageSection,
    pub cases: CasesSection,
    pub live: LiveSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: SocketAddr,
    pub cors_permissive: bool,
    /// Public origin used in signed download URLs
    pub public_url: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3030)),
            cors_permissive: false,
            public_url: None,
        }
    }
}

impl ServerSection {
    /// Origin to embed in signed URLs; falls back to the bind address.
    pub fn public_origin(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.bind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Blob directory; defaults to `~/.caseportal/attachments`
    pub root: Option<PathBuf>,
    /// HMAC key for download URLs. Must be set to serve.
    pub signing_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasesSection {
    pub status_policy: StatusPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSection {
    pub capacity: usize,
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub session_ttl_hours: i64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }
}

/// Minimum signing key length in bytes
const MIN_SIGNING_KEY_LEN: usize = 32;

/// Longest session lifetime accepted: one year
pub const MAX_SESSION_TTL_HOURS: i64 = 8760;

impl PortalConfig {
    /// Caseportal home: `~/.caseportal`
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".caseportal")
    }

    /// Config file path: `~/.caseportal/config.toml`
    pub fn config_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Load from the default path (if present) and apply the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&Self::config_path())?;
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Read a TOML file. A missing file yields the defaults.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from environment variables, read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(root) = lookup("CASEPORTAL_STORAGE_ROOT") {
            self.storage.root = Some(PathBuf::from(root));
        }
        if let Some(key) = lookup("CASEPORTAL_SIGNING_KEY") {
            self.storage.signing_key = Some(key);
        }
        if let Some(url) = lookup("CASEPORTAL_PUBLIC_URL") {
            self.server.public_url = Some(url);
        }
        if let Some(policy) = lookup("CASEPORTAL_STATUS_POLICY") {
            self.cases.status_policy = policy.parse().map_err(|e| ConfigError::Invalid {
                key: "CASEPORTAL_STATUS_POLICY",
                reason: format!("{}", e),
            })?;
        }
        Ok(())
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }

    pub fn storage_root(&self) -> PathBuf {
        self.storage
            .root
            .clone()
            .unwrap_or_else(|| Self::home_dir().join("attachments"))
    }

    pub fn signing_key(&self) -> Result<&[u8], ConfigError> {
        let key = self
            .storage
            .signing_key
            .as_deref()
            .ok_or(ConfigError::Missing("CASEPORTAL_SIGNING_KEY"))?;

        if key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::Invalid {
                key: "storage.signing_key",
                reason: format!("must be at least {} bytes", MIN_SIGNING_KEY_LEN),
            });
        }
        Ok(key.as_bytes())
    }

    pub fn session_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        let hours = self.auth.session_ttl_hours;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
            return Err(ConfigError::Invalid {
                key: "auth.session_ttl_hours",
                reason: format!("must be between 1 and {}", MAX_SESSION_TTL_HOURS),
            });
        }
        chrono::TimeDelta::try_hours(hours).ok_or(ConfigError::Invalid {
            key: "auth.session_ttl_hours",
            reason: "out of range".into(),
        })
    }
}
