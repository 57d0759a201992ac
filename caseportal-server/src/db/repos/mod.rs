//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Uses JOINs for display names (no N+1)
//! - Handles conflicts via ON CONFLICT or unique violations (no check-then-insert)
//! - Uses transactions for multi-step operations

pub mod accounts;
pub mod attachments;
pub mod cases;
pub mod comments;
pub mod messages;
pub mod roles;
pub mod stats;

pub use accounts::{AccountRepo, Profile, SessionToken};
pub use attachments::{Attachment, AttachmentRepo, AttachmentView};
pub use cases::{Case, CaseRepo, CaseView};
pub use comments::{Comment, CommentRepo, CommentView};
pub use messages::{ChatMessage, ChatMessageView, MessageRepo};
pub use roles::{AdminProfile, RoleRepo};
pub use stats::{AdminStats, StatusCounts, StatsRepo};

use crate::models::ValidationError;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("session lifetime out of range")]
    SessionLifetime,

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("corrupt {resource} row: {reason}")]
    Decode { resource: &'static str, reason: String },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DbError {
    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub(crate) fn decode(resource: &'static str, e: ValidationError) -> Self {
        Self::Decode {
            resource,
            reason: e.to_string(),
        }
    }
}

/// Postgres unique_violation
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Postgres foreign_key_violation
pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}
