//! Validation error types

use std::fmt;

/// Validation error for domain models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty (or whitespace only) when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., email)
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Uploaded file exceeds the byte limit
    TooLarge { file_name: String, size: u64, max: u64 },

    /// Uploaded file has a MIME type outside the allow-list
    UnsupportedType { file_name: String, mime_type: String },

    /// Status change rejected by the active status policy
    InvalidTransition { from: &'static str, to: &'static str },

    /// Assignee does not hold the admin role
    NotAssignable { user_id: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::TooLarge { file_name, max, .. } => {
                write!(f, "{} exceeds the {} MB limit", file_name, max / 1_048_576)
            }
            Self::UnsupportedType { file_name, mime_type } => {
                write!(f, "{} is not an allowed file type ({})", file_name, mime_type)
            }
            Self::InvalidTransition { from, to } => {
                write!(f, "status cannot move from {} to {}", from, to)
            }
            Self::NotAssignable { user_id } => {
                write!(f, "user {} is not an admin and cannot be assigned", user_id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}
