//! Comment and chat message bodies

use super::ValidationError;

/// Maximum length for comment and chat bodies
const MAX_BODY_LEN: usize = 10_000;

/// Validated comment body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBody(String);

impl CommentBody {
    /// Create a comment body.
    ///
    /// # Rules
    /// - Trimmed; empty after trimming is rejected
    /// - Max 10,000 characters
    ///
    /// # Example
    /// ```
    /// use caseportal_server::models::CommentBody;
    ///
    /// assert!(CommentBody::new("Wallet recovered").is_ok());
    /// assert!(CommentBody::new("  \n ").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "comment" });
        }
        check_len("comment", trimmed)?;
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated chat message content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatContent(String);

impl ChatContent {
    /// Create chat content.
    ///
    /// Whitespace-only input is not an error: it yields `Ok(None)` and the
    /// send is skipped.
    ///
    /// # Example
    /// ```
    /// use caseportal_server::models::ChatContent;
    ///
    /// assert!(ChatContent::new("hello").unwrap().is_some());
    /// assert!(ChatContent::new("   ").unwrap().is_none());
    /// ```
    pub fn new(s: &str) -> Result<Option<Self>, ValidationError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        check_len("message", trimmed)?;
        Ok(Some(Self(trimmed.to_owned())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_len(field: &'static str, s: &str) -> Result<(), ValidationError> {
    if s.chars().count() > MAX_BODY_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_BODY_LEN,
        });
    }
    Ok(())
}
