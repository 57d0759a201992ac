//! Case fields: status, priority, title, description, single-field updates

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

/// Maximum length for case titles
const MAX_TITLE_LEN: usize = 200;

/// Maximum length for case descriptions
const MAX_DESCRIPTION_LEN: usize = 10_000;

/// Case status
///
/// Lifecycle order is pending → in_progress → resolved → closed. Whether an
/// update may skip or revert states is decided by [`super::StatusPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pending,
    InProgress,
    Resolved,
    Closed,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Resolved,
        Self::Closed,
    ];

    /// Get string representation (matches the DB column value).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Position in the lifecycle, starting at 0 for pending.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Resolved => 2,
            Self::Closed => 3,
        }
    }
}

impl Default for CaseStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl FromStr for CaseStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            other => Err(ValidationError::InvalidVariant {
                field: "status",
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl CasePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl Default for CasePriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl FromStr for CasePriority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(ValidationError::InvalidVariant {
                field: "priority",
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for CasePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated case title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseTitle(String);

impl CaseTitle {
    /// Create a new case title.
    ///
    /// # Rules
    /// - Non-empty (after trimming whitespace)
    /// - Max 200 characters
    ///
    /// # Example
    /// ```
    /// use caseportal_server::models::CaseTitle;
    ///
    /// assert!(CaseTitle::new("Lost wallet").is_ok());
    /// assert!(CaseTitle::new("   ").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "title" });
        }

        if trimmed.chars().count() > MAX_TITLE_LEN {
            return Err(ValidationError::TooLong {
                field: "title",
                max: MAX_TITLE_LEN,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated case description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDescription(String);

impl CaseDescription {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Empty {
                field: "description",
            });
        }

        if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::TooLong {
                field: "description",
                max: MAX_DESCRIPTION_LEN,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single-field administrative update to a case.
///
/// Updates never touch more than one column; the client reference is not
/// updatable at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFieldUpdate {
    Status(CaseStatus),
    Priority(CasePriority),
    AssignedTo(Option<Uuid>),
}

impl CaseFieldUpdate {
    /// Parse a `{field, value}` pair as sent by the portal.
    ///
    /// `assigned_to` accepts `null` (or the string `"unassigned"`) to clear the
    /// assignment.
    pub fn parse(field: &str, value: &serde_json::Value) -> Result<Self, ValidationError> {
        match field {
            "status" => Ok(Self::Status(expect_str("status", value)?.parse()?)),
            "priority" => Ok(Self::Priority(expect_str("priority", value)?.parse()?)),
            "assigned_to" => match value {
                serde_json::Value::Null => Ok(Self::AssignedTo(None)),
                serde_json::Value::String(s) if s == "unassigned" => Ok(Self::AssignedTo(None)),
                serde_json::Value::String(s) => Uuid::parse_str(s)
                    .map(|id| Self::AssignedTo(Some(id)))
                    .map_err(|_| ValidationError::InvalidFormat {
                        field: "assigned_to",
                        reason: "invalid UUID format",
                    }),
                other => Err(ValidationError::InvalidVariant {
                    field: "assigned_to",
                    value: other.to_string(),
                }),
            },
            other => Err(ValidationError::InvalidVariant {
                field: "field",
                value: other.to_owned(),
            }),
        }
    }

    /// Column name this update writes.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Priority(_) => "priority",
            Self::AssignedTo(_) => "assigned_to",
        }
    }
}

fn expect_str<'a>(
    field: &'static str,
    value: &'a serde_json::Value,
) -> Result<&'a str, ValidationError> {
    value.as_str().ok_or_else(|| ValidationError::InvalidVariant {
        field,
        value: value.to_string(),
    })
}
