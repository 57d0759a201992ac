//! Status transition policy
//!
//! The portal historically lets admins set any status directly. The
//! forward-only table is available as an opt-in until product decides which
//! behavior is intended.

use serde::{Deserialize, Serialize};

use super::{CaseStatus, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Any status may be set from any status.
    #[default]
    Permissive,
    /// Only moves to a later lifecycle state are accepted.
    ForwardOnly,
}

impl StatusPolicy {
    /// Check whether `from → to` is allowed.
    ///
    /// Setting the current status again is always accepted.
    pub fn check(&self, from: CaseStatus, to: CaseStatus) -> Result<(), ValidationError> {
        if from == to {
            return Ok(());
        }

        match self {
            Self::Permissive => Ok(()),
            Self::ForwardOnly if to.rank() > from.rank() => Ok(()),
            Self::ForwardOnly => Err(ValidationError::InvalidTransition {
                from: from.as_str(),
                to: to.as_str(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::ForwardOnly => "forward_only",
        }
    }
}

impl std::str::FromStr for StatusPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permissive" => Ok(Self::Permissive),
            "forward_only" | "forward-only" => Ok(Self::ForwardOnly),
            other => Err(ValidationError::InvalidVariant {
                field: "status_policy",
                value: other.to_owned(),
            }),
        }
    }
}
