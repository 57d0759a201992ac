//! Role labels and resolved role sets

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Label carried by administrative identities
pub const ADMIN_ROLE: &str = "admin";

/// Label granted to every account at sign-up
pub const CLIENT_ROLE: &str = "client";

/// Role labels held by one identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Role resolution state as seen by a consumer.
///
/// `Pending` and `Resolved` with no admin role both deny admin access, but only
/// `Resolved` is final; callers that render privileged views should wait for
/// [`RoleState::is_settled`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "roles", rename_all = "snake_case")]
pub enum RoleState {
    Pending,
    Resolved(RoleSet),
}

impl RoleState {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn is_admin(&self) -> bool {
        match self {
            Self::Pending => false,
            Self::Resolved(roles) => roles.is_admin(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        match self {
            Self::Pending => false,
            Self::Resolved(roles) => roles.has_role(role),
        }
    }

    /// `Some(true|false)` once resolved, `None` while pending.
    pub fn admin_decision(&self) -> Option<bool> {
        match self {
            Self::Pending => None,
            Self::Resolved(roles) => Some(roles.is_admin()),
        }
    }
}

impl Default for RoleState {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_detection() {
        assert!(RoleSet::new(["client", "admin"]).is_admin());
        assert!(!RoleSet::new(["client"]).is_admin());
        assert!(RoleSet::new(["support"]).has_role("support"));
    }

    #[test]
    fn pending_is_distinct_from_non_admin() {
        let pending = RoleState::Pending;
        let client = RoleState::Resolved(RoleSet::new(["client"]));

        assert!(!pending.is_admin());
        assert!(!client.is_admin());
        assert_eq!(pending.admin_decision(), None);
        assert_eq!(client.admin_decision(), Some(false));
        assert!(!pending.is_settled());
        assert!(client.is_settled());
    }

    #[test]
    fn serializes_as_tagged_state() {
        let state = RoleState::Resolved(RoleSet::new(["admin"]));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({"state": "resolved", "roles": ["admin"]}));

        let json = serde_json::to_value(RoleState::Pending).unwrap();
        assert_eq!(json, serde_json::json!({"state": "pending"}));
    }
}
