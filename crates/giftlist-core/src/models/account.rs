use serde::{Deserialize, Serialize};

/// Identity flags for an authenticated user.
///
/// Authentication happens outside the core; this record only carries what the
/// permission engine needs to know about the acting user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// System administrator
    #[serde(default)]
    pub is_admin: bool,
    /// Unix timestamp in milliseconds, set while the account is suspended
    #[serde(default)]
    pub suspended_at: Option<i64>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            is_admin: false,
            suspended_at: None,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::new(id)
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }

    /// An admin whose account is suspended has no privileges at all.
    pub fn is_active_admin(&self) -> bool {
        self.is_admin && !self.is_suspended()
    }
}
