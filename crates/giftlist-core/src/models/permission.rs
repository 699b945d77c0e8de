//! Authorization vocabulary: actions, resources, credentials and decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Something an actor wants to do to a resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Edit,
    Delete,
    Admin,
    Share,
    Invite,
    Reserve,
}

/// A uniquely identified entity subject to an authorization decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Resource {
    List(String),
    Wish(String),
    Group(String),
    Reservation(String),
}

impl Resource {
    pub fn list(id: impl Into<String>) -> Self {
        Resource::List(id.into())
    }

    pub fn wish(id: impl Into<String>) -> Self {
        Resource::Wish(id.into())
    }

    pub fn group(id: impl Into<String>) -> Self {
        Resource::Group(id.into())
    }

    pub fn reservation(id: impl Into<String>) -> Self {
        Resource::Reservation(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            Resource::List(id)
            | Resource::Wish(id)
            | Resource::Group(id)
            | Resource::Reservation(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Resource::List(_) => "list",
            Resource::Wish(_) => "wish",
            Resource::Group(_) => "group",
            Resource::Reservation(_) => "reservation",
        }
    }
}

/// Secret presented by a caller who reached a password-protected list.
#[derive(Clone, Deserialize)]
pub struct Credential {
    password: String,
}

impl Credential {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub fn expose(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Why access was denied.
///
/// `NotFound` is deliberately used for every case where the caller must not
/// learn whether the resource exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DenialReason {
    #[serde(rename = "not found")]
    NotFound,
    #[serde(rename = "password required")]
    PasswordRequired,
    #[serde(rename = "only owners may delete")]
    OnlyOwnerMayDelete,
    #[serde(rename = "only owners may manage co-managers")]
    OnlyOwnerMayManageCoManagers,
    #[serde(rename = "only owners may invite")]
    OnlyOwnerMayInvite,
    #[serde(rename = "authentication required")]
    AuthenticationRequired,
    #[serde(rename = "account suspended")]
    AccountSuspended,
    #[serde(rename = "only the reserver may cancel")]
    OnlyReserverMayCancel,
    #[serde(rename = "insufficient permissions")]
    InsufficientPermissions,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::NotFound => "not found",
            DenialReason::PasswordRequired => "password required",
            DenialReason::OnlyOwnerMayDelete => "only owners may delete",
            DenialReason::OnlyOwnerMayManageCoManagers => "only owners may manage co-managers",
            DenialReason::OnlyOwnerMayInvite => "only owners may invite",
            DenialReason::AuthenticationRequired => "authentication required",
            DenialReason::AccountSuspended => "account suspended",
            DenialReason::OnlyReserverMayCancel => "only the reserver may cancel",
            DenialReason::InsufficientPermissions => "insufficient permissions",
        }
    }

    /// Whether this denial must be reported as "does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, DenialReason::NotFound)
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a permission check. Never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionResult {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
}

impl PermissionResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }

    pub fn not_found() -> Self {
        Self::deny(DenialReason::NotFound)
    }

    /// The denial reason, treating a reason-less denial as `NotFound`.
    pub fn denial_reason(&self) -> Option<DenialReason> {
        if self.allowed {
            None
        } else {
            Some(self.reason.unwrap_or(DenialReason::NotFound))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_reason_strings_match_serde() {
        for reason in [
            DenialReason::NotFound,
            DenialReason::PasswordRequired,
            DenialReason::OnlyOwnerMayDelete,
            DenialReason::OnlyOwnerMayManageCoManagers,
            DenialReason::OnlyOwnerMayInvite,
            DenialReason::AuthenticationRequired,
            DenialReason::AccountSuspended,
            DenialReason::OnlyReserverMayCancel,
            DenialReason::InsufficientPermissions,
        ] {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, reason.as_str());
        }
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::password("hunter2");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("hunter2"));
        assert_eq!(credential.expose(), "hunter2");
    }

    #[test]
    fn test_resource_serializes_tagged() {
        let value = serde_json::to_value(Resource::wish("w-1")).unwrap();
        assert_eq!(value["kind"], "wish");
        assert_eq!(value["id"], "w-1");
    }

    #[test]
    fn test_denial_reason_defaults_to_not_found() {
        let result = PermissionResult {
            allowed: false,
            reason: None,
        };
        assert_eq!(result.denial_reason(), Some(DenialReason::NotFound));
        assert_eq!(PermissionResult::allow().denial_reason(), None);
    }
}
