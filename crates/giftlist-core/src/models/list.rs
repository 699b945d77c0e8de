use giftlist_storage::clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Access tier of a list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Owner, co-managers and shared groups only
    #[default]
    Private,
    /// Anyone holding the share link
    Public,
    /// Anyone holding the share link and the password
    Password,
}

impl Visibility {
    /// Whether lists at this tier are reachable through a share token.
    pub fn is_linkable(self) -> bool {
        matches!(self, Visibility::Public | Visibility::Password)
    }
}

/// A gift list.
///
/// Invariants kept by the constructors and `apply_visibility`:
/// - `visibility == Password` implies `password_hash` is set
/// - `visibility` is linkable implies `share_token` is set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GiftList {
    pub id: String,
    pub owner_id: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub share_token: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

fn new_share_token() -> String {
    Uuid::new_v4().simple().to_string()
}

impl GiftList {
    pub fn new(
        owner_id: impl Into<String>,
        visibility: Visibility,
        password_hash: Option<String>,
    ) -> Result<Self, ValidationError> {
        let now = clock::now_ms();
        let mut list = Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            visibility: Visibility::Private,
            password_hash: None,
            share_token: None,
            created_at: now,
            updated_at: now,
        };
        list.apply_visibility(visibility, password_hash)?;
        Ok(list)
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Move the list to `visibility`.
    ///
    /// Going private keeps the share token, so a later return to public
    /// restores the same link. Going to password always replaces the hash,
    /// so earlier passwords stop verifying.
    pub fn apply_visibility(
        &mut self,
        visibility: Visibility,
        password_hash: Option<String>,
    ) -> Result<(), ValidationError> {
        match visibility {
            Visibility::Private | Visibility::Public => {
                self.password_hash = None;
            }
            Visibility::Password => {
                let Some(hash) = password_hash.filter(|hash| !hash.is_empty()) else {
                    return Err(ValidationError::PasswordRequired);
                };
                self.password_hash = Some(hash);
            }
        }

        if visibility.is_linkable() && self.share_token.is_none() {
            self.share_token = Some(new_share_token());
        }

        self.visibility = visibility;
        self.updated_at = clock::now_ms();
        Ok(())
    }

    /// Issue a new share token, invalidating the old link.
    pub fn rotate_share_token(&mut self) {
        self.share_token = Some(new_share_token());
        self.updated_at = clock::now_ms();
    }
}

/// Delegated admin-level user on a list they do not own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoManager {
    pub list_id: String,
    pub user_id: String,
    pub added_at: i64,
}

impl CoManager {
    pub fn new(list_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            list_id: list_id.into(),
            user_id: user_id.into(),
            added_at: clock::now_ms(),
        }
    }
}

/// A list made visible to every member of a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupShare {
    pub list_id: String,
    pub group_id: String,
    pub shared_at: i64,
}

impl GroupShare {
    pub fn new(list_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            list_id: list_id.into(),
            group_id: group_id.into(),
            shared_at: clock::now_ms(),
        }
    }
}
