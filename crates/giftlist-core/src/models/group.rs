use giftlist_storage::clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    #[default]
    Member,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: clock::now_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMember {
    pub group_id: String,
    pub user_id: String,
    pub role: GroupRole,
    pub joined_at: i64,
}

impl GroupMember {
    pub fn new(group_id: impl Into<String>, user_id: impl Into<String>, role: GroupRole) -> Self {
        Self {
            group_id: group_id.into(),
            user_id: user_id.into(),
            role,
            joined_at: clock::now_ms(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == GroupRole::Admin
    }
}
