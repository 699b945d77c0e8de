use giftlist_storage::clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A gift item. A wish can sit on any number of lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wish {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    /// How many people may reserve this wish at the same time
    pub quantity: u32,
    pub created_at: i64,
}

impl Wish {
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            title: title.into(),
            quantity,
            created_at: clock::now_ms(),
        }
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

/// Row linking a wish to a list it appears on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WishMembership {
    pub wish_id: String,
    pub list_id: String,
    pub added_at: i64,
}

impl WishMembership {
    pub fn new(wish_id: impl Into<String>, list_id: impl Into<String>) -> Self {
        Self {
            wish_id: wish_id.into(),
            list_id: list_id.into(),
            added_at: clock::now_ms(),
        }
    }
}
