use giftlist_storage::clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A live reservation of one unit of a wish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub id: String,
    pub wish_id: String,
    pub reserver_id: String,
    pub reserved_at: i64,
}

impl Reservation {
    pub fn new(wish_id: impl Into<String>, reserver_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            wish_id: wish_id.into(),
            reserver_id: reserver_id.into(),
            reserved_at: clock::now_ms(),
        }
    }
}

/// What to cancel: a reservation by ID, or the caller's own reservation on a wish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelTarget {
    Reservation(String),
    Wish(String),
}

/// Privacy-filtered reservation state as seen by one viewer.
///
/// Only `VisibilityProjector` builds these.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReservationView {
    /// Shape served to the wish owner, independent of the real state
    #[serde(rename_all = "camelCase")]
    Owner {
        is_reserved: bool,
        can_unreserve: bool,
    },
    /// Shape served to everyone else
    #[serde(rename_all = "camelCase")]
    Visitor {
        is_reserved: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reserved_at: Option<i64>,
        can_unreserve: bool,
    },
}

impl ReservationView {
    pub fn is_reserved(&self) -> bool {
        match self {
            ReservationView::Owner { is_reserved, .. }
            | ReservationView::Visitor { is_reserved, .. } => *is_reserved,
        }
    }

    pub fn can_unreserve(&self) -> bool {
        match self {
            ReservationView::Owner { can_unreserve, .. }
            | ReservationView::Visitor { can_unreserve, .. } => *can_unreserve,
        }
    }

    pub fn reserved_at(&self) -> Option<i64> {
        match self {
            ReservationView::Owner { .. } => None,
            ReservationView::Visitor { reserved_at, .. } => *reserved_at,
        }
    }
}
