pub mod account;
pub mod group;
pub mod list;
pub mod permission;
pub mod reservation;
pub mod wish;

pub use account::Account;
pub use group::{Group, GroupMember, GroupRole};
pub use list::{CoManager, GiftList, GroupShare, Visibility};
pub use permission::{Action, Credential, DenialReason, PermissionResult, Resource};
pub use reservation::{CancelTarget, Reservation, ReservationView};
pub use wish::{Wish, WishMembership};
