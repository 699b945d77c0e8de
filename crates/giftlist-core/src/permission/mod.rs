//! Permission engine: who may do what to which resource.

pub mod engine;
pub mod policy;
pub mod timing;

pub use engine::PermissionEngine;
pub use policy::{DecisionCache, Policy};
pub use timing::DenialFloor;
