//! Reservation coordination and the privacy projection of its state.

pub mod coordinator;
pub mod projector;

pub use coordinator::ReservationCoordinator;
pub use projector::VisibilityProjector;
