//! The only place reservation records turn into caller-facing data.

use crate::models::{Reservation, ReservationView, Wish};

pub struct VisibilityProjector;

impl VisibilityProjector {
    /// Shape the reservations of `wish` for `viewer`.
    ///
    /// The owner always gets the blind shape, whatever the real state is.
    /// Records that belong to another wish are ignored.
    pub fn project(
        wish: &Wish,
        reservations: &[Reservation],
        viewer: Option<&str>,
    ) -> ReservationView {
        if viewer.is_some_and(|viewer_id| wish.is_owner(viewer_id)) {
            return ReservationView::Owner {
                is_reserved: false,
                can_unreserve: false,
            };
        }

        let live: Vec<&Reservation> = reservations
            .iter()
            .filter(|reservation| reservation.wish_id == wish.id)
            .collect();

        let own = viewer.and_then(|viewer_id| {
            live.iter()
                .find(|reservation| reservation.reserver_id == viewer_id)
        });

        let reserved_at = match own {
            Some(reservation) => Some(reservation.reserved_at),
            None => live.iter().map(|reservation| reservation.reserved_at).min(),
        };

        ReservationView::Visitor {
            is_reserved: !live.is_empty(),
            reserved_at,
            can_unreserve: own.is_some(),
        }
    }
}
