//! Seams between the cell state machine and the actors around it.

use crate::coord::Coord;
use crate::id::TravelerId;

/// Delivers eviction notices to feral occupants.
///
/// A cell calls this while handling a reservation from an ordinary
/// traveler. Implementations must not block on the calling cell.
pub trait EvictionNotifier {
    /// Ask `occupant` to vacate the cell at `at`.
    ///
    /// Returns `false` when the occupant has no live mailbox, in which
    /// case the cell refuses the reservation outright.
    fn notify(&self, occupant: TravelerId, at: Coord) -> bool;
}

impl<T: EvictionNotifier + ?Sized> EvictionNotifier for &T {
    fn notify(&self, occupant: TravelerId, at: Coord) -> bool {
        (**self).notify(occupant, at)
    }
}
