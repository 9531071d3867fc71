//! Request and response vocabulary of the cell handshake protocol.
//!
//! A move is four messages against two cells:
//!
//! ```text
//! traveler            destination                 origin
//!    |--Reserve(id, origin)-->|                       |
//!    |<--------Accepted-------|                       |
//!    |--Release(id, dest)--------------------------->| Occupied -> ReservedOutgoing
//!    |--Assign(id, origin)--->| ReservedIncoming -> Occupied (or Terminate)
//!    |--Release(id, dest)--------------------------->| ReservedOutgoing -> Available
//! ```

use std::fmt;

use crate::coord::Coord;
use crate::id::TravelerId;

/// Occupancy state of one cell.
///
/// Every non-`Available` state names exactly one traveler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Occupancy {
    /// Nobody here, nobody coming.
    Available,
    /// Reserved by a traveler that has not arrived yet.
    ReservedIncoming(TravelerId),
    /// A traveler is resident.
    Occupied(TravelerId),
    /// The resident traveler is leaving.
    ReservedOutgoing(TravelerId),
}

impl Occupancy {
    /// The associated traveler, if any.
    pub fn traveler(self) -> Option<TravelerId> {
        match self {
            Self::Available => None,
            Self::ReservedIncoming(id) | Self::Occupied(id) | Self::ReservedOutgoing(id) => {
                Some(id)
            }
        }
    }

    /// The traveler physically present (Occupied or ReservedOutgoing).
    pub fn resident(self) -> Option<TravelerId> {
        match self {
            Self::Occupied(id) | Self::ReservedOutgoing(id) => Some(id),
            _ => None,
        }
    }

    /// True while a move through this cell is half-done.
    pub fn in_transition(self) -> bool {
        matches!(self, Self::ReservedIncoming(_) | Self::ReservedOutgoing(_))
    }

    /// Whether `self -> next` is an edge of the occupancy graph.
    ///
    /// Self-loops are legal (a refused request leaves the state alone).
    pub fn may_become(self, next: Occupancy) -> bool {
        use Occupancy::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Available, ReservedIncoming(_)) => true,
            (ReservedIncoming(a), Occupied(b)) => a == b,
            (ReservedIncoming(_), Available) => true,
            (Occupied(a), ReservedOutgoing(b)) => a == b,
            (ReservedOutgoing(_), Available) => true,
            _ => false,
        }
    }
}

/// Outcome of a traveler request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The request took effect.
    Accepted,
    /// Refused; the caller abandons or retries as its own loop dictates.
    Denied,
    /// Refused for now because an eviction is in flight; retry.
    Suspended,
    /// The assignment landed on a live hazard. The caller must end.
    Terminate,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Denied => write!(f, "denied"),
            Self::Suspended => write!(f, "suspended"),
            Self::Terminate => write!(f, "terminate"),
        }
    }
}

/// A state-changing request from a traveler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TravelerRequest {
    /// Claim an empty cell ahead of moving in. `from` is the requester's cell.
    Reserve {
        /// Requester.
        id: TravelerId,
        /// Where the requester currently is.
        from: Coord,
    },
    /// Complete an arrival into a reserved cell.
    Assign {
        /// Requester.
        id: TravelerId,
        /// The cell being left.
        from: Coord,
    },
    /// Step an exit forward; `toward` is the other end of the move.
    Release {
        /// Requester.
        id: TravelerId,
        /// The cell being entered.
        toward: Coord,
    },
    /// Clear a pending eviction notice.
    Unlock {
        /// Requester.
        id: TravelerId,
    },
}

impl TravelerRequest {
    /// The traveler that sent this request.
    pub fn sender(&self) -> TravelerId {
        match *self {
            Self::Reserve { id, .. }
            | Self::Assign { id, .. }
            | Self::Release { id, .. }
            | Self::Unlock { id } => id,
        }
    }
}

/// What a camera sees at one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CellSnapshot {
    /// A hazard is live here.
    pub hazard: bool,
    /// Resident traveler; `None` when empty or when a hazard hides it.
    pub occupant: Option<TravelerId>,
    /// A traveler crossed the edge to the right of this cell.
    pub horizontal_edge: bool,
    /// A traveler crossed the edge below this cell.
    pub vertical_edge: bool,
}

/// Informational view of one cell, answered even while camera-locked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellReport {
    /// Position of the cell.
    pub coord: Coord,
    /// Current occupancy.
    pub occupancy: Occupancy,
    /// Remaining hazard countdown, `None` when inactive.
    pub hazard: Option<u32>,
    /// A camera currently holds this cell.
    pub camera_locked: bool,
    /// An eviction notice is outstanding.
    pub awaiting_eviction: bool,
}
