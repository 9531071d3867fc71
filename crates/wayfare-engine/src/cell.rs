//! Per-cell state machine.
//!
//! [`Cell`] is the synchronous heart of a cell actor: every request the
//! actor pulls from its mailbox is applied here, one at a time. Keeping
//! it free of channels and threads lets the transition rules be tested
//! directly.

use tracing::{debug, trace};
use wayfare_core::{
    CellReport, CellSnapshot, Coord, EvictionNotifier, Occupancy, TravelerId, TravelerRequest,
    Verdict,
};

/// Countdown of a danger zone.
///
/// `None` is inactive. `Some(0)` is still active: it is the last tick
/// before the zone clears.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hazard(Option<u32>);

impl Hazard {
    /// An inactive hazard.
    pub const INACTIVE: Hazard = Hazard(None);

    /// A hazard that stays active for `ticks` more decrements.
    pub fn active_for(ticks: u32) -> Self {
        Self(Some(ticks))
    }

    /// Whether travelers assigned here are terminated.
    pub fn is_active(self) -> bool {
        self.0.is_some()
    }

    /// Remaining countdown.
    pub fn remaining(self) -> Option<u32> {
        self.0
    }

    /// Advance one idle tick.
    fn tick(&mut self) {
        self.0 = match self.0 {
            Some(0) | None => None,
            Some(n) => Some(n - 1),
        };
    }
}

/// State of one grid cell.
#[derive(Clone, Debug)]
pub struct Cell {
    coord: Coord,
    occupancy: Occupancy,
    hazard: Hazard,
    camera_locked: bool,
    awaiting_eviction: bool,
    horizontal_edge: bool,
    vertical_edge: bool,
}

impl Cell {
    /// An empty, unlocked cell at `coord`.
    pub fn new(coord: Coord) -> Self {
        Self {
            coord,
            occupancy: Occupancy::Available,
            hazard: Hazard::INACTIVE,
            camera_locked: false,
            awaiting_eviction: false,
            horizontal_edge: false,
            vertical_edge: false,
        }
    }

    /// Position of this cell.
    pub fn coord(&self) -> Coord {
        self.coord
    }

    /// Current occupancy.
    pub fn occupancy(&self) -> Occupancy {
        self.occupancy
    }

    /// Current hazard countdown.
    pub fn hazard(&self) -> Hazard {
        self.hazard
    }

    /// Informational view; never refused.
    pub fn report(&self) -> CellReport {
        CellReport {
            coord: self.coord,
            occupancy: self.occupancy,
            hazard: self.hazard.remaining(),
            camera_locked: self.camera_locked,
            awaiting_eviction: self.awaiting_eviction,
        }
    }

    /// Apply a traveler request.
    ///
    /// `notifier` is consulted only when an ordinary traveler tries to
    /// reserve a cell held by a feral one.
    pub fn handle(&mut self, request: TravelerRequest, notifier: &dyn EvictionNotifier) -> Verdict {
        if self.camera_locked {
            return if self.awaiting_eviction {
                Verdict::Suspended
            } else {
                Verdict::Denied
            };
        }

        let verdict = match request {
            TravelerRequest::Reserve { id, .. } => self.reserve(id, notifier),
            TravelerRequest::Assign { id, from } => self.assign(id, from),
            TravelerRequest::Release { id, toward } => self.release(id, toward),
            TravelerRequest::Unlock { .. } => self.unlock(),
        };
        trace!(cell = %self.coord, ?request, %verdict, state = ?self.occupancy, "handled");
        verdict
    }

    fn reserve(&mut self, id: TravelerId, notifier: &dyn EvictionNotifier) -> Verdict {
        match self.occupancy {
            Occupancy::Available => {
                self.occupancy = Occupancy::ReservedIncoming(id);
                return Verdict::Accepted;
            }
            Occupancy::Occupied(occupant)
                if occupant.is_feral() && !id.is_feral() && !self.awaiting_eviction =>
            {
                if !notifier.notify(occupant, self.coord) {
                    return Verdict::Denied;
                }
                debug!(cell = %self.coord, %occupant, requester = %id, "eviction requested");
                self.awaiting_eviction = true;
            }
            _ => {}
        }

        if self.awaiting_eviction {
            Verdict::Suspended
        } else {
            Verdict::Denied
        }
    }

    fn assign(&mut self, id: TravelerId, from: Coord) -> Verdict {
        if self.occupancy != Occupancy::ReservedIncoming(id) {
            return Verdict::Denied;
        }
        if self.hazard.is_active() {
            debug!(cell = %self.coord, traveler = %id, "traveler walked into hazard");
            self.reset();
            return Verdict::Terminate;
        }
        self.occupancy = Occupancy::Occupied(id);
        self.mark_edge(from);
        Verdict::Accepted
    }

    fn release(&mut self, id: TravelerId, toward: Coord) -> Verdict {
        match self.occupancy {
            Occupancy::Occupied(owner) if owner == id => {
                self.occupancy = Occupancy::ReservedOutgoing(id);
                Verdict::Accepted
            }
            Occupancy::ReservedOutgoing(owner) if owner == id => {
                self.mark_edge(toward);
                self.reset();
                Verdict::Accepted
            }
            Occupancy::ReservedIncoming(owner) if owner == id => {
                self.occupancy = Occupancy::Available;
                Verdict::Accepted
            }
            _ => Verdict::Denied,
        }
    }

    fn unlock(&mut self) -> Verdict {
        if self.awaiting_eviction {
            self.awaiting_eviction = false;
            Verdict::Accepted
        } else {
            Verdict::Denied
        }
    }

    /// Lock the cell for a camera and read it.
    ///
    /// Returns `None` while a move through this cell is half-done. Edge
    /// markers are consumed by a successful read.
    pub fn camera_block(&mut self) -> Option<CellSnapshot> {
        if self.occupancy.in_transition() {
            return None;
        }
        self.camera_locked = true;

        let hazard = self.hazard.is_active();
        let snapshot = CellSnapshot {
            hazard,
            occupant: if hazard {
                None
            } else {
                self.occupancy.resident()
            },
            horizontal_edge: self.horizontal_edge,
            vertical_edge: self.vertical_edge,
        };
        self.horizontal_edge = false;
        self.vertical_edge = false;
        Some(snapshot)
    }

    /// Unlock after a camera read.
    pub fn camera_release(&mut self) -> Verdict {
        if !self.camera_locked {
            return Verdict::Denied;
        }
        self.camera_locked = false;
        Verdict::Accepted
    }

    /// Advance the hazard countdown by one idle tick.
    ///
    /// Returns whether the cell may host a spawn or a new hazard this tick.
    pub fn idle_tick(&mut self) -> bool {
        self.hazard.tick();
        self.can_host()
    }

    /// Empty and not hazardous.
    pub fn can_host(&self) -> bool {
        self.occupancy == Occupancy::Available && !self.hazard.is_active()
    }

    /// Place a freshly spawned traveler. Refused unless [`can_host`](Self::can_host).
    pub fn settle(&mut self, id: TravelerId) -> bool {
        if !self.can_host() {
            return false;
        }
        self.occupancy = Occupancy::Occupied(id);
        true
    }

    /// Undo a [`settle`](Self::settle) whose traveler never started.
    pub fn evict_unstarted(&mut self, id: TravelerId) {
        if self.occupancy == Occupancy::Occupied(id) {
            self.reset();
        }
    }

    /// Turn an idle empty cell into a danger zone.
    pub fn ignite(&mut self, duration: u32) -> bool {
        if !self.can_host() {
            return false;
        }
        debug!(cell = %self.coord, duration, "hazard active");
        self.hazard = Hazard::active_for(duration);
        true
    }

    fn mark_edge(&mut self, other: Coord) {
        if self.coord.is_left_of(other) {
            self.horizontal_edge = true;
        } else if self.coord.is_above(other) {
            self.vertical_edge = true;
        }
    }

    fn reset(&mut self) {
        self.hazard = Hazard::INACTIVE;
        self.occupancy = Occupancy::Available;
        self.awaiting_eviction = false;
    }

    #[cfg(test)]
    pub(crate) fn with_hazard(mut self, hazard: Hazard) -> Self {
        self.hazard = hazard;
        self
    }
}
