//! Cell mailbox messages and the client handle that sends them.
//!
//! Every message carries a one-shot reply sender. A disconnected mailbox
//! or a dropped reply means the cell has stopped, which only happens
//! during shutdown.

use crossbeam_channel::{bounded, Sender};
use wayfare_core::{
    CellReport, CellSnapshot, Coord, TravelerId, TravelerKind, TravelerRequest, Verdict,
};

use crate::grid::GridError;

/// Queue depth of each cell mailbox.
pub(crate) const CELL_MAILBOX_CAPACITY: usize = 16;

/// A message addressed to one cell actor.
pub(crate) enum Envelope {
    /// Occupancy-changing request from a traveler.
    Traveler {
        request: TravelerRequest,
        reply: Sender<Verdict>,
    },
    /// Lock for a camera read; `None` answers Denied.
    CameraBlock {
        reply: Sender<Option<CellSnapshot>>,
    },
    /// Unlock after a camera read.
    CameraRelease { reply: Sender<Verdict> },
    /// Informational state query.
    Inspect { reply: Sender<CellReport> },
    /// Forced spawn through the idle-tick path.
    Spawn {
        kind: TravelerKind,
        reply: Sender<Option<TravelerId>>,
    },
}

impl Envelope {
    /// Whether handling this envelope counts as cell activity that
    /// restarts the idle interval.
    pub(crate) fn postpones_tick(&self) -> bool {
        matches!(self, Self::Traveler { .. } | Self::Spawn { .. })
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Traveler { request, .. } => write!(f, "Traveler({request:?})"),
            Self::CameraBlock { .. } => write!(f, "CameraBlock"),
            Self::CameraRelease { .. } => write!(f, "CameraRelease"),
            Self::Inspect { .. } => write!(f, "Inspect"),
            Self::Spawn { kind, .. } => write!(f, "Spawn({kind:?})"),
        }
    }
}

/// Cloneable client for one cell actor.
#[derive(Clone, Debug)]
pub struct CellHandle {
    coord: Coord,
    tx: Sender<Envelope>,
}

impl CellHandle {
    pub(crate) fn new(coord: Coord, tx: Sender<Envelope>) -> Self {
        Self { coord, tx }
    }

    /// Position of the cell this handle talks to.
    pub fn coord(&self) -> Coord {
        self.coord
    }

    /// Send one traveler request and wait for the verdict.
    pub fn request(&self, request: TravelerRequest) -> Result<Verdict, GridError> {
        self.call(|reply| Envelope::Traveler { request, reply })
    }

    /// `Reserve(id, from)`.
    pub fn reserve(&self, id: TravelerId, from: Coord) -> Result<Verdict, GridError> {
        self.request(TravelerRequest::Reserve { id, from })
    }

    /// `Assign(id, from)`.
    pub fn assign(&self, id: TravelerId, from: Coord) -> Result<Verdict, GridError> {
        self.request(TravelerRequest::Assign { id, from })
    }

    /// `Release(id, toward)`.
    pub fn release(&self, id: TravelerId, toward: Coord) -> Result<Verdict, GridError> {
        self.request(TravelerRequest::Release { id, toward })
    }

    /// `Unlock(id)`.
    pub fn unlock(&self, id: TravelerId) -> Result<Verdict, GridError> {
        self.request(TravelerRequest::Unlock { id })
    }

    /// Lock the cell for a camera read.
    pub fn camera_block(&self) -> Result<Option<CellSnapshot>, GridError> {
        self.call(|reply| Envelope::CameraBlock { reply })
    }

    /// Unlock after a camera read.
    pub fn camera_release(&self) -> Result<Verdict, GridError> {
        self.call(|reply| Envelope::CameraRelease { reply })
    }

    /// Informational view of the cell.
    pub fn inspect(&self) -> Result<CellReport, GridError> {
        self.call(|reply| Envelope::Inspect { reply })
    }

    /// Spawn a traveler here if the cell can host one.
    pub fn spawn(&self, kind: TravelerKind) -> Result<Option<TravelerId>, GridError> {
        self.call(|reply| Envelope::Spawn { kind, reply })
    }

    fn call<T>(&self, make: impl FnOnce(Sender<T>) -> Envelope) -> Result<T, GridError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(make(reply_tx))
            .map_err(|_| GridError::Shutdown)?;
        reply_rx.recv().map_err(|_| GridError::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use wayfare_test_utils::c;

    #[test]
    fn request_round_trip() {
        let (tx, rx) = bounded(CELL_MAILBOX_CAPACITY);
        let handle = CellHandle::new(c(1, 2), tx);
        let server = thread::spawn(move || match rx.recv().unwrap() {
            Envelope::Traveler { request, reply } => {
                assert_eq!(request.sender(), TravelerId::Ordinary(3));
                reply.send(Verdict::Suspended).unwrap();
            }
            other => panic!("unexpected {other:?}"),
        });
        assert_eq!(
            handle.reserve(TravelerId::Ordinary(3), c(0, 2)),
            Ok(Verdict::Suspended)
        );
        server.join().unwrap();
        assert_eq!(handle.coord(), c(1, 2));
    }

    #[test]
    fn only_traveler_and_spawn_envelopes_postpone_the_tick() {
        let request = TravelerRequest::Unlock {
            id: TravelerId::Ordinary(0),
        };
        let (verdict_tx, _) = bounded(1);
        let (snapshot_tx, _) = bounded(1);
        let (report_tx, _) = bounded(1);
        let (spawn_tx, _) = bounded(1);
        assert!(Envelope::Traveler {
            request,
            reply: verdict_tx.clone()
        }
        .postpones_tick());
        assert!(Envelope::Spawn {
            kind: TravelerKind::Feral,
            reply: spawn_tx
        }
        .postpones_tick());
        assert!(!Envelope::CameraBlock { reply: snapshot_tx }.postpones_tick());
        assert!(!Envelope::CameraRelease { reply: verdict_tx }.postpones_tick());
        assert!(!Envelope::Inspect { reply: report_tx }.postpones_tick());
    }

    #[test]
    fn stopped_cell_reports_shutdown() {
        let (tx, rx) = bounded(CELL_MAILBOX_CAPACITY);
        let handle = CellHandle::new(c(0, 0), tx);
        drop(rx);
        assert_eq!(handle.camera_release(), Err(GridError::Shutdown));
    }

    #[test]
    fn dropped_reply_reports_shutdown() {
        let (tx, rx) = bounded(CELL_MAILBOX_CAPACITY);
        let handle = CellHandle::new(c(0, 0), tx);
        let server = thread::spawn(move || {
            // Receive and drop without answering.
            let _ = rx.recv().unwrap();
        });
        assert_eq!(handle.inspect(), Err(GridError::Shutdown));
        server.join().unwrap();
    }
}
