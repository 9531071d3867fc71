//! Traveler id issuance and the feral mailbox registry.
//!
//! [`IdLedger`] holds the counters and the registry; the issuer thread
//! owns one ledger and applies requests to it in arrival order, so no
//! two of them ever race. The issuer never blocks on anyone: replies go to one-shot
//! channels and eviction notices to unbounded feral mailboxes.

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use indexmap::IndexMap;
use tracing::{debug, trace};
use wayfare_core::{Coord, EvictionNotifier, TravelerId};

use crate::config::FERAL_ID_MODULUS;
use crate::lifecycle::{ShutdownSignal, TaskToken};

// ── IdLedger ───────────────────────────────────────────────────────

/// Id counters plus the registry of live feral mailboxes.
#[derive(Debug)]
pub struct IdLedger {
    capacity: u16,
    next_ordinary: u16,
    feral_cursor: u16,
    ferals: IndexMap<u16, Sender<Coord>>,
}

impl IdLedger {
    /// A ledger issuing ordinary ids `0..capacity` and feral ids
    /// `capacity..capacity + FERAL_ID_MODULUS`.
    pub fn new(capacity: u16) -> Self {
        Self {
            capacity,
            next_ordinary: 0,
            feral_cursor: 0,
            ferals: IndexMap::new(),
        }
    }

    /// Next ordinary id, or `None` once capacity is exhausted.
    pub fn issue_ordinary(&mut self) -> Option<TravelerId> {
        if self.next_ordinary >= self.capacity {
            return None;
        }
        let id = TravelerId::Ordinary(self.next_ordinary);
        self.next_ordinary += 1;
        Some(id)
    }

    /// Next free feral id, registering `mailbox` under it.
    ///
    /// Ids whose previous holder is still registered are skipped.
    /// Returns `None` only when every feral id is live.
    pub fn issue_feral(&mut self, mailbox: Sender<Coord>) -> Option<TravelerId> {
        for step in 0..FERAL_ID_MODULUS {
            let offset = (self.feral_cursor + step) % FERAL_ID_MODULUS;
            let number = self.capacity + offset;
            if self.ferals.contains_key(&number) {
                continue;
            }
            self.feral_cursor = (offset + 1) % FERAL_ID_MODULUS;
            self.ferals.insert(number, mailbox);
            return Some(TravelerId::Feral(number));
        }
        None
    }

    /// Drop the mailbox registered for `id`.
    pub fn retire(&mut self, id: TravelerId) -> bool {
        match id {
            TravelerId::Feral(n) => self.ferals.swap_remove(&n).is_some(),
            TravelerId::Ordinary(_) => false,
        }
    }

    /// Post `at` to the occupant's mailbox.
    ///
    /// A mailbox whose receiver is gone is dropped from the registry.
    pub fn notify(&mut self, occupant: TravelerId, at: Coord) -> bool {
        let TravelerId::Feral(n) = occupant else {
            return false;
        };
        let Some(mailbox) = self.ferals.get(&n) else {
            return false;
        };
        if mailbox.send(at).is_ok() {
            true
        } else {
            self.ferals.swap_remove(&n);
            false
        }
    }

    /// Whether `id` currently has a registered mailbox.
    pub fn is_registered(&self, id: TravelerId) -> bool {
        match id {
            TravelerId::Feral(n) => self.ferals.contains_key(&n),
            TravelerId::Ordinary(_) => false,
        }
    }

    /// Number of live feral registrations.
    pub fn live_ferals(&self) -> usize {
        self.ferals.len()
    }

    /// Ordinary ids issued so far.
    pub fn ordinary_issued(&self) -> u16 {
        self.next_ordinary
    }

    fn apply(&mut self, request: IssuerRequest) {
        match request {
            IssuerRequest::Ordinary { reply } => {
                let id = self.issue_ordinary();
                trace!(?id, "ordinary id issued");
                let _ = reply.send(id);
            }
            IssuerRequest::Feral { mailbox, reply } => {
                let id = self.issue_feral(mailbox);
                trace!(?id, "feral id issued");
                let _ = reply.send(id);
            }
            IssuerRequest::Retire { id } => {
                if self.retire(id) {
                    debug!(traveler = %id, "feral retired");
                }
            }
            IssuerRequest::Notify {
                occupant,
                at,
                reply,
            } => {
                let delivered = self.notify(occupant, at);
                trace!(%occupant, cell = %at, delivered, "eviction notice");
                let _ = reply.send(delivered);
            }
            IssuerRequest::Registered { id, reply } => {
                let _ = reply.send(self.is_registered(id));
            }
        }
    }
}

// ── Issuer actor ───────────────────────────────────────────────────

pub(crate) enum IssuerRequest {
    Ordinary {
        reply: Sender<Option<TravelerId>>,
    },
    Feral {
        mailbox: Sender<Coord>,
        reply: Sender<Option<TravelerId>>,
    },
    Retire {
        id: TravelerId,
    },
    Notify {
        occupant: TravelerId,
        at: Coord,
        reply: Sender<bool>,
    },
    Registered {
        id: TravelerId,
        reply: Sender<bool>,
    },
}

/// Cloneable client for the issuer thread.
///
/// Every call degrades to "nothing issued" / "not delivered" once the
/// issuer has stopped.
#[derive(Clone, Debug)]
pub struct IssuerHandle {
    tx: Sender<IssuerRequest>,
}

impl IssuerHandle {
    /// Request the next ordinary id.
    pub fn issue_ordinary(&self) -> Option<TravelerId> {
        self.call(|reply| IssuerRequest::Ordinary { reply }).flatten()
    }

    /// Request a feral id and register `mailbox` under it.
    pub fn issue_feral(&self, mailbox: Sender<Coord>) -> Option<TravelerId> {
        self.call(|reply| IssuerRequest::Feral { mailbox, reply }).flatten()
    }

    /// Deregister a feral mailbox. Does not wait.
    pub fn retire(&self, id: TravelerId) {
        let _ = self.tx.send(IssuerRequest::Retire { id });
    }

    /// Whether `id` currently has a registered mailbox.
    pub fn is_registered(&self, id: TravelerId) -> bool {
        self.call(|reply| IssuerRequest::Registered { id, reply })
            .unwrap_or(false)
    }

    fn call<T>(&self, make: impl FnOnce(Sender<T>) -> IssuerRequest) -> Option<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx.send(make(reply_tx)).ok()?;
        reply_rx.recv().ok()
    }
}

impl EvictionNotifier for IssuerHandle {
    fn notify(&self, occupant: TravelerId, at: Coord) -> bool {
        self.call(|reply| IssuerRequest::Notify {
            occupant,
            at,
            reply,
        })
        .unwrap_or(false)
    }
}

/// Create an issuer handle and the receiving end for [`run_issuer`].
pub(crate) fn issuer_channel() -> (IssuerHandle, Receiver<IssuerRequest>) {
    let (tx, rx) = unbounded();
    (IssuerHandle { tx }, rx)
}

/// Issuer thread body. Runs until shutdown.
pub(crate) fn run_issuer(
    mut ledger: IdLedger,
    requests: Receiver<IssuerRequest>,
    shutdown: ShutdownSignal,
    _token: TaskToken,
) {
    debug!("issuer started");
    loop {
        select! {
            recv(requests) -> msg => match msg {
                Ok(request) => ledger.apply(request),
                Err(_) => break,
            },
            recv(shutdown.receiver()) -> _ => break,
        }
    }
    debug!(
        ordinary = ledger.ordinary_issued(),
        ferals = ledger.live_ferals(),
        "issuer stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{shutdown_pair, task_tracker};
    use proptest::prelude::*;
    use std::thread;
    use std::time::Duration;
    use wayfare_test_utils::c;

    #[test]
    fn ordinary_exhaustion_is_permanent() {
        let mut ledger = IdLedger::new(3);
        let ids: Vec<_> = (0..3).map(|_| ledger.issue_ordinary()).collect();
        assert_eq!(
            ids,
            vec![
                Some(TravelerId::Ordinary(0)),
                Some(TravelerId::Ordinary(1)),
                Some(TravelerId::Ordinary(2)),
            ]
        );
        for _ in 0..10 {
            assert_eq!(ledger.issue_ordinary(), None);
        }
    }

    #[test]
    fn feral_ids_sit_above_capacity_and_wrap() {
        let mut ledger = IdLedger::new(10);
        let (tx, _rx) = unbounded();
        let first = ledger.issue_feral(tx.clone()).unwrap();
        assert_eq!(first, TravelerId::Feral(10));
        ledger.retire(first);

        for _ in 1..FERAL_ID_MODULUS {
            let id = ledger.issue_feral(tx.clone()).unwrap();
            ledger.retire(id);
        }
        // Cursor wrapped back to the first offset.
        assert_eq!(ledger.issue_feral(tx).unwrap(), TravelerId::Feral(10));
    }

    #[test]
    fn live_feral_ids_are_skipped() {
        let mut ledger = IdLedger::new(5);
        let (tx, _rx) = unbounded();
        let a = ledger.issue_feral(tx.clone()).unwrap();
        let b = ledger.issue_feral(tx.clone()).unwrap();
        ledger.retire(b);
        for _ in 2..FERAL_ID_MODULUS {
            let id = ledger.issue_feral(tx.clone()).unwrap();
            ledger.retire(id);
        }
        // Offset 0 (`a`) is still live, so the wrap lands on `b`'s id.
        let next = ledger.issue_feral(tx).unwrap();
        assert_ne!(next, a);
        assert_eq!(next, b);
    }

    #[test]
    fn feral_issuance_fails_only_when_all_live() {
        let mut ledger = IdLedger::new(1);
        let (tx, _rx) = unbounded();
        for _ in 0..FERAL_ID_MODULUS {
            assert!(ledger.issue_feral(tx.clone()).is_some());
        }
        assert_eq!(ledger.live_ferals(), FERAL_ID_MODULUS as usize);
        assert_eq!(ledger.issue_feral(tx.clone()), None);

        ledger.retire(TravelerId::Feral(42));
        assert_eq!(ledger.issue_feral(tx), Some(TravelerId::Feral(42)));
    }

    #[test]
    fn notify_delivers_and_prunes_dead_mailboxes() {
        let mut ledger = IdLedger::new(2);
        let (tx, rx) = unbounded();
        let id = ledger.issue_feral(tx).unwrap();

        assert!(ledger.notify(id, c(1, 1)));
        assert_eq!(rx.try_recv(), Ok(c(1, 1)));

        drop(rx);
        assert!(!ledger.notify(id, c(1, 1)));
        assert!(!ledger.is_registered(id));
    }

    #[test]
    fn notify_ignores_ordinary_and_unknown() {
        let mut ledger = IdLedger::new(2);
        assert!(!ledger.notify(TravelerId::Ordinary(0), c(0, 0)));
        assert!(!ledger.notify(TravelerId::Feral(50), c(0, 0)));
        assert!(!ledger.retire(TravelerId::Ordinary(0)));
    }

    #[test]
    fn actor_serves_handles_until_shutdown() {
        let (trigger, signal) = shutdown_pair();
        let (tracker, token) = task_tracker();
        let (handle, rx) = issuer_channel();
        let worker = thread::spawn(move || run_issuer(IdLedger::new(1), rx, signal, token));

        assert_eq!(handle.issue_ordinary(), Some(TravelerId::Ordinary(0)));
        assert_eq!(handle.issue_ordinary(), None);

        let (mb_tx, mb_rx) = unbounded();
        let feral = handle.issue_feral(mb_tx).unwrap();
        assert!(handle.is_registered(feral));
        assert!(handle.notify(feral, c(0, 0)));
        assert_eq!(mb_rx.recv_timeout(Duration::from_secs(1)), Ok(c(0, 0)));
        handle.retire(feral);
        assert!(!handle.is_registered(feral));

        drop(trigger);
        assert!(tracker.wait_timeout(Duration::from_secs(5)));
        worker.join().unwrap();

        // A stopped issuer issues nothing and delivers nothing.
        assert_eq!(handle.issue_ordinary(), None);
        assert!(!handle.notify(feral, c(0, 0)));
    }

    proptest! {
        #[test]
        fn live_feral_ids_are_unique(ops in proptest::collection::vec(any::<bool>(), 1..300)) {
            let mut ledger = IdLedger::new(7);
            let (tx, _rx) = unbounded();
            let mut live: Vec<TravelerId> = Vec::new();
            for issue in ops {
                if issue || live.is_empty() {
                    if let Some(id) = ledger.issue_feral(tx.clone()) {
                        prop_assert!(!live.contains(&id));
                        prop_assert!(id.number() >= 7 && id.number() < 7 + FERAL_ID_MODULUS);
                        live.push(id);
                    } else {
                        prop_assert_eq!(live.len(), FERAL_ID_MODULUS as usize);
                    }
                } else {
                    let id = live.remove(0);
                    prop_assert!(ledger.retire(id));
                }
            }
            prop_assert_eq!(ledger.live_ferals(), live.len());
        }
    }
}
