//! Test utilities and mock types for wayfare development.
//!
//! Provides mock implementations of [`EvictionNotifier`] and a polling
//! helper for tests that watch live actors converge.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Mutex;
use std::time::{Duration, Instant};

use wayfare_core::{Coord, EvictionNotifier, TravelerId};

/// Shorthand coordinate constructor for test tables.
pub fn c(x: i32, y: i32) -> Coord {
    Coord::new(x, y)
}

/// Records every eviction notice and answers with a fixed delivery result.
///
/// `RecordingNotifier::delivering()` behaves like a live feral mailbox;
/// `RecordingNotifier::unreachable()` behaves like one that has gone away.
pub struct RecordingNotifier {
    delivered: bool,
    notices: Mutex<Vec<(TravelerId, Coord)>>,
}

impl RecordingNotifier {
    pub fn delivering() -> Self {
        Self {
            delivered: true,
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            delivered: false,
            notices: Mutex::new(Vec::new()),
        }
    }

    /// Every `(occupant, cell)` pair notified so far.
    pub fn notices(&self) -> Vec<(TravelerId, Coord)> {
        self.notices.lock().unwrap().clone()
    }
}

impl EvictionNotifier for RecordingNotifier {
    fn notify(&self, occupant: TravelerId, at: Coord) -> bool {
        self.notices.lock().unwrap().push((occupant, at));
        self.delivered
    }
}

/// Poll `predicate` every millisecond until it holds or `timeout` passes.
///
/// Returns whether the predicate ever held.
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
