//! Traveler tasks and the move protocol they share.
//!
//! A move from `origin` to `dest` is four requests:
//!
//! 1. `Reserve` at `dest`. Refusal abandons the move.
//! 2. `Release` at `origin` until accepted (Occupied -> ReservedOutgoing).
//! 3. `Assign` at `dest` until accepted or terminated.
//! 4. `Release` at `origin` until accepted (ReservedOutgoing -> Available).
//!
//! Step 4 runs even after a `Terminate`, so the origin never stays
//! reserved for a traveler that no longer exists.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};
use wayfare_core::{Coord, TravelerId, Verdict};

use crate::backoff::RetryBackoff;
use crate::grid::{GridError, SharedGrid};
use crate::lifecycle::TaskToken;

/// How a move attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MoveOutcome {
    /// The traveler now lives at the destination.
    Moved,
    /// The destination refused the reservation; nothing changed.
    Refused,
    /// The destination was hazardous. The traveler is gone.
    Terminated,
}

/// Identity, position and grid access of one traveler task.
pub(crate) struct Walker {
    grid: Arc<SharedGrid>,
    id: TravelerId,
    at: Coord,
    rng: ChaCha8Rng,
    backoff: RetryBackoff,
    _token: TaskToken,
}

impl Walker {
    pub(crate) fn new(
        grid: Arc<SharedGrid>,
        id: TravelerId,
        at: Coord,
        rng: ChaCha8Rng,
        token: TaskToken,
    ) -> Self {
        let backoff = grid.backoff();
        Self {
            grid,
            id,
            at,
            rng,
            backoff,
            _token: token,
        }
    }

    pub(crate) fn id(&self) -> TravelerId {
        self.id
    }

    pub(crate) fn at(&self) -> Coord {
        self.at
    }

    pub(crate) fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    /// Sleep one tick. `false` on shutdown.
    pub(crate) fn sleep_tick(&self) -> bool {
        self.grid.shutdown.sleep(self.grid.config.tick_interval)
    }

    pub(crate) fn roll(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability)
    }

    /// A uniformly chosen in-bounds neighbour, if any.
    pub(crate) fn random_neighbour(&mut self) -> Option<Coord> {
        self.grid
            .bounds
            .neighbours(self.at)
            .choose(&mut self.rng)
            .copied()
    }

    /// Back off before retrying. Shutdown surfaces as an error.
    pub(crate) fn pause(&mut self) -> Result<(), GridError> {
        if self.backoff.wait(&self.grid.shutdown) {
            Ok(())
        } else {
            Err(GridError::Shutdown)
        }
    }

    /// Run the four-step move toward `dest`.
    ///
    /// With `persistent` set, a Suspended reservation is retried until it
    /// resolves; otherwise any refusal abandons the move.
    pub(crate) fn step_to(
        &mut self,
        dest: Coord,
        persistent: bool,
    ) -> Result<MoveOutcome, GridError> {
        let (id, from) = (self.id, self.at);
        let grid = Arc::clone(&self.grid);
        let origin = grid.cell(from)?;
        let target = grid.cell(dest)?;

        self.backoff.reset();
        loop {
            match target.reserve(id, from)? {
                Verdict::Accepted => break,
                Verdict::Suspended if persistent => self.pause()?,
                verdict => {
                    trace!(traveler = %id, %dest, %verdict, "reservation refused");
                    return Ok(MoveOutcome::Refused);
                }
            }
        }

        self.until_accepted(|| origin.release(id, dest))?;

        self.backoff.reset();
        let arrived = loop {
            match target.assign(id, from)? {
                Verdict::Accepted => break true,
                Verdict::Terminate => break false,
                _ => self.pause()?,
            }
        };

        self.until_accepted(|| origin.release(id, dest))?;

        if arrived {
            trace!(traveler = %id, %from, %dest, "moved");
            self.at = dest;
            Ok(MoveOutcome::Moved)
        } else {
            debug!(traveler = %id, cell = %dest, "terminated by hazard");
            Ok(MoveOutcome::Terminated)
        }
    }

    /// Repeat `request` until a cell accepts it.
    pub(crate) fn until_accepted(
        &mut self,
        mut request: impl FnMut() -> Result<Verdict, GridError>,
    ) -> Result<(), GridError> {
        self.backoff.reset();
        while request()? != Verdict::Accepted {
            self.pause()?;
        }
        Ok(())
    }

    /// Retry `Unlock` at `cell` while it is Suspended behind a camera.
    ///
    /// Denied ends the attempt: the cell has no eviction pending, either
    /// because it was already cleared or because the cell has reset.
    pub(crate) fn unlock(&mut self, cell: Coord) -> Result<Verdict, GridError> {
        let grid = Arc::clone(&self.grid);
        let handle = grid.cell(cell)?;
        self.backoff.reset();
        loop {
            match handle.unlock(self.id)? {
                Verdict::Suspended => self.pause()?,
                verdict => return Ok(verdict),
            }
        }
    }

    /// Leave the current cell for good: release it twice.
    pub(crate) fn vacate(&mut self) -> Result<(), GridError> {
        let grid = Arc::clone(&self.grid);
        let here = grid.cell(self.at)?;
        let (id, at) = (self.id, self.at);
        self.until_accepted(|| here.release(id, at))?;
        self.until_accepted(|| here.release(id, at))
    }
}

/// An ordinary traveler: random walk until a hazard ends it.
pub(crate) struct Traveler {
    walker: Walker,
}

impl Traveler {
    pub(crate) fn new(walker: Walker) -> Self {
        Self { walker }
    }

    pub(crate) fn run(mut self) {
        let id = self.walker.id();
        debug!(traveler = %id, cell = %self.walker.at(), "traveler started");
        match self.walk() {
            Ok(()) => debug!(traveler = %id, "traveler ended"),
            Err(e) => debug!(traveler = %id, error = %e, "traveler stopped"),
        }
    }

    fn walk(&mut self) -> Result<(), GridError> {
        let move_probability = self.walker.grid().config.move_probability;
        loop {
            if !self.walker.sleep_tick() {
                return Err(GridError::Shutdown);
            }
            if !self.walker.roll(move_probability) {
                continue;
            }
            let Some(dest) = self.walker.random_neighbour() else {
                continue;
            };
            if self.walker.step_to(dest, true)? == MoveOutcome::Terminated {
                return Ok(());
            }
        }
    }
}
