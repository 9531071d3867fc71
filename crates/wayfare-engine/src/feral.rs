//! Feral traveler task.
//!
//! A feral traveler never moves on its own. Each tick it checks its
//! notice mailbox: a notice for its own cell means an ordinary traveler
//! wants in, and it tries to step aside; a notice for any other cell is
//! left over from before a move and is cleared. A tick with no notice
//! costs one health point.

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, trace};
use wayfare_core::{Coord, Direction};

use crate::grid::GridError;
use crate::traveler::{MoveOutcome, Walker};

pub(crate) struct FeralTraveler {
    walker: Walker,
    notices: Receiver<Coord>,
    health: u32,
}

/// Why a feral task ended normally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ending {
    Exhausted,
    Hazard,
    Unregistered,
}

impl FeralTraveler {
    pub(crate) fn new(walker: Walker, notices: Receiver<Coord>, health: u32) -> Self {
        Self {
            walker,
            notices,
            health,
        }
    }

    pub(crate) fn run(mut self) {
        let id = self.walker.id();
        debug!(traveler = %id, cell = %self.walker.at(), health = self.health, "feral started");
        match self.live() {
            Ok(ending) => debug!(traveler = %id, ?ending, "feral ended"),
            Err(e) => debug!(traveler = %id, error = %e, "feral stopped"),
        }
        self.walker.grid().issuer.retire(id);
    }

    fn live(&mut self) -> Result<Ending, GridError> {
        loop {
            if !self.walker.sleep_tick() {
                return Err(GridError::Shutdown);
            }
            match self.notices.try_recv() {
                Ok(cell) if cell != self.walker.at() => {
                    let verdict = self.walker.unlock(cell)?;
                    trace!(traveler = %self.walker.id(), %cell, %verdict, "stale notice cleared");
                }
                Ok(_) => {
                    if self.step_aside()? == MoveOutcome::Terminated {
                        return Ok(Ending::Hazard);
                    }
                }
                Err(TryRecvError::Empty) => {
                    self.health = self.health.saturating_sub(1);
                    if self.health == 0 {
                        self.walker.vacate()?;
                        return Ok(Ending::Exhausted);
                    }
                }
                Err(TryRecvError::Disconnected) => return Ok(Ending::Unregistered),
            }
        }
    }

    /// Try each neighbour once, West, East, North, South. If none
    /// accepts, decline the eviction and stay.
    fn step_aside(&mut self) -> Result<MoveOutcome, GridError> {
        let here = self.walker.at();
        debug!(traveler = %self.walker.id(), cell = %here, "eviction notice");
        for dir in Direction::ALL {
            let dest = here.step(dir);
            if !self.walker.grid().bounds.contains(dest) {
                continue;
            }
            match self.walker.step_to(dest, false)? {
                MoveOutcome::Refused => continue,
                outcome => return Ok(outcome),
            }
        }
        let verdict = self.walker.unlock(here)?;
        debug!(traveler = %self.walker.id(), cell = %here, %verdict, "eviction declined");
        Ok(MoveOutcome::Refused)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wayfare_core::{Occupancy, TravelerId, TravelerKind, Verdict};
    use wayfare_test_utils::{c, wait_until};

    use crate::config::GridConfig;
    use crate::grid::Grid;

    fn still(width: u32, height: u32) -> GridConfig {
        GridConfig {
            width,
            height,
            max_travelers: 1,
            spawn_probability: 0.0,
            move_probability: 0.0,
            feral_probability: 0.0,
            hazard_probability: 0.0,
            tick_interval: Duration::from_millis(2),
            camera_interval: None,
            feral_health: 10_000,
            seed: Some(5),
            ..GridConfig::default()
        }
    }

    #[test]
    fn health_runs_out_and_cell_is_freed() {
        let cfg = GridConfig {
            feral_health: 3,
            ..still(1, 1)
        };
        let grid = Grid::start(cfg).unwrap();
        let id = grid.spawn_at(c(0, 0), TravelerKind::Feral).unwrap().unwrap();
        assert!(id.is_feral());
        assert!(wait_until(Duration::from_secs(5), || !grid.is_feral_registered(id)));
        assert!(wait_until(Duration::from_secs(5), || {
            grid.inspect(c(0, 0)).unwrap().occupancy == Occupancy::Available
        }));
    }

    #[test]
    fn notice_for_own_cell_moves_feral_west_first() {
        let grid = Grid::start(still(3, 1)).unwrap();
        let feral = grid.spawn_at(c(1, 0), TravelerKind::Feral).unwrap().unwrap();

        // An ordinary reservation against the feral's cell posts the notice.
        let cell = grid.cell(c(1, 0)).unwrap();
        let asker = TravelerId::Ordinary(0);
        assert_eq!(cell.reserve(asker, c(2, 0)).unwrap(), Verdict::Suspended);

        assert!(wait_until(Duration::from_secs(5), || {
            grid.inspect(c(0, 0)).unwrap().occupancy == Occupancy::Occupied(feral)
        }));
        // Departure cleared the pending eviction and freed the cell.
        let report = grid.inspect(c(1, 0)).unwrap();
        assert_eq!(report.occupancy, Occupancy::Available);
        assert!(!report.awaiting_eviction);
    }

    #[test]
    fn notice_left_behind_after_a_move_is_cleared() {
        // Slow ticks so both notices are queued before the feral reads one.
        let cfg = GridConfig {
            tick_interval: Duration::from_millis(100),
            ..still(3, 1)
        };
        let grid = Grid::start(cfg).unwrap();
        let feral = grid.spawn_at(c(1, 0), TravelerKind::Feral).unwrap().unwrap();

        let cell = grid.cell(c(1, 0)).unwrap();
        let asker = TravelerId::Ordinary(0);
        assert_eq!(cell.reserve(asker, c(2, 0)).unwrap(), Verdict::Suspended);
        assert_eq!(cell.unlock(feral).unwrap(), Verdict::Accepted);
        assert_eq!(cell.reserve(asker, c(2, 0)).unwrap(), Verdict::Suspended);

        // First notice: step west. Second notice names the old cell.
        assert!(wait_until(Duration::from_secs(5), || {
            grid.inspect(c(0, 0)).unwrap().occupancy == Occupancy::Occupied(feral)
        }));
        std::thread::sleep(Duration::from_millis(350));

        let old = grid.inspect(c(1, 0)).unwrap();
        assert_eq!(old.occupancy, Occupancy::Available);
        assert!(!old.awaiting_eviction);
        assert_eq!(
            grid.inspect(c(0, 0)).unwrap().occupancy,
            Occupancy::Occupied(feral)
        );
        assert!(grid.is_feral_registered(feral));
    }

    #[test]
    fn eviction_into_hazard_ends_feral() {
        let cfg = GridConfig {
            hazard_probability: 1.0,
            hazard_duration: 1_000_000,
            tick_interval: Duration::from_millis(20),
            ..still(2, 1)
        };
        let grid = Grid::start(cfg).unwrap();
        let feral = grid.spawn_at(c(1, 0), TravelerKind::Feral).unwrap().unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            grid.inspect(c(0, 0)).unwrap().hazard.is_some()
        }));

        // The only way aside is west, into the hazard.
        let cell = grid.cell(c(1, 0)).unwrap();
        assert_eq!(
            cell.reserve(TravelerId::Ordinary(0), c(2, 0)).unwrap(),
            Verdict::Suspended
        );

        assert!(wait_until(Duration::from_secs(5), || !grid.is_feral_registered(feral)));
        for p in [c(0, 0), c(1, 0)] {
            let report = grid.inspect(p).unwrap();
            assert_eq!(report.occupancy, Occupancy::Available, "{p}");
            assert!(!report.awaiting_eviction, "{p}");
        }
    }

    #[test]
    fn cornered_feral_declines_and_survives() {
        let grid = Grid::start(still(2, 1)).unwrap();
        let feral = grid.spawn_at(c(0, 0), TravelerKind::Feral).unwrap().unwrap();
        let blocker = grid.spawn_at(c(1, 0), TravelerKind::Ordinary).unwrap().unwrap();

        let cell = grid.cell(c(0, 0)).unwrap();
        assert_eq!(
            cell.reserve(blocker, c(1, 0)).unwrap(),
            Verdict::Suspended
        );
        // The only neighbour is occupied, so the feral unlocks its cell.
        assert!(wait_until(Duration::from_secs(5), || {
            !grid.inspect(c(0, 0)).unwrap().awaiting_eviction
        }));
        assert_eq!(
            grid.inspect(c(0, 0)).unwrap().occupancy,
            Occupancy::Occupied(feral)
        );
        assert!(grid.is_feral_registered(feral));
    }

    #[test]
    fn feral_ids_are_distinct_while_alive() {
        let cfg = GridConfig {
            max_travelers: 2,
            ..still(3, 3)
        };
        let grid = Grid::start(cfg).unwrap();
        let ids: Vec<_> = grid
            .bounds()
            .iter()
            .filter_map(|p| grid.spawn_at(p, TravelerKind::Feral).unwrap())
            .collect();
        assert_eq!(ids.len(), 9);
        let mut numbers: Vec<_> = ids.iter().map(|id| id.number()).collect();
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers.len(), 9);
        assert!(numbers.iter().all(|&n| (2..102).contains(&n)));
    }
}
