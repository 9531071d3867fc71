//! Row-by-row grid photography.
//!
//! A row is captured by locking every cell in it, left to right, and
//! releasing them all once the last one is read. A cell in the middle of
//! a move refuses the lock. Holding the rest of the row while waiting on
//! it could stall the very traveler that has to finish the move, so the
//! camera lets go of the row, backs off and starts the row again.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, trace};
use wayfare_core::Verdict;

use crate::backoff::RetryBackoff;
use crate::grid::{GridError, SharedGrid};
use crate::lifecycle::TaskToken;
use crate::mailbox::CellHandle;
use crate::render::{Frame, RowPicture};

/// Capture row `y` under a single lock of all its cells.
///
/// Edge markers read during an abandoned attempt are carried into the
/// final picture, since each read consumes them.
pub(crate) fn photograph_row(
    grid: &SharedGrid,
    y: u32,
    backoff: &mut RetryBackoff,
) -> Result<RowPicture, GridError> {
    let _gate = grid.camera_gate();
    let row = grid.row(y)?;
    let mut carried = vec![(false, false); row.len()];
    backoff.reset();

    'attempt: loop {
        let mut snapshots = Vec::with_capacity(row.len());
        for (x, cell) in row.iter().enumerate() {
            match cell.camera_block()? {
                Some(mut snapshot) => {
                    snapshot.horizontal_edge |= carried[x].0;
                    snapshot.vertical_edge |= carried[x].1;
                    carried[x] = (snapshot.horizontal_edge, snapshot.vertical_edge);
                    snapshots.push(snapshot);
                }
                None => {
                    trace!(row = y, column = x, "cell busy, retrying row");
                    release_all(&row[..x], grid, backoff)?;
                    if !backoff.wait(&grid.shutdown) {
                        return Err(GridError::Shutdown);
                    }
                    continue 'attempt;
                }
            }
        }
        release_all(row, grid, backoff)?;
        return Ok(RowPicture::new(snapshots));
    }
}

fn release_all(
    cells: &[CellHandle],
    grid: &SharedGrid,
    backoff: &mut RetryBackoff,
) -> Result<(), GridError> {
    for cell in cells {
        while cell.camera_release()? != Verdict::Accepted {
            if !backoff.wait(&grid.shutdown) {
                return Err(GridError::Shutdown);
            }
        }
    }
    Ok(())
}

/// Background camera: one frame per interval.
pub(crate) struct Camera {
    grid: Arc<SharedGrid>,
    interval: Duration,
    frames: Sender<Frame>,
    taken: u64,
    _token: TaskToken,
}

impl Camera {
    pub(crate) fn new(
        grid: Arc<SharedGrid>,
        interval: Duration,
        frames: Sender<Frame>,
        token: TaskToken,
    ) -> Self {
        Self {
            grid,
            interval,
            frames,
            taken: 0,
            _token: token,
        }
    }

    pub(crate) fn run(mut self) {
        let mut backoff = self.grid.backoff();
        while self.grid.shutdown.sleep(self.interval) {
            let rows: Result<Vec<_>, _> = (0..self.grid.bounds.height())
                .map(|y| photograph_row(&self.grid, y, &mut backoff))
                .collect();
            let Ok(rows) = rows else {
                break;
            };
            self.taken += 1;
            let frame = Frame {
                number: self.taken,
                rows,
            };
            match self.frames.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => {
                    trace!(number = frame.number, "frame buffer full, dropping picture");
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        debug!(pictures = self.taken, "camera stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use wayfare_core::{TravelerId, TravelerKind};
    use wayfare_test_utils::c;

    use crate::config::GridConfig;
    use crate::grid::Grid;

    fn quiet(width: u32, height: u32) -> GridConfig {
        GridConfig {
            width,
            height,
            max_travelers: 1,
            spawn_probability: 0.0,
            move_probability: 0.0,
            feral_probability: 0.0,
            hazard_probability: 0.0,
            tick_interval: Duration::from_millis(5),
            camera_interval: None,
            seed: Some(9),
            ..GridConfig::default()
        }
    }

    #[test]
    fn row_capture_leaves_cells_unlocked() {
        let grid = Grid::start(quiet(3, 2)).unwrap();
        grid.photograph_row(1).unwrap();
        for p in grid.bounds().iter() {
            assert!(!grid.inspect(p).unwrap().camera_locked, "{p} still locked");
        }
    }

    #[test]
    fn busy_cell_releases_row_and_retries() {
        let grid = Grid::start(quiet(3, 1)).unwrap();
        // Park a half-done move on the last cell of the row.
        let cell = grid.cell(c(2, 0)).unwrap();
        let id = TravelerId::Ordinary(0);
        assert_eq!(cell.reserve(id, c(1, 0)).unwrap(), Verdict::Accepted);

        thread::scope(|s| {
            let picture = s.spawn(|| grid.photograph_row(0));
            // While the camera is retrying, the leading cells are not held.
            assert!(wayfare_test_utils::wait_until(Duration::from_secs(5), || {
                !grid.inspect(c(0, 0)).unwrap().camera_locked
            }));
            assert_eq!(cell.release(id, c(1, 0)).unwrap(), Verdict::Accepted);
            let row = picture.join().unwrap().unwrap();
            assert_eq!(row.cells().len(), 3);
        });
    }

    #[test]
    fn edges_survive_an_abandoned_attempt() {
        let grid = Grid::start(quiet(3, 1)).unwrap();
        let mover = TravelerId::Ordinary(0);
        let a = grid.cell(c(0, 0)).unwrap();
        let b = grid.cell(c(1, 0)).unwrap();

        // Arrive at (0,0) from the right: its right edge is marked.
        assert_eq!(a.reserve(mover, c(1, 0)).unwrap(), Verdict::Accepted);
        assert_eq!(a.assign(mover, c(1, 0)).unwrap(), Verdict::Accepted);
        // Leave (1,0) half-reserved so the first attempt is abandoned
        // after (0,0) has already been read.
        let other = TravelerId::Ordinary(1);
        assert_eq!(b.reserve(other, c(2, 0)).unwrap(), Verdict::Accepted);

        thread::scope(|s| {
            let picture = s.spawn(|| grid.photograph_row(0));
            thread::sleep(Duration::from_millis(20));
            assert_eq!(b.release(other, c(2, 0)).unwrap(), Verdict::Accepted);
            let row = picture.join().unwrap().unwrap();
            assert!(row.cells()[0].horizontal_edge);
            assert_eq!(row.cells()[0].occupant, Some(mover));
        });
    }

    #[test]
    fn background_camera_sees_spawned_traveler() {
        let cfg = GridConfig {
            camera_interval: Some(Duration::from_millis(5)),
            ..quiet(2, 1)
        };
        let grid = Grid::start(cfg).unwrap();
        let id = grid.spawn_at(c(1, 0), TravelerKind::Ordinary).unwrap().unwrap();
        let seen = (0..200).any(|_| {
            grid.frames()
                .recv_timeout(Duration::from_secs(5))
                .map(|f| f.rows[0].occupants().any(|o| o == id))
                .unwrap_or(false)
        });
        assert!(seen);
    }
}
