//! The running grid: cell actors, issuer, camera, and their lifecycle.
//!
//! [`Grid::start`] validates a [`GridConfig`], spawns one thread per
//! cell plus the issuer and (optionally) the camera, and returns a
//! handle. Travelers are spawned later by the cells themselves.
//!
//! # Shutdown
//!
//! Every task observes one shared [`ShutdownSignal`]. [`Grid::shutdown`]
//! drops its trigger and then waits for every task's [`TaskToken`] to be
//! released. Dropping a `Grid` does the same.
//!
//! [`ShutdownSignal`]: crate::lifecycle::ShutdownSignal
//! [`TaskToken`]: crate::lifecycle::TaskToken

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use wayfare_core::{Bounds, BoundsError, CellReport, Coord, TravelerId, TravelerKind};

use crate::backoff::RetryBackoff;
use crate::camera::{self, Camera};
use crate::cell_thread::CellActor;
use crate::config::{ConfigError, GridConfig};
use crate::issuer::{issuer_channel, run_issuer, IdLedger, IssuerHandle, IssuerRequest};
use crate::lifecycle::{
    shutdown_pair, task_tracker, ShutdownSignal, ShutdownTrigger, TaskToken, TaskTracker,
};
use crate::mailbox::{CellHandle, Envelope, CELL_MAILBOX_CAPACITY};
use crate::render::{Frame, RowPicture};

/// Frames buffered for [`Grid::frames`] before the camera starts dropping them.
const FRAME_BUFFER: usize = 64;

/// How long [`Grid::shutdown`] waits for tasks to stop.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ── GridError ──────────────────────────────────────────────────────

/// Errors from operations against a running grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridError {
    /// The coordinate or row is not on the grid.
    OutOfBounds(BoundsError),
    /// A mailbox is disconnected; the grid is shutting down.
    Shutdown,
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds(e) => write!(f, "{e}"),
            Self::Shutdown => write!(f, "grid is shut down"),
        }
    }
}

impl Error for GridError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OutOfBounds(e) => Some(e),
            Self::Shutdown => None,
        }
    }
}

impl From<BoundsError> for GridError {
    fn from(e: BoundsError) -> Self {
        Self::OutOfBounds(e)
    }
}

// ── ShutdownReport ─────────────────────────────────────────────────

/// Report from [`Grid::shutdown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Total time spent in the shutdown sequence.
    pub total_ms: u64,
    /// Whether every task stopped within the shutdown budget.
    pub tasks_stopped: bool,
}

// ── SharedGrid ─────────────────────────────────────────────────────

/// Everything a task needs to reach the rest of the grid.
pub(crate) struct SharedGrid {
    pub(crate) bounds: Bounds,
    pub(crate) cells: Vec<CellHandle>,
    pub(crate) issuer: IssuerHandle,
    pub(crate) config: GridConfig,
    pub(crate) shutdown: ShutdownSignal,
    /// Serializes row captures so two cameras never unlock each other's rows.
    camera_gate: Mutex<()>,
}

impl SharedGrid {
    pub(crate) fn cell(&self, coord: Coord) -> Result<&CellHandle, GridError> {
        let index = self.bounds.index(coord)?;
        Ok(&self.cells[index])
    }

    /// Handles for every cell of row `y`, left to right.
    pub(crate) fn row(&self, y: u32) -> Result<&[CellHandle], GridError> {
        self.bounds.check(Coord::new(0, y as i32))?;
        let width = self.bounds.width() as usize;
        let start = y as usize * width;
        Ok(&self.cells[start..start + width])
    }

    pub(crate) fn backoff(&self) -> RetryBackoff {
        RetryBackoff::new(&self.config.backoff)
    }

    pub(crate) fn camera_gate(&self) -> MutexGuard<'_, ()> {
        self.camera_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// A per-task RNG. With a configured seed every task gets its own
    /// reproducible stream; otherwise the seed comes from entropy.
    pub(crate) fn task_rng(&self, stream: u64) -> ChaCha8Rng {
        match self.config.seed {
            Some(seed) => {
                ChaCha8Rng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            }
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        }
    }
}

/// RNG stream of the cell at `index`.
pub(crate) fn cell_stream(index: usize) -> u64 {
    index as u64
}

/// RNG stream of the traveler `id`. Disjoint from every cell stream.
pub(crate) fn traveler_stream(id: TravelerId) -> u64 {
    let kind = match id.kind() {
        TravelerKind::Ordinary => 1,
        TravelerKind::Feral => 2,
    };
    (kind << 32) | u64::from(id.number())
}

/// Spawn the issuer, one actor per cell, and the camera if configured.
fn spawn_tasks(
    shared: &Arc<SharedGrid>,
    token: TaskToken,
    ledger: IdLedger,
    issuer_rx: Receiver<IssuerRequest>,
    mailboxes: Vec<Receiver<Envelope>>,
    frames: Sender<Frame>,
) -> Result<(), ConfigError> {
    let signal = shared.shutdown.clone();
    let issuer_token = token.clone();
    thread::Builder::new()
        .name("wayfare-issuer".into())
        .spawn(move || run_issuer(ledger, issuer_rx, signal, issuer_token))
        .map_err(|e| ConfigError::ThreadSpawnFailed {
            reason: format!("issuer: {e}"),
        })?;

    for (index, mailbox) in mailboxes.into_iter().enumerate() {
        let coord = shared.bounds.coord_at(index);
        let actor = CellActor::new(
            Arc::clone(shared),
            coord,
            token.clone(),
            cell_stream(index),
        );
        thread::Builder::new()
            .name(format!("wayfare-cell-{}-{}", coord.x, coord.y))
            .spawn(move || actor.run(mailbox))
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: format!("cell {coord}: {e}"),
            })?;
    }

    if let Some(interval) = shared.config.camera_interval {
        let camera = Camera::new(Arc::clone(shared), interval, frames, token);
        thread::Builder::new()
            .name("wayfare-camera".into())
            .spawn(move || camera.run())
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: format!("camera: {e}"),
            })?;
    }
    Ok(())
}

// ── Grid ───────────────────────────────────────────────────────────

/// A running grid.
pub struct Grid {
    shared: Arc<SharedGrid>,
    trigger: Option<ShutdownTrigger>,
    tracker: TaskTracker,
    frames: Receiver<Frame>,
}

impl Grid {
    /// Validate `config` and start every cell, the issuer and the camera.
    pub fn start(config: GridConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let bounds = Bounds::new(config.width, config.height);
        let (trigger, shutdown) = shutdown_pair();
        let (tracker, token) = task_tracker();
        let (issuer, issuer_rx) = issuer_channel();
        let (frames_tx, frames_rx) = bounded(FRAME_BUFFER);

        let mut mailboxes = Vec::with_capacity(bounds.cell_count());
        let cells = bounds
            .iter()
            .map(|coord| {
                let (tx, rx) = bounded(CELL_MAILBOX_CAPACITY);
                mailboxes.push(rx);
                CellHandle::new(coord, tx)
            })
            .collect();

        let ledger = IdLedger::new(config.capacity());
        let shared = Arc::new(SharedGrid {
            bounds,
            cells,
            issuer,
            config,
            shutdown,
            camera_gate: Mutex::new(()),
        });

        let grid = Grid {
            shared: Arc::clone(&shared),
            trigger: Some(trigger),
            tracker,
            frames: frames_rx,
        };
        // On failure `grid` is dropped after the last token, which stops
        // whatever was already spawned.
        spawn_tasks(&shared, token, ledger, issuer_rx, mailboxes, frames_tx)?;

        debug!(
            width = bounds.width(),
            height = bounds.height(),
            capacity = shared.config.max_travelers,
            "grid started"
        );
        Ok(grid)
    }

    /// Grid dimensions.
    pub fn bounds(&self) -> Bounds {
        self.shared.bounds
    }

    /// The configuration the grid was started with.
    pub fn config(&self) -> &GridConfig {
        &self.shared.config
    }

    /// Client handle for the cell at `coord`.
    pub fn cell(&self, coord: Coord) -> Result<&CellHandle, GridError> {
        self.shared.cell(coord)
    }

    /// Informational view of the cell at `coord`.
    pub fn inspect(&self, coord: Coord) -> Result<CellReport, GridError> {
        self.shared.cell(coord)?.inspect()
    }

    /// Spawn a traveler at `coord` through the same path as an idle tick.
    ///
    /// Returns `None` if the cell cannot host it (occupied or hazardous)
    /// or no id is available.
    pub fn spawn_at(
        &self,
        coord: Coord,
        kind: TravelerKind,
    ) -> Result<Option<TravelerId>, GridError> {
        self.shared.cell(coord)?.spawn(kind)
    }

    /// Whether a feral id currently has a registered mailbox.
    pub fn is_feral_registered(&self, id: TravelerId) -> bool {
        self.shared.issuer.is_registered(id)
    }

    /// Capture one row under a single camera lock.
    pub fn photograph_row(&self, y: u32) -> Result<RowPicture, GridError> {
        camera::photograph_row(&self.shared, y, &mut self.shared.backoff())
    }

    /// Capture one row and render it as text.
    pub fn render_row(&self, y: u32) -> Result<String, GridError> {
        Ok(self.photograph_row(y)?.to_string())
    }

    /// Capture every row, top to bottom. Consistency is per row.
    pub fn photograph(&self) -> Result<Vec<RowPicture>, GridError> {
        (0..self.shared.bounds.height())
            .map(|y| self.photograph_row(y))
            .collect()
    }

    /// Frames produced by the background camera, oldest first.
    ///
    /// Frames are dropped while this buffer is full. The channel
    /// disconnects once the camera stops (immediately if none is configured).
    pub fn frames(&self) -> &Receiver<Frame> {
        &self.frames
    }

    /// Whether shutdown has been requested.
    pub fn is_shut_down(&self) -> bool {
        self.trigger.is_none()
    }

    /// Block until every task has ended.
    ///
    /// Without a call to [`shutdown`](Self::shutdown) from another owner
    /// this only returns once every cell has stopped, which a healthy
    /// grid never does.
    pub fn join(&self) {
        self.tracker.wait();
    }

    /// Signal every task to stop and wait for them. Idempotent.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let Some(trigger) = self.trigger.take() else {
            return ShutdownReport {
                total_ms: 0,
                tasks_stopped: self.tracker.is_idle(),
            };
        };

        let start = Instant::now();
        drop(trigger);
        let tasks_stopped = self.tracker.wait_timeout(SHUTDOWN_TIMEOUT);
        let report = ShutdownReport {
            total_ms: start.elapsed().as_millis() as u64,
            tasks_stopped,
        };
        debug!(total_ms = report.total_ms, tasks_stopped, "grid stopped");
        report
    }
}

impl Drop for Grid {
    fn drop(&mut self) {
        if self.trigger.is_some() {
            self.shutdown();
        }
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("bounds", &self.shared.bounds)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
