//! Cell actor thread: mailbox dispatch, idle tick, and traveler spawning.
//!
//! The actor owns one [`Cell`] and is its only mutator. It blocks on
//! three things at once: the next envelope, the shutdown signal, and the
//! idle tick that fires after a full interval with no envelope.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{select, unbounded, Receiver};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};
use wayfare_core::{Coord, TravelerId, TravelerKind};

use crate::cell::Cell;
use crate::feral::FeralTraveler;
use crate::grid::{traveler_stream, SharedGrid};
use crate::lifecycle::TaskToken;
use crate::mailbox::Envelope;
use crate::traveler::{Traveler, Walker};

pub(crate) struct CellActor {
    cell: Cell,
    grid: Arc<SharedGrid>,
    rng: ChaCha8Rng,
    token: TaskToken,
}

impl CellActor {
    pub(crate) fn new(grid: Arc<SharedGrid>, coord: Coord, token: TaskToken, stream: u64) -> Self {
        let rng = grid.task_rng(stream);
        Self {
            cell: Cell::new(coord),
            grid,
            rng,
            token,
        }
    }

    /// Serve the mailbox until shutdown.
    ///
    /// The idle tick fires once a full interval passes without a traveler
    /// request or spawn. Camera and `Inspect` envelopes never change
    /// occupancy and do not postpone it.
    pub(crate) fn run(mut self, mailbox: Receiver<Envelope>) {
        let shutdown = self.grid.shutdown.receiver().clone();
        let tick = self.grid.config.tick_interval;
        let mut next_tick = Instant::now() + tick;
        loop {
            let idle_for = next_tick.saturating_duration_since(Instant::now());
            select! {
                recv(mailbox) -> msg => match msg {
                    Ok(envelope) => {
                        if envelope.postpones_tick() {
                            next_tick = Instant::now() + tick;
                        }
                        self.dispatch(envelope);
                    }
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
                default(idle_for) => {
                    self.idle_tick();
                    next_tick = Instant::now() + tick;
                }
            }
        }
        trace!(cell = %self.cell.coord(), "cell stopped");
    }

    fn dispatch(&mut self, envelope: Envelope) {
        // A dropped reply means the requester is gone; nothing to do.
        match envelope {
            Envelope::Traveler { request, reply } => {
                let verdict = self.cell.handle(request, &self.grid.issuer);
                let _ = reply.send(verdict);
            }
            Envelope::CameraBlock { reply } => {
                let _ = reply.send(self.cell.camera_block());
            }
            Envelope::CameraRelease { reply } => {
                let _ = reply.send(self.cell.camera_release());
            }
            Envelope::Inspect { reply } => {
                let _ = reply.send(self.cell.report());
            }
            Envelope::Spawn { kind, reply } => {
                let id = self.spawn(kind);
                let _ = reply.send(id);
            }
        }
    }

    /// Count down the hazard, then roll at most one of: ordinary spawn,
    /// feral spawn, new hazard. A winning spawn roll ends the tick even
    /// when no id is left.
    fn idle_tick(&mut self) {
        if !self.cell.idle_tick() {
            return;
        }
        let config = &self.grid.config;
        let (spawn_p, feral_p, hazard_p) = (
            config.spawn_probability,
            config.feral_probability,
            config.hazard_probability,
        );
        let duration = config.hazard_duration;

        if self.rng.gen_bool(spawn_p) {
            self.spawn(TravelerKind::Ordinary);
        } else if self.rng.gen_bool(feral_p) {
            self.spawn(TravelerKind::Feral);
        } else if self.rng.gen_bool(hazard_p) {
            self.cell.ignite(duration);
        }
    }

    /// Issue an id, settle it here and start its task.
    fn spawn(&mut self, kind: TravelerKind) -> Option<TravelerId> {
        if !self.cell.can_host() {
            return None;
        }
        let spawned = match kind {
            TravelerKind::Ordinary => {
                let id = self.grid.issuer.issue_ordinary()?;
                self.cell.settle(id);
                let walker = self.walker(id);
                let traveler = Traveler::new(walker);
                self.launch(id, move || traveler.run())
            }
            TravelerKind::Feral => {
                let (notices_tx, notices) = unbounded();
                let id = self.grid.issuer.issue_feral(notices_tx)?;
                self.cell.settle(id);
                let walker = self.walker(id);
                let feral = FeralTraveler::new(walker, notices, self.grid.config.feral_health);
                let launched = self.launch(id, move || feral.run());
                if launched.is_none() {
                    self.grid.issuer.retire(id);
                }
                launched
            }
        };
        if let Some(id) = spawned {
            debug!(traveler = %id, cell = %self.cell.coord(), "spawned");
        }
        spawned
    }

    fn walker(&self, id: TravelerId) -> Walker {
        Walker::new(
            Arc::clone(&self.grid),
            id,
            self.cell.coord(),
            self.grid.task_rng(traveler_stream(id)),
            self.token.clone(),
        )
    }

    /// Start a traveler thread, undoing the settle if the OS refuses.
    fn launch(
        &mut self,
        id: TravelerId,
        body: impl FnOnce() + Send + 'static,
    ) -> Option<TravelerId> {
        match thread::Builder::new().name(format!("wayfare-{id}")).spawn(body) {
            Ok(_) => Some(id),
            Err(e) => {
                warn!(
                    traveler = %id,
                    cell = %self.cell.coord(),
                    error = %e,
                    "traveler thread spawn failed"
                );
                self.cell.evict_unstarted(id);
                None
            }
        }
    }
}
