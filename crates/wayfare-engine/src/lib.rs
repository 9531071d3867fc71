//! Actor engine for the wayfare traveler grid.
//!
//! Every grid cell runs as its own thread and serializes all access to
//! its occupancy through a mailbox. Travelers are threads too, spawned by
//! the cells on their idle tick, and move by running a reserve / release /
//! assign / release handshake against two cells. A single issuer thread
//! hands out traveler ids and relays eviction notices to feral travelers,
//! and a camera thread periodically photographs the grid row by row.
//!
//! [`Grid`] is the entry point: start it from a [`GridConfig`], read
//! [`Frame`]s or photograph rows on demand, and shut it down.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod backoff;
pub mod cell;
pub mod config;
pub mod grid;
pub mod issuer;
pub mod lifecycle;
pub mod mailbox;
pub mod render;

mod camera;
mod cell_thread;
mod feral;
mod traveler;

pub use cell::{Cell, Hazard};
pub use config::{BackoffConfig, ConfigError, GridConfig};
pub use grid::{Grid, GridError, ShutdownReport};
pub use issuer::{IdLedger, IssuerHandle};
pub use mailbox::CellHandle;
pub use render::{Frame, RowPicture};
