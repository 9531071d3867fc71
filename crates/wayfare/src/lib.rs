//! Wayfare: travelers wandering a grid of cell actors.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the wayfare sub-crates. For most users, adding `wayfare` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use wayfare::prelude::*;
//!
//! let config = GridConfig {
//!     width: 3,
//!     height: 2,
//!     max_travelers: 2,
//!     tick_interval: Duration::from_millis(5),
//!     camera_interval: None,
//!     ..GridConfig::default()
//! };
//! let mut grid = Grid::start(config).unwrap();
//! grid.spawn_at(Coord::new(0, 0), TravelerKind::Ordinary).unwrap();
//! for y in 0..grid.bounds().height() {
//!     print!("{}", grid.render_row(y).unwrap());
//! }
//! assert!(grid.shutdown().tasks_stopped);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `wayfare-core` | Coordinates, ids, protocol vocabulary |
//! | [`engine`] | `wayfare-engine` | Grid, cell actors, issuer, camera |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Coordinates, traveler ids, and the cell protocol (`wayfare-core`).
///
/// The [`types::EvictionNotifier`] trait is the seam between a cell and
/// whatever delivers notices to feral travelers.
pub use wayfare_core as types;

/// The running grid and its actors (`wayfare-engine`).
///
/// [`engine::Grid`] starts everything from an [`engine::GridConfig`].
pub use wayfare_engine as engine;

/// Common imports for typical wayfare usage.
///
/// ```rust
/// use wayfare::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use wayfare_core::{
        Bounds, CellSnapshot, Coord, Direction, Occupancy, TravelerId, TravelerKind, Verdict,
    };

    // Errors
    pub use wayfare_core::BoundsError;
    pub use wayfare_engine::{ConfigError, GridError};

    // Engine
    pub use wayfare_engine::{BackoffConfig, Frame, Grid, GridConfig, RowPicture, ShutdownReport};
}
