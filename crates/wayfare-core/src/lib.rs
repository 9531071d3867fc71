//! Core types for the wayfare traveler grid.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! value types every other crate speaks: coordinates and bounds, traveler
//! identifiers, the cell protocol vocabulary, and the notifier seam used
//! by cells to reach feral travelers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod coord;
pub mod error;
pub mod id;
pub mod protocol;
pub mod traits;

pub use coord::{Bounds, Coord, Direction};
pub use error::BoundsError;
pub use id::{TravelerId, TravelerKind};
pub use protocol::{CellReport, CellSnapshot, Occupancy, TravelerRequest, Verdict};
pub use traits::EvictionNotifier;
