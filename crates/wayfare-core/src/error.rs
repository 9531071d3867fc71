//! Error types shared across the wayfare workspace.

use std::error::Error;
use std::fmt;

use crate::coord::Coord;

/// A coordinate fell outside the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundsError {
    /// The offending coordinate.
    pub coord: Coord,
    /// Grid width at the time of the check.
    pub width: u32,
    /// Grid height at the time of the check.
    pub height: u32,
}

impl fmt::Display for BoundsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "coordinate {} out of bounds: [0, {}) x [0, {})",
            self.coord, self.width, self.height
        )
    }
}

impl Error for BoundsError {}
