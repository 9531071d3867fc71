//! Text rendering of camera snapshots.
//!
//! Each cell takes a 4-character occupant field followed by a
//! 2-character field for the edge to its right. Below every row, a line
//! of 6-character fields marks the edges crossed vertically.

use std::fmt;

use wayfare_core::{CellSnapshot, TravelerId};

const EMPTY: &str = "[  ]";
const FERAL: &str = "[**]";
const HAZARD: &str = "[##]";
const HORIZONTAL_EDGE: &str = "--";
const VERTICAL_EDGE: &str = " || ";
const NO_VERTICAL_EDGE: &str = "    ";
const NO_EDGE: &str = "  ";

/// Snapshots of one row, captured under a single camera lock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowPicture {
    cells: Vec<CellSnapshot>,
}

impl RowPicture {
    /// Wrap snapshots listed left to right.
    pub fn new(cells: Vec<CellSnapshot>) -> Self {
        Self { cells }
    }

    /// Snapshots, left to right.
    pub fn cells(&self) -> &[CellSnapshot] {
        &self.cells
    }

    /// Ids of every traveler visible in this row.
    pub fn occupants(&self) -> impl Iterator<Item = TravelerId> + '_ {
        self.cells.iter().filter_map(|s| s.occupant)
    }
}

fn write_occupant(f: &mut fmt::Formatter<'_>, snapshot: &CellSnapshot) -> fmt::Result {
    if snapshot.hazard {
        return f.write_str(HAZARD);
    }
    match snapshot.occupant {
        None => f.write_str(EMPTY),
        Some(TravelerId::Feral(_)) => f.write_str(FERAL),
        Some(TravelerId::Ordinary(n)) => write!(f, "[{n:02}]"),
    }
}

impl fmt::Display for RowPicture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for snapshot in &self.cells {
            write_occupant(f, snapshot)?;
            f.write_str(if snapshot.horizontal_edge {
                HORIZONTAL_EDGE
            } else {
                NO_EDGE
            })?;
        }
        writeln!(f)?;
        for snapshot in &self.cells {
            f.write_str(if snapshot.vertical_edge {
                VERTICAL_EDGE
            } else {
                NO_VERTICAL_EDGE
            })?;
            f.write_str(NO_EDGE)?;
        }
        writeln!(f)
    }
}

/// One numbered camera picture: every row, top to bottom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Picture number, starting at 1.
    pub number: u64,
    /// Rows, top to bottom.
    pub rows: Vec<RowPicture>,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Picture: {}", self.number)?;
        for row in &self.rows {
            write!(f, "{row}")?;
        }
        Ok(())
    }
}
