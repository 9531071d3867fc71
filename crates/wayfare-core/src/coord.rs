//! Grid coordinates, cardinal directions, and bounds checks.

use smallvec::SmallVec;
use std::fmt;

use crate::error::BoundsError;

/// A cell position on the grid.
///
/// `x` grows to the right (columns), `y` grows downward (rows), so
/// `(0, 0)` is the top-left cell of every rendered picture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    /// Column index.
    pub x: i32,
    /// Row index.
    pub y: i32,
}

impl Coord {
    /// Create a coordinate. No bounds check; see [`Bounds::check`].
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The coordinate one step away in `dir`, which may be off-grid.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// True if `self` sits one column left of `other` on the same row.
    ///
    /// The shared edge is the one the renderer draws as `--` to the
    /// right of `self`.
    pub fn is_left_of(self, other: Coord) -> bool {
        self.y == other.y && self.x == other.x - 1
    }

    /// True if `self` sits one row above `other` in the same column.
    pub fn is_above(self, other: Coord) -> bool {
        self.x == other.x && self.y == other.y - 1
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// One of the four cardinal moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// x - 1.
    West,
    /// x + 1.
    East,
    /// y - 1.
    North,
    /// y + 1.
    South,
}

impl Direction {
    /// All directions, in the order feral travelers try them when evicted.
    pub const ALL: [Direction; 4] = [
        Direction::West,
        Direction::East,
        Direction::North,
        Direction::South,
    ];

    /// Returns the `(dx, dy)` offset for this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::West => (-1, 0),
            Direction::East => (1, 0),
            Direction::North => (0, -1),
            Direction::South => (0, 1),
        }
    }
}

/// Width and height of a grid, with row-major indexing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    width: u32,
    height: u32,
}

impl Bounds {
    /// Create bounds for a `width x height` grid.
    ///
    /// Zero-sized grids are representable here; the engine config
    /// rejects them before any cell is created.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of columns.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether `c` lies on the grid.
    pub fn contains(&self, c: Coord) -> bool {
        c.x >= 0
            && c.y >= 0
            && (c.x as i64) < self.width as i64
            && (c.y as i64) < self.height as i64
    }

    /// Validate `c`, returning it unchanged when in bounds.
    pub fn check(&self, c: Coord) -> Result<Coord, BoundsError> {
        if self.contains(c) {
            Ok(c)
        } else {
            Err(BoundsError {
                coord: c,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Row-major index of `c`.
    pub fn index(&self, c: Coord) -> Result<usize, BoundsError> {
        let c = self.check(c)?;
        Ok(c.y as usize * self.width as usize + c.x as usize)
    }

    /// Coordinate for a row-major index. Inverse of [`index`](Self::index).
    pub fn coord_at(&self, index: usize) -> Coord {
        let w = self.width.max(1) as usize;
        Coord::new((index % w) as i32, (index / w) as i32)
    }

    /// In-bounds neighbours of `c` in [`Direction::ALL`] order.
    pub fn neighbours(&self, c: Coord) -> SmallVec<[Coord; 4]> {
        Direction::ALL
            .iter()
            .map(|&d| c.step(d))
            .filter(|&n| self.contains(n))
            .collect()
    }

    /// Row-major iteration over every coordinate.
    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.cell_count()).map(move |i| self.coord_at(i))
    }
}
