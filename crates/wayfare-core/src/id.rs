//! Strongly-typed traveler identifiers.

use std::fmt;

/// Which of the two identifier ranges a traveler was issued from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TravelerKind {
    /// Bounded, never-recycled range. Takes priority in evictions.
    Ordinary,
    /// Wrapping range above the ordinary capacity. Finite health.
    Feral,
}

/// Identifies a live traveler.
///
/// The numeric value is what the issuer handed out: ordinary ids are
/// `0..capacity`, feral ids are `capacity..capacity + 100`. The kind is
/// carried alongside the number so a cell can tell the two apart
/// without knowing the configured capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TravelerId {
    /// An ordinary traveler.
    Ordinary(u16),
    /// A feral traveler.
    Feral(u16),
}

impl TravelerId {
    /// The issued number.
    pub fn number(self) -> u16 {
        match self {
            Self::Ordinary(n) | Self::Feral(n) => n,
        }
    }

    /// Which range this id came from.
    pub fn kind(self) -> TravelerKind {
        match self {
            Self::Ordinary(_) => TravelerKind::Ordinary,
            Self::Feral(_) => TravelerKind::Feral,
        }
    }

    /// Shorthand for `kind() == TravelerKind::Feral`.
    pub fn is_feral(self) -> bool {
        matches!(self, Self::Feral(_))
    }
}

impl fmt::Display for TravelerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinary(n) => write!(f, "T{n}"),
            Self::Feral(n) => write!(f, "WT{n}"),
        }
    }
}
