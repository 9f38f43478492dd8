//! Cardinal directions between adjacent grid nodes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A cardinal direction a node's port fabric may point in.
///
/// [`Direction::ALL`] fixes the iteration order used to resolve `ANY` reads
/// and writes: lower-numbered directions win on simultaneous availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Upward neighbor.
    Up,
    /// Downward neighbor.
    Down,
    /// Leftward neighbor.
    Left,
    /// Rightward neighbor.
    Right,
}

impl Direction {
    /// Every cardinal direction, in the fixed tie-break order used by `ANY`.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// The direction a neighbor would use to refer back to this one.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Parses a cardinal direction token (`UP`, `DOWN`, `LEFT`, `RIGHT`).
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "UP" => Some(Direction::Up),
            "DOWN" => Some(Direction::Down),
            "LEFT" => Some(Direction::Left),
            "RIGHT" => Some(Direction::Right),
            _ => None,
        }
    }
}
