//! Board Geometry
//!
//! Pure mapping between linear square indices and row/column pairs on
//! the 8x8 board. No state.

use serde::{Deserialize, Serialize};

/// Squares per board edge.
pub const BOARD_SIZE: u8 = 8;

/// Total squares on the board.
pub const SQUARE_COUNT: u8 = BOARD_SIZE * BOARD_SIZE;

/// Row/column pair, both in `0..BOARD_SIZE`.
pub type RowCol = (u8, u8);

/// Map a linear index to `(row, col)`.
#[inline]
pub const fn to_row_col(index: u8) -> RowCol {
    (index / BOARD_SIZE, index % BOARD_SIZE)
}

/// Map `(row, col)` to a linear index.
#[inline]
pub const fn to_index(row: u8, col: u8) -> u8 {
    row * BOARD_SIZE + col
}

/// A board-legal square index (`0..=63`).
///
/// Construction is checked, so every `Square` maps to a real cell and the
/// geometry helpers below are total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Square(u8);

impl Square {
    /// Create from a linear index, `None` when off the board.
    pub fn new(index: i64) -> Option<Self> {
        if (0..SQUARE_COUNT as i64).contains(&index) {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Create from row and column, `None` when off the board.
    pub fn from_row_col(row: u8, col: u8) -> Option<Self> {
        if row < BOARD_SIZE && col < BOARD_SIZE {
            Some(Self(to_index(row, col)))
        } else {
            None
        }
    }

    /// Linear index.
    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Row (0 = top, red's home).
    #[inline]
    pub const fn row(self) -> u8 {
        to_row_col(self.0).0
    }

    /// Column.
    #[inline]
    pub const fn col(self) -> u8 {
        to_row_col(self.0).1
    }

    /// Absolute `(row, col)` distance to another square.
    #[inline]
    pub const fn delta(self, other: Square) -> RowCol {
        (self.row().abs_diff(other.row()), self.col().abs_diff(other.col()))
    }

    /// Square at the floored average row and column of `self` and `other`.
    ///
    /// For an even jump this is the square jumped over. Odd deltas floor
    /// toward the lower row/column.
    #[inline]
    pub const fn midpoint(self, other: Square) -> Square {
        let row = (self.row() + other.row()) / 2;
        let col = (self.col() + other.col()) / 2;
        Square(to_index(row, col))
    }
}

impl TryFrom<i64> for Square {
    type Error = OffBoard;

    fn try_from(index: i64) -> Result<Self, Self::Error> {
        Square::new(index).ok_or(OffBoard(index))
    }
}

impl From<Square> for u8 {
    fn from(square: Square) -> Self {
        square.0
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index outside `0..=63`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("square index {0} is off the board")]
pub struct OffBoard(pub i64);
