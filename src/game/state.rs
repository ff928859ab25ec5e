//! Game State Definitions
//!
//! Colors, pieces, seats and the board state of a single game.
//! Pieces are kept in a `Vec` whose order is preserved across moves, so
//! snapshots list pieces in a stable order.

use serde::{Deserialize, Serialize};

use crate::core::board::Square;
use crate::core::hash::{compute_state_hash, StateHash, StateHasher};
use crate::game::rules::{validate_move, MoveKind, MoveRejection};

// =============================================================================
// COLOR
// =============================================================================

/// Team color. Red moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// Starts on rows 0-1.
    Red,
    /// Starts on rows 6-7.
    Blue,
}

impl Color {
    /// The other color.
    #[inline]
    pub const fn opponent(self) -> Color {
        match self {
            Color::Red => Color::Blue,
            Color::Blue => Color::Red,
        }
    }

    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Blue => "blue",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Winning color as it appears on the wire (`"Red"` / `"Blue"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    /// Red won.
    Red,
    /// Blue won.
    Blue,
}

impl From<Color> for Winner {
    fn from(color: Color) -> Self {
        match color {
            Color::Red => Winner::Red,
            Color::Blue => Winner::Blue,
        }
    }
}

impl From<Winner> for Color {
    fn from(winner: Winner) -> Self {
        match winner {
            Winner::Red => Color::Red,
            Winner::Blue => Color::Blue,
        }
    }
}

// =============================================================================
// PLAYER ID
// =============================================================================

/// Client-supplied player identifier (an auth provider uid).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PIECE
// =============================================================================

/// A piece on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    /// Team the piece belongs to.
    #[serde(rename = "type")]
    pub color: Color,
    /// Square it occupies.
    pub position: Square,
}

impl Piece {
    /// Create a piece.
    pub const fn new(color: Color, position: Square) -> Self {
        Self { color, position }
    }

    /// Same piece on another square.
    #[inline]
    pub const fn moved_to(self, position: Square) -> Self {
        Self { color: self.color, position }
    }
}

/// Number of pieces each color starts with.
pub const PIECES_PER_SIDE: usize = 16;

/// Starting layout: red on 0-15, blue on 48-63.
pub fn initial_pieces() -> Vec<Piece> {
    let red = (0..16).map(|i| (Color::Red, i));
    let blue = (48..64).map(|i| (Color::Blue, i));
    red.chain(blue)
        .filter_map(|(color, i)| Square::new(i).map(|sq| Piece::new(color, sq)))
        .collect()
}

// =============================================================================
// SEATS
// =============================================================================

/// Player-to-color assignment for a room.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seats {
    /// Red player, if seated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red: Option<PlayerId>,
    /// Blue player, if seated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue: Option<PlayerId>,
}

impl Seats {
    /// Seat a player: red first, then blue.
    ///
    /// Returns the color assigned by this call, or `None` when the room is
    /// full. Seats are not checked for the id: a red player joining again
    /// while blue is open takes blue as well.
    pub fn assign(&mut self, player: &PlayerId) -> Option<Color> {
        if self.red.is_none() {
            self.red = Some(player.clone());
            Some(Color::Red)
        } else if self.blue.is_none() {
            self.blue = Some(player.clone());
            Some(Color::Blue)
        } else {
            None
        }
    }

    /// Color held by `player`, if seated.
    pub fn color_of(&self, player: &PlayerId) -> Option<Color> {
        if self.red.as_ref() == Some(player) {
            Some(Color::Red)
        } else if self.blue.as_ref() == Some(player) {
            Some(Color::Blue)
        } else {
            None
        }
    }

    /// Number of seated players.
    pub fn count(&self) -> usize {
        self.red.is_some() as usize + self.blue.is_some() as usize
    }

    /// Both colors seated.
    pub fn is_full(&self) -> bool {
        self.count() == 2
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Result of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveApplied {
    /// Color that moved.
    pub mover: Color,
    /// Step or capture.
    pub kind: MoveKind,
    /// Set when this move ended the game.
    pub winner: Option<Color>,
}

/// Board state of a single game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    /// Pieces on the board. No two share a square.
    pub pieces: Vec<Piece>,
    /// Color to move.
    pub current_turn: Color,
    /// Set once, when one side runs out of pieces.
    pub winner: Option<Color>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Fresh game with the starting layout, red to move.
    pub fn new() -> Self {
        Self::with_pieces(initial_pieces(), Color::Red)
    }

    /// Game from an arbitrary layout.
    pub fn with_pieces(pieces: Vec<Piece>, current_turn: Color) -> Self {
        debug_assert!(
            pieces.iter().enumerate().all(|(i, a)| pieces[i + 1..].iter().all(|b| a.position != b.position)),
            "two pieces share a square"
        );
        Self { pieces, current_turn, winner: None }
    }

    /// Piece at `square`, if any.
    pub fn piece_at(&self, square: Square) -> Option<&Piece> {
        crate::game::rules::piece_at(&self.pieces, square)
    }

    /// Pieces remaining for `color`.
    pub fn count(&self, color: Color) -> usize {
        self.pieces.iter().filter(|p| p.color == color).count()
    }

    /// Whether a winner has been recorded.
    #[inline]
    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Winner implied by the piece counts.
    ///
    /// Red is checked first, so an (unreachable) empty board reports Blue.
    pub fn check_winner(&self) -> Option<Color> {
        if self.count(Color::Red) == 0 {
            Some(Color::Blue)
        } else if self.count(Color::Blue) == 0 {
            Some(Color::Red)
        } else {
            None
        }
    }

    /// Validate and apply a move submitted by `mover`.
    ///
    /// Atomic: on `Err` the state is untouched.
    pub fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        mover: Color,
    ) -> Result<MoveApplied, MoveRejection> {
        if self.is_over() {
            return Err(MoveRejection::GameOver);
        }
        if mover != self.current_turn {
            return Err(MoveRejection::NotYourTurn(mover));
        }
        if !self.piece_at(from).is_some_and(|p| p.color == mover) {
            return Err(MoveRejection::NoPieceAtOrigin(mover, from));
        }

        let kind = validate_move(from, to, &self.pieces, mover)?;

        if let Some(captured) = kind.captured() {
            self.pieces.retain(|p| p.position != captured);
        }
        for piece in &mut self.pieces {
            if piece.position == from {
                *piece = piece.moved_to(to);
            }
        }
        self.current_turn = self.current_turn.opponent();

        let winner = self.check_winner();
        if winner.is_some() {
            self.winner = winner;
        }

        Ok(MoveApplied { mover, kind, winner })
    }

    /// Feed the board into a hasher.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.pieces.len() as u32);
        for piece in &self.pieces {
            hasher.update_u8(piece.color as u8);
            hasher.update_u8(piece.position.index());
        }
        hasher.update_u8(self.current_turn as u8);
        hasher.update_bool(self.winner.is_some());
        if let Some(color) = self.winner {
            hasher.update_u8(color as u8);
        }
    }

    /// Fingerprint of the board alone.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(|h| self.hash_into(h))
    }
}
