//! Game Logic Module
//!
//! Rules and board state. Synchronous and in-memory; every operation is
//! bounded by the piece count.
//!
//! ## Module Structure
//!
//! - `state`: Colors, pieces, seats, board state and move application
//! - `rules`: Step and capture validation
//! - `events`: Game-over summary

pub mod state;
pub mod rules;
pub mod events;

// Re-export key types
pub use state::{Color, GameState, MoveApplied, Piece, PlayerId, Seats, Winner};
pub use rules::{MoveKind, MoveRejection, is_capture, is_legal_move, validate_move};
pub use events::GameOverSummary;
