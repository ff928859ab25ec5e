//! Core primitives.
//!
//! Board geometry and state fingerprinting. Pure, no I/O.

pub mod board;
pub mod hash;

// Re-export core types
pub use board::{Square, BOARD_SIZE, SQUARE_COUNT, to_index, to_row_col};
pub use hash::{StateHash, StateHasher, compute_state_hash};
