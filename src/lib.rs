//! # Board Clash Server
//!
//! Authoritative real-time server for a two-player capture game on an
//! 8x8 board.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BOARD CLASH SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Pure primitives                         │
//! │  ├── board.rs      - Square indexing and geometry            │
//! │  └── hash.rs       - State fingerprints for logging          │
//! │                                                              │
//! │  game/             - Rules (synchronous)                     │
//! │  ├── state.rs      - Pieces, seats, turn and winner          │
//! │  ├── rules.rs      - Step and capture validation             │
//! │  └── events.rs     - Game-over summary                       │
//! │                                                              │
//! │  network/          - Networking (async)                      │
//! │  ├── server.rs     - WebSocket server and config             │
//! │  ├── protocol.rs   - Message types                           │
//! │  ├── session.rs    - Rooms and broadcast                     │
//! │  └── leaderboard.rs- Finished-match log                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! Each room sits behind its own lock. A move is validated, applied and
//! broadcast under that lock, so every participant sees the same ordered
//! sequence of snapshots and a game ends exactly once.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::board::{Square, BOARD_SIZE, SQUARE_COUNT};
pub use game::state::{Color, GameState, Piece, PlayerId, Seats, Winner};
pub use game::rules::{is_capture, is_legal_move, MoveRejection};
pub use network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
