//! Game Events
//!
//! Outcome records produced when a game ends.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::game::state::{Color, GameState, Winner};

/// Summary emitted once, when a game is first found to be over.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverSummary {
    /// Winning color.
    pub winner: Winner,
    /// Red pieces left on the board.
    pub red_pieces: usize,
    /// Blue pieces left on the board.
    pub blue_pieces: usize,
    /// Wall-clock seconds since the session started.
    pub duration_seconds: f64,
}

impl GameOverSummary {
    /// Build from a finished game. `None` while the game is still going.
    pub fn from_state(state: &GameState, elapsed: Duration) -> Option<Self> {
        let winner = state.winner?;
        Some(Self {
            winner: winner.into(),
            red_pieces: state.count(Color::Red),
            blue_pieces: state.count(Color::Blue),
            duration_seconds: elapsed.as_secs_f64(),
        })
    }
}
