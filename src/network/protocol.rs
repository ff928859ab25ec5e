//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON text frames tagged by `"type"`.

use serde::{Deserialize, Serialize};

use crate::game::events::GameOverSummary;
use crate::game::state::{Color, Piece, PlayerId, Seats, Winner};
use crate::network::leaderboard::MatchRecord;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join (and create, if new) a room.
    JoinRoom(JoinRequest),

    /// Submit a move in a room.
    MakeMove(MoveRequest),

    /// Stop receiving a room's events.
    LeaveRoom {
        /// Room to leave.
        #[serde(rename = "roomId")]
        room_id: String,
    },

    /// Request recent match results.
    Leaderboard {
        /// Maximum records to return.
        #[serde(default)]
        limit: Option<usize>,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client clock, echoed back.
        timestamp: u64,
    },
}

/// Join request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Room identifier.
    pub room_id: String,
    /// Joining player's identifier.
    pub player_id: PlayerId,
}

/// Move request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// Room identifier.
    pub room_id: String,
    /// The move itself.
    #[serde(rename = "move")]
    pub mv: MovePayload,
}

/// Move squares and the color the client claims to play.
///
/// Squares are raw integers here; the server checks board bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MovePayload {
    /// Origin index.
    pub from: i64,
    /// Destination index.
    pub to: i64,
    /// Submitting color.
    pub player: Color,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full room state, after every join or move event.
    GameState(GameSnapshot),

    /// Game ended. Sent once per room.
    GameOver(GameOverSummary),

    /// Recent match results, newest first.
    Leaderboard {
        /// Records.
        records: Vec<MatchRecord>,
    },

    /// Pong response.
    Pong {
        /// Timestamp from the ping.
        timestamp: u64,
        /// Server clock in Unix milliseconds.
        #[serde(rename = "serverTime")]
        server_time: u64,
    },

    /// Error message (malformed frames only).
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Why the server is going away.
        reason: String,
    },
}

/// Full room state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Pieces on the board.
    pub pieces: Vec<Piece>,
    /// Color to move.
    pub current_turn: Color,
    /// Seated players.
    pub players: Seats,
    /// Winner, once decided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame did not parse as a client message.
    InvalidInput,
    /// Binary frames are not supported.
    UnsupportedFrame,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::board::Square;
    use crate::game::state::initial_pieces;

    #[test]
    fn test_parse_join_room() {
        let json = r#"{"type":"join_room","roomId":"abc","playerId":"uid-1"}"#;
        match ClientMessage::from_json(json).unwrap() {
            ClientMessage::JoinRoom(req) => {
                assert_eq!(req.room_id, "abc");
                assert_eq!(req.player_id, PlayerId::new("uid-1"));
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_parse_make_move() {
        let json = r#"{"type":"make_move","roomId":"abc","move":{"from":9,"to":18,"player":"red"}}"#;
        match ClientMessage::from_json(json).unwrap() {
            ClientMessage::MakeMove(req) => {
                assert_eq!(req.room_id, "abc");
                assert_eq!(req.mv.from, 9);
                assert_eq!(req.mv.to, 18);
                assert_eq!(req.mv.player, Color::Red);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_off_board_move_still_parses() {
        let json = r#"{"type":"make_move","roomId":"abc","move":{"from":-4,"to":99,"player":"blue"}}"#;
        assert!(matches!(ClientMessage::from_json(json), Ok(ClientMessage::MakeMove(_))));
    }

    #[test]
    fn test_unknown_color_rejected() {
        let json = r#"{"type":"make_move","roomId":"abc","move":{"from":9,"to":18,"player":"green"}}"#;
        assert!(ClientMessage::from_json(json).is_err());
    }

    #[test]
    fn test_snapshot_shape() {
        let snapshot = GameSnapshot {
            pieces: initial_pieces(),
            current_turn: Color::Red,
            players: Seats { red: Some(PlayerId::new("a")), blue: None },
            winner: None,
        };

        let json = serde_json::to_value(ServerMessage::GameState(snapshot)).unwrap();
        assert_eq!(json["type"], "game_state");
        assert_eq!(json["currentTurn"], "red");
        assert_eq!(json["players"]["red"], "a");
        assert!(json["players"].get("blue").is_none());
        assert!(json.get("winner").is_none());
        assert_eq!(json["pieces"].as_array().unwrap().len(), 32);
        assert_eq!(json["pieces"][0]["type"], "red");
        assert_eq!(json["pieces"][0]["position"], 0);
    }

    #[test]
    fn test_game_over_roundtrip() {
        let msg = ServerMessage::GameOver(GameOverSummary {
            winner: Winner::Blue,
            red_pieces: 0,
            blue_pieces: 5,
            duration_seconds: 61.5,
        });

        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"game_over""#));
        assert!(json.contains(r#""winner":"Blue""#));

        match ServerMessage::from_json(&json).unwrap() {
            ServerMessage::GameOver(summary) => assert_eq!(summary.blue_pieces, 5),
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_roundtrip_with_winner() {
        let snapshot = GameSnapshot {
            pieces: vec![Piece::new(Color::Red, Square::new(35).unwrap())],
            current_turn: Color::Blue,
            players: Seats::default(),
            winner: Some(Winner::Red),
        };

        let json = ServerMessage::GameState(snapshot.clone()).to_json().unwrap();
        match ServerMessage::from_json(&json).unwrap() {
            ServerMessage::GameState(parsed) => assert_eq!(parsed, snapshot),
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_pong_wire_shape() {
        let json = serde_json::to_value(ServerMessage::Pong { timestamp: 5, server_time: 9 }).unwrap();
        assert_eq!(json["type"], "pong");
        assert_eq!(json["timestamp"], 5);
        assert_eq!(json["serverTime"], 9);
    }

    #[test]
    fn test_error_codes() {
        let msg = ServerMessage::Error(ServerError {
            code: ErrorCode::InvalidInput,
            message: "Invalid message format".to_string(),
        });
        assert!(msg.to_json().unwrap().contains("invalid_input"));
    }
}
