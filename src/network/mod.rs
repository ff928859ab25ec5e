//! Network Layer
//!
//! WebSocket server for room-based multiplayer.
//! Rules live in `game/`; this layer owns rooms, connections and fan-out.

pub mod protocol;
pub mod session;
pub mod leaderboard;
pub mod server;

pub use protocol::{
    ClientMessage, ServerMessage, GameSnapshot, JoinRequest, MoveRequest, MovePayload,
    ErrorCode, ServerError,
};
pub use session::{GameSession, SessionPhase, SessionRegistry, RoomId, ConnectionId, JoinOutcome, MoveOutcome};
pub use leaderboard::{MatchLog, MatchRecord};
pub use server::{GameServer, ServerConfig, GameServerError, ConfigError};
