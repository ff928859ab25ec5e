//! Room Session Management
//!
//! One [`GameSession`] per room, owned by the [`SessionRegistry`].
//!
//! Every session sits behind its own `RwLock`, so mutations of one room
//! are serialized while different rooms proceed independently. The
//! registry map has a separate lock that is only held for lookup,
//! insertion and eviction, never while a session is being mutated.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::board::Square;
use crate::core::hash::{compute_state_hash, short_hex, StateHash};
use crate::game::events::GameOverSummary;
use crate::game::rules::MoveRejection;
use crate::game::state::{Color, GameState, MoveApplied, PlayerId, Seats};
use crate::network::protocol::{GameSnapshot, ServerMessage};

/// Room identifier, chosen by clients.
pub type RoomId = String;

/// Identifier of one WebSocket connection.
pub type ConnectionId = uuid::Uuid;

/// How long a once-only message may wait for queue space before the
/// participant is dropped.
pub const RELIABLE_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Fewer than two players seated.
    Waiting,
    /// Both seats taken, game in progress.
    Active,
    /// A winner has been recorded.
    Terminal,
}

/// Result of a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Color the player holds, `None` if the room was full.
    pub color: Option<Color>,
    /// Whether this join created the session.
    pub created: bool,
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    /// What the move did.
    pub applied: MoveApplied,
    /// Present only on the move that ended the game.
    pub game_over: Option<GameOverSummary>,
}

/// A single room.
pub struct GameSession {
    /// Room identifier.
    pub room_id: RoomId,
    /// Board state.
    game: GameState,
    /// Player-to-color assignment.
    seats: Seats,
    /// Connections receiving this room's broadcasts.
    participants: BTreeMap<ConnectionId, mpsc::Sender<ServerMessage>>,
    /// When the session was created.
    started_at: Instant,
    /// Last join, move or leave.
    last_activity: Instant,
    /// Set when evicted from the registry.
    closed: bool,
}

impl GameSession {
    /// Create a session with the starting layout, red to move.
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        let now = Instant::now();
        Self {
            room_id: room_id.into(),
            game: GameState::new(),
            seats: Seats::default(),
            participants: BTreeMap::new(),
            started_at: now,
            last_activity: now,
            closed: false,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        if self.game.is_over() {
            SessionPhase::Terminal
        } else if self.seats.is_full() {
            SessionPhase::Active
        } else {
            SessionPhase::Waiting
        }
    }

    /// Seat a player: red, then blue, then nothing (room full).
    ///
    /// The id is not deduplicated, so a seated player joining again may
    /// take the open seat too.
    pub fn join(&mut self, player_id: &PlayerId) -> Option<Color> {
        self.last_activity = Instant::now();
        self.seats.assign(player_id)
    }

    /// Apply a move submitted for `color`.
    ///
    /// On `Err` nothing changed. The game-over summary is produced only by
    /// the move that ends the game; afterwards every move is rejected.
    pub fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        color: Color,
    ) -> Result<MoveOutcome, MoveRejection> {
        self.last_activity = Instant::now();
        let applied = self.game.apply_move(from, to, color)?;

        let game_over = applied
            .winner
            .and_then(|_| GameOverSummary::from_state(&self.game, self.started_at.elapsed()));

        Ok(MoveOutcome { applied, game_over })
    }

    /// Full state for broadcasting.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            pieces: self.game.pieces.clone(),
            current_turn: self.game.current_turn,
            players: self.seats.clone(),
            winner: self.game.winner.map(Into::into),
        }
    }

    /// Fingerprint of board and seats.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(|h| {
            h.update_str(&self.room_id);
            self.game.hash_into(h);
            h.update_opt_str(self.seats.red.as_ref().map(PlayerId::as_str));
            h.update_opt_str(self.seats.blue.as_ref().map(PlayerId::as_str));
        })
    }

    /// Board state.
    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Seat assignment.
    pub fn seats(&self) -> &Seats {
        &self.seats
    }

    /// Register a connection for broadcasts.
    pub fn add_participant(&mut self, conn: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        self.participants.insert(conn, sender);
    }

    /// Unregister a connection. Returns true if it was present.
    pub fn remove_participant(&mut self, conn: &ConnectionId) -> bool {
        self.last_activity = Instant::now();
        self.participants.remove(conn).is_some()
    }

    /// Number of registered connections.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// How long since the last join, move or leave, measured at `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Whether the registry evicted this session.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send a message to every participant.
    ///
    /// Never waits: a participant whose queue is full misses this message
    /// (the next snapshot supersedes it). Closed connections are dropped.
    pub fn broadcast(&mut self, message: &ServerMessage) {
        let room_id = &self.room_id;
        self.participants.retain(|conn, sender| match sender.try_send(message.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(room = %room_id, %conn, "Outbound queue full, dropping message");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(room = %room_id, %conn, "Dropping closed participant");
                false
            }
        });
    }

    /// Send a message that is never superseded, waiting for queue space.
    ///
    /// A participant that stays full past [`RELIABLE_SEND_TIMEOUT`] is
    /// dropped from the room along with its closed peers.
    pub async fn broadcast_reliable(&mut self, message: &ServerMessage) {
        let mut dropped = Vec::new();

        for (conn, sender) in &self.participants {
            match timeout(RELIABLE_SEND_TIMEOUT, sender.send(message.clone())).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    debug!(room = %self.room_id, %conn, "Dropping closed participant");
                    dropped.push(*conn);
                }
                Err(_) => {
                    warn!(room = %self.room_id, %conn, "Participant stalled, dropping");
                    dropped.push(*conn);
                }
            }
        }

        for conn in &dropped {
            self.participants.remove(conn);
        }
    }

    /// Broadcast the current snapshot.
    pub fn broadcast_snapshot(&mut self) {
        #[cfg(feature = "debug-tracing")]
        debug!(room = %self.room_id, state = %short_hex(&self.compute_hash()), "Broadcasting snapshot");

        let message = ServerMessage::GameState(self.snapshot());
        self.broadcast(&message);
    }
}

// =============================================================================
// SESSION REGISTRY
// =============================================================================

/// Maps room ids to sessions.
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<RoomId, Arc<RwLock<GameSession>>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Look up a session.
    pub async fn get(&self, room_id: &str) -> Option<Arc<RwLock<GameSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(room_id).cloned()
    }

    /// Look up a session, creating it if absent.
    ///
    /// Returns the session and whether this call created it. Concurrent
    /// first joins of one room create exactly one session.
    pub async fn get_or_create(&self, room_id: &str) -> (Arc<RwLock<GameSession>>, bool) {
        if let Some(session) = self.get(room_id).await {
            return (session, false);
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(room_id) {
            return (session.clone(), false);
        }
        let session = Arc::new(RwLock::new(GameSession::new(room_id)));
        sessions.insert(room_id.to_string(), session.clone());
        info!(room = %room_id, "Created session");
        (session, true)
    }

    /// Seat a player and register their connection, then broadcast.
    ///
    /// The snapshot goes to every participant whether or not a seat was
    /// assigned.
    pub async fn join(
        &self,
        room_id: &str,
        player_id: &PlayerId,
        conn: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> JoinOutcome {
        loop {
            let (session, created) = self.get_or_create(room_id).await;
            let mut session = session.write().await;

            // Evicted between lookup and lock: retry against the live entry.
            if session.is_closed() {
                continue;
            }

            session.add_participant(conn, sender.clone());
            let color = session.join(player_id);
            match color {
                Some(color) => debug!(room = %room_id, player = %player_id, %color, "Player seated"),
                None => debug!(room = %room_id, player = %player_id, "Room full, joined without a seat"),
            }
            session.broadcast_snapshot();

            return JoinOutcome { color, created };
        }
    }

    /// Apply a move and broadcast the result.
    ///
    /// If the room exists, its snapshot is re-broadcast even when the move
    /// is rejected. A game-over summary, when produced, goes out first.
    pub async fn submit_move(
        &self,
        room_id: &str,
        from: Square,
        to: Square,
        color: Color,
    ) -> Result<MoveOutcome, MoveRejection> {
        let session = self.get(room_id).await.ok_or(MoveRejection::UnknownRoom)?;
        let mut session = session.write().await;
        if session.is_closed() {
            return Err(MoveRejection::UnknownRoom);
        }

        let result = session.apply_move(from, to, color);
        match &result {
            Ok(outcome) => {
                if let Some(summary) = &outcome.game_over {
                    info!(
                        room = %room_id,
                        winner = ?summary.winner,
                        red = summary.red_pieces,
                        blue = summary.blue_pieces,
                        duration = summary.duration_seconds,
                        state = %short_hex(&session.compute_hash()),
                        "Game over"
                    );
                    session.broadcast_reliable(&ServerMessage::GameOver(summary.clone())).await;
                }
            }
            Err(reason) => {
                debug!(room = %room_id, %from, %to, %color, %reason, "Move rejected");
            }
        }
        session.broadcast_snapshot();

        result
    }

    /// Re-send a room's snapshot without changing it.
    ///
    /// Returns false if the room does not exist.
    pub async fn resend_snapshot(&self, room_id: &str) -> bool {
        match self.get(room_id).await {
            Some(session) => {
                session.write().await.broadcast_snapshot();
                true
            }
            None => false,
        }
    }

    /// Stop sending a room's events to a connection.
    pub async fn leave(&self, room_id: &str, conn: &ConnectionId) -> bool {
        match self.get(room_id).await {
            Some(session) => session.write().await.remove_participant(conn),
            None => false,
        }
    }

    /// Active session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Evict sessions with no participants idle longer than `ttl` at `now`.
    ///
    /// Sessions locked by another task are in use and skipped. Returns the
    /// evicted room ids.
    pub async fn sweep_idle(&self, now: Instant, ttl: Duration) -> Vec<RoomId> {
        let mut sessions = self.sessions.write().await;
        let mut evicted = Vec::new();

        for (room_id, session) in sessions.iter() {
            let Ok(mut s) = session.try_write() else {
                continue;
            };
            if s.participant_count() == 0 && s.idle_for(now) > ttl {
                s.closed = true;
                evicted.push(room_id.clone());
            }
        }

        for room_id in &evicted {
            sessions.remove(room_id);
        }

        evicted
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
