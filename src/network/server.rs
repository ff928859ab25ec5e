//! WebSocket Game Server
//!
//! Async WebSocket server for room-based play.
//! Routes join and move requests into the session registry and runs the
//! idle-session sweep.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::core::board::Square;
use crate::network::leaderboard::MatchLog;
use crate::network::protocol::{
    ClientMessage, ErrorCode, JoinRequest, MoveRequest, ServerError, ServerMessage,
};
use crate::network::session::{ConnectionId, RoomId, SessionRegistry};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Sessions with no participants are evicted after this long idle.
    pub session_idle_ttl: Duration,
    /// How often the idle sweep runs.
    pub cleanup_interval: Duration,
    /// Outbound queue length per connection.
    pub channel_capacity: usize,
    /// Match records kept in memory.
    pub leaderboard_capacity: usize,
    /// Records returned when a request names no limit.
    pub leaderboard_limit: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            max_connections: 1000,
            session_idle_ttl: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(60),
            channel_capacity: 64,
            leaderboard_capacity: 1000,
            leaderboard_limit: 10,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    ///
    /// Unset variables keep their defaults; set but unparsable ones are
    /// an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = match lookup("BIND_ADDR") {
            Some(value) => value
                .parse::<std::net::IpAddr>()
                .map_err(|_| ConfigError::invalid("BIND_ADDR", value))?,
            None => defaults.bind_addr.ip(),
        };
        let port = parse_var(&lookup, "PORT", defaults.bind_addr.port())?;

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            max_connections: parse_var(&lookup, "MAX_CONNECTIONS", defaults.max_connections)?,
            session_idle_ttl: Duration::from_secs(parse_var(
                &lookup,
                "SESSION_IDLE_TTL_SECS",
                defaults.session_idle_ttl.as_secs(),
            )?),
            cleanup_interval: Duration::from_secs(parse_var(
                &lookup,
                "CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval.as_secs(),
            )?),
            channel_capacity: parse_var(&lookup, "CHANNEL_CAPACITY", defaults.channel_capacity)?,
            leaderboard_capacity: parse_var(&lookup, "LEADERBOARD_CAPACITY", defaults.leaderboard_capacity)?,
            leaderboard_limit: parse_var(&lookup, "LEADERBOARD_LIMIT", defaults.leaderboard_limit)?,
            version: defaults.version,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::invalid(name, value)),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("invalid value for {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: String) -> Self {
        ConfigError::Invalid { name, value }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Connected client state.
struct ConnectedClient {
    /// Peer address.
    addr: SocketAddr,
    /// Rooms this connection has joined.
    rooms: BTreeSet<RoomId>,
    /// Connection time.
    connected_at: Instant,
}

type ClientMap = Arc<RwLock<BTreeMap<ConnectionId, ConnectedClient>>>;

/// State shared by every connection task.
#[derive(Clone)]
struct ServerContext {
    config: Arc<ServerConfig>,
    sessions: Arc<SessionRegistry>,
    match_log: Arc<MatchLog>,
    clients: ClientMap,
}

/// The game server.
pub struct GameServer {
    /// Shared state.
    ctx: ServerContext,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let match_log = MatchLog::new(config.leaderboard_capacity);

        Self {
            ctx: ServerContext {
                config: Arc::new(config),
                sessions: Arc::new(SessionRegistry::new()),
                match_log: Arc::new(match_log),
                clients: Arc::new(RwLock::new(BTreeMap::new())),
            },
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.ctx.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run on an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        let cleanup_sessions = self.ctx.sessions.clone();
        let cleanup_interval = self.ctx.config.cleanup_interval;
        let idle_ttl = self.ctx.config.session_idle_ttl;

        // Spawn cleanup task
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_sessions, cleanup_interval, idle_ttl).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.ctx.clients.read().await.len();
                            if clients_count >= self.ctx.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let ctx = self.ctx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let conn = uuid::Uuid::new_v4();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(ctx.config.channel_capacity);

            // Register client
            ctx.clients.write().await.insert(conn, ConnectedClient {
                addr,
                rooms: BTreeSet::new(),
                connected_at: Instant::now(),
            });

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        Self::handle_client_message(&ctx, conn, client_msg, &msg_tx).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError {
                                            code: ErrorCode::InvalidInput,
                                            message: "Invalid message format".to_string(),
                                        })).await;
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                let _ = msg_tx.send(ServerMessage::Error(ServerError {
                                    code: ErrorCode::UnsupportedFrame,
                                    message: "Binary frames are not supported".to_string(),
                                })).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup: leave every joined room, the sessions themselves stay
            let client = ctx.clients.write().await.remove(&conn);
            if let Some(client) = client {
                for room_id in &client.rooms {
                    ctx.sessions.leave(room_id, &conn).await;
                }
                info!(
                    "Client {} cleaned up after {:?} ({} rooms)",
                    client.addr,
                    client.connected_at.elapsed(),
                    client.rooms.len()
                );
            }

            // Let queued messages (e.g. the shutdown notice) flush
            drop(msg_tx);
            let _ = sender_task.await;
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        ctx: &ServerContext,
        conn: ConnectionId,
        msg: ClientMessage,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::JoinRoom(req) => {
                Self::handle_join(ctx, conn, req, sender).await;
            }
            ClientMessage::MakeMove(req) => {
                Self::handle_move(ctx, req).await;
            }
            ClientMessage::LeaveRoom { room_id } => {
                Self::handle_leave(ctx, conn, &room_id).await;
            }
            ClientMessage::Leaderboard { limit } => {
                let limit = limit.unwrap_or(ctx.config.leaderboard_limit);
                let records = ctx.match_log.recent(limit).await;
                let _ = sender.send(ServerMessage::Leaderboard { records }).await;
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
                }).await;
            }
        }
    }

    /// Handle a join request.
    async fn handle_join(
        ctx: &ServerContext,
        conn: ConnectionId,
        req: JoinRequest,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        if let Some(client) = ctx.clients.write().await.get_mut(&conn) {
            client.rooms.insert(req.room_id.clone());
        }

        let outcome = ctx.sessions.join(&req.room_id, &req.player_id, conn, sender.clone()).await;
        debug!(
            room = %req.room_id,
            player = %req.player_id,
            color = ?outcome.color,
            created = outcome.created,
            "Join handled"
        );
    }

    /// Handle a move request.
    async fn handle_move(ctx: &ServerContext, req: MoveRequest) {
        let (from, to) = match (Square::new(req.mv.from), Square::new(req.mv.to)) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                debug!(room = %req.room_id, from = req.mv.from, to = req.mv.to, "Off-board move dropped");
                ctx.sessions.resend_snapshot(&req.room_id).await;
                return;
            }
        };

        match ctx.sessions.submit_move(&req.room_id, from, to, req.mv.player).await {
            Ok(outcome) => {
                if let Some(summary) = outcome.game_over {
                    ctx.match_log.record(&summary).await;
                }
            }
            Err(reason) => {
                debug!(room = %req.room_id, %reason, "Move not applied");
            }
        }
    }

    /// Handle a leave request.
    async fn handle_leave(ctx: &ServerContext, conn: ConnectionId, room_id: &str) {
        if let Some(client) = ctx.clients.write().await.get_mut(&conn) {
            client.rooms.remove(room_id);
        }
        ctx.sessions.leave(room_id, &conn).await;
    }

    /// Run the idle-session sweep.
    async fn run_cleanup_loop(sessions: Arc<SessionRegistry>, every: Duration, ttl: Duration) {
        let mut interval = interval(every);

        loop {
            interval.tick().await;

            let evicted = sessions.sweep_idle(Instant::now(), ttl).await;
            if !evicted.is_empty() {
                info!("Evicted {} idle sessions", evicted.len());
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Session registry.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.ctx.sessions
    }

    /// Finished-match log.
    pub fn match_log(&self) -> &Arc<MatchLog> {
        &self.ctx.match_log
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.ctx.clients.read().await.len()
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.ctx.sessions.session_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Color, PlayerId, Winner};
    use crate::network::protocol::GameSnapshot;
    use tokio_tungstenite::connect_async;

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<TcpStream>,
    >;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.leaderboard_limit, 10);
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: BTreeMap<&str, &str> = [
            ("BIND_ADDR", "127.0.0.1"),
            ("PORT", "4000"),
            ("SESSION_IDLE_TTL_SECS", "90"),
        ]
        .into_iter()
        .collect();

        let config = ServerConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.session_idle_ttl, Duration::from_secs(90));
        assert_eq!(config.max_connections, 1000);
    }

    #[test]
    fn test_config_rejects_garbage() {
        let result = ServerConfig::from_lookup(|name| (name == "PORT").then(|| "http".to_string()));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::Invalid { name: "PORT", value: "http".to_string() }
        );
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = GameServer::new(ServerConfig::default());
        assert_eq!(server.connection_count().await, 0);
        assert_eq!(server.session_count().await, 0);
        assert!(server.match_log().is_empty().await);
    }

    async fn start_server() -> (Arc<GameServer>, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(GameServer::new(ServerConfig::default()));

        let runner = server.clone();
        tokio::spawn(async move { runner.serve(listener).await });

        (server, addr)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        ws
    }

    async fn send(ws: &mut Client, json: &str) {
        ws.send(Message::Text(json.to_string())).await.unwrap();
    }

    async fn recv(ws: &mut Client) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for server")
                .expect("stream ended")
                .unwrap();
            if let Message::Text(text) = frame {
                return ServerMessage::from_json(&text).unwrap();
            }
        }
    }

    async fn recv_snapshot(ws: &mut Client) -> GameSnapshot {
        match recv(ws).await {
            ServerMessage::GameState(snapshot) => snapshot,
            other => panic!("expected game_state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_two_players_over_websocket() {
        let (server, addr) = start_server().await;
        let mut red = connect(addr).await;
        let mut blue = connect(addr).await;

        send(&mut red, r#"{"type":"join_room","roomId":"r1","playerId":"alice"}"#).await;
        let snapshot = recv_snapshot(&mut red).await;
        assert_eq!(snapshot.players.red, Some(PlayerId::new("alice")));

        send(&mut blue, r#"{"type":"join_room","roomId":"r1","playerId":"bob"}"#).await;
        for ws in [&mut red, &mut blue] {
            let snapshot = recv_snapshot(ws).await;
            assert_eq!(snapshot.players.blue, Some(PlayerId::new("bob")));
        }

        send(&mut red, r#"{"type":"make_move","roomId":"r1","move":{"from":9,"to":18,"player":"red"}}"#).await;
        for ws in [&mut red, &mut blue] {
            let snapshot = recv_snapshot(ws).await;
            assert_eq!(snapshot.current_turn, Color::Blue);
            assert!(snapshot.pieces.iter().any(|p| p.position.index() == 18));
        }

        // Off-board squares are dropped, state is re-sent unchanged
        send(&mut blue, r#"{"type":"make_move","roomId":"r1","move":{"from":70,"to":-1,"player":"blue"}}"#).await;
        let snapshot = recv_snapshot(&mut blue).await;
        assert_eq!(snapshot.current_turn, Color::Blue);
        assert_eq!(snapshot.winner, None::<Winner>);

        assert_eq!(server.session_count().await, 1);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error() {
        let (server, addr) = start_server().await;
        let mut ws = connect(addr).await;

        send(&mut ws, "not json").await;
        match recv(&mut ws).await {
            ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::InvalidInput),
            other => panic!("expected error, got {:?}", other),
        }

        send(&mut ws, r#"{"type":"ping","timestamp":7}"#).await;
        match recv(&mut ws).await {
            ServerMessage::Pong { timestamp, .. } => assert_eq!(timestamp, 7),
            other => panic!("expected pong, got {:?}", other),
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_leaderboard_request() {
        let (server, addr) = start_server().await;
        server.match_log().record(&crate::game::events::GameOverSummary {
            winner: Winner::Blue,
            red_pieces: 0,
            blue_pieces: 9,
            duration_seconds: 120.0,
        }).await;

        let mut ws = connect(addr).await;
        send(&mut ws, r#"{"type":"leaderboard"}"#).await;
        match recv(&mut ws).await {
            ServerMessage::Leaderboard { records } => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].winner, Winner::Blue);
                assert_eq!(records[0].blue_pieces, 9);
            }
            other => panic!("expected leaderboard, got {:?}", other),
        }

        server.shutdown();
    }
}
