//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON object tagged by `type`; event and field names are
//! camelCase so browser clients can use them as-is.
//!
//! Requests that expect an answer may carry an `ack` number, which the server
//! echoes back in the matching `reply` frame.

use serde::{Deserialize, Serialize};

use crate::core::id::{ClientId, SessionId};
use crate::game::board::{Cell, Position};
use crate::game::resolver::ShotResult;
use crate::game::session::{BoardStatus, GameStart, SessionError};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Inbound frame: an event plus an optional correlation number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEnvelope {
    /// Correlation number echoed in the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,

    /// The event itself.
    #[serde(flatten)]
    pub message: ClientMessage,
}

/// Events sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Open a new session with the caller in the first seat.
    CreateGame,

    /// Take the second seat of an existing session.
    JoinGame(JoinRequest),

    /// Submit the caller's board.
    SubmitBoard(SubmitBoardRequest),

    /// Fire at a cell on the opponent's board.
    Attack(AttackRequest),

    /// Report the outcome of the opponent's shot at the caller's board.
    AttackResult(AttackReport),

    /// Liveness check answered with the server clock.
    Ping,
}

/// Join request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Session to join.
    pub session_id: SessionId,
}

/// Board submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBoardRequest {
    /// Target session.
    pub session_id: SessionId,
    /// Cells, row-major. Shape is checked by the router.
    pub board: Vec<Cell>,
}

/// Shot at the opponent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackRequest {
    /// Target session.
    pub session_id: SessionId,
    /// Cell fired on.
    pub position: Position,
}

/// Defender's report on a shot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackReport {
    /// Target session.
    pub session_id: SessionId,
    /// Cell that was fired on.
    pub position: Position,
    /// Hit or miss.
    pub result: ShotResult,
}

impl ClientMessage {
    /// Wire name of the event, for logs.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::CreateGame => "createGame",
            ClientMessage::JoinGame(_) => "joinGame",
            ClientMessage::SubmitBoard(_) => "submitBoard",
            ClientMessage::Attack(_) => "attack",
            ClientMessage::AttackResult(_) => "attackResult",
            ClientMessage::Ping => "ping",
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// First frame on every connection: the caller's own address.
    #[serde(rename_all = "camelCase")]
    Connected { client_id: ClientId },

    /// Answer to a request.
    Reply(Reply),

    /// Both boards are in; the match begins.
    GameStart(GameStartInfo),

    /// The opponent fired at the receiver's board.
    OpponentAttack { position: Position },

    /// Outcome of the receiver's own shot.
    AttackResult(AttackOutcome),

    /// Match over.
    GameOver(GameOverInfo),

    /// Session was reclaimed after inactivity.
    #[serde(rename_all = "camelCase")]
    SessionExpired { session_id: SessionId },

    /// Answer to `ping`.
    #[serde(rename_all = "camelCase")]
    Pong { server_time: i64 },

    /// Frame-level error (undecodable input).
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Reply to a request/response event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// Correlation number from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
    /// Whether the request succeeded.
    pub success: bool,
    /// Id of a newly created session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Boards accepted so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players_ready: Option<usize>,
    /// Seated participants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_players: Option<usize>,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl Reply {
    /// Bare success.
    pub fn ok(ack: Option<u64>) -> Self {
        Self {
            ack,
            success: true,
            session_id: None,
            players_ready: None,
            total_players: None,
            error: None,
            code: None,
        }
    }

    /// Success carrying a new session id.
    pub fn created(ack: Option<u64>, session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::ok(ack)
        }
    }

    /// Success carrying board readiness.
    pub fn board_accepted(ack: Option<u64>, status: BoardStatus) -> Self {
        Self {
            players_ready: Some(status.players_ready),
            total_players: Some(status.total_players),
            ..Self::ok(ack)
        }
    }

    /// Failure built from a session error.
    pub fn failure(ack: Option<u64>, err: &SessionError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            code: Some(ErrorCode::from(err)),
            ..Self::ok(ack)
        }
    }
}

/// Match start broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartInfo {
    /// Start time, Unix milliseconds.
    pub start_time: i64,
    /// Participants in join order.
    pub participants: Vec<ClientId>,
    /// Who fires first.
    pub starting_player: ClientId,
}

impl From<GameStart> for GameStartInfo {
    fn from(start: GameStart) -> Self {
        Self {
            start_time: start.start_time.timestamp_millis(),
            participants: start.participants,
            starting_player: start.starting_player,
        }
    }
}

/// Shot outcome relayed to the attacker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    /// Cell fired on.
    pub position: Position,
    /// Hit or miss.
    pub result: ShotResult,
}

/// Match end broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverInfo {
    /// Winning client.
    pub winner: ClientId,
    /// Human-readable reason.
    pub message: String,
}

/// Frame-level error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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
    /// Unknown session id.
    NotFound,
    /// Session already has two participants.
    Full,
    /// Malformed board or position.
    ValidationError,
    /// Caller already seated.
    AlreadyJoined,
    /// Caller not seated in the session.
    NotParticipant,
    /// Second seat still empty.
    NoOpponent,
    /// Boards not both in yet.
    NotStarted,
    /// Frame could not be decoded.
    InvalidMessage,
    /// Anything else.
    UnknownError,
}

impl From<&SessionError> for ErrorCode {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::NotFound(_) => ErrorCode::NotFound,
            SessionError::Full => ErrorCode::Full,
            SessionError::AlreadyJoined => ErrorCode::AlreadyJoined,
            SessionError::NotParticipant => ErrorCode::NotParticipant,
            SessionError::NoOpponent => ErrorCode::NoOpponent,
            SessionError::NotStarted => ErrorCode::NotStarted,
            SessionError::InvalidBoard(_) => ErrorCode::ValidationError,
            SessionError::Internal(_) => ErrorCode::UnknownError,
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientEnvelope {
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
