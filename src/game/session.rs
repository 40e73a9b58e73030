//! Match Session
//!
//! Per-match state: who is playing, whose board is in, how many hits each
//! board has taken. All mutation goes through methods that keep the session
//! invariants; the registry owns every instance.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::clock;
use crate::core::id::{ClientId, SessionId};
use crate::game::board::{Board, BoardError};

/// Maximum participants per session.
pub const MAX_PARTICIPANTS: usize = 2;

/// Session phase.
///
/// Transitions only move forward:
/// `AwaitingOpponent -> BoardsPending -> Active -> Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    /// Creator is alone.
    AwaitingOpponent,
    /// Both seats taken, at least one board missing.
    BoardsPending,
    /// Both boards in, `gameStart` sent.
    Active,
    /// Winner declared.
    Finished,
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session with that id.
    #[error("Game {0} not found")]
    NotFound(SessionId),

    /// Both seats are taken.
    #[error("Game is full")]
    Full,

    /// Caller already holds a seat.
    #[error("Already joined this game")]
    AlreadyJoined,

    /// Caller holds no seat in the session.
    #[error("Not a participant in this game")]
    NotParticipant,

    /// Second seat still empty.
    #[error("Opponent has not joined yet")]
    NoOpponent,

    /// Boards are not both in, so no shot can be scored yet.
    #[error("Game has not started")]
    NotStarted,

    /// Board or position failed validation.
    #[error(transparent)]
    InvalidBoard(#[from] BoardError),

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

/// Board readiness after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardStatus {
    /// Accepted boards.
    pub players_ready: usize,
    /// Seated participants.
    pub total_players: usize,
}

/// Data produced when a session becomes active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStart {
    /// Wall-clock start.
    pub start_time: DateTime<Utc>,
    /// Participants in join order.
    pub participants: Vec<ClientId>,
    /// Who fires first.
    pub starting_player: ClientId,
}

/// A two-player match session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Seated clients, creator first.
    participants: Vec<ClientId>,
    /// Accepted boards.
    boards: BTreeMap<ClientId, Board>,
    /// Hits taken per participant, as reported by that participant.
    hit_counts: BTreeMap<ClientId, u32>,
    /// Current phase.
    phase: SessionPhase,
    /// Creation time (informational).
    created_at: DateTime<Utc>,
    /// Last event that touched this session.
    last_activity: Instant,
}

impl Session {
    /// Create a session with its creator in the first seat.
    pub fn new(id: SessionId, creator: ClientId) -> Self {
        Self {
            id,
            participants: vec![creator],
            boards: BTreeMap::new(),
            hit_counts: BTreeMap::new(),
            phase: SessionPhase::AwaitingOpponent,
            created_at: clock::now(),
            last_activity: Instant::now(),
        }
    }

    /// Seat a second participant.
    pub fn add_participant(&mut self, client: ClientId) -> Result<(), SessionError> {
        if self.participants.len() >= MAX_PARTICIPANTS {
            return Err(SessionError::Full);
        }

        if self.is_participant(&client) {
            return Err(SessionError::AlreadyJoined);
        }

        self.participants.push(client);
        if self.participants.len() == MAX_PARTICIPANTS {
            self.phase = SessionPhase::BoardsPending;
        }
        self.touch();

        Ok(())
    }

    /// Accept a board for a participant and reset their hit counter.
    ///
    /// Resubmission replaces the earlier board.
    pub fn submit_board(&mut self, client: ClientId, board: Board) -> Result<BoardStatus, SessionError> {
        self.require_participant(&client)?;

        self.boards.insert(client, board);
        self.hit_counts.insert(client, 0);
        self.touch();

        Ok(self.board_status())
    }

    /// Move to `Active` if every seat is filled and every board is in.
    ///
    /// Returns the start data exactly once per session; later calls return
    /// `None` even if boards are resubmitted.
    pub fn try_start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<GameStart> {
        if self.phase != SessionPhase::BoardsPending || !self.all_boards_submitted() {
            return None;
        }

        let starting_player = *self.participants.choose(rng)?;
        self.phase = SessionPhase::Active;

        Some(GameStart {
            start_time: clock::now(),
            participants: self.participants.clone(),
            starting_player,
        })
    }

    /// Count one hit against a participant's board.
    ///
    /// Returns the updated count.
    /// Only an `Active` session scores hits, and every participant's counter
    /// exists from the moment their board was accepted.
    pub fn record_hit(&mut self, client: ClientId) -> Result<u32, SessionError> {
        self.require_participant(&client)?;
        self.require_active()?;

        let count = self
            .hit_counts
            .get_mut(&client)
            .ok_or_else(|| SessionError::Internal(format!("no hit counter for {}", client)))?;
        *count += 1;
        let count = *count;
        self.touch();

        Ok(count)
    }

    /// Mark an active session finished.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        self.require_active()?;
        self.phase = SessionPhase::Finished;
        Ok(())
    }

    /// Fail unless both boards are in and `gameStart` has gone out.
    pub fn require_active(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Active => Ok(()),
            SessionPhase::Finished => Err(SessionError::Internal(format!("game {} already finished", self.id))),
            _ => Err(SessionError::NotStarted),
        }
    }

    /// The other seated participant.
    pub fn opponent_of(&self, client: &ClientId) -> Option<ClientId> {
        if !self.is_participant(client) {
            return None;
        }
        self.participants.iter().find(|p| *p != client).copied()
    }

    /// Fail unless `client` holds a seat.
    pub fn require_participant(&self, client: &ClientId) -> Result<(), SessionError> {
        if self.is_participant(client) {
            Ok(())
        } else {
            Err(SessionError::NotParticipant)
        }
    }

    /// Whether `client` holds a seat.
    pub fn is_participant(&self, client: &ClientId) -> bool {
        self.participants.contains(client)
    }

    /// Whether every seat is filled and has a board.
    pub fn all_boards_submitted(&self) -> bool {
        self.participants.len() == MAX_PARTICIPANTS
            && self.participants.iter().all(|p| self.boards.contains_key(p))
    }

    /// Current readiness.
    pub fn board_status(&self) -> BoardStatus {
        BoardStatus {
            players_ready: self.boards.len(),
            total_players: self.participants.len(),
        }
    }

    /// Seated participants in join order.
    pub fn participants(&self) -> &[ClientId] {
        &self.participants
    }

    /// Board accepted for a participant.
    pub fn board(&self, client: &ClientId) -> Option<&Board> {
        self.boards.get(client)
    }

    /// Hits taken by a participant (0 before their board is in).
    pub fn hit_count(&self, client: &ClientId) -> u32 {
        self.hit_counts.get(client).copied().unwrap_or(0)
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last activity instant.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Record activity now.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}
