//! Attack Resolution
//!
//! Handles a defender's report on an incoming shot. The defender is the only
//! party who knows where their boats are, so the report is taken as given:
//! each reported hit counts against the reporter's own board, and once all
//! [`HITS_TO_WIN`] boats are down the attacker wins and the session is
//! removed from the registry.

use serde::{Deserialize, Serialize};

use crate::core::id::{ClientId, SessionId};
use crate::game::board::{validate_position, Position, BOATS_PER_BOARD};
use crate::game::registry::SessionRegistry;
use crate::game::session::SessionError;

/// Hits that end the match.
pub const HITS_TO_WIN: u32 = BOATS_PER_BOARD as u32;

/// Outcome of one shot as reported by the defender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShotResult {
    /// Shot landed on a boat.
    Hit,
    /// Shot landed in water.
    Miss,
}

/// What the router must do with a resolved report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Forward the report to the attacker.
    Relay {
        /// Attacker receiving the result.
        to: ClientId,
        /// Cell that was fired on.
        position: Position,
        /// Reported outcome.
        result: ShotResult,
    },

    /// Every boat of `loser` is down. The session is already gone from the
    /// registry.
    GameOver {
        /// Session that ended.
        session_id: SessionId,
        /// Attacker who sank the last boat.
        winner: ClientId,
        /// Reporter whose board is empty.
        loser: ClientId,
        /// Human-readable reason.
        message: String,
    },
}

/// Apply a defender's report.
///
/// Reports are only scored once the session is `Active`. Misses and
/// non-final hits relay to the attacker. The final hit finishes the session,
/// removes it from `registry` and suppresses the relay.
pub fn resolve_attack_result(
    registry: &mut SessionRegistry,
    session_id: &SessionId,
    reporter: ClientId,
    position: Position,
    result: ShotResult,
) -> Result<Resolution, SessionError> {
    validate_position(position)?;

    let session = registry.get_mut(session_id)?;
    session.require_participant(&reporter)?;
    let attacker = session.opponent_of(&reporter).ok_or(SessionError::NoOpponent)?;
    session.require_active()?;

    if result == ShotResult::Miss {
        session.touch();
        return Ok(Resolution::Relay { to: attacker, position, result });
    }

    let hits = session.record_hit(reporter)?;
    if hits < HITS_TO_WIN {
        return Ok(Resolution::Relay { to: attacker, position, result });
    }

    session.finish()?;
    registry.remove(session_id);

    Ok(Resolution::GameOver {
        session_id: session_id.clone(),
        winner: attacker,
        loser: reporter,
        message: format!("All {} boats sunk", HITS_TO_WIN),
    })
}
