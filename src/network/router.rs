//! Event Router
//!
//! Turns inbound client events into registry mutations and outbound messages.
//!
//! Every event runs as one critical section: the registry mutex is taken
//! before validation and released only after the reply and every resulting
//! broadcast have been queued on the client channels. Two events touching the
//! same session can therefore never interleave, even on a multi-threaded
//! runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::core::clock;
use crate::core::id::{ClientId, SessionId};
use crate::game::board::{validate_position, Board};
use crate::game::registry::SessionRegistry;
use crate::game::resolver::{resolve_attack_result, Resolution};
use crate::game::session::SessionError;
use crate::network::clients::ClientDirectory;
use crate::network::protocol::{
    AttackOutcome, AttackReport, AttackRequest, ClientEnvelope, ClientMessage, GameOverInfo,
    GameStartInfo, JoinRequest, Reply, ServerMessage, SubmitBoardRequest,
};

/// Side effect produced by a handler, applied in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver to one client.
    Send(ClientId, ServerMessage),
    /// Deliver to every member of a session group.
    Broadcast(SessionId, ServerMessage),
    /// Bind a client to a session group.
    JoinGroup(SessionId, ClientId),
    /// Dissolve a session group.
    CloseGroup(SessionId),
}

/// Result of a request/response handler.
type HandlerResult = Result<(Reply, Vec<Effect>), SessionError>;

/// Routes client events against the session registry.
pub struct EventRouter {
    /// Every live session. Held for the whole of each event.
    registry: Mutex<SessionRegistry>,
    /// Connections and groups.
    clients: Arc<ClientDirectory>,
}

impl EventRouter {
    /// Create a router delivering through `clients`.
    pub fn new(clients: Arc<ClientDirectory>) -> Self {
        Self {
            registry: Mutex::new(SessionRegistry::new()),
            clients,
        }
    }

    /// Connection directory.
    pub fn clients(&self) -> &Arc<ClientDirectory> {
        &self.clients
    }

    /// Handle one inbound event from `from`.
    #[instrument(skip(self, envelope), fields(client = %from.short(), event = envelope.message.event_name()))]
    pub async fn dispatch(&self, from: ClientId, envelope: ClientEnvelope) {
        let ack = envelope.ack;

        if let ClientMessage::Ping = envelope.message {
            let pong = ServerMessage::Pong { server_time: clock::now_millis() };
            self.clients.send_to(&from, pong).await;
            return;
        }

        let mut registry = self.registry.lock().await;

        match envelope.message {
            ClientMessage::CreateGame => {
                let result = Self::handle_create_game(&mut registry, from, ack);
                self.respond(from, ack, result).await;
            }
            ClientMessage::JoinGame(req) => {
                let result = Self::handle_join_game(&mut registry, from, ack, req);
                self.respond(from, ack, result).await;
            }
            ClientMessage::SubmitBoard(req) => {
                let result = Self::handle_submit_board(&mut registry, from, ack, req);
                self.respond(from, ack, result).await;
            }
            ClientMessage::Attack(req) => {
                let result = Self::handle_attack(&mut registry, from, ack, req);
                self.respond(from, ack, result).await;
            }
            ClientMessage::AttackResult(report) => {
                // No reply channel for this event; failures are only logged.
                match Self::handle_attack_result(&mut registry, from, report) {
                    Ok(effects) => self.apply(effects).await,
                    Err(e) => warn!("attackResult from {} dropped: {}", from.short(), e),
                }
            }
            ClientMessage::Ping => {}
        }

        drop(registry);
    }

    /// Log a closed connection and forget its address.
    ///
    /// Session state is left untouched: the opponent is not notified and the
    /// seat is not freed.
    pub async fn handle_disconnect(&self, client: ClientId, reason: &str) {
        let lived = self.clients.unregister(&client).await;
        info!(
            "Disconnected ({}): {} after {:?}",
            client.short(),
            reason,
            lived.unwrap_or_default()
        );
    }

    /// Remove sessions idle for longer than `ttl` and notify their groups.
    pub async fn expire_idle_sessions(&self, ttl: Duration) -> usize {
        let mut registry = self.registry.lock().await;
        let expired = registry.expire_idle(Instant::now(), ttl);

        for session in &expired {
            info!(
                "Session {} expired after {:?} idle ({} participants)",
                session.id,
                ttl,
                session.participants().len()
            );
            self.apply(vec![
                Effect::Broadcast(
                    session.id.clone(),
                    ServerMessage::SessionExpired { session_id: session.id.clone() },
                ),
                Effect::CloseGroup(session.id.clone()),
            ])
            .await;
        }

        drop(registry);
        expired.len()
    }

    /// Active session count.
    pub async fn session_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Whether a session id currently resolves.
    pub async fn has_session(&self, id: &SessionId) -> bool {
        self.registry.lock().await.contains(id)
    }

    // =========================================================================
    // HANDLERS
    // =========================================================================

    fn handle_create_game(registry: &mut SessionRegistry, from: ClientId, ack: Option<u64>) -> HandlerResult {
        let id = registry.create(from)?;
        info!("Game created: {} by {}", id, from.short());

        Ok((
            Reply::created(ack, id.clone()),
            vec![Effect::JoinGroup(id, from)],
        ))
    }

    fn handle_join_game(
        registry: &mut SessionRegistry,
        from: ClientId,
        ack: Option<u64>,
        req: JoinRequest,
    ) -> HandlerResult {
        registry.join(&req.session_id, from)?;
        info!("Player {} joined game {}", from.short(), req.session_id);

        Ok((
            Reply::ok(ack),
            vec![Effect::JoinGroup(req.session_id, from)],
        ))
    }

    fn handle_submit_board(
        registry: &mut SessionRegistry,
        from: ClientId,
        ack: Option<u64>,
        req: SubmitBoardRequest,
    ) -> HandlerResult {
        let session = registry.get_mut(&req.session_id)?;
        let board = Board::new(req.board)?;
        let status = session.submit_board(from, board)?;
        debug!("Player {} submitted board for {}", from.short(), req.session_id);

        let mut effects = Vec::new();
        if let Some(start) = session.try_start(&mut rand::thread_rng()) {
            info!(
                "Starting game {}, first turn: {}",
                req.session_id,
                start.starting_player.short()
            );
            effects.push(Effect::Broadcast(
                req.session_id,
                ServerMessage::GameStart(GameStartInfo::from(start)),
            ));
        }

        Ok((Reply::board_accepted(ack, status), effects))
    }

    fn handle_attack(
        registry: &mut SessionRegistry,
        from: ClientId,
        ack: Option<u64>,
        req: AttackRequest,
    ) -> HandlerResult {
        let session = registry.get_mut(&req.session_id)?;
        let position = validate_position(req.position)?;
        session.require_participant(&from)?;
        let defender = session.opponent_of(&from).ok_or(SessionError::NoOpponent)?;
        session.touch();

        debug!("{} attacks {} at {} in {}", from.short(), defender.short(), position, req.session_id);

        Ok((
            Reply::ok(ack),
            vec![Effect::Send(defender, ServerMessage::OpponentAttack { position })],
        ))
    }

    fn handle_attack_result(
        registry: &mut SessionRegistry,
        from: ClientId,
        report: AttackReport,
    ) -> Result<Vec<Effect>, SessionError> {
        let resolution = resolve_attack_result(
            registry,
            &report.session_id,
            from,
            report.position,
            report.result,
        )?;

        match resolution {
            Resolution::Relay { to, position, result } => Ok(vec![Effect::Send(
                to,
                ServerMessage::AttackResult(AttackOutcome { position, result }),
            )]),
            Resolution::GameOver { session_id, winner, loser, message } => {
                info!(
                    "Game {} over: {} sank every boat of {}",
                    session_id,
                    winner.short(),
                    loser.short()
                );
                Ok(vec![
                    Effect::Broadcast(
                        session_id.clone(),
                        ServerMessage::GameOver(GameOverInfo { winner, message }),
                    ),
                    Effect::CloseGroup(session_id),
                ])
            }
        }
    }

    // =========================================================================
    // DELIVERY
    // =========================================================================

    /// Reply to the caller, then apply effects. Failures reach the caller only.
    async fn respond(&self, from: ClientId, ack: Option<u64>, result: HandlerResult) {
        match result {
            Ok((reply, effects)) => {
                self.clients.send_to(&from, ServerMessage::Reply(reply)).await;
                self.apply(effects).await;
            }
            Err(e) => {
                debug!("Request from {} failed: {}", from.short(), e);
                self.clients
                    .send_to(&from, ServerMessage::Reply(Reply::failure(ack, &e)))
                    .await;
            }
        }
    }

    async fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(to, message) => {
                    if !self.clients.send_to(&to, message).await {
                        debug!("Client {} gone, message dropped", to.short());
                    }
                }
                Effect::Broadcast(group, message) => {
                    self.clients.broadcast(&group, message).await;
                }
                Effect::JoinGroup(group, client) => {
                    self.clients.join_group(&group, client).await;
                }
                Effect::CloseGroup(group) => {
                    self.clients.close_group(&group).await;
                }
            }
        }
    }
}
