//! WebSocket Game Server
//!
//! Async WebSocket server for two-player sessions.
//! Accepts connections, checks the browser origin, and feeds decoded events
//! to the [`EventRouter`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::{interval, sleep, timeout, Instant};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header::ORIGIN, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, warn};

use crate::core::id::ClientId;
use crate::network::clients::ClientDirectory;
use crate::network::protocol::{ClientEnvelope, ErrorCode, ServerError, ServerMessage};
use crate::network::router::EventRouter;

/// How long shutdown waits for connections to flush their last frames.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Browser origin allowed to connect, or `*` for any.
    pub allowed_origin: String,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Idle time after which a session is reclaimed. Zero disables expiry.
    pub session_idle_timeout: Duration,
    /// Period of the idle-session sweep.
    pub cleanup_interval: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 4000),
            allowed_origin: "http://localhost:5173".to_string(),
            max_connections: 1000,
            session_idle_timeout: Duration::from_secs(1800),
            cleanup_interval: Duration::from_secs(60),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, GameServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GameServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host: IpAddr = parse_var(&lookup, "HOST", defaults.bind_addr.ip())?;
        let port: u16 = parse_var(&lookup, "PORT", defaults.bind_addr.port())?;
        let max_connections = parse_var(&lookup, "MAX_CONNECTIONS", defaults.max_connections)?;
        let idle_secs = parse_var(
            &lookup,
            "SESSION_IDLE_TIMEOUT_SECS",
            defaults.session_idle_timeout.as_secs(),
        )?;
        let cleanup_secs = parse_var(&lookup, "CLEANUP_INTERVAL_SECS", defaults.cleanup_interval.as_secs())?;

        if cleanup_secs == 0 {
            return Err(GameServerError::Config(
                "CLEANUP_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            allowed_origin: lookup("ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin),
            max_connections,
            session_idle_timeout: Duration::from_secs(idle_secs),
            cleanup_interval: Duration::from_secs(cleanup_secs),
            version: defaults.version,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, GameServerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| GameServerError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

/// Whether a handshake carrying `origin` may proceed.
///
/// Non-browser clients send no `Origin` and are always let through.
pub fn origin_allowed(allowed: &str, origin: Option<&str>) -> bool {
    match origin {
        None => true,
        Some(_) if allowed == "*" => true,
        Some(origin) => origin.trim_end_matches('/') == allowed.trim_end_matches('/'),
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// Bad configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Event router, which owns the session registry.
    router: Arc<EventRouter>,
    /// One permit per accepted connection, held until its task ends.
    connection_slots: Arc<Semaphore>,
    /// Shutdown state. Late subscribers still observe `true`.
    shutdown_tx: watch::Sender<bool>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let slots = config.max_connections.min(Semaphore::MAX_PERMITS);

        Self {
            config,
            router: Arc::new(EventRouter::new(Arc::new(ClientDirectory::new()))),
            connection_slots: Arc::new(Semaphore::new(slots)),
            shutdown_tx,
        }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Run on an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let local_addr = listener.local_addr()?;
        info!(
            "Broadside server v{} listening on {} (origin {})",
            self.config.version, local_addr, self.config.allowed_origin
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let cleanup_handle = if self.config.session_idle_timeout.is_zero() {
            info!("Idle session expiry disabled");
            None
        } else {
            let router = self.router.clone();
            let ttl = self.config.session_idle_timeout;
            let period = self.config.cleanup_interval;
            Some(tokio::spawn(async move {
                Self::run_cleanup_loop(router, ttl, period).await;
            }))
        };

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let Ok(slot) = self.connection_slots.clone().try_acquire_owned() else {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            };

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr, slot);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_signalled(&mut shutdown_rx) => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if let Some(handle) = cleanup_handle {
            handle.abort();
        }

        self.drain_connections(SHUTDOWN_GRACE).await;
        info!("Server stopped");

        Ok(())
    }

    /// Handle a new WebSocket connection.
    ///
    /// `slot` counts the connection against the limit from accept onwards,
    /// handshake included.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, slot: OwnedSemaphorePermit) {
        let router = self.router.clone();
        let allowed_origin = self.config.allowed_origin.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let _slot = slot;

            let check_origin = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let origin = req.headers().get(ORIGIN).and_then(|v| v.to_str().ok());
                if origin_allowed(&allowed_origin, origin) {
                    return Ok(resp);
                }

                warn!("Rejected {} from origin {:?}", addr, origin);
                let mut rejection = ErrorResponse::new(Some("Origin not allowed".to_string()));
                *rejection.status_mut() = StatusCode::FORBIDDEN;
                Err(rejection)
            };

            let ws_stream = match accept_hdr_async(stream, check_origin).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let client_id = ClientId::new();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<ServerMessage>();

            router.clients().register(client_id, addr, msg_tx.clone()).await;
            info!("Connected: {} from {}", client_id, addr);
            let _ = msg_tx.send(ServerMessage::Connected { client_id });

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
                let _ = ws_sender.close().await;
            });

            // Handle incoming messages
            let reason = loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientEnvelope::from_json(&text) {
                                    Ok(envelope) => router.dispatch(client_id, envelope).await,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", client_id.short(), e);
                                        let _ = msg_tx.send(invalid_message("Invalid message format"));
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                let _ = msg_tx.send(invalid_message("Binary frames are not supported"));
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                break "client closed connection";
                            }
                            Some(Err(e)) => {
                                debug!("WebSocket error for {}: {}", client_id.short(), e);
                                break "transport error";
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_signalled(&mut shutdown_rx) => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        });
                        break "server shutdown";
                    }
                }
            };

            router.handle_disconnect(client_id, reason).await;

            // Writer exits once every sender is gone and the queue is flushed
            drop(msg_tx);
            if timeout(SHUTDOWN_GRACE, sender_task).await.is_err() {
                debug!("Writer for {} did not flush in time", client_id.short());
            }
        });
    }

    /// Periodically reclaim idle sessions.
    async fn run_cleanup_loop(router: Arc<EventRouter>, ttl: Duration, period: Duration) {
        let mut ticker = interval(period);

        loop {
            ticker.tick().await;

            let expired = router.expire_idle_sessions(ttl).await;
            if expired > 0 {
                info!("Expired {} idle sessions", expired);
            }
        }
    }

    /// Wait until every connection task has unregistered, up to `grace`.
    async fn drain_connections(&self, grace: Duration) {
        let deadline = Instant::now() + grace;

        while Instant::now() < deadline {
            if self.router.clients().connection_count().await == 0 {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }

        warn!(
            "{} connections still open after shutdown grace period",
            self.router.clients().connection_count().await
        );
    }

    /// Signal shutdown. Takes effect even if `run` has not started yet.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.router.clients().connection_count().await
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.router.session_count().await
    }
}

/// Resolves once shutdown is signalled, or immediately if it already was.
async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn invalid_message(message: &str) -> ServerMessage {
    ServerMessage::Error(ServerError {
        code: ErrorCode::InvalidMessage,
        message: message.to_string(),
    })
}
