//! Network Layer
//!
//! WebSocket server, wire protocol and event routing.
//! Everything stateful about a match lives in `game/`; this layer only moves
//! messages and decides who receives them.

pub mod clients;
pub mod protocol;
pub mod router;
pub mod server;

pub use clients::ClientDirectory;
pub use protocol::{ClientEnvelope, ClientMessage, ErrorCode, Reply, ServerMessage};
pub use router::{Effect, EventRouter};
pub use server::{GameServer, GameServerError, ServerConfig};
