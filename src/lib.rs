//! # Broadside Game Server
//!
//! Session coordinator for two-player Broadside matches on a 6x6 grid.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BROADSIDE SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── id.rs       - Client and session identifiers            │
//! │  └── clock.rs    - Wall-clock helpers                        │
//! │                                                              │
//! │  game/           - Session state (synchronous, no I/O)       │
//! │  ├── board.rs    - Board shape and position checks           │
//! │  ├── session.rs  - One match between two participants        │
//! │  ├── registry.rs - All live sessions                         │
//! │  └── resolver.rs - Hit counting and win detection            │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - WebSocket server and configuration        │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── router.rs   - Event handling, one lock per event        │
//! │  └── clients.rs  - Connections and session groups            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Trust Model
//!
//! The server never sees where a boat is placed beyond the submitted board,
//! and never checks a shot against it. The defender reports hit or miss and
//! the server counts what it is told. Six reported hits against one board end
//! the match in favour of the other participant.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::id::{ClientId, SessionId};
pub use game::board::{Board, Cell, BOARD_CELLS, BOATS_PER_BOARD};
pub use game::registry::SessionRegistry;
pub use game::resolver::ShotResult;
pub use network::server::{GameServer, GameServerError, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
