//! Game Logic Module
//!
//! Session state and the rules that act on it. Synchronous and free of I/O;
//! the network layer decides when these run.
//!
//! ## Module Structure
//!
//! - `board`: Board shape and position validation
//! - `session`: One match between two participants
//! - `registry`: All live sessions, keyed by id
//! - `resolver`: Hit counting and win detection

pub mod board;
pub mod registry;
pub mod resolver;
pub mod session;

// Re-export key types
pub use board::{Board, BoardError, Cell, Position, BOARD_CELLS, BOATS_PER_BOARD};
pub use registry::SessionRegistry;
pub use resolver::{resolve_attack_result, Resolution, ShotResult, HITS_TO_WIN};
pub use session::{Session, SessionError, SessionPhase};
