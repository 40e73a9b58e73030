//! Core primitives.
//!
//! Identifiers and the wall clock. Nothing here knows about sessions or the
//! network.

pub mod clock;
pub mod id;

// Re-export core types
pub use id::{generate_session_id, new_session_id, ClientId, SessionId};
