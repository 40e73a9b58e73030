//! Identifiers
//!
//! Connection addresses and session ids.
//!
//! A [`ClientId`] is minted by the transport for every accepted connection and
//! lives exactly as long as that connection. A [`SessionId`] is the short
//! opaque code players type to find each other.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Base-36 alphabet used for session ids.
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of random characters at the front of a session id.
pub const SESSION_ID_RANDOM_LEN: usize = 6;

/// Number of timestamp characters at the end of a session id.
pub const SESSION_ID_TIME_LEN: usize = 4;

/// Total session id length.
pub const SESSION_ID_LEN: usize = SESSION_ID_RANDOM_LEN + SESSION_ID_TIME_LEN;

// =============================================================================
// CLIENT ID
// =============================================================================

/// Per-connection client address.
///
/// Implements Ord so it can key `BTreeMap`s with stable iteration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(uuid::Uuid);

impl ClientId {
    /// Mint a fresh random address.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from the hyphenated UUID form.
    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self)
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// SESSION ID
// =============================================================================

/// Opaque session identifier shared out-of-band between the two players.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a client-supplied id. No shape check: unknown ids simply miss.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// GENERATOR
// =============================================================================

/// Generate a session id from a random source and a millisecond timestamp.
///
/// Layout: six random base-36 characters followed by the last four base-36
/// digits of `now_millis`. Uniqueness is not checked here; the registry
/// re-rolls on collision.
pub fn generate_session_id<R: Rng + ?Sized>(rng: &mut R, now_millis: i64) -> SessionId {
    let mut id = String::with_capacity(SESSION_ID_LEN);

    for _ in 0..SESSION_ID_RANDOM_LEN {
        id.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }

    let time = to_base36(now_millis.unsigned_abs());
    let tail_start = time.len().saturating_sub(SESSION_ID_TIME_LEN);
    // Left-pad so very small timestamps still give a fixed-length id.
    for _ in time.len()..SESSION_ID_TIME_LEN {
        id.push('0');
    }
    id.push_str(&time[tail_start..]);

    SessionId(id)
}

/// Generate a session id from the thread RNG and the wall clock.
pub fn new_session_id() -> SessionId {
    generate_session_id(&mut rand::thread_rng(), super::clock::now_millis())
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    String::from_utf8(digits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_time_suffix_is_last_four_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = generate_session_id(&mut rng, 1_700_000_000_000);
        assert_eq!(id.as_str().len(), SESSION_ID_LEN);
        assert!(id.as_str().ends_with("v28"));
        assert_eq!(&id.as_str()[SESSION_ID_RANDOM_LEN..], "3v28");
    }

    #[test]
    fn test_small_timestamp_is_padded() {
        let mut rng = StdRng::seed_from_u64(1);
        let id = generate_session_id(&mut rng, 35);
        assert_eq!(&id.as_str()[SESSION_ID_RANDOM_LEN..], "000z");
    }

    #[test]
    fn test_same_millisecond_differs_by_random_part() {
        let mut rng = StdRng::seed_from_u64(99);
        let a = generate_session_id(&mut rng, 1_000_000);
        let b = generate_session_id(&mut rng, 1_000_000);
        assert_ne!(a, b);
    }

    #[test]
    fn test_client_id_roundtrip_through_string() {
        let id = ClientId::new();
        let parsed = ClientId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_client_id_serializes_as_plain_string() {
        let id = ClientId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    proptest! {
        #[test]
        fn prop_session_id_shape(seed in any::<u64>(), now in 0i64..i64::MAX) {
            let mut rng = StdRng::seed_from_u64(seed);
            let id = generate_session_id(&mut rng, now);
            prop_assert_eq!(id.as_str().len(), SESSION_ID_LEN);
            prop_assert!(id.as_str().bytes().all(|b| BASE36.contains(&b)));
        }
    }
}
