//! Session Registry
//!
//! The single owner of every live [`Session`]. The registry itself does no
//! locking: the event router wraps it in one mutex and holds that lock for a
//! whole handler, which keeps each check-then-act sequence atomic.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::core::id::{new_session_id, ClientId, SessionId};
use crate::game::session::{Session, SessionError};

/// Fresh ids tried before `create` gives up.
const MAX_ID_ATTEMPTS: usize = 8;

/// All active sessions, keyed by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, Session>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
        }
    }

    /// Open a session with `creator` in the first seat.
    pub fn create(&mut self, creator: ClientId) -> Result<SessionId, SessionError> {
        self.create_with(creator, new_session_id)
    }

    /// Open a session using a caller-supplied id source.
    ///
    /// Ids already in use are re-rolled.
    pub fn create_with<F>(&mut self, creator: ClientId, mut next_id: F) -> Result<SessionId, SessionError>
    where
        F: FnMut() -> SessionId,
    {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = next_id();
            if self.sessions.contains_key(&id) {
                debug!("Session id {} collided, re-rolling", id);
                continue;
            }

            self.sessions.insert(id.clone(), Session::new(id.clone(), creator));
            return Ok(id);
        }

        Err(SessionError::Internal(format!(
            "could not allocate a unique session id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    /// Seat `joiner` in an existing session.
    pub fn join(&mut self, id: &SessionId, joiner: ClientId) -> Result<(), SessionError> {
        self.get_mut(id)?.add_participant(joiner)
    }

    /// Look up a session.
    pub fn get(&self, id: &SessionId) -> Result<&Session, SessionError> {
        self.sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Look up a session for mutation.
    pub fn get_mut(&mut self, id: &SessionId) -> Result<&mut Session, SessionError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Remove a session. Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        self.sessions.remove(id)
    }

    /// Whether a session exists.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Remove sessions idle for longer than `ttl` as of `now`.
    ///
    /// Returns the removed sessions so the caller can notify their groups.
    pub fn expire_idle(&mut self, now: Instant, ttl: Duration) -> Vec<Session> {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_activity()) > ttl)
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| self.sessions.remove(id))
            .collect()
    }

    /// Active session count.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are active.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let mut registry = SessionRegistry::new();
        let creator = ClientId::new();

        let id = registry.create(creator).unwrap();
        assert_eq!(registry.len(), 1);

        let session = registry.get(&id).unwrap();
        assert_eq!(session.participants(), &[creator]);
        assert_eq!(session.id, id);
    }

    #[test]
    fn test_join_then_full() {
        let mut registry = SessionRegistry::new();
        let id = registry.create(ClientId::new()).unwrap();

        registry.join(&id, ClientId::new()).unwrap();
        assert_eq!(registry.get(&id).unwrap().participants().len(), 2);

        let third = registry.join(&id, ClientId::new());
        assert_eq!(third, Err(SessionError::Full));
    }

    #[test]
    fn test_join_unknown_session() {
        let mut registry = SessionRegistry::new();
        let missing = SessionId::from("nope");
        let result = registry.join(&missing, ClientId::new());
        assert_eq!(result, Err(SessionError::NotFound(missing)));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = SessionRegistry::new();
        let id = registry.create(ClientId::new()).unwrap();

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
        assert!(matches!(registry.get(&id), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_colliding_id_is_rerolled() {
        let mut registry = SessionRegistry::new();
        let first = registry
            .create_with(ClientId::new(), || SessionId::from("same"))
            .unwrap();

        let mut ids = vec![SessionId::from("fresh"), SessionId::from("same")];
        let second = registry
            .create_with(ClientId::new(), || ids.pop().unwrap())
            .unwrap();

        assert_eq!(first, SessionId::from("same"));
        assert_eq!(second, SessionId::from("fresh"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_exhausted_id_source_fails() {
        let mut registry = SessionRegistry::new();
        registry
            .create_with(ClientId::new(), || SessionId::from("same"))
            .unwrap();

        let result = registry.create_with(ClientId::new(), || SessionId::from("same"));
        assert!(matches!(result, Err(SessionError::Internal(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_expire_idle() {
        let mut registry = SessionRegistry::new();
        let id = registry.create(ClientId::new()).unwrap();
        let ttl = Duration::from_secs(60);

        let expired = registry.expire_idle(Instant::now(), ttl);
        assert!(expired.is_empty());
        assert!(registry.contains(&id));

        let later = Instant::now() + Duration::from_secs(61);
        let expired = registry.expire_idle(later, ttl);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, id);
        assert!(!registry.contains(&id));
    }
}
