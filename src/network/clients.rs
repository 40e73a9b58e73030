//! Client Directory
//!
//! Address book for live connections plus named groups. A group is the set of
//! connections bound to one session; broadcasting to a session reaches every
//! member still connected.
//!
//! Senders are unbounded so a send never waits on a slow socket. This lets
//! the router deliver while it still holds the registry lock.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::core::id::{ClientId, SessionId};
use crate::network::protocol::ServerMessage;

/// Outbound channel to one connection's writer task.
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

/// Connected client state.
struct ConnectedClient {
    /// Remote address.
    peer: SocketAddr,
    /// Connection time.
    connected_at: Instant,
    /// Message sender.
    sender: ClientSender,
    /// Groups this client belongs to.
    groups: BTreeSet<SessionId>,
}

#[derive(Default)]
struct Directory {
    clients: BTreeMap<ClientId, ConnectedClient>,
    groups: BTreeMap<SessionId, BTreeSet<ClientId>>,
}

/// Live connections and their groups.
#[derive(Default)]
pub struct ClientDirectory {
    inner: RwLock<Directory>,
}

impl ClientDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    pub async fn register(&self, id: ClientId, peer: SocketAddr, sender: ClientSender) {
        let mut dir = self.inner.write().await;
        dir.clients.insert(id, ConnectedClient {
            peer,
            connected_at: Instant::now(),
            sender,
            groups: BTreeSet::new(),
        });
    }

    /// Drop a connection and its group memberships.
    ///
    /// Returns how long the connection lived, or `None` if it was unknown.
    pub async fn unregister(&self, id: &ClientId) -> Option<Duration> {
        let mut dir = self.inner.write().await;
        let client = dir.clients.remove(id)?;

        for group in &client.groups {
            let now_empty = match dir.groups.get_mut(group) {
                Some(members) => {
                    members.remove(id);
                    members.is_empty()
                }
                None => false,
            };
            if now_empty {
                dir.groups.remove(group);
            }
        }

        debug!("Client {} ({}) unregistered", id.short(), client.peer);
        Some(client.connected_at.elapsed())
    }

    /// Send to one client. Returns false if it is gone.
    pub async fn send_to(&self, id: &ClientId, message: ServerMessage) -> bool {
        let dir = self.inner.read().await;
        match dir.clients.get(id) {
            Some(client) => client.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Bind a connected client to a group. Unknown clients are ignored.
    pub async fn join_group(&self, group: &SessionId, id: ClientId) -> bool {
        let mut dir = self.inner.write().await;
        let Some(client) = dir.clients.get_mut(&id) else {
            return false;
        };
        client.groups.insert(group.clone());
        dir.groups.entry(group.clone()).or_default().insert(id);
        true
    }

    /// Send to every member of a group. Returns the number reached.
    pub async fn broadcast(&self, group: &SessionId, message: ServerMessage) -> usize {
        let dir = self.inner.read().await;
        let Some(members) = dir.groups.get(group) else {
            return 0;
        };

        members
            .iter()
            .filter_map(|id| dir.clients.get(id))
            .filter(|client| client.sender.send(message.clone()).is_ok())
            .count()
    }

    /// Dissolve a group.
    pub async fn close_group(&self, group: &SessionId) {
        let mut dir = self.inner.write().await;
        let Some(members) = dir.groups.remove(group) else {
            return;
        };
        for id in members {
            if let Some(client) = dir.clients.get_mut(&id) {
                client.groups.remove(group);
            }
        }
    }

    /// Current members of a group.
    pub async fn group_members(&self, group: &SessionId) -> Vec<ClientId> {
        let dir = self.inner.read().await;
        dir.groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Active connection count.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.clients.len()
    }
}
