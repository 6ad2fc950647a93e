use crate::auction::Identity;
use crate::protocol::Reason;

use std::collections::HashMap;
use std::fmt;

/// Identifies one accepted client socket for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Binds authenticated bidder identities to their live connections, one session per
/// identity.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<Identity, ConnectionId>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { sessions: HashMap::new() }
    }

    pub fn register(&mut self, identity: &str, connection: ConnectionId) -> Result<(), Reason> {
        if self.sessions.contains_key(identity) {
            return Err(Reason::DuplicateIdentity);
        }
        self.sessions.insert(identity.to_owned(), connection);
        Ok(())
    }

    /// Removes the session, if any. Returns the connection it was bound to.
    pub fn unregister(&mut self, identity: &str) -> Option<ConnectionId> {
        self.sessions.remove(identity)
    }

    /// Removes every session bound to `connection`, as when its socket closes.
    pub fn unregister_connection(&mut self, connection: ConnectionId) -> Vec<Identity> {
        let identities: Vec<Identity> = self
            .sessions
            .iter()
            .filter(|(_, c)| **c == connection)
            .map(|(identity, _)| identity.clone())
            .collect();
        for identity in identities.iter() {
            self.sessions.remove(identity);
        }
        identities
    }

    pub fn lookup(&self, identity: &str) -> Option<ConnectionId> {
        self.sessions.get(identity).cloned()
    }

    pub fn is_registered(&self, connection: ConnectionId) -> bool {
        self.sessions.values().any(|c| *c == connection)
    }

    /// Every connection that currently holds a session, each listed once.
    pub fn connections(&self) -> Vec<ConnectionId> {
        let mut connections: Vec<ConnectionId> = self.sessions.values().cloned().collect();
        connections.sort();
        connections.dedup();
        connections
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
