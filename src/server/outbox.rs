use super::registry::ConnectionId;
use crate::protocol::Record;

/// Records produced while handling one event, waiting for the event loop to write them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outbox {
    /// Records for one specific connection, in order.
    pub direct: Vec<(ConnectionId, Record)>,
    /// Records for every connection holding a registered session.
    pub broadcast: Vec<Record>,
    /// Records for the peer replica, in FIFO order.
    pub peer: Vec<Record>,
}

impl Outbox {
    pub fn new() -> Self {
        Outbox::default()
    }

    pub fn reply(&mut self, connection: ConnectionId, record: Record) {
        self.direct.push((connection, record));
    }

    pub fn broadcast(&mut self, record: Record) {
        self.broadcast.push(record);
    }

    pub fn sync(&mut self, record: Record) {
        self.peer.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.broadcast.is_empty() && self.peer.is_empty()
    }

    /// Takes the queued records, leaving the outbox empty.
    pub fn take(&mut self) -> Outbox {
        std::mem::take(self)
    }

    /// Records queued for `connection` alone.
    pub fn replies_to(&self, connection: ConnectionId) -> Vec<&Record> {
        self.direct.iter().filter(|(c, _)| *c == connection).map(|(_, r)| r).collect()
    }
}
