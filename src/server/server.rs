use super::registry::ConnectionId;
use super::router::Router;
use crate::channel::{Channel, Outbound, Reader};
use crate::p2p::PeerLink;
use crate::protocol::{Reason, Record};
use crate::Result;

use colored::Colorize;
use futures::stream::{self, BoxStream, SelectAll};
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

/// Pause after a failed `accept` so a persistent error does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

enum ClientEvent {
    Record(io::Result<Record>),
    Closed,
}

enum Event {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Client(ConnectionId, ClientEvent),
    Peer(Option<io::Result<Record>>),
    Timer,
}

/// The replica's event loop.
///
/// A single task owns the [Router] and waits on the listener, every client socket, the
/// peer link and the phase timer deadline at once. Each event is handled to completion
/// before the next one is taken, then the router's outbox is written out.
pub struct Server {
    listener: TcpListener,
    router: Router,
    /// Outbound queues of the open client connections.
    connections: HashMap<ConnectionId, Outbound>,
    clients: SelectAll<BoxStream<'static, (ConnectionId, ClientEvent)>>,
    next_connection: u64,
    peer: Option<Outbound>,
    peer_reader: Option<Reader>,
}

impl Server {
    pub fn new(listener: TcpListener, router: Router, link: PeerLink) -> Server {
        let (peer, peer_reader) = link.into_parts();
        Server {
            listener,
            router,
            connections: HashMap::new(),
            clients: SelectAll::new(),
            next_connection: 0,
            peer: Some(peer),
            peer_reader: Some(peer_reader),
        }
    }

    /// Starts the auction and serves forever. Only a listener without a local address
    /// ends it early.
    pub async fn run(mut self) -> Result<()> {
        info!("serving on {:?}", self.listener.local_addr()?);
        self.router.start(Instant::now());
        self.flush();

        loop {
            let event = self.next_event().await;
            self.handle(event).await;
            self.flush();
        }
    }

    async fn next_event(&mut self) -> Event {
        let deadline = self.router.deadline();
        tokio::select! {
            accepted = self.listener.accept() => Event::Accepted(accepted),
            Some((connection, event)) = self.clients.next(), if !self.clients.is_empty() => {
                Event::Client(connection, event)
            }
            record = next_peer_record(&mut self.peer_reader) => Event::Peer(record),
            _ = wait_until(deadline) => Event::Timer,
        }
    }

    async fn handle(&mut self, event: Event) {
        match event {
            Event::Accepted(Ok((socket, _))) => self.on_accept(socket),
            Event::Accepted(Err(err)) => {
                // e.g. the client reset before accept, or the fd table is full
                warn!("accept failed: {}, retrying in {:?}", err, ACCEPT_BACKOFF);
                sleep(ACCEPT_BACKOFF).await;
            }
            Event::Client(connection, ClientEvent::Record(Ok(record))) => {
                if record.is_peer_only() {
                    warn!("{} sent peer-only {} record", connection, record.kind());
                } else {
                    self.router.handle_client(connection, record, Instant::now());
                }
            }
            Event::Client(connection, ClientEvent::Record(Err(err))) => {
                // the reader ends after an error, `Closed` follows
                warn!("{} read failed: {}", connection, err);
            }
            Event::Client(connection, ClientEvent::Closed) => {
                debug!("{} closed", connection);
                let _ = self.connections.remove(&connection);
                self.router.on_disconnect(connection);
            }
            Event::Peer(Some(Ok(record))) => self.router.handle_peer(record, Instant::now()),
            Event::Peer(Some(Err(err))) => {
                error!("{} peer link read failed: {}", "[p2p]".red(), err);
                self.peer_reader = None;
            }
            Event::Peer(None) => {
                error!("{} peer link closed", "[p2p]".red());
                self.peer_reader = None;
            }
            Event::Timer => self.router.on_timer(Instant::now()),
        }
    }

    fn on_accept(&mut self, socket: TcpStream) {
        let channel = match Channel::wrap(socket) {
            Ok(channel) => channel,
            Err(err) => {
                warn!("dropping connection: {}", err);
                return;
            }
        };
        if self.connections.len() >= self.router.max_connections() {
            warn!(
                "rejecting {}: {} connections open",
                channel.peer_addr(),
                self.connections.len()
            );
            let (outbound, _reader) = channel.split_queued();
            let _ = outbound.send(Record::error(Reason::MaxConnections));
            return;
        }
        self.next_connection += 1;
        let connection = ConnectionId(self.next_connection);
        debug!("{} accepted from {}", connection, channel.peer_addr());

        let (outbound, reader) = channel.split_queued();
        let events = reader
            .map(move |record| (connection, ClientEvent::Record(record)))
            .chain(stream::once(async move { (connection, ClientEvent::Closed) }))
            .boxed();
        self.clients.push(events);
        self.connections.insert(connection, outbound);
    }

    /// Writes out everything the router queued while handling the last event.
    fn flush(&mut self) {
        let outbox = self.router.take_outbox();
        for (connection, record) in outbox.direct.into_iter() {
            self.send_to(connection, record);
        }
        if !outbox.broadcast.is_empty() {
            for connection in self.router.registry().connections() {
                for record in outbox.broadcast.iter() {
                    self.send_to(connection, record.clone());
                }
            }
        }
        for record in outbox.peer.into_iter() {
            self.send_to_peer(record);
        }
    }

    fn send_to(&mut self, connection: ConnectionId, record: Record) {
        match self.connections.get(&connection) {
            Some(outbound) => {
                if outbound.send(record).is_err() {
                    debug!("{} writer gone", connection);
                    let _ = self.connections.remove(&connection);
                }
            }
            None => debug!("{} no longer open, dropping {}", connection, record.kind()),
        }
    }

    fn send_to_peer(&mut self, record: Record) {
        let failed = match self.peer {
            Some(ref peer) => peer.send(record).is_err(),
            None => {
                debug!("peer link down, dropping {}", record.kind());
                false
            }
        };
        if failed {
            error!("{} peer link writer gone, syncs will be dropped", "[p2p]".red());
            self.peer = None;
        }
    }
}

async fn next_peer_record(reader: &mut Option<Reader>) -> Option<io::Result<Record>> {
    match reader {
        Some(reader) => reader.next().await,
        None => futures::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}
