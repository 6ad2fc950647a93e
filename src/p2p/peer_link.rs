use super::linear_backoff::LinearBackoff;
use crate::channel::{Channel, Outbound, Reader};
use crate::protocol::Record;
use crate::{Error, Result};

use colored::Colorize;
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

use std::net::SocketAddr;

/// How long an accepted connection may take to prove it is the peer.
pub const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// The single connection between the two replicas.
///
/// Outgoing sync records are queued and written by a background task in FIFO order;
/// incoming ones are read from `reader` by the event loop.
pub struct PeerLink {
    peer_addr: SocketAddr,
    outbound: Outbound,
    reader: Reader,
}

impl PeerLink {
    /// Sets up the link. The replica with the lower listening address dials, the other
    /// one waits on its `listener` for the `peer_hello`.
    pub async fn establish(
        listener: &TcpListener,
        self_ip: SocketAddr,
        peer_ip: SocketAddr,
        retry: Duration,
    ) -> Result<PeerLink> {
        if self_ip == peer_ip {
            return Err(Error::InvalidAddress(peer_ip.to_string()));
        }
        let link = if self_ip < peer_ip {
            PeerLink::dial(self_ip, peer_ip, retry).await?
        } else {
            PeerLink::await_hello(listener).await?
        };
        info!("{} peer link up with {}", "[p2p]".green(), link.peer_addr);
        Ok(link)
    }

    /// Connects to `peer_ip`, retrying with linear backoff, and introduces itself.
    pub async fn dial(self_ip: SocketAddr, peer_ip: SocketAddr, retry: Duration) -> Result<PeerLink> {
        let mut backoff = LinearBackoff::new(retry);
        let channel = loop {
            match Channel::connect(&peer_ip).await {
                Ok(channel) => break channel,
                Err(err) => {
                    let delay = backoff.next_delay();
                    debug!(
                        "peer {} unreachable ({}), attempt {}, retrying in {:?}",
                        peer_ip,
                        err,
                        backoff.epoch(),
                        delay
                    );
                    sleep(delay).await;
                }
            }
        };
        let peer_addr = channel.peer_addr();
        let (outbound, reader) = channel.split_queued();
        outbound
            .send(Record::PeerHello { from: self_ip.to_string() })
            .map_err(|_| Error::PeerDisconnected)?;
        Ok(PeerLink { peer_addr, outbound, reader })
    }

    /// Accepts connections until one opens with a `peer_hello`. Anything else is dropped.
    pub async fn await_hello(listener: &TcpListener) -> Result<PeerLink> {
        loop {
            let channel = Channel::accept(listener).await?;
            let remote = channel.peer_addr();
            let (outbound, mut reader) = channel.split_queued();
            match timeout(HELLO_TIMEOUT, reader.next()).await {
                Ok(Some(Ok(Record::PeerHello { from }))) => {
                    debug!("peer_hello from {} ({})", from, remote);
                    return Ok(PeerLink { peer_addr: remote, outbound, reader });
                }
                Ok(Some(Ok(other))) => {
                    warn!("dropping {}: expected peer_hello, got {}", remote, other.kind())
                }
                Ok(Some(Err(err))) => warn!("dropping {}: {}", remote, err),
                Ok(None) => warn!("{} closed before peer_hello", remote),
                Err(_) => warn!("dropping {}: no peer_hello within {:?}", remote, HELLO_TIMEOUT),
            }
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Queues `record` for the peer.
    pub fn send(&self, record: Record) -> Result<()> {
        self.outbound.send(record).map_err(|_| Error::PeerDisconnected)
    }

    /// Reads the next record from the peer.
    pub async fn recv(&mut self) -> Result<Record> {
        match self.reader.next().await {
            Some(record) => Ok(record?),
            None => Err(Error::PeerDisconnected),
        }
    }

    pub fn into_parts(self) -> (Outbound, Reader) {
        (self.outbound, self.reader)
    }
}
