//! Framed TCP channels carrying [Record]s.
mod codec;

pub use codec::{decode_all, encode, RecordCodec, DELIMITER, MAX_RECORD_LENGTH};

use crate::protocol::Record;

use futures::prelude::*;
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

pub type Reader = FramedRead<OwnedReadHalf, RecordCodec>;

pub type Writer = FramedWrite<OwnedWriteHalf, RecordCodec>;

/// The sending end of a connection's outbound queue. Records are written in FIFO order.
pub type Outbound = mpsc::UnboundedSender<Record>;

pub struct Channel {
    socket: TcpStream,
    peer_addr: SocketAddr,
}

impl Channel {
    pub async fn connect(address: &SocketAddr) -> std::io::Result<Channel> {
        let socket = TcpStream::connect(address).await?;
        Channel::wrap(socket)
    }

    pub async fn accept(listener: &TcpListener) -> std::io::Result<Channel> {
        let (socket, _) = listener.accept().await?;
        Channel::wrap(socket)
    }

    pub fn wrap(socket: TcpStream) -> std::io::Result<Channel> {
        socket.set_nodelay(true)?;
        let peer_addr = socket.peer_addr()?;
        Ok(Channel { socket, peer_addr })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn split(self) -> (Writer, Reader) {
        let (reader, writer) = self.socket.into_split();
        let reader = FramedRead::new(reader, RecordCodec::new());
        let writer = FramedWrite::new(writer, RecordCodec::new());
        (writer, reader)
    }

    /// Splits the channel and hands the write half to a background task draining an
    /// unbounded queue, so that enqueuing a record never waits on the socket.
    pub fn split_queued(self) -> (Outbound, Reader) {
        let peer_addr = self.peer_addr;
        let (writer, reader) = self.split();
        (spawn_writer(peer_addr, writer), reader)
    }
}

/// Spawns the task which writes queued records to `writer` until the queue closes or the
/// socket fails.
pub fn spawn_writer(peer_addr: SocketAddr, mut writer: Writer) -> Outbound {
    let (tx, mut rx) = mpsc::unbounded_channel::<Record>();
    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            // `feed` buffers; flush once the queue is momentarily empty
            if let Err(err) = writer.feed(record).await {
                warn!("write to {} failed: {}", peer_addr, err);
                return;
            }
            while let Ok(record) = rx.try_recv() {
                if let Err(err) = writer.feed(record).await {
                    warn!("write to {} failed: {}", peer_addr, err);
                    return;
                }
            }
            if let Err(err) = writer.flush().await {
                warn!("flush to {} failed: {}", peer_addr, err);
                return;
            }
        }
        let _ = writer.close().await;
        debug!("writer for {} closed", peer_addr);
    });
    tx
}
