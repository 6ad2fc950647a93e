use crate::auction::{ItemId, Price};
use crate::channel::{Channel, Reader, Writer};
use crate::protocol::Record;
use crate::{Error, Result};
use tracing::debug;

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::time::{timeout, Duration};

/// A bidder's session with one replica.
pub struct Session {
    identity: String,
    writer: Writer,
    reader: Reader,
}

impl Session {
    /// Opens a connection to `address` and sends `connect` for `identity`. The replica's
    /// answer is left for the caller to read.
    pub async fn connect(address: &SocketAddr, identity: &str) -> Result<Session> {
        let channel = Channel::connect(address).await?;
        let (writer, reader) = channel.split();
        let mut session = Session { identity: identity.to_owned(), writer, reader };
        session.send(Record::Connect { identity: identity.to_owned() }).await?;
        Ok(session)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub async fn send(&mut self, record: Record) -> Result<()> {
        debug!("{} -> {:?}", self.identity, record);
        self.writer.send(record).await?;
        Ok(())
    }

    /// Waits for the next record. `None` once the replica closed the connection.
    pub async fn recv(&mut self) -> Result<Option<Record>> {
        match self.reader.next().await {
            Some(record) => Ok(Some(record?)),
            None => Ok(None),
        }
    }

    /// Reads records until one satisfies `predicate`, giving up after `within`.
    pub async fn recv_until<F>(&mut self, within: Duration, mut predicate: F) -> Result<Option<Record>>
    where
        F: FnMut(&Record) -> bool,
    {
        let reader = &mut self.reader;
        let search = async move {
            while let Some(record) = reader.next().await {
                let record = record.map_err(Error::IO)?;
                if predicate(&record) {
                    return Ok(Some(record));
                }
            }
            Err(Error::ConnectionClosed)
        };
        match timeout(within, search).await {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }

    pub async fn interested(&mut self, opening: Option<Price>) -> Result<()> {
        let identity = self.identity.clone();
        self.send(Record::Interested { identity, price: opening }).await
    }

    pub async fn bid(&mut self, item_id: ItemId, price: Price) -> Result<()> {
        let identity = self.identity.clone();
        self.send(Record::Bid { item_id, price, identity }).await
    }

    pub async fn quit(mut self) -> Result<()> {
        let identity = self.identity.clone();
        self.send(Record::Quit { identity }).await?;
        self.writer.close().await?;
        Ok(())
    }
}
