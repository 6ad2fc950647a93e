use super::outbox::Outbox;
use super::registry::{ConnectionId, Registry};
use crate::auction::{self, ItemId, Ledger, Merge, PhaseTimer, Transition};
use crate::protocol::{Reason, Record};

use colored::Colorize;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Dispatches inbound records against the replica's ledger and session registry.
///
/// The router never touches a socket: every record it wants written lands in its
/// [Outbox], which the event loop drains after each event. It also owns the phase timer,
/// whose deadline the event loop waits on.
pub struct Router {
    ledger: Ledger,
    registry: Registry,
    timer: PhaseTimer,
    /// `M`, the number of timeout rounds an item survives before it is closed.
    max_rounds: u32,
    max_connections: usize,
    outbox: Outbox,
    /// Whether the `complete` notice has gone out.
    complete: bool,
}

impl Router {
    pub fn new(ledger: Ledger, interval: Duration, max_rounds: u32, max_connections: usize) -> Self {
        Router {
            ledger,
            registry: Registry::new(),
            timer: PhaseTimer::new(interval),
            max_rounds,
            max_connections,
            outbox: Outbox::new(),
            complete: false,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn take_outbox(&mut self) -> Outbox {
        self.outbox.take()
    }

    /// Opens the auction on the first catalog item and arms the phase timer.
    pub fn start(&mut self, now: Instant) {
        if self.ledger.curr_item_id().is_some() || self.complete {
            return;
        }
        let next = self.ledger.advance();
        self.announce_next(next, now);
    }

    // Client records

    pub fn handle_client(&mut self, connection: ConnectionId, record: Record, now: Instant) {
        debug!("{} <- {:?}", connection, record);
        match record {
            Record::Connect { identity } => self.on_connect(connection, identity),
            Record::Bid { item_id, price, identity } => {
                if self.owns(connection, &identity) {
                    self.on_bid(connection, item_id, price, identity, now)
                } else {
                    self.outbox.reply(connection, Record::item_error(Reason::NotAccepting, item_id))
                }
            }
            Record::Interested { identity, .. } if !self.owns(connection, &identity) => {
                self.outbox.reply(connection, Record::error(Reason::NotAccepting))
            }
            Record::Interested { identity, price } => {
                match self.ledger.record_interest(&identity, price) {
                    Ok(item_id) => {
                        info!("{} interested in item {}", identity, item_id);
                        self.outbox.sync(Record::SyncInterest {
                            identity,
                            item_id: Some(item_id),
                            price,
                        });
                        self.outbox.reply(connection, Record::AckInterest);
                    }
                    Err(reason) => self.outbox.reply(connection, Record::error(reason)),
                }
            }
            Record::Quit { identity } => {
                if self.registry.lookup(&identity) == Some(connection) {
                    let _ = self.registry.unregister(&identity);
                    info!("{} quit", identity);
                } else {
                    debug!("{} sent quit for foreign identity {}", connection, identity);
                }
            }
            other => warn!("{} sent unexpected {} record", connection, other.kind()),
        }
    }

    /// Whether `identity` is the session bound to `connection`.
    fn owns(&self, connection: ConnectionId, identity: &str) -> bool {
        let owned = self.registry.lookup(identity) == Some(connection);
        if !owned {
            warn!("{} is not the session of {}", connection, identity);
        }
        owned
    }

    fn on_connect(&mut self, connection: ConnectionId, identity: String) {
        if self.registry.lookup(&identity).is_some() {
            warn!("{} rejected: {} is already connected", connection, identity);
            self.outbox.reply(connection, Record::error(Reason::DuplicateIdentity));
            return;
        }
        if self.registry.len() >= self.max_connections {
            warn!("{} rejected: {} sessions open", connection, self.registry.len());
            self.outbox.reply(connection, Record::error(Reason::MaxConnections));
            return;
        }
        if let Err(reason) = self.registry.register(&identity, connection) {
            self.outbox.reply(connection, Record::error(reason));
            return;
        }
        info!("{} registered as {}", connection, identity.green());

        self.outbox.reply(connection, Record::Ack);
        self.outbox.reply(
            connection,
            Record::Items {
                items: self.ledger.items().map(|item| item.summary()).collect(),
                current: self.ledger.curr_item_id(),
            },
        );
        if self.ledger.is_empty() {
            self.outbox.reply(connection, Record::Complete);
        } else if let Some(item) = self.ledger.current_item() {
            self.outbox.reply(
                connection,
                Record::StartBid {
                    item_id: item.id,
                    price: item.price,
                    description: item.description.clone(),
                },
            );
        }
    }

    fn on_bid(
        &mut self,
        connection: ConnectionId,
        item_id: ItemId,
        price: f64,
        identity: String,
        now: Instant,
    ) {
        match self.ledger.apply_bid(item_id, price, &identity) {
            Ok(()) => {
                info!("{} new high bid {} on item {} by {}", "[bid]".cyan(), price, item_id, identity);
                self.outbox.sync(Record::SyncPrice {
                    item_id,
                    price,
                    identity: Some(identity.clone()),
                });
                self.outbox.broadcast(Record::NewHighBid { item_id, price, bidder: identity });
                self.timer.arm(now);
            }
            Err(reason) => {
                debug!("{} bid {} on item {} rejected: {}", identity, price, item_id, reason);
                self.outbox.reply(connection, Record::item_error(reason, item_id));
            }
        }
    }

    /// Forgets the sessions of a connection whose socket closed.
    pub fn on_disconnect(&mut self, connection: ConnectionId) {
        for identity in self.registry.unregister_connection(connection) {
            info!("{} ({}) disconnected", identity, connection);
        }
    }

    // Peer records

    pub fn handle_peer(&mut self, record: Record, now: Instant) {
        debug!("peer <- {:?}", record);
        match record {
            Record::SyncPrice { item_id, price, identity } => {
                match self.ledger.merge_price(item_id, price, identity.clone()) {
                    Merge::Higher => {
                        match identity {
                            Some(bidder) => {
                                self.outbox.broadcast(Record::NewHighBid { item_id, price, bidder })
                            }
                            None => self.outbox.broadcast(Record::PriceUpdate { item_id, price }),
                        }
                        if self.ledger.curr_item_id() == Some(item_id) {
                            self.timer.arm(now);
                        }
                    }
                    Merge::Stale { price: local, holder } => {
                        warn!(
                            "{} stale sync for item {} ({} < {}), repairing peer",
                            "[sync]".yellow(),
                            item_id,
                            price,
                            local
                        );
                        self.outbox.sync(Record::SyncPrice { item_id, price: local, identity: holder });
                    }
                    Merge::Converged => debug!("item {} already converged", item_id),
                    Merge::Unknown => debug!("sync for unknown item {}", item_id),
                }
            }
            Record::SyncInterest { identity, item_id, price } => {
                let target = item_id.or_else(|| self.ledger.curr_item_id());
                let merged = match target {
                    Some(id) => self.ledger.merge_interest(id, &identity, price),
                    None => false,
                };
                if merged {
                    debug!("peer reports {} interested in item {:?}", identity, target);
                } else {
                    debug!("ignoring interest of {} in absent item", identity);
                }
            }
            Record::StopBid { item_id, winner } => self.on_peer_stop(item_id, winner, now),
            Record::PeerHello { from } => warn!("repeated peer_hello from {}", from),
            other => warn!("peer sent unexpected {} record", other.kind()),
        }
    }

    fn on_peer_stop(&mut self, item_id: ItemId, winner: Option<String>, now: Instant) {
        let was_current = self.ledger.curr_item_id() == Some(item_id);
        match self.ledger.remove_item(item_id) {
            Some(_) => {
                info!("{} peer closed item {} (winner: {:?})", "[sync]".yellow(), item_id, winner);
                self.outbox.broadcast(Record::StopBid { item_id, winner });
                if was_current {
                    let next = self.ledger.advance();
                    self.announce_next(next, now);
                }
            }
            None => debug!("item {} already removed", item_id),
        }
    }

    // Phase timer

    /// Runs the phase state machine. Called by the event loop once the deadline passes.
    pub fn on_timer(&mut self, now: Instant) {
        match auction::fire(&mut self.ledger, self.max_rounds) {
            Transition::Idle => self.timer.arm(now),
            Transition::Complete => self.finish(),
            Transition::Discarded { item, next } => {
                info!("{} item {} discarded, nobody interested", "[timer]".yellow(), item.id);
                let stop = Record::StopBid { item_id: item.id, winner: None };
                self.outbox.sync(stop.clone());
                self.outbox.broadcast(stop);
                self.announce_next(next, now);
            }
            Transition::Tick { item_id, timeouts, decayed } => {
                debug!("item {} survived round {}", item_id, timeouts);
                if let Some(price) = decayed {
                    info!("{} item {} lowered to {}", "[timer]".yellow(), item_id, price);
                    self.outbox.broadcast(Record::PriceUpdate { item_id, price });
                }
                self.timer.arm(now);
            }
            Transition::Closed { item, decayed, next } => {
                if let Some(price) = decayed {
                    self.outbox.broadcast(Record::PriceUpdate { item_id: item.id, price });
                }
                match item.holder {
                    Some(ref winner) => info!(
                        "{} item {} awarded to {} for {}",
                        "[timer]".yellow(),
                        item.id,
                        winner.green(),
                        item.price
                    ),
                    None => info!("{} item {} closed without bids", "[timer]".yellow(), item.id),
                }
                let stop = Record::StopBid { item_id: item.id, winner: item.holder };
                self.outbox.sync(stop.clone());
                self.outbox.broadcast(stop);
                self.announce_next(next, now);
            }
        }
    }

    /// Announces the item that just became current, or completes the auction.
    fn announce_next(&mut self, next: Option<ItemId>, now: Instant) {
        let ledger = &self.ledger;
        let start = next.and_then(|id| ledger.get(id)).map(|item| Record::StartBid {
            item_id: item.id,
            price: item.price,
            description: item.description.clone(),
        });
        match start {
            Some(record) => {
                if let Record::StartBid { item_id, ref description, .. } = record {
                    info!("{} item {}: {}", "[start]".cyan(), item_id, description);
                }
                self.outbox.broadcast(record);
                self.timer.arm(now);
            }
            None => self.finish(),
        }
    }

    fn finish(&mut self) {
        self.timer.disable();
        if self.complete {
            return;
        }
        self.complete = true;
        info!("{} auction complete", "[done]".green());
        self.outbox.broadcast(Record::Complete);
    }
}
