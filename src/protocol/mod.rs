//! The auction wire protocol.
//!
//! Every record is a flat JSON object whose `header` field names its kind. Records flow
//! between bidders and a replica, and (for the `sync_*`, `stop_bid` and `peer_hello`
//! kinds) between the two replicas over the peer link.

mod reason;

pub use reason::Reason;

use crate::auction::{Identity, ItemId, Price};

/// A summary of one catalog entry, as sent in the `items` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub item_id: ItemId,
    pub description: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<Identity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "header", rename_all = "snake_case")]
pub enum Record {
    // Sessions
    Connect {
        identity: Identity,
    },
    Ack,
    Items {
        items: Vec<ItemSummary>,
        #[serde(default)]
        current: Option<ItemId>,
    },
    Quit {
        identity: Identity,
    },
    Error {
        reason: Reason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<ItemId>,
    },

    // Bidding
    Interested {
        identity: Identity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        price: Option<Price>,
    },
    AckInterest,
    Bid {
        item_id: ItemId,
        price: Price,
        identity: Identity,
    },
    NewHighBid {
        item_id: ItemId,
        price: Price,
        bidder: Identity,
    },
    PriceUpdate {
        item_id: ItemId,
        price: Price,
    },

    // Item lifecycle
    StartBid {
        item_id: ItemId,
        price: Price,
        description: String,
    },
    StopBid {
        item_id: ItemId,
        #[serde(default)]
        winner: Option<Identity>,
    },
    Complete,

    // Replica synchronisation
    PeerHello {
        from: String,
    },
    SyncPrice {
        item_id: ItemId,
        price: Price,
        #[serde(default)]
        identity: Option<Identity>,
    },
    SyncInterest {
        identity: Identity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<ItemId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        price: Option<Price>,
    },
}

impl Record {
    /// The value of the `header` field, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Connect { .. } => "connect",
            Record::Ack => "ack",
            Record::Items { .. } => "items",
            Record::Quit { .. } => "quit",
            Record::Error { .. } => "error",
            Record::Interested { .. } => "interested",
            Record::AckInterest => "ack_interest",
            Record::Bid { .. } => "bid",
            Record::NewHighBid { .. } => "new_high_bid",
            Record::PriceUpdate { .. } => "price_update",
            Record::StartBid { .. } => "start_bid",
            Record::StopBid { .. } => "stop_bid",
            Record::Complete => "complete",
            Record::PeerHello { .. } => "peer_hello",
            Record::SyncPrice { .. } => "sync_price",
            Record::SyncInterest { .. } => "sync_interest",
        }
    }

    /// Whether this kind is only ever exchanged between the two replicas.
    pub fn is_peer_only(&self) -> bool {
        match self {
            Record::PeerHello { .. } | Record::SyncPrice { .. } | Record::SyncInterest { .. } => {
                true
            }
            _ => false,
        }
    }

    pub fn error(reason: Reason) -> Record {
        Record::Error { reason, item_id: None }
    }

    pub fn item_error(reason: Reason, item_id: ItemId) -> Record {
        Record::Error { reason, item_id: Some(item_id) }
    }
}
