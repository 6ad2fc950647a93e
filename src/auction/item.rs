use crate::protocol::ItemSummary;

use std::collections::BTreeSet;

pub type ItemId = u64;
pub type Price = f64;
pub type Identity = String;

/// An item under auction, together with its bidding state.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub description: String,
    /// The highest accepted bid, or the asking price while nobody holds the item.
    pub price: Price,
    pub holder: Option<Identity>,
    /// Bidders who signalled interest during the interest window.
    pub interested: BTreeSet<Identity>,
    /// Timer firings since the last accepted bid (or since the interest window closed).
    pub timeouts: u32,
}

impl Item {
    pub fn new(id: ItemId, description: impl Into<String>, price: Price) -> Self {
        Item {
            id,
            description: description.into(),
            price,
            holder: None,
            interested: BTreeSet::new(),
            timeouts: 0,
        }
    }

    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            item_id: self.id,
            description: self.description.clone(),
            price: self.price,
            holder: self.holder.clone(),
        }
    }
}
