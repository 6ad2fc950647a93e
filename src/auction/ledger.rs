use super::item::{Identity, Item, ItemId, Price};
use crate::protocol::Reason;

use tracing::debug;

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Multiplier applied to the asking price by one decay step.
pub const DECAY_FACTOR: Price = 0.9;

/// Outcome of merging a price received from the peer replica.
#[derive(Debug, Clone, PartialEq)]
pub enum Merge {
    /// The incoming price won and was adopted.
    Higher,
    /// The local state wins. The caller must send these local values back to the peer.
    Stale { price: Price, holder: Option<Identity> },
    /// Both replicas already agree on this item.
    Converged,
    /// The item is not (or no longer) in the ledger.
    Unknown,
}

/// Total order on `(price, holder)` used to merge replica state.
///
/// An accepted bid outranks any unheld asking price, since asking prices decay on each
/// replica's own timer and may differ. Among equally held states the higher price wins and
/// equal prices are settled by the holder string.
fn compare(price: Price, holder: &Option<Identity>, other: Price, other_holder: &Option<Identity>) -> Ordering {
    match (holder.is_some(), other_holder.is_some()) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => (),
    }
    match price.partial_cmp(&other) {
        Some(Ordering::Equal) => holder.cmp(other_holder),
        Some(ordering) => ordering,
        None => Ordering::Less,
    }
}

/// The in-memory table of items and their bidding state.
///
/// `curr_item_id` is always the smallest remaining id once the auction has started.
#[derive(Debug, Clone)]
pub struct Ledger {
    items: BTreeMap<ItemId, Item>,
    curr_item_id: Option<ItemId>,
    interest_phase: bool,
}

impl Ledger {
    /// Creates a ledger that has not started yet: there is no current item until the
    /// first `advance`.
    pub fn new(items: Vec<Item>) -> Self {
        Ledger {
            items: items.into_iter().map(|item| (item.id, item)).collect(),
            curr_item_id: None,
            interest_phase: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.items.contains_key(&item_id)
    }

    pub fn get(&self, item_id: ItemId) -> Option<&Item> {
        self.items.get(&item_id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn curr_item_id(&self) -> Option<ItemId> {
        self.curr_item_id
    }

    pub fn interest_phase(&self) -> bool {
        self.interest_phase
    }

    pub fn current_item(&self) -> Option<&Item> {
        self.curr_item_id.and_then(|id| self.items.get(&id))
    }

    pub fn current_item_mut(&mut self) -> Option<&mut Item> {
        match self.curr_item_id {
            Some(id) => self.items.get_mut(&id),
            None => None,
        }
    }

    /// Makes the smallest remaining id current and opens its interest window.
    pub fn advance(&mut self) -> Option<ItemId> {
        self.curr_item_id = self.items.keys().next().cloned();
        self.interest_phase = true;
        debug!("current item is now {:?}", self.curr_item_id);
        self.curr_item_id
    }

    pub fn close_interest_phase(&mut self) {
        self.interest_phase = false;
    }

    /// Applies a client bid.
    pub fn apply_bid(&mut self, item_id: ItemId, price: Price, bidder: &str) -> Result<(), Reason> {
        if self.interest_phase {
            return Err(Reason::InterestPhaseActive);
        }
        let is_current = self.curr_item_id == Some(item_id);
        let item = self.items.get_mut(&item_id).ok_or(Reason::InvalidItem)?;
        if !is_current {
            return Err(Reason::NotAccepting);
        }
        if !(price > item.price) || !price.is_finite() {
            return Err(Reason::LowPriceBid);
        }
        item.price = price;
        item.holder = Some(bidder.to_owned());
        item.timeouts = 0;
        Ok(())
    }

    /// Merges a price observed by the peer replica.
    pub fn merge_price(&mut self, item_id: ItemId, price: Price, holder: Option<Identity>) -> Merge {
        let item = match self.items.get_mut(&item_id) {
            Some(item) => item,
            None => return Merge::Unknown,
        };
        match compare(price, &holder, item.price, &item.holder) {
            Ordering::Greater => {
                item.price = price;
                item.holder = holder;
                item.timeouts = 0;
                Merge::Higher
            }
            Ordering::Equal => Merge::Converged,
            Ordering::Less => Merge::Stale { price: item.price, holder: item.holder.clone() },
        }
    }

    /// Records a client's interest in the current item, optionally raising its asking
    /// price to the bidder's opening offer. Only allowed inside the interest window.
    pub fn record_interest(&mut self, bidder: &str, opening: Option<Price>) -> Result<ItemId, Reason> {
        let item = self.current_item_mut().ok_or(Reason::NotAccepting)?;
        if item.timeouts != 0 {
            return Err(Reason::NotAccepting);
        }
        item.interested.insert(bidder.to_owned());
        raise_asking_price(item, opening);
        Ok(item.id)
    }

    /// Merges an interest observed by the peer replica. Set union, so replays are harmless.
    pub fn merge_interest(&mut self, item_id: ItemId, bidder: &str, opening: Option<Price>) -> bool {
        match self.items.get_mut(&item_id) {
            Some(item) => {
                item.interested.insert(bidder.to_owned());
                raise_asking_price(item, opening);
                true
            }
            None => false,
        }
    }

    /// Lowers the asking price of an unheld item by one decay step.
    pub fn decay(&mut self, item_id: ItemId) -> Option<Price> {
        let item = self.items.get_mut(&item_id)?;
        if item.holder.is_some() {
            return None;
        }
        item.price *= DECAY_FACTOR;
        Some(item.price)
    }

    /// Removes an item. Absence is not an error: the peer may have removed it first.
    pub fn remove_item(&mut self, item_id: ItemId) -> Option<Item> {
        self.items.remove(&item_id)
    }
}

fn raise_asking_price(item: &mut Item, opening: Option<Price>) {
    if let Some(offer) = opening {
        if item.holder.is_none() && offer.is_finite() && offer > item.price {
            item.price = offer;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        Ledger::new(vec![
            Item::new(1, "Small hat", 0.0),
            Item::new(2, "Pirate Sword", 0.0),
            Item::new(3, "Cupboard", 5.0),
        ])
    }

    /// A started ledger whose current item accepts priced bids.
    fn bidding_ledger() -> Ledger {
        let mut ledger = ledger();
        ledger.advance();
        ledger.record_interest("alice", None).unwrap();
        ledger.close_interest_phase();
        ledger
    }

    #[actix_rt::test]
    async fn test_advance_picks_smallest_id() {
        let mut ledger = ledger();
        assert_eq!(ledger.current_item(), None);
        assert_eq!(ledger.advance(), Some(1));
        assert!(ledger.interest_phase());
        ledger.remove_item(1);
        assert_eq!(ledger.advance(), Some(2));
        ledger.remove_item(3);
        ledger.remove_item(2);
        assert_eq!(ledger.advance(), None);
        assert!(ledger.is_empty());
    }

    #[actix_rt::test]
    async fn test_apply_bid_rejections() {
        let mut ledger = ledger();
        ledger.advance();
        assert_eq!(ledger.apply_bid(1, 10.0, "alice"), Err(Reason::InterestPhaseActive));
        ledger.close_interest_phase();
        assert_eq!(ledger.apply_bid(9, 10.0, "alice"), Err(Reason::InvalidItem));
        assert_eq!(ledger.apply_bid(2, 10.0, "alice"), Err(Reason::NotAccepting));
        assert_eq!(ledger.apply_bid(1, 0.0, "alice"), Err(Reason::LowPriceBid));
        assert_eq!(ledger.apply_bid(1, std::f64::NAN, "alice"), Err(Reason::LowPriceBid));
        assert_eq!(ledger.current_item().unwrap().holder, None);
    }

    #[actix_rt::test]
    async fn test_bids_must_strictly_increase() {
        let mut ledger = bidding_ledger();
        ledger.current_item_mut().unwrap().timeouts = 2;
        assert_eq!(ledger.apply_bid(1, 10.0, "alice"), Ok(()));
        assert_eq!(ledger.current_item().unwrap().timeouts, 0);
        assert_eq!(ledger.apply_bid(1, 10.0, "bob"), Err(Reason::LowPriceBid));
        assert_eq!(ledger.apply_bid(1, 9.0, "bob"), Err(Reason::LowPriceBid));
        assert_eq!(ledger.apply_bid(1, 11.0, "bob"), Ok(()));

        let item = ledger.current_item().unwrap();
        assert_eq!(item.price, 11.0);
        assert_eq!(item.holder.as_deref(), Some("bob"));
    }

    #[actix_rt::test]
    async fn test_price_never_decreases_under_bids() {
        let mut ledger = bidding_ledger();
        let offers = [3.0, 1.0, 7.0, 7.0, 2.0, 8.5, 8.0, 20.0, 19.9];
        let mut last = ledger.current_item().unwrap().price;
        for (i, offer) in offers.iter().enumerate() {
            let accepted = ledger.apply_bid(1, *offer, &format!("b{}", i)).is_ok();
            let price = ledger.current_item().unwrap().price;
            assert!(price >= last);
            assert_eq!(accepted, *offer > last);
            last = price;
        }
        assert_eq!(last, 20.0);
    }

    #[actix_rt::test]
    async fn test_merge_price_outcomes() {
        let mut ledger = bidding_ledger();
        ledger.apply_bid(1, 10.0, "alice").unwrap();

        assert_eq!(ledger.merge_price(1, 12.0, Some("bob".to_owned())), Merge::Higher);
        assert_eq!(ledger.merge_price(1, 12.0, Some("bob".to_owned())), Merge::Converged);
        assert_eq!(
            ledger.merge_price(1, 11.0, Some("carol".to_owned())),
            Merge::Stale { price: 12.0, holder: Some("bob".to_owned()) }
        );
        assert_eq!(ledger.merge_price(42, 100.0, None), Merge::Unknown);

        let item = ledger.current_item().unwrap();
        assert_eq!((item.price, item.holder.as_deref()), (12.0, Some("bob")));
    }

    #[actix_rt::test]
    async fn test_equal_prices_settle_on_holder() {
        let mut ledger = bidding_ledger();
        ledger.apply_bid(1, 15.0, "xavier").unwrap();
        assert_eq!(
            ledger.merge_price(1, 15.0, Some("walter".to_owned())),
            Merge::Stale { price: 15.0, holder: Some("xavier".to_owned()) }
        );
        assert_eq!(ledger.merge_price(1, 15.0, Some("yvonne".to_owned())), Merge::Higher);
        assert_eq!(ledger.current_item().unwrap().holder.as_deref(), Some("yvonne"));
    }

    #[actix_rt::test]
    async fn test_merge_twice_is_idempotent() {
        let mut ledger = bidding_ledger();
        ledger.merge_price(1, 4.0, Some("bob".to_owned()));
        let once = ledger.clone();
        ledger.merge_price(1, 4.0, Some("bob".to_owned()));
        assert_eq!(ledger.get(1), once.get(1));
    }

    #[actix_rt::test]
    async fn test_remove_twice_is_idempotent() {
        let mut ledger = ledger();
        assert!(ledger.remove_item(2).is_some());
        let once: Vec<Item> = ledger.items().cloned().collect();
        assert!(ledger.remove_item(2).is_none());
        let twice: Vec<Item> = ledger.items().cloned().collect();
        assert_eq!(once, twice);
    }

    #[actix_rt::test]
    async fn test_interest_window() {
        let mut ledger = ledger();
        assert_eq!(ledger.record_interest("alice", None), Err(Reason::NotAccepting));
        ledger.advance();
        assert_eq!(ledger.record_interest("alice", Some(10.0)), Ok(1));
        assert_eq!(ledger.record_interest("bob", Some(4.0)), Ok(1));
        let item = ledger.current_item().unwrap();
        assert_eq!(item.price, 10.0);
        assert_eq!(item.holder, None);
        assert_eq!(item.interested.len(), 2);

        ledger.current_item_mut().unwrap().timeouts = 1;
        assert_eq!(ledger.record_interest("carol", None), Err(Reason::NotAccepting));
        assert!(ledger.merge_interest(1, "carol", None));
        assert!(!ledger.merge_interest(9, "carol", None));
        assert_eq!(ledger.current_item().unwrap().interested.len(), 3);
    }

    #[actix_rt::test]
    async fn test_decay_only_without_holder() {
        let mut ledger = ledger();
        ledger.advance();
        ledger.record_interest("alice", Some(10.0)).unwrap();
        assert_eq!(ledger.decay(1), Some(9.0));
        ledger.close_interest_phase();
        ledger.apply_bid(1, 12.0, "alice").unwrap();
        assert_eq!(ledger.decay(1), None);
        assert_eq!(ledger.current_item().unwrap().price, 12.0);
    }

    /// Two replicas see the same bids in opposite orders and exchange every sync,
    /// duplicates included, until both queues drain.
    #[actix_rt::test]
    async fn test_replicas_converge() {
        let bids: Vec<(Price, &str)> =
            vec![(5.0, "alice"), (9.0, "bob"), (7.0, "carol"), (9.0, "dave"), (8.0, "erin")];
        let mut a = bidding_ledger();
        let mut b = bidding_ledger();

        let mut to_b = vec![];
        let mut to_a = vec![];
        for (price, bidder) in bids.iter() {
            if a.apply_bid(1, *price, bidder).is_ok() {
                to_b.push((*price, Some(bidder.to_string())));
                to_b.push((*price, Some(bidder.to_string())));
            }
        }
        for (price, bidder) in bids.iter().rev() {
            if b.apply_bid(1, *price, bidder).is_ok() {
                to_a.push((*price, Some(bidder.to_string())));
            }
        }

        let mut rounds = 0;
        while !to_a.is_empty() || !to_b.is_empty() {
            rounds += 1;
            assert!(rounds < 100, "anti-entropy did not settle");
            for (price, holder) in std::mem::take(&mut to_b) {
                if let Merge::Stale { price, holder } = b.merge_price(1, price, holder) {
                    to_a.push((price, holder));
                }
            }
            for (price, holder) in std::mem::take(&mut to_a) {
                if let Merge::Stale { price, holder } = a.merge_price(1, price, holder) {
                    to_b.push((price, holder));
                }
            }
        }

        let (x, y) = (a.get(1).unwrap(), b.get(1).unwrap());
        assert_eq!((x.price, &x.holder), (y.price, &y.holder));
        assert_eq!((x.price, x.holder.as_deref()), (9.0, Some("dave")));
    }

    #[actix_rt::test]
    async fn test_unheld_price_never_displaces_a_bid() {
        let mut ledger = bidding_ledger();
        ledger.apply_bid(1, 9.5, "alice").unwrap();
        assert_eq!(
            ledger.merge_price(1, 10.0, None),
            Merge::Stale { price: 9.5, holder: Some("alice".to_owned()) }
        );
        let item = ledger.current_item().unwrap();
        assert_eq!((item.price, item.holder.as_deref()), (9.5, Some("alice")));
    }

    /// One replica decays its asking price before a bid lands there while the other still
    /// holds the undecayed price. Both sides repair each other until nothing changes.
    #[actix_rt::test]
    async fn test_divergent_decay_converges_on_the_bid() {
        let opened = || {
            let mut ledger = ledger();
            ledger.advance();
            ledger.record_interest("alice", Some(10.0)).unwrap();
            ledger.close_interest_phase();
            ledger
        };
        let mut a = opened();
        let mut b = opened();
        assert_eq!(a.decay(1), Some(9.0));
        a.apply_bid(1, 9.5, "alice").unwrap();

        // Each side sends its view; every stale reply is sent back across
        let mut to_b = vec![(9.5, Some("alice".to_owned()))];
        let mut to_a = vec![(10.0, None)];
        let mut rounds = 0;
        while !to_a.is_empty() || !to_b.is_empty() {
            rounds += 1;
            assert!(rounds < 10, "replicas kept repairing each other");
            for (price, holder) in std::mem::take(&mut to_b) {
                if let Merge::Stale { price, holder } = b.merge_price(1, price, holder) {
                    to_a.push((price, holder));
                }
            }
            for (price, holder) in std::mem::take(&mut to_a) {
                if let Merge::Stale { price, holder } = a.merge_price(1, price, holder) {
                    to_b.push((price, holder));
                }
            }
        }

        for ledger in [&a, &b].iter() {
            let item = ledger.get(1).unwrap();
            assert_eq!((item.price, item.holder.as_deref()), (9.5, Some("alice")));
        }
    }
}
