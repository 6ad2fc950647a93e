//! Auction state owned by one replica: the item catalog, the ledger and the phase timer.
mod catalog;
mod item;
mod ledger;
mod timer;

pub use catalog::{Catalog, CatalogEntry};
pub use item::{Identity, Item, ItemId, Price};
pub use ledger::{Ledger, Merge, DECAY_FACTOR};
pub use timer::{fire, PhaseTimer, Transition};
