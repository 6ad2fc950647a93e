//! The phase timer: a single deadline that drives discard, decay and award of the current
//! item.
//!
//! The timer itself only keeps time. `fire` holds the state machine and is invoked by the
//! event loop once the deadline passes with no socket ready.

use super::item::{Item, ItemId, Price};
use super::ledger::Ledger;

use tokio::time::{Duration, Instant};
use tracing::debug;

pub struct PhaseTimer {
    interval: Duration,
    deadline: Option<Instant>,
    disabled: bool,
}

impl PhaseTimer {
    pub fn new(interval: Duration) -> Self {
        PhaseTimer { interval, deadline: None, disabled: false }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Schedules the next firing one full interval after `now`.
    pub fn arm(&mut self, now: Instant) {
        if self.disabled {
            return;
        }
        self.deadline = Some(now + self.interval);
    }

    /// Stops the timer for the rest of the process lifetime.
    pub fn disable(&mut self) {
        self.disabled = true;
        self.deadline = None;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// What one firing of the phase timer did to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The auction has not started; nothing to do yet.
    Idle,
    /// The ledger is empty.
    Complete,
    /// Nobody signalled interest in `item`, which was removed.
    Discarded { item: Item, next: Option<ItemId> },
    /// Another timeout round passed on the current item.
    Tick { item_id: ItemId, timeouts: u32, decayed: Option<Price> },
    /// The item ran out of rounds and was removed; `item.holder` is the winner, if any.
    Closed { item: Item, decayed: Option<Price>, next: Option<ItemId> },
}

/// Runs one firing of the phase state machine against `ledger`.
pub fn fire(ledger: &mut Ledger, max_rounds: u32) -> Transition {
    let (item_id, no_interest) = match ledger.current_item() {
        Some(item) => (item.id, item.interested.is_empty()),
        None => {
            return if ledger.is_empty() { Transition::Complete } else { Transition::Idle };
        }
    };

    if no_interest {
        let item = match ledger.remove_item(item_id) {
            Some(item) => item,
            None => return Transition::Idle,
        };
        let next = ledger.advance();
        return Transition::Discarded { item, next };
    }

    ledger.close_interest_phase();
    let (timeouts, unheld) = match ledger.current_item_mut() {
        Some(item) => {
            item.timeouts += 1;
            (item.timeouts, item.holder.is_none())
        }
        None => return Transition::Idle,
    };
    let decayed = if unheld && timeouts > 1 { ledger.decay(item_id) } else { None };
    debug!("item {} timeout round {} (decayed: {:?})", item_id, timeouts, decayed);

    if timeouts > max_rounds {
        match ledger.remove_item(item_id) {
            Some(item) => {
                let next = ledger.advance();
                Transition::Closed { item, decayed, next }
            }
            None => Transition::Idle,
        }
    } else {
        Transition::Tick { item_id, timeouts, decayed }
    }
}
