use std::fmt;

/// Why a replica refused a client request. Sent back inside an `error` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    /// The identity is already bound to a live session
    DuplicateIdentity,
    /// The item is not (or no longer) in the ledger
    InvalidItem,
    /// The current item is still collecting expressions of interest
    InterestPhaseActive,
    /// The offer is not strictly higher than the stored price
    LowPriceBid,
    /// The replica already serves its maximum number of sessions
    MaxConnections,
    /// The request targets an item or phase that is not open
    NotAccepting,
}

impl Reason {
    /// Whether a bidder receiving this reason should give up its session.
    pub fn is_fatal_for_client(&self) -> bool {
        match self {
            Reason::DuplicateIdentity | Reason::MaxConnections => true,
            _ => false,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Reason::DuplicateIdentity => "duplicate-identity",
            Reason::InvalidItem => "invalid-item",
            Reason::InterestPhaseActive => "interest-phase-active",
            Reason::LowPriceBid => "low-price-bid",
            Reason::MaxConnections => "max-connections",
            Reason::NotAccepting => "not-accepting",
        };
        write!(f, "{}", s)
    }
}
