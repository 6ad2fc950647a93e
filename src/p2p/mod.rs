//! The link between the two replicas.
pub mod linear_backoff;
pub mod peer_link;

pub use linear_backoff::LinearBackoff;
pub use peer_link::{PeerLink, HELLO_TIMEOUT};
