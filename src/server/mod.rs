pub mod node;
mod outbox;
mod registry;
mod router;
mod server;
pub mod settings;

pub use outbox::*;
pub use registry::*;
pub use router::*;
pub use server::*;
pub use settings::*;
