#[macro_use]
extern crate serde_derive;
extern crate colored;

pub mod auction;
pub mod channel;
pub mod client;
pub mod p2p;
pub mod protocol;
pub mod server;

mod integration_test;

#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    Json(serde_json::Error),
    Config(config::ConfigError),

    /// A configured address could not be parsed as `IP:PORT`
    InvalidAddress(String),
    /// The item catalog could not be loaded
    Catalog(String),

    /// The remote end closed a client connection while a reply was awaited
    ConnectionClosed,

    // peer link errors
    /// The peer link closed while it was needed
    PeerDisconnected,
}

impl std::error::Error for Error {}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl std::convert::From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json(error)
    }
}

impl std::convert::From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
