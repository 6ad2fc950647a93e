use crate::{Error, Result};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tokio::time::Duration;

use std::net::SocketAddr;

/// Environment variables with this prefix override the settings file, e.g.
/// `AUCTIONEER_MAX_ROUNDS=3`.
const ENV_PREFIX: &str = "AUCTIONEER";

// For explanation, see issue: https://github.com/serde-rs/serde/issues/368
fn default_max_connections() -> usize {
    25
}
fn default_timeout_interval_ms() -> u64 {
    2000
}
fn default_max_rounds() -> u32 {
    2
}
fn default_peer_retry_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Address both clients and the peer replica connect to.
    pub listener_ip: String,
    /// Listening address of the other replica.
    pub peer_ip: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// JSON item catalog. The built-in catalog is used when unset.
    #[serde(default)]
    pub items_file: Option<String>,
    #[serde(default = "default_timeout_interval_ms")]
    pub timeout_interval_ms: u64,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "default_peer_retry_ms")]
    pub peer_retry_ms: u64,
}

impl Settings {
    /// Layers the optional settings `file`, then `AUCTIONEER_*` environment variables,
    /// then the explicit `overrides` (as given on the command line).
    pub fn load(
        file: Option<&str>,
        overrides: Vec<(&str, String)>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX));
        for (key, value) in overrides.into_iter() {
            builder = builder.set_override(key, value)?;
        }
        builder.build()?.try_deserialize()
    }

    /// Settings for a replica on `listener_ip` paired with `peer_ip`, all else default.
    pub fn pair(listener_ip: &str, peer_ip: &str) -> Self {
        Settings {
            listener_ip: listener_ip.to_owned(),
            peer_ip: peer_ip.to_owned(),
            max_connections: default_max_connections(),
            items_file: None,
            timeout_interval_ms: default_timeout_interval_ms(),
            max_rounds: default_max_rounds(),
            peer_retry_ms: default_peer_retry_ms(),
        }
    }

    pub fn listener_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.listener_ip)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.peer_ip)
    }

    /// Both addresses, parsed. A replica cannot be its own peer.
    pub fn addresses(&self) -> Result<(SocketAddr, SocketAddr)> {
        let listener_ip = self.listener_addr()?;
        let peer_ip = self.peer_addr()?;
        if listener_ip == peer_ip {
            return Err(Error::InvalidAddress(self.peer_ip.clone()));
        }
        Ok((listener_ip, peer_ip))
    }

    /// `L`, the phase timer interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.timeout_interval_ms)
    }

    pub fn peer_retry(&self) -> Duration {
        Duration::from_millis(self.peer_retry_ms)
    }
}

fn parse_addr(address: &str) -> Result<SocketAddr> {
    address.parse().map_err(|_| Error::InvalidAddress(address.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_overrides_and_defaults() {
        let settings = Settings::load(
            None,
            vec![
                ("listener_ip", "127.0.0.1:5000".to_owned()),
                ("peer_ip", "127.0.0.1:5001".to_owned()),
                ("max_rounds", "3".to_owned()),
            ],
        )
        .unwrap();
        assert_eq!(settings.listener_addr().unwrap(), "127.0.0.1:5000".parse().unwrap());
        assert_eq!(settings.max_rounds, 3);
        assert_eq!(settings.max_connections, 25);
        assert_eq!(settings.interval(), Duration::from_secs(2));
        assert_eq!(settings.items_file, None);
    }

    #[actix_rt::test]
    async fn test_missing_listener_ip_is_an_error() {
        let result = Settings::load(None, vec![("peer_ip", "127.0.0.1:5001".to_owned())]);
        assert!(result.is_err());
    }

    #[actix_rt::test]
    async fn test_malformed_address() {
        let settings = Settings::pair("localhost", "127.0.0.1:5001");
        match settings.listener_addr() {
            Err(Error::InvalidAddress(address)) => assert_eq!(address, "localhost"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(settings.peer_addr().is_ok());
    }

    #[actix_rt::test]
    async fn test_peer_must_differ_from_listener() {
        let settings = Settings::pair("127.0.0.1:5000", "127.0.0.1:5000");
        match settings.addresses() {
            Err(Error::InvalidAddress(address)) => assert_eq!(address, "127.0.0.1:5000"),
            other => panic!("unexpected result: {:?}", other),
        }
        let settings = Settings::pair("127.0.0.1:5000", "127.0.0.1:5001");
        assert_eq!(
            settings.addresses().unwrap(),
            ("127.0.0.1:5000".parse().unwrap(), "127.0.0.1:5001".parse().unwrap())
        );
    }
}
