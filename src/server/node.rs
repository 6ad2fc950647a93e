use std::path::Path;

use crate::auction::{Catalog, Ledger};
use crate::p2p::PeerLink;
use crate::server::{Router, Server, Settings};
use crate::Result;
use actix::Arbiter;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Loads the catalog named in `settings`, or the built-in one.
pub fn load_catalog(settings: &Settings) -> Result<Catalog> {
    match settings.items_file {
        Some(ref path) => Catalog::from_file(Path::new(path)),
        None => Ok(Catalog::default()),
    }
}

/// Validates `settings` and starts the replica on its own arbiter.
pub fn run(settings: Settings) -> Result<()> {
    // Fail on bad addresses or catalogs before anything is spawned
    let (listener_ip, _) = settings.addresses()?;
    let _ = load_catalog(&settings)?;

    let execution = async move {
        if let Err(err) = serve(settings).await {
            error!("replica {} stopped: {}", listener_ip, err);
        }
    };
    let arbiter = Arbiter::new();
    arbiter.spawn(execution);

    Ok(())
}

/// Binds the listener, links up with the peer replica and runs the event loop.
pub async fn serve(settings: Settings) -> Result<()> {
    let (listener_ip, peer_ip) = settings.addresses()?;
    let catalog = load_catalog(&settings)?;
    info!("replica {} is starting with {} items", listener_ip, catalog.len());

    let listener = TcpListener::bind(listener_ip).await?;
    let link = PeerLink::establish(&listener, listener_ip, peer_ip, settings.peer_retry()).await?;

    let ledger = Ledger::new(catalog.items());
    let router =
        Router::new(ledger, settings.interval(), settings.max_rounds, settings.max_connections);
    Server::new(listener, router, link).run().await
}
