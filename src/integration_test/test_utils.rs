use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::auction::{Catalog, Ledger};
use crate::client::Session;
use crate::p2p::PeerLink;
use crate::protocol::Record;
use crate::server::{Router, Server};
use crate::Result;

/// Two linked replicas on loopback ports.
pub struct TestPair {
    pub a: SocketAddr,
    pub b: SocketAddr,
    handles: Vec<JoinHandle<Result<()>>>,
}

impl Drop for TestPair {
    fn drop(&mut self) {
        for handle in self.handles.iter() {
            handle.abort();
        }
    }
}

/// Starts both replicas over the built-in catalog.
pub async fn start_pair(interval: Duration, max_rounds: u32) -> TestPair {
    let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let a = listener_a.local_addr().unwrap();
    let b = listener_b.local_addr().unwrap();

    let retry = Duration::from_millis(20);
    let (link_a, link_b) = tokio::join!(
        PeerLink::establish(&listener_a, a, b, retry),
        PeerLink::establish(&listener_b, b, a, retry)
    );

    let mut handles = vec![];
    for (listener, link) in vec![(listener_a, link_a.unwrap()), (listener_b, link_b.unwrap())] {
        let ledger = Ledger::new(Catalog::default().items());
        let router = Router::new(ledger, interval, max_rounds, 25);
        handles.push(tokio::spawn(Server::new(listener, router, link).run()));
    }
    TestPair { a, b, handles }
}

/// Connects `identity` and reads the greeting up to `start_bid` or `complete`.
pub async fn join(address: &SocketAddr, identity: &str) -> (Session, Vec<Record>) {
    let mut session = Session::connect(address, identity).await.unwrap();
    let mut greeting = vec![];
    loop {
        let record = session.recv().await.unwrap().expect("replica closed the connection");
        let done = matches!(record, Record::StartBid { .. } | Record::Complete | Record::Error { .. });
        greeting.push(record);
        if done {
            return (session, greeting);
        }
    }
}
