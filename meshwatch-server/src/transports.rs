//! Placeholder transports used when the binary is run standalone, without a
//! real cluster API client or discovery RPC client wired in.
//!
//! `meshwatch-contracts::ClusterTransport`/`DiscoveryTransport` are the seam
//! a real deployment plugs into (see `meshwatch-contracts`'s module docs for
//! why that plumbing is out of scope here). These implementations report no
//! supported kinds and never resolve any service, so the aggregation loop
//! runs and serves its debug surface without ever panicking for lack of a
//! cluster to talk to. They exist so `meshwatch-server` is runnable out of
//! the box, not as a stand-in for a real integration.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use meshwatch_contracts::{ClusterRawEvent, ClusterTransport, DiscoveryTransport, DiscoveryUpdate, TransportError};
use meshwatch_model::Query;
use tokio::sync::mpsc;

/// Reports zero supported kinds, so every interesting-type query is skipped
/// with a warning and the cluster accumulator's `changed()` signal never
/// fires. Keeps the `Sender` half of its subscription alive for its own
/// lifetime so the receiver never observes a spurious close.
#[derive(Default)]
pub struct NullClusterTransport {
    senders: Mutex<Vec<mpsc::Sender<ClusterRawEvent>>>,
}

#[async_trait]
impl ClusterTransport for NullClusterTransport {
    async fn server_kinds(&self) -> Result<Vec<String>, TransportError> {
        Ok(Vec::new())
    }

    fn subscribe(&self, _queries: Vec<Query>) -> Result<mpsc::Receiver<ClusterRawEvent>, TransportError> {
        let (tx, rx) = mpsc::channel(1);
        self.senders.lock().expect("transport mutex poisoned").push(tx);
        Ok(rx)
    }
}

/// Never resolves any service. Subscriptions are kept open (their `Sender`
/// retained) until explicitly unsubscribed.
#[derive(Default)]
pub struct NullDiscoveryTransport {
    senders: Mutex<HashMap<String, mpsc::Sender<DiscoveryUpdate>>>,
}

impl DiscoveryTransport for NullDiscoveryTransport {
    fn subscribe(&self, service: &str) -> mpsc::Receiver<DiscoveryUpdate> {
        let (tx, rx) = mpsc::channel(1);
        self.senders.lock().expect("transport mutex poisoned").insert(service.to_string(), tx);
        rx
    }

    fn unsubscribe(&self, service: &str) {
        self.senders.lock().expect("transport mutex poisoned").remove(service);
    }
}
