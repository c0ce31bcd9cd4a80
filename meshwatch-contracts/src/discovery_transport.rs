use meshwatch_model::DiscoveryEndpoint;
use tokio::sync::mpsc;

/// A resolution update for one subscribed service.
#[derive(Debug, Clone)]
pub struct DiscoveryUpdate {
    pub service: String,
    pub endpoints: Vec<DiscoveryEndpoint>,
}

/// The seam to the low-level discovery RPC client. Out of scope for this
/// crate: a real implementation talks to the discovery system's transport.
/// `meshwatch-core::DiscoveryWatcher` is the in-scope component that manages
/// the interest set (add/remove subscriptions) against a transport.
pub trait DiscoveryTransport: Send + Sync {
    /// Start watching a service; returns the channel of resolution updates
    /// for it. Calling this twice for the same service while a prior
    /// subscription is still live is a caller error; `DiscoveryWatcher`
    /// guards against it.
    fn subscribe(&self, service: &str) -> mpsc::Receiver<DiscoveryUpdate>;

    /// Stop watching a service and release its underlying subscription.
    fn unsubscribe(&self, service: &str);
}
