use async_trait::async_trait;
use meshwatch_model::{ObservedObject, Query, Uid};
use tokio::sync::mpsc;

/// Errors surfaced by a [`ClusterTransport`]. Transient failures (a partial
/// `server_kinds` listing) are logged and skipped by the caller rather than
/// propagated as fatal; only `subscribe` failing to start at all is treated
/// as startup-fatal.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cluster transport unavailable: {0}")]
    Unavailable(String),
    #[error("cluster transport request failed: {0}")]
    Request(String),
}

/// A single raw change notification from the underlying cluster watch
/// plumbing, not yet validated or merged into a snapshot.
#[derive(Debug, Clone)]
pub enum ClusterRawEvent {
    Upsert { snapshot_key: String, object: ObservedObject },
    Delete { snapshot_key: String, uid: Uid },
}

/// The seam to the low-level cluster client that performs watch plumbing.
/// Out of scope for this crate: a real implementation talks to the cluster
/// API server. `meshwatch-core::ClusterAccumulator` is the in-scope
/// component that consumes a transport's event stream.
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    /// List of kind identifiers (`"${plural}.${group}"`) the server
    /// currently supports. A transient failure here should be logged and
    /// treated as an empty list by the caller; unknown kinds are warned and
    /// skipped, never fatal.
    async fn server_kinds(&self) -> Result<Vec<String>, TransportError>;

    /// Begin watching the given queries. Returns a channel of raw events;
    /// dropping the receiver stops the watch. Queries passed here are the
    /// already-filtered set (interesting types intersected with
    /// `server_kinds`).
    fn subscribe(&self, queries: Vec<Query>) -> Result<mpsc::Receiver<ClusterRawEvent>, TransportError>;
}
