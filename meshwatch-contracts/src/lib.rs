//! Trait surfaces for the collaborators the aggregator treats as external:
//! the low-level cluster watch client, the low-level discovery RPC client,
//! and the webhook consumer that reacts to a published snapshot.
//!
//! None of these traits own the aggregation invariants (convergence,
//! short-circuiting, no cross-source suppression); that logic lives in
//! `meshwatch-core` against these seams.

pub mod cluster_transport;
pub mod discovery_transport;
pub mod notifier;

pub use cluster_transport::{ClusterRawEvent, ClusterTransport, TransportError};
pub use discovery_transport::{DiscoveryTransport, DiscoveryUpdate};
pub use notifier::ReconfigNotifier;
