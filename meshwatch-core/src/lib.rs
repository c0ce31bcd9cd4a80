//! Configuration aggregation engine.
//!
//! Multiplexes three independent change sources (cluster, discovery,
//! filesystem certs) into a single internally-consistent, versioned
//! [`meshwatch_model::Snapshot`]. See [`aggregator::Aggregator`] for the
//! event-convergence loop itself.

pub mod aggregator;
pub mod cluster;
pub mod discovery;
pub mod error;
pub mod fs_cert;
pub mod interesting_types;
pub mod reconcile;
pub mod timers;
pub mod validator;

pub use aggregator::{Aggregator, SharedSnapshot};
pub use cluster::ClusterAccumulator;
pub use discovery::DiscoveryWatcher;
pub use error::{AggregatorError, Result};
pub use fs_cert::{CertEvent, CertOp, FsCertWatcher};
pub use validator::Validator;
