//! The aggregation loop (C7): the single task that owns all mutable
//! snapshot state and converges the three change sources into emitted
//! [`Snapshot`]s.
//!
//! Grounded on `ferrex-server`'s `ScanRunAggregatorInner::run`
//! (`examples/Lowband21-ferrex/ferrex-server/src/infra/scan/scan_manager.rs`)
//! for the `tokio::select!` shape, and on the upstream watcher's
//! `cmd/entrypoint/watcher.go` `select{}` loop for the short-circuit and
//! delta-accumulation semantics. Unlike the `ferrex` loop, selection here is
//! intentionally unbiased: the design makes no promise about cross-source
//! ordering, so a fixed priority would be a false guarantee.

use std::collections::BTreeMap;
use std::sync::Arc;

use meshwatch_model::{InvalidObject, KubernetesSnapshot, DiscoverySnapshot, Delta, Snapshot, Uid};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::cluster::ClusterAccumulator;
use crate::discovery::DiscoveryWatcher;
use crate::fs_cert::{CertEvent, CertOp};
use crate::reconcile;
use crate::timers::IterationTimers;
use crate::validator::Validator;
use meshwatch_contracts::ReconfigNotifier;

/// The published snapshot, readable by the debug HTTP surface while the
/// aggregation loop keeps running. An empty `Vec` means nothing has been
/// published yet.
pub type SharedSnapshot = Arc<RwLock<Vec<u8>>>;

/// Unsent-delta buffer cap (Open Question decision): beyond this many
/// accumulated deltas between emissions, older entries are dropped and
/// replaced with a single [`meshwatch_model::DeltaOp::CoalescedOverflow`]
/// marker so consumers know to treat the next snapshot as authoritative
/// rather than as an incremental diff.
const MAX_UNSENT_DELTAS: usize = 4096;

pub struct Aggregator {
    accumulator: ClusterAccumulator,
    discovery: DiscoveryWatcher,
    cert_rx: mpsc::Receiver<CertEvent>,
    validator: Validator,
    notifier: Arc<dyn ReconfigNotifier>,
    published: SharedSnapshot,
    snapshot_log: bool,
    timers: IterationTimers,
}

impl Aggregator {
    pub fn new(
        accumulator: ClusterAccumulator,
        discovery: DiscoveryWatcher,
        cert_rx: mpsc::Receiver<CertEvent>,
        validator: Validator,
        notifier: Arc<dyn ReconfigNotifier>,
        published: SharedSnapshot,
        snapshot_log: bool,
    ) -> Self {
        Self { accumulator, discovery, cert_rx, validator, notifier, published, snapshot_log, timers: IterationTimers::new() }
    }

    pub fn timers(&self) -> IterationTimers {
        self.timers.clone()
    }

    /// Runs until `shutdown` is cancelled. Consumes `self`, since this is
    /// meant to be the entire lifetime of one task.
    pub async fn run(self, shutdown: CancellationToken) {
        let Self { accumulator, discovery, mut cert_rx, validator, notifier, published, snapshot_log, timers } = self;

        let mut cluster_snapshot = KubernetesSnapshot::new();
        let mut discovery_snapshot = DiscoverySnapshot::new();
        let mut invalid: BTreeMap<Uid, InvalidObject> = BTreeMap::new();
        let mut unsent_deltas: Vec<Delta> = Vec::new();
        let mut previous_emission: Vec<u8> = Vec::new();
        let mut first_reconfig = true;

        let cluster_changed = accumulator.changed();
        let discovery_changed = discovery.changed();

        loop {
            let mut iteration_deltas: Vec<Delta> = Vec::new();
            let mut cluster_only = false;

            tokio::select! {
                _ = cluster_changed.notified() => {
                    let _t = timers.start("cluster_update");
                    let is_valid = |object: &meshwatch_model::ObservedObject| -> bool {
                        match validator.validate(object) {
                            Ok(()) => {
                                invalid.remove(&object.uid);
                                true
                            }
                            Err(reason) => {
                                invalid.insert(object.uid.clone(), InvalidObject { object: object.clone(), error: reason });
                                false
                            }
                        }
                    };
                    let changed = accumulator.filtered_update(&mut cluster_snapshot, &mut iteration_deltas, is_valid).await;
                    if !changed {
                        tracing::debug!("cluster update carried no meaningful change, short-circuiting");
                        continue;
                    }
                    cluster_only = true;
                }

                _ = discovery_changed.notified() => {
                    let _t = timers.start("discovery_update");
                    discovery.update(&mut discovery_snapshot).await;
                }

                Some(event) = cert_rx.recv() => {
                    let _t = timers.start("cert_update");
                    apply_cert_event(&mut cluster_snapshot, event);
                }

                _ = shutdown.cancelled() => {
                    tracing::info!("aggregation loop shutting down");
                    return;
                }
            }

            {
                let _t = timers.start("parse_annotations");
                reconcile::parse_annotations(&mut cluster_snapshot);
            }
            {
                let _t = timers.start("reconcile_secrets");
                reconcile::reconcile_secrets(&mut cluster_snapshot);
            }
            {
                let _t = timers.start("reconcile_discovery");
                reconcile::reconcile_discovery(&cluster_snapshot, &discovery).await;
            }
            {
                let _t = timers.start("reconcile_endpoints");
                iteration_deltas = reconcile::reconcile_endpoints(&mut cluster_snapshot, iteration_deltas);
            }

            if cluster_only && iteration_deltas.is_empty() {
                tracing::debug!("reconciliation filtered out every delta, short-circuiting");
                continue;
            }

            unsent_deltas.append(&mut iteration_deltas);
            cap_unsent_deltas(&mut unsent_deltas);

            if !discovery.is_bootstrapped().await {
                tracing::debug!("withholding publication until discovery bootstraps");
                continue;
            }

            let invalid_list: Vec<InvalidObject> = invalid.values().cloned().collect();
            let snapshot = Snapshot::new(
                cluster_snapshot.clone(),
                discovery_snapshot.clone(),
                invalid_list,
                std::mem::take(&mut unsent_deltas),
            );

            let encoded = match snapshot.to_canonical_json() {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::error!(%err, "failed to serialize snapshot, dropping this iteration's emission");
                    continue;
                }
            };

            if snapshot_log {
                write_snapshot_log(&encoded);
            }

            if encoded == previous_emission {
                tracing::debug!("identical to last emission, short-circuiting");
                continue;
            }

            previous_emission = encoded.clone();
            *published.write().await = encoded;

            if first_reconfig {
                tracing::info!("bootstrapped, first configuration published");
                first_reconfig = false;
            }

            let _t = timers.start("notify_webhooks");
            notifier.notify().await;
        }
    }
}

fn apply_cert_event(snapshot: &mut KubernetesSnapshot, event: CertEvent) {
    let key = meshwatch_model::SecretKey::new(event.name, event.namespace);
    match event.op {
        CertOp::Update => {
            let Some(secret) = event.secret else {
                tracing::warn!("cert update event carried no secret material, ignoring");
                return;
            };
            snapshot.upsert_fs_secret(key, secret);
        }
        CertOp::Delete => snapshot.remove_fs_secret(&key),
    }
}

fn cap_unsent_deltas(deltas: &mut Vec<Delta>) {
    if deltas.len() <= MAX_UNSENT_DELTAS {
        return;
    }
    let excess = deltas.len() - MAX_UNSENT_DELTAS;
    deltas.drain(0..excess);
    deltas.insert(0, Delta::overflow_marker());
}

fn write_snapshot_log(encoded: &[u8]) {
    let path = format!("/tmp/{}-snap.json", chrono::Utc::now().format("%Y%m%dT%H%M%S"));
    match std::fs::write(&path, encoded) {
        Ok(()) => tracing::debug!(path, "saved snapshot log"),
        Err(err) => tracing::error!(path, %err, "failed to save snapshot log"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_unsent_deltas_inserts_overflow_marker_once_over_budget() {
        let mut deltas: Vec<Delta> = (0..(MAX_UNSENT_DELTAS + 10))
            .map(|i| Delta::new("Mappings", format!("m{i}"), "default", meshwatch_model::DeltaOp::Add, Uid::new(format!("u{i}"))))
            .collect();

        cap_unsent_deltas(&mut deltas);

        assert_eq!(deltas.len(), MAX_UNSENT_DELTAS);
        assert_eq!(deltas[0].op, meshwatch_model::DeltaOp::CoalescedOverflow);
    }

    #[test]
    fn cap_unsent_deltas_is_a_noop_under_budget() {
        let mut deltas: Vec<Delta> = (0..10)
            .map(|i| Delta::new("Mappings", format!("m{i}"), "default", meshwatch_model::DeltaOp::Add, Uid::new(format!("u{i}"))))
            .collect();
        let before = deltas.len();
        cap_unsent_deltas(&mut deltas);
        assert_eq!(deltas.len(), before);
    }
}
