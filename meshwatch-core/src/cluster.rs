//! The cluster accumulator (C2): owns the watched-object tables for every
//! subscribed query and exposes an edge-triggered "something changed" signal.
//!
//! Grounded on `ferrex-core`'s `FsWatchService` debounce/batch pattern
//! (`examples/Lowband21-ferrex/ferrex-core/src/scan/fs_watch/mod.rs`): a
//! background task drains the transport's event channel into a pending
//! buffer and fires a [`tokio::sync::Notify`], whose coalescing behavior
//! gives the aggregation loop exactly the "multiple raw events between
//! iterations collapse into one `changed` edge" semantics the loop needs.

use std::sync::Arc;

use meshwatch_contracts::{ClusterRawEvent, ClusterTransport};
use meshwatch_model::{Delta, DeltaOp, KubernetesSnapshot, ObservedObject, Query};
use tokio::sync::{mpsc, Mutex, Notify};

use crate::interesting_types::build_queries;
use crate::Result;

pub struct ClusterAccumulator {
    queries: Vec<Query>,
    pending: Arc<Mutex<Vec<ClusterRawEvent>>>,
    changed: Arc<Notify>,
    _drain_task: tokio::task::JoinHandle<()>,
}

impl ClusterAccumulator {
    /// Builds the query set from the interesting-types table intersected
    /// against the server's supported kinds, then starts watching it.
    pub async fn connect(
        transport: Arc<dyn ClusterTransport>,
        namespace: Option<&str>,
        global_field_selector: &str,
        global_label_selector: &str,
        multi_namespace: bool,
        knative_enabled: bool,
    ) -> Result<Self> {
        let queries = build_queries(
            transport.as_ref(),
            namespace,
            global_field_selector,
            global_label_selector,
            multi_namespace,
            knative_enabled,
        )
        .await?;
        Self::new(transport, queries)
    }

    pub fn new(transport: Arc<dyn ClusterTransport>, queries: Vec<Query>) -> Result<Self> {
        let rx = transport.subscribe(queries.clone())?;
        let pending = Arc::new(Mutex::new(Vec::new()));
        let changed = Arc::new(Notify::new());

        let drain_pending = pending.clone();
        let drain_changed = changed.clone();
        let drain_task = tokio::spawn(async move {
            let mut rx = rx;
            while let Some(event) = rx.recv().await {
                drain_pending.lock().await.push(event);
                drain_changed.notify_one();
            }
        });

        Ok(Self { queries, pending, changed, _drain_task: drain_task })
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// The edge-triggered changed signal. Awaiting `.notified()` on the
    /// returned handle resolves once per coalesced batch of raw events.
    pub fn changed(&self) -> Arc<Notify> {
        self.changed.clone()
    }

    /// Drains all pending raw events into `target`, validating each with
    /// `is_valid` and recording the resulting deltas into `deltas_out`.
    ///
    /// Returns `false` if, after validation, nothing in `target` actually
    /// changed: a batch of events that all failed validation and were
    /// already quarantined, or an upsert that re-posted an object identical
    /// to the one already stored (a watch re-list commonly does this).
    /// Callers use this to short-circuit the iteration before running the
    /// reconcilers at all.
    pub async fn filtered_update(
        &self,
        target: &mut KubernetesSnapshot,
        deltas_out: &mut Vec<Delta>,
        mut is_valid: impl FnMut(&ObservedObject) -> bool,
    ) -> bool {
        let drained: Vec<ClusterRawEvent> = {
            let mut guard = self.pending.lock().await;
            std::mem::take(&mut *guard)
        };
        if drained.is_empty() {
            return false;
        }

        let mut changed_something = false;
        for event in drained {
            match event {
                ClusterRawEvent::Upsert { snapshot_key, object } => {
                    if !is_valid(&object) {
                        if target.kind_mut(&snapshot_key).remove(&object.uid).is_some() {
                            deltas_out.push(Delta::new(
                                snapshot_key,
                                object.name,
                                object.namespace,
                                DeltaOp::Delete,
                                object.uid,
                            ));
                            changed_something = true;
                        }
                        continue;
                    }

                    let existing = target.kind(&snapshot_key).and_then(|table| table.get(&object.uid));
                    if existing == Some(&object) {
                        continue;
                    }
                    let op = if existing.is_some() { DeltaOp::Update } else { DeltaOp::Add };
                    let (name, namespace, uid) = (object.name.clone(), object.namespace.clone(), object.uid.clone());
                    target.kind_mut(&snapshot_key).insert(uid.clone(), object);
                    deltas_out.push(Delta::new(snapshot_key, name, namespace, op, uid));
                    changed_something = true;
                }
                ClusterRawEvent::Delete { snapshot_key, uid } => {
                    if let Some(removed) = target.kind_mut(&snapshot_key).remove(&uid) {
                        deltas_out.push(Delta::new(snapshot_key, removed.name, removed.namespace, DeltaOp::Delete, uid));
                        changed_something = true;
                    }
                }
            }
        }
        changed_something
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshwatch_contracts::TransportError;
    use meshwatch_model::Uid;

    struct StaticTransport {
        kinds: Vec<String>,
        events: Mutex<Option<mpsc::Receiver<ClusterRawEvent>>>,
    }

    #[async_trait::async_trait]
    impl ClusterTransport for StaticTransport {
        async fn server_kinds(&self) -> std::result::Result<Vec<String>, TransportError> {
            Ok(self.kinds.clone())
        }

        fn subscribe(&self, _queries: Vec<Query>) -> std::result::Result<mpsc::Receiver<ClusterRawEvent>, TransportError> {
            self.events
                .try_lock()
                .unwrap()
                .take()
                .ok_or_else(|| TransportError::Unavailable("already subscribed".into()))
        }
    }

    #[tokio::test]
    async fn filtered_update_records_add_then_update() {
        let (tx, rx) = mpsc::channel(8);
        let transport = Arc::new(StaticTransport { kinds: vec![], events: Mutex::new(Some(rx)) });
        let accumulator = ClusterAccumulator::new(transport, vec![Query::new("Mappings", "mappings.getambassador.io")]).unwrap();

        let object = ObservedObject::new("Mapping", Uid::new("u1"), "default", "m1");
        tx.send(ClusterRawEvent::Upsert { snapshot_key: "Mappings".into(), object: object.clone() })
            .await
            .unwrap();

        accumulator.changed().notified().await;
        let mut snapshot = KubernetesSnapshot::new();
        let mut deltas = Vec::new();
        let changed = accumulator.filtered_update(&mut snapshot, &mut deltas, |_| true).await;
        assert!(changed);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].op, DeltaOp::Add);

        let changed_object = object.with_spec(serde_json::json!({"prefix": "/changed"}));
        tx.send(ClusterRawEvent::Upsert { snapshot_key: "Mappings".into(), object: changed_object }).await.unwrap();
        accumulator.changed().notified().await;
        deltas.clear();
        let changed = accumulator.filtered_update(&mut snapshot, &mut deltas, |_| true).await;
        assert!(changed);
        assert_eq!(deltas[0].op, DeltaOp::Update);
    }

    #[tokio::test]
    async fn identical_repost_produces_no_delta() {
        let (tx, rx) = mpsc::channel(8);
        let transport = Arc::new(StaticTransport { kinds: vec![], events: Mutex::new(Some(rx)) });
        let accumulator = ClusterAccumulator::new(transport, vec![]).unwrap();

        let object = ObservedObject::new("Mapping", Uid::new("u1"), "default", "m1");
        tx.send(ClusterRawEvent::Upsert { snapshot_key: "Mappings".into(), object: object.clone() })
            .await
            .unwrap();
        accumulator.changed().notified().await;
        let mut snapshot = KubernetesSnapshot::new();
        let mut deltas = Vec::new();
        accumulator.filtered_update(&mut snapshot, &mut deltas, |_| true).await;
        assert_eq!(deltas.len(), 1);

        // A watch re-list reposts the same object verbatim.
        tx.send(ClusterRawEvent::Upsert { snapshot_key: "Mappings".into(), object }).await.unwrap();
        accumulator.changed().notified().await;
        deltas.clear();
        let changed = accumulator.filtered_update(&mut snapshot, &mut deltas, |_| true).await;
        assert!(!changed);
        assert!(deltas.is_empty());
    }

    #[tokio::test]
    async fn invalid_object_is_quarantined_not_inserted() {
        let (tx, rx) = mpsc::channel(8);
        let transport = Arc::new(StaticTransport { kinds: vec![], events: Mutex::new(Some(rx)) });
        let accumulator = ClusterAccumulator::new(transport, vec![]).unwrap();

        let object = ObservedObject::new("Mapping", Uid::new("u1"), "default", "m1");
        tx.send(ClusterRawEvent::Upsert { snapshot_key: "Mappings".into(), object }).await.unwrap();
        accumulator.changed().notified().await;

        let mut snapshot = KubernetesSnapshot::new();
        let mut deltas = Vec::new();
        let changed = accumulator.filtered_update(&mut snapshot, &mut deltas, |_| false).await;
        assert!(!changed);
        assert!(snapshot.kind("Mappings").is_none());
    }
}
