use serde::{Deserialize, Serialize};

use crate::delta::Delta;
use crate::discovery::DiscoverySnapshot;
use crate::kubernetes::KubernetesSnapshot;
use crate::observed::InvalidObject;

/// The artifact emitted to downstream consumers.
///
/// Field order here is the emitted JSON's field order (serde preserves
/// declaration order with the `preserve_order` feature), matching the
/// original's `{Kubernetes, Consul, Invalid, Deltas}` shape. Every map
/// reachable from this type is a `BTreeMap`, so two snapshots with the same
/// logical content always serialize to the same bytes. That byte-equality
/// is what the aggregation loop uses to short-circuit redundant emissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub cluster: KubernetesSnapshot,
    pub discovery: DiscoverySnapshot,
    pub invalid: Vec<InvalidObject>,
    pub deltas: Vec<Delta>,
}

impl Snapshot {
    pub fn new(cluster: KubernetesSnapshot, discovery: DiscoverySnapshot, invalid: Vec<InvalidObject>, deltas: Vec<Delta>) -> Self {
        Self {
            cluster,
            discovery,
            invalid,
            deltas,
        }
    }

    /// Canonical indented JSON encoding. Two logically-equal snapshots
    /// always produce identical bytes, which is the equivalence relation the
    /// aggregation loop's suppression logic relies on.
    pub fn to_canonical_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observed::ObservedObject;
    use crate::uid::Uid;

    #[test]
    fn identical_snapshots_serialize_byte_identical() {
        let mut cluster = KubernetesSnapshot::new();
        cluster.kind_mut("Services").insert(
            Uid::new("a"),
            ObservedObject::new("Service", Uid::new("a"), "default", "svc-a"),
        );

        let snap_a = Snapshot::new(cluster.clone(), DiscoverySnapshot::new(), vec![], vec![]);
        let snap_b = Snapshot::new(cluster, DiscoverySnapshot::new(), vec![], vec![]);

        assert_eq!(snap_a.to_canonical_json().unwrap(), snap_b.to_canonical_json().unwrap());
    }

    #[test]
    fn insertion_order_does_not_affect_encoding() {
        let mut cluster_a = KubernetesSnapshot::new();
        cluster_a.kind_mut("Services").insert(Uid::new("a"), ObservedObject::new("Service", Uid::new("a"), "ns", "a"));
        cluster_a.kind_mut("Services").insert(Uid::new("b"), ObservedObject::new("Service", Uid::new("b"), "ns", "b"));

        let mut cluster_b = KubernetesSnapshot::new();
        cluster_b.kind_mut("Services").insert(Uid::new("b"), ObservedObject::new("Service", Uid::new("b"), "ns", "b"));
        cluster_b.kind_mut("Services").insert(Uid::new("a"), ObservedObject::new("Service", Uid::new("a"), "ns", "a"));

        let snap_a = Snapshot::new(cluster_a, DiscoverySnapshot::new(), vec![], vec![]);
        let snap_b = Snapshot::new(cluster_b, DiscoverySnapshot::new(), vec![], vec![]);

        assert_eq!(snap_a.to_canonical_json().unwrap(), snap_b.to_canonical_json().unwrap());
    }
}
