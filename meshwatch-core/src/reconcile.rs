//! Pure reconciler passes run after every cluster/discovery/cert update,
//! before the snapshot is considered for emission.
//!
//! Each function only touches the [`KubernetesSnapshot`] (and, for
//! discovery, the [`DiscoveryWatcher`]'s interest set); none of them reach
//! into the transports directly, which is what keeps them unit-testable
//! without any fake transport machinery.

use std::collections::BTreeSet;

use meshwatch_model::{Delta, KubernetesSnapshot, ObservedObject, Uid};
use serde::Deserialize;

use crate::discovery::DiscoveryWatcher;

const EMBEDDED_CONFIG_ANNOTATION: &str = "getambassador.io/config";

#[derive(Deserialize)]
struct EmbeddedResource {
    kind: String,
    snapshot_key: String,
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    spec: serde_json::Value,
}

/// Extracts resources embedded in the `getambassador.io/config` annotation
/// of any watched object and inserts them as first-class entries in their
/// own snapshot keys, the way the upstream watcher treats annotation-style
/// configuration identically to a CRD once parsed.
pub fn parse_annotations(snapshot: &mut KubernetesSnapshot) {
    let mut synthesized = Vec::new();

    for object in snapshot.all_objects() {
        let Some(raw) = object.annotations.get(EMBEDDED_CONFIG_ANNOTATION) else {
            continue;
        };
        let resources: Vec<EmbeddedResource> = match serde_json::from_str(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(object = %object.uid, %err, "malformed embedded config annotation, skipping");
                continue;
            }
        };
        for (idx, resource) in resources.into_iter().enumerate() {
            let snapshot_key = resource.snapshot_key;
            let namespace = resource.namespace.unwrap_or_else(|| object.namespace.clone());
            let uid = Uid::new(format!("{}/annotation/{idx}", object.uid));
            let synthetic = ObservedObject::new(resource.kind, uid.clone(), namespace, resource.name).with_spec(resource.spec);
            synthesized.push((snapshot_key, uid, synthetic));
        }
    }

    for (snapshot_key, uid, object) in synthesized {
        snapshot.kind_mut(&snapshot_key).insert(uid, object);
    }
}

const SECRET_REFERENCE_FIELDS: &[&str] = &["tls_secret", "secret", "ca_secret", "client_cert_secret"];

/// Merges `K8sSecrets` and filesystem-sourced certs into the canonical
/// `Secrets` snapshot key, then prunes any secret no consumer references.
pub fn reconcile_secrets(snapshot: &mut KubernetesSnapshot) {
    if let Some(k8s_secrets) = snapshot.kinds.remove("K8sSecrets") {
        let canonical = snapshot.kind_mut("Secrets");
        for (uid, object) in k8s_secrets {
            canonical.insert(uid, object);
        }
    }

    for (key, value) in snapshot.fs_secrets.clone() {
        let uid = Uid::new(format!("fs-secret/{}/{}", key.namespace, key.name));
        let spec = serde_json::to_value(&value).unwrap_or(serde_json::Value::Null);
        let object = ObservedObject::new("Secret", uid.clone(), key.namespace.clone(), key.name.clone()).with_spec(spec);
        snapshot.kind_mut("Secrets").insert(uid, object);
    }

    let referenced = referenced_secret_names(snapshot);
    if let Some(table) = snapshot.kinds.get_mut("Secrets") {
        table.retain(|_, object| referenced.contains(&(object.name.clone(), object.namespace.clone())));
    }
}

fn referenced_secret_names(snapshot: &KubernetesSnapshot) -> BTreeSet<(String, String)> {
    let mut referenced = BTreeSet::new();
    for (snapshot_key, table) in &snapshot.kinds {
        if snapshot_key == "Secrets" || snapshot_key == "K8sSecrets" {
            continue;
        }
        for object in table.values() {
            for field in SECRET_REFERENCE_FIELDS {
                if let Some(raw) = object.spec.get(*field).and_then(|v| v.as_str()) {
                    referenced.insert(split_secret_reference(raw, &object.namespace));
                }
            }
        }
    }
    referenced
}

fn split_secret_reference(raw: &str, default_namespace: &str) -> (String, String) {
    match raw.split_once('.') {
        Some((name, namespace)) => (name.to_string(), namespace.to_string()),
        None => (raw.to_string(), default_namespace.to_string()),
    }
}

/// Recomputes the discovery interest set from every `Mapping` that names a
/// resolver, and applies it to `discovery`.
pub async fn reconcile_discovery(snapshot: &KubernetesSnapshot, discovery: &DiscoveryWatcher) {
    let mut wanted = BTreeSet::new();
    if let Some(mappings) = snapshot.kind("Mappings") {
        for mapping in mappings.values() {
            if mapping.spec.get("resolver").is_none() {
                continue;
            }
            if let Some(service) = mapping.spec.get("service").and_then(|v| v.as_str()) {
                let service_name = service.rsplit("://").next().unwrap_or(service);
                wanted.insert(service_name.to_string());
            }
        }
    }
    discovery.set_interests(wanted).await;
}

/// Merges `K8sEndpoints` into the canonical `Endpoints` snapshot key,
/// prunes entries no plain-Kubernetes-resolved `Mapping` references, and
/// drops this iteration's deltas for anything just pruned so consumers
/// never see churn for an endpoint they were never told about.
pub fn reconcile_endpoints(snapshot: &mut KubernetesSnapshot, deltas: Vec<Delta>) -> Vec<Delta> {
    if let Some(k8s_endpoints) = snapshot.kinds.remove("K8sEndpoints") {
        let canonical = snapshot.kind_mut("Endpoints");
        for (uid, object) in k8s_endpoints {
            canonical.insert(uid, object);
        }
    }

    let referenced = referenced_service_names(snapshot);
    let mut pruned_uids = BTreeSet::new();
    if let Some(table) = snapshot.kinds.get_mut("Endpoints") {
        table.retain(|uid, object| {
            let keep = referenced.contains(&object.name);
            if !keep {
                pruned_uids.insert(uid.clone());
            }
            keep
        });
    }

    deltas
        .into_iter()
        .filter(|delta| !(delta.kind == "Endpoints" && pruned_uids.contains(&delta.uid)))
        .collect()
}

fn referenced_service_names(snapshot: &KubernetesSnapshot) -> BTreeSet<String> {
    let mut referenced = BTreeSet::new();
    if let Some(mappings) = snapshot.kind("Mappings") {
        for mapping in mappings.values() {
            if mapping.spec.get("resolver").is_some() {
                continue;
            }
            if let Some(service) = mapping.spec.get("service").and_then(|v| v.as_str()) {
                referenced.insert(service.split(':').next().unwrap_or(service).to_string());
            }
        }
    }
    referenced
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshwatch_contracts::DiscoveryTransport;
    use meshwatch_model::{Delta, DeltaOp, SecretKey, SecretValue};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[test]
    fn parse_annotations_synthesizes_and_namespaces_correctly() {
        let mut snapshot = KubernetesSnapshot::new();
        let host = ObservedObject::new("Host", Uid::new("h1"), "default", "host1").with_annotation(
            EMBEDDED_CONFIG_ANNOTATION,
            r#"[{"kind":"Mapping","snapshot_key":"Mappings","name":"embedded-m1","spec":{"prefix":"/foo"}}]"#,
        );
        snapshot.kind_mut("Hosts").insert(Uid::new("h1"), host);

        parse_annotations(&mut snapshot);

        let mappings = snapshot.kind("Mappings").unwrap();
        assert_eq!(mappings.len(), 1);
        let synthetic = mappings.values().next().unwrap();
        assert_eq!(synthetic.name, "embedded-m1");
        assert_eq!(synthetic.namespace, "default");
    }

    #[test]
    fn reconcile_secrets_prunes_unreferenced_fs_secret() {
        let mut snapshot = KubernetesSnapshot::new();
        snapshot.upsert_fs_secret(
            SecretKey::new("istio-cert", "default"),
            SecretValue { cert: b"cert".to_vec(), key: b"key".to_vec() },
        );

        reconcile_secrets(&mut snapshot);
        assert!(snapshot.kind("Secrets").map(|t| t.is_empty()).unwrap_or(true));

        let mapping = ObservedObject::new("Mapping", Uid::new("m1"), "default", "m1")
            .with_spec(json!({"tls_secret": "istio-cert.default"}));
        snapshot.kind_mut("Mappings").insert(Uid::new("m1"), mapping);

        reconcile_secrets(&mut snapshot);
        assert_eq!(snapshot.kind("Secrets").unwrap().len(), 1);
    }

    #[test]
    fn reconcile_endpoints_drops_deltas_for_pruned_entries() {
        let mut snapshot = KubernetesSnapshot::new();
        let endpoint = ObservedObject::new("Endpoints", Uid::new("e1"), "default", "orphan-svc");
        snapshot.kind_mut("K8sEndpoints").insert(Uid::new("e1"), endpoint);

        let deltas = vec![Delta::new("Endpoints", "orphan-svc", "default", DeltaOp::Add, Uid::new("e1"))];
        let remaining = reconcile_endpoints(&mut snapshot, deltas);

        assert!(remaining.is_empty());
        assert!(snapshot.kind("Endpoints").unwrap().is_empty());
    }

    struct NoopTransport;
    impl DiscoveryTransport for NoopTransport {
        fn subscribe(&self, _service: &str) -> mpsc::Receiver<meshwatch_contracts::DiscoveryUpdate> {
            mpsc::channel(1).1
        }
        fn unsubscribe(&self, _service: &str) {}
    }

    #[tokio::test]
    async fn reconcile_discovery_collects_resolver_backed_services() {
        let mut snapshot = KubernetesSnapshot::new();
        let mapping = ObservedObject::new("Mapping", Uid::new("m1"), "default", "m1")
            .with_spec(json!({"resolver": "consul", "service": "consul://payments"}));
        snapshot.kind_mut("Mappings").insert(Uid::new("m1"), mapping);

        let discovery = DiscoveryWatcher::new(Arc::new(NoopTransport));
        reconcile_discovery(&snapshot, &discovery).await;

        assert!(!discovery.is_bootstrapped().await);
    }
}
