//! The table of kinds the aggregator asks the cluster transport to watch.
//!
//! Grounded on the upstream watcher's `thingToWatch` map: a fixed list of
//! `(snapshot key, API kind)` pairs, conditionally extended for
//! multi-namespace and Knative support. Unlike the original, this table
//! never talks to the cluster itself. [`build_queries`] intersects it
//! against whatever [`ClusterTransport::server_kinds`] reports, so an
//! unsupported kind is dropped with a warning instead of failing the watch.

use meshwatch_contracts::ClusterTransport;
use meshwatch_model::Query;

/// One entry in the interesting-types table.
pub struct InterestingType {
    pub snapshot_key: &'static str,
    pub kind: &'static str,
    /// Per-kind field selector override, ANDed with the global selector.
    pub field_selector_override: Option<&'static str>,
}

/// The full table, gated by the two feature flags that change its shape.
pub fn interesting_types(multi_namespace: bool, knative_enabled: bool) -> Vec<InterestingType> {
    let mut types = vec![
        InterestingType { snapshot_key: "Services", kind: "services.", field_selector_override: None },
        InterestingType { snapshot_key: "K8sSecrets", kind: "secrets.", field_selector_override: None },
        InterestingType {
            snapshot_key: "K8sEndpoints",
            kind: "endpoints.",
            field_selector_override: Some("metadata.namespace!=kube-system"),
        },
        InterestingType { snapshot_key: "Ingresses", kind: "ingresses.extensions", field_selector_override: None },
        InterestingType { snapshot_key: "AuthServices", kind: "authservices.getambassador.io", field_selector_override: None },
        InterestingType { snapshot_key: "ConsulResolvers", kind: "consulresolvers.getambassador.io", field_selector_override: None },
        InterestingType { snapshot_key: "DevPortals", kind: "devportals.getambassador.io", field_selector_override: None },
        InterestingType { snapshot_key: "Hosts", kind: "hosts.getambassador.io", field_selector_override: None },
        InterestingType {
            snapshot_key: "KubernetesEndpointResolvers",
            kind: "kubernetesendpointresolvers.getambassador.io",
            field_selector_override: None,
        },
        InterestingType {
            snapshot_key: "KubernetesServiceResolvers",
            kind: "kubernetesserviceresolvers.getambassador.io",
            field_selector_override: None,
        },
        InterestingType { snapshot_key: "LogServices", kind: "logservices.getambassador.io", field_selector_override: None },
        InterestingType { snapshot_key: "Mappings", kind: "mappings.getambassador.io", field_selector_override: None },
        InterestingType { snapshot_key: "Modules", kind: "modules.getambassador.io", field_selector_override: None },
        InterestingType {
            snapshot_key: "RateLimitServices",
            kind: "ratelimitservices.getambassador.io",
            field_selector_override: None,
        },
        InterestingType { snapshot_key: "TCPMappings", kind: "tcpmappings.getambassador.io", field_selector_override: None },
        InterestingType { snapshot_key: "TLSContexts", kind: "tlscontexts.getambassador.io", field_selector_override: None },
        InterestingType { snapshot_key: "TracingServices", kind: "tracingservices.getambassador.io", field_selector_override: None },
    ];

    if multi_namespace {
        types.push(InterestingType {
            snapshot_key: "IngressClasses",
            kind: "ingressclasses.networking.k8s.io",
            field_selector_override: None,
        });
    }

    if knative_enabled {
        types.push(InterestingType {
            snapshot_key: "KNativeClusterIngresses",
            kind: "clusteringresses.networking.internal.knative.dev",
            field_selector_override: None,
        });
        types.push(InterestingType {
            snapshot_key: "KNativeIngresses",
            kind: "ingresses.networking.internal.knative.dev",
            field_selector_override: None,
        });
    }

    types
}

/// Builds the concrete query set for a [`ClusterAccumulator`](crate::ClusterAccumulator):
/// the interesting-types table intersected with what the server actually
/// supports. Kinds the server doesn't recognize are skipped with a warning,
/// never treated as fatal.
pub async fn build_queries(
    transport: &dyn ClusterTransport,
    namespace: Option<&str>,
    global_field_selector: &str,
    global_label_selector: &str,
    multi_namespace: bool,
    knative_enabled: bool,
) -> crate::Result<Vec<Query>> {
    let server_kinds = transport.server_kinds().await?;
    let server_kinds: std::collections::BTreeSet<&str> = server_kinds.iter().map(String::as_str).collect();

    let mut queries = Vec::new();
    for entry in interesting_types(multi_namespace, knative_enabled) {
        if !server_kinds.contains(entry.kind) {
            tracing::warn!(kind = entry.kind, "server does not support watched kind, skipping");
            continue;
        }

        let mut query = Query::new(entry.snapshot_key, entry.kind)
            .with_label_selector(global_label_selector.to_string());

        let field_selector = match entry.field_selector_override {
            Some(over) if global_field_selector.is_empty() => over.to_string(),
            Some(over) => format!("{global_field_selector},{over}"),
            None => global_field_selector.to_string(),
        };
        query = query.with_field_selector(field_selector);

        if let Some(ns) = namespace {
            query = query.with_namespace(ns.to_string());
        }

        queries.push(query);
    }

    Ok(queries)
}
