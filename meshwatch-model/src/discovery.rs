use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single resolved discovery endpoint for a service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscoveryEndpoint {
    pub address: String,
    pub port: u16,
    pub datacenter: String,
}

/// A mapping from service name to its current endpoint list, plus a
/// bootstrap flag per watched service so early aggregation-loop iterations
/// don't emit a snapshot with partial discovery state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoverySnapshot {
    pub endpoints: BTreeMap<String, Vec<DiscoveryEndpoint>>,
}

impl DiscoverySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_endpoints(&mut self, service: impl Into<String>, endpoints: Vec<DiscoveryEndpoint>) {
        self.endpoints.insert(service.into(), endpoints);
    }

    pub fn remove_service(&mut self, service: &str) {
        self.endpoints.remove(service);
    }
}
