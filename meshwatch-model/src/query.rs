use serde::{Deserialize, Serialize};

/// A single cluster watch query, built from the interesting-types table and
/// intersected with the kinds the cluster server actually supports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub namespace: Option<String>,
    pub snapshot_key: String,
    pub kind: String,
    pub field_selector: String,
    pub label_selector: String,
}

impl Query {
    pub fn new(snapshot_key: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            namespace: None,
            snapshot_key: snapshot_key.into(),
            kind: kind.into(),
            field_selector: String::new(),
            label_selector: String::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_field_selector(mut self, selector: impl Into<String>) -> Self {
        self.field_selector = selector.into();
        self
    }

    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = selector.into();
        self
    }
}
