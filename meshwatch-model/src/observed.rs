use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::uid::Uid;

/// A raw object observed from the cluster API, modeled as a tagged bag rather
/// than a concrete per-kind Rust type.
///
/// The validator and reconcilers only ever need `kind`/`uid`/`namespace`/
/// `name`/`annotations`/`spec`, so that's all this carries. Keeping this
/// dynamically typed means adding a new watched kind never requires touching
/// the aggregation loop or the reconcilers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedObject {
    pub kind: String,
    pub uid: Uid,
    pub namespace: String,
    pub name: String,
    pub resource_version: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub spec: serde_json::Value,
}

impl ObservedObject {
    pub fn new(kind: impl Into<String>, uid: Uid, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            uid,
            namespace: namespace.into(),
            name: name.into(),
            resource_version: String::new(),
            annotations: BTreeMap::new(),
            spec: serde_json::Value::Null,
        }
    }

    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// An observed object that failed validation, annotated with the validator's
/// error message. Reported out-of-band in the emitted snapshot's `invalid`
/// list rather than surfaced as a control-flow failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidObject {
    #[serde(flatten)]
    pub object: ObservedObject,
    pub error: String,
}
