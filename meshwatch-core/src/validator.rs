//! Schema validation and invalid-object quarantine.
//!
//! Mirrors the upstream watcher's `findCRDFilename` + `isValid` pair: a
//! manifest is located once at startup from a short fixed search path (fatal
//! if none of the candidates exist), then every observed object is checked
//! against it on every cluster update. Validation never panics and never
//! blocks the loop; a failing object is quarantined into the snapshot's
//! `invalid` list instead of being dropped silently.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use meshwatch_model::ObservedObject;
use serde::Deserialize;

use crate::error::{AggregatorError, Result};

/// Default, ordered list of places a schema manifest may live. The first
/// candidate that exists wins; none existing is startup-fatal.
pub const DEFAULT_SCHEMA_SEARCH_PATH: &[&str] = &[
    "/etc/meshwatch/schema.json",
    "/var/run/meshwatch/schema.json",
    "./schema/meshwatch-schema.json",
];

#[derive(Debug, Clone, Deserialize)]
struct KindSchema {
    #[serde(default)]
    required_fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SchemaManifest {
    #[serde(flatten)]
    kinds: BTreeMap<String, KindSchema>,
}

/// Searches `search_path` in order and returns the first existing file.
pub fn locate_schema_manifest(search_path: &[PathBuf]) -> Result<PathBuf> {
    for candidate in search_path {
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
    }
    Err(AggregatorError::SchemaManifest(format!(
        "no schema manifest found; tried: {}",
        search_path
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

/// Pure, reentrant object validator backed by a loaded schema manifest.
///
/// "Pure" here means `validate` never touches the filesystem or any shared
/// state. The manifest is fixed at load time, so the same object always
/// gets the same verdict regardless of call order.
#[derive(Debug, Clone)]
pub struct Validator {
    manifest: SchemaManifest,
}

impl Validator {
    /// Locate and parse the schema manifest from `search_path`.
    pub fn load(search_path: &[PathBuf]) -> Result<Self> {
        let path = locate_schema_manifest(search_path)?;
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_str(&raw)
    }

    fn from_str(raw: &str) -> Result<Self> {
        let manifest: SchemaManifest = serde_json::from_str(raw)?;
        Ok(Self { manifest })
    }

    /// Validate a single object against its kind's schema entry. A kind with
    /// no manifest entry is accepted unconditionally; the manifest lists
    /// constraints, not an allowlist of recognized kinds.
    pub fn validate(&self, object: &ObservedObject) -> std::result::Result<(), String> {
        let Some(schema) = self.manifest.kinds.get(&object.kind) else {
            return Ok(());
        };

        for field in &schema.required_fields {
            let present = object
                .spec
                .get(field)
                .map(|value| !value.is_null())
                .unwrap_or(false);
            if !present {
                return Err(format!(
                    "{}/{} ({}): missing required field `{field}`",
                    object.namespace, object.name, object.kind
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshwatch_model::Uid;
    use serde_json::json;

    fn validator_with(manifest_json: &str) -> Validator {
        Validator::from_str(manifest_json).unwrap()
    }

    #[test]
    fn unknown_kind_is_accepted() {
        let validator = validator_with(r#"{"Mapping": {"required_fields": ["service"]}}"#);
        let obj = ObservedObject::new("Host", Uid::new("1"), "default", "h1");
        assert!(validator.validate(&obj).is_ok());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let validator = validator_with(r#"{"Mapping": {"required_fields": ["service"]}}"#);
        let obj = ObservedObject::new("Mapping", Uid::new("1"), "default", "m1")
            .with_spec(json!({"prefix": "/foo"}));
        assert!(validator.validate(&obj).is_err());
    }

    #[test]
    fn present_required_field_is_accepted() {
        let validator = validator_with(r#"{"Mapping": {"required_fields": ["service"]}}"#);
        let obj = ObservedObject::new("Mapping", Uid::new("1"), "default", "m1")
            .with_spec(json!({"service": "svc:80"}));
        assert!(validator.validate(&obj).is_ok());
    }

    #[test]
    fn locate_schema_manifest_tries_candidates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let present = dir.path().join("schema.json");
        std::fs::write(&present, "{}").unwrap();

        let found = locate_schema_manifest(&[missing.clone(), present.clone()]).unwrap();
        assert_eq!(found, present);
    }

    #[test]
    fn locate_schema_manifest_errors_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(locate_schema_manifest(&[missing]).is_err());
    }
}
