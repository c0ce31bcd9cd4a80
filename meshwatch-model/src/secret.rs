use serde::{Deserialize, Serialize};

/// Identifies a secret by the `(name, namespace)` pair the watcher configuration
/// declares, matching how filesystem-sourced certs and `K8sSecrets` are keyed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SecretKey {
    pub name: String,
    pub namespace: String,
}

impl SecretKey {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Certificate material, whether sourced from a `K8sSecrets` object or
/// assembled by the filesystem cert watcher from a directory of PEM files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretValue {
    #[serde(with = "base64_bytes")]
    pub cert: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD.decode(raw.as_bytes()).map_err(serde::de::Error::custom)
    }
}
