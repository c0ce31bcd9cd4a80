use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::observed::ObservedObject;
use crate::secret::{SecretKey, SecretValue};
use crate::uid::Uid;

/// A mapping from a snapshot key (`"Services"`, `"Mappings"`, ...) to the
/// ordered set of observed objects of that kind, keyed by UID for O(1)
/// upsert/delete during reconciliation.
pub type ObjectTable = BTreeMap<Uid, ObservedObject>;

/// The cluster half of the aggregate [`crate::Snapshot`].
///
/// `kinds` holds one [`ObjectTable`] per watched snapshot key. `fs_secrets`
/// is the side-channel the filesystem cert watcher writes into; it is never
/// serialized on its own. `reconcile_secrets` (in `meshwatch-core`) merges
/// it into the canonical `Secrets` entry of `kinds` every iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubernetesSnapshot {
    pub kinds: BTreeMap<String, ObjectTable>,
    pub fs_secrets: BTreeMap<SecretKey, SecretValue>,
}

impl KubernetesSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind_mut(&mut self, snapshot_key: &str) -> &mut ObjectTable {
        self.kinds.entry(snapshot_key.to_string()).or_default()
    }

    pub fn kind(&self, snapshot_key: &str) -> Option<&ObjectTable> {
        self.kinds.get(snapshot_key)
    }

    /// Every object across every watched kind, for invariant checks like
    /// "every object in the snapshot passed the validator."
    pub fn all_objects(&self) -> impl Iterator<Item = &ObservedObject> {
        self.kinds.values().flat_map(|table| table.values())
    }

    pub fn upsert_fs_secret(&mut self, key: SecretKey, value: SecretValue) {
        self.fs_secrets.insert(key, value);
    }

    pub fn remove_fs_secret(&mut self, key: &SecretKey) {
        self.fs_secrets.remove(key);
    }
}
