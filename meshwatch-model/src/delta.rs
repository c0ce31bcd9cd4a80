use serde::{Deserialize, Serialize};

use crate::uid::Uid;

/// Edit operation a [`Delta`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOp {
    Add,
    Update,
    Delete,
    /// Synthetic marker prepended when the unsent-delta buffer overflowed and
    /// older deltas had to be dropped. Consumers seeing this must treat the
    /// accompanying snapshot as authoritative rather than diff it against
    /// whatever they last applied.
    CoalescedOverflow,
}

/// A minimal transition descriptor between two emitted snapshots.
///
/// Deltas describe the transition from the previously *emitted* snapshot,
/// not intermediate churn suppressed by a short-circuit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub op: DeltaOp,
    pub uid: Uid,
}

impl Delta {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, namespace: impl Into<String>, op: DeltaOp, uid: Uid) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
            op,
            uid,
        }
    }

    pub fn overflow_marker() -> Self {
        Self {
            kind: String::new(),
            name: String::new(),
            namespace: String::new(),
            op: DeltaOp::CoalescedOverflow,
            uid: Uid::new(""),
        }
    }
}
