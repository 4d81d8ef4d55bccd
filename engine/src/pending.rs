//! Queue of locally-originated operations awaiting sync acknowledgment.

use crate::{Operation, OperationId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Outcome of an acknowledge call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckSummary {
    /// Ids that were pending and are now removed, in queue order
    pub acknowledged: Vec<OperationId>,
    /// Operations still pending afterwards
    pub remaining: usize,
}

/// Pending operations in local apply order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingQueue {
    ops: Vec<Operation>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_ops(ops: Vec<Operation>) -> Self {
        Self { ops }
    }

    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn as_slice(&self) -> &[Operation] {
        &self.ops
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ops.iter().any(|op| op.id == id)
    }

    /// Drop every queued operation whose id is in `ids`. Unknown ids are
    /// ignored, so acknowledging twice is harmless.
    pub fn acknowledge<S: AsRef<str>>(&mut self, ids: &[S]) -> AckSummary {
        let wanted: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
        let mut acknowledged = Vec::new();

        self.ops.retain(|op| {
            if wanted.contains(op.id.as_str()) {
                acknowledged.push(op.id.clone());
                false
            } else {
                true
            }
        });

        AckSummary {
            acknowledged,
            remaining: self.ops.len(),
        }
    }

    pub(crate) fn into_vec(self) -> Vec<Operation> {
        self.ops
    }
}
