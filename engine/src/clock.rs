//! Lamport clock and the timestamps it hands out.
//!
//! Timestamps give a total order across all replicas, which is what makes
//! conflict resolution deterministic.

use crate::error::{Error, Result};
use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A point in logical time, stamped by exactly one node.
///
/// Ordering rules:
/// 1. Higher counter wins
/// 2. If counters equal, lexicographically higher node_id wins
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalTimestamp {
    pub counter: u64,
    pub node_id: NodeId,
}

impl LogicalTimestamp {
    pub fn new(counter: u64, node_id: impl Into<NodeId>) -> Self {
        Self {
            counter,
            node_id: node_id.into(),
        }
    }
}

impl Ord for LogicalTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.node_id.cmp(&other.node_id))
    }
}

impl PartialOrd for LogicalTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LogicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_id, self.counter)
    }
}

/// The per-store Lamport clock.
///
/// Every timestamp it emits is strictly greater than anything it has
/// emitted or observed before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalClock {
    node_id: NodeId,
    counter: u64,
}

impl LogicalClock {
    /// Create a clock for a node, starting at counter 0.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self::with_counter(node_id, 0)
    }

    pub fn with_counter(node_id: impl Into<NodeId>, counter: u64) -> Self {
        Self {
            node_id: node_id.into(),
            counter,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// The last counter value emitted or observed.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Advance the clock and return the fresh timestamp.
    ///
    /// Fails once the counter has reached `u64::MAX`; the clock is left as is.
    pub fn tick(&mut self) -> Result<LogicalTimestamp> {
        self.counter = self.successor(self.counter)?;
        Ok(LogicalTimestamp::new(self.counter, self.node_id.clone()))
    }

    /// Fold a remote timestamp into the clock: `max(local, remote) + 1`.
    pub fn observe(&mut self, remote: &LogicalTimestamp) -> Result<()> {
        self.counter = self.successor(self.counter.max(remote.counter))?;
        tracing::trace!(
            remote = %remote,
            counter = self.counter,
            "observed remote timestamp"
        );
        Ok(())
    }

    fn successor(&self, counter: u64) -> Result<u64> {
        counter.checked_add(1).ok_or_else(|| Error::ClockExhausted {
            node_id: self.node_id.clone(),
        })
    }

    /// Raise the counter to at least `counter`, never lowering it.
    pub fn restore(&mut self, counter: u64) {
        self.counter = self.counter.max(counter);
    }
}
