//! Conflict resolution and reconciliation of foreign operations.
//!
//! This is the core of determinism. Conflicts are settled per record by a
//! total order over write stamps, so the winner for a record is the
//! maximum of every operation it has seen. A maximum does not depend on
//! arrival order, which is why replicas converge.
//!
//! # Algorithm
//!
//! For each remote operation:
//! 1. Check it is well-formed and conforms to the schema
//! 2. Fold its logical timestamp into the local clock
//! 3. Compare it against the stored record under the chosen strategy
//! 4. Overwrite the record if it wins, discard it otherwise

use crate::error::{Error, Result};
use crate::operation::WriteStamp;
use crate::store::Collection;
use crate::{
    CollectionName, LogicalClock, NodeId, Operation, OperationId, Record, RecordId, Schema,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

/// Merge strategy for conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeStrategy {
    /// Higher logical timestamp wins, ties broken by node id (default)
    #[default]
    ClockWins,
    /// Later wall time wins, ties fall back to the logical timestamp
    TimestampWins,
}

impl MergeStrategy {
    /// Order two write stamps under this strategy.
    pub fn compare(self, a: WriteStamp<'_>, b: WriteStamp<'_>) -> Ordering {
        match self {
            MergeStrategy::ClockWins => a.logical.cmp(b.logical),
            MergeStrategy::TimestampWins => a
                .wall_time
                .cmp(&b.wall_time)
                .then_with(|| a.logical.cmp(b.logical)),
        }
    }

    /// Whether `incoming` replaces `existing`. Ties keep the existing write.
    pub fn wins(self, incoming: WriteStamp<'_>, existing: WriteStamp<'_>) -> bool {
        self.compare(incoming, existing) == Ordering::Greater
    }
}

impl TryFrom<i32> for MergeStrategy {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(MergeStrategy::ClockWins),
            1 => Ok(MergeStrategy::TimestampWins),
            other => Err(Error::malformed(format!("unknown merge strategy: {}", other))),
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "0" | "clock" | "clockWins" => Ok(MergeStrategy::ClockWins),
            "1" | "timestamp" | "timestampWins" => Ok(MergeStrategy::TimestampWins),
            other => Err(Error::malformed(format!("unknown merge strategy: {}", other))),
        }
    }
}

/// The write a record held before an operation was judged against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorWrite {
    pub op_id: OperationId,
    pub origin: NodeId,
}

impl PriorWrite {
    pub(crate) fn of(record: &Record) -> Self {
        Self {
            op_id: record.last_op.clone(),
            origin: record.last_writer.clone(),
        }
    }
}

/// What happened to an operation that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The operation won and now defines the record
    Applied { displaced: Option<PriorWrite> },
    /// The stored record won; the operation was discarded
    Superseded { winner: PriorWrite },
}

impl Resolution {
    /// The stored write the operation competed with, if there was one.
    pub fn prior(&self) -> Option<&PriorWrite> {
        match self {
            Resolution::Applied { displaced } => displaced.as_ref(),
            Resolution::Superseded { winner } => Some(winner),
        }
    }
}

/// Per-operation status in a reconcile report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    Applied,
    Superseded,
    Rejected,
}

impl From<&Resolution> for OutcomeStatus {
    fn from(resolution: &Resolution) -> Self {
        match resolution {
            Resolution::Applied { .. } => OutcomeStatus::Applied,
            Resolution::Superseded { .. } => OutcomeStatus::Superseded,
        }
    }
}

/// Why an operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeError {
    pub code: String,
    pub message: String,
}

impl From<&Error> for OutcomeError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpOutcome {
    pub op_id: OperationId,
    pub status: OutcomeStatus,
    /// Operation that kept the record when this one was superseded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_op_id: Option<OperationId>,
    /// Operation this one replaced when it was applied over a stored record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displaced_op_id: Option<OperationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

/// Which side kept the record in a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    /// The write already stored here won
    LocalWins,
    /// The incoming operation won
    RemoteWins,
}

/// An incoming operation that met a record last written by another node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub collection: CollectionName,
    pub record_id: RecordId,
    pub local_op_id: OperationId,
    pub remote_op_id: OperationId,
    pub resolution: ConflictResolution,
    pub winner_op_id: OperationId,
}

/// Result of reconciliation, one outcome per input operation in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub outcomes: Vec<OpOutcome>,
    pub applied: usize,
    pub superseded: usize,
    pub rejected: usize,
    /// Conflicts in input order
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
}

impl ReconcileReport {
    fn push(&mut self, op: &Operation, outcome: Result<Resolution>) {
        let resolution = match outcome {
            Ok(resolution) => resolution,
            Err(err) => {
                self.rejected += 1;
                self.outcomes.push(OpOutcome {
                    op_id: op.id.clone(),
                    status: OutcomeStatus::Rejected,
                    winner_op_id: None,
                    displaced_op_id: None,
                    error: Some(OutcomeError::from(&err)),
                });
                return;
            }
        };

        let status = OutcomeStatus::from(&resolution);
        let (winner_op_id, displaced_op_id) = match &resolution {
            Resolution::Applied { displaced } => {
                self.applied += 1;
                (None, displaced.as_ref().map(|w| w.op_id.clone()))
            }
            Resolution::Superseded { winner } => {
                self.superseded += 1;
                (Some(winner.op_id.clone()), None)
            }
        };

        if let Some(prior) = resolution.prior().filter(|p| p.origin != op.origin) {
            let (side, winner) = match status {
                OutcomeStatus::Applied => (ConflictResolution::RemoteWins, op.id.clone()),
                _ => (ConflictResolution::LocalWins, prior.op_id.clone()),
            };
            self.conflicts.push(Conflict {
                collection: op.collection.clone(),
                record_id: op.record_id.clone(),
                local_op_id: prior.op_id.clone(),
                remote_op_id: op.id.clone(),
                resolution: side,
                winner_op_id: winner,
            });
        }

        self.outcomes.push(OpOutcome {
            op_id: op.id.clone(),
            status,
            winner_op_id,
            displaced_op_id,
            error: None,
        });
    }

    pub fn status_of(&self, op_id: &str) -> Option<OutcomeStatus> {
        self.outcomes
            .iter()
            .find(|o| o.op_id == op_id)
            .map(|o| o.status)
    }
}

/// Applies a batch of foreign operations to a store's records.
///
/// Foreign operations never enter the pending queue, so the reconciler
/// only borrows the parts of the store it mutates.
pub struct Reconciler<'a> {
    schema: &'a Schema,
    clock: &'a mut LogicalClock,
    collections: &'a mut HashMap<CollectionName, Collection>,
    strategy: MergeStrategy,
}

impl<'a> Reconciler<'a> {
    pub(crate) fn new(
        schema: &'a Schema,
        clock: &'a mut LogicalClock,
        collections: &'a mut HashMap<CollectionName, Collection>,
        strategy: MergeStrategy,
    ) -> Self {
        Self {
            schema,
            clock,
            collections,
            strategy,
        }
    }

    /// Reconcile every operation, continuing past rejected ones.
    pub fn reconcile(mut self, remote_ops: Vec<Operation>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for op in remote_ops {
            let outcome = self.reconcile_one(&op);
            match &outcome {
                Ok(resolution) => tracing::trace!(
                    op_id = %op.id,
                    collection = %op.collection,
                    record_id = %op.record_id,
                    ?resolution,
                    "reconciled remote operation"
                ),
                Err(err) => tracing::debug!(op_id = %op.id, error = %err, "rejected remote operation"),
            }
            report.push(&op, outcome);
        }

        tracing::debug!(
            strategy = ?self.strategy,
            applied = report.applied,
            superseded = report.superseded,
            rejected = report.rejected,
            conflicts = report.conflicts.len(),
            clock = self.clock.counter(),
            "reconciled batch"
        );

        report
    }

    fn reconcile_one(&mut self, op: &Operation) -> Result<Resolution> {
        op.check_well_formed()?;
        self.schema.validate(&op.collection, op.kind, &op.fields)?;

        self.clock.observe(&op.logical)?;

        let collection = self
            .collections
            .entry(op.collection.clone())
            .or_default();
        Ok(collection.apply_resolved(op, self.strategy))
    }
}
