//! Record types for storing data.

use crate::operation::{Fields, OpKind, Operation, OperationId, WriteStamp};
use crate::{CollectionName, LogicalTimestamp, NodeId, RecordId, WallTime};
use serde::{Deserialize, Serialize};

/// A data record in the store.
///
/// Every field is derived from the operation that last won conflict
/// resolution for this record, so replicas that agree on the winner hold
/// identical records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub collection: CollectionName,
    pub id: RecordId,
    pub fields: Fields,
    /// Soft delete flag (tombstone)
    pub deleted: bool,
    pub last_modified: LogicalTimestamp,
    pub last_wall_time: WallTime,
    pub last_writer: NodeId,
    /// Operation that produced the current state
    pub last_op: OperationId,
}

impl Record {
    /// Build a record from the operation that creates it.
    ///
    /// A delete against a record nobody has seen yet produces a tombstone.
    pub fn from_operation(op: &Operation) -> Self {
        Self {
            collection: op.collection.clone(),
            id: op.record_id.clone(),
            fields: op.fields.clone(),
            deleted: op.kind == OpKind::Delete,
            last_modified: op.logical.clone(),
            last_wall_time: op.wall_time,
            last_writer: op.origin.clone(),
            last_op: op.id.clone(),
        }
    }

    /// Overwrite this record with a winning operation. Fields are replaced
    /// wholesale, never merged.
    pub fn overwrite(&mut self, op: &Operation) {
        self.fields = op.fields.clone();
        self.deleted = op.kind == OpKind::Delete;
        self.last_modified = op.logical.clone();
        self.last_wall_time = op.wall_time;
        self.last_writer = op.origin.clone();
        self.last_op = op.id.clone();
    }

    /// Check if record is active (not deleted).
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    pub fn stamp(&self) -> WriteStamp<'_> {
        WriteStamp {
            logical: &self.last_modified,
            wall_time: self.last_wall_time,
        }
    }
}
