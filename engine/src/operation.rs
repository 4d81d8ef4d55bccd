//! Operation types for expressing changes.
//!
//! Every mutation is expressed as an immutable operation rather than a
//! direct write. Local callers submit an [`OperationDraft`]; the store
//! stamps it into a full [`Operation`] that can be shipped to other
//! replicas and replayed there.

use crate::error::{Error, Result};
use crate::{CollectionName, LogicalTimestamp, NodeId, RecordId, WallTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for an operation.
pub type OperationId = String;

/// Field values of a record or operation, ordered by field name.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// What an operation does to its target record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

impl OpKind {
    /// Whether this kind carries field values that need schema checks.
    pub fn carries_fields(self) -> bool {
        !matches!(self, OpKind::Delete)
    }
}

/// A mutation requested by a local caller, before the store stamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDraft {
    pub collection: CollectionName,
    pub record_id: RecordId,
    pub kind: OpKind,
    #[serde(default)]
    pub fields: Fields,
}

impl OperationDraft {
    pub fn create(
        collection: impl Into<CollectionName>,
        record_id: impl Into<RecordId>,
        fields: Fields,
    ) -> Self {
        Self::new(collection, record_id, OpKind::Create, fields)
    }

    pub fn update(
        collection: impl Into<CollectionName>,
        record_id: impl Into<RecordId>,
        fields: Fields,
    ) -> Self {
        Self::new(collection, record_id, OpKind::Update, fields)
    }

    pub fn delete(collection: impl Into<CollectionName>, record_id: impl Into<RecordId>) -> Self {
        Self::new(collection, record_id, OpKind::Delete, Fields::new())
    }

    fn new(
        collection: impl Into<CollectionName>,
        record_id: impl Into<RecordId>,
        kind: OpKind,
        fields: Fields,
    ) -> Self {
        Self {
            collection: collection.into(),
            record_id: record_id.into(),
            kind,
            fields,
        }
    }

    /// Structural checks that do not need the schema.
    pub fn check_well_formed(&self) -> Result<()> {
        check_shape(&self.collection, self.kind, &self.fields)
    }

    /// Turn the draft into a finalized operation stamped by `logical`.
    pub fn finalize(self, logical: LogicalTimestamp, wall_time: WallTime) -> Operation {
        Operation {
            id: operation_id(&logical),
            collection: self.collection,
            record_id: self.record_id,
            kind: self.kind,
            fields: self.fields,
            wall_time,
            origin: logical.node_id.clone(),
            logical,
        }
    }
}

/// A finalized, immutable mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    pub collection: CollectionName,
    pub record_id: RecordId,
    pub kind: OpKind,
    #[serde(default)]
    pub fields: Fields,
    /// Wall-clock time of the originating apply, in milliseconds
    pub wall_time: WallTime,
    pub logical: LogicalTimestamp,
    /// Node that produced the operation
    pub origin: NodeId,
}

impl Operation {
    /// Structural checks for an operation received from elsewhere.
    pub fn check_well_formed(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::malformed("operation id must not be empty"));
        }
        if self.logical.node_id != self.origin {
            return Err(Error::malformed(format!(
                "operation {} has origin '{}' but was stamped by '{}'",
                self.id, self.origin, self.logical.node_id
            )));
        }
        if self.id != operation_id(&self.logical) {
            return Err(Error::malformed(format!(
                "operation id {} does not match its stamp {}",
                self.id, self.logical
            )));
        }
        // Observing the last counter would leave the receiver nothing to tick to.
        if self.logical.counter == u64::MAX {
            return Err(Error::malformed(format!(
                "operation {} carries the final logical counter",
                self.id
            )));
        }
        check_shape(&self.collection, self.kind, &self.fields)
    }

    /// The stamp this operation competes with during conflict resolution.
    pub fn stamp(&self) -> WriteStamp<'_> {
        WriteStamp {
            logical: &self.logical,
            wall_time: self.wall_time,
        }
    }
}

/// The pair of clocks a write is judged by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStamp<'a> {
    pub logical: &'a LogicalTimestamp,
    pub wall_time: WallTime,
}

/// Operation ids are derived from the stamping timestamp, which is unique.
pub fn operation_id(logical: &LogicalTimestamp) -> OperationId {
    logical.to_string()
}

fn check_shape(collection: &str, kind: OpKind, fields: &Fields) -> Result<()> {
    if collection.is_empty() {
        return Err(Error::malformed("collection must not be empty"));
    }
    if !kind.carries_fields() && !fields.is_empty() {
        return Err(Error::malformed("delete operations carry no fields"));
    }
    Ok(())
}
