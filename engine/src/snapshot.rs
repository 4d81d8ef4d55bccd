//! Snapshot types for persisting and restoring store state.
//!
//! Snapshots are the bridge between the in-memory Store and whatever
//! durable storage or bootstrap transfer the host provides. They are
//! designed for deterministic serialization: two stores in the same state
//! produce byte-identical JSON.

use crate::error::{Error, Result, SchemaViolation};
use crate::{CollectionName, NodeId, Operation, Record, RecordId, Schema, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format this engine writes.
pub const SNAPSHOT_FORMAT_VERSION: i32 = 1;

/// Oldest snapshot format this engine still reads.
pub const MIN_SNAPSHOT_FORMAT_VERSION: i32 = 1;

/// Check a snapshot format version is one this engine understands.
pub fn check_format_version(found: i32) -> Result<()> {
    if (MIN_SNAPSHOT_FORMAT_VERSION..=SNAPSHOT_FORMAT_VERSION).contains(&found) {
        Ok(())
    } else {
        Err(Error::UnsupportedSnapshotVersion {
            found,
            supported: SNAPSHOT_FORMAT_VERSION,
        })
    }
}

/// Serialized clock state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockState {
    pub counter: u64,
}

/// A point-in-time image of the whole store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub format_version: i32,
    pub node_id: NodeId,
    pub schema: Schema,
    pub clock: ClockState,
    /// All records by collection, then by record ID, tombstones included
    pub collections: BTreeMap<CollectionName, BTreeMap<RecordId, Record>>,
    /// Pending operations in local apply order
    pub pending: Vec<Operation>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new(schema: Schema, node_id: impl Into<NodeId>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            node_id: node_id.into(),
            schema,
            clock: ClockState::default(),
            collections: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn add_record(&mut self, record: Record) {
        self.collections
            .entry(record.collection.clone())
            .or_default()
            .insert(record.id.clone(), record);
    }

    pub fn get_record(&self, collection: &str, id: &str) -> Option<&Record> {
        self.collections.get(collection)?.get(id)
    }

    /// Count total records across all collections, tombstones included.
    pub fn record_count(&self) -> usize {
        self.collections.values().map(|c| c.len()).sum()
    }

    /// Count active (non-deleted) records.
    pub fn active_record_count(&self) -> usize {
        self.collections
            .values()
            .flat_map(|c| c.values())
            .filter(|r| r.is_active())
            .count()
    }

    /// Validate the snapshot before it replaces a store built on `schema`.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        check_format_version(self.format_version)?;

        if self.schema.version != schema.version {
            return Err(SchemaViolation::SchemaVersionMismatch {
                expected: schema.version,
                actual: self.schema.version,
            }
            .into());
        }

        for (collection_name, records) in &self.collections {
            let collection_schema = schema.collection(collection_name)?;
            for (id, record) in records {
                if &record.collection != collection_name || &record.id != id {
                    return Err(Error::malformed(format!(
                        "record {}/{} filed under {}/{}",
                        record.collection, record.id, collection_name, id
                    )));
                }
                if record.last_modified.counter == u64::MAX {
                    return Err(Error::malformed(format!(
                        "record {}/{} carries the final logical counter",
                        collection_name, id
                    )));
                }
                if record.is_active() {
                    collection_schema.validate_fields(&record.fields)?;
                }
            }
        }

        for op in &self.pending {
            op.check_well_formed()?;
            schema.validate(&op.collection, op.kind, &op.fields)?;
        }

        Ok(())
    }

    /// Highest logical counter anywhere in the snapshot: the saved clock,
    /// every record stamp and every pending operation.
    pub fn max_counter(&self) -> u64 {
        let records = self
            .collections
            .values()
            .flat_map(|c| c.values())
            .map(|r| r.last_modified.counter);
        let pending = self.pending.iter().map(|op| op.logical.counter);

        records
            .chain(pending)
            .fold(self.clock.counter, u64::max)
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON.
    ///
    /// The format version is read before the body is decoded, so a snapshot
    /// from a newer engine is reported as unsupported even when its layout
    /// no longer matches.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let found = value
            .get("formatVersion")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| Error::malformed("snapshot is missing formatVersion"))?;
        let found = found.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        check_format_version(found)?;

        Ok(serde_json::from_value(value)?)
    }
}

/// Summary of a store or snapshot (without the full data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub format_version: i32,
    pub schema_version: SchemaVersion,
    pub node_id: NodeId,
    pub clock_counter: u64,
    pub collection_count: usize,
    /// Records including tombstones
    pub record_count: usize,
    pub active_record_count: usize,
    pub pending_count: usize,
}

impl From<&StoreSnapshot> for SnapshotMetadata {
    fn from(snapshot: &StoreSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            schema_version: snapshot.schema.version,
            node_id: snapshot.node_id.clone(),
            clock_counter: snapshot.clock.counter,
            collection_count: snapshot.schema.collections.len(),
            record_count: snapshot.record_count(),
            active_record_count: snapshot.active_record_count(),
            pending_count: snapshot.pending.len(),
        }
    }
}
