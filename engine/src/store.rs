//! Store - the in-memory state container.
//!
//! The Store holds all records and the pending queue. It stamps local
//! mutations, applies them under the configured conflict rule, and tracks
//! what still needs to be synced.

use crate::config::StoreConfig;
use crate::error::{Error, Result, SchemaViolation};
use crate::operation::{Fields, OperationDraft};
use crate::pending::{AckSummary, PendingQueue};
use crate::reconcile::{MergeStrategy, PriorWrite, ReconcileReport, Reconciler, Resolution};
use crate::snapshot::{SnapshotMetadata, StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
use crate::{
    CollectionName, LogicalClock, LogicalTimestamp, NodeId, Operation, OperationId, Record,
    RecordId, Schema, WallTime,
};
use std::collections::{BTreeMap, HashMap};

/// Records of one collection, tombstones included, ordered by record id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    records: BTreeMap<RecordId, Record>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a record by ID, tombstones included.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn active_records(&self) -> impl Iterator<Item = &Record> {
        self.records.values().filter(|r| r.is_active())
    }

    pub fn all_records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn records(&self, include_deleted: bool) -> Vec<&Record> {
        if include_deleted {
            self.all_records().collect()
        } else {
            self.active_records().collect()
        }
    }

    /// Count of active records.
    pub fn len(&self) -> usize {
        self.active_records().count()
    }

    /// Count of records including tombstones.
    pub fn total_len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Conflict-resolved application of a validated operation.
    ///
    /// An unseen record is created from the operation whatever its kind. An
    /// existing record is overwritten only if the operation beats its stamp.
    pub fn apply_resolved(&mut self, op: &Operation, strategy: MergeStrategy) -> Resolution {
        match self.records.get_mut(&op.record_id) {
            None => {
                self.records
                    .insert(op.record_id.clone(), Record::from_operation(op));
                Resolution::Applied { displaced: None }
            }
            Some(record) if strategy.wins(op.stamp(), record.stamp()) => {
                let displaced = PriorWrite::of(record);
                record.overwrite(op);
                Resolution::Applied {
                    displaced: Some(displaced),
                }
            }
            Some(record) => Resolution::Superseded {
                winner: PriorWrite::of(record),
            },
        }
    }
}

impl Extend<Record> for Collection {
    fn extend<I: IntoIterator<Item = Record>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

/// The main store holding all state.
#[derive(Debug, Clone)]
pub struct Store {
    schema: Schema,
    node_id: NodeId,
    config: StoreConfig,
    clock: LogicalClock,
    collections: HashMap<CollectionName, Collection>,
    pending: PendingQueue,
}

impl Store {
    /// Create a new store with the default configuration.
    pub fn new(schema: Schema, node_id: impl Into<NodeId>) -> Self {
        Self::with_config(schema, node_id, StoreConfig::default())
    }

    pub fn with_config(schema: Schema, node_id: impl Into<NodeId>, config: StoreConfig) -> Self {
        let node_id = node_id.into();
        let clock = LogicalClock::new(node_id.clone());
        let collections = empty_collections(&schema);

        tracing::debug!(
            node_id = %node_id,
            collections = collections.len(),
            strategy = ?config.strategy,
            "store created"
        );

        Self {
            schema,
            node_id,
            config,
            clock,
            collections,
            pending: PendingQueue::new(),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Advance the clock and return the fresh timestamp.
    pub fn tick(&mut self) -> Result<LogicalTimestamp> {
        self.clock.tick()
    }

    /// Apply a local mutation.
    ///
    /// The draft is validated, stamped with a fresh timestamp, applied under
    /// the configured strategy and queued for sync. A rejected draft leaves
    /// the store untouched, clock included.
    pub fn apply(&mut self, draft: OperationDraft, wall_time: WallTime) -> Result<Operation> {
        if let Err(err) = self.check_draft(&draft) {
            tracing::debug!(
                collection = %draft.collection,
                record_id = %draft.record_id,
                error = %err,
                "rejected local operation"
            );
            return Err(err);
        }

        let logical = self.clock.tick().map_err(|err| {
            tracing::warn!(node_id = %self.node_id, "logical clock exhausted");
            err
        })?;
        let op = draft.finalize(logical, wall_time);
        let resolution = self
            .collections
            .entry(op.collection.clone())
            .or_default()
            .apply_resolved(&op, self.config.strategy);

        tracing::debug!(
            op_id = %op.id,
            collection = %op.collection,
            record_id = %op.record_id,
            kind = ?op.kind,
            ?resolution,
            "applied local operation"
        );

        self.pending.push(op.clone());
        Ok(op)
    }

    fn check_draft(&self, draft: &OperationDraft) -> Result<()> {
        draft.check_well_formed()?;
        self.schema
            .validate(&draft.collection, draft.kind, &draft.fields)
    }

    /// Get a record by collection and ID. Tombstones are returned too.
    pub fn get(&self, collection: &str, id: &str) -> Result<&Record> {
        self.collection_or_err(collection)?
            .get(id)
            .ok_or_else(|| Error::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    /// Records of a collection ordered by record ID.
    pub fn query(&self, collection: &str, include_deleted: bool) -> Result<Vec<&Record>> {
        Ok(self
            .select(collection)?
            .include_deleted(include_deleted)
            .all())
    }

    /// Start a query on a collection.
    pub fn select(&self, collection: &str) -> Result<QueryBuilder<'_>> {
        self.collection_or_err(collection).map(QueryBuilder::new)
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    // Every schema collection has an entry, and nothing else does.
    fn collection_or_err(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| SchemaViolation::UnknownCollection(name.to_string()).into())
    }

    /// Pending operations in local apply order.
    pub fn pending_ops(&self) -> &[Operation] {
        self.pending.as_slice()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Acknowledge operations as synced (remove from pending).
    pub fn acknowledge<S: AsRef<str>>(&mut self, op_ids: &[S]) -> AckSummary {
        let summary = self.pending.acknowledge(op_ids);
        tracing::debug!(
            requested = op_ids.len(),
            acknowledged = summary.acknowledged.len(),
            remaining = summary.remaining,
            "acknowledged pending operations"
        );
        summary
    }

    /// Whether an operation is still waiting for acknowledgment.
    pub fn is_pending(&self, op_id: &OperationId) -> bool {
        self.pending.contains(op_id)
    }

    /// Merge operations received from other replicas.
    ///
    /// Each operation is judged independently against the stored record, so
    /// the batch order does not affect the final state. Foreign operations
    /// are never queued as pending.
    pub fn reconcile(&mut self, remote_ops: Vec<Operation>, strategy: MergeStrategy) -> ReconcileReport {
        Reconciler::new(&self.schema, &mut self.clock, &mut self.collections, strategy)
            .reconcile(remote_ops)
    }

    /// Reconcile with the strategy this store applies local writes with.
    pub fn reconcile_default(&mut self, remote_ops: Vec<Operation>) -> ReconcileReport {
        let strategy = self.config.strategy;
        self.reconcile(remote_ops, strategy)
    }

    /// Export the current store state as a snapshot.
    pub fn export_state(&self) -> StoreSnapshot {
        let mut snapshot = StoreSnapshot::new(self.schema.clone(), self.node_id.clone());
        snapshot.clock.counter = self.clock.counter();

        for collection in self.collections.values() {
            for record in collection.all_records() {
                snapshot.add_record(record.clone());
            }
        }
        snapshot.pending = self.pending.as_slice().to_vec();

        snapshot
    }

    /// Replace the store state with a snapshot.
    ///
    /// Everything is validated before anything changes, so a rejected
    /// snapshot leaves the store exactly as it was. The schema and node id
    /// of this store are kept. Pending operations that did not originate
    /// here are dropped. The clock is raised past every counter the
    /// snapshot carries, not just its saved clock.
    pub fn import_state(&mut self, snapshot: StoreSnapshot) -> Result<()> {
        if let Err(err) = snapshot.validate(&self.schema) {
            tracing::warn!(
                node_id = %self.node_id,
                snapshot_node = %snapshot.node_id,
                error = %err,
                "rejected snapshot import"
            );
            return Err(err);
        }

        let clock_floor = snapshot.max_counter();
        let StoreSnapshot {
            node_id: source,
            collections,
            pending,
            ..
        } = snapshot;

        let mut restored = empty_collections(&self.schema);
        for (name, records) in collections {
            restored.entry(name).or_default().extend(records.into_values());
        }

        let before = pending.len();
        let pending: Vec<_> = pending
            .into_iter()
            .filter(|op| op.origin == self.node_id)
            .collect();
        if pending.len() < before {
            tracing::debug!(
                source = %source,
                dropped = before - pending.len(),
                "dropped pending operations of another node"
            );
        }

        self.collections = restored;
        self.pending = PendingQueue::from_ops(pending);
        self.clock.restore(clock_floor);

        tracing::info!(
            source = %source,
            records = self.record_count(),
            pending = self.pending.len(),
            clock = self.clock.counter(),
            "imported snapshot"
        );

        Ok(())
    }

    /// Summary of the store without the full payload.
    pub fn snapshot_metadata(&self) -> SnapshotMetadata {
        SnapshotMetadata {
            format_version: SNAPSHOT_FORMAT_VERSION,
            schema_version: self.schema.version,
            node_id: self.node_id.clone(),
            clock_counter: self.clock.counter(),
            collection_count: self.collections.len(),
            record_count: self.record_count(),
            active_record_count: self.collections.values().map(Collection::len).sum(),
            pending_count: self.pending.len(),
        }
    }

    fn record_count(&self) -> usize {
        self.collections.values().map(Collection::total_len).sum()
    }

    /// Drain the pending queue, returning what was queued.
    pub fn take_pending(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.pending).into_vec()
    }
}

fn empty_collections(schema: &Schema) -> HashMap<CollectionName, Collection> {
    schema
        .collections
        .keys()
        .map(|name| (name.clone(), Collection::new()))
        .collect()
}

/// Builder for querying records in a collection.
#[derive(Debug)]
pub struct QueryBuilder<'a> {
    collection: &'a Collection,
    include_deleted: bool,
}

impl<'a> QueryBuilder<'a> {
    fn new(collection: &'a Collection) -> Self {
        Self {
            collection,
            include_deleted: false,
        }
    }

    /// Include tombstones in results.
    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &'a Record> + 'a> {
        if self.include_deleted {
            Box::new(self.collection.all_records())
        } else {
            Box::new(self.collection.active_records())
        }
    }

    pub fn all(self) -> Vec<&'a Record> {
        self.iter().collect()
    }

    pub fn first(self) -> Option<&'a Record> {
        self.iter().next()
    }

    pub fn count(self) -> usize {
        self.iter().count()
    }

    /// Filter records by a predicate on their fields.
    pub fn filter<F>(self, predicate: F) -> Vec<&'a Record>
    where
        F: Fn(&Fields) -> bool,
    {
        self.iter().filter(|r| predicate(&r.fields)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CollectionSchema, FieldDef, FieldType};
    use serde_json::json;

    fn test_schema() -> Schema {
        Schema::new(1).with_collection(CollectionSchema::new(
            "users",
            vec![
                FieldDef::required("name", FieldType::String),
                FieldDef::optional("age", FieldType::Int),
            ],
        ))
    }

    fn test_store() -> Store {
        Store::new(test_schema(), "test-node")
    }

    fn fields(value: serde_json::Value) -> Fields {
        serde_json::from_value(value).unwrap()
    }

    fn create(id: &str, name: &str) -> OperationDraft {
        OperationDraft::create("users", id, fields(json!({ "name": name })))
    }

    #[test]
    fn create_store() {
        let store = test_store();
        assert_eq!(store.node_id(), "test-node");
        assert_eq!(store.clock().counter(), 0);
        assert!(store.collection("users").is_some());
        assert_eq!(store.config().strategy, MergeStrategy::ClockWins);
    }

    #[test]
    fn apply_create() {
        let mut store = test_store();
        let op = store.apply(create("user-1", "Alice"), 1000).unwrap();

        assert_eq!(op.id, "test-node:1");
        assert_eq!(op.origin, "test-node");
        assert_eq!(op.wall_time, 1000);

        let record = store.get("users", "user-1").unwrap();
        assert_eq!(record.fields["name"], "Alice");
        assert_eq!(record.last_op, op.id);
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn apply_update_replaces_fields() {
        let mut store = test_store();
        store
            .apply(
                OperationDraft::create("users", "user-1", fields(json!({"name": "Alice", "age": 30}))),
                1000,
            )
            .unwrap();
        store
            .apply(
                OperationDraft::update("users", "user-1", fields(json!({"name": "Alice Smith"}))),
                2000,
            )
            .unwrap();

        let record = store.get("users", "user-1").unwrap();
        assert_eq!(record.fields, fields(json!({"name": "Alice Smith"})));
        assert_eq!(record.last_wall_time, 2000);
    }

    #[test]
    fn update_of_unknown_record_creates_it() {
        let mut store = test_store();
        store
            .apply(
                OperationDraft::update("users", "user-9", fields(json!({"name": "Zed"}))),
                1000,
            )
            .unwrap();
        assert!(store.get("users", "user-9").unwrap().is_active());
    }

    #[test]
    fn apply_delete_leaves_tombstone() {
        let mut store = test_store();
        store.apply(create("user-1", "Alice"), 1000).unwrap();
        store
            .apply(OperationDraft::delete("users", "user-1"), 2000)
            .unwrap();

        let record = store.get("users", "user-1").unwrap();
        assert!(record.deleted);
        assert!(record.fields.is_empty());
        assert!(store.query("users", false).unwrap().is_empty());
        assert_eq!(store.query("users", true).unwrap().len(), 1);
    }

    #[test]
    fn delete_of_unknown_record_leaves_tombstone() {
        let mut store = test_store();
        store
            .apply(OperationDraft::delete("users", "ghost"), 1000)
            .unwrap();
        assert!(store.get("users", "ghost").unwrap().deleted);
    }

    #[test]
    fn rejected_apply_changes_nothing() {
        let mut store = test_store();
        let result = store.apply(
            OperationDraft::create("users", "user-1", fields(json!({"name": 7}))),
            1000,
        );

        assert!(matches!(
            result,
            Err(Error::SchemaViolation(SchemaViolation::TypeMismatch { .. }))
        ));
        assert_eq!(store.clock().counter(), 0);
        assert_eq!(store.pending_count(), 0);
        assert!(matches!(
            store.get("users", "user-1"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn apply_unknown_collection() {
        let mut store = test_store();
        let result = store.apply(OperationDraft::delete("posts", "p1"), 1000);
        assert!(matches!(
            result,
            Err(Error::SchemaViolation(SchemaViolation::UnknownCollection(c))) if c == "posts"
        ));
    }

    #[test]
    fn get_missing_vs_unknown_collection() {
        let store = test_store();
        assert!(matches!(
            store.get("users", "nope"),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            store.get("posts", "nope"),
            Err(Error::SchemaViolation(_))
        ));
        assert!(store.query("posts", false).is_err());
    }

    #[test]
    fn query_is_ordered_by_id() {
        let mut store = test_store();
        for id in ["c", "a", "b"] {
            store.apply(create(id, id), 1000).unwrap();
        }
        let ids: Vec<_> = store
            .query("users", false)
            .unwrap()
            .into_iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn query_builder() {
        let mut store = test_store();
        store.apply(create("user-1", "Alice"), 1000).unwrap();
        store.apply(create("user-2", "Bob"), 1000).unwrap();
        store
            .apply(OperationDraft::delete("users", "user-2"), 1000)
            .unwrap();

        assert_eq!(store.select("users").unwrap().count(), 1);
        assert_eq!(
            store.select("users").unwrap().include_deleted(true).count(),
            2
        );
        assert_eq!(store.select("users").unwrap().first().unwrap().id, "user-1");

        let alices = store
            .select("users")
            .unwrap()
            .filter(|f| f.get("name") == Some(&json!("Alice")));
        assert_eq!(alices.len(), 1);
    }

    #[test]
    fn pending_and_acknowledge() {
        let mut store = test_store();
        let first = store.apply(create("user-1", "A"), 1000).unwrap();
        let second = store.apply(create("user-2", "B"), 1000).unwrap();

        let summary = store.acknowledge(&[first.id.clone()]);
        assert_eq!(summary.acknowledged, vec![first.id.clone()]);
        assert_eq!(store.pending_ops(), &[second.clone()]);
        assert!(store.is_pending(&second.id));

        let again = store.acknowledge(&[first.id]);
        assert!(again.acknowledged.is_empty());
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn timestamp_wins_local_write_can_lose() {
        let config = StoreConfig {
            strategy: MergeStrategy::TimestampWins,
        };
        let mut store = Store::with_config(test_schema(), "test-node", config);
        store.apply(create("user-1", "new"), 5000).unwrap();
        let stale = store.apply(create("user-1", "old"), 1000).unwrap();

        assert_eq!(store.get("users", "user-1").unwrap().fields["name"], "new");
        // Still queued so peers see it and discard it by the same rule.
        assert!(store.is_pending(&stale.id));
    }

    #[test]
    fn reconcile_is_not_pending() {
        let mut store = test_store();
        let op = create("user-1", "Remote")
            .finalize(LogicalTimestamp::new(3, "other"), 1000);

        let report = store.reconcile(vec![op], MergeStrategy::ClockWins);
        assert_eq!(report.applied, 1);
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.clock().counter(), 4);
    }

    #[test]
    fn export_import_roundtrip() {
        let mut store = test_store();
        store.apply(create("user-1", "Alice"), 1000).unwrap();
        store
            .apply(OperationDraft::delete("users", "user-1"), 2000)
            .unwrap();
        store.apply(create("user-2", "Bob"), 3000).unwrap();

        let before_records: Vec<Record> = store
            .query("users", true)
            .unwrap()
            .into_iter()
            .cloned()
            .collect();
        let before_pending = store.pending_ops().to_vec();
        let before_meta = store.snapshot_metadata();

        let snapshot = store.export_state();
        store.import_state(snapshot).unwrap();

        let after_records: Vec<Record> = store
            .query("users", true)
            .unwrap()
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(before_records, after_records);
        assert_eq!(before_pending, store.pending_ops());
        assert_eq!(before_meta, store.snapshot_metadata());
    }

    #[test]
    fn import_unsupported_version_changes_nothing() {
        let mut store = test_store();
        store.apply(create("user-1", "Alice"), 1000).unwrap();

        let mut snapshot = Store::new(test_schema(), "test-node").export_state();
        snapshot.format_version = SNAPSHOT_FORMAT_VERSION + 1;

        let result = store.import_state(snapshot);
        assert!(matches!(
            result,
            Err(Error::UnsupportedSnapshotVersion { .. })
        ));
        assert_eq!(store.get("users", "user-1").unwrap().fields["name"], "Alice");
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn import_schema_version_mismatch() {
        let mut store = test_store();
        let mut other_schema = test_schema();
        other_schema.version = 2;
        let snapshot = Store::new(other_schema, "test-node").export_state();

        assert!(matches!(
            store.import_state(snapshot),
            Err(Error::SchemaViolation(
                SchemaViolation::SchemaVersionMismatch { .. }
            ))
        ));
    }

    #[test]
    fn import_keeps_clock_monotonic() {
        let mut store = test_store();
        for _ in 0..5 {
            store.tick().unwrap();
        }
        let empty = Store::new(test_schema(), "test-node").export_state();
        store.import_state(empty).unwrap();

        assert_eq!(store.clock().counter(), 5);
        assert!(store.tick().unwrap().counter > 5);
    }

    #[test]
    fn import_raises_clock_past_record_stamps() {
        let mut source = Store::new(test_schema(), "server");
        source.apply(create("user-1", "Server"), 1000).unwrap();
        let mut snapshot = source.export_state();
        // Saved clock lags behind the records it holds.
        snapshot.clock.counter = 0;
        snapshot
            .collections
            .get_mut("users")
            .unwrap()
            .get_mut("user-1")
            .unwrap()
            .last_modified
            .counter = 40;

        let mut store = test_store();
        store.import_state(snapshot).unwrap();
        assert_eq!(store.clock().counter(), 40);

        let op = store
            .apply(
                OperationDraft::update("users", "user-1", fields(json!({"name": "Local"}))),
                2000,
            )
            .unwrap();
        assert_eq!(op.logical.counter, 41);
        assert_eq!(store.get("users", "user-1").unwrap().fields["name"], "Local");
    }

    #[test]
    fn import_rejects_final_counter_record() {
        let mut source = Store::new(test_schema(), "server");
        source.apply(create("user-1", "Server"), 1000).unwrap();
        let mut snapshot = source.export_state();
        snapshot
            .collections
            .get_mut("users")
            .unwrap()
            .get_mut("user-1")
            .unwrap()
            .last_modified
            .counter = u64::MAX;

        let mut store = test_store();
        assert!(matches!(
            store.import_state(snapshot),
            Err(Error::MalformedInput(_))
        ));
        assert_eq!(store.clock().counter(), 0);
    }

    #[test]
    fn remote_final_counter_cannot_pin_the_clock() {
        let mut store = test_store();
        let hostile = create("user-1", "Remote")
            .finalize(LogicalTimestamp::new(u64::MAX, "other"), 1000);

        let report = store.reconcile(vec![hostile], MergeStrategy::ClockWins);
        assert_eq!(report.rejected, 1);
        assert_eq!(store.clock().counter(), 0);

        let a = store.apply(create("user-1", "A"), 1000).unwrap();
        let b = store
            .apply(
                OperationDraft::update("users", "user-1", fields(json!({"name": "B"}))),
                1001,
            )
            .unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.get("users", "user-1").unwrap().fields["name"], "B");

        let summary = store.acknowledge(&[a.id]);
        assert_eq!(summary.acknowledged.len(), 1);
        assert_eq!(summary.remaining, 1);
    }

    #[test]
    fn exhausted_clock_fails_apply_without_effect() {
        let mut store = test_store();
        let near_end = create("user-1", "Remote")
            .finalize(LogicalTimestamp::new(u64::MAX - 1, "other"), 1000);
        store.reconcile(vec![near_end], MergeStrategy::ClockWins);
        assert_eq!(store.clock().counter(), u64::MAX);

        let result = store.apply(create("user-2", "Local"), 2000);
        assert!(matches!(result, Err(Error::ClockExhausted { .. })));
        assert_eq!(result.unwrap_err().code(), "clock_exhausted");
        assert_eq!(store.pending_count(), 0);
        assert!(store.get("users", "user-2").is_err());
    }

    #[test]
    fn import_from_other_node_is_bootstrap() {
        let mut source = Store::new(test_schema(), "server");
        source.apply(create("user-1", "Alice"), 1000).unwrap();

        let mut store = test_store();
        store.import_state(source.export_state()).unwrap();

        assert_eq!(store.node_id(), "test-node");
        assert_eq!(store.get("users", "user-1").unwrap().last_writer, "server");
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.clock().counter(), 1);
    }

    #[test]
    fn metadata_counts() {
        let mut store = test_store();
        store.apply(create("user-1", "Alice"), 1000).unwrap();
        store
            .apply(OperationDraft::delete("users", "user-2"), 1000)
            .unwrap();

        let meta = store.snapshot_metadata();
        assert_eq!(meta.format_version, SNAPSHOT_FORMAT_VERSION);
        assert_eq!(meta.collection_count, 1);
        assert_eq!(meta.record_count, 2);
        assert_eq!(meta.active_record_count, 1);
        assert_eq!(meta.pending_count, 2);
        assert_eq!(meta.clock_counter, 2);
    }

    #[test]
    fn take_pending_drains_queue() {
        let mut store = test_store();
        store.apply(create("user-1", "Alice"), 1000).unwrap();
        let drained = store.take_pending();
        assert_eq!(drained.len(), 1);
        assert_eq!(store.pending_count(), 0);
    }
}
