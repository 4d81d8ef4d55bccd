//! # Carry Store
//!
//! A replicated, local-first store engine.
//!
//! Every mutation is recorded as a causally stamped operation. Operations
//! made locally wait in a pending queue until the sync layer acknowledges
//! them; operations received from other replicas are reconciled so that
//! every replica converges to the same state whatever the delivery order.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of files, network, or platform
//! - **Deterministic**: the same operation set always yields the same records
//! - **Single owner**: one caller drives a store sequentially; there is no
//!   internal locking
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A record is a flat map of fields in a collection. Deletes leave a
//! tombstone so that late writes can still be compared against it.
//!
//! ### Operations
//!
//! Local callers submit an [`OperationDraft`]; [`Store::apply`] stamps it
//! with a [`LogicalTimestamp`] and returns the finalized [`Operation`].
//!
//! ### Conflict resolution
//!
//! A record is owned by the operation with the highest write stamp under the
//! active [`MergeStrategy`]:
//! - [`MergeStrategy::ClockWins`] - logical timestamp decides (default)
//! - [`MergeStrategy::TimestampWins`] - wall time decides, logical time breaks ties
//!
//! ## Quick Start
//!
//! ```rust
//! use carry_store::{
//!     CollectionSchema, FieldDef, FieldType, MergeStrategy, OperationDraft, Schema, Store,
//! };
//! use serde_json::json;
//!
//! // 1. Define a schema
//! let schema = Schema::new(1).with_collection(CollectionSchema::new(
//!     "users",
//!     vec![
//!         FieldDef::required("name", FieldType::String),
//!         FieldDef::optional("email", FieldType::String),
//!     ],
//! ));
//!
//! // 2. Create a store per replica
//! let mut phone = Store::new(schema.clone(), "phone");
//! let mut laptop = Store::new(schema, "laptop");
//!
//! // 3. Apply local operations
//! let fields = serde_json::from_value(json!({"name": "Alice"})).unwrap();
//! let op = phone
//!     .apply(OperationDraft::create("users", "user_1", fields), 1706745600000)
//!     .unwrap();
//! assert_eq!(phone.pending_count(), 1);
//!
//! // 4. Ship pending ops to the other replica and acknowledge them
//! let report = laptop.reconcile(phone.pending_ops().to_vec(), MergeStrategy::ClockWins);
//! assert_eq!(report.applied, 1);
//! phone.acknowledge(&[op.id]);
//!
//! assert_eq!(laptop.get("users", "user_1").unwrap().fields["name"], "Alice");
//! ```
//!
//! ## FFI
//!
//! The [`ffi`] module exposes the store through a C ABI for Dart/Flutter,
//! Swift, Kotlin and friends. All structured data crosses as JSON strings.
//!
//! ## Persistence
//!
//! Use [`Store::export_state`] and [`Store::import_state`] with
//! [`StoreSnapshot`]. Snapshots serialize deterministically.

pub mod clock;
pub mod config;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod operation;
pub mod pending;
pub mod reconcile;
pub mod record;
pub mod schema;
pub mod snapshot;
pub mod store;

pub use clock::{LogicalClock, LogicalTimestamp};
pub use config::{ConfigError, StoreConfig};
pub use error::{Error, SchemaViolation};
pub use operation::{Fields, OpKind, Operation, OperationDraft, OperationId, WriteStamp};
pub use pending::{AckSummary, PendingQueue};
pub use reconcile::{
    Conflict, ConflictResolution, MergeStrategy, OpOutcome, OutcomeError, OutcomeStatus,
    PriorWrite, ReconcileReport, Reconciler, Resolution,
};
pub use record::Record;
pub use schema::{CollectionSchema, FieldDef, FieldType, Schema};
pub use snapshot::{ClockState, SnapshotMetadata, StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{Collection, QueryBuilder, Store};

/// Type aliases for clarity
pub type RecordId = String;
pub type CollectionName = String;
pub type NodeId = String;
/// Milliseconds since the Unix epoch
pub type WallTime = i64;
pub type SchemaVersion = u32;

/// Engine version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
