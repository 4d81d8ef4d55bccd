//! FFI layer for host applications (Flutter, Swift, Kotlin).
//!
//! This module provides C-compatible functions. All structured data
//! crosses the boundary as JSON strings.
//!
//! # Memory Management
//!
//! - Every `char*` returned by a `carry_*` function is allocated by Rust
//!   and must be released with `carry_string_free`
//! - Store pointers must be released with `carry_store_free`
//! - Null pointers are accepted everywhere and reported as errors
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>", "code": "<code>"}` on failure
//!
//! A panic inside the engine is caught at the boundary and reported as a
//! null return.

use crate::error::{Error, Result};
use crate::{
    logging, MergeStrategy, Operation, OperationDraft, Schema, Store, StoreConfig, StoreSnapshot,
    SNAPSHOT_FORMAT_VERSION,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::{c_char, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Result wrapper for FFI responses.
#[derive(Serialize)]
#[serde(untagged)]
enum FfiResult<T: Serialize> {
    Ok { ok: T },
    Err { error: String, code: &'static str },
}

impl<T: Serialize> FfiResult<T> {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"error":"serialization failed: {}","code":"malformed_input"}}"#,
                e.to_string().replace('"', "'")
            )
        })
    }
}

fn error_json(err: &Error) -> String {
    FfiResult::<()>::Err {
        error: err.to_string(),
        code: err.code(),
    }
    .to_json()
}

/// Hand a Rust string to the caller. Free with `carry_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => {
            let err = Error::AllocationFailure("response contained a nul byte".into());
            CString::new(error_json(&err))
                .map(CString::into_raw)
                .unwrap_or(ptr::null_mut())
        }
    }
}

/// Borrow a C string as UTF-8.
unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(Error::malformed(format!("null {}", what)));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| Error::malformed(format!("{} is not valid UTF-8", what)))
}

unsafe fn parse<T: DeserializeOwned>(ptr: *const c_char, what: &str) -> Result<T> {
    let json = read_str(ptr, what)?;
    serde_json::from_str(json).map_err(|e| Error::malformed(format!("{}: {}", what, e)))
}

unsafe fn store_ref<'a>(store: *const Store) -> Result<&'a Store> {
    store
        .as_ref()
        .ok_or_else(|| Error::malformed("null store pointer"))
}

unsafe fn store_mut<'a>(store: *mut Store) -> Result<&'a mut Store> {
    store
        .as_mut()
        .ok_or_else(|| Error::malformed("null store pointer"))
}

/// Run an entry point and encode its result. Panics become null.
fn respond<T, F>(f: F) -> *mut c_char
where
    T: Serialize,
    F: FnOnce() -> Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => to_c_string(FfiResult::Ok { ok: value }.to_json()),
        Ok(Err(err)) => {
            tracing::warn!(code = err.code(), "engine error: {}", err);
            to_c_string(error_json(&err))
        }
        Err(_) => {
            tracing::error!("panic caught at FFI boundary");
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Store Lifecycle
// ============================================================================

unsafe fn new_store(
    schema_json: *const c_char,
    node_id: *const c_char,
    config: StoreConfig,
) -> *mut Store {
    let built = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Store> {
        let schema: Schema = parse(schema_json, "schema")?;
        schema.check()?;
        let node_id = read_str(node_id, "node id")?;
        if node_id.is_empty() {
            return Err(Error::malformed("node id must not be empty"));
        }
        Ok(Store::with_config(schema, node_id, config))
    }));

    match built {
        Ok(Ok(store)) => Box::into_raw(Box::new(store)),
        Ok(Err(err)) => {
            tracing::warn!(code = err.code(), "store creation failed: {}", err);
            ptr::null_mut()
        }
        Err(_) => ptr::null_mut(),
    }
}

/// Create a new store.
///
/// # Arguments
/// - `schema_json`: JSON string of Schema
/// - `node_id`: Node identifier string
///
/// # Returns
/// Pointer to Store, or null on failure.
///
/// # Safety
/// - `schema_json` and `node_id` must be valid null-terminated C strings or null
/// - Caller must free the returned pointer with `carry_store_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_new(
    schema_json: *const c_char,
    node_id: *const c_char,
) -> *mut Store {
    new_store(schema_json, node_id, StoreConfig::default())
}

/// Create a new store with a JSON `StoreConfig`. A null config means defaults.
///
/// # Safety
/// - All arguments must be valid null-terminated C strings or null
/// - Caller must free the returned pointer with `carry_store_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_new_with_config(
    schema_json: *const c_char,
    node_id: *const c_char,
    config_json: *const c_char,
) -> *mut Store {
    let config = if config_json.is_null() {
        StoreConfig::default()
    } else {
        match read_str(config_json, "config").and_then(StoreConfig::from_json) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(code = err.code(), "store creation failed: {}", err);
                return ptr::null_mut();
            }
        }
    };
    new_store(schema_json, node_id, config)
}

/// Free a store.
///
/// # Safety
/// - `store` must be a pointer from `carry_store_new*` or null
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn carry_store_free(store: *mut Store) {
    if !store.is_null() {
        drop(Box::from_raw(store));
    }
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a pointer returned by a `carry_*` function or null
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn carry_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Store Operations
// ============================================================================

/// Apply a local operation.
///
/// # Arguments
/// - `draft_json`: JSON `{"collection", "recordId", "kind", "fields"}`
/// - `wall_time`: Wall-clock time in milliseconds
///
/// # Returns
/// JSON string: `{"ok": Operation}` or `{"error": ..., "code": ...}`
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
/// - `draft_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carry_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_apply(
    store: *mut Store,
    draft_json: *const c_char,
    wall_time: i64,
) -> *mut c_char {
    respond(|| {
        let store = store_mut(store)?;
        let draft: OperationDraft = parse(draft_json, "operation")?;
        store.apply(draft, wall_time)
    })
}

/// Get a record by collection and ID. Tombstones are returned too.
///
/// # Returns
/// JSON string: `{"ok": Record}` or an error with code `not_found`
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
/// - `collection` and `id` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `carry_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_get(
    store: *const Store,
    collection: *const c_char,
    id: *const c_char,
) -> *mut c_char {
    respond(|| {
        let store = store_ref(store)?;
        let collection = read_str(collection, "collection")?;
        let id = read_str(id, "record id")?;
        store.get(collection, id)
    })
}

/// Query all records in a collection.
///
/// # Arguments
/// - `include_deleted`: 0 for active only, non-zero to include tombstones
///
/// # Returns
/// JSON string: `{"ok": [Record, ...]}` or an error
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
/// - `collection` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carry_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_query(
    store: *const Store,
    collection: *const c_char,
    include_deleted: i32,
) -> *mut c_char {
    respond(|| {
        let store = store_ref(store)?;
        let collection = read_str(collection, "collection")?;
        store.query(collection, include_deleted != 0)
    })
}

/// Get pending operations count, or -1 for a null store.
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
#[no_mangle]
pub unsafe extern "C" fn carry_store_pending_count(store: *const Store) -> i64 {
    match store.as_ref() {
        Some(s) => i64::try_from(s.pending_count()).unwrap_or(i64::MAX),
        None => -1,
    }
}

/// Get pending operations in local apply order.
///
/// # Returns
/// JSON string: `{"ok": [Operation, ...]}` or an error
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
/// - Caller must free the returned string with `carry_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_pending_ops(store: *const Store) -> *mut c_char {
    respond(|| Ok(store_ref(store)?.pending_ops()))
}

/// Acknowledge operations as synced.
///
/// # Arguments
/// - `op_ids_json`: JSON array of operation IDs
///
/// # Returns
/// JSON string: `{"ok": AckSummary}` or an error
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
/// - `op_ids_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carry_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_acknowledge(
    store: *mut Store,
    op_ids_json: *const c_char,
) -> *mut c_char {
    respond(|| {
        let store = store_mut(store)?;
        let op_ids: Vec<String> = parse(op_ids_json, "operation ids")?;
        Ok(store.acknowledge(&op_ids))
    })
}

/// Tick the store clock and return the fresh timestamp.
///
/// # Returns
/// JSON string: `{"ok": LogicalTimestamp}` or an error
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
/// - Caller must free the returned string with `carry_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_tick(store: *mut Store) -> *mut c_char {
    respond(|| store_mut(store)?.tick())
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Reconcile operations received from other replicas.
///
/// # Arguments
/// - `remote_ops_json`: JSON array of Operations
/// - `strategy`: 0 for ClockWins, 1 for TimestampWins
///
/// # Returns
/// JSON string: `{"ok": ReconcileReport}` or an error
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
/// - `remote_ops_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carry_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_reconcile(
    store: *mut Store,
    remote_ops_json: *const c_char,
    strategy: i32,
) -> *mut c_char {
    respond(|| {
        let store = store_mut(store)?;
        let strategy = MergeStrategy::try_from(strategy)?;
        let remote_ops: Vec<Operation> = parse(remote_ops_json, "remote operations")?;
        Ok(store.reconcile(remote_ops, strategy))
    })
}

// ============================================================================
// Snapshots
// ============================================================================

/// Export store state as a snapshot.
///
/// # Returns
/// JSON string: `{"ok": StoreSnapshot}` or an error
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
/// - Caller must free the returned string with `carry_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_export(store: *const Store) -> *mut c_char {
    respond(|| Ok(store_ref(store)?.export_state()))
}

/// Replace store state with a snapshot. Nothing changes on failure.
///
/// # Returns
/// JSON string: `{"ok": SnapshotMetadata}` or an error, e.g. with code
/// `unsupported_snapshot_version`
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
/// - `snapshot_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carry_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_import(
    store: *mut Store,
    snapshot_json: *const c_char,
) -> *mut c_char {
    respond(|| {
        let store = store_mut(store)?;
        let snapshot = StoreSnapshot::from_json(read_str(snapshot_json, "snapshot")?)?;
        store.import_state(snapshot)?;
        Ok(store.snapshot_metadata())
    })
}

/// Get store metadata without a full export.
///
/// # Returns
/// JSON string: `{"ok": SnapshotMetadata}` or an error
///
/// # Safety
/// - `store` must be a valid pointer from `carry_store_new*` or null
/// - Caller must free the returned string with `carry_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_store_metadata(store: *const Store) -> *mut c_char {
    respond(|| Ok(store_ref(store)?.snapshot_metadata()))
}

// ============================================================================
// Utility
// ============================================================================

/// Get the engine version.
///
/// # Returns
/// Plain version string; caller must free it with `carry_string_free`.
#[no_mangle]
pub extern "C" fn carry_version() -> *mut c_char {
    CString::new(crate::VERSION)
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

/// Get the snapshot format version this engine writes.
#[no_mangle]
pub extern "C" fn carry_snapshot_format_version() -> i32 {
    SNAPSHOT_FORMAT_VERSION
}

/// Install the engine's log subscriber.
///
/// # Arguments
/// - `filter`: fallback filter directives (e.g. `carry_store=debug`) used
///   when `CARRY_LOG` is unset; null for the default
///
/// # Returns
/// 1 if installed, 0 if a subscriber already existed.
///
/// # Safety
/// - `filter` must be a valid null-terminated C string or null
#[no_mangle]
pub unsafe extern "C" fn carry_init_logging(filter: *const c_char) -> i32 {
    let filter = read_str(filter, "filter").ok();
    i32::from(logging::init(filter))
}
