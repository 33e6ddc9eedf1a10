// crates/tollgate-store-sqlite/tests/tenant_store_unit.rs
// ============================================================================
// Module: Tenant Namespace Store Unit Tests
// Description: Targeted tests for per-account namespace isolation.
// Purpose: Validate lazy resource creation, append-only inserts, read-only
//          raw queries, and best-effort namespace removal.
// ============================================================================

//! ## Overview
//! Unit-level tests for tenant namespace invariants:
//! - Resource tables are created lazily and idempotently
//! - Inserts return monotonically increasing row ids
//! - Namespaces are isolated per account
//! - Raw queries run read-only and surface engine errors verbatim
//! - Namespace removal tolerates pre-missing files

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use tollgate_core::ResourceName;
use tollgate_core::secrets;
use tollgate_store_sqlite::TenantStore;
use tollgate_store_sqlite::TenantStoreConfig;
use tollgate_store_sqlite::TenantStoreError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_for(temp: &TempDir) -> TenantStore {
    TenantStore::new(&TenantStoreConfig {
        data_dir: temp.path().join("data"),
    })
    .expect("tenant store init")
}

fn resource(name: &str) -> ResourceName {
    ResourceName::parse(name).expect("valid resource name")
}

// ============================================================================
// SECTION: Resource Tables
// ============================================================================

#[test]
fn ensure_resource_is_idempotent_and_lazy() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    let account = secrets::new_account_id();
    let events = resource("events");

    assert!(!store.namespace_path(&account).exists());
    store.ensure_resource(&account, &events).unwrap();
    store.ensure_resource(&account, &events).unwrap();
    assert!(store.namespace_path(&account).exists());
}

#[test]
fn insert_resource_returns_increasing_ids() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    let account = secrets::new_account_id();
    let events = resource("events");
    store.ensure_resource(&account, &events).unwrap();

    let first = store.insert_resource(&account, &events, &json!({"kind": "a"})).unwrap();
    let second = store.insert_resource(&account, &events, &json!({"kind": "b"})).unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[test]
fn namespaces_are_isolated_per_account() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    let first = secrets::new_account_id();
    let second = secrets::new_account_id();
    let events = resource("events");
    store.ensure_resource(&first, &events).unwrap();
    store.insert_resource(&first, &events, &json!({"owner": "first"})).unwrap();

    // The second account's namespace does not exist, let alone the table.
    let result = store.raw_query(&second, "SELECT COUNT(1) AS n FROM events", &[]);
    assert!(matches!(result, Err(TenantStoreError::Query(_))));
}

// ============================================================================
// SECTION: Raw Queries
// ============================================================================

#[test]
fn raw_query_returns_rows_as_json_objects() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    let account = secrets::new_account_id();
    let events = resource("events");
    store.ensure_resource(&account, &events).unwrap();
    store.insert_resource(&account, &events, &json!({"kind": "signup"})).unwrap();

    let rows = store
        .raw_query(
            &account,
            "SELECT id, instance FROM events WHERE id = ?1",
            &[json!(1)],
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&Value::from(1)));
    let instance = rows[0].get("instance").and_then(Value::as_str).expect("instance text");
    assert!(instance.contains("signup"));
}

#[test]
fn raw_query_surfaces_engine_errors_verbatim() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    let account = secrets::new_account_id();
    store.ensure_resource(&account, &resource("events")).unwrap();

    let result = store.raw_query(&account, "SELECT * FROM missing_table", &[]);
    let Err(TenantStoreError::Query(message)) = result else {
        panic!("expected query error");
    };
    assert!(message.contains("missing_table"));
}

#[test]
fn raw_query_connection_is_read_only() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    let account = secrets::new_account_id();
    store.ensure_resource(&account, &resource("events")).unwrap();

    let result =
        store.raw_query(&account, "INSERT INTO events (instance) VALUES ('{}')", &[]);
    assert!(matches!(result, Err(TenantStoreError::Query(_))));
}

// ============================================================================
// SECTION: Namespace Removal
// ============================================================================

#[test]
fn remove_namespace_tolerates_missing_files() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    let account = secrets::new_account_id();

    // Never created; removal is still a success.
    store.remove_namespace(&account).unwrap();

    let events = resource("events");
    store.ensure_resource(&account, &events).unwrap();
    assert!(store.namespace_path(&account).exists());
    store.remove_namespace(&account).unwrap();
    assert!(!store.namespace_path(&account).exists());
    store.remove_namespace(&account).unwrap();
}
