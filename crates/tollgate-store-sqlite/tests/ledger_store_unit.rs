// crates/tollgate-store-sqlite/tests/ledger_store_unit.rs
// ============================================================================
// Module: SQLite Ledger Store Unit Tests
// Description: Targeted tests for ledger money-movement invariants.
// Purpose: Validate atomic debits, guarded settlement, cascade primitives,
//          and schema versioning.
// ============================================================================

//! ## Overview
//! Unit-level tests for `SQLite` ledger store invariants:
//! - Account and token round trips
//! - Store-side atomic debits under concurrency (no lost updates)
//! - At-most-once settlement for duplicate webhook deliveries
//! - Cascade deletion primitives
//! - Path and schema version validation

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;
use std::thread;

use rusqlite::Connection;
use tempfile::TempDir;
use tollgate_core::Account;
use tollgate_core::AccountId;
use tollgate_core::Invoice;
use tollgate_core::InvoiceStatus;
use tollgate_core::LedgerStore;
use tollgate_core::Scope;
use tollgate_core::SettlementOutcome;
use tollgate_core::Token;
use tollgate_core::secrets;
use tollgate_store_sqlite::SqliteJournalMode;
use tollgate_store_sqlite::SqliteLedgerConfig;
use tollgate_store_sqlite::SqliteLedgerStore;
use tollgate_store_sqlite::SqliteStoreError;
use tollgate_store_sqlite::SqliteSyncMode;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config_for_path(path: &Path) -> SqliteLedgerConfig {
    SqliteLedgerConfig {
        path: path.to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteJournalMode::Wal,
        sync_mode: SqliteSyncMode::Full,
        read_pool_size: 2,
    }
}

fn store_for(path: &Path) -> SqliteLedgerStore {
    SqliteLedgerStore::new(&config_for_path(path)).expect("store init")
}

fn new_account(parent: Option<AccountId>) -> (Account, Token) {
    let account = Account {
        id: secrets::new_account_id(),
        balance: 0,
        parent,
    };
    let token = Token {
        id: secrets::new_token_id(),
        account: account.id.clone(),
        value: secrets::new_token_value(),
        scope: Scope::All,
    };
    (account, token)
}

fn pending_invoice(account: &AccountId, amount_msat: i64) -> Invoice {
    Invoice {
        hash: secrets::new_token_value(),
        account: account.clone(),
        bolt11: "lnbc10u1fake".to_string(),
        expires: 1_999_999_999,
        amount_msat,
        secret: secrets::new_webhook_secret(),
        status: InvoiceStatus::Pending,
    }
}

// ============================================================================
// SECTION: Accounts and Tokens
// ============================================================================

#[test]
fn create_account_persists_account_and_root_token() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("ledger.db"));
    let (account, token) = new_account(None);
    store.create_account(&account, &token).unwrap();

    let loaded = store.load_account(&account.id).unwrap().expect("account exists");
    assert_eq!(loaded, account);
    let resolved = store.resolve_token(&token.value).unwrap().expect("token resolves");
    assert_eq!(resolved, token);
}

#[test]
fn resolve_token_misses_on_unknown_value() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("ledger.db"));
    assert!(store.resolve_token("no-such-token").unwrap().is_none());
}

#[test]
fn duplicate_token_value_is_rejected() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("ledger.db"));
    let (account, token) = new_account(None);
    store.create_account(&account, &token).unwrap();

    let duplicate = Token {
        id: secrets::new_token_id(),
        account: account.id.clone(),
        value: token.value.clone(),
        scope: Scope::AllReadonly,
    };
    assert!(store.insert_token(&duplicate).is_err());
}

#[test]
fn delete_token_removes_only_the_requested_token() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("ledger.db"));
    let (account, root) = new_account(None);
    store.create_account(&account, &root).unwrap();
    let extra = Token {
        id: secrets::new_token_id(),
        account: account.id.clone(),
        value: secrets::new_token_value(),
        scope: Scope::AllReadonly,
    };
    store.insert_token(&extra).unwrap();

    store.delete_token(&extra.id).unwrap();
    assert!(store.load_token(&extra.id).unwrap().is_none());
    assert!(store.load_token(&root.id).unwrap().is_some());
}

// ============================================================================
// SECTION: Cascade Primitives
// ============================================================================

#[test]
fn children_list_and_cascade_rows_delete() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("ledger.db"));
    let (parent, parent_token) = new_account(None);
    store.create_account(&parent, &parent_token).unwrap();
    let (child_a, token_a) = new_account(Some(parent.id.clone()));
    let (child_b, token_b) = new_account(Some(parent.id.clone()));
    store.create_account(&child_a, &token_a).unwrap();
    store.create_account(&child_b, &token_b).unwrap();

    let mut children = store.list_children(&parent.id).unwrap();
    children.sort();
    let mut expected = vec![child_a.id.clone(), child_b.id.clone()];
    expected.sort();
    assert_eq!(children, expected);

    for id in [&child_a.id, &child_b.id, &parent.id] {
        store.delete_tokens_for(id).unwrap();
    }
    store.delete_children(&parent.id).unwrap();
    store.delete_account_row(&parent.id).unwrap();

    assert!(store.load_account(&parent.id).unwrap().is_none());
    assert!(store.load_account(&child_a.id).unwrap().is_none());
    assert!(store.load_account(&child_b.id).unwrap().is_none());
    assert!(store.resolve_token(&token_a.value).unwrap().is_none());
    assert!(store.resolve_token(&parent_token.value).unwrap().is_none());
}

// ============================================================================
// SECTION: Debits
// ============================================================================

#[test]
fn debit_returns_post_debit_balance() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("ledger.db"));
    let (account, token) = new_account(None);
    store.create_account(&account, &token).unwrap();

    assert_eq!(store.debit(&account.id, 7).unwrap(), -7);
    assert_eq!(store.debit(&account.id, 3).unwrap(), -10);
}

#[test]
fn debit_against_missing_account_fails() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("ledger.db"));
    assert!(store.debit(&secrets::new_account_id(), 1).is_err());
}

#[test]
fn concurrent_debits_lose_no_updates() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(store_for(&temp.path().join("ledger.db")));
    let (account, token) = new_account(None);
    store.create_account(&account, &token).unwrap();

    // Two concurrent debits of 5 from balance 0 must land on -10, not -5.
    let mut handles = Vec::new();
    for _ in 0 .. 2 {
        let store = Arc::clone(&store);
        let id = account.id.clone();
        handles.push(thread::spawn(move || store.debit(&id, 5)));
    }
    for handle in handles {
        handle.join().expect("debit thread").unwrap();
    }
    let loaded = store.load_account(&account.id).unwrap().expect("account exists");
    assert_eq!(loaded.balance, -10);
}

// ============================================================================
// SECTION: Settlement
// ============================================================================

#[test]
fn settlement_credits_exactly_once_for_duplicate_delivery() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("ledger.db"));
    let (account, token) = new_account(None);
    store.create_account(&account, &token).unwrap();
    let invoice = pending_invoice(&account.id, 5_000);
    store.insert_invoice(&invoice).unwrap();

    let first = store.settle_invoice(&invoice.secret).unwrap();
    assert_eq!(
        first,
        SettlementOutcome::Credited {
            account: account.id.clone(),
            amount_msat: 5_000,
        }
    );
    let second = store.settle_invoice(&invoice.secret).unwrap();
    assert_eq!(second, SettlementOutcome::AlreadySettled);

    let loaded = store.load_account(&account.id).unwrap().expect("account exists");
    assert_eq!(loaded.balance, 5_000);
}

#[test]
fn settlement_of_unknown_secret_mutates_nothing() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("ledger.db"));
    let (account, token) = new_account(None);
    store.create_account(&account, &token).unwrap();

    let outcome = store.settle_invoice("no-such-secret").unwrap();
    assert_eq!(outcome, SettlementOutcome::UnknownSecret);
    let loaded = store.load_account(&account.id).unwrap().expect("account exists");
    assert_eq!(loaded.balance, 0);
}

#[test]
fn concurrent_duplicate_settlements_credit_once() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(store_for(&temp.path().join("ledger.db")));
    let (account, token) = new_account(None);
    store.create_account(&account, &token).unwrap();
    let invoice = pending_invoice(&account.id, 2_000);
    store.insert_invoice(&invoice).unwrap();

    let mut handles = Vec::new();
    for _ in 0 .. 4 {
        let store = Arc::clone(&store);
        let secret = invoice.secret.clone();
        handles.push(thread::spawn(move || store.settle_invoice(&secret)));
    }
    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("settle thread").unwrap())
        .collect();
    let credited = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, SettlementOutcome::Credited { .. }))
        .count();
    assert_eq!(credited, 1);
    let loaded = store.load_account(&account.id).unwrap().expect("account exists");
    assert_eq!(loaded.balance, 2_000);
}

// ============================================================================
// SECTION: Path and Schema Validation
// ============================================================================

#[test]
fn store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let result = SqliteLedgerStore::new(&config_for_path(temp.path()));
    let Err(err) = result else {
        panic!("expected directory path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn store_rejects_unsupported_schema_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ledger.db");
    {
        let connection = Connection::open(&path).unwrap();
        connection
            .execute_batch(
                "CREATE TABLE store_meta (version INTEGER NOT NULL);
                 INSERT INTO store_meta (version) VALUES (99);",
            )
            .unwrap();
    }
    let Err(err) = SqliteLedgerStore::new(&config_for_path(&path)) else {
        panic!("expected version mismatch to fail");
    };
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}
