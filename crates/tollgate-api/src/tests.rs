// crates/tollgate-api/src/tests.rs
// ============================================================================
// Module: API Flow Tests
// Description: End-to-end operation tests over real SQLite stores.
// Purpose: Validate auth fail-fast, scope gates, metering, cascade deletion,
//          and at-most-once settlement through the route operations.
// ============================================================================

//! ## Overview
//! These tests drive the route operations against a real ledger store, a
//! real tenant store, and a stub payment provider:
//! - Credential fail-fast (no anonymous fallback for bad tokens)
//! - Scope gates per route, including the `all` super-scope
//! - Account nesting limits and cascade deletion
//! - Token deletion of the requested id only
//! - Invoice validation and provider failure propagation
//! - Duplicate webhook delivery crediting exactly once
//! - Billed calls: floor admission, debits, and balance snapshots

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;

use axum::http::StatusCode;
use serde_json::json;
use tempfile::TempDir;
use tollgate_core::AccountId;
use tollgate_payments::PaymentError;
use tollgate_payments::PaymentProvider;
use tollgate_payments::ProviderInvoice;
use tollgate_store_sqlite::SqliteJournalMode;
use tollgate_store_sqlite::SqliteLedgerConfig;
use tollgate_store_sqlite::SqliteLedgerStore;
use tollgate_store_sqlite::SqliteSyncMode;
use tollgate_store_sqlite::TenantStore;
use tollgate_store_sqlite::TenantStoreConfig;

use crate::audit::NoopAuditSink;
use crate::routes::AppState;
use crate::routes::op_create_account;
use crate::routes::op_create_invoice;
use crate::routes::op_create_resource;
use crate::routes::op_create_token;
use crate::routes::op_delete_account;
use crate::routes::op_delete_token;
use crate::routes::op_raw_query;
use crate::routes::op_webhook;
use crate::routes::router;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Stub Provider
// ============================================================================

/// Stub payment provider capturing the webhook secret it was handed.
struct StubProvider {
    /// When set, every invoice request fails upstream.
    fail: bool,
    /// Secrets received from invoice requests, newest last.
    secrets: Mutex<Vec<String>>,
}

impl StubProvider {
    fn new() -> Self {
        Self {
            fail: false,
            secrets: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            secrets: Mutex::new(Vec::new()),
        }
    }

    fn last_secret(&self) -> String {
        self.secrets.lock().unwrap().last().cloned().expect("secret captured")
    }
}

impl PaymentProvider for StubProvider {
    fn create_invoice(
        &self,
        amount_msat: i64,
        webhook_secret: &str,
    ) -> Result<ProviderInvoice, PaymentError> {
        if self.fail {
            return Err(PaymentError::Request("stub outage".to_string()));
        }
        self.secrets.lock().unwrap().push(webhook_secret.to_string());
        Ok(ProviderInvoice {
            hash: format!("hash-{amount_msat}"),
            bolt11: "lnbc10u1stub".to_string(),
            expires: 1_999_999_999,
        })
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Test fixture owning the temp directory behind the stores.
struct Fixture {
    /// Shared application state under test.
    state: AppState,
    /// Stub provider handle for secret capture.
    provider: Arc<StubProvider>,
    /// Temp directory keeping the store files alive.
    _temp: TempDir,
}

fn fixture_with_provider(provider: Arc<StubProvider>) -> Fixture {
    let temp = TempDir::new().expect("tempdir");
    let ledger = SqliteLedgerStore::new(&SqliteLedgerConfig {
        path: temp.path().join("ledger.db"),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteJournalMode::Wal,
        sync_mode: SqliteSyncMode::Full,
        read_pool_size: 2,
    })
    .expect("ledger store");
    let tenants = TenantStore::new(&TenantStoreConfig {
        data_dir: temp.path().join("tenants"),
    })
    .expect("tenant store");
    let state = AppState {
        ledger: Arc::new(ledger),
        tenants,
        payments: Arc::clone(&provider) as Arc<dyn PaymentProvider>,
        audit: Arc::new(NoopAuditSink),
        metrics: Arc::new(NoopMetrics),
    };
    Fixture {
        state,
        provider,
        _temp: temp,
    }
}

fn fixture() -> Fixture {
    fixture_with_provider(Arc::new(StubProvider::new()))
}

/// Creates an account anonymously, returning `(id, bearer header, token)`.
fn create_account(state: &AppState) -> (AccountId, String, String) {
    let reply = op_create_account(state, None, b"");
    assert_eq!(reply.status, StatusCode::CREATED);
    let id = reply.body["id"].as_str().expect("account id").to_string();
    let token = reply.body["token"].as_str().expect("token value").to_string();
    (AccountId::parse(&id).expect("valid id"), format!("Bearer {token}"), token)
}

// ============================================================================
// SECTION: Credential Resolution
// ============================================================================

#[test]
fn invalid_credential_never_falls_back_to_anonymous() {
    let fx = fixture();
    // Account creation admits anonymous callers, so a fail-open resolver
    // would let this through.
    let reply = op_create_account(&fx.state, Some("Bearer not-a-real-token"), b"");
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["code"], "unauthorized");
}

#[test]
fn bearer_scheme_is_case_insensitive_with_whitespace() {
    let fx = fixture();
    let (_, _, token) = create_account(&fx.state);
    for header in [
        format!("bearer {token}"),
        format!("BEARER   {token}  "),
        format!("  BeArEr {token}"),
    ] {
        let reply =
            op_create_token(&fx.state, Some(&header), br#"{"scope": "all/readonly"}"#);
        assert_eq!(reply.status, StatusCode::CREATED);
    }
}

// ============================================================================
// SECTION: Accounts
// ============================================================================

#[test]
fn anonymous_account_creation_returns_working_credentials() {
    let fx = fixture();
    let (_, header, _) = create_account(&fx.state);
    let reply = op_create_token(&fx.state, Some(&header), br#"{"scope": "all"}"#);
    assert_eq!(reply.status, StatusCode::CREATED);
    // Authenticated responses carry the balance snapshot.
    assert_eq!(reply.balance, Some(0));
}

#[test]
fn child_accounts_cannot_create_grandchildren() {
    let fx = fixture();
    let (_, parent_header, _) = create_account(&fx.state);

    let child = op_create_account(&fx.state, Some(&parent_header), b"");
    assert_eq!(child.status, StatusCode::CREATED);
    let child_header = format!("Bearer {}", child.body["token"].as_str().unwrap());

    let grandchild = op_create_account(&fx.state, Some(&child_header), b"");
    assert_eq!(grandchild.status, StatusCode::BAD_REQUEST);
    assert_eq!(grandchild.body["code"], "account_nesting");
}

#[test]
fn account_deletion_cascades_to_children_and_storage() {
    let fx = fixture();
    let (parent_id, parent_header, _) = create_account(&fx.state);

    let mut child_ids = Vec::new();
    let mut child_tokens = Vec::new();
    for _ in 0 .. 2 {
        let reply = op_create_account(&fx.state, Some(&parent_header), b"");
        assert_eq!(reply.status, StatusCode::CREATED);
        child_ids
            .push(AccountId::parse(reply.body["id"].as_str().unwrap()).expect("child id"));
        child_tokens.push(reply.body["token"].as_str().unwrap().to_string());
    }

    // Only the first child ever writes data; the second has no storage
    // artifact, which deletion must tolerate.
    let first_child_header = format!("Bearer {}", child_tokens[0]);
    let reply = op_create_resource(
        &fx.state,
        Some(&first_child_header),
        "events",
        br#"{"instance": {"kind": "signup"}}"#,
    );
    assert_eq!(reply.status, StatusCode::OK);
    assert!(fx.state.tenants.namespace_path(&child_ids[0]).exists());
    assert!(!fx.state.tenants.namespace_path(&child_ids[1]).exists());

    let reply = op_delete_account(&fx.state, Some(&parent_header), b"");
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    for id in child_ids.iter().chain([&parent_id]) {
        assert!(fx.state.ledger.load_account(id).unwrap().is_none());
        assert!(!fx.state.tenants.namespace_path(id).exists());
    }
    for token in &child_tokens {
        assert!(fx.state.ledger.resolve_token(token).unwrap().is_none());
    }
}

#[test]
fn account_deletion_requires_authentication() {
    let fx = fixture();
    let reply = op_delete_account(&fx.state, None, b"");
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// SECTION: Tokens
// ============================================================================

#[test]
fn token_creation_validates_the_scope_enum() {
    let fx = fixture();
    let (_, header, _) = create_account(&fx.state);
    let reply = op_create_token(&fx.state, Some(&header), br#"{"scope": "root"}"#);
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "enum");
}

#[test]
fn token_deletion_removes_the_requested_token_only() {
    let fx = fixture();
    let (_, header, root_token) = create_account(&fx.state);
    let created = op_create_token(&fx.state, Some(&header), br#"{"scope": "all/readonly"}"#);
    assert_eq!(created.status, StatusCode::CREATED);
    let created_id = created.body["id"].as_str().unwrap().to_string();
    let created_value = created.body["token"].as_str().unwrap().to_string();

    let body = json!({"id": created_id}).to_string();
    let reply = op_delete_token(&fx.state, Some(&header), body.as_bytes());
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    // The requested token is gone; the authenticating token still works.
    assert!(fx.state.ledger.resolve_token(&created_value).unwrap().is_none());
    assert!(fx.state.ledger.resolve_token(&root_token).unwrap().is_some());
}

#[test]
fn token_deletion_rejects_non_owned_ids() {
    let fx = fixture();
    let (_, first_header, _) = create_account(&fx.state);
    let (_, second_header, _) = create_account(&fx.state);

    let created = op_create_token(&fx.state, Some(&second_header), br#"{"scope": "all"}"#);
    let foreign_id = created.body["id"].as_str().unwrap().to_string();

    let body = json!({"id": foreign_id}).to_string();
    let reply = op_delete_token(&fx.state, Some(&first_header), body.as_bytes());
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["code"], "forbidden");
}

// ============================================================================
// SECTION: Scope Gates
// ============================================================================

#[test]
fn readonly_scope_reaches_queries_but_not_writes() {
    let fx = fixture();
    let (_, header, _) = create_account(&fx.state);
    // Seed data with the full-scope root token first.
    let reply = op_create_resource(
        &fx.state,
        Some(&header),
        "events",
        br#"{"instance": {"kind": "signup"}}"#,
    );
    assert_eq!(reply.status, StatusCode::OK);

    let created = op_create_token(&fx.state, Some(&header), br#"{"scope": "all/readonly"}"#);
    let readonly_header = format!("Bearer {}", created.body["token"].as_str().unwrap());

    let query = op_raw_query(
        &fx.state,
        Some(&readonly_header),
        br#"{"query": "SELECT COUNT(1) AS n FROM events"}"#,
    );
    assert_eq!(query.status, StatusCode::OK);
    assert_eq!(query.body["data"][0]["n"], 1);

    let write = op_create_resource(
        &fx.state,
        Some(&readonly_header),
        "events",
        br#"{"instance": {}}"#,
    );
    assert_eq!(write.status, StatusCode::FORBIDDEN);

    // The full-scope token satisfies the read-only gate as well.
    let query = op_raw_query(
        &fx.state,
        Some(&header),
        br#"{"query": "SELECT COUNT(1) AS n FROM events"}"#,
    );
    assert_eq!(query.status, StatusCode::OK);
}

#[test]
fn readonly_scope_cannot_mint_tokens() {
    let fx = fixture();
    let (_, header, _) = create_account(&fx.state);
    let created = op_create_token(&fx.state, Some(&header), br#"{"scope": "all/readonly"}"#);
    let readonly_header = format!("Bearer {}", created.body["token"].as_str().unwrap());

    let reply = op_create_token(&fx.state, Some(&readonly_header), br#"{"scope": "all"}"#);
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

// ============================================================================
// SECTION: Invoices and Settlement
// ============================================================================

#[test]
fn invoice_amounts_below_the_minimum_fail_validation() {
    let fx = fixture();
    let (_, header, _) = create_account(&fx.state);
    let reply = op_create_invoice(&fx.state, Some(&header), br#"{"amount_msat": 999}"#);
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "minimum");
}

#[test]
fn invoice_request_returns_provider_fields_without_the_secret() {
    let fx = fixture();
    let (_, header, _) = create_account(&fx.state);
    let reply = op_create_invoice(&fx.state, Some(&header), br#"{"amount_msat": 1000}"#);
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["hash"], "hash-1000");
    assert_eq!(reply.body["bolt11"], "lnbc10u1stub");
    assert_eq!(reply.body["expires"], 1_999_999_999);
    assert!(reply.body.get("secret").is_none());
}

#[test]
fn provider_failure_propagates_as_upstream_error() {
    let fx = fixture_with_provider(Arc::new(StubProvider::failing()));
    let (_, header, _) = create_account(&fx.state);
    let reply = op_create_invoice(&fx.state, Some(&header), br#"{"amount_msat": 1000}"#);
    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    assert_eq!(reply.body["code"], "upstream");
}

#[test]
fn duplicate_settlement_credits_exactly_once() {
    let fx = fixture();
    let (account_id, header, _) = create_account(&fx.state);
    let reply = op_create_invoice(&fx.state, Some(&header), br#"{"amount_msat": 5000}"#);
    assert_eq!(reply.status, StatusCode::CREATED);

    let body = json!({"secret": fx.provider.last_secret()}).to_string();
    for _ in 0 .. 2 {
        let reply = op_webhook(&fx.state, None, body.as_bytes());
        assert_eq!(reply.status, StatusCode::OK);
    }
    let account = fx.state.ledger.load_account(&account_id).unwrap().expect("account");
    assert_eq!(account.balance, 5_000);
}

#[test]
fn unknown_settlement_secrets_succeed_without_mutation() {
    let fx = fixture();
    let (account_id, _, _) = create_account(&fx.state);

    let reply = op_webhook(&fx.state, None, br#"{"secret": "guessed-secret"}"#);
    assert_eq!(reply.status, StatusCode::OK);
    let reply = op_webhook(&fx.state, None, b"not even json");
    assert_eq!(reply.status, StatusCode::OK);

    let account = fx.state.ledger.load_account(&account_id).unwrap().expect("account");
    assert_eq!(account.balance, 0);
}

// ============================================================================
// SECTION: Metering
// ============================================================================

#[test]
fn billed_calls_debit_and_report_the_post_debit_balance() {
    let fx = fixture();
    let (account_id, header, _) = create_account(&fx.state);

    let reply = op_create_resource(
        &fx.state,
        Some(&header),
        "events",
        br#"{"instance": {"kind": "signup"}}"#,
    );
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], 1);
    let balance = reply.balance.expect("billed balance");
    assert!(balance < 0, "expected a debit, got {balance}");

    let account = fx.state.ledger.load_account(&account_id).unwrap().expect("account");
    assert_eq!(account.balance, balance);
}

#[test]
fn client_errors_inside_billed_operations_are_still_charged() {
    let fx = fixture();
    let (account_id, header, _) = create_account(&fx.state);

    let reply = op_raw_query(
        &fx.state,
        Some(&header),
        br#"{"query": "SELECT * FROM missing_table"}"#,
    );
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "query_error");

    let account = fx.state.ledger.load_account(&account_id).unwrap().expect("account");
    assert!(account.balance < 0, "query error must still be charged");
}

#[test]
fn floor_rejects_below_minus_1000_and_admits_at_the_floor() {
    let fx = fixture();
    let (account_id, header, _) = create_account(&fx.state);

    // Drive the balance to exactly the floor: still admitted.
    fx.state.ledger.debit(&account_id, 1_000).unwrap();
    let reply = op_create_resource(
        &fx.state,
        Some(&header),
        "events",
        br#"{"instance": {}}"#,
    );
    assert_eq!(reply.status, StatusCode::OK);

    // That debit left the balance strictly below the floor; the floor only
    // gates the next call, which is now rejected before execution, unbilled.
    let frozen = fx.state.ledger.load_account(&account_id).unwrap().expect("account");
    assert!(frozen.balance < -1_000);

    let reply = op_create_resource(
        &fx.state,
        Some(&header),
        "events",
        br#"{"instance": {}}"#,
    );
    assert_eq!(reply.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(reply.body["code"], "payment_required");
    let unchanged = fx.state.ledger.load_account(&account_id).unwrap().expect("account");
    assert_eq!(unchanged.balance, frozen.balance);
}

#[test]
fn rejected_scopes_are_not_charged() {
    let fx = fixture();
    let (account_id, header, _) = create_account(&fx.state);
    let created = op_create_token(&fx.state, Some(&header), br#"{"scope": "account/create"}"#);
    let create_only_header = format!("Bearer {}", created.body["token"].as_str().unwrap());

    let reply = op_raw_query(
        &fx.state,
        Some(&create_only_header),
        br#"{"query": "SELECT 1"}"#,
    );
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let account = fx.state.ledger.load_account(&account_id).unwrap().expect("account");
    assert_eq!(account.balance, 0);
}

// ============================================================================
// SECTION: Router Assembly
// ============================================================================

#[test]
fn router_builds_with_all_routes() {
    let fx = fixture();
    let state = Arc::new(AppState {
        ledger: Arc::clone(&fx.state.ledger),
        tenants: fx.state.tenants.clone(),
        payments: Arc::clone(&fx.state.payments),
        audit: Arc::clone(&fx.state.audit),
        metrics: Arc::clone(&fx.state.metrics),
    });
    let _router = router(state, 1024 * 1024);
}
