// crates/tollgate-api/src/audit.rs
// ============================================================================
// Module: API Audit Sink
// Description: Structured audit events for auth, lifecycle, and settlement.
// Purpose: Emit JSON-line audit records without leaking credentials.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events record authorization decisions, account lifecycle changes,
//! and settlement outcomes as JSON lines. Token values never appear; bearer
//! credentials are identified by SHA-256 fingerprints only. The sink is a
//! seam so deployments can route events elsewhere without redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Auth decision audit event payload.
///
/// # Invariants
/// - `token_fingerprint` is a hash, never the token value.
#[derive(Debug, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    event: &'static str,
    /// Decision outcome (`allow` or `deny`).
    decision: &'static str,
    /// Route label being authorized.
    route: &'static str,
    /// Bearer token fingerprint (sha256), when a credential was presented.
    token_fingerprint: Option<String>,
    /// Account identifier, when resolved.
    account: Option<String>,
    /// Failure reason (for deny events).
    reason: Option<&'static str>,
}

impl AuthAuditEvent {
    /// Builds an allow event.
    #[must_use]
    pub const fn allowed(
        route: &'static str,
        token_fingerprint: Option<String>,
        account: Option<String>,
    ) -> Self {
        Self {
            event: "api_auth",
            decision: "allow",
            route,
            token_fingerprint,
            account,
            reason: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub const fn denied(
        route: &'static str,
        token_fingerprint: Option<String>,
        reason: &'static str,
    ) -> Self {
        Self {
            event: "api_auth",
            decision: "deny",
            route,
            token_fingerprint,
            account: None,
            reason: Some(reason),
        }
    }
}

/// Account lifecycle audit event payload.
#[derive(Debug, Serialize)]
pub struct AccountAuditEvent {
    /// Event identifier.
    event: &'static str,
    /// Lifecycle action (`created` or `deleted`).
    action: &'static str,
    /// Affected account identifier.
    account: String,
    /// Parent account identifier for child accounts.
    parent: Option<String>,
    /// Number of child accounts removed alongside a deletion.
    children_removed: Option<usize>,
}

impl AccountAuditEvent {
    /// Builds an account-created event.
    #[must_use]
    pub const fn created(account: String, parent: Option<String>) -> Self {
        Self {
            event: "api_account",
            action: "created",
            account,
            parent,
            children_removed: None,
        }
    }

    /// Builds an account-deleted event.
    #[must_use]
    pub const fn deleted(account: String, children_removed: usize) -> Self {
        Self {
            event: "api_account",
            action: "deleted",
            account,
            parent: None,
            children_removed: Some(children_removed),
        }
    }
}

/// Settlement audit event payload.
///
/// # Invariants
/// - The webhook secret never appears; outcomes are labeled only.
#[derive(Debug, Serialize)]
pub struct SettlementAuditEvent {
    /// Event identifier.
    event: &'static str,
    /// Settlement outcome label (`credited`, `already_settled`, `unknown_secret`).
    outcome: &'static str,
    /// Credited account identifier, when a credit occurred.
    account: Option<String>,
    /// Credited amount in millisatoshis, when a credit occurred.
    amount_msat: Option<i64>,
}

impl SettlementAuditEvent {
    /// Builds a credited event.
    #[must_use]
    pub const fn credited(account: String, amount_msat: i64) -> Self {
        Self {
            event: "api_settlement",
            outcome: "credited",
            account: Some(account),
            amount_msat: Some(amount_msat),
        }
    }

    /// Builds an already-settled (duplicate delivery) event.
    #[must_use]
    pub const fn already_settled() -> Self {
        Self {
            event: "api_settlement",
            outcome: "already_settled",
            account: None,
            amount_msat: None,
        }
    }

    /// Builds an unknown-secret event.
    #[must_use]
    pub const fn unknown_secret() -> Self {
        Self {
            event: "api_settlement",
            outcome: "unknown_secret",
            account: None,
            amount_msat: None,
        }
    }
}

/// Union of audit event payloads accepted by sinks.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AuditEvent {
    /// Auth decision event.
    Auth(AuthAuditEvent),
    /// Account lifecycle event.
    Account(AccountAuditEvent),
    /// Settlement outcome event.
    Settlement(SettlementAuditEvent),
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Audit sink for API events.
pub trait AuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &AuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    #[allow(clippy::print_stderr, reason = "stderr is the audit transport")]
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            eprintln!("{payload}");
        }
    }
}

/// No-op audit sink for tests.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}
