// crates/tollgate-api/src/metering.rs
// ============================================================================
// Module: Usage Meter
// Description: Credit-floor admission and post-hoc billing wrapper.
// Purpose: Charge billed operations for runtime and payload atomically.
// Dependencies: axum, tollgate-core, serde_json
// ============================================================================

//! ## Overview
//! The usage meter wraps a billed operation: admission checks the credit
//! floor before the operation runs (no charge on rejection), then the
//! operation's wall-clock time and body sizes are folded into one
//! ceiling-rounded cost and debited store-side. The debit applies even when
//! the wrapped operation produced a client-visible error, because the
//! compute and bandwidth were already spent. The floor gates only the next
//! call; a balance may go below it transiently after a debit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use axum::http::StatusCode;
use serde_json::Value;
use tollgate_core::Account;
use tollgate_core::LedgerStore;
use tollgate_core::UsageSample;
use tollgate_core::admits;

use crate::error::ApiError;

// ============================================================================
// SECTION: Billed Reply
// ============================================================================

/// Outcome of a billed operation after the debit landed.
#[derive(Debug)]
pub struct BilledReply {
    /// HTTP status of the wrapped operation.
    pub status: StatusCode,
    /// JSON body of the wrapped operation (success or error envelope).
    pub body: Value,
    /// Post-debit balance in millisatoshis.
    pub balance_msat: i64,
    /// Charged cost in millisatoshis.
    pub cost_msat: u64,
}

// ============================================================================
// SECTION: Meter
// ============================================================================

/// Runs a billed operation behind the credit floor and debits its cost.
///
/// # Errors
///
/// Returns [`ApiError::PaymentRequired`] before running the operation when
/// the balance is below the floor, and [`ApiError::Upstream`] when the debit
/// itself fails. Client-visible errors from the wrapped operation are not
/// errors here; they are billed and carried in the reply body.
pub fn run_billed(
    ledger: &dyn LedgerStore,
    account: &Account,
    request_bytes: u64,
    op: impl FnOnce() -> Result<(StatusCode, Value), ApiError>,
) -> Result<BilledReply, ApiError> {
    if !admits(account.balance) {
        return Err(ApiError::PaymentRequired);
    }
    let started = Instant::now();
    let outcome = op();
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let (status, body) = match outcome {
        Ok(reply) => reply,
        Err(err) => (err.status(), err.body()),
    };
    let response_bytes = u64::try_from(body.to_string().len()).unwrap_or(u64::MAX);
    let sample = UsageSample {
        elapsed_ms,
        request_bytes,
        response_bytes,
    };
    let cost_msat = sample.cost_msat();
    let balance_msat = ledger.debit(&account.id, cost_msat)?;
    Ok(BilledReply {
        status,
        body,
        balance_msat,
        cost_msat,
    })
}
