// crates/tollgate-core/src/metering.rs
// ============================================================================
// Module: Usage Metering
// Description: Credit floor admission and the metered cost formula.
// Purpose: Provide exact integer cost computation for billed operations.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Billed operations are admitted by a credit-floor check and charged after
//! execution from a [`UsageSample`] of elapsed wall-clock time and request/
//! response body sizes. The cost is one millisatoshi per 100 ms of runtime
//! plus one per KiB of payload, rounded up once over the summed terms rather
//! than per term. The computation is exact integer arithmetic over a common
//! denominator, so no floating point is involved.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lowest balance (msat) that still admits a billed call.
pub const CREDIT_FLOOR_MSAT: i64 = -1000;

/// Millisatoshis charged per 100 ms of elapsed runtime.
const MSAT_PER_100_MS: u64 = 1;
/// Common denominator of the per-time and per-byte cost terms
/// (`lcm(100, 1024)`).
const COST_DENOMINATOR: u64 = 25_600;
/// Numerator weight of one elapsed millisecond (`25_600 / 100`).
const MS_WEIGHT: u64 = COST_DENOMINATOR / 100 * MSAT_PER_100_MS;
/// Numerator weight of one payload byte (`25_600 / 1024`).
const BYTE_WEIGHT: u64 = COST_DENOMINATOR / 1024;

// ============================================================================
// SECTION: Admission
// ============================================================================

/// Returns whether the balance admits one more billed call.
///
/// A balance exactly at the floor still admits; only balances strictly below
/// it are rejected. The floor gates admission only, so a balance may go
/// below it transiently after a debit.
#[must_use]
pub const fn admits(balance_msat: i64) -> bool {
    balance_msat >= CREDIT_FLOOR_MSAT
}

// ============================================================================
// SECTION: Usage Sample
// ============================================================================

/// Measured resource usage of one billed operation.
///
/// # Invariants
/// - All measurements are taken after the wrapped operation completes,
///   whether or not it produced a client-visible error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSample {
    /// Elapsed wall-clock time in milliseconds.
    pub elapsed_ms: u64,
    /// Request body size in bytes.
    pub request_bytes: u64,
    /// Response body size in bytes.
    pub response_bytes: u64,
}

impl UsageSample {
    /// Computes the metered cost in millisatoshis.
    ///
    /// `ceil(elapsed_ms / 100 + request_bytes / 1024 + response_bytes / 1024)`
    /// as a single ceiling over the summed terms, evaluated exactly as
    /// `ceil((elapsed_ms * 256 + (request_bytes + response_bytes) * 25) / 25600)`.
    #[must_use]
    pub const fn cost_msat(&self) -> u64 {
        let payload_bytes = self.request_bytes.saturating_add(self.response_bytes);
        let numerator = self
            .elapsed_ms
            .saturating_mul(MS_WEIGHT)
            .saturating_add(payload_bytes.saturating_mul(BYTE_WEIGHT));
        numerator.div_ceil(COST_DENOMINATOR)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
