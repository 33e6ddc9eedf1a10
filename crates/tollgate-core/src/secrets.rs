// crates/tollgate-core/src/secrets.rs
// ============================================================================
// Module: Secret Generation
// Description: OS-entropy generation for identifiers and bearer secrets.
// Purpose: Provide unguessable account ids, token values, and webhook secrets.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! All identifiers and secrets are generated from operating-system entropy
//! and rendered as lowercase hex. Token values and webhook secrets are
//! capabilities: possession is the sole proof of authenticity, so they must
//! be unguessable and are sized at 256 bits. Identifiers are 128 bits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use rand::RngCore;
use rand::rngs::OsRng;

use crate::identifiers::AccountId;
use crate::identifiers::TokenId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Entropy bytes behind an identifier (128 bits, 32 hex chars).
const ID_BYTES: usize = 16;
/// Entropy bytes behind a bearer secret (256 bits, 64 hex chars).
const SECRET_BYTES: usize = 32;

// ============================================================================
// SECTION: Generators
// ============================================================================

/// Generates a fresh account identifier.
#[must_use]
pub fn new_account_id() -> AccountId {
    AccountId::from_generated(random_hex(ID_BYTES))
}

/// Generates a fresh token identifier.
#[must_use]
pub fn new_token_id() -> TokenId {
    TokenId::from_generated(random_hex(ID_BYTES))
}

/// Generates a fresh bearer token value.
#[must_use]
pub fn new_token_value() -> String {
    random_hex(SECRET_BYTES)
}

/// Generates a fresh webhook correlation secret.
#[must_use]
pub fn new_webhook_secret() -> String {
    random_hex(SECRET_BYTES)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns `len` bytes of OS entropy rendered as lowercase hex.
fn random_hex(len: usize) -> String {
    let mut bytes = vec![0_u8; len];
    OsRng.fill_bytes(&mut bytes);
    let mut out = String::with_capacity(len * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
