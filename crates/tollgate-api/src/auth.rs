// crates/tollgate-api/src/auth.rs
// ============================================================================
// Module: Credential Resolution
// Description: Bearer-header parsing and fail-fast token resolution.
// Purpose: Map a raw credential header to an account and scope, fail closed.
// Dependencies: tollgate-core, sha2
// ============================================================================

//! ## Overview
//! The credential resolver extracts the token following a case-insensitive
//! `bearer` marker, trimmed and bounded, and resolves it against the ledger.
//! A non-empty header that matches no token fails immediately as
//! Unauthorized; it is never downgraded to anonymous. An absent or empty
//! header yields an anonymous caller, and whether anonymous access is
//! permitted is decided by the scope gate, not here. Every decision is
//! audited with a token fingerprint, never the token itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use sha2::Digest;
use sha2::Sha256;
use tollgate_core::Account;
use tollgate_core::LedgerStore;
use tollgate_core::Scope;
use tollgate_core::ScopeGate;
use tollgate_core::Token;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::audit::AuthAuditEvent;
use crate::error::ApiError;
use crate::telemetry::ApiRoute;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted credential header length.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;
/// Case-insensitive scheme marker preceding the token.
const BEARER_MARKER: &str = "bearer";

// ============================================================================
// SECTION: Caller Context
// ============================================================================

/// Resolved token and owning account for an authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Resolved bearer token.
    pub token: Token,
    /// Account owning the token.
    pub account: Account,
}

/// Caller identity after credential resolution.
#[derive(Debug, Clone)]
pub enum Caller {
    /// No credential was presented.
    Anonymous,
    /// A credential resolved to a token and account.
    Authenticated(AuthContext),
}

impl Caller {
    /// Returns the resolved scope, when authenticated.
    #[must_use]
    pub const fn scope(&self) -> Option<Scope> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(ctx) => Some(ctx.token.scope),
        }
    }

    /// Returns the authenticated context, when present.
    #[must_use]
    pub const fn context(&self) -> Option<&AuthContext> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(ctx) => Some(ctx),
        }
    }

    /// Returns the resolution-time balance snapshot, when authenticated.
    #[must_use]
    pub const fn balance(&self) -> Option<i64> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(ctx) => Some(ctx.account.balance),
        }
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves the credential header into a caller identity.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] when a non-empty credential does not
/// resolve, and [`ApiError::Upstream`] when the ledger lookup fails.
pub fn resolve(
    ledger: &dyn LedgerStore,
    audit: &dyn AuditSink,
    route: ApiRoute,
    header: Option<&str>,
) -> Result<Caller, ApiError> {
    let Some(value) = extract_bearer_token(header)? else {
        return Ok(Caller::Anonymous);
    };
    let fingerprint = token_fingerprint(&value);
    let Some(token) = ledger.resolve_token(&value)? else {
        // Fail fast instead of treating an invalid credential as anonymous.
        audit.record(&AuditEvent::Auth(AuthAuditEvent::denied(
            route.as_str(),
            Some(fingerprint),
            "unknown_token",
        )));
        return Err(ApiError::Unauthorized);
    };
    let Some(account) = ledger.load_account(&token.account)? else {
        audit.record(&AuditEvent::Auth(AuthAuditEvent::denied(
            route.as_str(),
            Some(fingerprint),
            "account_missing",
        )));
        return Err(ApiError::Upstream("token references a missing account".to_string()));
    };
    audit.record(&AuditEvent::Auth(AuthAuditEvent::allowed(
        route.as_str(),
        Some(fingerprint),
        Some(account.id.to_string()),
    )));
    Ok(Caller::Authenticated(AuthContext {
        token,
        account,
    }))
}

/// Evaluates a scope gate for the caller, auditing denials.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] or [`ApiError::Forbidden`] per the
/// gate outcome.
pub fn authorize(
    audit: &dyn AuditSink,
    route: ApiRoute,
    caller: &Caller,
    gate: &ScopeGate,
) -> Result<(), ApiError> {
    if let Err(err) = gate.evaluate(caller.scope()) {
        let reason = match err {
            tollgate_core::GateError::Unauthorized => "anonymous_not_allowed",
            tollgate_core::GateError::Forbidden => "insufficient_scope",
        };
        audit.record(&AuditEvent::Auth(AuthAuditEvent::denied(route.as_str(), None, reason)));
        return Err(err.into());
    }
    Ok(())
}

// ============================================================================
// SECTION: Header Parsing
// ============================================================================

/// Extracts the token following the last case-insensitive `bearer` marker.
///
/// Returns `Ok(None)` for absent or empty headers (anonymous caller).
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] when the header is oversized or
/// carries a non-empty value with no token text.
pub fn extract_bearer_token(header: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(raw) = header else {
        return Ok(None);
    };
    if raw.len() > MAX_AUTH_HEADER_BYTES {
        return Err(ApiError::Unauthorized);
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let lowered = trimmed.to_ascii_lowercase();
    let token = lowered.rfind(BEARER_MARKER).map_or(trimmed, |position| {
        trimmed
            .get(position + BEARER_MARKER.len() ..)
            .unwrap_or_default()
            .trim()
    });
    if token.is_empty() {
        return Err(ApiError::Unauthorized);
    }
    Ok(Some(token.to_string()))
}

/// Returns the SHA-256 fingerprint of a token value as lowercase hex.
#[must_use]
pub fn token_fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::ApiError;
    use super::extract_bearer_token;
    use super::token_fingerprint;

    #[test]
    fn bearer_marker_is_case_insensitive_and_whitespace_tolerant() {
        for header in [
            "Bearer secret-value",
            "bearer secret-value",
            "BEARER secret-value",
            "  BeArEr   secret-value  ",
        ] {
            let token = extract_bearer_token(Some(header)).unwrap();
            assert_eq!(token.as_deref(), Some("secret-value"));
        }
    }

    #[test]
    fn absent_or_blank_headers_resolve_to_anonymous() {
        assert_eq!(extract_bearer_token(None).unwrap(), None);
        assert_eq!(extract_bearer_token(Some("")).unwrap(), None);
        assert_eq!(extract_bearer_token(Some("   ")).unwrap(), None);
    }

    #[test]
    fn marker_without_token_is_unauthorized() {
        let result = extract_bearer_token(Some("Bearer   "));
        assert_eq!(result, Err(ApiError::Unauthorized));
    }

    #[test]
    fn header_without_marker_is_treated_as_the_token() {
        let token = extract_bearer_token(Some("  secret-value ")).unwrap();
        assert_eq!(token.as_deref(), Some("secret-value"));
    }

    #[test]
    fn oversized_headers_are_rejected() {
        let header = format!("Bearer {}", "a".repeat(9 * 1024));
        assert_eq!(extract_bearer_token(Some(&header)), Err(ApiError::Unauthorized));
    }

    #[test]
    fn fingerprints_are_stable_and_hide_the_value() {
        let first = token_fingerprint("secret-value");
        let second = token_fingerprint("secret-value");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(!first.contains("secret"));
    }
}
