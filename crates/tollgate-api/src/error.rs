// crates/tollgate-api/src/error.rs
// ============================================================================
// Module: API Error Taxonomy
// Description: Domain error variants and their wire envelope.
// Purpose: Map every failure to a stable `{code, error}` body and status.
// Dependencies: axum, tollgate-core, tollgate-payments, tollgate-store-sqlite,
//               serde, thiserror
// ============================================================================

//! ## Overview
//! All domain failures map to a structured `{code, error}` JSON body with a
//! matching HTTP status. Codes are stable for programmatic handling. Tenant
//! query errors pass the engine message through verbatim (it is the tenant's
//! own query over the tenant's own data); every other message is a fixed
//! label that cannot leak credentials or internal state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::StatusCode;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tollgate_core::GateError;
use tollgate_core::LedgerError;
use tollgate_payments::PaymentError;
use tollgate_store_sqlite::TenantStoreError;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Domain errors surfaced by the API.
///
/// # Invariants
/// - `code()` and `status()` are stable per variant.
/// - Only `Query` carries caller-influenced text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Missing or unresolvable credential where one is required.
    #[error("Unauthorized")]
    Unauthorized,
    /// Insufficient scope or access to another tenant's resources.
    #[error("Forbidden")]
    Forbidden,
    /// Request payload failed validation.
    #[error("{message}")]
    Validation {
        /// Stable error code for this validation failure.
        code: &'static str,
        /// Human-readable description.
        message: String,
    },
    /// Balance is below the credit floor.
    #[error("Please request an invoice to replenish your account balance")]
    PaymentRequired,
    /// Payment provider or storage engine failure.
    #[error("upstream failure: {0}")]
    Upstream(String),
    /// The tenant's own query failed at the storage engine.
    #[error("{0}")]
    Query(String),
}

impl ApiError {
    /// Builds a nesting-violation validation error.
    #[must_use]
    pub fn nesting() -> Self {
        Self::Validation {
            code: "account_nesting",
            message: "Child accounts cannot create child accounts".to_string(),
        }
    }

    /// Builds an invalid-scope validation error.
    #[must_use]
    pub fn invalid_scope() -> Self {
        Self::Validation {
            code: "enum",
            message: "Scope must be one of all, all/readonly, account/create".to_string(),
        }
    }

    /// Builds a below-minimum invoice amount validation error.
    #[must_use]
    pub fn amount_below_minimum() -> Self {
        Self::Validation {
            code: "minimum",
            message: "Amount must be at least 1000 msats".to_string(),
        }
    }

    /// Builds an invalid resource-name validation error.
    #[must_use]
    pub fn resource_name() -> Self {
        Self::Validation {
            code: "resource_name",
            message: "Resource names must match [a-z_][a-z0-9_]{0,63}".to_string(),
        }
    }

    /// Builds a malformed-body validation error.
    #[must_use]
    pub fn invalid_body() -> Self {
        Self::Validation {
            code: "invalid_request",
            message: "Request body is missing or malformed".to_string(),
        }
    }

    /// Returns the stable error code for the wire envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Validation {
                code, ..
            } => code,
            Self::PaymentRequired => "payment_required",
            Self::Upstream(_) => "upstream",
            Self::Query(_) => "query_error",
        }
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation {
                ..
            }
            | Self::Query(_) => StatusCode::BAD_REQUEST,
            Self::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns the `{code, error}` wire body for this error.
    #[must_use]
    pub fn body(&self) -> Value {
        json!({
            "code": self.code(),
            "error": self.to_string(),
        })
    }
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

impl From<GateError> for ApiError {
    fn from(error: GateError) -> Self {
        match error {
            GateError::Unauthorized => Self::Unauthorized,
            GateError::Forbidden => Self::Forbidden,
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(error: LedgerError) -> Self {
        Self::Upstream(error.to_string())
    }
}

impl From<TenantStoreError> for ApiError {
    fn from(error: TenantStoreError) -> Self {
        match error {
            TenantStoreError::Query(message) => Self::Query(message),
            TenantStoreError::Io(message)
            | TenantStoreError::Db(message)
            | TenantStoreError::Invalid(message) => Self::Upstream(message),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(error: PaymentError) -> Self {
        Self::Upstream(error.to_string())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
