// crates/tollgate-api/src/lib.rs
// ============================================================================
// Module: Tollgate API
// Description: Billed HTTP API over the ledger and tenant stores.
// Purpose: Resolve credentials, gate scopes, meter usage, settle payments.
// Dependencies: axum, tollgate-core, tollgate-config, tollgate-payments,
//               tollgate-store-sqlite, serde, sha2, thiserror, tokio
// ============================================================================

//! ## Overview
//! The API crate wires the platform together: bearer credentials resolve
//! against the ledger, scope gates authorize each operation, billed
//! operations run behind the usage meter, invoices are requested from the
//! payment provider, and the unauthenticated settlement webhook credits the
//! ledger exactly once per secret. Security posture: every header, body, and
//! path parameter is untrusted; authorization fails closed and credential
//! material never reaches logs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod error;
pub mod metering;
pub mod routes;
pub mod server;
pub mod telemetry;

#[cfg(test)]
mod tests;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use routes::AppState;
pub use routes::router;
pub use server::ApiServer;
pub use server::ApiServerError;
