// crates/tollgate-payments/src/lib.rs
// ============================================================================
// Module: Tollgate Payments
// Description: Lightning payment-provider client for invoice issuance.
// Purpose: Request provider invoices with webhook settlement registration.
// Dependencies: reqwest, serde, thiserror, url
// ============================================================================

//! ## Overview
//! This crate talks to the external Lightning payment provider. It exposes
//! the [`PaymentProvider`] seam used by the API layer and an HTTP
//! implementation that authenticates with a cached refresh-token exchange
//! and registers a webhook secret with every invoice. Security posture: the
//! refresh token, access tokens, and webhook secrets are credentials and
//! never appear in errors; provider responses are untrusted and parse
//! fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod client;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use client::HttpPaymentProvider;
pub use client::PaymentError;
pub use client::PaymentProvider;
pub use client::PaymentProviderConfig;
pub use client::ProviderInvoice;
