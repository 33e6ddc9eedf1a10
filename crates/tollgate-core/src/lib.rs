// crates/tollgate-core/src/lib.rs
// ============================================================================
// Module: Tollgate Core
// Description: Domain model for the Tollgate metered data-access platform.
// Purpose: Provide identifiers, scopes, ledger records, and metering math.
// Dependencies: rand, serde, thiserror
// ============================================================================

//! ## Overview
//! Core domain model for Tollgate: opaque identifiers, the closed scope enum
//! and its gate relation, ledger records (accounts, tokens, invoices), the
//! ledger store seam, the usage metering cost model, and secret generation.
//! Storage backends and transports live in sibling crates. Security posture:
//! all identifiers and scopes arriving on the wire are untrusted and are
//! validated at construction boundaries.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identifiers;
pub mod ledger;
pub mod metering;
pub mod scope;
pub mod secrets;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use identifiers::AccountId;
pub use identifiers::IdentifierError;
pub use identifiers::ResourceName;
pub use identifiers::TokenId;
pub use ledger::Account;
pub use ledger::Invoice;
pub use ledger::InvoiceStatus;
pub use ledger::LedgerError;
pub use ledger::LedgerStore;
pub use ledger::SettlementOutcome;
pub use ledger::Token;
pub use metering::CREDIT_FLOOR_MSAT;
pub use metering::UsageSample;
pub use metering::admits;
pub use scope::GateError;
pub use scope::Scope;
pub use scope::ScopeGate;
