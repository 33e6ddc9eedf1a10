// crates/tollgate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Tollgate SQLite Store
// Description: SQLite-backed ledger store and tenant namespace store.
// Purpose: Persist the shared ledger and per-tenant data with WAL durability.
// Dependencies: tollgate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate provides the two storage backends of Tollgate: the shared
//! control-plane ledger (accounts, tokens, invoices) in one WAL database and
//! the per-tenant data plane as one SQLite file per account. Balance movement
//! is store-side atomic arithmetic and settlement is status-guarded, so
//! concurrent calls and duplicate webhook deliveries cannot lose or double
//! money. Security posture: database contents and tenant-supplied names are
//! untrusted; resource identifiers are validated before statement assembly.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod store;
mod tenant;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use store::SqliteJournalMode;
pub use store::SqliteLedgerConfig;
pub use store::SqliteLedgerStore;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
pub use tenant::QueryRows;
pub use tenant::TenantStore;
pub use tenant::TenantStoreConfig;
pub use tenant::TenantStoreError;
