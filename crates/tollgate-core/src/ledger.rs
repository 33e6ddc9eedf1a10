// crates/tollgate-core/src/ledger.rs
// ============================================================================
// Module: Account Ledger
// Description: Ledger records and the shared-store seam for money movement.
// Purpose: Define accounts, tokens, invoices, and atomic balance operations.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The ledger holds the shared control-plane records: accounts with signed
//! millisatoshi balances, bearer tokens, and Lightning invoices. The
//! [`LedgerStore`] trait is the seam implemented by storage backends; every
//! balance mutation it exposes must be store-side atomic arithmetic, and
//! settlement must be conditional on the invoice's prior status so duplicate
//! webhook deliveries credit at most once. Security posture: token values and
//! webhook secrets are credentials and must never appear in errors or logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::identifiers::AccountId;
use crate::identifiers::TokenId;
use crate::scope::Scope;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Billing-and-storage tenant unit.
///
/// # Invariants
/// - `parent` is at most one level deep: an account with a non-null parent
///   never appears as the parent of another account.
/// - `balance` is signed millisatoshis and may go below the credit floor
///   transiently after a debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque account identifier.
    pub id: AccountId,
    /// Balance in millisatoshis (signed).
    pub balance: i64,
    /// Optional parent account for one-level hierarchies.
    pub parent: Option<AccountId>,
}

/// Bearer credential bound to one account and one scope.
///
/// # Invariants
/// - `value` is a unique opaque secret shown to the caller exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Opaque token identifier.
    pub id: TokenId,
    /// Owning account.
    pub account: AccountId,
    /// Unique opaque secret presented as the bearer credential.
    pub value: String,
    /// Authorization scope granted by this token.
    pub scope: Scope,
}

/// Invoice settlement status.
///
/// # Invariants
/// - Transitions only `Pending -> Settled`, never the reverse, at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Awaiting payment confirmation from the provider.
    Pending,
    /// Payment confirmed and the account credited.
    Settled,
}

impl InvoiceStatus {
    /// Returns the stable wire form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Settled => "settled",
        }
    }

    /// Parses a status from its wire form.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "settled" => Some(Self::Settled),
            _ => None,
        }
    }
}

/// Record of a requested Lightning payment used to top up an account.
///
/// # Invariants
/// - `secret` is a server-generated capability shared only with the payment
///   provider; it is never returned to authenticated callers.
/// - `amount_msat` is at least 1000.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Provider-assigned payment hash.
    pub hash: String,
    /// Owning account.
    pub account: AccountId,
    /// BOLT11 payment request string.
    pub bolt11: String,
    /// Expiry timestamp in unix seconds.
    pub expires: i64,
    /// Invoiced amount in millisatoshis.
    pub amount_msat: i64,
    /// Webhook correlation secret.
    pub secret: String,
    /// Settlement status.
    pub status: InvoiceStatus,
}

// ============================================================================
// SECTION: Settlement Outcome
// ============================================================================

/// Outcome of a guarded settlement attempt.
///
/// # Invariants
/// - `Credited` is returned exactly once per secret across all deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The invoice transitioned to settled and the account was credited.
    Credited {
        /// Credited account.
        account: AccountId,
        /// Credited amount in millisatoshis.
        amount_msat: i64,
    },
    /// The invoice was already settled; no mutation occurred.
    AlreadySettled,
    /// No invoice matches the secret; no mutation occurred.
    UnknownSecret,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ledger store errors.
///
/// # Invariants
/// - Messages never embed token values or webhook secrets.
#[derive(Debug, Error, Clone)]
pub enum LedgerError {
    /// Store I/O error.
    #[error("ledger io error: {0}")]
    Io(String),
    /// Storage engine error.
    #[error("ledger db error: {0}")]
    Db(String),
    /// Invalid stored data.
    #[error("ledger invalid data: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Store Trait
// ============================================================================

/// Shared ledger store for accounts, tokens, and invoices.
///
/// Implementations are accessed concurrently by requests for different
/// accounts and must not serialize globally; per-account balance mutation
/// must be expressed as store-side atomic arithmetic.
pub trait LedgerStore: Send + Sync {
    /// Resolves a bearer token value to its record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the lookup fails.
    fn resolve_token(&self, value: &str) -> Result<Option<Token>, LedgerError>;

    /// Loads an account by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the lookup fails.
    fn load_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerError>;

    /// Inserts a new account and its root token in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when either insert fails; neither row is
    /// persisted in that case.
    fn create_account(&self, account: &Account, root_token: &Token) -> Result<(), LedgerError>;

    /// Lists the identifiers of an account's direct children.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the query fails.
    fn list_children(&self, parent: &AccountId) -> Result<Vec<AccountId>, LedgerError>;

    /// Deletes every token owned by the account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the delete fails.
    fn delete_tokens_for(&self, account: &AccountId) -> Result<(), LedgerError>;

    /// Deletes all child account rows of the parent.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the delete fails.
    fn delete_children(&self, parent: &AccountId) -> Result<(), LedgerError>;

    /// Deletes the account row itself.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the delete fails.
    fn delete_account_row(&self, id: &AccountId) -> Result<(), LedgerError>;

    /// Inserts an additional token for an existing account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the insert fails.
    fn insert_token(&self, token: &Token) -> Result<(), LedgerError>;

    /// Loads a token by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the lookup fails.
    fn load_token(&self, id: &TokenId) -> Result<Option<Token>, LedgerError>;

    /// Deletes a token by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the delete fails.
    fn delete_token(&self, id: &TokenId) -> Result<(), LedgerError>;

    /// Atomically debits the account and returns the post-debit balance.
    ///
    /// The subtraction happens store-side; callers never read, mutate, and
    /// write the balance back.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the update fails or the account is gone.
    fn debit(&self, account: &AccountId, amount_msat: u64) -> Result<i64, LedgerError>;

    /// Inserts a pending invoice.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the insert fails.
    fn insert_invoice(&self, invoice: &Invoice) -> Result<(), LedgerError>;

    /// Settles the invoice matching the secret, crediting at most once.
    ///
    /// The status transition and the balance credit are one guarded update:
    /// the transition is conditioned on the prior `pending` status, so a
    /// duplicate delivery of the same secret credits at most once.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the transaction fails; unknown secrets
    /// are not an error.
    fn settle_invoice(&self, secret: &str) -> Result<SettlementOutcome, LedgerError>;

    /// Verifies the store can execute a trivial statement.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), LedgerError>;
}
