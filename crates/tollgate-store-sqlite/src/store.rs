// crates/tollgate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Ledger Store
// Description: Durable LedgerStore backed by SQLite WAL.
// Purpose: Persist accounts, tokens, and invoices with atomic money movement.
// Dependencies: tollgate-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`LedgerStore`] using `SQLite`. Writes go
//! through a single mutex-guarded connection; reads use a small round-robin
//! pool of additional connections under WAL. Every balance mutation is
//! expressed as store-side arithmetic (`balance = balance - ?`), and
//! settlement conditions the status transition on the prior `pending` value
//! inside one transaction, so a duplicate webhook delivery credits at most
//! once. Security posture: database contents are untrusted; scope and status
//! labels are re-parsed fail-closed on every load.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use tollgate_core::Account;
use tollgate_core::AccountId;
use tollgate_core::Invoice;
use tollgate_core::InvoiceStatus;
use tollgate_core::LedgerError;
use tollgate_core::LedgerStore;
use tollgate_core::Scope;
use tollgate_core::SettlementOutcome;
use tollgate_core::Token;
use tollgate_core::TokenId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the ledger store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default read connection pool size.
const DEFAULT_READ_POOL_SIZE: usize = 4;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` ledger store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `read_pool_size` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteLedgerConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections used for read path isolation.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` ledger store errors.
///
/// # Invariants
/// - Error messages avoid embedding token values or webhook secrets.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite ledger io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite ledger db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite ledger version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite ledger invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for LedgerError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Db(message)
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed ledger store with WAL support.
///
/// # Invariants
/// - Balance mutation happens store-side; balances are never read, mutated
///   in memory, and written back.
/// - Writer access is serialized through a mutex; reads round-robin over a
///   separate pool.
#[derive(Clone)]
pub struct SqliteLedgerStore {
    /// Shared writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Read connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteLedgerStore {
    /// Opens an `SQLite`-backed ledger store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteLedgerConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        if config.read_pool_size == 0 {
            return Err(SqliteStoreError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        let mut write_connection = open_connection(config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            read_connections.push(Mutex::new(open_connection(config)?));
        }
        Ok(Self {
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Returns the next read connection using round-robin selection.
    fn read_connection(&self) -> &Mutex<Connection> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        &self.read_connections[index]
    }

    /// Locks a read connection, mapping poisoned mutexes to store errors.
    fn lock_read(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LedgerError> {
        self.read_connection()
            .lock()
            .map_err(|_| LedgerError::Io("ledger read mutex poisoned".to_string()))
    }

    /// Locks the write connection, mapping poisoned mutexes to store errors.
    fn lock_write(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LedgerError> {
        self.write_connection
            .lock()
            .map_err(|_| LedgerError::Io("ledger write mutex poisoned".to_string()))
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn resolve_token(&self, value: &str) -> Result<Option<Token>, LedgerError> {
        let guard = self.lock_read()?;
        let row = guard
            .query_row(
                "SELECT id, account, value, scope FROM token WHERE value = ?1",
                params![value],
                token_from_row,
            )
            .optional()
            .map_err(db_error)?;
        row.map(parse_token_row).transpose()
    }

    fn load_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        let guard = self.lock_read()?;
        let row = guard
            .query_row(
                "SELECT id, balance, parent FROM account WHERE id = ?1",
                params![id.as_str()],
                account_from_row,
            )
            .optional()
            .map_err(db_error)?;
        row.map(parse_account_row).transpose()
    }

    fn create_account(&self, account: &Account, root_token: &Token) -> Result<(), LedgerError> {
        let mut guard = self.lock_write()?;
        let tx = guard.transaction().map_err(db_error)?;
        tx.execute(
            "INSERT INTO account (id, balance, parent) VALUES (?1, ?2, ?3)",
            params![
                account.id.as_str(),
                account.balance,
                account.parent.as_ref().map(AccountId::as_str)
            ],
        )
        .map_err(db_error)?;
        tx.execute(
            "INSERT INTO token (id, account, value, scope) VALUES (?1, ?2, ?3, ?4)",
            params![
                root_token.id.as_str(),
                root_token.account.as_str(),
                root_token.value,
                root_token.scope.as_str()
            ],
        )
        .map_err(db_error)?;
        tx.commit().map_err(db_error)
    }

    fn list_children(&self, parent: &AccountId) -> Result<Vec<AccountId>, LedgerError> {
        let guard = self.lock_read()?;
        let mut stmt = guard
            .prepare("SELECT id FROM account WHERE parent = ?1")
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![parent.as_str()], |row| row.get::<_, String>(0))
            .map_err(db_error)?;
        let mut children = Vec::new();
        for row in rows {
            let raw = row.map_err(db_error)?;
            let id = AccountId::parse(&raw)
                .map_err(|err| LedgerError::Invalid(format!("stored account id: {err}")))?;
            children.push(id);
        }
        Ok(children)
    }

    fn delete_tokens_for(&self, account: &AccountId) -> Result<(), LedgerError> {
        let guard = self.lock_write()?;
        guard
            .execute("DELETE FROM token WHERE account = ?1", params![account.as_str()])
            .map_err(db_error)?;
        Ok(())
    }

    fn delete_children(&self, parent: &AccountId) -> Result<(), LedgerError> {
        let guard = self.lock_write()?;
        guard
            .execute("DELETE FROM account WHERE parent = ?1", params![parent.as_str()])
            .map_err(db_error)?;
        Ok(())
    }

    fn delete_account_row(&self, id: &AccountId) -> Result<(), LedgerError> {
        let guard = self.lock_write()?;
        guard
            .execute("DELETE FROM account WHERE id = ?1", params![id.as_str()])
            .map_err(db_error)?;
        Ok(())
    }

    fn insert_token(&self, token: &Token) -> Result<(), LedgerError> {
        let guard = self.lock_write()?;
        guard
            .execute(
                "INSERT INTO token (id, account, value, scope) VALUES (?1, ?2, ?3, ?4)",
                params![
                    token.id.as_str(),
                    token.account.as_str(),
                    token.value,
                    token.scope.as_str()
                ],
            )
            .map_err(db_error)?;
        Ok(())
    }

    fn load_token(&self, id: &TokenId) -> Result<Option<Token>, LedgerError> {
        let guard = self.lock_read()?;
        let row = guard
            .query_row(
                "SELECT id, account, value, scope FROM token WHERE id = ?1",
                params![id.as_str()],
                token_from_row,
            )
            .optional()
            .map_err(db_error)?;
        row.map(parse_token_row).transpose()
    }

    fn delete_token(&self, id: &TokenId) -> Result<(), LedgerError> {
        let guard = self.lock_write()?;
        guard
            .execute("DELETE FROM token WHERE id = ?1", params![id.as_str()])
            .map_err(db_error)?;
        Ok(())
    }

    fn debit(&self, account: &AccountId, amount_msat: u64) -> Result<i64, LedgerError> {
        let amount = i64::try_from(amount_msat)
            .map_err(|_| LedgerError::Invalid("debit amount exceeds ledger range".to_string()))?;
        let guard = self.lock_write()?;
        let balance = guard
            .query_row(
                "UPDATE account SET balance = balance - ?1 WHERE id = ?2 RETURNING balance",
                params![amount, account.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(db_error)?;
        balance.ok_or_else(|| LedgerError::Invalid("debit against missing account".to_string()))
    }

    fn insert_invoice(&self, invoice: &Invoice) -> Result<(), LedgerError> {
        let guard = self.lock_write()?;
        guard
            .execute(
                "INSERT INTO invoice (hash, account, bolt11, expires, amount_msat, secret, \
                 status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    invoice.hash,
                    invoice.account.as_str(),
                    invoice.bolt11,
                    invoice.expires,
                    invoice.amount_msat,
                    invoice.secret,
                    invoice.status.as_str()
                ],
            )
            .map_err(db_error)?;
        Ok(())
    }

    fn settle_invoice(&self, secret: &str) -> Result<SettlementOutcome, LedgerError> {
        let mut guard = self.lock_write()?;
        let tx = guard.transaction().map_err(db_error)?;
        let row = tx
            .query_row(
                "SELECT account, amount_msat, status FROM invoice WHERE secret = ?1",
                params![secret],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(db_error)?;
        let Some((account_raw, amount_msat, status_raw)) = row else {
            return Ok(SettlementOutcome::UnknownSecret);
        };
        let status = InvoiceStatus::parse(&status_raw)
            .ok_or_else(|| LedgerError::Invalid("stored invoice status".to_string()))?;
        if status == InvoiceStatus::Settled {
            return Ok(SettlementOutcome::AlreadySettled);
        }
        let account = AccountId::parse(&account_raw)
            .map_err(|err| LedgerError::Invalid(format!("stored invoice account: {err}")))?;
        // Guarded transition: a concurrent delivery that already flipped the
        // status makes this a no-op instead of a second credit.
        let transitioned = tx
            .execute(
                "UPDATE invoice SET status = 'settled' WHERE secret = ?1 AND status = 'pending'",
                params![secret],
            )
            .map_err(db_error)?;
        if transitioned == 0 {
            return Ok(SettlementOutcome::AlreadySettled);
        }
        tx.execute(
            "UPDATE account SET balance = balance + ?1 WHERE id = ?2",
            params![amount_msat, account.as_str()],
        )
        .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        Ok(SettlementOutcome::Credited {
            account,
            amount_msat,
        })
    }

    fn readiness(&self) -> Result<(), LedgerError> {
        let guard = self.lock_read()?;
        guard
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(db_error)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw token row before scope validation.
type RawTokenRow = (String, String, String, String);
/// Raw account row before identifier validation.
type RawAccountRow = (String, i64, Option<String>);

/// Extracts the raw token columns from a row.
fn token_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTokenRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// Validates a raw token row into a [`Token`].
fn parse_token_row(raw: RawTokenRow) -> Result<Token, LedgerError> {
    let (id, account, value, scope) = raw;
    let id = TokenId::parse(&id)
        .map_err(|err| LedgerError::Invalid(format!("stored token id: {err}")))?;
    let account = AccountId::parse(&account)
        .map_err(|err| LedgerError::Invalid(format!("stored token account: {err}")))?;
    let scope = Scope::parse(&scope)
        .ok_or_else(|| LedgerError::Invalid("stored token scope".to_string()))?;
    Ok(Token {
        id,
        account,
        value,
        scope,
    })
}

/// Extracts the raw account columns from a row.
fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAccountRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

/// Validates a raw account row into an [`Account`].
fn parse_account_row(raw: RawAccountRow) -> Result<Account, LedgerError> {
    let (id, balance, parent) = raw;
    let id = AccountId::parse(&id)
        .map_err(|err| LedgerError::Invalid(format!("stored account id: {err}")))?;
    let parent = parent
        .as_deref()
        .map(AccountId::parse)
        .transpose()
        .map_err(|err| LedgerError::Invalid(format!("stored parent id: {err}")))?;
    Ok(Account {
        id,
        balance,
        parent,
    })
}

/// Maps a `rusqlite` error to a [`LedgerError`].
fn db_error(err: rusqlite::Error) -> LedgerError {
    LedgerError::Db(err.to_string())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteLedgerConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteLedgerConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS account (
                    id TEXT PRIMARY KEY,
                    balance INTEGER NOT NULL DEFAULT 0,
                    parent TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_account_parent ON account (parent);
                CREATE TABLE IF NOT EXISTS token (
                    id TEXT PRIMARY KEY,
                    account TEXT NOT NULL,
                    value TEXT NOT NULL UNIQUE,
                    scope TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_token_account ON token (account);
                CREATE TABLE IF NOT EXISTS invoice (
                    hash TEXT PRIMARY KEY,
                    account TEXT NOT NULL,
                    bolt11 TEXT NOT NULL,
                    expires INTEGER NOT NULL,
                    amount_msat INTEGER NOT NULL,
                    secret TEXT NOT NULL UNIQUE,
                    status TEXT NOT NULL DEFAULT 'pending'
                );
                CREATE INDEX IF NOT EXISTS idx_invoice_account ON invoice (account);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
