// crates/tollgate-store-sqlite/src/tenant.rs
// ============================================================================
// Module: Tenant Namespace Store
// Description: Per-account SQLite namespaces with lazily created resources.
// Purpose: Isolate each tenant's data in its own database file.
// Dependencies: tollgate-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Each account owns one `SQLite` file under the configured data directory.
//! Connections are opened per call and dropped on every exit path, so no
//! namespace selection can leak into a later request on a reused connection.
//! Resource tables are created lazily on first write and rows are only
//! appended. Security posture: resource names are caller-supplied and reach
//! this module only as validated [`ResourceName`] values; all row values are
//! bound as parameters, never interpolated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use thiserror::Error;
use tollgate_core::AccountId;
use tollgate_core::ResourceName;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the tenant namespace store.
///
/// # Invariants
/// - `data_dir` is created on store construction when missing.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantStoreConfig {
    /// Directory holding one `SQLite` file per account.
    pub data_dir: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tenant namespace store errors.
///
/// # Invariants
/// - `Query` carries the engine message verbatim; it is the tenant's own
///   query against the tenant's own data.
#[derive(Debug, Error, Clone)]
pub enum TenantStoreError {
    /// Store I/O error.
    #[error("tenant store io error: {0}")]
    Io(String),
    /// `SQLite` engine error outside tenant-authored queries.
    #[error("tenant store db error: {0}")]
    Db(String),
    /// Invalid request data.
    #[error("tenant store invalid data: {0}")]
    Invalid(String),
    /// The tenant's own query failed at the storage engine.
    #[error("{0}")]
    Query(String),
}

// ============================================================================
// SECTION: Query Rows
// ============================================================================

/// Rows returned by a raw tenant query, one JSON object per row.
pub type QueryRows = Vec<Map<String, Value>>;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Per-account namespace store over one `SQLite` file per tenant.
///
/// # Invariants
/// - No connection outlives the call that opened it.
/// - Namespace files are derived only from validated account identifiers.
#[derive(Debug, Clone)]
pub struct TenantStore {
    /// Directory holding the per-account database files.
    data_dir: PathBuf,
}

impl TenantStore {
    /// Creates the tenant store, ensuring the data directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`TenantStoreError`] when the directory cannot be created.
    pub fn new(config: &TenantStoreConfig) -> Result<Self, TenantStoreError> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|err| TenantStoreError::Io(err.to_string()))?;
        Ok(Self {
            data_dir: config.data_dir.clone(),
        })
    }

    /// Returns the namespace file path for an account.
    #[must_use]
    pub fn namespace_path(&self, account: &AccountId) -> PathBuf {
        self.data_dir.join(format!("{}.db", account.as_str()))
    }

    /// Idempotently creates a tenant resource table.
    ///
    /// # Errors
    ///
    /// Returns [`TenantStoreError`] when the namespace cannot be opened or
    /// the table cannot be created.
    pub fn ensure_resource(
        &self,
        account: &AccountId,
        resource: &ResourceName,
    ) -> Result<(), TenantStoreError> {
        let connection = self.open_namespace(account)?;
        connection
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    instance TEXT NOT NULL
                );",
                resource.as_str()
            ))
            .map_err(|err| TenantStoreError::Db(err.to_string()))
    }

    /// Inserts a document into a tenant resource table, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`TenantStoreError`] when the document cannot be serialized
    /// or the insert fails.
    pub fn insert_resource(
        &self,
        account: &AccountId,
        resource: &ResourceName,
        instance: &Value,
    ) -> Result<i64, TenantStoreError> {
        let document = serde_json::to_string(instance)
            .map_err(|err| TenantStoreError::Invalid(err.to_string()))?;
        let connection = self.open_namespace(account)?;
        connection
            .execute(
                &format!("INSERT INTO \"{}\" (instance) VALUES (?1)", resource.as_str()),
                params![document],
            )
            .map_err(|err| TenantStoreError::Db(err.to_string()))?;
        Ok(connection.last_insert_rowid())
    }

    /// Executes a tenant-authored query read-only and returns JSON rows.
    ///
    /// # Errors
    ///
    /// Returns [`TenantStoreError::Query`] with the engine message verbatim
    /// when the query fails; other variants cover argument conversion.
    pub fn raw_query(
        &self,
        account: &AccountId,
        query: &str,
        args: &[Value],
    ) -> Result<QueryRows, TenantStoreError> {
        let connection = self.open_namespace_read_only(account)?;
        let params = args.iter().map(json_to_sql).collect::<Result<Vec<_>, _>>()?;
        let mut stmt = connection
            .prepare(query)
            .map_err(|err| TenantStoreError::Query(err.to_string()))?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(ToString::to_string).collect();
        let mut rows = stmt
            .query(params_from_iter(params))
            .map_err(|err| TenantStoreError::Query(err.to_string()))?;
        let mut out = Vec::new();
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(err) => return Err(TenantStoreError::Query(err.to_string())),
            };
            let mut object = Map::with_capacity(column_names.len());
            for (index, name) in column_names.iter().enumerate() {
                let value = row
                    .get_ref(index)
                    .map_err(|err| TenantStoreError::Query(err.to_string()))?;
                object.insert(name.clone(), sql_to_json(value));
            }
            out.push(object);
        }
        Ok(out)
    }

    /// Removes an account's namespace file; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`TenantStoreError`] only for I/O failures other than the
    /// file being absent.
    pub fn remove_namespace(&self, account: &AccountId) -> Result<(), TenantStoreError> {
        match std::fs::remove_file(self.namespace_path(account)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(TenantStoreError::Io(err.to_string())),
        }
    }

    /// Opens the account's namespace read-write, creating it when missing.
    fn open_namespace(&self, account: &AccountId) -> Result<Connection, TenantStoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        open_with_flags(&self.namespace_path(account), flags)
            .map_err(|err| TenantStoreError::Db(err.to_string()))
    }

    /// Opens the account's namespace read-only; missing namespaces surface
    /// as tenant query errors.
    fn open_namespace_read_only(
        &self,
        account: &AccountId,
    ) -> Result<Connection, TenantStoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        open_with_flags(&self.namespace_path(account), flags)
            .map_err(|err| TenantStoreError::Query(err.to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens a namespace connection with a short busy timeout.
fn open_with_flags(path: &Path, flags: OpenFlags) -> Result<Connection, rusqlite::Error> {
    let connection = Connection::open_with_flags(path, flags)?;
    connection.busy_timeout(std::time::Duration::from_millis(1_000))?;
    Ok(connection)
}

/// Converts a JSON argument into an `SQLite` bind value.
fn json_to_sql(value: &Value) -> Result<SqlValue, TenantStoreError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Ok(SqlValue::Integer(int))
            } else if let Some(float) = number.as_f64() {
                Ok(SqlValue::Real(float))
            } else {
                Err(TenantStoreError::Invalid("numeric argument out of range".to_string()))
            }
        }
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        Value::Array(_) | Value::Object(_) => {
            let document = serde_json::to_string(value)
                .map_err(|err| TenantStoreError::Invalid(err.to_string()))?;
            Ok(SqlValue::Text(document))
        }
    }
}

/// Converts an `SQLite` column value into JSON.
fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(int) => Value::Number(Number::from(int)),
        ValueRef::Real(float) => Number::from_f64(float).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
