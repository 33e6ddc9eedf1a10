// crates/tollgate-core/src/identifiers.rs
// ============================================================================
// Module: Tollgate Identifiers
// Description: Canonical opaque identifiers for accounts, tokens, and resources.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Tollgate.
//! Account and token identifiers are opaque lowercase-hex strings validated
//! at construction boundaries; resource names are caller-supplied and are
//! validated against a strict allow-listed grammar because they are spliced
//! into dynamically created table definitions. Security posture: every
//! identifier arriving on the wire is untrusted until parsed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exact length of account and token identifiers (hex characters).
const ID_HEX_LENGTH: usize = 32;
/// Maximum length of a tenant-defined resource name.
const MAX_RESOURCE_NAME_LENGTH: usize = 64;
/// Table-name prefix reserved by the storage engine.
const RESERVED_RESOURCE_PREFIX: &str = "sqlite_";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier parse failures.
///
/// # Invariants
/// - Messages never echo the rejected input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Identifier is empty or has the wrong length.
    #[error("identifier has invalid length")]
    InvalidLength,
    /// Identifier contains characters outside its grammar.
    #[error("identifier contains invalid characters")]
    InvalidCharacters,
    /// Resource name collides with an engine-reserved prefix.
    #[error("resource name uses a reserved prefix")]
    ReservedPrefix,
}

// ============================================================================
// SECTION: Account Identifier
// ============================================================================

/// Opaque account identifier with a stable lowercase-hex wire form.
///
/// # Invariants
/// - Always exactly 32 lowercase hex characters.
/// - Safe to embed in tenant storage file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Parses an account identifier from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value is not 32 lowercase hex
    /// characters.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        validate_hex_id(raw)?;
        Ok(Self(raw.to_string()))
    }

    /// Builds an identifier from generator-produced lowercase hex.
    pub(crate) const fn from_generated(raw: String) -> Self {
        Self(raw)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = IdentifierError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        validate_hex_id(&raw)?;
        Ok(Self(raw))
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

// ============================================================================
// SECTION: Token Identifier
// ============================================================================

/// Opaque token identifier with a stable lowercase-hex wire form.
///
/// # Invariants
/// - Always exactly 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    /// Parses a token identifier from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value is not 32 lowercase hex
    /// characters.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        validate_hex_id(raw)?;
        Ok(Self(raw.to_string()))
    }

    /// Builds an identifier from generator-produced lowercase hex.
    pub(crate) const fn from_generated(raw: String) -> Self {
        Self(raw)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TokenId {
    type Error = IdentifierError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        validate_hex_id(&raw)?;
        Ok(Self(raw))
    }
}

impl From<TokenId> for String {
    fn from(id: TokenId) -> Self {
        id.0
    }
}

// ============================================================================
// SECTION: Resource Names
// ============================================================================

/// Validated tenant-defined resource (table) name.
///
/// # Invariants
/// - Matches `[a-z_][a-z0-9_]{0,63}` exactly.
/// - Never begins with the engine-reserved `sqlite_` prefix.
/// - Safe to splice into `CREATE TABLE`/`INSERT` statements as an identifier;
///   row values are still always bound as parameters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceName(String);

impl ResourceName {
    /// Parses a caller-supplied resource name against the allow-listed grammar.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the name is empty, too long, contains
    /// characters outside the grammar, or uses a reserved prefix.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.is_empty() || raw.len() > MAX_RESOURCE_NAME_LENGTH {
            return Err(IdentifierError::InvalidLength);
        }
        let mut chars = raw.chars();
        let Some(first) = chars.next() else {
            return Err(IdentifierError::InvalidLength);
        };
        if !(first.is_ascii_lowercase() || first == '_') {
            return Err(IdentifierError::InvalidCharacters);
        }
        for ch in chars {
            if !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_') {
                return Err(IdentifierError::InvalidCharacters);
            }
        }
        if raw.starts_with(RESERVED_RESOURCE_PREFIX) {
            return Err(IdentifierError::ReservedPrefix);
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the validated name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ResourceName {
    type Error = IdentifierError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<ResourceName> for String {
    fn from(name: ResourceName) -> Self {
        name.0
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates a 32-character lowercase hex identifier.
fn validate_hex_id(raw: &str) -> Result<(), IdentifierError> {
    if raw.len() != ID_HEX_LENGTH {
        return Err(IdentifierError::InvalidLength);
    }
    if !raw.chars().all(|ch| ch.is_ascii_digit() || ('a' ..= 'f').contains(&ch)) {
        return Err(IdentifierError::InvalidCharacters);
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::AccountId;
    use super::IdentifierError;
    use super::ResourceName;
    use super::TokenId;

    #[test]
    fn account_id_accepts_lowercase_hex() {
        let id = AccountId::parse("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(id.as_str(), "0123456789abcdef0123456789abcdef");
    }

    #[test]
    fn account_id_rejects_uppercase_and_length() {
        assert_eq!(
            AccountId::parse("0123456789ABCDEF0123456789ABCDEF"),
            Err(IdentifierError::InvalidCharacters)
        );
        assert_eq!(AccountId::parse("abc"), Err(IdentifierError::InvalidLength));
        assert_eq!(AccountId::parse(""), Err(IdentifierError::InvalidLength));
    }

    #[test]
    fn token_id_round_trips_through_serde() {
        let id = TokenId::parse("fedcba9876543210fedcba9876543210").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"fedcba9876543210fedcba9876543210\"");
        let back: TokenId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn token_id_serde_rejects_invalid() {
        let result = serde_json::from_str::<TokenId>("\"not-hex\"");
        assert!(result.is_err());
    }

    #[test]
    fn resource_name_accepts_grammar() {
        for name in ["events", "_private", "table_2", "a"] {
            assert!(ResourceName::parse(name).is_ok(), "expected {name} to parse");
        }
    }

    #[test]
    fn resource_name_rejects_hostile_input() {
        for name in [
            "",
            "Events",
            "drop table;--",
            "name with space",
            "dash-name",
            "0starts_with_digit",
            "sqlite_master",
        ] {
            assert!(ResourceName::parse(name).is_err(), "expected {name} to fail");
        }
        let long = "a".repeat(65);
        assert_eq!(ResourceName::parse(&long), Err(IdentifierError::InvalidLength));
    }
}
