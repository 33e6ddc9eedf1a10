// crates/tollgate-core/src/scope.rs
// ============================================================================
// Module: Authorization Scopes
// Description: Closed scope enum and per-operation scope gates.
// Purpose: Provide a fail-closed satisfies relation for API authorization.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Tollgate authorization uses a closed three-variant scope enum with an
//! explicit satisfies relation: `all` satisfies every gate, `all/readonly`
//! satisfies only read-gated operations, and `account/create` satisfies only
//! the account-creation gate. Gates evaluate a resolved (or anonymous) caller
//! against a per-operation allowed-scope set; missing credentials and
//! insufficient scopes are distinct, stable outcomes. Security posture:
//! scope strings arriving on the wire are untrusted and parse fail-closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Scope Enum
// ============================================================================

/// Authorization capability level carried by a token.
///
/// # Invariants
/// - Wire forms are stable: `all`, `all/readonly`, `account/create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// Full access; satisfies every gate.
    #[serde(rename = "all")]
    All,
    /// Read-only access to the tenant's own data.
    #[serde(rename = "all/readonly")]
    AllReadonly,
    /// Permission to create child accounts only.
    #[serde(rename = "account/create")]
    AccountCreate,
}

impl Scope {
    /// Returns the stable wire form of the scope.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::AllReadonly => "all/readonly",
            Self::AccountCreate => "account/create",
        }
    }

    /// Parses a scope from its wire form.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "all" => Some(Self::All),
            "all/readonly" => Some(Self::AllReadonly),
            "account/create" => Some(Self::AccountCreate),
            _ => None,
        }
    }

    /// Returns whether this scope satisfies the required scope.
    ///
    /// `All` satisfies everything; the other variants satisfy only
    /// themselves.
    #[must_use]
    pub const fn satisfies(self, required: Self) -> bool {
        match self {
            Self::All => true,
            Self::AllReadonly => matches!(required, Self::AllReadonly),
            Self::AccountCreate => matches!(required, Self::AccountCreate),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Gate Errors
// ============================================================================

/// Fail-closed gate rejection outcomes.
///
/// # Invariants
/// - `Unauthorized` is only produced for anonymous callers.
/// - `Forbidden` is only produced for resolved callers with insufficient scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// No credential was resolved and the gate does not admit anonymous callers.
    Unauthorized,
    /// A credential was resolved but its scope does not satisfy the gate.
    Forbidden,
}

// ============================================================================
// SECTION: Scope Gate
// ============================================================================

/// Per-operation allowed-scope set, optionally admitting anonymous callers.
///
/// # Invariants
/// - Evaluation is deterministic for identical inputs.
/// - `Scope::All` passes every gate through the satisfies relation.
#[derive(Debug, Clone, Copy)]
pub struct ScopeGate {
    /// Whether anonymous (unauthenticated) callers are admitted.
    allow_anonymous: bool,
    /// Scopes that satisfy this gate.
    allowed: &'static [Scope],
}

impl ScopeGate {
    /// Builds a gate that requires an authenticated caller.
    #[must_use]
    pub const fn authenticated(allowed: &'static [Scope]) -> Self {
        Self {
            allow_anonymous: false,
            allowed,
        }
    }

    /// Builds a gate that also admits anonymous callers.
    #[must_use]
    pub const fn with_anonymous(allowed: &'static [Scope]) -> Self {
        Self {
            allow_anonymous: true,
            allowed,
        }
    }

    /// Evaluates a resolved scope (or anonymous caller) against the gate.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Unauthorized`] for anonymous callers at
    /// authenticated gates and [`GateError::Forbidden`] for resolved scopes
    /// that satisfy none of the allowed scopes.
    pub fn evaluate(&self, resolved: Option<Scope>) -> Result<(), GateError> {
        let Some(scope) = resolved else {
            if self.allow_anonymous {
                return Ok(());
            }
            return Err(GateError::Unauthorized);
        };
        if self.allowed.iter().any(|required| scope.satisfies(*required)) {
            return Ok(());
        }
        Err(GateError::Forbidden)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
