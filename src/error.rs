//! Crate-wide error taxonomy
//!
//! Every outward operation returns either its payload or a [`CoreError`]
//! carrying a human-readable message plus a machine-checkable category.
//! Rate-source failures never appear here - the resolver absorbs them
//! through its fallback chain.

use thiserror::Error;

use crate::ledger::LedgerError;

/// Outward error type for all core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller input violates a stated constraint. Reported verbatim,
    /// never retried automatically.
    #[error("{0}")]
    Validation(String),

    /// An atomic ledger operation found its precondition no longer true
    /// at commit. Reported as "try again"; not retried silently.
    #[error("{0}")]
    Conflict(String),

    /// No authenticated caller.
    #[error("authentication required")]
    AuthRequired,

    /// Anything else. Logged with detail, reported generically.
    #[error("internal error")]
    Unexpected(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Machine-checkable category tag.
    pub fn category(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation",
            CoreError::Conflict(_) => "conflict",
            CoreError::AuthRequired => "auth_required",
            CoreError::Unexpected(_) => "unexpected",
        }
    }
}

impl From<LedgerError> for CoreError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientBalance { available, requested } => CoreError::Validation(
                format!("insufficient balance: available {available}, requested {requested}"),
            ),
            LedgerError::InsufficientRemaining { remaining, requested } => CoreError::Conflict(
                format!("requested {requested} exceeds remaining amount {remaining}"),
            ),
            LedgerError::CooldownActive { remaining_secs } => CoreError::Validation(format!(
                "mining cooldown active: {remaining_secs}s remaining"
            )),
            LedgerError::AdNotFound(id) => {
                CoreError::Validation(format!("advertisement {id} not found"))
            }
            LedgerError::AdNotActive(id) => {
                CoreError::Validation(format!("advertisement {id} is no longer active"))
            }
            LedgerError::NotAdOwner(id) => {
                CoreError::Validation(format!("only the owner of advertisement {id} may modify it"))
            }
            LedgerError::UserNotFound(handle) => {
                CoreError::Validation(format!("no user found with handle \"{handle}\""))
            }
            LedgerError::Db(inner) => {
                tracing::error!(error = %inner, "ledger database failure");
                CoreError::Unexpected(inner.to_string())
            }
            LedgerError::Internal(msg) => {
                tracing::error!(error = %msg, "ledger internal failure");
                CoreError::Unexpected(msg)
            }
        }
    }
}
