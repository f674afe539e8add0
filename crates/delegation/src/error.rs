//! Error types for the delegation core

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use voting_common::{CategoryId, DelegateId};

/// Kinds of records the core mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Delegate,
    Keypad,
    ProxyEdge,
    ShareRecord,
    AbsenteeVote,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Delegate => "delegate",
            EntityKind::Keypad => "keypad",
            EntityKind::ProxyEdge => "proxy edge",
            EntityKind::ShareRecord => "share record",
            EntityKind::AbsenteeVote => "absentee vote",
        };
        f.write_str(name)
    }
}

/// Errors raised by a repository implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflicting record: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Result type for repository operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors of the reconciler, the executor and the delegation service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelegationError {
    /// The edit would make a delegate represent and be represented by the same party
    #[error("Delegate {party} cannot be representative and principal of delegate {delegate} at the same time")]
    CycleDetected {
        delegate: DelegateId,
        party: DelegateId,
    },

    /// A share value is not a non-negative number
    #[error("Invalid share value '{value}' for category {category}")]
    InvalidShareValue { category: CategoryId, value: String },

    /// Keypad numbers are positive integers
    #[error("Invalid keypad number: {0}")]
    InvalidKeypadNumber(String),

    /// A delegate referenced by the edit is unknown
    #[error("Delegate not found: {0}")]
    UnknownDelegate(DelegateId),

    /// A single planned operation failed while executing
    #[error("Failed to apply {entity} operation: {cause}")]
    OperationFailed { entity: EntityKind, cause: String },

    /// Repository error outside plan execution
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DelegationError {
    /// Whether the error was detected before anything was written
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DelegationError::CycleDetected { .. }
                | DelegationError::InvalidShareValue { .. }
                | DelegationError::InvalidKeypadNumber(_)
                | DelegationError::UnknownDelegate(_)
        )
    }
}

/// Result type for delegation operations
pub type DelegationResult<T> = Result<T, DelegationError>;

impl From<StorageError> for voting_common::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => voting_common::Error::not_found(msg),
            StorageError::Conflict(msg) => voting_common::Error::conflict(msg),
            StorageError::Unavailable(msg) | StorageError::Other(msg) => {
                voting_common::Error::storage(msg)
            }
        }
    }
}

impl From<DelegationError> for voting_common::Error {
    fn from(err: DelegationError) -> Self {
        match err {
            DelegationError::Storage(err) => err.into(),
            DelegationError::UnknownDelegate(id) => {
                voting_common::Error::not_found(format!("delegate {}", id))
            }
            DelegationError::OperationFailed { .. } => voting_common::Error::storage(err.to_string()),
            other => voting_common::Error::validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_classified() {
        let cycle = DelegationError::CycleDetected {
            delegate: DelegateId(3),
            party: DelegateId(7),
        };
        assert!(cycle.is_validation());

        let failed = DelegationError::OperationFailed {
            entity: EntityKind::Keypad,
            cause: "store unavailable".to_string(),
        };
        assert!(!failed.is_validation());
        assert_eq!(failed.to_string(), "Failed to apply keypad operation: store unavailable");
    }

    #[test]
    fn test_conversion_into_common_error() {
        let err: voting_common::Error = DelegationError::InvalidKeypadNumber("0".into()).into();
        assert!(err.is_validation());

        let err: voting_common::Error = StorageError::Conflict("keypad 5".into()).into();
        assert!(matches!(err, voting_common::Error::Conflict(_)));
    }
}
