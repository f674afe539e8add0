//! Import errors

use serde::Serialize;
use thiserror::Error;

use voting_delegation::StorageError;

/// Why a row, a cell or a whole import was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum ImportError {
    /// No single delegate matches the row's name and number
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    #[error("Not a valid number in column '{column}': '{value}'")]
    InvalidNumber { column: String, value: String },

    /// An earlier row of the same file already imports for this delegate
    #[error("Participant listed more than once: {0}")]
    DuplicateParticipant(String),

    #[error("Keypad number must be a positive integer value: '{0}'")]
    InvalidKeypadNumber(String),

    #[error("Keypad number already exists: {0}")]
    DuplicateKeypadNumber(u32),

    #[error("Motion not found: '{0}'")]
    MotionNotFound(String),

    #[error("Vote must be one of Y, N, A: '{0}'")]
    InvalidVote(String),

    /// A header column that names no known category
    #[error("Unknown category: '{0}'")]
    UnknownCategory(String),

    /// The repository could not be read while preparing an import
    #[error("Storage error: {0}")]
    #[serde(skip)]
    Storage(#[from] StorageError),
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;

impl From<ImportError> for voting_common::Error {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Storage(err) => err.into(),
            other => voting_common::Error::validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ImportError::InvalidNumber {
            column: "Capital".to_string(),
            value: "x".to_string(),
        };
        assert_eq!(err.to_string(), "Not a valid number in column 'Capital': 'x'");
        assert_eq!(
            ImportError::DuplicateKeypadNumber(5).to_string(),
            "Keypad number already exists: 5"
        );
    }

    #[test]
    fn test_into_common_error() {
        let err: voting_common::Error = ImportError::InvalidVote("X".into()).into();
        assert!(err.is_validation());
        let err: voting_common::Error =
            ImportError::Storage(StorageError::Unavailable("down".into())).into();
        assert!(!err.is_validation());
    }
}
