//! Domain error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Storage error: {0}")]
    Repository(#[from] anyhow::Error),

    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Invalid cursor: {0}")]
    InvalidCursor(#[from] shared::pagination::CursorError),
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = DomainError::Timeout {
            operation: "insert_record",
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "insert_record timed out after 5000 ms");
    }

    #[test]
    fn test_repository_from_anyhow() {
        let err: DomainError = anyhow::anyhow!("connection refused").into();
        assert!(matches!(err, DomainError::Repository(_)));
        assert_eq!(err.to_string(), "Storage error: connection refused");
    }
}
