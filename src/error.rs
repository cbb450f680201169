use thiserror::Error;

use crate::ingest::EntityId;

/// Main error type for Liney Link
#[derive(Error, Debug)]
pub enum LinkError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed input record or file
    #[error("Parse error: {0}")]
    Parse(String),

    /// Entity referenced by a query is not known
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// No eligible candidate pair was found within the sampling budget
    #[error("Selection failed for tier '{tier}': no eligible pair after {attempts} attempts")]
    SelectionFailed { tier: String, attempts: usize },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using LinkError
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LinkError::Parse("Test error".to_string());
        assert!(err.to_string().contains("Parse error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_selection_failed_display() {
        let err = LinkError::SelectionFailed {
            tier: "easy".to_string(),
            attempts: 2000,
        };
        let msg = err.to_string();
        assert!(msg.contains("easy"));
        assert!(msg.contains("2000"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LinkError = io_err.into();
        assert!(matches!(err, LinkError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err: LinkError = json_err.into();
        assert!(matches!(err, LinkError::Json(_)));
    }
}
