//! Error types for lancet-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum CoreError {
    /// Raw text does not parse under its declared value type
    #[error("Type error: {0}")]
    TypeError(String),

    /// Malformed identifier or reference segment
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::TypeError("not a number: \"abc\"".to_string());
        assert!(err.to_string().contains("Type error"));
    }
}
