//! Error types for explanation evaluation

use thiserror::Error;

/// Result type alias for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Main error type for the evaluation framework
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No attributions supplied and no explanation function configured")]
    MissingExplainFunction,

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EvalError {
    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        EvalError::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for EvalError {
    fn from(err: ndarray::ShapeError) -> Self {
        EvalError::ShapeMismatch {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EvalError::InvalidConfiguration("layer_order 'bottom_up'".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: layer_order 'bottom_up'"
        );
    }

    #[test]
    fn test_shape_error_display() {
        let err = EvalError::shape("4 instances", "3 instances");
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected 4 instances, got 3 instances"
        );
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: EvalError = json_err.into();
        assert!(matches!(err, EvalError::SerializationError(_)));
    }
}
