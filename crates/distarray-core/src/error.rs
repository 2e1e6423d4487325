//! Error Types - Distarray Error Handling
//!
//! Provides the unified error type shared by every layer of the runtime,
//! from local buffer manipulation up to collective operations over a
//! process group.
//!
//! # Key Features
//! - One error enum for buffer, distribution and collective failures
//! - `ErrorKind` classification so every rank can agree on the failure kind
//! - Integration with `std::error::Error` through `thiserror`
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use thiserror::Error;

use crate::dtype::DType;

// =============================================================================
// Error Types
// =============================================================================

/// The main error type for distarray operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Unrecognized distribution tag, or a scheme whose arity disagrees with
    /// the array's dimensionality.
    #[error("Invalid distribution: {message}")]
    InvalidDistribution {
        /// What was wrong with the requested distribution.
        message: String,
    },

    /// A collective was handed something that is not a buffer of the
    /// expected element type.
    #[error("Type error: {message}")]
    TypeError {
        /// Description of the offending argument.
        message: String,
    },

    /// A shape, length or index precondition was violated.
    #[error("Value error: {message}")]
    ValueError {
        /// The violated constraint.
        message: String,
    },

    /// A recognized parameter that this runtime does not support.
    #[error("Not supported: {message}")]
    NotSupported {
        /// The unsupported parameter.
        message: String,
    },

    /// An operation without a defined cross-process combination rule.
    #[error("Not implemented: {message}")]
    NotImplemented {
        /// The unimplemented operation.
        message: String,
    },

    /// Shape mismatch between buffers.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape.
        actual: Vec<usize>,
    },

    /// Data type mismatch between buffers.
    #[error("DType mismatch: expected {expected:?}, got {actual:?}")]
    DTypeMismatch {
        /// The expected data type.
        expected: DType,
        /// The actual data type.
        actual: DType,
    },

    /// Invalid dimension index.
    #[error("Invalid dimension: index {index} for tensor with {ndim} dimensions")]
    InvalidDimension {
        /// The invalid dimension index.
        index: i64,
        /// Number of dimensions in the tensor.
        ndim: usize,
    },

    /// Index out of bounds.
    #[error("Index out of bounds: index {index} for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index.
        index: usize,
        /// The size of the dimension.
        size: usize,
    },

    /// Invalid operation for the given buffer.
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// Internal error (should not happen).
    #[error("Internal error: {message}")]
    InternalError {
        /// Description of the internal error.
        message: String,
    },
}

// =============================================================================
// Error Kinds
// =============================================================================

/// Coarse classification of an [`Error`].
///
/// Every rank that hits the same logical failure reports the same kind, so
/// callers can branch on it without diverging control flow across the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unrecognized or arity-mismatched distribution.
    InvalidDistribution,
    /// Non-buffer or wrongly typed argument.
    Type,
    /// Shape, length or index precondition violated.
    Value,
    /// Recognized but unsupported parameter.
    NotSupported,
    /// Reduction without a combination rule.
    NotImplemented,
    /// Local buffer shape, dtype or index problem.
    Buffer,
    /// Configuration problem.
    Config,
    /// Encoding or decoding failure.
    Serialization,
    /// Bug in the runtime.
    Internal,
}

// =============================================================================
// Result Type
// =============================================================================

/// A specialized Result type for distarray operations.
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// Helper Functions
// =============================================================================

impl Error {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDistribution { .. } => ErrorKind::InvalidDistribution,
            Self::TypeError { .. } | Self::DTypeMismatch { .. } => ErrorKind::Type,
            Self::ValueError { .. } => ErrorKind::Value,
            Self::NotSupported { .. } => ErrorKind::NotSupported,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::ShapeMismatch { .. }
            | Self::InvalidDimension { .. }
            | Self::IndexOutOfBounds { .. }
            | Self::InvalidOperation { .. } => ErrorKind::Buffer,
            Self::ConfigError { .. } => ErrorKind::Config,
            Self::SerializationError { .. } => ErrorKind::Serialization,
            Self::InternalError { .. } => ErrorKind::Internal,
        }
    }

    /// Creates a new invalid distribution error.
    #[must_use]
    pub fn invalid_distribution(message: impl Into<String>) -> Self {
        Self::InvalidDistribution {
            message: message.into(),
        }
    }

    /// Creates a new type error.
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    /// Creates a new value error.
    #[must_use]
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::ValueError {
            message: message.into(),
        }
    }

    /// Creates a new not-supported error.
    #[must_use]
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    /// Creates a new not-implemented error.
    #[must_use]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented {
            message: message.into(),
        }
    }

    /// Creates a new shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Creates a new invalid operation error.
    #[must_use]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::shape_mismatch(&[2, 3], &[2, 4]);
        assert!(err.to_string().contains("Shape mismatch"));

        let err = Error::invalid_distribution("unrecognized tag 'bananas'");
        assert!(err.to_string().contains("bananas"));
    }

    #[test]
    fn test_error_equality() {
        let err1 = Error::value_error("axis 3 out of bounds");
        let err2 = Error::value_error("axis 3 out of bounds");
        assert_eq!(err1, err2);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::invalid_distribution("x").kind(),
            ErrorKind::InvalidDistribution
        );
        assert_eq!(Error::type_error("x").kind(), ErrorKind::Type);
        assert_eq!(Error::value_error("x").kind(), ErrorKind::Value);
        assert_eq!(Error::not_supported("x").kind(), ErrorKind::NotSupported);
        assert_eq!(
            Error::not_implemented("x").kind(),
            ErrorKind::NotImplemented
        );
        assert_eq!(
            Error::DTypeMismatch {
                expected: DType::F32,
                actual: DType::I64
            }
            .kind(),
            ErrorKind::Type
        );
        assert_eq!(Error::shape_mismatch(&[1], &[2]).kind(), ErrorKind::Buffer);
    }
}
