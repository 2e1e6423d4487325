//! Distarray Core - Foundation Layer for the Distributed Array Runtime
//!
//! This crate provides the abstractions every other distarray crate builds
//! on: the element type system, reference-counted local storage and the
//! unified error type shared by buffers, distributions and collectives.
//!
//! # Key Features
//! - Type-safe data type system (f32, f64, signed and unsigned integers)
//! - Byte-castable scalars so buffers can cross the transport as raw bytes
//! - Efficient memory storage with reference counting
//! - One error enum with a rank-independent `ErrorKind`
//!
//! # Example
//! ```rust
//! use distarray_core::{DType, Scalar, Storage};
//!
//! let storage = Storage::<f32>::zeros(1024);
//! assert_eq!(f32::dtype(), DType::F32);
//! assert_eq!(storage.len(), 1024);
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]

// =============================================================================
// Modules
// =============================================================================

pub mod dtype;
pub mod error;
pub mod storage;

// =============================================================================
// Re-exports
// =============================================================================

pub use dtype::{DType, Numeric, Scalar};
pub use error::{Error, ErrorKind, Result};
pub use storage::Storage;

// =============================================================================
// Prelude
// =============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::dtype::{DType, Numeric, Scalar};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::storage::Storage;
}
