//! Distarray Tensor - Dense Local Buffers
//!
//! This crate provides the `Tensor` type that holds one process's slice of a
//! distributed array. Tensors are contiguous, row-major N-dimensional arrays
//! with shared storage, raw byte views for the transport and the local
//! folds that the reduction engine combines across processes.
//!
//! # Key Features
//! - N-dimensional buffer with arbitrary shape, including zero-size axes
//! - Byte conversion for sending buffers through collectives
//! - Per-axis folds with an explicit identity element
//! - Rectangular region copies for partitioning and reassembly
//! - `DynTensor` for buffers whose element type is only known at runtime
//!
//! # Example
//! ```rust
//! use distarray_tensor::{ones, zeros, Tensor};
//!
//! let a = zeros::<f32>(&[2, 3]);
//! let b = ones::<f32>(&[2, 3]);
//!
//! let c = a.add(&b).unwrap();
//! let d = c.mul_scalar(2.0);
//! assert_eq!(d.sum(), 12.0);
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
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::should_implement_trait)]

// =============================================================================
// Modules
// =============================================================================

pub mod creation;
pub mod dyn_tensor;
pub mod shape;
pub mod tensor;

// =============================================================================
// Re-exports
// =============================================================================

pub use creation::*;
pub use distarray_core::{DType, Error, Result};
pub use dyn_tensor::DynTensor;
pub use shape::{Shape, Strides};
pub use tensor::Tensor;

// =============================================================================
// Prelude
// =============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::dyn_tensor::DynTensor;
    pub use crate::shape::{Shape, Strides};
    pub use crate::tensor::Tensor;
    pub use crate::{arange, full, ones, zeros};
    pub use distarray_core::{DType, Error, Result};
}
