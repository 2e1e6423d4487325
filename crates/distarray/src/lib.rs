//! # Distarray - Distributed N-Dimensional Arrays in Rust
//!
//! Distarray spreads the elements of an n-dimensional array over a group of
//! cooperating processes and keeps every process's view of "the array"
//! consistent. Each process holds a dense local block; the runtime knows
//! where every block sits in the global array and provides the collectives
//! that move, reassemble and reduce them.
//!
//! ## Core Features
//!
//! - **Local Buffers**: typed, contiguous, row-major tensors with shared storage
//! - **Distribution**: Block, replicated and undistributed axes over a balanced
//!   Cartesian process grid
//! - **Collectives**: variable-length all-gather, scatter and all-to-all,
//!   broadcast of values and arrays, group and grid-line all-reduce
//! - **Reductions**: sum, product, min, max and mean over the whole array or
//!   along one axis, with results replicated on every process
//! - **Containers**: `DistArray` with cached global shape, size and byte count
//! - **Configuration**: TOML runtime defaults for the root rank and scheme
//!
//! # Quick Start
//!
//! ```rust
//! use distarray::prelude::*;
//!
//! let results = World::launch_mock(4, |pg| {
//!     let opts = CreationOptions::default();
//!     let x = arange(0_i64, 10, 1, &opts, &pg).unwrap();
//!
//!     // Rank 0 holds [0, 1, 2], rank 3 holds [8, 9].
//!     let local = x.local().to_vec();
//!
//!     let total = x.sum(&ReduceArgs::new()).unwrap().item().unwrap();
//!     (local, total)
//! });
//!
//! assert_eq!(results[0].0, vec![0, 1, 2]);
//! assert!(results.iter().all(|(_, total)| *total == 45));
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]

// =============================================================================
// Core Re-exports
// =============================================================================

pub use distarray_core as core;

pub use distarray_tensor as tensor;

pub use distarray_distributed as distributed;

pub use distarray_distributed::{
    arange, array, empty, full, ones, zeros, CreationOptions, DistArray, Distribution,
    ProcessGroup, ReduceArgs, ReduceOp, RuntimeConfig, World,
};

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for distributed array programs.
///
/// ```rust
/// use distarray::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use distarray_core::{DType, Error, ErrorKind, Numeric, Result, Scalar};

    // Local buffers
    pub use distarray_tensor::{DynTensor, Tensor};

    // Distributed arrays
    pub use distarray_distributed::prelude::*;
    pub use distarray_distributed::{GlobalProperties, RuntimeConfig};
}

// =============================================================================
// Version Information
// =============================================================================

/// Returns the version of the Distarray runtime.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let v = version();
        assert!(!v.is_empty());
    }

    #[test]
    fn test_tensor_creation() {
        use tensor::Tensor;

        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(t.shape(), &[2, 2]);
    }

    #[test]
    fn test_single_process_world() {
        let world = World::mock();
        assert_eq!(world.world_size(), 1);
        assert!(world.is_main());

        let x = zeros::<f32>(&[3, 2], &CreationOptions::default(), world.default_group()).unwrap();
        assert_eq!(x.local_shape(), &[3, 2]);
        assert_eq!(x.global_size(), 6);
    }
}
