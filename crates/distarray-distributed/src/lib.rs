//! Distarray Distributed - Distributed N-Dimensional Arrays
//!
//! Partitions an array's elements over a group of cooperating processes,
//! tracks where each process's slice sits in the global array, and provides
//! the collective operations that keep every process's view of the array
//! consistent.
//!
//! # Features
//!
//! ## Distribution
//! - **Strategies** - Block, replicated and undistributed axes, parsed from
//!   `"b"`, `"u"` or per-axis tuples such as `"(b, *)"`
//! - **Process Grids** - Balanced Cartesian factoring of the group over the
//!   Block axes
//! - **Root Resolution** - Shapes, ranges and data supplied on one rank
//!
//! ## Communication
//! - **Variable Collectives**: all-gather, scatter and all-to-all of
//!   irregular buffers, broadcast of values and arrays, barrier
//! - **Reductions**: group-wide and grid-line all-reduce
//!
//! ## Arrays
//! - `DistArray` container with cached global shape, size and byte count
//! - Sum, product, min, max and mean over the whole array or one axis
//! - Constructors: `array`, `arange`, `zeros`, `ones`, `full`, `empty`
//!
//! ## Backends
//! - Mock backend with one thread per rank for testing
//! - Extensible Backend trait for MPI or socket transports
//!
//! # Example
//!
//! ```rust
//! use distarray_distributed::prelude::*;
//!
//! let means = World::launch_mock(4, |pg| {
//!     let x = arange(0.0_f64, 10.0, 1.0, &CreationOptions::default(), &pg).unwrap();
//!     x.mean(&ReduceArgs::new()).unwrap().item().unwrap()
//! });
//! assert!(means.iter().all(|&m| m == 4.5));
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Index and size arithmetic allowances
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::manual_let_else)]

pub mod array;
pub mod backend;
pub mod comm;
pub mod config;
pub mod creation;
pub mod distribution;
pub mod process_group;
pub mod reduction;
pub mod topology;

// =============================================================================
// Re-exports
// =============================================================================

pub use array::{DistArray, GlobalProperties};
pub use backend::{Backend, MockBackend};
pub use comm::{
    all_gather_v, all_gather_v_dyn, all_gather_value, all_reduce, all_reduce_along,
    all_to_all, all_to_all_v, barrier, broadcast_array, broadcast_shape, broadcast_tensor,
    broadcast_value, displacements_from_counts, scatter_v,
};
pub use config::RuntimeConfig;
pub use creation::{arange, array, empty, full, ones, zeros, CreationOptions};
pub use distribution::{
    compute_local_partition, compute_range_partition, distribute_array, distribute_range,
    distribute_shape, AxisDist, AxisRule, Distribution, Layout, LocalPartition, LocalToGlobal,
    RangePartition,
};
pub use process_group::{ProcessGroup, World};
pub use reduction::{ReduceArgs, ReduceOp};
pub use topology::{dims_create, ProcessGrid};

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for distributed arrays.
pub mod prelude {
    pub use crate::{
        // Creation
        arange,
        array,
        empty,
        full,
        ones,
        zeros,
        CreationOptions,
        // Containers
        DistArray,
        Distribution,
        AxisDist,
        Layout,
        // Reductions
        ReduceArgs,
        ReduceOp,
        // Communication
        Backend,
        MockBackend,
        ProcessGroup,
        World,
    };
    pub use distarray_core::{DType, Error, ErrorKind, Result};
    pub use distarray_tensor::Tensor;
}
