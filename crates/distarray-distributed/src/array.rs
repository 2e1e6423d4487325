//! Array - Distributed Array Container
//!
//! `DistArray` pairs a process's local buffer with the layout that places it
//! inside the global array and the process group it lives on. The global
//! properties (shape, size, byte count, dimensionality) are resolved once,
//! collectively, when the container is built and are served from that cache
//! afterwards; the `query_global_*` methods recompute them on demand.
//!
//! Elementwise operations act on the local buffer only and need no
//! communication. Reductions, `reshape` and `to_global` are collective.
//!
//! # Example
//! ```rust
//! use distarray_distributed::prelude::*;
//!
//! let sums = World::launch_mock(4, |pg| {
//!     let x = arange(0.0_f64, 10.0, 1.0, &CreationOptions::default(), &pg).unwrap();
//!     x.sum(&ReduceArgs::new()).unwrap().item().unwrap()
//! });
//! assert!(sums.iter().all(|&s| s == 45.0));
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::fmt;
use core::ops::Range;

use tracing::debug;

use distarray_core::dtype::{DType, Numeric, Scalar};
use distarray_core::error::{Error, Result};
use distarray_tensor::shape::{numel, region_shape};
use distarray_tensor::{zeros, Tensor};

use crate::comm::{all_gather_v, all_gather_value};
use crate::distribution::{Distribution, Layout, LocalToGlobal};
use crate::process_group::ProcessGroup;
use crate::reduction::{self, ReduceArgs, ReduceOp};
use crate::topology::ProcessGrid;

// =============================================================================
// Global Properties
// =============================================================================

/// Properties of the whole array, identical on every process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalProperties {
    /// Extents of the global array.
    pub shape: Vec<usize>,
    /// Number of distinct elements.
    pub size: usize,
    /// Bytes held by the distinct elements.
    pub nbytes: usize,
    /// Number of dimensions.
    pub ndim: usize,
}

/// Global extents from every rank's local extents: Block axes are summed
/// along this rank's grid line, other axes keep the local extent.
fn global_shape_from(shapes: &[Vec<usize>], layout: &Layout, rank: usize) -> Vec<usize> {
    let local = &shapes[rank];
    (0..local.len())
        .map(|axis| match layout.grid() {
            Some(grid) if layout.is_distributed(axis) => grid
                .line_ranks(axis)
                .iter()
                .map(|&r| shapes[r][axis])
                .sum(),
            _ => local[axis],
        })
        .collect()
}

/// Element count over ranks holding distinct blocks.
fn distinct_size(counts: &[usize], layout: &Layout) -> usize {
    counts
        .iter()
        .enumerate()
        .filter(|&(rank, _)| layout.owns_distinct_block(rank))
        .map(|(_, &count)| count)
        .sum()
}

/// Resolves the global properties with a single all-gather of local shapes.
///
/// Every rank checks every rank's shape against the layout, so a buffer that
/// does not match its partition fails on all ranks alike.
fn resolve_globals<T: Scalar>(
    local: &Tensor<T>,
    layout: &Layout,
    pg: &ProcessGroup,
) -> Result<GlobalProperties> {
    let shapes = all_gather_value(&local.shape().to_vec(), pg)?;

    for (rank, shape) in shapes.iter().enumerate() {
        let expected = layout.for_rank(rank, pg.size())?;
        if shape.as_slice() != expected.local_shape() {
            return Err(Error::value_error(format!(
                "rank {rank} holds a local buffer of shape {shape:?}, \
                 its partition of {:?} under '{}' is {:?}",
                layout.global_shape(),
                layout.distribution(),
                expected.local_shape()
            )));
        }
    }

    let counts: Vec<usize> = shapes.iter().map(|s| numel(s)).collect();
    let size = distinct_size(&counts, layout);
    Ok(GlobalProperties {
        shape: global_shape_from(&shapes, layout, pg.rank()),
        size,
        nbytes: size * core::mem::size_of::<T>(),
        ndim: local.ndim(),
    })
}

// =============================================================================
// DistArray
// =============================================================================

/// A logically global array partitioned over a process group.
#[derive(Clone)]
pub struct DistArray<T: Numeric> {
    local: Tensor<T>,
    layout: Layout,
    group: ProcessGroup,
    globals: GlobalProperties,
}

impl<T: Numeric> DistArray<T> {
    /// Wraps a local buffer laid out by `layout`. Collective: resolves the
    /// global properties across the group.
    pub fn from_parts(local: Tensor<T>, layout: Layout, group: ProcessGroup) -> Result<Self> {
        let globals = resolve_globals(&local, &layout, &group)?;
        debug!(
            rank = group.rank(),
            dist = %layout.distribution(),
            local_shape = ?local.shape(),
            global_shape = ?globals.shape,
            "constructed distributed array"
        );
        Ok(Self {
            local,
            layout,
            group,
            globals,
        })
    }

    /// Same layout and group with a new local buffer of identical shape.
    fn with_local(&self, local: Tensor<T>) -> Self {
        Self {
            local,
            layout: self.layout.clone(),
            group: self.group.clone(),
            globals: self.globals.clone(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns this process's local buffer.
    #[must_use]
    pub fn local(&self) -> &Tensor<T> {
        &self.local
    }

    /// Returns the layout.
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Returns the process group.
    #[must_use]
    pub fn group(&self) -> &ProcessGroup {
        &self.group
    }

    /// Returns the distribution scheme.
    #[must_use]
    pub fn distribution(&self) -> &Distribution {
        self.layout.distribution()
    }

    /// Returns the process grid, if any axis is Block-distributed.
    #[must_use]
    pub fn grid(&self) -> Option<&ProcessGrid> {
        self.layout.grid()
    }

    /// Returns the global index ranges of the local buffer.
    #[must_use]
    pub fn local_to_global(&self) -> &LocalToGlobal {
        self.layout.local_to_global()
    }

    /// Returns the local extents.
    #[must_use]
    pub fn local_shape(&self) -> &[usize] {
        self.local.shape()
    }

    /// Returns the element type.
    #[must_use]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Returns the cached global properties.
    #[must_use]
    pub fn globals(&self) -> &GlobalProperties {
        &self.globals
    }

    /// Global extents, from the construction-time cache.
    #[must_use]
    pub fn global_shape(&self) -> &[usize] {
        &self.globals.shape
    }

    /// Number of distinct elements, from the construction-time cache.
    #[must_use]
    pub fn global_size(&self) -> usize {
        self.globals.size
    }

    /// Bytes of distinct elements, from the construction-time cache.
    #[must_use]
    pub fn global_nbytes(&self) -> usize {
        self.globals.nbytes
    }

    /// Number of dimensions, from the construction-time cache.
    #[must_use]
    pub fn global_ndim(&self) -> usize {
        self.globals.ndim
    }

    /// Returns the single element of a one-element array.
    ///
    /// Collective when the array is distributed over a grid.
    pub fn item(&self) -> Result<T> {
        if self.globals.size != 1 {
            return Err(Error::invalid_operation(format!(
                "item() needs a single-element array, global size is {}",
                self.globals.size
            )));
        }
        if self.layout.grid().is_none() {
            return self.local.item();
        }
        self.to_global()?.item()
    }

    // =========================================================================
    // Uncached Queries
    // =========================================================================

    /// Recomputes the global shape. Collective.
    pub fn query_global_shape(&self) -> Result<Vec<usize>> {
        let shapes = all_gather_value(&self.local.shape().to_vec(), &self.group)?;
        Ok(global_shape_from(&shapes, &self.layout, self.group.rank()))
    }

    /// Recomputes the number of distinct elements. Collective.
    pub fn query_global_size(&self) -> Result<usize> {
        let counts = all_gather_value(&self.local.numel(), &self.group)?;
        Ok(distinct_size(&counts, &self.layout))
    }

    /// Recomputes the bytes of distinct elements. Collective.
    pub fn query_global_nbytes(&self) -> Result<usize> {
        let counts = all_gather_value(&self.local.nbytes(), &self.group)?;
        Ok(distinct_size(&counts, &self.layout))
    }

    /// Recomputes the dimensionality, checking that every rank agrees.
    /// Collective.
    pub fn query_global_ndim(&self) -> Result<usize> {
        let ndims = all_gather_value(&self.local.ndim(), &self.group)?;
        let ndim = self.local.ndim();
        if let Some(other) = ndims.iter().find(|&&n| n != ndim) {
            return Err(Error::value_error(format!(
                "local buffers disagree on dimensionality: {ndim} and {other}"
            )));
        }
        Ok(ndim)
    }

    // =========================================================================
    // Elementwise Operations
    // =========================================================================

    /// Adds a scalar to every element.
    #[must_use]
    pub fn add_scalar(&self, scalar: T) -> Self {
        self.with_local(self.local.add_scalar(scalar))
    }

    /// Multiplies every element by a scalar.
    #[must_use]
    pub fn mul_scalar(&self, scalar: T) -> Self {
        self.with_local(self.local.mul_scalar(scalar))
    }

    /// Elementwise sum of two arrays with the same layout.
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.layout != other.layout {
            return Err(Error::value_error(format!(
                "cannot add arrays of shape {:?} under '{}' and shape {:?} under '{}'",
                self.global_shape(),
                self.distribution(),
                other.global_shape(),
                other.distribution()
            )));
        }
        Ok(self.with_local(self.local.add(&other.local)?))
    }

    /// Sets every element to `value`, in place.
    pub fn fill(&self, value: T) {
        self.local.fill_(value);
    }

    /// Applies `f` to every element, in place.
    pub fn map_inplace(&self, f: impl Fn(T) -> T) {
        self.local.map_inplace(f);
    }

    // =========================================================================
    // Gathering
    // =========================================================================

    /// Reassembles the full global array on every process. Collective.
    pub fn to_global(&self) -> Result<Tensor<T>> {
        if self.layout.grid().is_none() {
            return Ok(self.local.deep_copy());
        }
        let size = self.group.size();
        let regions = (0..size)
            .map(|rank| {
                let theirs = self.layout.for_rank(rank, size)?;
                Ok(theirs.local_to_global().ranges().to_vec())
            })
            .collect::<Result<Vec<_>>>()?;
        gather_blocks(&self.local, &regions, self.global_shape(), &self.group)
    }

    /// Gives the array a new global shape under the same distribution
    /// scheme. One extent may be `-1` and is inferred. Collective.
    ///
    /// Every process reassembles the global array and keeps only its block
    /// of the reshaped one.
    pub fn reshape(&self, new_shape: &[isize]) -> Result<Self> {
        let global = self.to_global()?.reshape(new_shape)?;
        let layout = Layout::compute(
            global.shape(),
            self.distribution(),
            self.group.rank(),
            self.group.size(),
        )?;
        let local = global.region(layout.local_to_global().ranges())?;
        Self::from_parts(local, layout, self.group.clone())
    }

    // =========================================================================
    // Reductions
    // =========================================================================

    /// Global sum. See [`reduction::reduce`].
    pub fn sum(&self, args: &ReduceArgs) -> Result<Self> {
        reduction::reduce(self, ReduceOp::Sum, args)
    }

    /// Global product.
    pub fn prod(&self, args: &ReduceArgs) -> Result<Self> {
        reduction::reduce(self, ReduceOp::Product, args)
    }

    /// Global minimum.
    pub fn min(&self, args: &ReduceArgs) -> Result<Self> {
        reduction::reduce(self, ReduceOp::Min, args)
    }

    /// Global maximum.
    pub fn max(&self, args: &ReduceArgs) -> Result<Self> {
        reduction::reduce(self, ReduceOp::Max, args)
    }

    /// Global arithmetic mean, in `f64`.
    pub fn mean(&self, args: &ReduceArgs) -> Result<DistArray<f64>> {
        reduction::mean(self, args)
    }

    /// Global standard deviation. Not implemented.
    pub fn std(&self, args: &ReduceArgs) -> Result<DistArray<f64>> {
        reduction::std(self, args)
    }

    /// Global reduction with an arbitrary operation.
    pub fn reduce(&self, op: ReduceOp, args: &ReduceArgs) -> Result<Self> {
        reduction::reduce(self, op, args)
    }
}

impl<T: Numeric> fmt::Debug for DistArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistArray")
            .field("rank", &self.group.rank())
            .field("layout", &self.layout)
            .field("local", &self.local)
            .field("globals", &self.globals)
            .finish()
    }
}

impl<T: Numeric> fmt::Display for DistArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DistArray(global_size={}, global_shape={:?}, dist={}, dtype={})",
            self.globals.size,
            self.globals.shape,
            self.layout.distribution(),
            T::DTYPE
        )
    }
}

// =============================================================================
// Block Reassembly
// =============================================================================

/// Gathers every rank's block and writes each into its region of a
/// `global_shape` buffer, on every rank.
///
/// `regions[r]` is the global region held by rank `r`. Overlapping regions
/// must carry equal values.
pub(crate) fn gather_blocks<T: Numeric>(
    block: &Tensor<T>,
    regions: &[Vec<Range<usize>>],
    global_shape: &[usize],
    pg: &ProcessGroup,
) -> Result<Tensor<T>> {
    let flat = all_gather_v(&block.flatten(), None, pg)?.to_vec();
    let global = zeros::<T>(global_shape);

    let mut offset = 0;
    for region in regions {
        let shape = region_shape(region);
        let len = numel(&shape);
        let Some(chunk) = flat.get(offset..offset + len) else {
            return Err(Error::internal(format!(
                "gathered {} elements, block at offset {offset} needs {len}",
                flat.len()
            )));
        };
        global.write_region(region, &Tensor::from_slice(chunk, &shape)?)?;
        offset += len;
    }
    Ok(global)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::distribute_array;
    use crate::process_group::World;
    use distarray_core::ErrorKind;

    fn distributed(global: &Tensor<f64>, dist: &Distribution, pg: &ProcessGroup) -> DistArray<f64> {
        let data = pg.is_root(0).then_some(global);
        let (local, layout) = distribute_array(data, dist, 0, pg).unwrap();
        DistArray::from_parts(local, layout, pg.clone()).unwrap()
    }

    fn grid_5x4() -> Tensor<f64> {
        Tensor::from_vec((0..20).map(f64::from).collect(), &[5, 4]).unwrap()
    }

    #[test]
    fn test_globals_block_2d() {
        let results = World::launch_mock(4, |pg| {
            let x = distributed(&grid_5x4(), &Distribution::block(), &pg);
            (x.globals().clone(), x.local_shape().to_vec())
        });
        for (globals, _) in &results {
            assert_eq!(globals.shape, vec![5, 4]);
            assert_eq!(globals.size, 20);
            assert_eq!(globals.nbytes, 160);
            assert_eq!(globals.ndim, 2);
        }
        assert_eq!(results[0].1, vec![3, 2]);
        assert_eq!(results[3].1, vec![2, 2]);
    }

    #[test]
    fn test_globals_replicated_count_once() {
        let results = World::launch_mock(3, |pg| {
            let x = distributed(&grid_5x4(), &Distribution::Undistributed, &pg);
            (x.global_shape().to_vec(), x.global_size(), x.query_global_size().unwrap())
        });
        for (shape, size, queried) in results {
            assert_eq!(shape, vec![5, 4]);
            assert_eq!(size, 20);
            assert_eq!(queried, 20);
        }
    }

    #[test]
    fn test_uncached_queries_match_cache() {
        let results = World::launch_mock(4, |pg| {
            let dist: Distribution = "(*, b)".parse().unwrap();
            let x = distributed(&grid_5x4(), &dist, &pg);
            (
                x.query_global_shape().unwrap() == x.global_shape(),
                x.query_global_nbytes().unwrap() == x.global_nbytes(),
                x.query_global_ndim().unwrap() == x.global_ndim(),
            )
        });
        assert!(results.iter().all(|&r| r == (true, true, true)));
    }

    #[test]
    fn test_from_parts_rejects_wrong_local_shape() {
        let results = World::launch_mock(2, |pg| {
            let layout = Layout::compute(&[4], &Distribution::block(), pg.rank(), 2).unwrap();
            let len = if pg.rank() == 1 { 3 } else { 2 };
            DistArray::from_parts(zeros::<i32>(&[len]), layout, pg.clone()).map(|_| ())
        });
        for result in results {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::Value);
        }
    }

    #[test]
    fn test_to_global_round_trip() {
        for dist in ["b", "(b, *)", "(*, b)", "u"] {
            let dist: Distribution = dist.parse().unwrap();
            let results = World::launch_mock(4, |pg| {
                distributed(&grid_5x4(), &dist, &pg).to_global().unwrap().to_vec()
            });
            for gathered in results {
                assert_eq!(gathered, grid_5x4().to_vec(), "dist {dist}");
            }
        }
    }

    #[test]
    fn test_reshape_redistributes() {
        let results = World::launch_mock(4, |pg| {
            let x = distributed(&grid_5x4(), &Distribution::block(), &pg);
            let y = x.reshape(&[-1]).unwrap();
            (y.local().to_vec(), y.global_shape().to_vec(), y.to_global().unwrap().to_vec())
        });
        assert_eq!(results[0].0, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(results[3].0, vec![15.0, 16.0, 17.0, 18.0, 19.0]);
        for (_, shape, gathered) in results {
            assert_eq!(shape, vec![20]);
            assert_eq!(gathered, grid_5x4().to_vec());
        }
    }

    #[test]
    fn test_reshape_errors_everywhere() {
        let results = World::launch_mock(2, |pg| {
            let x = distributed(&grid_5x4(), &Distribution::block(), &pg);
            let bad_size = x.reshape(&[3, 7]).map(|_| ());
            let dist: Distribution = "(b, *)".parse().unwrap();
            let y = distributed(&grid_5x4(), &dist, &pg);
            let bad_arity = y.reshape(&[20]).map(|_| ());
            (bad_size, bad_arity)
        });
        for (bad_size, bad_arity) in results {
            assert!(bad_size.is_err());
            assert_eq!(bad_arity.unwrap_err().kind(), ErrorKind::InvalidDistribution);
        }
    }

    #[test]
    fn test_elementwise_local_only() {
        let results = World::launch_mock(2, |pg| {
            let x = distributed(&grid_5x4(), &Distribution::block(), &pg);
            let y = x.add_scalar(1.0).mul_scalar(2.0);
            let z = y.add(&x).unwrap();
            z.map_inplace(|v| v - 2.0);
            z.to_global().unwrap().to_vec()
        });
        let expected: Vec<f64> = (0..20).map(|v| 3.0 * f64::from(v)).collect();
        assert!(results.iter().all(|r| r == &expected));
    }

    #[test]
    fn test_add_layout_mismatch() {
        let results = World::launch_mock(2, |pg| {
            let x = distributed(&grid_5x4(), &Distribution::block(), &pg);
            let y = distributed(&grid_5x4(), &Distribution::Undistributed, &pg);
            x.add(&y).map(|_| ())
        });
        for result in results {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::Value);
        }
    }

    #[test]
    fn test_fill_shares_storage() {
        let results = World::launch_mock(2, |pg| {
            let x = distributed(&grid_5x4(), &Distribution::block(), &pg);
            let alias = x.clone();
            alias.fill(7.0);
            x.local().to_vec()
        });
        assert!(results.iter().flatten().all(|&v| v == 7.0));
    }

    #[test]
    fn test_display() {
        let results = World::launch_mock(2, |pg| {
            distributed(&grid_5x4(), &Distribution::block(), &pg).to_string()
        });
        assert_eq!(
            results[0],
            "DistArray(global_size=20, global_shape=[5, 4], dist=b, dtype=f64)"
        );
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn test_item() {
        let results = World::launch_mock(3, |pg| {
            let x = distributed(&Tensor::from_vec(vec![9.0], &[1]).unwrap(), &Distribution::block(), &pg);
            x.item().unwrap()
        });
        assert_eq!(results, vec![9.0; 3]);

        let results = World::launch_mock(2, |pg| {
            distributed(&grid_5x4(), &Distribution::block(), &pg).item().map(|_| ())
        });
        assert!(results.iter().all(Result::is_err));
    }
}
