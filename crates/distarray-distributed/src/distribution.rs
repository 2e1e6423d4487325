//! Distribution - Partitioning Strategy
//!
//! Decides which slice of a global array each process holds. A
//! `Distribution` names one rule per axis; the rules are looked up in a
//! small strategy table (`AxisRule`) that answers two questions per axis:
//! which global indices a grid slot owns, and whether partial results along
//! that axis must be combined across processes.
//!
//! The partition is a pure function of the global shape, the distribution
//! and the group size, so any rank can compute any other rank's slice
//! without communicating.
//!
//! # Example
//! ```rust
//! use distarray_distributed::distribution::{Distribution, Layout};
//!
//! let dist: Distribution = "(b, *)".parse().unwrap();
//! let layout = Layout::compute(&[10, 3], &dist, 1, 4).unwrap();
//! assert_eq!(layout.local_shape(), &[3, 3]);
//! assert_eq!(layout.local_to_global().axis(0), 3..6);
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::fmt;
use core::ops::Range;
use core::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use distarray_core::dtype::{Numeric, Scalar};
use distarray_core::error::{Error, Result};
use distarray_tensor::{arange_len, arange_window, Tensor};

use crate::comm::{broadcast_shape, broadcast_tensor, broadcast_value, scatter_v};
use crate::process_group::ProcessGroup;
use crate::topology::{block_range, dims_create, ProcessGrid};

// =============================================================================
// Axis Distributions
// =============================================================================

/// How a single axis is spread over the process grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisDist {
    /// Contiguous, nearly equal chunks along one grid dimension.
    Block,
    /// The full axis on every process.
    Replicated,
}

impl AxisDist {
    /// Parses a single axis tag.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "b" | "block" => Ok(Self::Block),
            "*" | "r" | "replicated" => Ok(Self::Replicated),
            other => Err(Error::invalid_distribution(format!(
                "unrecognized axis tag '{other}' (expected 'b' or '*')"
            ))),
        }
    }

    /// Returns the short tag for this axis rule.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Block => "b",
            Self::Replicated => "*",
        }
    }

    /// Returns the strategy-table entry for this axis rule.
    #[must_use]
    pub fn rule(self) -> &'static dyn AxisRule {
        match self {
            Self::Block => &BlockRule,
            Self::Replicated => &ReplicatedRule,
        }
    }
}

// =============================================================================
// Strategy Table
// =============================================================================

/// Per-axis partitioning and combination rule.
pub trait AxisRule: Sync {
    /// Global index range owned by grid slot `coord` of `parts` on an axis of
    /// extent `extent`.
    fn partition(&self, extent: usize, parts: usize, coord: usize) -> Range<usize>;

    /// Whether the axis is split across processes, so that partial results
    /// along it must be combined over the grid line.
    fn is_distributed(&self) -> bool;

    /// Whether the axis takes a dimension of the process grid.
    fn takes_grid_dim(&self) -> bool {
        self.is_distributed()
    }
}

struct BlockRule;

impl AxisRule for BlockRule {
    fn partition(&self, extent: usize, parts: usize, coord: usize) -> Range<usize> {
        block_range(extent, parts, coord)
    }

    fn is_distributed(&self) -> bool {
        true
    }
}

struct ReplicatedRule;

impl AxisRule for ReplicatedRule {
    fn partition(&self, extent: usize, _parts: usize, _coord: usize) -> Range<usize> {
        0..extent
    }

    fn is_distributed(&self) -> bool {
        false
    }
}

// =============================================================================
// Distribution
// =============================================================================

/// A distribution scheme for a whole array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distribution {
    /// Every process holds a full copy.
    Undistributed,
    /// The same rule on every axis.
    Uniform(AxisDist),
    /// One rule per axis; the count must match the array's dimensionality.
    Axes(Vec<AxisDist>),
}

impl Default for Distribution {
    fn default() -> Self {
        Self::Uniform(AxisDist::Block)
    }
}

impl Distribution {
    /// Block on every axis.
    #[must_use]
    pub const fn block() -> Self {
        Self::Uniform(AxisDist::Block)
    }

    /// Builds a per-axis scheme from tags such as `["b", "*"]`.
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Result<Self> {
        tags.iter()
            .map(|tag| AxisDist::from_tag(tag.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(Self::Axes)
    }

    /// Returns true for the `Undistributed` scheme.
    #[must_use]
    pub fn is_undistributed(&self) -> bool {
        matches!(self, Self::Undistributed)
    }

    /// Expands the scheme to one rule per axis of an `ndim`-dimensional
    /// array. `Undistributed` expands to all-replicated.
    pub fn resolve(&self, ndim: usize) -> Result<Vec<AxisDist>> {
        match self {
            Self::Undistributed => Ok(vec![AxisDist::Replicated; ndim]),
            Self::Uniform(axis) => Ok(vec![*axis; ndim]),
            Self::Axes(axes) if axes.len() == ndim => Ok(axes.clone()),
            Self::Axes(axes) => Err(Error::invalid_distribution(format!(
                "{self} names {} axes, array has {ndim}",
                axes.len()
            ))),
        }
    }
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Some(inner) = trimmed.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            let tags: Vec<&str> = inner
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect();
            return Self::from_tags(&tags);
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "u" | "undistributed" => Ok(Self::Undistributed),
            _ => AxisDist::from_tag(trimmed).map(Self::Uniform).map_err(|_| {
                Error::invalid_distribution(format!("unrecognized distribution '{trimmed}'"))
            }),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undistributed => write!(f, "u"),
            Self::Uniform(axis) => write!(f, "{}", axis.tag()),
            Self::Axes(axes) => {
                let tags: Vec<_> = axes.iter().map(|a| a.tag()).collect();
                write!(f, "({})", tags.join(","))
            }
        }
    }
}

// =============================================================================
// Local-to-Global Map
// =============================================================================

/// Per-axis half-open global index interval held by one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalToGlobal(Vec<Range<usize>>);

impl LocalToGlobal {
    /// Wraps per-axis ranges.
    #[must_use]
    pub fn new(ranges: Vec<Range<usize>>) -> Self {
        Self(ranges)
    }

    /// Returns the range for `axis`.
    ///
    /// # Panics
    /// Panics if `axis` is out of bounds.
    #[must_use]
    pub fn axis(&self, axis: usize) -> Range<usize> {
        self.0[axis].clone()
    }

    /// Returns all per-axis ranges.
    #[must_use]
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.0
    }

    /// Returns the extents of the local block.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.0.iter().map(ExactSizeIterator::len).collect()
    }
}

// =============================================================================
// Partitions and Layouts
// =============================================================================

/// One process's share of a global array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPartition {
    /// Extents of the local buffer.
    pub local_shape: Vec<usize>,
    /// Process grid, present when at least one axis is Block-distributed.
    pub grid: Option<ProcessGrid>,
    /// Global index ranges of the local buffer.
    pub local_to_global: LocalToGlobal,
}

/// A distribution scheme together with the partition it yields on one rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    distribution: Distribution,
    axes: Vec<AxisDist>,
    global_shape: Vec<usize>,
    partition: LocalPartition,
}

impl Layout {
    /// Computes the layout of `global_shape` under `distribution` as seen
    /// from `rank` of a group of `size` processes.
    ///
    /// The process grid has one dimension per array axis; Block axes share
    /// the balanced factors of `size` and every other axis gets 1.
    pub fn compute(
        global_shape: &[usize],
        distribution: &Distribution,
        rank: usize,
        size: usize,
    ) -> Result<Self> {
        let axes = distribution.resolve(global_shape.len())?;
        let split = axes.iter().filter(|a| a.rule().takes_grid_dim()).count();

        let grid = if split == 0 {
            None
        } else {
            let mut factors = dims_create(size, split).into_iter();
            let dims: Vec<usize> = axes
                .iter()
                .map(|a| {
                    if a.rule().takes_grid_dim() {
                        factors.next().unwrap_or(1)
                    } else {
                        1
                    }
                })
                .collect();
            Some(ProcessGrid::for_rank(dims, rank)?)
        };

        let ranges: Vec<Range<usize>> = axes
            .iter()
            .enumerate()
            .map(|(axis, dist)| match &grid {
                Some(grid) => dist
                    .rule()
                    .partition(global_shape[axis], grid.dims()[axis], grid.coord()[axis]),
                None => dist.rule().partition(global_shape[axis], 1, 0),
            })
            .collect();

        let local_to_global = LocalToGlobal::new(ranges);
        let partition = LocalPartition {
            local_shape: local_to_global.shape(),
            grid,
            local_to_global,
        };

        Ok(Self {
            distribution: distribution.clone(),
            axes,
            global_shape: global_shape.to_vec(),
            partition,
        })
    }

    /// Recomputes this layout as seen from another rank.
    pub fn for_rank(&self, rank: usize, size: usize) -> Result<Self> {
        Self::compute(&self.global_shape, &self.distribution, rank, size)
    }

    /// Returns the distribution scheme.
    #[must_use]
    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    /// Returns the resolved per-axis rules.
    #[must_use]
    pub fn axes(&self) -> &[AxisDist] {
        &self.axes
    }

    /// Returns the global shape this layout was computed for.
    #[must_use]
    pub fn global_shape(&self) -> &[usize] {
        &self.global_shape
    }

    /// Returns the local extents.
    #[must_use]
    pub fn local_shape(&self) -> &[usize] {
        &self.partition.local_shape
    }

    /// Returns the process grid, if any axis is Block-distributed.
    #[must_use]
    pub fn grid(&self) -> Option<&ProcessGrid> {
        self.partition.grid.as_ref()
    }

    /// Returns the local-to-global index map.
    #[must_use]
    pub fn local_to_global(&self) -> &LocalToGlobal {
        &self.partition.local_to_global
    }

    /// Returns the partition on this rank.
    #[must_use]
    pub fn partition(&self) -> &LocalPartition {
        &self.partition
    }

    /// Whether partial results along `axis` must be combined across the grid.
    #[must_use]
    pub fn is_distributed(&self, axis: usize) -> bool {
        self.axes.get(axis).is_some_and(|a| a.rule().is_distributed()) && self.grid().is_some()
    }

    /// Whether this rank holds a distinct block of the global array, so
    /// that per-rank quantities summed over such ranks count every element
    /// once.
    #[must_use]
    pub fn owns_distinct_block(&self, rank: usize) -> bool {
        self.grid().is_some() || rank == 0
    }
}

// =============================================================================
// Partition Operations
// =============================================================================

/// Computes this process's partition of `global_shape`.
pub fn compute_local_partition(
    global_shape: &[usize],
    distribution: &Distribution,
    pg: &ProcessGroup,
) -> Result<LocalPartition> {
    let layout = Layout::compute(global_shape, distribution, pg.rank(), pg.size())?;
    debug!(
        rank = pg.rank(),
        ?global_shape,
        dist = %distribution,
        local_shape = ?layout.local_shape(),
        "computed local partition"
    );
    Ok(layout.partition)
}

/// One process's share of an arithmetic range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangePartition<T: Scalar> {
    /// Number of elements in the whole range.
    pub global_len: usize,
    /// First local element.
    pub local_start: T,
    /// Exclusive end of the local elements.
    pub local_stop: T,
    /// Step between elements.
    pub local_step: T,
    /// Layout of the 1-D range.
    pub layout: Layout,
}

impl<T: Numeric> RangePartition<T> {
    /// Materializes the local elements.
    pub fn to_tensor(&self) -> Result<Tensor<T>> {
        let window = self.layout.local_to_global().axis(0);
        let data = arange_window(self.local_start, self.local_step, 0, window.len())?;
        Tensor::from_vec(data, &[window.len()])
    }
}

/// Partitions the range `[start, stop)` stepping by `step`.
///
/// The element count is partitioned like a 1-D array, and each process's
/// bounds are derived from its index window.
pub fn compute_range_partition<T: Numeric>(
    start: T,
    stop: T,
    step: T,
    distribution: &Distribution,
    pg: &ProcessGroup,
) -> Result<RangePartition<T>> {
    let global_len = arange_len(start, stop, step)?;
    let layout = Layout::compute(&[global_len], distribution, pg.rank(), pg.size())?;
    let window = layout.local_to_global().axis(0);

    // The window past the last element ends at the range's own stop.
    let element = |index: usize| -> Result<T> {
        if index >= global_len {
            return Ok(stop);
        }
        arange_window(start, step, index, 1)?
            .first()
            .copied()
            .ok_or_else(|| Error::internal(format!("range element {index} was not generated")))
    };
    let local_start = element(window.start)?;
    let local_stop = element(window.end)?;

    debug!(rank = pg.rank(), global_len, ?window, "computed range partition");
    Ok(RangePartition {
        global_len,
        local_start,
        local_stop,
        local_step: step,
        layout,
    })
}

// =============================================================================
// Root-Resolved Distribution
// =============================================================================

/// Broadcasts the root's shape, then computes this process's layout.
///
/// Non-root ranks may pass `None`.
pub fn distribute_shape(
    shape: Option<&[usize]>,
    distribution: &Distribution,
    root: usize,
    pg: &ProcessGroup,
) -> Result<Layout> {
    let shape = broadcast_shape(shape, root, pg)?;
    Layout::compute(&shape, distribution, pg.rank(), pg.size())
}

/// Broadcasts the root's `(start, stop, step)`, then partitions the range.
///
/// Non-root ranks may pass `None`.
pub fn distribute_range<T>(
    range: Option<(T, T, T)>,
    distribution: &Distribution,
    root: usize,
    pg: &ProcessGroup,
) -> Result<RangePartition<T>>
where
    T: Numeric + Serialize + DeserializeOwned,
{
    let (start, stop, step) = broadcast_value(range.as_ref(), root, pg)?;
    compute_range_partition(start, stop, step, distribution, pg)
}

/// Distributes the root's array: every process receives its own block.
///
/// Non-root ranks may pass `None`. `Undistributed` and fully replicated
/// schemes broadcast the whole array instead.
pub fn distribute_array<T: Scalar>(
    data: Option<&Tensor<T>>,
    distribution: &Distribution,
    root: usize,
    pg: &ProcessGroup,
) -> Result<(Tensor<T>, Layout)> {
    let data = data.filter(|_| pg.is_root(root));
    let layout = distribute_shape(data.map(Tensor::shape), distribution, root, pg)?;

    if layout.grid().is_none() {
        let local = broadcast_tensor(data, root, pg)?;
        return Ok((local, layout));
    }

    let (packed, shapes) = match data {
        Some(global) => {
            let (packed, shapes) = pack_blocks(global, &layout, pg.size())?;
            (Some(packed), Some(shapes))
        }
        None => (None, None),
    };

    let local = scatter_v(packed.as_ref(), None, shapes.as_deref(), root, pg)?;
    debug!(rank = pg.rank(), local_shape = ?local.shape(), "distributed array");
    Ok((local, layout))
}

/// Concatenates every rank's block of `global`, in rank order.
fn pack_blocks<T: Scalar>(
    global: &Tensor<T>,
    layout: &Layout,
    size: usize,
) -> Result<(Tensor<T>, Vec<Vec<usize>>)> {
    let mut packed = Vec::with_capacity(global.numel());
    let mut shapes = Vec::with_capacity(size);
    for rank in 0..size {
        let theirs = layout.for_rank(rank, size)?;
        let block = global.region(theirs.local_to_global().ranges())?;
        packed.extend(block.to_vec());
        shapes.push(theirs.local_shape().to_vec());
    }
    let len = packed.len();
    Ok((Tensor::from_vec(packed, &[len])?, shapes))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process_group::World;
    use distarray_core::ErrorKind;

    #[test]
    fn test_parse_shorthand() {
        assert_eq!("b".parse::<Distribution>().unwrap(), Distribution::block());
        assert_eq!(
            "Block".parse::<Distribution>().unwrap(),
            Distribution::Uniform(AxisDist::Block)
        );
        assert_eq!(
            "u".parse::<Distribution>().unwrap(),
            Distribution::Undistributed
        );
        assert_eq!(
            "*".parse::<Distribution>().unwrap(),
            Distribution::Uniform(AxisDist::Replicated)
        );
    }

    #[test]
    fn test_parse_tuple() {
        let dist: Distribution = "(b, *)".parse().unwrap();
        assert_eq!(
            dist,
            Distribution::Axes(vec![AxisDist::Block, AxisDist::Replicated])
        );
        assert_eq!(dist.to_string(), "(b,*)");
        assert_eq!(Distribution::from_tags(&["*", "b"]).unwrap().to_string(), "(*,b)");
    }

    #[test]
    fn test_parse_unrecognized() {
        let err = "bananas".parse::<Distribution>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDistribution);
        assert!(err.to_string().contains("bananas"));

        let err = "(b, x)".parse::<Distribution>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDistribution);
    }

    #[test]
    fn test_resolve_arity() {
        let dist = Distribution::Axes(vec![AxisDist::Block, AxisDist::Replicated]);
        assert_eq!(dist.resolve(2).unwrap().len(), 2);
        assert_eq!(
            dist.resolve(1).unwrap_err().kind(),
            ErrorKind::InvalidDistribution
        );
        assert_eq!(Distribution::block().resolve(3).unwrap().len(), 3);
    }

    #[test]
    fn test_layout_block_1d_uneven() {
        let locals: Vec<_> = (0..4)
            .map(|r| {
                let layout = Layout::compute(&[10], &Distribution::block(), r, 4).unwrap();
                layout.local_to_global().axis(0)
            })
            .collect();
        assert_eq!(locals, vec![0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn test_layout_block_2d_grid() {
        let layout = Layout::compute(&[5, 4], &Distribution::block(), 3, 4).unwrap();
        let grid = layout.grid().unwrap();
        assert_eq!(grid.dims(), &[2, 2]);
        assert_eq!(grid.coord(), &[1, 1]);
        assert_eq!(layout.local_to_global().ranges(), &[3..5, 2..4]);
        assert_eq!(layout.local_shape(), &[2, 2]);
    }

    #[test]
    fn test_layout_mixed_axes() {
        let dist: Distribution = "(*, b)".parse().unwrap();
        let layout = Layout::compute(&[3, 8], &dist, 2, 4).unwrap();
        assert_eq!(layout.grid().unwrap().dims(), &[1, 4]);
        assert_eq!(layout.local_to_global().ranges(), &[0..3, 4..6]);
        assert!(!layout.is_distributed(0));
        assert!(layout.is_distributed(1));
    }

    #[test]
    fn test_layout_undistributed() {
        let layout = Layout::compute(&[3, 8], &Distribution::Undistributed, 2, 4).unwrap();
        assert!(layout.grid().is_none());
        assert_eq!(layout.local_shape(), &[3, 8]);
        assert!(!layout.is_distributed(0));
        assert!(layout.owns_distinct_block(0));
        assert!(!layout.owns_distinct_block(2));
    }

    #[test]
    fn test_partition_coverage() {
        for &(n, p) in &[(10usize, 4usize), (3, 4), (0, 3), (7, 7), (100, 6)] {
            let mut covered = Vec::new();
            for r in 0..p {
                let layout = Layout::compute(&[n], &Distribution::block(), r, p).unwrap();
                covered.extend(layout.local_to_global().axis(0));
            }
            assert_eq!(covered, (0..n).collect::<Vec<_>>(), "n={n} p={p}");
        }
    }

    #[test]
    fn test_range_partition() {
        let results = World::launch_mock(4, |pg| {
            let part = compute_range_partition(0_i64, 20, 2, &Distribution::block(), &pg).unwrap();
            (part.global_len, part.local_start, part.local_stop, part.to_tensor().unwrap().to_vec())
        });
        assert_eq!(results[0], (10, 0, 6, vec![0, 2, 4]));
        assert_eq!(results[1], (10, 6, 12, vec![6, 8, 10]));
        assert_eq!(results[3], (10, 16, 20, vec![16, 18]));
    }

    #[test]
    fn test_range_partition_at_type_edge() {
        let results = World::launch_mock(2, |pg| {
            let part = compute_range_partition(0_u8, 255, 2, &Distribution::block(), &pg).unwrap();
            let local = part.to_tensor().unwrap().to_vec();
            (part.local_start, part.local_stop, local.len(), local.last().copied())
        });
        assert_eq!(results[0], (0, 128, 64, Some(126)));
        assert_eq!(results[1], (128, 255, 64, Some(254)));
    }

    #[test]
    fn test_distribute_array_block() {
        let results = World::launch_mock(4, |pg| {
            let global = Tensor::<f64>::from_vec((0..20).map(f64::from).collect(), &[5, 4]).unwrap();
            let data = pg.is_root(0).then_some(&global);
            let (local, layout) = distribute_array(data, &Distribution::block(), 0, &pg).unwrap();
            let expected = global.region(layout.local_to_global().ranges()).unwrap();
            (local.to_vec(), expected.to_vec())
        });
        for (local, expected) in results {
            assert_eq!(local, expected);
        }
    }

    #[test]
    fn test_distribute_array_undistributed() {
        let results = World::launch_mock(3, |pg| {
            let global = Tensor::<i32>::from_vec(vec![1, 2, 3], &[3]).unwrap();
            let data = pg.is_root(2).then_some(&global);
            distribute_array(data, &Distribution::Undistributed, 2, &pg)
                .unwrap()
                .0
                .to_vec()
        });
        assert!(results.iter().all(|local| local == &[1, 2, 3]));
    }

    #[test]
    fn test_distribute_shape_arity_error_everywhere() {
        let results = World::launch_mock(2, |pg| {
            let dist = Distribution::from_tags(&["b", "*"]).unwrap();
            let shape = [6usize];
            distribute_shape(pg.is_root(0).then_some(&shape[..]), &dist, 0, &pg)
        });
        for result in results {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidDistribution);
        }
    }
}
