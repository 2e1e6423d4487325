//! Reduction - Distributed Reduction Engine
//!
//! Computes global aggregates of a distributed array from per-process
//! partial results. Each process first folds its local buffer, then the
//! partials are combined only along axes that the strategy table marks as
//! distributed. Results are always returned undistributed: every process
//! holds the complete answer.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use tracing::debug;

use distarray_core::dtype::Numeric;
use distarray_core::error::{Error, Result};
use distarray_tensor::{DynTensor, Tensor};

use crate::array::{gather_blocks, DistArray};
use crate::comm::{all_reduce, all_reduce_along};
use crate::distribution::{Distribution, Layout};
use crate::process_group::ProcessGroup;

// =============================================================================
// Reduce Operations
// =============================================================================

/// Reduction operation for collective communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Sum all values.
    Sum,
    /// Compute product of all values.
    Product,
    /// Find minimum value.
    Min,
    /// Find maximum value.
    Max,
}

impl ReduceOp {
    /// Returns the identity element, used to fold empty partitions.
    #[must_use]
    pub fn identity<T: Numeric>(self) -> T {
        match self {
            Self::Sum => T::ZERO,
            Self::Product => T::ONE,
            Self::Min => T::max_value(),
            Self::Max => T::min_value(),
        }
    }

    /// Combines two values. Integer sums and products wrap on overflow.
    #[must_use]
    pub fn apply<T: Numeric>(self, a: T, b: T) -> T {
        match self {
            Self::Sum => a.wrapping_sum(b),
            Self::Product => a.wrapping_product(b),
            Self::Min => {
                if b < a {
                    b
                } else {
                    a
                }
            }
            Self::Max => {
                if b > a {
                    b
                } else {
                    a
                }
            }
        }
    }

    /// Returns the operation's name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Product => "prod",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

// =============================================================================
// Reduction Arguments
// =============================================================================

/// Optional parameters of a reduction.
#[derive(Debug, Clone, Default)]
pub struct ReduceArgs {
    /// Axis to reduce along; `None` reduces the whole array.
    pub axis: Option<usize>,
    /// Caller-provided output buffer. Not supported; present so that the
    /// request is rejected explicitly instead of ignored.
    pub out: Option<DynTensor>,
}

impl ReduceArgs {
    /// Reduces the whole array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reduces along `axis`.
    #[must_use]
    pub fn axis(mut self, axis: usize) -> Self {
        self.axis = Some(axis);
        self
    }

    /// Requests the result in `out`.
    #[must_use]
    pub fn out(mut self, out: impl Into<DynTensor>) -> Self {
        self.out = Some(out.into());
        self
    }

    fn validate(&self, ndim: usize) -> Result<()> {
        if let Some(axis) = self.axis {
            if axis >= ndim {
                return Err(Error::value_error(format!(
                    "axis {axis} is out of bounds for array of dimension {ndim}"
                )));
            }
        }
        if self.out.is_some() {
            return Err(Error::not_supported(
                "an explicit 'out' buffer is not supported by distributed reductions",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Reduces a local buffer laid out by `layout`, returning the complete
/// result on every process.
fn reduce_parts<T: Numeric>(
    local: &Tensor<T>,
    layout: &Layout,
    op: ReduceOp,
    axis: Option<usize>,
    pg: &ProcessGroup,
) -> Result<Tensor<T>> {
    let Some(axis) = axis else {
        let partial = Tensor::scalar(local.fold(op.identity(), |a, b| op.apply(a, b)));
        if layout.grid().is_none() {
            return Ok(partial);
        }
        return all_reduce(&partial, op, pg);
    };

    let mut partial = local.fold_axis(axis, op.identity(), |a, b| op.apply(a, b))?;
    let Some(grid) = layout.grid() else {
        return Ok(partial);
    };

    if layout.is_distributed(axis) {
        partial = all_reduce_along(grid, axis, &partial, op, pg)?;
    }

    // Reassemble whatever Block axes survive the fold.
    let mut out_shape = layout.global_shape().to_vec();
    out_shape.remove(axis);
    let regions = (0..pg.size())
        .map(|rank| {
            let mut ranges = layout.for_rank(rank, pg.size())?.local_to_global().ranges().to_vec();
            ranges.remove(axis);
            Ok(ranges)
        })
        .collect::<Result<Vec<_>>>()?;
    gather_blocks(&partial, &regions, &out_shape, pg)
}

fn wrap_result<T: Numeric>(result: Tensor<T>, pg: &ProcessGroup) -> Result<DistArray<T>> {
    let layout = Layout::compute(result.shape(), &Distribution::Undistributed, pg.rank(), pg.size())?;
    DistArray::from_parts(result, layout, pg.clone())
}

/// Reduces `array` with `op`, over the whole array or along `args.axis`.
///
/// The result is an undistributed array holding the complete answer on
/// every process.
pub fn reduce<T: Numeric>(array: &DistArray<T>, op: ReduceOp, args: &ReduceArgs) -> Result<DistArray<T>> {
    args.validate(array.global_ndim())?;

    // Global properties agree on every rank, so this fails everywhere or nowhere.
    let reduced_extent = args.axis.map_or(array.global_size(), |axis| array.global_shape()[axis]);
    if matches!(op, ReduceOp::Min | ReduceOp::Max) && reduced_extent == 0 {
        return Err(Error::value_error(format!(
            "zero-size {} reduction has no identity",
            op.name()
        )));
    }

    let pg = array.group();
    let result = reduce_parts(array.local(), array.layout(), op, args.axis, pg)?;
    debug!(
        rank = pg.rank(),
        op = op.name(),
        axis = ?args.axis,
        result_shape = ?result.shape(),
        "reduced"
    );
    wrap_result(result, pg)
}

/// Arithmetic mean over the whole array or along `args.axis`, in `f64`.
///
/// The divisor is the global extent of the reduced axis (or the global size),
/// so uneven partitions do not bias the result.
pub fn mean<T: Numeric>(array: &DistArray<T>, args: &ReduceArgs) -> Result<DistArray<f64>> {
    args.validate(array.global_ndim())?;

    let pg = array.group();
    let widened = array.local().map_to(T::to_f64_lossy);
    let sums = reduce_parts(&widened, array.layout(), ReduceOp::Sum, args.axis, pg)?;

    let count = match args.axis {
        Some(axis) => array.global_shape()[axis],
        None => array.global_size(),
    } as f64;
    wrap_result(sums.map(|s| s / count), pg)
}

/// Standard deviation. No cross-process combination rule is defined yet.
pub fn std<T: Numeric>(array: &DistArray<T>, args: &ReduceArgs) -> Result<DistArray<f64>> {
    args.validate(array.global_ndim())?;
    Err(Error::not_implemented(
        "std has no distributed implementation",
    ))
}

/// Reduction with a caller-supplied combine function. Arbitrary functions
/// cannot be combined across processes, so this always fails once the
/// arguments have been checked.
pub fn reduce_custom<T, F>(array: &DistArray<T>, _combine: F, args: &ReduceArgs) -> Result<DistArray<T>>
where
    T: Numeric,
    F: Fn(T, T) -> T,
{
    args.validate(array.global_ndim())?;
    Err(Error::not_implemented(
        "custom reductions have no distributed implementation",
    ))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creation::{array, zeros, CreationOptions};
    use crate::process_group::World;
    use distarray_core::ErrorKind;

    fn uneven_grid(pg: &ProcessGroup) -> DistArray<i64> {
        let global = Tensor::<i64>::from_vec((0..15).collect(), &[5, 3]).unwrap();
        array(pg.is_root(0).then_some(&global), &CreationOptions::new(), pg).unwrap()
    }

    #[test]
    fn test_reduce_op_apply() {
        assert_eq!(ReduceOp::Sum.apply(1.0, 2.0), 3.0);
        assert_eq!(ReduceOp::Product.apply(2, 3), 6);
        assert_eq!(ReduceOp::Min.apply(2_u8, 3), 2);
        assert_eq!(ReduceOp::Max.apply(-2_i64, -3), -2);
    }

    #[test]
    fn test_reduce_op_identity() {
        assert_eq!(ReduceOp::Sum.identity::<f32>(), 0.0);
        assert_eq!(ReduceOp::Product.identity::<i32>(), 1);
        assert_eq!(ReduceOp::Min.identity::<u8>(), u8::MAX);
        assert_eq!(ReduceOp::Max.identity::<i16>(), i16::MIN);

        for op in [ReduceOp::Sum, ReduceOp::Product, ReduceOp::Min, ReduceOp::Max] {
            assert_eq!(op.apply(op.identity(), 7_i32), 7, "{}", op.name());
        }
    }

    #[test]
    fn test_reduce_args_validation() {
        assert!(ReduceArgs::new().validate(0).is_ok());
        assert!(ReduceArgs::new().axis(1).validate(2).is_ok());
        assert_eq!(
            ReduceArgs::new().axis(2).validate(2).unwrap_err().kind(),
            distarray_core::ErrorKind::Value
        );
        let out = Tensor::<f64>::scalar(0.0);
        assert_eq!(
            ReduceArgs::new().out(out).validate(1).unwrap_err().kind(),
            distarray_core::ErrorKind::NotSupported
        );
    }

    #[test]
    fn test_axis_reductions_uneven_grid() {
        let results = World::launch_mock(4, |pg| {
            let x = uneven_grid(&pg);
            let cols = reduce(&x, ReduceOp::Sum, &ReduceArgs::new().axis(0)).unwrap();
            let rows = reduce(&x, ReduceOp::Max, &ReduceArgs::new().axis(1)).unwrap();
            let lows = reduce(&x, ReduceOp::Min, &ReduceArgs::new().axis(0)).unwrap();
            let means = mean(&x, &ReduceArgs::new().axis(0)).unwrap();
            (
                x.local_shape().to_vec(),
                cols.local().to_vec(),
                rows.local().to_vec(),
                lows.local().to_vec(),
                means.local().to_vec(),
            )
        });
        let local_shapes: Vec<_> = results.iter().map(|r| r.0.clone()).collect();
        assert_eq!(local_shapes, vec![vec![3, 2], vec![3, 1], vec![2, 2], vec![2, 1]]);
        for (_, cols, rows, lows, means) in results {
            assert_eq!(cols, vec![30, 35, 40]);
            assert_eq!(rows, vec![2, 5, 8, 11, 14]);
            assert_eq!(lows, vec![0, 1, 2]);
            assert_eq!(means, vec![6.0, 7.0, 8.0]);
        }
    }

    #[test]
    fn test_integer_sum_wraps() {
        let pg = ProcessGroup::mock();
        let data = Tensor::<u8>::from_vec(vec![200, 100], &[2]).unwrap();
        let x = array(Some(&data), &CreationOptions::new(), &pg).unwrap();
        let total = reduce(&x, ReduceOp::Sum, &ReduceArgs::new()).unwrap();
        assert_eq!(total.item().unwrap(), 44);
    }

    #[test]
    fn test_zero_size_min_max_fail_everywhere() {
        let results = World::launch_mock(2, |pg| {
            let x = zeros::<i32>(&[0], &CreationOptions::new(), &pg).unwrap();
            let y = zeros::<i32>(&[0, 3], &CreationOptions::new(), &pg).unwrap();
            (
                reduce(&x, ReduceOp::Min, &ReduceArgs::new()).map(|_| ()),
                reduce(&x, ReduceOp::Max, &ReduceArgs::new()).map(|_| ()),
                reduce(&y, ReduceOp::Max, &ReduceArgs::new().axis(0)).map(|_| ()),
                reduce(&x, ReduceOp::Sum, &ReduceArgs::new()).unwrap().item().unwrap(),
            )
        });
        for (min, max, axis_max, sum) in results {
            assert_eq!(min.unwrap_err().kind(), ErrorKind::Value);
            assert_eq!(max.unwrap_err().kind(), ErrorKind::Value);
            assert_eq!(axis_max.unwrap_err().kind(), ErrorKind::Value);
            assert_eq!(sum, 0);
        }
    }
}
