//! Tensor Creation Functions
//!
//! Provides the factory functions used to materialize local buffers: constant
//! fills and arithmetic ranges. The range helpers are split so that a caller
//! can generate any contiguous window of a range without building the whole
//! sequence first.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use num_traits::NumCast;

use distarray_core::dtype::{Numeric, Scalar};
use distarray_core::error::{Error, Result};
use distarray_core::storage::Storage;

use crate::shape::{contiguous_strides, numel, Shape};
use crate::tensor::Tensor;

// =============================================================================
// Constant Initialization
// =============================================================================

fn filled<T: Scalar>(shape: &[usize], value: T) -> Tensor<T> {
    let shape = Shape::from_slice(shape);
    Tensor {
        storage: Storage::from_vec(vec![value; numel(&shape)]),
        strides: contiguous_strides(&shape),
        shape,
    }
}

/// Creates a tensor filled with zeros.
///
/// # Example
/// ```rust
/// use distarray_tensor::zeros;
/// let t = zeros::<f32>(&[2, 3]);
/// assert_eq!(t.numel(), 6);
/// ```
#[must_use]
pub fn zeros<T: Scalar>(shape: &[usize]) -> Tensor<T> {
    filled(shape, T::zeroed())
}

/// Creates a tensor filled with ones.
#[must_use]
pub fn ones<T: Numeric>(shape: &[usize]) -> Tensor<T> {
    filled(shape, T::ONE)
}

/// Creates a tensor filled with a specific value.
#[must_use]
pub fn full<T: Scalar>(shape: &[usize], value: T) -> Tensor<T> {
    filled(shape, value)
}

/// Creates a tensor whose contents are unspecified.
///
/// Contents are currently zeroed; callers must not rely on that.
#[must_use]
pub fn empty<T: Scalar>(shape: &[usize]) -> Tensor<T> {
    zeros(shape)
}

/// Creates a tensor with the same shape as another, filled with zeros.
#[must_use]
pub fn zeros_like<T: Scalar>(other: &Tensor<T>) -> Tensor<T> {
    zeros(other.shape())
}

// =============================================================================
// Ranges
// =============================================================================

fn exact<T: Numeric>(value: T) -> Result<i128> {
    <i128 as NumCast>::from(value)
        .ok_or_else(|| Error::value_error(format!("{value:?} is not representable as an integer")))
}

/// Returns the number of elements in `[start, stop)` stepping by `step`.
///
/// A range whose step points away from `stop` is empty. Integer ranges are
/// counted exactly; float ranges go through `f64`.
pub fn arange_len<T: Numeric>(start: T, stop: T, step: T) -> Result<usize> {
    if step == T::ZERO {
        return Err(Error::value_error("arange step must be non-zero"));
    }

    if T::DTYPE.is_integer() {
        let (start, stop, step) = (exact(start)?, exact(stop)?, exact(step)?);
        let span = stop - start;
        if span == 0 || (span > 0) != (step > 0) {
            return Ok(0);
        }
        let len = (span.abs() + step.abs() - 1) / step.abs();
        return usize::try_from(len)
            .map_err(|_| Error::value_error(format!("arange of {len} elements is too long")));
    }

    let span = (stop.to_f64_lossy() - start.to_f64_lossy()) / step.to_f64_lossy();
    if span.is_nan() {
        return Err(Error::value_error("arange bounds are not comparable"));
    }
    Ok(span.ceil().max(0.0) as usize)
}

/// Generates `len` elements of the range beginning at `start` with `step`,
/// starting from element number `first`.
pub fn arange_window<T: Numeric>(start: T, step: T, first: usize, len: usize) -> Result<Vec<T>> {
    let overflow = |i: usize| Error::value_error(format!("range element {i} does not fit in {}", T::DTYPE));

    if T::DTYPE.is_integer() {
        let (start, step) = (exact(start)?, exact(step)?);
        return (first..first + len)
            .map(|i| {
                let index = i128::try_from(i).map_err(|_| overflow(i))?;
                let value = index
                    .checked_mul(step)
                    .and_then(|offset| offset.checked_add(start))
                    .ok_or_else(|| overflow(i))?;
                <T as NumCast>::from(value).ok_or_else(|| overflow(i))
            })
            .collect();
    }

    (first..first + len)
        .map(|i| {
            let index: T = NumCast::from(i).ok_or_else(|| overflow(i))?;
            Ok(start + index * step)
        })
        .collect()
}

/// Creates a 1D tensor with values from start to stop (exclusive) with step.
pub fn arange<T: Numeric>(start: T, stop: T, step: T) -> Result<Tensor<T>> {
    let len = arange_len(start, stop, step)?;
    let data = arange_window(start, step, 0, len)?;
    Tensor::from_vec(data, &[len])
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let t = zeros::<f32>(&[2, 3]);
        assert_eq!(t.shape(), &[2, 3]);
        assert!(t.to_vec().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_ones_and_full() {
        assert_eq!(ones::<i32>(&[3]).to_vec(), vec![1, 1, 1]);
        assert_eq!(full(&[2], 7_u8).to_vec(), vec![7, 7]);
        assert_eq!(empty::<f64>(&[0, 4]).numel(), 0);
        assert_eq!(zeros::<f64>(&[]).numel(), 1);
    }

    #[test]
    fn test_arange() {
        let t = arange(0_i64, 10, 1).unwrap();
        assert_eq!(t.to_vec(), (0..10).collect::<Vec<_>>());

        let t = arange(1.0_f64, 2.0, 0.25).unwrap();
        assert_eq!(t.to_vec(), vec![1.0, 1.25, 1.5, 1.75]);

        let t = arange(5_i32, 0, -2).unwrap();
        assert_eq!(t.to_vec(), vec![5, 3, 1]);
    }

    #[test]
    fn test_arange_edge_cases() {
        assert_eq!(arange_len(0_i32, 10, -1).unwrap(), 0);
        assert_eq!(arange_len(3_i32, 3, 1).unwrap(), 0);
        assert!(arange(0_i32, 10, 0).is_err());
    }

    #[test]
    fn test_arange_window() {
        assert_eq!(arange_window(10_i32, 3, 2, 3).unwrap(), vec![16, 19, 22]);
        assert!(arange_window(0_u8, 1, 250, 10).is_err());
        assert_eq!(arange_window(-128_i8, 1, 254, 1).unwrap(), vec![126]);
    }

    #[test]
    fn test_arange_len_exact_for_wide_integers() {
        let start = -(1_i64 << 60);
        let stop = (1_i64 << 60) + 3;
        assert_eq!(arange_len(start, stop, 1).unwrap(), (1_usize << 61) + 3);
        assert_eq!(arange_len(0_u64, u64::MAX, 1 << 62).unwrap(), 4);
        assert_eq!(arange_len(10_i64, 0, -3).unwrap(), 4);
        assert_eq!(arange_len(0_u8, 255, 2).unwrap(), 128);
    }
}
