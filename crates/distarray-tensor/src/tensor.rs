//! Tensor - Dense Local Buffer Type
//!
//! The `Tensor` struct is the per-process buffer that holds a rank's slice of
//! a distributed array. It is a contiguous, row-major N-dimensional array
//! with shared reference-counted storage, so handing a tensor to a collective
//! never copies it until its bytes are actually sent.
//!
//! # Key Features
//! - Generic over element type (f32, f64, signed and unsigned integers)
//! - Raw byte views for moving buffers across the transport
//! - Whole-buffer and per-axis folds used by the reduction engine
//! - In-place elementwise updates through shared storage
//! - Rectangular region copy in and out, for partitioning and reassembly
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::fmt;
use core::ops::{Add, Mul, Range};

use distarray_core::dtype::{DType, Numeric, Scalar};
use distarray_core::error::{Error, Result};
use distarray_core::storage::Storage;

use crate::shape::{
    contiguous_strides, for_each_region_offset, linear_index, numel, region_shape, remove_dim,
    reshape, validate_indices, Shape, Strides,
};

// =============================================================================
// Tensor Struct
// =============================================================================

/// A contiguous N-dimensional array of scalar values.
///
/// Cloning a tensor shares its storage; in-place operations on one clone are
/// visible through the other. Use [`Tensor::deep_copy`] for an independent
/// buffer.
#[derive(Clone)]
pub struct Tensor<T: Scalar> {
    /// Underlying data storage (reference-counted).
    pub(crate) storage: Storage<T>,
    /// Shape of the tensor (dimensions).
    pub(crate) shape: Shape,
    /// Row-major strides for each dimension.
    pub(crate) strides: Strides,
}

impl<T: Scalar> Tensor<T> {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a new tensor from storage with the given shape.
    ///
    /// # Returns
    /// New tensor, or error if shape doesn't match storage size.
    pub fn from_storage(storage: Storage<T>, shape: &[usize]) -> Result<Self> {
        let total = numel(shape);
        if total != storage.len() {
            return Err(Error::shape_mismatch(&[storage.len()], shape));
        }

        let shape = Shape::from_slice(shape);
        let strides = contiguous_strides(&shape);

        Ok(Self {
            storage,
            shape,
            strides,
        })
    }

    /// Creates a new tensor from a vector with the given shape.
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        Self::from_storage(Storage::from_vec(data), shape)
    }

    /// Creates a new tensor from a slice with the given shape.
    pub fn from_slice(data: &[T], shape: &[usize]) -> Result<Self> {
        Self::from_storage(Storage::from_slice(data), shape)
    }

    /// Rebuilds a tensor from raw bytes received over the transport.
    ///
    /// The byte count must be a whole number of elements and agree with
    /// `shape`. Alignment of `bytes` does not matter.
    pub fn from_bytes(bytes: &[u8], shape: &[usize]) -> Result<Self> {
        let width = core::mem::size_of::<T>();
        if bytes.len() % width != 0 {
            return Err(Error::value_error(format!(
                "{} bytes is not a whole number of {} elements",
                bytes.len(),
                T::DTYPE
            )));
        }

        let data: Vec<T> = bytemuck::pod_collect_to_vec(bytes);
        Self::from_vec(data, shape)
    }

    /// Creates a scalar tensor (0-dimensional).
    pub fn scalar(value: T) -> Self {
        Self {
            storage: Storage::from_vec(vec![value]),
            shape: Shape::new(),
            strides: Strides::new(),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns the shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the strides of the tensor.
    #[must_use]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        numel(&self.shape)
    }

    /// Returns the number of bytes held by the buffer.
    #[must_use]
    pub fn nbytes(&self) -> usize {
        self.numel() * core::mem::size_of::<T>()
    }

    /// Returns true if the tensor has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    /// Returns true if this is a scalar (0-dimensional) tensor.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Returns the runtime element type.
    #[must_use]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Returns a reference to the underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Storage<T> {
        &self.storage
    }

    // =========================================================================
    // Data Access
    // =========================================================================

    /// Returns the element at the given indices.
    pub fn get(&self, indices: &[usize]) -> Result<T> {
        validate_indices(indices, &self.shape)?;
        let offset = linear_index(indices, &self.strides);
        Ok(self.storage.as_slice()[offset])
    }

    /// Sets the element at the given indices.
    pub fn set(&self, indices: &[usize], value: T) -> Result<()> {
        validate_indices(indices, &self.shape)?;
        let offset = linear_index(indices, &self.strides);
        self.storage.as_slice_mut()[offset] = value;
        Ok(())
    }

    /// Returns the single element of a one-element tensor.
    pub fn item(&self) -> Result<T> {
        if self.numel() != 1 {
            return Err(Error::invalid_operation(
                "item() only works on single-element tensors",
            ));
        }
        Ok(self.storage.as_slice()[0])
    }

    /// Returns the data as a vector, in row-major order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.storage.as_slice().to_vec()
    }

    /// Returns a copy of the buffer as raw bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let data = self.storage.as_slice();
        bytemuck::cast_slice::<T, u8>(&data).to_vec()
    }

    /// Converts every element with `f` into a new tensor of the same shape.
    #[must_use]
    pub fn map_to<U: Scalar>(&self, f: impl Fn(T) -> U) -> Tensor<U> {
        let data: Vec<U> = self.storage.as_slice().iter().map(|&v| f(v)).collect();
        Tensor {
            storage: Storage::from_vec(data),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }

    /// Makes an independent copy of this tensor.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        Self {
            storage: self.storage.deep_copy(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }

    // =========================================================================
    // Shape Operations
    // =========================================================================

    /// Returns a tensor with a new shape sharing the same storage.
    ///
    /// One dimension may be -1 to infer its size.
    pub fn reshape(&self, new_shape: &[isize]) -> Result<Self> {
        let shape = reshape(&self.shape, new_shape)?;
        Self::from_storage(self.storage.clone(), &shape)
    }

    /// Returns a tensor with an explicit new shape sharing the same storage.
    pub fn with_shape(&self, new_shape: &[usize]) -> Result<Self> {
        Self::from_storage(self.storage.clone(), new_shape)
    }

    /// Returns a 1-D tensor sharing the same storage.
    #[must_use]
    pub fn flatten(&self) -> Self {
        let len = self.numel();
        Self {
            storage: self.storage.clone(),
            shape: Shape::from_slice(&[len]),
            strides: Strides::from_slice(&[1]),
        }
    }

    // =========================================================================
    // Regions
    // =========================================================================

    /// Copies the rectangular `region` out into a new contiguous tensor.
    pub fn region(&self, region: &[Range<usize>]) -> Result<Self> {
        let data = self.storage.as_slice();
        let mut out = Vec::with_capacity(numel(&region_shape(region)));
        for_each_region_offset(region, &self.shape, |offset| out.push(data[offset]))?;
        drop(data);
        Self::from_vec(out, &region_shape(region))
    }

    /// Writes `src` into the rectangular `region` of this tensor.
    pub fn write_region(&self, region: &[Range<usize>], src: &Self) -> Result<()> {
        let extents = region_shape(region);
        if extents.as_slice() != src.shape() {
            return Err(Error::shape_mismatch(&extents, src.shape()));
        }

        let values = src.to_vec();
        let mut data = self.storage.as_slice_mut();
        let mut next = values.into_iter();
        for_each_region_offset(region, &self.shape, |offset| {
            if let Some(value) = next.next() {
                data[offset] = value;
            }
        })
    }
}

// =============================================================================
// Numeric Operations
// =============================================================================

impl<T: Numeric> Tensor<T> {
    /// Fills the tensor with a value.
    pub fn fill_(&self, value: T) {
        self.storage.as_slice_mut().fill(value);
    }

    /// Applies `f` to every element in place.
    pub fn map_inplace(&self, f: impl Fn(T) -> T) {
        for value in self.storage.as_slice_mut().iter_mut() {
            *value = f(*value);
        }
    }

    /// Returns a new tensor with `f` applied to every element.
    #[must_use]
    pub fn map(&self, f: impl Fn(T) -> T) -> Self {
        let data: Vec<T> = self.storage.as_slice().iter().map(|&v| f(v)).collect();
        Self {
            storage: Storage::from_vec(data),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }

    /// Adds a scalar to every element. Integers wrap on overflow.
    #[must_use]
    pub fn add_scalar(&self, scalar: T) -> Self {
        self.map(|v| v.wrapping_sum(scalar))
    }

    /// Multiplies every element by a scalar.
    #[must_use]
    pub fn mul_scalar(&self, scalar: T) -> Self {
        self.map(|v| v.wrapping_product(scalar))
    }

    /// Combines two same-shaped tensors element by element.
    pub fn zip_with(&self, other: &Self, f: impl Fn(T, T) -> T) -> Result<Self> {
        if self.shape != other.shape {
            return Err(Error::shape_mismatch(&self.shape, &other.shape));
        }

        let b = other.to_vec();
        let data: Vec<T> = self
            .storage
            .as_slice()
            .iter()
            .zip(b)
            .map(|(&x, y)| f(x, y))
            .collect();
        Self::from_vec(data, &self.shape)
    }

    /// Elementwise addition.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, T::wrapping_sum)
    }

    /// Elementwise subtraction.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Elementwise multiplication.
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, T::wrapping_product)
    }

    // =========================================================================
    // Reduction Operations
    // =========================================================================

    /// Folds every element into `init`.
    pub fn fold(&self, init: T, f: impl Fn(T, T) -> T) -> T {
        self.storage.as_slice().iter().fold(init, |acc, &v| f(acc, v))
    }

    /// Folds along `axis`, removing it from the shape.
    ///
    /// Every output position starts from `init`, so an axis of extent zero
    /// yields a tensor filled with `init`.
    pub fn fold_axis(&self, axis: usize, init: T, f: impl Fn(T, T) -> T) -> Result<Self> {
        let out_shape = remove_dim(&self.shape, axis)?;

        let outer: usize = self.shape[..axis].iter().product();
        let len = self.shape[axis];
        let inner: usize = self.shape[axis + 1..].iter().product();

        let data = self.storage.as_slice();
        let mut out = vec![init; outer * inner];
        for o in 0..outer {
            for k in 0..len {
                let base = (o * len + k) * inner;
                for i in 0..inner {
                    let slot = &mut out[o * inner + i];
                    *slot = f(*slot, data[base + i]);
                }
            }
        }
        drop(data);

        Self::from_vec(out, &out_shape)
    }

    /// Returns the sum of all elements. Integers wrap on overflow.
    #[must_use]
    pub fn sum(&self) -> T {
        self.fold(T::ZERO, T::wrapping_sum)
    }

    /// Returns the product of all elements.
    #[must_use]
    pub fn prod(&self) -> T {
        self.fold(T::ONE, T::wrapping_product)
    }

    /// Returns the minimum element.
    pub fn min(&self) -> Result<T> {
        if self.is_empty() {
            return Err(Error::invalid_operation("min() of an empty tensor"));
        }
        Ok(self.fold(T::max_value(), |a, b| if b < a { b } else { a }))
    }

    /// Returns the maximum element.
    pub fn max(&self) -> Result<T> {
        if self.is_empty() {
            return Err(Error::invalid_operation("max() of an empty tensor"));
        }
        Ok(self.fold(T::min_value(), |a, b| if b > a { b } else { a }))
    }
}

// =============================================================================
// Operator Trait Implementations
// =============================================================================

impl<T: Numeric> Add<T> for &Tensor<T> {
    type Output = Tensor<T>;

    fn add(self, scalar: T) -> Self::Output {
        self.add_scalar(scalar)
    }
}

impl<T: Numeric> Mul<T> for &Tensor<T> {
    type Output = Tensor<T>;

    fn mul(self, scalar: T) -> Self::Output {
        self.mul_scalar(scalar)
    }
}

// =============================================================================
// Display Implementation
// =============================================================================

impl<T: Scalar> fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(shape={:?}, dtype={}", self.shape(), T::DTYPE)?;
        if self.numel() <= 10 {
            write!(f, ", data={:?}", self.to_vec())?;
        }
        write!(f, ")")
    }
}

impl<T: Scalar + fmt::Display> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.to_vec();
        if self.is_scalar() {
            if let Some(value) = data.first() {
                return write!(f, "{value}");
            }
        }
        if self.ndim() == 1 {
            write!(f, "[")?;
            for (i, val) in data.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{val}")?;
            }
            write!(f, "]")
        } else {
            write!(f, "Tensor(shape={:?})", self.shape())
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
    fn test_from_vec() {
        let t = Tensor::<f32>::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.numel(), 6);
        assert_eq!(t.nbytes(), 24);
        assert!(Tensor::<f32>::from_vec(vec![1.0], &[2]).is_err());
    }

    #[test]
    fn test_get_set() {
        let t = Tensor::<f32>::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(t.get(&[0, 1]).unwrap(), 2.0);
        assert_eq!(t.get(&[1, 0]).unwrap(), 3.0);

        t.set(&[0, 0], 99.0).unwrap();
        assert_eq!(t.get(&[0, 0]).unwrap(), 99.0);
        assert!(t.get(&[2, 0]).is_err());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let t = Tensor::<i32>::from_vec(vec![1, -2, 3], &[3]).unwrap();
        let bytes = t.to_bytes();
        assert_eq!(bytes.len(), 12);

        let back = Tensor::<i32>::from_bytes(&bytes, &[3]).unwrap();
        assert_eq!(back.to_vec(), vec![1, -2, 3]);
        assert!(Tensor::<i32>::from_bytes(&bytes[..5], &[1]).is_err());
    }

    #[test]
    fn test_reshape() {
        let t = Tensor::<f32>::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let r = t.reshape(&[3, 2]).unwrap();
        assert_eq!(r.shape(), &[3, 2]);

        let r = t.reshape(&[-1]).unwrap();
        assert_eq!(r.shape(), &[6]);

        let r = t.with_shape(&[6, 1]).unwrap();
        assert_eq!(r.shape(), &[6, 1]);
        assert_eq!(t.flatten().shape(), &[6]);
    }

    #[test]
    fn test_zero_size_shapes() {
        let t = Tensor::<f64>::from_vec(vec![], &[0, 0]).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.ndim(), 2);
        assert_eq!(t.sum(), 0.0);
        assert!(t.min().is_err());
    }

    #[test]
    fn test_shared_storage_inplace() {
        let a = Tensor::<i64>::from_vec(vec![1, 2, 3], &[3]).unwrap();
        let b = a.clone();
        a.map_inplace(|v| v * 10);
        assert_eq!(b.to_vec(), vec![10, 20, 30]);

        let c = a.deep_copy();
        a.fill_(0);
        assert_eq!(c.to_vec(), vec![10, 20, 30]);
    }

    #[test]
    fn test_arithmetic() {
        let a = Tensor::<f32>::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let b = Tensor::<f32>::from_vec(vec![4.0, 5.0, 6.0], &[3]).unwrap();

        assert_eq!(a.add(&b).unwrap().to_vec(), vec![5.0, 7.0, 9.0]);
        assert_eq!(a.mul(&b).unwrap().to_vec(), vec![4.0, 10.0, 18.0]);
        assert_eq!((&a + 1.0).to_vec(), vec![2.0, 3.0, 4.0]);
        assert_eq!((&a * 2.0).to_vec(), vec![2.0, 4.0, 6.0]);

        let c = Tensor::<f32>::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        assert!(a.add(&c).is_err());
    }

    #[test]
    fn test_reductions() {
        let t = Tensor::<f32>::from_vec(vec![3.0, 1.0, 4.0, 2.0], &[4]).unwrap();
        assert_eq!(t.sum(), 10.0);
        assert_eq!(t.prod(), 24.0);
        assert_eq!(t.min().unwrap(), 1.0);
        assert_eq!(t.max().unwrap(), 4.0);
    }

    #[test]
    fn test_integer_overflow_wraps() {
        let t = Tensor::<u8>::from_vec(vec![200, 100], &[2]).unwrap();
        assert_eq!(t.sum(), 44);
        assert_eq!(t.prod(), 32);
        assert_eq!(t.add_scalar(100).to_vec(), vec![44, 200]);
        assert_eq!(t.add(&t).unwrap().to_vec(), vec![144, 200]);
    }

    #[test]
    fn test_fold_axis() {
        let t = Tensor::<i32>::from_vec(vec![1, 2, 3, 4, 5, 6], &[2, 3]).unwrap();

        let rows = t.fold_axis(0, 0, |a, b| a + b).unwrap();
        assert_eq!(rows.shape(), &[3]);
        assert_eq!(rows.to_vec(), vec![5, 7, 9]);

        let cols = t.fold_axis(1, 0, |a, b| a + b).unwrap();
        assert_eq!(cols.shape(), &[2]);
        assert_eq!(cols.to_vec(), vec![6, 15]);

        let empty = Tensor::<i32>::from_vec(vec![], &[0, 3]).unwrap();
        assert_eq!(empty.fold_axis(0, 7, |a, b| a + b).unwrap().to_vec(), vec![7, 7, 7]);

        assert!(t.fold_axis(2, 0, |a, b| a + b).is_err());
    }

    #[test]
    fn test_regions() {
        let t = Tensor::<u8>::from_vec((0..12).collect(), &[3, 4]).unwrap();
        let block = t.region(&[1..3, 2..4]).unwrap();
        assert_eq!(block.shape(), &[2, 2]);
        assert_eq!(block.to_vec(), vec![6, 7, 10, 11]);

        let dst = Tensor::<u8>::from_vec(vec![0; 12], &[3, 4]).unwrap();
        dst.write_region(&[1..3, 2..4], &block).unwrap();
        assert_eq!(dst.get(&[2, 3]).unwrap(), 11);
        assert_eq!(dst.get(&[0, 0]).unwrap(), 0);

        assert!(dst.write_region(&[0..1, 0..1], &block).is_err());
    }

    #[test]
    fn test_scalar() {
        let s = Tensor::<f32>::scalar(42.0);
        assert!(s.is_scalar());
        assert_eq!(s.numel(), 1);
        assert_eq!(s.item().unwrap(), 42.0);
        assert_eq!(s.to_string(), "42");
    }

    #[test]
    fn test_map_to() {
        let t = Tensor::<u8>::from_vec(vec![1, 2, 255], &[3]).unwrap();
        let wide = t.map_to(f64::from);
        assert_eq!(wide.shape(), &[3]);
        assert_eq!(wide.to_vec(), vec![1.0, 2.0, 255.0]);
    }
}
