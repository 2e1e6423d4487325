//! Shape and Strides - Local Buffer Dimension Management
//!
//! Provides types and functions for managing buffer shapes and the row-major
//! strides used to address them. Every local buffer is stored contiguously,
//! so strides only ever describe C-order traversal.
//!
//! # Key Features
//! - Efficient shape representation with small-vector optimization
//! - Row-major stride computation and linear indexing
//! - Reshape validation with single-dimension inference
//! - Block-region helpers used when slicing a global array into partitions
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::ops::Range;

use smallvec::SmallVec;

use distarray_core::error::{Error, Result};

// =============================================================================
// Type Aliases
// =============================================================================

/// Shape type - dimensions of a buffer.
/// Uses `SmallVec` for stack allocation of small shapes (up to 6 dimensions).
pub type Shape = SmallVec<[usize; 6]>;

/// Strides type - step sizes for each dimension.
pub type Strides = SmallVec<[isize; 6]>;

// =============================================================================
// Shape Utilities
// =============================================================================

/// Computes the total number of elements from a shape.
///
/// The empty shape describes a 0-dimensional buffer holding one element.
#[must_use]
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Computes row-major (C-order) strides for a shape.
#[must_use]
pub fn contiguous_strides(shape: &[usize]) -> Strides {
    if shape.is_empty() {
        return Strides::new();
    }

    let mut strides = Strides::with_capacity(shape.len());
    let mut stride = 1isize;

    for &dim in shape.iter().rev() {
        strides.push(stride);
        stride *= dim as isize;
    }

    strides.reverse();
    strides
}

/// Computes the linear index from multi-dimensional indices.
///
/// # Arguments
/// * `indices` - Multi-dimensional indices
/// * `strides` - Buffer strides
#[must_use]
pub fn linear_index(indices: &[usize], strides: &[isize]) -> usize {
    debug_assert_eq!(indices.len(), strides.len());

    let mut offset = 0isize;
    for (&idx, &stride) in indices.iter().zip(strides.iter()) {
        offset += idx as isize * stride;
    }
    offset as usize
}

// =============================================================================
// Shape Manipulation
// =============================================================================

/// Reshapes a buffer shape, validating that total elements match.
///
/// Supports -1 in one dimension to infer the size.
///
/// # Arguments
/// * `old_shape` - Current shape
/// * `new_shape` - Target shape (can contain -1)
pub fn reshape(old_shape: &[usize], new_shape: &[isize]) -> Result<Shape> {
    let old_numel = numel(old_shape);
    let mut result = Shape::with_capacity(new_shape.len());
    let mut infer_idx = None;
    let mut known_numel = 1usize;

    for (i, &dim) in new_shape.iter().enumerate() {
        if dim == -1 {
            if infer_idx.is_some() {
                return Err(Error::invalid_operation("Can only have one -1 in reshape"));
            }
            infer_idx = Some(i);
            result.push(0);
        } else if dim < 0 {
            return Err(Error::invalid_operation("Invalid dimension in reshape"));
        } else {
            let d = dim as usize;
            known_numel *= d;
            result.push(d);
        }
    }

    if let Some(idx) = infer_idx {
        if known_numel == 0 || old_numel % known_numel != 0 {
            return Err(Error::invalid_operation(
                "Cannot infer dimension: not evenly divisible",
            ));
        }
        result[idx] = old_numel / known_numel;
    } else if known_numel != old_numel {
        return Err(Error::shape_mismatch(old_shape, &result));
    }

    Ok(result)
}

/// Returns the shape with dimension `dim` removed.
///
/// Used by per-axis reductions, which collapse exactly one axis.
pub fn remove_dim(shape: &[usize], dim: usize) -> Result<Shape> {
    if dim >= shape.len() {
        return Err(Error::InvalidDimension {
            index: dim as i64,
            ndim: shape.len(),
        });
    }

    let mut result = Shape::from_slice(shape);
    result.remove(dim);
    Ok(result)
}

/// Validates that indices are within bounds for a shape.
pub fn validate_indices(indices: &[usize], shape: &[usize]) -> Result<()> {
    if indices.len() != shape.len() {
        return Err(Error::invalid_operation(format!(
            "Expected {} indices, got {}",
            shape.len(),
            indices.len()
        )));
    }

    for (&idx, &dim) in indices.iter().zip(shape.iter()) {
        if idx >= dim {
            return Err(Error::IndexOutOfBounds {
                index: idx,
                size: dim,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Block Regions
// =============================================================================

/// Returns the extents of a rectangular region.
#[must_use]
pub fn region_shape(region: &[Range<usize>]) -> Shape {
    region.iter().map(ExactSizeIterator::len).collect()
}

/// Validates that a rectangular region lies inside `shape`.
pub fn validate_region(region: &[Range<usize>], shape: &[usize]) -> Result<()> {
    if region.len() != shape.len() {
        return Err(Error::invalid_operation(format!(
            "Region has {} axes, buffer has {}",
            region.len(),
            shape.len()
        )));
    }

    for (range, &dim) in region.iter().zip(shape.iter()) {
        if range.start > range.end || range.end > dim {
            return Err(Error::IndexOutOfBounds {
                index: range.end,
                size: dim,
            });
        }
    }

    Ok(())
}

/// Visits the linear offsets of every element of `region` inside a buffer of
/// `shape`, in row-major order of the region.
pub fn for_each_region_offset(
    region: &[Range<usize>],
    shape: &[usize],
    mut visit: impl FnMut(usize),
) -> Result<()> {
    validate_region(region, shape)?;

    let extents = region_shape(region);
    let total = numel(&extents);
    if total == 0 {
        return Ok(());
    }

    let strides = contiguous_strides(shape);
    let mut index: Vec<usize> = region.iter().map(|r| r.start).collect();

    for _ in 0..total {
        visit(linear_index(&index, &strides));

        for axis in (0..index.len()).rev() {
            index[axis] += 1;
            if index[axis] < region[axis].end {
                break;
            }
            index[axis] = region[axis].start;
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numel() {
        assert_eq!(numel(&[2, 3, 4]), 24);
        assert_eq!(numel(&[]), 1);
        assert_eq!(numel(&[5]), 5);
        assert_eq!(numel(&[0, 3]), 0);
    }

    #[test]
    fn test_contiguous_strides() {
        let shape = [2, 3, 4];
        let strides = contiguous_strides(&shape);
        assert_eq!(strides.as_slice(), &[12, 4, 1]);
    }

    #[test]
    fn test_linear_index() {
        let strides: Strides = smallvec::smallvec![12, 4, 1];
        assert_eq!(linear_index(&[0, 0, 0], &strides), 0);
        assert_eq!(linear_index(&[1, 0, 0], &strides), 12);
        assert_eq!(linear_index(&[1, 2, 3], &strides), 23);
    }

    #[test]
    fn test_reshape() {
        let old_shape = [2, 3, 4];

        let new = reshape(&old_shape, &[6, 4]).unwrap();
        assert_eq!(new.as_slice(), &[6, 4]);

        let new = reshape(&old_shape, &[-1, 4]).unwrap();
        assert_eq!(new.as_slice(), &[6, 4]);

        assert!(reshape(&old_shape, &[5, 5]).is_err());
        assert!(reshape(&old_shape, &[-1, -1]).is_err());
        assert!(reshape(&[0], &[-1, 0]).is_err());
    }

    #[test]
    fn test_remove_dim() {
        assert_eq!(remove_dim(&[2, 3, 4], 1).unwrap().as_slice(), &[2, 4]);
        assert!(remove_dim(&[2, 3], 2).is_err());
    }

    #[test]
    fn test_validate_indices() {
        assert!(validate_indices(&[1, 2], &[2, 3]).is_ok());
        assert!(validate_indices(&[2, 0], &[2, 3]).is_err());
        assert!(validate_indices(&[0], &[2, 3]).is_err());
    }

    #[test]
    fn test_region_offsets() {
        let mut offsets = Vec::new();
        for_each_region_offset(&[1..3, 1..3], &[3, 4], |o| offsets.push(o)).unwrap();
        assert_eq!(offsets, vec![5, 6, 9, 10]);
        assert_eq!(region_shape(&[1..3, 0..4]).as_slice(), &[2, 4]);
    }

    #[test]
    fn test_region_empty_and_invalid() {
        let mut count = 0;
        for_each_region_offset(&[2..2, 0..4], &[3, 4], |_| count += 1).unwrap();
        assert_eq!(count, 0);

        assert!(validate_region(&[0..4], &[3]).is_err());
        assert!(validate_region(&[0..1], &[3, 4]).is_err());
    }
}
