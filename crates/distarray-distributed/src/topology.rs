//! Topology - Virtual Cartesian Process Grids
//!
//! Arranges the ranks of a process group on a row-major Cartesian grid so
//! that each Block-distributed axis of an array is split along one grid
//! dimension. Also hosts the balanced factoring of a group size into grid
//! dimensions and the Block partition arithmetic.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::ops::Range;

use serde::{Deserialize, Serialize};

use distarray_core::error::{Error, Result};

// =============================================================================
// Block Partition Arithmetic
// =============================================================================

/// Number of elements slot `coord` of `parts` receives from an axis of
/// extent `n`.
///
/// The first `n % parts` slots get `ceil(n / parts)`, the rest get
/// `floor(n / parts)`.
#[must_use]
pub fn block_extent(n: usize, parts: usize, coord: usize) -> usize {
    if parts == 0 {
        return 0;
    }
    n / parts + usize::from(coord < n % parts)
}

/// Global index range owned by slot `coord` of `parts` on an axis of extent
/// `n`.
#[must_use]
pub fn block_range(n: usize, parts: usize, coord: usize) -> Range<usize> {
    if parts == 0 {
        return 0..0;
    }
    let start = coord * (n / parts) + coord.min(n % parts);
    start..start + block_extent(n, parts, coord)
}

// =============================================================================
// Grid Factoring
// =============================================================================

fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}

/// Factors `n` processes into `ndims` grid dimensions that are as balanced
/// as possible, in non-increasing order.
///
/// `dims_create(12, 2)` is `[4, 3]`; `dims_create(4, 2)` is `[2, 2]`.
#[must_use]
pub fn dims_create(n: usize, ndims: usize) -> Vec<usize> {
    if ndims == 0 {
        return Vec::new();
    }

    let mut dims = vec![1; ndims];
    let mut factors = prime_factors(n.max(1));
    factors.sort_unstable_by(|a, b| b.cmp(a));

    for factor in factors {
        let mut smallest = 0;
        for (i, &d) in dims.iter().enumerate() {
            if d < dims[smallest] {
                smallest = i;
            }
        }
        dims[smallest] *= factor;
    }

    dims.sort_unstable_by(|a, b| b.cmp(a));
    dims
}

// =============================================================================
// ProcessGrid
// =============================================================================

/// A virtual row-major Cartesian arrangement of a process group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessGrid {
    dims: Vec<usize>,
    coord: Vec<usize>,
}

impl ProcessGrid {
    /// Creates a grid, checking that it exactly covers `group_size` ranks and
    /// that `coord` lies inside it.
    pub fn new(dims: Vec<usize>, coord: Vec<usize>, group_size: usize) -> Result<Self> {
        let product: usize = dims.iter().product();
        if product != group_size {
            return Err(Error::value_error(format!(
                "grid dims {dims:?} cover {product} processes, group has {group_size}"
            )));
        }
        if coord.len() != dims.len() || coord.iter().zip(&dims).any(|(&c, &d)| c >= d) {
            return Err(Error::value_error(format!(
                "grid coordinate {coord:?} outside grid {dims:?}"
            )));
        }
        Ok(Self { dims, coord })
    }

    /// Creates the grid with dimensions `dims` as seen from `rank`.
    pub fn for_rank(dims: Vec<usize>, rank: usize) -> Result<Self> {
        let size: usize = dims.iter().product();
        if rank >= size {
            return Err(Error::value_error(format!(
                "rank {rank} outside grid {dims:?}"
            )));
        }
        let coord = coord_in(&dims, rank);
        Self::new(dims, coord, size)
    }

    /// Returns the grid dimensions.
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns this process's coordinate.
    #[must_use]
    pub fn coord(&self) -> &[usize] {
        &self.coord
    }

    /// Returns the number of grid dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Returns the number of processes on the grid.
    #[must_use]
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the coordinate of `rank`.
    #[must_use]
    pub fn coord_of(&self, rank: usize) -> Vec<usize> {
        coord_in(&self.dims, rank)
    }

    /// Returns the rank at `coord`.
    #[must_use]
    pub fn rank_of(&self, coord: &[usize]) -> usize {
        coord
            .iter()
            .zip(&self.dims)
            .fold(0, |rank, (&c, &d)| rank * d + c)
    }

    /// Returns the ranks that share every coordinate with this process except
    /// along `axis`, ordered by their coordinate on `axis`.
    #[must_use]
    pub fn line_ranks(&self, axis: usize) -> Vec<usize> {
        let Some(&extent) = self.dims.get(axis) else {
            return Vec::new();
        };
        let mut coord = self.coord.clone();
        (0..extent)
            .map(|c| {
                coord[axis] = c;
                self.rank_of(&coord)
            })
            .collect()
    }
}

fn coord_in(dims: &[usize], mut rank: usize) -> Vec<usize> {
    let mut coord = vec![0; dims.len()];
    for (i, &d) in dims.iter().enumerate().rev() {
        if d == 0 {
            continue;
        }
        coord[i] = rank % d;
        rank /= d;
    }
    coord
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_partition_uneven() {
        let extents: Vec<_> = (0..4).map(|c| block_extent(10, 4, c)).collect();
        assert_eq!(extents, vec![3, 3, 2, 2]);

        let ranges: Vec<_> = (0..4).map(|c| block_range(10, 4, c)).collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn test_block_partition_more_parts_than_elements() {
        let ranges: Vec<_> = (0..4).map(|c| block_range(2, 4, c)).collect();
        assert_eq!(ranges, vec![0..1, 1..2, 2..2, 2..2]);
        assert_eq!(block_range(0, 3, 1), 0..0);
    }

    #[test]
    fn test_dims_create() {
        assert_eq!(dims_create(4, 1), vec![4]);
        assert_eq!(dims_create(4, 2), vec![2, 2]);
        assert_eq!(dims_create(8, 2), vec![4, 2]);
        assert_eq!(dims_create(12, 2), vec![4, 3]);
        assert_eq!(dims_create(12, 3), vec![3, 2, 2]);
        assert_eq!(dims_create(7, 2), vec![7, 1]);
        assert_eq!(dims_create(1, 2), vec![1, 1]);
        assert!(dims_create(4, 0).is_empty());
    }

    #[test]
    fn test_grid_validation() {
        assert!(ProcessGrid::new(vec![2, 2], vec![1, 1], 4).is_ok());
        assert!(ProcessGrid::new(vec![2, 2], vec![0, 0], 3).is_err());
        assert!(ProcessGrid::new(vec![2, 2], vec![2, 0], 4).is_err());
        assert!(ProcessGrid::new(vec![4], vec![0, 0], 4).is_err());
        assert!(ProcessGrid::for_rank(vec![2, 2], 4).is_err());
    }

    #[test]
    fn test_grid_row_major() {
        let grid = ProcessGrid::for_rank(vec![2, 3], 4).unwrap();
        assert_eq!(grid.coord(), &[1, 1]);
        assert_eq!(grid.coord_of(5), vec![1, 2]);
        assert_eq!(grid.rank_of(&[0, 2]), 2);
        assert_eq!(grid.size(), 6);
    }

    #[test]
    fn test_grid_lines() {
        let grid = ProcessGrid::for_rank(vec![2, 2], 3).unwrap();
        assert_eq!(grid.line_ranks(0), vec![1, 3]);
        assert_eq!(grid.line_ranks(1), vec![2, 3]);
        assert!(grid.line_ranks(2).is_empty());
    }
}
