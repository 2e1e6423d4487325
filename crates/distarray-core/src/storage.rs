//! Storage - Raw Memory Management for Local Buffers
//!
//! Provides the contiguous, reference-counted memory that backs a process's
//! local slice of a distributed array. Elementwise operations mutate the
//! storage in place through write guards; collectives read it through read
//! guards and view it as raw bytes.
//!
//! # Example
//! ```rust
//! use distarray_core::Storage;
//!
//! let storage = Storage::<f64>::zeros(100);
//! assert_eq!(storage.len(), 100);
//! assert!(!storage.is_empty());
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dtype::Scalar;

// =============================================================================
// Storage Struct
// =============================================================================

/// Raw memory storage for local buffer data.
///
/// Cloning a `Storage` shares the underlying buffer; use
/// [`Storage::deep_copy`] for an independent copy.
#[derive(Debug)]
pub struct Storage<T: Scalar> {
    inner: Arc<RwLock<Vec<T>>>,
    len: usize,
}

impl<T: Scalar> Storage<T> {
    /// Creates new storage with the given length, initialized to zero.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self::from_vec(vec![T::zeroed(); len])
    }

    /// Creates storage from an existing vector.
    #[must_use]
    pub fn from_vec(data: Vec<T>) -> Self {
        let len = data.len();
        Self {
            inner: Arc::new(RwLock::new(data)),
            len,
        }
    }

    /// Creates storage from a slice by copying the data.
    #[must_use]
    pub fn from_slice(data: &[T]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// Returns the number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the storage is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns an immutable view of the data.
    #[must_use]
    pub fn as_slice(&self) -> StorageReadGuard<'_, T> {
        StorageReadGuard {
            guard: self.inner.read(),
        }
    }

    /// Returns a mutable view of the data.
    #[must_use]
    pub fn as_slice_mut(&self) -> StorageWriteGuard<'_, T> {
        StorageWriteGuard {
            guard: self.inner.write(),
        }
    }

    /// Makes a deep copy of this storage.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        Self::from_vec(self.as_slice().to_vec())
    }
}

impl<T: Scalar> Clone for Storage<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            len: self.len,
        }
    }
}

// =============================================================================
// Guard Types for Safe Access
// =============================================================================

/// Read guard for storage data.
pub struct StorageReadGuard<'a, T: Scalar> {
    guard: parking_lot::RwLockReadGuard<'a, Vec<T>>,
}

impl<T: Scalar> Deref for StorageReadGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Write guard for storage data.
pub struct StorageWriteGuard<'a, T: Scalar> {
    guard: parking_lot::RwLockWriteGuard<'a, Vec<T>>,
}

impl<T: Scalar> Deref for StorageWriteGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T: Scalar> DerefMut for StorageWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_zeros() {
        let storage = Storage::<f32>::zeros(10);
        assert_eq!(storage.len(), 10);
        assert!(!storage.is_empty());
        assert!(storage.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_storage_from_vec() {
        let vec = vec![1.0_f32, 2.0, 3.0, 4.0, 5.0];
        let storage = Storage::from_vec(vec.clone());

        let data = storage.as_slice();
        assert_eq!(&*data, &vec[..]);
    }

    #[test]
    fn test_storage_clone_shares() {
        let storage1 = Storage::<i32>::zeros(10);
        let storage2 = storage1.clone();

        storage2.as_slice_mut()[3] = 7;
        assert_eq!(storage1.as_slice()[3], 7);
    }

    #[test]
    fn test_storage_deep_copy() {
        let storage1 = Storage::from_vec(vec![1.0_f64, 2.0, 3.0]);
        let storage2 = storage1.deep_copy();

        storage2.as_slice_mut()[0] = 99.0;
        assert_eq!(storage1.as_slice()[0], 1.0);
    }
}
