//! Creation - Distributed Array Constructors
//!
//! Entry points that build a `DistArray` from root-held data, an arithmetic
//! range or a fill value. Every constructor is collective: the root's
//! arguments are broadcast, each process builds only its own block, and the
//! container's global properties are resolved once before it is returned.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use serde::de::DeserializeOwned;
use serde::Serialize;

use distarray_core::dtype::Numeric;
use distarray_core::error::Result;
use distarray_tensor::{self as dense, Tensor};

use crate::array::DistArray;
use crate::distribution::{distribute_array, distribute_range, distribute_shape, Distribution};
use crate::process_group::ProcessGroup;

// =============================================================================
// Options
// =============================================================================

/// Where creation arguments come from and how the result is spread.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreationOptions {
    /// Rank whose arguments are authoritative.
    pub root: usize,
    /// Distribution scheme of the created array.
    pub distribution: Distribution,
}

impl CreationOptions {
    /// Root 0, Block on every axis.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root rank.
    #[must_use]
    pub fn root(mut self, root: usize) -> Self {
        self.root = root;
        self
    }

    /// Sets the distribution scheme.
    #[must_use]
    pub fn distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Distributes the root's `data`. Non-root ranks may pass `None`.
pub fn array<T: Numeric>(
    data: Option<&Tensor<T>>,
    opts: &CreationOptions,
    pg: &ProcessGroup,
) -> Result<DistArray<T>> {
    let (local, layout) = distribute_array(data, &opts.distribution, opts.root, pg)?;
    DistArray::from_parts(local, layout, pg.clone())
}

/// Values in `[start, stop)` spaced by `step`, as a 1-D array.
///
/// Only the root's arguments are used.
pub fn arange<T>(
    start: T,
    stop: T,
    step: T,
    opts: &CreationOptions,
    pg: &ProcessGroup,
) -> Result<DistArray<T>>
where
    T: Numeric + Serialize + DeserializeOwned,
{
    let args = pg.is_root(opts.root).then_some((start, stop, step));
    let part = distribute_range(args, &opts.distribution, opts.root, pg)?;
    let local = part.to_tensor()?;
    DistArray::from_parts(local, part.layout, pg.clone())
}

fn filled<T: Numeric>(
    shape: &[usize],
    opts: &CreationOptions,
    pg: &ProcessGroup,
    make: impl FnOnce(&[usize]) -> Tensor<T>,
) -> Result<DistArray<T>> {
    let root_shape = pg.is_root(opts.root).then_some(shape);
    let layout = distribute_shape(root_shape, &opts.distribution, opts.root, pg)?;
    let local = make(layout.local_shape());
    DistArray::from_parts(local, layout, pg.clone())
}

/// An array of the root's `shape` with unspecified (zeroed) contents.
pub fn empty<T: Numeric>(shape: &[usize], opts: &CreationOptions, pg: &ProcessGroup) -> Result<DistArray<T>> {
    filled(shape, opts, pg, dense::empty)
}

/// An array of the root's `shape` filled with zeros.
pub fn zeros<T: Numeric>(shape: &[usize], opts: &CreationOptions, pg: &ProcessGroup) -> Result<DistArray<T>> {
    filled(shape, opts, pg, dense::zeros)
}

/// An array of the root's `shape` filled with ones.
pub fn ones<T: Numeric>(shape: &[usize], opts: &CreationOptions, pg: &ProcessGroup) -> Result<DistArray<T>> {
    filled(shape, opts, pg, dense::ones)
}

/// An array of the root's `shape` filled with `value`.
///
/// `value` is taken from each caller and should agree across the group.
pub fn full<T: Numeric>(
    shape: &[usize],
    value: T,
    opts: &CreationOptions,
    pg: &ProcessGroup,
) -> Result<DistArray<T>> {
    filled(shape, opts, pg, |s| dense::full(s, value))
}

// =============================================================================
// Tests
// =============================================================================
