//! Communication - Shape-Aware Collective Primitives
//!
//! Typed wrappers over the byte-level backend. These move local buffers of
//! differing sizes between processes and rebuild them with the right shape
//! on the receiving side. Small structured values (shapes, headers) are
//! encoded with bincode; buffer contents move as raw bytes.
//!
//! Every function here is collective: all ranks of the group must call it in
//! the same order. Argument checks that can fail are made identically on
//! every rank, or their verdict is broadcast, so a bad argument is reported
//! everywhere instead of leaving some ranks blocked.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use distarray_core::dtype::{DType, Numeric, Scalar};
use distarray_core::error::{Error, Result};
use distarray_tensor::{DynTensor, Tensor};

use crate::process_group::ProcessGroup;
use crate::reduction::ReduceOp;
use crate::topology::ProcessGrid;

// =============================================================================
// Displacements
// =============================================================================

/// Computes the offset of each rank's contribution in a flat buffer.
///
/// This is an exclusive prefix sum of `counts`, except that entries after
/// the last non-zero count repeat the offset of that last non-zero entry
/// instead of advancing past it. All-zero counts give all-zero offsets.
///
/// ```rust
/// use distarray_distributed::comm::displacements_from_counts;
///
/// assert_eq!(displacements_from_counts(&[2, 2, 2, 2]), vec![0, 2, 4, 6]);
/// assert_eq!(displacements_from_counts(&[1, 2, 0, 0]), vec![0, 1, 1, 1]);
/// ```
#[must_use]
pub fn displacements_from_counts(counts: &[usize]) -> Vec<usize> {
    let Some(last) = counts.iter().rposition(|&c| c != 0) else {
        return vec![0; counts.len()];
    };

    let mut displs = Vec::with_capacity(counts.len());
    let mut offset = 0;
    for &count in &counts[..=last] {
        displs.push(offset);
        offset += count;
    }
    let tail = displs[last];
    displs.resize(counts.len(), tail);
    displs
}

fn to_bytes_scaled(values: &[usize], width: usize) -> Vec<usize> {
    values.iter().map(|v| v * width).collect()
}

fn buffer_len(counts: &[usize], displs: &[usize]) -> usize {
    let total: usize = counts.iter().sum();
    let furthest = counts
        .iter()
        .zip(displs)
        .map(|(c, d)| c + d)
        .max()
        .unwrap_or(0);
    total.max(furthest)
}

fn check_per_rank(what: &str, values: &[usize], pg: &ProcessGroup) -> Result<()> {
    if values.len() != pg.size() {
        return Err(Error::value_error(format!(
            "{what} has {} entries, group has {} processes",
            values.len(),
            pg.size()
        )));
    }
    Ok(())
}

// =============================================================================
// Synchronization
// =============================================================================

/// Synchronizes all processes.
pub fn barrier(pg: &ProcessGroup) -> Result<()> {
    debug!(rank = pg.rank(), "barrier");
    pg.barrier()
}

// =============================================================================
// Broadcast Operations
// =============================================================================

fn encode<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::serialization(e.to_string()))
}

fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    bincode::deserialize(bytes).map_err(|e| Error::serialization(e.to_string()))
}

/// Broadcasts a serializable value from `root`.
///
/// Non-root ranks may pass `None`; their argument is ignored. If `root`
/// itself passes `None`, every rank fails with a value error.
pub fn broadcast_value<V>(value: Option<&V>, root: usize, pg: &ProcessGroup) -> Result<V>
where
    V: Serialize + DeserializeOwned,
{
    let mut bytes = if pg.is_root(root) {
        encode(&value)?
    } else {
        Vec::new()
    };
    pg.backend().broadcast(&mut bytes, root)?;

    let received: Option<V> = decode(&bytes)?;
    received.ok_or_else(|| Error::value_error(format!("root {root} supplied no value to broadcast")))
}

/// Broadcasts a shape from `root`.
pub fn broadcast_shape(shape: Option<&[usize]>, root: usize, pg: &ProcessGroup) -> Result<Vec<usize>> {
    let shape = shape.map(<[usize]>::to_vec);
    let shape = broadcast_value(shape.as_ref(), root, pg)?;
    debug!(rank = pg.rank(), root, ?shape, "broadcast_shape");
    Ok(shape)
}

#[derive(Debug, Serialize, Deserialize)]
struct ArrayHeader {
    dtype: DType,
    shape: Vec<usize>,
}

fn broadcast_raw(
    header: Option<ArrayHeader>,
    mut bytes: Vec<u8>,
    root: usize,
    pg: &ProcessGroup,
) -> Result<(ArrayHeader, Vec<u8>)> {
    let header = broadcast_value(header.as_ref(), root, pg)?;
    pg.backend().broadcast(&mut bytes, root)?;
    debug!(
        rank = pg.rank(),
        root,
        dtype = %header.dtype,
        shape = ?header.shape,
        bytes = bytes.len(),
        "broadcast_array"
    );
    Ok((header, bytes))
}

/// Broadcasts a whole buffer, element type included, from `root`.
///
/// Non-root ranks pass `None`.
pub fn broadcast_array(buffer: Option<&DynTensor>, root: usize, pg: &ProcessGroup) -> Result<DynTensor> {
    let (header, bytes) = match buffer.filter(|_| pg.is_root(root)) {
        Some(buffer) => (
            Some(ArrayHeader {
                dtype: buffer.dtype(),
                shape: buffer.shape().to_vec(),
            }),
            buffer.to_bytes(),
        ),
        None => (None, Vec::new()),
    };

    let (header, bytes) = broadcast_raw(header, bytes, root, pg)?;
    DynTensor::from_bytes(header.dtype, &bytes, &header.shape)
}

/// Broadcasts a typed buffer from `root`.
///
/// Fails with a type error on any rank whose `T` differs from the root's
/// element type.
pub fn broadcast_tensor<T: Scalar>(
    tensor: Option<&Tensor<T>>,
    root: usize,
    pg: &ProcessGroup,
) -> Result<Tensor<T>> {
    let (header, bytes) = match tensor.filter(|_| pg.is_root(root)) {
        Some(tensor) => (
            Some(ArrayHeader {
                dtype: T::DTYPE,
                shape: tensor.shape().to_vec(),
            }),
            tensor.to_bytes(),
        ),
        None => (None, Vec::new()),
    };

    let (header, bytes) = broadcast_raw(header, bytes, root, pg)?;
    if header.dtype != T::DTYPE {
        return Err(Error::type_error(format!(
            "root broadcast a buffer of {}, expected {}",
            header.dtype,
            T::DTYPE
        )));
    }
    Tensor::from_bytes(&bytes, &header.shape)
}

// =============================================================================
// Gather Operations
// =============================================================================

fn gather_counts(count: usize, pg: &ProcessGroup) -> Result<Vec<usize>> {
    let n = pg.size();
    let width = core::mem::size_of::<u64>();
    let mut recv = vec![0u8; n * width];
    let counts = vec![width; n];
    let displs: Vec<usize> = (0..n).map(|r| r * width).collect();

    pg.backend()
        .all_gather_v(&(count as u64).to_le_bytes(), &mut recv, &counts, &displs)?;

    Ok(recv
        .chunks_exact(width)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word) as usize
        })
        .collect())
}

/// Gathers one serializable value from every rank, in rank order.
pub fn all_gather_value<V>(value: &V, pg: &ProcessGroup) -> Result<Vec<V>>
where
    V: Serialize + DeserializeOwned,
{
    let bytes = encode(value)?;
    let counts = gather_counts(bytes.len(), pg)?;
    let displs = displacements_from_counts(&counts);
    let mut recv = vec![0u8; buffer_len(&counts, &displs)];
    pg.backend().all_gather_v(&bytes, &mut recv, &counts, &displs)?;

    counts
        .iter()
        .zip(&displs)
        .map(|(&count, &displ)| decode(&recv[displ..displ + count]))
        .collect()
}

fn inferred_shape(shapes: &[Vec<usize>], total: usize) -> Vec<usize> {
    let Some(first) = shapes.first() else {
        return vec![total];
    };
    if first.is_empty() || shapes.iter().any(|s| s.len() != first.len() || s[1..] != first[1..]) {
        return vec![total];
    }

    let mut shape = first.clone();
    shape[0] = shapes.iter().map(|s| s[0]).sum();
    shape
}

/// Gathers every rank's buffer, concatenated in rank order, onto every rank.
///
/// The result takes `expected_shape` when given. Otherwise, when all
/// contributions agree on their trailing extents the leading extents are
/// summed; if they disagree, or are 0-dimensional, the result is flat.
pub fn all_gather_v<T: Scalar>(
    local: &Tensor<T>,
    expected_shape: Option<&[usize]>,
    pg: &ProcessGroup,
) -> Result<Tensor<T>> {
    let shapes = all_gather_value(&local.shape().to_vec(), pg)?;
    let counts: Vec<usize> = shapes.iter().map(|s| s.iter().product()).collect();
    let displs = displacements_from_counts(&counts);
    let len = buffer_len(&counts, &displs);

    let width = core::mem::size_of::<T>();
    let mut recv = vec![0u8; len * width];
    pg.backend().all_gather_v(
        &local.to_bytes(),
        &mut recv,
        &to_bytes_scaled(&counts, width),
        &to_bytes_scaled(&displs, width),
    )?;
    debug!(rank = pg.rank(), ?counts, ?displs, "all_gather_v");

    let shape = match expected_shape {
        Some(shape) => shape.to_vec(),
        None => inferred_shape(&shapes, len),
    };
    Tensor::from_bytes(&recv, &shape).map_err(|_| {
        Error::value_error(format!(
            "gathered {len} elements cannot take shape {shape:?}"
        ))
    })
}

/// Gathers a type-erased buffer; every rank must hold the same element type.
pub fn all_gather_v_dyn(
    local: &DynTensor,
    expected_shape: Option<&[usize]>,
    pg: &ProcessGroup,
) -> Result<DynTensor> {
    let dtypes = all_gather_value(&local.dtype(), pg)?;
    if let Some(other) = dtypes.iter().find(|&&d| d != local.dtype()) {
        return Err(Error::type_error(format!(
            "all_gather_v over mixed element types {} and {other}",
            local.dtype()
        )));
    }

    macro_rules! gather {
        ($($variant:ident),*) => {
            match local {
                $(DynTensor::$variant(t) => all_gather_v(t, expected_shape, pg).map(DynTensor::from),)*
            }
        };
    }
    gather!(F32, F64, I8, I16, I32, I64, U8, U32, U64)
}

// =============================================================================
// Scatter Operations
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct ScatterPlan {
    shapes: Vec<Vec<usize>>,
    error: Option<String>,
}

fn plan_scatter<T: Scalar>(
    root_buffer: Option<&Tensor<T>>,
    displacements: Option<&[usize]>,
    shapes: Option<&[Vec<usize>]>,
    pg: &ProcessGroup,
) -> (ScatterPlan, Vec<usize>) {
    let fail = |error: String| {
        (
            ScatterPlan {
                shapes: Vec::new(),
                error: Some(error),
            },
            Vec::new(),
        )
    };

    let (Some(buffer), Some(shapes)) = (root_buffer, shapes) else {
        return fail("scatter_v root must supply a buffer and per-rank shapes".to_string());
    };
    if shapes.len() != pg.size() {
        return fail(format!(
            "scatter_v got {} shapes for {} processes",
            shapes.len(),
            pg.size()
        ));
    }

    let counts: Vec<usize> = shapes.iter().map(|s| s.iter().product()).collect();
    let displs = displacements.map_or_else(|| displacements_from_counts(&counts), <[usize]>::to_vec);
    if displs.len() != pg.size() {
        return fail(format!(
            "scatter_v got {} displacements for {} processes",
            displs.len(),
            pg.size()
        ));
    }
    if let Some(rank) = (0..counts.len()).find(|&r| displs[r] + counts[r] > buffer.numel()) {
        return fail(format!(
            "scatter_v piece for rank {rank} ends at {}, buffer holds {}",
            displs[rank] + counts[rank],
            buffer.numel()
        ));
    }

    (
        ScatterPlan {
            shapes: shapes.to_vec(),
            error: None,
        },
        displs,
    )
}

/// Scatters pieces of the root's flat buffer, one shaped piece per rank.
///
/// `root_buffer`, `displacements` and `shapes` are only read on `root`.
/// Displacements default to [`displacements_from_counts`] over the
/// element counts of `shapes`.
pub fn scatter_v<T: Scalar>(
    root_buffer: Option<&Tensor<T>>,
    displacements: Option<&[usize]>,
    shapes: Option<&[Vec<usize>]>,
    root: usize,
    pg: &ProcessGroup,
) -> Result<Tensor<T>> {
    let (plan, displs) = if pg.is_root(root) {
        let (plan, displs) = plan_scatter(root_buffer, displacements, shapes, pg);
        (Some(plan), displs)
    } else {
        (None, Vec::new())
    };

    let plan: ScatterPlan = broadcast_value(plan.as_ref(), root, pg)?;
    if let Some(error) = plan.error {
        return Err(Error::value_error(error));
    }
    if plan.shapes.len() != pg.size() {
        return Err(Error::internal("scatter plan does not cover the group"));
    }

    let width = core::mem::size_of::<T>();
    let counts: Vec<usize> = plan.shapes.iter().map(|s| s.iter().product()).collect();
    let send = root_buffer
        .filter(|_| pg.is_root(root))
        .map(Tensor::to_bytes)
        .unwrap_or_default();

    let mut recv = vec![0u8; counts[pg.rank()] * width];
    pg.backend().scatter_v(
        &send,
        &to_bytes_scaled(&counts, width),
        &to_bytes_scaled(&displs, width),
        &mut recv,
        root,
    )?;
    debug!(rank = pg.rank(), root, ?counts, "scatter_v");

    Tensor::from_bytes(&recv, &plan.shapes[pg.rank()])
}

// =============================================================================
// All-to-All Operations
// =============================================================================

/// Exchanges element `r` of every rank's vector with rank `r`.
///
/// `local` must be 1-D with exactly one element per process; the result on
/// rank `r` holds element `r` of every rank, in rank order.
pub fn all_to_all<T: Scalar>(local: &Tensor<T>, pg: &ProcessGroup) -> Result<Tensor<T>> {
    if local.ndim() != 1 || local.numel() != pg.size() {
        return Err(Error::value_error(format!(
            "all_to_all needs a 1-D buffer of {} elements, got shape {:?}",
            pg.size(),
            local.shape()
        )));
    }

    let ones = vec![1; pg.size()];
    all_to_all_v(local, &ones, &ones, None, None, None, pg)
}

/// Personalized variable-length exchange.
///
/// Rank `r` receives `send_counts[me]` elements from every peer `me`, read
/// at `send_displs[r]`, and stores what it receives from rank `s` at
/// `recv_displs[s]`. Missing displacements default to
/// [`displacements_from_counts`]. The result is reshaped to `recv_shape`
/// when given.
pub fn all_to_all_v<T: Scalar>(
    local: &Tensor<T>,
    send_counts: &[usize],
    recv_counts: &[usize],
    send_displs: Option<&[usize]>,
    recv_displs: Option<&[usize]>,
    recv_shape: Option<&[usize]>,
    pg: &ProcessGroup,
) -> Result<Tensor<T>> {
    check_per_rank("send_counts", send_counts, pg)?;
    check_per_rank("recv_counts", recv_counts, pg)?;

    let send_displs = send_displs.map_or_else(|| displacements_from_counts(send_counts), <[usize]>::to_vec);
    let recv_displs = recv_displs.map_or_else(|| displacements_from_counts(recv_counts), <[usize]>::to_vec);
    check_per_rank("send_displs", &send_displs, pg)?;
    check_per_rank("recv_displs", &recv_displs, pg)?;

    if buffer_len(send_counts, &send_displs) > local.numel() {
        return Err(Error::value_error(format!(
            "all_to_all_v sends past the end of a {}-element buffer",
            local.numel()
        )));
    }

    let len = buffer_len(recv_counts, &recv_displs);
    let shape = recv_shape.map_or_else(|| vec![len], <[usize]>::to_vec);
    if shape.iter().product::<usize>() != len {
        return Err(Error::value_error(format!(
            "all_to_all_v receives {len} elements, cannot take shape {shape:?}"
        )));
    }

    let width = core::mem::size_of::<T>();
    let mut recv = vec![0u8; len * width];
    pg.backend().all_to_all_v(
        &local.to_bytes(),
        &to_bytes_scaled(send_counts, width),
        &to_bytes_scaled(&send_displs, width),
        &mut recv,
        &to_bytes_scaled(recv_counts, width),
        &to_bytes_scaled(&recv_displs, width),
    )?;
    debug!(rank = pg.rank(), ?send_counts, ?recv_counts, "all_to_all_v");

    Tensor::from_bytes(&recv, &shape)
}

// =============================================================================
// All-Reduce Operations
// =============================================================================

/// Every rank's flat buffer, indexed by rank.
fn gather_pieces<T: Scalar>(local: &Tensor<T>, pg: &ProcessGroup) -> Result<Vec<Vec<T>>> {
    let counts = gather_counts(local.numel(), pg)?;
    let displs = displacements_from_counts(&counts);
    let len = buffer_len(&counts, &displs);

    let width = core::mem::size_of::<T>();
    let mut recv = vec![0u8; len * width];
    pg.backend().all_gather_v(
        &local.to_bytes(),
        &mut recv,
        &to_bytes_scaled(&counts, width),
        &to_bytes_scaled(&displs, width),
    )?;

    let flat = Tensor::<T>::from_bytes(&recv, &[len])?.to_vec();
    Ok(counts
        .iter()
        .zip(&displs)
        .map(|(&count, &displ)| flat[displ..displ + count].to_vec())
        .collect())
}

fn fold_ranks<T: Numeric>(pieces: &[Vec<T>], ranks: &[usize], n: usize, op: ReduceOp) -> Vec<T> {
    (0..n)
        .map(|i| {
            ranks
                .iter()
                .fold(op.identity::<T>(), |acc, &r| op.apply(acc, pieces[r][i]))
        })
        .collect()
}

/// Combines every rank's buffer elementwise with `op`; all ranks receive the
/// result.
pub fn all_reduce<T: Numeric>(local: &Tensor<T>, op: ReduceOp, pg: &ProcessGroup) -> Result<Tensor<T>> {
    let pieces = gather_pieces(local, pg)?;
    if pieces.iter().any(|p| p.len() != local.numel()) {
        return Err(Error::value_error(
            "all_reduce needs the same number of elements on every rank",
        ));
    }

    let ranks: Vec<usize> = (0..pg.size()).collect();
    let reduced = fold_ranks(&pieces, &ranks, local.numel(), op);
    debug!(rank = pg.rank(), op = op.name(), elements = local.numel(), "all_reduce");
    Tensor::from_vec(reduced, local.shape())
}

/// Combines buffers elementwise with `op` across the ranks that share every
/// grid coordinate with this process except along `grid_axis`.
///
/// Buffers only need to agree in length within a grid line; different lines
/// may hold different amounts of data.
pub fn all_reduce_along<T: Numeric>(
    grid: &ProcessGrid,
    grid_axis: usize,
    local: &Tensor<T>,
    op: ReduceOp,
    pg: &ProcessGroup,
) -> Result<Tensor<T>> {
    if grid.size() != pg.size() || grid_axis >= grid.ndim() {
        return Err(Error::value_error(format!(
            "grid {:?} axis {grid_axis} does not describe a group of {}",
            grid.dims(),
            pg.size()
        )));
    }

    let pieces = gather_pieces(local, pg)?;

    // Checked for every line, so the verdict is the same on every rank.
    let line_head = |rank: usize| {
        let mut coord = grid.coord_of(rank);
        coord[grid_axis] = 0;
        grid.rank_of(&coord)
    };
    if let Some(rank) = (0..pg.size()).find(|&r| pieces[r].len() != pieces[line_head(r)].len()) {
        return Err(Error::value_error(format!(
            "all_reduce_along: rank {rank} holds {} elements, its grid line holds {}",
            pieces[rank].len(),
            pieces[line_head(rank)].len()
        )));
    }

    let line = grid.line_ranks(grid_axis);
    let reduced = fold_ranks(&pieces, &line, local.numel(), op);
    debug!(rank = pg.rank(), op = op.name(), grid_axis, ?line, "all_reduce_along");
    Tensor::from_vec(reduced, local.shape())
}

// =============================================================================
// Tests
// =============================================================================
