//! Backend - Communication Backend Abstractions
//!
//! Provides the backend trait that every collective in this crate is built
//! on, plus an in-process implementation for running a whole group as
//! threads. Backends move raw bytes; counts and displacements are measured
//! in bytes, and typing happens one layer up.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use distarray_core::error::{Error, Result};

// =============================================================================
// Backend Trait
// =============================================================================

/// Trait for distributed communication backends.
///
/// Every method except the accessors is collective: all ranks of the group
/// must call it, in the same order, before any of them returns.
pub trait Backend: Send + Sync {
    /// Returns the name of the backend.
    fn name(&self) -> &str;

    /// Returns the rank of this process.
    fn rank(&self) -> usize;

    /// Returns the total world size.
    fn world_size(&self) -> usize;

    /// Synchronizes all processes.
    fn barrier(&self) -> Result<()>;

    /// Replaces `data` on every rank with the contents of `data` on `root`.
    fn broadcast(&self, data: &mut Vec<u8>, root: usize) -> Result<()>;

    /// Gathers `send` from every rank into `recv`, placing rank `r`'s bytes at
    /// `displs[r]..displs[r] + counts[r]`.
    fn all_gather_v(
        &self,
        send: &[u8],
        recv: &mut [u8],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<()>;

    /// Sends `send[displs[r]..displs[r] + counts[r]]` from `root` to rank `r`.
    ///
    /// `send`, `counts` and `displs` are only read on `root`.
    fn scatter_v(
        &self,
        send: &[u8],
        counts: &[usize],
        displs: &[usize],
        recv: &mut [u8],
        root: usize,
    ) -> Result<()>;

    /// Personalized exchange: the bytes at `send_displs[r]` (length
    /// `send_counts[r]`) go to rank `r`, and the bytes from rank `r` land at
    /// `recv_displs[r]` (length `recv_counts[r]`).
    fn all_to_all_v(
        &self,
        send: &[u8],
        send_counts: &[usize],
        send_displs: &[usize],
        recv: &mut [u8],
        recv_counts: &[usize],
        recv_displs: &[usize],
    ) -> Result<()>;
}

// =============================================================================
// Helpers
// =============================================================================

fn window<'a>(buf: &'a [u8], displ: usize, count: usize, what: &str) -> Result<&'a [u8]> {
    buf.get(displ..displ + count).ok_or_else(|| {
        Error::value_error(format!(
            "{what}: window {displ}..{} exceeds buffer of {} bytes",
            displ + count,
            buf.len()
        ))
    })
}

fn place(recv: &mut [u8], displ: usize, bytes: &[u8], what: &str) -> Result<()> {
    let len = recv.len();
    let dst = recv.get_mut(displ..displ + bytes.len()).ok_or_else(|| {
        Error::value_error(format!(
            "{what}: window {displ}..{} exceeds buffer of {len} bytes",
            displ + bytes.len()
        ))
    })?;
    dst.copy_from_slice(bytes);
    Ok(())
}

fn check_arity(what: &str, slice: &[usize], world_size: usize) -> Result<()> {
    if slice.len() != world_size {
        return Err(Error::value_error(format!(
            "{what}: expected {world_size} entries, got {}",
            slice.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Rendezvous for Mock Backend
// =============================================================================

/// All parcels of one completed exchange, indexed `[src][dst]`.
type Round = Arc<Vec<Vec<Vec<u8>>>>;

#[derive(Debug)]
struct RendezvousState {
    /// Number of completed exchanges.
    generation: u64,
    /// Ranks that have deposited for the current exchange.
    arrived: usize,
    /// Parcels deposited so far for the current exchange.
    inbox: Vec<Vec<Vec<u8>>>,
    /// Result of the most recently completed exchange.
    published: Round,
}

/// Shared state for mock distributed communication.
///
/// Each exchange completes only when every rank has deposited its parcels;
/// the last rank to arrive publishes the round and wakes the others.
#[derive(Debug)]
struct Rendezvous {
    world_size: usize,
    state: Mutex<RendezvousState>,
    ready: Condvar,
}

impl Rendezvous {
    fn new(world_size: usize) -> Self {
        Self {
            world_size,
            state: Mutex::new(RendezvousState {
                generation: 0,
                arrived: 0,
                inbox: vec![Vec::new(); world_size],
                published: Arc::new(Vec::new()),
            }),
            ready: Condvar::new(),
        }
    }

    /// Deposits `parcels[dst]` for every destination and blocks until all
    /// ranks have done the same.
    fn exchange(&self, rank: usize, parcels: Vec<Vec<u8>>) -> Round {
        let mut state = self.state.lock();
        let generation = state.generation;
        state.inbox[rank] = parcels;
        state.arrived += 1;

        if state.arrived == self.world_size {
            let round = std::mem::replace(&mut state.inbox, vec![Vec::new(); self.world_size]);
            state.published = Arc::new(round);
            state.arrived = 0;
            state.generation += 1;
            trace!(rank, generation, "rendezvous complete");
            self.ready.notify_all();
            return Arc::clone(&state.published);
        }

        trace!(rank, generation, arrived = state.arrived, "rendezvous waiting");
        while state.generation == generation {
            self.ready.wait(&mut state);
        }
        Arc::clone(&state.published)
    }
}

// =============================================================================
// Mock Backend
// =============================================================================

/// A backend that runs every rank of a group inside one process.
///
/// Each rank is driven from its own thread; collectives block until all
/// ranks have entered them, exactly like a real transport.
pub struct MockBackend {
    rank: usize,
    world_size: usize,
    rendezvous: Arc<Rendezvous>,
}

impl MockBackend {
    /// Creates a collection of mock backends sharing one rendezvous.
    #[must_use]
    pub fn create_world(world_size: usize) -> Vec<Self> {
        let rendezvous = Arc::new(Rendezvous::new(world_size));

        (0..world_size)
            .map(|rank| MockBackend {
                rank,
                world_size,
                rendezvous: Arc::clone(&rendezvous),
            })
            .collect()
    }

    /// Creates a single mock backend (rank 0, world size 1).
    #[must_use]
    pub fn single() -> Self {
        MockBackend {
            rank: 0,
            world_size: 1,
            rendezvous: Arc::new(Rendezvous::new(1)),
        }
    }

    fn exchange(&self, parcels: Vec<Vec<u8>>) -> Round {
        self.rendezvous.exchange(self.rank, parcels)
    }

    fn parcel<'a>(&self, round: &'a Round, src: usize) -> &'a [u8] {
        round
            .get(src)
            .and_then(|row| row.get(self.rank))
            .map_or(&[][..], Vec::as_slice)
    }

    fn check_root(&self, root: usize) -> Result<()> {
        if root >= self.world_size {
            return Err(Error::value_error(format!(
                "root {root} out of range for world of size {}",
                self.world_size
            )));
        }
        Ok(())
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn barrier(&self) -> Result<()> {
        self.exchange(vec![Vec::new(); self.world_size]);
        Ok(())
    }

    fn broadcast(&self, data: &mut Vec<u8>, root: usize) -> Result<()> {
        self.check_root(root)?;

        let parcels = if self.rank == root {
            vec![data.clone(); self.world_size]
        } else {
            vec![Vec::new(); self.world_size]
        };
        let round = self.exchange(parcels);

        if self.rank != root {
            *data = self.parcel(&round, root).to_vec();
        }
        Ok(())
    }

    fn all_gather_v(
        &self,
        send: &[u8],
        recv: &mut [u8],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<()> {
        check_arity("all_gather_v counts", counts, self.world_size)?;
        check_arity("all_gather_v displacements", displs, self.world_size)?;

        let round = self.exchange(vec![send.to_vec(); self.world_size]);

        for src in 0..self.world_size {
            let bytes = self.parcel(&round, src);
            if bytes.len() != counts[src] {
                return Err(Error::value_error(format!(
                    "all_gather_v: rank {src} sent {} bytes, expected {}",
                    bytes.len(),
                    counts[src]
                )));
            }
            place(recv, displs[src], bytes, "all_gather_v")?;
        }
        Ok(())
    }

    fn scatter_v(
        &self,
        send: &[u8],
        counts: &[usize],
        displs: &[usize],
        recv: &mut [u8],
        root: usize,
    ) -> Result<()> {
        self.check_root(root)?;

        let parcels = if self.rank == root {
            check_arity("scatter_v counts", counts, self.world_size)?;
            check_arity("scatter_v displacements", displs, self.world_size)?;
            (0..self.world_size)
                .map(|dst| window(send, displs[dst], counts[dst], "scatter_v").map(<[u8]>::to_vec))
                .collect::<Result<Vec<_>>>()?
        } else {
            vec![Vec::new(); self.world_size]
        };
        let round = self.exchange(parcels);

        let bytes = self.parcel(&round, root);
        if bytes.len() != recv.len() {
            return Err(Error::value_error(format!(
                "scatter_v: received {} bytes into a buffer of {}",
                bytes.len(),
                recv.len()
            )));
        }
        recv.copy_from_slice(bytes);
        Ok(())
    }

    fn all_to_all_v(
        &self,
        send: &[u8],
        send_counts: &[usize],
        send_displs: &[usize],
        recv: &mut [u8],
        recv_counts: &[usize],
        recv_displs: &[usize],
    ) -> Result<()> {
        check_arity("all_to_all_v send counts", send_counts, self.world_size)?;
        check_arity("all_to_all_v send displacements", send_displs, self.world_size)?;
        check_arity("all_to_all_v recv counts", recv_counts, self.world_size)?;
        check_arity("all_to_all_v recv displacements", recv_displs, self.world_size)?;

        let parcels = (0..self.world_size)
            .map(|dst| {
                window(send, send_displs[dst], send_counts[dst], "all_to_all_v").map(<[u8]>::to_vec)
            })
            .collect::<Result<Vec<_>>>()?;
        let round = self.exchange(parcels);

        for src in 0..self.world_size {
            let bytes = self.parcel(&round, src);
            if bytes.len() != recv_counts[src] {
                return Err(Error::value_error(format!(
                    "all_to_all_v: rank {src} sent {} bytes, expected {}",
                    bytes.len(),
                    recv_counts[src]
                )));
            }
            place(recv, recv_displs[src], bytes, "all_to_all_v")?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn run<R: Send>(n: usize, f: impl Fn(&MockBackend) -> R + Sync) -> Vec<R> {
        let backends = MockBackend::create_world(n);
        let f = &f;
        std::thread::scope(|s| {
            let handles: Vec<_> = backends.iter().map(|b| s.spawn(move || f(b))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_mock_backend_single() {
        let backend = MockBackend::single();
        assert_eq!(backend.rank(), 0);
        assert_eq!(backend.world_size(), 1);
        assert_eq!(backend.name(), "mock");
    }

    #[test]
    fn test_mock_backend_world() {
        let backends = MockBackend::create_world(4);
        assert_eq!(backends.len(), 4);

        for (i, b) in backends.iter().enumerate() {
            assert_eq!(b.rank(), i);
            assert_eq!(b.world_size(), 4);
        }
    }

    #[test]
    fn test_mock_broadcast() {
        let results = run(3, |b| {
            let mut data = if b.rank() == 1 { vec![1, 2, 3] } else { vec![] };
            b.broadcast(&mut data, 1).unwrap();
            data
        });
        assert!(results.iter().all(|d| d == &[1, 2, 3]));
    }

    #[test]
    fn test_mock_all_gather_v() {
        let results = run(3, |b| {
            let send = vec![b.rank() as u8; b.rank()];
            let mut recv = vec![0u8; 3];
            b.all_gather_v(&send, &mut recv, &[0, 1, 2], &[0, 0, 1]).unwrap();
            recv
        });
        assert!(results.iter().all(|r| r == &[1, 2, 2]));
    }

    #[test]
    fn test_mock_scatter_v() {
        let results = run(2, |b| {
            let send: Vec<u8> = if b.rank() == 0 { vec![9, 8, 7] } else { vec![] };
            let mut recv = vec![0u8; 1 + b.rank()];
            b.scatter_v(&send, &[1, 2], &[0, 1], &mut recv, 0).unwrap();
            recv
        });
        assert_eq!(results, vec![vec![9], vec![8, 7]]);
    }

    #[test]
    fn test_mock_all_to_all_v() {
        let results = run(2, |b| {
            let r = b.rank() as u8;
            let send = vec![10 * r, 10 * r + 1];
            let mut recv = vec![0u8; 2];
            b.all_to_all_v(&send, &[1, 1], &[0, 1], &mut recv, &[1, 1], &[0, 1])
                .unwrap();
            recv
        });
        assert_eq!(results, vec![vec![0, 10], vec![1, 11]]);
    }

    #[test]
    fn test_mock_repeated_rounds() {
        let results = run(4, |b| {
            let mut total = 0usize;
            for round in 0..50 {
                let mut data = vec![round as u8];
                b.broadcast(&mut data, round % 4).unwrap();
                b.barrier().unwrap();
                total += usize::from(data[0]);
            }
            total
        });
        assert!(results.iter().all(|&t| t == (0..50).sum::<usize>()));
    }

    #[test]
    fn test_mock_count_mismatch() {
        let results = run(2, |b| {
            let mut recv = vec![0u8; 4];
            b.all_gather_v(&[1, 2], &mut recv, &[1, 1], &[0, 1])
        });
        assert!(results.iter().all(Result::is_err));
    }

    #[test]
    fn test_mock_bad_root() {
        let backend = MockBackend::single();
        let mut data = vec![1];
        assert!(backend.broadcast(&mut data, 3).is_err());
    }
}
