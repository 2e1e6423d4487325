//! `ProcessGroup` - Process Group Abstraction
//!
//! Provides a high-level handle on the set of cooperating processes that
//! share a distributed array, and the `World` that owns the default group.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::sync::Arc;

use tracing::debug;

use distarray_core::error::Result;

use crate::backend::{Backend, MockBackend};

// =============================================================================
// ProcessGroup
// =============================================================================

/// A group of processes that can communicate with each other.
///
/// Cloning is cheap; clones share the same backend.
#[derive(Clone)]
pub struct ProcessGroup {
    backend: Arc<dyn Backend>,
}

impl ProcessGroup {
    /// Creates a new process group over all ranks of `backend`.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Creates a single-rank mock process group for testing.
    #[must_use]
    pub fn mock() -> Self {
        Self::new(Arc::new(MockBackend::single()))
    }

    /// Creates one process group per rank of an in-process mock world.
    #[must_use]
    pub fn mock_world(world_size: usize) -> Vec<Self> {
        MockBackend::create_world(world_size)
            .into_iter()
            .map(|backend| Self::new(Arc::new(backend)))
            .collect()
    }

    /// Returns the backend.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Returns the rank of this process.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.backend.rank()
    }

    /// Returns the number of processes in this group.
    #[must_use]
    pub fn size(&self) -> usize {
        self.backend.world_size()
    }

    /// Returns true if this process is `root`.
    #[must_use]
    pub fn is_root(&self, root: usize) -> bool {
        self.rank() == root
    }

    /// Synchronizes all processes in the group.
    pub fn barrier(&self) -> Result<()> {
        self.backend.barrier()
    }
}

impl core::fmt::Debug for ProcessGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProcessGroup")
            .field("backend", &self.backend.name())
            .field("rank", &self.rank())
            .field("size", &self.size())
            .finish()
    }
}

// =============================================================================
// World
// =============================================================================

/// Global distributed world.
pub struct World {
    default_group: ProcessGroup,
}

impl World {
    /// Initializes the distributed world.
    pub fn init(backend: Arc<dyn Backend>) -> Self {
        Self {
            default_group: ProcessGroup::new(backend),
        }
    }

    /// Creates a single-rank mock world for testing.
    #[must_use]
    pub fn mock() -> Self {
        Self {
            default_group: ProcessGroup::mock(),
        }
    }

    /// Runs `f` once per rank of an `n`-rank mock world, each on its own
    /// thread, and returns the per-rank results in rank order.
    ///
    /// A panic on any rank is propagated to the caller.
    pub fn launch_mock<R, F>(n: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(ProcessGroup) -> R + Sync,
    {
        debug!(world_size = n, "launching mock world");
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = ProcessGroup::mock_world(n)
                .into_iter()
                .map(|group| scope.spawn(move || f(group)))
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(value) => value,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }

    /// Returns the default process group.
    #[must_use]
    pub fn default_group(&self) -> &ProcessGroup {
        &self.default_group
    }

    /// Returns the rank of this process.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.default_group.rank()
    }

    /// Returns the world size.
    #[must_use]
    pub fn world_size(&self) -> usize {
        self.default_group.size()
    }

    /// Checks if this is the main process (rank 0).
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.rank() == 0
    }

    /// Synchronizes all processes.
    pub fn barrier(&self) -> Result<()> {
        self.default_group.barrier()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_group_mock() {
        let pg = ProcessGroup::mock();
        assert_eq!(pg.rank(), 0);
        assert_eq!(pg.size(), 1);
        assert!(pg.is_root(0));
        assert_eq!(pg.backend().name(), "mock");
    }

    #[test]
    fn test_world_mock() {
        let world = World::mock();
        assert_eq!(world.rank(), 0);
        assert_eq!(world.world_size(), 1);
        assert!(world.is_main());
        world.barrier().unwrap();
    }

    #[test]
    fn test_launch_mock_rank_order() {
        let ranks = World::launch_mock(4, |pg| {
            pg.barrier().unwrap();
            (pg.rank(), pg.size())
        });
        assert_eq!(ranks, vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn test_process_group_clone() {
        let pg = ProcessGroup::mock();
        let pg2 = pg.clone();
        assert_eq!(pg.rank(), pg2.rank());
        assert_eq!(pg.size(), pg2.size());
        assert!(format!("{pg:?}").contains("mock"));
    }
}
