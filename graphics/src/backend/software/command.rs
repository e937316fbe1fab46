//! Command allocators and command lists.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::memory::{self, Allocation};
use crate::error::{GraphicsError, violation};
use crate::types::BarrierState;

static NEXT_ALLOCATOR_ID: AtomicU64 = AtomicU64::new(1);

/// A recorded command.
#[derive(Debug)]
pub(crate) enum Command {
    Barrier {
        allocation: u64,
        before: BarrierState,
        after: BarrierState,
    },
    Copy {
        dst: Arc<Allocation>,
        src: Arc<Allocation>,
    },
    CopyFromStaging {
        dst: Arc<Allocation>,
        src: Arc<Allocation>,
        bytes_per_row: u32,
        width: u32,
        height: u32,
    },
}

impl Command {
    pub(crate) fn execute(&self) {
        match self {
            Command::Barrier {
                allocation,
                before,
                after,
            } => {
                log::trace!("barrier on allocation {allocation}: {before:?} -> {after:?}");
            }
            Command::Copy { dst, src } => memory::copy_resource(dst, src),
            Command::CopyFromStaging {
                dst,
                src,
                bytes_per_row,
                width,
                height,
            } => memory::copy_buffer_to_texture(dst, src, *bytes_per_row, *width, *height),
        }
    }
}

#[derive(Debug, Default)]
struct AllocatorState {
    generation: u64,
    open_lists: u32,
    last_submitted: u64,
}

/// Backing storage for command lists.
///
/// An allocator may only be reset once the GPU has finished every list
/// recorded from it and no list is still being recorded.
#[derive(Debug)]
pub(crate) struct SoftwareAllocator {
    id: u64,
    state: Mutex<AllocatorState>,
}

impl SoftwareAllocator {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(AllocatorState::default()),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn open_lists(&self) -> u32 {
        self.state.lock().open_lists
    }

    #[cfg(test)]
    pub(crate) fn resets(&self) -> u64 {
        self.state.lock().generation
    }

    /// Reclaim the allocator's memory. `completed` is the landed value of
    /// the fence that tracks this allocator's submissions.
    pub(crate) fn reset(&self, completed: u64) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        if state.open_lists > 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "command allocator {} reset with {} open command lists",
                self.id, state.open_lists
            )));
        }
        if state.last_submitted > completed {
            return Err(violation(GraphicsError::AllocatorInFlight {
                pending: state.last_submitted,
                completed,
            }));
        }
        state.generation += 1;
        Ok(())
    }

    pub(crate) fn begin_list(self: &Arc<Self>) -> SoftwareCommandList {
        let generation = {
            let mut state = self.state.lock();
            state.open_lists += 1;
            state.generation
        };
        SoftwareCommandList {
            allocator: Arc::clone(self),
            generation,
            commands: Vec::new(),
            closed: false,
        }
    }

    fn close_list(&self, generation: u64, fence_value: u64) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return Err(violation(GraphicsError::StaleCommandList));
        }
        state.open_lists = state.open_lists.saturating_sub(1);
        state.last_submitted = state.last_submitted.max(fence_value);
        Ok(())
    }

    fn abandon_list(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.open_lists = state.open_lists.saturating_sub(1);
        }
    }
}

/// A recording in progress.
#[derive(Debug)]
pub(crate) struct SoftwareCommandList {
    allocator: Arc<SoftwareAllocator>,
    generation: u64,
    commands: Vec<Command>,
    closed: bool,
}

impl SoftwareCommandList {
    pub(crate) fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub(crate) fn len(&self) -> usize {
        self.commands.len()
    }

    /// Close the list for submission, marking its allocator busy until
    /// `fence_value` lands.
    pub(crate) fn close(mut self, fence_value: u64) -> Result<Vec<Command>, GraphicsError> {
        self.allocator.close_list(self.generation, fence_value)?;
        self.closed = true;
        Ok(std::mem::take(&mut self.commands))
    }
}

impl Drop for SoftwareCommandList {
    fn drop(&mut self) {
        if !self.closed {
            log::trace!(
                "command list on allocator {} dropped without execution",
                self.allocator.id
            );
            self.allocator.abandon_list(self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_requires_landed_work() {
        let allocator = Arc::new(SoftwareAllocator::new());
        let list = allocator.begin_list();
        assert_eq!(allocator.open_lists(), 1);
        list.close(3).unwrap();
        assert_eq!(allocator.open_lists(), 0);

        #[cfg(not(feature = "fatal-contracts"))]
        assert_eq!(
            allocator.reset(2),
            Err(GraphicsError::AllocatorInFlight {
                pending: 3,
                completed: 2
            })
        );
        allocator.reset(3).unwrap();
        assert_eq!(allocator.resets(), 1);
    }

    #[test]
    fn test_reset_rejected_with_open_list() {
        let allocator = Arc::new(SoftwareAllocator::new());
        let list = allocator.begin_list();
        assert!(allocator.reset(0).is_err());
        drop(list);
        assert_eq!(allocator.open_lists(), 0);
        assert!(allocator.reset(0).is_ok());
    }

    #[cfg(not(feature = "fatal-contracts"))]
    #[test]
    fn test_stale_list_rejected() {
        let allocator = Arc::new(SoftwareAllocator::new());
        let mut list = allocator.begin_list();
        list.record(Command::Barrier {
            allocation: 1,
            before: BarrierState::Common,
            after: BarrierState::CopyDestination,
        });
        assert_eq!(list.len(), 1);

        // Force a reset underneath the open list.
        allocator.state.lock().open_lists = 0;
        allocator.reset(0).unwrap();

        assert_eq!(list.close(1).unwrap_err(), GraphicsError::StaleCommandList);
    }
}
