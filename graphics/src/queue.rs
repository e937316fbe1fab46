//! Command queues with double-buffered command allocators.
//!
//! A [`Queue`] records into one of two allocators. While the GPU may still be
//! consuming lists from one allocator, new lists are recorded into the other.
//! The pair only swaps once the queue's private fence proves that the idle
//! allocator's work has landed, so no allocator is ever reset under the GPU.
//!
//! ```text
//! start_recording ──► CommandList ──► execute ──► signal(last + 1)
//!        ▲                                              │
//!        └────── swap when landed >= other's value ◄────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::{GpuAllocator, GpuQueue, GpuSurface};
use crate::command::CommandList;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, violation};
use crate::fence::Fence;
use crate::instance::AdapterId;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Counters describing a queue's activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Command lists executed.
    pub submissions: u64,
    /// Times the current and other allocators were swapped.
    pub allocator_swaps: u64,
    /// Allocator resets performed.
    pub allocator_resets: u64,
}

#[derive(Debug)]
struct AllocatorRing {
    current: GpuAllocator,
    other: GpuAllocator,
    /// Tracking-fence value that must land before `other` may be reset.
    other_last_fence_value: u64,
}

/// A command queue.
///
/// Lists produced by [`Queue::start_recording`] execute in submission order.
pub struct Queue {
    device: Weak<GraphicsDevice>,
    adapter: AdapterId,
    id: u64,
    label: String,
    gpu: GpuQueue,
    allocators: Mutex<AllocatorRing>,
    fence: Fence,
    stats: Mutex<QueueStats>,
}

impl Queue {
    pub(crate) fn new(device: &Arc<GraphicsDevice>, label: &str) -> Result<Self, GraphicsError> {
        let gpu = device.gpu().create_queue(label)?;
        let allocators = AllocatorRing {
            current: device.gpu().create_allocator(),
            other: device.gpu().create_allocator(),
            other_last_fence_value: 0,
        };
        Ok(Self {
            device: Arc::downgrade(device),
            adapter: device.adapter(),
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            label: label.to_string(),
            gpu,
            allocators: Mutex::new(allocators),
            fence: device.new_fence(),
            stats: Mutex::new(QueueStats::default()),
        })
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }

    /// Adapter the queue submits to.
    pub fn adapter(&self) -> AdapterId {
        self.adapter
    }

    /// Unique queue id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn gpu(&self) -> &GpuQueue {
        &self.gpu
    }

    /// Activity counters.
    pub fn stats(&self) -> QueueStats {
        *self.stats.lock()
    }

    /// Value the private tracking fence will reach once everything
    /// submitted so far completes.
    pub fn last_submitted_value(&self) -> u64 {
        self.fence.last_signalled_value()
    }

    /// Highest tracking-fence value known to have landed.
    pub fn last_completed_value(&self) -> u64 {
        self.fence.last_landed_value()
    }

    /// Jobs queued on the GPU timeline but not yet consumed.
    pub fn pending_work(&self) -> usize {
        self.gpu.pending()
    }

    /// Begin recording a command list.
    ///
    /// If the idle allocator's work has landed and nothing is being recorded
    /// into the current one, the two are swapped and the new current one is
    /// reset. Otherwise recording continues in the current allocator.
    ///
    /// # Errors
    ///
    /// Propagates allocator reset failures.
    pub fn start_recording(&self) -> Result<CommandList, GraphicsError> {
        let mut ring = self.allocators.lock();

        let landed = self.fence.last_landed_value();
        if landed >= ring.other_last_fence_value && ring.current.open_lists() == 0 {
            ring.other.reset(landed)?;
            let ring = &mut *ring;
            std::mem::swap(&mut ring.current, &mut ring.other);
            ring.other_last_fence_value = self.fence.last_signalled_value();

            let mut stats = self.stats.lock();
            stats.allocator_swaps += 1;
            stats.allocator_resets += 1;
            log::debug!(
                "Queue {}: swapped to allocator {} (landed {landed}, other busy until {})",
                self.label,
                ring.current.id(),
                ring.other_last_fence_value
            );
        }

        let list = ring.current.begin_list();
        log::trace!("Queue {}: recording on allocator {}", self.label, ring.current.id());
        Ok(CommandList::new(self.id, self.adapter, list))
    }

    /// Close and submit `list`, then signal the tracking fence.
    ///
    /// Returns the tracking-fence value that marks the list's completion.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::ForeignCommandList`] if `list` was recorded on another queue
    /// - [`GraphicsError::StaleCommandList`] if its allocator was reset meanwhile
    pub fn execute(&self, list: CommandList) -> Result<u64, GraphicsError> {
        if list.queue_id() != self.id {
            return Err(violation(GraphicsError::ForeignCommandList));
        }

        // Serialize with start_recording so fence values stay in submission order.
        let _ring = self.allocators.lock();

        let value = self.fence.last_signalled_value() + 1;
        let commands = list.len();
        self.gpu.submit(list.into_gpu(), value)?;
        self.fence.signal(self, value)?;

        self.stats.lock().submissions += 1;
        log::trace!("Queue {}: executed {commands} commands, fence {value}", self.label);
        Ok(value)
    }

    /// Queue a present of `image` and signal the tracking fence after it,
    /// so [`Queue::flush`] also covers presentation.
    pub(crate) fn present(&self, surface: &GpuSurface, image: u32) -> Result<u64, GraphicsError> {
        let _ring = self.allocators.lock();

        let value = self.fence.last_signalled_value() + 1;
        self.gpu.present(surface, image);
        self.fence.signal(self, value)?;
        Ok(value)
    }

    /// Block until everything submitted so far has completed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::Stalled`] if deferred work cannot progress.
    pub fn flush(&self) -> Result<(), GraphicsError> {
        self.fence.wait_cpu(self.fence.last_signalled_value())
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("adapter", &self.adapter)
            .field("last_submitted", &self.last_submitted_value())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(Queue: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::software::ExecutionMode;
    use crate::instance::{AdapterPreference, GraphicsInstance, InstanceParameters};

    fn queue(mode: ExecutionMode) -> (Arc<GraphicsInstance>, Arc<GraphicsDevice>, Arc<Queue>) {
        let instance =
            GraphicsInstance::with_parameters(InstanceParameters::new().with_execution_mode(mode))
                .unwrap();
        let device = instance.create_device(AdapterPreference::Discrete).unwrap();
        let queue = device.create_queue("test").unwrap();
        (instance, device, queue)
    }

    #[test]
    fn test_first_recording_swaps() {
        let (_instance, _device, queue) = queue(ExecutionMode::Deferred);
        let list = queue.start_recording().unwrap();
        assert_eq!(queue.stats().allocator_swaps, 1);
        drop(list);
    }

    #[test]
    fn test_execute_signals_next_value() {
        let (_instance, _device, queue) = queue(ExecutionMode::Threaded);
        for expected in 1..=3 {
            let list = queue.start_recording().unwrap();
            assert_eq!(queue.execute(list).unwrap(), expected);
        }
        queue.flush().unwrap();
        assert_eq!(queue.last_completed_value(), 3);
        assert_eq!(queue.stats().submissions, 3);
    }

    #[test]
    fn test_no_swap_while_other_in_flight() {
        let (instance, _device, queue) = queue(ExecutionMode::Deferred);

        // Swap 1 at start; the first list lands at value 1.
        let list = queue.start_recording().unwrap();
        queue.execute(list).unwrap();

        // Other allocator is idle since value 0 landed: swap 2.
        let list = queue.start_recording().unwrap();
        queue.execute(list).unwrap();
        assert_eq!(queue.stats().allocator_swaps, 2);

        // Nothing landed: value 1 is outstanding for the other allocator.
        let list = queue.start_recording().unwrap();
        queue.execute(list).unwrap();
        assert_eq!(queue.stats().allocator_swaps, 2);

        instance.poll();
        let list = queue.start_recording().unwrap();
        assert_eq!(queue.stats().allocator_swaps, 3);
        drop(list);
    }

    #[test]
    fn test_no_swap_with_open_list() {
        let (_instance, _device, queue) = queue(ExecutionMode::Threaded);
        let first = queue.start_recording().unwrap();
        let second = queue.start_recording().unwrap();
        assert_eq!(queue.stats().allocator_swaps, 1);
        queue.execute(first).unwrap();
        queue.execute(second).unwrap();
        queue.flush().unwrap();
    }

    #[cfg(not(feature = "fatal-contracts"))]
    #[test]
    fn test_foreign_list_rejected() {
        let (_instance, device, queue) = queue(ExecutionMode::Threaded);
        let other = device.create_queue("other").unwrap();
        let list = other.start_recording().unwrap();
        assert_eq!(
            queue.execute(list).unwrap_err(),
            GraphicsError::ForeignCommandList
        );
        assert_eq!(queue.last_submitted_value(), 0);
    }

    #[test]
    fn test_flush_with_nothing_submitted() {
        let (_instance, _device, queue) = queue(ExecutionMode::Deferred);
        assert!(queue.flush().is_ok());
    }
}
