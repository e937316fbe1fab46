//! Fences: monotonically increasing GPU timeline counters.
//!
//! A [`Fence`] tracks two values. The *signalled* value is the last value a
//! queue was asked to write once its prior work completes; it is known to the
//! CPU immediately. The *landed* value is the highest value the GPU has
//! actually written. `landed <= signalled` always holds and neither value ever
//! decreases.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::GpuFence;
use crate::error::{GraphicsError, violation};
use crate::instance::AdapterId;
use crate::queue::Queue;

/// CPU-GPU and GPU-GPU synchronization primitive.
///
/// # Example
///
/// ```
/// use tandem_graphics::{AdapterPreference, GraphicsInstance};
///
/// let instance = GraphicsInstance::new()?;
/// let device = instance.create_device(AdapterPreference::Discrete)?;
/// let queue = device.create_queue("Upload")?;
/// let fence = device.create_fence();
///
/// fence.signal(&queue, 1)?;
/// fence.wait_cpu(1)?;
/// assert_eq!(fence.last_landed_value(), 1);
/// # Ok::<(), tandem_graphics::GraphicsError>(())
/// ```
#[derive(Debug)]
pub struct Fence {
    adapter: AdapterId,
    gpu: GpuFence,
    last_signalled: AtomicU64,
    last_landed: AtomicU64,
}

impl Fence {
    pub(crate) fn new(adapter: AdapterId, gpu: GpuFence) -> Self {
        Self {
            adapter,
            gpu,
            last_signalled: AtomicU64::new(0),
            last_landed: AtomicU64::new(0),
        }
    }

    /// Adapter the fence was created on.
    pub fn adapter(&self) -> AdapterId {
        self.adapter
    }

    /// Last value passed to [`Fence::signal`].
    pub fn last_signalled_value(&self) -> u64 {
        self.last_signalled.load(Ordering::Acquire)
    }

    /// Highest value known to have landed, refreshed from the GPU.
    ///
    /// Non-blocking.
    pub fn last_landed_value(&self) -> u64 {
        let completed = self.gpu.completed_value();
        self.last_landed.fetch_max(completed, Ordering::AcqRel).max(completed)
    }

    /// Returns true if `value` has landed.
    pub fn is_complete(&self, value: u64) -> bool {
        value <= self.last_landed_value()
    }

    /// Make the fence reach `value` once `queue` finishes its prior work.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::NonMonotonicSignal`] if `value` does not exceed the
    ///   last signalled value
    /// - [`GraphicsError::InvalidParameter`] if the queue drives another adapter
    pub fn signal(&self, queue: &Queue, value: u64) -> Result<(), GraphicsError> {
        if queue.adapter() != self.adapter {
            return Err(GraphicsError::InvalidParameter(format!(
                "fence on {} signalled from a queue on {}",
                self.adapter,
                queue.adapter()
            )));
        }
        let last = self.last_signalled_value();
        if value <= last {
            return Err(violation(GraphicsError::NonMonotonicSignal { value, last }));
        }

        self.last_signalled.store(value, Ordering::Release);
        queue.gpu().signal(&self.gpu, value);
        log::trace!("Fence: {} signal {value} on queue {}", self.adapter, queue.label());
        Ok(())
    }

    /// Make `queue`'s later work wait on the GPU until the fence reaches `value`.
    ///
    /// Nothing is queued if `value` already landed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::WaitOnUnsignalledValue`] if `value` was never signalled.
    pub fn wait(&self, queue: &Queue, value: u64) -> Result<(), GraphicsError> {
        if self.is_complete(value) {
            return Ok(());
        }
        self.check_signalled(value)?;
        queue.gpu().wait(&self.gpu, value);
        Ok(())
    }

    /// Block the calling thread until the fence reaches `value`.
    ///
    /// Returns immediately if `value` already landed. There is no timeout.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::WaitOnUnsignalledValue`] if `value` was never signalled
    /// - [`GraphicsError::Stalled`] if deferred work cannot make progress
    pub fn wait_cpu(&self, value: u64) -> Result<(), GraphicsError> {
        if self.is_complete(value) {
            return Ok(());
        }
        self.check_signalled(value)?;
        self.gpu.wait_cpu(value)?;
        self.last_landed.fetch_max(value, Ordering::AcqRel);
        Ok(())
    }

    fn check_signalled(&self, value: u64) -> Result<(), GraphicsError> {
        let last = self.last_signalled_value();
        if value > last {
            return Err(violation(GraphicsError::WaitOnUnsignalledValue { value, last }));
        }
        Ok(())
    }
}

static_assertions::assert_impl_all!(Fence: Send, Sync);
