//! Command lists.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::GpuCommandList;
use crate::error::{GraphicsError, violation};
use crate::instance::AdapterId;
use crate::resources::Resource;
use crate::types::{BarrierState, Dimension, ResourceDescriptor};

/// A single-use recording of barriers and copies.
///
/// Created by [`Queue::start_recording`](crate::Queue::start_recording) and
/// consumed by [`Queue::execute`](crate::Queue::execute). Dropping a list
/// without executing it discards the recording.
///
/// Barrier states are tracked when commands are recorded. Dropping a list
/// without executing it restores every state its barriers changed, so a
/// recording abandoned halfway through leaves resources as they were.
#[derive(Debug)]
pub struct CommandList {
    queue_id: u64,
    adapter: AdapterId,
    gpu: GpuCommandList,
    barriers: RecordedBarriers,
}

impl CommandList {
    pub(crate) fn new(queue_id: u64, adapter: AdapterId, gpu: GpuCommandList) -> Self {
        Self {
            queue_id,
            adapter,
            gpu,
            barriers: RecordedBarriers::default(),
        }
    }

    pub(crate) fn queue_id(&self) -> u64 {
        self.queue_id
    }

    /// Hand the recording to the queue; its barrier states become final.
    pub(crate) fn into_gpu(mut self) -> GpuCommandList {
        self.barriers.commit();
        self.gpu
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.gpu.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declare that `resource` moves from `before` to `after`.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::UnsupportedTransition`] for anything but
    ///   `Common -> CopyDestination` or `CopyDestination -> Common`
    /// - [`GraphicsError::BarrierStateMismatch`] if `before` is not the
    ///   resource's tracked state
    pub fn barrier(
        &mut self,
        resource: &Resource,
        before: BarrierState,
        after: BarrierState,
    ) -> Result<(), GraphicsError> {
        self.check_adapter(resource)?;
        before.validate_transition(after)?;

        let cell = resource.state_cell();
        let mut state = cell.lock();
        if *state != before {
            return Err(violation(GraphicsError::BarrierStateMismatch {
                expected: before,
                actual: *state,
            }));
        }
        self.gpu.barrier(resource.gpu(), before, after);
        *state = after;
        self.barriers.0.push((Arc::clone(cell), before, after));
        Ok(())
    }

    /// Copy the whole of `src` into `dst`.
    ///
    /// Both must have the same format, dimension and extent and must not
    /// share memory.
    pub fn copy(&mut self, dst: &Resource, src: &Resource) -> Result<(), GraphicsError> {
        self.check_adapter(dst)?;
        self.check_adapter(src)?;

        let (d, s) = (dst.descriptor(), src.descriptor());
        if d.format != s.format || d.dimension != s.dimension || d.extent != s.extent {
            return Err(GraphicsError::InvalidParameter(format!(
                "copy between mismatched resources: {:?} {:?} {:?} <- {:?} {:?} {:?}",
                d.dimension,
                d.format,
                d.extent.to_array(),
                s.dimension,
                s.format,
                s.extent.to_array()
            )));
        }
        if dst.shares_memory_with(src) {
            return Err(GraphicsError::InvalidParameter(
                "copy source and destination must be distinct".to_string(),
            ));
        }
        check_copy_states(dst, src)?;

        self.gpu.copy(dst.gpu(), src.gpu());
        Ok(())
    }

    /// Copy pixel rows from a linear staging buffer into a 2D texture.
    ///
    /// `bytes_per_row` is the source row pitch; the copied region is
    /// `bytes_per_row / bpp` pixels wide and `src_size / bytes_per_row` rows tall,
    /// placed at the texture's origin.
    pub fn copy_from_staging(
        &mut self,
        dst: &Resource,
        src: &Resource,
        bytes_per_row: u32,
    ) -> Result<(), GraphicsError> {
        self.check_adapter(dst)?;
        self.check_adapter(src)?;
        let (width, height) = staging_copy_region(dst.descriptor(), src.descriptor(), bytes_per_row)?;
        check_copy_states(dst, src)?;

        self.gpu
            .copy_from_staging(dst.gpu(), src.gpu(), bytes_per_row, width, height);
        Ok(())
    }

    fn check_adapter(&self, resource: &Resource) -> Result<(), GraphicsError> {
        if resource.adapter() != self.adapter {
            return Err(GraphicsError::InvalidParameter(format!(
                "resource on {} used in a command list for {}",
                resource.adapter(),
                self.adapter
            )));
        }
        Ok(())
    }
}

/// Transitions made by a list that has not been executed yet.
#[derive(Debug, Default)]
struct RecordedBarriers(Vec<(Arc<Mutex<BarrierState>>, BarrierState, BarrierState)>);

impl RecordedBarriers {
    fn commit(&mut self) {
        self.0.clear();
    }
}

impl Drop for RecordedBarriers {
    fn drop(&mut self) {
        if !self.0.is_empty() {
            log::debug!(
                "Command list dropped unexecuted, restoring {} barrier states",
                self.0.len()
            );
        }
        for (cell, before, after) in self.0.drain(..).rev() {
            let mut state = cell.lock();
            if *state == after {
                *state = before;
            }
        }
    }
}

fn check_copy_states(dst: &Resource, src: &Resource) -> Result<(), GraphicsError> {
    let dst_state = dst.state();
    if !dst_state.allows_copy_write() {
        return Err(violation(GraphicsError::BarrierStateMismatch {
            expected: BarrierState::CopyDestination,
            actual: dst_state,
        }));
    }
    let src_state = src.state();
    if !src_state.allows_copy_read() {
        return Err(violation(GraphicsError::BarrierStateMismatch {
            expected: BarrierState::CopySource,
            actual: src_state,
        }));
    }
    Ok(())
}

/// Validate a staging copy and return the copied `(width, height)` in pixels.
pub(crate) fn staging_copy_region(
    dst: &ResourceDescriptor,
    src: &ResourceDescriptor,
    bytes_per_row: u32,
) -> Result<(u32, u32), GraphicsError> {
    if dst.dimension != Dimension::Texture2d {
        return Err(GraphicsError::InvalidParameter(format!(
            "staging copy destination must be a 2D texture, got {:?}",
            dst.dimension
        )));
    }
    let bytes_per_pixel = dst.format.bytes_per_pixel();
    if bytes_per_pixel == 0 {
        return Err(violation(GraphicsError::UnsupportedFormat(dst.format)));
    }
    if src.dimension != Dimension::Buffer {
        return Err(GraphicsError::InvalidParameter(
            "staging copy source must be a buffer".to_string(),
        ));
    }
    if bytes_per_row == 0 || bytes_per_row % bytes_per_pixel != 0 {
        return Err(GraphicsError::InvalidParameter(format!(
            "bytes per row {bytes_per_row} is not a multiple of {bytes_per_pixel}"
        )));
    }

    let width = bytes_per_row / bytes_per_pixel;
    let height = src.extent.width / bytes_per_row;
    if height == 0 || width > dst.extent.width || height > dst.extent.height {
        return Err(GraphicsError::InvalidParameter(format!(
            "staging region {width}x{height} does not fit a {}x{} texture",
            dst.extent.width, dst.extent.height
        )));
    }
    Ok((width, height))
}
