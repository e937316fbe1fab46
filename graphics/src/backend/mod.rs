//! GPU backend abstraction layer.
//!
//! Front-end types ([`GraphicsDevice`](crate::GraphicsDevice),
//! [`Queue`](crate::Queue), [`Fence`](crate::Fence), ...) hold backend-tagged
//! handles defined here and never reach into a backend directly. Every handle
//! enum has one variant per compiled backend; dispatch happens in the methods
//! below, so adding a backend means adding a variant and a match arm, never a
//! downcast.
//!
//! # Available Backends
//!
//! - `software`: emulates GPUs on the CPU (see [`software`]).

pub mod software;

use std::sync::Arc;

use software::command::{Command, SoftwareAllocator, SoftwareCommandList};
use software::fence::SoftwareFence;
use software::handles::SharedHandle;
use software::memory::Allocation;
use software::surface::SoftwareSurface;
use software::{SoftwareBackend, SoftwareDevice, SoftwareQueue};

use crate::error::GraphicsError;
use crate::instance::{AdapterId, AdapterInfo, BackendType, InstanceParameters};
use crate::types::{BarrierState, ResourceDescriptor};

/// Backend owned by a [`GraphicsInstance`](crate::GraphicsInstance).
#[derive(Debug)]
pub(crate) enum GpuBackend {
    /// CPU emulation.
    Software(SoftwareBackend),
}

impl GpuBackend {
    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Software(backend) => backend.name(),
        }
    }

    pub(crate) fn adapters(&self) -> &[(AdapterId, AdapterInfo)] {
        match self {
            Self::Software(backend) => backend.adapters(),
        }
    }

    pub(crate) fn create_device(&self, adapter: AdapterId) -> GpuDevice {
        match self {
            Self::Software(backend) => GpuDevice::Software(backend.create_device(adapter)),
        }
    }

    /// Advance deferred work. Returns the number of jobs executed.
    pub(crate) fn poll(&self) -> usize {
        match self {
            Self::Software(backend) => backend.poll(),
        }
    }

    pub(crate) fn open_handle_count(&self) -> usize {
        match self {
            Self::Software(backend) => backend.open_handle_count(),
        }
    }
}

/// Create the backend requested by `parameters`.
pub(crate) fn create_backend(parameters: &InstanceParameters) -> Result<GpuBackend, GraphicsError> {
    match parameters.backend {
        BackendType::Software => {
            log::info!(
                "Using software backend ({:?} execution, {} adapters)",
                parameters.execution_mode,
                parameters.adapters.len()
            );
            Ok(GpuBackend::Software(SoftwareBackend::new(
                parameters.adapters.clone(),
                parameters.execution_mode,
            )))
        }
    }
}

/// Handle to an opened adapter.
#[derive(Debug)]
pub(crate) enum GpuDevice {
    /// CPU emulation.
    Software(SoftwareDevice),
}

impl GpuDevice {
    pub(crate) fn create_queue(&self, label: &str) -> Result<GpuQueue, GraphicsError> {
        match self {
            Self::Software(device) => device.create_queue(label).map(GpuQueue::Software),
        }
    }

    pub(crate) fn create_fence(&self) -> GpuFence {
        match self {
            Self::Software(device) => GpuFence::Software(device.create_fence()),
        }
    }

    pub(crate) fn create_allocator(&self) -> GpuAllocator {
        match self {
            Self::Software(device) => GpuAllocator::Software(device.create_allocator()),
        }
    }

    pub(crate) fn allocation_size(&self, descriptor: &ResourceDescriptor) -> Option<u64> {
        match self {
            Self::Software(device) => device.allocation_size(descriptor),
        }
    }

    pub(crate) fn create_resource(&self, descriptor: &ResourceDescriptor) -> GpuResource {
        match self {
            Self::Software(device) => GpuResource::Software(device.create_resource(descriptor)),
        }
    }

    /// Export `resource` so another device can open it.
    pub(crate) fn export(&self, resource: &GpuResource) -> GpuSharedHandle {
        match (self, resource) {
            (Self::Software(device), GpuResource::Software(allocation)) => {
                GpuSharedHandle::Software(device.export(allocation))
            }
        }
    }

    /// Open a handle exported by another device.
    pub(crate) fn open(&self, handle: &GpuSharedHandle) -> Result<GpuResource, GraphicsError> {
        match (self, handle) {
            (Self::Software(device), GpuSharedHandle::Software(handle)) => {
                device.open(handle).map(GpuResource::Software)
            }
        }
    }

    pub(crate) fn create_surface(
        &self,
        width: u32,
        height: u32,
        image_count: u32,
    ) -> Result<GpuSurface, GraphicsError> {
        match self {
            Self::Software(device) => device
                .create_surface(width, height, image_count)
                .map(GpuSurface::Software),
        }
    }
}

/// Handle to a command queue.
#[derive(Debug)]
pub(crate) enum GpuQueue {
    /// CPU emulation.
    Software(SoftwareQueue),
}

impl GpuQueue {
    /// Close and submit `list`; its allocator stays busy until `fence_value` lands.
    pub(crate) fn submit(&self, list: GpuCommandList, fence_value: u64) -> Result<(), GraphicsError> {
        match (self, list) {
            (Self::Software(queue), GpuCommandList::Software(list)) => {
                queue.submit(list, fence_value)
            }
        }
    }

    pub(crate) fn signal(&self, fence: &GpuFence, value: u64) {
        match (self, fence) {
            (Self::Software(queue), GpuFence::Software(fence)) => queue.signal(fence, value),
        }
    }

    pub(crate) fn wait(&self, fence: &GpuFence, value: u64) {
        match (self, fence) {
            (Self::Software(queue), GpuFence::Software(fence)) => queue.wait(fence, value),
        }
    }

    pub(crate) fn present(&self, surface: &GpuSurface, image: u32) {
        match (self, surface) {
            (Self::Software(queue), GpuSurface::Software(surface)) => {
                queue.present(surface, image)
            }
        }
    }

    /// Work submitted but not yet consumed by the GPU.
    pub(crate) fn pending(&self) -> usize {
        match self {
            Self::Software(queue) => queue.pending(),
        }
    }
}

/// Handle to a fence.
#[derive(Debug, Clone)]
pub(crate) enum GpuFence {
    /// CPU emulation.
    Software(Arc<SoftwareFence>),
}

impl GpuFence {
    pub(crate) fn completed_value(&self) -> u64 {
        match self {
            Self::Software(fence) => fence.completed_value(),
        }
    }

    pub(crate) fn wait_cpu(&self, value: u64) -> Result<(), GraphicsError> {
        match self {
            Self::Software(fence) => fence.wait_cpu(value),
        }
    }
}

/// Handle to a command allocator.
#[derive(Debug, Clone)]
pub(crate) enum GpuAllocator {
    /// CPU emulation.
    Software(Arc<SoftwareAllocator>),
}

impl GpuAllocator {
    pub(crate) fn id(&self) -> u64 {
        match self {
            Self::Software(allocator) => allocator.id(),
        }
    }

    pub(crate) fn open_lists(&self) -> u32 {
        match self {
            Self::Software(allocator) => allocator.open_lists(),
        }
    }

    pub(crate) fn reset(&self, completed: u64) -> Result<(), GraphicsError> {
        match self {
            Self::Software(allocator) => allocator.reset(completed),
        }
    }

    pub(crate) fn begin_list(&self) -> GpuCommandList {
        match self {
            Self::Software(allocator) => GpuCommandList::Software(allocator.begin_list()),
        }
    }
}

/// Handle to a command list being recorded.
#[derive(Debug)]
pub(crate) enum GpuCommandList {
    /// CPU emulation.
    Software(SoftwareCommandList),
}

impl GpuCommandList {
    pub(crate) fn barrier(&mut self, resource: &GpuResource, before: BarrierState, after: BarrierState) {
        match (self, resource) {
            (Self::Software(list), GpuResource::Software(allocation)) => {
                list.record(Command::Barrier {
                    allocation: allocation.id(),
                    before,
                    after,
                })
            }
        }
    }

    pub(crate) fn copy(&mut self, dst: &GpuResource, src: &GpuResource) {
        match (self, dst, src) {
            (Self::Software(list), GpuResource::Software(dst), GpuResource::Software(src)) => {
                list.record(Command::Copy {
                    dst: Arc::clone(dst),
                    src: Arc::clone(src),
                })
            }
        }
    }

    pub(crate) fn copy_from_staging(
        &mut self,
        dst: &GpuResource,
        src: &GpuResource,
        bytes_per_row: u32,
        width: u32,
        height: u32,
    ) {
        match (self, dst, src) {
            (Self::Software(list), GpuResource::Software(dst), GpuResource::Software(src)) => {
                list.record(Command::CopyFromStaging {
                    dst: Arc::clone(dst),
                    src: Arc::clone(src),
                    bytes_per_row,
                    width,
                    height,
                })
            }
        }
    }

    /// Number of recorded commands.
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Software(list) => list.len(),
        }
    }
}

/// Handle to resource memory.
#[derive(Debug, Clone)]
pub(crate) enum GpuResource {
    /// CPU emulation.
    Software(Arc<Allocation>),
}

impl GpuResource {
    /// Size of the underlying allocation in bytes.
    pub(crate) fn size(&self) -> u64 {
        match self {
            Self::Software(allocation) => allocation.size(),
        }
    }

    /// Map, write `data` at offset zero, unmap.
    pub(crate) fn write(&self, data: &[u8]) {
        match self {
            Self::Software(allocation) => {
                let mut mapped = allocation.map();
                mapped[..data.len()].copy_from_slice(data);
            }
        }
    }

    /// Read back the contents with row padding removed.
    pub(crate) fn read_packed(&self) -> Vec<u8> {
        match self {
            Self::Software(allocation) => allocation.packed_contents(),
        }
    }

    /// Native row pitch, for textures.
    pub(crate) fn row_pitch(&self) -> Option<u64> {
        match self {
            Self::Software(allocation) => allocation.layout().row_pitch(),
        }
    }

    pub(crate) fn same_memory(&self, other: &GpuResource) -> bool {
        match (self, other) {
            (Self::Software(a), Self::Software(b)) => Arc::ptr_eq(a, b),
        }
    }
}

/// Handle to a swap chain surface.
#[derive(Debug, Clone)]
pub(crate) enum GpuSurface {
    /// CPU emulation.
    Software(Arc<SoftwareSurface>),
}

impl GpuSurface {
    pub(crate) fn image_count(&self) -> u32 {
        match self {
            Self::Software(surface) => surface.image_count(),
        }
    }

    pub(crate) fn descriptor(&self) -> ResourceDescriptor {
        match self {
            Self::Software(surface) => surface.descriptor(),
        }
    }

    pub(crate) fn current_index(&self) -> u32 {
        match self {
            Self::Software(surface) => surface.current_index(),
        }
    }

    pub(crate) fn image(&self, index: u32) -> Option<GpuResource> {
        match self {
            Self::Software(surface) => surface.image(index).map(GpuResource::Software),
        }
    }

    pub(crate) fn advance(&self) -> u32 {
        match self {
            Self::Software(surface) => surface.advance(),
        }
    }

    pub(crate) fn resize(&self, width: u32, height: u32) -> Result<(), GraphicsError> {
        match self {
            Self::Software(surface) => surface.resize(width, height),
        }
    }

    pub(crate) fn presented_count(&self) -> u64 {
        match self {
            Self::Software(surface) => surface.presented_count(),
        }
    }

    pub(crate) fn last_presented(&self) -> Option<u32> {
        match self {
            Self::Software(surface) => surface.last_presented(),
        }
    }
}

/// Exported cross-adapter handle. Closed on drop.
#[derive(Debug)]
pub(crate) enum GpuSharedHandle {
    /// CPU emulation.
    Software(SharedHandle),
}
