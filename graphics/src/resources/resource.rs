//! GPU resource: a buffer or texture allocation.

use std::path::Path;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::GpuResource;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, violation};
use crate::image::decode_image;
use crate::instance::AdapterId;
use crate::queue::Queue;
use crate::types::{BarrierState, Dimension, Extent3d, Format, ResourceDescriptor};

use super::upload_image;

/// How a resource came to exist on its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceOrigin {
    /// Allocated by [`GraphicsDevice::create_resource`].
    Created,
    /// Opened from another adapter by [`GraphicsDevice::create_shared_resource`].
    Imported,
    /// A swap chain back buffer owned by a [`Window`](crate::Window).
    SwapChain,
}

/// A GPU buffer or texture.
///
/// Resources are created by [`GraphicsDevice::create_resource`] and are
/// reference-counted. A cross-adapter share produces a second `Resource` on
/// the other device that refers to the same memory; each instance tracks its
/// own barrier state.
///
/// # Example
///
/// ```
/// use tandem_graphics::{AdapterPreference, GraphicsInstance, ResourceDescriptor};
///
/// let instance = GraphicsInstance::new()?;
/// let device = instance.create_device(AdapterPreference::Discrete)?;
/// let staging = device.create_resource(&ResourceDescriptor::staging(4))?;
/// staging.write(&[1, 2, 3, 4])?;
/// assert_eq!(staging.read_contents(), vec![1, 2, 3, 4]);
/// # Ok::<(), tandem_graphics::GraphicsError>(())
/// ```
pub struct Resource {
    device: Weak<GraphicsDevice>,
    adapter: AdapterId,
    descriptor: ResourceDescriptor,
    gpu: GpuResource,
    state: Arc<Mutex<BarrierState>>,
    origin: ResourceOrigin,
}

impl Resource {
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        adapter: AdapterId,
        descriptor: ResourceDescriptor,
        gpu: GpuResource,
        origin: ResourceOrigin,
    ) -> Self {
        Self {
            device,
            adapter,
            descriptor,
            gpu,
            state: Arc::new(Mutex::new(BarrierState::Common)),
            origin,
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }

    /// Adapter the resource is usable on.
    pub fn adapter(&self) -> AdapterId {
        self.adapter
    }

    /// Get the resource descriptor.
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Pixel format.
    pub fn format(&self) -> Format {
        self.descriptor.format
    }

    /// Buffer, 2D or 3D texture.
    pub fn dimension(&self) -> Dimension {
        self.descriptor.dimension
    }

    /// Resolution; byte size in `width` for buffers.
    pub fn extent(&self) -> Extent3d {
        self.descriptor.extent
    }

    /// Returns true for CPU-writable staging buffers.
    pub fn is_staging(&self) -> bool {
        self.descriptor.is_staging()
    }

    /// Returns true if the resource can be opened by other adapters.
    pub fn is_shared(&self) -> bool {
        self.descriptor.is_shared()
    }

    /// How this resource was obtained.
    pub fn origin(&self) -> ResourceOrigin {
        self.origin
    }

    /// Size of the backing allocation in bytes, including row padding.
    pub fn size(&self) -> u64 {
        self.gpu.size()
    }

    /// Distance in bytes between texture rows in the backing allocation.
    pub fn row_pitch(&self) -> Option<u64> {
        self.gpu.row_pitch()
    }

    /// Barrier state recorded most recently for this resource.
    pub fn state(&self) -> BarrierState {
        *self.state.lock()
    }

    /// Shared handle to the tracked state, for command lists that may need
    /// to restore it.
    pub(crate) fn state_cell(&self) -> &Arc<Mutex<BarrierState>> {
        &self.state
    }

    pub(crate) fn gpu(&self) -> &GpuResource {
        &self.gpu
    }

    /// Returns true if both resources refer to the same memory.
    pub fn shares_memory_with(&self, other: &Resource) -> bool {
        self.gpu.same_memory(&other.gpu)
    }

    /// Map the staging buffer, copy `data` to its start and unmap.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::InvalidParameter`] if the resource is not a staging buffer
    /// - [`GraphicsError::StagingOverflow`] if `data` exceeds the capacity; the
    ///   resource is left untouched and stays usable
    pub fn write(&self, data: &[u8]) -> Result<(), GraphicsError> {
        if !self.is_staging() {
            return Err(GraphicsError::InvalidParameter(
                "only staging resources are CPU-writable".to_string(),
            ));
        }
        let capacity = self.descriptor.extent.width as u64;
        let len = data.len() as u64;
        if len > capacity {
            return Err(violation(GraphicsError::StagingOverflow { len, capacity }));
        }
        self.gpu.write(data);
        Ok(())
    }

    /// Read the current contents back, with row padding removed.
    ///
    /// Reflects work that has landed; flush the producing queue first.
    pub fn read_contents(&self) -> Vec<u8> {
        self.gpu.read_packed()
    }

    /// Decode the image at `path` and upload it into this texture through
    /// `queue`. Returns once the upload has completed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ImageDecode`] if the file cannot be decoded,
    /// or any error of [`upload_image`].
    pub fn load_from_file(&self, path: impl AsRef<Path>, queue: &Queue) -> Result<(), GraphicsError> {
        let path = path.as_ref();
        let image = decode_image(path)?;
        log::debug!(
            "Loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        upload_image(queue, self, &image)
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("adapter", &self.adapter)
            .field("descriptor", &self.descriptor)
            .field("origin", &self.origin)
            .field("state", &self.state())
            .finish()
    }
}

// Ensure Resource is Send + Sync
static_assertions::assert_impl_all!(Resource: Send, Sync);
