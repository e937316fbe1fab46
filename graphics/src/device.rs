//! Graphics device.
//!
//! The [`GraphicsDevice`] is bound to one adapter and is the factory for
//! queues, fences, resources and windows on it. It is created by
//! [`GraphicsInstance::create_device`].

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::backend::GpuDevice;
use crate::error::{GraphicsError, violation};
use crate::fence::Fence;
use crate::instance::{AdapterId, AdapterInfo, GraphicsInstance};
use crate::queue::Queue;
use crate::resources::{Resource, ResourceOrigin};
use crate::types::{Dimension, ResourceDescriptor};
use crate::window::{Window, WindowDescriptor};

/// Capabilities of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum texture dimension.
    pub max_texture_dimension: u32,
    /// Maximum buffer size.
    pub max_buffer_size: u64,
    /// Maximum size of a single allocation, including row padding.
    pub max_allocation_size: u64,
    /// Whether resources can be shared with other adapters.
    pub cross_adapter_sharing: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_dimension: 16384,
            max_buffer_size: 1 << 30, // 1 GB
            max_allocation_size: 1 << 32, // 4 GB
            cross_adapter_sharing: true,
        }
    }
}

/// A graphics device bound to one adapter.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync`. Objects it creates hold a weak
/// reference back to it, so dropping the last strong reference releases the
/// device even while resources are alive.
///
/// # Example
///
/// ```
/// use tandem_graphics::{AdapterPreference, Format, GraphicsInstance, ResourceDescriptor};
///
/// let instance = GraphicsInstance::new()?;
/// let device = instance.create_device(AdapterPreference::Discrete)?;
///
/// let queue = device.create_queue("RenderQueue")?;
/// let texture = device.create_resource(&ResourceDescriptor::texture_2d(
///     64, 64, Format::Rgba8Unorm,
/// ))?;
/// assert_eq!(texture.extent().width, 64);
/// queue.flush()?;
/// # Ok::<(), tandem_graphics::GraphicsError>(())
/// ```
pub struct GraphicsDevice {
    instance: Arc<GraphicsInstance>,
    adapter: AdapterId,
    info: AdapterInfo,
    capabilities: DeviceCapabilities,
    gpu: GpuDevice,
    // Track created objects (weak references for cleanup/debugging)
    queues: RwLock<Vec<Weak<Queue>>>,
    fences: RwLock<Vec<Weak<Fence>>>,
    resources: RwLock<Vec<Weak<Resource>>>,
}

impl GraphicsDevice {
    pub(crate) fn new(
        instance: Arc<GraphicsInstance>,
        adapter: AdapterId,
        info: AdapterInfo,
        gpu: GpuDevice,
    ) -> Self {
        let capabilities = DeviceCapabilities {
            cross_adapter_sharing: info.cross_adapter_sharing,
            ..DeviceCapabilities::default()
        };
        Self {
            instance,
            adapter,
            info,
            capabilities,
            gpu,
            queues: RwLock::new(Vec::new()),
            fences: RwLock::new(Vec::new()),
            resources: RwLock::new(Vec::new()),
        }
    }

    /// Get the parent instance.
    pub fn instance(&self) -> &Arc<GraphicsInstance> {
        &self.instance
    }

    /// Identity of the adapter this device is bound to.
    pub fn adapter(&self) -> AdapterId {
        self.adapter
    }

    /// Description of the adapter this device is bound to.
    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.info
    }

    /// Get the adapter name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Get the device capabilities.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Returns true if both devices drive the same adapter.
    pub fn is_same_adapter(&self, other: &GraphicsDevice) -> bool {
        self.adapter == other.adapter
    }

    pub(crate) fn gpu(&self) -> &GpuDevice {
        &self.gpu
    }

    /// Create a command queue.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ResourceCreationFailed`] if the backend cannot
    /// create the queue or its allocators.
    pub fn create_queue(self: &Arc<Self>, label: &str) -> Result<Arc<Queue>, GraphicsError> {
        let queue = Arc::new(Queue::new(self, label)?);

        let mut queues = self.queues.write();
        queues.retain(|q| q.strong_count() > 0);
        queues.push(Arc::downgrade(&queue));

        log::trace!("GraphicsDevice: created queue {label:?} on {}", self.info.name);
        Ok(queue)
    }

    /// Create a fence with both counters at zero.
    pub fn create_fence(self: &Arc<Self>) -> Arc<Fence> {
        let fence = Arc::new(self.new_fence());

        let mut fences = self.fences.write();
        fences.retain(|f| f.strong_count() > 0);
        fences.push(Arc::downgrade(&fence));

        log::trace!("GraphicsDevice: created fence on {}", self.info.name);
        fence
    }

    pub(crate) fn new_fence(&self) -> Fence {
        Fence::new(self.adapter, self.gpu.create_fence())
    }

    /// Create a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is inconsistent (staging textures,
    /// typed buffers, untyped textures, staging and shared at once), exceeds
    /// device limits, or asks for a shared 3D texture.
    pub fn create_resource(
        self: &Arc<Self>,
        descriptor: &ResourceDescriptor,
    ) -> Result<Arc<Resource>, GraphicsError> {
        self.validate_descriptor(descriptor)?;

        let gpu = self.gpu.create_resource(descriptor);
        let resource = Arc::new(Resource::new(
            Arc::downgrade(self),
            self.adapter,
            *descriptor,
            gpu,
            ResourceOrigin::Created,
        ));
        self.track(&resource);

        log::trace!(
            "GraphicsDevice: created {:?} resource {:?}, format={:?}, staging={}, shared={}",
            descriptor.dimension,
            descriptor.extent.to_array(),
            descriptor.format,
            descriptor.is_staging(),
            descriptor.is_shared()
        );
        Ok(resource)
    }

    fn validate_descriptor(&self, descriptor: &ResourceDescriptor) -> Result<(), GraphicsError> {
        let extent = descriptor.extent;
        if extent.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "resource extent cannot be zero".to_string(),
            ));
        }
        if descriptor.is_staging() && descriptor.is_shared() {
            return Err(GraphicsError::InvalidParameter(
                "staging resources cannot be shared".to_string(),
            ));
        }

        match descriptor.dimension {
            Dimension::Buffer => {
                if descriptor.format.is_typed() {
                    return Err(violation(GraphicsError::UnsupportedFormat(descriptor.format)));
                }
                if extent.height != 1 || extent.depth != 1 {
                    return Err(GraphicsError::InvalidParameter(
                        "buffer extents must be [size, 1, 1]".to_string(),
                    ));
                }
                if extent.width as u64 > self.capabilities.max_buffer_size {
                    return Err(GraphicsError::InvalidParameter(format!(
                        "buffer size {} exceeds maximum {}",
                        extent.width, self.capabilities.max_buffer_size
                    )));
                }
            }
            Dimension::Texture2d | Dimension::Texture3d => {
                if descriptor.is_staging() {
                    return Err(GraphicsError::InvalidParameter(
                        "staging resources must be buffers".to_string(),
                    ));
                }
                if !descriptor.format.is_typed() {
                    return Err(violation(GraphicsError::UnsupportedFormat(descriptor.format)));
                }
                if descriptor.dimension == Dimension::Texture2d && extent.depth != 1 {
                    return Err(GraphicsError::InvalidParameter(
                        "2D textures must have a depth of 1".to_string(),
                    ));
                }
                if descriptor.dimension == Dimension::Texture3d && descriptor.is_shared() {
                    return Err(GraphicsError::FeatureNotSupported(
                        "shared 3D textures".to_string(),
                    ));
                }
                let max_dim = self.capabilities.max_texture_dimension;
                if extent.to_array().iter().any(|d| *d > max_dim) {
                    return Err(GraphicsError::InvalidParameter(format!(
                        "texture dimension exceeds maximum {max_dim}"
                    )));
                }
            }
        }
        self.check_allocation(descriptor)
    }

    /// Fail with [`GraphicsError::ResourceCreationFailed`] if a resource
    /// created from `descriptor` would exceed the allocation limit.
    pub(crate) fn check_allocation(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<(), GraphicsError> {
        let limit = self.capabilities.max_allocation_size;
        match self.gpu.allocation_size(descriptor) {
            Some(size) if size <= limit => Ok(()),
            size => Err(GraphicsError::ResourceCreationFailed(format!(
                "{:?} allocation of {} bytes for {:?} exceeds the limit of {limit} bytes",
                descriptor.dimension,
                size.map_or_else(|| "more than u64::MAX".to_string(), |s| s.to_string()),
                descriptor.extent.to_array()
            ))),
        }
    }

    /// Make `resource`, created on `owner`, usable on this device.
    ///
    /// When both devices drive the same adapter the input is returned as is.
    /// Otherwise the memory is exported from `owner`, opened here, and the
    /// export handle is closed again before returning; the result refers to
    /// the same memory as `resource`.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::InvalidParameter`] if `resource` was not created on `owner`
    /// - [`GraphicsError::NotShareable`] if it lacks the shared flag
    /// - [`GraphicsError::FeatureNotSupported`] if either adapter cannot share
    pub fn create_shared_resource(
        self: &Arc<Self>,
        owner: &Arc<GraphicsDevice>,
        resource: &Arc<Resource>,
    ) -> Result<Arc<Resource>, GraphicsError> {
        if resource.adapter() != owner.adapter {
            return Err(GraphicsError::InvalidParameter(format!(
                "resource belongs to {}, not to owner {}",
                resource.adapter(),
                owner.adapter
            )));
        }
        if self.is_same_adapter(owner) {
            return Ok(Arc::clone(resource));
        }
        if !resource.is_shared() {
            return Err(violation(GraphicsError::NotShareable));
        }
        for device in [owner.as_ref(), self.as_ref()] {
            if !device.capabilities.cross_adapter_sharing {
                return Err(GraphicsError::FeatureNotSupported(format!(
                    "cross-adapter sharing on {}",
                    device.info.name
                )));
            }
        }

        let gpu = {
            let handle = owner.gpu.export(resource.gpu());
            self.gpu.open(&handle)?
        };
        let imported = Arc::new(Resource::new(
            Arc::downgrade(self),
            self.adapter,
            *resource.descriptor(),
            gpu,
            ResourceOrigin::Imported,
        ));
        self.track(&imported);

        log::debug!(
            "Shared {:?} resource from {} to {}",
            resource.extent().to_array(),
            owner.info.name,
            self.info.name
        );
        Ok(imported)
    }

    /// Create a window with its swap chain and presentation queue.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::SurfaceCreationFailed`] for an invalid size or
    /// image count, or a queue creation error.
    pub fn create_window(
        self: &Arc<Self>,
        descriptor: WindowDescriptor,
    ) -> Result<Window, GraphicsError> {
        let window = Window::new(self, descriptor)?;
        for buffer in window.back_buffers() {
            self.track(buffer);
        }
        Ok(window)
    }

    pub(crate) fn track(&self, resource: &Arc<Resource>) {
        let mut resources = self.resources.write();
        resources.retain(|r| r.strong_count() > 0);
        resources.push(Arc::downgrade(resource));
    }

    /// Get the number of live queues created by this device.
    pub fn queue_count(&self) -> usize {
        self.queues
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Get the number of live fences created by this device.
    pub fn fence_count(&self) -> usize {
        self.fences
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Get the number of live resources created by or imported into this device.
    pub fn resource_count(&self) -> usize {
        self.resources
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Clean up dead weak references to released objects.
    pub fn cleanup_dead_resources(&self) {
        self.queues.write().retain(|w| w.strong_count() > 0);
        self.fences.write().retain(|w| w.strong_count() > 0);
        self.resources.write().retain(|w| w.strong_count() > 0);
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("adapter", &self.adapter)
            .field("name", &self.info.name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);
