//! # Tandem Graphics
//!
//! Multi-adapter GPU device abstraction: one adapter renders, another
//! presents, and resources move between them through shared handles.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsInstance`] - Adapter enumeration and device creation
//! - [`GraphicsDevice`] - Resource, queue and fence factory bound to one adapter
//! - [`Queue`] - Command submission with double-buffered allocator recycling
//! - [`Fence`] - Monotonic progress counter for CPU and cross-queue waits
//! - [`Resource`] - Buffers and textures, including cross-adapter shares
//! - [`Window`] - Swap chain with its own presentation queue
//!
//! The only backend is a software one. Each queue runs on a timeline that
//! is either a worker thread ([`ExecutionMode::Threaded`]) or drained
//! explicitly by [`GraphicsInstance::poll`] ([`ExecutionMode::Deferred`]).
//!
//! ## Example
//!
//! ```
//! use tandem_graphics::{AdapterPreference, BarrierState, Format, GraphicsInstance, ResourceDescriptor};
//!
//! let instance = GraphicsInstance::new()?;
//! let render = instance.create_device(AdapterPreference::Discrete)?;
//! let present = instance.create_device(AdapterPreference::Integrated)?;
//!
//! let desc = ResourceDescriptor::texture_2d(4, 4, Format::Rgba8Unorm).with_shared(true);
//! let texture = render.create_resource(&desc)?;
//! let imported = present.create_shared_resource(&render, &texture)?;
//! assert!(imported.shares_memory_with(&texture));
//!
//! let queue = present.create_queue("copy")?;
//! let target = present.create_resource(&ResourceDescriptor::texture_2d(4, 4, Format::Rgba8Unorm))?;
//! let mut list = queue.start_recording()?;
//! list.barrier(&target, BarrierState::Common, BarrierState::CopyDestination)?;
//! list.copy(&target, &imported)?;
//! list.barrier(&target, BarrierState::CopyDestination, BarrierState::Common)?;
//! queue.execute(list)?;
//! queue.flush()?;
//! # Ok::<(), tandem_graphics::GraphicsError>(())
//! ```

pub(crate) mod backend;
pub mod command;
pub mod device;
pub mod error;
pub mod fence;
pub mod image;
pub mod instance;
pub mod queue;
pub mod resources;
pub mod types;
pub mod window;

// Re-export main types for convenience
pub use backend::software::ExecutionMode;
pub use command::CommandList;
pub use device::{DeviceCapabilities, GraphicsDevice};
pub use error::GraphicsError;
pub use fence::Fence;
pub use crate::image::{ImageData, decode_image};
pub use instance::{
    AdapterId, AdapterInfo, AdapterPreference, AdapterType, BackendType, GraphicsInstance,
    InstanceParameters, select_adapter,
};
pub use queue::{Queue, QueueStats};
pub use resources::{Resource, ResourceOrigin, upload_image};
pub use types::{BarrierState, Dimension, Extent3d, Format, ResourceDescriptor, ResourceFlags};
pub use window::{
    ChannelEventSource, EventSource, Key, PRESENT_QUEUE_LABEL, PresentMode, ScriptedEvents,
    Window, WindowDescriptor, WindowEvent,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    log::info!("Tandem Graphics v{} initialized", VERSION);
}
