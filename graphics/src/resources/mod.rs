//! GPU resources.
//!
//! This module contains the resource type created by [`GraphicsDevice`] and
//! the staging upload that fills textures from CPU memory:
//! - [`Resource`] - buffer or texture allocation with a tracked barrier state
//! - [`upload_image`] - copy decoded pixels into a texture through a staging buffer
//!
//! Resources are reference-counted with [`Arc`] and can be shared across threads.
//! Each resource holds a weak reference back to its parent device.
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc

mod resource;
mod upload;

pub use resource::{Resource, ResourceOrigin};
pub use upload::upload_image;
