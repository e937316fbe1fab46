//! Common types and descriptors for graphics resources.
//!
//! This module contains the format enum, resource flags, the resource
//! descriptor and the barrier-state vocabulary used throughout the graphics
//! system.

mod barrier;
mod common;
mod format;
mod resource;

pub use barrier::BarrierState;
pub use common::Extent3d;
pub use format::Format;
pub use resource::{Dimension, ResourceDescriptor, ResourceFlags};
