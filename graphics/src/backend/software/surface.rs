//! Emulated presentation surfaces.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::RwLock;

use super::memory::{Allocation, MemoryLayout};
use crate::error::GraphicsError;
use crate::types::{Format, ResourceDescriptor};

/// Smallest and largest supported swap chain lengths.
pub(crate) const MIN_IMAGE_COUNT: u32 = 2;
pub(crate) const MAX_IMAGE_COUNT: u32 = 16;

/// Sentinel stored in `last_presented` before the first present.
const NOTHING_PRESENTED: u32 = u32::MAX;

/// A swap chain: N back buffers and the index of the one to render next.
#[derive(Debug)]
pub(crate) struct SoftwareSurface {
    images: RwLock<Vec<Arc<Allocation>>>,
    descriptor: RwLock<ResourceDescriptor>,
    current: AtomicU32,
    presented: AtomicU64,
    last_presented: AtomicU32,
}

impl SoftwareSurface {
    pub(crate) fn new(width: u32, height: u32, image_count: u32) -> Result<Self, GraphicsError> {
        if !(MIN_IMAGE_COUNT..=MAX_IMAGE_COUNT).contains(&image_count) {
            return Err(GraphicsError::SurfaceCreationFailed(format!(
                "swap chain image count {image_count} outside {MIN_IMAGE_COUNT}..={MAX_IMAGE_COUNT}"
            )));
        }
        let descriptor = back_buffer_descriptor(width, height)?;
        Ok(Self {
            images: RwLock::new(allocate_images(&descriptor, image_count)),
            descriptor: RwLock::new(descriptor),
            current: AtomicU32::new(0),
            presented: AtomicU64::new(0),
            last_presented: AtomicU32::new(NOTHING_PRESENTED),
        })
    }

    pub(crate) fn image_count(&self) -> u32 {
        self.images.read().len() as u32
    }

    pub(crate) fn descriptor(&self) -> ResourceDescriptor {
        *self.descriptor.read()
    }

    pub(crate) fn current_index(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }

    pub(crate) fn image(&self, index: u32) -> Option<Arc<Allocation>> {
        self.images.read().get(index as usize).cloned()
    }

    /// Move to the next back buffer after a present was queued.
    pub(crate) fn advance(&self) -> u32 {
        let count = self.image_count().max(1);
        let next = (self.current_index() + 1) % count;
        self.current.store(next, Ordering::Release);
        next
    }

    /// Reallocate every back buffer at a new size. The caller must ensure
    /// no queued work still references the old images.
    pub(crate) fn resize(&self, width: u32, height: u32) -> Result<(), GraphicsError> {
        let descriptor = back_buffer_descriptor(width, height)?;
        let count = self.image_count();
        *self.images.write() = allocate_images(&descriptor, count);
        *self.descriptor.write() = descriptor;
        self.current.store(0, Ordering::Release);
        Ok(())
    }

    /// Called from the queue timeline when a present executes.
    pub(crate) fn present(&self, image: u32) {
        self.last_presented.store(image, Ordering::Release);
        self.presented.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn presented_count(&self) -> u64 {
        self.presented.load(Ordering::Acquire)
    }

    pub(crate) fn last_presented(&self) -> Option<u32> {
        match self.last_presented.load(Ordering::Acquire) {
            NOTHING_PRESENTED => None,
            index => Some(index),
        }
    }
}

fn back_buffer_descriptor(width: u32, height: u32) -> Result<ResourceDescriptor, GraphicsError> {
    if width == 0 || height == 0 {
        return Err(GraphicsError::SurfaceCreationFailed(format!(
            "surface size {width}x{height} must be non-zero"
        )));
    }
    Ok(ResourceDescriptor::texture_2d(width, height, Format::Rgba8Unorm))
}

fn allocate_images(descriptor: &ResourceDescriptor, count: u32) -> Vec<Arc<Allocation>> {
    let layout = MemoryLayout::for_descriptor(descriptor);
    (0..count).map(|_| Arc::new(Allocation::new(layout))).collect()
}
