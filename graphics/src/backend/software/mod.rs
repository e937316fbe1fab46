//! CPU-emulated GPU backend.
//!
//! Emulates one or more adapters entirely in host memory. Each queue gets a
//! [`timeline::Timeline`] that consumes submitted work in order; fences are
//! counters advanced by those timelines; resources are byte vectors with a
//! layout; cross-adapter sharing goes through an instance-wide handle table.
//!
//! The backend is deterministic in [`ExecutionMode::Deferred`], where work
//! only runs when the instance is polled or a CPU wait requires it.

pub(crate) mod command;
pub(crate) mod fence;
pub(crate) mod handles;
pub(crate) mod memory;
pub(crate) mod surface;
pub(crate) mod timeline;

use std::sync::Arc;

use command::{SoftwareAllocator, SoftwareCommandList};
use fence::SoftwareFence;
use handles::{HandleTable, SharedHandle};
use memory::{Allocation, MemoryLayout};
use surface::SoftwareSurface;
use timeline::{Job, Scheduler, Timeline};

pub use timeline::ExecutionMode;

use crate::error::GraphicsError;
use crate::instance::{AdapterId, AdapterInfo};
use crate::types::ResourceDescriptor;

/// The software backend: a set of emulated adapters sharing one scheduler.
#[derive(Debug)]
pub struct SoftwareBackend {
    adapters: Vec<(AdapterId, AdapterInfo)>,
    scheduler: Arc<Scheduler>,
    handles: Arc<HandleTable>,
}

impl SoftwareBackend {
    pub(crate) fn new(adapters: Vec<AdapterInfo>, mode: ExecutionMode) -> Self {
        Self {
            adapters: adapters
                .into_iter()
                .map(|info| (AdapterId::next(), info))
                .collect(),
            scheduler: Arc::new(Scheduler::new(mode)),
            handles: Arc::new(HandleTable::new()),
        }
    }

    /// Backend name.
    pub fn name(&self) -> &'static str {
        "Software"
    }

    pub(crate) fn adapters(&self) -> &[(AdapterId, AdapterInfo)] {
        &self.adapters
    }

    pub(crate) fn create_device(&self, adapter: AdapterId) -> SoftwareDevice {
        SoftwareDevice {
            adapter,
            scheduler: Arc::clone(&self.scheduler),
            handles: Arc::clone(&self.handles),
        }
    }

    pub(crate) fn poll(&self) -> usize {
        self.scheduler.poll()
    }

    pub(crate) fn open_handle_count(&self) -> usize {
        self.handles.open_count()
    }
}

/// One emulated adapter opened as a device.
#[derive(Debug)]
pub(crate) struct SoftwareDevice {
    adapter: AdapterId,
    scheduler: Arc<Scheduler>,
    handles: Arc<HandleTable>,
}

impl SoftwareDevice {
    pub(crate) fn create_queue(&self, label: &str) -> Result<SoftwareQueue, GraphicsError> {
        let timeline = Timeline::new(label, &self.scheduler)?;
        log::trace!("SoftwareDevice {:?}: created timeline {label}", self.adapter);
        Ok(SoftwareQueue { timeline })
    }

    pub(crate) fn create_fence(&self) -> Arc<SoftwareFence> {
        Arc::new(SoftwareFence::new(Arc::clone(&self.scheduler)))
    }

    pub(crate) fn create_allocator(&self) -> Arc<SoftwareAllocator> {
        Arc::new(SoftwareAllocator::new())
    }

    /// Bytes a resource created from `descriptor` would occupy, or `None`
    /// if the size does not fit in 64 bits.
    pub(crate) fn allocation_size(&self, descriptor: &ResourceDescriptor) -> Option<u64> {
        MemoryLayout::for_descriptor(descriptor).checked_size()
    }

    pub(crate) fn create_resource(&self, descriptor: &ResourceDescriptor) -> Arc<Allocation> {
        Arc::new(Allocation::new(MemoryLayout::for_descriptor(descriptor)))
    }

    pub(crate) fn export(&self, allocation: &Arc<Allocation>) -> SharedHandle {
        self.handles.export(allocation)
    }

    pub(crate) fn open(&self, handle: &SharedHandle) -> Result<Arc<Allocation>, GraphicsError> {
        self.handles.open(handle)
    }

    pub(crate) fn create_surface(
        &self,
        width: u32,
        height: u32,
        image_count: u32,
    ) -> Result<Arc<SoftwareSurface>, GraphicsError> {
        SoftwareSurface::new(width, height, image_count).map(Arc::new)
    }
}

/// A queue: submission front-end of a timeline.
#[derive(Debug)]
pub(crate) struct SoftwareQueue {
    timeline: Timeline,
}

impl SoftwareQueue {
    pub(crate) fn submit(
        &self,
        list: SoftwareCommandList,
        fence_value: u64,
    ) -> Result<(), GraphicsError> {
        let commands = list.close(fence_value)?;
        self.timeline.submit(Job::Execute(commands));
        Ok(())
    }

    pub(crate) fn signal(&self, fence: &Arc<SoftwareFence>, value: u64) {
        self.timeline.submit(Job::Signal {
            fence: Arc::clone(fence),
            value,
        });
    }

    pub(crate) fn wait(&self, fence: &Arc<SoftwareFence>, value: u64) {
        self.timeline.submit(Job::Wait {
            fence: Arc::clone(fence),
            value,
        });
    }

    pub(crate) fn present(&self, surface: &Arc<SoftwareSurface>, image: u32) {
        self.timeline.submit(Job::Present {
            surface: Arc::clone(surface),
            image,
        });
    }

    pub(crate) fn pending(&self) -> usize {
        self.timeline.pending()
    }
}
