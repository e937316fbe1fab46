//! The render/present frame relay.
//!
//! Every frame the present device acquires a back buffer and needs a source
//! texture of the same shape. Sources live in a ring of one slot per swap
//! chain image. A slot is rebuilt on the render device, filled from the
//! frame's media file and imported on the present device only when its
//! descriptor no longer matches what the back buffer needs; otherwise the
//! cached import is copied again.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use tandem_graphics::{
    BarrierState, GraphicsDevice, Queue, Resource, ResourceDescriptor, Window, WindowEvent,
};

use crate::error::AppError;
use crate::media::MediaLibrary;

/// Label of the render device's upload queue.
pub const RENDER_QUEUE_LABEL: &str = "RenderQueue";

/// Counters reported when the relay stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayStats {
    /// Frames presented.
    pub frames: u64,
    /// Frames that reused a cached source.
    pub reuses: u64,
    /// Sources rebuilt on the render device.
    pub rebuilds: u64,
    /// Media files decoded and uploaded.
    pub loads: u64,
    /// Rebuilt sources left blank because the media was missing or unusable.
    pub skipped_media: u64,
}

struct CachedSource {
    /// Owned by the render device; keeps the shared memory alive.
    render: Arc<Resource>,
    /// The same memory as seen by the present device.
    present: Arc<Resource>,
}

struct FrameLimit {
    frames: u64,
    close: Sender<WindowEvent>,
}

/// Drives frames from the render device to the window on the present device.
pub struct FrameRelay {
    render: Arc<GraphicsDevice>,
    present: Arc<GraphicsDevice>,
    render_queue: Arc<Queue>,
    window: Window,
    media: MediaLibrary,
    sources: Vec<Option<CachedSource>>,
    limit: Option<FrameLimit>,
    stats: RelayStats,
}

impl FrameRelay {
    /// Create a relay presenting into `window`, which must belong to `present`.
    ///
    /// # Errors
    ///
    /// Returns an error if the render queue cannot be created.
    pub fn new(
        render: Arc<GraphicsDevice>,
        present: Arc<GraphicsDevice>,
        window: Window,
        media: MediaLibrary,
    ) -> Result<Self, AppError> {
        let render_queue = render.create_queue(RENDER_QUEUE_LABEL)?;
        let sources = (0..window.image_count()).map(|_| None).collect();
        Ok(Self {
            render,
            present,
            render_queue,
            window,
            media,
            sources,
            limit: None,
            stats: RelayStats::default(),
        })
    }

    /// Send a close request through `close` once `frames` frames were presented.
    ///
    /// `close` must feed the window's event source.
    pub fn with_frame_limit(mut self, frames: u64, close: Sender<WindowEvent>) -> Self {
        self.limit = Some(FrameLimit { frames, close });
        self
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Run frames until the window asks to close, then flush both devices.
    pub fn run(&mut self) -> Result<RelayStats, AppError> {
        while self.frame()? {}
        self.render_queue.flush()?;
        self.window.queue().flush()?;

        log::info!(
            "Frame relay stopped after {} frames: {} reused, {} rebuilt, {} loaded, {} without media",
            self.stats.frames,
            self.stats.reuses,
            self.stats.rebuilds,
            self.stats.loads,
            self.stats.skipped_media
        );
        Ok(self.stats)
    }

    /// Run one frame. Returns `false` once the window wants to close.
    pub fn frame(&mut self) -> Result<bool, AppError> {
        if let Some(limit) = &self.limit {
            if self.stats.frames >= limit.frames {
                // The window may already be gone from the receiver's side.
                let _ = limit.close.send(WindowEvent::CloseRequested);
            }
        }
        if !self.window.poll_events()? {
            return Ok(false);
        }

        let frame = self.stats.frames;
        let back_buffer = self.window.next_image();
        let source = self.source_for(frame, back_buffer.descriptor())?;

        let queue = self.window.queue();
        let mut list = queue.start_recording()?;
        list.barrier(&back_buffer, BarrierState::Common, BarrierState::CopyDestination)?;
        list.copy(&back_buffer, &source)?;
        list.barrier(&back_buffer, BarrierState::CopyDestination, BarrierState::Common)?;
        queue.execute(list)?;
        self.window.present()?;

        // Deferred backends only make progress when polled.
        self.present.instance().poll();

        self.stats.frames += 1;
        log::trace!("Frame {frame} presented");
        Ok(true)
    }

    /// The present-side source for `frame`, rebuilt if the slot is stale.
    fn source_for(
        &mut self,
        frame: u64,
        target: &ResourceDescriptor,
    ) -> Result<Arc<Resource>, AppError> {
        let slot = (frame % self.sources.len() as u64) as usize;
        let desired = target.with_shared(!self.render.is_same_adapter(&self.present));

        if let Some(cached) = &self.sources[slot] {
            if *cached.render.descriptor() == desired {
                self.stats.reuses += 1;
                return Ok(Arc::clone(&cached.present));
            }
        }

        let render = self.render.create_resource(&desired)?;
        self.load_media(frame, &render);
        let present = self.present.create_shared_resource(&self.render, &render)?;
        self.stats.rebuilds += 1;
        log::debug!(
            "Frame {frame}: rebuilt source slot {slot} ({}x{})",
            desired.extent.width,
            desired.extent.height
        );

        self.sources[slot] = Some(CachedSource {
            render,
            present: Arc::clone(&present),
        });
        Ok(present)
    }

    /// Upload the frame's media into `target`. Missing or unusable media
    /// leaves the target blank.
    fn load_media(&mut self, frame: u64, target: &Resource) {
        let Some(path) = self.media.find(frame) else {
            log::warn!("Frame {frame}: {} not found", MediaLibrary::file_name(frame));
            self.stats.skipped_media += 1;
            return;
        };
        match target.load_from_file(&path, &self.render_queue) {
            Ok(()) => self.stats.loads += 1,
            Err(e) => {
                log::warn!("Frame {frame}: failed to load {}: {e}", path.display());
                self.stats.skipped_media += 1;
            }
        }
    }
}

impl std::fmt::Debug for FrameRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRelay")
            .field("render", &self.render.name())
            .field("present", &self.present.name())
            .field("slots", &self.sources.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
