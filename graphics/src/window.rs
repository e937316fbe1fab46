//! Windows: a swap chain, its presentation queue and an event source.
//!
//! A [`Window`] owns N back buffers and a queue labelled `"PresentQueue"`.
//! Each frame the application fetches the back buffer to fill with
//! [`Window::next_image`], records work into it on [`Window::queue`], then
//! calls [`Window::present`].
//!
//! Window messages are not read from the operating system. Events come from
//! the [`EventSource`] registered in the [`WindowDescriptor`]: a scripted list
//! for tests or a channel fed by the application.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Weak};

use crate::backend::GpuSurface;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::queue::Queue;
use crate::resources::{Resource, ResourceOrigin};
use crate::types::{Format, ResourceDescriptor};

/// Label of the queue every window creates for presentation.
pub const PRESENT_QUEUE_LABEL: &str = "PresentQueue";

/// Presentation mode for the swap chain.
///
/// Controls how frames are synchronized with the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentMode {
    /// No synchronization. May cause tearing but has lowest latency.
    Immediate,
    /// Triple buffering. Low latency without tearing.
    Mailbox,
    /// VSync enabled. No tearing, but may have higher latency.
    #[default]
    Fifo,
    /// VSync with relaxed timing. May tear if a frame is late.
    FifoRelaxed,
}

/// Keys the window distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Other,
}

/// Events a window reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowEvent {
    /// The user asked to close the window.
    CloseRequested,
    /// A key was pressed. Escape closes the window.
    KeyDown(Key),
    /// The client area changed size. The swap chain is rebuilt.
    Resized { width: u32, height: u32 },
}

/// Supplies window events.
pub trait EventSource: Send {
    /// Next pending event, or `None` when nothing is queued right now.
    fn next_event(&mut self) -> Option<WindowEvent>;
}

/// Replays a fixed list of events, then reports nothing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEvents {
    events: VecDeque<WindowEvent>,
}

impl ScriptedEvents {
    pub fn new(events: impl IntoIterator<Item = WindowEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// A source that never produces an event.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl EventSource for ScriptedEvents {
    fn next_event(&mut self) -> Option<WindowEvent> {
        self.events.pop_front()
    }
}

/// Receives events sent through a channel.
#[derive(Debug)]
pub struct ChannelEventSource {
    receiver: Receiver<WindowEvent>,
}

impl ChannelEventSource {
    /// Create a source and the sender that feeds it.
    pub fn channel() -> (Sender<WindowEvent>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self { receiver })
    }
}

impl EventSource for ChannelEventSource {
    fn next_event(&mut self) -> Option<WindowEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

/// Descriptor for creating a [`Window`].
pub struct WindowDescriptor {
    /// Window title.
    pub title: String,
    /// Client width in pixels.
    pub width: u32,
    /// Client height in pixels.
    pub height: u32,
    /// Number of swap chain images.
    pub image_count: u32,
    /// Presentation mode (vsync behavior).
    pub present_mode: PresentMode,
    events: Box<dyn EventSource>,
}

impl WindowDescriptor {
    /// Create a descriptor for a `width` x `height` window with four back
    /// buffers and no events.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            title: "Tandem".to_string(),
            width,
            height,
            image_count: 4,
            present_mode: PresentMode::default(),
            events: Box::new(ScriptedEvents::empty()),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the number of swap chain images.
    pub fn with_image_count(mut self, image_count: u32) -> Self {
        self.image_count = image_count;
        self
    }

    /// Set the presentation mode.
    pub fn with_present_mode(mut self, present_mode: PresentMode) -> Self {
        self.present_mode = present_mode;
        self
    }

    /// Set the event source.
    pub fn with_events(mut self, events: impl EventSource + 'static) -> Self {
        self.events = Box::new(events);
        self
    }
}

impl std::fmt::Debug for WindowDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowDescriptor")
            .field("title", &self.title)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("image_count", &self.image_count)
            .field("present_mode", &self.present_mode)
            .finish_non_exhaustive()
    }
}

/// A presentation window.
///
/// Created by [`GraphicsDevice::create_window`].
pub struct Window {
    device: Weak<GraphicsDevice>,
    title: String,
    queue: Arc<Queue>,
    surface: GpuSurface,
    back_buffers: Vec<Arc<Resource>>,
    present_mode: PresentMode,
    events: Box<dyn EventSource>,
    should_close: bool,
}

impl Window {
    pub(crate) fn new(
        device: &Arc<GraphicsDevice>,
        descriptor: WindowDescriptor,
    ) -> Result<Self, GraphicsError> {
        check_surface_size(device, descriptor.width, descriptor.height)?;
        let surface =
            device
                .gpu()
                .create_surface(descriptor.width, descriptor.height, descriptor.image_count)?;
        let queue = device.create_queue(PRESENT_QUEUE_LABEL)?;
        let back_buffers = wrap_back_buffers(device, &surface)?;

        log::info!(
            "Window {:?} created: {}x{}, {} images, {:?}",
            descriptor.title,
            descriptor.width,
            descriptor.height,
            descriptor.image_count,
            descriptor.present_mode
        );

        Ok(Self {
            device: Arc::downgrade(device),
            title: descriptor.title,
            queue,
            surface,
            back_buffers,
            present_mode: descriptor.present_mode,
            events: descriptor.events,
            should_close: false,
        })
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The presentation queue.
    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    /// Number of swap chain images.
    pub fn image_count(&self) -> u32 {
        self.surface.image_count()
    }

    /// Current back-buffer resolution as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        let extent = self.surface.descriptor().extent;
        (extent.width, extent.height)
    }

    /// All back buffers, in swap chain order.
    pub fn back_buffers(&self) -> &[Arc<Resource>] {
        &self.back_buffers
    }

    /// Index of the back buffer [`Window::next_image`] returns.
    pub fn current_image_index(&self) -> u32 {
        self.surface.current_index()
    }

    /// The back buffer to render into this frame.
    pub fn next_image(&self) -> Arc<Resource> {
        let index = self.surface.current_index() as usize;
        Arc::clone(&self.back_buffers[index % self.back_buffers.len()])
    }

    /// Queue the current back buffer for display and move to the next one.
    ///
    /// Presentation is ordered after everything already executed on
    /// [`Window::queue`].
    ///
    /// # Errors
    ///
    /// Propagates failures to signal the presentation queue's fence.
    pub fn present(&self) -> Result<(), GraphicsError> {
        let index = self.surface.current_index();
        self.queue.present(&self.surface, index)?;
        let next = self.surface.advance();
        log::trace!(
            "Window {:?}: presented image {index} ({:?}), next {next}",
            self.title,
            self.present_mode
        );
        Ok(())
    }

    /// Frames the presentation queue has displayed so far.
    pub fn presented_count(&self) -> u64 {
        self.surface.presented_count()
    }

    /// Index of the most recently displayed image.
    pub fn last_presented_image(&self) -> Option<u32> {
        self.surface.last_presented()
    }

    /// Drain pending events.
    ///
    /// Returns `false` once a close request or Escape has been seen; that
    /// result is sticky. A resize flushes the presentation queue and
    /// reallocates every back buffer, so previously returned back buffers
    /// stop being part of the swap chain. A resize to an empty client area
    /// (a minimized window) keeps the current swap chain.
    ///
    /// # Errors
    ///
    /// Propagates flush and surface errors from a resize.
    pub fn poll_events(&mut self) -> Result<bool, GraphicsError> {
        while let Some(event) = self.events.next_event() {
            match event {
                WindowEvent::CloseRequested | WindowEvent::KeyDown(Key::Escape) => {
                    if !self.should_close {
                        log::info!("Window {:?}: close requested ({event:?})", self.title);
                    }
                    self.should_close = true;
                }
                WindowEvent::KeyDown(Key::Other) => {}
                WindowEvent::Resized { width, height } => self.resize(width, height)?,
            }
        }
        Ok(!self.should_close)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        if self.size() == (width, height) {
            return Ok(());
        }
        if width == 0 || height == 0 {
            log::debug!(
                "Window {:?}: ignoring resize to {width}x{height}, keeping the swap chain",
                self.title
            );
            return Ok(());
        }
        let device = self.device.upgrade().ok_or(GraphicsError::DeviceLost)?;
        check_surface_size(&device, width, height)?;

        self.queue.flush()?;
        self.surface.resize(width, height)?;
        self.back_buffers = wrap_back_buffers(&device, &self.surface)?;
        for buffer in &self.back_buffers {
            device.track(buffer);
        }
        log::debug!("Window {:?}: swap chain resized to {width}x{height}", self.title);
        Ok(())
    }
}

/// Reject back buffers the device could not allocate. Zero sizes are left
/// to the surface, which reports them itself.
fn check_surface_size(
    device: &GraphicsDevice,
    width: u32,
    height: u32,
) -> Result<(), GraphicsError> {
    let max_dim = device.capabilities().max_texture_dimension;
    if width > max_dim || height > max_dim {
        return Err(GraphicsError::SurfaceCreationFailed(format!(
            "surface size {width}x{height} exceeds maximum {max_dim}"
        )));
    }
    device.check_allocation(&ResourceDescriptor::texture_2d(width, height, Format::Rgba8Unorm))
}

fn wrap_back_buffers(
    device: &Arc<GraphicsDevice>,
    surface: &GpuSurface,
) -> Result<Vec<Arc<Resource>>, GraphicsError> {
    let descriptor = surface.descriptor();
    (0..surface.image_count())
        .map(|index| {
            let gpu = surface.image(index).ok_or_else(|| {
                GraphicsError::SurfaceCreationFailed(format!("missing back buffer {index}"))
            })?;
            Ok(Arc::new(Resource::new(
                Arc::downgrade(device),
                device.adapter(),
                descriptor,
                gpu,
                ResourceOrigin::SwapChain,
            )))
        })
        .collect()
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("title", &self.title)
            .field("size", &self.size())
            .field("image_count", &self.image_count())
            .field("present_mode", &self.present_mode)
            .field("should_close", &self.should_close)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(Window: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{AdapterPreference, GraphicsInstance};

    fn device() -> Arc<GraphicsDevice> {
        GraphicsInstance::new()
            .unwrap()
            .create_device(AdapterPreference::Integrated)
            .unwrap()
    }

    #[test]
    fn test_window_creates_present_queue() {
        let device = device();
        let window = device.create_window(WindowDescriptor::new(8, 4)).unwrap();
        assert_eq!(window.queue().label(), PRESENT_QUEUE_LABEL);
        assert_eq!(window.image_count(), 4);
        assert_eq!(window.size(), (8, 4));
        assert_eq!(device.resource_count(), 4);
    }

    #[test]
    fn test_next_image_follows_present() {
        let device = device();
        let window = device
            .create_window(WindowDescriptor::new(4, 4).with_image_count(2))
            .unwrap();
        let first = window.next_image();
        assert!(Arc::ptr_eq(&first, &window.back_buffers()[0]));
        assert_eq!(first.origin(), ResourceOrigin::SwapChain);

        window.present().unwrap();
        assert!(Arc::ptr_eq(&window.next_image(), &window.back_buffers()[1]));
        window.present().unwrap();
        assert!(Arc::ptr_eq(&window.next_image(), &first));

        window.queue().flush().unwrap();
        assert_eq!(window.presented_count(), 2);
        assert_eq!(window.last_presented_image(), Some(1));
    }

    #[test]
    fn test_close_is_sticky() {
        let device = device();
        let mut window = device
            .create_window(WindowDescriptor::new(4, 4).with_events(ScriptedEvents::new([
                WindowEvent::KeyDown(Key::Other),
                WindowEvent::KeyDown(Key::Escape),
            ])))
            .unwrap();
        assert!(!window.poll_events().unwrap());
        assert!(!window.poll_events().unwrap());
    }

    #[test]
    fn test_channel_events() {
        let device = device();
        let (sender, events) = ChannelEventSource::channel();
        let mut window = device
            .create_window(WindowDescriptor::new(4, 4).with_events(events))
            .unwrap();
        assert!(window.poll_events().unwrap());
        sender.send(WindowEvent::CloseRequested).unwrap();
        assert!(!window.poll_events().unwrap());
    }

    #[test]
    fn test_resize_rebuilds_back_buffers() {
        let device = device();
        let mut window = device
            .create_window(WindowDescriptor::new(4, 4).with_events(ScriptedEvents::new([
                WindowEvent::Resized {
                    width: 8,
                    height: 2,
                },
            ])))
            .unwrap();
        let before = window.next_image();
        assert!(window.poll_events().unwrap());

        let after = window.next_image();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.extent().to_array(), [8, 2, 1]);
        assert_ne!(before.descriptor(), after.descriptor());
    }

    #[test]
    fn test_minimize_keeps_swap_chain() {
        let device = device();
        let mut window = device
            .create_window(WindowDescriptor::new(4, 4).with_events(ScriptedEvents::new([
                WindowEvent::Resized {
                    width: 0,
                    height: 0,
                },
                WindowEvent::Resized {
                    width: 0,
                    height: 4,
                },
            ])))
            .unwrap();
        let before = window.next_image();
        assert!(window.poll_events().unwrap());

        assert_eq!(window.size(), (4, 4));
        assert!(Arc::ptr_eq(&before, &window.next_image()));
    }

    #[test]
    fn test_oversized_surface_rejected() {
        let device = device();
        assert!(matches!(
            device.create_window(WindowDescriptor::new(16385, 4)),
            Err(GraphicsError::SurfaceCreationFailed(_))
        ));

        let mut window = device
            .create_window(WindowDescriptor::new(4, 4).with_events(ScriptedEvents::new([
                WindowEvent::Resized {
                    width: 4,
                    height: u32::MAX,
                },
            ])))
            .unwrap();
        assert!(window.poll_events().is_err());
        assert_eq!(window.size(), (4, 4));
    }

    #[test]
    fn test_invalid_image_count() {
        let device = device();
        assert!(matches!(
            device.create_window(WindowDescriptor::new(4, 4).with_image_count(1)),
            Err(GraphicsError::SurfaceCreationFailed(_))
        ));
    }
}
