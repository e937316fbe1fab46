//! Application setup: devices, window and frame relay.

use tandem_graphics::{ChannelEventSource, GraphicsInstance, WindowDescriptor};

use crate::args::AppConfig;
use crate::error::AppError;
use crate::frame_loop::{FrameRelay, RelayStats};
use crate::media::MediaLibrary;

/// The frame relay application.
///
/// # Example
///
/// ```no_run
/// use tandem_app::{App, AppConfig};
///
/// let stats = App::new(AppConfig::parse()).run()?;
/// println!("presented {} frames", stats.frames);
/// # Ok::<(), tandem_app::AppError>(())
/// ```
#[derive(Debug, Clone)]
pub struct App {
    config: AppConfig,
    media: MediaLibrary,
}

impl App {
    /// Create an application searching for media from the working directory.
    pub fn new(config: AppConfig) -> Self {
        let media = MediaLibrary::from_current_dir(config.media_dir.clone());
        Self { config, media }
    }

    /// Replace the media search.
    pub fn with_media(mut self, media: MediaLibrary) -> Self {
        self.media = media;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Create both devices and the window, then relay frames until the
    /// window closes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidConfig`] for unusable settings and
    /// [`AppError::Graphics`] for any initialization or submission failure.
    pub fn run(self) -> Result<RelayStats, AppError> {
        self.config.validate()?;
        tandem_graphics::init();

        let instance = GraphicsInstance::with_parameters(self.config.instance_parameters())?;
        log::info!(
            "Graphics backend: {} ({:?})",
            instance.backend_name(),
            instance.execution_mode()
        );

        let present = instance.create_device(self.config.present_gpu)?;
        let render = instance.create_device(self.config.render_gpu)?;
        if render.is_same_adapter(&present) {
            log::info!("Rendering and presenting on the same adapter: {}", render.name());
        }

        let (close, events) = ChannelEventSource::channel();
        let window = present.create_window(
            WindowDescriptor::new(self.config.width, self.config.height)
                .with_title("Tandem")
                .with_image_count(self.config.swap_chain_images)
                .with_present_mode(self.config.present_mode())
                .with_events(events),
        )?;

        let mut relay = FrameRelay::new(render, present, window, self.media)?;
        if let Some(frames) = self.config.frames {
            relay = relay.with_frame_limit(frames, close);
        }
        relay.run()
    }
}
