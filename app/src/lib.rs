//! # Tandem App
//!
//! Renders frames on one GPU and presents them on another.
//!
//! ## Overview
//!
//! - [`AppConfig`] - Configuration, parsed from the command line with clap
//! - [`App`] - Creates the devices and the window, then runs the relay
//! - [`FrameRelay`] - Per-frame source caching, cross-adapter import and present
//! - [`MediaLibrary`] - Locates `media/<frame>.jpg` on disk
//!
//! ## Example
//!
//! ```no_run
//! use tandem_app::{App, AppConfig};
//!
//! let config = AppConfig::default().with_size(1280, 720).with_frames(10);
//! let stats = App::new(config).run()?;
//! assert_eq!(stats.frames, 10);
//! # Ok::<(), tandem_app::AppError>(())
//! ```

mod app;
mod args;
mod error;
mod frame_loop;
mod media;

pub use app::App;
pub use args::{AppConfig, CliAdapter, CliExecution, parse_adapter};
pub use error::AppError;
pub use frame_loop::{FrameRelay, RENDER_QUEUE_LABEL, RelayStats};
pub use media::MediaLibrary;

/// App library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
