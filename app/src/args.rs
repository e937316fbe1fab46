//! Command line arguments and the application configuration they produce.
//!
//! Uses clap for CLI parsing with:
//! - Help text (`--help`)
//! - Validation and clear error messages
//! - Adapter lists described as `NAME:MB` pairs

use std::path::PathBuf;

use tandem_graphics::{AdapterInfo, AdapterPreference, ExecutionMode, InstanceParameters, PresentMode};

use crate::error::AppError;

// ============================================================================
// CLI enums (clap value enums with CLI-friendly naming)
// ============================================================================

/// Adapter class selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliAdapter {
    /// Adapter with the least dedicated memory.
    Integrated,
    /// Adapter with the most dedicated memory.
    Discrete,
}

impl From<CliAdapter> for AdapterPreference {
    fn from(cli: CliAdapter) -> Self {
        match cli {
            CliAdapter::Integrated => AdapterPreference::Integrated,
            CliAdapter::Discrete => AdapterPreference::Discrete,
        }
    }
}

/// How emulated GPU work runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliExecution {
    /// One worker thread per queue.
    #[default]
    Threaded,
    /// Work runs only when the frame loop polls the instance.
    Deferred,
}

impl From<CliExecution> for ExecutionMode {
    fn from(cli: CliExecution) -> Self {
        match cli {
            CliExecution::Threaded => ExecutionMode::Threaded,
            CliExecution::Deferred => ExecutionMode::Deferred,
        }
    }
}

/// Parse an adapter description of the form `NAME:MB`.
pub fn parse_adapter(value: &str) -> Result<AdapterInfo, String> {
    let (name, memory) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected NAME:MB, got '{value}'"))?;
    if name.is_empty() {
        return Err(format!("adapter name missing in '{value}'"));
    }
    let memory_mb = memory
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid dedicated memory '{memory}': {e}"))?;
    Ok(AdapterInfo::new(name, memory_mb))
}

// ============================================================================
// Application configuration
// ============================================================================

/// Resolved application configuration.
///
/// Built from the command line by [`AppConfig::parse`] or programmatically
/// with the builder methods.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub present_gpu: AdapterPreference,
    pub render_gpu: AdapterPreference,
    pub swap_chain_images: u32,
    pub width: u32,
    pub height: u32,
    /// Close the window after this many frames.
    pub frames: Option<u64>,
    /// Directory holding `<frame>.jpg`, searched from the working directory upwards.
    pub media_dir: PathBuf,
    pub vsync: bool,
    pub execution: ExecutionMode,
    /// Adapter list; empty means the backend's default set.
    pub adapters: Vec<AdapterInfo>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            present_gpu: AdapterPreference::Integrated,
            render_gpu: AdapterPreference::Discrete,
            swap_chain_images: 4,
            width: 3840,
            height: 2160,
            frames: None,
            media_dir: PathBuf::from("media"),
            vsync: false,
            execution: ExecutionMode::Threaded,
            adapters: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Parse the process command line.
    pub fn parse() -> Self {
        use clap::Parser;
        native::ClapArgs::parse().into()
    }

    /// Parse from an explicit argument list (first item is the program name).
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        use clap::Parser;
        native::ClapArgs::try_parse_from(args).map(Into::into)
    }

    /// Set the window size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the number of frames before the window is closed.
    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Set the media directory.
    pub fn with_media_dir(mut self, media_dir: impl Into<PathBuf>) -> Self {
        self.media_dir = media_dir.into();
        self
    }

    /// Set the adapter preferences for the present and render devices.
    pub fn with_gpus(mut self, present: AdapterPreference, render: AdapterPreference) -> Self {
        self.present_gpu = present;
        self.render_gpu = render;
        self
    }

    /// Set the swap chain image count.
    pub fn with_swap_chain_images(mut self, images: u32) -> Self {
        self.swap_chain_images = images;
        self
    }

    /// Set the execution mode.
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Set the adapter list.
    pub fn with_adapters(mut self, adapters: Vec<AdapterInfo>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Presentation mode implied by `vsync`.
    pub fn present_mode(&self) -> PresentMode {
        if self.vsync {
            PresentMode::Fifo
        } else {
            PresentMode::Immediate
        }
    }

    /// Instance parameters for this configuration.
    pub fn instance_parameters(&self) -> InstanceParameters {
        let params = InstanceParameters::new().with_execution_mode(self.execution);
        if self.adapters.is_empty() {
            params
        } else {
            params.with_adapters(self.adapters.clone())
        }
    }

    /// Reject configurations that cannot produce a window.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.width == 0 || self.height == 0 {
            return Err(AppError::InvalidConfig(format!(
                "window size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if self.swap_chain_images < 2 {
            return Err(AppError::InvalidConfig(format!(
                "at least 2 swap chain images are required, got {}",
                self.swap_chain_images
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Native implementation using clap
// ============================================================================

mod native {
    use super::*;
    use clap::Parser;

    /// Tandem frame relay arguments.
    #[derive(Parser, Debug)]
    #[command(
        name = "tandem",
        about = "Render frames on one GPU and present them on another",
        long_about = "Loads media/<frame>.jpg on the render GPU, shares the texture with the \
            present GPU and copies it into the swap chain.\n\n\
            EXAMPLES:\n\
              # Render on the discrete GPU, present on the integrated one (default)\n\
              ./tandem\n\
            \n\
              # Use one adapter for both\n\
              ./tandem --present-gpu discrete --render-gpu discrete\n\
            \n\
              # Headless run with a custom adapter set\n\
              ./tandem --frames 10 --adapter iGPU:512 --adapter dGPU:8192",
        version
    )]
    pub(super) struct ClapArgs {
        /// Adapter that owns the window.
        #[arg(long, default_value = "integrated", value_enum)]
        pub present_gpu: CliAdapter,

        /// Adapter that decodes and uploads frames.
        #[arg(long, default_value = "discrete", value_enum)]
        pub render_gpu: CliAdapter,

        /// Number of swap chain images.
        #[arg(long, default_value = "4", value_parser = clap::value_parser!(u32).range(2..=16))]
        pub swap_chain_images: u32,

        /// Window width in pixels.
        #[arg(long, default_value = "3840")]
        pub width: u32,

        /// Window height in pixels.
        #[arg(long, default_value = "2160")]
        pub height: u32,

        /// Close the window after N frames.
        #[arg(long)]
        pub frames: Option<u64>,

        /// Directory with numbered JPEG frames.
        #[arg(long, default_value = "media")]
        pub media_dir: PathBuf,

        /// Enable vertical sync.
        #[arg(long)]
        pub vsync: bool,

        /// How emulated GPU work runs.
        #[arg(long, default_value = "threaded", value_enum)]
        pub execution: CliExecution,

        /// Adapter to emulate, as NAME:MB. Repeat for several adapters.
        #[arg(long = "adapter", value_name = "NAME:MB", value_parser = parse_adapter)]
        pub adapters: Vec<AdapterInfo>,
    }

    impl From<ClapArgs> for AppConfig {
        fn from(args: ClapArgs) -> Self {
            if args.present_gpu == args.render_gpu {
                log::info!(
                    "Present and render GPU are both '{:?}'; frames will not cross adapters",
                    args.present_gpu
                );
            }
            Self {
                present_gpu: args.present_gpu.into(),
                render_gpu: args.render_gpu.into(),
                swap_chain_images: args.swap_chain_images,
                width: args.width,
                height: args.height,
                frames: args.frames,
                media_dir: args.media_dir,
                vsync: args.vsync,
                execution: args.execution.into(),
                adapters: args.adapters,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::try_parse_from(["tandem"]).unwrap();
        assert_eq!(config.present_gpu, AdapterPreference::Integrated);
        assert_eq!(config.render_gpu, AdapterPreference::Discrete);
        assert_eq!(config.swap_chain_images, 4);
        assert_eq!((config.width, config.height), (3840, 2160));
        assert_eq!(config.frames, None);
        assert_eq!(config.present_mode(), PresentMode::Immediate);
        assert!(config.adapters.is_empty());
    }

    #[test]
    fn test_full_command_line() {
        let config = AppConfig::try_parse_from([
            "tandem",
            "--present-gpu",
            "discrete",
            "--swap-chain-images",
            "3",
            "--frames",
            "10",
            "--vsync",
            "--execution",
            "deferred",
            "--adapter",
            "iGPU:512",
            "--adapter",
            "dGPU:8192",
        ])
        .unwrap();
        assert_eq!(config.present_gpu, AdapterPreference::Discrete);
        assert_eq!(config.swap_chain_images, 3);
        assert_eq!(config.frames, Some(10));
        assert_eq!(config.present_mode(), PresentMode::Fifo);
        assert_eq!(config.execution, ExecutionMode::Deferred);
        assert_eq!(config.adapters.len(), 2);
        assert_eq!(config.adapters[1].dedicated_memory_mb(), 8192);
    }

    #[test]
    fn test_swap_chain_image_range() {
        assert!(AppConfig::try_parse_from(["tandem", "--swap-chain-images", "1"]).is_err());
        assert!(AppConfig::try_parse_from(["tandem", "--swap-chain-images", "17"]).is_err());
    }

    #[test]
    fn test_parse_adapter() {
        let info = parse_adapter("Radeon:Pro:2048").unwrap();
        assert_eq!(info.name, "Radeon:Pro");
        assert_eq!(info.dedicated_memory_mb(), 2048);
        assert!(parse_adapter("no-memory").is_err());
        assert!(parse_adapter(":512").is_err());
        assert!(parse_adapter("gpu:lots").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().validate().is_ok());
        assert!(AppConfig::default().with_size(0, 10).validate().is_err());
    }
}
