//! Application errors.

use tandem_graphics::GraphicsError;

/// Errors that end the frame relay.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Graphics initialization or submission failed.
    #[error("graphics error: {0}")]
    Graphics(#[from] GraphicsError),

    /// The configuration cannot produce a window.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
